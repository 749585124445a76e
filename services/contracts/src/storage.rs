use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::{fs, io::AsyncWriteExt};
use uuid::Uuid;

/// Directory under the media root holding contract attachments.
pub const ATTACHMENT_DIR: &str = "contract_attachments";

/// Where uploaded attachment bytes end up. Paths are relative to the media root.
#[async_trait]
pub trait AttachmentStorage: Send + Sync {
    async fn save(&self, original_name: &str, data: &[u8]) -> anyhow::Result<String>;

    async fn delete(&self, path: &str) -> anyhow::Result<()>;
}

pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AttachmentStorage for FilesystemStorage {
    async fn save(&self, original_name: &str, data: &[u8]) -> anyhow::Result<String> {
        let relative = format!(
            "{ATTACHMENT_DIR}/{}_{}",
            Uuid::new_v4().simple(),
            sanitize_file_name(original_name)
        );
        let full_path = self.root.join(&relative);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let mut file = fs::File::create(&full_path)
            .await
            .with_context(|| format!("creating {}", full_path.display()))?;
        file.write_all(data).await?;
        file.flush().await?;

        tracing::debug!(path = %relative, size = data.len(), "attachment stored");
        Ok(relative)
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        let full_path = self.root.join(path);
        match fs::remove_file(&full_path).await {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(error) => {
                Err(error).with_context(|| format!("removing {}", full_path.display()))
            }
        }
    }
}

/// Reduce an uploaded file name to a safe single path segment.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|ch: char| ch == '/' || ch == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned.chars().take(100).collect()
    }
}
