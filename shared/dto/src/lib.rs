use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Validation failures keyed by field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub user_id: i64,
    /// Tenant a superadmin acts on behalf of.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<i64>,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Text(String),
    Fields(FieldErrors),
}

/// Body shape shared by every response of the contracts API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub status: EnvelopeStatus,
    pub message: Message,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            status: EnvelopeStatus::Success,
            message: Message::Text(message.into()),
            data: Some(data),
        }
    }

    pub fn failed(message: Message) -> Self {
        Self {
            status: EnvelopeStatus::Failed,
            message,
            data: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentResponse {
    pub id: i64,
    /// Absolute URL of the stored file.
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractResponse {
    pub id: i64,
    pub company: i64,
    pub client: i64,
    pub location: i64,
    pub rate_card: i64,
    pub client_name: String,
    pub location_name: String,
    pub rate_cardname: String,
    pub contract_no: String,
    #[serde(with = "display_date")]
    pub valid_from: NaiveDate,
    #[serde(with = "display_date")]
    pub valid_till: NaiveDate,
    pub contract_status: String,
    pub attachments: Vec<AttachmentResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListContractsQuery {
    pub status: Option<String>,
}

/// `DD-MM-YYYY` rendering used for contract dates on the wire.
pub mod display_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%d-%m-%Y";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(de::Error::custom)
    }
}
