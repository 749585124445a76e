//! In-memory doubles and request helpers shared by the unit tests.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use dto::AuthClaims;
use jsonwebtoken::{encode, EncodingKey, Header};
use models::{Contract, ContractAttachment, NewContract, User};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
};

use crate::{
    config::Config,
    repository::{ContractRepository, UserRepository, ValidTillWindow},
    state::AppState,
    storage::AttachmentStorage,
};

pub const SECRET: &str = "test-secret";
pub const BOUNDARY: &str = "contract-form-boundary";

pub fn token(user_id: i64, company_id: Option<i64>) -> String {
    let now = Utc::now().timestamp() as usize;
    sign(AuthClaims {
        user_id,
        company_id,
        exp: now + 3600,
        iat: now,
    })
}

pub fn expired_token(user_id: i64) -> String {
    let now = Utc::now().timestamp() as usize;
    sign(AuthClaims {
        user_id,
        company_id: None,
        exp: now - 3600,
        iat: now - 7200,
    })
}

fn sign(claims: AuthClaims) -> String {
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn staff_user(id: i64, company_id: i64) -> User {
    User {
        id,
        username: format!("staff{id}"),
        is_superuser: false,
        is_active: true,
        company_id: Some(company_id),
    }
}

pub fn superadmin(id: i64) -> User {
    User {
        id,
        username: format!("admin{id}"),
        is_superuser: true,
        is_active: true,
        company_id: None,
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: HashMap<i64, User>,
    companies: HashSet<i64>,
}

impl InMemoryUsers {
    pub fn with_user(mut self, user: User) -> Self {
        if let Some(company_id) = user.company_id {
            self.companies.insert(company_id);
        }
        self.users.insert(user.id, user);
        self
    }

    pub fn with_company(mut self, company_id: i64) -> Self {
        self.companies.insert(company_id);
        self
    }
}

#[async_trait]
impl UserRepository for InMemoryUsers {
    async fn find_user(&self, user_id: i64) -> anyhow::Result<Option<User>> {
        Ok(self.users.get(&user_id).cloned())
    }

    async fn company_exists(&self, company_id: i64) -> anyhow::Result<bool> {
        Ok(self.companies.contains(&company_id))
    }
}

/// `(company_id, name)` keyed by row id.
type NamedRows = HashMap<i64, (i64, String)>;

#[derive(Default)]
struct ContractTables {
    contracts: Vec<Contract>,
    next_contract_id: i64,
    next_attachment_id: i64,
}

#[derive(Default)]
pub struct InMemoryContracts {
    clients: NamedRows,
    locations: NamedRows,
    rate_cards: NamedRows,
    tables: Mutex<ContractTables>,
    fail_inserts: bool,
}

impl InMemoryContracts {
    pub fn with_client(mut self, id: i64, company_id: i64, name: &str) -> Self {
        self.clients.insert(id, (company_id, name.to_string()));
        self
    }

    pub fn with_location(mut self, id: i64, company_id: i64, name: &str) -> Self {
        self.locations.insert(id, (company_id, name.to_string()));
        self
    }

    pub fn with_rate_card(mut self, id: i64, company_id: i64, name: &str) -> Self {
        self.rate_cards.insert(id, (company_id, name.to_string()));
        self
    }

    pub fn failing_inserts(mut self) -> Self {
        self.fail_inserts = true;
        self
    }

    pub fn stored(&self) -> Vec<Contract> {
        self.tables.lock().unwrap().contracts.clone()
    }

    fn name(rows: &NamedRows, company_id: i64, id: i64) -> Option<String> {
        rows.get(&id)
            .filter(|(owner, _)| *owner == company_id)
            .map(|(_, name)| name.clone())
    }
}

#[async_trait]
impl ContractRepository for InMemoryContracts {
    async fn client_name(&self, company_id: i64, client_id: i64) -> anyhow::Result<Option<String>> {
        Ok(Self::name(&self.clients, company_id, client_id))
    }

    async fn location_name(
        &self,
        company_id: i64,
        location_id: i64,
    ) -> anyhow::Result<Option<String>> {
        Ok(Self::name(&self.locations, company_id, location_id))
    }

    async fn rate_card_name(
        &self,
        company_id: i64,
        rate_card_id: i64,
    ) -> anyhow::Result<Option<String>> {
        Ok(Self::name(&self.rate_cards, company_id, rate_card_id))
    }

    async fn create_contract(
        &self,
        contract: &NewContract,
        attachment_paths: &[String],
    ) -> anyhow::Result<Contract> {
        if self.fail_inserts {
            return Err(anyhow!("database unavailable"));
        }

        let lookup = |rows: &NamedRows, id: i64| {
            Self::name(rows, contract.company_id, id).ok_or_else(|| anyhow!("dangling key {id}"))
        };
        let client_name = lookup(&self.clients, contract.client_id)?;
        let location_name = lookup(&self.locations, contract.location_id)?;
        let rate_card_name = lookup(&self.rate_cards, contract.rate_card_id)?;

        let mut tables = self.tables.lock().unwrap();
        tables.next_contract_id += 1;
        let id = tables.next_contract_id;

        let mut attachments = Vec::with_capacity(attachment_paths.len());
        for path in attachment_paths {
            tables.next_attachment_id += 1;
            attachments.push(ContractAttachment {
                id: tables.next_attachment_id,
                contract_id: id,
                file_path: path.clone(),
            });
        }

        let stored = Contract {
            id,
            company_id: contract.company_id,
            client_id: contract.client_id,
            client_name,
            location_id: contract.location_id,
            location_name,
            rate_card_id: contract.rate_card_id,
            rate_card_name,
            contract_no: contract.contract_no.clone(),
            valid_from: contract.valid_from,
            valid_till: contract.valid_till,
            status: contract.status,
            attachments,
        };
        tables.contracts.push(stored.clone());
        Ok(stored)
    }

    async fn list_contracts(
        &self,
        company_id: i64,
        window: ValidTillWindow,
    ) -> anyhow::Result<Vec<Contract>> {
        Ok(self
            .tables
            .lock()
            .unwrap()
            .contracts
            .iter()
            .filter(|c| c.company_id == company_id && window.contains(c.valid_till))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.files.lock().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }
}

#[async_trait]
impl AttachmentStorage for MemoryStorage {
    async fn save(&self, original_name: &str, data: &[u8]) -> anyhow::Result<String> {
        let mut files = self.files.lock().unwrap();
        let path = format!("contract_attachments/{}_{original_name}", files.len() + 1);
        files.insert(path.clone(), data.to_vec());
        Ok(path)
    }

    async fn delete(&self, path: &str) -> anyhow::Result<()> {
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        jwt_secret: SECRET.to_string(),
        ..Config::default()
    }
}

pub fn state_with(
    config: Config,
    users: InMemoryUsers,
    contracts: Arc<InMemoryContracts>,
    storage: Arc<MemoryStorage>,
) -> AppState {
    AppState::new(config, Arc::new(users), contracts, storage)
}

/// Encode a `multipart/form-data` body with text fields and
/// `(field, file name, bytes)` files.
pub fn multipart_body(fields: &[(&str, &str)], files: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    for (name, file_name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}
