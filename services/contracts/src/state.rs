use std::sync::Arc;

use crate::{
    auth::JwtVerifier,
    config::Config,
    repository::{ContractRepository, UserRepository},
    storage::AttachmentStorage,
};

#[derive(Clone)]
pub struct AppState {
    users: Arc<dyn UserRepository>,
    contracts: Arc<dyn ContractRepository>,
    storage: Arc<dyn AttachmentStorage>,
    verifier: Arc<JwtVerifier>,
    config: Arc<Config>,
}

impl AppState {
    pub fn new(
        config: Config,
        users: Arc<dyn UserRepository>,
        contracts: Arc<dyn ContractRepository>,
        storage: Arc<dyn AttachmentStorage>,
    ) -> Self {
        let verifier = Arc::new(JwtVerifier::new(&config.jwt_secret));
        Self {
            users,
            contracts,
            storage,
            verifier,
            config: Arc::new(config),
        }
    }

    pub fn users(&self) -> &dyn UserRepository {
        self.users.as_ref()
    }

    pub fn contracts(&self) -> &dyn ContractRepository {
        self.contracts.as_ref()
    }

    pub fn storage(&self) -> &dyn AttachmentStorage {
        self.storage.as_ref()
    }

    pub fn verifier(&self) -> &JwtVerifier {
        &self.verifier
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
