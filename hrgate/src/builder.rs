// SPDX-License-Identifier: MIT OR Apache-2.0

use hrgate_auth::{PolicyEngine, RuleSet};
use hrgate_notify::{ChangeNotifier, NotifierConfig};
use hrgate_store::{MemoryStore, SqliteError, SqliteStore, SqliteStoreBuilder};

use crate::config::Config;
use crate::gateway::{Backend, Gateway};

#[derive(Default)]
pub struct GatewayBuilder {
    config: Config,
    rules: Option<RuleSet>,
}

impl GatewayBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn notifier_capacity(mut self, capacity: usize) -> Self {
        self.config.notifier_capacity = capacity;
        self
    }

    pub fn database_url(mut self, url: &str) -> Self {
        self.config.database_url = url.to_string();
        self
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.config.max_connections = max_connections;
        self
    }

    pub fn run_migrations(mut self, value: bool) -> Self {
        self.config.run_migrations = value;
        self
    }

    /// Replace the canonical rule set.
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn build<S: Backend>(self, store: S) -> Gateway<S> {
        let engine = PolicyEngine::new(self.rules.unwrap_or_else(RuleSet::canonical));
        let notifier = ChangeNotifier::new(NotifierConfig {
            capacity: self.config.notifier_capacity,
        });
        Gateway::from_parts(store, engine, notifier)
    }

    pub fn build_memory(self) -> Gateway<MemoryStore> {
        self.build(MemoryStore::new())
    }

    pub async fn build_sqlite(self) -> Result<Gateway<SqliteStore>, SqliteError> {
        let store = SqliteStoreBuilder::new()
            .database_url(&self.config.database_url)
            .max_connections(self.config.max_connections)
            .run_default_migrations(self.config.run_migrations)
            .build()
            .await?;
        Ok(self.build(store))
    }
}
