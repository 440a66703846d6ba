// SPDX-License-Identifier: MIT OR Apache-2.0

use hrgate_notify::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Change events buffered per entity type before slow sessions lag and fall back to a full
    /// re-query.
    pub notifier_capacity: usize,

    /// SQLite database url, used when building a gateway on top of SQLite.
    pub database_url: String,

    pub max_connections: u32,

    /// Run the bundled schema migrations when connecting.
    pub run_migrations: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notifier_capacity: DEFAULT_CAPACITY,
            database_url: "sqlite::memory:".into(),
            max_connections: 16,
            run_migrations: true,
        }
    }
}
