// SPDX-License-Identifier: MIT OR Apache-2.0

use hrgate_core::{DepartmentId, PrincipalId, Role};

use crate::PrincipalContext;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Context of a principal with the given id, role and optional department.
pub fn context(id: u64, role: Role, department: Option<u64>) -> PrincipalContext {
    PrincipalContext::new(PrincipalId::new(id), role, department.map(DepartmentId::new))
}
