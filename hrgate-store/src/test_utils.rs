// SPDX-License-Identifier: MIT OR Apache-2.0

/// Macro to run the same test logic against all store backend implementations.
///
/// This macro takes a closure that will be executed against each store type:
/// - In-memory store (`MemoryStore`)
/// - SQLite store (`SqliteStore`)
///
/// ## Example
///
/// ```rust
/// # use hrgate_store::{RecordStore, assert_all_stores};
/// # use hrgate_core::ResourceKind;
/// # async fn run() {
/// assert_all_stores!(|store| async {
///     assert!(store.list(ResourceKind::Payroll).await.unwrap().is_empty());
/// });
/// # }
/// ```
#[macro_export]
macro_rules! assert_all_stores {
    (|$store:ident| $test_body:expr) => {
        // Test with MemoryStore.
        {
            let $store = $crate::memory::MemoryStore::default();
            $test_body.await;
        }

        // Test with SqliteStore.
        {
            let $store = $crate::sqlite::SqliteStore::temporary().await;
            $test_body.await;
        }
    };
}
