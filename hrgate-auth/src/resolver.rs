// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolution of principal identifiers into [`PrincipalContext`]s.
use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use hrgate_core::{Principal, PrincipalId};
use thiserror::Error;
use tracing::{debug, error};

use crate::context::PrincipalContext;
use crate::policy::{is_evaluating, report_cycle};

/// Privileged source of identity facts.
///
/// Implementations must read role and department without consulting any access policy, the
/// returned principal is what those policies are evaluated with later.
pub trait IdentityStore {
    type Error: StdError + Send + Sync + 'static;

    /// Look up a principal. Returns `None` if no such principal exists.
    fn principal(
        &self,
        id: PrincipalId,
    ) -> impl Future<Output = Result<Option<Principal>, Self::Error>> + Send;
}

#[derive(Clone)]
struct Frame {
    stack: Vec<PrincipalId>,
    cycle: Arc<AtomicBool>,
}

tokio::task_local! {
    /// Principals whose lookup is currently in progress on this task.
    static RESOLVING: Frame;
}

type Cache = HashMap<PrincipalId, PrincipalContext>;

/// Maps principal ids to their role and department with exactly one identity lookup each.
///
/// Contexts are cached until [`RoleResolver::invalidate`] is called for the principal, which
/// should happen whenever their profile changes.
#[derive(Clone, Debug)]
pub struct RoleResolver<I> {
    identity: I,
    cache: Arc<RwLock<Cache>>,
}

impl<I> RoleResolver<I>
where
    I: IdentityStore,
{
    pub fn new(identity: I) -> Self {
        Self {
            identity,
            cache: Arc::default(),
        }
    }

    fn read_cache(&self) -> RwLockReadGuard<'_, Cache> {
        self.cache.read().expect("acquire shared read access on cache")
    }

    fn write_cache(&self) -> RwLockWriteGuard<'_, Cache> {
        self.cache
            .write()
            .expect("acquire exclusive write access on cache")
    }

    /// Resolve a principal, using the cached context if there is one.
    pub async fn resolve(&self, id: PrincipalId) -> Result<PrincipalContext, ResolveError<I::Error>> {
        Self::detect_cycle(id)?;

        if let Some(context) = self.cached(id) {
            return Ok(context);
        }

        self.lookup(id).await
    }

    /// Resolve a principal with a fresh identity lookup, replacing any cached context.
    pub async fn refresh(&self, id: PrincipalId) -> Result<PrincipalContext, ResolveError<I::Error>> {
        Self::detect_cycle(id)?;
        self.lookup(id).await
    }

    /// Cached context of a principal, without performing a lookup.
    pub fn cached(&self, id: PrincipalId) -> Option<PrincipalContext> {
        self.read_cache().get(&id).cloned()
    }

    /// Forget the cached context of a principal. The next resolution performs a new lookup.
    pub fn invalidate(&self, id: PrincipalId) {
        if self.write_cache().remove(&id).is_some() {
            debug!(principal = %id, "invalidated cached principal context");
        }
    }

    fn detect_cycle(id: PrincipalId) -> Result<(), ResolveError<I::Error>> {
        // Resolution is not allowed to happen while a policy is being evaluated, the policy would
        // then depend on its own outcome.
        if is_evaluating() {
            error!(principal = %id, "principal resolved from inside a policy evaluation");
            report_cycle(id);
            return Err(ResolveError::PolicyCycleDetected(id));
        }

        let reentered = RESOLVING
            .try_with(|frame| {
                let reentered = frame.stack.contains(&id);
                if reentered {
                    frame.cycle.store(true, Ordering::SeqCst);
                }
                reentered
            })
            .unwrap_or(false);

        if reentered {
            error!(principal = %id, "principal resolved from inside its own identity lookup");
            return Err(ResolveError::PolicyCycleDetected(id));
        }

        Ok(())
    }

    async fn lookup(&self, id: PrincipalId) -> Result<PrincipalContext, ResolveError<I::Error>> {
        let frame = match RESOLVING.try_with(Frame::clone) {
            Ok(mut frame) => {
                frame.stack.push(id);
                frame
            }
            Err(_) => Frame {
                stack: vec![id],
                cycle: Arc::default(),
            },
        };
        let cycle = frame.cycle.clone();

        let result = RESOLVING.scope(frame, self.identity.principal(id)).await;

        // A nested resolution of the same principal failed. Whatever the identity store made of
        // that, this lookup is part of the cycle.
        if cycle.load(Ordering::SeqCst) {
            return Err(ResolveError::PolicyCycleDetected(id));
        }

        let Some(principal) = result.map_err(ResolveError::Store)? else {
            debug!(principal = %id, "unknown principal");
            return Err(ResolveError::AuthenticationRequired);
        };

        let context = PrincipalContext::from_principal(principal);
        self.write_cache().insert(id, context.clone());
        debug!(
            principal = %id,
            role = %context.role(),
            department = ?context.department(),
            "resolved principal"
        );

        Ok(context)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError<E> {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("policy cycle detected while resolving principal {0}")]
    PolicyCycleDetected(PrincipalId),

    #[error(transparent)]
    Store(E),
}

#[cfg(test)]
mod tests {
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, OnceLock};

    use assert_matches::assert_matches;
    use hrgate_core::{DepartmentId, Principal, PrincipalId, Role};
    use thiserror::Error;

    use super::{IdentityStore, ResolveError, RoleResolver};

    #[derive(Clone, Debug, Default)]
    struct Identities {
        lookups: Arc<AtomicUsize>,
    }

    impl IdentityStore for Identities {
        type Error = std::convert::Infallible;

        async fn principal(&self, id: PrincipalId) -> Result<Option<Principal>, Self::Error> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if id.as_u64() > 10 {
                return Ok(None);
            }
            Ok(Some(Principal {
                id,
                role: if id.as_u64() == 1 {
                    Role::Admin
                } else {
                    Role::Employee
                },
                department: Some(DepartmentId::new(10)),
            }))
        }
    }

    #[tokio::test]
    async fn lookups_are_cached_until_invalidated() {
        let identities = Identities::default();
        let resolver = RoleResolver::new(identities.clone());

        let context = resolver.resolve(PrincipalId::new(1)).await.unwrap();
        assert!(context.is_admin());
        resolver.resolve(PrincipalId::new(1)).await.unwrap();
        assert_eq!(identities.lookups.load(Ordering::SeqCst), 1);

        resolver.invalidate(PrincipalId::new(1));
        assert!(resolver.cached(PrincipalId::new(1)).is_none());
        resolver.resolve(PrincipalId::new(1)).await.unwrap();
        assert_eq!(identities.lookups.load(Ordering::SeqCst), 2);

        resolver.refresh(PrincipalId::new(1)).await.unwrap();
        assert_eq!(identities.lookups.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unknown_principals_need_authentication() {
        let resolver = RoleResolver::new(Identities::default());
        assert_matches!(
            resolver.resolve(PrincipalId::new(42)).await,
            Err(ResolveError::AuthenticationRequired)
        );
        assert!(resolver.cached(PrincipalId::new(42)).is_none());
    }

    #[derive(Debug, Error)]
    #[error("lookup failed")]
    struct LookupFailed;

    /// Identity store which asks the resolver about the principal it is looking up.
    #[derive(Clone)]
    struct Reentrant {
        resolver: Arc<OnceLock<RoleResolver<Reentrant>>>,
    }

    impl IdentityStore for Reentrant {
        type Error = LookupFailed;

        #[allow(refining_impl_trait)]
        fn principal(
            &self,
            id: PrincipalId,
        ) -> Pin<Box<dyn Future<Output = Result<Option<Principal>, LookupFailed>> + Send + '_>>
        {
            Box::pin(async move {
                let resolver = self.resolver.get().ok_or(LookupFailed)?;
                let context = resolver.refresh(id).await.map_err(|_| LookupFailed)?;
                Ok(Some(Principal {
                    id,
                    role: context.role(),
                    department: context.department(),
                }))
            })
        }
    }

    #[tokio::test]
    async fn reentrant_lookups_fail_fast() {
        let slot = Arc::new(OnceLock::new());
        let resolver = RoleResolver::new(Reentrant {
            resolver: slot.clone(),
        });
        slot.set(resolver.clone()).ok();

        assert_matches!(
            resolver.resolve(PrincipalId::new(3)).await,
            Err(ResolveError::PolicyCycleDetected(id)) if id == PrincipalId::new(3)
        );
        assert!(resolver.cached(PrincipalId::new(3)).is_none());
    }
}
