//! Fallback policy tests.
//!
//! Test organization:
//! - resolution.rs: handler lookup, form preference, missing handlers
//! - eligibility.rs: which failures a handler may replace

mod eligibility;
mod resolution;

use fortify_core::PolicyError;
use std::fmt;
use tower::util::{BoxCloneService, Oneshot};
use tower::{Service, ServiceExt};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StoreError {
    Timeout,
    Forbidden,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Timeout => write!(f, "store timed out"),
            StoreError::Forbidden => write!(f, "access forbidden"),
        }
    }
}

impl std::error::Error for StoreError {}

/// A profile lookup keyed by `(tenant, user_id)`.
pub(crate) type Lookup = (String, u64);

/// A store whose every call ends in `failure`.
pub(crate) fn store_failing_with(
    failure: PolicyError<StoreError>,
) -> BoxCloneService<Lookup, String, PolicyError<StoreError>> {
    BoxCloneService::new(tower::service_fn(move |_lookup: Lookup| {
        let failure = failure.clone();
        async move { Err::<String, _>(failure) }
    }))
}

/// A store that answers every lookup.
pub(crate) fn healthy_store() -> BoxCloneService<Lookup, String, PolicyError<StoreError>> {
    BoxCloneService::new(tower::service_fn(|(tenant, user_id): Lookup| async move {
        Ok::<_, PolicyError<StoreError>>(format!("{tenant}/{user_id} from store"))
    }))
}

pub(crate) fn lookup(tenant: &str, user_id: u64) -> Lookup {
    (tenant.to_string(), user_id)
}

pub(crate) fn call<S>(service: &S, args: Lookup) -> Oneshot<S, Lookup>
where
    S: Service<Lookup, Response = String, Error = PolicyError<StoreError>> + Clone,
{
    service.clone().oneshot(args)
}
