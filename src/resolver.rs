use crate::domain::{Scope, Target};
use crate::store::{Store, StoreError};
use std::sync::Arc;

/// Turns a logical scope into the devices that should receive a dispatch.
pub struct LocationResolver {
    store: Arc<dyn Store>,
}

impl LocationResolver {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Every returned target has an active, non-empty token and a subscriber
    /// with a recorded locality inside `scope`. No match is an empty list.
    #[tracing::instrument(name = "Resolve targets", skip(self), fields(scope = %scope))]
    pub async fn resolve_targets(&self, scope: &Scope) -> Result<Vec<Target>, StoreError> {
        let candidates = self.store.targets(scope).await?;
        let found = candidates.len();
        let targets: Vec<Target> = candidates
            .into_iter()
            .filter(|target| target.has_token() && scope.matches(&target.area))
            .collect();
        if targets.len() != found {
            tracing::warn!(
                dropped = found - targets.len(),
                "The store returned targets outside the scope"
            );
        }
        tracing::info!(targets = targets.len(), "Resolved notification targets");
        Ok(targets)
    }
}
