pub mod feature;
pub mod namespace;
pub mod release;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::try_join_all;
use kube::runtime::controller::Action;
use kube::{Client, Resource, ResourceExt};
use tracing::{info, warn};

use crate::config::SccConfig;
use crate::error::SccError;
use crate::featuresets::TemplateCatalog;
use crate::merger::UpsertOutcome;
use crate::store::k8s::KubeStore;

/// Result of one reconcile pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    /// Nothing to write yet: the object is gone, the namespace has no range,
    /// or there is no template to render. A later event re-triggers it.
    Unresolved,
    /// Range known and the derived document is in place.
    Resolved(UpsertOutcome),
}

/// Shared state handed to every reconcile call.
pub struct ControllerContext<S = KubeStore> {
    pub store: S,
    pub cfg: SccConfig,
    pub catalog: Arc<TemplateCatalog>,
}

impl<S> ControllerContext<S> {
    pub fn new(store: S, cfg: SccConfig) -> Self {
        Self {
            store,
            cfg,
            catalog: TemplateCatalog::embedded(),
        }
    }

    pub fn with_catalog(mut self, catalog: TemplateCatalog) -> Self {
        self.catalog = Arc::new(catalog);
        self
    }

    /// Bounds a reconcile by the configured deadline. The inner future is
    /// dropped on expiry, so no write happens after the deadline.
    pub async fn with_deadline<T>(
        &self,
        fut: impl Future<Output = Result<T, SccError>>,
    ) -> Result<T, SccError> {
        let limit = self.cfg.reconcile_timeout();
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| SccError::Timeout(limit))?
    }
}

pub fn error_policy<K>(
    obj: Arc<K>,
    error: &SccError,
    ctx: Arc<ControllerContext>,
) -> Action
where
    K: Resource,
{
    warn!(
        name = %obj.name_any(),
        namespace = ?obj.namespace(),
        %error,
        retryable = error.is_retryable(),
        "reconcile failed"
    );
    if error.is_retryable() {
        Action::requeue(ctx.cfg.requeue_after())
    } else {
        // Only an annotation edit fixes this, and that edit is itself an event.
        Action::await_change()
    }
}

/// Runs every enabled controller until all of them stop.
pub async fn run_controllers(
    client: Client,
    cfg: SccConfig,
) -> anyhow::Result<()> {
    let ctx = Arc::new(ControllerContext::new(
        KubeStore::new(client.clone()),
        cfg.clone(),
    ));

    let mut handles = Vec::new();
    if cfg.features.feature.unwrap_or(true) {
        info!("starting Feature controller");
        handles.push(tokio::spawn(feature::run(client.clone(), ctx.clone())));
    }
    if cfg.features.release.unwrap_or(true) {
        info!("starting HelmRelease controller");
        handles.push(tokio::spawn(release::run(client.clone(), ctx.clone())));
    }
    if cfg.features.cluster_claim.unwrap_or(false) {
        info!("starting Namespace controller");
        handles.push(tokio::spawn(namespace::run(client.clone(), ctx.clone())));
    }
    if handles.is_empty() {
        warn!("all controllers disabled; nothing to do");
    }

    try_join_all(handles).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn deadline_surfaces_timeout() {
        let cfg = SccConfig {
            reconcile_timeout_secs: 1,
            ..Default::default()
        };
        let ctx = ControllerContext::new(MemoryStore::new(), cfg);
        let res: Result<(), _> = ctx
            .with_deadline(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(SccError::Timeout(_))));
    }

    #[tokio::test]
    async fn deadline_passes_results_through() {
        let ctx =
            ControllerContext::new(MemoryStore::new(), SccConfig::default());
        let res = ctx.with_deadline(async { Ok(7) }).await.unwrap();
        assert_eq!(res, 7);
    }
}
