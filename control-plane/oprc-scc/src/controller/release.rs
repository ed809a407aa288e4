use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Namespace;
use kube::{
    Client, ResourceExt,
    api::Api,
    runtime::{Controller, controller::Action, watcher::Config},
};
use tracing::{debug, info, instrument, warn};

use super::{ControllerContext, ReconcileState, error_policy};
use crate::crd::HelmRelease;
use crate::error::SccError;
use crate::fanout;
use crate::featuresets::feature_path;
use crate::identity;
use crate::merger::{UpsertOutcome, entry_key, upsert_entry};
use crate::store::ClusterStore;

impl<S: ClusterStore> ControllerContext<S> {
    /// Template path for a release: the same-named Feature's template, or
    /// the top-level `<name>.yaml` for the configured default release.
    async fn release_template(
        &self,
        name: &str,
    ) -> Result<Option<String>, SccError> {
        match self.store.get_feature(name).await? {
            Some(feature) => {
                Ok(Some(feature_path(&feature.spec.feature_set, name)))
            }
            None if name == self.cfg.default_release => {
                Ok(Some(format!("{}.yaml", name)))
            }
            None => Ok(None),
        }
    }

    async fn ensure_namespace(&self, name: &str) -> Result<(), SccError> {
        if self.store.get_namespace(name).await?.is_some() {
            return Ok(());
        }
        match self.store.create_namespace(name).await {
            Ok(()) => {
                info!(namespace = %name, "created release target namespace");
                Ok(())
            }
            Err(SccError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Renders values for a HelmRelease into its target namespace's range
    /// and stores them under `<name>.yaml`.
    pub async fn reconcile_release(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ReconcileState, SccError> {
        let Some(hr) = self.store.get_release(namespace, name).await? else {
            debug!(%namespace, %name, "helmrelease gone");
            return Ok(ReconcileState::Unresolved);
        };

        let Some(path) = self.release_template(name).await? else {
            debug!(%name, "no feature or default template for release");
            return Ok(ReconcileState::Unresolved);
        };

        let Some(target) = hr.target_namespace() else {
            return Ok(ReconcileState::Unresolved);
        };
        self.ensure_namespace(&target).await?;

        let Some(range) = identity::resolve(&self.store, &target).await? else {
            debug!(%name, namespace = %target, "uid range not assigned yet");
            return Ok(ReconcileState::Unresolved);
        };

        let value = self.catalog.render_or_placeholder(&path, range.start);
        let key = entry_key(name);
        let outcome =
            upsert_entry(&self.store, &self.cfg.config_document(), &key, &value)
                .await?;
        if outcome != UpsertOutcome::Unchanged {
            info!(%name, %key, uid = range.start, "{} configmap key {}", outcome, key);
        }
        Ok(ReconcileState::Resolved(outcome))
    }
}

#[instrument(skip_all, fields(ns = %obj.namespace().unwrap_or_default(), name = %obj.name_any()))]
async fn reconcile(
    obj: Arc<HelmRelease>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, SccError> {
    let ns = obj.namespace().unwrap_or_default();
    let name = obj.name_any();
    ctx.with_deadline(ctx.reconcile_release(&ns, &name)).await?;
    Ok(Action::await_change())
}

/// HelmRelease controller, re-triggered by events on its target namespace.
pub async fn run(client: Client, ctx: Arc<ControllerContext>) {
    let releases: Api<HelmRelease> = Api::all(client.clone());
    let namespaces: Api<Namespace> = Api::all(client);

    let controller = Controller::new(releases, Config::default());
    let cache = controller.store();
    controller
        .watches(namespaces, Config::default(), move |ns: Namespace| {
            let known = cache.state();
            fanout::release_triggers(known.iter().map(|hr| &**hr), &ns)
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!(release = %obj.name, "reconciled"),
                Err(e) => warn!(error = %e, "helmrelease controller error"),
            }
        })
        .await;
}
