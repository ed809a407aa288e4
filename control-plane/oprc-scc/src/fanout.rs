//! Which objects must be reconciled again when a namespace changes.
//!
//! The mapping is recomputed from the current object lists on every event;
//! Feature and HelmRelease counts are small, so a linear scan is fine.

use k8s_openapi::api::core::v1::Namespace;
use kube::ResourceExt;
use kube::runtime::reflector::ObjectRef;

use crate::crd::{Feature, HelmRelease};
use crate::error::StoreResult;
use crate::identity;
use crate::store::ClusterStore;

pub fn features_for_namespace<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    namespace: &str,
) -> Vec<ObjectRef<Feature>> {
    features
        .into_iter()
        .filter(|f| f.chart_namespace() == namespace)
        .map(|f| ObjectRef::new(&f.name_any()))
        .collect()
}

pub fn releases_for_namespace<'a>(
    releases: impl IntoIterator<Item = &'a HelmRelease>,
    namespace: &str,
) -> Vec<ObjectRef<HelmRelease>> {
    releases
        .into_iter()
        .filter(|hr| hr.target_namespace().as_deref() == Some(namespace))
        .map(|hr| {
            let r = ObjectRef::new(&hr.name_any());
            match hr.namespace() {
                Some(ns) => r.within(&ns),
                None => r,
            }
        })
        .collect()
}

/// Reverse edge: the namespace whose claim entry a Feature contributes to.
pub fn namespace_for_feature(feature: &Feature) -> Option<ObjectRef<Namespace>> {
    let ns = feature.chart_namespace();
    (!ns.is_empty()).then(|| ObjectRef::new(ns))
}

pub fn has_dependent_features<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    namespace: &str,
) -> bool {
    features
        .into_iter()
        .any(|f| f.chart_namespace() == namespace)
}

/// Features to re-enqueue for a namespace event; untracked namespaces
/// trigger nothing.
pub fn feature_triggers<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
    ns: &Namespace,
) -> Vec<ObjectRef<Feature>> {
    if !identity::is_tracked(ns) {
        return Vec::new();
    }
    features_for_namespace(features, &ns.name_any())
}

pub fn release_triggers<'a>(
    releases: impl IntoIterator<Item = &'a HelmRelease>,
    ns: &Namespace,
) -> Vec<ObjectRef<HelmRelease>> {
    if !identity::is_tracked(ns) {
        return Vec::new();
    }
    releases_for_namespace(releases, &ns.name_any())
}

/// Dependents of a namespace as seen by a fresh listing.
#[derive(Debug, Default)]
pub struct Dependents {
    pub features: Vec<ObjectRef<Feature>>,
    pub releases: Vec<ObjectRef<HelmRelease>>,
}

pub async fn dependents_of<S: ClusterStore + ?Sized>(
    store: &S,
    namespace: &str,
) -> StoreResult<Dependents> {
    let features = store.list_features().await?;
    let releases = store.list_releases().await?;
    Ok(Dependents {
        features: features_for_namespace(&features, namespace),
        releases: releases_for_namespace(&releases, namespace),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ChartInfo, FeatureSpec, HelmReleaseSpec};
    use crate::identity::KEY_UID;
    use crate::store::memory::MemoryStore;

    fn feature(name: &str, ns: &str) -> Feature {
        Feature::new(
            name,
            FeatureSpec {
                feature_set: "openshift".into(),
                chart: ChartInfo {
                    namespace: ns.into(),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
    }

    fn release(ns: &str, name: &str, target: Option<&str>) -> HelmRelease {
        let mut hr = HelmRelease::new(
            name,
            HelmReleaseSpec {
                target_namespace: target.map(str::to_string),
                ..Default::default()
            },
        );
        hr.metadata.namespace = Some(ns.into());
        hr
    }

    fn namespace(name: &str, tracked: bool) -> Namespace {
        let mut ns = Namespace::default();
        ns.metadata.name = Some(name.into());
        if tracked {
            ns.metadata.annotations =
                Some([(KEY_UID.to_string(), "1/1".to_string())].into());
        }
        ns
    }

    #[test]
    fn features_match_on_chart_namespace() {
        let fs = [
            feature("a", "kubeops"),
            feature("b", "kubedb"),
            feature("c", "kubeops"),
        ];
        let refs = features_for_namespace(&fs, "kubeops");
        let names: Vec<_> = refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["a", "c"]);
        assert!(features_for_namespace(&fs, "other").is_empty());
    }

    #[test]
    fn releases_match_on_effective_target() {
        let hrs = [
            release("kubeops", "kubedb", Some("kubedb")),
            release("kubedb", "stash", None),
            release("kubeops", "ace", Some("ace")),
        ];
        let refs = releases_for_namespace(&hrs, "kubedb");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].name, "kubedb");
        assert_eq!(refs[0].namespace.as_deref(), Some("kubeops"));
        assert_eq!(refs[1].name, "stash");
        assert_eq!(refs[1].namespace.as_deref(), Some("kubedb"));
    }

    #[test]
    fn untracked_namespace_triggers_nothing() {
        let fs = [feature("a", "kubeops")];
        let hrs = [release("kubeops", "a", Some("kubeops"))];
        let ns = namespace("kubeops", false);
        assert!(feature_triggers(&fs, &ns).is_empty());
        assert!(release_triggers(&hrs, &ns).is_empty());

        let ns = namespace("kubeops", true);
        assert_eq!(feature_triggers(&fs, &ns).len(), 1);
        assert_eq!(release_triggers(&hrs, &ns).len(), 1);
    }

    #[test]
    fn dependent_features_gate() {
        let fs = [feature("a", "kubedb")];
        assert!(has_dependent_features(&fs, "kubedb"));
        assert!(!has_dependent_features(&fs, "kubeops"));
    }

    #[test]
    fn feature_maps_back_to_its_namespace() {
        let r = namespace_for_feature(&feature("a", "kubeops")).unwrap();
        assert_eq!(r.name, "kubeops");
        assert!(namespace_for_feature(&feature("a", "")).is_none());
    }

    #[tokio::test]
    async fn dependents_from_store_listing() {
        let store = MemoryStore::new();
        store.insert_feature(feature("a", "kubeops")).await;
        store.insert_feature(feature("b", "kubedb")).await;
        store
            .insert_release(release("kubeops", "a", Some("kubeops")))
            .await;
        let deps = dependents_of(&store, "kubeops").await.unwrap();
        assert_eq!(deps.features.len(), 1);
        assert_eq!(deps.features[0].name, "a");
        assert_eq!(deps.releases.len(), 1);
    }
}
