//! Identity ranges assigned to namespaces by the OpenShift SCC admission
//! controller.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Namespace;
use tracing::{instrument, warn};

use crate::error::{SccError, StoreResult};
use crate::store::ClusterStore;

pub const KEY_UID: &str = "openshift.io/sa.scc.uid-range";
pub const KEY_FS_GROUP: &str = "openshift.io/sa.scc.supplemental-groups";
/// Serialized stand-in for a namespace without an assigned range.
pub const UID_NONE: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdentityRange {
    pub start: i64,
    pub size: i64,
}

impl IdentityRange {
    /// Parses `<start>/<size>`, splitting on the first `/`.
    pub fn parse(raw: &str) -> Result<Self, SccError> {
        let (start, size) = raw.split_once('/').ok_or_else(|| {
            SccError::Format(format!(
                "{KEY_UID} annotation value is not in <start>/<range> format"
            ))
        })?;
        let start = start.parse::<i64>().map_err(|_| {
            SccError::Format(format!(
                "{KEY_UID} annotation start uid is not an integer"
            ))
        })?;
        let size = size.parse::<i64>().map_err(|_| {
            SccError::Format(format!(
                "{KEY_UID} annotation range is not an integer"
            ))
        })?;
        Ok(Self { start, size })
    }

    /// Reads both SCC annotations. `Ok(None)` means no range is assigned
    /// yet, including the half-annotated case.
    pub fn from_annotations(
        annotations: &BTreeMap<String, String>,
    ) -> Result<Option<Self>, SccError> {
        match (annotations.get(KEY_UID), annotations.get(KEY_FS_GROUP)) {
            (None, None) => Ok(None),
            (Some(_), None) | (None, Some(_)) => Ok(None),
            (Some(uid), Some(fs_group)) if uid != fs_group => {
                Err(SccError::AnnotationMismatch {
                    uid: uid.clone(),
                    fs_group: fs_group.clone(),
                })
            }
            (Some(uid), Some(_)) => Self::parse(uid).map(Some),
        }
    }

    pub fn start_or_none(range: Option<Self>) -> i64 {
        range.map(|r| r.start).unwrap_or(UID_NONE)
    }
}

/// True when the namespace carries the uid-range annotation, i.e. the SCC
/// controller has (at least started to) assign it a range.
pub fn is_tracked(ns: &Namespace) -> bool {
    ns.metadata
        .annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(KEY_UID))
}

/// Identity range of a namespace. A missing namespace resolves to `None`.
#[instrument(level = "debug", skip(store))]
pub async fn resolve<S: ClusterStore + ?Sized>(
    store: &S,
    namespace: &str,
) -> StoreResult<Option<IdentityRange>> {
    let Some(ns) = store.get_namespace(namespace).await? else {
        return Ok(None);
    };
    let empty = BTreeMap::new();
    let annotations = ns.metadata.annotations.as_ref().unwrap_or(&empty);
    let has_uid = annotations.contains_key(KEY_UID);
    if has_uid != annotations.contains_key(KEY_FS_GROUP) {
        let present = if has_uid { KEY_UID } else { KEY_FS_GROUP };
        warn!(
            %namespace,
            %present,
            "only one of the SCC range annotations is set; treating namespace as unassigned"
        );
    }
    IdentityRange::from_annotations(annotations)
}
