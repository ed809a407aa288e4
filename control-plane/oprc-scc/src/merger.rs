use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::error::{SccError, StoreResult};
use crate::store::{ClusterStore, DocumentKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

impl std::fmt::Display for UpsertOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpsertOutcome::Created => write!(f, "created"),
            UpsertOutcome::Updated => write!(f, "updated"),
            UpsertOutcome::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Entry key owned by a Feature or HelmRelease in the shared document.
pub fn entry_key(object_name: &str) -> String {
    format!("{}.yaml", object_name)
}

/// Sets `entry_key` in the shared document without touching other keys.
///
/// One read, then at most one conditional write. A concurrent writer makes
/// the write fail with `Conflict`; the caller retries on its next trigger.
#[instrument(level = "debug", skip(store, document, entry_value), fields(document = %document))]
pub async fn upsert_entry<S: ClusterStore + ?Sized>(
    store: &S,
    document: &DocumentKey,
    entry_key: &str,
    entry_value: &str,
) -> StoreResult<UpsertOutcome> {
    let Some(current) = store.get_config_document(document).await? else {
        let data = BTreeMap::from([(
            entry_key.to_string(),
            entry_value.to_string(),
        )]);
        store.create_config_document(document, data).await?;
        return Ok(UpsertOutcome::Created);
    };

    if current.data.get(entry_key).map(String::as_str) == Some(entry_value) {
        debug!(%entry_key, "entry unchanged");
        return Ok(UpsertOutcome::Unchanged);
    }

    // Without a version the patch would be unconditional.
    let Some(resource_version) = current.resource_version else {
        return Err(SccError::Conflict(format!(
            "{document} read without resourceVersion"
        )));
    };
    store
        .patch_config_entry(document, &resource_version, entry_key, entry_value)
        .await?;
    Ok(UpsertOutcome::Updated)
}
