use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants;
use crate::prelude::Result;

/// A persisted snapshot of one orchestration resource at the edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetaRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub res_type: String,
    pub app_name: Option<String>,
    pub domain: Option<String>,
    pub value: Value,
}

impl MetaRecord {
    pub fn new(key: impl Into<String>, res_type: impl Into<String>, value: Value) -> Self {
        Self {
            key: key.into(),
            res_type: res_type.into(),
            app_name: None,
            domain: None,
            value,
        }
    }

    pub fn with_labels(mut self, app_name: Option<String>, domain: Option<String>) -> Self {
        self.app_name = app_name;
        self.domain = domain;
        self
    }
}

/// AND-filter used by `query_metas_by_group_cond`.
#[derive(Debug, Clone, Default)]
pub struct GroupCondition {
    pub res_type: String,
    pub app_name: Option<String>,
    pub domain: Option<String>,
}

/// Contract with the durable key/value store. The core treats each call as atomic;
/// external synchronization is the store's responsibility.
#[async_trait]
pub trait MetaStore: Send + Sync + std::fmt::Debug {
    async fn insert_or_update(&self, record: MetaRecord) -> Result<()>;
    async fn delete_meta_by_key(&self, key: &str) -> Result<()>;
    async fn query_meta(&self, field: &str, value: &str) -> Result<Vec<MetaRecord>>;
    async fn query_metas_by_group_cond(&self, cond: &GroupCondition) -> Result<Vec<MetaRecord>>;
}

/// Replacing the middle separator turns a pod key into its companion podpatch key.
/// Returns `None` if the key does not contain a `/pod/` segment.
pub fn podpatch_key(pod_key: &str) -> Option<String> {
    if !pod_key.contains("/pod/") {
        return None;
    }
    Some(pod_key.replacen("/pod/", &format!("/{}/", constants::TYPE_POD_PATCH), 1))
}

fn pod_uid(record: &MetaRecord) -> Option<String> {
    serde_json::from_value::<Pod>(record.value.clone())
        .ok()
        .and_then(|pod| pod.metadata.uid)
}

fn message_pod_uid(content: &Value) -> Option<String> {
    serde_json::from_value::<Pod>(content.clone())
        .ok()
        .and_then(|pod| pod.metadata.uid)
}

/// Pod-delete guard (owned by the core, not the store): fetch the stored pod; if
/// absent, or if its UID differs from the message's pod UID, treat the delete as a
/// no-op success. Otherwise delete the pod record and its companion podpatch record.
/// Returns whether the delete actually proceeded.
pub async fn guarded_pod_delete(store: &dyn MetaStore, key: &str, incoming_pod: &Value) -> Result<bool> {
    let stored = store.query_meta("key", key).await?;
    let Some(existing) = stored.into_iter().next() else {
        return Ok(false);
    };

    let (Some(stored_uid), Some(incoming_uid)) = (pod_uid(&existing), message_pod_uid(incoming_pod)) else {
        return Ok(false);
    };

    if stored_uid != incoming_uid {
        return Ok(false);
    }

    store.delete_meta_by_key(key).await?;
    if let Some(companion) = podpatch_key(key) {
        store.delete_meta_by_key(&companion).await?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn podpatch_key_replaces_middle_separator() {
        assert_eq!(
            podpatch_key("ns1/pod/p1").as_deref(),
            Some("ns1/podpatch/p1")
        );
    }

    #[test]
    fn podpatch_key_is_none_without_pod_segment() {
        assert_eq!(podpatch_key("ns1/secret/s1"), None);
    }
}
