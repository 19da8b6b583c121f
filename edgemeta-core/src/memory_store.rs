use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::prelude::Result;
use crate::store::{GroupCondition, MetaRecord, MetaStore};

/// `MetaStore` backed by a `Mutex<HashMap<...>>`. Used for tests and single-node
/// operation where durability is delegated to an external snapshot mechanism.
#[derive(Debug, Default)]
pub struct InMemoryMetaStore {
    records: Mutex<HashMap<String, MetaRecord>>,
}

impl InMemoryMetaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MetaStore for InMemoryMetaStore {
    async fn insert_or_update(&self, record: MetaRecord) -> Result<()> {
        self.records.lock().await.insert(record.key.clone(), record);
        Ok(())
    }

    async fn delete_meta_by_key(&self, key: &str) -> Result<()> {
        self.records.lock().await.remove(key);
        Ok(())
    }

    async fn query_meta(&self, field: &str, value: &str) -> Result<Vec<MetaRecord>> {
        let records = self.records.lock().await;
        let matches = match field {
            "key" => records.get(value).cloned().into_iter().collect(),
            "type" => records
                .values()
                .filter(|record| record.res_type == value)
                .cloned()
                .collect(),
            other => {
                return Err(crate::errors::MetaError::store(format!(
                    "unsupported query field {other}"
                )))
            }
        };
        Ok(matches)
    }

    async fn query_metas_by_group_cond(&self, cond: &GroupCondition) -> Result<Vec<MetaRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .values()
            .filter(|record| record.res_type == cond.res_type)
            .filter(|record| {
                cond.app_name
                    .as_deref()
                    .is_none_or(|app_name| record.app_name.as_deref() == Some(app_name))
            })
            .filter(|record| {
                cond.domain
                    .as_deref()
                    .is_none_or(|domain| record.domain.as_deref() == Some(domain))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_or_update_is_an_upsert_by_key() {
        let store = InMemoryMetaStore::new();
        store
            .insert_or_update(MetaRecord::new("ns1/pod/p1", "pod", json!({"v": 1})))
            .await
            .unwrap();
        store
            .insert_or_update(MetaRecord::new("ns1/pod/p1", "pod", json!({"v": 2})))
            .await
            .unwrap();
        let found = store.query_meta("key", "ns1/pod/p1").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, json!({"v": 2}));
    }

    #[tokio::test]
    async fn query_by_type_returns_all_matches() {
        let store = InMemoryMetaStore::new();
        store
            .insert_or_update(MetaRecord::new("ns1/pod/p1", "pod", json!({})))
            .await
            .unwrap();
        store
            .insert_or_update(MetaRecord::new("ns1/pod/p2", "pod", json!({})))
            .await
            .unwrap();
        store
            .insert_or_update(MetaRecord::new("ns1/secret/s1", "secret", json!({})))
            .await
            .unwrap();
        let found = store.query_meta("type", "pod").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn group_cond_and_filters_app_name_and_domain() {
        let store = InMemoryMetaStore::new();
        store
            .insert_or_update(
                MetaRecord::new("ns1/configmap/c1", "configmap", json!({}))
                    .with_labels(Some("a".to_string()), Some("d".to_string())),
            )
            .await
            .unwrap();
        store
            .insert_or_update(
                MetaRecord::new("ns1/configmap/c2", "configmap", json!({}))
                    .with_labels(Some("b".to_string()), Some("d".to_string())),
            )
            .await
            .unwrap();
        let cond = GroupCondition {
            res_type: "configmap".to_string(),
            app_name: Some("a".to_string()),
            domain: Some("d".to_string()),
        };
        let found = store.query_metas_by_group_cond(&cond).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, "ns1/configmap/c1");
    }

    #[tokio::test]
    async fn delete_meta_by_key_is_idempotent() {
        let store = InMemoryMetaStore::new();
        store.delete_meta_by_key("missing").await.unwrap();
        store
            .insert_or_update(MetaRecord::new("ns1/pod/p1", "pod", json!({})))
            .await
            .unwrap();
        store.delete_meta_by_key("ns1/pod/p1").await.unwrap();
        store.delete_meta_by_key("ns1/pod/p1").await.unwrap();
        assert!(store.query_meta("key", "ns1/pod/p1").await.unwrap().is_empty());
    }
}
