use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::store::MetaRecord;

/// A non-authoritative consumer of every mutation, used for testing and external
/// mirrors. Fire-and-forget: duplication under races is acceptable.
#[async_trait]
pub trait ReplicationSink: Send + Sync + std::fmt::Debug {
    async fn mirror(&self, record: MetaRecord);
}

#[derive(Debug, Default)]
pub struct NoopReplicationSink;

#[async_trait]
impl ReplicationSink for NoopReplicationSink {
    async fn mirror(&self, _record: MetaRecord) {}
}

/// Records every mirrored write, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingReplicationSink {
    records: Mutex<Vec<MetaRecord>>,
}

impl RecordingReplicationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn recorded(&self) -> Vec<MetaRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl ReplicationSink for RecordingReplicationSink {
    async fn mirror(&self, record: MetaRecord) {
        self.records.lock().await.push(record);
    }
}
