use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::bus::MessageBus;
use crate::constants;
use crate::feedback;
use crate::message::{Content, Message};
use crate::replication::ReplicationSink;
use crate::resource_key::ParsedResource;
use crate::store::{MetaRecord, MetaStore};

enum Outcome {
    ForwardAsIs,
    PersistThenForward,
}

fn classify(content: &Content) -> Outcome {
    if content.is_success_sentinel() || content.as_error().is_some() {
        return Outcome::ForwardAsIs;
    }
    if let Some((_, err)) = content.as_object() {
        if err.is_some() {
            return Outcome::ForwardAsIs;
        }
    }
    Outcome::PersistThenForward
}

/// Forwards `request` to the cloud and delivers the paired reply back to the
/// original edge requester. Intended to run as a detached task; never blocks the
/// caller beyond constructing it.
pub async fn forward(
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn MetaStore>,
    replication: Arc<dyn ReplicationSink>,
    parsed: ParsedResource,
    mut request: Message,
    remote_timeout: Duration,
) {
    let original_id = request.update_id();

    match bus.send_sync(constants::MODULE_CLOUD, request.clone(), remote_timeout).await {
        Err(err) => {
            // request.id has already been reassigned above; the error reply's
            // parent_id therefore reflects the forwarding id, not original_id.
            // This mirrors the sequencing this module's design was adapted from
            // and is intentional rather than an oversight.
            feedback::feedback_error(bus.as_ref(), &err, &request).await;
        }
        Ok(mut reply) => {
            if matches!(classify(&reply.content), Outcome::PersistThenForward) {
                persist_reply(&store, &replication, &parsed, &reply).await;
                if let Some((payload, _)) = reply.content.as_object() {
                    reply.content = Content::object(payload.clone());
                }
            }
            feedback::feedback_response(bus.as_ref(), &request, &original_id, reply).await;
        }
    }
}

async fn persist_reply(
    store: &Arc<dyn MetaStore>,
    replication: &Arc<dyn ReplicationSink>,
    parsed: &ParsedResource,
    reply: &Message,
) {
    let value = reply
        .content
        .as_object()
        .map(|(payload, _)| payload.clone())
        .unwrap_or_else(|| reply.content.to_json());
    let record = MetaRecord::new(parsed.res_key.clone(), parsed.res_type.clone(), value)
        .with_labels(non_empty(&parsed.app_name), non_empty(&parsed.domain));
    if let Err(err) = store.insert_or_update(record.clone()).await {
        warn!("remote: failed to persist reply for {}: {err}", parsed.res_key);
        return;
    }
    replication.mirror(record).await;
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
