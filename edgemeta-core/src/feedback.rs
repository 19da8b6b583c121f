use tracing::warn;

use crate::bus::MessageBus;
use crate::constants;
use crate::errors::MetaError;
use crate::message::{Content, Message, Source};

/// Builds an error message with `request` as parent and routes it back to the
/// original producer: Edged gets a sync-aware send, any other source goes out the
/// cloud send path.
pub async fn feedback_error(bus: &dyn MessageBus, err: &MetaError, request: &Message) {
    let reply = request.error_reply(err);
    route_to_producer(bus, request, reply).await;
}

/// Rewrites `resp`'s header so that `parent_id := original_id`, sends it to Edged
/// (sync-aware), and additionally sends a cloud-bound ack derived from `request`.
pub async fn feedback_response(bus: &dyn MessageBus, request: &Message, original_id: &str, mut resp: Message) {
    resp.parent_id = Some(original_id.to_string());
    route_to_producer(bus, request, resp).await;
    send_cloud_ack(bus, request, Content::success()).await;
}

/// Sends `content` to the cloud as an acknowledgement correlated to `request`.
pub async fn send_cloud_ack(bus: &dyn MessageBus, request: &Message, content: Content) {
    let ack = request.build_reply(content);
    if let Err(err) = bus.send_to_group(constants::GROUP_CLOUD, ack).await {
        warn!("feedback: failed to send cloud ack: {err}");
    }
}

async fn route_to_producer(bus: &dyn MessageBus, request: &Message, reply: Message) {
    let result = match request.source {
        Source::Edged if request.sync => bus.send_resp(reply).await,
        Source::Edged => bus.send(constants::MODULE_EDGED, reply).await,
        _ => bus.send_to_group(constants::GROUP_CLOUD, reply).await,
    };
    if let Err(err) = result {
        warn!("feedback: failed to route reply to {:?}: {err}", request.source);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_bus::InProcessBus;
    use crate::message::Operation;
    use std::time::Duration;

    #[tokio::test]
    async fn feedback_error_routes_sync_edged_via_send_resp() {
        let bus = InProcessBus::new();
        bus.register(constants::MODULE_META_MANAGER).await;
        let request = Message::new(Source::Edged, "hub", Operation::Insert, "ns1/pod/p1", Content::success())
            .with_sync(true);

        let bus_ref = &bus;
        let waiter = bus_ref.send_sync(constants::MODULE_META_MANAGER, request.clone(), Duration::from_secs(1));
        let respond = async {
            let received = bus_ref.receive(constants::MODULE_META_MANAGER).await.unwrap();
            let err = MetaError::not_connected();
            feedback_error(bus_ref, &err, &received).await;
        };

        let (reply, _) = tokio::join!(waiter, respond);
        let reply = reply.unwrap();
        assert_eq!(reply.content.as_error(), Some("not connected to cloud"));
    }

    #[tokio::test]
    async fn feedback_error_routes_non_edged_to_cloud_group() {
        let bus = InProcessBus::new();
        bus.register(constants::MODULE_CLOUD).await;
        bus.alias_group(constants::GROUP_CLOUD, constants::MODULE_CLOUD).await;
        let request = Message::new(
            Source::CloudController,
            constants::GROUP_CLOUD,
            Operation::Delete,
            "ns1/pod/p1",
            Content::success(),
        );
        let err = MetaError::store("boom");
        feedback_error(&bus, &err, &request).await;
        let received = bus.receive(constants::MODULE_CLOUD).await.unwrap();
        assert_eq!(received.content.as_error(), Some("store error: boom"));
    }

    #[tokio::test]
    async fn feedback_response_sets_parent_id_and_acks_cloud() {
        let bus = InProcessBus::new();
        bus.register(constants::MODULE_EDGED).await;
        bus.register(constants::MODULE_CLOUD).await;
        let request = Message::new(Source::Edged, "hub", Operation::Query, "ns1/secret/s1", Content::success());
        let original_id = "original-123".to_string();
        let resp = Message::new(Source::MetaManager, "hub", Operation::Response, "ns1/secret/s1", Content::success());

        feedback_response(&bus, &request, &original_id, resp).await;

        let to_edged = bus.receive(constants::MODULE_EDGED).await.unwrap();
        assert_eq!(to_edged.parent_id.as_deref(), Some(original_id.as_str()));

        let ack = bus.receive(constants::MODULE_CLOUD).await.unwrap();
        assert!(ack.content.is_success_sentinel());
    }
}
