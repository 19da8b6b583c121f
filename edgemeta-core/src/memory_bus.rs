use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use crate::bus::MessageBus;
use crate::errors::MetaError;
use crate::message::Message;
use crate::prelude::Result;

/// Concrete, single-process `MessageBus`. Each registered module owns an unbounded
/// channel; `send_sync` correlates replies by stashing a oneshot sender keyed by the
/// outgoing message's id, which the callee is expected to echo back as `parent_id`
/// when it eventually calls `send_resp`.
#[derive(Debug, Default)]
pub struct InProcessBus {
    senders: Mutex<HashMap<String, UnboundedSender<Message>>>,
    receivers: Mutex<HashMap<String, UnboundedReceiver<Message>>>,
    pending: Mutex<HashMap<String, oneshot::Sender<Message>>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a module's inbox, returning any previous sender's module is
    /// replaced. Call once per module at composition time.
    pub async fn register(&self, module: impl Into<String>) {
        let module = module.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().await.insert(module.clone(), tx);
        self.receivers.lock().await.insert(module, rx);
    }

    /// Registers `group` as an additional alias for an already-registered module's
    /// inbox, so `send_to_group` can reach it.
    pub async fn alias_group(&self, group: impl Into<String>, module: &str) {
        let group = group.into();
        if let Some(sender) = self.senders.lock().await.get(module).cloned() {
            self.senders.lock().await.insert(group, sender);
        }
    }
}

#[async_trait]
impl MessageBus for InProcessBus {
    async fn send(&self, module: &str, message: Message) -> Result<()> {
        let senders = self.senders.lock().await;
        let sender = senders
            .get(module)
            .ok_or_else(|| MetaError::bus(format!("module {module} is not registered")))?;
        sender
            .send(message)
            .map_err(|_| MetaError::bus(format!("module {module} channel is closed")))
    }

    async fn send_to_group(&self, group: &str, message: Message) -> Result<()> {
        self.send(group, message).await
    }

    async fn send_sync(&self, module: &str, message: Message, timeout: Duration) -> Result<Message> {
        let correlation_id = message.id.clone();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(correlation_id.clone(), tx);

        if let Err(err) = self.send(module, message).await {
            self.pending.lock().await.remove(&correlation_id);
            return Err(err);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&correlation_id);
                Err(MetaError::bus(format!("reply channel for {correlation_id} dropped")))
            }
            Err(_) => {
                self.pending.lock().await.remove(&correlation_id);
                Err(MetaError::timeout(timeout))
            }
        }
    }

    async fn send_resp(&self, message: Message) -> Result<()> {
        let Some(parent_id) = message.parent_id.clone() else {
            return Err(MetaError::bus("response has no parent_id to correlate against"));
        };
        let waiter = self.pending.lock().await.remove(&parent_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(message);
                Ok(())
            }
            None => {
                debug!("send_resp: no pending sync call for parent_id {parent_id}, dropping");
                Ok(())
            }
        }
    }

    async fn receive(&self, module: &str) -> Result<Message> {
        let mut receivers = self.receivers.lock().await;
        let receiver = receivers
            .get_mut(module)
            .ok_or_else(|| MetaError::bus(format!("module {module} is not registered")))?;
        receiver
            .recv()
            .await
            .ok_or_else(|| MetaError::bus(format!("module {module} channel closed")))
    }

    async fn done(&self, module: &str) {
        self.senders.lock().await.remove(module);
        self.receivers.lock().await.remove(module);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants;
    use crate::message::{Content, Operation, Source};

    #[tokio::test]
    async fn send_then_receive_round_trips_a_message() {
        let bus = InProcessBus::new();
        bus.register(constants::MODULE_EDGED).await;
        let message = Message::new(Source::MetaManager, "hub", Operation::Response, "ns1/pod/p1", Content::success());
        bus.send(constants::MODULE_EDGED, message.clone()).await.unwrap();
        let received = bus.receive(constants::MODULE_EDGED).await.unwrap();
        assert_eq!(received.id, message.id);
    }

    #[tokio::test]
    async fn send_sync_resolves_when_send_resp_echoes_parent_id() {
        let bus = InProcessBus::new();
        bus.register(constants::MODULE_CLOUD).await;

        let request = Message::new(Source::Edged, "hub", Operation::Query, "ns1/secret/s1", Content::success());
        let request_id = request.id.clone();

        let bus_clone: &InProcessBus = &bus;
        let responder = async {
            let received = bus_clone.receive(constants::MODULE_CLOUD).await.unwrap();
            let mut reply = received.build_reply(Content::success());
            reply.parent_id = Some(request_id.clone());
            bus_clone.send_resp(reply).await.unwrap();
        };

        let caller = bus.send_sync(constants::MODULE_CLOUD, request, Duration::from_secs(1));

        let (_, reply) = tokio::join!(responder, caller);
        assert!(reply.unwrap().content.is_success_sentinel());
    }

    #[tokio::test]
    async fn send_sync_times_out_without_a_reply() {
        let bus = InProcessBus::new();
        bus.register(constants::MODULE_CLOUD).await;
        let request = Message::new(Source::Edged, "hub", Operation::Query, "ns1/secret/s1", Content::success());
        let result = bus
            .send_sync(constants::MODULE_CLOUD, request, Duration::from_millis(20))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn send_to_unregistered_module_errors() {
        let bus = InProcessBus::new();
        let message = Message::new(Source::Edged, "hub", Operation::Query, "ns1/secret/s1", Content::success());
        assert!(bus.send("nowhere", message).await.is_err());
    }
}
