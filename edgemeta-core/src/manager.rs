use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::bus::MessageBus;
use crate::connectivity::ConnectivityProbe;
use crate::constants;
use crate::errors::MetaError;
use crate::feedback;
use crate::introspect;
use crate::message::{Content, Message, Operation, Source};
use crate::prelude::Result;
use crate::remote;
use crate::replication::ReplicationSink;
use crate::resource_key::{self, ParsedResource};
use crate::store::{self, MetaStore};

/// Timeout knobs the dispatcher needs; everything else about a deployment's
/// collaborators is injected as trait objects.
#[derive(Debug, Clone, Copy)]
pub struct ManagerConfig {
    pub remote_timeout: Duration,
    pub csi_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(10),
            csi_timeout: Duration::from_secs(45),
        }
    }
}

/// The edge-side metadata manager: main loop (4.F) plus operation dispatcher (4.E).
#[derive(Clone)]
pub struct MetaManager {
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn MetaStore>,
    connectivity: Arc<dyn ConnectivityProbe>,
    replication: Arc<dyn ReplicationSink>,
    config: ManagerConfig,
}

impl MetaManager {
    pub fn new(
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn MetaStore>,
        connectivity: Arc<dyn ConnectivityProbe>,
        replication: Arc<dyn ReplicationSink>,
        config: ManagerConfig,
    ) -> Self {
        Self {
            bus,
            store,
            connectivity,
            replication,
            config,
        }
    }

    /// Pulls messages one at a time from the bus until `shutdown` fires. Each
    /// message is awaited directly (not spawned) so messages from a single source
    /// are processed in receive order.
    pub async fn run(&self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("metamanager: shutdown signal received, exiting main loop");
                    break;
                }
                received = self.bus.receive(constants::MODULE_META_MANAGER) => {
                    match received {
                        Ok(message) => self.process(message).await,
                        Err(err) => warn!("metamanager: receive error: {err}"),
                    }
                }
            }
        }
    }

    /// Normalizes and routes a single message per the operation x source table.
    pub async fn process(&self, message: Message) {
        if let Err(err) = self.dispatch(message.clone()).await {
            feedback::feedback_error(self.bus.as_ref(), &err, &message).await;
        }
    }

    async fn dispatch(&self, message: Message) -> Result<()> {
        // Appsd queries use their own 4-6 segment grammar (4.A's separate parser
        // variant); component A's parser would reject them as malformed.
        if message.operation == Operation::Query && message.source == Source::Appsd {
            return self.handle_query(message, ParsedResource::default()).await;
        }

        let parsed = self.normalize(&message);
        if parsed.res_type.is_empty() {
            // parse_resource only leaves res_type empty on malformed/unsupported
            // arity (or a failed serviceaccounttoken decode); both are dropped.
            info!("metamanager: dropping message with unparseable resource {}", message.resource);
            return Ok(());
        }

        match message.operation {
            Operation::Insert => self.handle_insert(message, parsed).await,
            Operation::Update => self.handle_update(message, parsed).await,
            Operation::Patch => self.handle_patch(message, parsed).await,
            Operation::Delete => self.handle_delete(message, parsed).await,
            Operation::Query => self.handle_query(message, parsed).await,
            Operation::Response => self.handle_response(message, parsed).await,
            Operation::VolumeCreate
            | Operation::VolumeDelete
            | Operation::VolumePublish
            | Operation::VolumeUnpublish => self.handle_volume(message).await,
        }
    }

    fn normalize(&self, message: &Message) -> ParsedResource {
        let mut parsed = resource_key::parse_resource(message);
        if parsed.app_name.is_empty() || parsed.domain.is_empty() {
            introspect::introspect(&mut parsed, &message.content);
        }
        parsed
    }

    async fn handle_insert(&self, message: Message, parsed: ParsedResource) -> Result<()> {
        match message.source {
            Source::Edged => {
                if !self.connectivity.is_connected().await {
                    feedback::feedback_error(self.bus.as_ref(), &MetaError::not_connected(), &message).await;
                    return Ok(());
                }
                self.spawn_remote_forward(parsed, message);
            }
            Source::DeviceController => {
                self.persist(&parsed, &message.content).await?;
                self.relay_device_twin(&message).await;
            }
            Source::PolicyController => {
                self.persist(&parsed, &message.content).await?;
            }
            _ => {
                self.persist(&parsed, &message.content).await?;
                // Forwarded as-is (not a reply) so Edged sees the original Insert and
                // can apply it locally; explicitly async regardless of message.sync.
                self.send_async(constants::MODULE_EDGED, message.clone()).await;
                self.ack_cloud(&message).await;
            }
        }
        Ok(())
    }

    async fn handle_update(&self, message: Message, parsed: ParsedResource) -> Result<()> {
        let is_lease = parsed.res_type == constants::TYPE_LEASE;
        match message.source {
            Source::Edged if is_lease => {
                if !self.connectivity.is_connected().await {
                    feedback::feedback_error(self.bus.as_ref(), &MetaError::not_connected(), &message).await;
                } else {
                    self.spawn_remote_forward(parsed, message);
                }
            }
            Source::Edged => {
                self.persist(&parsed, &message.content).await?;
                self.forward_to_cloud(&message).await;
                self.send_to_edged(&message, message.success_reply()).await;
            }
            Source::EdgeController | Source::DynamicController => {
                self.persist(&parsed, &message.content).await?;
                // Forwarded as-is so Edged sees the original Update, not a reply.
                self.send_to_edged(&message, message.clone()).await;
                self.ack_cloud(&message).await;
            }
            Source::DeviceController => {
                self.persist(&parsed, &message.content).await?;
                self.ack_cloud(&message).await;
                self.relay_device_twin(&message).await;
            }
            Source::PolicyController => {
                self.persist(&parsed, &message.content).await?;
                self.ack_cloud(&message).await;
            }
            _ => {
                self.persist(&parsed, &message.content).await?;
                self.ack_cloud(&message).await;
            }
        }
        Ok(())
    }

    async fn handle_patch(&self, message: Message, parsed: ParsedResource) -> Result<()> {
        self.persist(&parsed, &message.content).await?;
        self.forward_to_cloud(&message).await;
        Ok(())
    }

    async fn handle_delete(&self, message: Message, parsed: ParsedResource) -> Result<()> {
        if parsed.res_type == constants::TYPE_POD && message.source == Source::Edged {
            // The cloud is expected to echo back a delete that drives local
            // cleanup; deleting here too would race that echo. Preserved as-is.
            self.forward_to_cloud(&message).await;
            return Ok(());
        }

        if parsed.res_type == constants::TYPE_POD {
            store::guarded_pod_delete(self.store.as_ref(), &parsed.res_key, &message.content.to_json()).await?;
        } else {
            self.store.delete_meta_by_key(&parsed.res_key).await?;
        }

        if message.source != Source::PolicyController {
            // Forwarded as-is so Edged sees the original Delete, not a reply.
            self.send_to_edged(&message, message.clone()).await;
        }
        self.ack_cloud(&message).await;
        if message.source == Source::DeviceController {
            self.relay_device_twin(&message).await;
        }
        Ok(())
    }

    async fn handle_query(&self, message: Message, parsed: ParsedResource) -> Result<()> {
        let connected = self.connectivity.is_connected().await;

        if message.source == Source::Appsd {
            return self.handle_appsd_query(message, connected).await;
        }

        let remote_eligible = constants::is_remote_eligible(&parsed.res_type);
        if remote_eligible && connected {
            self.spawn_remote_forward(parsed, message);
            return Ok(());
        }

        let records = if parsed.res_id.is_empty() {
            self.store.query_meta("type", &parsed.res_type).await?
        } else {
            self.store.query_meta("key", &parsed.res_key).await?
        };
        let reply = message.build_reply(Content::object(serde_json::to_value(&records)?));
        self.send_to_edged(&message, reply).await;
        Ok(())
    }

    /// Appsd queries use the 4.A Appsd parser variant and always reply to Appsd,
    /// never to Edged.
    async fn handle_appsd_query(&self, message: Message, connected: bool) -> Result<()> {
        let appsd = resource_key::parse_resource_from_appsd(&message.resource);
        if appsd.res_type.is_empty() {
            info!("metamanager: dropping malformed appsd query resource {}", message.resource);
            return Ok(());
        }

        let records = if constants::is_remote_eligible(&appsd.res_type) && connected {
            let cond = store::GroupCondition {
                res_type: appsd.res_type.clone(),
                app_name: non_empty(&appsd.app_name),
                domain: non_empty(&appsd.domain),
            };
            self.store.query_metas_by_group_cond(&cond).await?
        } else {
            self.store.query_meta("type", &appsd.res_type).await?
        };
        let reply = message.build_reply(Content::object(serde_json::to_value(&records)?));
        self.send_async(constants::MODULE_APPSD, reply).await;
        Ok(())
    }

    async fn handle_response(&self, message: Message, parsed: ParsedResource) -> Result<()> {
        self.persist(&parsed, &message.content).await?;
        match message.source {
            Source::CloudController => {
                // Forwarded as-is so Edged sees the original Response, not a reply
                // wrapping a reply.
                self.send_to_edged(&message, message.clone()).await;
            }
            _ => {
                self.forward_to_cloud(&message).await;
            }
        }
        Ok(())
    }

    async fn handle_volume(&self, message: Message) -> Result<()> {
        // Direct, non-spawned await bounded by csi_timeout: this keeps the "reply
        // to Cloud only after Edged returns" ordering contract without needing a
        // detached task.
        let mut forwarded = message.clone();
        forwarded.update_id();
        let content = match self
            .bus
            .send_sync(constants::MODULE_EDGED, forwarded, self.config.csi_timeout)
            .await
        {
            Ok(reply) => reply.content,
            Err(err) => Content::error(err.to_string()),
        };
        let ack = message.build_reply(content);
        if let Err(err) = self.bus.send_to_group(constants::GROUP_CLOUD, ack).await {
            warn!("metamanager: failed to ack volume op to cloud: {err}");
        }
        Ok(())
    }

    async fn persist(&self, parsed: &ParsedResource, content: &Content) -> Result<()> {
        let record = store::MetaRecord::new(parsed.res_key.clone(), parsed.res_type.clone(), content.to_json())
            .with_labels(non_empty(&parsed.app_name), non_empty(&parsed.domain));
        self.store.insert_or_update(record.clone()).await?;
        self.replication.mirror(record).await;
        Ok(())
    }

    fn spawn_remote_forward(&self, parsed: ParsedResource, message: Message) {
        let bus = self.bus.clone();
        let store = self.store.clone();
        let replication = self.replication.clone();
        let remote_timeout = self.config.remote_timeout;
        tokio::spawn(async move {
            remote::forward(bus, store, replication, parsed, message, remote_timeout).await;
        });
    }

    async fn relay_device_twin(&self, message: &Message) {
        if let Err(err) = self.bus.send(constants::MODULE_DEVICE_TWIN, message.clone()).await {
            warn!("metamanager: failed to relay to device twin: {err}");
        }
    }

    async fn forward_to_cloud(&self, message: &Message) {
        let mut forwarded = message.clone();
        forwarded.update_id();
        if let Err(err) = self.bus.send_to_group(constants::GROUP_CLOUD, forwarded).await {
            warn!("metamanager: failed to forward to cloud: {err}");
        }
    }

    async fn ack_cloud(&self, message: &Message) {
        feedback::send_cloud_ack(self.bus.as_ref(), message, Content::success()).await;
    }

    /// `→Edged uses sync iff message.sync, else async` as the default routing rule.
    async fn send_to_edged(&self, message: &Message, reply: Message) {
        let result = if message.sync {
            self.bus.send_resp(reply).await
        } else {
            self.bus.send(constants::MODULE_EDGED, reply).await
        };
        if let Err(err) = result {
            warn!("metamanager: failed to send reply to edged: {err}");
        }
    }

    async fn send_async(&self, module: &str, message: Message) {
        if let Err(err) = self.bus.send(module, message).await {
            warn!("metamanager: failed to send to {module}: {err}");
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
