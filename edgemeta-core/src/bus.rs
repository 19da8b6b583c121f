use std::time::Duration;

use async_trait::async_trait;

use crate::message::Message;
use crate::prelude::Result;

/// The in-process message broker. Sends are non-blocking for asynchronous targets
/// and block the caller for synchronous ones.
#[async_trait]
pub trait MessageBus: Send + Sync + std::fmt::Debug {
    /// Fire-and-forget send to a single named module.
    async fn send(&self, module: &str, message: Message) -> Result<()>;

    /// Fire-and-forget send to every subscriber of a routing group.
    async fn send_to_group(&self, group: &str, message: Message) -> Result<()>;

    /// Send to a module and block until a correlated reply arrives via `send_resp`,
    /// or `timeout` elapses.
    async fn send_sync(&self, module: &str, message: Message, timeout: Duration) -> Result<Message>;

    /// Deliver a reply to whichever `send_sync` call is waiting on `message.parent_id`.
    async fn send_resp(&self, message: Message) -> Result<()>;

    /// Pop the next message addressed to `module`.
    async fn receive(&self, module: &str) -> Result<Message>;

    /// Close a module's channel; any future `receive` for it fails.
    async fn done(&self, module: &str);
}
