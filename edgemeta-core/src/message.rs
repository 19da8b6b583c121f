use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::constants;
use crate::errors::MetaError;
use crate::prelude::Result;

/// The operations recognized on the bus. Unknown wire verbs are logged and dropped
/// by the caller before a `Message` is even constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Patch,
    Delete,
    Query,
    Response,
    VolumeCreate,
    VolumeDelete,
    VolumePublish,
    VolumeUnpublish,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Patch => "patch",
            Operation::Delete => "delete",
            Operation::Query => "query",
            Operation::Response => "response",
            Operation::VolumeCreate => "volumecreate",
            Operation::VolumeDelete => "volumedelete",
            Operation::VolumePublish => "volumepublish",
            Operation::VolumeUnpublish => "volumeunpublish",
        }
    }

    pub fn is_volume(self) -> bool {
        matches!(
            self,
            Operation::VolumeCreate
                | Operation::VolumeDelete
                | Operation::VolumePublish
                | Operation::VolumeUnpublish
        )
    }
}

impl std::str::FromStr for Operation {
    type Err = MetaError;

    fn from_str(value: &str) -> Result<Self> {
        Ok(match value {
            "insert" => Operation::Insert,
            "update" => Operation::Update,
            "patch" => Operation::Patch,
            "delete" => Operation::Delete,
            "query" => Operation::Query,
            "response" => Operation::Response,
            "volumecreate" => Operation::VolumeCreate,
            "volumedelete" => Operation::VolumeDelete,
            "volumepublish" => Operation::VolumePublish,
            "volumeunpublish" => Operation::VolumeUnpublish,
            other => return Err(MetaError::unsupported(format!("unknown operation {other}"))),
        })
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The logical producer of a message. Module identifiers are fixed opaque strings;
/// this enum gives the dispatcher something to match on instead of comparing strings
/// at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    Edged,
    Appsd,
    EdgeController,
    DeviceController,
    PolicyController,
    DynamicController,
    CloudController,
    MetaManager,
    Other(String),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::Edged => constants::MODULE_EDGED,
            Source::Appsd => constants::MODULE_APPSD,
            Source::EdgeController => constants::MODULE_EDGE_CONTROLLER,
            Source::DeviceController => constants::MODULE_DEVICE_CONTROLLER,
            Source::PolicyController => constants::MODULE_POLICY_CONTROLLER,
            Source::DynamicController => constants::MODULE_DYNAMIC_CONTROLLER,
            Source::CloudController => constants::MODULE_CLOUD_CONTROLLER,
            Source::MetaManager => constants::MODULE_META_MANAGER,
            Source::Other(name) => name.as_str(),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        match value {
            v if v == constants::MODULE_EDGED => Source::Edged,
            v if v == constants::MODULE_APPSD => Source::Appsd,
            v if v == constants::MODULE_EDGE_CONTROLLER => Source::EdgeController,
            v if v == constants::MODULE_DEVICE_CONTROLLER => Source::DeviceController,
            v if v == constants::MODULE_POLICY_CONTROLLER => Source::PolicyController,
            v if v == constants::MODULE_DYNAMIC_CONTROLLER => Source::DynamicController,
            v if v == constants::MODULE_CLOUD_CONTROLLER => Source::CloudController,
            v if v == constants::MODULE_META_MANAGER => Source::MetaManager,
            other => Source::Other(other.to_string()),
        }
    }
}

/// Polymorphic message content: bytes, a plain string, an error, or an `{Object, Err}`
/// map as sent back by the cloud side.
#[derive(Debug, Clone)]
pub enum Content {
    Bytes(Vec<u8>),
    Text(String),
    Err(String),
    Object { payload: Value, err: Option<String> },
}

impl Content {
    pub fn success() -> Self {
        Content::Text(constants::SUCCESS_SENTINEL.to_string())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Content::Err(message.into())
    }

    pub fn object(payload: Value) -> Self {
        Content::Object { payload, err: None }
    }

    pub fn is_success_sentinel(&self) -> bool {
        matches!(self, Content::Text(text) if text == constants::SUCCESS_SENTINEL)
    }

    pub fn as_error(&self) -> Option<&str> {
        match self {
            Content::Err(message) => Some(message.as_str()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<(&Value, Option<&str>)> {
        match self {
            Content::Object { payload, err } => Some((payload, err.as_deref())),
            _ => None,
        }
    }

    /// Best-effort conversion to a JSON value, used when persisting a record
    /// or mirroring into the replication sink.
    pub fn to_json(&self) -> Value {
        match self {
            Content::Bytes(bytes) => serde_json::from_slice(bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
            Content::Text(text) => Value::String(text.clone()),
            Content::Err(message) => serde_json::json!({ "error": message }),
            Content::Object { payload, .. } => payload.clone(),
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Content::Bytes(bytes) => Ok(serde_json::from_slice(bytes)?),
            Content::Text(text) => Ok(serde_json::from_str(text)?),
            Content::Object { payload, .. } => Ok(serde_json::from_value(payload.clone())?),
            Content::Err(message) => Err(MetaError::malformed_resource(format!(
                "cannot decode error content: {message}"
            ))),
        }
    }
}

/// Wire unit on the in-process bus.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub parent_id: Option<String>,
    pub timestamp: i64,
    pub source: Source,
    pub group: String,
    pub operation: Operation,
    pub resource: String,
    pub content: Content,
    pub sync: bool,
}

impl Message {
    pub fn new(
        source: Source,
        group: impl Into<String>,
        operation: Operation,
        resource: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            timestamp: now_millis(),
            source,
            group: group.into(),
            operation,
            resource: resource.into(),
            content,
            sync: false,
        }
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Assigns a fresh id, returning the one being replaced. Used by the remote
    /// dispatcher before forwarding: the caller-facing id must not leak to the cloud.
    pub fn update_id(&mut self) -> String {
        std::mem::replace(&mut self.id, Uuid::new_v4().to_string())
    }

    /// Builds a reply whose `parent_id` correlates back to this message.
    pub fn build_reply(&self, content: Content) -> Message {
        Message {
            id: Uuid::new_v4().to_string(),
            parent_id: Some(self.id.clone()),
            timestamp: now_millis(),
            source: Source::MetaManager,
            group: self.group.clone(),
            operation: Operation::Response,
            resource: self.resource.clone(),
            content,
            sync: self.sync,
        }
    }

    pub fn error_reply(&self, err: impl std::fmt::Display) -> Message {
        self.build_reply(Content::error(err.to_string()))
    }

    pub fn success_reply(&self) -> Message {
        self.build_reply(Content::success())
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
