//! Fixed, opaque module identifiers and type names referenced by source-based routing.

pub const SUCCESS_SENTINEL: &str = "OK";

pub const MODULE_EDGED: &str = "edged";
pub const MODULE_APPSD: &str = "appsd";
pub const MODULE_META_MANAGER: &str = "metaManager";
pub const MODULE_DEVICE_TWIN: &str = "twin";
pub const MODULE_EDGE_CONTROLLER: &str = "edgecontroller";
pub const MODULE_DEVICE_CONTROLLER: &str = "devicecontroller";
pub const MODULE_POLICY_CONTROLLER: &str = "policycontroller";
pub const MODULE_DYNAMIC_CONTROLLER: &str = "dynamiccontroller";
pub const MODULE_CLOUD_CONTROLLER: &str = "cloudcontroller";

/// The cloud-bound send module and the group used for `send_to_group`.
pub const MODULE_CLOUD: &str = "cloudhub";
pub const GROUP_CLOUD: &str = "hub";

pub const TYPE_POD: &str = "pod";
pub const TYPE_POD_PATCH: &str = "podpatch";
pub const TYPE_LEASE: &str = "lease";
pub const TYPE_SECRET: &str = "secret";
pub const TYPE_CONFIGMAP: &str = "configmap";
pub const TYPE_SERVICE_ACCOUNT_TOKEN: &str = "serviceaccounttoken";

pub const REMOTE_ELIGIBLE_TYPES: &[&str] = &[
    "configmap",
    "secret",
    "persistentvolume",
    "persistentvolumeclaim",
    "volumeattachment",
    "node",
    "serviceaccounttoken",
    "lease",
];

pub fn is_remote_eligible(resource_type: &str) -> bool {
    REMOTE_ELIGIBLE_TYPES.contains(&resource_type)
}
