use k8s_openapi::api::core::v1::{ConfigMap, Secret};

use crate::message::Content;
use crate::resource_key::ParsedResource;

const LABEL_CONFIG_TYPE: &str = "config-type";
const LABEL_CONFIG_TYPE_NATIVE: &str = "native";
const LABEL_APP_NAME: &str = "app-name";
const LABEL_DOMAIN: &str = "domain";

/// When the key parser did not yield `appName`/`domain`, try the payload as a secret
/// then as a config-map and pull the labels out of whichever decodes.
pub fn introspect(parsed: &mut ParsedResource, content: &Content) {
    if !parsed.app_name.is_empty() && !parsed.domain.is_empty() {
        return;
    }

    let labels = content
        .decode::<Secret>()
        .ok()
        .and_then(|secret| secret.metadata.labels)
        .or_else(|| {
            content
                .decode::<ConfigMap>()
                .ok()
                .and_then(|config_map| config_map.metadata.labels)
        });

    let Some(labels) = labels else {
        return;
    };

    if labels.get(LABEL_CONFIG_TYPE).map(String::as_str) != Some(LABEL_CONFIG_TYPE_NATIVE) {
        return;
    }

    // Only appName gates whether any override happens at all; domain (and the
    // rebuilt key) are overridden independently, whenever each is non-empty.
    let app_name = labels.get(LABEL_APP_NAME).cloned().unwrap_or_default();
    if app_name.is_empty() {
        return;
    }
    parsed.app_name = app_name;

    if let Some(domain) = labels.get(LABEL_DOMAIN) {
        if !domain.is_empty() {
            parsed.domain = domain.clone();
        }
    }

    parsed.res_key = format!(
        "/{}/{}/{}/{}/{}",
        parsed.namespace, parsed.res_type, parsed.res_id, parsed.app_name, parsed.domain
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn parsed_resource() -> ParsedResource {
        ParsedResource {
            res_key: "ns1/configmap/c1".to_string(),
            res_type: "configmap".to_string(),
            res_id: "c1".to_string(),
            app_name: String::new(),
            domain: String::new(),
            namespace: "ns1".to_string(),
        }
    }

    fn native_configmap() -> ConfigMap {
        let mut labels = BTreeMap::new();
        labels.insert(LABEL_CONFIG_TYPE.to_string(), LABEL_CONFIG_TYPE_NATIVE.to_string());
        labels.insert(LABEL_APP_NAME.to_string(), "app-a".to_string());
        labels.insert(LABEL_DOMAIN.to_string(), "domain-a".to_string());
        ConfigMap {
            metadata: ObjectMeta {
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn extracts_labels_from_native_configmap_and_rebuilds_key() {
        let mut parsed = parsed_resource();
        let content = Content::object(serde_json::to_value(native_configmap()).unwrap());
        introspect(&mut parsed, &content);
        assert_eq!(parsed.app_name, "app-a");
        assert_eq!(parsed.domain, "domain-a");
        assert_eq!(parsed.res_key, "/ns1/configmap/c1/app-a/domain-a");
    }

    #[test]
    fn leaves_parsed_untouched_when_already_populated() {
        let mut parsed = parsed_resource();
        parsed.app_name = "existing".to_string();
        parsed.domain = "existing-domain".to_string();
        let content = Content::object(serde_json::to_value(native_configmap()).unwrap());
        introspect(&mut parsed, &content);
        assert_eq!(parsed.app_name, "existing");
    }

    #[test]
    fn ignores_non_native_config_type() {
        let mut parsed = parsed_resource();
        let mut cm = native_configmap();
        cm.metadata
            .labels
            .as_mut()
            .unwrap()
            .insert(LABEL_CONFIG_TYPE.to_string(), "custom".to_string());
        let content = Content::object(serde_json::to_value(cm).unwrap());
        introspect(&mut parsed, &content);
        assert_eq!(parsed.app_name, "");
    }

    #[test]
    fn overrides_app_name_alone_when_domain_label_is_absent() {
        let mut parsed = parsed_resource();
        let mut cm = native_configmap();
        cm.metadata.labels.as_mut().unwrap().remove(LABEL_DOMAIN);
        let content = Content::object(serde_json::to_value(cm).unwrap());
        introspect(&mut parsed, &content);
        assert_eq!(parsed.app_name, "app-a");
        assert_eq!(parsed.domain, "");
        assert_eq!(parsed.res_key, "/ns1/configmap/c1/app-a/");
    }

    #[test]
    fn ignores_undecodable_payload() {
        let mut parsed = parsed_resource();
        let content = Content::Text("not an object".to_string());
        introspect(&mut parsed, &content);
        assert_eq!(parsed.app_name, "");
    }
}
