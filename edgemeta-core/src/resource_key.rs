use k8s_openapi::api::authentication::v1::TokenRequest;

use crate::constants;
use crate::message::Message;

/// Output of parsing a `Message`'s resource path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedResource {
    pub res_key: String,
    pub res_type: String,
    pub res_id: String,
    pub app_name: String,
    pub domain: String,
    /// Not part of the returned tuple but needed to rebuild the synthetic key in
    /// the object introspector (4.B); this is the leading path segment.
    pub namespace: String,
}

impl ParsedResource {
    fn empty(resource: &str) -> Self {
        Self {
            res_key: resource.to_string(),
            ..Default::default()
        }
    }
}

/// Decode the slash-delimited resource path into `(key, type, id, appName, domain)`.
/// The segment count selects the arity; see the grammar table this mirrors.
pub fn parse_resource(message: &Message) -> ParsedResource {
    let tokens: Vec<&str> = message.resource.split('/').collect();
    let namespace = tokens.first().copied().unwrap_or_default().to_string();

    let mut parsed = match tokens.len() {
        2 => ParsedResource {
            res_key: message.resource.clone(),
            res_type: tokens[1].to_string(),
            namespace: namespace.clone(),
            ..Default::default()
        },
        3 => ParsedResource {
            res_key: message.resource.clone(),
            res_type: tokens[1].to_string(),
            res_id: tokens[2].to_string(),
            namespace: namespace.clone(),
            ..Default::default()
        },
        4 => ParsedResource {
            res_key: message.resource.clone(),
            res_type: tokens[1].to_string(),
            res_id: tokens[2].to_string(),
            app_name: tokens[3].to_string(),
            namespace: namespace.clone(),
            ..Default::default()
        },
        5 => ParsedResource {
            res_key: message.resource.clone(),
            res_type: tokens[1].to_string(),
            res_id: tokens[2].to_string(),
            app_name: tokens[3].to_string(),
            domain: tokens[4].to_string(),
            namespace: namespace.clone(),
        },
        _ => return ParsedResource::empty(&message.resource),
    };

    if parsed.res_type == constants::TYPE_SERVICE_ACCOUNT_TOKEN {
        return match parse_service_account_token(message, &tokens) {
            Some(res_key) => ParsedResource {
                res_key,
                res_type: constants::TYPE_SERVICE_ACCOUNT_TOKEN.to_string(),
                res_id: String::new(),
                app_name: String::new(),
                domain: String::new(),
                namespace,
            },
            None => ParsedResource::empty(&message.resource),
        };
    }

    // The type slot is always tokens[1] regardless of arity; keep it that way so
    // a 2-segment path's type lands in the same slot a 5-segment path's does.
    parsed.res_type = tokens.get(1).copied().unwrap_or_default().to_string();
    parsed
}

fn parse_service_account_token(message: &Message, tokens: &[&str]) -> Option<String> {
    if tokens.len() < 3 {
        return None;
    }
    let _token_request: TokenRequest = message.content.decode().ok()?;
    Some(key_func(tokens[2], tokens[0]))
}

fn key_func(id: &str, namespace: &str) -> String {
    format!("{namespace}/{}/{id}", constants::TYPE_SERVICE_ACCOUNT_TOKEN)
}

/// Output of parsing a resource path originating from the application-side daemon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppsdResource {
    pub resource: String,
    pub namespace: String,
    pub res_type: String,
    pub app_name: String,
    pub domain: String,
}

/// Appsd resources carry a 2-segment node/namespace prefix followed by the same
/// `type[, id[, appName[, domain]]]` tail used by `parse_resource`, for a total of
/// 4-6 segments.
pub fn parse_resource_from_appsd(resource: &str) -> AppsdResource {
    let tokens: Vec<&str> = resource.split('/').collect();
    if tokens.len() < 4 || tokens.len() > 6 {
        return AppsdResource::default();
    }
    let tail = &tokens[2..];
    AppsdResource {
        resource: resource.to_string(),
        namespace: tokens.get(1).copied().unwrap_or_default().to_string(),
        res_type: tail.first().copied().unwrap_or_default().to_string(),
        app_name: tail.get(2).copied().unwrap_or_default().to_string(),
        domain: tail.get(3).copied().unwrap_or_default().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Content, Operation, Source};

    fn message_with_resource(resource: &str) -> Message {
        Message::new(Source::Edged, "hub", Operation::Query, resource, Content::success())
    }

    #[test]
    fn two_segments_yield_type_only() {
        let parsed = parse_resource(&message_with_resource("ns1/pod"));
        assert_eq!(parsed.res_type, "pod");
        assert_eq!(parsed.res_id, "");
        assert_eq!(parsed.res_key, "ns1/pod");
    }

    #[test]
    fn three_segments_yield_type_and_id() {
        let parsed = parse_resource(&message_with_resource("ns1/pod/p1"));
        assert_eq!(parsed.res_type, "pod");
        assert_eq!(parsed.res_id, "p1");
    }

    #[test]
    fn five_segments_yield_full_tuple() {
        let parsed = parse_resource(&message_with_resource("ns1/configmap/c1/app-a/domain-a"));
        assert_eq!(parsed.res_type, "configmap");
        assert_eq!(parsed.res_id, "c1");
        assert_eq!(parsed.app_name, "app-a");
        assert_eq!(parsed.domain, "domain-a");
    }

    #[test]
    fn unsupported_arity_yields_all_empty_but_res_key() {
        let parsed = parse_resource(&message_with_resource("a/b/c/d/e/f"));
        assert_eq!(parsed.res_key, "a/b/c/d/e/f");
        assert_eq!(parsed.res_type, "");
        assert_eq!(parsed.res_id, "");
    }

    #[test]
    fn service_account_token_requires_decodable_content() {
        let message = message_with_resource("ns1/serviceaccounttoken/sa1");
        let parsed = parse_resource(&message);
        assert_eq!(parsed.res_type, "");
        assert_eq!(parsed.res_key, message.resource);
    }

    #[test]
    fn service_account_token_parses_when_content_is_a_token_request() {
        let token_request = serde_json::json!({
            "apiVersion": "authentication.k8s.io/v1",
            "kind": "TokenRequest",
            "spec": { "audiences": ["api"] }
        });
        let message = Message::new(
            Source::Edged,
            "hub",
            Operation::Query,
            "ns1/serviceaccounttoken/sa1",
            Content::object(token_request),
        );
        let parsed = parse_resource(&message);
        assert_eq!(parsed.res_type, "serviceaccounttoken");
        assert_eq!(parsed.res_key, "ns1/serviceaccounttoken/sa1");
    }

    #[test]
    fn appsd_variant_parses_six_segments() {
        let parsed = parse_resource_from_appsd("edge/ns1/ns1/configmap/a/d");
        assert_eq!(parsed.namespace, "ns1");
        assert_eq!(parsed.res_type, "configmap");
        assert_eq!(parsed.app_name, "a");
        assert_eq!(parsed.domain, "d");
    }

    #[test]
    fn appsd_variant_rejects_out_of_range_arity() {
        let parsed = parse_resource_from_appsd("a/b/c");
        assert_eq!(parsed, AppsdResource::default());
    }
}
