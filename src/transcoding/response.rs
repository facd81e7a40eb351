//! Response body projection.

use bytes::Bytes;
use serde_json::Value;

use crate::transcoding::error::TranscodeResult;
use crate::transcoding::registry::RouteMatch;
use crate::transcoding::schema::{DescriptorPool, FieldHandle};
use crate::transcoding::template::FieldPath;

/// Turns RPC responses into HTTP response bodies.
#[derive(Debug, Clone, Copy)]
pub struct ResponseProjector<'p> {
    pool: &'p DescriptorPool,
}

impl<'p> ResponseProjector<'p> {
    pub fn new(pool: &'p DescriptorPool) -> Self {
        Self { pool }
    }

    /// Serialize the whole response, or only the named top-level field.
    pub fn project(
        &self,
        output_type: &str,
        response: &Value,
        response_body: Option<&str>,
    ) -> TranscodeResult<Bytes> {
        let handle = match response_body {
            Some(name) => {
                let path = FieldPath::from_segments(vec![name.to_string()]);
                Some(self.pool.resolve(output_type, &path)?)
            }
            None => None,
        };
        Ok(project_field(response, handle.as_ref()))
    }

    /// Project with the response field resolved when the rule was compiled.
    pub fn project_route(&self, route: &RouteMatch<'_>, response: &Value) -> Bytes {
        project_field(response, route.fields().response.as_ref())
    }
}

/// A field missing from the response serializes as its default value.
fn project_field(response: &Value, field: Option<&FieldHandle>) -> Bytes {
    let Some(handle) = field else {
        return Bytes::from(response.to_string());
    };
    let leaf = handle.leaf();
    let value = response
        .get(&leaf.name)
        .or_else(|| response.get(&leaf.json_name))
        .filter(|v| !v.is_null())
        .cloned()
        .unwrap_or_else(|| leaf.default_json());
    Bytes::from(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{HttpConfig, HttpRuleConfig};
    use crate::transcoding::error::TranscodeError;
    use crate::transcoding::registry::RuleRegistry;
    use crate::transcoding::schema::tests::messaging_pool;
    use serde_json::json;

    const LIST: &str = "example.v1.ListMessagesResponse";

    #[test]
    fn test_whole_message() {
        let pool = messaging_pool();
        let response = json!({"messages": [{"text": "a"}], "next_page_token": "t"});
        let bytes = ResponseProjector::new(&pool).project(LIST, &response, None).unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_single_field() {
        let pool = messaging_pool();
        let response = json!({"messages": [{"text": "a"}], "nextPageToken": "t"});
        let projector = ResponseProjector::new(&pool);

        let bytes = projector.project(LIST, &response, Some("messages")).unwrap();
        assert_eq!(&bytes[..], br#"[{"text":"a"}]"#);

        let bytes = projector.project(LIST, &response, Some("next_page_token")).unwrap();
        assert_eq!(&bytes[..], br#""t""#);
    }

    #[test]
    fn test_missing_field_defaults() {
        let pool = messaging_pool();
        let bytes = ResponseProjector::new(&pool)
            .project(LIST, &json!({}), Some("messages"))
            .unwrap();
        assert_eq!(&bytes[..], b"[]");
    }

    #[test]
    fn test_route_projection_uses_binding_field() {
        let pool = messaging_pool();
        let config = HttpConfig {
            rules: vec![HttpRuleConfig {
                selector: "example.v1.Messaging.ListMessages".into(),
                get: Some("/v1/messages".into()),
                response_body: Some("nextPageToken".into()),
                ..Default::default()
            }],
            ..Default::default()
        };
        let registry = RuleRegistry::build(&config, &pool).unwrap();
        let route = registry.route("GET", "/v1/messages").unwrap();

        let projector = ResponseProjector::new(&pool);
        let response = json!({"messages": [], "next_page_token": "t2"});
        assert_eq!(&projector.project_route(&route, &response)[..], br#""t2""#);
        assert_eq!(&projector.project_route(&route, &json!({}))[..], b"\"\"");
    }

    #[test]
    fn test_unknown_field() {
        let pool = messaging_pool();
        let err = ResponseProjector::new(&pool)
            .project(LIST, &json!({}), Some("nope"))
            .unwrap_err();
        assert!(matches!(err, TranscodeError::UnknownField { .. }));
    }
}
