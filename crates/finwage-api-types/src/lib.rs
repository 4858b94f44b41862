//! Request and response bodies shared by the FinWage site service and its callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Minimal view of a backend record carried by webhooks and collection revalidation requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevalidateCollectionRequest {
    pub collection: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevalidateTagsRequest {
    #[serde(deserialize_with = "one_or_many")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevalidatePathsRequest {
    #[serde(deserialize_with = "one_or_many")]
    pub paths: Vec<String>,
}

/// Body of a manual scheduled refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronRequest {
    pub frequency: String,
}

/// Outcome of any revalidation entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevalidateResponse {
    pub success: bool,
    pub endpoint: String,
    /// Wall time spent, formatted as `"{n}ms"`.
    pub duration: String,
    pub timestamp: String,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<String>,
}

/// Payload posted by the record store's webhook hook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub action: String,
    pub collection: String,
    #[serde(default)]
    pub record: Option<RecordRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    pub message: String,
    pub collection: String,
    pub action: String,
    pub tags: Vec<String>,
    pub paths: Vec<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookHealth {
    pub status: String,
    pub endpoint: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CronResponse {
    pub success: bool,
    pub frequency: String,
    pub tags: Vec<String>,
    pub timestamp: String,
}

/// Contact form submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactCreated {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ContactCreated>,
    /// Field name to validation messages.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, Vec<String>>,
}

/// Accept either `"value"` or `["a", "b"]`.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(value) => vec![value],
        OneOrMany::Many(values) => values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn webhook_payload_ignores_unknown_record_fields() {
        let payload: WebhookPayload = serde_json::from_str(
            r#"{"action":"update","collection":"blogs","record":{"id":"abc","slug":"hello","title":"Hello"}}"#,
        )
        .expect("payload parses");

        let record = payload.record.expect("record present");
        assert_eq!(record.id.as_deref(), Some("abc"));
        assert_eq!(record.slug.as_deref(), Some("hello"));
    }

    #[test]
    fn contact_response_omits_empty_errors() {
        let response = ContactResponse {
            success: true,
            message: "ok".to_string(),
            data: Some(ContactCreated {
                id: "r1".to_string(),
            }),
            errors: BTreeMap::new(),
        };

        let value = serde_json::to_value(&response).expect("serialize");
        assert!(value.get("errors").is_none());
        assert_eq!(value["data"]["id"], "r1");
    }

    #[test]
    fn tags_accept_single_string() {
        let single: RevalidateTagsRequest =
            serde_json::from_str(r#"{"tags":"blogs"}"#).expect("single tag");
        let many: RevalidateTagsRequest =
            serde_json::from_str(r#"{"tags":["blogs","faqs"]}"#).expect("tag list");

        assert_eq!(single.tags, vec!["blogs"]);
        assert_eq!(many.tags, vec!["blogs", "faqs"]);
        assert!(serde_json::from_str::<RevalidatePathsRequest>(r#"{"paths":3}"#).is_err());
    }
}
