//! Backend records as the record store returns them.
//!
//! Field sets belong to the store's schema, so records keep their fields as JSON and expose a
//! few typed accessors for the values this crate reasons about.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(
        default,
        rename = "collectionId",
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_id: Option<String>,
    #[serde(
        default,
        rename = "collectionName",
        skip_serializing_if = "Option::is_none"
    )]
    pub collection_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection_id: None,
            collection_name: None,
            created: None,
            updated: None,
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.fields.get(name).and_then(Value::as_bool)
    }

    pub fn slug(&self) -> Option<&str> {
        self.str_field("slug").filter(|slug| !slug.is_empty())
    }

    /// Human label for logs: `name`, then `title`, then `slug`, then the id.
    pub fn label(&self) -> &str {
        ["name", "title", "slug"]
            .into_iter()
            .find_map(|field| self.str_field(field).filter(|value| !value.is_empty()))
            .unwrap_or(&self.id)
    }
}

/// One page of a collection listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
    pub items: Vec<Record>,
}

impl RecordPage {
    pub fn empty(per_page: u32) -> Self {
        Self {
            page: 1,
            per_page,
            total_items: 0,
            total_pages: 0,
            items: Vec::new(),
        }
    }

    pub fn first(&self) -> Option<&Record> {
        self.items.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_store_record_with_extra_fields() {
        let record: Record = serde_json::from_str(
            r#"{
                "id": "abc123",
                "collectionId": "pbc_1",
                "collectionName": "blogs",
                "created": "2025-01-02 10:00:00.000Z",
                "title": "Earned wage access explained",
                "slug": "ewa-explained",
                "published": true
            }"#,
        )
        .expect("record parses");

        assert_eq!(record.collection_name.as_deref(), Some("blogs"));
        assert_eq!(record.slug(), Some("ewa-explained"));
        assert_eq!(record.bool_field("published"), Some(true));
        assert_eq!(record.label(), "Earned wage access explained");
    }

    #[test]
    fn label_falls_back_to_id() {
        let record = Record::new("r1").with_field("title", "");
        assert_eq!(record.label(), "r1");
    }

    #[test]
    fn page_uses_camel_case_fields() {
        let page: RecordPage = serde_json::from_str(
            r#"{"page":1,"perPage":20,"totalItems":1,"totalPages":1,"items":[{"id":"x"}]}"#,
        )
        .expect("page parses");
        assert_eq!(page.per_page, 20);
        assert_eq!(page.first().map(|r| r.id.as_str()), Some("x"));
    }
}
