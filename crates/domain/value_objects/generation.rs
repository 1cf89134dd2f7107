use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::domain::value_objects::enums::field_kinds::FieldKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub collection_id: Uuid,
    pub item_ids: Vec<String>,
    pub fields: Vec<String>,
    #[serde(default)]
    pub column_types: HashMap<String, FieldKind>,
    #[serde(default)]
    pub payment_id: Option<Uuid>,
}

impl GenerateRequest {
    pub fn kind_of(&self, field_name: &str) -> FieldKind {
        self.column_types.get(field_name).copied().unwrap_or_default()
    }
}

/// An item as read from the content store.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(default)]
    pub field_data: Map<String, Value>,
}

impl ContentItem {
    pub fn slug(&self) -> Option<&str> {
        self.field_data
            .get("slug")
            .and_then(Value::as_str)
            .filter(|slug| !slug.is_empty())
    }

    /// `name: value` lines of every non-empty field except the one being generated.
    pub fn context_excluding(&self, target_field: &str) -> String {
        self.field_data
            .iter()
            .filter(|(name, _)| name.as_str() != target_field)
            .filter_map(|(name, value)| {
                let rendered = match value {
                    Value::Null => return None,
                    Value::String(text) if text.trim().is_empty() => return None,
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                Some(format!("{name}: {rendered}"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn text_prompt(field_name: &str) -> String {
    format!(
        "Write new content for the \"{field_name}\" field of this record. \
         Reply with the field value only."
    )
}

pub fn image_prompt(field_name: &str, context: &str) -> String {
    format!("An image for the \"{field_name}\" field of a record described as:\n{context}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldGenerationResult {
    pub item_id: String,
    pub field_name: String,
    pub kind: FieldKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FieldGenerationResult {
    pub fn succeeded(item_id: &str, field_name: &str, kind: FieldKind, value: String) -> Self {
        Self {
            item_id: item_id.to_string(),
            field_name: field_name.to_string(),
            kind,
            value: Some(value),
            error: None,
        }
    }

    pub fn failed(item_id: &str, field_name: &str, kind: FieldKind, error: String) -> Self {
        Self {
            item_id: item_id.to_string(),
            field_name: field_name.to_string(),
            kind,
            value: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOutcome {
    pub results: Vec<FieldGenerationResult>,
    pub free_used: i32,
    pub remaining_free_after: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item() -> ContentItem {
        serde_json::from_value(json!({
            "id": "item1",
            "fieldData": {
                "name": "Hello world",
                "slug": "hello-world",
                "summary": "",
                "views": 12,
                "hero": null
            }
        }))
        .unwrap()
    }

    #[test]
    fn context_skips_target_and_empty_fields() {
        let context = item().context_excluding("name");
        assert!(!context.contains("Hello world"));
        assert!(context.contains("slug: hello-world"));
        assert!(context.contains("views: 12"));
        assert!(!context.contains("summary"));
        assert!(!context.contains("hero"));
    }

    #[test]
    fn slug_is_read_from_field_data() {
        assert_eq!(item().slug(), Some("hello-world"));
        assert_eq!(ContentItem::default().slug(), None);
    }

    #[test]
    fn unknown_column_type_defaults_to_text() {
        let request: GenerateRequest = serde_json::from_value(json!({
            "collectionId": Uuid::nil(),
            "itemIds": ["a"],
            "fields": ["title", "hero"],
            "columnTypes": {"hero": "image"}
        }))
        .unwrap();

        assert_eq!(request.kind_of("hero"), FieldKind::Image);
        assert_eq!(request.kind_of("title"), FieldKind::Text);
        assert_eq!(request.payment_id, None);
    }
}
