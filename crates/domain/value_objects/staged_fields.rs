use std::fmt;

use anyhow::{Context, Result, bail};
use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{MapAccess, Visitor},
};
use uuid::Uuid;

use crate::domain::value_objects::enums::field_kinds::FieldKind;

/// One not-yet-published edit to one field of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedField {
    #[serde(default)]
    pub kind: FieldKind,
    pub value: String,
}

/// Staged fields of one item, in the order the caller sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedItem {
    pub item_id: String,
    pub fields: Vec<(String, StagedField)>,
}

impl StagedItem {
    pub fn text_value(&self, field_name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, field)| name == field_name && field.kind == FieldKind::Text)
            .map(|(_, field)| field.value.as_str())
    }
}

/// `itemId -> {fieldName -> StagedField}` keeping JSON document order at both levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    pub items: Vec<StagedItem>,
}

impl StagedChanges {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_items(&self) -> i32 {
        self.items.len() as i32
    }

    pub fn total_fields(&self) -> i32 {
        self.items.iter().map(|item| item.fields.len() as i32).sum()
    }
}

struct OrderedFieldsVisitor;

impl<'de> Visitor<'de> for OrderedFieldsVisitor {
    type Value = Vec<(String, StagedField)>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of field name to staged field")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut fields = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((name, field)) = access.next_entry::<String, StagedField>()? {
            fields.retain(|(existing, _): &(String, StagedField)| existing != &name);
            fields.push((name, field));
        }
        Ok(fields)
    }
}

struct OrderedFields(Vec<(String, StagedField)>);

impl<'de> Deserialize<'de> for OrderedFields {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(OrderedFieldsVisitor).map(OrderedFields)
    }
}

struct StagedChangesVisitor;

impl<'de> Visitor<'de> for StagedChangesVisitor {
    type Value = StagedChanges;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of item id to staged fields")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut items: Vec<StagedItem> = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((item_id, OrderedFields(fields))) =
            access.next_entry::<String, OrderedFields>()?
        {
            items.retain(|existing| existing.item_id != item_id);
            items.push(StagedItem { item_id, fields });
        }
        Ok(StagedChanges { items })
    }
}

impl<'de> Deserialize<'de> for StagedChanges {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(StagedChangesVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub collection_id: Uuid,
    pub changes: StagedChanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImagePayload {
    /// Accepts `data:<mime>;base64,<data>` or bare base64 (assumed PNG).
    pub fn decode(value: &str) -> Result<Self> {
        let value = value.trim();
        let (content_type, encoded) = match value.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').context("data url without payload")?;
                let Some(mime) = header.strip_suffix(";base64") else {
                    bail!("data url is not base64 encoded");
                };
                let mime = if mime.is_empty() { "image/png" } else { mime };
                (mime.to_string(), data)
            }
            None => ("image/png".to_string(), value),
        };

        if encoded.is_empty() {
            bail!("empty image payload");
        }

        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .context("image payload is not valid base64")?;

        Ok(Self {
            bytes,
            content_type,
        })
    }

    pub fn to_data_url(bytes: &[u8]) -> String {
        format!("data:image/png;base64,{}", STANDARD.encode(bytes))
    }

    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            "image/svg+xml" => "svg",
            _ => "png",
        }
    }

    pub fn file_name(&self, item_id: &str, field_name: &str) -> String {
        format!("{item_id}-{field_name}.{}", self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changes_keep_document_order() {
        let json = r#"{
            "zeta": {"title": {"kind": "text", "value": "Z"}, "alpha": {"value": "a"}},
            "alpha": {"hero": {"kind": "image", "value": "aGk="}}
        }"#;

        let changes: StagedChanges = serde_json::from_str(json).unwrap();
        let ids: Vec<&str> = changes.items.iter().map(|i| i.item_id.as_str()).collect();
        assert_eq!(ids, vec!["zeta", "alpha"]);

        let names: Vec<&str> = changes.items[0].fields.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["title", "alpha"]);
        assert_eq!(changes.items[0].fields[1].1.kind, FieldKind::Text);
        assert_eq!(changes.items[1].fields[0].1.kind, FieldKind::Image);

        assert_eq!(changes.total_items(), 2);
        assert_eq!(changes.total_fields(), 3);
    }

    #[test]
    fn publish_request_parses_camel_case() {
        let collection_id = Uuid::new_v4();
        let json = format!(r#"{{"collectionId": "{collection_id}", "changes": {{}}}}"#);
        let request: PublishRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.collection_id, collection_id);
        assert!(request.changes.is_empty());
    }

    #[test]
    fn decodes_data_url_and_bare_base64() {
        let from_url = ImagePayload::decode("data:image/jpeg;base64,aGVsbG8=").unwrap();
        assert_eq!(from_url.bytes, b"hello");
        assert_eq!(from_url.extension(), "jpg");

        let bare = ImagePayload::decode("aGVsbG8=").unwrap();
        assert_eq!(bare.bytes, b"hello");
        assert_eq!(bare.content_type, "image/png");
        assert_eq!(bare.file_name("item1", "hero"), "item1-hero.png");
    }

    #[test]
    fn rejects_broken_payloads() {
        assert!(ImagePayload::decode("").is_err());
        assert!(ImagePayload::decode("data:image/png;base64,").is_err());
        assert!(ImagePayload::decode("data:image/png,plain").is_err());
        assert!(ImagePayload::decode("not base64 at all!").is_err());
    }

    #[test]
    fn data_url_round_trips_through_decode() {
        let url = ImagePayload::to_data_url(&[1, 2, 3]);
        assert_eq!(ImagePayload::decode(&url).unwrap().bytes, vec![1, 2, 3]);
    }
}
