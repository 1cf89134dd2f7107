use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stripe rejects metadata values longer than this.
pub const METADATA_VALUE_LIMIT: usize = 500;
/// Stripe rejects objects carrying more metadata keys than this.
pub const METADATA_KEY_LIMIT: usize = 50;

pub const KEY_USER_ID: &str = "user_id";
pub const KEY_COLLECTION_ID: &str = "collection_id";
pub const KEY_EXTERNAL_COLLECTION_ID: &str = "external_collection_id";
pub const KEY_ITEM_COUNT: &str = "item_count";
pub const KEY_ITEM_IDS_CHUNKS: &str = "item_ids_chunks";
pub const KEY_ITEM_IDS_PREFIX: &str = "item_ids_";

/// Everything the webhook needs to rebuild a paid generation job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutMetadata {
    pub user_id: Uuid,
    pub collection_id: Uuid,
    pub external_collection_id: String,
    pub item_count: i32,
    pub item_ids: Vec<String>,
}

impl CheckoutMetadata {
    pub fn to_metadata(&self) -> Result<BTreeMap<String, String>> {
        let encoded = serde_json::to_string(&self.item_ids).context("encode item ids")?;
        let chunks = chunk_value(&encoded, METADATA_VALUE_LIMIT);

        let mut metadata = BTreeMap::new();
        metadata.insert(KEY_USER_ID.to_string(), self.user_id.to_string());
        metadata.insert(KEY_COLLECTION_ID.to_string(), self.collection_id.to_string());
        metadata.insert(
            KEY_EXTERNAL_COLLECTION_ID.to_string(),
            self.external_collection_id.clone(),
        );
        metadata.insert(KEY_ITEM_COUNT.to_string(), self.item_count.to_string());
        metadata.insert(KEY_ITEM_IDS_CHUNKS.to_string(), chunks.len().to_string());
        for (index, chunk) in chunks.into_iter().enumerate() {
            metadata.insert(format!("{KEY_ITEM_IDS_PREFIX}{index}"), chunk);
        }

        Ok(metadata)
    }

    /// Fails when the user or collection id is missing or malformed. A broken item id
    /// list degrades to an empty list so the payment can still be recorded.
    pub fn from_metadata(metadata: &BTreeMap<String, String>) -> Result<Self> {
        let user_id = metadata
            .get(KEY_USER_ID)
            .context("metadata: missing user_id")?
            .parse::<Uuid>()
            .context("metadata: invalid user_id")?;
        let collection_id = metadata
            .get(KEY_COLLECTION_ID)
            .context("metadata: missing collection_id")?
            .parse::<Uuid>()
            .context("metadata: invalid collection_id")?;
        let external_collection_id = metadata
            .get(KEY_EXTERNAL_COLLECTION_ID)
            .cloned()
            .unwrap_or_default();
        let item_ids = decode_item_ids(metadata).unwrap_or_default();
        let item_count = metadata
            .get(KEY_ITEM_COUNT)
            .and_then(|value| value.parse::<i32>().ok())
            .unwrap_or(item_ids.len() as i32);

        Ok(Self {
            user_id,
            collection_id,
            external_collection_id,
            item_count,
            item_ids,
        })
    }
}

fn decode_item_ids(metadata: &BTreeMap<String, String>) -> Option<Vec<String>> {
    let chunks = metadata.get(KEY_ITEM_IDS_CHUNKS)?.parse::<usize>().ok()?;
    let mut encoded = String::new();
    for index in 0..chunks {
        encoded.push_str(metadata.get(&format!("{KEY_ITEM_IDS_PREFIX}{index}"))?);
    }
    serde_json::from_str(&encoded).ok()
}

/// Splits on char boundaries so every chunk is valid UTF-8 of at most `limit` bytes.
fn chunk_value(value: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    for ch in value.chars() {
        if current.len() + ch.len_utf8() > limit {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(ch);
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub collection_id: Uuid,
    pub item_ids: Vec<String>,
    pub item_count: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionDto {
    pub session_id: String,
    pub redirect_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata_with(item_ids: Vec<String>) -> CheckoutMetadata {
        CheckoutMetadata {
            user_id: Uuid::new_v4(),
            collection_id: Uuid::new_v4(),
            external_collection_id: "65f0c0ffee".to_string(),
            item_count: item_ids.len() as i32,
            item_ids,
        }
    }

    #[test]
    fn short_selection_uses_one_chunk() {
        let original = metadata_with(vec!["a".to_string(), "b".to_string()]);
        let encoded = original.to_metadata().unwrap();

        assert_eq!(encoded.get(KEY_ITEM_IDS_CHUNKS).map(String::as_str), Some("1"));
        assert_eq!(CheckoutMetadata::from_metadata(&encoded).unwrap(), original);
    }

    #[test]
    fn long_selection_survives_chunking_in_order() {
        let item_ids: Vec<String> = (0..300).map(|i| format!("item-{i:024}")).collect();
        let original = metadata_with(item_ids);
        let encoded = original.to_metadata().unwrap();

        let chunks: usize = encoded[KEY_ITEM_IDS_CHUNKS].parse().unwrap();
        assert!(chunks > 1);
        for index in 0..chunks {
            assert!(encoded[&format!("{KEY_ITEM_IDS_PREFIX}{index}")].len() <= METADATA_VALUE_LIMIT);
        }
        assert_eq!(CheckoutMetadata::from_metadata(&encoded).unwrap(), original);
    }

    #[test]
    fn very_long_selection_exceeds_key_limit() {
        let original = metadata_with((0..1000).map(|i| format!("{i:024x}")).collect());
        let encoded = original.to_metadata().unwrap();
        assert!(encoded.len() > METADATA_KEY_LIMIT);
    }

    #[test]
    fn multibyte_ids_are_not_split_inside_a_char() {
        let original = metadata_with((0..120).map(|i| format!("é-{i}-ü")).collect());
        let encoded = original.to_metadata().unwrap();
        assert_eq!(CheckoutMetadata::from_metadata(&encoded).unwrap(), original);
    }

    #[test]
    fn broken_item_ids_degrade_to_empty_list() {
        let original = metadata_with(vec!["a".to_string()]);
        let mut encoded = original.to_metadata().unwrap();
        encoded.insert(format!("{KEY_ITEM_IDS_PREFIX}0"), "[not json".to_string());

        let decoded = CheckoutMetadata::from_metadata(&encoded).unwrap();
        assert!(decoded.item_ids.is_empty());
        assert_eq!(decoded.user_id, original.user_id);
        assert_eq!(decoded.item_count, 1);
    }

    #[test]
    fn missing_user_id_is_an_error() {
        let mut encoded = metadata_with(vec![]).to_metadata().unwrap();
        encoded.remove(KEY_USER_ID);
        assert!(CheckoutMetadata::from_metadata(&encoded).is_err());
    }
}
