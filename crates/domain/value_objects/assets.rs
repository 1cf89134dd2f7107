use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// An image uploaded to the content store's asset library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub asset_id: String,
    pub hosted_url: String,
}

impl UploadedAsset {
    /// Value written into an image field in place of the staged payload.
    pub fn field_reference(&self) -> Value {
        json!({ "fileId": self.asset_id, "url": self.hosted_url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_reference_shape() {
        let asset = UploadedAsset {
            asset_id: "asset-1".to_string(),
            hosted_url: "https://cdn.example.com/a.png".to_string(),
        };
        assert_eq!(
            asset.field_reference(),
            json!({"fileId": "asset-1", "url": "https://cdn.example.com/a.png"})
        );
    }
}
