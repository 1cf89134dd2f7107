use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::{
    header::AUTHORIZATION,
    multipart::{Form, Part},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, error};

use crate::domain::{
    repositories::content_store::ContentStoreClient,
    value_objects::{assets::UploadedAsset, generation::ContentItem},
};

const PAGE_LIMIT: usize = 100;

/// Webflow Data API v2 client. The access token is passed per call since every
/// collection belongs to its own integration.
pub struct WebflowClient {
    http: reqwest::Client,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ListItemsResponse {
    #[serde(default)]
    items: Vec<ContentItem>,
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateAssetResponse {
    id: String,
    upload_url: String,
    #[serde(default)]
    upload_details: BTreeMap<String, Value>,
    hosted_url: Option<String>,
    asset_url: Option<String>,
}

impl WebflowClient {
    pub fn new(api_base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    async fn ensure_success(resp: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status();
        let body = match resp.text().await {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => "<empty response body>".to_string(),
            Err(err) => format!("<failed to read response body: {err}>"),
        };

        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string));

        error!(
            status = %status,
            webflow_message = ?message,
            response_body = %body,
            context = %context,
            "webflow api request failed"
        );

        match message {
            Some(message) => anyhow::bail!("Webflow {context} failed ({status}): {message}"),
            None => anyhow::bail!("Webflow {context} failed ({status})"),
        }
    }
}

#[async_trait]
impl ContentStoreClient for WebflowClient {
    async fn list_items(&self, token: &str, collection_id: &str) -> Result<Vec<ContentItem>> {
        // https://developers.webflow.com/data/reference/cms/collection-items/staged-items/list-items
        let mut items = Vec::new();
        let mut offset = 0;

        loop {
            let resp = self
                .http
                .get(format!("{}/collections/{}/items", self.api_base, collection_id))
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .query(&[("limit", PAGE_LIMIT), ("offset", offset)])
                .send()
                .await?;
            let resp = Self::ensure_success(resp, "list items").await?;

            let page: ListItemsResponse = resp.json().await.context("decode webflow items")?;
            let fetched = page.items.len();
            items.extend(page.items);
            offset += fetched;

            let total = page.pagination.and_then(|p| p.total);
            let done = match total {
                Some(total) => offset >= total,
                None => fetched < PAGE_LIMIT,
            };
            if done || fetched == 0 {
                break;
            }
        }

        debug!(collection_id, count = items.len(), "webflow: listed items");
        Ok(items)
    }

    async fn update_item(
        &self,
        token: &str,
        collection_id: &str,
        item_id: &str,
        field_data: Map<String, Value>,
    ) -> Result<ContentItem> {
        // https://developers.webflow.com/data/reference/cms/collection-items/live-items/update-item-live
        let resp = self
            .http
            .patch(format!(
                "{}/collections/{}/items/{}/live",
                self.api_base, collection_id, item_id
            ))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&json!({ "fieldData": field_data }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "update item").await?;

        let item: ContentItem = resp.json().await.context("decode updated webflow item")?;
        Ok(item)
    }

    async fn upload_asset(
        &self,
        token: &str,
        site_id: &str,
        file_name: String,
        bytes: Vec<u8>,
        content_type: String,
    ) -> Result<UploadedAsset> {
        // https://developers.webflow.com/data/reference/assets/assets/create
        let file_hash = hex::encode(Md5::digest(&bytes));

        let resp = self
            .http
            .post(format!("{}/sites/{}/assets", self.api_base, site_id))
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&json!({ "fileName": file_name, "fileHash": file_hash }))
            .send()
            .await?;
        let resp = Self::ensure_success(resp, "create asset").await?;
        let created: CreateAssetResponse = resp.json().await.context("decode webflow asset")?;

        let mut form = Form::new();
        for (key, value) in created.upload_details {
            let value = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            form = form.text(key, value);
        }
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(&content_type)
            .context("invalid asset content type")?;
        form = form.part("file", part);

        // The upload URL is pre-signed, so no bearer token here.
        let resp = self
            .http
            .post(&created.upload_url)
            .multipart(form)
            .send()
            .await?;
        Self::ensure_success(resp, "upload asset bytes").await?;

        let hosted_url = created
            .hosted_url
            .or(created.asset_url)
            .context("webflow asset response without a hosted url")?;

        Ok(UploadedAsset {
            asset_id: created.id,
            hosted_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_response_decodes_items_and_pagination() {
        let page: ListItemsResponse = serde_json::from_value(json!({
            "items": [
                {"id": "a", "fieldData": {"name": "A", "slug": "a"}},
                {"id": "b", "fieldData": {"name": "B"}, "isDraft": false}
            ],
            "pagination": {"limit": 100, "offset": 0, "total": 2}
        }))
        .unwrap();

        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].slug(), Some("a"));
        assert_eq!(page.pagination.and_then(|p| p.total), Some(2));
    }

    #[test]
    fn asset_response_decodes_upload_details() {
        let created: CreateAssetResponse = serde_json::from_value(json!({
            "id": "asset-1",
            "uploadUrl": "https://uploads.example.com",
            "uploadDetails": {"key": "k", "X-Amz-Algorithm": "AWS4-HMAC-SHA256"},
            "hostedUrl": "https://cdn.example.com/a.png"
        }))
        .unwrap();

        assert_eq!(created.upload_details.len(), 2);
        assert_eq!(created.hosted_url.as_deref(), Some("https://cdn.example.com/a.png"));
        assert!(created.asset_url.is_none());
    }

    #[test]
    fn api_base_is_normalized() {
        let client = WebflowClient::new("https://api.webflow.com/v2/".to_string());
        assert_eq!(client.api_base, "https://api.webflow.com/v2");
    }
}
