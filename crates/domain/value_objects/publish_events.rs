use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::publication_statuses::{
    PublicationItemStatus, PublicationStatus,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedLink {
    pub item_id: String,
    pub status: PublicationItemStatus,
    pub published_url: Option<String>,
}

/// Progress record of a publish job, sent to the caller as one NDJSON line each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum PublishEvent {
    Started {
        publication_id: Uuid,
        total_items: i32,
        total_fields: i32,
    },
    Item {
        item_id: String,
        status: PublicationItemStatus,
        items_succeeded: i32,
        items_failed: i32,
        published_url: Option<String>,
        fields_applied: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Completed {
        publication_id: Uuid,
        status: PublicationStatus,
        items_succeeded: i32,
        items_failed: i32,
        fields_succeeded: i32,
        fields_failed: i32,
        links: Vec<PublishedLink>,
    },
    Error {
        message: String,
    },
}

impl PublishEvent {
    pub fn to_ndjson_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self).context("serialize publish event")?;
        line.push('\n');
        Ok(line)
    }

    /// Unknown event types and malformed lines yield `None` so readers can skip them.
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PublishEvent::Completed { .. } | PublishEvent::Error { .. })
    }
}
