use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    #[default]
    Processing,
    Completed,
    Partial,
    Failed,
}

impl PublicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationStatus::Processing => "processing",
            PublicationStatus::Completed => "completed",
            PublicationStatus::Partial => "partial",
            PublicationStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(PublicationStatus::Processing),
            "completed" => Some(PublicationStatus::Completed),
            "partial" => Some(PublicationStatus::Partial),
            "failed" => Some(PublicationStatus::Failed),
            _ => None,
        }
    }

    /// Terminal status of a finished batch: no failures is `Completed`, no successes is
    /// `Failed`, anything in between is `Partial`.
    pub fn from_item_counts(items_succeeded: i32, items_failed: i32) -> Self {
        if items_failed == 0 {
            PublicationStatus::Completed
        } else if items_succeeded == 0 {
            PublicationStatus::Failed
        } else {
            PublicationStatus::Partial
        }
    }
}

impl Display for PublicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PublicationItemStatus {
    #[default]
    Processing,
    Succeeded,
    Failed,
}

impl PublicationItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationItemStatus::Processing => "processing",
            PublicationItemStatus::Succeeded => "succeeded",
            PublicationItemStatus::Failed => "failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "processing" => Some(PublicationItemStatus::Processing),
            "succeeded" => Some(PublicationItemStatus::Succeeded),
            "failed" => Some(PublicationItemStatus::Failed),
            _ => None,
        }
    }
}

impl Display for PublicationItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_failures_is_completed() {
        assert_eq!(
            PublicationStatus::from_item_counts(3, 0),
            PublicationStatus::Completed
        );
    }

    #[test]
    fn no_successes_is_failed() {
        assert_eq!(
            PublicationStatus::from_item_counts(0, 3),
            PublicationStatus::Failed
        );
    }

    #[test]
    fn mixed_outcome_is_partial() {
        for failed in 1..5 {
            let succeeded = 5 - failed;
            assert_eq!(
                PublicationStatus::from_item_counts(succeeded, failed),
                PublicationStatus::Partial,
                "{failed} failures out of 5"
            );
        }
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            PublicationStatus::Processing,
            PublicationStatus::Completed,
            PublicationStatus::Partial,
            PublicationStatus::Failed,
        ] {
            assert_eq!(PublicationStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(PublicationStatus::from_str("done"), None);
    }
}
