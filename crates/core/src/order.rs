//! Asynchronous fetch orders and their lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Lifecycle state of an asynchronous fetch order.
///
/// `Unknown` is the defensive catch-all for remote status vocabulary we
/// cannot parse; it is never produced locally.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Unknown,
}

impl OrderStatus {
    /// Map a remote status string onto the local vocabulary.
    ///
    /// Matching is case-insensitive and accepts the common archive spellings
    /// ("queued" for pending, "in_progress" for running).
    pub fn from_remote(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" | "queued" => Self::Pending,
            "running" | "in_progress" => Self::Running,
            "completed" | "complete" | "done" => Self::Completed,
            "failed" | "cancelled" | "canceled" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether the order has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tracked asynchronous fetch-from-remote-archive request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    /// Name of the owning DataStore.
    pub datastore: String,
    /// Local product identity being fetched.
    pub product_uuid: Uuid,
    /// Remote job identifier assigned by the archive.
    pub job_id: String,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub estimated_at: Option<OffsetDateTime>,
    /// Last status message reported by the archive or the download path.
    pub message: Option<String>,
}

impl Order {
    pub fn new(
        datastore: impl Into<String>,
        product_uuid: Uuid,
        job_id: impl Into<String>,
    ) -> Self {
        Self {
            datastore: datastore.into(),
            product_uuid,
            job_id: job_id.into(),
            status: OrderStatus::Pending,
            submitted_at: OffsetDateTime::now_utc(),
            estimated_at: None,
            message: None,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "order {} for product {} on {}: {}",
            self.job_id, self.product_uuid, self.datastore, self.status
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_mapping() {
        assert_eq!(OrderStatus::from_remote("Queued"), OrderStatus::Pending);
        assert_eq!(OrderStatus::from_remote("IN_PROGRESS"), OrderStatus::Running);
        assert_eq!(OrderStatus::from_remote("completed"), OrderStatus::Completed);
        assert_eq!(OrderStatus::from_remote("Cancelled"), OrderStatus::Failed);
        assert_eq!(OrderStatus::from_remote("weird"), OrderStatus::Unknown);
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Running.is_terminal());
        assert!(!OrderStatus::Unknown.is_terminal());
    }

    #[test]
    fn order_serializes_roundtrip() {
        let order = Order::new("lta", Uuid::new_v4(), "job-42");
        let json = serde_json::to_string(&order).unwrap();
        let back: Order = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job_id, "job-42");
        assert_eq!(back.status, OrderStatus::Pending);
    }
}
