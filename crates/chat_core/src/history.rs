//! Chat history - locally kept sent messages and remote conversation records.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One message the user sent, as kept in the local history panel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatHistoryEntry {
    /// 1-based position in the history
    pub id: usize,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Ordered local history of sent messages. Survives conversation resets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ChatHistory {
    entries: Vec<ChatHistoryEntry>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sent message. Blank messages are not recorded.
    pub fn record(&mut self, message: &str, at: DateTime<Utc>) -> Option<&ChatHistoryEntry> {
        if message.trim().is_empty() {
            return None;
        }
        let entry = ChatHistoryEntry {
            id: self.entries.len() + 1,
            timestamp: at,
            message: message.to_string(),
        };
        self.entries.push(entry);
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[ChatHistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A past conversation listed from the backend's `chats` collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Whether the record falls in the "This Week" group (last 7 days).
    pub fn is_this_week(&self, now: DateTime<Utc>) -> bool {
        self.created_at <= now && now - self.created_at < Duration::days(7)
    }
}

/// Split records into (this week, older), keeping their order.
pub fn partition_this_week(
    records: &[HistoryRecord],
    now: DateTime<Utc>,
) -> (Vec<&HistoryRecord>, Vec<&HistoryRecord>) {
    records.iter().partition(|record| record.is_this_week(now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, age_days: i64, now: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            id: id.to_string(),
            user_id: "u1".to_string(),
            title: format!("Chat {id}"),
            description: None,
            created_at: now - Duration::days(age_days),
        }
    }

    #[test]
    fn test_record_skips_blank_messages() {
        let mut history = ChatHistory::new();
        let now = Utc::now();
        assert!(history.record("   ", now).is_none());
        assert_eq!(history.record("Hello", now).map(|e| e.id), Some(1));
        assert_eq!(history.record("Again", now).map(|e| e.id), Some(2));
        assert_eq!(history.len(), 2);

        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_history_serializes_as_array() {
        let mut history = ChatHistory::new();
        history.record("Hello", Utc::now());
        let value = serde_json::to_value(&history).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["message"], "Hello");
    }

    #[test]
    fn test_partition_this_week() {
        let now = Utc::now();
        let records = vec![record("a", 0, now), record("b", 8, now), record("c", 6, now)];
        let (recent, older) = partition_this_week(&records, now);
        assert_eq!(recent.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), ["a", "c"]);
        assert_eq!(older.len(), 1);
    }
}
