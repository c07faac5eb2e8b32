//! Append-only message history with two-pass deduplication.
//!
//! The same logical event can reach the store through more than one code
//! path (e.g. the pipeline and an external logger), so both insertion and
//! reads guard against duplicates.

use super::Store;
use chrono::{DateTime, Utc};
use forma_core::error::FormaError;
use uuid::Uuid;

/// Message direction relative to the coached user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }

    fn from_db(s: &str) -> Self {
        if s == "outbound" {
            Self::Outbound
        } else {
            Self::Inbound
        }
    }
}

/// One stored history row.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: String,
    pub direction: Direction,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Store {
    /// Append a message unless it duplicates one already stored within the
    /// dedup window, then return the merged, deduplicated, chronological
    /// history for the identity.
    pub async fn append_message(
        &self,
        identity_id: &str,
        direction: Direction,
        content: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<StoredMessage>, FormaError> {
        let window_start = (timestamp - chrono::Duration::seconds(self.dedup_window_secs))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
        let window_end = (timestamp + chrono::Duration::seconds(self.dedup_window_secs))
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let (existing,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM messages \
             WHERE identity_id = ? AND direction = ? AND content = ? \
             AND timestamp >= ? AND timestamp <= ?",
        )
        .bind(identity_id)
        .bind(direction.as_str())
        .bind(content)
        .bind(&window_start)
        .bind(&window_end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| FormaError::Memory(format!("dedup check failed: {e}")))?;

        if existing == 0 {
            let id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO messages (id, identity_id, direction, content, timestamp) \
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(identity_id)
            .bind(direction.as_str())
            .bind(content)
            .bind(timestamp.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
            .execute(&self.pool)
            .await
            .map_err(|e| FormaError::Memory(format!("message insert failed: {e}")))?;
        }

        self.history(identity_id, self.max_context_messages).await
    }

    /// Most recent N messages in chronological order, deduplicated.
    pub async fn history(
        &self,
        identity_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, FormaError> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, direction, content, timestamp FROM messages \
             WHERE identity_id = ? ORDER BY timestamp DESC LIMIT ?",
        )
        .bind(identity_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FormaError::Memory(format!("history query failed: {e}")))?;

        let mut messages: Vec<StoredMessage> = rows
            .into_iter()
            .filter_map(|(id, direction, content, ts)| {
                let timestamp = DateTime::parse_from_rfc3339(&ts).ok()?.with_timezone(&Utc);
                Some(StoredMessage {
                    id,
                    direction: Direction::from_db(&direction),
                    content,
                    timestamp,
                })
            })
            .collect();
        messages.reverse();

        Ok(dedup_history(messages, self.dedup_window_secs))
    }

    /// Number of stored messages for an identity. Used by the funnel gate
    /// to decide whether an identity is still "early stage".
    pub async fn message_count(&self, identity_id: &str) -> Result<usize, FormaError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM messages WHERE identity_id = ?")
                .bind(identity_id)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| FormaError::Memory(format!("count query failed: {e}")))?;

        Ok(count as usize)
    }
}

/// Two-pass history deduplication.
///
/// Pass (a): exact duplicates on `(timestamp, direction, first-80-chars)`.
/// Pass (b): consecutive same-direction messages with identical full text
/// within the window collapse, and identical text across directions within
/// the window collapses — the same content logged via two independent
/// paths is one logical event.
fn dedup_history(messages: Vec<StoredMessage>, window_secs: i64) -> Vec<StoredMessage> {
    let mut seen_exact = std::collections::HashSet::new();
    let mut kept: Vec<StoredMessage> = Vec::with_capacity(messages.len());

    for msg in messages {
        let prefix: String = msg.content.chars().take(80).collect();
        if !seen_exact.insert((msg.timestamp, msg.direction.as_str(), prefix)) {
            continue;
        }

        let within_window = |other: &StoredMessage| {
            (msg.timestamp - other.timestamp).num_seconds().abs() <= window_secs
        };

        // Consecutive same-direction duplicate.
        if let Some(last) = kept.last() {
            if last.direction == msg.direction
                && last.content == msg.content
                && within_window(last)
            {
                continue;
            }
        }

        // Cross-direction duplicate anywhere in the window.
        let cross_dup = kept.iter().rev().take_while(|k| within_window(k)).any(|k| {
            k.direction != msg.direction && k.content == msg.content
        });
        if cross_dup {
            continue;
        }

        kept.push(msg);
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(secs: i64, direction: Direction, content: &str) -> StoredMessage {
        StoredMessage {
            id: format!("m{secs}"),
            direction,
            content: content.to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn test_dedup_consecutive_same_direction() {
        let history = vec![
            msg(0, Direction::Inbound, "hello"),
            msg(10, Direction::Inbound, "hello"),
            msg(20, Direction::Inbound, "something else"),
        ];
        let deduped = dedup_history(history, 300);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].content, "hello");
        assert_eq!(deduped[1].content, "something else");
    }

    #[test]
    fn test_dedup_cross_direction() {
        let history = vec![
            msg(0, Direction::Outbound, "your plan is updated"),
            msg(30, Direction::Inbound, "thanks"),
            msg(60, Direction::Inbound, "your plan is updated"),
        ];
        let deduped = dedup_history(history, 300);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_dedup_outside_window_kept() {
        let history = vec![
            msg(0, Direction::Inbound, "hello"),
            msg(400, Direction::Inbound, "hello"),
        ];
        let deduped = dedup_history(history, 300);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_same_direction_nonconsecutive_kept() {
        // Identical same-direction text separated by another message does
        // not collapse — only consecutive repeats do.
        let history = vec![
            msg(0, Direction::Inbound, "how much protein?"),
            msg(30, Direction::Inbound, "per day I mean"),
            msg(60, Direction::Inbound, "how much protein?"),
        ];
        let deduped = dedup_history(history, 300);
        assert_eq!(deduped.len(), 3);
    }
}
