//! Reply record database operations

use async_trait::async_trait;
use rusqlite::Result as SqliteResult;

use super::super::{Database, ReplyStore};
use crate::models::ReplyRecord;

impl Database {
    /// Append a reply record
    pub fn insert_reply_record(&self, record: &ReplyRecord) -> SqliteResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO reply_records (
                mentioned_conversation_tweet_id, mentioned_conversation_tweet_text,
                tweet_response_id, tweet_response_text,
                tweet_response_created_at, mentioned_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                record.mentioned_conversation_tweet_id,
                record.mentioned_conversation_tweet_text,
                record.tweet_response_id,
                record.tweet_response_text,
                record.tweet_response_created_at,
                record.mentioned_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List all reply records in insertion order
    pub fn list_reply_records(&self) -> SqliteResult<Vec<ReplyRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT mentioned_conversation_tweet_id, mentioned_conversation_tweet_text,
                    tweet_response_id, tweet_response_text,
                    tweet_response_created_at, mentioned_at
             FROM reply_records ORDER BY id",
        )?;

        let records = stmt
            .query_map([], |row| Self::map_reply_record_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(records)
    }

    fn map_reply_record_row(row: &rusqlite::Row) -> SqliteResult<ReplyRecord> {
        Ok(ReplyRecord {
            mentioned_conversation_tweet_id: row.get(0)?,
            mentioned_conversation_tweet_text: row.get(1)?,
            tweet_response_id: row.get(2)?,
            tweet_response_text: row.get(3)?,
            tweet_response_created_at: row.get(4)?,
            mentioned_at: row.get(5)?,
        })
    }
}

#[async_trait]
impl ReplyStore for Database {
    async fn query_all(&self) -> Result<Vec<ReplyRecord>, String> {
        self.list_reply_records()
            .map_err(|e| format!("Failed to list reply records: {}", e))
    }

    async fn append(&self, record: &ReplyRecord) -> Result<(), String> {
        self.insert_reply_record(record)
            .map(|_| ())
            .map_err(|e| format!("Failed to insert reply record: {}", e))
    }
}
