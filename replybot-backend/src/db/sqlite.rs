use rusqlite::{Connection, Result as SqliteResult};
use std::path::Path;
use std::sync::Mutex;

pub struct Database {
    pub(super) conn: Mutex<Connection>,
}

impl Database {
    pub fn new(database_url: &str) -> SqliteResult<Self> {
        let conn = if database_url == ":memory:" {
            Connection::open_in_memory()?
        } else {
            // Create parent directory if it doesn't exist
            if let Some(parent) = Path::new(database_url).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).ok();
                }
            }
            Connection::open(database_url)?
        };

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> SqliteResult<()> {
        let conn = self.conn.lock().unwrap();

        // Reply log (one row per posted reply; deliberately no UNIQUE constraint,
        // dedup happens before posting)
        conn.execute(
            "CREATE TABLE IF NOT EXISTS reply_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mentioned_conversation_tweet_id TEXT NOT NULL,
                mentioned_conversation_tweet_text TEXT NOT NULL,
                tweet_response_id TEXT NOT NULL,
                tweet_response_text TEXT NOT NULL,
                tweet_response_created_at TEXT NOT NULL,
                mentioned_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_reply_records_conversation
             ON reply_records(mentioned_conversation_tweet_id)",
            [],
        )?;

        Ok(())
    }
}
