pub mod mention;
pub mod reply_record;
pub mod run_stats;

pub use mention::{ConversationTweet, Mention, PostedReply};
pub use reply_record::ReplyRecord;
pub use run_stats::RunStats;
