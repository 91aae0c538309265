use serde::Serialize;

/// Counters for a single triage run. A fresh value is produced by every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Mentions fetched in the lookback window, before the per-run cap
    pub mentions_found: usize,
    pub mentions_replied: usize,
    /// Replies that could not be generated or posted
    pub mentions_replied_errors: usize,
}
