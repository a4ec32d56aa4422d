// src/provenance.rs

use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

/// Lineage shared by every row one run writes, in both tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub run_id: String,
    pub load_ts: DateTime<Utc>,
}

impl Provenance {
    /// Fresh run id and the current time, truncated to the microsecond the warehouse stores.
    pub fn new_run() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            load_ts: Utc::now().trunc_subsecs(6),
        }
    }

    pub fn load_ts_micros(&self) -> i64 {
        self.load_ts.timestamp_micros()
    }
}
