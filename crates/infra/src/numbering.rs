use std::sync::atomic::{AtomicU64, Ordering};

use chrono::NaiveDate;

/// Human-readable request numbers: `<prefix>-<YYYYMMDD>-<seq:06>`.
///
/// The sequence is per generator and never repeats, across days too.
#[derive(Debug)]
pub struct RequestNumberGenerator {
    prefix: String,
    last: AtomicU64,
}

impl RequestNumberGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::starting_after(prefix, 0)
    }

    /// Continue after `last` (e.g. the highest sequence found on replay).
    pub fn starting_after(prefix: impl Into<String>, last: u64) -> Self {
        Self {
            prefix: prefix.into(),
            last: AtomicU64::new(last),
        }
    }

    pub fn next(&self, date: NaiveDate) -> String {
        let seq = self.last.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}-{}-{seq:06}", self.prefix, date.format("%Y%m%d"))
    }

    /// Move the counter past `seq` if it is behind.
    pub fn observe(&self, seq: u64) {
        self.last.fetch_max(seq, Ordering::SeqCst);
    }

    /// Sequence part of a number produced with this generator's prefix.
    pub fn parse_sequence(&self, number: &str) -> Option<u64> {
        let rest = number.strip_prefix(&self.prefix)?.strip_prefix('-')?;
        let (_, seq) = rest.split_once('-')?;
        seq.parse().ok()
    }
}
