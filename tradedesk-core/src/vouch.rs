//! Vouch ledger: append-only endorsements per target user.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{BotError, BotResult};
use crate::ids::UserId;

/// How many of the most recent vouches a stats query shows.
pub const STATS_WINDOW: usize = 10;

pub type VouchMap = BTreeMap<UserId, VouchRecord>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VouchEntry {
    pub voucher: UserId,
    pub reason: String,
}

/// All vouches left for one user.
///
/// `count` always equals the number of entries; it is kept in the document
/// for readers of the JSON file and recomputed when loading.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "StoredVouchRecord")]
pub struct VouchRecord {
    count: u64,
    #[serde(rename = "vouches")]
    entries: Vec<VouchEntry>,
}

#[derive(Deserialize)]
struct StoredVouchRecord {
    #[serde(default)]
    count: u64,
    #[serde(default)]
    vouches: Vec<VouchEntry>,
}

impl From<StoredVouchRecord> for VouchRecord {
    fn from(stored: StoredVouchRecord) -> Self {
        let actual = stored.vouches.len() as u64;
        if stored.count != actual {
            warn!(
                "Stored vouch count {} disagrees with {} entries; using entry count",
                stored.count, actual
            );
        }
        Self {
            count: actual,
            entries: stored.vouches,
        }
    }
}

impl VouchRecord {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn entries(&self) -> &[VouchEntry] {
        &self.entries
    }

    fn push(&mut self, entry: VouchEntry) {
        self.entries.push(entry);
        self.count = self.entries.len() as u64;
    }
}

/// Result of a stats query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VouchStats {
    pub target: UserId,
    pub total: u64,
    /// Most recent entries, oldest first.
    pub recent: Vec<VouchEntry>,
}

/// Append a vouch for `target`, creating its record if needed. Returns the new total.
pub fn record_vouch(
    vouches: &mut VouchMap,
    voucher: UserId,
    target: UserId,
    reason: impl Into<String>,
) -> u64 {
    let record = vouches.entry(target).or_default();
    record.push(VouchEntry {
        voucher,
        reason: reason.into(),
    });
    record.count()
}

pub fn stats(vouches: &VouchMap, target: UserId) -> BotResult<VouchStats> {
    let record = vouches.get(&target).ok_or(BotError::NoRecord(target))?;
    let skip = record.entries.len().saturating_sub(STATS_WINDOW);
    Ok(VouchStats {
        target,
        total: record.count(),
        recent: record.entries[skip..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_two_vouches_in_call_order() {
        let mut vouches = VouchMap::new();
        assert_eq!(record_vouch(&mut vouches, UserId(1), UserId(9), "great trade"), 1);
        assert_eq!(record_vouch(&mut vouches, UserId(2), UserId(9), "fast"), 2);

        let stats = stats(&vouches, UserId(9)).unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(
            stats.recent,
            vec![
                VouchEntry {
                    voucher: UserId(1),
                    reason: "great trade".to_string()
                },
                VouchEntry {
                    voucher: UserId(2),
                    reason: "fast".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_stats_without_record() {
        let vouches = VouchMap::new();
        assert!(matches!(
            stats(&vouches, UserId(4)),
            Err(BotError::NoRecord(UserId(4)))
        ));
    }

    #[test]
    fn test_stats_shows_last_ten() {
        let mut vouches = VouchMap::new();
        for i in 0..15 {
            record_vouch(&mut vouches, UserId(i), UserId(9), format!("r{}", i));
        }
        let stats = stats(&vouches, UserId(9)).unwrap();
        assert_eq!(stats.total, 15);
        assert_eq!(stats.recent.len(), STATS_WINDOW);
        assert_eq!(stats.recent[0].reason, "r5");
        assert_eq!(stats.recent[9].reason, "r14");
    }

    #[test]
    fn test_document_format() {
        let mut vouches = VouchMap::new();
        record_vouch(&mut vouches, UserId(1), UserId(9), "ok");
        let json = serde_json::to_value(&vouches).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"9": {"count": 1, "vouches": [{"voucher": 1, "reason": "ok"}]}})
        );
    }

    #[test]
    fn test_load_recomputes_count() {
        let json = r#"{"9": {"count": 7, "vouches": [{"voucher": "1", "reason": "ok"}]}}"#;
        let vouches: VouchMap = serde_json::from_str(json).unwrap();
        assert_eq!(vouches[&UserId(9)].count(), 1);
    }

    proptest! {
        /// Property: count tracks the entry list and order follows call order.
        #[test]
        fn count_matches_entries(calls in prop::collection::vec((0u64..5, 0u64..5, "[a-z]{0,8}"), 0..40)) {
            let mut vouches = VouchMap::new();
            for (voucher, target, reason) in &calls {
                record_vouch(&mut vouches, UserId(*voucher), UserId(*target), reason.clone());
            }
            for (target, record) in &vouches {
                prop_assert_eq!(record.count(), record.entries().len() as u64);
                let expected: Vec<&String> = calls
                    .iter()
                    .filter(|(_, t, _)| UserId(*t) == *target)
                    .map(|(_, _, r)| r)
                    .collect();
                let actual: Vec<&String> = record.entries().iter().map(|e| &e.reason).collect();
                prop_assert_eq!(actual, expected);
            }
        }
    }
}
