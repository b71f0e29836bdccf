use std::collections::HashMap;

use crate::model::mongodb::Id;

/// Ballot counts per candidate within one election.
///
/// Candidates keep the election's ordering, and every candidate of the
/// election appears, with a zero count if nobody voted for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    counts: Vec<(Id, u64)>,
}

impl Tally {
    /// Build a tally for `candidates` from raw per-candidate ballot counts.
    /// Counts for candidates outside the election are ignored.
    pub fn new(candidates: &[Id], counts: &HashMap<Id, u64>) -> Self {
        let counts = candidates
            .iter()
            .map(|candidate| (*candidate, counts.get(candidate).copied().unwrap_or(0)))
            .collect();
        Self { counts }
    }

    pub fn counts(&self) -> &[(Id, u64)] {
        &self.counts
    }

    pub fn count(&self, candidate: Id) -> Option<u64> {
        self.counts
            .iter()
            .find(|(id, _)| *id == candidate)
            .map(|(_, count)| *count)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    /// All candidates sharing the highest count. Empty if nobody has voted.
    pub fn winners(&self) -> Vec<Id> {
        let max = self.counts.iter().map(|(_, count)| *count).max().unwrap_or(0);
        if max == 0 {
            return Vec::new();
        }
        self.counts
            .iter()
            .filter(|(_, count)| *count == max)
            .map(|(id, _)| *id)
            .collect()
    }
}
