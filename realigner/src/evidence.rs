//! How often each indel was accepted or rejected, and how many mismatches it removed.
use definitions::CandidateIndel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndelEvidence {
    pub accepted: u32,
    pub rejected: u32,
    /// Mismatches removed by accepted realignments, summed.
    pub mismatch_delta: i64,
}

/// Keyed by [CandidateIndel::key].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceCounts {
    counts: BTreeMap<String, IndelEvidence>,
}

impl EvidenceCounts {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
    pub fn len(&self) -> usize {
        self.counts.len()
    }
    pub fn get(&self, key: &str) -> Option<&IndelEvidence> {
        self.counts.get(key)
    }
    pub fn iter(&self) -> impl Iterator<Item = (&String, &IndelEvidence)> {
        self.counts.iter()
    }
    pub fn record_accepted(&mut self, indels: &[CandidateIndel], mismatch_delta: i64) {
        for indel in indels {
            let entry = self.counts.entry(indel.key()).or_default();
            entry.accepted += 1;
            entry.mismatch_delta += mismatch_delta;
        }
    }
    pub fn record_rejected(&mut self, indels: &[CandidateIndel]) {
        for indel in indels {
            self.counts.entry(indel.key()).or_default().rejected += 1;
        }
    }
    /// Sum two dictionaries. Counts are only ever added.
    pub fn merge(mut self, other: Self) -> Self {
        for (key, evidence) in other.counts {
            let entry = self.counts.entry(key).or_default();
            entry.accepted += evidence.accepted;
            entry.rejected += evidence.rejected;
            entry.mismatch_delta += evidence.mismatch_delta;
        }
        self
    }
    /// Keys of the indels accepted at least `min_support` times.
    pub fn supported(&self, min_support: u32) -> impl Iterator<Item = &String> {
        self.counts
            .iter()
            .filter(move |(_, e)| min_support <= e.accepted)
            .map(|(key, _)| key)
    }
    pub fn to_tsv<W: std::io::Write>(&self, wtr: &mut W) -> std::io::Result<()> {
        writeln!(wtr, "indel\taccepted\trejected\tmismatch_delta")?;
        for (key, e) in self.counts.iter() {
            writeln!(wtr, "{key}\t{}\t{}\t{}", e.accepted, e.rejected, e.mismatch_delta)?;
        }
        Ok(())
    }
}
