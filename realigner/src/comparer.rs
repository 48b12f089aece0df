//! Which of two alignments is better, and whether a realignment is good enough
//! to replace the original.
use crate::config::{ScoredConfig, ThresholdConfig};
use crate::search::RealignmentResult;
use crate::summary::AlignmentSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preference {
    First,
    Second,
    Equal,
}

pub trait AlignmentComparer: Send + Sync {
    fn compare(&self, first: &AlignmentSummary, second: &AlignmentSummary) -> Preference;
    fn is_realignment_acceptable(&self, candidate: &RealignmentResult, original: &AlignmentSummary) -> bool;
}

/// Accepts a realignment only when it removes enough mismatches without bringing in new ones.
#[derive(Debug, Clone)]
pub struct ThresholdComparer {
    config: ThresholdConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndelClass {
    Short,
    Regular,
    /// Long or frequent indels. Relaxed margin.
    Trusted,
}

impl ThresholdComparer {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }
    fn classify(&self, candidate: &RealignmentResult) -> IndelClass {
        let config = &self.config;
        let trusted = candidate
            .indels
            .iter()
            .any(|indel| config.long_indel_length <= indel.length || config.high_frequency < indel.frequency);
        let short = !candidate.indels.is_empty()
            && candidate
                .indels
                .iter()
                .all(|indel| indel.length <= config.short_indel_length);
        match (trusted, short) {
            (true, _) => IndelClass::Trusted,
            (false, true) => IndelClass::Short,
            (false, false) => IndelClass::Regular,
        }
    }
}

impl AlignmentComparer for ThresholdComparer {
    fn compare(&self, first: &AlignmentSummary, second: &AlignmentSummary) -> Preference {
        let key = |s: &AlignmentSummary| {
            (
                s.num_mismatches_including_softclip,
                s.num_indels,
                s.num_mismatches,
                s.num_non_n_softclips,
                s.num_indel_bases,
            )
        };
        match key(first).cmp(&key(second)) {
            std::cmp::Ordering::Less => Preference::First,
            std::cmp::Ordering::Greater => Preference::Second,
            std::cmp::Ordering::Equal => Preference::Equal,
        }
    }
    fn is_realignment_acceptable(&self, candidate: &RealignmentResult, original: &AlignmentSummary) -> bool {
        let summary = &candidate.summary;
        let mismatches = summary.num_mismatches_including_softclip;
        if mismatches == 0 && original.has_indel() {
            return true;
        }
        let config = &self.config;
        let class = self.classify(candidate);
        let margin = match class {
            IndelClass::Trusted => config.min_mismatch_reduction_long,
            IndelClass::Short => config.min_mismatch_reduction_short,
            IndelClass::Regular => config.min_mismatch_reduction,
        };
        let (max_new, max_total) = match class {
            IndelClass::Short => (config.max_new_mismatches_short, config.max_total_mismatches_short),
            _ => (config.max_new_mismatches, config.max_total_mismatches),
        };
        let reduction = original
            .num_mismatches_including_softclip
            .saturating_sub(mismatches);
        if original.num_mismatches_including_softclip <= mismatches || reduction < margin {
            return false;
        }
        summary.new_mismatches(original) <= max_new && mismatches <= max_total
    }
}

/// Scores an alignment by a linear combination of its summary. Lower is better.
#[derive(Debug, Clone)]
pub struct ScoredComparer {
    config: ScoredConfig,
}

impl ScoredComparer {
    pub fn new(config: ScoredConfig) -> Self {
        Self { config }
    }
    pub fn score(&self, summary: &AlignmentSummary) -> f64 {
        let c = &self.config;
        c.mismatch_coeff * summary.num_mismatches as f64
            + c.indel_coeff * summary.num_indels as f64
            + c.indel_length_coeff * summary.num_indel_bases as f64
            + c.softclip_coeff * summary.num_non_n_softclips as f64
            + c.anchor_coeff * summary.anchor_length as f64
    }
}

const SCORE_EPS: f64 = 1e-9;

impl AlignmentComparer for ScoredComparer {
    fn compare(&self, first: &AlignmentSummary, second: &AlignmentSummary) -> Preference {
        let (first, second) = (self.score(first), self.score(second));
        if first + SCORE_EPS < second {
            Preference::First
        } else if second + SCORE_EPS < first {
            Preference::Second
        } else {
            Preference::Equal
        }
    }
    fn is_realignment_acceptable(&self, candidate: &RealignmentResult, original: &AlignmentSummary) -> bool {
        self.compare(&candidate.summary, original) == Preference::First
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use definitions::{Cigar, CandidateIndel};
    fn summary(mismatches: usize, softclip_mismatches: usize, indels: usize, positions: &[i64]) -> AlignmentSummary {
        AlignmentSummary {
            num_matches: 100,
            num_mismatches: mismatches,
            num_mismatches_including_softclip: mismatches + softclip_mismatches,
            num_indels: indels,
            num_indel_bases: indels,
            mismatch_positions: positions.to_vec(),
            ..Default::default()
        }
    }
    fn result(summary: AlignmentSummary, length: usize, frequency: f64) -> RealignmentResult {
        let deleted = vec![b'A'; length];
        let mut indel = CandidateIndel::deletion("chr1", 100, b'A', &deleted, 10f64);
        indel.frequency = frequency;
        RealignmentResult {
            position: 50,
            cigar: Cigar::default(),
            summary,
            indels: vec![indel],
            failed_left_anchor: false,
            failed_right_anchor: false,
        }
    }
    #[test]
    fn threshold_margin() {
        let comparer = ThresholdComparer::new(ThresholdConfig::default());
        let original = summary(4, 0, 0, &[101, 102, 103, 104]);
        // Regular indel: needs a reduction of three.
        let candidate = result(summary(1, 0, 1, &[101]), 5, 0f64);
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
        let candidate = result(summary(2, 0, 1, &[101, 102]), 5, 0f64);
        assert!(!comparer.is_realignment_acceptable(&candidate, &original));
        // Long indel: a reduction of two is enough.
        let candidate = result(summary(2, 0, 1, &[101, 102]), 10, 0f64);
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
        // Frequent indel as well.
        let candidate = result(summary(2, 0, 1, &[101, 102]), 5, 0.5);
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
    }
    #[test]
    fn threshold_new_mismatches() {
        let comparer = ThresholdComparer::new(ThresholdConfig::default());
        let original = summary(5, 0, 0, &[101, 102, 103, 104, 105]);
        let candidate = result(summary(2, 0, 1, &[150, 151]), 5, 0f64);
        assert!(!comparer.is_realignment_acceptable(&candidate, &original));
        let candidate = result(summary(2, 0, 1, &[101, 151]), 5, 0f64);
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
        // Short indels tolerate no new mismatch and one mismatch in total.
        let candidate = result(summary(1, 0, 1, &[151]), 2, 0f64);
        assert!(!comparer.is_realignment_acceptable(&candidate, &original));
        let candidate = result(summary(1, 0, 1, &[101]), 2, 0f64);
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
        let candidate = result(summary(2, 0, 1, &[101, 102]), 2, 0f64);
        assert!(!comparer.is_realignment_acceptable(&candidate, &original));
    }
    #[test]
    fn threshold_perfect_over_indel() {
        let comparer = ThresholdComparer::new(ThresholdConfig::default());
        let original = summary(1, 0, 1, &[120]);
        let candidate = result(summary(0, 0, 1, &[]), 5, 0f64);
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
        // Without an indel in the original, the margin still applies.
        let original = summary(1, 0, 0, &[120]);
        assert!(!comparer.is_realignment_acceptable(&candidate, &original));
    }
    #[test]
    fn threshold_compare() {
        let comparer = ThresholdComparer::new(ThresholdConfig::default());
        let a = summary(1, 0, 1, &[]);
        let b = summary(0, 2, 1, &[]);
        assert_eq!(comparer.compare(&a, &b), Preference::First);
        assert_eq!(comparer.compare(&b, &a), Preference::Second);
        assert_eq!(comparer.compare(&a, &a), Preference::Equal);
        let c = summary(1, 0, 2, &[]);
        assert_eq!(comparer.compare(&a, &c), Preference::First);
    }
    #[test]
    fn scored() {
        let comparer = ScoredComparer::new(ScoredConfig::default());
        let original = summary(3, 0, 0, &[]);
        let candidate = result(summary(0, 0, 1, &[]), 2, 0f64);
        assert!(comparer.score(&candidate.summary) < comparer.score(&original));
        assert!(comparer.is_realignment_acceptable(&candidate, &original));
        assert_eq!(comparer.compare(&original, &original), Preference::Equal);
        // Ties keep the original.
        let tied = result(original.clone(), 2, 0f64);
        assert!(!comparer.is_realignment_acceptable(&tied, &original));
        let original = summary(1, 0, 0, &[]);
        assert!(!comparer.is_realignment_acceptable(&candidate, &original));
    }
}
