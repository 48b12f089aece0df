//! Configurations of the realignment.
//! Every field has a default, so a profile only needs to name what it changes.
use crate::comparer::{AlignmentComparer, ScoredComparer, ThresholdComparer};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealignConfig {
    pub threads: usize,
    /// Half width of the reference window cached for each bucket of the catalog.
    pub snippet_flank: i64,
    pub catalog: CatalogConfig,
    pub query: QueryOptions,
    pub search: SearchConfig,
    pub comparer: ComparerKind,
    pub threshold: ThresholdConfig,
    pub scored: ScoredConfig,
    pub evaluator: EvaluatorConfig,
    pub snowball: SnowballConfig,
}

impl Default for RealignConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            snippet_flank: 2_000,
            catalog: CatalogConfig::default(),
            query: QueryOptions::default(),
            search: SearchConfig::default(),
            comparer: ComparerKind::default(),
            threshold: ThresholdConfig::default(),
            scored: ScoredConfig::default(),
            evaluator: EvaluatorConfig::default(),
            snowball: SnowballConfig::default(),
        }
    }
}

impl RealignConfig {
    pub fn new(threads: usize) -> Self {
        Self {
            threads,
            ..Default::default()
        }
    }
    pub fn build_comparer(&self) -> Box<dyn AlignmentComparer> {
        match self.comparer {
            ComparerKind::Threshold => Box::new(ThresholdComparer::new(self.threshold.clone())),
            ComparerKind::Scored => Box::new(ScoredComparer::new(self.scored.clone())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub bucket_width: i64,
    /// Confirmed indels at most this far before the query position restrict the result.
    pub confirmed_upstream: i64,
    /// Confirmed indels at most this far after the query position restrict the result.
    pub confirmed_downstream: i64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            bucket_width: 1_000,
            confirmed_upstream: 50,
            confirmed_downstream: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct QueryOptions {
    pub max_results: usize,
    pub max_multi_extra: usize,
    pub max_distance: i64,
}

impl QueryOptions {
    pub fn new(max_results: usize, max_multi_extra: usize, max_distance: i64) -> Self {
        Self {
            max_results,
            max_multi_extra,
            max_distance,
        }
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(5, 3, 250)
    }
}

/// How the candidates are ordered before the search.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IndelRanking {
    /// Descending evidence score, then position.
    ScoreThenPosition,
    /// Distance to the nearest end of the read, then descending score.
    Proximity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub max_indel_size: usize,
    /// Upper bound of candidates entering the single/multi indel search.
    pub max_candidates: usize,
    pub allow_triples: bool,
    pub mask_softclip_mismatches: bool,
    pub min_unanchored_insertion_length: Option<usize>,
    pub mask_partial_insertions: bool,
    pub ranking: IndelRanking,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_indel_size: 50,
            max_candidates: 12,
            allow_triples: true,
            mask_softclip_mismatches: true,
            min_unanchored_insertion_length: None,
            mask_partial_insertions: false,
            ranking: IndelRanking::ScoreThenPosition,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComparerKind {
    Threshold,
    Scored,
}

impl Default for ComparerKind {
    fn default() -> Self {
        ComparerKind::Threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub min_mismatch_reduction: usize,
    pub min_mismatch_reduction_short: usize,
    pub min_mismatch_reduction_long: usize,
    pub max_new_mismatches: usize,
    pub max_new_mismatches_short: usize,
    pub max_total_mismatches: usize,
    pub max_total_mismatches_short: usize,
    /// Indels touching at most this many bases are short.
    pub short_indel_length: usize,
    /// Indels at least this long get the relaxed margin.
    pub long_indel_length: usize,
    /// Indels more frequent than this get the relaxed margin.
    pub high_frequency: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            min_mismatch_reduction: 3,
            min_mismatch_reduction_short: 2,
            min_mismatch_reduction_long: 2,
            max_new_mismatches: 1,
            max_new_mismatches_short: 0,
            max_total_mismatches: 2,
            max_total_mismatches_short: 1,
            short_indel_length: 3,
            long_indel_length: 9,
            high_frequency: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoredConfig {
    pub mismatch_coeff: f64,
    pub indel_coeff: f64,
    pub indel_length_coeff: f64,
    pub softclip_coeff: f64,
    pub anchor_coeff: f64,
}

impl Default for ScoredConfig {
    fn default() -> Self {
        Self {
            mismatch_coeff: 1f64,
            indel_coeff: 1.5,
            indel_length_coeff: 0.05,
            softclip_coeff: 0.5,
            anchor_coeff: -0.001,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    pub max_reference_span: usize,
    /// Reads with mapping quality at most this are rescued by a perfect realignment.
    pub low_mapq: u8,
    pub rescued_mapq: u8,
    /// Whether reads with mapping quality zero are rescued as well.
    pub rescue_zero_mapq: bool,
    pub softclip_unknown_indels: bool,
    /// Realign each mate with the indels found on both mates first.
    pub pair_aware: bool,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_reference_span: 500,
            low_mapq: 20,
            rescued_mapq: 40,
            rescue_zero_mapq: false,
            softclip_unknown_indels: true,
            pair_aware: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowballConfig {
    pub enabled: bool,
    /// Indels accepted at least this many times in the first pass are confirmed in the second.
    pub min_support: u32,
}

impl Default for SnowballConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_support: 2,
        }
    }
}
