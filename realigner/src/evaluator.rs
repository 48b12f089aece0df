//! Realignment evaluator -- decides, read by read, whether to realign, and rewrites the
//! record when a realignment is accepted.
use crate::catalog::IndelCatalog;
use crate::co_occurrence::CoOccurrence;
use crate::comparer::{AlignmentComparer, Preference};
use crate::config::{EvaluatorConfig, QueryOptions, RealignConfig};
use crate::error::{RealignError, Result};
use crate::evidence::EvidenceCounts;
use crate::pair_indels::{extract_indels, find_pair_indels};
use crate::reference::SnippetSource;
use crate::search::{RealignmentResult, Realigner};
use crate::summary::{summarize, AlignmentSummary};
use definitions::{AlignmentRecord, CandidateIndel, Cigar, GenomeSnippet, Op, ReadPair};
use serde::{Deserialize, Serialize};

/// Diagnostic note attached to every evaluated read.
pub const NOTE_TAG: &str = "XR";
/// Cigar before realignment.
pub const ORIGINAL_CIGAR_TAG: &str = "OC";
/// `matches-softclips-mismatches-insertions-indels` of the original alignment.
pub const ORIGINAL_SIGNATURE_TAG: &str = "XO";
pub const NEW_SIGNATURE_TAG: &str = "XN";

pub const NO_INDELS: &str = "No indels to realign to";
pub const IDENTICAL: &str = "Realignment identical to original";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Outcome {
    Unchanged,
    Realigned,
    ForcedSoftclip,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Evaluation {
    pub outcome: Outcome,
    /// The record to write out, rewritten or not, with its diagnostic tags.
    pub record: AlignmentRecord,
    /// The best realignment found, accepted or not.
    pub result: Option<RealignmentResult>,
}

#[derive(Debug, Clone)]
pub struct PairEvaluation {
    pub name: String,
    pub read1: Evaluation,
    pub read2: Option<Evaluation>,
}

impl PairEvaluation {
    pub fn evaluations(&self) -> impl Iterator<Item = &Evaluation> {
        std::iter::once(&self.read1).chain(self.read2.iter())
    }
}

fn annotate(read: &AlignmentRecord, outcome: Outcome, note: &str, result: Option<RealignmentResult>) -> Evaluation {
    let mut record = read.clone();
    record.tags.insert(NOTE_TAG.to_string(), note.to_string());
    Evaluation {
        outcome,
        record,
        result,
    }
}

pub struct Evaluator<'a> {
    config: &'a EvaluatorConfig,
    query: &'a QueryOptions,
    catalog: &'a IndelCatalog,
    source: &'a dyn SnippetSource,
    comparer: &'a dyn AlignmentComparer,
    realigner: Realigner<'a>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        config: &'a RealignConfig,
        catalog: &'a IndelCatalog,
        source: &'a dyn SnippetSource,
        comparer: &'a dyn AlignmentComparer,
        groups: Option<&'a CoOccurrence>,
    ) -> Self {
        Self {
            config: &config.evaluator,
            query: &config.query,
            catalog,
            source,
            comparer,
            realigner: Realigner::new(&config.search, comparer, groups),
        }
    }
    /// Evaluate both mates. With pair-aware realignment, each mate first tries the
    /// indels its pair carries.
    pub fn evaluate_pair(
        &self,
        pair: &ReadPair,
        confirmed: Option<&[CandidateIndel]>,
        evidence: &mut EvidenceCounts,
    ) -> Result<PairEvaluation> {
        let pre_selected = match self.config.pair_aware {
            true => {
                let read1 = extract_indels(&pair.read1, self.source);
                let read2 = match pair.read2.as_ref() {
                    Some(read2) => extract_indels(read2, self.source),
                    None => vec![],
                };
                find_pair_indels(pair, &read1, &read2)
            }
            false => vec![],
        };
        let pre_selected = (!pre_selected.is_empty()).then_some(pre_selected.as_slice());
        let read1 = self.evaluate(&pair.read1, pre_selected, confirmed, evidence)?;
        let read2 = match pair.read2.as_ref() {
            Some(read2) => Some(self.evaluate(read2, pre_selected, confirmed, evidence)?),
            None => None,
        };
        Ok(PairEvaluation {
            name: pair.name.clone(),
            read1,
            read2,
        })
    }
    /// Evaluate a read. A malformed record ends as [Outcome::Failed];
    /// every other error is returned.
    pub fn evaluate(
        &self,
        read: &AlignmentRecord,
        pre_selected: Option<&[CandidateIndel]>,
        confirmed: Option<&[CandidateIndel]>,
        evidence: &mut EvidenceCounts,
    ) -> Result<Evaluation> {
        match self.try_evaluate(read, pre_selected, confirmed, evidence) {
            Err(why) if !why.is_fatal() => {
                warn!("FAILED\t{}\t{}", read.name, why);
                Ok(annotate(read, Outcome::Failed, &why.to_string(), None))
            }
            x => x,
        }
    }
    fn ineligible(&self, read: &AlignmentRecord) -> Option<&'static str> {
        let cigar = &read.cigar;
        if cigar.is_empty() {
            Some("Empty cigar")
        } else if read.is_duplicate || read.is_secondary {
            Some("Duplicate or secondary alignment")
        } else if cigar.ops().iter().all(|op| matches!(op, Op::Match(_))) && read.num_mismatches == Some(0) {
            Some("Perfectly aligned")
        } else if read.is_homopolymer() {
            Some("Homopolymer read")
        } else if self.config.max_reference_span < read.reference_span() {
            Some("Reference span too long")
        } else {
            None
        }
    }
    fn try_evaluate(
        &self,
        read: &AlignmentRecord,
        pre_selected: Option<&[CandidateIndel]>,
        confirmed: Option<&[CandidateIndel]>,
        evidence: &mut EvidenceCounts,
    ) -> Result<Evaluation> {
        if let Some(note) = self.ineligible(read) {
            return Ok(annotate(read, Outcome::Unchanged, note, None));
        }
        if read.cigar.query_length() != read.seq().len() {
            return Err(RealignError::MalformedRecord {
                name: read.name.clone(),
                reason: format!("cigar {} does not span {} bases", read.cigar, read.seq().len()),
            });
        }
        let candidates = self.catalog.query(read.position, pre_selected, confirmed, self.query);
        if candidates.is_empty() {
            return Ok(annotate(read, Outcome::Unchanged, NO_INDELS, None));
        }
        let (start, end) = (read.unclipped_start(), read.unclipped_end());
        let snippet = candidates
            .iter()
            .map(|&(_, snippet)| snippet)
            .find(|s| s.contains(start) && s.contains(end))
            .or_else(|| {
                self.catalog
                    .snippet_near(read.position)
                    .filter(|s| s.contains(read.position))
            });
        let snippet = match snippet {
            Some(snippet) => snippet,
            None => return Ok(annotate(read, Outcome::Unchanged, "No reference window covering the read", None)),
        };
        let original = summarize(read.seq(), read.position, &read.cigar, snippet);
        let mut result = None;
        let mut from_pair = false;
        if let Some(pre_selected) = pre_selected {
            let restricted: Vec<&CandidateIndel> = candidates
                .iter()
                .map(|&(indel, _)| indel)
                .filter(|indel| pre_selected.iter().any(|p| p.same_variant(indel)))
                .collect();
            if !restricted.is_empty() {
                result = self.realigner.realign(read, &restricted, snippet, true)?;
                from_pair = result.is_some();
            }
        }
        if result.is_none() {
            let all: Vec<&CandidateIndel> = candidates.iter().map(|&(indel, _)| indel).collect();
            result = self.realigner.realign(read, &all, snippet, false)?;
        }
        let result = match result {
            Some(result) => result,
            None => return Ok(annotate(read, Outcome::Unchanged, "No realignment found", None)),
        };
        if result.position == read.position && result.cigar == read.cigar {
            return Ok(annotate(read, Outcome::Unchanged, IDENTICAL, Some(result)));
        }
        let accept = (from_pair && self.comparer.compare(&result.summary, &original) != Preference::Second)
            || self.comparer.is_realignment_acceptable(&result, &original);
        if accept {
            let delta = original.num_mismatches_including_softclip as i64
                - result.summary.num_mismatches_including_softclip as i64;
            evidence.record_accepted(&result.indels, delta);
            let record = self.rewrite(read, &original, &result);
            ensure_aligned(&record)?;
            debug!("REALIGNED\t{}\t{}\t{}\t{}", read.name, read.cigar, record.cigar, record.position);
            return Ok(Evaluation {
                outcome: Outcome::Realigned,
                record,
                result: Some(result),
            });
        }
        evidence.record_rejected(&result.indels);
        let unknown = read.has_indel() || read.cigar.has_interior_softclip();
        if self.config.softclip_unknown_indels && unknown {
            if let Some(record) = force_softclip(read, snippet) {
                ensure_aligned(&record)?;
                debug!("FORCECLIP\t{}\t{}\t{}", read.name, read.cigar, record.cigar);
                return Ok(Evaluation {
                    outcome: Outcome::ForcedSoftclip,
                    record,
                    result: Some(result),
                });
            }
        }
        Ok(annotate(read, Outcome::Unchanged, "Realignment rejected", Some(result)))
    }
    fn rewrite(&self, read: &AlignmentRecord, original: &AlignmentSummary, result: &RealignmentResult) -> AlignmentRecord {
        let mut record = read.clone();
        record.position = result.position;
        record.cigar = result.cigar.clone();
        let summary = &result.summary;
        record.num_mismatches = Some((summary.num_mismatches + summary.num_indel_bases) as u32);
        let tags = &mut record.tags;
        tags.insert(ORIGINAL_CIGAR_TAG.to_string(), read.cigar.to_string());
        tags.insert(ORIGINAL_SIGNATURE_TAG.to_string(), original.signature());
        tags.insert(NEW_SIGNATURE_TAG.to_string(), summary.signature());
        let indels: Vec<_> = result.indels.iter().map(|i| i.key()).collect();
        tags.insert(NOTE_TAG.to_string(), format!("Realigned to {}", indels.join(",")));
        let config = self.config;
        let low = read.mapq <= config.low_mapq && (0 < read.mapq || config.rescue_zero_mapq);
        if low && summary.num_mismatches == 0 {
            record.mapq = config.rescued_mapq;
        }
        record
    }
}

fn ensure_aligned(record: &AlignmentRecord) -> Result<()> {
    match record.cigar.ops().iter().any(|op| matches!(op, Op::Match(_))) {
        true => Ok(()),
        false => Err(RealignError::Invariant {
            name: record.name.clone(),
            reason: format!("no aligned base left in {}", record.cigar),
        }),
    }
}

/// Soft-clip the read from its first indel, or interior soft-clip, to the end.
/// `None` if nothing aligned would be left before it.
fn force_softclip(read: &AlignmentRecord, reference: &GenomeSnippet) -> Option<AlignmentRecord> {
    let ops = read.cigar.ops();
    let last = ops.len().saturating_sub(1);
    let first = ops
        .iter()
        .enumerate()
        .position(|(i, op)| op.is_indel() || (matches!(op, Op::SoftClip(_)) && 0 < i && i < last))?;
    let (head, tail) = ops.split_at(first);
    if !head.iter().any(|op| matches!(op, Op::Match(_))) {
        return None;
    }
    let clipped: usize = tail.iter().filter(|op| op.consumes_query()).map(Op::len).sum();
    let mut kept = head.to_vec();
    kept.push(Op::SoftClip(clipped));
    let mut record = read.clone();
    record.cigar = Cigar::new(kept);
    let summary = summarize(record.seq(), record.position, &record.cigar, reference);
    record.num_mismatches = Some(summary.num_mismatches as u32);
    record
        .tags
        .insert(ORIGINAL_CIGAR_TAG.to_string(), read.cigar.to_string());
    record
        .tags
        .insert(NOTE_TAG.to_string(), "Forced softclip of unconfirmed indel".to_string());
    Some(record)
}
