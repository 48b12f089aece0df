//! Realignment search -- tries one, two or three candidate indels on a read and
//! returns the best alignment it can build.
//!
//! Each combination is placed twice, once anchored at the left end of the read and
//! once at the right end. Placement never runs a dynamic programming alignment; it
//! only moves the coordinates of a [PositionMap](crate::position_map::PositionMap).
use crate::co_occurrence::CoOccurrence;
use crate::comparer::{AlignmentComparer, Preference};
use crate::config::{IndelRanking, SearchConfig};
use crate::error::{RealignError, Result};
use crate::position_map::{Anchor, MapSlot, PositionMap};
use crate::summary::{is_unknown, summarize, AlignmentSummary};
use definitions::{AlignmentRecord, CandidateIndel, Cigar, GenomeSnippet, Op};

#[derive(Debug, Clone, PartialEq)]
pub struct RealignmentResult {
    pub position: i64,
    pub cigar: Cigar,
    pub summary: AlignmentSummary,
    /// The indels placed, in reference order.
    pub indels: Vec<CandidateIndel>,
    pub failed_left_anchor: bool,
    pub failed_right_anchor: bool,
}

/// Whether two indels can be carried by the same read.
pub fn can_coexist(a: &CandidateIndel, b: &CandidateIndel) -> bool {
    if a.position == b.position
        && (a.indel_type == b.indel_type || a.sequence().eq_ignore_ascii_case(b.sequence()))
    {
        return false;
    }
    // An insertion between two deleted bases.
    let inside = |(start, end): (i64, i64), ins: &CandidateIndel| start <= ins.position && ins.position < end;
    match (a.deleted_span(), b.deleted_span()) {
        (Some((s1, e1)), Some((s2, e2))) => e1 < s2 || e2 < s1,
        (Some(span), None) => !inside(span, b),
        (None, Some(span)) => !inside(span, a),
        (None, None) => true,
    }
}

/// Reference order. Insertions come first at a tied position.
fn sort_indels(indels: &mut [&CandidateIndel]) {
    indels.sort_by_key(|indel| (indel.position, indel.indel_type));
}

/// The part of a read open to indel placement, with runs of N at both ends set aside.
#[derive(Debug, Clone)]
struct ReadLayout<'r> {
    seq: &'r [u8],
    n_prefix: usize,
    n_suffix: usize,
    /// Coordinate of the first and the last placeable base, if aligned without gaps.
    start: i64,
    end: i64,
    /// Placeable bases that were soft-clipped in the original alignment.
    clipped_head: usize,
    clipped_tail: usize,
}

impl<'r> ReadLayout<'r> {
    fn new(read: &'r AlignmentRecord) -> Result<Self> {
        let seq = read.seq();
        let malformed = |reason: &str| RealignError::MalformedRecord {
            name: read.name.clone(),
            reason: reason.to_string(),
        };
        if read.cigar.query_length() != seq.len() {
            return Err(malformed("cigar does not span the sequence"));
        }
        if !read.cigar.ops().iter().any(|op| matches!(op, Op::Match(_))) {
            return Err(malformed("no aligned base"));
        }
        let n_prefix = seq.iter().take_while(|&&b| is_unknown(b)).count();
        let n_suffix = match n_prefix == seq.len() {
            true => 0,
            false => seq.iter().rev().take_while(|&&b| is_unknown(b)).count(),
        };
        Ok(Self {
            seq: &seq[n_prefix..seq.len() - n_suffix],
            n_prefix,
            n_suffix,
            start: read.unclipped_start() + n_prefix as i64,
            end: read.unclipped_end() - n_suffix as i64,
            clipped_head: read.cigar.leading_softclip().saturating_sub(n_prefix),
            clipped_tail: read.cigar.trailing_softclip().saturating_sub(n_suffix),
        })
    }
}

pub struct Realigner<'a> {
    config: &'a SearchConfig,
    comparer: &'a dyn AlignmentComparer,
    groups: Option<&'a CoOccurrence>,
}

impl<'a> Realigner<'a> {
    pub fn new(config: &'a SearchConfig, comparer: &'a dyn AlignmentComparer, groups: Option<&'a CoOccurrence>) -> Self {
        Self {
            config,
            comparer,
            groups,
        }
    }
    fn rank(&self, read: &AlignmentRecord, candidates: &mut [&CandidateIndel]) {
        match self.config.ranking {
            IndelRanking::ScoreThenPosition => candidates.sort_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then(a.position.cmp(&b.position))
                    .then_with(|| a.key().cmp(&b.key()))
            }),
            IndelRanking::Proximity => {
                let (start, end) = (read.unclipped_start(), read.unclipped_end());
                let distance = |i: &CandidateIndel| (i.position - start).abs().min((i.position - end).abs());
                candidates.sort_by(|a, b| {
                    distance(a)
                        .cmp(&distance(b))
                        .then(b.score.total_cmp(&a.score))
                        .then_with(|| a.key().cmp(&b.key()))
                })
            }
        }
    }
    fn is_better(&self, result: &RealignmentResult, best: &Option<RealignmentResult>) -> bool {
        match best {
            Some(best) => self.comparer.compare(&result.summary, &best.summary) == Preference::First,
            None => true,
        }
    }
    /// The best realignment of `read` carrying one, two or three of `candidates`.
    /// With `pair_specific`, the candidates are tried in the order given.
    pub fn realign(
        &self,
        read: &AlignmentRecord,
        candidates: &[&CandidateIndel],
        reference: &GenomeSnippet,
        pair_specific: bool,
    ) -> Result<Option<RealignmentResult>> {
        let reach = 3 * self.config.max_indel_size as i64;
        let (start, end) = (read.unclipped_start() - reach, read.unclipped_end() + reach);
        let mut candidates: Vec<&CandidateIndel> = candidates
            .iter()
            .filter(|indel| start <= indel.position && indel.position <= end)
            .copied()
            .collect();
        if !pair_specific {
            self.rank(read, &mut candidates);
        }
        candidates.truncate(self.config.max_candidates);
        let mut best: Option<RealignmentResult> = None;
        for &indel in candidates.iter() {
            if let Some(result) = self.realign_to_targets(read, &[indel], reference)? {
                let perfect = result.summary.num_mismatches_including_softclip == 0
                    && result.summary.num_non_n_softclips == 0;
                if self.is_better(&result, &best) {
                    best = Some(result);
                }
                if perfect {
                    trace!("PERFECT\t{}\t{}", read.name, indel);
                    return Ok(best);
                }
            }
        }
        let groups = match self.groups {
            Some(groups) if !groups.is_empty() => groups,
            _ => return Ok(best),
        };
        let n = candidates.len();
        for i in 0..n {
            for j in i + 1..n {
                let (a, b) = (candidates[i], candidates[j]);
                if !groups.contains_pair(a, b) || !can_coexist(a, b) {
                    continue;
                }
                if let Some(result) = self.realign_to_targets(read, &[a, b], reference)? {
                    if self.is_better(&result, &best) {
                        best = Some(result);
                    }
                }
            }
        }
        let unresolved = |best: &Option<RealignmentResult>| {
            best.as_ref()
                .map_or(true, |b| 0 < b.summary.num_mismatches_including_softclip)
        };
        if !self.config.allow_triples || !unresolved(&best) {
            return Ok(best);
        }
        for i in 0..n {
            for j in i + 1..n {
                if !can_coexist(candidates[i], candidates[j]) {
                    continue;
                }
                for k in j + 1..n {
                    let (a, b, c) = (candidates[i], candidates[j], candidates[k]);
                    if !groups.contains_triple(a, b, c) || !can_coexist(a, c) || !can_coexist(b, c) {
                        continue;
                    }
                    if let Some(result) = self.realign_to_targets(read, &[a, b, c], reference)? {
                        if self.is_better(&result, &best) {
                            best = Some(result);
                        }
                    }
                }
            }
        }
        Ok(best)
    }
    /// Place all of `indels` into `read`, from the left and from the right, and keep the better.
    /// `None` if neither placement fits the read.
    pub fn realign_to_targets(
        &self,
        read: &AlignmentRecord,
        indels: &[&CandidateIndel],
        reference: &GenomeSnippet,
    ) -> Result<Option<RealignmentResult>> {
        let layout = ReadLayout::new(read)?;
        if layout.seq.is_empty() {
            return Ok(None);
        }
        let mut indels = indels.to_vec();
        sort_indels(&mut indels);
        let left = self.place(read, &layout, Anchor::Left, &indels, reference)?;
        indels.reverse();
        let right = self.place(read, &layout, Anchor::Right, &indels, reference)?;
        let (failed_left_anchor, failed_right_anchor) = (left.is_none(), right.is_none());
        let best = match (left, right) {
            (Some(left), Some(right)) => match self.comparer.compare(&left.summary, &right.summary) {
                Preference::Second => Some(right),
                _ => Some(left),
            },
            (left, right) => left.or(right),
        };
        Ok(best.map(|mut result| {
            result.failed_left_anchor = failed_left_anchor;
            result.failed_right_anchor = failed_right_anchor;
            result
        }))
    }
    fn place(
        &self,
        read: &AlignmentRecord,
        layout: &ReadLayout,
        anchor: Anchor,
        indels: &[&CandidateIndel],
        reference: &GenomeSnippet,
    ) -> Result<Option<RealignmentResult>> {
        let mut map = PositionMap::anchored(anchor, layout.start, layout.end, layout.seq.len());
        let (mut partial_head, mut partial_tail) = (false, false);
        for indel in indels.iter() {
            if indel.is_insertion() {
                let range = match map.insert(anchor, indel.position, indel.sequence(), layout.seq) {
                    Some(range) => range,
                    None => return Ok(None),
                };
                if range.len() < indel.length {
                    partial_head |= range.start == 0;
                    partial_tail |= range.end == map.len();
                }
            } else if map.delete(anchor, indel.position, indel.length).is_none() {
                return Ok(None);
            }
        }
        if map.num_resolved() == 0 || !map.is_consistent(reference) {
            return Ok(None);
        }
        if self.config.mask_softclip_mismatches {
            mask_clipped_mismatches(&mut map, layout, reference);
        }
        self.mask_terminal_insertions(&mut map, partial_head, partial_tail);
        // Every aligned base went back into a clip. The combination does not fit this read.
        let position = match map.first_resolved() {
            Some(position) => position,
            None => {
                trace!("ALLCLIPPED\t{}\t{:?}", read.name, anchor);
                return Ok(None);
            }
        };
        if !map.is_consistent(reference) {
            return Err(RealignError::Invariant {
                name: read.name.clone(),
                reason: "coordinates out of order after soft-clipping".to_string(),
            });
        }
        let mut ops = vec![Op::SoftClip(layout.n_prefix)];
        ops.extend(map.to_cigar().into_ops());
        ops.push(Op::SoftClip(layout.n_suffix));
        let cigar = Cigar::new(ops);
        let summary = summarize(read.seq(), position, &cigar, reference);
        let mut placed: Vec<_> = indels.iter().map(|&i| i.clone()).collect();
        placed.sort_by_key(|i| (i.position, i.indel_type));
        Ok(Some(RealignmentResult {
            position,
            cigar,
            summary,
            indels: placed,
            failed_left_anchor: false,
            failed_right_anchor: false,
        }))
    }
    /// Soft-clip insertions at either end of the read that are too short to be trusted
    /// or that run off the read.
    fn mask_terminal_insertions(&self, map: &mut PositionMap, partial_head: bool, partial_tail: bool) {
        let too_short = |run: usize| {
            self.config
                .min_unanchored_insertion_length
                .map_or(false, |min| run < min)
        };
        let mask_partial = self.config.mask_partial_insertions;
        let slots = map.slots();
        let head_clip = slots.iter().take_while(|&&s| s == MapSlot::ForcedClip).count();
        let head_run = slots[head_clip..]
            .iter()
            .take_while(|&&s| s == MapSlot::Inserted)
            .count();
        let tail_clip = slots.iter().rev().take_while(|&&s| s == MapSlot::ForcedClip).count();
        let tail_run = slots[..slots.len() - tail_clip]
            .iter()
            .rev()
            .take_while(|&&s| s == MapSlot::Inserted)
            .count();
        let len = slots.len();
        if 0 < head_run && (too_short(head_run) || (mask_partial && partial_head)) {
            map.mark(0..head_clip + head_run, MapSlot::ForcedClip);
        }
        if 0 < tail_run && (too_short(tail_run) || (mask_partial && partial_tail)) {
            map.mark(len - tail_clip - tail_run..len, MapSlot::ForcedClip);
        }
    }
}

/// Soft-clip again the ends of the read that were clipped in the original alignment
/// and now mismatch the reference.
fn mask_clipped_mismatches(map: &mut PositionMap, layout: &ReadLayout, reference: &GenomeSnippet) {
    let mismatch = |idx: usize| match map.get(idx) {
        Some(MapSlot::Resolved(pos)) => {
            let base = layout.seq[idx];
            reference
                .base_at(pos)
                .map_or(false, |r| !is_unknown(r) && !is_unknown(base) && !r.eq_ignore_ascii_case(&base))
        }
        _ => false,
    };
    let len = map.len();
    let head = (0..layout.clipped_head.min(len)).filter(|&i| mismatch(i)).max();
    let tail = (len - layout.clipped_tail.min(len)..len)
        .filter(|&i| mismatch(i))
        .min();
    if let Some(last) = head {
        map.mark(0..last + 1, MapSlot::ForcedClip);
    }
    if let Some(first) = tail {
        map.mark(first..len, MapSlot::ForcedClip);
    }
}
