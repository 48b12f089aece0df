//! Alignment summary -- mismatch, indel and soft-clip bookkeeping of an alignment
//! against a reference window.
use definitions::{Cigar, GenomeSnippet, Op};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlignmentSummary {
    /// Bases in match operations.
    pub num_matches: usize,
    pub num_mismatches: usize,
    /// Mismatches in match operations plus soft-clipped bases differing from the
    /// reference at the position they would occupy.
    pub num_mismatches_including_softclip: usize,
    pub num_indels: usize,
    pub num_indel_bases: usize,
    pub num_inserted_bases: usize,
    pub num_softclips: usize,
    pub num_non_n_softclips: usize,
    /// Read offset of the first mismatch in a match operation.
    pub first_mismatch: Option<usize>,
    pub last_mismatch: Option<usize>,
    /// Reference positions of all mismatches, soft-clipped ones included.
    pub mismatch_positions: Vec<i64>,
    /// Aligned bases on the shorter side of the least anchored indel. Zero without indels.
    pub anchor_length: usize,
}

impl AlignmentSummary {
    pub fn has_indel(&self) -> bool {
        0 < self.num_indels
    }
    /// Mismatches at positions not listed in `other`.
    pub fn new_mismatches(&self, other: &AlignmentSummary) -> usize {
        self.mismatch_positions
            .iter()
            .filter(|pos| !other.mismatch_positions.contains(pos))
            .count()
    }
    /// Compact `matches-softclips-mismatches-insertions-indels` signature.
    pub fn signature(&self) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.num_matches,
            self.num_softclips,
            self.num_mismatches,
            self.num_inserted_bases,
            self.num_indels
        )
    }
}

/// `Some(true)` if the read base differs from the reference base.
/// `None` if either is unknown.
fn is_mismatch(base: u8, reference: Option<u8>) -> Option<bool> {
    let reference = reference?;
    if is_unknown(base) || is_unknown(reference) {
        return None;
    }
    Some(!base.eq_ignore_ascii_case(&reference))
}

pub fn is_unknown(base: u8) -> bool {
    base == b'N' || base == b'n'
}

pub fn summarize(seq: &[u8], position: i64, cigar: &Cigar, reference: &GenomeSnippet) -> AlignmentSummary {
    let mut summary = AlignmentSummary::default();
    let (mut qpos, mut rpos) = (0usize, position);
    for (idx, op) in cigar.ops().iter().enumerate() {
        match *op {
            Op::Match(l) => {
                for k in 0..l {
                    let Some(&base) = seq.get(qpos + k) else { break };
                    let pos = rpos + k as i64;
                    if is_mismatch(base, reference.base_at(pos)) == Some(true) {
                        summary.num_mismatches += 1;
                        summary.num_mismatches_including_softclip += 1;
                        summary.first_mismatch.get_or_insert(qpos + k);
                        summary.last_mismatch = Some(qpos + k);
                        summary.mismatch_positions.push(pos);
                    }
                }
                summary.num_matches += l;
                qpos += l;
                rpos += l as i64;
            }
            Op::Ins(l) => {
                summary.num_indels += 1;
                summary.num_indel_bases += l;
                summary.num_inserted_bases += l;
                qpos += l;
            }
            Op::Del(l) => {
                summary.num_indels += 1;
                summary.num_indel_bases += l;
                rpos += l as i64;
            }
            Op::SoftClip(l) => {
                let start = if idx == 0 { position - l as i64 } else { rpos };
                for k in 0..l {
                    let Some(&base) = seq.get(qpos + k) else { break };
                    if is_unknown(base) {
                        continue;
                    }
                    summary.num_non_n_softclips += 1;
                    let pos = start + k as i64;
                    if is_mismatch(base, reference.base_at(pos)) == Some(true) {
                        summary.num_mismatches_including_softclip += 1;
                        summary.mismatch_positions.push(pos);
                    }
                }
                summary.num_softclips += l;
                qpos += l;
            }
        }
    }
    summary.anchor_length = anchor_length(cigar);
    summary
}

fn anchor_length(cigar: &Cigar) -> usize {
    let ops = cigar.ops();
    let aligned = |ops: &[Op]| -> usize {
        ops.iter()
            .map(|op| match op {
                Op::Match(l) => *l,
                _ => 0,
            })
            .sum()
    };
    ops.iter()
        .enumerate()
        .filter(|(_, op)| op.is_indel())
        .map(|(i, _)| aligned(&ops[..i]).min(aligned(&ops[i + 1..])))
        .min()
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;
    // 91 - 130
    const REFERENCE: &[u8] = b"GATTACAGGCTCAGGATCCATTGCAACGTACCGTAGGTCA";
    fn snippet() -> GenomeSnippet {
        GenomeSnippet::new("chr1", 91, REFERENCE.to_vec())
    }
    #[test]
    fn misaligned_deletion() {
        let read = b"CTCAATCCAT";
        let summary = summarize(read, 100, &"10M".parse().unwrap(), &snippet());
        assert_eq!(summary.num_mismatches, 6);
        assert_eq!(summary.num_mismatches_including_softclip, 6);
        assert_eq!(summary.first_mismatch, Some(4));
        assert_eq!(summary.last_mismatch, Some(9));
        assert_eq!(summary.mismatch_positions, vec![104, 105, 106, 107, 108, 109]);
        assert!(!summary.has_indel());
        let summary = summarize(read, 100, &"4M2D6M".parse().unwrap(), &snippet());
        assert_eq!(summary.num_mismatches, 0);
        assert_eq!(summary.num_indels, 1);
        assert_eq!(summary.num_indel_bases, 2);
        assert_eq!(summary.anchor_length, 4);
        assert_eq!(summary.signature(), "10-0-0-0-1");
    }
    #[test]
    fn softclips() {
        // Two leading bases that mismatch 98-99, and a leading N.
        let read = b"NAACTCAATCCAT";
        let summary = summarize(read, 100, &"3S4M2D6M".parse().unwrap(), &snippet());
        assert_eq!(summary.num_softclips, 3);
        assert_eq!(summary.num_non_n_softclips, 2);
        assert_eq!(summary.num_mismatches, 0);
        assert_eq!(summary.num_mismatches_including_softclip, 2);
        assert_eq!(summary.mismatch_positions, vec![98, 99]);
        assert_eq!(summary.first_mismatch, None);
    }
    #[test]
    fn new_mismatches() {
        let read = b"CTCAATCCAT";
        let original = summarize(read, 100, &"10M".parse().unwrap(), &snippet());
        let shifted = summarize(read, 99, &"10M".parse().unwrap(), &snippet());
        let fresh = shifted.new_mismatches(&original);
        assert!(0 < fresh);
        assert_eq!(original.new_mismatches(&original), 0);
    }
}
