//! Indels carried by the reads of a pair, and a coarse classification of pairs.
use crate::reference::SnippetSource;
use definitions::{AlignmentRecord, CandidateIndel, Op, ReadPair};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Union of the indels found on both mates, first occurrence kept.
pub fn find_pair_indels(pair: &ReadPair, read1: &[CandidateIndel], read2: &[CandidateIndel]) -> Vec<CandidateIndel> {
    let mut seen = HashSet::new();
    let indels: Vec<_> = read1
        .iter()
        .chain(read2.iter())
        .filter(|indel| seen.insert(indel.key()))
        .cloned()
        .collect();
    if !indels.is_empty() {
        trace!("PAIRINDEL\t{}\t{}", pair.name, indels.len());
    }
    indels
}

/// The insertions and deletions in the alignment of `record`, as left-anchored candidates.
/// Indels at the very ends of the alignment have no anchor and are skipped.
pub fn extract_indels<S: SnippetSource + ?Sized>(record: &AlignmentRecord, source: &S) -> Vec<CandidateIndel> {
    if !record.has_indel() {
        return vec![];
    }
    let snippet = match source.get_snippet(record.position) {
        Some(snippet) => snippet,
        None => return vec![],
    };
    let chrom = record.reference_name.as_str();
    let seq = record.seq();
    let (mut qpos, mut rpos) = (0, record.position);
    let mut indels = vec![];
    for op in record.cigar.ops() {
        match *op {
            Op::Ins(l) => {
                let anchor = snippet.base_at(rpos - 1);
                if let (Some(anchor), Some(inserted)) = (anchor, seq.get(qpos..qpos + l)) {
                    if rpos > record.position {
                        indels.push(CandidateIndel::insertion(chrom, rpos - 1, anchor, inserted, 0f64));
                    }
                }
            }
            Op::Del(l) => {
                let anchor = snippet.base_at(rpos - 1);
                let deleted: Option<Vec<u8>> = (rpos..rpos + l as i64).map(|p| snippet.base_at(p)).collect();
                if let (Some(anchor), Some(deleted)) = (anchor, deleted) {
                    if rpos > record.position {
                        indels.push(CandidateIndel::deletion(chrom, rpos - 1, anchor, &deleted, 0f64));
                    }
                }
            }
            _ => {}
        }
        if op.consumes_query() {
            qpos += op.len();
        }
        if op.consumes_reference() {
            rpos += op.len() as i64;
        }
    }
    indels
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PairClass {
    /// Fully matched, no soft-clip.
    Perfect,
    /// Mismatches but no soft-clip or indel.
    Mismatch,
    /// Soft-clipped, otherwise matching.
    SoftclipOnly,
    /// At least one mate carries an indel.
    Indel,
    /// Soft-clips together with mismatches.
    Messy,
    /// Duplicate, secondary or unaligned.
    Unusable,
}

impl PairClass {
    /// Pairs worth a second look once more evidence is in.
    pub fn is_reprocessed(&self) -> bool {
        matches!(self, PairClass::Indel | PairClass::SoftclipOnly)
    }
}

pub fn classify_pair(pair: &ReadPair) -> PairClass {
    let unusable = |r: &AlignmentRecord| r.cigar.is_empty() || r.is_duplicate || r.is_secondary;
    if pair.reads().any(unusable) {
        return PairClass::Unusable;
    }
    if pair.reads().any(|r| r.has_indel()) {
        return PairClass::Indel;
    }
    let clipped = pair.reads().any(|r| r.cigar.has_softclip());
    let mismatched = pair.reads().any(|r| r.num_mismatches.map_or(false, |nm| 0 < nm));
    match (clipped, mismatched) {
        (false, false) => PairClass::Perfect,
        (false, true) => PairClass::Mismatch,
        (true, false) => PairClass::SoftclipOnly,
        (true, true) => PairClass::Messy,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reference::ReferenceSequence;
    use std::collections::BTreeMap;
    // 91 - 130, placed at the start of a chromosome.
    const REFERENCE: &[u8] = b"GATTACAGGCTCAGGATCCATTGCAACGTACCGTAGGTCA";
    fn reference() -> ReferenceSequence {
        let mut seq = vec![b'T'; 90];
        seq.extend_from_slice(REFERENCE);
        seq.extend(std::iter::repeat(b'T').take(100));
        ReferenceSequence::new("chr1", seq, 200)
    }
    fn record(seq: &str, position: i64, cigar: &str, nm: Option<u32>) -> AlignmentRecord {
        AlignmentRecord {
            name: "read".to_string(),
            reference_name: "chr1".to_string(),
            position,
            seq: seq.to_string(),
            qual: vec![],
            cigar: cigar.parse().unwrap(),
            mapq: 60,
            is_duplicate: false,
            is_secondary: false,
            num_mismatches: nm,
            tags: BTreeMap::new(),
        }
    }
    #[test]
    fn extract() {
        let read = record("CTCAATCCAT", 100, "4M2D6M", Some(2));
        let indels = extract_indels(&read, &reference());
        assert_eq!(indels.len(), 1);
        assert_eq!(indels[0].key(), "chr1:103 AGG>A");
        let read = record("CTCAGACGGA", 100, "4M3I3M", Some(3));
        let indels = extract_indels(&read, &reference());
        assert_eq!(indels.len(), 1);
        assert_eq!(indels[0].key(), "chr1:103 A>AGAC");
        // No anchor base on the read.
        let read = record("GACGGA", 104, "3I3M", Some(3));
        assert!(extract_indels(&read, &reference()).is_empty());
    }
    #[test]
    fn pair_union() {
        let a = CandidateIndel::deletion("chr1", 103, b'A', b"GG", 0f64);
        let b = CandidateIndel::insertion("chr1", 110, b'A', b"T", 0f64);
        let pair = ReadPair {
            name: "pair".to_string(),
            read1: record("CTCAATCCAT", 100, "4M2D6M", None),
            read2: None,
        };
        let union = find_pair_indels(&pair, &[a.clone(), b.clone()], &[a.clone()]);
        assert_eq!(union, vec![a.clone(), b.clone()]);
        assert_eq!(find_pair_indels(&pair, &[], &[b.clone()]), vec![b]);
    }
    #[test]
    fn classify() {
        let pair = |r1: AlignmentRecord, r2: Option<AlignmentRecord>| ReadPair {
            name: "pair".to_string(),
            read1: r1,
            read2: r2,
        };
        let perfect = record("CTCAGGATCC", 100, "10M", Some(0));
        assert_eq!(classify_pair(&pair(perfect.clone(), None)), PairClass::Perfect);
        let mismatch = record("CTCAGGATCA", 100, "10M", Some(1));
        assert_eq!(classify_pair(&pair(perfect.clone(), Some(mismatch.clone()))), PairClass::Mismatch);
        let clipped = record("CTCAGGATCA", 100, "9M1S", Some(0));
        assert_eq!(classify_pair(&pair(clipped.clone(), None)), PairClass::SoftclipOnly);
        assert_eq!(classify_pair(&pair(clipped, Some(mismatch))), PairClass::Messy);
        let indel = record("CTCAATCCAT", 100, "4M2D6M", Some(2));
        assert_eq!(classify_pair(&pair(perfect.clone(), Some(indel))), PairClass::Indel);
        let mut duplicate = perfect;
        duplicate.is_duplicate = true;
        assert_eq!(classify_pair(&pair(duplicate, None)), PairClass::Unusable);
        assert!(PairClass::Indel.is_reprocessed());
        assert!(!PairClass::Messy.is_reprocessed());
    }
}
