//! Definitions -- A tiny interface for the indel realignment problem.
//! The engine and the command line tools exchange one, possibly large, structure named [DataSet](DataSet),
//! serialized as JSON. Cigar strings travel in the conventional SAM letter notation (M/I/D/S).

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use std::collections::BTreeMap;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DataSet {
    /// The chromosome all the reads and indels belong to.
    pub chromosome: String,
    pub pairs: Vec<ReadPair>,
    pub candidate_indels: Vec<CandidateIndel>,
    /// Groups of two or three indel keys observed together in the same reads.
    #[serde(default)]
    pub indel_groups: Vec<Vec<String>>,
}

impl DataSet {
    pub fn new(chromosome: &str, pairs: Vec<ReadPair>, candidate_indels: Vec<CandidateIndel>) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            pairs,
            candidate_indels,
            indel_groups: vec![],
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Op {
    Match(usize),
    /// Insertion with respect to the reference.
    Ins(usize),
    /// Deletion with respect to the reference.
    Del(usize),
    SoftClip(usize),
}

impl Op {
    pub fn len(&self) -> usize {
        match *self {
            Op::Match(l) | Op::Ins(l) | Op::Del(l) | Op::SoftClip(l) => l,
        }
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    pub fn with_len(&self, len: usize) -> Self {
        match self {
            Op::Match(_) => Op::Match(len),
            Op::Ins(_) => Op::Ins(len),
            Op::Del(_) => Op::Del(len),
            Op::SoftClip(_) => Op::SoftClip(len),
        }
    }
    pub fn consumes_query(&self) -> bool {
        !matches!(self, Op::Del(_))
    }
    pub fn consumes_reference(&self) -> bool {
        matches!(self, Op::Match(_) | Op::Del(_))
    }
    pub fn is_indel(&self) -> bool {
        matches!(self, Op::Ins(_) | Op::Del(_))
    }
    pub fn symbol(&self) -> char {
        match self {
            Op::Match(_) => 'M',
            Op::Ins(_) => 'I',
            Op::Del(_) => 'D',
            Op::SoftClip(_) => 'S',
        }
    }
    fn same_kind(&self, other: &Op) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CigarParseError {
    #[error("operation {0} has no length")]
    MissingLength(char),
    #[error("unsupported operation {0}")]
    UnsupportedOp(char),
    #[error("trailing length without operation in {0}")]
    Dangling(String),
}

/// Alignment operations. Adjacent operations never share the same type,
/// and zero-length operations never appear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Cigar(Vec<Op>);

impl Cigar {
    /// Merge adjacent operations of the same type and drop empty ones.
    pub fn new(ops: Vec<Op>) -> Self {
        let mut compressed: Vec<Op> = Vec::with_capacity(ops.len());
        for op in ops.into_iter().filter(|op| !op.is_empty()) {
            match compressed.last_mut() {
                Some(last) if last.same_kind(&op) => *last = last.with_len(last.len() + op.len()),
                _ => compressed.push(op),
            }
        }
        Self(compressed)
    }
    pub fn ops(&self) -> &[Op] {
        &self.0
    }
    pub fn into_ops(self) -> Vec<Op> {
        self.0
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn query_length(&self) -> usize {
        self.0
            .iter()
            .filter(|op| op.consumes_query())
            .map(Op::len)
            .sum()
    }
    pub fn reference_length(&self) -> usize {
        self.0
            .iter()
            .filter(|op| op.consumes_reference())
            .map(Op::len)
            .sum()
    }
    pub fn leading_softclip(&self) -> usize {
        match self.0.first() {
            Some(Op::SoftClip(l)) => *l,
            _ => 0,
        }
    }
    pub fn trailing_softclip(&self) -> usize {
        match self.0.last() {
            Some(Op::SoftClip(l)) if self.0.len() > 1 => *l,
            _ => 0,
        }
    }
    pub fn has_indel(&self) -> bool {
        self.0.iter().any(Op::is_indel)
    }
    pub fn has_softclip(&self) -> bool {
        self.0.iter().any(|op| matches!(op, Op::SoftClip(_)))
    }
    /// True if a soft-clip sits between two other operations.
    pub fn has_interior_softclip(&self) -> bool {
        let last = self.0.len().saturating_sub(1);
        self.0
            .iter()
            .enumerate()
            .any(|(i, op)| matches!(op, Op::SoftClip(_)) && 0 < i && i < last)
    }
}

impl From<Vec<Op>> for Cigar {
    fn from(ops: Vec<Op>) -> Self {
        Cigar::new(ops)
    }
}

impl std::fmt::Display for Cigar {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        for op in self.0.iter() {
            write!(f, "{}{}", op.len(), op.symbol())?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Cigar {
    type Err = CigarParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut ops = vec![];
        let mut len: Option<usize> = None;
        for c in s.chars() {
            if let Some(digit) = c.to_digit(10) {
                len = Some(len.unwrap_or(0) * 10 + digit as usize);
                continue;
            }
            let l = len.take().ok_or(CigarParseError::MissingLength(c))?;
            let op = match c {
                'M' | '=' | 'X' => Op::Match(l),
                'I' => Op::Ins(l),
                'D' => Op::Del(l),
                'S' => Op::SoftClip(l),
                _ => return Err(CigarParseError::UnsupportedOp(c)),
            };
            ops.push(op);
        }
        match len {
            Some(_) => Err(CigarParseError::Dangling(s.to_string())),
            None => Ok(Cigar::new(ops)),
        }
    }
}

/// An aligned read.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlignmentRecord {
    pub name: String,
    pub reference_name: String,
    /// 1-based leftmost reference position of the first aligned base.
    pub position: i64,
    /// Sequence. A string on an alphabet of A,C,G,T,N.
    pub seq: String,
    #[serde(default)]
    pub qual: Vec<u8>,
    #[serde_as(as = "DisplayFromStr")]
    pub cigar: Cigar,
    pub mapq: u8,
    #[serde(default)]
    pub is_duplicate: bool,
    #[serde(default)]
    pub is_secondary: bool,
    /// The NM tag, if reported by the aligner.
    #[serde(default)]
    pub num_mismatches: Option<u32>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl AlignmentRecord {
    pub fn seq(&self) -> &[u8] {
        self.seq.as_bytes()
    }
    /// Last reference position covered by an aligned base (1-based, inclusive).
    pub fn end_position(&self) -> i64 {
        self.position + self.cigar.reference_length() as i64 - 1
    }
    pub fn reference_span(&self) -> usize {
        self.cigar.reference_length()
    }
    /// Position the first base would occupy if the leading soft-clip were aligned.
    pub fn unclipped_start(&self) -> i64 {
        self.position - self.cigar.leading_softclip() as i64
    }
    pub fn unclipped_end(&self) -> i64 {
        self.end_position() + self.cigar.trailing_softclip() as i64
    }
    pub fn has_indel(&self) -> bool {
        self.cigar.has_indel()
    }
    /// True if every base of the read is the same nucleotide.
    pub fn is_homopolymer(&self) -> bool {
        match self.seq().split_first() {
            Some((first, rest)) => rest.iter().all(|b| b.eq_ignore_ascii_case(first)),
            None => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadPair {
    pub name: String,
    pub read1: AlignmentRecord,
    /// `None` for unpaired reads or when the mate maps elsewhere.
    #[serde(default)]
    pub read2: Option<AlignmentRecord>,
}

impl ReadPair {
    pub fn reads(&self) -> impl Iterator<Item = &AlignmentRecord> {
        std::iter::once(&self.read1).chain(self.read2.iter())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndelType {
    Insertion,
    Deletion,
}

/// A candidate indel, left-anchored in the VCF manner:
/// `position` is the base preceding the event, and both alleles start with it.
/// A deletion removes the reference bases `[position+1, position+length]`,
/// an insertion places its bases between `position` and `position+1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateIndel {
    pub chromosome: String,
    pub position: i64,
    pub indel_type: IndelType,
    pub length: usize,
    pub reference_allele: String,
    pub alternate_allele: String,
    /// Evidence score from the upstream evidence collection.
    pub score: f64,
    /// Fraction of the covering reads supporting this indel.
    #[serde(default)]
    pub frequency: f64,
    #[serde(default)]
    pub is_duplication: bool,
    /// This indel is one representation of a compound event.
    #[serde(default)]
    pub in_multi: bool,
    /// The key of the other representation of the compound event.
    #[serde(default)]
    pub partner: Option<String>,
    #[serde(default)]
    pub hard_to_call: bool,
}

impl CandidateIndel {
    pub fn insertion(chromosome: &str, position: i64, anchor: u8, inserted: &[u8], score: f64) -> Self {
        let reference_allele = (anchor as char).to_string();
        let mut alternate_allele = reference_allele.clone();
        alternate_allele.push_str(&String::from_utf8_lossy(inserted));
        Self::with_alleles(chromosome, position, IndelType::Insertion, inserted.len(), reference_allele, alternate_allele, score)
    }
    pub fn deletion(chromosome: &str, position: i64, anchor: u8, deleted: &[u8], score: f64) -> Self {
        let alternate_allele = (anchor as char).to_string();
        let mut reference_allele = alternate_allele.clone();
        reference_allele.push_str(&String::from_utf8_lossy(deleted));
        Self::with_alleles(chromosome, position, IndelType::Deletion, deleted.len(), reference_allele, alternate_allele, score)
    }
    fn with_alleles(
        chromosome: &str,
        position: i64,
        indel_type: IndelType,
        length: usize,
        reference_allele: String,
        alternate_allele: String,
        score: f64,
    ) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            position,
            indel_type,
            length,
            reference_allele,
            alternate_allele,
            score,
            frequency: 0f64,
            is_duplication: false,
            in_multi: false,
            partner: None,
            hard_to_call: false,
        }
    }
    /// The inserted or deleted bases, without the anchor base.
    pub fn sequence(&self) -> &[u8] {
        let allele = match self.indel_type {
            IndelType::Insertion => self.alternate_allele.as_bytes(),
            IndelType::Deletion => self.reference_allele.as_bytes(),
        };
        allele.get(1..).unwrap_or(&[])
    }
    pub fn is_insertion(&self) -> bool {
        self.indel_type == IndelType::Insertion
    }
    pub fn is_deletion(&self) -> bool {
        self.indel_type == IndelType::Deletion
    }
    /// Number of reference bases the event touches.
    pub fn reference_length(&self) -> usize {
        match self.indel_type {
            IndelType::Insertion => 0,
            IndelType::Deletion => self.length,
        }
    }
    /// Inclusive span of deleted reference bases. `None` for insertions.
    pub fn deleted_span(&self) -> Option<(i64, i64)> {
        match self.indel_type {
            IndelType::Insertion => None,
            IndelType::Deletion => Some((self.position + 1, self.position + self.length as i64)),
        }
    }
    /// Unique textual key, e.g. `chr1:1000 AT>A`.
    pub fn key(&self) -> String {
        format!(
            "{}:{} {}>{}",
            self.chromosome, self.position, self.reference_allele, self.alternate_allele
        )
    }
    /// Same position, type and allele.
    pub fn same_variant(&self, other: &CandidateIndel) -> bool {
        self.position == other.position
            && self.indel_type == other.indel_type
            && self.sequence().eq_ignore_ascii_case(other.sequence())
    }
}

impl std::fmt::Display for CandidateIndel {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A contiguous reference window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GenomeSnippet {
    pub chromosome: String,
    /// 1-based position of the first base of `sequence`.
    pub start: i64,
    pub sequence: String,
}

impl GenomeSnippet {
    pub fn new(chromosome: &str, start: i64, sequence: Vec<u8>) -> Self {
        Self {
            chromosome: chromosome.to_string(),
            start,
            sequence: String::from_utf8_lossy(&sequence).to_string(),
        }
    }
    pub fn seq(&self) -> &[u8] {
        self.sequence.as_bytes()
    }
    /// Last covered position (inclusive).
    pub fn end(&self) -> i64 {
        self.start + self.sequence.len() as i64 - 1
    }
    pub fn contains(&self, position: i64) -> bool {
        self.start <= position && position <= self.end()
    }
    pub fn base_at(&self, position: i64) -> Option<u8> {
        if position < self.start {
            return None;
        }
        self.seq().get((position - self.start) as usize).copied()
    }
}
