//! Access to the reference sequence.
use definitions::GenomeSnippet;

/// Anything able to cut a reference window around a position.
pub trait SnippetSource: Sync {
    fn chromosome(&self) -> &str;
    /// The window centered on `position`, or `None` if the position is off the chromosome.
    fn get_snippet(&self, position: i64) -> Option<GenomeSnippet>;
}

/// One chromosome held in memory.
#[derive(Debug, Clone)]
pub struct ReferenceSequence {
    chromosome: String,
    seq: Vec<u8>,
    flank: i64,
}

impl ReferenceSequence {
    pub fn new(chromosome: &str, seq: Vec<u8>, flank: i64) -> Self {
        let seq = seq.iter().map(u8::to_ascii_uppercase).collect();
        Self {
            chromosome: chromosome.to_string(),
            seq,
            flank,
        }
    }
    pub fn len(&self) -> usize {
        self.seq.len()
    }
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
    /// Bases of the inclusive 1-based range `[start, end]`, clipped to the chromosome.
    pub fn slice(&self, start: i64, end: i64) -> &[u8] {
        let start = (start.max(1) - 1) as usize;
        let end = (end.max(0) as usize).min(self.seq.len());
        self.seq.get(start..end).unwrap_or(&[])
    }
}

impl SnippetSource for ReferenceSequence {
    fn chromosome(&self) -> &str {
        &self.chromosome
    }
    fn get_snippet(&self, position: i64) -> Option<GenomeSnippet> {
        if position < 1 || self.seq.len() < position as usize {
            return None;
        }
        let start = (position - self.flank).max(1);
        let end = position + self.flank;
        let window = self.slice(start, end).to_vec();
        Some(GenomeSnippet::new(&self.chromosome, start, window))
    }
}
