//! Groups of indels known to appear together in the same reads.
//! Only these pairs and triples are tried in the multi-indel search.
use crate::error::{RealignError, Result};
use definitions::{CandidateIndel, IndelType};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct CoOccurrence {
    pairs: HashSet<(String, String)>,
    triples: HashSet<(String, String, String)>,
}

/// Position and type parsed out of a `chrom:pos REF>ALT` key.
fn parse_key(key: &str) -> Option<(i64, IndelType)> {
    let (locus, alleles) = key.split_once(' ')?;
    let (_, position) = locus.rsplit_once(':')?;
    let position: i64 = position.parse().ok()?;
    let (reference, alternate) = alleles.split_once('>')?;
    match (reference.len(), alternate.len()) {
        (1, l) if 1 < l => Some((position, IndelType::Insertion)),
        (l, 1) if 1 < l => Some((position, IndelType::Deletion)),
        _ => None,
    }
}

fn malformed(group: &[String], reason: &str) -> RealignError {
    RealignError::MalformedGroup {
        group: group.to_vec(),
        reason: reason.to_string(),
    }
}

impl CoOccurrence {
    pub fn from_groups(groups: &[Vec<String>]) -> Result<Self> {
        let mut set = Self::default();
        for group in groups {
            let mut parsed = group
                .iter()
                .map(|key| parse_key(key).map(|(pos, t)| (pos, t, key.clone())))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| malformed(group, "unparsable indel key"))?;
            parsed.sort();
            parsed.dedup();
            let mut keys = parsed.into_iter().map(|(_, _, key)| key);
            match (keys.next(), keys.next(), keys.next(), keys.next()) {
                (Some(a), Some(b), None, None) => {
                    set.pairs.insert((a, b));
                }
                (Some(a), Some(b), Some(c), None) => {
                    set.triples.insert((a, b, c));
                }
                _ => return Err(malformed(group, "a group holds two or three distinct indels")),
            }
        }
        debug!("COOCCUR\t{}\t{}", set.pairs.len(), set.triples.len());
        Ok(set)
    }
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty() && self.triples.is_empty()
    }
    pub fn contains_pair(&self, a: &CandidateIndel, b: &CandidateIndel) -> bool {
        let mut indels = [a, b];
        indels.sort_by_key(|i| (i.position, i.indel_type));
        let key = (indels[0].key(), indels[1].key());
        self.pairs.contains(&key)
    }
    pub fn contains_triple(&self, a: &CandidateIndel, b: &CandidateIndel, c: &CandidateIndel) -> bool {
        let mut indels = [a, b, c];
        indels.sort_by_key(|i| (i.position, i.indel_type));
        let key = (indels[0].key(), indels[1].key(), indels[2].key());
        self.triples.contains(&key)
    }
}
