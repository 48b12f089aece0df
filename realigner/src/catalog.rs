//! Indel catalog -- candidate indels of a chromosome, bucketed by position,
//! each bucket carrying the reference window needed to score reads near it.
//!
//! Built once per chromosome and read-only afterwards, so worker threads share it by reference.
use crate::config::{CatalogConfig, QueryOptions};
use crate::error::{RealignError, Result};
use crate::reference::SnippetSource;
use definitions::{CandidateIndel, GenomeSnippet};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct Bucket {
    /// Sorted by descending score, then by key.
    indels: Vec<CandidateIndel>,
    snippet: GenomeSnippet,
}

impl Bucket {
    pub fn indels(&self) -> &[CandidateIndel] {
        &self.indels
    }
    pub fn snippet(&self) -> &GenomeSnippet {
        &self.snippet
    }
}

#[derive(Debug, Clone)]
pub struct IndelCatalog {
    chromosome: String,
    min_position: i64,
    max_position: i64,
    config: CatalogConfig,
    buckets: BTreeMap<i64, Bucket>,
    /// Indel key -> the other representations of the same compound event.
    partners: HashMap<String, Vec<CandidateIndel>>,
}

fn invalid(indel: &CandidateIndel, reason: &str) -> RealignError {
    RealignError::InvalidIndel {
        key: indel.key(),
        reason: reason.to_string(),
    }
}

fn validate(chromosome: &str, indel: &CandidateIndel) -> Result<()> {
    if indel.chromosome != chromosome {
        return Err(invalid(indel, "indel on another chromosome"));
    }
    if !indel.score.is_finite() || !indel.frequency.is_finite() {
        return Err(invalid(indel, "non-finite score or frequency"));
    }
    if indel.length == 0 || indel.sequence().len() != indel.length {
        return Err(invalid(indel, "length does not match the alleles"));
    }
    if indel.position < 1 {
        return Err(invalid(indel, "position before the chromosome"));
    }
    Ok(())
}

fn by_score(a: &CandidateIndel, b: &CandidateIndel) -> std::cmp::Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.key().cmp(&b.key()))
}

impl IndelCatalog {
    pub fn build<S: SnippetSource>(
        chromosome: &str,
        indels: &[CandidateIndel],
        source: &S,
        config: &CatalogConfig,
    ) -> Result<Self> {
        let mut catalog = Self {
            chromosome: chromosome.to_string(),
            min_position: 0,
            max_position: 0,
            config: config.clone(),
            buckets: BTreeMap::new(),
            partners: HashMap::new(),
        };
        let mut seen: HashMap<String, &CandidateIndel> = HashMap::new();
        for indel in indels {
            validate(chromosome, indel)?;
            // The same indel reported twice keeps the higher score.
            let key = indel.key();
            if seen.get(&key).map_or(true, |prev| prev.score < indel.score) {
                seen.insert(key, indel);
            }
        }
        if seen.is_empty() {
            return Ok(catalog);
        }
        let width = config.bucket_width.max(1);
        let min = seen.values().map(|i| i.position).min().unwrap_or(0);
        let max = seen.values().map(|i| i.position).max().unwrap_or(0);
        catalog.min_position = min;
        catalog.max_position = max;
        let mut bucketed: BTreeMap<i64, Vec<CandidateIndel>> = BTreeMap::new();
        for &indel in seen.values() {
            let idx = (indel.position - min).div_euclid(width);
            bucketed.entry(idx).or_default().push(indel.clone());
        }
        for (idx, mut indels) in bucketed {
            let first = indels.iter().min_by_key(|i| i.position).map(|i| i.position);
            let snippet = match first.and_then(|pos| source.get_snippet(pos)) {
                Some(snippet) => snippet,
                None => return Err(invalid(&indels[0], "no reference sequence around the indel")),
            };
            indels.sort_by(by_score);
            debug!("BUCKET\t{idx}\t{}\t{}\t{}", indels.len(), snippet.start, snippet.end());
            catalog.buckets.insert(idx, Bucket { indels, snippet });
        }
        for indel in seen.values().filter(|i| i.in_multi) {
            let partner = match indel.partner.as_ref().and_then(|key| seen.get(key)) {
                Some(&partner) => partner,
                None => continue,
            };
            let slot = catalog.partners.entry(indel.key()).or_default();
            if !slot.iter().any(|p| p.same_variant(partner)) {
                slot.push(partner.clone());
            }
            let slot = catalog.partners.entry(partner.key()).or_default();
            if !slot.iter().any(|p| p.same_variant(indel)) {
                slot.push((*indel).clone());
            }
        }
        debug!("CATALOG\t{chromosome}\t{}\t{}\t{}\t{}", seen.len(), catalog.buckets.len(), min, max);
        Ok(catalog)
    }
    pub fn chromosome(&self) -> &str {
        &self.chromosome
    }
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
    pub fn len(&self) -> usize {
        self.buckets.values().map(|b| b.indels.len()).sum()
    }
    pub fn buckets(&self) -> impl Iterator<Item = (i64, &Bucket)> {
        self.buckets.iter().map(|(&idx, bucket)| (idx, bucket))
    }
    /// Other representations of the compound event `indel` belongs to.
    pub fn partners(&self, indel: &CandidateIndel) -> &[CandidateIndel] {
        self.partners
            .get(&indel.key())
            .map(|xs| xs.as_slice())
            .unwrap_or(&[])
    }
    pub fn is_compound(&self, indel: &CandidateIndel) -> bool {
        !self.partners(indel).is_empty()
    }
    fn bucket_of(&self, position: i64) -> i64 {
        (position - self.min_position).div_euclid(self.config.bucket_width.max(1))
    }
    /// The reference window of the bucket nearest to `position`.
    pub fn snippet_near(&self, position: i64) -> Option<&GenomeSnippet> {
        let idx = self.bucket_of(position);
        let before = self.buckets.range(..=idx).next_back();
        let after = self.buckets.range(idx..).next();
        let dist = |(&i, _): &(&i64, &Bucket)| (i - idx).abs();
        match (before, after) {
            (Some(b), Some(a)) if dist(&a) < dist(&b) => Some(&a.1.snippet),
            (Some(b), _) => Some(&b.1.snippet),
            (None, Some(a)) => Some(&a.1.snippet),
            (None, None) => None,
        }
    }
    /// Candidate indels around `position`, each with the window of its bucket.
    ///
    /// The indels of the three buckets around `position` are ranked and truncated first,
    /// and only then restricted to `max_distance`. Thus widening either `max_results`
    /// or `max_distance` never drops an indel from the result.
    pub fn query(
        &self,
        position: i64,
        pre_selected: Option<&[CandidateIndel]>,
        confirmed: Option<&[CandidateIndel]>,
        options: &QueryOptions,
    ) -> Vec<(&CandidateIndel, &GenomeSnippet)> {
        let width = self.config.bucket_width.max(1);
        if self.is_empty() || position < self.min_position - width || self.max_position + width < position {
            return vec![];
        }
        let center = self.bucket_of(position);
        let mut candidates: Vec<_> = (center - 1..=center + 1)
            .filter_map(|idx| self.buckets.get(&idx))
            .flat_map(|bucket| bucket.indels.iter().map(move |i| (i, &bucket.snippet)))
            .collect();
        let pre_selected = pre_selected.unwrap_or(&[]);
        let confirmed = confirmed.unwrap_or(&[]);
        let is_in = |indel: &CandidateIndel, set: &[CandidateIndel]| set.iter().any(|c| c.same_variant(indel));
        let (upstream, downstream) = (self.config.confirmed_upstream, self.config.confirmed_downstream);
        let confirmed_nearby = confirmed
            .iter()
            .any(|c| position - upstream <= c.position && c.position <= position + downstream);
        if confirmed_nearby {
            let restricted: Vec<_> = candidates
                .iter()
                .filter(|(indel, _)| indel.is_duplication || is_in(*indel, confirmed))
                .copied()
                .collect();
            if !restricted.is_empty() {
                candidates = restricted;
            }
        }
        let mut ranked: Vec<_> = candidates
            .into_iter()
            .map(|(indel, snippet)| {
                let pre = is_in(indel, pre_selected);
                let tier = indel.hard_to_call && (pre || is_in(indel, confirmed));
                (tier, pre, indel, snippet)
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| b.2.score.total_cmp(&a.2.score))
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| a.2.key().cmp(&b.2.key()))
        });
        let mut extra = 0;
        ranked
            .into_iter()
            .enumerate()
            .filter(|(rank, (_, pre, indel, _))| {
                if *rank < options.max_results || *pre {
                    true
                } else if indel.in_multi && extra < options.max_multi_extra {
                    extra += 1;
                    true
                } else {
                    false
                }
            })
            .map(|(_, (_, _, indel, snippet))| (indel, snippet))
            .filter(|(indel, _)| (indel.position - position).abs() <= options.max_distance)
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reference::ReferenceSequence;
    use rand::{Rng, SeedableRng};
    use rand_xoshiro::Xoroshiro128PlusPlus;
    fn reference() -> ReferenceSequence {
        let seq: Vec<u8> = b"ACGT".iter().cycle().take(10_000).copied().collect();
        ReferenceSequence::new("chr1", seq, 2_000)
    }
    fn deletion(position: i64, score: f64) -> CandidateIndel {
        CandidateIndel::deletion("chr1", position, b'A', b"CG", score)
    }
    #[test]
    fn build_and_bucket() {
        let indels = vec![deletion(1_000, 5f64), deletion(1_500, 3f64), deletion(2_100, 4f64)];
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        assert_eq!(catalog.len(), 3);
        let buckets: Vec<_> = catalog.buckets().map(|(idx, b)| (idx, b.indels().len())).collect();
        assert_eq!(buckets, vec![(0, 2), (1, 1)]);
        let (_, first) = catalog.buckets().next().unwrap();
        assert_eq!(first.indels()[0].score, 5f64);
        assert!(first.snippet().contains(1_000));
        assert!(catalog.snippet_near(2_150).unwrap().contains(2_100));
        assert!(catalog.snippet_near(900).unwrap().contains(1_000));
    }
    #[test]
    fn build_rejects() {
        let mut wrong = deletion(100, 1f64);
        wrong.chromosome = "chr2".to_string();
        assert!(IndelCatalog::build("chr1", &[wrong], &reference(), &CatalogConfig::default()).is_err());
        let mut wrong = deletion(100, 1f64);
        wrong.length = 5;
        assert!(IndelCatalog::build("chr1", &[wrong], &reference(), &CatalogConfig::default()).is_err());
        let wrong = deletion(20_000, 1f64);
        assert!(IndelCatalog::build("chr1", &[wrong], &reference(), &CatalogConfig::default()).is_err());
        let mut wrong = deletion(100, 1f64);
        wrong.score = f64::NAN;
        assert!(IndelCatalog::build("chr1", &[wrong], &reference(), &CatalogConfig::default()).is_err());
    }
    #[test]
    fn query_fast_path_and_distance() {
        let empty = IndelCatalog::build("chr1", &[], &reference(), &CatalogConfig::default()).unwrap();
        assert!(empty.query(100, None, None, &QueryOptions::default()).is_empty());
        let indels = vec![deletion(3_000, 5f64), deletion(3_200, 3f64), deletion(3_400, 4f64)];
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        assert!(catalog.query(1_000, None, None, &QueryOptions::default()).is_empty());
        assert!(catalog.query(9_000, None, None, &QueryOptions::default()).is_empty());
        let result = catalog.query(3_100, None, None, &QueryOptions::default());
        let positions: Vec<_> = result.iter().map(|(i, _)| i.position).collect();
        assert_eq!(positions, vec![3_000, 3_200]);
        let result = catalog.query(3_100, None, None, &QueryOptions::new(5, 3, 100));
        assert_eq!(result.len(), 2);
        let result = catalog.query(3_100, None, None, &QueryOptions::new(5, 3, 99));
        assert!(result.is_empty());
    }
    #[test]
    fn query_ranking_and_truncation() {
        let mut indels: Vec<_> = (0..8).map(|i| deletion(5_000 + i * 10, i as f64)).collect();
        indels[0].in_multi = true;
        indels[1].in_multi = true;
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        let options = QueryOptions::new(3, 1, 250);
        let result = catalog.query(5_030, None, None, &options);
        let scores: Vec<_> = result.iter().map(|(i, _)| i.score).collect();
        // Top three, then the best ranked compound member.
        assert_eq!(scores, vec![7f64, 6f64, 5f64, 1f64]);
        let pre = vec![indels[2].clone()];
        let result = catalog.query(5_030, Some(&pre), None, &options);
        let scores: Vec<_> = result.iter().map(|(i, _)| i.score).collect();
        assert_eq!(scores, vec![7f64, 6f64, 5f64, 2f64, 1f64]);
        // Hard-to-call indels matching the evidence come first.
        let mut indels = indels;
        indels[4].hard_to_call = true;
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        let pre = vec![indels[4].clone()];
        let result = catalog.query(5_030, Some(&pre), None, &options);
        assert_eq!(result[0].0.score, 4f64);
    }
    #[test]
    fn query_confirmed() {
        let mut indels = vec![deletion(5_000, 10f64), deletion(5_040, 1f64), deletion(5_080, 2f64)];
        indels[2].is_duplication = true;
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        let confirmed = vec![indels[1].clone()];
        let result = catalog.query(5_020, None, Some(&confirmed), &QueryOptions::default());
        let positions: Vec<_> = result.iter().map(|(i, _)| i.position).collect();
        assert_eq!(positions, vec![5_080, 5_040]);
        // A confirmed indel far from the position does not restrict.
        let far = vec![deletion(5_300, 1f64)];
        let result = catalog.query(5_020, None, Some(&far), &QueryOptions::default());
        assert_eq!(result.len(), 3);
        // Nothing matches: fall back to the unrestricted result.
        let mut indels = indels;
        indels[2].is_duplication = false;
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        let other = vec![CandidateIndel::insertion("chr1", 5_040, b'A', b"T", 1f64)];
        let result = catalog.query(5_020, None, Some(&other), &QueryOptions::default());
        assert_eq!(result.len(), 3);
    }
    #[test]
    fn partners() {
        let mut a = deletion(5_000, 1f64);
        let mut b = CandidateIndel::insertion("chr1", 5_004, b'T', b"G", 1f64);
        a.in_multi = true;
        b.in_multi = true;
        a.partner = Some(b.key());
        let c = deletion(5_100, 1f64);
        let catalog = IndelCatalog::build("chr1", &[a.clone(), b.clone(), c.clone()], &reference(), &CatalogConfig::default()).unwrap();
        assert!(catalog.is_compound(&a));
        assert!(catalog.is_compound(&b));
        assert!(!catalog.is_compound(&c));
        assert_eq!(catalog.partners(&b), &[a]);
    }
    #[test]
    fn monotone_in_max_results() {
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(4298);
        for _ in 0..50 {
            let indels: Vec<_> = (0..30)
                .map(|_| {
                    let mut indel = deletion(rng.gen_range(4_000..7_000), rng.gen_range(0..10) as f64);
                    indel.in_multi = rng.gen_bool(0.3);
                    indel.hard_to_call = rng.gen_bool(0.2);
                    indel
                })
                .collect();
            let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
            let position = rng.gen_range(4_000..7_000);
            let pre: Vec<_> = indels.iter().take(2).cloned().collect();
            for k in 0..6 {
                let narrow = catalog.query(position, Some(&pre), None, &QueryOptions::new(k, 2, 250));
                let wide = catalog.query(position, Some(&pre), None, &QueryOptions::new(k + 1, 2, 250));
                for (indel, _) in narrow {
                    assert!(wide.iter().any(|(i, _)| i.same_variant(indel)));
                }
            }
        }
    }
    #[test]
    fn monotone_in_max_distance() {
        // A far, well supported indel does not push out a near one.
        let indels = vec![deletion(5_000, 1f64), deletion(5_200, 10f64)];
        let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
        let narrow = catalog.query(5_000, None, None, &QueryOptions::new(1, 0, 100));
        let wide = catalog.query(5_000, None, None, &QueryOptions::new(1, 0, 250));
        assert!(narrow.is_empty());
        let positions: Vec<_> = wide.iter().map(|(i, _)| i.position).collect();
        assert_eq!(positions, vec![5_200]);
        let wide = catalog.query(5_000, None, None, &QueryOptions::new(2, 0, 100));
        let positions: Vec<_> = wide.iter().map(|(i, _)| i.position).collect();
        assert_eq!(positions, vec![5_000]);
        let mut rng: Xoroshiro128PlusPlus = SeedableRng::seed_from_u64(9120);
        for _ in 0..50 {
            let indels: Vec<_> = (0..30)
                .map(|_| {
                    let mut indel = deletion(rng.gen_range(4_000..7_000), rng.gen_range(0..10) as f64);
                    indel.in_multi = rng.gen_bool(0.3);
                    indel.is_duplication = rng.gen_bool(0.1);
                    indel
                })
                .collect();
            let catalog = IndelCatalog::build("chr1", &indels, &reference(), &CatalogConfig::default()).unwrap();
            let position = rng.gen_range(4_000..7_000);
            let confirmed: Vec<_> = indels.iter().skip(2).take(1).cloned().collect();
            for k in 0..4 {
                for distance in [20, 80, 150, 250, 600] {
                    let options = QueryOptions::new(k, 1, distance);
                    let narrow = catalog.query(position, None, Some(&confirmed), &options);
                    let options = QueryOptions::new(k, 1, distance * 2);
                    let wide = catalog.query(position, None, Some(&confirmed), &options);
                    for (indel, _) in narrow {
                        assert!(wide.iter().any(|(i, _)| i.same_variant(indel)));
                    }
                }
            }
        }
    }
}
