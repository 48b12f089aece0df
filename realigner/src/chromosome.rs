//! Chromosome driver: one realignment pass over every pair of a chromosome, and the
//! two-phase snowball refinement on top of it.
use crate::catalog::IndelCatalog;
use crate::co_occurrence::CoOccurrence;
use crate::config::RealignConfig;
use crate::error::Result;
use crate::evaluator::{Evaluator, Outcome, PairEvaluation};
use crate::evidence::EvidenceCounts;
use crate::pair_indels::classify_pair;
use crate::reference::SnippetSource;
use definitions::{CandidateIndel, DataSet, ReadPair};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Number of reads ending in each outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeTally {
    counts: BTreeMap<Outcome, usize>,
}

impl OutcomeTally {
    pub fn from_evaluations(evaluations: &[PairEvaluation]) -> Self {
        let mut tally = Self::default();
        for evaluation in evaluations.iter().flat_map(|p| p.evaluations()) {
            *tally.counts.entry(evaluation.outcome).or_default() += 1;
        }
        tally
    }
    pub fn get(&self, outcome: Outcome) -> usize {
        self.counts.get(&outcome).copied().unwrap_or(0)
    }
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
    fn log(&self, chromosome: &str, pass: &str) {
        for (outcome, count) in self.counts.iter() {
            info!("TALLY\t{chromosome}\t{pass}\t{outcome:?}\t{count}");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChromosomeOutput {
    pub chromosome: String,
    /// In the order of the input pairs.
    pub pairs: Vec<PairEvaluation>,
    pub evidence: EvidenceCounts,
    pub tally: OutcomeTally,
}

type PassOutput = (Vec<PairEvaluation>, EvidenceCounts);

/// Each worker fills its own evidence dictionary. They are summed once every pair is done.
fn run_pass(pairs: &[&ReadPair], evaluator: &Evaluator, confirmed: Option<&[CandidateIndel]>) -> Result<PassOutput> {
    pairs
        .par_iter()
        .try_fold(
            || (vec![], EvidenceCounts::new()),
            |(mut evaluations, mut evidence): PassOutput, pair| -> Result<PassOutput> {
                let evaluation = evaluator.evaluate_pair(pair, confirmed, &mut evidence)?;
                evaluations.push(evaluation);
                Ok((evaluations, evidence))
            },
        )
        .try_reduce(
            || (vec![], EvidenceCounts::new()),
            |(mut xs, x_evidence), (ys, y_evidence)| {
                xs.extend(ys);
                Ok((xs, x_evidence.merge(y_evidence)))
            },
        )
}

fn pass_over<S: SnippetSource>(
    dataset: &DataSet,
    pairs: &[&ReadPair],
    indels: &[CandidateIndel],
    reference: &S,
    config: &RealignConfig,
    confirmed: Option<&[CandidateIndel]>,
) -> Result<PassOutput> {
    let groups = CoOccurrence::from_groups(&dataset.indel_groups)?;
    let catalog = IndelCatalog::build(&dataset.chromosome, indels, reference, &config.catalog)?;
    let comparer = config.build_comparer();
    let groups = (!groups.is_empty()).then_some(&groups);
    let evaluator = Evaluator::new(config, &catalog, reference, comparer.as_ref(), groups);
    debug!("PASS\t{}\t{}\t{}", dataset.chromosome, pairs.len(), catalog.len());
    run_pass(pairs, &evaluator, confirmed)
}

/// One realignment pass over every pair of the chromosome.
pub fn realign_chromosome<S: SnippetSource>(
    dataset: &DataSet,
    reference: &S,
    config: &RealignConfig,
) -> Result<ChromosomeOutput> {
    let pairs: Vec<_> = dataset.pairs.iter().collect();
    let (pairs, evidence) = pass_over(dataset, &pairs, &dataset.candidate_indels, reference, config, None)?;
    let tally = OutcomeTally::from_evaluations(&pairs);
    tally.log(&dataset.chromosome, "single");
    Ok(ChromosomeOutput {
        chromosome: dataset.chromosome.clone(),
        pairs,
        evidence,
        tally,
    })
}

/// Realign twice. The second pass boosts the indels accepted in the first,
/// treats well supported ones as confirmed, and revisits only the pairs
/// whose original alignment carried an indel or a soft-clip.
///
/// Evidence of both passes is summed. Support of an indel realigned away in the
/// second pass is not withdrawn.
pub fn snowball<S: SnippetSource>(dataset: &DataSet, reference: &S, config: &RealignConfig) -> Result<ChromosomeOutput> {
    let first = realign_chromosome(dataset, reference, config)?;
    let boosted: Vec<CandidateIndel> = dataset
        .candidate_indels
        .iter()
        .map(|indel| {
            let mut indel = indel.clone();
            if let Some(evidence) = first.evidence.get(&indel.key()) {
                indel.score += evidence.accepted as f64;
            }
            indel
        })
        .collect();
    let supported: HashSet<_> = first.evidence.supported(config.snowball.min_support).collect();
    let confirmed: Vec<CandidateIndel> = boosted
        .iter()
        .filter(|indel| supported.contains(&indel.key()))
        .cloned()
        .collect();
    let revisit: Vec<usize> = dataset
        .pairs
        .iter()
        .enumerate()
        .filter(|(_, pair)| classify_pair(pair).is_reprocessed())
        .map(|(i, _)| i)
        .collect();
    debug!(
        "SNOWBALL\t{}\t{}\t{}",
        dataset.chromosome,
        confirmed.len(),
        revisit.len()
    );
    let pairs: Vec<_> = revisit.iter().map(|&i| &dataset.pairs[i]).collect();
    let confirmed = (!confirmed.is_empty()).then_some(confirmed.as_slice());
    let (second, evidence) = pass_over(dataset, &pairs, &boosted, reference, config, confirmed)?;
    let ChromosomeOutput {
        chromosome,
        pairs: mut evaluations,
        evidence: first_evidence,
        ..
    } = first;
    for (idx, evaluation) in revisit.into_iter().zip(second) {
        evaluations[idx] = evaluation;
    }
    let tally = OutcomeTally::from_evaluations(&evaluations);
    tally.log(&chromosome, "snowball");
    Ok(ChromosomeOutput {
        chromosome,
        pairs: evaluations,
        evidence: first_evidence.merge(evidence),
        tally,
    })
}

/// Realign a data set the way the configuration asks: one pass, or the snowball.
pub fn realign_dataset<S: SnippetSource>(dataset: &DataSet, reference: &S, config: &RealignConfig) -> Result<ChromosomeOutput> {
    match config.snowball.enabled {
        true => snowball(dataset, reference, config),
        false => realign_chromosome(dataset, reference, config),
    }
}
