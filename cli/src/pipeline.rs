//! Pipelines for loading the inputs, running the realignment of one chromosome, and writing the results.
use definitions::{DataSet, ReadPair};
use log::*;
use realigner::{ChromosomeOutput, IndelCatalog, RealignConfig, ReferenceSequence};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

fn invalid_data<E: std::fmt::Display>(why: E) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidData, why.to_string())
}

pub fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

pub fn set_threads(threads: usize) {
    debug!("Set Threads\t{}", threads);
    if let Err(why) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        debug!("{:?} The global pool is already set up.", why);
    }
}

/// The TOML profile, or the defaults if none is given.
pub fn load_profile(path: Option<&Path>) -> std::io::Result<RealignConfig> {
    let path = match path {
        Some(path) => path,
        None => return Ok(RealignConfig::default()),
    };
    debug!("Opening {:?}", path);
    let mut file = String::new();
    std::fs::File::open(path)
        .map(BufReader::new)?
        .read_to_string(&mut file)?;
    parse_profile(&file)
}

pub fn parse_profile(profile: &str) -> std::io::Result<RealignConfig> {
    toml::from_str(profile).map_err(invalid_data)
}

/// The data set at `path`, or on STDIN.
pub fn parse_json(path: Option<&Path>) -> std::io::Result<DataSet> {
    let dataset = match path {
        Some(path) => {
            debug!("Opening {:?}", path);
            let reader = std::fs::File::open(path).map(BufReader::new)?;
            serde_json::de::from_reader(reader)
        }
        None => {
            let stdin = std::io::stdin();
            serde_json::de::from_reader(BufReader::new(stdin.lock()))
        }
    };
    dataset.map_err(|why| {
        error!("Invalid data set: {why}");
        invalid_data(why)
    })
}

pub fn flush_json<W: Write>(dataset: &DataSet, wtr: W) -> std::io::Result<()> {
    let mut wtr = BufWriter::new(wtr);
    serde_json::ser::to_writer(&mut wtr, dataset).map_err(invalid_data)?;
    wtr.flush()
}

/// One chromosome of the reference FASTA.
pub fn load_reference(path: &Path, chromosome: &str, flank: i64) -> std::io::Result<ReferenceSequence> {
    debug!("Opening {:?}", path);
    let reader = std::fs::File::open(path).map(BufReader::new)?;
    let reference = bio_utils::fasta::parse_into_vec_from(reader)?
        .into_iter()
        .map(|record| {
            let (id, _, seq) = record.into();
            (id, seq)
        })
        .find(|(id, _): &(String, String)| id == chromosome)
        .map(|(id, seq)| ReferenceSequence::new(&id, seq.into_bytes(), flank))
        .ok_or_else(|| invalid_data(format!("{chromosome} is not in {path:?}")))?;
    if reference.is_empty() {
        return Err(invalid_data(format!("{chromosome} has no sequence in {path:?}")));
    }
    debug!("REFERENCE\t{chromosome}\t{}", reference.len());
    Ok(reference)
}

/// Realign the data set. The returned data set carries the rewritten reads.
pub fn run_realign(dataset: &DataSet, reference: &ReferenceSequence, config: &RealignConfig) -> std::io::Result<(DataSet, ChromosomeOutput)> {
    debug!("START\tRealign\t{}", dataset.chromosome);
    let output = realigner::realign_dataset(dataset, reference, config)?;
    let pairs: Vec<ReadPair> = output
        .pairs
        .iter()
        .map(|pair| ReadPair {
            name: pair.name.clone(),
            read1: pair.read1.record.clone(),
            read2: pair.read2.as_ref().map(|e| e.record.clone()),
        })
        .collect();
    let realigned = DataSet {
        pairs,
        ..dataset.clone()
    };
    debug!("END\tRealign\t{}\t{}", dataset.chromosome, output.tally.total());
    Ok((realigned, output))
}

pub fn write_evidence(output: &ChromosomeOutput, path: &Path) -> std::io::Result<()> {
    let mut wtr = std::fs::File::create(path).map(BufWriter::new)?;
    output.evidence.to_tsv(&mut wtr)?;
    wtr.flush()
}

/// One line per bucket: index, indels, compound indels, and the reference window.
pub fn write_catalog<W: Write>(catalog: &IndelCatalog, wtr: &mut W) -> std::io::Result<()> {
    writeln!(wtr, "chromosome\tbucket\tindels\tcompound\twindow_start\twindow_end")?;
    for (idx, bucket) in catalog.buckets() {
        let compound = bucket
            .indels()
            .iter()
            .filter(|indel| catalog.is_compound(indel))
            .count();
        let snippet = bucket.snippet();
        writeln!(
            wtr,
            "{}\t{idx}\t{}\t{compound}\t{}\t{}",
            catalog.chromosome(),
            bucket.indels().len(),
            snippet.start,
            snippet.end()
        )?;
    }
    Ok(())
}

pub fn build_catalog(dataset: &DataSet, reference: &ReferenceSequence, config: &RealignConfig) -> std::io::Result<IndelCatalog> {
    let catalog = IndelCatalog::build(
        &dataset.chromosome,
        &dataset.candidate_indels,
        reference,
        &config.catalog,
    )?;
    Ok(catalog)
}
