use realign_cli::pipeline::*;
use std::io::Write;
use std::path::PathBuf;
#[macro_use]
extern crate log;

fn main() -> std::io::Result<()> {
    let matches = realign_cli::commands::realign_parser().get_matches();
    if let Some((_, sub_m)) = matches.subcommand() {
        init_logger(sub_m.get_count("verbose"));
    }
    match matches.subcommand() {
        Some(("realign", sub_m)) => realign(sub_m),
        Some(("catalog", sub_m)) => catalog(sub_m),
        _ => unreachable!(),
    }
}

fn realign(matches: &clap::ArgMatches) -> std::io::Result<()> {
    let profile: Option<&PathBuf> = matches.get_one("profile");
    let mut config = load_profile(profile.map(|p| p.as_path()))?;
    if let Some(&threads) = matches.get_one::<usize>("threads") {
        config.threads = threads;
    }
    if matches.get_flag("snowball") {
        config.snowball.enabled = true;
    }
    set_threads(config.threads);
    let input: Option<&PathBuf> = matches.get_one("input");
    let dataset = parse_json(input.map(|p| p.as_path()))?;
    let fasta: &PathBuf = matches.get_one("reference").unwrap();
    let reference = load_reference(fasta, &dataset.chromosome, config.snippet_flank)?;
    let (realigned, output) = run_realign(&dataset, &reference, &config)?;
    if let Some(path) = matches.get_one::<PathBuf>("evidence") {
        debug!("Writing evidence to {:?}", path);
        write_evidence(&output, path)?;
    }
    let stdout = std::io::stdout();
    flush_json(&realigned, stdout.lock())
}

fn catalog(matches: &clap::ArgMatches) -> std::io::Result<()> {
    let profile: Option<&PathBuf> = matches.get_one("profile");
    let config = load_profile(profile.map(|p| p.as_path()))?;
    let input: Option<&PathBuf> = matches.get_one("input");
    let dataset = parse_json(input.map(|p| p.as_path()))?;
    let fasta: &PathBuf = matches.get_one("reference").unwrap();
    let reference = load_reference(fasta, &dataset.chromosome, config.snippet_flank)?;
    let catalog = build_catalog(&dataset, &reference, &config)?;
    let stdout = std::io::stdout();
    let mut wtr = std::io::BufWriter::new(stdout.lock());
    write_catalog(&catalog, &mut wtr)?;
    wtr.flush()
}
