use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

fn verbose() -> Arg {
    Arg::new("verbose")
        .short('v')
        .action(ArgAction::Count)
        .help("Debug mode")
}

fn threads() -> Arg {
    Arg::new("threads")
        .short('t')
        .long("threads")
        .value_parser(value_parser!(usize))
        .help("Number of threads. Overrides the profile.")
}

fn input() -> Arg {
    Arg::new("input")
        .long("input")
        .short('i')
        .value_name("JSON")
        .value_parser(value_parser!(PathBuf))
        .help("Data set of one chromosome. Read from STDIN if not given.")
}

fn reference() -> Arg {
    Arg::new("reference")
        .long("reference")
        .short('r')
        .value_name("FASTA")
        .value_parser(value_parser!(PathBuf))
        .required(true)
        .help("Reference FASTA holding the chromosome of the data set.")
}

fn profile() -> Arg {
    Arg::new("profile")
        .long("profile")
        .short('p')
        .value_name("TOML")
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration. Omitted fields take their defaults.")
}

fn subcommand_realign() -> Command {
    Command::new("realign")
        .version("0.1")
        .about("Realign reads around candidate indels and write the rewritten data set to STDOUT.")
        .arg(verbose())
        .arg(threads())
        .arg(input())
        .arg(reference())
        .arg(profile())
        .arg(
            Arg::new("evidence")
                .long("evidence")
                .short('e')
                .value_name("TSV")
                .value_parser(value_parser!(PathBuf))
                .help("Write accept/reject counts of each indel here."),
        )
        .arg(
            Arg::new("snowball")
                .long("snowball")
                .action(ArgAction::SetTrue)
                .help("Realign twice, feeding the evidence of the first pass into the second."),
        )
}

fn subcommand_catalog() -> Command {
    Command::new("catalog")
        .version("0.1")
        .about("Build the indel catalog and write one TSV line per bucket to STDOUT.")
        .arg(verbose())
        .arg(input())
        .arg(reference())
        .arg(profile())
}

pub fn realign_parser() -> Command {
    Command::new("indel_realign")
        .version("0.1")
        .about("Indel-aware realignment of short reads")
        .arg_required_else_help(true)
        .subcommand(subcommand_realign())
        .subcommand(subcommand_catalog())
}
