use anyhow::Context;
use bundler_cli::{commands, BundlerConfig};
use bundler_model::ContentHash;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    let file = || {
        Arg::new("file")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Document file (JSON)")
    };

    Command::new("bundler")
        .version(bundler_cli::VERSION)
        .about("Inspect and maintain bundler documents")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("YAML configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print reports as JSON"),
        )
        .subcommand(
            Command::new("inspect")
                .about("Show version, dependencies and class counts")
                .arg(file()),
        )
        .subcommand(
            Command::new("check")
                .about("Verify references and the ownership tree")
                .arg(file())
                .arg(
                    Arg::new("no-structure")
                        .long("no-structure")
                        .action(ArgAction::SetTrue)
                        .help("Skip ownership-tree checks"),
                )
                .arg(
                    Arg::new("expect-fingerprint")
                        .long("expect-fingerprint")
                        .value_name("HEX")
                        .value_parser(value_parser!(ContentHash))
                        .help("Fail unless the document hashes to this fingerprint"),
                ),
        )
        .subcommand(
            Command::new("prune")
                .about("Drop entries unreachable from the root")
                .arg(file())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write here instead of overwriting the input"),
                ),
        )
        .subcommand(
            Command::new("deps")
                .about("Resolve dependencies from a directory store, leaves first")
                .arg(file())
                .arg(
                    Arg::new("store")
                        .long("store")
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory of <version id>.json files"),
                ),
        )
}

fn init_tracing(config: &BundlerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn emit<T: Serialize + Display>(report: &T, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print!("{report}");
    }
    Ok(())
}

fn file_arg(args: &ArgMatches) -> anyhow::Result<&Path> {
    args.get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .context("missing document file")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let config = BundlerConfig::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    init_tracing(&config);
    let json = matches.get_flag("json");

    match matches.subcommand() {
        Some(("inspect", args)) => {
            let doc = commands::read_document(file_arg(args)?)?;
            emit(&commands::inspect(&doc)?, json)?;
        }
        Some(("check", args)) => {
            let doc = commands::read_document(file_arg(args)?)?;
            let structure = config.decode.verify_structure && !args.get_flag("no-structure");
            let expected = args.get_one::<ContentHash>("expect-fingerprint").copied();
            let report = commands::check(&doc, structure, expected)?;
            emit(&report, json)?;
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
        Some(("prune", args)) => {
            let input = file_arg(args)?;
            let output = args
                .get_one::<PathBuf>("output")
                .map_or(input, PathBuf::as_path);
            let doc = commands::read_document(input)?;
            emit(&commands::prune(doc, output)?, json)?;
        }
        Some(("deps", args)) => {
            let doc = commands::read_document(file_arg(args)?)?;
            let store = args
                .get_one::<PathBuf>("store")
                .or(config.store_dir.as_ref())
                .context("no store directory: pass --store or set store_dir in the config")?;
            emit(&commands::deps(&doc, store, &config).await?, json)?;
        }
        _ => unreachable!("subcommand is required"),
    }
    Ok(())
}
