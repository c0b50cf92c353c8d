use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{ArgAction, CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use kira_proteome::app::App;
use kira_proteome::config::{GFFREAD_ENV, RunConfig, read_taxa};
use kira_proteome::domain::MissingProteinIdPolicy;
use kira_proteome::error::KiraError;
use kira_proteome::extract::GffreadExtractor;
use kira_proteome::fetch::HttpDownloader;
use kira_proteome::output::{ConsoleOutput, JsonOutput, OutputMode};
use kira_proteome::store::Store;

#[derive(Parser)]
#[command(name = "kira-proteome")]
#[command(
    about = "Build per-taxon non-redundant proteomes: one longest protein per gene from a genome and its GFF3"
)]
#[command(version, author, disable_version_flag = true)]
struct Cli {
    #[arg(short = 'i', long, help = "Input table with Taxon, Genome_link and GFF_link columns")]
    infile: Utf8PathBuf,

    #[arg(
        short = 'o',
        long,
        help = "Output file name (unused: outputs are named <taxon>.fas)"
    )]
    outfile: Option<Utf8PathBuf>,

    #[arg(short = 'v', long, action = ArgAction::Version, help = "Print version information and exit")]
    version: Option<bool>,

    #[arg(short = 'w', long, help = "Directory for downloads and outputs [default: current directory]")]
    workdir: Option<Utf8PathBuf>,

    #[arg(long, help = "Path to the gffread binary (falls back to KIRA_GFFREAD, then PATH)")]
    gffread: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = MissingProteinIdPolicy::Skip)]
    missing_protein_id: MissingProteinIdPolicy,

    #[arg(long, help = "Print a JSON run summary instead of progress lines")]
    json: bool,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        if let Some(outfile) = &self.outfile {
            tracing::warn!(%outfile, "--outfile is ignored; outputs are written to <taxon>.fas");
        }
        RunConfig {
            infile: self.infile,
            workdir: self.workdir,
            gffread: RunConfig::resolve_gffread(self.gffread),
            missing_protein_id: self.missing_protein_id,
            json: self.json,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(kira) = report.downcast_ref::<KiraError>() {
            return ExitCode::from(map_exit_code(kira));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &KiraError) -> u8 {
    match error {
        KiraError::InputRead { .. }
        | KiraError::DelimiterDetection(_)
        | KiraError::MissingColumn(_)
        | KiraError::InputParse(_)
        | KiraError::InvalidTaxon(_) => 2,
        KiraError::Http(_)
        | KiraError::HttpStatus { .. }
        | KiraError::MissingTool(_)
        | KiraError::ExtractorFailed(_)
        | KiraError::ExtractorOutput(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if std::env::args_os().len() <= 1 {
        println!("{}", Cli::command().render_usage());
        return Ok(());
    }

    let config = Cli::parse().into_config();
    let output_mode = if config.json {
        OutputMode::Json
    } else {
        OutputMode::Console
    };

    let store = match &config.workdir {
        Some(dir) => Store::new_with_root(dir.clone()),
        None => Store::new()?,
    };
    let extractor = match config.gffread.clone() {
        Some(program) => GffreadExtractor::with_program(program),
        None => GffreadExtractor::new(),
    };
    if extractor.program().is_none() {
        tracing::warn!("gffread not found on PATH; set --gffread or {GFFREAD_ENV}");
    }

    let rows = read_taxa(&config.infile)?;
    tracing::info!(taxa = rows.len(), infile = %config.infile, policy = %config.missing_protein_id, "input loaded");

    let downloader = HttpDownloader::new()?;
    let app = App::new(store, downloader, extractor, config.missing_protein_id);

    match output_mode {
        OutputMode::Console => {
            app.run(&rows, &ConsoleOutput)?;
        }
        OutputMode::Json => {
            let result = app.run(&rows, &JsonOutput)?;
            JsonOutput::print_run(&result).map_err(|err| KiraError::Filesystem(err.to_string()))?;
        }
    }
    Ok(())
}
