//! Mapweave CLI: apply a mapping spec to a data file.
//!
//! Usage:
//!   mapweave <template> <data> [out] [--format nquads|ntriples|update|delete]
//!            [--abort-on-error] [--no-auto-declare] [--set NAME=VALUE ...]

use clap::Parser;
use mapweave::source::{read_records, source_name};
use mapweave::{
    write_output, MapperSpec, OutputFormat, ReconcilerConfig, RunConfig, TemplateProcessor, Value,
};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mapweave", version, about = "Template-driven record to RDF mapping")]
struct Cli {
    /// Mapping specification (YAML or JSON)
    template: PathBuf,
    /// Input records (.csv, .jsonl)
    data: PathBuf,
    /// Output file, stdout if omitted
    out: Option<PathBuf>,
    /// Output format
    #[arg(long, default_value = "nquads")]
    format: OutputFormat,
    /// Produce no output if any record fails
    #[arg(long)]
    abort_on_error: bool,
    /// Skip implicit class and property declarations
    #[arg(long)]
    no_auto_declare: bool,
    /// Override a global, e.g. --set '$datasetID=farms'
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_global)]
    globals: Vec<(String, String)>,
    /// Reconciliation request timeout in seconds
    #[arg(long, default_value_t = 30)]
    reconcile_timeout: u64,
}

fn parse_global(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {}", s))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing global name in {}", s));
    }
    let name = if name.starts_with('$') { name.to_string() } else { format!("${}", name) };
    Ok((name, value.to_string()))
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut spec = MapperSpec::load(&cli.template)?.with_auto_declare(!cli.no_auto_declare);
    for (name, value) in cli.globals {
        spec = spec.with_global(name, Value::Str(value));
    }

    let config = RunConfig::default()
        .with_abort_on_error(cli.abort_on_error)
        .with_reconciler(ReconcilerConfig::default().with_timeout_secs(cli.reconcile_timeout));
    let mut processor = TemplateProcessor::new(spec, source_name(&cli.data)).with_config(config);

    let records = read_records(&cli.data)?;
    processor.start()?;
    for record in records {
        processor.process_row(record)?;
    }
    let output = processor.finalize()?;

    let mut out: Box<dyn Write> = match &cli.out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    write_output(&mut out, &*output.sink, cli.format)?;
    out.flush()?;

    if output.summary.failed_rows > 0 {
        eprintln!(
            "Warning: {} of {} records failed",
            output.summary.failed_rows, output.summary.rows
        );
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
