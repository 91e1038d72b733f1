//! `bpmn-parse`: compile BPMN files and print diagnostics or graphs.
//!
//! ```bash
//! bpmn-parse order.bpmn invoice.bpmn
//! bpmn-parse --config compiler.yaml --format json order.bpmn
//! ```

use anyhow::Context;
use bpmn_parse_core::{BpmnCompiler, CompileError, CompileOutput, CompilerConfig};
use clap::{Parser, ValueEnum};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bpmn-parse")]
#[command(version)]
#[command(about = "Compile BPMN 2.0 process definitions and report problems")]
struct Cli {
    /// BPMN files to compile
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Compiler configuration (YAML)
    #[arg(long, short, env = "BPMN_PARSE_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'o', default_value = "text", value_enum)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// `RUST_LOG` when set and valid, `warn` otherwise.
fn log_filter(rust_log: Option<&str>) -> EnvFilter {
    rust_log
        .filter(|directives| !directives.trim().is_empty())
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new("warn"))
}

fn main() -> ExitCode {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(rust_log.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when at least one file failed to compile.
fn run(cli: &Cli) -> anyhow::Result<bool> {
    let config = match &cli.config {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            CompilerConfig::from_yaml_str(&yaml)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CompilerConfig::default(),
    };

    let mut all_ok = true;
    for file in &cli.files {
        let xml = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
        let resource = file.display().to_string();
        match BpmnCompiler::new(config.clone()).compile(&resource, &xml) {
            Ok(output) => print_output(file, &output, cli.format)?,
            Err(err) => {
                all_ok = false;
                print_failure(&err, cli.format)?;
            }
        }
    }
    Ok(all_ok)
}

fn print_output(file: &Path, output: &CompileOutput, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let graphs: Vec<_> = output.processes.iter().map(|g| g.deterministic_json()).collect();
            let json = serde_json::json!({
                "resource": file.display().to_string(),
                "processes": graphs,
                "warnings": output.warnings,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            for warning in &output.warnings {
                println!("{warning}");
            }
            println!("{}: {} process(es)", file.display(), output.processes.len());
            for graph in &output.processes {
                let jobs = output.job_declarations.get(&graph.key).map_or(0, Vec::len);
                println!(
                    "  {} activities={} transitions={} jobs={} fingerprint={}",
                    graph.key,
                    graph.activities.len(),
                    graph.transitions.len(),
                    jobs,
                    hex(&graph.fingerprint())
                );
            }
        }
    }
    Ok(())
}

fn print_failure(err: &CompileError, format: OutputFormat) -> anyhow::Result<()> {
    match (format, err.report()) {
        (OutputFormat::Json, Some(report)) => println!("{}", serde_json::to_string_pretty(report)?),
        (OutputFormat::Json, None) => {
            println!("{}", serde_json::json!({ "error": err.to_string() }))
        }
        (OutputFormat::Text, _) => println!("{err}"),
    }
    Ok(())
}

/// Lowercase hex of a fingerprint.
fn hex(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut acc, b| {
        let _ = write!(acc, "{b:02x}");
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flags and positional files parse.
    #[test]
    fn t_cli_1_arguments() {
        let cli = Cli::try_parse_from(["bpmn-parse", "--format", "json", "a.bpmn", "b.bpmn"]).unwrap();
        assert_eq!(cli.files.len(), 2);
        assert!(cli.format == OutputFormat::Json);
        assert!(Cli::try_parse_from(["bpmn-parse"]).is_err());
    }

    /// Fingerprints print as lowercase hex.
    #[test]
    fn t_cli_2_hex() {
        assert_eq!(hex(&[0x0f, 0xa0]), "0fa0");
    }

    /// `RUST_LOG` replaces the default level instead of being capped by it.
    #[test]
    fn t_cli_3_log_filter() {
        use tracing::level_filters::LevelFilter;
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(Some("")).max_level_hint(), Some(LevelFilter::WARN));
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
    }
}
