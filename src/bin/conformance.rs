//! Conformance CLI
//!
//! Validates payloads against a message catalog and generates example
//! payloads for test suites.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use familiar_conformance::{
    batch, load_catalog_str, validate_batch, ConformanceConfig, ExampleGenerator, MessageResolver,
    SchemaCatalog, SchemaNode, ValidatorCompiler,
};
use serde_json::{json, Value};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conformance")]
#[command(about = "Validate message payloads and generate examples")]
struct Cli {
    /// Catalog document (components + messages)
    #[arg(short, long, default_value = "catalog.json")]
    catalog: PathBuf,

    /// Config file layered over the default locations
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate one payload
    Validate {
        /// Message type name
        message: String,
        /// Payload file, or "-" for stdin
        #[arg(default_value = "-")]
        payload: String,
    },

    /// Validate many payloads of one message type
    Batch {
        /// Message type name
        message: String,
        /// File holding a JSON array, or "-" for stdin
        #[arg(default_value = "-")]
        payloads: String,
        /// Read one JSON payload per line instead of an array
        #[arg(long)]
        lines: bool,
    },

    /// Print a payload that conforms to the message schema
    Example {
        message: String,
        /// Override the configured seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print payloads that each break one rule of the message schema
    Negative {
        message: String,
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the catalog fingerprint
    Fingerprint,

    /// Print the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether every checked payload conformed
fn run(cli: Cli) -> anyhow::Result<bool> {
    let config =
        ConformanceConfig::load_from(cli.config.as_deref()).context("loading configuration")?;
    let catalog_path = cli.catalog;

    match cli.command {
        Commands::Validate { message, payload } => {
            let payload: Value = serde_json::from_str(&read_input(&payload)?)
                .context("payload is not valid JSON")?;
            let compiler = ValidatorCompiler::new(read_catalog(&catalog_path)?)
                .with_options(config.validation_options());

            match compiler.validate(&message, &payload) {
                Ok(()) => {
                    println!("✅ {} - conforms", message);
                    Ok(true)
                }
                Err(errors) => {
                    println!("❌ {} - {} violation(s)", message, errors.len());
                    println!("{}", serde_json::to_string_pretty(&errors)?);
                    Ok(false)
                }
            }
        }

        Commands::Batch {
            message,
            payloads,
            lines,
        } => {
            let input = read_input(&payloads)?;
            let payloads = parse_batch(&input, lines)?;
            let compiler = ValidatorCompiler::new(read_catalog(&catalog_path)?)
                .with_options(config.validation_options());

            let outcome = validate_batch(&compiler, &message, &payloads, &config.batch_options());
            let passed = batch::passed(&outcome);

            let failures: Vec<Value> = outcome
                .iter()
                .filter_map(|(index, result)| {
                    result
                        .as_ref()
                        .err()
                        .map(|errors| json!({"index": index, "errors": errors}))
                })
                .collect();
            if !failures.is_empty() {
                println!("{}", serde_json::to_string_pretty(&failures)?);
            }
            println!("📊 {}/{} payloads conform", passed, outcome.len());
            Ok(passed == outcome.len())
        }

        Commands::Example { message, seed } => {
            let schema = resolve(&read_catalog(&catalog_path)?, &message)?;
            let generator = seed
                .map(ExampleGenerator::new)
                .unwrap_or_else(|| config.generator());
            println!("{}", serde_json::to_string_pretty(&generator.example(&schema))?);
            Ok(true)
        }

        Commands::Negative { message, seed } => {
            let schema = resolve(&read_catalog(&catalog_path)?, &message)?;
            let generator = seed
                .map(ExampleGenerator::new)
                .unwrap_or_else(|| config.generator());
            println!(
                "{}",
                serde_json::to_string_pretty(&generator.negative_cases(&schema))?
            );
            Ok(true)
        }

        Commands::Fingerprint => {
            println!("{}", read_catalog(&catalog_path)?.fingerprint());
            Ok(true)
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(true)
        }
    }
}

fn read_catalog(path: &Path) -> anyhow::Result<SchemaCatalog> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    load_catalog_str(&content).with_context(|| format!("loading catalog {}", path.display()))
}

fn read_input(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {}", source))
    }
}

fn parse_batch(input: &str, lines: bool) -> anyhow::Result<Vec<Value>> {
    if lines {
        return input
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str(line).with_context(|| format!("line {} is not valid JSON", n + 1))
            })
            .collect();
    }
    match serde_json::from_str::<Value>(input).context("batch is not valid JSON")? {
        Value::Array(payloads) => Ok(payloads),
        _ => bail!("batch input must be a JSON array (or use --lines)"),
    }
}

fn resolve(catalog: &SchemaCatalog, message: &str) -> anyhow::Result<Arc<SchemaNode>> {
    catalog
        .resolve(message)
        .map_err(|resolution| anyhow::anyhow!("{}", resolution.into_error()))
}
