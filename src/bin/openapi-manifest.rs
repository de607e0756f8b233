//! OpenAPI Manifest CLI
//!
//! Command-line interface for extracting tool manifests from OpenAPI documents
//! and validating descriptor shapes.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use openapi_manifest::{
    extract, load_document, load_document_auto, validate, validate_descriptor, ExtractError,
    ExtractOptions, Manifest, ValidationReport,
};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "openapi-manifest")]
#[command(about = "Extract tool manifests from OpenAPI documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract one descriptor per operation of an OpenAPI document
    Extract {
        /// Document source: file path or URL (http:// or https://), JSON or YAML
        source: String,

        /// Override every server URL with this base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Substitute server variable defaults into server URLs
        #[arg(long)]
        expand_variables: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,

        /// Emit a manifest grouped by primary tag instead of a flat list
        #[arg(long)]
        group_by_tag: bool,

        /// Manifest name (with --group-by-tag)
        #[arg(long, default_value = "api", requires = "group_by_tag")]
        name: String,

        /// Manifest version label (with --group-by-tag)
        #[arg(long, default_value = "1", requires = "group_by_tag")]
        version_label: String,

        /// Fail if any descriptor does not pass shape validation
        #[arg(long)]
        strict: bool,
    },

    /// Validate descriptor shape (a descriptor, an array, or `extract` output)
    Validate {
        /// Descriptor file to validate
        file: PathBuf,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            source,
            base_url,
            expand_variables,
            output,
            pretty,
            group_by_tag,
            name,
            version_label,
            strict,
        } => run_extract(ExtractArgs {
            source,
            base_url,
            expand_variables,
            output,
            pretty,
            group_by_tag,
            name,
            version_label,
            strict,
        }),

        Commands::Validate { file, json } => run_validate(&file, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

struct ExtractArgs {
    source: String,
    base_url: Option<String>,
    expand_variables: bool,
    output: Option<PathBuf>,
    pretty: bool,
    group_by_tag: bool,
    name: String,
    version_label: String,
    strict: bool,
}

fn run_extract(args: ExtractArgs) -> Result<(), u8> {
    let document = load_document_auto(&args.source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let mut options = ExtractOptions::new().expand_server_variables(args.expand_variables);
    if let Some(base_url) = args.base_url {
        options = options.base_url(base_url);
    }

    let extraction = extract(&document, options);

    if let Some(issue) = extraction
        .issues
        .iter()
        .find(|i| matches!(i.error, ExtractError::NotADocument { .. }))
    {
        eprintln!("Error: {}", issue.error);
        return Err(2);
    }

    info!(
        endpoints = extraction.endpoints.len(),
        skipped = extraction.issues.len(),
        degraded_refs = extraction.reference_diagnostics.len(),
        degraded_schemas = extraction.schema_diagnostics.len(),
        "extraction complete"
    );

    if args.strict {
        let failures: Vec<(String, ValidationReport)> = extraction
            .endpoints
            .iter()
            .map(|e| (e.descriptor.name.clone(), validate_descriptor(&e.descriptor)))
            .filter(|(_, report)| !report.valid)
            .collect();
        if !failures.is_empty() {
            eprintln!("Validation failed:");
            for (name, report) in failures {
                for error in report.errors {
                    eprintln!("  {}: {}", name, error);
                }
            }
            return Err(1);
        }
    }

    let rendered = if args.group_by_tag {
        let manifest = Manifest::from_extracted(args.name, args.version_label, extraction.endpoints);
        render(&manifest, args.pretty)
    } else {
        render(&extraction.endpoints, args.pretty)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    write_output(args.output.as_deref(), &rendered)
}

fn render<T: serde::Serialize + ?Sized>(value: &T, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

fn write_output(output: Option<&Path>, rendered: &str) -> Result<(), u8> {
    match output {
        Some(path) => {
            std::fs::write(path, rendered).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", rendered);
        }
    }
    Ok(())
}

/// Collect descriptors from a single object, an array, or `extract` output entries.
fn descriptors(value: &Value) -> Vec<&Value> {
    fn unwrap_entry(entry: &Value) -> &Value {
        entry.get("tool").unwrap_or(entry)
    }
    match value {
        Value::Array(entries) => entries.iter().map(unwrap_entry).collect(),
        other => vec![unwrap_entry(other)],
    }
}

fn run_validate(file: &Path, json_output: bool) -> Result<(), u8> {
    let value = load_document(file).map_err(|e| {
        report_error(json_output, &format!("loading descriptors: {}", e));
        e.exit_code() as u8
    })?;

    let reports: Vec<ValidationReport> = descriptors(&value).into_iter().map(validate).collect();
    let all_valid = reports.iter().all(|r| r.valid);

    if json_output {
        let output = if reports.len() == 1 {
            serde_json::to_value(&reports[0])
        } else {
            serde_json::to_value(&reports)
        };
        match output {
            Ok(output) => println!("{}", output),
            Err(e) => {
                report_error(json_output, &e.to_string());
                return Err(2);
            }
        }
    } else if all_valid {
        println!("Valid");
    } else {
        eprintln!("Validation failed:");
        for (i, report) in reports.iter().enumerate() {
            for error in &report.errors {
                if reports.len() == 1 {
                    eprintln!("  {}", error);
                } else {
                    eprintln!("  [{}] {}", i, error);
                }
            }
        }
    }

    if all_valid {
        Ok(())
    } else {
        warn!(count = reports.iter().filter(|r| !r.valid).count(), "invalid descriptors");
        Err(1)
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}
