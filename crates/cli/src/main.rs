//! REST API Diff CLI
//!
//! Command-line interface for comparing two versions of a Swagger 2.0 API
//! description and reporting breaking changes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use rest_api_diff_analyzer::output::{diff_file, generate_diagnostics, pruned_documents};
use rest_api_diff_analyzer::{
    canonicalize_files, is_api_document, ApiDiff, ClassifiedDifference, DiffFileOptions,
    DiffReport, RuleChain,
};
use rest_api_diff_parser::{CanonicalizeOptions, FsLoader};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "rest-api-diff")]
#[command(version, about = "Detect breaking changes between two Swagger 2.0 API descriptions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true, env = "VERBOSE")]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare two API descriptions and classify every difference
    #[command(after_help = "EXAMPLES:\n  \
        # Compare two versions of a service\n  \
        rest-api-diff diff \\\n    \
        --lhs specs/stable/2023-01-01 \\\n    \
        --rhs specs/stable/2024-01-01\n\n  \
        # Group violations by rule and accept known differences\n  \
        rest-api-diff diff \\\n    \
        --lhs old/storage.json \\\n    \
        --rhs new/storage.json \\\n    \
        --group-violations \\\n    \
        --suppressions suppressions.yaml\n\n  \
        # Skip a rule for this run\n  \
        rest-api-diff diff --lhs a.json --rhs b.json --disable-rule ignore-type-omission")]
    Diff {
        /// Left-hand (baseline) files or folders
        #[arg(long, env = "LHS", value_delimiter = ' ', num_args = 1.., required = true)]
        lhs: Vec<PathBuf>,

        /// Right-hand (candidate) files or folders
        #[arg(long, env = "RHS", value_delimiter = ' ', num_args = 1.., required = true)]
        rhs: Vec<PathBuf>,

        /// Folder that receives the output files (cleared before writing)
        #[arg(short, long, env = "OUTPUT_FOLDER", default_value = "./output")]
        output_folder: PathBuf,

        /// Group diff files by rule name
        #[arg(long, env = "GROUP_VIOLATIONS")]
        group_violations: bool,

        /// Keep definitions, parameters and responses in the canonical documents
        #[arg(long, env = "PRESERVE_DEFINITIONS")]
        preserve_definitions: bool,

        /// Write each difference path as a single percent-encoded string
        #[arg(long, env = "FLATTEN_PATHS")]
        flatten_paths: bool,

        /// YAML file of suppressed paths
        #[arg(long, env = "SUPPRESSIONS")]
        suppressions: Option<PathBuf>,

        /// Remove a rule from the chain (repeatable)
        #[arg(long = "disable-rule")]
        disabled_rules: Vec<String>,
    },

    /// Canonicalize one API description and write the result
    #[command(after_help = "EXAMPLES:\n  \
        # Canonicalize a folder of files\n  \
        rest-api-diff canonicalize --input specs/stable/2024-01-01 --output canonical.json\n\n  \
        # Also write the source mapping\n  \
        rest-api-diff canonicalize \\\n    \
        --input storage.json \\\n    \
        --output canonical.json \\\n    \
        --mapping mapping.json")]
    Canonicalize {
        /// Root files or folders
        #[arg(short, long, num_args = 1.., required = true)]
        input: Vec<PathBuf>,

        /// Destination of the canonical document
        #[arg(short, long)]
        output: PathBuf,

        /// Destination of the destination-to-source path mapping
        #[arg(long)]
        mapping: Option<PathBuf>,

        /// Keep definitions, parameters and responses in the output
        #[arg(long)]
        preserve_definitions: bool,
    },

    /// List the rules in evaluation order
    #[command(after_help = "EXAMPLES:\n  \
        rest-api-diff rules")]
    Rules,
}

/// Settings for one `diff` invocation
struct DiffConfig<'a> {
    lhs: &'a [PathBuf],
    rhs: &'a [PathBuf],
    output_folder: &'a Path,
    group_violations: bool,
    preserve_definitions: bool,
    flatten_paths: bool,
    suppressions: Option<PathBuf>,
    disabled_rules: Vec<String>,
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if cli.verbose {
        println!("{} Verbose mode enabled", "→".cyan());
    }

    match cli.command {
        Commands::Diff {
            lhs,
            rhs,
            output_folder,
            group_violations,
            preserve_definitions,
            flatten_paths,
            suppressions,
            disabled_rules,
        } => {
            let has_issues = diff_command(DiffConfig {
                lhs: &lhs,
                rhs: &rhs,
                output_folder: &output_folder,
                group_violations,
                preserve_definitions,
                flatten_paths,
                suppressions,
                disabled_rules,
                verbose: cli.verbose,
            })?;
            if has_issues {
                std::process::exit(1);
            }
        }
        Commands::Canonicalize {
            input,
            output,
            mapping,
            preserve_definitions,
        } => {
            canonicalize_command(
                &input,
                &output,
                mapping.as_deref(),
                preserve_definitions,
                cli.verbose,
            )?;
        }
        Commands::Rules => rules_command(),
    }

    Ok(())
}

/// Run a comparison and write its output files; returns whether issues were found
fn diff_command(config: DiffConfig<'_>) -> Result<bool> {
    println!("{} Collecting input files...", "→".cyan());
    let lhs = collect_inputs(config.lhs, config.verbose)?;
    let rhs = collect_inputs(config.rhs, config.verbose)?;
    println!(
        "  Left-hand: {} file(s), right-hand: {} file(s)",
        lhs.len(),
        rhs.len()
    );

    println!("{} Comparing...", "→".cyan());
    let report = ApiDiff::new(lhs, rhs)
        .preserve_definitions(config.preserve_definitions)
        .disable_rules(config.disabled_rules)
        .suppressions(config.suppressions)
        .verbose(config.verbose)
        .run()
        .context("Comparison failed")?;

    let options = DiffFileOptions {
        group: config.group_violations,
        flatten_paths: config.flatten_paths,
    };
    write_outputs(&report, config.output_folder, options)?;
    println!(
        "{} Wrote output files to {}",
        "✓".green(),
        config.output_folder.display()
    );

    if config.verbose {
        let diagnostics = generate_diagnostics(&report)?;
        if !diagnostics.is_empty() {
            eprint!("{diagnostics}");
        }
    }

    print_summary(&report);
    Ok(report.has_issues())
}

/// Write the diff files and pruned documents into a freshly cleared folder
fn write_outputs(report: &DiffReport, folder: &Path, options: DiffFileOptions) -> Result<()> {
    prepare_output_folder(folder)?;

    let classification = &report.classification;
    let violations: Vec<&ClassifiedDifference> = classification.violations().collect();
    let accepted: Vec<&ClassifiedDifference> = classification
        .no_violations()
        .chain(classification.suppressed())
        .collect();

    // Phase 1: Raw canonical documents
    write_json(&folder.join("lhs-raw.json"), &report.lhs.tree)?;
    write_json(&folder.join("rhs-raw.json"), &report.rhs.tree)?;

    // Phase 2: Documents pruned down to what needs review, and the inverse
    let (lhs, rhs) = pruned_documents(
        &report.lhs.tree,
        &report.rhs.tree,
        accepted.iter().copied(),
    );
    write_json(&folder.join("lhs.json"), &lhs)?;
    write_json(&folder.join("rhs.json"), &rhs)?;
    let (lhs_inverse, rhs_inverse) = pruned_documents(
        &report.lhs.tree,
        &report.rhs.tree,
        violations.iter().copied(),
    );
    write_json(&folder.join("lhs-inv.json"), &lhs_inverse)?;
    write_json(&folder.join("rhs-inv.json"), &rhs_inverse)?;

    // Phase 3: Diff files, only when there is something to list
    if !violations.is_empty() {
        let diff = diff_file(violations.iter().copied(), options)?;
        write_json(&folder.join("diff.json"), &diff)?;
    }
    if !accepted.is_empty() {
        let inverse = diff_file(accepted.iter().copied(), options)?;
        write_json(&folder.join("diff-inv.json"), &inverse)?;
    }
    Ok(())
}

/// Create `folder`, or delete the files already in it
fn prepare_output_folder(folder: &Path) -> Result<()> {
    if !folder.exists() {
        fs::create_dir_all(folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;
        return Ok(());
    }
    for entry in fs::read_dir(folder)
        .with_context(|| format!("Failed to read {}", folder.display()))?
    {
        let path = entry?.path();
        if path.is_file() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

fn print_summary(report: &DiffReport) {
    let summary = &report.summary;
    println!();
    if report.has_issues() {
        println!("{}", "== ISSUES FOUND! ==".red().bold());
    } else {
        println!("{}", "== NO ISSUES FOUND! ==".green().bold());
    }
    println!(
        "  Flagged violations: {} ({} rules)",
        summary.flagged_count.to_string().yellow(),
        summary.rules_violated_count
    );
    println!(
        "  Assumed violations: {} ({} groups)",
        summary.assumed_count.to_string().yellow(),
        summary.assumed_groups_count
    );
    println!("  No violations: {}", summary.no_violation_count);
    println!("  Suppressed: {}", summary.suppressed_count);
    println!(
        "  Unresolved references: {}",
        summary.unresolved_reference_count
    );
    if !report.preserve_definitions {
        println!(
            "  Unreferenced definitions: {}",
            summary.unreferenced_definition_count
        );
    }
}

fn canonicalize_command(
    inputs: &[PathBuf],
    output: &Path,
    mapping: Option<&Path>,
    preserve_definitions: bool,
    verbose: bool,
) -> Result<()> {
    println!("{} Collecting input files...", "→".cyan());
    let files = collect_inputs(inputs, verbose)?;

    println!("{} Canonicalizing {} file(s)...", "→".cyan(), files.len());
    let options = CanonicalizeOptions {
        preserve_named_collections: preserve_definitions,
    };
    let document =
        canonicalize_files(&files, &FsLoader, options).context("Canonicalization failed")?;

    write_json(output, &document.tree)?;
    if let Some(mapping) = mapping {
        write_json(mapping, &document.mapping.to_json())?;
    }

    println!("\n{}", "✓ Canonicalization complete!".green().bold());
    println!("  Output: {}", output.display());
    if let Some(mapping) = mapping {
        println!("  Mapping: {} ({} entries)", mapping.display(), document.mapping.len());
    }
    if !document.unresolved.is_empty() {
        println!(
            "  {} {} unresolved reference(s)",
            "!".yellow(),
            document.unresolved.len()
        );
    }
    Ok(())
}

fn rules_command() {
    let chain = RuleChain::default_rules();
    println!("{}", "Rules (evaluated in order):".bold());
    for (position, name) in chain.names().into_iter().enumerate() {
        println!("  {:>2}. {}", position + 1, name.cyan());
    }
}

/// Expand files and folders into the API documents they contain.
///
/// Folders are walked recursively; `examples` folders are skipped.
fn collect_inputs(inputs: &[PathBuf], verbose: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if !input.exists() {
            anyhow::bail!("Input path does not exist: {}", input.display());
        }
        if input.is_file() {
            files.push(input.clone());
            continue;
        }

        let walker = WalkDir::new(input)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !(entry.file_type().is_dir() && entry.file_name() == "examples"));
        for entry in walker {
            let entry =
                entry.with_context(|| format!("Failed to walk {}", input.display()))?;
            if !entry.file_type().is_file() || !is_api_document(entry.path()) {
                continue;
            }
            if verbose {
                println!("  Found: {}", entry.path().display());
            }
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
