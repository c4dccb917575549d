use crate::commands::{ensure_exists, ExpansionArgs};
use crate::output;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};
use color_eyre::Result;

use axial_service::{BuildVariant, ExpansionReport, ProjectExpander, ProjectLoader};

/// Expand a project into build variants
#[derive(Args, Debug)]
pub struct ExpandArgs {
    /// Path to the project definition (YAML, or JSON with a .json extension)
    pub project: PathBuf,

    /// Output format
    #[arg(long, short = 'f', value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Only print the variants generated by this matrix
    #[arg(long, value_name = "MATRIX")]
    pub matrix: Option<String>,

    #[command(flatten)]
    pub expansion: ExpansionArgs,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

pub async fn execute(args: ExpandArgs) -> Result<()> {
    ensure_exists(&args.project)?;

    output::status("Loading", &format!("{}", args.project.display()));
    let definition = ProjectLoader::parse_file(&args.project)
        .map_err(|e| color_eyre::eyre::eyre!("Parse error: {}", e.message))?;

    if let Some(matrix) = &args.matrix {
        if !definition.matrices.iter().any(|m| &m.name == matrix) {
            color_eyre::eyre::bail!("Unknown matrix '{}'", matrix);
        }
    }

    let config = args.expansion.config();
    tracing::debug!(?config, "expansion settings");
    output::status("Expanding", &format!("{} matrices", definition.matrices.len()));
    let report = ProjectExpander::new(config)
        .run(Arc::new(definition))
        .await?;

    for failure in &report.failures {
        output::warning(&format!("matrix '{}' skipped: {}", failure.matrix, failure.error));
    }

    let report = match &args.matrix {
        Some(matrix) => only_matrix(report, matrix),
        None => report,
    };

    match args.format {
        OutputFormat::Text => print_text(&report),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report)?),
    }

    output::dim(&format!(
        "  {} variant(s), {} edge(s)",
        report.variants.len(),
        report.edges.len()
    ));

    Ok(())
}

/// Keep the variants of one matrix and the edges leaving them
fn only_matrix(report: ExpansionReport, matrix: &str) -> ExpansionReport {
    let variants: Vec<BuildVariant> = report
        .variants
        .into_iter()
        .filter(|v| v.matrix.as_deref() == Some(matrix))
        .collect();

    let names: HashSet<&str> = variants.iter().map(|v| v.name.as_str()).collect();
    let edges = report
        .edges
        .into_iter()
        .filter(|e| names.contains(e.from.variant.as_str()))
        .collect();

    let failures = report
        .failures
        .into_iter()
        .filter(|f| f.matrix == matrix)
        .collect();

    ExpansionReport {
        variants,
        edges,
        failures,
    }
}

fn print_text(report: &ExpansionReport) {
    for variant in &report.variants {
        println!("{} ({})", variant.name, variant.display_name);

        if !variant.run_on.is_empty() {
            println!("  run_on: {}", variant.run_on.join(", "));
        }
        if !variant.tags.is_empty() {
            let tags: Vec<&str> = variant.tags.iter().map(String::as_str).collect();
            println!("  tags: {}", tags.join(", "));
        }

        for task in &variant.tasks {
            if task.distros.is_empty() {
                println!("  - {}", task.name);
            } else {
                println!("  - {} [{}]", task.name, task.distros.join(", "));
            }
            for dependency in &task.depends_on {
                println!("      after {}@{}", dependency.name, dependency.variant);
            }
        }
        println!();
    }
}
