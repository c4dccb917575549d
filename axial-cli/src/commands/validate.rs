use crate::commands::{ensure_exists, ExpansionArgs};
use crate::output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use color_eyre::Result;

use axial_service::{AxisRegistry, MatrixExpander, ProjectExpander, ProjectLoader};

/// Validate a project definition file
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to the project definition (YAML, or JSON with a .json extension)
    pub project: PathBuf,

    #[command(flatten)]
    pub expansion: ExpansionArgs,
}

pub async fn execute(args: ValidateArgs) -> Result<()> {
    let project_path = &args.project;
    ensure_exists(project_path)?;

    // Step 1: Parse syntax and schema
    output::status("Validating", &format!("{}", project_path.display()));

    let definition = match ProjectLoader::parse_file(project_path) {
        Ok(definition) => definition,
        Err(e) => {
            output::error(&format!("Parse error: {}", e.message));
            if e.line > 0 {
                output::info(&format!("  at line {}, column {}", e.line, e.column));
            }
            if let Some(suggestion) = &e.suggestion {
                output::info(&format!("  Suggestion: {}", suggestion));
            }
            std::process::exit(1);
        }
    };

    output::check("Definition syntax valid");
    output::check(&format!(
        "Structure: {} axes, {} matrices, {} build variants, {} tasks",
        definition.axes.len(),
        definition.matrices.len(),
        definition.build_variants.len(),
        definition.tasks.len()
    ));

    // Step 2: Expand every matrix and resolve dependencies
    let config = args.expansion.config();
    tracing::debug!(?config, "expansion settings");
    let definition = Arc::new(definition);
    let report = match ProjectExpander::new(config)
        .run(Arc::clone(&definition))
        .await
    {
        Ok(report) => report,
        Err(e) => {
            output::error(&format!("Expansion error: {}", e));
            std::process::exit(1);
        }
    };

    output::check(&format!(
        "Expanded {} variants with {} dependency edges",
        report.variants.len(),
        report.edges.len()
    ));

    let registry = AxisRegistry::from_definitions(&definition.axes)?;
    let expander = MatrixExpander::new(&registry);
    for matrix in &definition.matrices {
        if report.failures.iter().any(|f| f.matrix == matrix.name) {
            continue;
        }
        let combinations = expander.cardinality(matrix)?;
        let variants = report
            .variants
            .iter()
            .filter(|v| v.matrix.as_deref() == Some(matrix.name.as_str()))
            .count();
        output::check(&format!(
            "Matrix '{}': {} combinations, {} excluded",
            matrix.name,
            combinations,
            combinations.saturating_sub(variants)
        ));
    }

    // Step 3: Isolated matrix failures still make the project invalid
    if !report.is_complete() {
        output::error(&format!("{} matrix error(s):", report.failures.len()));
        for failure in &report.failures {
            output::failure(&format!("[{}] {}", failure.matrix, failure.error));
        }
        std::process::exit(1);
    }

    println!();
    output::success("Project is valid");

    Ok(())
}
