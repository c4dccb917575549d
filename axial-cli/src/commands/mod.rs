// CLI subcommands

pub mod expand;
pub mod validate;

use std::path::Path;

use clap::Args;
use color_eyre::Result;

use axial_service::ExpansionConfig;

/// Options shared by every command that expands a project
#[derive(Args, Debug, Clone, Default)]
pub struct ExpansionArgs {
    /// Expand matrices concurrently on the blocking thread pool
    #[arg(long, env = "AXIAL_PARALLEL")]
    pub parallel: bool,

    /// Fail on the first matrix error instead of skipping that matrix
    #[arg(long, env = "AXIAL_STRICT")]
    pub strict: bool,
}

impl ExpansionArgs {
    pub fn config(&self) -> ExpansionConfig {
        ExpansionConfig::new()
            .with_parallel(self.parallel)
            .with_strict(self.strict)
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        color_eyre::eyre::bail!("Project file not found: {}", path.display());
    }
    Ok(())
}
