use std::{ops::ControlFlow, path::Path};

use kotor_installation::{Installation, InstallationOptions};
use miette::{Context, Result};
use tracing::{debug, warn};

pub mod list;
pub mod resolve;
pub mod tree;

#[derive(clap::Subcommand)]
pub enum InstallationCommands {
    /// List every resource an installation provides
    List(list::ListArgs),
    /// Show where a resource resolves to
    Resolve(resolve::ResolveArgs),
    /// Print the directory and container tree
    Tree(tree::TreeArgs),
}

impl InstallationCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            InstallationCommands::List(list) => list.handle(),
            InstallationCommands::Resolve(resolve) => resolve.handle(),
            InstallationCommands::Tree(tree) => tree.handle(),
        }
    }
}

/// Load an installation, reporting progress and skipped containers through the log
fn load(root: &Path) -> Result<Installation> {
    let installation = Installation::new(root, InstallationOptions::default());
    installation
        .load(|progress| {
            debug!(
                "[{}/{}] {}",
                progress.done,
                progress.total,
                progress.path.display()
            );
            ControlFlow::Continue(())
        })
        .context(format!("loading {}", root.display()))?;

    for warning in installation.warnings() {
        warn!("skipped {}: {}", warning.path.display(), warning.message);
    }
    Ok(installation)
}
