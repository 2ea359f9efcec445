use clap::Args;
use kotor_common::ResourceId;
use md5::{Digest, Md5};
use miette::{Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct ResolveArgs {
    /// The installation root directory
    #[arg(short, long, value_name = "DIR")]
    root: PathBuf,

    /// Resource to look up, e.g. `door01.utd`
    #[arg(short = 'n', long, value_name = "NAME.EXT")]
    resource: String,

    /// List every provider holding the resource, not just the winner
    #[arg(long, default_value_t = false)]
    all: bool,

    /// Write the resolved bytes to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl ResolveArgs {
    pub fn handle(&self) -> Result<()> {
        let id: ResourceId = self.resource.parse()?;
        let installation = super::load(&self.root)?;

        let resource = installation
            .resolve(&id)
            .context(format!("resolving {id}"))?;

        let mut hasher = Md5::new();
        hasher.update(&resource.data);
        println!("{}", resource.id.bold());
        println!("  from: {}", resource.provenance);
        println!("  size: {}", resource.data.len());
        println!("  md5:  {:x}", hasher.finalize());

        if self.all {
            for (rank, provenance) in installation.resolve_all(&id)?.iter().enumerate() {
                let line = format!("  #{} {provenance}", rank + 1);
                if rank == 0 {
                    println!("{}", line.green());
                } else {
                    println!("{}", line.dimmed());
                }
            }
        }

        if let Some(path) = &self.output {
            std::fs::write(path, &resource.data)
                .into_diagnostic()
                .context(format!("writing {}", path.display()))?;
        }
        Ok(())
    }
}
