use clap::Args;
use kotor_common::ResourceKind;
use miette::{miette, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct ListArgs {
    /// The installation root directory
    #[arg(short, long, value_name = "DIR")]
    root: PathBuf,

    /// Only list resources with this extension, e.g. `utc`
    #[arg(short, long, value_name = "EXT")]
    kind: Option<String>,

    /// Print the provider of every resource
    #[arg(long, default_value_t = false)]
    provenance: bool,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let kind = self
            .kind
            .as_deref()
            .map(|ext| {
                ResourceKind::from_extension(ext.trim_start_matches('.'))
                    .ok_or_else(|| miette!("unknown resource extension {ext}"))
            })
            .transpose()?;
        let installation = super::load(&self.root)?;

        let mut count = 0usize;
        if self.provenance {
            for (id, provenance) in installation.enumerate(kind)?.with_provenance() {
                println!("{id}\t{provenance}");
                count += 1;
            }
        } else {
            for id in installation.enumerate(kind)? {
                println!("{id}");
                count += 1;
            }
        }

        info!("{count} resources");
        Ok(())
    }
}
