use clap::Args;
use kotor_erf::ContainerArchive;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, path::PathBuf};
use tracing::info;

#[derive(Args)]
pub struct ExtractArgs {
    /// An input container
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl ExtractArgs {
    pub fn handle(&self) -> Result<()> {
        let mut archive = ContainerArchive::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;

        std::fs::create_dir_all(&self.directory)
            .into_diagnostic()
            .context(format!("creating {}", &self.directory.display()))?;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;

            let p = self.directory.join(entry.id().filename());
            info!("writing {}", p.display());

            let mut out = if !self.overwrite {
                File::create_new(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            } else {
                File::create(&p)
                    .into_diagnostic()
                    .context(format!("creating {}", &p.display()))?
            };

            std::io::copy(&mut entry, &mut out).into_diagnostic()?;
        }
        Ok(())
    }
}
