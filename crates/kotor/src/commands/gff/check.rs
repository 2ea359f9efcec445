use clap::Args;
use kotor_gff::Gff;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Args)]
pub struct CheckArgs {
    /// GFF files to check
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

impl CheckArgs {
    pub fn handle(&self) -> Result<()> {
        let mut failed = 0;
        for path in &self.files {
            let data = std::fs::read(path)
                .into_diagnostic()
                .context(format!("path: {}", path.display()))?;

            let decoded = Gff::read(&data).context(format!("decoding {}", path.display()))?;
            let encoded = decoded
                .to_bytes()
                .context(format!("encoding {}", path.display()))?;
            let again = Gff::read(&encoded).context(format!("decoding re-encoded {}", path.display()))?;
            debug!(before = data.len(), after = encoded.len(), "re-encoded");

            if decoded == again {
                println!("{} {}", "ok".green(), path.display());
            } else {
                failed += 1;
                println!("{} {}", "changed".red(), path.display());
            }
        }

        info!(checked = self.files.len(), failed, "done");
        if failed > 0 {
            return Err(miette!("{failed} file(s) did not survive re-encoding"));
        }
        Ok(())
    }
}
