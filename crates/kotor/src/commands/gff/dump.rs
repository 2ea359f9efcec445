use clap::Args;
use kotor_gff::Gff;
use miette::{Context, IntoDiagnostic, Result};
use std::{fs::File, io::Write, path::PathBuf};

#[derive(Args)]
pub struct DumpArgs {
    /// An input GFF file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Write the JSON here instead of to stdout
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit the JSON on a single line
    #[arg(long, default_value_t = false)]
    compact: bool,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let data = std::fs::read(&self.file)
            .into_diagnostic()
            .context(format!("path: {}", &self.file.display()))?;
        let gff = Gff::read(&data).context(format!("decoding {}", &self.file.display()))?;

        let json = if self.compact {
            serde_json::to_string(&gff)
        } else {
            serde_json::to_string_pretty(&gff)
        }
        .into_diagnostic()?;

        match &self.output {
            Some(path) => {
                let mut out = File::create(path)
                    .into_diagnostic()
                    .context(format!("creating {}", path.display()))?;
                writeln!(out, "{json}").into_diagnostic()?;
            }
            None => println!("{json}"),
        }
        Ok(())
    }
}
