use clap::Args;
use kotor_erf::ContainerArchive;
use miette::{Context, Result};
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct ListArgs {
    /// An input container
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl ListArgs {
    pub fn handle(&self) -> Result<()> {
        let archive = ContainerArchive::open(&self.file)
            .context(format!("path: {}", &self.file.display()))?;
        let index = archive.index();

        println!(
            "{} {} ({} entries)",
            index.container_type().bold(),
            self.file.display(),
            index.len()
        );
        for (language, text) in index.localized_strings() {
            println!("  description[{language}]: {text}");
        }
        for entry in index.entries() {
            println!(
                "{:>10} {:>10}  {}",
                entry.offset.dimmed(),
                entry.size,
                entry.id
            );
        }
        Ok(())
    }
}
