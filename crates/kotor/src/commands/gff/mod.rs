pub mod check;
pub mod dump;

#[derive(clap::Subcommand)]
pub enum GffCommands {
    /// Print a GFF file as JSON
    Dump(dump::DumpArgs),
    /// Verify that a GFF file survives a decode/encode cycle
    Check(check::CheckArgs),
}

impl GffCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            GffCommands::Dump(dump) => dump.handle(),
            GffCommands::Check(check) => check.handle(),
        }
    }
}
