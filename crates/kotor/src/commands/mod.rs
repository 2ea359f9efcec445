pub mod container;
pub mod gff;
pub mod installation;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle GFF files
    Gff {
        #[command(subcommand)]
        command: gff::GffCommands,
    },
    /// Handle ERF, MOD, SAV, HAK and RIM containers
    Container {
        #[command(subcommand)]
        command: container::ContainerCommands,
    },
    /// Look resources up in a game installation
    Installation {
        #[command(subcommand)]
        command: installation::InstallationCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Gff { command } => command.handle(),
            Commands::Container { command } => command.handle(),
            Commands::Installation { command } => command.handle(),
        }
    }
}
