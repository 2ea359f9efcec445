pub mod diff;
pub mod extract;
pub mod list;
pub mod pack;

#[derive(clap::Subcommand)]
pub enum ContainerCommands {
    /// Compare two containers
    Diff(diff::DiffArgs),
    /// Extract a container into a directory
    Extract(extract::ExtractArgs),
    /// List the entries of a container
    List(list::ListArgs),
    /// Pack a directory into a container
    Pack(pack::PackArgs),
}

impl ContainerCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            ContainerCommands::Diff(diff) => diff.handle(),
            ContainerCommands::Extract(extract) => extract.handle(),
            ContainerCommands::List(list) => list.handle(),
            ContainerCommands::Pack(pack) => pack.handle(),
        }
    }
}
