use clap::Args;
use kotor_installation::{NodeKind, VirtualNode, VirtualTree};
use miette::Result;
use owo_colors::OwoColorize;
use std::{path::PathBuf, sync::Arc};
use tracing::warn;

#[derive(Args)]
pub struct TreeArgs {
    /// The installation root directory
    #[arg(short, long, value_name = "DIR")]
    root: PathBuf,

    /// How many levels to expand
    #[arg(short, long, default_value_t = 2)]
    depth: usize,
}

impl TreeArgs {
    fn print(&self, node: &VirtualNode, level: usize) {
        let indent = "  ".repeat(level);
        match node.kind() {
            NodeKind::Directory => println!("{indent}{}/", node.name().blue().bold()),
            NodeKind::Container | NodeKind::NestedContainer => {
                println!("{indent}{}", node.name().yellow())
            }
            NodeKind::LooseFile | NodeKind::ContainedEntry => println!("{indent}{}", node.name()),
        }

        if !node.has_children() || level >= self.depth {
            return;
        }
        match node.children() {
            Ok(children) => {
                for child in children.iter() {
                    self.print(child, level + 1);
                }
            }
            Err(e) => warn!("unable to expand {}: {e}", node.name()),
        }
    }

    pub fn handle(&self) -> Result<()> {
        let installation = Arc::new(super::load(&self.root)?);
        let tree = VirtualTree::new(installation);
        self.print(&tree.root(), 0);
        Ok(())
    }
}
