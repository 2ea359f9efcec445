use clap::{Args, ValueEnum};
use itertools::Itertools;
use kotor_common::ResourceId;
use kotor_erf::ContainerArchive;
use kotor_gff::Gff;
use md5::{Digest, Md5};
use miette::{Context, Result};
use owo_colors::OwoColorize;
use similar::{ChangeTag, TextDiff};
use std::{
    collections::BTreeSet,
    fmt::Display,
    io::{Read, Seek},
    path::PathBuf,
};

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Mode {
    /// Report which entries changed
    #[default]
    Semantic,
    /// Also show line diffs of changed GFF entries
    Full,
}

#[derive(Debug, Eq, PartialEq)]
enum Change {
    Added(String),
    Removed(String),
    Comparison(String, String, String),
    Context(Vec<String>),
    Modified(String, Vec<Change>),
}

impl Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Change::Added(v) => writeln!(f, "✅ {}", v.green()),
            Change::Removed(v) => writeln!(f, "❌ {}", v.red()),
            Change::Comparison(key, old, new) => {
                writeln!(f, "* {}: {} vs {}", key, old.red(), new.green())
            }
            Change::Context(lines) => {
                writeln!(f, "{}", lines.iter().map(|l| format!(" {l}")).join("\n"))
            }
            Change::Modified(v, children) => {
                writeln!(f, "🔃 {}", v.blue())?;
                let body = children.iter().map(|c| c.to_string()).join("");
                writeln!(
                    f,
                    "{}",
                    body.split('\n')
                        .filter(|l| !l.trim().is_empty())
                        .map(|l| format!("  {l}"))
                        .join("\n")
                )
            }
        }
    }
}

#[derive(Args)]
pub struct DiffArgs {
    /// An input container
    #[arg(short, long, value_name = "FILE")]
    left: PathBuf,

    /// An input container
    #[arg(short, long, value_name = "FILE")]
    right: PathBuf,

    /// Comparison mode
    #[arg(short, long, value_enum, default_value_t = Mode::Semantic)]
    mode: Mode,
}

fn digest(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

impl DiffArgs {
    fn gff_lines(&self, data: &[u8]) -> Option<String> {
        let gff = Gff::read(data).ok()?;
        serde_json::to_string_pretty(&gff).ok()
    }

    fn handle_entry(&self, id: &ResourceId, left: &[u8], right: &[u8]) -> Option<Change> {
        if left == right {
            return None;
        }

        let mut related = Vec::new();
        if left.len() != right.len() {
            related.push(Change::Comparison(
                "size".into(),
                left.len().to_string(),
                right.len().to_string(),
            ));
        }
        related.push(Change::Comparison("md5".into(), digest(left), digest(right)));

        if self.mode == Mode::Full && id.kind.is_gff() {
            if let (Some(old), Some(new)) = (self.gff_lines(left), self.gff_lines(right)) {
                let diff = TextDiff::from_lines(&old, &new);
                let mut context = Vec::new();
                for op in diff.ops() {
                    for change in diff.iter_inline_changes(op) {
                        if change.tag() == ChangeTag::Equal {
                            continue;
                        }
                        let mut line = String::new();
                        for (emphasized, value) in change.iter_strings_lossy() {
                            let value = value.trim_end_matches('\n');
                            match (emphasized, change.tag()) {
                                (true, ChangeTag::Insert) => {
                                    line.push_str(&format!("{}", value.green().underline()))
                                }
                                (true, _) => line.push_str(&format!("{}", value.red().underline())),
                                (false, _) => line.push_str(&format!("{}", value.dimmed())),
                            }
                        }
                        context.push(line);
                    }
                }
                related.push(Change::Context(context));
            }
        }

        Some(Change::Modified(id.to_string(), related))
    }

    fn handle_container<R: Read + Seek>(
        &self,
        name: &str,
        left: &mut ContainerArchive<R>,
        right: &mut ContainerArchive<R>,
    ) -> Result<Option<Change>> {
        let mut changes = Vec::new();

        if left.container_type() != right.container_type() {
            changes.push(Change::Comparison(
                "type".into(),
                left.container_type().to_string(),
                right.container_type().to_string(),
            ));
        }
        if left.len() != right.len() {
            changes.push(Change::Comparison(
                "entries".into(),
                left.len().to_string(),
                right.len().to_string(),
            ));
        }

        let left_ids = left.ids().cloned().collect::<BTreeSet<_>>();
        let right_ids = right.ids().cloned().collect::<BTreeSet<_>>();

        right_ids
            .difference(&left_ids)
            .map(|id| Change::Added(id.to_string()))
            .for_each(|c| changes.push(c));
        left_ids
            .difference(&right_ids)
            .map(|id| Change::Removed(id.to_string()))
            .for_each(|c| changes.push(c));

        for id in left_ids.intersection(&right_ids) {
            let data_left = left.fetch(id).context(format!("reading {id}"))?;
            let data_right = right.fetch(id).context(format!("reading {id}"))?;
            if let Some(change) = self.handle_entry(id, &data_left, &data_right) {
                changes.push(change);
            }
        }

        if changes.is_empty() {
            return Ok(None);
        }
        Ok(Some(Change::Modified(name.to_string(), changes)))
    }

    pub fn handle(&self) -> Result<()> {
        let mut left = ContainerArchive::open(&self.left)
            .context(format!("path: {}", &self.left.display()))?;
        let mut right = ContainerArchive::open(&self.right)
            .context(format!("path: {}", &self.right.display()))?;

        let difference =
            self.handle_container(&self.left.to_string_lossy(), &mut left, &mut right)?;

        match difference {
            Some(d) => println!("{}", d),
            None => println!("{}", "containers are identical".green()),
        }

        Ok(())
    }
}
