//! A browsable, lazily expanded view of an installation.
//!
//! Directories, container files and the entries inside containers (including containers nested in
//! other containers) are all [`VirtualNode`]s. Children are produced on the first call to
//! [`VirtualNode::children`] and memoized until the installation is refreshed.

use std::{
    fmt::{self, Debug},
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use kotor_common::{ResourceId, ResourceKind};
use kotor_erf::{ContainerArchive, ContainerEntry, ContainerIndex};
use parking_lot::Mutex;
use tracing::{debug, instrument, trace};

use crate::{
    error::{Error, Result},
    installation::Installation,
    provider::{FileStamp, ResourceProvider},
};

/// What a [`VirtualNode`] stands for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Directory,
    LooseFile,
    Container,
    ContainedEntry,
    NestedContainer,
}

impl NodeKind {
    /// Whether nodes of this kind can be expanded
    pub const fn is_expandable(self) -> bool {
        matches!(
            self,
            NodeKind::Directory | NodeKind::Container | NodeKind::NestedContainer
        )
    }
}

/// Bytes an entry node reads from
#[derive(Debug)]
enum Archive {
    File(PathBuf),
    Memory(Arc<[u8]>),
}

#[derive(Debug)]
enum Source {
    Path(PathBuf),
    Entry {
        archive: Arc<Archive>,
        entry: ContainerEntry,
    },
}

struct Memo {
    generation: u64,
    children: Arc<[Arc<VirtualNode>]>,
}

/// One node of the virtual tree
pub struct VirtualNode {
    kind: NodeKind,
    name: String,
    source: Source,
    installation: Arc<Installation>,
    children: Mutex<Option<Memo>>,
}

impl Debug for VirtualNode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("VirtualNode")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("source", &self.source)
            .finish()
    }
}

impl VirtualNode {
    fn new(kind: NodeKind, name: String, source: Source, installation: &Arc<Installation>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            name,
            source,
            installation: Arc::clone(installation),
            children: Mutex::new(None),
        })
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this node may have children. Never expands the node.
    pub fn has_children(&self) -> bool {
        self.kind.is_expandable()
    }

    /// On-disk location, for directories, loose files and container files
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            Source::Path(path) => Some(path),
            Source::Entry { .. } => None,
        }
    }

    /// The id this node is addressed by, if its name decodes to one
    pub fn resource_id(&self) -> Option<ResourceId> {
        match &self.source {
            Source::Entry { entry, .. } => Some(entry.id.clone()),
            Source::Path(_) if self.kind == NodeKind::Directory => None,
            Source::Path(_) => ResourceId::from_filename(&self.name).ok(),
        }
    }

    /// Children of this node, expanded on first access.
    ///
    /// Repeated calls return the same nodes in the same order until the installation is
    /// refreshed. Leaf nodes have no children.
    pub fn children(&self) -> Result<Arc<[Arc<VirtualNode>]>> {
        let generation = self.installation.generation();
        let mut memo = self.children.lock();
        if let Some(memo) = memo.as_ref().filter(|m| m.generation == generation) {
            return Ok(Arc::clone(&memo.children));
        }

        let children: Arc<[Arc<VirtualNode>]> = self.expand()?.into();
        *memo = Some(Memo {
            generation,
            children: Arc::clone(&children),
        });
        Ok(children)
    }

    /// The bytes of a file, container or entry
    pub fn read(&self) -> Result<Vec<u8>> {
        match (&self.source, self.kind) {
            (Source::Path(_), NodeKind::Directory) => Err(Error::NotAFile(self.name.clone())),
            (Source::Path(path), _) => Ok(fs::read(path)?),
            (Source::Entry { archive, entry }, _) => self.read_entry(archive, entry),
        }
    }

    fn read_entry(&self, archive: &Archive, entry: &ContainerEntry) -> Result<Vec<u8>> {
        trace!(id = %entry.id, "reading entry");
        match archive {
            Archive::File(path) => Ok(self.installation.pool().read_at(
                path,
                entry.offset as u64,
                entry.size as usize,
            )?),
            Archive::Memory(bytes) => {
                let start = entry.offset as usize;
                let range = bytes.get(start..start + entry.size as usize).ok_or_else(|| {
                    kotor_erf::error::Error::TruncatedData {
                        expected: entry.offset as u64 + entry.size as u64,
                        actual: bytes.len() as u64,
                    }
                })?;
                Ok(range.to_vec())
            }
        }
    }

    #[instrument(skip(self), fields(name = %self.name), err)]
    fn expand(&self) -> Result<Vec<Arc<VirtualNode>>> {
        let children = match (&self.source, self.kind) {
            (Source::Path(path), NodeKind::Directory) => self.expand_directory(path)?,
            (Source::Path(path), NodeKind::Container) => {
                let index = match self.loaded_index(path) {
                    Some(index) => index,
                    None => ContainerArchive::open(path)?.index(),
                };
                self.expand_container(&index, Arc::new(Archive::File(path.clone())))
            }
            (Source::Entry { archive, entry }, NodeKind::NestedContainer) => {
                let bytes: Arc<[u8]> = self.read_entry(archive, entry)?.into();
                let index = ContainerArchive::from_bytes(Arc::clone(&bytes))?.index();
                self.expand_container(&index, Arc::new(Archive::Memory(bytes)))
            }
            _ => Vec::new(),
        };
        debug!(children = children.len(), "expanded node");
        Ok(children)
    }

    /// The entry table the installation parsed for `path`, unless the file changed since
    fn loaded_index(&self, path: &Path) -> Option<Arc<ContainerIndex>> {
        let providers = self.installation.providers().ok()?;
        let container = providers.iter().find_map(|provider| match provider {
            ResourceProvider::Container(container) if container.path() == path => {
                Some(Arc::clone(container))
            }
            _ => None,
        })?;
        if container.stamp() != FileStamp::of(path).ok()? {
            return None;
        }
        debug!(path = %path.display(), "reusing container index");
        Some(container.shared_index())
    }

    fn expand_directory(&self, path: &Path) -> Result<Vec<Arc<VirtualNode>>> {
        let mut children = Vec::new();
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let kind = if entry.file_type()?.is_dir() {
                NodeKind::Directory
            } else if is_container_name(&name) {
                NodeKind::Container
            } else {
                NodeKind::LooseFile
            };
            children.push(VirtualNode::new(
                kind,
                name,
                Source::Path(entry.path()),
                &self.installation,
            ));
        }

        children.sort_by_cached_key(|node| (node.kind != NodeKind::Directory, node.name.to_lowercase()));
        Ok(children)
    }

    fn expand_container(&self, index: &ContainerIndex, archive: Arc<Archive>) -> Vec<Arc<VirtualNode>> {
        index
            .entries()
            .map(|entry| {
                let kind = if entry.id.kind.is_container() {
                    NodeKind::NestedContainer
                } else {
                    NodeKind::ContainedEntry
                };
                VirtualNode::new(
                    kind,
                    entry.id.filename(),
                    Source::Entry {
                        archive: Arc::clone(&archive),
                        entry: entry.clone(),
                    },
                    &self.installation,
                )
            })
            .collect()
    }
}

fn is_container_name(name: &str) -> bool {
    name.rsplit_once('.')
        .and_then(|(_, ext)| ResourceKind::from_extension(ext))
        .is_some_and(ResourceKind::is_container)
}

/// Entry point of the virtual tree of one installation
#[derive(Debug, Clone)]
pub struct VirtualTree {
    root: Arc<VirtualNode>,
}

impl VirtualTree {
    pub fn new(installation: Arc<Installation>) -> Self {
        let path = installation.root().to_path_buf();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            root: VirtualNode::new(NodeKind::Directory, name, Source::Path(path), &installation),
        }
    }

    /// The installation root directory
    pub fn root(&self) -> Arc<VirtualNode> {
        Arc::clone(&self.root)
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::error::{Error, Result};
    use crate::installation::Installation;
    use crate::options::InstallationOptions;
    use crate::tree::{NodeKind, VirtualTree};

    #[test]
    fn directory_listing_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join("Override"))?;
        fs::create_dir(dir.path().join("modules"))?;
        fs::write(dir.path().join("chitin.key"), b"")?;
        fs::write(dir.path().join("Amod.mod"), b"")?;
        fs::write(dir.path().join("dialog.tlk"), b"")?;

        let installation = Arc::new(Installation::new(dir.path(), InstallationOptions::default()));
        let root = VirtualTree::new(installation).root();
        assert!(root.has_children());

        let children = root.children()?;
        let listing: Vec<_> = children.iter().map(|n| (n.kind(), n.name())).collect();
        assert_eq!(
            listing,
            vec![
                (NodeKind::Directory, "modules"),
                (NodeKind::Directory, "Override"),
                (NodeKind::Container, "Amod.mod"),
                (NodeKind::LooseFile, "chitin.key"),
                (NodeKind::LooseFile, "dialog.tlk"),
            ]
        );

        assert!(matches!(root.read(), Err(Error::NotAFile(_))));
        assert!(!children[4].has_children());
        assert_eq!(children[4].children()?.len(), 0);
        Ok(())
    }
}
