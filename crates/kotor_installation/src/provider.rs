//! The three kinds of storage an installation resolves through.

use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use indexmap::{map::Entry, IndexMap};
use kotor_common::{HandlePool, ResourceId};
use kotor_erf::{ContainerArchive, ContainerIndex};
use kotor_key::Catalog;
use tracing::{debug, instrument, trace, warn};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Part of an installation that could not be read. Loading carries on without it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderWarning {
    pub path: PathBuf,
    pub message: String,
}

impl ProviderWarning {
    pub(crate) fn new(path: &Path, message: impl fmt::Display) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.to_string(),
        }
    }
}

/// Which provider supplied a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// A file in the override directory
    LooseFile { path: PathBuf },

    /// An entry of a container file
    Container { path: PathBuf },

    /// An entry of a base archive listed by the catalog
    BaseArchive { archive: PathBuf },
}

impl Provenance {
    pub fn path(&self) -> &Path {
        match self {
            Provenance::LooseFile { path } | Provenance::Container { path } => path,
            Provenance::BaseArchive { archive } => archive,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::LooseFile { path } => write!(f, "override {}", path.display()),
            Provenance::Container { path } => write!(f, "container {}", path.display()),
            Provenance::BaseArchive { archive } => write!(f, "base archive {}", archive.display()),
        }
    }
}

/// Size and modification time, used to tell whether a file changed between scans
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    pub fn of(path: &Path) -> Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Files of the override directory keyed by the id their name decodes to
#[derive(Debug, Default)]
pub struct LooseDirectory {
    path: PathBuf,
    files: IndexMap<ResourceId, PathBuf>,
}

impl LooseDirectory {
    /// Walk `path` recursively in file name order. The first file for an id wins.
    ///
    /// A missing directory yields an empty provider. Anything the walk cannot read, the directory
    /// itself included, is skipped and recorded in `warnings`.
    #[instrument(skip(warnings))]
    pub fn scan(path: &Path, warnings: &mut Vec<ProviderWarning>) -> Self {
        let mut files = IndexMap::new();
        if !path.is_dir() {
            debug!("no override directory");
            return Self {
                path: path.to_path_buf(),
                files,
            };
        }

        for entry in WalkDir::new(path).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let unreadable = e.path().unwrap_or(path);
                    warn!(path = %unreadable.display(), "skipping unreadable override entry: {e}");
                    warnings.push(ProviderWarning::new(unreadable, &e));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            let id = match ResourceId::from_filename(&name) {
                Ok(id) => id,
                Err(e) => {
                    trace!(file = %entry.path().display(), "ignoring file: {e}");
                    continue;
                }
            };
            match files.entry(id) {
                Entry::Occupied(existing) => warn!(
                    file = %entry.path().display(),
                    kept = %existing.get().display(),
                    "duplicate override file"
                ),
                Entry::Vacant(slot) => {
                    slot.insert(entry.into_path());
                }
            }
        }

        debug!(files = files.len(), "scanned override directory");
        Self {
            path: path.to_path_buf(),
            files,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of the file supplying `id`
    pub fn file(&self, id: &ResourceId) -> Option<&Path> {
        self.files.get(id).map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A container file with its parsed entry table
#[derive(Debug)]
pub struct ContainerProvider {
    path: PathBuf,
    stamp: FileStamp,
    index: Arc<ContainerIndex>,
    pool: Arc<HandlePool>,
}

impl ContainerProvider {
    #[instrument(skip(pool), err)]
    pub fn open(path: &Path, pool: Arc<HandlePool>) -> Result<Self> {
        let stamp = FileStamp::of(path)?;
        let index = ContainerArchive::open(path)?.index();
        Ok(Self {
            path: path.to_path_buf(),
            stamp,
            index,
            pool,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stamp(&self) -> FileStamp {
        self.stamp
    }

    pub fn index(&self) -> &ContainerIndex {
        &self.index
    }

    /// Shareable handle to the parsed entry table
    pub fn shared_index(&self) -> Arc<ContainerIndex> {
        Arc::clone(&self.index)
    }

    fn fetch(&self, id: &ResourceId) -> Result<Vec<u8>> {
        let entry = self
            .index
            .get(id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        trace!(%id, path = %self.path.display(), "reading container entry");
        Ok(self
            .pool
            .read_at(&self.path, entry.offset as u64, entry.size as usize)?)
    }
}

/// One tier of an installation
///
/// Cloning is cheap: every variant shares its parsed state.
#[derive(Debug, Clone)]
pub enum ResourceProvider {
    LooseDirectory(Arc<LooseDirectory>),
    Container(Arc<ContainerProvider>),
    Catalog(Arc<Catalog>),
}

impl ResourceProvider {
    /// Short label for logs and listings
    pub fn describe(&self) -> String {
        match self {
            ResourceProvider::LooseDirectory(dir) => format!("override {}", dir.path.display()),
            ResourceProvider::Container(container) => {
                format!(
                    "{} {}",
                    container.index.container_type(),
                    container.path.display()
                )
            }
            ResourceProvider::Catalog(catalog) => format!("catalog {}", catalog.root().display()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResourceProvider::LooseDirectory(dir) => dir.len(),
            ResourceProvider::Container(container) => container.index.len(),
            ResourceProvider::Catalog(catalog) => catalog.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id at `position` in the provider's own order
    pub fn id_at(&self, position: usize) -> Option<&ResourceId> {
        match self {
            ResourceProvider::LooseDirectory(dir) => dir.files.get_index(position).map(|(id, _)| id),
            ResourceProvider::Container(container) => {
                container.index.get_index(position).map(|entry| &entry.id)
            }
            ResourceProvider::Catalog(catalog) => catalog.get_index(position).map(|entry| &entry.id),
        }
    }

    /// Every id this provider holds
    pub fn list(&self) -> ProviderIds<'_> {
        ProviderIds {
            provider: self,
            position: 0,
        }
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        match self {
            ResourceProvider::LooseDirectory(dir) => dir.files.contains_key(id),
            ResourceProvider::Container(container) => container.index.contains(id),
            ResourceProvider::Catalog(catalog) => catalog.contains(id),
        }
    }

    /// Read the bytes of `id`, failing with [`Error::NotFound`] when this provider lacks it.
    ///
    /// An override file deleted since the last scan also counts as not found.
    pub fn fetch(&self, id: &ResourceId) -> Result<Vec<u8>> {
        match self {
            ResourceProvider::LooseDirectory(dir) => {
                let path = dir.file(id).ok_or_else(|| Error::NotFound(id.clone()))?;
                fs::read(path).map_err(|e| match e.kind() {
                    io::ErrorKind::NotFound => {
                        debug!(path = %path.display(), "override file is gone");
                        Error::NotFound(id.clone())
                    }
                    _ => e.into(),
                })
            }
            ResourceProvider::Container(container) => container.fetch(id),
            ResourceProvider::Catalog(catalog) => Ok(catalog.fetch(id)?),
        }
    }

    /// Where `id` would be read from, if this provider holds it
    pub fn provenance(&self, id: &ResourceId) -> Option<Provenance> {
        match self {
            ResourceProvider::LooseDirectory(dir) => dir.file(id).map(|path| Provenance::LooseFile {
                path: path.to_path_buf(),
            }),
            ResourceProvider::Container(container) => {
                container.index.contains(id).then(|| Provenance::Container {
                    path: container.path.clone(),
                })
            }
            ResourceProvider::Catalog(catalog) => {
                let entry = catalog.entry(id)?;
                let archive = catalog.archive_path(entry.archive_index)?;
                Some(Provenance::BaseArchive {
                    archive: archive.to_path_buf(),
                })
            }
        }
    }
}

/// Iterator over the ids of one provider
#[derive(Debug, Clone)]
pub struct ProviderIds<'a> {
    provider: &'a ResourceProvider,
    position: usize,
}

impl<'a> Iterator for ProviderIds<'a> {
    type Item = &'a ResourceId;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.provider.id_at(self.position)?;
        self.position += 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.provider.len().saturating_sub(self.position);
        (left, Some(left))
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::sync::Arc;

    use kotor_common::{ResourceId, ResourceKind};
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use crate::error::Result;
    use crate::provider::{LooseDirectory, Provenance, ResourceProvider};

    fn scan(path: &std::path::Path) -> LooseDirectory {
        let mut warnings = Vec::new();
        let loose = LooseDirectory::scan(path, &mut warnings);
        assert_eq!(warnings, Vec::new());
        loose
    }

    #[traced_test]
    #[test]
    fn loose_directory_scan() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join("a/b"))?;
        fs::write(dir.path().join("a/b/p_bastila.utc"), b"nested")?;
        fs::write(dir.path().join("P_Bastila.UTC"), b"top")?;
        fs::write(dir.path().join("readme"), b"no extension")?;
        fs::write(dir.path().join("notes.docx"), b"unknown extension")?;

        let provider = ResourceProvider::LooseDirectory(Arc::new(scan(dir.path())));
        let id = ResourceId::new("p_bastila", ResourceKind::Utc)?;

        assert_eq!(provider.len(), 1);
        assert_eq!(provider.list().collect::<Vec<_>>(), vec![&id]);
        // `P_Bastila.UTC` sorts before the `a` directory
        assert_eq!(provider.fetch(&id)?, b"top");
        assert_eq!(
            provider.provenance(&id),
            Some(Provenance::LooseFile {
                path: dir.path().join("P_Bastila.UTC")
            })
        );
        assert!(logs_contain("duplicate override file"));
        Ok(())
    }

    #[test]
    fn missing_directory_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let loose = scan(&dir.path().join("override"));
        assert!(loose.is_empty());

        let provider = ResourceProvider::LooseDirectory(Arc::new(loose));
        let err = provider
            .fetch(&ResourceId::new("x", ResourceKind::Utc)?)
            .unwrap_err();
        assert!(err.is_not_found());
        Ok(())
    }

    #[test]
    fn deleted_file_is_not_found() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("door01.utd"), b"door")?;
        let provider = ResourceProvider::LooseDirectory(Arc::new(scan(dir.path())));
        let id = ResourceId::new("door01", ResourceKind::Utd)?;
        assert_eq!(provider.fetch(&id)?, b"door");

        fs::remove_file(dir.path().join("door01.utd"))?;
        assert!(provider.fetch(&id).unwrap_err().is_not_found());
        Ok(())
    }
}
