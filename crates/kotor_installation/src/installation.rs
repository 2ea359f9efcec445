//! Layered resolution over every provider of a game installation.

use std::{
    collections::HashMap,
    fs, io,
    ops::ControlFlow,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use kotor_common::{path::resolve_path, HandlePool, ResourceId, ResourceKind};
use kotor_key::Catalog;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn, Level};

use crate::{
    error::{Error, Result},
    options::InstallationOptions,
    provider::{
        ContainerProvider, FileStamp, LooseDirectory, Provenance, ProviderWarning,
        ResourceProvider,
    },
};

/// Lifecycle of an [`Installation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed { cause: String },
}

/// Reported to the progress callback after each provider is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadProgress {
    pub done: usize,
    pub total: usize,
    pub path: PathBuf,
}

/// Container counts of one [`Installation::refresh`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub added: usize,
    pub removed: usize,
    pub reopened: usize,
    pub unchanged: usize,
}

/// Resolved bytes together with the provider that supplied them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: ResourceId,
    pub data: Vec<u8>,
    pub provenance: Provenance,
}

/// A game installation resolved through its override directory, its containers and its catalog,
/// in that priority order.
///
/// The provider list is an immutable snapshot swapped as a whole by [`Installation::load`] and
/// [`Installation::refresh`]. Readers work on the snapshot they started with, so a lookup racing a
/// refresh sees either the old or the new providers, never a mix.
///
/// ```no_run
/// use kotor_common::ResourceId;
/// use kotor_installation::Installation;
///
/// fn door_bytes() -> miette::Result<Vec<u8>> {
///     let installation = Installation::open("/games/swkotor")?;
///     let door = installation.resolve(&"door01.utd".parse::<ResourceId>()?)?;
///     println!("{}", door.provenance);
///     Ok(door.data)
/// }
/// ```
#[derive(Debug)]
pub struct Installation {
    root: PathBuf,
    options: InstallationOptions,
    pool: Arc<HandlePool>,
    state: RwLock<LoadState>,
    providers: RwLock<Arc<[ResourceProvider]>>,
    warnings: RwLock<Vec<ProviderWarning>>,
    generation: AtomicU64,
    writer: Mutex<()>,
}

impl Installation {
    /// Create an unloaded installation rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, options: InstallationOptions) -> Self {
        Self {
            root: root.into(),
            pool: Arc::new(HandlePool::new(options.handle_pool_capacity)),
            options,
            state: RwLock::new(LoadState::Unloaded),
            providers: RwLock::new(Arc::from(Vec::new())),
            warnings: RwLock::new(Vec::new()),
            generation: AtomicU64::new(0),
            writer: Mutex::new(()),
        }
    }

    /// Create and load an installation with the default layout.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let installation = Self::new(root, InstallationOptions::default());
        installation.load(|_| ControlFlow::Continue(()))?;
        Ok(installation)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &InstallationOptions {
        &self.options
    }

    /// Read handles shared by every provider of this installation
    pub fn pool(&self) -> &Arc<HandlePool> {
        &self.pool
    }

    pub fn state(&self) -> LoadState {
        self.state.read().clone()
    }

    /// Bumped by every successful load or refresh
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Containers and directories that could not be read during the last load or refresh
    pub fn warnings(&self) -> Vec<ProviderWarning> {
        self.warnings.read().clone()
    }

    /// The current provider snapshot, highest priority first
    pub fn providers(&self) -> Result<Arc<[ResourceProvider]>> {
        if *self.state.read() != LoadState::Ready {
            return Err(Error::NotReady);
        }
        Ok(Arc::clone(&self.providers.read()))
    }

    /// Open every provider.
    ///
    /// `progress` is called after each provider is opened; returning [`ControlFlow::Break`]
    /// cancels the load and leaves the installation unloaded. A container or directory that cannot
    /// be read is recorded in [`Installation::warnings`]; a catalog that fails to open fails the
    /// load.
    #[instrument(skip_all, fields(root = %self.root.display()), err)]
    pub fn load<F>(&self, mut progress: F) -> Result<()>
    where
        F: FnMut(&LoadProgress) -> ControlFlow<()>,
    {
        let _writer = self.writer.lock();
        *self.state.write() = LoadState::Loading;

        match self.open_providers(&mut progress) {
            Ok((providers, warnings)) => {
                info!(providers = providers.len(), warnings = warnings.len(), "installation loaded");
                self.pool.clear();
                *self.providers.write() = providers.into();
                *self.warnings.write() = warnings;
                self.generation.fetch_add(1, Ordering::AcqRel);
                *self.state.write() = LoadState::Ready;
                Ok(())
            }
            Err(Error::Cancelled) => {
                debug!("load cancelled");
                *self.state.write() = LoadState::Unloaded;
                Err(Error::Cancelled)
            }
            Err(e) => {
                *self.state.write() = LoadState::Failed {
                    cause: e.to_string(),
                };
                Err(e)
            }
        }
    }

    fn open_providers<F>(
        &self,
        progress: &mut F,
    ) -> Result<(Vec<ResourceProvider>, Vec<ProviderWarning>)>
    where
        F: FnMut(&LoadProgress) -> ControlFlow<()>,
    {
        let mut warnings = Vec::new();
        let containers = self.container_paths(&mut warnings);
        let total = containers.len() + 2;
        let mut done = 0;
        let mut step = |path: &Path| {
            done += 1;
            let update = LoadProgress {
                done,
                total,
                path: path.to_path_buf(),
            };
            match progress(&update) {
                ControlFlow::Continue(()) => Ok(()),
                ControlFlow::Break(()) => Err(Error::Cancelled),
            }
        };

        let mut providers = Vec::with_capacity(total);

        let override_dir = self.override_path();
        providers.push(ResourceProvider::LooseDirectory(Arc::new(
            LooseDirectory::scan(&override_dir, &mut warnings),
        )));
        step(&override_dir)?;

        for path in &containers {
            match ContainerProvider::open(path, Arc::clone(&self.pool)) {
                Ok(container) => {
                    debug!(path = %path.display(), entries = container.index().len(), "opened container");
                    providers.push(ResourceProvider::Container(Arc::new(container)));
                }
                Err(e) => warnings.push(provider_warning(path, &e)),
            }
            step(path)?;
        }

        let catalog_path = resolve_path(&self.root, &self.options.catalog_name);
        let catalog = Catalog::open(&catalog_path, Arc::clone(&self.pool)).map_err(|e| {
            Error::ProviderUnavailable {
                path: catalog_path.clone(),
                reason: e.to_string(),
            }
        })?;
        debug!(entries = catalog.len(), "opened catalog");
        providers.push(ResourceProvider::Catalog(Arc::new(catalog)));
        step(&catalog_path)?;

        Ok((providers, warnings))
    }

    /// Re-scan the override directory and re-open every container whose size or modification
    /// time changed. Unchanged containers and the catalog are carried over as they are.
    #[instrument(skip_all, fields(root = %self.root.display()), err)]
    pub fn refresh(&self) -> Result<RefreshReport> {
        let _writer = self.writer.lock();
        let current = self.providers()?;

        let mut previous: HashMap<&Path, &Arc<ContainerProvider>> = HashMap::new();
        for provider in current.iter() {
            if let ResourceProvider::Container(container) = provider {
                previous.entry(container.path()).or_insert(container);
            }
        }

        let mut report = RefreshReport::default();
        let mut warnings = Vec::new();
        let mut providers = Vec::with_capacity(current.len());
        providers.push(ResourceProvider::LooseDirectory(Arc::new(
            LooseDirectory::scan(&self.override_path(), &mut warnings),
        )));

        let containers = self.container_paths(&mut warnings);
        for path in &containers {
            let existing = previous.get(path.as_path()).copied();
            let stamp = match FileStamp::of(path) {
                Ok(stamp) => stamp,
                Err(e) => {
                    warnings.push(provider_warning(path, &e));
                    continue;
                }
            };

            match existing {
                Some(container) if container.stamp() == stamp => {
                    report.unchanged += 1;
                    providers.push(ResourceProvider::Container(Arc::clone(container)));
                    continue;
                }
                Some(_) => {
                    self.pool.evict(path);
                    report.reopened += 1;
                }
                None => report.added += 1,
            }

            match ContainerProvider::open(path, Arc::clone(&self.pool)) {
                Ok(container) => providers.push(ResourceProvider::Container(Arc::new(container))),
                Err(e) => warnings.push(provider_warning(path, &e)),
            }
        }

        for path in previous.keys() {
            if !containers.iter().any(|c| c.as_path() == *path) {
                self.pool.evict(path);
                report.removed += 1;
            }
        }

        providers.extend(
            current
                .iter()
                .filter(|p| matches!(p, ResourceProvider::Catalog(_)))
                .cloned(),
        );

        *self.providers.write() = providers.into();
        *self.warnings.write() = warnings;
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        info!(?report, generation, "installation refreshed");
        Ok(report)
    }

    /// Read `id` from the highest priority provider that holds it.
    ///
    /// An override file deleted since the last load or refresh is passed over in favour of the
    /// next provider holding `id`.
    #[instrument(skip_all, fields(id = %id), err(level = Level::DEBUG))]
    pub fn resolve(&self, id: &ResourceId) -> Result<Resource> {
        let providers = self.providers()?;
        for provider in providers.iter() {
            let Some(provenance) = provider.provenance(id) else {
                continue;
            };
            let data = match provider.fetch(id) {
                Ok(data) => data,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            return Ok(Resource {
                id: id.clone(),
                data,
                provenance,
            });
        }
        Err(Error::NotFound(id.clone()))
    }

    /// Where `id` resolves to, without reading it
    pub fn locate(&self, id: &ResourceId) -> Result<Option<Provenance>> {
        Ok(self
            .providers()?
            .iter()
            .find_map(|provider| provider.provenance(id)))
    }

    /// Every provider holding `id`, highest priority first
    pub fn resolve_all(&self, id: &ResourceId) -> Result<Vec<Provenance>> {
        Ok(self
            .providers()?
            .iter()
            .filter_map(|provider| provider.provenance(id))
            .collect())
    }

    pub fn contains(&self, id: &ResourceId) -> Result<bool> {
        Ok(self.providers()?.iter().any(|provider| provider.contains(id)))
    }

    /// Lazily list every id once, optionally only those of `kind`.
    ///
    /// Ids come in priority order: the override directory first, then each container, then the
    /// catalog, skipping any id a higher priority provider already yielded.
    pub fn enumerate(&self, kind: Option<ResourceKind>) -> Result<Enumerate> {
        Ok(Enumerate {
            providers: self.providers()?,
            kind,
            provider: 0,
            position: 0,
        })
    }

    fn override_path(&self) -> PathBuf {
        resolve_path(&self.root, &self.options.override_dir)
    }

    /// Scanned containers in case-insensitive name order, followed by the explicit ones.
    ///
    /// A missing container directory is skipped quietly; one that cannot be listed is recorded in
    /// `warnings`.
    fn container_paths(&self, warnings: &mut Vec<ProviderWarning>) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        for dir in &self.options.container_dirs {
            let dir = resolve_path(&self.root, dir);
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(dir = %dir.display(), "no container directory");
                    continue;
                }
                Err(e) => {
                    warnings.push(directory_warning(&dir, &e));
                    continue;
                }
            };

            let mut found = Vec::new();
            for entry in entries {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warnings.push(directory_warning(&dir, &e));
                        continue;
                    }
                };
                let is_file = match entry.file_type() {
                    Ok(file_type) => file_type.is_file(),
                    Err(e) => {
                        warnings.push(directory_warning(&entry.path(), &e));
                        continue;
                    }
                };
                let path = entry.path();
                let is_container = path
                    .extension()
                    .and_then(|ext| ResourceKind::from_extension(&ext.to_string_lossy()))
                    .is_some_and(ResourceKind::is_container);
                if is_file && is_container {
                    found.push(path);
                }
            }
            found.sort_by_key(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().to_lowercase())
                    .unwrap_or_default()
            });
            paths.extend(found);
        }

        paths.extend(self.options.extra_containers.iter().cloned());
        paths
    }
}

fn provider_warning(path: &Path, error: &Error) -> ProviderWarning {
    warn!(path = %path.display(), "skipping container: {error}");
    ProviderWarning::new(path, error)
}

fn directory_warning(path: &Path, error: &io::Error) -> ProviderWarning {
    warn!(path = %path.display(), "skipping unreadable container directory: {error}");
    ProviderWarning::new(path, error)
}

/// Lazy, de-duplicated listing of an installation's ids
///
/// Holds the provider snapshot it was created from, so a refresh does not disturb an iteration in
/// progress. Stopping early costs nothing; cloning restarts from the current position.
#[derive(Debug, Clone)]
pub struct Enumerate {
    providers: Arc<[ResourceProvider]>,
    kind: Option<ResourceKind>,
    provider: usize,
    position: usize,
}

impl Enumerate {
    /// Pair every id with the provider it resolves to.
    pub fn with_provenance(mut self) -> impl Iterator<Item = (ResourceId, Provenance)> {
        std::iter::from_fn(move || loop {
            let (id, index) = self.next_entry()?;
            if let Some(provenance) = self.providers[index].provenance(&id) {
                return Some((id, provenance));
            }
        })
    }

    fn next_entry(&mut self) -> Option<(ResourceId, usize)> {
        loop {
            let provider = self.providers.get(self.provider)?;
            let Some(id) = provider.id_at(self.position) else {
                self.provider += 1;
                self.position = 0;
                continue;
            };
            self.position += 1;

            if self.kind.is_some_and(|kind| kind != id.kind) {
                continue;
            }
            if self.providers[..self.provider]
                .iter()
                .any(|higher| higher.contains(id))
            {
                continue;
            }
            return Some((id.clone(), self.provider));
        }
    }
}

impl Iterator for Enumerate {
    type Item = ResourceId;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().map(|(id, _)| id)
    }
}
