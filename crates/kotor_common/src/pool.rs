//! A bounded pool of open read handles.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use tracing::trace;

/// Idle file handles keyed by path.
///
/// A handle is checked out for the duration of one read, so concurrent reads of the same file never
/// share a cursor. Returned handles beyond `capacity` are closed, and [`HandlePool::evict`] drops
/// every idle handle of a file that changed on disk. Reopening is transparent to callers.
#[derive(Debug)]
pub struct HandlePool {
    capacity: usize,
    idle: Mutex<Idle>,
}

#[derive(Debug, Default)]
struct Idle {
    handles: HashMap<PathBuf, Vec<File>>,
    count: usize,
}

impl HandlePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            idle: Mutex::new(Idle::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of idle handles currently held open
    pub fn idle(&self) -> usize {
        self.idle.lock().count
    }

    /// Read exactly `len` bytes at `offset`.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] when the file ends early.
    pub fn read_at(&self, path: &Path, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut file = match self.checkout(path) {
            Some(file) => file,
            None => {
                trace!(path = %path.display(), "opening handle");
                File::open(path)?
            }
        };

        file.seek(SeekFrom::Start(offset))?;
        let mut buf = Vec::with_capacity(len);
        (&mut file).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "{}: wanted {len} bytes at offset {offset}, got {}",
                    path.display(),
                    buf.len()
                ),
            ));
        }

        self.checkin(path, file);
        Ok(buf)
    }

    /// Close every idle handle for `path`.
    pub fn evict(&self, path: &Path) {
        let mut idle = self.idle.lock();
        if let Some(handles) = idle.handles.remove(path) {
            idle.count -= handles.len();
        }
    }

    /// Close every idle handle.
    pub fn clear(&self) {
        let mut idle = self.idle.lock();
        idle.handles.clear();
        idle.count = 0;
    }

    fn checkout(&self, path: &Path) -> Option<File> {
        let mut idle = self.idle.lock();
        let file = idle.handles.get_mut(path)?.pop()?;
        idle.count -= 1;
        Some(file)
    }

    fn checkin(&self, path: &Path, file: File) {
        let mut idle = self.idle.lock();
        if idle.count >= self.capacity {
            return;
        }
        idle.count += 1;
        idle.handles.entry(path.to_path_buf()).or_default().push(file);
    }
}

impl Default for HandlePool {
    fn default() -> Self {
        Self::new(16)
    }
}
