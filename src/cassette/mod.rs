//! JSON-file-backed store of recorded interactions
//!
//! A cassette is only a path until it is first read or written. Every write
//! rewrites the whole file through a temporary file and a rename, so a
//! cassette on disk is always a complete JSON array.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::interaction::Interaction;
use crate::matching::MatchRules;
use crate::{Result, VcrError};

/// Maximum cassette name length in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Named collection of interactions stored as `<dir>/<name>.json`
///
/// Clones share the same lock flag.
#[derive(Debug, Clone)]
pub struct Cassette {
    name: String,
    file_path: PathBuf,
    locked: Arc<AtomicBool>,
}

impl Cassette {
    /// Create a cassette handle
    ///
    /// # Errors
    ///
    /// Returns error if `name` is not a safe file stem
    pub fn new(dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        validate_cassette_name(name)?;
        Ok(Self {
            name: name.to_string(),
            file_path: dir.as_ref().join(format!("{name}.json")),
            locked: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Open an existing cassette file by path
    ///
    /// # Errors
    ///
    /// Returns error if the path has no usable file stem
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| VcrError::InvalidCassetteName(path.display().to_string()))?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::new(dir, name)
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Backing file
    #[must_use]
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Reject reads and writes until [`Cassette::unlock`]
    pub fn lock(&self) {
        self.locked.store(true, Ordering::SeqCst);
    }

    /// Allow reads and writes again
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::SeqCst);
    }

    /// Whether the cassette is locked
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::SeqCst)
    }

    /// All stored interactions, in file order
    ///
    /// A missing, blank, unreadable or malformed file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns error if the cassette is locked
    pub fn read(&self) -> Result<Vec<Interaction>> {
        self.ensure_unlocked()?;

        if !self.file_path.exists() {
            return Ok(Vec::new());
        }

        let content = match fs::read_to_string(&self.file_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Failed to read cassette {}, treating as empty: {e}",
                    self.file_path.display()
                );
                return Ok(Vec::new());
            }
        };

        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str(&content) {
            Ok(interactions) => Ok(interactions),
            Err(e) => {
                warn!(
                    "Failed to parse cassette {}, treating as empty: {e}",
                    self.file_path.display()
                );
                Ok(Vec::new())
            }
        }
    }

    /// Store an interaction
    ///
    /// Unless `bypass_search` is set, the first stored interaction whose
    /// request matches under `rules` is replaced in place. Otherwise the
    /// interaction is appended.
    ///
    /// # Errors
    ///
    /// Returns error if the cassette is locked or cannot be written
    pub fn upsert(
        &self,
        interaction: Interaction,
        rules: &MatchRules,
        bypass_search: bool,
    ) -> Result<()> {
        let mut interactions = self.read()?;

        let existing = if bypass_search {
            None
        } else {
            interactions
                .iter()
                .position(|stored| rules.requests_match(&interaction.request, &stored.request))
        };

        match existing {
            Some(index) => {
                debug!(
                    "Replacing interaction {} in cassette {}",
                    index, self.name
                );
                interactions[index] = interaction;
            }
            None => interactions.push(interaction),
        }

        self.write_all(&interactions)?;
        info!(
            "Wrote {} interactions to cassette {}",
            interactions.len(),
            self.name
        );
        Ok(())
    }

    /// Delete the backing file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn erase(&self) -> Result<()> {
        match fs::remove_file(&self.file_path) {
            Ok(()) => {
                info!("Erased cassette {}", self.name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VcrError::Storage(format!(
                "Failed to erase cassette {}: {e}",
                self.file_path.display()
            ))),
        }
    }

    /// Number of stored interactions; 0 when the cassette is locked
    #[must_use]
    pub fn count(&self) -> usize {
        self.read().map_or(0, |interactions| interactions.len())
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            return Err(VcrError::Storage(format!(
                "Cassette {} is locked",
                self.name
            )));
        }
        Ok(())
    }

    fn write_all(&self, interactions: &[Interaction]) -> Result<()> {
        self.ensure_unlocked()?;

        if let Some(dir) = self.file_path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| {
                    VcrError::Storage(format!(
                        "Failed to create cassette directory {}: {e}",
                        dir.display()
                    ))
                })?;
            }
        }

        let json = serde_json::to_string_pretty(interactions)?;
        let tmp_path = self.tmp_path();

        let result = (|| -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp_path, &self.file_path)
        })();

        if let Err(e) = result {
            if fs::remove_file(&tmp_path).is_err() {
                warn!("Could not remove temporary file {}", tmp_path.display());
            }
            return Err(VcrError::Storage(format!(
                "Failed to write cassette {}: {e}",
                self.file_path.display()
            )));
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        self.file_path
            .with_file_name(format!(".{}.json.tmp", self.name))
    }
}

/// Validate a cassette name
///
/// # Errors
///
/// Returns error if cassette name is invalid
fn validate_cassette_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(VcrError::InvalidCassetteName(
            "Cassette name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(VcrError::InvalidCassetteName(format!(
            "Cassette name too long: {} > {MAX_NAME_LEN}",
            name.len()
        )));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(VcrError::InvalidCassetteName(
            "Cassette name cannot contain path separators".to_string(),
        ));
    }

    if name.starts_with('.') {
        return Err(VcrError::InvalidCassetteName(
            "Cassette name cannot start with dot".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(VcrError::InvalidCassetteName(
            "Cassette name cannot contain null bytes".to_string(),
        ));
    }

    if name.contains("..") {
        return Err(VcrError::InvalidCassetteName(
            "Cassette name cannot contain '..'".to_string(),
        ));
    }

    Ok(())
}
