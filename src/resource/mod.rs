//! On-disk mirror of the downloaded XML catalogs
//!
//! Each named resource maps to a fixed file under the working directory. A
//! mirror file that exists and parses as well-formed XML is served directly,
//! skipping the download. One that exists but is corrupt is deleted and the
//! resource re-fetched. A freshly downloaded payload is only accepted once it
//! parses, then mirrored back to disk for the next run. The mirror stores the
//! verified raw bytes; `roxmltree` is read-only so there is no re-serialization
//! pass.

use std::fs;
use std::path::{Path, PathBuf};

use log::{error, info, warn};

use crate::error::{ProviderError, Result};
use crate::fetch::Fetcher;
use crate::progress::{CancellationToken, FailureSink, ProgressTracker};

/// File-backed cache of raw XML payloads, keyed by fixed file names.
pub struct ResourceCache {
    dir: PathBuf,
}

impl ResourceCache {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Absolute path of the mirror file for `file_name`.
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Load `file_name` from the mirror, or download it from `url`.
    ///
    /// Returns the XML text, verified to be well-formed. Download and parse
    /// failures notify the consumer through `notify` before returning the
    /// error; a failure to write the mirror back to disk is only logged.
    /// Progress accounting: three committed steps either way, so a cached hit
    /// credits the skipped download in one larger increment.
    pub fn acquire(
        &self,
        file_name: &str,
        label: &str,
        url: &str,
        fetcher: &Fetcher,
        progress: &mut ProgressTracker,
        cancel: &CancellationToken,
        notify: &FailureSink,
    ) -> Result<String> {
        let path = self.path(file_name);
        if let Some(text) = self.try_cached(&path, label)? {
            progress.add(2.0);
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            progress.add(1.0);
            return Ok(text);
        }

        info!("Downloading {label}...");
        let data = fetcher.fetch(url, progress, cancel).map_err(|e| {
            (notify)(&format!("Failed to download {label} data"), Box::new(|| {}));
            e
        })?;
        if data.is_empty() {
            (notify)(&format!("Failed to download {label} data"), Box::new(|| {}));
            return Err(ProviderError::Network(format!("empty response from {url}")));
        }
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        progress.add(1.0);

        let text = String::from_utf8(data)
            .map_err(|e| ProviderError::Parse(format!("{label}: invalid UTF-8: {e}")))
            .and_then(|text| {
                roxmltree::Document::parse(&text)
                    .map_err(|e| ProviderError::Parse(format!("{label}: {e}")))?;
                Ok(text)
            })
            .map_err(|e| {
                error!("Failed to parse XML: {e}");
                (notify)(&format!("Failed to parse {label} data"), Box::new(|| {}));
                e
            })?;
        progress.add(1.0);
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        if let Err(e) = fs::write(&path, &text) {
            warn!("Failed to write XML mirror {}: {e}", path.display());
        }
        if cancel.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }
        progress.add(1.0);
        Ok(text)
    }

    /// Returns the mirror contents when present and well-formed. A corrupt
    /// mirror file is deleted so the caller falls through to a fresh fetch.
    fn try_cached(&self, path: &Path, label: &str) -> Result<Option<String>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to read XML mirror {}: {e}", path.display());
                return Ok(None);
            }
        };
        match roxmltree::Document::parse(&text) {
            Ok(_) => {
                info!("Loading {label} from cache...");
                Ok(Some(text))
            }
            Err(e) => {
                error!("Cached XML mirror is corrupt, removing ({}): {e}", path.display());
                if let Err(e) = fs::remove_file(path) {
                    warn!("Failed to remove corrupt mirror {}: {e}", path.display());
                }
                Ok(None)
            }
        }
    }

    /// Delete the mirror file for `file_name`, ignoring a missing file.
    pub fn remove(&self, file_name: &str) {
        let path = self.path(file_name);
        if path.exists() {
            if let Err(e) = fs::remove_file(&path) {
                warn!("Failed to remove XML mirror {}: {e}", path.display());
            }
        }
    }
}
