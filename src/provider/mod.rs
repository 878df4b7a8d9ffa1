//! Top-level orchestration of the ingestion pipeline
//!
//! The consumer-facing surface: `setup` runs load-or-create, `data` exposes
//! the finalized dataset, `clear` releases it once the consumer has copied
//! out what it needs. The whole pipeline is one sequential task intended to
//! run off the interactive thread; the consumer injects progress, failure and
//! cancellation handles at construction.

use std::path::PathBuf;

use log::{error, info};

use crate::error::{ProviderError, Result};
use crate::extract::IntrinsicExtractor;
use crate::fetch::Fetcher;
use crate::index::{self, GenerationOrder};
use crate::model::Dataset;
use crate::progress::{CancellationToken, FailureSink, ProgressSink, ProgressTracker};
use crate::reconcile::Reconciler;
use crate::resource::ResourceCache;
use crate::store::{LoadOutcome, StoreCodec};
use crate::uops::UopsIndex;

/// Fixed location of the vendor intrinsics catalog.
pub const INTRINSICS_URL: &str =
    "https://www.intel.com/content/dam/develop/public/us/en/include/intrinsics-guide/data-latest.xml";

/// Fixed location of the uops.info measurement catalog.
pub const UOPS_URL: &str = "https://www.uops.info/instructions.xml";

/// Mirror file name for the intrinsics catalog.
const INTRINSICS_FILE: &str = "intrin.xml";

/// Mirror file name for the measurement catalog.
const UOPS_FILE: &str = "uops.xml";

/// File name of the binary dataset store.
const STORE_FILE: &str = "dataCache";

/// Number of committed progress steps during a fresh ingestion: three per
/// resource acquisition, one for the processing pass, one for the store.
const CREATE_STEPS: f32 = 8.0;

/// Working directory and source locations for the pipeline.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Directory holding the XML mirrors and the binary store
    pub work_dir: PathBuf,
    /// URL of the vendor intrinsics catalog
    pub intrinsics_url: String,
    /// URL of the uops measurement catalog
    pub uops_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            intrinsics_url: INTRINSICS_URL.to_string(),
            uops_url: UOPS_URL.to_string(),
        }
    }
}

/// Owns the finalized dataset and runs the load-or-create pipeline.
pub struct DataProvider {
    data: Dataset,
    config: ProviderConfig,
    order: GenerationOrder,
    progress: ProgressTracker,
    notify: FailureSink,
    cancel: CancellationToken,
}

impl DataProvider {
    pub fn new(
        config: ProviderConfig,
        progress: ProgressSink,
        notify: FailureSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            data: Dataset::default(),
            config,
            order: GenerationOrder::default(),
            progress: ProgressTracker::new(progress),
            notify,
            cancel,
        }
    }

    /// Load the stored dataset or build a fresh one from the remote catalogs.
    ///
    /// A stale or invalid store triggers full re-ingestion followed by an
    /// unconditional overwrite save; a save failure is logged but does not
    /// fail the run. Returns `false` on unrecoverable failure or
    /// cancellation, in which case nothing is persisted.
    pub fn setup(&mut self) -> bool {
        if self.load() {
            self.progress.finish();
            return true;
        }
        match self.create() {
            Ok(()) => {
                self.store();
                self.progress.finish();
                true
            }
            Err(ProviderError::Cancelled) => {
                info!("Data setup cancelled");
                false
            }
            Err(e) => {
                error!("Data setup failed: {e}");
                false
            }
        }
    }

    /// The finalized dataset. Valid only after a successful [`setup`](Self::setup).
    pub fn data(&self) -> &Dataset {
        &self.data
    }

    /// Release the dataset contents.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Handle the consumer can set to make a running `setup` unwind.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn store_path(&self) -> PathBuf {
        self.config.work_dir.join(STORE_FILE)
    }

    fn load(&mut self) -> bool {
        self.progress.reset(1.0);
        info!("Loading data from cache...");
        match StoreCodec::load(&self.store_path()) {
            LoadOutcome::Loaded(data) => {
                self.data = data;
                self.progress.add(1.0);
                true
            }
            LoadOutcome::Stale | LoadOutcome::Invalid => false,
        }
    }

    fn store(&mut self) {
        info!("Writing data store to disk...");
        if let Err(e) = StoreCodec::save(&self.data, &self.store_path()) {
            error!("Failed to persist dataset: {e}");
        }
        self.progress.add(1.0);
    }

    fn create(&mut self) -> Result<()> {
        self.progress.reset(1.0 / CREATE_STEPS);
        info!("Creating data store...");

        let fetcher = Fetcher::new()?;
        let mirrors = ResourceCache::new(&self.config.work_dir);
        let intrin_text = mirrors.acquire(
            INTRINSICS_FILE,
            "Intel Intrinsic Guide",
            &self.config.intrinsics_url,
            &fetcher,
            &mut self.progress,
            &self.cancel,
            &self.notify,
        )?;
        let uops_text = mirrors.acquire(
            UOPS_FILE,
            "uops.info",
            &self.config.uops_url,
            &fetcher,
            &mut self.progress,
            &self.cancel,
            &self.notify,
        )?;

        // Both payloads were validated during acquisition.
        let intrin_doc = roxmltree::Document::parse(&intrin_text)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;
        let uops_doc = roxmltree::Document::parse(&uops_text)
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        let extractor = IntrinsicExtractor::new(&intrin_doc);
        let version = extractor.version();
        let date = extractor.date();
        let uops = UopsIndex::build(&uops_doc);
        let reconciler = Reconciler::new(&uops);

        let mut entries = Vec::new();
        for mut entry in extractor.entries() {
            reconciler.reconcile(&mut entry);
            entries.push(entry);
            if self.cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
        }
        self.progress.add(1.0);

        self.data = index::index(entries, version, date, &self.order);

        // The raw mirrors only matter for diagnosing ingestion issues; a
        // release build relies on the binary store from here on.
        if !cfg!(debug_assertions) {
            mirrors.remove(INTRINSICS_FILE);
            mirrors.remove(UOPS_FILE);
        }

        Ok(())
    }
}
