//! intrinsics-db: CPU intrinsics ingestion and caching pipeline
//!
//! Cross-references two independently maintained XML catalogs — the Intel
//! intrinsics guide and the uops.info per-microarchitecture measurement
//! database — into one compact, indexed in-memory dataset, persisted as a
//! versioned binary store so the expensive download/parse/reconcile work only
//! happens when the store is absent, outdated or stale.
//!
//! The pipeline is strictly sequential: [`fetch`] and [`resource`] supply raw
//! XML, [`extract`] produces raw entries, [`reconcile`] enriches them with
//! measurements via the [`uops`] index, [`index`] deduplicates string tables
//! and rewrites entries against them, and [`store`] persists the result.
//! [`provider::DataProvider`] ties it all together behind a
//! `setup`/`data`/`clear` surface for the presentation layer, which stays
//! entirely outside this crate.
//!
//! ## Example
//!
//! ```no_run
//! use intrindb::progress::{null_failure, null_progress, CancellationToken};
//! use intrindb::provider::{DataProvider, ProviderConfig};
//!
//! let mut provider = DataProvider::new(
//!     ProviderConfig::default(),
//!     null_progress(),
//!     null_failure(),
//!     CancellationToken::new(),
//! );
//! if provider.setup() {
//!     for entry in &provider.data().entries {
//!         println!("{}", entry.name);
//!     }
//! }
//! ```

pub mod error;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod model;
pub mod progress;
pub mod provider;
pub mod reconcile;
pub mod resource;
pub mod store;
pub mod uops;

pub use error::{ProviderError, Result};
pub use model::{Dataset, IndexedEntry, Measurement, RawEntry, UNKNOWN_CYCLES};
pub use progress::{CancellationToken, FailureSink, ProgressSink};
pub use provider::{DataProvider, ProviderConfig};
