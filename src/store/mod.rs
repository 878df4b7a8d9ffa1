//! Versioned binary persistence of the finalized dataset
//!
//! Layout: magic bytes for identification, a store format version, a codec
//! version covering the bincode encoding of the payload, the publication
//! date, then the full dataset. Loading fails closed: anything that is not a
//! byte-exact current-format store is reported as `Invalid` or `Stale`, both
//! of which the caller treats as a cache miss and rebuilds from source.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{Local, NaiveDate};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, Result};
use crate::model::Dataset;

/// Magic bytes for store file identification
const MAGIC_BYTES: &[u8; 8] = b"INTRNDB\0";

/// Current store format version
const STORE_VERSION: u32 = 2;

/// Version of the bincode payload encoding
const CODEC_VERSION: u32 = 1;

/// Maximum age in days before a stored dataset is rebuilt from source
const MAX_AGE_DAYS: i64 = 180;

/// Store file header, written ahead of the dataset payload
#[derive(Debug, Serialize, Deserialize)]
struct StoreHeader {
    magic: [u8; 8],
    version: u32,
    codec: u32,
    date: NaiveDate,
}

/// Outcome of attempting to load the binary store.
///
/// `Stale` and `Invalid` are both treated as cache-absent by the caller;
/// they only differ in why the store was rejected.
#[derive(Debug)]
pub enum LoadOutcome {
    /// The store was valid and current
    Loaded(Dataset),
    /// Recognized but outdated: version mismatch or past the staleness window
    Stale,
    /// Absent, unrecognized or undecodable
    Invalid,
}

/// Serializer/deserializer for the binary dataset store.
pub struct StoreCodec;

impl StoreCodec {
    /// Write `dataset` to `path`, replacing any existing store.
    pub fn save(dataset: &Dataset, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| ProviderError::Store(e.to_string()))?;
        let mut writer = BufWriter::new(file);
        let header = StoreHeader {
            magic: *MAGIC_BYTES,
            version: STORE_VERSION,
            codec: CODEC_VERSION,
            date: dataset.date,
        };
        bincode::serialize_into(&mut writer, &header)
            .map_err(|e| ProviderError::Store(e.to_string()))?;
        bincode::serialize_into(&mut writer, dataset)
            .map_err(|e| ProviderError::Store(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| ProviderError::Store(e.to_string()))?;
        Ok(())
    }

    /// Load the store at `path`, validating identity, version and age.
    pub fn load(path: &Path) -> LoadOutcome {
        Self::load_at(path, Local::now().date_naive())
    }

    /// Load with an explicit "now" for the staleness check.
    pub(crate) fn load_at(path: &Path, today: NaiveDate) -> LoadOutcome {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(_) => return LoadOutcome::Invalid,
        };
        let mut reader = BufReader::new(file);

        let header: StoreHeader = match bincode::deserialize_from(&mut reader) {
            Ok(header) => header,
            Err(e) => {
                warn!("Store header could not be read: {e}");
                return LoadOutcome::Invalid;
            }
        };
        if header.magic != *MAGIC_BYTES {
            warn!("Store file has an invalid identifier");
            return LoadOutcome::Invalid;
        }
        if header.version != STORE_VERSION || header.codec != CODEC_VERSION {
            info!(
                "Store version outdated ({}/{}), creating a new one",
                header.version, header.codec
            );
            return LoadOutcome::Stale;
        }
        if today.signed_duration_since(header.date).num_days() > MAX_AGE_DAYS {
            info!("Store data is too old ({}), creating a new one", header.date);
            return LoadOutcome::Stale;
        }

        match bincode::deserialize_from(&mut reader) {
            Ok(dataset) => LoadOutcome::Loaded(dataset),
            Err(e) => {
                warn!("Store payload could not be decoded: {e}");
                LoadOutcome::Invalid
            }
        }
    }
}
