//! Core data model for the normalized intrinsics dataset
//!
//! Entries move through two stages: `RawEntry` as produced by extraction
//! (classification fields are plain strings, instruction-form ids still
//! attached), and `IndexedEntry` once the global string tables have been
//! finalized and every classification field rewritten as a table index.
//! `Dataset` is the top-level aggregate that gets persisted and handed to
//! the presentation layer.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sentinel for a cycle count the measurement data does not report.
///
/// Distinct from zero: a reported zero-cycle latency is meaningful (e.g.
/// eliminated moves), while this value means "not measured".
pub const UNKNOWN_CYCLES: u32 = u32::MAX;

/// One microarchitecture's performance numbers for one instruction form.
///
/// Immutable once created; owned exclusively by its parent entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Display name of the measured microarchitecture (e.g. "Skylake")
    pub arch: String,
    /// Measured latency in cycles, or [`UNKNOWN_CYCLES`]
    pub latency: u32,
    /// Additional latency when a memory operand is used, or [`UNKNOWN_CYCLES`]
    pub latency_mem: u32,
    /// Measured reciprocal throughput
    pub throughput: f32,
    /// Number of micro-operations issued
    pub uops: u32,
    /// Execution port usage description
    pub ports: String,
}

/// One intrinsic as extracted from the guide, before index rewriting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    /// Display name: return type, name and parameter list
    pub full_name: String,
    /// The intrinsic function name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Pseudo code of the operation
    pub operation: String,
    /// Required include header
    pub header: String,
    /// CPUID feature flags required by the intrinsic
    pub cpuids: Vec<String>,
    /// Required technology (e.g. "AVX")
    pub technology: String,
    /// Data types operated on; never empty after extraction
    pub types: Vec<String>,
    /// Operation categories (e.g. "Arithmetic")
    pub categories: Vec<String>,
    /// Comma-joined underlying assembly mnemonics
    pub instruction: String,
    /// Instruction-form ids used for reconciliation; dropped at indexing
    pub xeds: Vec<String>,
    /// Per-microarchitecture measurements attached by reconciliation
    pub measurements: Vec<Measurement>,
}

/// An intrinsic whose classification fields index into the dataset tables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    /// Display name: return type, name and parameter list
    pub full_name: String,
    /// The intrinsic function name
    pub name: String,
    /// Free-text description
    pub description: String,
    /// Pseudo code of the operation
    pub operation: String,
    /// Required include header
    pub header: String,
    /// Comma-joined CPUID feature flags, for display
    pub cpuids: String,
    /// Index into [`Dataset::technologies`]
    pub technology: u32,
    /// Indices into [`Dataset::types`]
    pub types: Vec<u32>,
    /// Indices into [`Dataset::categories`]
    pub categories: Vec<u32>,
    /// Comma-joined underlying assembly mnemonics
    pub instruction: String,
    /// Per-microarchitecture measurements
    pub measurements: Vec<Measurement>,
}

/// The finalized, indexed dataset.
///
/// Each table string appears at most once. `entries` is sorted by `name`
/// (ordinal compare). A dataset is only ever replaced as a whole; consumers
/// never observe a partially updated instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// All known technologies, in curated generation order
    pub technologies: Vec<String>,
    /// All known data types, sorted lexically
    pub types: Vec<String>,
    /// All known operation categories, sorted lexically
    pub categories: Vec<String>,
    /// All intrinsics, sorted by name
    pub entries: Vec<IndexedEntry>,
    /// Source format version reported by the intrinsics catalog
    pub version: String,
    /// Publication date reported by the intrinsics catalog
    pub date: NaiveDate,
}

impl Dataset {
    /// Release the dataset contents, returning the instance to its blank state.
    pub fn clear(&mut self) {
        self.technologies.clear();
        self.types.clear();
        self.categories.clear();
        self.entries.clear();
        self.version.clear();
        self.date = NaiveDate::default();
    }
}
