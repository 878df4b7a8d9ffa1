//! String table deduplication and index rewriting
//!
//! Builds the three global string tables (technologies, types, categories),
//! finalizes their ordering, and only then rewrites every entry's string
//! fields as indices into them. The ordering dependency is load-bearing:
//! indices computed against a pre-sort table would be invalid, so the
//! pipeline is two explicit stages instead of interleaved sort-and-mutate.

use chrono::NaiveDate;

use crate::model::{Dataset, IndexedEntry, RawEntry};

/// Hand-curated ordering rules for the technology table.
///
/// This is configuration, not derived data: it encodes instruction-set
/// history and is expected to change as new extensions ship. Applied after
/// the lexical sort, so rule anchors are already placed when their dependents
/// arrive.
#[derive(Debug, Clone)]
pub struct GenerationOrder {
    /// Families pinned to the front of the table, later entries first.
    pub pinned: Vec<String>,
    /// Prefix whose members slot in immediately before `wide_family`.
    pub legacy_prefix: String,
    /// The widest vector extension family label.
    pub wide_family: String,
    /// Labels placed immediately after a specific anchor label.
    pub successors: Vec<(String, String)>,
    /// Prefix grouped immediately before `matrix_family` when present,
    /// appended otherwise.
    pub wide512_prefix: String,
    /// The matrix extension family label.
    pub matrix_family: String,
}

impl Default for GenerationOrder {
    fn default() -> Self {
        Self {
            pinned: vec!["MMX".to_string(), "AVX".to_string()],
            legacy_prefix: "SSE".to_string(),
            wide_family: "AVX".to_string(),
            successors: vec![
                ("SSSE3".to_string(), "SSE3".to_string()),
                ("AVX2".to_string(), "AVX".to_string()),
                ("AVX_VNNI".to_string(), "AVX2".to_string()),
            ],
            wide512_prefix: "AVX-512".to_string(),
            matrix_family: "AMX".to_string(),
        }
    }
}

impl GenerationOrder {
    /// Re-order a lexically sorted technology table by generation.
    pub fn apply(&self, sorted: Vec<String>) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(sorted.len());
        for label in sorted {
            if self.pinned.iter().any(|p| *p == label) {
                out.insert(0, label);
            } else if let Some((_, anchor)) =
                self.successors.iter().find(|(l, _)| *l == label)
            {
                let pos = position_of(&out, anchor).map_or(out.len(), |p| p + 1);
                out.insert(pos, label);
            } else if label.starts_with(&self.wide512_prefix) {
                let pos = position_of(&out, &self.matrix_family).unwrap_or(out.len());
                out.insert(pos, label);
            } else if label.starts_with(&self.legacy_prefix) {
                let pos = position_of(&out, &self.wide_family).unwrap_or(out.len());
                out.insert(pos, label);
            } else if !label.is_empty() {
                out.push(label);
            }
        }
        out
    }
}

fn position_of(table: &[String], label: &str) -> Option<usize> {
    table.iter().position(|x| x == label)
}

fn table_index(table: &[String], label: &str) -> u32 {
    position_of(table, label).unwrap_or(0) as u32
}

/// Build the finalized dataset from reconciled raw entries.
///
/// Three passes: accumulate the tables in insertion order, finalize their
/// ordering, then rewrite and sort the entries.
pub fn index(
    entries: Vec<RawEntry>,
    version: String,
    date: NaiveDate,
    order: &GenerationOrder,
) -> Dataset {
    let mut technologies = Vec::new();
    let mut types = Vec::new();
    let mut categories = Vec::new();
    for entry in &entries {
        accumulate(&mut technologies, &entry.technology);
        for t in &entry.types {
            accumulate(&mut types, t);
        }
        for c in &entry.categories {
            accumulate(&mut categories, c);
        }
    }

    technologies.sort();
    types.sort();
    categories.sort();
    let technologies = order.apply(technologies);

    let mut indexed: Vec<IndexedEntry> = entries
        .into_iter()
        .map(|e| IndexedEntry {
            full_name: e.full_name,
            name: e.name,
            description: e.description,
            operation: e.operation,
            header: e.header,
            cpuids: e.cpuids.join(", "),
            technology: table_index(&technologies, &e.technology),
            types: e.types.iter().map(|t| table_index(&types, t)).collect(),
            categories: e
                .categories
                .iter()
                .map(|c| table_index(&categories, c))
                .collect(),
            instruction: e.instruction,
            measurements: e.measurements,
        })
        .collect();
    indexed.sort_by(|a, b| a.name.cmp(&b.name));

    Dataset {
        technologies,
        types,
        categories,
        entries: indexed,
        version,
        date,
    }
}

fn accumulate(table: &mut Vec<String>, value: &str) {
    if !table.iter().any(|x| x == value) {
        table.push(value.to_string());
    }
}
