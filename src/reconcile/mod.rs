//! Best-effort enrichment of raw entries with uops measurements
//!
//! A lookup miss is not an error: the entry proceeds with an empty
//! measurement list, and the miss is only logged. When an intrinsic carries
//! several CPUID children the last one takes precedence as the extension
//! prefix hint.

use log::debug;

use crate::model::RawEntry;
use crate::uops::UopsIndex;

/// Resolves each raw entry's instruction forms against the uops index.
pub struct Reconciler<'a> {
    index: &'a UopsIndex,
}

impl<'a> Reconciler<'a> {
    pub fn new(index: &'a UopsIndex) -> Self {
        Self { index }
    }

    /// Attach measurements to `entry`, leaving it unchanged on a miss.
    pub fn reconcile(&self, entry: &mut RawEntry) {
        if entry.xeds.is_empty() {
            debug!("Intrinsic has no instruction forms: {}", entry.name);
            return;
        }
        let cpuid = entry.cpuids.last().map(String::as_str).unwrap_or_default();
        match self.index.lookup(cpuid, &entry.xeds) {
            Some(measurements) => entry.measurements = measurements.to_vec(),
            None => debug!(
                "Intrinsic uops data not found: {}, forms: {}",
                entry.name,
                entry.xeds.join("|")
            ),
        }
    }
}
