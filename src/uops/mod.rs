//! Lookup index over the uops.info measurement hierarchy
//!
//! The measurement document is a tree of `extension` nodes containing
//! `instruction` nodes (keyed by their `iform` id), each holding per
//! `architecture` measurement data. [`UopsIndex::build`] flattens that
//! hierarchy into an owned structure with measurement aggregation done up
//! front, so lookups after the build never touch the document again.
//!
//! Lookup is two sequential pure attempts: a prefix-constrained scan using
//! the normalized extension name, then (only on a miss) an unconstrained scan
//! with known form-id misspellings corrected in the candidate list.

use log::debug;
use roxmltree::Node;

use crate::model::{Measurement, UNKNOWN_CYCLES};

/// Microarchitecture code to display name, as used by uops.info.
const ARCH_NAMES: &[(&str, &str)] = &[
    ("CON", "Conroe"),
    ("WOL", "Wolfdale"),
    ("NHM", "Nehalem"),
    ("WSM", "Westmere"),
    ("SNB", "Sandy Bridge"),
    ("IVB", "Ivy Bridge"),
    ("HSW", "Haswell"),
    ("BDW", "Broadwell"),
    ("SKL", "Skylake"),
    ("SKX", "Skylake-X"),
    ("KBL", "Kaby Lake"),
    ("CFL", "Coffee Lake"),
    ("CNL", "Cannon Lake"),
    ("CLX", "Cascade Lake"),
    ("ICL", "Ice Lake"),
    ("TGL", "Tiger Lake"),
    ("RKL", "Rocket Lake"),
    ("ZEN+", "Zen+"),
    ("ZEN2", "Zen2"),
    ("ZEN3", "Zen3"),
    ("ZEN4", "Zen4"),
    ("ADL-P", "Alder Lake (P-Core)"),
    ("ADL-E", "Alder Lake (E-Core)"),
    ("BNL", "Bonnell"),
    ("AMT", "Airmont"),
    ("GLM", "Goldmont"),
    ("GLP", "Goldmont+"),
    ("TRM", "Tremont"),
];

/// Form ids the intrinsics guide spells differently than uops.info.
const XED_CORRECTIONS: &[(&str, &str)] = &[
    ("MASKMOVDQU_XMMdq_XMMdq", "MASKMOVDQU_XMMxub_XMMxub"),
    ("MOVLPS_MEMq_XMMps", "MOVLPS_MEMq_XMMq"),
    ("MOVQ_XMMdq_MEMq_0F6E", "MOVQ_XMMdq_MEMq_0F7E"),
    ("MOVQ_MEMq_XMMq_0F7E", "MOVQ_MEMq_XMMq_0FD6"),
];

/// Normalize a CPUID label into the extension-name prefix uops.info uses.
///
/// ADX measurements live under a combined carry-flag label, AVX2 under the
/// AVX family, and every AVX512 variant under the AVX512 family root.
pub fn normalize_extension(cpuid: &str) -> &str {
    if cpuid == "ADX" {
        "ADOX_ADCX"
    } else if cpuid == "AVX2" {
        "AVX"
    } else if cpuid.starts_with("AVX512") {
        "AVX512"
    } else {
        cpuid
    }
}

struct InstructionForm {
    iform: String,
    measurements: Vec<Measurement>,
}

struct Extension {
    name: String,
    instructions: Vec<InstructionForm>,
}

/// Owned lookup structure over the measurement dataset.
pub struct UopsIndex {
    extensions: Vec<Extension>,
}

impl UopsIndex {
    /// Build the index from a parsed uops.info document.
    pub fn build(doc: &roxmltree::Document) -> Self {
        let mut extensions = Vec::new();
        for ext in doc
            .root_element()
            .children()
            .filter(|n| n.has_tag_name("extension"))
        {
            let name = ext.attribute("name").unwrap_or_default().to_string();
            let mut instructions = Vec::new();
            for instr in ext.children().filter(|n| n.has_tag_name("instruction")) {
                let Some(iform) = instr.attribute("iform") else {
                    continue;
                };
                instructions.push(InstructionForm {
                    iform: iform.to_string(),
                    measurements: collect_measurements(instr),
                });
            }
            extensions.push(Extension { name, instructions });
        }
        Self { extensions }
    }

    /// Find the measurements for the first instruction form matching any of
    /// `forms`, preferring extensions whose name starts with the normalized
    /// `cpuid` prefix. Returns `None` when neither pass finds a match.
    pub fn lookup(&self, cpuid: &str, forms: &[String]) -> Option<&[Measurement]> {
        let prefix = normalize_extension(cpuid);
        let candidates: Vec<&str> = forms.iter().map(String::as_str).collect();
        if let Some(found) = self.scan(Some(prefix), &candidates) {
            return Some(found);
        }
        let corrected: Vec<&str> = candidates
            .iter()
            .map(|&form| {
                XED_CORRECTIONS
                    .iter()
                    .find(|(broken, _)| *broken == form)
                    .map_or(form, |(_, fixed)| {
                        debug!("Correcting known broken form id {form} -> {fixed}");
                        *fixed
                    })
            })
            .collect();
        self.scan(None, &corrected)
    }

    fn scan(&self, prefix: Option<&str>, forms: &[&str]) -> Option<&[Measurement]> {
        for ext in &self.extensions {
            if let Some(prefix) = prefix {
                if !ext.name.starts_with(prefix) {
                    continue;
                }
            }
            for instr in &ext.instructions {
                if forms.iter().any(|&form| instr.iform == form) {
                    return Some(&instr.measurements);
                }
            }
        }
        None
    }
}

/// Aggregate one [`Measurement`] per architecture child of an instruction
/// node, reading each architecture's first `measurement` element.
fn collect_measurements(instr: Node) -> Vec<Measurement> {
    let mut out = Vec::new();
    for arch in instr.children().filter(|n| n.has_tag_name("architecture")) {
        let code = arch.attribute("name").unwrap_or_default();
        let pretty = ARCH_NAMES
            .iter()
            .find(|(short, _)| *short == code)
            .map_or(code, |(_, name)| *name);
        if let Some(meas) = arch.children().find(|n| n.has_tag_name("measurement")) {
            out.push(read_measurement(pretty, meas));
        }
    }
    out
}

/// Numeric attribute with Qt-compatible semantics: present but unparsable
/// reads as zero, absent as `None`.
fn attr_u32(node: Node, name: &str) -> Option<u32> {
    node.attribute(name).map(|v| v.parse().unwrap_or(0))
}

fn attr_f32(node: Node, name: &str) -> Option<f32> {
    node.attribute(name).map(|v| v.parse().unwrap_or(0.0))
}

fn read_measurement(arch: &str, node: Node) -> Measurement {
    let uops = attr_u32(node, "uops").unwrap_or(0);
    let ports = node.attribute("ports").unwrap_or_default().to_string();
    let throughput = attr_f32(node, "TP")
        .or_else(|| attr_f32(node, "TP_unrolled"))
        .unwrap_or(0.0);

    // Latency interpretation, in authoritative tie-break order: the maximum
    // over register-operand cycle counts, overridden by a nonzero
    // first-position true-dependency value when one is reported, with memory
    // latency swapped in only when no register figure exists at all.
    let mut latency = UNKNOWN_CYCLES;
    let mut latency_true = UNKNOWN_CYCLES;
    let mut latency_mem = UNKNOWN_CYCLES;
    for lat in node.children().filter(|n| n.has_tag_name("latency")) {
        if let Some(cycles) = attr_u32(lat, "cycles") {
            let target = attr_u32(lat, "target_op").unwrap_or(0);
            let start = attr_u32(lat, "start_op").unwrap_or(0);
            if target == 1 && start == 1 && cycles > 0 {
                latency_true = cycles;
            } else {
                let base = if latency == UNKNOWN_CYCLES { 0 } else { latency };
                latency = base.max(cycles);
            }
        } else if let Some(mem) = attr_u32(lat, "cycles_mem") {
            let base = if latency_mem == UNKNOWN_CYCLES {
                0
            } else {
                latency_mem
            };
            latency_mem = base.max(mem).max(attr_u32(lat, "cycles_addr").unwrap_or(0));
        }
    }
    if latency_true != UNKNOWN_CYCLES {
        latency = latency_true;
    }
    if latency == UNKNOWN_CYCLES {
        std::mem::swap(&mut latency, &mut latency_mem);
    }

    Measurement {
        arch: arch.to_string(),
        latency,
        latency_mem,
        throughput,
        uops,
        ports,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index(xml: &str) -> UopsIndex {
        let doc = roxmltree::Document::parse(xml).unwrap();
        UopsIndex::build(&doc)
    }

    const SAMPLE: &str = r#"
        <root>
          <extension name="SSE">
            <instruction iform="ADDPS_XMMps_XMMps">
              <architecture name="SKL">
                <measurement TP="0.5" uops="1" ports="1*p01">
                  <latency target_op="1" start_op="1" cycles="4"/>
                </measurement>
              </architecture>
              <architecture name="ZEN3">
                <measurement TP_unrolled="0.5" uops="1" ports="1*FP01">
                  <latency cycles="3"/>
                </measurement>
              </architecture>
            </instruction>
          </extension>
          <extension name="SSE2">
            <instruction iform="MOVQ_XMMdq_MEMq_0F7E">
              <architecture name="ICL">
                <measurement TP="0.33" uops="1" ports="1*p23">
                  <latency cycles_mem="5" cycles_addr="7"/>
                </measurement>
              </architecture>
            </instruction>
          </extension>
        </root>"#;

    #[test]
    fn test_normalize_extension_aliases() {
        assert_eq!(normalize_extension("ADX"), "ADOX_ADCX");
        assert_eq!(normalize_extension("AVX2"), "AVX");
        assert_eq!(normalize_extension("AVX512_VNNI"), "AVX512");
        assert_eq!(normalize_extension("AVX512F"), "AVX512");
        assert_eq!(normalize_extension("SSE3"), "SSE3");
    }

    #[test]
    fn test_lookup_prefix_match() {
        let index = build_index(SAMPLE);
        let forms = vec!["ADDPS_XMMps_XMMps".to_string()];
        let found = index.lookup("SSE", &forms).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].arch, "Skylake");
        assert_eq!(found[0].latency, 4);
        assert_eq!(found[0].throughput, 0.5);
        assert_eq!(found[0].uops, 1);
        assert_eq!(found[0].ports, "1*p01");
    }

    #[test]
    fn test_lookup_candidates_in_order() {
        let index = build_index(SAMPLE);
        let forms = vec![
            "NOT_PRESENT".to_string(),
            "ADDPS_XMMps_XMMps".to_string(),
        ];
        assert!(index.lookup("SSE", &forms).is_some());
    }

    #[test]
    fn test_lookup_second_pass_drops_prefix() {
        let index = build_index(SAMPLE);
        // Wrong extension hint: pass 1 misses, pass 2 finds it anyway.
        let forms = vec!["ADDPS_XMMps_XMMps".to_string()];
        assert!(index.lookup("AVX512F", &forms).is_some());
    }

    #[test]
    fn test_lookup_second_pass_applies_corrections() {
        let index = build_index(SAMPLE);
        // The guide's misspelled id only matches once corrected.
        let forms = vec!["MOVQ_XMMdq_MEMq_0F6E".to_string()];
        let found = index.lookup("MMX", &forms).unwrap();
        assert_eq!(found[0].arch, "Ice Lake");
    }

    #[test]
    fn test_lookup_miss_returns_none() {
        let index = build_index(SAMPLE);
        let forms = vec!["NO_SUCH_FORM".to_string()];
        assert!(index.lookup("SSE", &forms).is_none());
        assert!(index.lookup("", &forms).is_none());
    }

    #[test]
    fn test_true_dependency_overrides_accumulated_latency() {
        let index = build_index(
            r#"<root><extension name="SSE">
                <instruction iform="X">
                  <architecture name="SKL">
                    <measurement TP="1" uops="1" ports="p0">
                      <latency cycles="9"/>
                      <latency target_op="1" start_op="1" cycles="4"/>
                      <latency cycles="7"/>
                    </measurement>
                  </architecture>
                </instruction>
              </extension></root>"#,
        );
        let found = index.lookup("SSE", &["X".to_string()]).unwrap();
        assert_eq!(found[0].latency, 4);
    }

    #[test]
    fn test_register_latency_accumulates_maximum() {
        let index = build_index(
            r#"<root><extension name="SSE">
                <instruction iform="X">
                  <architecture name="SKL">
                    <measurement TP="1" uops="1" ports="p0">
                      <latency cycles="3"/>
                      <latency cycles="6" target_op="2" start_op="1"/>
                      <latency cycles="5"/>
                    </measurement>
                  </architecture>
                </instruction>
              </extension></root>"#,
        );
        let found = index.lookup("SSE", &["X".to_string()]).unwrap();
        assert_eq!(found[0].latency, 6);
    }

    #[test]
    fn test_memory_only_latency_swaps_into_primary() {
        let index = build_index(SAMPLE);
        let forms = vec!["MOVQ_XMMdq_MEMq_0F7E".to_string()];
        let found = index.lookup("SSE2", &forms).unwrap();
        // cycles_addr=7 beats cycles_mem=5; with no register latency the
        // memory figure becomes the primary and the memory slot is unknown.
        assert_eq!(found[0].latency, 7);
        assert_eq!(found[0].latency_mem, UNKNOWN_CYCLES);
    }

    #[test]
    fn test_missing_numeric_attributes_yield_sentinels() {
        let index = build_index(
            r#"<root><extension name="SSE">
                <instruction iform="X">
                  <architecture name="UNLISTED">
                    <measurement ports=""/>
                  </architecture>
                </instruction>
              </extension></root>"#,
        );
        let found = index.lookup("SSE", &["X".to_string()]).unwrap();
        assert_eq!(found[0].arch, "UNLISTED");
        assert_eq!(found[0].latency, UNKNOWN_CYCLES);
        assert_eq!(found[0].latency_mem, UNKNOWN_CYCLES);
        assert_eq!(found[0].throughput, 0.0);
        assert_eq!(found[0].uops, 0);
    }

    #[test]
    fn test_first_measurement_per_architecture_wins() {
        let index = build_index(
            r#"<root><extension name="SSE">
                <instruction iform="X">
                  <architecture name="SKL">
                    <measurement TP="0.5" uops="1" ports="p0"/>
                    <measurement TP="2.0" uops="9" ports="p5"/>
                  </architecture>
                </instruction>
              </extension></root>"#,
        );
        let found = index.lookup("SSE", &["X".to_string()]).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].uops, 1);
    }
}
