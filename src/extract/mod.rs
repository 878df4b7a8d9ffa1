//! Extraction of raw entries from the intrinsics guide document
//!
//! Walks the top-level `intrinsic` elements and produces a lazy, restartable
//! stream of [`RawEntry`]. Data types are taken from declared `type` children,
//! supplemented by semantic types inferred from the return value's and each
//! parameter's encoded element type. Entries never leave this module with an
//! empty type list.

use chrono::NaiveDate;
use log::debug;
use roxmltree::{Document, Node};

use crate::model::RawEntry;

/// Element-type codes to display labels.
const TYPES_PRETTY: &[(&str, &str)] = &[
    ("BF16", "BFloat16"),
    ("FP16", "Float16 (half)"),
    ("FP32", "Float32 (float)"),
    ("FP64", "Float64 (double)"),
    ("MASK", "Mask"),
    ("SI16", "Integer Signed 16 (int16)"),
    ("SI32", "Integer Signed 32 (int32)"),
    ("SI64", "Integer Signed 64 (int64)"),
    ("SI8", "Integer Signed 8 (int8)"),
    ("UI16", "Integer Unsigned 16 (uint16)"),
    ("UI32", "Integer Unsigned 32 (uint32)"),
    ("UI64", "Integer Unsigned 64 (uint64)"),
    ("UI8", "Integer Unsigned 8 (uint8)"),
];

/// Technologies provided only by vendor compilers; excluded outright.
const COMPILER_ONLY_TECHS: &[&str] = &["SVML", "KNC"];

/// Fallback format version when the catalog omits one.
const DEFAULT_VERSION: &str = "3.6.7";

/// Fallback publication date when the catalog omits one.
const DEFAULT_DATE: (i32, u32, u32) = (2023, 7, 12);

/// Walks the intrinsics document and extracts raw entries.
pub struct IntrinsicExtractor<'a, 'input> {
    doc: &'a Document<'input>,
}

impl<'a, 'input> IntrinsicExtractor<'a, 'input> {
    pub fn new(doc: &'a Document<'input>) -> Self {
        Self { doc }
    }

    /// Source format version reported by the catalog root.
    pub fn version(&self) -> String {
        self.doc
            .root_element()
            .attribute("version")
            .unwrap_or(DEFAULT_VERSION)
            .to_string()
    }

    /// Publication date reported by the catalog root.
    pub fn date(&self) -> NaiveDate {
        let (y, m, d) = DEFAULT_DATE;
        let fallback = NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        match self.doc.root_element().attribute("date") {
            Some(raw) => NaiveDate::parse_from_str(raw, "%m/%d/%Y").unwrap_or_else(|_| {
                debug!("Invalid source date in catalog: {raw}");
                fallback
            }),
            None => fallback,
        }
    }

    /// Lazy stream of raw entries. Re-traversal re-reads the same document.
    pub fn entries(&self) -> Entries<'a, 'input> {
        Entries {
            children: self.doc.root_element().children(),
        }
    }
}

/// Iterator over the document's intrinsic elements.
pub struct Entries<'a, 'input> {
    children: roxmltree::Children<'a, 'input>,
}

impl Iterator for Entries<'_, '_> {
    type Item = RawEntry;

    fn next(&mut self) -> Option<RawEntry> {
        for node in self.children.by_ref() {
            if !node.has_tag_name("intrinsic") {
                continue;
            }
            if let Some(entry) = extract(node) {
                return Some(entry);
            }
        }
        None
    }
}

/// Resolve an encoded element type to a display label.
///
/// The generic `M128`/`M256`/`M512` vector codes are disambiguated from the
/// raw C parameter type, trying void, integer vector, single-precision,
/// double-precision then half-precision; unrecognized combinations are
/// dropped silently.
fn prettify_type(etype: &str, c_type: &str) -> Option<String> {
    let pretty = TYPES_PRETTY
        .iter()
        .find(|(code, _)| *code == etype)
        .map_or(etype, |(_, label)| *label);
    if !matches!(pretty, "M128" | "M256" | "M512") {
        return Some(pretty.to_string());
    }
    if c_type.contains("void") {
        None
    } else if c_type.contains("__m128i") || c_type.contains("__m256i") || c_type.contains("__m512i")
    {
        Some("Integer (variable)".to_string())
    } else if c_type.contains("__m128") || c_type.contains("__m256") || c_type.contains("__m512") {
        Some(lookup_pretty("FP32"))
    } else if c_type.contains("__m128d") || c_type.contains("__m256d") || c_type.contains("__m512d")
    {
        Some(lookup_pretty("FP64"))
    } else if c_type.contains("__m128h") || c_type.contains("__m256h") || c_type.contains("__m512h")
    {
        Some(lookup_pretty("FP16"))
    } else {
        debug!("Unknown vector parameter type: {c_type}");
        None
    }
}

fn lookup_pretty(code: &str) -> String {
    TYPES_PRETTY
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, label)| label.to_string())
        .unwrap_or_default()
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// First text child of an element, or empty.
fn text_of(node: Node) -> String {
    node.text().unwrap_or_default().to_string()
}

fn extract(node: Node) -> Option<RawEntry> {
    let Some(name) = node.attribute("name") else {
        debug!("Intrinsic element without name attribute");
        return None;
    };
    let mut tech = node.attribute("tech").unwrap_or("Unknown").to_string();
    if COMPILER_ONLY_TECHS.contains(&tech.as_str()) {
        return None;
    }

    let mut types = Vec::new();
    let mut cpuids = Vec::new();
    let mut categories = Vec::new();
    let mut xeds = Vec::new();
    let mut parameters: Vec<(String, String)> = Vec::new();
    let mut description = String::new();
    let mut operation = String::new();
    let mut header = String::new();
    let mut instruction = String::new();
    let mut return_type = String::new();

    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            // Declared data types; an intrinsic can carry several.
            "type" => push_unique(&mut types, text_of(child)),
            "CPUID" => cpuids.push(text_of(child)),
            "category" => categories.push(text_of(child)),
            "return" => {
                return_type = child.attribute("type").unwrap_or_default().to_string();
                if let Some(etype) = child.attribute("etype") {
                    if let Some(pretty) = prettify_type(etype, &return_type) {
                        push_unique(&mut types, pretty);
                    }
                }
            }
            "parameter" => {
                let c_type = child.attribute("type").unwrap_or_default().to_string();
                let var_name = child.attribute("varname").unwrap_or_default().to_string();
                if let Some(etype) = child.attribute("etype").filter(|&e| e != "IMM") {
                    if let Some(pretty) = prettify_type(etype, &c_type) {
                        push_unique(&mut types, pretty);
                    }
                }
                parameters.push((c_type, var_name));
            }
            "description" => description = text_of(child),
            "operation" => operation = text_of(child).trim().to_string(),
            "instruction" => {
                if let Some(xed) = child.attribute("xed").filter(|x| !x.is_empty()) {
                    push_unique(&mut xeds, xed.to_string());
                }
                if !instruction.is_empty() {
                    instruction.push(',');
                }
                instruction.push_str(child.attribute("name").unwrap_or_default());
            }
            "header" => header = text_of(child),
            _ => {}
        }
    }

    if types.is_empty() {
        types.push("Other".to_string());
    }

    // Newer catalogs report an aggregate "<family>_ALL" technology whose real
    // value lives in the sole CPUID child; transitional AVX_* labels collapse
    // into the Other bucket.
    if tech.ends_with("_ALL") {
        if cpuids.len() != 1 {
            debug!("Technology {tech} of {name} did not map to a single cpuid");
        }
        if let Some(first) = cpuids.first() {
            tech = first.clone();
        }
    }
    if tech.starts_with("AVX_") {
        tech = "Other".to_string();
    }

    let full_name = format_full_name(&return_type, name, &parameters);

    Some(RawEntry {
        full_name,
        name: name.to_string(),
        description,
        operation,
        header,
        cpuids,
        technology: tech,
        types,
        categories,
        instruction,
        xeds,
        measurements: Vec::new(),
    })
}

/// Display name: return type, short name and parenthesized parameter list.
fn format_full_name(return_type: &str, name: &str, parameters: &[(String, String)]) -> String {
    let mut out = String::new();
    if !return_type.is_empty() {
        out.push_str(return_type);
        out.push(' ');
    }
    out.push_str(name);
    out.push('(');
    for (i, (c_type, var_name)) in parameters.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(c_type);
        out.push(' ');
        out.push_str(var_name);
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract_all(xml: &str) -> Vec<RawEntry> {
        let doc = Document::parse(xml).unwrap();
        IntrinsicExtractor::new(&doc).entries().collect()
    }

    const SAMPLE: &str = r#"
        <intrinsics_list version="3.6.7" date="07/12/2023">
          <intrinsic tech="SSE" name="_mm_add_ps">
            <type>Floating Point</type>
            <CPUID>SSE</CPUID>
            <category>Arithmetic</category>
            <return type="__m128" varname="dst" etype="FP32"/>
            <parameter type="__m128" varname="a" etype="FP32"/>
            <parameter type="__m128" varname="b" etype="FP32"/>
            <description>Add packed single-precision elements.</description>
            <operation>
              dst := a + b
            </operation>
            <instruction name="addps" xed="ADDPS_XMMps_XMMps"/>
            <header>xmmintrin.h</header>
          </intrinsic>
        </intrinsics_list>"#;

    #[test]
    fn test_extract_basic_fields() {
        let entries = extract_all(SAMPLE);
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.name, "_mm_add_ps");
        assert_eq!(e.technology, "SSE");
        assert_eq!(e.cpuids, vec!["SSE"]);
        assert_eq!(e.categories, vec!["Arithmetic"]);
        assert_eq!(e.header, "xmmintrin.h");
        assert_eq!(e.instruction, "addps");
        assert_eq!(e.xeds, vec!["ADDPS_XMMps_XMMps"]);
        assert_eq!(e.operation, "dst := a + b");
        assert_eq!(
            e.full_name,
            "__m128 _mm_add_ps(__m128 a, __m128 b)"
        );
        assert!(e.measurements.is_empty());
    }

    #[test]
    fn test_types_union_declared_and_inferred() {
        let entries = extract_all(SAMPLE);
        assert_eq!(
            entries[0].types,
            vec!["Floating Point", "Float32 (float)"]
        );
    }

    #[test]
    fn test_types_never_empty() {
        let entries = extract_all(
            r#"<list><intrinsic tech="SSE" name="_mm_pause">
                 <return type="void" varname=""/>
               </intrinsic></list>"#,
        );
        assert_eq!(entries[0].types, vec!["Other"]);
    }

    #[test]
    fn test_skips_unnamed_and_compiler_only() {
        let entries = extract_all(
            r#"<list>
                 <intrinsic tech="SSE"/>
                 <intrinsic tech="SVML" name="_mm_acos_ps"/>
                 <intrinsic tech="KNC" name="_mm512_kextract_64"/>
                 <intrinsic tech="SSE2" name="_mm_add_pd"/>
               </list>"#,
        );
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "_mm_add_pd");
    }

    #[test]
    fn test_generic_vector_etype_disambiguation() {
        let entries = extract_all(
            r#"<list><intrinsic tech="AVX" name="a">
                 <parameter type="__m256i" varname="x" etype="M256"/>
               </intrinsic>
               <intrinsic tech="AVX" name="b">
                 <parameter type="__m256" varname="x" etype="M256"/>
               </intrinsic>
               <intrinsic tech="AVX" name="c">
                 <parameter type="void*" varname="x" etype="M256"/>
               </intrinsic></list>"#,
        );
        assert_eq!(entries[0].types, vec!["Integer (variable)"]);
        assert_eq!(entries[1].types, vec!["Float32 (float)"]);
        // void pointers carry no element type at all.
        assert_eq!(entries[2].types, vec!["Other"]);
    }

    #[test]
    fn test_immediate_parameters_do_not_infer_types() {
        let entries = extract_all(
            r#"<list><intrinsic tech="SSE" name="a">
                 <parameter type="int" varname="imm8" etype="IMM"/>
               </intrinsic></list>"#,
        );
        assert_eq!(entries[0].types, vec!["Other"]);
    }

    #[test]
    fn test_unlisted_etype_passes_through() {
        let entries = extract_all(
            r#"<list><intrinsic tech="SSE" name="a">
                 <return type="__m64" varname="dst" etype="M64"/>
               </intrinsic></list>"#,
        );
        assert_eq!(entries[0].types, vec!["M64"]);
    }

    #[test]
    fn test_technology_all_marker_uses_sole_cpuid() {
        let entries = extract_all(
            r#"<list><intrinsic tech="AVX512_ALL" name="a">
                 <CPUID>AVX512F</CPUID>
               </intrinsic></list>"#,
        );
        assert_eq!(entries[0].technology, "AVX512F");
    }

    #[test]
    fn test_transitional_technology_collapses_to_other() {
        let entries = extract_all(
            r#"<list><intrinsic tech="AVX_VNNI" name="a"/></list>"#,
        );
        assert_eq!(entries[0].technology, "Other");
    }

    #[test]
    fn test_instruction_mnemonics_joined_and_xeds_deduplicated() {
        let entries = extract_all(
            r#"<list><intrinsic tech="SSE2" name="a">
                 <instruction name="movq" xed="MOVQ_XMMdq_MEMq_0F6E"/>
                 <instruction name="movd" xed="MOVQ_XMMdq_MEMq_0F6E"/>
               </intrinsic></list>"#,
        );
        assert_eq!(entries[0].instruction, "movq,movd");
        assert_eq!(entries[0].xeds, vec!["MOVQ_XMMdq_MEMq_0F6E"]);
    }

    #[test]
    fn test_version_and_date_from_root() {
        let doc = Document::parse(SAMPLE).unwrap();
        let extractor = IntrinsicExtractor::new(&doc);
        assert_eq!(extractor.version(), "3.6.7");
        assert_eq!(
            extractor.date(),
            NaiveDate::from_ymd_opt(2023, 7, 12).unwrap()
        );
    }

    #[test]
    fn test_version_and_date_defaults() {
        let doc = Document::parse("<list/>").unwrap();
        let extractor = IntrinsicExtractor::new(&doc);
        assert_eq!(extractor.version(), "3.6.7");
        assert_eq!(
            extractor.date(),
            NaiveDate::from_ymd_opt(2023, 7, 12).unwrap()
        );
    }

    #[test]
    fn test_entries_restartable() {
        let doc = Document::parse(SAMPLE).unwrap();
        let extractor = IntrinsicExtractor::new(&doc);
        assert_eq!(extractor.entries().count(), 1);
        assert_eq!(extractor.entries().count(), 1);
    }
}
