//! Best-effort parsing of metadata-extraction responses.
//!
//! The metadata collaborator is a language model returning loosely
//! structured text. [`parse_extraction_response`] tries, in order:
//!
//! 1. the whole response as a JSON object,
//! 2. the first fenced code block as a JSON object,
//! 3. the outermost `{ ... }` span as a JSON object,
//! 4. `key: value` lines.
//!
//! Anything else is [`Extraction::Unparseable`], which callers turn into
//! fallback metadata. Parsing never fails hard.

use serde_json::Value;

use crate::models::EntryMetadata;
use crate::similarity::title_from_file_name;

/// Fields recovered from an extraction response. All optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedMetadata {
    pub title: Option<String>,
    pub doc_type: Option<String>,
    pub tags: Vec<String>,
    pub equipment_model: Option<String>,
    pub manufacturer: Option<String>,
    pub year: Option<i32>,
    pub norm_source: Option<String>,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub plant_unit: Option<String>,
    pub system_area: Option<String>,
    pub revision_version: Option<String>,
}

impl ExtractedMetadata {
    fn is_empty(&self) -> bool {
        *self == ExtractedMetadata::default()
    }

    /// Overlay extracted fields onto `base`. Empty extracted values never
    /// overwrite; tags are merged without duplicates.
    pub fn apply_to(self, mut base: EntryMetadata) -> EntryMetadata {
        if let Some(title) = self.title {
            base.title = title;
        }
        if let Some(doc_type) = self.doc_type {
            base.doc_type = doc_type;
        }
        for tag in self.tags {
            if !base.tags.iter().any(|t| t.eq_ignore_ascii_case(&tag)) {
                base.tags.push(tag);
            }
        }
        base.equipment_model = self.equipment_model.or(base.equipment_model);
        base.manufacturer = self.manufacturer.or(base.manufacturer);
        base.year = self.year.or(base.year);
        base.norm_source = self.norm_source.or(base.norm_source);
        base.description = self.description.or(base.description);
        base.serial_number = self.serial_number.or(base.serial_number);
        base.plant_unit = self.plant_unit.or(base.plant_unit);
        base.system_area = self.system_area.or(base.system_area);
        base.revision_version = self.revision_version.or(base.revision_version);
        base
    }
}

/// Outcome of parsing a free-form extraction response.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    Parsed(ExtractedMetadata),
    Unparseable(String),
}

/// Metadata derived only from the file name and the declared document type.
/// Used by quick mode and as the fallback for failed extractions.
pub fn quick_metadata(file_name: &str, doc_type: &str, tags: &[String]) -> EntryMetadata {
    EntryMetadata {
        title: title_from_file_name(file_name),
        doc_type: doc_type.to_string(),
        tags: tags.to_vec(),
        ..Default::default()
    }
}

/// Parse a language-model response into structured metadata.
pub fn parse_extraction_response(raw: &str) -> Extraction {
    let trimmed = raw.trim();

    let candidates = [
        Some(trimmed),
        fenced_block(trimmed),
        brace_span(trimmed),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            let meta = from_json_object(&map);
            if !meta.is_empty() {
                return Extraction::Parsed(meta);
            }
        }
    }

    let meta = from_key_value_lines(trimmed);
    if meta.is_empty() {
        Extraction::Unparseable(raw.to_string())
    } else {
        Extraction::Parsed(meta)
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    // Skip an info string such as `json`.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[derive(Clone, Copy)]
enum Field {
    Title,
    DocType,
    Tags,
    EquipmentModel,
    Manufacturer,
    Year,
    NormSource,
    Description,
    SerialNumber,
    PlantUnit,
    SystemArea,
    RevisionVersion,
}

fn field_for_key(key: &str) -> Option<Field> {
    let normalized: String = key
        .trim()
        .trim_matches(|c| c == '"' || c == '*' || c == '-')
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect();
    let field = match normalized.as_str() {
        "title" | "titulo" | "título" => Field::Title,
        "doc_type" | "document_type" | "type" | "tipo" | "tipo_documento" => Field::DocType,
        "tags" | "keywords" | "palavras_chave" => Field::Tags,
        "equipment_model" | "model" | "modelo" | "modelo_equipamento" => Field::EquipmentModel,
        "manufacturer" | "fabricante" => Field::Manufacturer,
        "year" | "ano" => Field::Year,
        "norm_source" | "norm" | "standard" | "norma" => Field::NormSource,
        "description" | "summary" | "descricao" | "descrição" => Field::Description,
        "serial_number" | "serial" | "numero_serie" => Field::SerialNumber,
        "plant_unit" | "plant" | "unit" | "unidade" => Field::PlantUnit,
        "system_area" | "area" | "área" | "sistema" => Field::SystemArea,
        "revision_version" | "revision" | "revisao" | "revisão" => Field::RevisionVersion,
        _ => return None,
    };
    Some(field)
}

fn clean_text(value: &str) -> Option<String> {
    let v = value.trim().trim_matches('"').trim();
    let lowered = v.to_lowercase();
    if v.is_empty() || matches!(lowered.as_str(), "null" | "none" | "n/a" | "unknown" | "-") {
        None
    } else {
        Some(v.to_string())
    }
}

/// First run of four digits that looks like a plausible year.
fn parse_year(value: &str) -> Option<i32> {
    let digits: Vec<char> = value.chars().collect();
    digits.windows(4).enumerate().find_map(|(i, w)| {
        let boundary_before = i == 0 || !digits[i - 1].is_ascii_digit();
        let boundary_after = digits.get(i + 4).map_or(true, |c| !c.is_ascii_digit());
        if boundary_before && boundary_after && w.iter().all(|c| c.is_ascii_digit()) {
            let year: i32 = w.iter().collect::<String>().parse().ok()?;
            (1900..=2100).contains(&year).then_some(year)
        } else {
            None
        }
    })
}

fn split_tags(value: &str) -> Vec<String> {
    value
        .trim_matches(|c| c == '[' || c == ']')
        .split([',', ';'])
        .filter_map(clean_text)
        .collect()
}

fn assign(meta: &mut ExtractedMetadata, field: Field, value: &Value) {
    let as_text = match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    match field {
        Field::Tags => {
            meta.tags = match value {
                Value::Array(items) => items
                    .iter()
                    .filter_map(|v| v.as_str().and_then(clean_text))
                    .collect(),
                Value::String(s) => split_tags(s),
                _ => Vec::new(),
            }
        }
        Field::Year => {
            meta.year = match value {
                Value::Number(n) => n
                    .as_i64()
                    .and_then(|y| i32::try_from(y).ok())
                    .filter(|y| (1900..=2100).contains(y)),
                Value::String(s) => parse_year(s),
                _ => None,
            }
        }
        Field::Title => meta.title = as_text,
        Field::DocType => meta.doc_type = as_text,
        Field::EquipmentModel => meta.equipment_model = as_text,
        Field::Manufacturer => meta.manufacturer = as_text,
        Field::NormSource => meta.norm_source = as_text,
        Field::Description => meta.description = as_text,
        Field::SerialNumber => meta.serial_number = as_text,
        Field::PlantUnit => meta.plant_unit = as_text,
        Field::SystemArea => meta.system_area = as_text,
        Field::RevisionVersion => meta.revision_version = as_text,
    }
}

fn from_json_object(map: &serde_json::Map<String, Value>) -> ExtractedMetadata {
    let mut meta = ExtractedMetadata::default();
    for (key, value) in map {
        if let Some(field) = field_for_key(key) {
            assign(&mut meta, field, value);
        }
    }
    meta
}

fn from_key_value_lines(text: &str) -> ExtractedMetadata {
    let mut meta = ExtractedMetadata::default();
    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if let Some(field) = field_for_key(key) {
            assign(&mut meta, field, &Value::String(value.trim().trim_end_matches(',').to_string()));
        }
    }
    meta
}
