//! Canonical report export
//!
//! A report travels as one JSON document:
//!
//! ```json
//! { "name": "...", "text": "...", "ml_model": "...",
//!   "created_on": "...", "updated_on": "...",
//!   "sentences": [ { "text": "...", "order": 0, "disposition": "accept",
//!                    "mappings": [ { "attack_id": "T1059", "confidence": 95.0 } ] } ] }
//! ```
//!
//! Serializing a stored report and importing the result gives back the same
//! sentences, mappings and mapping provenance. Import validates the whole
//! document up front and reports every problem by path, so a rejected file
//! writes nothing.

use std::collections::HashSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tram_core::models::{
    confidence_in_range, Disposition, NewMapping, NewReport, NewSentence, ReportAggregate,
    REPORT_NAME_MAX_CHARS,
};
use tram_core::FieldErrors;

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const NOT_A_STRING: &str = "Not a valid string.";
const NOT_AN_INTEGER: &str = "A valid integer is required.";
const NOT_A_NUMBER: &str = "A valid number is required.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportExport {
    pub name: String,
    pub text: String,
    pub ml_model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<DateTime<Utc>>,
    pub sentences: Vec<SentenceExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceExport {
    pub text: String,
    pub order: i32,
    pub disposition: Option<Disposition>,
    pub mappings: Vec<MappingExport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingExport {
    pub attack_id: String,
    pub confidence: Decimal,
    #[serde(flatten)]
    pub provenance: Map<String, JsonValue>,
}

impl ReportExport {
    pub fn from_aggregate(aggregate: &ReportAggregate) -> Self {
        let report = &aggregate.report;
        ReportExport {
            name: report.name.clone(),
            text: report.text.clone(),
            ml_model: report.ml_model.clone(),
            created_on: Some(report.created_on),
            updated_on: Some(report.updated_on),
            sentences: aggregate
                .sentences
                .iter()
                .map(|s| SentenceExport {
                    text: s.sentence.text.clone(),
                    order: s.sentence.order,
                    disposition: s.sentence.disposition,
                    mappings: s
                        .mappings
                        .iter()
                        .map(|m| {
                            let mut provenance = m.provenance_fields();
                            provenance.remove("attack_id");
                            provenance.remove("confidence");
                            MappingExport {
                                attack_id: m.attack_id.clone(),
                                confidence: m.confidence,
                                provenance,
                            }
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }
}

/// A validated import, ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportImport {
    pub name: String,
    pub text: String,
    pub ml_model: String,
    pub sentences: Vec<NewSentence>,
}

impl ReportImport {
    /// Validate an uploaded export against the known technique ids.
    ///
    /// `created_on`/`updated_on` are ignored; stored timestamps are set on insert.
    pub fn parse(
        value: &JsonValue,
        known_attack_ids: &HashSet<String>,
    ) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();

        let Some(root) = value.as_object() else {
            errors.add(
                "non_field_errors",
                format!(
                    "Invalid data. Expected a dictionary, but got {}.",
                    json_type_name(value)
                ),
            );
            return Err(errors);
        };

        let name = match root.get("name") {
            None | Some(JsonValue::Null) => {
                errors.add("name", REQUIRED);
                String::new()
            }
            Some(JsonValue::String(name)) if name.trim().is_empty() => {
                errors.add("name", BLANK);
                String::new()
            }
            Some(JsonValue::String(name)) => {
                if name.chars().count() > REPORT_NAME_MAX_CHARS {
                    errors.add(
                        "name",
                        format!(
                            "Ensure this field has no more than {} characters.",
                            REPORT_NAME_MAX_CHARS
                        ),
                    );
                }
                name.clone()
            }
            Some(_) => {
                errors.add("name", NOT_A_STRING);
                String::new()
            }
        };

        let text = optional_string(root, "text", "text", &mut errors);
        let ml_model = optional_string(root, "ml_model", "ml_model", &mut errors);

        let sentences = match root.get("sentences") {
            None | Some(JsonValue::Null) => {
                errors.add("sentences", REQUIRED);
                Vec::new()
            }
            Some(JsonValue::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| {
                    let path = format!("sentences[{}]", i);
                    parse_sentence(item, i, &path, known_attack_ids, &mut errors)
                })
                .collect(),
            Some(other) => {
                errors.add(
                    "sentences",
                    format!(
                        "Expected a list of items but got type \"{}\".",
                        json_type_name(other)
                    ),
                );
                Vec::new()
            }
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ReportImport {
            name,
            text,
            ml_model,
            sentences,
        })
    }

    pub fn into_new_report(
        self,
        created_by: impl Into<String>,
        document_id: Option<i64>,
    ) -> NewReport {
        NewReport {
            name: self.name,
            text: self.text,
            ml_model: self.ml_model,
            document_id,
            created_by: created_by.into(),
            sentences: self.sentences,
        }
    }
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "str",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "dict",
    }
}

/// Absent or null means empty.
fn optional_string(
    object: &Map<String, JsonValue>,
    key: &str,
    path: &str,
    errors: &mut FieldErrors,
) -> String {
    match object.get(key) {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(_) => {
            errors.add(path, NOT_A_STRING);
            String::new()
        }
    }
}

fn expect_object<'a>(
    value: &'a JsonValue,
    path: &str,
    errors: &mut FieldErrors,
) -> Option<&'a Map<String, JsonValue>> {
    let object = value.as_object();
    if object.is_none() {
        errors.add(
            path,
            format!(
                "Invalid data. Expected a dictionary, but got {}.",
                json_type_name(value)
            ),
        );
    }
    object
}

fn parse_sentence(
    value: &JsonValue,
    index: usize,
    path: &str,
    known_attack_ids: &HashSet<String>,
    errors: &mut FieldErrors,
) -> Option<NewSentence> {
    let object = expect_object(value, path, errors)?;

    let text_path = format!("{}.text", path);
    let text = match object.get("text") {
        None | Some(JsonValue::Null) => {
            errors.add(text_path, REQUIRED);
            None
        }
        Some(JsonValue::String(text)) if text.trim().is_empty() => {
            errors.add(text_path, BLANK);
            None
        }
        Some(JsonValue::String(text)) => Some(text.clone()),
        Some(_) => {
            errors.add(text_path, NOT_A_STRING);
            None
        }
    };

    let order = parse_order(object.get("order"), index, &format!("{}.order", path), errors);
    let disposition = parse_disposition(
        object.get("disposition"),
        &format!("{}.disposition", path),
        errors,
    );

    let mappings_path = format!("{}.mappings", path);
    let mappings: Vec<NewMapping> = match object.get("mappings") {
        None | Some(JsonValue::Null) => Vec::new(),
        Some(JsonValue::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(j, item)| {
                parse_mapping(
                    item,
                    &format!("{}[{}]", mappings_path, j),
                    known_attack_ids,
                    errors,
                )
            })
            .collect(),
        Some(other) => {
            errors.add(
                mappings_path,
                format!(
                    "Expected a list of items but got type \"{}\".",
                    json_type_name(other)
                ),
            );
            Vec::new()
        }
    };

    Some(NewSentence {
        text: text?,
        order: order?,
        disposition: disposition?,
        mappings,
    })
}

/// Absent order defaults to the sentence's position in the list.
fn parse_order(
    value: Option<&JsonValue>,
    index: usize,
    path: &str,
    errors: &mut FieldErrors,
) -> Option<i32> {
    let default = i32::try_from(index).ok();
    let number = match value {
        None | Some(JsonValue::Null) => return default,
        Some(JsonValue::Number(n)) => n.as_i64(),
        Some(_) => None,
    };

    match number {
        Some(n) if n < 0 => {
            errors.add(path, "Ensure this value is greater than or equal to 0.");
            None
        }
        Some(n) => match i32::try_from(n) {
            Ok(order) => Some(order),
            Err(_) => {
                errors.add(
                    path,
                    format!("Ensure this value is less than or equal to {}.", i32::MAX),
                );
                None
            }
        },
        None => {
            errors.add(path, NOT_AN_INTEGER);
            None
        }
    }
}

/// `Some(None)` is a valid "no disposition"; `None` means invalid.
fn parse_disposition(
    value: Option<&JsonValue>,
    path: &str,
    errors: &mut FieldErrors,
) -> Option<Option<Disposition>> {
    match value {
        None | Some(JsonValue::Null) => Some(None),
        Some(JsonValue::String(s)) => match Disposition::from_str(s) {
            Ok(disposition) => Some(Some(disposition)),
            Err(_) => {
                errors.add(path, format!("\"{}\" is not a valid choice.", s));
                None
            }
        },
        Some(other) => {
            errors.add(path, format!("\"{}\" is not a valid choice.", other));
            None
        }
    }
}

fn parse_mapping(
    value: &JsonValue,
    path: &str,
    known_attack_ids: &HashSet<String>,
    errors: &mut FieldErrors,
) -> Option<NewMapping> {
    let object = expect_object(value, path, errors)?;

    let attack_id_path = format!("{}.attack_id", path);
    let attack_id = match object.get("attack_id") {
        None | Some(JsonValue::Null) => {
            errors.add(attack_id_path, REQUIRED);
            None
        }
        Some(JsonValue::String(id)) if id.trim().is_empty() => {
            errors.add(attack_id_path, BLANK);
            None
        }
        Some(JsonValue::String(id)) if !known_attack_ids.contains(id) => {
            errors.add(attack_id_path, format!("Unknown attack id \"{}\".", id));
            None
        }
        Some(JsonValue::String(id)) => Some(id.clone()),
        Some(_) => {
            errors.add(attack_id_path, NOT_A_STRING);
            None
        }
    };

    let confidence = parse_confidence(
        object.get("confidence"),
        &format!("{}.confidence", path),
        errors,
    );

    let provenance: Map<String, JsonValue> = object
        .iter()
        .filter(|(key, _)| key.as_str() != "attack_id" && key.as_str() != "confidence")
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(NewMapping {
        attack_id: attack_id?,
        confidence: confidence?,
        provenance,
    })
}

/// Percent in `0..=100`; absent means 0. Numeric strings are accepted.
fn parse_confidence(
    value: Option<&JsonValue>,
    path: &str,
    errors: &mut FieldErrors,
) -> Option<Decimal> {
    let raw = match value {
        None | Some(JsonValue::Null) => return Some(Decimal::ZERO),
        Some(JsonValue::Number(n)) => n.to_string(),
        Some(JsonValue::String(s)) => s.trim().to_string(),
        Some(_) => {
            errors.add(path, NOT_A_NUMBER);
            return None;
        }
    };

    let parsed = Decimal::from_str(&raw).or_else(|_| Decimal::from_scientific(&raw));
    match parsed {
        Ok(confidence) if confidence_in_range(confidence) => Some(confidence),
        Ok(_) => {
            errors.add(path, "Ensure this value is between 0 and 100.");
            None
        }
        Err(_) => {
            errors.add(path, NOT_A_NUMBER);
            None
        }
    }
}
