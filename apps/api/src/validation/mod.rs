//! Validator: checks untrusted structured data against a Document Schema.
//!
//! Validation is total: every field is visited, every violation is collected, and a
//! single violation rejects the whole document. On success the value is converted into
//! its typed model; on failure no partial instance exists.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{Bounds, Document, FieldKind, FieldSpec, Format, Schema};

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$")
        .expect("email regex is valid")
});

static DATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex is valid"));

// ────────────────────────────────────────────────────────────────────────────
// Report types
// ────────────────────────────────────────────────────────────────────────────

/// The bound or rule a field failed, together with what was actually received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Constraint {
    Required,
    Type { expected: String, found: String },
    Length { min: usize, max: usize, actual: usize },
    Count { min: usize, max: usize, actual: usize },
    Format { format: Format, value: String },
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Required => write!(f, "is required"),
            Constraint::Type { expected, found } => {
                write!(f, "must be {expected}, got {found}")
            }
            Constraint::Length { min, max, actual } => write!(
                f,
                "{} characters, got {actual}",
                bound_phrase(*min, *max, *actual)
            ),
            Constraint::Count { min, max, actual } => {
                write!(f, "{} items, got {actual}", bound_phrase(*min, *max, *actual))
            }
            Constraint::Format {
                format: Format::Email,
                value,
            } => write!(f, "must be a valid email address, got {value:?}"),
            Constraint::Format {
                format: Format::Date,
                value,
            } => write!(f, "must be a calendar date (YYYY-MM-DD), got {value:?}"),
            Constraint::Format { value, .. } => write!(f, "has an invalid format: {value:?}"),
        }
    }
}

fn bound_phrase(min: usize, max: usize, actual: usize) -> String {
    if min == max {
        format!("must be {}", Bounds(min, max))
    } else if actual < min {
        format!("must be at least {min}")
    } else {
        format!("must be at most {max}")
    }
}

/// One violated field. `field` is a path such as `experience[0].responsibilities[2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub field: String,
    pub constraint: Constraint,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.constraint)
    }
}

/// Every violation found in one document.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{document} failed validation with {} violation(s): {}", .violations.len(), summary(.violations))]
pub struct ValidationReport {
    pub document: String,
    pub violations: Vec<Violation>,
}

fn summary(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationReport {
    /// True if any violation is on `field` or nested beneath it.
    #[cfg(test)]
    pub fn mentions(&self, field: &str) -> bool {
        self.violations.iter().any(|v| {
            v.field == field
                || v.field.starts_with(&format!("{field}."))
                || v.field.starts_with(&format!("{field}["))
        })
    }

    /// Bullet list suitable for appending to a corrective authoring prompt.
    pub fn to_feedback(&self) -> String {
        self.violations
            .iter()
            .map(|v| format!("- {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Validation
// ────────────────────────────────────────────────────────────────────────────

/// Checks `value` against `schema`, collecting every violation in one pass.
pub fn validate(value: &Value, schema: &Schema) -> Result<(), ValidationReport> {
    let mut violations = Vec::new();

    match value.as_object() {
        Some(object) => check_record(object, schema.fields, "", &mut violations),
        None => violations.push(Violation {
            field: "$".to_string(),
            constraint: Constraint::Type {
                expected: "an object".to_string(),
                found: type_name(value).to_string(),
            },
        }),
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationReport {
            document: schema.name.to_string(),
            violations,
        })
    }
}

/// Validates `value` and converts it into the typed document `D`.
pub fn validate_document<D: Document>(value: &Value) -> Result<D, ValidationReport> {
    let schema = D::schema();
    validate(value, schema)?;

    serde_json::from_value(value.clone()).map_err(|e| ValidationReport {
        document: schema.name.to_string(),
        violations: vec![Violation {
            field: "$".to_string(),
            constraint: Constraint::Type {
                expected: format!("a {} document", schema.name),
                found: e.to_string(),
            },
        }],
    })
}

fn check_record(
    object: &Map<String, Value>,
    fields: &[FieldSpec],
    prefix: &str,
    violations: &mut Vec<Violation>,
) {
    for spec in fields {
        let path = if prefix.is_empty() {
            spec.name.to_string()
        } else {
            format!("{prefix}.{}", spec.name)
        };

        match object.get(spec.name) {
            None | Some(Value::Null) => {
                if spec.required {
                    violations.push(Violation {
                        field: path,
                        constraint: Constraint::Required,
                    });
                }
            }
            Some(value) => check_kind(value, &spec.kind, &path, violations),
        }
    }
}

fn check_kind(value: &Value, kind: &FieldKind, path: &str, violations: &mut Vec<Violation>) {
    match kind {
        FieldKind::Text { min, max, format } => {
            let Some(text) = value.as_str() else {
                violations.push(type_violation(path, "a string", value));
                return;
            };

            let actual = text.chars().count();
            if actual < *min || actual > *max {
                violations.push(Violation {
                    field: path.to_string(),
                    constraint: Constraint::Length {
                        min: *min,
                        max: *max,
                        actual,
                    },
                });
                // A date of the wrong length cannot also be judged on format.
                if *format == Format::Date {
                    return;
                }
            }

            if !matches_format(text, *format) {
                violations.push(Violation {
                    field: path.to_string(),
                    constraint: Constraint::Format {
                        format: *format,
                        value: text.to_string(),
                    },
                });
            }
        }
        FieldKind::Record(fields) => match value.as_object() {
            Some(object) => check_record(object, fields, path, violations),
            None => violations.push(type_violation(path, "an object", value)),
        },
        FieldKind::List { min, max, item } => {
            let Some(items) = value.as_array() else {
                violations.push(type_violation(path, "an array", value));
                return;
            };

            // Cardinality is checked independently of the items themselves.
            if items.len() < *min || items.len() > *max {
                violations.push(Violation {
                    field: path.to_string(),
                    constraint: Constraint::Count {
                        min: *min,
                        max: *max,
                        actual: items.len(),
                    },
                });
            }

            for (i, element) in items.iter().enumerate() {
                check_kind(element, item, &format!("{path}[{i}]"), violations);
            }
        }
    }
}

fn matches_format(text: &str, format: Format) -> bool {
    match format {
        Format::Plain => true,
        Format::Email => EMAIL_REGEX.is_match(text),
        Format::Date => {
            DATE_REGEX.is_match(text) && NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
        }
    }
}

fn type_violation(path: &str, expected: &str, value: &Value) -> Violation {
    Violation {
        field: path.to_string(),
        constraint: Constraint::Type {
            expected: expected.to_string(),
            found: type_name(value).to_string(),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    /// Minimal CV: every list at its lower bound, summary at exactly 50 characters.
    pub fn minimal_cv() -> Value {
        json!({
            "full_name": "Ada Lovelace",
            "job_title": "Senior Software Engineer",
            "location": "London, UK",
            "email": "ada@example.com",
            "phone": "+44 20 7946 0958",
            "linkedin": "linkedin.com/in/ada-lovelace",
            "professional_summary": "Engineer building reliable analytical engines now.",
            "technical_skills": [
                {"category": "Languages", "skills": "Rust, Python, SQL"}
            ],
            "experience": [
                {
                    "job_title": "Software Engineer",
                    "company": "Analytical Engines Ltd",
                    "date_range": "2019 - Present",
                    "responsibilities": ["Designed the difference engine control plane"]
                }
            ],
            "education": [
                {
                    "degree": "BSc Mathematics",
                    "institution": "University of London",
                    "year": "2018",
                    "achievements": []
                }
            ],
            "certifications": []
        })
    }

    pub fn paragraph(n: usize) -> String {
        format!(
            "Paragraph {n} explains in concrete terms why this candidate fits the role well."
        )
    }

    pub fn cover_letter() -> Value {
        json!({
            "full_name": "Ada Lovelace",
            "address": "12 St James's Square",
            "city": "London",
            "state": "LN",
            "zip": "SW1Y 4JH",
            "email": "ada@example.com",
            "phone": "+44 20 7946 0958",
            "date": "2024-02-07",
            "hiring_manager_name": "Charles Babbage",
            "job_title": "Senior Software Engineer",
            "company_name": "Difference Works",
            "company_address": "1 Engine Way",
            "company_city": "Cambridge",
            "company_state": "CB",
            "company_zip": "CB2 1TN",
            "paragraphs": [paragraph(1), paragraph(2), paragraph(3)],
            "closing_paragraph": "Thank you for considering my application."
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::fixtures::{cover_letter, minimal_cv, paragraph};
    use super::*;
    use crate::models::{CoverLetter, Cv};
    use crate::schema::{COVER_LETTER_SCHEMA, CV_SCHEMA};

    #[test]
    fn test_minimal_cv_summary_is_exactly_fifty_chars() {
        let cv = minimal_cv();
        let summary = cv["professional_summary"].as_str().unwrap();
        assert_eq!(summary.chars().count(), 50);
    }

    #[test]
    fn test_valid_cv_round_trips_to_same_mapping() {
        let data = minimal_cv();
        let cv: Cv = validate_document(&data).expect("minimal CV must validate");
        assert_eq!(serde_json::to_value(&cv).unwrap(), data);
    }

    #[test]
    fn test_valid_cover_letter_round_trips_to_same_mapping() {
        let data = cover_letter();
        let letter: CoverLetter = validate_document(&data).expect("cover letter must validate");
        assert_eq!(serde_json::to_value(&letter).unwrap(), data);
    }

    #[test]
    fn test_summary_of_49_chars_names_field_and_lower_bound() {
        let mut data = minimal_cv();
        let short: String = data["professional_summary"]
            .as_str()
            .unwrap()
            .chars()
            .take(49)
            .collect();
        data["professional_summary"] = json!(short);

        let report = validate_document::<Cv>(&data).unwrap_err();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].field, "professional_summary");
        assert_eq!(
            report.violations[0].constraint,
            Constraint::Length {
                min: 50,
                max: 600,
                actual: 49
            }
        );
        assert!(report.to_string().contains("must be at least 50 characters"));
    }

    #[test]
    fn test_each_single_field_violation_is_reported_by_name() {
        let cases: Vec<(&str, Value)> = vec![
            ("full_name", json!("")),
            ("job_title", json!("x".repeat(51))),
            ("location", json!("")),
            ("email", json!("not-an-email")),
            ("phone", json!("123")),
            ("linkedin", json!("x".repeat(101))),
            ("professional_summary", json!("x".repeat(601))),
            ("technical_skills", json!([])),
            ("experience", json!([])),
            ("education", json!([])),
            ("certifications", json!(["a", "b", "c", "d", "e", "f"])),
        ];

        for (field, bad) in cases {
            let mut data = minimal_cv();
            data[field] = bad;
            let report = validate(&data, &CV_SCHEMA).unwrap_err();
            assert!(report.mentions(field), "report should name {field}: {report}");
        }
    }

    #[test]
    fn test_nested_violations_carry_full_path() {
        let mut data = minimal_cv();
        data["experience"][0]["responsibilities"] = json!(["ok", "x".repeat(121)]);
        data["education"][0]["year"] = json!("18");

        let report = validate(&data, &CV_SCHEMA).unwrap_err();
        let fields: Vec<_> = report.violations.iter().map(|v| v.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["experience[0].responsibilities[1]", "education[0].year"]
        );
    }

    #[test]
    fn test_all_violations_collected_in_one_pass() {
        let mut data = minimal_cv();
        data["email"] = json!("nope");
        data["phone"] = json!(5551234);
        data.as_object_mut().unwrap().remove("linkedin");

        let report = validate(&data, &CV_SCHEMA).unwrap_err();
        assert_eq!(report.violations.len(), 3);
        assert!(report.mentions("email"));
        assert!(report.mentions("phone"));
        assert!(report.mentions("linkedin"));
        assert_eq!(report.violations[2].constraint, Constraint::Required);
    }

    #[test]
    fn test_list_over_max_rejected_even_when_items_valid() {
        let mut data = minimal_cv();
        let entry = data["experience"][0].clone();
        data["experience"] = json!([entry.clone(), entry.clone(), entry.clone(), entry]);

        let report = validate(&data, &CV_SCHEMA).unwrap_err();
        assert_eq!(
            report.violations,
            vec![Violation {
                field: "experience".to_string(),
                constraint: Constraint::Count {
                    min: 1,
                    max: 3,
                    actual: 4
                },
            }]
        );
    }

    #[test]
    fn test_two_or_four_paragraphs_always_rejected() {
        for count in [2, 4] {
            let mut data = cover_letter();
            let paragraphs: Vec<String> = (1..=count).map(paragraph).collect();
            data["paragraphs"] = json!(paragraphs);

            let report = validate(&data, &COVER_LETTER_SCHEMA).unwrap_err();
            assert_eq!(report.violations.len(), 1);
            assert_eq!(
                report.violations[0].constraint,
                Constraint::Count {
                    min: 3,
                    max: 3,
                    actual: count
                }
            );
            assert!(report.to_string().contains("must be exactly 3 items"));
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let mut data = minimal_cv();
        data["professional_summary"] = json!("s".repeat(600));
        data["phone"] = json!("0123456789");
        data["certifications"] = json!(["a", "b", "c", "d", "e"]);
        assert!(validate(&data, &CV_SCHEMA).is_ok());
    }

    #[test]
    fn test_lengths_count_characters_not_bytes() {
        let mut data = minimal_cv();
        // 50 characters, well over 50 bytes.
        data["professional_summary"] = json!("é".repeat(50));
        assert!(validate(&data, &CV_SCHEMA).is_ok());
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        let mut data = cover_letter();
        data["date"] = json!("2023-02-30");
        let report = validate(&data, &COVER_LETTER_SCHEMA).unwrap_err();
        assert_eq!(report.violations[0].field, "date");
        assert!(matches!(
            report.violations[0].constraint,
            Constraint::Format {
                format: Format::Date,
                ..
            }
        ));
    }

    #[test]
    fn test_unpadded_date_rejected_on_length_only() {
        let mut data = cover_letter();
        data["date"] = json!("2024-2-7");
        let report = validate(&data, &COVER_LETTER_SCHEMA).unwrap_err();
        assert_eq!(report.violations.len(), 1);
        assert!(matches!(
            report.violations[0].constraint,
            Constraint::Length { .. }
        ));
    }

    #[test]
    fn test_state_must_be_exactly_two_chars() {
        let mut data = cover_letter();
        data["company_state"] = json!("CAL");
        let report = validate(&data, &COVER_LETTER_SCHEMA).unwrap_err();
        assert!(report.mentions("company_state"));
        assert!(report.to_string().contains("must be exactly 2 characters, got 3"));
    }

    #[test]
    fn test_wrong_types_reported() {
        let mut data = minimal_cv();
        data["technical_skills"] = json!("Rust");
        data["experience"][0] = json!("not an object");

        let report = validate(&data, &CV_SCHEMA).unwrap_err();
        assert_eq!(report.violations.len(), 2);
        assert_eq!(
            report.violations[1].constraint,
            Constraint::Type {
                expected: "an object".to_string(),
                found: "a string".to_string()
            }
        );
    }

    #[test]
    fn test_non_object_document_rejected() {
        let report = validate(&json!([1, 2, 3]), &CV_SCHEMA).unwrap_err();
        assert_eq!(report.violations[0].field, "$");
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let mut data = minimal_cv();
        data["hobbies"] = json!(["chess"]);
        let cv: Cv = validate_document(&data).unwrap();
        assert_eq!(cv.full_name, "Ada Lovelace");
    }

    #[test]
    fn test_email_format() {
        assert!(matches_format("john.doe@email.com", Format::Email));
        assert!(!matches_format("john.doe@email", Format::Email));
        assert!(!matches_format("@email.com", Format::Email));
        assert!(!matches_format("john doe@email.com", Format::Email));
    }

    #[test]
    fn test_feedback_lists_each_violation() {
        let mut data = cover_letter();
        data["zip"] = json!("123");
        data["closing_paragraph"] = json!("Thanks.");
        let report = validate(&data, &COVER_LETTER_SCHEMA).unwrap_err();
        let feedback = report.to_feedback();
        assert_eq!(feedback.lines().count(), 2);
        assert!(feedback.starts_with("- zip must be at least 5 characters, got 3"));
    }
}
