//! Document Schema: the contract an authored document must satisfy before rendering.
//!
//! A schema is a static table of `FieldSpec`s. Each field carries a presence flag and
//! a `FieldKind`: a bounded text value (optionally with an email/date format), a nested
//! record, or a bounded list whose element kind is itself a `FieldKind`. All bounds are
//! inclusive and counted in characters (text) or items (lists).
//!
//! The validator walks these tables; the authoring prompts render them as prose via
//! [`Schema::describe`] so the model sees the same bounds the validator enforces.

use std::fmt::{self, Write as _};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::models::{CoverLetter, Cv};

// ────────────────────────────────────────────────────────────────────────────
// Schema building blocks
// ────────────────────────────────────────────────────────────────────────────

/// Extra lexical constraint applied to a text field after its length check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Plain,
    Email,
    /// Calendar date written as `YYYY-MM-DD`.
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text {
        min: usize,
        max: usize,
        format: Format,
    },
    Record(&'static [FieldSpec]),
    List {
        min: usize,
        max: usize,
        item: &'static FieldKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

impl FieldSpec {
    pub const fn text(name: &'static str, min: usize, max: usize) -> Self {
        Self {
            name,
            required: true,
            kind: FieldKind::Text {
                min,
                max,
                format: Format::Plain,
            },
        }
    }

    pub const fn email(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            kind: EMAIL,
        }
    }

    pub const fn date(name: &'static str) -> Self {
        Self {
            name,
            required: true,
            kind: DATE,
        }
    }

    pub const fn list(name: &'static str, min: usize, max: usize, item: &'static FieldKind) -> Self {
        Self {
            name,
            required: true,
            kind: FieldKind::List { min, max, item },
        }
    }
}

/// Emails are capped at the SMTP path limit.
const EMAIL: FieldKind = FieldKind::Text {
    min: 3,
    max: 254,
    format: Format::Email,
};

const DATE: FieldKind = FieldKind::Text {
    min: 10,
    max: 10,
    format: Format::Date,
};

/// A named, top-level document schema.
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Looks up a top-level field by name.
    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Renders the constraints as an indented bullet list for authoring prompts.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        describe_fields(self.fields, 0, &mut out);
        out
    }
}

fn describe_fields(fields: &[FieldSpec], depth: usize, out: &mut String) {
    for field in fields {
        let indent = "  ".repeat(depth);
        let presence = if field.required { "" } else { " (optional)" };
        let _ = writeln!(
            out,
            "{indent}- {}{presence}: {}",
            field.name,
            describe_kind(&field.kind)
        );
        if let Some(nested) = nested_fields(&field.kind) {
            describe_fields(nested, depth + 1, out);
        }
    }
}

fn nested_fields(kind: &FieldKind) -> Option<&'static [FieldSpec]> {
    match kind {
        FieldKind::Record(fields) => Some(fields),
        FieldKind::List { item, .. } => nested_fields(item),
        FieldKind::Text { .. } => None,
    }
}

fn describe_kind(kind: &FieldKind) -> String {
    match kind {
        FieldKind::Text {
            format: Format::Email,
            ..
        } => "valid email address".to_string(),
        FieldKind::Text {
            format: Format::Date,
            ..
        } => "calendar date, YYYY-MM-DD".to_string(),
        FieldKind::Text { min, max, .. } => format!("{} characters", Bounds(*min, *max)),
        FieldKind::Record(_) => "object with:".to_string(),
        FieldKind::List { min, max, item } => match item {
            FieldKind::Record(_) => format!("{} items, each an object with:", Bounds(*min, *max)),
            other => format!("{} items, each {}", Bounds(*min, *max), describe_kind(other)),
        },
    }
}

/// Inclusive `[min, max]` range, printed as "exactly N" when the bounds coincide.
pub struct Bounds(pub usize, pub usize);

impl fmt::Display for Bounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == self.1 {
            write!(f, "exactly {}", self.0)
        } else {
            write!(f, "{}-{}", self.0, self.1)
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// CV schema
// ────────────────────────────────────────────────────────────────────────────

const TECHNICAL_SKILL_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("category", 1, 50),
    FieldSpec::text("skills", 1, 150),
];

const EXPERIENCE_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("job_title", 1, 50),
    FieldSpec::text("company", 1, 50),
    FieldSpec::text("date_range", 1, 30),
    FieldSpec::list(
        "responsibilities",
        1,
        3,
        &FieldKind::Text {
            min: 1,
            max: 120,
            format: Format::Plain,
        },
    ),
];

const EDUCATION_FIELDS: &[FieldSpec] = &[
    FieldSpec::text("degree", 1, 80),
    FieldSpec::text("institution", 1, 80),
    FieldSpec::text("year", 4, 4),
    FieldSpec::list(
        "achievements",
        0,
        2,
        &FieldKind::Text {
            min: 1,
            max: 100,
            format: Format::Plain,
        },
    ),
];

pub static CV_SCHEMA: Schema = Schema {
    name: "cv",
    fields: &[
        FieldSpec::text("full_name", 1, 50),
        FieldSpec::text("job_title", 1, 50),
        FieldSpec::text("location", 1, 50),
        FieldSpec::email("email"),
        FieldSpec::text("phone", 10, 20),
        FieldSpec::text("linkedin", 1, 100),
        FieldSpec::text("professional_summary", 50, 600),
        FieldSpec::list(
            "technical_skills",
            1,
            5,
            &FieldKind::Record(TECHNICAL_SKILL_FIELDS),
        ),
        FieldSpec::list("experience", 1, 3, &FieldKind::Record(EXPERIENCE_FIELDS)),
        FieldSpec::list("education", 1, 2, &FieldKind::Record(EDUCATION_FIELDS)),
        FieldSpec::list(
            "certifications",
            0,
            5,
            &FieldKind::Text {
                min: 1,
                max: 80,
                format: Format::Plain,
            },
        ),
    ],
};

// ────────────────────────────────────────────────────────────────────────────
// Cover letter schema
// ────────────────────────────────────────────────────────────────────────────

pub static COVER_LETTER_SCHEMA: Schema = Schema {
    name: "cover_letter",
    fields: &[
        FieldSpec::text("full_name", 1, 50),
        FieldSpec::text("address", 1, 100),
        FieldSpec::text("city", 1, 50),
        FieldSpec::text("state", 2, 2),
        FieldSpec::text("zip", 5, 10),
        FieldSpec::email("email"),
        FieldSpec::text("phone", 10, 20),
        FieldSpec::date("date"),
        FieldSpec::text("hiring_manager_name", 1, 50),
        FieldSpec::text("job_title", 1, 50),
        FieldSpec::text("company_name", 1, 50),
        FieldSpec::text("company_address", 1, 100),
        FieldSpec::text("company_city", 1, 50),
        FieldSpec::text("company_state", 2, 2),
        FieldSpec::text("company_zip", 5, 10),
        // Fixed cardinality: min == max is a hard requirement.
        FieldSpec::list(
            "paragraphs",
            3,
            3,
            &FieldKind::Text {
                min: 50,
                max: 800,
                format: Format::Plain,
            },
        ),
        FieldSpec::text("closing_paragraph", 20, 300),
    ],
};

// ────────────────────────────────────────────────────────────────────────────
// Typed documents
// ────────────────────────────────────────────────────────────────────────────

/// Which of the two generated documents a value, template, or artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Cv,
    CoverLetter,
}

impl DocumentKind {
    /// Stem used for template files and output artifacts (`cv.pdf`, `cover_letter.jpg`).
    pub fn stem(self) -> &'static str {
        match self {
            DocumentKind::Cv => "cv",
            DocumentKind::CoverLetter => "cover_letter",
        }
    }

    pub fn schema(self) -> &'static Schema {
        match self {
            DocumentKind::Cv => &CV_SCHEMA,
            DocumentKind::CoverLetter => &COVER_LETTER_SCHEMA,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

/// Binds a typed model to the schema that admits it.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: DocumentKind;

    fn schema() -> &'static Schema {
        Self::KIND.schema()
    }
}

impl Document for Cv {
    const KIND: DocumentKind = DocumentKind::Cv;
}

impl Document for CoverLetter {
    const KIND: DocumentKind = DocumentKind::CoverLetter;
}
