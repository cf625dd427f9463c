use serde::{Deserialize, Serialize};

/// One candidate's resume content, as accepted by the validator.
///
/// Instances are only produced by `validation::validate_document`, so every
/// bound in `schema::CV_SCHEMA` holds for a constructed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cv {
    pub full_name: String,
    pub job_title: String,
    pub location: String,
    pub email: String,
    pub phone: String,
    pub linkedin: String,
    pub professional_summary: String,
    pub technical_skills: Vec<TechnicalSkill>,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub certifications: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSkill {
    pub category: String,
    /// Comma-separated skill list, rendered as a single line.
    pub skills: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    pub job_title: String,
    pub company: String,
    /// Free-form range, e.g. "Jan 2021 - Present".
    pub date_range: String,
    pub responsibilities: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub year: String,
    pub achievements: Vec<String>,
}
