// Authoring prompts for the two generated documents.
// Reuses cross-cutting fragments from llm_client::prompts.

use crate::llm_client::prompts::{AUTHENTICITY_INSTRUCTION, BOUNDS_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::schema::DocumentKind;

/// System prompt for CV authoring.
pub const CV_SYSTEM: &str = "You are an expert CV writer who tailors an existing CV \
    to a specific job posting.";

/// System prompt for cover letter authoring.
pub const COVER_LETTER_SYSTEM: &str = "You are an expert cover letter writer who adapts an \
    existing cover letter to a specific job posting and company.";

/// CV authoring prompt.
/// Replace: {authenticity}, {bounds}, {constraints}, {base_document}, {job_description}
pub const CV_PROMPT_TEMPLATE: &str = r#"Create a CV that matches the job requirements below.

Start from the BASE CV and modify its content to match the job: reorder and rephrase the
professional summary, technical skills, experience responsibilities and certifications so the
most relevant material comes first. Keep the candidate's identity and contact details unchanged.

{authenticity}

{bounds}

Return a JSON object with these fields and constraints:
{constraints}

BASE CV (JSON):
{base_document}

JOB DESCRIPTION:
{job_description}"#;

/// Cover letter authoring prompt.
/// Replace: {authenticity}, {bounds}, {constraints}, {base_document}, {job_description}
pub const COVER_LETTER_PROMPT_TEMPLATE: &str = r#"Create a cover letter that highlights the candidate's qualifications relevant to the job below.

Start from the BASE COVER LETTER. Fill in the recipient block (hiring manager, job title, company
name and address) from the job description; where the posting does not say, use a neutral
value such as "Hiring Manager". Replace every bracketed placeholder. Write exactly three body
paragraphs and a complete closing paragraph. Use today's date: {today}.

{authenticity}

{bounds}

Return a JSON object with these fields and constraints:
{constraints}

BASE COVER LETTER (JSON):
{base_document}

JOB DESCRIPTION:
{job_description}"#;

/// Appended to the original prompt when a draft was rejected.
/// Replace: {document}, {violations}
pub const CORRECTION_TEMPLATE: &str = r#"

YOUR PREVIOUS {document} WAS REJECTED by the validator with these violations:
{violations}

Return the complete corrected JSON object. Fix every violation listed above and keep
everything else that was already valid."#;

pub fn system_for(kind: DocumentKind) -> String {
    let role = match kind {
        DocumentKind::Cv => CV_SYSTEM,
        DocumentKind::CoverLetter => COVER_LETTER_SYSTEM,
    };
    format!("{role} {JSON_ONLY_SYSTEM}")
}

pub fn authoring_prompt(
    kind: DocumentKind,
    base_document: &str,
    job_description: &str,
    today: &str,
) -> String {
    let template = match kind {
        DocumentKind::Cv => CV_PROMPT_TEMPLATE,
        DocumentKind::CoverLetter => COVER_LETTER_PROMPT_TEMPLATE,
    };
    template
        .replace("{authenticity}", AUTHENTICITY_INSTRUCTION)
        .replace("{bounds}", BOUNDS_INSTRUCTION)
        .replace("{constraints}", &kind.schema().describe())
        .replace("{today}", today)
        .replace("{base_document}", base_document)
        .replace("{job_description}", job_description)
}

pub fn correction_prompt(original: &str, kind: DocumentKind, violations: &str) -> String {
    let correction = CORRECTION_TEMPLATE
        .replace("{document}", &kind.stem().replace('_', " ").to_uppercase())
        .replace("{violations}", violations);
    format!("{original}{correction}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authoring_prompt_fills_every_placeholder() {
        for kind in [DocumentKind::Cv, DocumentKind::CoverLetter] {
            let prompt = authoring_prompt(kind, "{\"full_name\":\"Ada\"}", "Rust role", "2024-02-07");
            assert!(prompt.contains("{\"full_name\":\"Ada\"}"));
            assert!(prompt.contains("Rust role"));
            assert!(!prompt.contains("{constraints}"));
            assert!(!prompt.contains("{authenticity}"));
            assert!(!prompt.contains("{bounds}"));
            assert!(prompt.contains("NEVER fabricate"));
        }
    }

    #[test]
    fn test_constraints_come_from_schema() {
        let prompt = authoring_prompt(DocumentKind::CoverLetter, "{}", "job", "2024-02-07");
        assert!(prompt.contains(&DocumentKind::CoverLetter.schema().describe()));
        assert!(prompt.contains("Use today's date: 2024-02-07."));
    }

    #[test]
    fn test_correction_appends_violations() {
        let prompt = correction_prompt(
            "ORIGINAL",
            DocumentKind::CoverLetter,
            "- paragraphs: must be exactly 3 items, got 2",
        );
        assert!(prompt.starts_with("ORIGINAL"));
        assert!(prompt.contains("YOUR PREVIOUS COVER LETTER WAS REJECTED"));
        assert!(prompt.contains("must be exactly 3 items, got 2"));
    }

    #[test]
    fn test_system_prompt_requires_json() {
        assert!(system_for(DocumentKind::Cv).contains("single valid JSON object"));
    }
}
