// Shared prompt constants and prompt-building utilities.
// The pipeline defines its document prompts in pipeline/prompts.rs.
// This file contains cross-cutting prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to all authoring prompts.
pub const AUTHENTICITY_INSTRUCTION: &str = "\
    CRITICAL: NEVER fabricate metrics, statistics, employers, dates, or credentials. \
    Describe actual responsibilities and achievements from the base document without \
    inventing quantification. Rephrase and reorder to match the job, but every claim \
    must be traceable to the base document.";

/// Instruction that the length bounds are hard limits, not targets.
pub const BOUNDS_INSTRUCTION: &str = "\
    Every length and item-count bound below is a HARD limit checked by a validator. \
    A document that breaks any bound is rejected as a whole. \
    Bounds are inclusive; 'exactly N' means N, never more and never fewer.";
