use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One candidate's cover letter: sender block, recipient block, body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverLetter {
    // Sender
    pub full_name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub email: String,
    pub phone: String,
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,

    // Recipient
    pub hiring_manager_name: String,
    pub job_title: String,
    pub company_name: String,
    pub company_address: String,
    pub company_city: String,
    pub company_state: String,
    pub company_zip: String,

    /// Exactly three body paragraphs.
    pub paragraphs: Vec<String>,
    pub closing_paragraph: String,
}
