//! Job-description acquisition: URL, local file, or raw text/HTML → plain job text.
//!
//! Page scraping is deliberately shallow: title from `<title>`/`<h1>`, visible text
//! with scripts and styles removed.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::render::template::escape_html;

/// Prompts carry at most this many characters of job text.
const MAX_DESCRIPTION_CHARS: usize = 20_000;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>")
        .expect("script regex is valid")
});
static BLOCK_BREAK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|tr|section|article|ul|ol)\s*>")
        .expect("block regex is valid")
});
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("tag regex is valid"));
static TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(title|h1)\b[^>]*>(.*?)</(title|h1)\s*>").expect("title regex is valid")
});
static LOOKS_LIKE_HTML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(html|body|div|p|h1|br)\b").expect("html sniff regex is valid")
});

#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read job description from {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no job description text found in {0}")]
    Empty(String),
}

/// Where the job description comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobReference {
    Url(String),
    File(PathBuf),
    Text(String),
}

impl JobReference {
    /// `http(s)://` → URL, `file://` or an existing path → file, anything else → text.
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            JobReference::Url(trimmed.to_string())
        } else if let Some(path) = trimmed.strip_prefix("file://") {
            JobReference::File(PathBuf::from(path))
        } else if !trimmed.contains('\n') && std::path::Path::new(trimmed).is_file() {
            JobReference::File(PathBuf::from(trimmed))
        } else {
            JobReference::Text(input.to_string())
        }
    }

    pub fn describe(&self) -> String {
        match self {
            JobReference::Url(url) => url.clone(),
            JobReference::File(path) => format!("file://{}", path.display()),
            JobReference::Text(_) => "inline text".to_string(),
        }
    }
}

/// Job posting as submitted to the HTTP trigger (e.g. by a browser extension).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPosting {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
}

impl JobPosting {
    pub fn is_empty(&self) -> bool {
        [&self.title, &self.company, &self.description]
            .iter()
            .all(|s| s.trim().is_empty())
    }

    /// Renders the posting as a small standalone HTML page.
    pub fn to_html(&self) -> String {
        let or = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                escape_html(fallback)
            } else {
                escape_html(value.trim())
            }
        };
        let title = or(&self.title, "Job Title");
        let company = or(&self.company, "Company Name");
        let location = or(&self.location, "Location");
        let description = or(&self.description, "No description provided").replace('\n', "<br>\n");
        let source = if self.url.trim().is_empty() {
            String::new()
        } else {
            let url = escape_html(self.url.trim());
            format!("    <p><strong>Source:</strong> <a href=\"{url}\">{url}</a></p>\n")
        };

        format!(
            "<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"UTF-8\">\n    <title>{title} - {company}</title>\n</head>\n<body>\n    <h1>{title}</h1>\n    <h2>{company}</h2>\n    <p><strong>Location:</strong> {location}</p>\n{source}    <hr>\n    <div class=\"job-description\">\n        {description}\n    </div>\n</body>\n</html>\n"
        )
    }
}

/// Plain-text job description handed to the authoring prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDescription {
    pub source: String,
    pub title: Option<String>,
    pub text: String,
}

pub async fn acquire(
    reference: &JobReference,
    http: &reqwest::Client,
) -> Result<JobDescription, AcquisitionError> {
    let source = reference.describe();
    let raw = match reference {
        JobReference::Url(url) => fetch(url, http).await?,
        JobReference::File(path) => {
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AcquisitionError::Read {
                    path: path.clone(),
                    source,
                })?
        }
        JobReference::Text(text) => text.clone(),
    };

    let description = from_raw(&source, &raw)?;
    info!(
        source = %description.source,
        chars = description.text.chars().count(),
        "acquired job description"
    );
    Ok(description)
}

async fn fetch(url: &str, http: &reqwest::Client) -> Result<String, AcquisitionError> {
    let fetch_err = |source| AcquisitionError::Fetch {
        url: url.to_string(),
        source,
    };

    let response = http
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .send()
        .await
        .map_err(fetch_err)?;

    let status = response.status();
    if !status.is_success() {
        return Err(AcquisitionError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    response.text().await.map_err(fetch_err)
}

/// Normalises raw input (HTML or plain text) into a `JobDescription`.
pub fn from_raw(source: &str, raw: &str) -> Result<JobDescription, AcquisitionError> {
    let (title, text) = if LOOKS_LIKE_HTML.is_match(raw) {
        (extract_title(raw), html_to_text(raw))
    } else {
        (None, collapse_whitespace(raw))
    };

    if text.is_empty() {
        return Err(AcquisitionError::Empty(source.to_string()));
    }

    Ok(JobDescription {
        source: source.to_string(),
        title,
        text: text.chars().take(MAX_DESCRIPTION_CHARS).collect(),
    })
}

pub fn extract_title(html: &str) -> Option<String> {
    TITLE
        .captures(html)
        .map(|c| collapse_whitespace(&decode_entities(&TAG.replace_all(&c[2], ""))))
        .filter(|t| !t.is_empty())
}

/// Visible text of an HTML page, one line per block element.
pub fn html_to_text(html: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(html, "");
    let text = BLOCK_BREAK.replace_all(&text, "\n");
    let text = TAG.replace_all(&text, " ");
    collapse_whitespace(&decode_entities(&text))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
