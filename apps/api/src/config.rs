use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every path is relative to the working directory unless absolute.
#[derive(Debug, Clone)]
pub struct Config {
    /// Only needed by modes that call the authoring model.
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub template_dir: PathBuf,
    pub base_cv: PathBuf,
    pub base_cover_letter: PathBuf,
    pub output_root: PathBuf,
    pub max_authoring_retries: usize,
    pub weasyprint_bin: PathBuf,
    pub pdftoppm_bin: PathBuf,
    pub jpeg_dpi: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            template_dir: path_env("TAILOR_TEMPLATE_DIR", "templates"),
            base_cv: path_env("TAILOR_BASE_CV", "fixtures/base_cv.json"),
            base_cover_letter: path_env(
                "TAILOR_BASE_COVER_LETTER",
                "fixtures/base_cover_letter.json",
            ),
            output_root: path_env("TAILOR_OUTPUT_ROOT", "output"),
            max_authoring_retries: parse_env("TAILOR_MAX_AUTHORING_RETRIES", 1)?,
            weasyprint_bin: path_env("TAILOR_WEASYPRINT_BIN", "weasyprint"),
            pdftoppm_bin: path_env("TAILOR_PDFTOPPM_BIN", "pdftoppm"),
            jpeg_dpi: parse_env("TAILOR_JPEG_DPI", 150)?,
        })
    }

    pub fn require_api_key(&self) -> Result<String> {
        self.anthropic_api_key
            .clone()
            .context("Required environment variable 'ANTHROPIC_API_KEY' is not set")
    }
}

fn path_env(key: &str, default: &str) -> PathBuf {
    std::env::var_os(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_defaults_and_rejects_garbage() {
        std::env::remove_var("TAILOR_TEST_UNSET_PORT");
        assert_eq!(parse_env::<u16>("TAILOR_TEST_UNSET_PORT", 8080).unwrap(), 8080);

        std::env::set_var("TAILOR_TEST_BAD_DPI", "high");
        let err = parse_env::<u32>("TAILOR_TEST_BAD_DPI", 150).unwrap_err();
        assert!(err.to_string().contains("TAILOR_TEST_BAD_DPI"));

        std::env::set_var("TAILOR_TEST_GOOD_RETRIES", " 2 ");
        assert_eq!(parse_env::<usize>("TAILOR_TEST_GOOD_RETRIES", 1).unwrap(), 2);
    }

    #[test]
    fn test_missing_api_key_is_reported_by_name() {
        let config = Config {
            anthropic_api_key: None,
            port: 8080,
            rust_log: "info".to_string(),
            template_dir: "templates".into(),
            base_cv: "fixtures/base_cv.json".into(),
            base_cover_letter: "fixtures/base_cover_letter.json".into(),
            output_root: "output".into(),
            max_authoring_retries: 1,
            weasyprint_bin: "weasyprint".into(),
            pdftoppm_bin: "pdftoppm".into(),
            jpeg_dpi: 150,
        };
        let err = config.require_api_key().unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
