use anyhow::{bail, Context, Result};

/// Placeholder for the rendered `<string>` batch inside `PROMPT_TEMPLATE`
pub const XML_DATA_SLOT: &str = "{xml_data}";
/// Placeholder for the target language name inside `PROMPT_TEMPLATE`
pub const LANGUAGE_SLOT: &str = "{language}";
/// Longest accepted login session, one year
pub const MAX_SESSION_TTL_MINUTES: i64 = 525_600;

#[derive(Debug, Clone)]
pub struct Config {
    // Login gate
    pub username: String,
    pub password: String,
    pub session_ttl_minutes: i64,

    // OpenAI
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_api_url: String,
    pub prompt_template: String,

    // Translation memory; None keeps the memory in-process only
    pub github: Option<GitHubConfig>,

    // Server
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub file_path: String,
    pub branch: String,
    pub api_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} not set", key))
        };
        let optional = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let github = match lookup("GITHUB_TOKEN").filter(|v| !v.trim().is_empty()) {
            Some(token) => Some(GitHubConfig {
                token,
                repo: required("GITHUB_REPO")
                    .context("GITHUB_REPO is required when GITHUB_TOKEN is set")?,
                file_path: optional("GITHUB_FILE_PATH", "translations.json"),
                branch: optional("GITHUB_BRANCH", "main"),
                api_url: optional("GITHUB_API_URL", "https://api.github.com"),
            }),
            None => None,
        };

        let config = Self {
            username: required("USERNAME")?,
            password: required("PASSWORD")?,
            session_ttl_minutes: parse_or(&lookup, "SESSION_TTL_MINUTES", 720)?,

            openai_api_key: required("OPENAI_API_KEY")?,
            openai_model: optional("OPENAI_MODEL", "gpt-4o"),
            openai_api_url: optional(
                "OPENAI_API_URL",
                "https://api.openai.com/v1/chat/completions",
            ),
            prompt_template: required("PROMPT_TEMPLATE")?,

            github,

            port: parse_or(&lookup, "PORT", 8080)?,
            request_timeout_secs: parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 120)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for slot in [XML_DATA_SLOT, LANGUAGE_SLOT] {
            if !self.prompt_template.contains(slot) {
                bail!("PROMPT_TEMPLATE must contain the {} placeholder", slot);
            }
        }

        if let Some(github) = &self.github {
            let valid_repo = github
                .repo
                .split_once('/')
                .is_some_and(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'));
            if !valid_repo {
                bail!("GITHUB_REPO must look like owner/name, got '{}'", github.repo);
            }
        }

        if self.session_ttl_minutes <= 0 {
            bail!("SESSION_TTL_MINUTES must be positive");
        }
        if self.session_ttl_minutes > MAX_SESSION_TTL_MINUTES {
            bail!(
                "SESSION_TTL_MINUTES must be at most {} (one year), got {}",
                MAX_SESSION_TTL_MINUTES,
                self.session_ttl_minutes
            );
        }
        if self.request_timeout_secs == 0 {
            bail!("REQUEST_TIMEOUT_SECS must be positive");
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        None => Ok(default),
    }
}
