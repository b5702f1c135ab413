use std::{
    env,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, fetch::DEFAULT_USER_AGENT, Result};

/// Which change-detection strategy a deployment runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeStrategy {
    /// Byte-for-byte comparison against the stored snapshot.
    Exact,
    /// Delegated judgment of semantic significance.
    Semantic,
}

/// Typed configuration for the monitor, read from the environment (with an
/// optional `.env` file that never overrides real env vars).
#[derive(Clone, Debug)]
pub struct Config {
    // Delivery
    pub discord_bot_token: String,

    // Persistence
    pub state_file: PathBuf,

    // Fetching
    pub fetch_timeout: Duration,
    pub fetch_user_agent: String,

    // Change detection
    pub strategy: ChangeStrategy,
    pub semantic_prefix_limit: usize,

    // Semantic judge
    pub openai_api_key: Option<String>,
    pub judge_model: String,
    pub judge_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let discord_bot_token = env_str("DISCORD_BOT_TOKEN").unwrap_or_default();
        if discord_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "DISCORD_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let state_file = env_path("STATE_FILE").unwrap_or_else(|| PathBuf::from("config.json"));

        let fetch_timeout = Duration::from_millis(env_u64("FETCH_TIMEOUT_MS").unwrap_or(30_000));
        let fetch_user_agent = env_str("FETCH_USER_AGENT")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let strategy = match env_str("CHANGE_STRATEGY") {
            None => ChangeStrategy::Exact,
            Some(raw) => parse_strategy(&raw).ok_or_else(|| {
                Error::Config(format!(
                    "CHANGE_STRATEGY must be \"exact\" or \"semantic\" (got {raw:?})"
                ))
            })?,
        };
        let semantic_prefix_limit = env_usize("SEMANTIC_PREFIX_LIMIT").unwrap_or(4000);

        let openai_api_key = env_str("OPENAI_API_KEY").and_then(non_empty);
        if strategy == ChangeStrategy::Semantic && openai_api_key.is_none() {
            return Err(Error::Config(
                "CHANGE_STRATEGY=semantic requires OPENAI_API_KEY".to_string(),
            ));
        }

        let judge_model = env_str("JUDGE_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| "gpt-4o-mini".to_string());
        let judge_timeout = Duration::from_millis(env_u64("JUDGE_TIMEOUT_MS").unwrap_or(10_000));

        Ok(Self {
            discord_bot_token,
            state_file,
            fetch_timeout,
            fetch_user_agent,
            strategy,
            semantic_prefix_limit,
            openai_api_key,
            judge_model,
            judge_timeout,
        })
    }
}

fn parse_strategy(raw: &str) -> Option<ChangeStrategy> {
    match raw.trim().to_lowercase().as_str() {
        "exact" => Some(ChangeStrategy::Exact),
        "semantic" => Some(ChangeStrategy::Semantic),
        _ => None,
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key).map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_parses_case_insensitively() {
        assert_eq!(parse_strategy("exact"), Some(ChangeStrategy::Exact));
        assert_eq!(parse_strategy(" Semantic "), Some(ChangeStrategy::Semantic));
        assert_eq!(parse_strategy("EXACT"), Some(ChangeStrategy::Exact));
        assert_eq!(parse_strategy("fuzzy"), None);
        assert_eq!(parse_strategy(""), None);
    }

    #[test]
    fn non_empty_filters_blank_values() {
        assert_eq!(non_empty("  ".to_string()), None);
        assert_eq!(non_empty("x".to_string()), Some("x".to_string()));
    }
}
