use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the campus backend, e.g. `https://fix.campus.edu`.
    pub api_url: Url,
    /// Bearer token attached to every backend request, if set.
    pub api_token: Option<String>,
    /// JSON file holding read state and pending navigation.
    pub state_file: PathBuf,
    /// Page size used for every paginated issue request.
    /// Set via CAMPUSFIX_PAGE_SIZE env var. Default: 20.
    pub page_size: u32,
    /// Walk every issue page when aggregating notifications instead of page 0 only.
    pub fetch_all_pages: bool,
    /// Max concurrent per-issue update fetches. 1 = sequential.
    pub fetch_concurrency: usize,
    pub http_timeout_secs: u64,
    /// Transient-failure retries for backend calls. 0 = disabled.
    pub http_max_retries: u32,
    /// Soft cap on read ids kept per user. Past it, the oldest ids no longer
    /// produced by a load are pruned. 0 = unbounded.
    pub read_state_cap: usize,
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            api_token: None,
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            page_size: 20,
            fetch_all_pages: false,
            fetch_concurrency: 1,
            http_timeout_secs: 30,
            http_max_retries: 0,
            read_state_cap: 2000,
            log_json: false,
        }
    }
}

const DEFAULT_API_URL: &str = "http://localhost:8080";
const DEFAULT_STATE_FILE: &str = "./campusfix-state.json";

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();
    from_lookup(|key| std::env::var(key).ok())
}

/// Build a config from an arbitrary variable source. `load` uses the process env.
pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let defaults = Config::default();

    let raw_url = lookup("CAMPUSFIX_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
    let api_url = Url::parse(&raw_url)
        .with_context(|| format!("CAMPUSFIX_API_URL is not a valid URL: {}", raw_url))?;
    if api_url.cannot_be_a_base() {
        anyhow::bail!("CAMPUSFIX_API_URL must be an http(s) base URL, got {}", raw_url);
    }

    let flag = |key: &str| {
        lookup(key)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false)
    };

    Ok(Config {
        api_url,
        api_token: lookup("CAMPUSFIX_API_TOKEN").filter(|t| !t.trim().is_empty()),
        state_file: lookup("CAMPUSFIX_STATE_FILE")
            .map(PathBuf::from)
            .unwrap_or(defaults.state_file),
        page_size: parsed(&lookup, "CAMPUSFIX_PAGE_SIZE")
            .filter(|n: &u32| *n > 0)
            .unwrap_or(defaults.page_size),
        fetch_all_pages: flag("CAMPUSFIX_FETCH_ALL_PAGES"),
        fetch_concurrency: parsed(&lookup, "CAMPUSFIX_FETCH_CONCURRENCY")
            .filter(|n: &usize| *n > 0)
            .unwrap_or(defaults.fetch_concurrency),
        http_timeout_secs: parsed(&lookup, "CAMPUSFIX_HTTP_TIMEOUT_SECS")
            .filter(|n: &u64| *n > 0)
            .unwrap_or(defaults.http_timeout_secs),
        http_max_retries: parsed(&lookup, "CAMPUSFIX_HTTP_MAX_RETRIES").unwrap_or(defaults.http_max_retries),
        read_state_cap: parsed(&lookup, "CAMPUSFIX_READ_STATE_CAP").unwrap_or(defaults.read_state_cap),
        log_json: flag("CAMPUSFIX_LOG_JSON"),
    })
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}
