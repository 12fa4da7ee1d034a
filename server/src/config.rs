use std::{env, fmt::{self, Display}, net::IpAddr, path::PathBuf, str::FromStr, time::Duration};

use matchday_data_management::database::DatabaseConfig;
use tracing::info;

use crate::advisor::{fixture::PinnedFixture, AdvisorSettings, GenerationParams};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },
    #[error("{0}")]
    Incomplete(String),
}

#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

#[derive(Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub advisor: AdvisorSettings,
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("advisor", &self.advisor)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    pub tls: Option<TlsPaths>,
    /// `*` allows any origin.
    pub allowed_origins: Vec<String>,
    /// `None` runs on the in-memory store.
    pub database: Option<DatabaseConfig>,
    pub llm: LlmConfig,
    pub fixture: Option<PinnedFixture>,
}

/// Directory of the appended log file. Read before logging is up, so it sits outside [`Config`].
pub fn log_dir() -> PathBuf {
    env::var("MATCHDAY_LOG_DIR").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("log"))
}

impl Config {
    /// Reads the process environment. Call after `dotenv` so a `.env` file is honoured.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let source = Source(lookup);

        let tls = match (source.var("MATCHDAY_TLS_CERT"), source.var("MATCHDAY_TLS_KEY")) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert: cert.into(), key: key.into() }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete("MATCHDAY_TLS_CERT and MATCHDAY_TLS_KEY must be set together".into())),
        };

        Ok(Self {
            bind_address: source.try_load("MATCHDAY_BIND", "0.0.0.0")?,
            port: source.try_load("MATCHDAY_PORT", "8000")?,
            tls,
            allowed_origins: list(&source.try_load::<String>("MATCHDAY_ALLOWED_ORIGINS", "*")?),
            database: load_database(&source)?,
            llm: load_llm(&source)?,
            fixture: load_fixture(&source)?,
        })
    }
}

fn load_database<F: Fn(&str) -> Option<String>>(source: &Source<F>) -> Result<Option<DatabaseConfig>, ConfigError> {
    let Some(host) = source.var("MATCHDAY_DB_HOST") else {
        return Ok(None);
    };

    Ok(Some(DatabaseConfig {
        host,
        port: source.try_load("MATCHDAY_DB_PORT", "3306")?,
        username: source.var("MATCHDAY_DB_USER").unwrap_or_default(),
        password: source.var("MATCHDAY_DB_PASSWORD").unwrap_or_default(),
        database: source.try_load("MATCHDAY_DB_NAME", "matchday")?,
        ssl: source.try_load("MATCHDAY_DB_SSL", "false")?,
        ssl_ca: source.var("MATCHDAY_DB_SSL_CA").map(PathBuf::from),
        create_tables: source.try_load("MATCHDAY_DB_CREATE_TABLES", "false")?,
    }))
}

fn load_llm<F: Fn(&str) -> Option<String>>(source: &Source<F>) -> Result<LlmConfig, ConfigError> {
    let eos_token: String = source.try_load("MATCHDAY_LLM_EOS_TOKEN", "</s>")?;

    let params = GenerationParams {
        max_new_tokens: source.try_load("MATCHDAY_LLM_MAX_NEW_TOKENS", "512")?,
        temperature: source.try_load("MATCHDAY_LLM_TEMPERATURE", "0.7")?,
        top_p: source.try_load("MATCHDAY_LLM_TOP_P", "0.9")?,
        repetition_penalty: source.try_load("MATCHDAY_LLM_REPETITION_PENALTY", "1.1")?,
        eos_token: Some(eos_token).filter(|token| token != "none"),
    };

    let max_concurrent_generations: usize = source.try_load("MATCHDAY_LLM_MAX_CONCURRENT", "1")?;
    if max_concurrent_generations == 0 {
        return Err(ConfigError::Invalid { key: "MATCHDAY_LLM_MAX_CONCURRENT".into(), reason: "must be at least 1".into() });
    }

    Ok(LlmConfig {
        base_url: source.try_load("MATCHDAY_LLM_URL", "http://localhost:8080/v1")?,
        api_key: source.var("MATCHDAY_LLM_API_KEY"),
        model: source.try_load("MATCHDAY_LLM_MODEL", "Qwen/Qwen2.5-7B-Instruct")?,
        advisor: AdvisorSettings {
            params,
            generation_timeout: Duration::from_secs(source.try_load("MATCHDAY_LLM_TIMEOUT_SECS", "60")?),
            max_concurrent_generations,
        },
    })
}

fn load_fixture<F: Fn(&str) -> Option<String>>(source: &Source<F>) -> Result<Option<PinnedFixture>, ConfigError> {
    const KEYS: [&str; 4] = ["MATCHDAY_FIXTURE_LATITUDE", "MATCHDAY_FIXTURE_LONGITUDE", "MATCHDAY_FIXTURE_GAME_TIME", "MATCHDAY_FIXTURE_CLUB"];

    let present = KEYS.iter().filter(|key| source.var(key).is_some()).count();
    if present == 0 {
        return Ok(None);
    }
    if present < KEYS.len() {
        return Err(ConfigError::Incomplete(format!("a pinned fixture needs all of {}", KEYS.join(", "))));
    }

    let favorite_club: String = source.required(KEYS[3])?;
    let clubs = source.var("MATCHDAY_FIXTURE_CLUBS")
        .map(|clubs| list(&clubs))
        .filter(|clubs| !clubs.is_empty())
        .unwrap_or_else(|| vec![favorite_club.clone()]);

    Ok(Some(PinnedFixture {
        destination_latitude: source.required(KEYS[0])?,
        destination_longitude: source.required(KEYS[1])?,
        game_time: source.required(KEYS[2])?,
        favorite_club,
        clubs,
    }))
}

fn list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

struct Source<F: Fn(&str) -> Option<String>>(F);

impl<F: Fn(&str) -> Option<String>> Source<F> {
    /// Unset and blank are treated the same.
    fn var(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn try_load<T: FromStr>(&self, key: &str, default: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let raw = self.var(key).unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        });
        parse(key, &raw)
    }

    fn required<T: FromStr>(&self, key: &str) -> Result<T, ConfigError>
    where
        T::Err: Display,
    {
        let raw = self.var(key).ok_or_else(|| ConfigError::Incomplete(format!("{key} is required")))?;
        parse(key, &raw)
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    raw.trim().parse().map_err(|err: T::Err| ConfigError::Invalid { key: key.to_string(), reason: err.to_string() })
}
