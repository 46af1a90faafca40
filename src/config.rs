use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, str::FromStr, time::Duration};

use crate::services::{
    key_resolver::DEFAULT_PROVIDER_DOMAIN, lister::ListerLimits,
    recording_service::PairingSettings, s3_store::S3Settings,
};

/// Which storage backend serves the bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    S3,
    Local,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Backend::S3),
            "local" => Ok(Backend::Local),
            other => bail!("unknown backend `{}` (expected `s3` or `local`)", other),
        }
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
    pub local_root: String,
    pub provider_domains: Vec<String>,
    pub pairing: PairingSettings,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Call-recordings listing API over S3-compatible storage")]
pub struct Args {
    /// Host to bind to (overrides RECORDINGS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides RECORDINGS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Storage backend (overrides RECORDINGS_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Bucket holding the recordings (overrides RECORDINGS_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Storage region (overrides RECORDINGS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Custom S3 endpoint, e.g. https://fra1.digitaloceanspaces.com (overrides RECORDINGS_ENDPOINT)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Use path-style bucket addressing (overrides RECORDINGS_FORCE_PATH_STYLE)
    #[arg(long)]
    pub force_path_style: bool,

    /// Directory served as the bucket by the local backend (overrides RECORDINGS_LOCAL_ROOT)
    #[arg(long)]
    pub local_root: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("RECORDINGS_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_parse("RECORDINGS_PORT", 3000u16)?;
        let env_backend = env_parse("RECORDINGS_BACKEND", Backend::S3)?;
        let env_bucket = env::var("RECORDINGS_BUCKET").unwrap_or_default();
        let env_local_root =
            env::var("RECORDINGS_LOCAL_ROOT").unwrap_or_else(|_| "./data/bucket".into());
        let env_path_style = env_parse("RECORDINGS_FORCE_PATH_STYLE", false)?;

        let provider_domains = match env_opt("RECORDINGS_PROVIDER_DOMAINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string)
                .collect(),
            None => vec![DEFAULT_PROVIDER_DOMAIN.to_string()],
        };

        let defaults = PairingSettings::default();
        let pairing = PairingSettings {
            lister: ListerLimits {
                page_size: env_parse("RECORDINGS_PAGE_SIZE", defaults.lister.page_size)?
                    .clamp(1, 1000),
                max_pages: env_parse("RECORDINGS_MAX_PAGES", defaults.lister.max_pages)?.max(1),
                list_timeout: env_millis("RECORDINGS_LIST_TIMEOUT_MS", defaults.lister.list_timeout)?,
            },
            fetch_timeout: env_millis("RECORDINGS_FETCH_TIMEOUT_MS", defaults.fetch_timeout)?,
            probe_timeout: env_millis("RECORDINGS_PROBE_TIMEOUT_MS", defaults.probe_timeout)?,
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend: args.backend.unwrap_or(env_backend),
            bucket: args.bucket.unwrap_or(env_bucket),
            region: args.region.or_else(|| env_opt("RECORDINGS_REGION")),
            endpoint: args.endpoint.or_else(|| env_opt("RECORDINGS_ENDPOINT")),
            access_key: env_opt("RECORDINGS_ACCESS_KEY"),
            secret_key: env_opt("RECORDINGS_SECRET_KEY"),
            force_path_style: args.force_path_style || env_path_style,
            local_root: args.local_root.unwrap_or(env_local_root),
            provider_domains,
            pairing,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn s3_settings(&self) -> S3Settings {
        S3Settings {
            bucket: self.bucket.clone(),
            region: self.region.clone(),
            endpoint: self.endpoint.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            force_path_style: self.force_path_style,
        }
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key.as_ref().map(|_| "<set>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<set>"))
            .field("force_path_style", &self.force_path_style)
            .field("local_root", &self.local_root)
            .field("provider_domains", &self.provider_domains)
            .field("pairing", &self.pairing)
            .finish()
    }
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => parse_var(name, Some(&value), default),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn parse_var<T>(name: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = raw else {
        return Ok(default);
    };
    value
        .trim()
        .parse::<T>()
        .map_err(|err| anyhow::anyhow!("{}", err))
        .with_context(|| format!("parsing {} value `{}`", name, value))
}

fn env_millis(name: &str, default: Duration) -> Result<Duration> {
    let millis = env_parse(name, default.as_millis() as u64)?;
    Ok(Duration::from_millis(millis.max(1)))
}
