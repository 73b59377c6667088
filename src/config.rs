use crate::errors::{StoreError, StoreResult};
use crate::services::document_store::InitPolicy;
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::{env, time::Duration};

pub const REGION_ENV: &str = "AWS_REGION";
pub const ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENDPOINT_ENV: &str = "AWS_ENDPOINT_URL";
pub const FORCE_PATH_STYLE_ENV: &str = "AWS_S3_FORCE_PATH_STYLE";
pub const URL_EXPIRY_ENV: &str = "DOC_STORE_URL_EXPIRY_SECS";

const DEFAULT_URL_EXPIRY_SECS: u64 = 900;

/// Explicit storage settings. Anything left as `None` falls back to the
/// environment during [`StorageSettings::resolve`].
#[derive(Clone, Default)]
pub struct StorageOverrides {
    pub region: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    pub force_path_style: Option<bool>,
    pub url_expiry_secs: Option<u64>,
}

impl std::fmt::Debug for StorageOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageOverrides")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("url_expiry_secs", &self.url_expiry_secs)
            .finish()
    }
}

/// Fully resolved settings consumed by [`crate::services::s3_client::S3Client`].
#[derive(Clone)]
pub struct StorageSettings {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub url_expiry: Duration,
}

// Keep the secret out of logs.
impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .field("url_expiry", &self.url_expiry)
            .finish()
    }
}

impl StorageSettings {
    /// Resolve settings from explicit overrides first and `lookup` second.
    ///
    /// `lookup` stands in for the process environment so callers (and tests)
    /// decide where ambient values come from. Nothing here touches the network.
    pub fn resolve<F>(overrides: StorageOverrides, lookup: F) -> StoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let region = required(overrides.region, &lookup, "region", REGION_ENV)?;
        let access_key_id = required(
            overrides.access_key_id,
            &lookup,
            "access_key_id",
            ACCESS_KEY_ID_ENV,
        )?;
        let secret_access_key = required(
            overrides.secret_access_key,
            &lookup,
            "secret_access_key",
            SECRET_ACCESS_KEY_ENV,
        )?;

        let endpoint = non_empty(overrides.endpoint).or_else(|| non_empty(lookup(ENDPOINT_ENV)));

        let force_path_style = match overrides.force_path_style {
            Some(flag) => flag,
            None => match non_empty(lookup(FORCE_PATH_STYLE_ENV)) {
                Some(raw) => parse_bool(&raw).ok_or(StoreError::InvalidSetting {
                    field: "force_path_style",
                    value: raw,
                })?,
                None => false,
            },
        };

        let url_expiry = resolve_url_expiry(overrides.url_expiry_secs, &lookup)?;

        Ok(Self {
            region,
            access_key_id,
            secret_access_key,
            endpoint,
            force_path_style,
            url_expiry,
        })
    }

    /// [`StorageSettings::resolve`] against the real process environment.
    pub fn from_env(overrides: StorageOverrides) -> StoreResult<Self> {
        Self::resolve(overrides, |name| env::var(name).ok())
    }
}

/// Lifetime of signed URLs: `explicit`, else [`URL_EXPIRY_ENV`], else 900 s.
/// Zero is rejected. Shared by every backend.
pub fn resolve_url_expiry<F>(explicit: Option<u64>, lookup: &F) -> StoreResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match explicit {
        Some(secs) => secs,
        None => match non_empty(lookup(URL_EXPIRY_ENV)) {
            Some(raw) => raw.parse().map_err(|_| StoreError::InvalidSetting {
                field: "url_expiry_secs",
                value: raw,
            })?,
            None => DEFAULT_URL_EXPIRY_SECS,
        },
    };
    if secs == 0 {
        return Err(StoreError::InvalidSetting {
            field: "url_expiry_secs",
            value: "0".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn required<F>(
    explicit: Option<String>,
    lookup: &F,
    field: &'static str,
    env_var: &'static str,
) -> StoreResult<String>
where
    F: Fn(&str) -> Option<String>,
{
    non_empty(explicit)
        .or_else(|| non_empty(lookup(env_var)))
        .ok_or(StoreError::Configuration { field, env_var })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Which object-storage implementation the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Amazon S3 or an S3-compatible endpoint.
    S3,
    /// Process-local storage; contents vanish on exit.
    Memory,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub bucket: String,
    pub collection: String,
    pub backend: Backend,
    pub policy: InitPolicy,
    pub storage: StorageOverrides,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Document store on top of S3-compatible object storage")]
pub struct Args {
    /// Host to bind to (overrides DOC_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DOC_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Bucket holding the collection (overrides DOC_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Collection name inside the bucket (overrides DOC_STORE_COLLECTION)
    #[arg(long)]
    pub collection: Option<String>,

    /// Storage backend (overrides DOC_STORE_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// Create the bucket and collection when they are missing
    #[arg(long)]
    pub create_missing: bool,

    /// Storage region (overrides AWS_REGION)
    #[arg(long)]
    pub region: Option<String>,

    /// Access key id (overrides AWS_ACCESS_KEY_ID)
    #[arg(long)]
    pub access_key_id: Option<String>,

    /// Secret access key (overrides AWS_SECRET_ACCESS_KEY)
    #[arg(long)]
    pub secret_access_key: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO server (overrides AWS_ENDPOINT_URL)
    #[arg(long)]
    pub endpoint: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_args(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed CLI args over values supplied by `lookup`.
    pub fn from_args<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Environment fallback ---
        let env_host = lookup("DOC_STORE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = match lookup("DOC_STORE_PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing DOC_STORE_PORT value `{}`", value))?,
            None => 3000,
        };
        let env_backend = match lookup("DOC_STORE_BACKEND") {
            Some(value) => Backend::from_str(&value, true)
                .map_err(|err| anyhow::anyhow!(err))
                .with_context(|| format!("parsing DOC_STORE_BACKEND value `{}`", value))?,
            None => Backend::S3,
        };
        let env_create = lookup("DOC_STORE_CREATE_MISSING")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(false);

        // --- Merge ---
        let bucket = args
            .bucket
            .or_else(|| lookup("DOC_STORE_BUCKET"))
            .context("a bucket is required (--bucket or DOC_STORE_BUCKET)")?;
        let collection = args
            .collection
            .or_else(|| lookup("DOC_STORE_COLLECTION"))
            .context("a collection is required (--collection or DOC_STORE_COLLECTION)")?;

        let backend = args.backend.unwrap_or(env_backend);
        // A fresh in-memory store never has the bucket, so it is always created.
        let policy = if args.create_missing || env_create || backend == Backend::Memory {
            InitPolicy::AutoCreate
        } else {
            InitPolicy::Strict
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            bucket,
            collection,
            backend,
            policy,
            storage: StorageOverrides {
                region: args.region,
                access_key_id: args.access_key_id,
                secret_access_key: args.secret_access_key,
                endpoint: args.endpoint,
                ..StorageOverrides::default()
            },
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
