use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::config::env::{self, EnvKey};
use crate::modules::jobs::model::JobType;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid worker URL in {var}: {source}")]
    InvalidWorkerUrl {
        var: &'static str,
        source: url::ParseError,
    },

    #[error(
        "WORKER_API_KEY is not set; running without a worker credential is only \
         permitted with APP_ENV=development"
    )]
    WorkerKeyRequired,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn from_env() -> Self {
        match env::get_opt(EnvKey::AppEnv).as_deref() {
            Some("development") | Some("dev") | None => AppEnv::Development,
            Some(_) => AppEnv::Production,
        }
    }
}

/// Static table mapping each job type to the base URL of the worker service
/// that executes it. Read-only after startup.
#[derive(Clone, Debug)]
pub struct WorkerEndpoints {
    map: HashMap<JobType, Url>,
}

impl WorkerEndpoints {
    const VARS: [(JobType, EnvKey, &'static str); 8] = [
        (JobType::VideoDownload, EnvKey::VideoDownloaderUrl, "http://localhost:8000"),
        (JobType::VoiceClone, EnvKey::VoiceClonerUrl, "http://localhost:8001"),
        (JobType::ClipEdit, EnvKey::VideoEditorUrl, "http://localhost:8002"),
        (JobType::FaceTransform, EnvKey::FaceTransformerUrl, "http://localhost:8003"),
        (JobType::LipSync, EnvKey::LipSyncUrl, "http://localhost:8004"),
        (JobType::SubtitleGenerate, EnvKey::SubtitleGeneratorUrl, "http://localhost:8005"),
        (JobType::BackgroundReplace, EnvKey::BackgroundReplacerUrl, "http://localhost:8006"),
        (JobType::Render, EnvKey::VideoRendererUrl, "http://localhost:8007"),
    ];

    /// In development every type falls back to a localhost default; in
    /// production an unset variable leaves the type without an endpoint, and
    /// dispatching such a job is a permanent failure.
    pub fn from_env(app_env: AppEnv) -> Result<Self, ConfigError> {
        let mut map = HashMap::new();
        for (job_type, key, default) in Self::VARS {
            let var = key.as_str();
            let raw = match env::get_opt(key) {
                Some(v) => v,
                None if app_env == AppEnv::Development => default.to_string(),
                None => continue,
            };
            let url = Url::parse(&raw)
                .map_err(|source| ConfigError::InvalidWorkerUrl { var, source })?;
            map.insert(job_type, url);
        }
        Ok(Self { map })
    }

    pub fn from_map(map: HashMap<JobType, Url>) -> Self {
        Self { map }
    }

    pub fn url_for(&self, job_type: JobType) -> Option<&Url> {
        self.map.get(&job_type)
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server_port: u16,
    pub app_env: AppEnv,
    pub jwt_secret: String,
    /// Shared static credential workers present on status callbacks and the
    /// dispatcher sends on `/execute`. `None` disables the check, which is
    /// only allowed in development.
    pub worker_api_key: Option<String>,
    pub database_url: Option<String>,
    pub amqp_url: Option<String>,
    pub dispatch_concurrency: usize,
    pub dispatch_max_attempts: u32,
    pub dispatch_backoff: Duration,
    pub worker_request_timeout: Duration,
    pub worker_endpoints: WorkerEndpoints,
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        let app_env = AppEnv::from_env();

        let jwt_secret = env::get(EnvKey::JwtSecret)
            .map_err(|_| ConfigError::MissingVar(EnvKey::JwtSecret.as_str()))?;

        let worker_api_key = env::get_opt(EnvKey::WorkerApiKey);
        if worker_api_key.is_none() && app_env != AppEnv::Development {
            return Err(ConfigError::WorkerKeyRequired);
        }

        Ok(Self {
            server_port: env::get_parsed(EnvKey::ServerPort, 3000),
            app_env,
            jwt_secret,
            worker_api_key,
            database_url: env::get_opt(EnvKey::DatabaseUrl),
            amqp_url: env::get_opt(EnvKey::AmqpUrl),
            dispatch_concurrency: env::get_parsed(EnvKey::DispatchConcurrency, 5),
            dispatch_max_attempts: env::get_parsed(EnvKey::DispatchMaxAttempts, 3),
            dispatch_backoff: Duration::from_millis(env::get_parsed(
                EnvKey::DispatchBackoffMs,
                2000,
            )),
            worker_request_timeout: Duration::from_secs(env::get_parsed(
                EnvKey::WorkerRequestTimeoutSecs,
                30,
            )),
            worker_endpoints: WorkerEndpoints::from_env(app_env)?,
        })
    }
}
