use std::env;
use std::str::FromStr;

pub enum EnvKey {
    ServerPort,
    AppEnv,
    JwtSecret,
    WorkerApiKey,
    DatabaseUrl,
    AmqpUrl,
    DispatchConcurrency,
    DispatchMaxAttempts,
    DispatchBackoffMs,
    WorkerRequestTimeoutSecs,
    VideoDownloaderUrl,
    VideoEditorUrl,
    FaceTransformerUrl,
    VoiceClonerUrl,
    LipSyncUrl,
    SubtitleGeneratorUrl,
    BackgroundReplacerUrl,
    VideoRendererUrl,
}

impl EnvKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvKey::ServerPort => "APP_PORT",
            EnvKey::AppEnv => "APP_ENV",
            EnvKey::JwtSecret => "JWT_SECRET",
            EnvKey::WorkerApiKey => "WORKER_API_KEY",
            EnvKey::DatabaseUrl => "DATABASE_URL",
            EnvKey::AmqpUrl => "AMQP_URL",
            EnvKey::DispatchConcurrency => "DISPATCH_CONCURRENCY",
            EnvKey::DispatchMaxAttempts => "DISPATCH_MAX_ATTEMPTS",
            EnvKey::DispatchBackoffMs => "DISPATCH_BACKOFF_MS",
            EnvKey::WorkerRequestTimeoutSecs => "WORKER_REQUEST_TIMEOUT_SECS",
            EnvKey::VideoDownloaderUrl => "VIDEO_DOWNLOADER_URL",
            EnvKey::VideoEditorUrl => "VIDEO_EDITOR_URL",
            EnvKey::FaceTransformerUrl => "FACE_TRANSFORMER_URL",
            EnvKey::VoiceClonerUrl => "VOICE_CLONER_URL",
            EnvKey::LipSyncUrl => "LIP_SYNC_URL",
            EnvKey::SubtitleGeneratorUrl => "SUBTITLE_GENERATOR_URL",
            EnvKey::BackgroundReplacerUrl => "BACKGROUND_REPLACER_URL",
            EnvKey::VideoRendererUrl => "VIDEO_RENDERER_URL",
        }
    }
}

pub fn get(key: EnvKey) -> Result<String, env::VarError> {
    env::var(key.as_str())
}

pub fn get_opt(key: EnvKey) -> Option<String> {
    env::var(key.as_str()).ok().filter(|v| !v.is_empty())
}

pub fn get_parsed<T: FromStr>(key: EnvKey, default: T) -> T {
    match get(key) {
        Ok(val) => val.parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}
