use config::Config;
use lazy_static::lazy_static;
use serde::Deserialize;
use std::{env, path::Path};

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Timezone used to decide which calendar day "today" is for the
    /// scheduled digest run. Digest day boundaries themselves are UTC.
    pub timezone: chrono_tz::Tz,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DigestConfig {
    pub batch_size: usize,
    /// Cron expression for the daily digest job.
    pub schedule: String,
    /// Address the digest email is delivered to. Distribution fails with a
    /// configuration error when unset.
    pub recipient: Option<String>,
    pub auto_distribute: bool,
    /// When true (the historical behavior), emails whose batch failed to
    /// summarize are still marked summarized once the digest is persisted.
    pub mark_failed_batches: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub id: String,
    pub temperature: f64,
    pub batch_summary_max_tokens: u32,
    pub digest_max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub endpoint: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    settings: Settings,
    digest: DigestConfig,
    model: ModelConfig,
    api: ApiConfig,
    smtp: SmtpConfig,
}

#[derive(Debug)]
pub struct ServerConfig {
    pub settings: Settings,
    pub digest: DigestConfig,
    pub model: ModelConfig,
    pub api: ApiConfig,
    pub smtp: SmtpConfig,
}

impl std::fmt::Display for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Server Config:\n{:?}\n\nDigest: {:?}\n\nModel: {:?}\n\nSmtp: {:?}\n\nApi endpoint: {}",
            self.settings, self.digest, self.model, self.smtp, self.api.endpoint,
        )
    }
}

lazy_static! {
    pub static ref cfg: ServerConfig = {
        let root = env::var("APP_DIR").unwrap_or_else(|_| {
            let dir =
                env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR or APP_DIR is required");
            let dir = Path::new(&dir).parent().unwrap().display().to_string();
            format!("{}/config", dir)
        });
        let path = format!("{root}/config.toml");
        let cfg_file: ConfigFile = Config::builder()
            .add_source(config::File::with_name(&path))
            .build()
            .expect("config.toml is required")
            .try_deserialize()
            .expect("config.toml is invalid");

        let ConfigFile {
            settings,
            digest,
            model,
            api,
            smtp,
        } = cfg_file;

        assert!(
            digest.batch_size > 0,
            "config.toml is invalid: digest.batch_size must be > 0"
        );

        let api = ApiConfig {
            key: env::var("GENERATION_API_KEY").unwrap_or(api.key),
            ..api
        };

        ServerConfig {
            settings,
            digest,
            model,
            api,
            smtp,
        }
    };
}
