//! Configuration management for the CLI
//!
//! Settings are layered: built-in defaults, then the config file, then
//! `KUBE_RECOMMEND_*` environment variables, then command-line flags.

use anyhow::{Context, Result};
use recommend_lib::{
    RecommendationConfig, DEFAULT_COUNT_DAYS, DEFAULT_HTTP_TIMEOUT, DEFAULT_LIMIT_MULTIPLIER,
    DEFAULT_WORKER_COUNT,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "KUBE_RECOMMEND";

/// One configuration layer; unset fields fall through to the layer below
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Settings {
    pub prometheus_url: Option<String>,
    pub namespace: Option<String>,
    pub memory_limit_multiplier: Option<f64>,
    pub count_days: Option<u32>,
    pub worker_count: Option<usize>,
    pub http_timeout_secs: Option<u64>,
    /// Directory the JSON report is written to
    pub output_dir: Option<PathBuf>,
}

impl Settings {
    /// Load the config file and environment layers.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, None)
    }

    /// Like [`Settings::load`], reading the environment from `env` when given
    pub fn load_from(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => {
                if let Some(default_path) = Self::default_path() {
                    builder = builder.add_source(config::File::from(default_path).required(false));
                }
            }
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("Failed to load configuration")?;

        config
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    /// `~/.config/kube-recommend/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs_next::home_dir().map(|home| {
            home.join(".config")
                .join("kube-recommend")
                .join("config.toml")
        })
    }

    /// Overlay `other` on top of `self`; set fields in `other` win
    pub fn merge(self, other: Settings) -> Settings {
        Settings {
            prometheus_url: other.prometheus_url.or(self.prometheus_url),
            namespace: other.namespace.or(self.namespace),
            memory_limit_multiplier: other
                .memory_limit_multiplier
                .or(self.memory_limit_multiplier),
            count_days: other.count_days.or(self.count_days),
            worker_count: other.worker_count.or(self.worker_count),
            http_timeout_secs: other.http_timeout_secs.or(self.http_timeout_secs),
            output_dir: other.output_dir.or(self.output_dir),
        }
    }

    /// Engine configuration with defaults filled in.
    ///
    /// URL and namespace have no default; they stay empty so validation
    /// reports them.
    pub fn recommendation_config(&self) -> RecommendationConfig {
        RecommendationConfig {
            namespace: self.namespace.clone().unwrap_or_default(),
            prometheus_url: self.prometheus_url.clone().unwrap_or_default(),
            memory_limit_multiplier: self
                .memory_limit_multiplier
                .unwrap_or(DEFAULT_LIMIT_MULTIPLIER),
            count_days: self.count_days.unwrap_or(DEFAULT_COUNT_DAYS),
            worker_count: self.worker_count.unwrap_or(DEFAULT_WORKER_COUNT),
            http_timeout: self
                .http_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
