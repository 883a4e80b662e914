use std::time::Duration;
use std::{env, fs};

use cached::proc_macro::cached;
use futures_locks::RwLock;
use once_cell::sync::Lazy;
use serde::Deserialize;
use tracing::warn;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;

#[cfg(feature = "sentry")]
pub use sentry::{capture_error, capture_message, Level};

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Kafka {
  pub brokers: Vec<String>,
  pub username: Option<String>,
  pub password: Option<String>,
  pub sasl_mechanism: Option<String>,
  pub security_protocol: Option<String>,
}

impl Default for Kafka {
  fn default() -> Self {
    Self {
      brokers: vec!["localhost:9092".to_string()],
      username: None,
      password: None,
      sasl_mechanism: None,
      security_protocol: None,
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Topics {
  pub auth_user_events: String,
  pub auth_user_events_dlq: String,
  pub users_changes: String,
  pub users_changes_dlq: String,
  pub profiles_changes: String,
  pub profiles_changes_dlq: String,
}

impl Default for Topics {
  fn default() -> Self {
    Self {
      auth_user_events: "auth.user.events".to_string(),
      auth_user_events_dlq: "auth.user.events.dlq".to_string(),
      users_changes: "cdc.users.changes".to_string(),
      users_changes_dlq: "cdc.users.changes.dlq".to_string(),
      profiles_changes: "cdc.profiles.changes".to_string(),
      profiles_changes_dlq: "cdc.profiles.changes.dlq".to_string(),
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Segment {
  pub write_key: String,
  pub endpoint: String,
}

impl Default for Segment {
  fn default() -> Self {
    Self { write_key: String::new(), endpoint: "https://api.segment.io/v1".to_string() }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Docstore {
  pub endpoint: String,
  pub project_id: String,
  pub database_id: String,
  pub auth_token: String,
}

impl Default for Docstore {
  fn default() -> Self {
    Self {
      endpoint: "https://firestore.googleapis.com/v1".to_string(),
      project_id: String::new(),
      database_id: "(default)".to_string(),
      auth_token: String::new(),
    }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Hosts {
  pub telemetry_metrics: String,
}

impl Default for Hosts {
  fn default() -> Self {
    Self { telemetry_metrics: "0.0.0.0:9188".to_string() }
  }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Workers {
  pub max_concurrent_messages: usize,
}

impl Default for Workers {
  fn default() -> Self {
    Self { max_concurrent_messages: 16 }
  }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Sentry {
  pub telemetry: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Settings {
  pub kafka: Kafka,
  pub topics: Topics,
  pub segment: Segment,
  pub docstore: Docstore,
  pub hosts: Hosts,
  pub workers: Workers,
  pub sentry: Sentry,
  pub production: bool,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      kafka: Kafka::default(),
      topics: Topics::default(),
      segment: Segment::default(),
      docstore: Docstore::default(),
      hosts: Hosts::default(),
      workers: Workers::default(),
      sentry: Sentry::default(),
      production: false,
    }
  }
}

impl Settings {
  pub fn preflight_checks(&self) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber =
      tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());

    let _ = tracing::subscriber::set_default(subscriber);

    if self.kafka.brokers.is_empty() {
      warn!("No Kafka brokers specified! The worker will not receive any events.");
    }

    if self.docstore.project_id.is_empty() {
      warn!("No document store project specified! Profile lookups will fail.");
    }
  }
}

/// Configure logging and common Rust variables
#[cfg(feature = "sentry")]
pub async fn setup_logging(release: &'static str, dsn: String) -> Option<sentry::ClientInitGuard> {
  if dsn.is_empty() {
    None
  } else {
    Some(sentry::init((
      dsn,
      sentry::ClientOptions { release: Some(release.into()), ..Default::default() },
    )))
  }
}

#[cfg(feature = "sentry")]
#[macro_export]
macro_rules! configure {
  ($application: ident) => {
    let config = $crate::config().await;
    let _sentry = $crate::setup_logging(
      concat!(env!("CARGO_PKG_NAME"), "@", env!("CARGO_PKG_VERSION")),
      config.sentry.$application,
    )
    .await;
  };
}

/// Configuration builder
static CONFIG_BUILDER: Lazy<RwLock<Settings>> = Lazy::new(|| {
  RwLock::new({
    let env_mode = env::var("ENV").unwrap_or("dev".to_string());
    let path = format!("/oshub.{}.yaml", env_mode);
    let mut settings = Settings::default();

    if std::path::Path::new(&path).exists() {
      let settings_str = fs::read_to_string(path).expect("Should read config file");
      settings = serde_yaml::from_str(&settings_str).expect("Should deserialize config file");
    }
    settings
  })
});

pub async fn read() -> Settings {
  CONFIG_BUILDER.read().await.clone()
}

#[cached(time = 300)]
pub async fn config() -> Settings {
  let mut config = read().await;

  // the environment always wins for the write key
  if let Ok(write_key) = env::var("SEGMENT_WRITE_KEY") {
    if !write_key.is_empty() {
      config.segment.write_key = write_key;
    }
  }

  // auto-detect production nodes
  if config.docstore.endpoint.contains("https") {
    config.production = true;
  }

  config
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.segment.endpoint, "https://api.segment.io/v1");
    assert!(settings.segment.write_key.is_empty());
    assert_eq!(settings.topics.profiles_changes, "cdc.profiles.changes");
    assert_eq!(settings.workers.max_concurrent_messages, 16);
  }

  #[test]
  fn test_settings_from_yaml() {
    let yaml = r#"
kafka:
  brokers: ["broker-1:9092", "broker-2:9092"]
topics:
  users_changes: "cdc.users.changes.v2"
segment:
  write_key: "wk_test"
"#;
    let settings: Settings = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(settings.kafka.brokers.len(), 2);
    assert_eq!(settings.topics.users_changes, "cdc.users.changes.v2");
    assert_eq!(settings.segment.write_key, "wk_test");
  }
}
