use std::{
  io::{Error, ErrorKind},
  sync::Arc,
  time::Duration,
};

use async_trait::async_trait;
use oshub_config::Settings;
use oshub_result::errors::{BoxedErr, ErrorType, InternalError, SimpleError};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::{Group, Identify, Track};

/// Analytics service trait for abstraction
///
/// Every call is awaited to completion: implementations only return `Ok` once
/// the ingestion API acknowledged the call.
#[async_trait]
pub trait AnalyticsService: Send + Sync {
  async fn identify(&self, payload: Identify) -> Result<(), BoxedErr>;
  async fn group(&self, payload: Group) -> Result<(), BoxedErr>;
  async fn track(&self, payload: Track) -> Result<(), BoxedErr>;
}

/// Segment HTTP ingestion client
pub struct SegmentAnalyticsService {
  http: Client,
  endpoint: String,
  write_key: String,
}

impl SegmentAnalyticsService {
  pub fn new(config: &oshub_config::Segment) -> Result<Self, BoxedErr> {
    let http = Client::builder()
      .timeout(Duration::from_secs(10)) // Don't hang forever
      .connect_timeout(Duration::from_secs(3))
      .pool_idle_timeout(Duration::from_secs(90))
      .pool_max_idle_per_host(10) // Keep connections alive for reuse
      .build()
      .map_err(|err| {
        Box::new(SimpleError {
          message: "failed to create segment http client".to_string(),
          err_type: ErrorType::Connection,
          err: Box::new(err),
        }) as BoxedErr
      })?;

    Ok(SegmentAnalyticsService {
      http,
      endpoint: config.endpoint.clone(),
      write_key: config.write_key.clone(),
    })
  }

  /// Post one call to the ingestion API, write key as basic-auth username
  async fn send<T: Serialize>(&self, call: &str, payload: &T) -> Result<(), BoxedErr> {
    let ie = |err: BoxedErr, err_type: ErrorType, msg: &str| {
      let path = "analytics.client.send".into();
      return InternalError { err_type, temp: true, err, msg: msg.into(), path };
    };

    let url = format!("{}/{}", self.endpoint, call);

    let resp = self
      .http
      .post(&url)
      .basic_auth(&self.write_key, Some(""))
      .json(payload)
      .send()
      .await
      .map_err(|e| {
        Box::new(ie(Box::new(e), ErrorType::HttpRequestError, "failed to post analytics call"))
          as BoxedErr
      })?;

    let status = resp.status();
    if !status.is_success() {
      let txt = resp.text().await.unwrap_or_default();
      let err = Box::new(Error::new(ErrorKind::Other, "http_response_error"));
      let msg = &format!("segment returned error: status={}, body={}", status, txt);
      return Err(Box::new(ie(err, ErrorType::HttpResponseError, msg)));
    }

    Ok(())
  }
}

#[async_trait]
impl AnalyticsService for SegmentAnalyticsService {
  async fn identify(&self, payload: Identify) -> Result<(), BoxedErr> {
    debug!("Issuing identify call for user: {}", payload.user_id);
    self.send("identify", &payload).await
  }

  async fn group(&self, payload: Group) -> Result<(), BoxedErr> {
    debug!("Issuing group call for user: {}", payload.user_id);
    self.send("group", &payload).await
  }

  async fn track(&self, payload: Track) -> Result<(), BoxedErr> {
    debug!("Issuing track call for user: {} event: {}", payload.user_id, payload.event);
    self.send("track", &payload).await
  }
}

/// Analytics Service Factory
///
/// Constructed once at process start and injected into every handler. A
/// missing write key aborts startup before any consumer is created, so no
/// partial analytics calls can be attempted.
pub fn create_analytics_service(config: &Settings) -> Result<Arc<dyn AnalyticsService>, BoxedErr> {
  if config.segment.write_key.is_empty() {
    return Err(Box::new(SimpleError {
      message: "Segment write key not configured (config segment.write_key or SEGMENT_WRITE_KEY)"
        .to_string(),
      err_type: ErrorType::ConfigError,
      err: Box::new(Error::new(ErrorKind::InvalidInput, "missing_write_key")),
    }) as BoxedErr);
  }

  info!("Using Segment analytics service");
  Ok(Arc::new(SegmentAnalyticsService::new(&config.segment)?))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_factory_rejects_missing_write_key() {
    let settings = Settings::default();
    assert!(settings.segment.write_key.is_empty());

    let err = create_analytics_service(&settings).err().unwrap();
    assert!(format!("{}", err).contains("Configuration error"));
  }

  #[test]
  fn test_factory_accepts_configured_write_key() {
    let mut settings = Settings::default();
    settings.segment.write_key = "wk_test".to_string();

    assert!(create_analytics_service(&settings).is_ok());
  }
}
