use std::{
  convert::Infallible,
  io::{Error, ErrorKind},
  sync::Arc,
};

use http_body_util::Full;
use hyper::{
  Request, Response, StatusCode,
  body::{Bytes, Incoming},
  server::conn::http1::Builder,
  service::service_fn,
};
use hyper_util::rt::tokio::TokioIo;
use opentelemetry::{
  KeyValue,
  metrics::{Counter, Histogram, MeterProvider as _},
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use oshub_config::Settings;
use oshub_result::errors::{BoxedErr, ErrorType, InternalError};
use prometheus::{Registry, TextEncoder};
use tokio::{net::TcpListener, spawn};

/// OpenTelemetry + Prometheus metrics collector for the telemetry worker
pub struct MetricsCollector {
  config: Arc<Settings>,
  registry: Arc<Registry>,
  _provider: Arc<SdkMeterProvider>,

  events_processed: Counter<u64>,
  events_failed: Counter<u64>,
  analytics_calls: Counter<u64>,
  lookup_failures: Counter<u64>,
  processing_duration: Histogram<f64>,
}

impl std::fmt::Debug for MetricsCollector {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("MetricsCollector").finish()
  }
}

pub struct MetricsCollectorArgs {
  pub config: Arc<Settings>,
}

impl MetricsCollector {
  pub fn new(args: MetricsCollectorArgs) -> Result<Self, BoxedErr> {
    let ie = |msg: &str, err: BoxedErr| {
      let path = "telemetry-worker.server.observability".into();
      InternalError { err_type: ErrorType::InternalError, temp: false, err, msg: msg.into(), path }
    };

    // Initialize Prometheus registry
    let registry = Registry::new();

    // Create OpenTelemetry Prometheus exporter
    let exporter = opentelemetry_prometheus::exporter()
      .with_registry(registry.clone())
      .build()
      .map_err(|err| ie("failed to initialize prometheus exporter", Box::new(err)))?;

    // Create meter provider with Prometheus exporter
    let provider = SdkMeterProvider::builder().with_reader(exporter).build();
    let meter = provider.meter("telemetry-worker");
    let provider = Arc::new(provider);

    let events_processed = meter
      .u64_counter("telemetry_events_processed_total")
      .with_description("Events processed successfully, per stream")
      .build();
    let events_failed = meter
      .u64_counter("telemetry_events_failed_total")
      .with_description("Events that failed processing, per stream")
      .build();
    let analytics_calls = meter
      .u64_counter("telemetry_analytics_calls_total")
      .with_description("Analytics calls issued, per call kind")
      .build();
    let lookup_failures = meter
      .u64_counter("telemetry_profile_lookup_failures_total")
      .with_description("Profile updates dropped because the user lookup failed")
      .build();
    let processing_duration = meter
      .f64_histogram("telemetry_processing_duration_seconds")
      .with_description("Per-event processing duration, per stream")
      .build();

    Ok(MetricsCollector {
      registry: Arc::new(registry),
      config: args.config,
      _provider: provider,
      events_processed,
      events_failed,
      analytics_calls,
      lookup_failures,
      processing_duration,
    })
  }

  pub fn record_event_processed(&self, stream: &str) {
    self.events_processed.add(1, &[KeyValue::new("stream", stream.to_string())]);
  }

  pub fn record_event_failed(&self, stream: &str) {
    self.events_failed.add(1, &[KeyValue::new("stream", stream.to_string())]);
  }

  pub fn record_analytics_call(&self, kind: &str) {
    self.analytics_calls.add(1, &[KeyValue::new("call", kind.to_string())]);
  }

  pub fn record_lookup_failure(&self) {
    self.lookup_failures.add(1, &[]);
  }

  pub fn observe_processing_duration(&self, stream: &str, seconds: f64) {
    self.processing_duration.record(seconds, &[KeyValue::new("stream", stream.to_string())]);
  }

  /// Start HTTP server to expose metrics for Prometheus
  pub async fn run(&self) -> Result<(), BoxedErr> {
    let url = self.config.hosts.telemetry_metrics.clone();

    let listener = TcpListener::bind(&url).await?;
    let addr = listener.local_addr()?;
    tracing::info!("Telemetry worker metrics server listening on {}", addr);

    loop {
      let (socket, _) = listener.accept().await?;
      let io = TokioIo::new(socket);

      let connection_registry = self.registry.clone();

      spawn(async move {
        let svc = service_fn(move |req: Request<Incoming>| {
          let request_registry = connection_registry.clone();

          async move {
            let path = req.uri().path();
            match path {
              "/metrics" => {
                let encoder = TextEncoder::new();
                let body = encoder
                  .encode_to_string(&request_registry.gather())
                  .map_err(|e| Box::new(Error::new(ErrorKind::Other, e)))
                  .unwrap_or_default();
                Ok::<_, Infallible>(
                  Response::builder()
                    .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                    .body(Full::new(Bytes::from(body)))
                    .unwrap(),
                )
              }
              "/health" => Ok(Response::new(Full::new(Bytes::from_static(b"OK")))),
              _ => Ok(
                Response::builder()
                  .status(StatusCode::NOT_FOUND)
                  .body(Full::new(Bytes::from_static(b"Not Found")))
                  .unwrap(),
              ),
            }
          }
        });

        if let Err(err) = Builder::new().serve_connection(io, svc).await {
          tracing::error!("Error serving metrics: {}", err);
        }
      });
    }
  }
}
