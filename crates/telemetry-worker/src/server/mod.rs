use std::{io::ErrorKind, sync::Arc};

use oshub_analytics::{AnalyticsService, create_analytics_service};
use oshub_config::{Settings, config};
use oshub_database::{DatabaseDocs, DatabaseInfoDocs};
use oshub_result::errors::{BoxedErr, ErrorType, SimpleError};
use tokio::spawn;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt};

use crate::{
  controller::{TelemetryWorkerController, TelemetryWorkerControllerArgs},
  server::observability::{MetricsCollector, MetricsCollectorArgs},
};

pub mod observability;

pub struct TelemetryWorkerServer {
  pub(super) docs_db: Arc<DatabaseDocs>,
  pub(super) segment: Arc<dyn AnalyticsService>,
  pub(super) config: Arc<Settings>,
  pub(super) metrics: Arc<MetricsCollector>,
}

impl TelemetryWorkerServer {
  pub async fn new() -> Result<TelemetryWorkerServer, BoxedErr> {
    let se = |err: BoxedErr, typ: ErrorType, msg: &str| {
      return SimpleError { err, err_type: typ, message: msg.to_string() };
    };

    TelemetryWorkerServer::setup_logging();
    let config = config().await;

    // Initialize observability
    let metrics = MetricsCollector::new(MetricsCollectorArgs { config: Arc::new(config.clone()) })?;

    // The analytics client comes first: a missing write key must abort startup
    // before any consumer is created, so no partial calls can be attempted
    let segment = create_analytics_service(&config)?;

    let docs_db = DatabaseInfoDocs::Auto.connect().await.map_err(|err| {
      se(Box::new(std::io::Error::new(ErrorKind::NotConnected, err)), ErrorType::Connection, "")
    })?;

    let server = TelemetryWorkerServer {
      docs_db: Arc::new(docs_db),
      segment,
      config: Arc::new(config),
      metrics: Arc::new(metrics),
    };

    Ok(server)
  }

  /// run the consumers until shutdown
  pub async fn run(&self) -> Result<(), BoxedErr> {
    let ctr_args = TelemetryWorkerControllerArgs {
      docs_db: self.docs_db.clone(),
      segment: self.segment.clone(),
      config: self.config.clone(),
      metrics: self.metrics.clone(),
    };

    let metrics_clone = self.metrics.clone();
    spawn(async move {
      if let Err(e) = metrics_clone.run().await {
        error!("Metrics server failed: {:?}", e);
      }
    });

    let controller = TelemetryWorkerController::new(ctr_args)?;
    controller.run().await?; // this will block

    Ok(())
  }

  fn setup_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber =
      tracing_subscriber::registry().with(env_filter).with(tracing_subscriber::fmt::layer());
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
  }
}
