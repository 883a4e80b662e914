use std::{
  collections::HashMap,
  sync::{Arc, atomic::AtomicBool},
};

use oshub_analytics::AnalyticsService;
use oshub_config::Settings;
use oshub_database::DatabaseDocs;
use oshub_result::errors::{BoxedErr, ErrorType, InternalError};
use rdkafka::{
  ClientConfig,
  consumer::{Consumer, StreamConsumer},
  producer::FutureProducer,
};
use tokio::{
  spawn,
  sync::{Mutex, Notify, Semaphore},
  task::JoinSet,
};
use tracing::error;

use crate::server::observability::MetricsCollector;

pub mod auth_message_processor;
mod commit_coordinator;
pub mod consumer;
mod consumer_shutdown;
pub mod profiles_message_processor;
mod shutdown;
pub mod users_message_processor;

use consumer::StreamRoute;

pub struct TelemetryWorkerControllerArgs {
  pub docs_db: Arc<DatabaseDocs>,
  pub segment: Arc<dyn AnalyticsService>,
  pub config: Arc<Settings>,
  pub metrics: Arc<MetricsCollector>,
}

pub struct TelemetryWorkerController {
  pub(super) docs_db: Arc<DatabaseDocs>,
  pub(super) segment: Arc<dyn AnalyticsService>,
  pub(super) config: Arc<Settings>,
  pub(super) metrics: Arc<MetricsCollector>,
  pub(super) consumers: Arc<Mutex<HashMap<String, Arc<StreamConsumer>>>>,
  pub(super) topic_to_consumer: Arc<Mutex<HashMap<String, String>>>,
  pub(super) producer: FutureProducer,
  pub(super) semaphore: Arc<Semaphore>,
  pub(super) join_set: Arc<Mutex<JoinSet<()>>>,
  pub(super) highest_offset: Arc<Mutex<HashMap<(String, i32), i64>>>,
  pub(super) task_accepting: Arc<AtomicBool>,
  pub(super) shutdown_notify: Arc<Notify>,
}

impl TelemetryWorkerController {
  pub fn new(args: TelemetryWorkerControllerArgs) -> Result<TelemetryWorkerController, BoxedErr> {
    let ie = |msg: &str, err: BoxedErr| {
      let path = "telemetry-worker.controller.new".into();
      InternalError { err_type: ErrorType::Connection, temp: false, err, msg: msg.into(), path }
    };

    let broker_addrs = args.config.kafka.brokers.join(",");

    let mut consumers = HashMap::new();
    let mut topic_to_consumer = HashMap::new();
    for route in StreamRoute::all(&args.config) {
      let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &broker_addrs)
        .set("group.id", "telemetry-worker-group")
        .set("auto.offset.reset", "earliest")
        .set("enable.auto.commit", "false")
        .create()
        .map_err(|e| {
          Box::new(ie(&format!("failed to create consumer for {}", route.name), Box::new(e)))
            as BoxedErr
        })?;

      consumer.subscribe(&[&route.topic]).map_err(|e| {
        Box::new(ie(&format!("failed to subscribe to topic {}", route.topic), Box::new(e)))
          as BoxedErr
      })?;

      topic_to_consumer.insert(route.topic.clone(), route.name.to_string());
      consumers.insert(route.name.to_string(), Arc::new(consumer));
    }

    let producer: FutureProducer = ClientConfig::new()
      .set("bootstrap.servers", &broker_addrs)
      .set("message.timeout.ms", "5000")
      .create()
      .map_err(|e| Box::new(ie("failed to create dlq producer", Box::new(e))) as BoxedErr)?;

    let max_in_flight = args.config.workers.max_concurrent_messages;

    let controller = TelemetryWorkerController {
      docs_db: args.docs_db,
      segment: args.segment,
      config: args.config,
      metrics: args.metrics,
      consumers: Arc::new(Mutex::new(consumers)),
      topic_to_consumer: Arc::new(Mutex::new(topic_to_consumer)),
      producer,
      semaphore: Arc::new(Semaphore::new(max_in_flight)),
      join_set: Arc::new(Mutex::new(JoinSet::new())),
      highest_offset: Arc::new(Mutex::new(HashMap::new())),
      task_accepting: Arc::new(AtomicBool::new(true)),
      shutdown_notify: Arc::new(Notify::new()),
    };

    Ok(controller)
  }

  // run the worker service
  pub async fn run(self) -> Result<(), BoxedErr> {
    let controller = Arc::new(self);

    controller.shutdown_listener();
    controller.periodic_commit();

    let mut handles = Vec::new();
    for route in StreamRoute::all(&controller.config) {
      let ctrl = controller.clone();
      handles.push(spawn(async move {
        ctrl.event_consumer(route).await;
      }));
    }

    for handle in handles {
      if let Err(err) = handle.await {
        error!("Consumer task panicked: {}", err);
      }
    }

    controller.consumer_shutdown().await;

    Ok(())
  }
}
