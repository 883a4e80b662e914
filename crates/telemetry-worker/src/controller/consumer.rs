use std::{
  collections::HashMap,
  str::{Utf8Error, from_utf8},
  sync::atomic::Ordering,
  time::{Duration, Instant},
};

use base64::engine::{Engine as _, general_purpose};
use oshub_analytics::AnalyticsService;
use oshub_config::Settings;
use oshub_database::DatabaseDocs;
use oshub_result::errors::BoxedErr;
use rdkafka::{
  Message,
  consumer::{CommitMode, Consumer},
  producer::{FutureProducer, FutureRecord},
};
use serde_json::Value;
use tokio::{select, sync::Mutex, time::sleep};
use tracing::{debug, error, info};

use super::{
  TelemetryWorkerController, auth_message_processor::auth_message_processor,
  profiles_message_processor::profiles_message_processor,
  users_message_processor::users_message_processor,
};
use crate::server::observability::MetricsCollector;

/// Event stream consumed by the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
  AuthEvents,
  UsersChanges,
  ProfilesChanges,
}

impl StreamKind {
  /// Short label used in logs and metrics
  pub fn label(&self) -> &'static str {
    match self {
      StreamKind::AuthEvents => "auth",
      StreamKind::UsersChanges => "users",
      StreamKind::ProfilesChanges => "profiles",
    }
  }
}

/// Topic routing for one event stream
#[derive(Debug, Clone)]
pub struct StreamRoute {
  pub kind: StreamKind,
  pub name: &'static str,
  pub topic: String,
  pub dlq_topic: String,
}

impl StreamRoute {
  pub fn all(config: &Settings) -> Vec<StreamRoute> {
    vec![
      StreamRoute {
        kind: StreamKind::AuthEvents,
        name: "auth-events",
        topic: config.topics.auth_user_events.clone(),
        dlq_topic: config.topics.auth_user_events_dlq.clone(),
      },
      StreamRoute {
        kind: StreamKind::UsersChanges,
        name: "users-changes",
        topic: config.topics.users_changes.clone(),
        dlq_topic: config.topics.users_changes_dlq.clone(),
      },
      StreamRoute {
        kind: StreamKind::ProfilesChanges,
        name: "profiles-changes",
        topic: config.topics.profiles_changes.clone(),
        dlq_topic: config.topics.profiles_changes_dlq.clone(),
      },
    ]
  }
}

/// Route one payload to the processor for its stream
pub(super) async fn process_event(
  kind: StreamKind,
  payload: &str,
  segment: &dyn AnalyticsService,
  docs_db: &DatabaseDocs,
  metrics: &MetricsCollector,
) -> Result<(), BoxedErr> {
  match kind {
    StreamKind::AuthEvents => auth_message_processor(payload, segment, metrics).await,
    StreamKind::UsersChanges => users_message_processor(payload, segment, metrics).await,
    StreamKind::ProfilesChanges => {
      profiles_message_processor(payload, segment, docs_db, metrics).await
    }
  }
}

impl TelemetryWorkerController {
  /// Send a message to the DLQ when UTF-8 parsing fails
  async fn send_utf8_error_to_dlq(
    producer: &FutureProducer,
    dlq_topic: &str,
    payload_bytes: &[u8],
    utf8_err: Utf8Error,
  ) {
    let dlq_obj = serde_json::json!({
      "original_bytes_base64": general_purpose::STANDARD.encode(payload_bytes),
      "error": format!("invalid utf8: {}", utf8_err),
      "ts": chrono::Utc::now().timestamp_millis()
    });
    let _ = producer
      .send(
        FutureRecord::to(dlq_topic).payload(&dlq_obj.to_string()).key(""),
        Duration::from_secs(1),
      )
      .await;
  }

  /// Send a message to the DLQ when processing fails
  async fn send_processing_error_to_dlq(
    producer: &FutureProducer,
    dlq_topic: &str,
    payload_str: &str,
    error_msg: &str,
  ) {
    let original_json =
      serde_json::from_str::<Value>(payload_str).unwrap_or(Value::String(payload_str.to_string()));
    let dlq_obj = serde_json::json!({
      "original": original_json,
      "error": error_msg,
      "ts": chrono::Utc::now().timestamp_millis()
    });
    let _ = producer
      .send(
        FutureRecord::to(dlq_topic).payload(&dlq_obj.to_string()).key(""),
        Duration::from_secs(1),
      )
      .await;
  }

  /// Record an offset as processed in the highest_offset map
  async fn mark_offset_processed(
    highest_offset: &Mutex<HashMap<(String, i32), i64>>,
    topic: String,
    partition: i32,
    offset: i64,
  ) {
    let mut guard = highest_offset.lock().await;
    let key = (topic.clone(), partition);
    let prev = guard.get(&key).copied().unwrap_or(-1);
    if offset > prev {
      guard.insert(key, offset);
    }
    debug!("Marked processed offset {} for {}[{}]", offset, topic, partition);
  }

  /// Consumer loop for one event stream
  pub async fn event_consumer(&self, route: StreamRoute) {
    let segment = self.segment.clone();
    let docs_db = self.docs_db.clone();
    let metrics = self.metrics.clone();
    let highest_offset = self.highest_offset.clone();
    let semaphore = self.semaphore.clone();
    let join_set = self.join_set.clone();
    let consumers = self.consumers.clone();
    let producer = self.producer.clone();
    let task_accepting = self.task_accepting.clone();
    let shutdown_notify = self.shutdown_notify.clone();

    let kind = route.kind;
    let stream = kind.label();
    let dlq_topic = route.dlq_topic.clone();

    // Get this stream's consumer from the consumers map
    let consumer = {
      let consumers_guard = consumers.lock().await;
      consumers_guard.get(route.name).cloned()
    };

    let consumer = match consumer {
      Some(c) => c,
      None => {
        error!("Consumer '{}' not found in controllers map", route.name);
        return;
      }
    };

    loop {
      select! {
        _ = shutdown_notify.notified() => {
          info!("Shutdown requested - breaking {} consumption loop.", stream);
          break;
        }
        maybe_msg = consumer.recv() => {
          match maybe_msg {
            Err(e) => {
              error!("Kafka receive error on {}: {}", stream, e);
              sleep(Duration::from_secs(1)).await;
            }
            Ok(msg) => {
              // Extract and validate payload
              let payload_str = if let Some(payload_bytes) = msg.payload() {
                match from_utf8(payload_bytes) {
                  Ok(s) => Some(s.to_string()),
                  Err(utf8_err) => {
                    error!("Invalid UTF-8 in {} message: {}", stream, utf8_err);
                    Self::send_utf8_error_to_dlq(&producer, &dlq_topic, payload_bytes, utf8_err).await;
                    if let Err(e) = consumer.commit_message(&msg, CommitMode::Async) {
                      error!("Failed to commit offset for invalid-utf8 message: {}", e);
                    }
                    metrics.record_event_failed(stream);
                    continue;
                  }
                }
              } else {
                // Empty payload - skip and commit
                if let Err(e) = consumer.commit_message(&msg, CommitMode::Async) {
                  error!("Failed to commit offset for empty payload: {}", e);
                }
                continue;
              };

              let payload_str = payload_str.unwrap();

              // Extract message metadata
              let key_topic = msg.topic().to_string();
              let key_partition = msg.partition();
              let key_offset = msg.offset();

              if task_accepting.load(Ordering::SeqCst) {
                let semaphore_permit = semaphore.clone().acquire_owned();
                let highest = highest_offset.clone();
                let join = join_set.clone();
                let segment_clone = segment.clone();
                let docs_clone = docs_db.clone();
                let metrics_clone = metrics.clone();
                let dlq_clone = dlq_topic.clone();
                let prod = producer.clone();

                // Spawn task for async processing
                join.lock().await.spawn(async move {
                  let _permit = match semaphore_permit.await {
                    Ok(p) => p,
                    Err(_) => {
                      error!("Semaphore closed unexpectedly");
                      return;
                    }
                  };

                  let start = Instant::now();

                  let result = process_event(
                    kind,
                    &payload_str,
                    segment_clone.as_ref(),
                    docs_clone.as_ref(),
                    &metrics_clone,
                  )
                  .await;

                  match result {
                    Ok(()) => {
                      Self::mark_offset_processed(&highest, key_topic.clone(), key_partition, key_offset).await;
                      metrics_clone.record_event_processed(stream);
                    }
                    Err(err) => {
                      error!(
                        "Processing failed for {} message {}[{}] @ {}: {}",
                        stream, key_topic, key_partition, key_offset, err
                      );
                      Self::send_processing_error_to_dlq(&prod, &dlq_clone, &payload_str, &format!("{}", err)).await;
                      Self::mark_offset_processed(&highest, key_topic.clone(), key_partition, key_offset).await;
                      metrics_clone.record_event_failed(stream);
                    }
                  }

                  let elapsed = start.elapsed();
                  metrics_clone.observe_processing_duration(stream, elapsed.as_secs_f64());
                });
              } else {
                // Draining mode - process inline
                info!("Draining mode: processing {} message inline before shutdown.", stream);
                let start = Instant::now();

                let result = process_event(
                  kind,
                  &payload_str,
                  segment.as_ref(),
                  docs_db.as_ref(),
                  &metrics,
                )
                .await;

                match result {
                  Ok(()) => {
                    if let Err(e) = consumer.commit_message(&msg, CommitMode::Async) {
                      error!("Failed to commit offset during drain: {}", e);
                    }
                    metrics.record_event_processed(stream);
                  }
                  Err(err) => {
                    error!("Inline processing failed during drain: {}", err);
                    Self::send_processing_error_to_dlq(&producer, &dlq_topic, &payload_str, &format!("{}", err)).await;
                    if let Err(e) = consumer.commit_message(&msg, CommitMode::Async) {
                      error!("Failed to commit offset after DLQ during drain: {}", e);
                    }
                    metrics.record_event_failed(stream);
                  }
                }

                let elapsed = start.elapsed();
                metrics.observe_processing_duration(stream, elapsed.as_secs_f64());
              }
            }
          }
        }
      }
    }
  }
}
