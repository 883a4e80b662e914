use oshub_analytics::{AnalyticsService, Group, Identify, Track, namespaced_event};
use oshub_result::errors::{BoxedErr, ErrorType, InternalError};
use serde_json::{Value, json};
use tracing::info;

use crate::{
  models::auth::{AuthEventKind, AuthEventMessage},
  server::observability::MetricsCollector,
};

/// Cohort every account is associated with on creation
pub const GROUP_ID: &str = "opensourcehub";

/// Process a single account lifecycle event
///
/// Every analytics call is awaited before the handler reports success, so a
/// redelivered event can never race a half-issued batch from a dying process.
pub async fn auth_message_processor(
  payload: &str,
  segment: &dyn AnalyticsService,
  metrics: &MetricsCollector,
) -> Result<(), BoxedErr> {
  let ie = |err: BoxedErr, msg: &str| {
    let path = "telemetry-worker.controller.auth_message_processor".into();
    let err_type = ErrorType::JsonUnmarshal;
    return InternalError { err_type, temp: false, err, msg: msg.into(), path };
  };

  let message: AuthEventMessage = serde_json::from_str(payload).map_err(|err| {
    let e = err.to_string();
    Box::new(ie(Box::new(err), &format!("failed to deserialize auth event: {}", e)))
  })?;

  match message.event {
    AuthEventKind::UserCreated => {
      info!("User created: uid={} email={:?}", message.uid, message.email);

      let mut traits = serde_json::Map::new();
      if let Some(email) = &message.email {
        traits.insert("email".to_string(), json!(email));
      }

      segment
        .identify(Identify { user_id: message.uid.clone(), traits: Value::Object(traits) })
        .await?;
      metrics.record_analytics_call("identify");

      segment
        .group(Group { user_id: message.uid.clone(), group_id: GROUP_ID.to_string() })
        .await?;
      metrics.record_analytics_call("group");

      segment
        .track(Track { user_id: message.uid.clone(), event: namespaced_event("User created") })
        .await?;
      metrics.record_analytics_call("track");
    }
    AuthEventKind::UserDeleted => {
      info!("User deleted: uid={}", message.uid);

      segment
        .track(Track { user_id: message.uid.clone(), event: namespaced_event("User deleted") })
        .await?;
      metrics.record_analytics_call("track");
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use oshub_analytics::{AnalyticsCall, ReferenceAnalyticsService};
  use oshub_config::Settings;
  use serde_json::json;

  use super::*;
  use crate::server::observability::MetricsCollectorArgs;

  fn metrics() -> MetricsCollector {
    MetricsCollector::new(MetricsCollectorArgs { config: Arc::new(Settings::default()) }).unwrap()
  }

  #[tokio::test]
  async fn test_user_created_emits_identify_group_track() {
    let segment = ReferenceAnalyticsService::default();
    let payload = json!({
      "event": "user.created",
      "uid": "u1",
      "email": "a@x.com"
    })
    .to_string();

    auth_message_processor(&payload, &segment, &metrics()).await.unwrap();

    let calls = segment.recorded().await;
    assert_eq!(calls.len(), 3);
    assert_eq!(
      calls[0],
      AnalyticsCall::Identify(Identify {
        user_id: "u1".to_string(),
        traits: json!({ "email": "a@x.com" }),
      })
    );
    assert_eq!(
      calls[1],
      AnalyticsCall::Group(Group {
        user_id: "u1".to_string(),
        group_id: "opensourcehub".to_string(),
      })
    );
    assert_eq!(
      calls[2],
      AnalyticsCall::Track(Track {
        user_id: "u1".to_string(),
        event: "OSH: User created".to_string(),
      })
    );
    // the prefix is applied exactly once, and there is exactly one track call
    assert_eq!(segment.track_events().await, vec!["OSH: User created".to_string()]);
  }

  #[tokio::test]
  async fn test_user_created_without_email_has_empty_traits() {
    let segment = ReferenceAnalyticsService::default();
    let payload = json!({ "event": "user.created", "uid": "u1" }).to_string();

    auth_message_processor(&payload, &segment, &metrics()).await.unwrap();

    let identify = segment.identify_calls().await;
    assert_eq!(identify.len(), 1);
    assert_eq!(identify[0].traits, json!({}));
  }

  #[tokio::test]
  async fn test_user_deleted_emits_exactly_one_track() {
    let segment = ReferenceAnalyticsService::default();
    let payload = json!({ "event": "user.deleted", "uid": "u1" }).to_string();

    auth_message_processor(&payload, &segment, &metrics()).await.unwrap();

    let calls = segment.recorded().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(
      calls[0],
      AnalyticsCall::Track(Track {
        user_id: "u1".to_string(),
        event: "OSH: User deleted".to_string(),
      })
    );
  }

  #[tokio::test]
  async fn test_malformed_payload_is_an_error() {
    let segment = ReferenceAnalyticsService::default();

    let result = auth_message_processor("not json", &segment, &metrics()).await;

    assert!(result.is_err());
    assert!(segment.recorded().await.is_empty());
  }
}
