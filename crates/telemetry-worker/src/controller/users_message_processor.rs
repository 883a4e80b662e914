use std::io::{Error, ErrorKind};

use oshub_analytics::{AnalyticsService, Identify};
use oshub_result::errors::{BoxedErr, ErrorType, InternalError};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::{models::cdc::UserChangeMessage, server::observability::MetricsCollector};

/// Process a single change event on the "users" collection
///
/// Creates and updates both re-identify the user with the document's traits:
/// the identify call is unconditional on every change of the watched
/// collection, so a stale trait value is corrected by the next event even
/// when the watched field itself did not move.
pub async fn users_message_processor(
  payload: &str,
  segment: &dyn AnalyticsService,
  metrics: &MetricsCollector,
) -> Result<(), BoxedErr> {
  let ie = |err: BoxedErr, err_type: ErrorType, msg: &str| {
    let path = "telemetry-worker.controller.users_message_processor".into();
    return InternalError { err_type, temp: false, err, msg: msg.into(), path };
  };

  let message: UserChangeMessage = serde_json::from_str(payload).map_err(|err| {
    error!("Raw user change payload: {}", payload);
    let e = err.to_string();
    let msg = format!("failed to deserialize user change message: {}", e);
    Box::new(ie(Box::new(err), ErrorType::JsonUnmarshal, &msg))
  })?;

  // Skip resolved markers (changefeed heartbeat messages)
  if message.resolved.is_some() {
    return Ok(());
  }

  match (&message.after, &message.before) {
    // Create or Update: after exists
    (Some(after), before) => {
      let user_id = message
        .doc_id()
        .map(str::to_string)
        .or_else(|| after.uid.clone())
        .ok_or_else(|| {
          let err = Box::new(Error::new(ErrorKind::InvalidData, "missing_document_id"));
          Box::new(ie(err, ErrorType::MissingField, "user change message has no document id"))
        })?;

      let action = if before.is_some() { "updated" } else { "created" };
      info!("User document {}: userId={}", action, user_id);

      let mut traits = serde_json::Map::new();
      if let Some(github_login) = &after.github_login {
        traits.insert("githubLogin".to_string(), json!(github_login));
      }
      if let Some(email) = &after.email {
        traits.insert("email".to_string(), json!(email));
      }
      if let Some(is_project_maintainer) = after.is_project_maintainer {
        traits.insert("isProjectMaintainer".to_string(), json!(is_project_maintainer));
      }

      segment.identify(Identify { user_id, traits: Value::Object(traits) }).await?;
      metrics.record_analytics_call("identify");

      Ok(())
    }
    // Delete: the account deletion event already covers the teardown
    (None, Some(before)) => {
      debug!("User document deleted: uid={:?}, nothing to forward", before.uid);
      Ok(())
    }
    // Invalid: both None
    (None, None) => {
      let msg = "user change message has neither after nor before state";
      let err = Box::new(Error::new(ErrorKind::InvalidData, "invalid_change_message"));
      Err(Box::new(ie(err, ErrorType::InvalidData, msg)))
    }
  }
}
