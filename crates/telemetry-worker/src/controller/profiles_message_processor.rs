use std::io::{Error, ErrorKind};

use oshub_analytics::{AnalyticsService, Identify};
use oshub_database::UsersRepository;
use oshub_result::errors::{BoxedErr, ErrorType, InternalError};
use serde_json::{Value, json};
use tracing::{error, info};

use crate::{models::cdc::ProfileChangeMessage, server::observability::MetricsCollector};

/// Process a single change event on the "profiles" collection
///
/// Only updates where a watched field moved trigger any work: the user
/// document lookup and the identify call are both skipped otherwise. The
/// identify carries the snake_case watched-field trait keys, a distinct trait
/// set from the camelCase keys the users-collection handler writes.
pub async fn profiles_message_processor(
  payload: &str,
  segment: &dyn AnalyticsService,
  users: &dyn UsersRepository,
  metrics: &MetricsCollector,
) -> Result<(), BoxedErr> {
  let ie = |err: BoxedErr, err_type: ErrorType, msg: &str| {
    let path = "telemetry-worker.controller.profiles_message_processor".into();
    return InternalError { err_type, temp: false, err, msg: msg.into(), path };
  };

  let message: ProfileChangeMessage = serde_json::from_str(payload).map_err(|err| {
    error!("Raw profile change payload: {}", payload);
    let e = err.to_string();
    let msg = format!("failed to deserialize profile change message: {}", e);
    Box::new(ie(Box::new(err), ErrorType::JsonUnmarshal, &msg))
  })?;

  // Skip resolved markers (changefeed heartbeat messages)
  if message.resolved.is_some() {
    return Ok(());
  }

  // Only updates carry both snapshots; creates and deletes have no diff to watch
  let (Some(before), Some(after)) = (&message.before, &message.after) else {
    return Ok(());
  };

  let profile_id = message.doc_id().unwrap_or("<unknown>").to_string();

  // absent joinNewsletter reads as false, an absent maintainer flag does not
  // equal an explicit false
  let maintainer_changed = before.is_project_maintainer != after.is_project_maintainer;
  let newsletter_changed =
    before.join_newsletter.unwrap_or(false) != after.join_newsletter.unwrap_or(false);

  info!(
    "Profile updated: profileId={} userId={:?} maintainer_changed={} newsletter_changed={}",
    profile_id, after.user_id, maintainer_changed, newsletter_changed
  );

  if !maintainer_changed && !newsletter_changed {
    return Ok(());
  }

  let user_id = after.user_id.as_deref().ok_or_else(|| {
    let err = Box::new(Error::new(ErrorKind::InvalidData, "missing_user_id"));
    Box::new(ie(err, ErrorType::MissingField, "profile change message has no userId"))
  })?;

  let user = match users.users_get_by_uid(user_id).await {
    Ok(user) => user,
    Err(err) => {
      // A missing user document is an expected eventual-consistency race, so
      // the event completes without an analytics call instead of failing the
      // invocation and forcing a redelivery
      error!(
        "Failed to resolve user for profile update: profileId={} userId={} err={}",
        profile_id, user_id, err
      );
      metrics.record_lookup_failure();
      return Ok(());
    }
  };

  let mut traits = serde_json::Map::new();
  if let Some(github_login) = &user.github_login {
    traits.insert("githubLogin".to_string(), json!(github_login));
  }
  if let Some(email) = &user.email {
    traits.insert("email".to_string(), json!(email));
  }
  if let Some(is_project_maintainer) = after.is_project_maintainer {
    traits.insert("is_project_maintainer".to_string(), json!(is_project_maintainer));
  }
  traits
    .insert("send_me_osh_news".to_string(), json!(after.join_newsletter.unwrap_or(false)));

  segment
    .identify(Identify { user_id: user_id.to_string(), traits: Value::Object(traits) })
    .await?;
  metrics.record_analytics_call("identify");

  Ok(())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use oshub_analytics::ReferenceAnalyticsService;
  use oshub_config::Settings;
  use oshub_database::{ReferenceDocsDb, UserDocument};
  use serde_json::json;

  use super::*;
  use crate::server::observability::MetricsCollectorArgs;

  fn metrics() -> MetricsCollector {
    MetricsCollector::new(MetricsCollectorArgs { config: Arc::new(Settings::default()) }).unwrap()
  }

  async fn seeded_db() -> ReferenceDocsDb {
    let db = ReferenceDocsDb::default();
    db.seed_user(UserDocument {
      uid: "u1".to_string(),
      github_login: Some("alice".to_string()),
      email: Some("a@x.com".to_string()),
      is_project_maintainer: None,
    })
    .await;
    db
  }

  #[tokio::test]
  async fn test_maintainer_change_identifies_with_resolved_user() {
    let segment = ReferenceAnalyticsService::default();
    let db = seeded_db().await;
    let payload = json!({
      "key": ["p1"],
      "before": { "userId": "u1", "isProjectMaintainer": false, "joinNewsletter": false },
      "after": { "userId": "u1", "isProjectMaintainer": true, "joinNewsletter": false },
      "resolved": null
    })
    .to_string();

    profiles_message_processor(&payload, &segment, &db, &metrics()).await.unwrap();

    let identify = segment.identify_calls().await;
    assert_eq!(identify.len(), 1);
    assert_eq!(identify[0].user_id, "u1");
    assert_eq!(
      identify[0].traits,
      json!({
        "githubLogin": "alice",
        "email": "a@x.com",
        "is_project_maintainer": true,
        "send_me_osh_news": false
      })
    );
  }

  #[tokio::test]
  async fn test_newsletter_opt_in_from_absent_identifies() {
    let segment = ReferenceAnalyticsService::default();
    let db = seeded_db().await;
    let payload = json!({
      "key": ["p1"],
      "before": { "userId": "u1", "isProjectMaintainer": false },
      "after": { "userId": "u1", "isProjectMaintainer": false, "joinNewsletter": true },
      "resolved": null
    })
    .to_string();

    profiles_message_processor(&payload, &segment, &db, &metrics()).await.unwrap();

    let identify = segment.identify_calls().await;
    assert_eq!(identify.len(), 1);
    assert_eq!(identify[0].traits["send_me_osh_news"], json!(true));
  }

  #[tokio::test]
  async fn test_unchanged_watched_fields_skip_lookup_and_calls() {
    let segment = ReferenceAnalyticsService::default();
    let db = seeded_db().await;
    let payload = json!({
      "key": ["p1"],
      "before": { "userId": "u1", "isProjectMaintainer": true, "joinNewsletter": true },
      "after": { "userId": "u1", "isProjectMaintainer": true, "joinNewsletter": true },
      "resolved": null
    })
    .to_string();

    profiles_message_processor(&payload, &segment, &db, &metrics()).await.unwrap();

    assert_eq!(db.lookup_count(), 0);
    assert!(segment.recorded().await.is_empty());
  }

  #[tokio::test]
  async fn test_absent_and_false_newsletter_are_equivalent() {
    let segment = ReferenceAnalyticsService::default();
    let db = seeded_db().await;
    let payload = json!({
      "key": ["p1"],
      "before": { "userId": "u1", "isProjectMaintainer": true },
      "after": { "userId": "u1", "isProjectMaintainer": true, "joinNewsletter": false },
      "resolved": null
    })
    .to_string();

    profiles_message_processor(&payload, &segment, &db, &metrics()).await.unwrap();

    assert_eq!(db.lookup_count(), 0);
    assert!(segment.recorded().await.is_empty());
  }

  #[tokio::test]
  async fn test_lookup_miss_recovers_without_calls() {
    let segment = ReferenceAnalyticsService::default();
    let db = ReferenceDocsDb::default();
    let payload = json!({
      "key": ["p1"],
      "before": { "userId": "u-missing", "isProjectMaintainer": false },
      "after": { "userId": "u-missing", "isProjectMaintainer": true },
      "resolved": null
    })
    .to_string();

    let result = profiles_message_processor(&payload, &segment, &db, &metrics()).await;

    assert!(result.is_ok());
    assert_eq!(db.lookup_count(), 1);
    assert!(segment.recorded().await.is_empty());
  }

  #[tokio::test]
  async fn test_create_event_is_a_no_op() {
    let segment = ReferenceAnalyticsService::default();
    let db = seeded_db().await;
    let payload = json!({
      "key": ["p1"],
      "before": null,
      "after": { "userId": "u1", "isProjectMaintainer": true, "joinNewsletter": true },
      "resolved": null
    })
    .to_string();

    profiles_message_processor(&payload, &segment, &db, &metrics()).await.unwrap();

    assert_eq!(db.lookup_count(), 0);
    assert!(segment.recorded().await.is_empty());
  }
}
