use serde_json::Value;

/// Change-feed envelope for the "users" collection
#[derive(Debug, Clone, serde::Deserialize)]
pub struct UserChangeMessage {
  /// The key (always the document id, which equals the owning account's uid)
  pub key: Vec<Value>,
  /// The after state of the document
  pub after: Option<UserSnapshot>,
  /// The before state of the document (for updates and deletes)
  pub before: Option<UserSnapshot>,
  /// Resolved timestamp (null for regular events)
  pub resolved: Option<String>,
}

impl UserChangeMessage {
  pub fn doc_id(&self) -> Option<&str> {
    self.key.first().and_then(|v| v.as_str())
  }
}

/// User document fields carried by the change feed
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub uid: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub github_login: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_project_maintainer: Option<bool>,
}

/// Change-feed envelope for the "profiles" collection
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ProfileChangeMessage {
  /// The key (always the profile document id)
  pub key: Vec<Value>,
  pub after: Option<ProfileSnapshot>,
  pub before: Option<ProfileSnapshot>,
  /// Resolved timestamp (null for regular events)
  pub resolved: Option<String>,
}

impl ProfileChangeMessage {
  pub fn doc_id(&self) -> Option<&str> {
    self.key.first().and_then(|v| v.as_str())
  }
}

/// Profile document fields carried by the change feed
#[derive(Debug, Clone, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSnapshot {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub user_id: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_project_maintainer: Option<bool>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub join_newsletter: Option<bool>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_user_change_message_deserialization() {
    let json = json!({
      "key": ["u1"],
      "after": { "uid": "u1", "githubLogin": "alice", "email": "a@x.com" },
      "before": null,
      "resolved": null
    });

    let msg: UserChangeMessage = serde_json::from_value(json).unwrap();
    assert_eq!(msg.doc_id(), Some("u1"));
    assert!(msg.before.is_none());
    let after = msg.after.unwrap();
    assert_eq!(after.github_login.as_deref(), Some("alice"));
    assert_eq!(after.is_project_maintainer, None);
  }

  #[test]
  fn test_profile_change_message_deserialization() {
    let json = json!({
      "key": ["p1"],
      "before": { "userId": "u1", "isProjectMaintainer": false, "joinNewsletter": false },
      "after": { "userId": "u1", "isProjectMaintainer": true, "joinNewsletter": false },
      "resolved": null
    });

    let msg: ProfileChangeMessage = serde_json::from_value(json).unwrap();
    assert_eq!(msg.doc_id(), Some("p1"));
    assert_eq!(msg.after.unwrap().is_project_maintainer, Some(true));
    assert_eq!(msg.before.unwrap().user_id.as_deref(), Some("u1"));
  }

  #[test]
  fn test_resolved_marker() {
    let json = json!({
      "key": [],
      "after": null,
      "before": null,
      "resolved": "1758000000000000000.0000000000"
    });

    let msg: UserChangeMessage = serde_json::from_value(json).unwrap();
    assert!(msg.resolved.is_some());
    assert_eq!(msg.doc_id(), None);
  }
}
