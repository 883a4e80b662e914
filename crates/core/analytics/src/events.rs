use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Product tag prepended to every track event name, so events emitted by this
/// system stay distinguishable from other producers sharing the project
pub const EVENT_NAMESPACE: &str = "OSH";

/// Namespace a human-readable event label. Not idempotent: apply exactly once
/// per call site.
pub fn namespaced_event(name: &str) -> String {
  format!("{}: {}", EVENT_NAMESPACE, name)
}

/// Identify call: associate a user id with a set of traits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
  pub user_id: String,
  pub traits: Value,
}

/// Group call: associate a user with a cohort identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
  pub user_id: String,
  pub group_id: String,
}

/// Track call: record that a named event occurred for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
  pub user_id: String,
  pub event: String,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_namespaced_event() {
    assert_eq!(namespaced_event("User created"), "OSH: User created");
    assert_eq!(namespaced_event("User created"), namespaced_event("User created"));
  }

  #[test]
  fn test_namespaced_event_is_not_idempotent() {
    let once = namespaced_event("User deleted");
    assert_eq!(namespaced_event(&once), "OSH: OSH: User deleted");
  }

  #[test]
  fn test_payload_wire_casing() {
    let identify = Identify {
      user_id: "u1".to_string(),
      traits: json!({ "email": "a@x.com" }),
    };
    let out = serde_json::to_value(&identify).unwrap();
    assert_eq!(out["userId"], "u1");
    assert_eq!(out["traits"]["email"], "a@x.com");

    let group = Group { user_id: "u1".to_string(), group_id: "opensourcehub".to_string() };
    let out = serde_json::to_value(&group).unwrap();
    assert_eq!(out["groupId"], "opensourcehub");

    let track = Track { user_id: "u1".to_string(), event: namespaced_event("User created") };
    let out = serde_json::to_value(&track).unwrap();
    assert_eq!(out["event"], "OSH: User created");
  }
}
