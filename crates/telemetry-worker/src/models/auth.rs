use serde_json::Value;

/// Account lifecycle event from the identity system
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AuthEventMessage {
  pub event: AuthEventKind,
  pub uid: String,
  pub email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize)]
pub enum AuthEventKind {
  #[serde(rename = "user.created")]
  UserCreated,
  #[serde(rename = "user.deleted")]
  UserDeleted,
}

impl AuthEventMessage {
  pub fn from_json(value: &Value) -> Result<Self, serde_json::Error> {
    serde_json::from_value(value.clone())
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_auth_event_message_deserialization() {
    let json = json!({
      "event": "user.created",
      "uid": "u1",
      "email": "a@x.com"
    });

    let msg = AuthEventMessage::from_json(&json).unwrap();
    assert_eq!(msg.event, AuthEventKind::UserCreated);
    assert_eq!(msg.uid, "u1");
    assert_eq!(msg.email.as_deref(), Some("a@x.com"));
  }

  #[test]
  fn test_auth_event_message_without_email() {
    let json = json!({
      "event": "user.deleted",
      "uid": "u1"
    });

    let msg = AuthEventMessage::from_json(&json).unwrap();
    assert_eq!(msg.event, AuthEventKind::UserDeleted);
    assert_eq!(msg.email, None);
  }

  #[test]
  fn test_auth_event_message_unknown_kind() {
    let json = json!({
      "event": "user.suspended",
      "uid": "u1"
    });

    assert!(AuthEventMessage::from_json(&json).is_err());
  }
}
