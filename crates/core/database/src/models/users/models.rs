use serde::{Deserialize, Serialize};

/// User document as stored in the "users" collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDocument {
  pub uid: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub github_login: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub is_project_maintainer: Option<bool>,
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_user_document_wire_casing() {
    let json = json!({
      "uid": "u1",
      "githubLogin": "alice",
      "email": "a@x.com"
    });

    let doc: UserDocument = serde_json::from_value(json).unwrap();
    assert_eq!(doc.uid, "u1");
    assert_eq!(doc.github_login.as_deref(), Some("alice"));
    assert_eq!(doc.email.as_deref(), Some("a@x.com"));
    assert_eq!(doc.is_project_maintainer, None);

    let out = serde_json::to_value(&doc).unwrap();
    assert!(out.get("githubLogin").is_some());
    assert!(out.get("isProjectMaintainer").is_none());
  }
}
