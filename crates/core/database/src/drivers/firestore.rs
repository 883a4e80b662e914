use std::io::{Error, ErrorKind};

use oshub_result::errors::{BoxedErr, DBError, ErrorType};
use reqwest::Client;
use serde_json::{Value, json};

/// Firestore REST client scoped to one project database
#[derive(Debug, Clone)]
pub struct FirestoreDb {
  pub(crate) http: Client,
  pub(crate) endpoint: String,
  pub(crate) project_id: String,
  pub(crate) database_id: String,
  pub(crate) auth_token: String,
}

impl FirestoreDb {
  fn documents_url(&self) -> String {
    format!(
      "{}/projects/{}/databases/{}/documents",
      self.endpoint, self.project_id, self.database_id
    )
  }

  /// Run a single-field equality query against a collection and return the
  /// fields of the first matching document
  pub(crate) async fn query_first_by_field(
    &self,
    collection: &str,
    field: &str,
    value: &str,
  ) -> Result<Value, DBError> {
    let de = |err: BoxedErr, err_type: ErrorType, msg: &str| {
      return DBError::new("database.drivers.firestore", err, err_type, msg);
    };

    let url = format!("{}:runQuery", self.documents_url());
    let body = json!({
      "structuredQuery": {
        "from": [{ "collectionId": collection }],
        "where": {
          "fieldFilter": {
            "field": { "fieldPath": field },
            "op": "EQUAL",
            "value": { "stringValue": value }
          }
        },
        "limit": 1
      }
    });

    let mut req = self.http.post(&url).json(&body);
    if !self.auth_token.is_empty() {
      req = req.bearer_auth(&self.auth_token);
    }

    let resp = req
      .send()
      .await
      .map_err(|e| de(Box::new(e), ErrorType::HttpRequestError, "failed to query document store"))?;

    let status = resp.status();
    if !status.is_success() {
      let txt = resp.text().await.unwrap_or_default();
      let err = Box::new(Error::new(ErrorKind::Other, "http_response_error"));
      let msg = &format!("document store returned error: status={}, body={}", status, txt);
      return Err(de(err, ErrorType::HttpResponseError, msg));
    }

    let results: Vec<Value> = resp.json().await.map_err(|err| {
      de(Box::new(err), ErrorType::JsonUnmarshal, "failed to parse document store response")
    })?;

    // runQuery streams one element per document; an empty read carries only a
    // readTime marker
    for result in results {
      if let Some(fields) = result.get("document").and_then(|d| d.get("fields")) {
        return Ok(fields.clone());
      }
    }

    let err = Box::new(Error::new(ErrorKind::NotFound, "no_matching_document"));
    let msg = format!("no document in {} with {} = {}", collection, field, value);
    Err(de(err, ErrorType::NotFound, &msg))
  }
}

/// Decode a Firestore typed string value
pub(crate) fn string_field(fields: &Value, name: &str) -> Option<String> {
  fields
    .get(name)
    .and_then(|v| v.get("stringValue"))
    .and_then(|v| v.as_str())
    .map(|s| s.to_string())
}

/// Decode a Firestore typed boolean value
pub(crate) fn bool_field(fields: &Value, name: &str) -> Option<bool> {
  fields.get(name).and_then(|v| v.get("booleanValue")).and_then(|v| v.as_bool())
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn test_typed_value_decoding() {
    let fields = json!({
      "uid": { "stringValue": "u1" },
      "githubLogin": { "stringValue": "alice" },
      "isProjectMaintainer": { "booleanValue": true }
    });

    assert_eq!(string_field(&fields, "uid").as_deref(), Some("u1"));
    assert_eq!(string_field(&fields, "githubLogin").as_deref(), Some("alice"));
    assert_eq!(bool_field(&fields, "isProjectMaintainer"), Some(true));
    assert_eq!(string_field(&fields, "email"), None);
    assert_eq!(bool_field(&fields, "uid"), None);
  }
}
