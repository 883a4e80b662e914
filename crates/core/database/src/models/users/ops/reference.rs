use std::{
  io::{Error, ErrorKind},
  sync::atomic::Ordering,
};

use async_trait::async_trait;
use oshub_result::errors::{DBError, ErrorType};

use crate::{ReferenceDocsDb, UserDocument};

use super::UsersRepository;

#[async_trait]
impl UsersRepository for ReferenceDocsDb {
  async fn users_get_by_uid(&self, uid: &str) -> Result<UserDocument, DBError> {
    self.lookups.fetch_add(1, Ordering::SeqCst);

    let users = self.users.lock().await;
    users.get(uid).cloned().ok_or_else(|| {
      DBError::new(
        "database.drivers.reference",
        Box::new(Error::new(ErrorKind::NotFound, "no_matching_document")),
        ErrorType::NotFound,
        format!("no user document with uid = {}", uid),
      )
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_reference_lookup_hit_and_miss() {
    let db = ReferenceDocsDb::default();
    db.seed_user(UserDocument {
      uid: "u1".to_string(),
      github_login: Some("alice".to_string()),
      email: Some("a@x.com".to_string()),
      is_project_maintainer: None,
    })
    .await;

    let doc = db.users_get_by_uid("u1").await.unwrap();
    assert_eq!(doc.github_login.as_deref(), Some("alice"));

    let missing = db.users_get_by_uid("u2").await.unwrap_err();
    assert!(missing.is_not_found());
    assert_eq!(db.lookup_count(), 2);
  }
}
