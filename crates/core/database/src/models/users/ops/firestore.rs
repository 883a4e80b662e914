use async_trait::async_trait;
use oshub_result::errors::DBError;

use crate::{FirestoreDb, UserDocument, drivers};

use super::UsersRepository;

#[async_trait]
impl UsersRepository for FirestoreDb {
  async fn users_get_by_uid(&self, uid: &str) -> Result<UserDocument, DBError> {
    let fields = self.query_first_by_field("users", "uid", uid).await?;

    Ok(UserDocument {
      uid: drivers::string_field(&fields, "uid").unwrap_or_else(|| uid.to_string()),
      github_login: drivers::string_field(&fields, "githubLogin"),
      email: drivers::string_field(&fields, "email"),
      is_project_maintainer: drivers::bool_field(&fields, "isProjectMaintainer"),
    })
  }
}
