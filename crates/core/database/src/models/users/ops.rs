mod firestore;
mod reference;

use async_trait::async_trait;
use oshub_result::errors::DBError;

use crate::{DatabaseDocs, UserDocument};

#[async_trait]
pub trait UsersRepository: Sync + Send {
  /// Point lookup of the user document carrying the given account id
  async fn users_get_by_uid(&self, uid: &str) -> Result<UserDocument, DBError>;
}

#[async_trait]
impl UsersRepository for DatabaseDocs {
  async fn users_get_by_uid(&self, uid: &str) -> Result<UserDocument, DBError> {
    match self {
      DatabaseDocs::Reference(db) => db.users_get_by_uid(uid).await,
      DatabaseDocs::Firestore(db) => db.users_get_by_uid(uid).await,
    }
  }
}
