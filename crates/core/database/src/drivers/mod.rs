use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub use self::firestore::*;
pub use self::reference::*;

mod firestore;
mod reference;

use oshub_config::config;

/// Database information to use to create a client
pub enum DatabaseInfoDocs {
  /// Auto-detect the database in use
  Auto,
  /// Use the mock database
  Reference,
  /// Connect to the Firestore REST surface
  Firestore { endpoint: String, project_id: String, database_id: String, auth_token: String },
}

/// Database
#[derive(Debug)]
pub enum DatabaseDocs {
  /// Mock database
  Reference(ReferenceDocsDb),
  /// Firestore document database
  Firestore(FirestoreDb),
}

// Generic helper type alias and function
type BoxedFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>>>>;

fn boxed<T>(f: impl Future<Output = Result<T, String>> + 'static) -> BoxedFuture<T> {
  Box::pin(f)
}

impl DatabaseInfoDocs {
  /// Create a database client from the given database information
  pub async fn connect(self) -> Result<DatabaseDocs, String> {
    let config = config().await;
    match self {
      DatabaseInfoDocs::Auto => {
        if std::env::var("TEST_DB_DOCS").is_ok() || config.docstore.project_id.is_empty() {
          boxed(DatabaseInfoDocs::Reference.connect()).await
        } else {
          boxed(
            DatabaseInfoDocs::Firestore {
              endpoint: config.docstore.endpoint,
              project_id: config.docstore.project_id,
              database_id: config.docstore.database_id,
              auth_token: config.docstore.auth_token,
            }
            .connect(),
          )
          .await
        }
      }
      DatabaseInfoDocs::Firestore { endpoint, project_id, database_id, auth_token } => {
        let http = reqwest::Client::builder()
          .timeout(Duration::from_secs(10))
          .connect_timeout(Duration::from_secs(3))
          .build()
          .map_err(|e| format!("Failed to create document store http client: {}", e))?;

        Ok(DatabaseDocs::Firestore(FirestoreDb {
          http,
          endpoint,
          project_id,
          database_id,
          auth_token,
        }))
      }
      DatabaseInfoDocs::Reference => Ok(DatabaseDocs::Reference(Default::default())),
    }
  }
}
