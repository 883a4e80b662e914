use std::{
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
  },
};

use tokio::sync::Mutex;

use crate::UserDocument;

/// In-memory document store keyed by account id
#[derive(Default, Debug)]
pub struct ReferenceDocsDb {
  pub users: Arc<Mutex<HashMap<String, UserDocument>>>,
  pub(crate) lookups: Arc<AtomicUsize>,
}

impl ReferenceDocsDb {
  /// Insert a user document under its account id
  pub async fn seed_user(&self, doc: UserDocument) {
    self.users.lock().await.insert(doc.uid.clone(), doc);
  }

  /// Number of point lookups served so far
  pub fn lookup_count(&self) -> usize {
    self.lookups.load(Ordering::SeqCst)
  }
}
