use std::sync::Arc;

use async_trait::async_trait;
use oshub_result::errors::BoxedErr;
use tokio::sync::Mutex;

use crate::{AnalyticsService, Group, Identify, Track};

/// One recorded call, in issue order
#[derive(Debug, Clone, PartialEq)]
pub enum AnalyticsCall {
  Identify(Identify),
  Group(Group),
  Track(Track),
}

/// In-memory analytics service that records calls instead of sending them
#[derive(Default)]
pub struct ReferenceAnalyticsService {
  calls: Arc<Mutex<Vec<AnalyticsCall>>>,
}

impl ReferenceAnalyticsService {
  /// All calls recorded so far, in issue order
  pub async fn recorded(&self) -> Vec<AnalyticsCall> {
    self.calls.lock().await.clone()
  }

  pub async fn track_events(&self) -> Vec<String> {
    self
      .recorded()
      .await
      .into_iter()
      .filter_map(|call| match call {
        AnalyticsCall::Track(track) => Some(track.event),
        _ => None,
      })
      .collect()
  }

  pub async fn identify_calls(&self) -> Vec<Identify> {
    self
      .recorded()
      .await
      .into_iter()
      .filter_map(|call| match call {
        AnalyticsCall::Identify(identify) => Some(identify),
        _ => None,
      })
      .collect()
  }
}

#[async_trait]
impl AnalyticsService for ReferenceAnalyticsService {
  async fn identify(&self, payload: Identify) -> Result<(), BoxedErr> {
    self.calls.lock().await.push(AnalyticsCall::Identify(payload));
    Ok(())
  }

  async fn group(&self, payload: Group) -> Result<(), BoxedErr> {
    self.calls.lock().await.push(AnalyticsCall::Group(payload));
    Ok(())
  }

  async fn track(&self, payload: Track) -> Result<(), BoxedErr> {
    self.calls.lock().await.push(AnalyticsCall::Track(payload));
    Ok(())
  }
}
