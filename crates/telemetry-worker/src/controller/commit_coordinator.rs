use std::{collections::HashMap, mem::take, time::Duration};

use rdkafka::{
  Offset, TopicPartitionList,
  consumer::{CommitMode, Consumer},
};
use tokio::{spawn, time::interval};
use tracing::{debug, error};

use super::TelemetryWorkerController;

impl TelemetryWorkerController {
  /// Start periodic commit task for tracked offsets across all consumers
  pub fn periodic_commit(&self) {
    let highest = self.highest_offset.clone();
    let consumers = self.consumers.clone();
    let topic_to_consumer = self.topic_to_consumer.clone();
    let commit_interval_ms = 1000u64;

    spawn(async move {
      let mut ticker = interval(Duration::from_millis(commit_interval_ms));
      loop {
        ticker.tick().await;

        // Snapshot and clear the map
        let snapshot_map = {
          let mut guard = highest.lock().await;
          if guard.is_empty() {
            continue;
          }
          take(&mut *guard)
        };

        // Group offsets by topic so we can commit to the right consumer
        let mut offsets_by_topic: HashMap<String, Vec<(i32, i64)>> = HashMap::new();

        for ((topic, partition), offset) in snapshot_map.iter() {
          offsets_by_topic.entry(topic.clone()).or_default().push((*partition, *offset));
        }

        // Commit offsets for each topic using its own consumer
        let topic_map = topic_to_consumer.lock().await;
        let consumers_guard = consumers.lock().await;
        for (topic, offsets) in offsets_by_topic {
          let consumer = topic_map.get(&topic).and_then(|name| consumers_guard.get(name));
          let consumer = match consumer {
            Some(c) => c,
            None => {
              error!("No consumer registered for topic {} - dropping {} offsets", topic, offsets.len());
              continue;
            }
          };

          let mut tpl = TopicPartitionList::new();
          for (partition, offset) in offsets.iter() {
            let commit_off = Offset::from_raw(*offset + 1);
            let _ = tpl.add_partition_offset(&topic, *partition, commit_off);
          }

          if tpl.count() > 0 {
            match consumer.commit(&tpl, CommitMode::Async) {
              Ok(_) => {
                debug!("Periodic batched commit dispatched for {} to topic {}", tpl.count(), topic);
              }
              Err(err) => {
                error!("Periodic commit error for topic {}: {} - will retry", topic, err);
                // Re-merge the snapshot back into highest map, keeping max offsets
                let mut guard = highest.lock().await;
                for (partition, offset) in offsets.iter() {
                  let key = (topic.clone(), *partition);
                  let prev = guard.get(&key).copied().unwrap_or(-1);
                  if *offset > prev {
                    guard.insert(key, *offset);
                  }
                }
              }
            }
          }
        }
        drop(consumers_guard);
        drop(topic_map);
      }
    });
  }
}
