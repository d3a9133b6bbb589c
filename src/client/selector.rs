use std::collections::HashMap;
use std::hash::Hasher;

use twox_hash::XxHash;

use errors::{ErrorKind, Result};
use protocol::{PartitionId, TopicMetadata};

/// Picks the partition a keyless or keyed record lands on.
pub trait PartitionSelector {
    fn select(&mut self, topic: &TopicMetadata, key: Option<&[u8]>) -> Result<PartitionId>;
}

/// Keyless records round-robin across partitions with a live leader; keyed
/// records hash the key and reduce modulo the partition count, so a key
/// sticks to its partition as long as the topic layout is stable.
pub struct DefaultPartitionSelector {
    round_robin: HashMap<String, usize>,
}

impl DefaultPartitionSelector {
    pub fn new() -> Self {
        DefaultPartitionSelector { round_robin: HashMap::new() }
    }
}

impl Default for DefaultPartitionSelector {
    fn default() -> Self {
        DefaultPartitionSelector::new()
    }
}

impl PartitionSelector for DefaultPartitionSelector {
    fn select(&mut self, topic: &TopicMetadata, key: Option<&[u8]>) -> Result<PartitionId> {
        let partitions = topic.sorted_partitions();

        if partitions.is_empty() {
            bail!(ErrorKind::CachedMetadata(topic.topic_name.clone(), None));
        }

        match key {
            Some(key) if !key.is_empty() => {
                let mut hasher = XxHash::with_seed(0);

                hasher.write(key);

                let index = (hasher.finish() % partitions.len() as u64) as usize;

                Ok(partitions[index].partition_id)
            }
            _ => {
                let candidates: Vec<PartitionId> = partitions
                    .iter()
                    .filter(|partition| partition.leader >= 0)
                    .map(|partition| partition.partition_id)
                    .collect();

                if candidates.is_empty() {
                    bail!(ErrorKind::CachedMetadata(topic.topic_name.clone(), None));
                }

                let counter = self.round_robin
                    .entry(topic.topic_name.clone())
                    .or_insert(0);
                let index = *counter % candidates.len();

                *counter = counter.wrapping_add(1);

                Ok(candidates[index])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::PartitionMetadata;

    fn topic(leaders: &[i32]) -> TopicMetadata {
        TopicMetadata {
            error_code: 0,
            topic_name: "topic".to_owned(),
            partitions: leaders
                .iter()
                .enumerate()
                .map(|(id, leader)| {
                         PartitionMetadata {
                             error_code: 0,
                             partition_id: id as PartitionId,
                             leader: *leader,
                             replicas: vec![],
                             isr: vec![],
                         }
                     })
                .collect(),
        }
    }

    #[test]
    fn test_round_robin_skips_leaderless_partitions() {
        let mut selector = DefaultPartitionSelector::new();
        let topic = topic(&[0, -1, 1]);

        let picked: Vec<PartitionId> = (0..4)
            .map(|_| selector.select(&topic, None).unwrap())
            .collect();

        assert_eq!(picked, vec![0, 2, 0, 2]);
    }

    #[test]
    fn test_keyed_records_stick() {
        let mut selector = DefaultPartitionSelector::new();
        let topic = topic(&[0, 1, 2, 3]);

        let first = selector.select(&topic, Some(b"some-key")).unwrap();

        for _ in 0..4 {
            assert_eq!(selector.select(&topic, Some(b"some-key")).unwrap(), first);
        }

        // an empty key falls back to round-robin
        let a = selector.select(&topic, Some(b"")).unwrap();
        let b = selector.select(&topic, Some(b"")).unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_no_usable_partition() {
        let mut selector = DefaultPartitionSelector::new();

        assert!(selector.select(&topic(&[]), None).is_err());
        assert!(selector.select(&topic(&[-1, -1]), None).is_err());
    }
}
