use bytes::Bytes;

use protocol::{KafkaCode, Offset, PartitionId, Timestamp};

/// One record bound for a topic; the partition may be pinned by the caller
/// or left to the router's partition selector.
#[derive(Clone, Debug, PartialEq)]
pub struct ProducerRecord {
    pub topic_name: String,
    pub partition: Option<PartitionId>,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub timestamp: Option<Timestamp>,
}

impl ProducerRecord {
    pub fn from_value<S, V>(topic_name: S, value: V) -> Self
        where S: Into<String>,
              V: Into<Bytes>
    {
        ProducerRecord {
            topic_name: topic_name.into(),
            partition: None,
            key: None,
            value: Some(value.into()),
            timestamp: None,
        }
    }

    pub fn from_key_value<S, K, V>(topic_name: S, key: K, value: V) -> Self
        where S: Into<String>,
              K: Into<Bytes>,
              V: Into<Bytes>
    {
        ProducerRecord {
            topic_name: topic_name.into(),
            partition: None,
            key: Some(key.into()),
            value: Some(value.into()),
            timestamp: None,
        }
    }

    /// Pin the record to a partition, bypassing the selector; a nonexistent
    /// partition surfaces as a routing error, not a silent remap.
    pub fn with_partition(mut self, partition: PartitionId) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// What the broker said about one produced record.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordMetadata {
    pub topic_name: String,
    pub partition: PartitionId,
    /// Offset the broker assigned, or -1 for fire-and-forget sends.
    pub offset: Offset,
    pub error: Option<KafkaCode>,
    pub timestamp: Option<Timestamp>,
}
