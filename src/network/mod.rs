use std::borrow::Cow;
use std::fmt;

use protocol::PartitionId;

mod endpoint;
mod conn;

pub use self::endpoint::{Endpoint, KafkaConnector};
pub use self::conn::{KafkaConnection, SendRequest};

/// One shard of a topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TopicPartition<'a> {
    pub topic_name: Cow<'a, str>,
    pub partition: PartitionId,
}

impl<'a> TopicPartition<'a> {
    pub fn new<S: Into<Cow<'a, str>>>(topic_name: S, partition: PartitionId) -> Self {
        TopicPartition {
            topic_name: topic_name.into(),
            partition: partition,
        }
    }
}

impl<'a> fmt::Display for TopicPartition<'a> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}#{}", self.topic_name, self.partition)
    }
}
