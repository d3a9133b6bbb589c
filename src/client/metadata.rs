use std::fmt;
use std::time::{Duration, Instant};

use protocol::TopicMetadata;

/// The cluster-assigned integer id of a broker.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BrokerRef(pub i32);

impl BrokerRef {
    pub fn index(&self) -> i32 {
        self.0
    }
}

impl From<i32> for BrokerRef {
    fn from(v: i32) -> Self {
        BrokerRef(v)
    }
}

impl fmt::Display for BrokerRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "broker #{}", self.0)
    }
}

/// A topic layout plus the wall-clock moment it was fetched.
#[derive(Clone, Debug)]
pub struct CachedTopic {
    pub metadata: TopicMetadata,
    pub fetched_at: Instant,
}

impl CachedTopic {
    pub fn new(metadata: TopicMetadata) -> Self {
        CachedTopic {
            metadata: metadata,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, expiration: Duration) -> bool {
        self.fetched_at.elapsed() < expiration
    }
}

/// A group-to-coordinator mapping, cached with the same freshness rule as
/// topic entries.
#[derive(Clone, Debug)]
pub struct CachedGroup {
    pub coordinator: BrokerRef,
    pub fetched_at: Instant,
}

impl CachedGroup {
    pub fn new(coordinator: BrokerRef) -> Self {
        CachedGroup {
            coordinator: coordinator,
            fetched_at: Instant::now(),
        }
    }

    pub fn is_fresh(&self, expiration: Duration) -> bool {
        self.fetched_at.elapsed() < expiration
    }
}
