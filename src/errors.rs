use std::collections::HashSet;

use protocol::{ApiKey, KafkaCode, PartitionId};

error_chain!{
    foreign_links {
        IoError(::std::io::Error);
    }

    errors {
        /// Malformed bytes on the wire or an encode failure.
        CodecError(reason: &'static str) {
            description("codec error")
            display("codec error, {}", reason)
        }
        /// The underlying socket failed, the peer vanished or no broker was reachable.
        ConnectionError(reason: String) {
            description("connection error")
            display("connection error, {}", reason)
        }
        /// The topology cache has no usable route for the topic/partition or group.
        CachedMetadata(topic: String, partition: Option<PartitionId>) {
            description("cached metadata error")
            display("no cached route for topic `{}`, partition {:?}", topic, partition)
        }
        /// A broker returned a non-`None` error code.
        KafkaError(code: KafkaCode) {
            description("kafka error")
            display("kafka error, {:?}", code)
        }
        /// A broker returned a non-retryable error code; carries the endpoint it came from.
        RequestError(endpoint: String, code: KafkaCode) {
            description("request failed")
            display("request to {} failed, {:?}", endpoint, code)
        }
        /// The response ApiKey did not match the request that was sent.
        UnexpectedResponse(api_key: ApiKey) {
            description("unexpected response")
            display("unexpected response, api_key={}", api_key)
        }
        /// A per-operation deadline elapsed.
        RequestTimeout(reason: &'static str) {
            description("request timeout")
            display("request timed out, {}", reason)
        }
        Canceled(reason: &'static str) {
            description("canceled")
            display("canceled, {}", reason)
        }
        /// The broker holds a message larger than the current fetch buffer.
        BufferUnderrun(required: usize) {
            description("buffer underrun")
            display("response larger than buffer, at least {} bytes required", required)
        }
        /// The requested offset lies outside the broker's retention window.
        OffsetOutOfRange(topic: String, partition: PartitionId) {
            description("offset out of range")
            display("offset out of range for topic `{}`, partition {}", topic, partition)
        }
        UnsupportedCompression {
            description("unsupported compression")
            display("compression codec not compiled in")
        }
    }
}

lazy_static!{
    /// Codes that mean "your mapping of leaders to brokers is out of date".
    static ref STALE_METADATA_CODES: HashSet<KafkaCode> = [
        KafkaCode::BrokerNotAvailable,
        KafkaCode::LeaderNotAvailable,
        KafkaCode::NotLeaderForPartition,
        KafkaCode::GroupCoordinatorNotAvailable,
    ].iter().cloned().collect();

    static ref RETRYABLE_CODES: HashSet<KafkaCode> = [
        KafkaCode::CorruptMessage,
        KafkaCode::UnknownTopicOrPartition,
        KafkaCode::BrokerNotAvailable,
        KafkaCode::LeaderNotAvailable,
        KafkaCode::NotLeaderForPartition,
        KafkaCode::RequestTimedOut,
        KafkaCode::NetworkException,
        KafkaCode::GroupLoadInProgress,
        KafkaCode::GroupCoordinatorNotAvailable,
        KafkaCode::NotCoordinatorForGroup,
        KafkaCode::NotEnoughReplicas,
        KafkaCode::NotEnoughReplicasAfterAppend,
        KafkaCode::NotController,
    ].iter().cloned().collect();
}

/// Whether a broker error code signals stale routing metadata.
pub fn is_stale_metadata(code: KafkaCode) -> bool {
    STALE_METADATA_CODES.contains(&code)
}

/// Whether a broker error code is safe to retry as-is.
pub fn is_retryable(code: KafkaCode) -> bool {
    RETRYABLE_CODES.contains(&code)
}

impl Error {
    /// Whether a fresh metadata fetch could make a retry of the failed operation succeed.
    pub fn is_recoverable_by_refresh(&self) -> bool {
        match *self.kind() {
            ErrorKind::ConnectionError(_) |
            ErrorKind::CachedMetadata(..) |
            ErrorKind::RequestTimeout(_) |
            ErrorKind::OffsetOutOfRange(..) |
            ErrorKind::IoError(_) => true,
            _ => false,
        }
    }
}

/// Rebuild an error of the same kind from a shared reference.
///
/// `error_chain` errors are not `Clone`; refresh waiters and per-record
/// completion slots all need their own copy of a single failure.
pub fn duplicate(err: &Error) -> Error {
    match *err.kind() {
        ErrorKind::CodecError(reason) => ErrorKind::CodecError(reason).into(),
        ErrorKind::ConnectionError(ref reason) => ErrorKind::ConnectionError(reason.clone()).into(),
        ErrorKind::CachedMetadata(ref topic, partition) => {
            ErrorKind::CachedMetadata(topic.clone(), partition).into()
        }
        ErrorKind::KafkaError(code) => ErrorKind::KafkaError(code).into(),
        ErrorKind::RequestError(ref endpoint, code) => {
            ErrorKind::RequestError(endpoint.clone(), code).into()
        }
        ErrorKind::UnexpectedResponse(api_key) => ErrorKind::UnexpectedResponse(api_key).into(),
        ErrorKind::RequestTimeout(reason) => ErrorKind::RequestTimeout(reason).into(),
        ErrorKind::Canceled(reason) => ErrorKind::Canceled(reason).into(),
        ErrorKind::BufferUnderrun(required) => ErrorKind::BufferUnderrun(required).into(),
        ErrorKind::OffsetOutOfRange(ref topic, partition) => {
            ErrorKind::OffsetOutOfRange(topic.clone(), partition).into()
        }
        _ => ErrorKind::Msg(err.to_string()).into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_metadata_codes() {
        assert!(is_stale_metadata(KafkaCode::NotLeaderForPartition));
        assert!(is_stale_metadata(KafkaCode::LeaderNotAvailable));
        assert!(is_stale_metadata(KafkaCode::BrokerNotAvailable));
        assert!(is_stale_metadata(KafkaCode::GroupCoordinatorNotAvailable));
        assert!(!is_stale_metadata(KafkaCode::MessageSizeTooLarge));
        assert!(!is_stale_metadata(KafkaCode::None));
    }

    #[test]
    fn test_stale_metadata_implies_retryable() {
        for code in STALE_METADATA_CODES.iter() {
            assert!(is_retryable(*code), "{:?} should be retryable", code);
        }
        assert!(!is_retryable(KafkaCode::InvalidRequiredAcks));
    }

    #[test]
    fn test_recoverable_by_refresh() {
        let err: Error = ErrorKind::CachedMetadata("tests".to_owned(), Some(0)).into();
        assert!(err.is_recoverable_by_refresh());

        let err: Error = ErrorKind::ConnectionError("refused".to_owned()).into();
        assert!(err.is_recoverable_by_refresh());

        let err: Error = ErrorKind::RequestError("127.0.0.1:9092".to_owned(),
                                                 KafkaCode::InvalidTopic)
            .into();
        assert!(!err.is_recoverable_by_refresh());
    }

    #[test]
    fn test_duplicate_preserves_kind() {
        let err: Error = ErrorKind::CachedMetadata("tests".to_owned(), Some(1)).into();
        match *duplicate(&err).kind() {
            ErrorKind::CachedMetadata(ref topic, Some(1)) => assert_eq!(topic, "tests"),
            ref kind => panic!("unexpected kind: {:?}", kind),
        }
    }
}
