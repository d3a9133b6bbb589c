use std::cell::Cell;

use futures::unsync::oneshot;

use compression::Compression;
use errors::Error;
use network::Endpoint;
use producer::{ProducerRecord, RecordMetadata};
use protocol::RequiredAcks;

/// Per-record result: broker metadata, `None` when the response had no
/// matching topic/partition, or the failure that stopped the record.
pub type ProduceOutcome = ::std::result::Result<Option<RecordMetadata>, Error>;

/// One queued record together with its completion slot. The slot resolves
/// exactly once; a dropped caller future shows up as a canceled slot.
pub struct ProduceTask {
    pub record: ProducerRecord,
    pub required_acks: RequiredAcks,
    /// Milliseconds the broker may spend collecting acknowledgements.
    pub ack_timeout: u64,
    pub compression: Compression,
    sender: oneshot::Sender<ProduceOutcome>,
}

impl ProduceTask {
    pub fn new(record: ProducerRecord,
               required_acks: RequiredAcks,
               ack_timeout: u64,
               compression: Compression)
               -> (ProduceTask, oneshot::Receiver<ProduceOutcome>) {
        let (sender, receiver) = oneshot::channel();

        (ProduceTask {
             record: record,
             required_acks: required_acks,
             ack_timeout: ack_timeout,
             compression: compression,
             sender: sender,
         },
         receiver)
    }

    /// The caller dropped its future; completing this record would go
    /// nowhere.
    pub fn is_canceled(&self) -> bool {
        self.sender.is_canceled()
    }

    pub fn complete(self, outcome: ProduceOutcome) {
        let _ = self.sender.send(outcome);
    }
}

/// Tasks of one batch pass are fanned out by codec, ack level and target
/// endpoint; each distinct key becomes one produce request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub compression: Compression,
    pub required_acks: i16,
    pub ack_timeout: u64,
    pub endpoint: Endpoint,
}

/// `sending` counts records between enqueue and slot resolution,
/// `in_flight` produce requests between write and response; the former
/// never drops below the latter.
#[derive(Default)]
pub struct ProducerCounters {
    sending: Cell<usize>,
    in_flight: Cell<usize>,
}

impl ProducerCounters {
    pub fn sending(&self) -> usize {
        self.sending.get()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.get()
    }

    pub fn record_enqueued(&self) {
        self.sending.set(self.sending.get() + 1);
    }

    pub fn record_resolved(&self) {
        self.sending.set(self.sending.get().saturating_sub(1));
    }

    pub fn request_started(&self) {
        self.in_flight.set(self.in_flight.get() + 1);
    }

    pub fn request_finished(&self) {
        self.in_flight.set(self.in_flight.get().saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use futures::Future;

    use super::*;

    #[test]
    fn test_task_completion_resolves_receiver() {
        let record = ProducerRecord::from_value("topic", &b"value"[..]);
        let (task, receiver) = ProduceTask::new(record, RequiredAcks::One, 100,
                                                Compression::None);

        assert!(!task.is_canceled());

        task.complete(Ok(None));

        assert_eq!(receiver.wait().unwrap().unwrap(), None);
    }

    #[test]
    fn test_dropped_receiver_marks_cancellation() {
        let record = ProducerRecord::from_value("topic", &b"value"[..]);
        let (task, receiver) = ProduceTask::new(record, RequiredAcks::One, 100,
                                                Compression::None);

        drop(receiver);

        assert!(task.is_canceled());
    }

    #[test]
    fn test_counters() {
        let counters = ProducerCounters::default();

        counters.record_enqueued();
        counters.record_enqueued();
        counters.request_started();

        assert_eq!(counters.sending(), 2);
        assert_eq!(counters.in_flight(), 1);
        assert!(counters.sending() >= counters.in_flight());

        counters.request_finished();
        counters.record_resolved();
        counters.record_resolved();

        assert_eq!(counters.sending(), 0);
        assert_eq!(counters.in_flight(), 0);
    }
}
