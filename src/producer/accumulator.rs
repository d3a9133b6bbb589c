use std::mem;
use std::rc::Rc;
use std::time::Duration;

use futures::unsync::mpsc::UnboundedReceiver;
use futures::{Async, Future, Poll, Stream};
use tokio_core::reactor::{Handle, Timeout};

use errors::{Error, ErrorKind};
use producer::{ProduceTask, ProducerCounters};

/// Pull tasks off the queue until the batch is full, the linger deadline
/// fires, or the queue closes. Resolves with the collected batch, the queue
/// handed back for the next pass, and whether the producer is stopping.
///
/// Canceled tasks are completed and dropped on the way in; they never reach
/// the wire.
pub struct CollectBatch {
    rx: Option<UnboundedReceiver<ProduceTask>>,
    handle: Handle,
    counters: Rc<ProducerCounters>,
    batch_size: usize,
    max_delay: Duration,
    deadline: Option<Timeout>,
    collected: Vec<ProduceTask>,
}

impl CollectBatch {
    pub fn new(rx: UnboundedReceiver<ProduceTask>,
               handle: Handle,
               counters: Rc<ProducerCounters>,
               batch_size: usize,
               max_delay: Duration)
               -> Self {
        CollectBatch {
            rx: Some(rx),
            handle: handle,
            counters: counters,
            batch_size: batch_size,
            max_delay: max_delay,
            deadline: None,
            collected: Vec::new(),
        }
    }

    fn finish(&mut self, closed: bool) -> (Vec<ProduceTask>, Option<UnboundedReceiver<ProduceTask>>, bool) {
        self.deadline = None;

        (mem::replace(&mut self.collected, Vec::new()),
         if closed { None } else { self.rx.take() },
         closed)
    }
}

impl Future for CollectBatch {
    type Item = (Vec<ProduceTask>, Option<UnboundedReceiver<ProduceTask>>, bool);
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        loop {
            let polled = self.rx
                .as_mut()
                .expect("future polled after completion")
                .poll();

            match polled {
                Ok(Async::Ready(Some(task))) => {
                    if task.is_canceled() {
                        trace!("dropping canceled record for topic `{}`",
                               task.record.topic_name);

                        self.counters.record_resolved();
                        task.complete(Err(ErrorKind::Canceled("record canceled").into()));

                        continue;
                    }

                    if self.collected.is_empty() {
                        self.deadline = match Timeout::new(self.max_delay, &self.handle) {
                            Ok(timeout) => Some(timeout),
                            Err(err) => {
                                warn!("fail to create batch deadline, {}", err);
                                None
                            }
                        };
                    }

                    self.collected.push(task);

                    if self.collected.len() >= self.batch_size {
                        return Ok(Async::Ready(self.finish(false)));
                    }
                }
                Ok(Async::Ready(None)) |
                Err(()) => return Ok(Async::Ready(self.finish(true))),
                Ok(Async::NotReady) => {
                    if self.collected.is_empty() {
                        return Ok(Async::NotReady);
                    }

                    match self.deadline.as_mut().map(|deadline| deadline.poll()) {
                        Some(Ok(Async::NotReady)) => return Ok(Async::NotReady),
                        // deadline elapsed, failed or was never armed: flush
                        _ => return Ok(Async::Ready(self.finish(false))),
                    }
                }
            }
        }
    }
}
