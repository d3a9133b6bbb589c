use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::unsync::oneshot;
use futures::{Async, Future, Poll};

use errors::{Error, ErrorKind};

/// The permit pool bounding in-flight produce requests. Acquiring suspends
/// the batcher once every permit is out, which is the producer's only
/// back-pressure mechanism.
#[derive(Clone)]
pub struct Semaphore {
    inner: Rc<RefCell<State>>,
}

struct State {
    permits: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl Semaphore {
    pub fn new(permits: usize) -> Self {
        Semaphore {
            inner: Rc::new(RefCell::new(State {
                                            permits: permits,
                                            waiters: VecDeque::new(),
                                        })),
        }
    }

    pub fn available(&self) -> usize {
        self.inner.borrow().permits
    }

    pub fn acquire(&self) -> AcquirePermit {
        let mut state = self.inner.borrow_mut();

        if state.permits > 0 {
            state.permits -= 1;

            AcquirePermit { state: AcquireState::Ready(Some(Rc::clone(&self.inner))) }
        } else {
            let (tx, rx) = oneshot::channel();

            state.waiters.push_back(tx);

            AcquirePermit { state: AcquireState::Waiting(Rc::clone(&self.inner), rx) }
        }
    }
}

pub struct AcquirePermit {
    state: AcquireState,
}

enum AcquireState {
    Ready(Option<Rc<RefCell<State>>>),
    Waiting(Rc<RefCell<State>>, oneshot::Receiver<()>),
}

impl Future for AcquirePermit {
    type Item = Permit;
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        match self.state {
            AcquireState::Ready(ref mut inner) => {
                let inner = inner.take().expect("future polled after completion");

                Ok(Async::Ready(Permit { inner: inner }))
            }
            AcquireState::Waiting(ref inner, ref mut receiver) => {
                match receiver.poll() {
                    // the dropping permit was handed over, not returned
                    Ok(Async::Ready(())) => Ok(Async::Ready(Permit { inner: Rc::clone(inner) })),
                    Ok(Async::NotReady) => Ok(Async::NotReady),
                    Err(_canceled) => {
                        Err(ErrorKind::Canceled("semaphore dropped").into())
                    }
                }
            }
        }
    }
}

/// Releases its slot on drop, waking the oldest waiting acquirer.
pub struct Permit {
    inner: Rc<RefCell<State>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut state = self.inner.borrow_mut();

        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.send(()).is_ok() {
                return;
            }
        }

        state.permits += 1;
    }
}
