use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use byteorder::{BigEndian, ByteOrder};

use futures::unsync::mpsc::{self, UnboundedSender};
use futures::unsync::oneshot;
use futures::{Async, Future, Poll, Sink, Stream};
use tokio_core::net::TcpStream;
use tokio_core::reactor::{Handle, Timeout};
use tokio_io::AsyncRead;
use tokio_service::Service;

use client::Metrics;
use errors::{Error, ErrorKind};
use errors::Result as KafkaResult;
use network::Endpoint;
use protocol::{ApiKeys, ApiVersion, CorrelationId, FRAME_PREFIX_SIZE, KafkaCodec, KafkaRequest,
               KafkaResponse};

/// A duplex channel to one broker.
///
/// Many sends may be in flight at once over the single socket; responses are
/// matched back to their callers by correlation id. Any socket error fails
/// every pending send and poisons the handle; reconnecting is the router's
/// job, not ours.
#[derive(Clone)]
pub struct KafkaConnection {
    inner: Rc<Inner>,
}

struct Inner {
    id: u32,
    endpoint: Endpoint,
    handle: Handle,
    max_frame_size: usize,
    request_timeout: Duration,
    metrics: Option<Rc<Metrics>>,
    state: RefCell<State>,
}

struct State {
    status: Status,
    next_correlation_id: CorrelationId,
    pending: HashMap<CorrelationId, PendingResponse>,
    /// Timed-out or dropped sends; a late arrival is discarded, never
    /// matched to a future request.
    abandoned: HashSet<CorrelationId>,
    /// Frames accepted before the socket finished connecting.
    queued: Vec<Bytes>,
}

enum Status {
    Idle,
    Connecting,
    Connected(UnboundedSender<Bytes>),
    Closed(String),
}

struct PendingResponse {
    api_key: ApiKeys,
    api_version: ApiVersion,
    sender: oneshot::Sender<KafkaResult<KafkaResponse>>,
}

impl KafkaConnection {
    pub fn new(id: u32,
               endpoint: Endpoint,
               handle: Handle,
               max_frame_size: usize,
               request_timeout: Duration,
               metrics: Option<Rc<Metrics>>)
               -> Self {
        KafkaConnection {
            inner: Rc::new(Inner {
                               id: id,
                               endpoint: endpoint,
                               handle: handle,
                               max_frame_size: max_frame_size,
                               request_timeout: request_timeout,
                               metrics: metrics,
                               state: RefCell::new(State {
                                                       status: Status::Idle,
                                                       next_correlation_id: 0,
                                                       pending: HashMap::new(),
                                                       abandoned: HashSet::new(),
                                                       queued: Vec::new(),
                                                   }),
                           }),
        }
    }

    pub fn id(&self) -> u32 {
        self.inner.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Requests currently awaiting a response.
    pub fn in_flight(&self) -> usize {
        self.inner.state.borrow().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        match self.inner.state.borrow().status {
            Status::Closed(_) => true,
            _ => false,
        }
    }

    /// Send a request; the returned future resolves with the correlated
    /// response, or `None` for fire-and-forget requests once the frame is
    /// on its way. Dropping the future abandons the correlation slot.
    pub fn send<'a>(&self, mut request: KafkaRequest<'a>) -> SendRequest {
        if let Status::Closed(ref reason) = self.inner.state.borrow().status {
            return SendRequest::failed(ErrorKind::ConnectionError(reason.clone()).into());
        }

        let correlation_id = self.inner.next_correlation_id();

        request.set_correlation_id(correlation_id);

        trace!("sending {:?} request #{} on connection #{} to {}",
               request.api_key(),
               correlation_id,
               self.inner.id,
               self.inner.endpoint);

        let mut buf = BytesMut::with_capacity(FRAME_PREFIX_SIZE + 64);

        if let Err(err) = request.encode(&mut buf) {
            return SendRequest::failed(err);
        }

        let expects_response = request.expects_response();
        let receiver = if expects_response {
            let (sender, receiver) = oneshot::channel();

            self.inner
                .state
                .borrow_mut()
                .pending
                .insert(correlation_id,
                        PendingResponse {
                            api_key: request.api_key(),
                            api_version: request.api_version(),
                            sender: sender,
                        });

            Some(receiver)
        } else {
            None
        };

        if let Some(ref metrics) = self.inner.metrics {
            metrics.request_sent(self.inner.endpoint.uri());
        }

        if let Err(err) = enqueue(&self.inner, buf.freeze()) {
            self.inner.abandon(correlation_id);

            return SendRequest::failed(err);
        }

        match receiver {
            Some(receiver) => {
                let timeout = if self.inner.request_timeout > Duration::new(0, 0) {
                    match Timeout::new(self.inner.request_timeout, &self.inner.handle) {
                        Ok(timeout) => Some(timeout),
                        Err(err) => {
                            warn!("fail to create timeout, {}", err);
                            None
                        }
                    }
                } else {
                    None
                };

                SendRequest {
                    state: SendState::Waiting {
                        inner: Rc::clone(&self.inner),
                        correlation_id: correlation_id,
                        receiver: receiver,
                        timeout: timeout,
                    },
                }
            }
            None => SendRequest { state: SendState::Flushed },
        }
    }

    /// Fail every pending send and poison the handle.
    pub fn shutdown(&self) {
        self.inner.close_with(None);
    }
}

impl Service for KafkaConnection {
    type Request = KafkaRequest<'static>;
    type Response = Option<KafkaResponse>;
    type Error = Error;
    type Future = SendRequest;

    fn call(&self, request: Self::Request) -> Self::Future {
        self.send(request)
    }
}

impl Inner {
    fn next_correlation_id(&self) -> CorrelationId {
        let mut state = self.state.borrow_mut();
        let id = state.next_correlation_id;

        state.next_correlation_id = state.next_correlation_id.checked_add(1).unwrap_or(0);

        id
    }

    fn abandon(&self, correlation_id: CorrelationId) {
        let mut state = self.state.borrow_mut();

        if state.pending.remove(&correlation_id).is_some() {
            trace!("abandoned request #{} on connection #{}",
                   correlation_id,
                   self.id);

            state.abandoned.insert(correlation_id);
        }
    }

    fn connected(&self, tx: &UnboundedSender<Bytes>) {
        let mut state = self.state.borrow_mut();

        if let Status::Closed(_) = state.status {
            return;
        }

        debug!("connection #{} established to {}", self.id, self.endpoint);

        let queued: Vec<Bytes> = state.queued.drain(..).collect();

        for frame in queued {
            let _ = tx.unbounded_send(frame);
        }

        state.status = Status::Connected(tx.clone());
    }

    fn dispatch(&self, frame: BytesMut) -> KafkaResult<()> {
        if frame.len() < FRAME_PREFIX_SIZE {
            bail!(ErrorKind::CodecError("response too short"));
        }

        let correlation_id = BigEndian::read_i32(&frame[..FRAME_PREFIX_SIZE]);

        let pending = {
            let mut state = self.state.borrow_mut();

            if state.abandoned.remove(&correlation_id) {
                trace!("discarding late response #{} on connection #{}",
                       correlation_id,
                       self.id);

                return Ok(());
            }

            state.pending.remove(&correlation_id)
        };

        match pending {
            Some(pending) => {
                trace!("received response #{} on connection #{}",
                       correlation_id,
                       self.id);

                if let Some(ref metrics) = self.metrics {
                    metrics.response_received(self.endpoint.uri());
                }

                let result = KafkaResponse::parse(&frame, pending.api_key, pending.api_version);

                let _ = pending.sender.send(result);

                Ok(())
            }
            None => {
                warn!("unknown correlation id #{} on connection #{}",
                      correlation_id,
                      self.id);

                bail!(ErrorKind::CodecError("unknown correlation id"))
            }
        }
    }

    fn close_with(&self, reason: Option<String>) {
        let mut state = self.state.borrow_mut();

        if let Status::Closed(_) = state.status {
            return;
        }

        let reason = match reason {
            Some(reason) => {
                warn!("connection #{} to {} failed, {}",
                      self.id,
                      self.endpoint,
                      reason);
                reason
            }
            None => {
                debug!("connection #{} to {} closed", self.id, self.endpoint);
                "connection closed".to_owned()
            }
        };

        state.status = Status::Closed(reason.clone());
        state.queued.clear();
        state.abandoned.clear();

        for (_, pending) in state.pending.drain() {
            let _ = pending
                .sender
                .send(Err(ErrorKind::ConnectionError(reason.clone()).into()));
        }
    }
}

fn enqueue(inner: &Rc<Inner>, frame: Bytes) -> KafkaResult<()> {
    let (start_connect, writer_gone) = {
        let mut state = inner.state.borrow_mut();

        match state.status {
            Status::Closed(ref reason) => bail!(ErrorKind::ConnectionError(reason.clone())),
            Status::Connected(ref tx) => (false, tx.unbounded_send(frame).is_err()),
            Status::Connecting => {
                state.queued.push(frame);
                (false, false)
            }
            Status::Idle => {
                state.queued.push(frame);
                state.status = Status::Connecting;
                (true, false)
            }
        }
    };

    if writer_gone {
        inner.close_with(Some("writer task gone".to_owned()));

        bail!(ErrorKind::ConnectionError("writer task gone".to_owned()));
    }

    if start_connect {
        spawn_connect(inner);
    }

    Ok(())
}

fn spawn_connect(inner: &Rc<Inner>) {
    let addr = inner.endpoint.addr();

    debug!("connection #{} connecting to {}", inner.id, inner.endpoint);

    let handle = inner.handle.clone();
    let max_frame_size = inner.max_frame_size;
    let inner_up = Rc::clone(inner);
    let inner_down = Rc::clone(inner);

    let work = TcpStream::connect(&addr, &handle)
        .map_err(Error::from)
        .and_then(move |stream| {
            let _ = stream.set_nodelay(true);

            let (sink, stream) = stream.framed(KafkaCodec::new(max_frame_size)).split();
            let (tx, rx) = mpsc::unbounded();

            inner_up.connected(&tx);

            let reader = {
                let inner = Rc::clone(&inner_up);

                stream.for_each(move |frame| inner.dispatch(frame))
            };

            let writer = sink.send_all(rx.map_err(|()| {
                                                      Error::from(ErrorKind::Canceled("write channel closed"))
                                                  }))
                .map(|_| ());

            reader
                .select(writer)
                .map(|(_, _next)| ())
                .map_err(|(err, _next)| err)
        })
        .then(move |result| {
                  match result {
                      Ok(()) => inner_down.close_with(None),
                      Err(err) => inner_down.close_with(Some(err.to_string())),
                  }

                  Ok(())
              });

    inner.handle.spawn(work);
}

/// The future of one in-flight request.
pub struct SendRequest {
    state: SendState,
}

enum SendState {
    Failed(Option<Error>),
    Flushed,
    Waiting {
        inner: Rc<Inner>,
        correlation_id: CorrelationId,
        receiver: oneshot::Receiver<KafkaResult<KafkaResponse>>,
        timeout: Option<Timeout>,
    },
    Done,
}

impl SendRequest {
    pub fn failed(err: Error) -> Self {
        SendRequest { state: SendState::Failed(Some(err)) }
    }
}

impl Future for SendRequest {
    type Item = Option<KafkaResponse>;
    type Error = Error;

    fn poll(&mut self) -> Poll<Self::Item, Self::Error> {
        let result = match self.state {
            SendState::Failed(ref mut err) => {
                Some(Err(err.take().expect("future polled after completion")))
            }
            SendState::Flushed => Some(Ok(Async::Ready(None))),
            SendState::Waiting {
                ref inner,
                correlation_id,
                ref mut receiver,
                ref mut timeout,
            } => {
                match receiver.poll() {
                    Ok(Async::Ready(Ok(response))) => Some(Ok(Async::Ready(Some(response)))),
                    Ok(Async::Ready(Err(err))) => Some(Err(err)),
                    Err(_canceled) => {
                        Some(Err(ErrorKind::ConnectionError("connection disposed".to_owned())
                                     .into()))
                    }
                    Ok(Async::NotReady) => {
                        match timeout.as_mut().map(|timeout| timeout.poll()) {
                            Some(Ok(Async::Ready(()))) => {
                                inner.abandon(correlation_id);

                                Some(Err(ErrorKind::RequestTimeout("response timed out").into()))
                            }
                            Some(Err(err)) => Some(Err(err.into())),
                            Some(Ok(Async::NotReady)) | None => None,
                        }
                    }
                }
            }
            SendState::Done => panic!("future polled after completion"),
        };

        match result {
            Some(result) => {
                self.state = SendState::Done;
                result
            }
            None => Ok(Async::NotReady),
        }
    }
}

/// Dropping a pending send abandons its slot; a late response is discarded
/// without touching other in-flight requests.
impl Drop for SendRequest {
    fn drop(&mut self) {
        if let SendState::Waiting {
                   ref inner,
                   correlation_id,
                   ..
               } = self.state {
            inner.abandon(correlation_id);
        }
    }
}
