use std::cell::Cell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{SocketAddr, ToSocketAddrs};
use std::rc::Rc;
use std::time::Duration;

use tokio_core::reactor::Handle;

use client::Metrics;
use errors::{ErrorKind, Result};
use network::KafkaConnection;

/// A resolved broker address: the advertised `host:port` plus the socket
/// address it resolved to. Resolution happens when the endpoint is built,
/// never at send time.
#[derive(Clone, Debug)]
pub struct Endpoint {
    uri: String,
    addr: SocketAddr,
}

impl Endpoint {
    /// Resolve an advertised `host:port` to an endpoint; the first resolved
    /// address wins.
    pub fn resolve(uri: &str) -> Result<Endpoint> {
        let addr = uri.to_socket_addrs()
            .map_err(|err| {
                         ErrorKind::ConnectionError(format!("fail to resolve `{}`, {}", uri, err))
                     })?
            .next()
            .ok_or_else(|| ErrorKind::ConnectionError(format!("no address for `{}`", uri)))?;

        Ok(Endpoint {
               uri: uri.to_owned(),
               addr: addr,
           })
    }

    pub fn from_host_port(host: &str, port: u16) -> Result<Endpoint> {
        Endpoint::resolve(&format!("{}:{}", host, port))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Identity follows the resolved socket address, not the advertised name.
impl PartialEq for Endpoint {
    fn eq(&self, other: &Endpoint) -> bool {
        self.addr == other.addr
    }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.uri, self.addr)
    }
}

/// Resolves seed URIs and builds connections bound to the reactor.
pub struct KafkaConnector {
    handle: Handle,
    max_frame_size: usize,
    request_timeout: Duration,
    metrics: Option<Rc<Metrics>>,
    next_connection_id: Cell<u32>,
}

impl KafkaConnector {
    pub fn new(handle: Handle,
               max_frame_size: usize,
               request_timeout: Duration,
               metrics: Option<Rc<Metrics>>)
               -> Self {
        KafkaConnector {
            handle: handle,
            max_frame_size: max_frame_size,
            request_timeout: request_timeout,
            metrics: metrics,
            next_connection_id: Cell::new(0),
        }
    }

    pub fn resolve(&self, uri: &str) -> Result<Endpoint> {
        Endpoint::resolve(uri)
    }

    /// Build a connection handle; the socket is opened lazily on first send.
    pub fn connect(&self, endpoint: Endpoint) -> KafkaConnection {
        let id = self.next_connection_id.get();
        self.next_connection_id.set(id.wrapping_add(1));

        debug!("created connection #{} for {}", id, endpoint);

        KafkaConnection::new(id,
                             endpoint,
                             self.handle.clone(),
                             self.max_frame_size,
                             self.request_timeout,
                             self.metrics.clone())
    }
}
