//! An in-process scripted broker: accepts length-framed connections on a
//! random port and answers each request with whatever frames the script
//! returns.

#![allow(dead_code)]

use std::cell::RefCell;
use std::io::Write;
use std::net::SocketAddr;
use std::rc::Rc;

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use bytes::Bytes;
use futures::{Future, Sink, Stream, stream};
use tokio_core::reactor::Handle;
use tokio_core::net::TcpListener;
use tokio_io::AsyncRead;

use tokio_kafka_client::KafkaCodec;

const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Clone)]
pub struct MockBroker {
    addr: SocketAddr,
    requests: Rc<RefCell<Vec<(i16, i32)>>>,
}

impl MockBroker {
    /// The script sees `(api_key, api_version, correlation_id, payload)` of
    /// every framed request and returns zero or more response frames.
    pub fn start<F>(handle: &Handle, script: F) -> MockBroker
        where F: Fn(i16, i16, i32, &[u8]) -> Vec<Vec<u8>> + 'static
    {
        let _ = ::pretty_env_logger::try_init();

        let listener = TcpListener::bind(&"127.0.0.1:0".parse().unwrap(), handle).unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Rc::new(RefCell::new(Vec::new()));

        let script = Rc::new(script);
        let log = Rc::clone(&requests);
        let conn_handle = handle.clone();

        let server = listener
            .incoming()
            .for_each(move |(sock, _peer)| {
                let (sink, incoming) = sock.framed(KafkaCodec::new(MAX_FRAME_SIZE)).split();

                let script = Rc::clone(&script);
                let log = Rc::clone(&log);

                let responses = incoming
                    .map(move |frame| {
                             let api_key = BigEndian::read_i16(&frame[..2]);
                             let api_version = BigEndian::read_i16(&frame[2..4]);
                             let correlation_id = BigEndian::read_i32(&frame[4..8]);

                             log.borrow_mut().push((api_key, correlation_id));

                             let frames = script(api_key, api_version, correlation_id, &frame);

                             stream::iter_ok::<_, tokio_kafka_client::Error>(frames.into_iter()
                                                                                  .map(Bytes::from))
                         })
                    .flatten();

                conn_handle.spawn(sink.send_all(responses).then(|_| Ok(())));

                Ok(())
            });

        handle.spawn(server.then(|_| Ok(())));

        MockBroker {
            addr: addr,
            requests: requests,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host(&self) -> String {
        format!("{}", self.addr.ip())
    }

    pub fn port(&self) -> i32 {
        i32::from(self.addr.port())
    }

    pub fn uri(&self) -> String {
        format!("{}", self.addr)
    }

    pub fn request_count(&self, api_key: i16) -> usize {
        self.requests
            .borrow()
            .iter()
            .filter(|&&(key, _)| key == api_key)
            .count()
    }
}

/// Little-boilerplate writers for response bodies.
pub struct Body {
    buf: Vec<u8>,
}

impl Body {
    pub fn new(correlation_id: i32) -> Self {
        let mut buf = Vec::new();
        buf.write_i32::<BigEndian>(correlation_id).unwrap();

        Body { buf: buf }
    }

    pub fn i16(mut self, v: i16) -> Self {
        self.buf.write_i16::<BigEndian>(v).unwrap();
        self
    }

    pub fn i32(mut self, v: i32) -> Self {
        self.buf.write_i32::<BigEndian>(v).unwrap();
        self
    }

    pub fn i64(mut self, v: i64) -> Self {
        self.buf.write_i64::<BigEndian>(v).unwrap();
        self
    }

    pub fn string(mut self, s: &str) -> Self {
        self.buf.write_i16::<BigEndian>(s.len() as i16).unwrap();
        self.buf.write_all(s.as_bytes()).unwrap();
        self
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.write_all(bytes).unwrap();
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

/// A v0 metadata response: `(node_id, host, port)` brokers and
/// `(partition, leader)` layouts per topic.
pub fn metadata_response(correlation_id: i32,
                         brokers: &[(i32, &str, i32)],
                         topics: &[(&str, &[(i32, i32)])])
                         -> Vec<u8> {
    let mut body = Body::new(correlation_id).i32(brokers.len() as i32);

    for &(node_id, host, port) in brokers {
        body = body.i32(node_id).string(host).i32(port);
    }

    body = body.i32(topics.len() as i32);

    for &(topic_name, partitions) in topics {
        body = body.i16(0).string(topic_name).i32(partitions.len() as i32);

        for &(partition, leader) in partitions {
            body = body
                .i16(0)
                .i32(partition)
                .i32(leader)
                .i32(1)
                .i32(leader)
                .i32(1)
                .i32(leader);
        }
    }

    body.build()
}

pub fn produce_response(api_version: i16,
                        correlation_id: i32,
                        topic_name: &str,
                        partition: i32,
                        error_code: i16,
                        base_offset: i64)
                        -> Vec<u8> {
    let mut body = Body::new(correlation_id)
        .i32(1)
        .string(topic_name)
        .i32(1)
        .i32(partition)
        .i16(error_code)
        .i64(base_offset);

    if api_version > 1 {
        body = body.i64(-1);
    }

    if api_version > 0 {
        body = body.i32(0);
    }

    body.build()
}

pub fn list_offsets_response(correlation_id: i32,
                             topic_name: &str,
                             partition: i32,
                             offset: i64)
                             -> Vec<u8> {
    Body::new(correlation_id)
        .i32(1)
        .string(topic_name)
        .i32(1)
        .i32(partition)
        .i16(0)
        .i32(1)
        .i64(offset)
        .build()
}

pub fn group_coordinator_response(correlation_id: i32,
                                  error_code: i16,
                                  node_id: i32,
                                  host: &str,
                                  port: i32)
                                  -> Vec<u8> {
    Body::new(correlation_id)
        .i16(error_code)
        .i32(node_id)
        .string(host)
        .i32(port)
        .build()
}

pub fn fetch_response(api_version: i16,
                      correlation_id: i32,
                      topic_name: &str,
                      partition: i32,
                      highwater_mark: i64,
                      message_set: &[u8])
                      -> Vec<u8> {
    let mut body = Body::new(correlation_id);

    if api_version > 0 {
        body = body.i32(0);
    }

    body.i32(1)
        .string(topic_name)
        .i32(1)
        .i32(partition)
        .i16(0)
        .i64(highwater_mark)
        .i32(message_set.len() as i32)
        .raw(message_set)
        .build()
}

/// The topic a v0 metadata request asks about, if any.
pub fn requested_topic(payload: &[u8]) -> Option<String> {
    // api_key + api_version + correlation_id
    let mut pos = 8;

    let client_id_len = BigEndian::read_i16(&payload[pos..pos + 2]);
    pos += 2;

    if client_id_len > 0 {
        pos += client_id_len as usize;
    }

    let topic_count = BigEndian::read_i32(&payload[pos..pos + 4]);
    pos += 4;

    if topic_count < 1 {
        return None;
    }

    let name_len = BigEndian::read_i16(&payload[pos..pos + 2]) as usize;
    pos += 2;

    Some(String::from_utf8(payload[pos..pos + name_len].to_vec()).unwrap())
}
