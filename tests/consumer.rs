extern crate byteorder;
extern crate bytes;
extern crate futures;
extern crate tokio_core;
extern crate tokio_io;
extern crate pretty_env_logger;
extern crate tokio_kafka_client;

mod common;

use std::cell::Cell;
use std::rc::Rc;

use bytes::{Bytes, BytesMut};
use futures::{Future, Stream};
use tokio_core::reactor::Core;

use tokio_kafka_client::{BrokerRouter, ClientConfig, Compression, KafkaConsumer, Message,
                         MessageSet, MessageSetEncoder};

use common::{MockBroker, fetch_response, list_offsets_response, metadata_response};

const FETCH: i16 = 1;
const LIST_OFFSETS: i16 = 2;
const METADATA: i16 = 3;

fn message(offset: i64, value: &'static [u8]) -> Message {
    Message {
        offset: offset,
        timestamp: None,
        compression: Compression::None,
        key: None,
        value: Some(Bytes::from_static(value)),
    }
}

fn encode(messages: Vec<Message>) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(256);

    MessageSetEncoder::new(0)
        .encode(&MessageSet { messages: messages }, &mut buf)
        .unwrap();

    buf.to_vec()
}

fn router_for(broker: &MockBroker, core: &Core) -> BrokerRouter {
    let mut config = ClientConfig::from_hosts(vec![broker.uri()]);

    config.cache_expiration = 60_000;

    BrokerRouter::from_config(config, core.handle()).unwrap()
}

#[test]
fn polls_a_partition_from_the_fallback_offset() {
    let mut core = Core::new().unwrap();
    let handle = core.handle();

    let port = Rc::new(Cell::new(0));
    let advertised = Rc::clone(&port);

    let broker = MockBroker::start(&handle,
                                   move |api_key, api_version, correlation_id, _| match api_key {
        METADATA => {
            vec![metadata_response(correlation_id,
                                   &[(0, "127.0.0.1", advertised.get())],
                                   &[("logs", &[(0, 0)])])]
        }
        LIST_OFFSETS => vec![list_offsets_response(correlation_id, "logs", 0, 5)],
        FETCH => {
            vec![fetch_response(api_version,
                                correlation_id,
                                "logs",
                                0,
                                7,
                                &encode(vec![message(5, b"first"), message(6, b"second")]))]
        }
        _ => vec![],
    });

    port.set(broker.port());

    let router = router_for(&broker, &core);

    let consumer = KafkaConsumer::from_router(router)
        .with_backoff_interval(50)
        .build()
        .unwrap();

    let stream = core.run(consumer.topic("logs")).unwrap();

    let records = core.run(stream.take(2).collect()).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].offset, 5);
    assert_eq!(records[0].value, Some(Bytes::from_static(b"first")));
    assert_eq!(records[1].offset, 6);
    assert_eq!(records[1].value, Some(Bytes::from_static(b"second")));
    assert_eq!(records[0].topic_name, "logs");
    assert_eq!(records[0].partition, 0);
}

#[test]
fn grows_the_fetch_buffer_on_underrun() {
    let mut core = Core::new().unwrap();
    let handle = core.handle();

    let port = Rc::new(Cell::new(0));
    let advertised = Rc::clone(&port);
    let fetches = Rc::new(Cell::new(0));
    let fetch_count = Rc::clone(&fetches);

    let broker = MockBroker::start(&handle,
                                   move |api_key, api_version, correlation_id, _| match api_key {
        METADATA => {
            vec![metadata_response(correlation_id,
                                   &[(0, "127.0.0.1", advertised.get())],
                                   &[("logs", &[(0, 0)])])]
        }
        LIST_OFFSETS => vec![list_offsets_response(correlation_id, "logs", 0, 0)],
        FETCH => {
            fetch_count.set(fetch_count.get() + 1);

            let full = encode(vec![message(0, b"a fairly large payload")]);

            if fetch_count.get() == 1 {
                // only the head of the message fits the first buffer
                vec![fetch_response(api_version, correlation_id, "logs", 0, 1, &full[..20])]
            } else {
                vec![fetch_response(api_version, correlation_id, "logs", 0, 1, &full)]
            }
        }
        _ => vec![],
    });

    port.set(broker.port());

    let router = router_for(&broker, &core);

    let consumer = KafkaConsumer::from_router(router)
        .with_backoff_interval(50)
        .build()
        .unwrap();

    let stream = core.run(consumer.topic("logs")).unwrap();

    let records = core.run(stream.take(1).collect()).unwrap();

    assert_eq!(records[0].value,
               Some(Bytes::from_static(b"a fairly large payload")));
    // the first fetch underran, the retry used a grown buffer
    assert!(fetches.get() >= 2);
}
