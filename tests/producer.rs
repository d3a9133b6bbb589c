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

use futures::Future;
use tokio_core::reactor::{Core, Handle};

use tokio_kafka_client::{BrokerRouter, ClientConfig, KafkaProducer, Producer, ProducerRecord,
                         RequiredAcks};

use common::{MockBroker, metadata_response, produce_response};

const PRODUCE: i16 = 0;
const METADATA: i16 = 3;

/// One broker that owns partition 0 of `topic` and acknowledges every
/// produce request from `base_offset`.
fn single_broker(handle: &Handle, base_offset: i64, error_code: i16) -> MockBroker {
    let port = Rc::new(Cell::new(0));
    let advertised = Rc::clone(&port);

    let broker = MockBroker::start(handle,
                                   move |api_key, api_version, correlation_id, _| match api_key {
        METADATA => {
            vec![metadata_response(correlation_id,
                                   &[(0, "127.0.0.1", advertised.get())],
                                   &[("topic", &[(0, 0)])])]
        }
        PRODUCE => {
            vec![produce_response(api_version,
                                  correlation_id,
                                  "topic",
                                  0,
                                  error_code,
                                  base_offset)]
        }
        _ => vec![],
    });

    port.set(broker.port());

    broker
}

fn router_for(broker: &MockBroker, core: &Core) -> BrokerRouter {
    let mut config = ClientConfig::from_hosts(vec![broker.uri()]);

    config.cache_expiration = 60_000;

    BrokerRouter::from_config(config, core.handle()).unwrap()
}

#[test]
fn offsets_are_assigned_in_enqueue_order() {
    let mut core = Core::new().unwrap();
    let broker = single_broker(&core.handle(), 42, 0);
    let router = router_for(&broker, &core);

    let producer = KafkaProducer::from_router(router).build().unwrap();

    let records = vec![ProducerRecord::from_value("topic", &b"first"[..]).with_partition(0),
                       ProducerRecord::from_value("topic", &b"second"[..]).with_partition(0),
                       ProducerRecord::from_value("topic", &b"third"[..]).with_partition(0)];

    let results = core.run(producer.send(records)).unwrap();

    let offsets: Vec<i64> = results
        .into_iter()
        .map(|outcome| outcome.unwrap().unwrap().offset)
        .collect();

    assert_eq!(offsets, vec![42, 43, 44]);
    assert_eq!(producer.sending_count(), 0);
    assert_eq!(producer.in_flight_count(), 0);
    assert_eq!(broker.request_count(PRODUCE), 1);
}

#[test]
fn records_of_one_partition_share_a_request_in_order() {
    let mut core = Core::new().unwrap();
    let broker = single_broker(&core.handle(), 7, 0);
    let router = router_for(&broker, &core);

    let producer = KafkaProducer::from_router(router)
        .with_batch_size(16)
        .build()
        .unwrap();

    let records = (0..10)
        .map(|i| {
                 ProducerRecord::from_value("topic", format!("value-{}", i)).with_partition(0)
             })
        .collect();

    let results = core.run(producer.send(records)).unwrap();

    let offsets: Vec<i64> = results
        .into_iter()
        .map(|outcome| outcome.unwrap().unwrap().offset)
        .collect();

    assert_eq!(offsets, (7..17).collect::<Vec<i64>>());
    assert_eq!(broker.request_count(PRODUCE), 1);
}

#[test]
fn fire_and_forget_resolves_without_a_response() {
    let mut core = Core::new().unwrap();
    let handle = core.handle();

    // answers metadata but stays silent on produce
    let port = Rc::new(Cell::new(0));
    let advertised = Rc::clone(&port);

    let broker = MockBroker::start(&handle, move |api_key, _, correlation_id, _| {
        if api_key == METADATA {
            vec![metadata_response(correlation_id,
                                   &[(0, "127.0.0.1", advertised.get())],
                                   &[("topic", &[(0, 0)])])]
        } else {
            vec![]
        }
    });

    port.set(broker.port());

    let router = router_for(&broker, &core);

    let producer = KafkaProducer::from_router(router)
        .with_required_acks(RequiredAcks::None)
        .build()
        .unwrap();

    let records = vec![ProducerRecord::from_value("topic", &b"one"[..]).with_partition(0),
                       ProducerRecord::from_value("topic", &b"two"[..]).with_partition(0)];

    let results = core.run(producer.send(records)).unwrap();

    for outcome in results {
        let metadata = outcome.unwrap().unwrap();

        assert_eq!(metadata.offset, -1);
        assert_eq!(metadata.error, None);
    }
}

#[test]
fn broker_error_codes_surface_per_record() {
    let mut core = Core::new().unwrap();
    // 10 == MessageSizeTooLarge, not retryable
    let broker = single_broker(&core.handle(), -1, 10);
    let router = router_for(&broker, &core);

    let producer = KafkaProducer::from_router(router).build().unwrap();

    let records = vec![ProducerRecord::from_value("topic", &b"huge"[..]).with_partition(0)];

    let results = core.run(producer.send(records)).unwrap();

    let metadata = results.into_iter().next().unwrap().unwrap().unwrap();

    assert_eq!(metadata.error,
               Some(tokio_kafka_client::KafkaCode::MessageSizeTooLarge));
}

#[test]
fn stop_is_idempotent_and_drains() {
    let mut core = Core::new().unwrap();
    let broker = single_broker(&core.handle(), 0, 0);
    let router = router_for(&broker, &core);

    let producer = KafkaProducer::from_router(router).build().unwrap();

    let records = vec![ProducerRecord::from_value("topic", &b"last"[..]).with_partition(0)];
    let send = producer.send(records);

    core.run(producer.stop().join(send)).unwrap();
    core.run(producer.stop()).unwrap();

    // sends after stop fail fast
    let records = vec![ProducerRecord::from_value("topic", &b"late"[..]).with_partition(0)];

    assert!(core.run(producer.send(records)).is_err());
}
