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

use tokio_core::reactor::Core;

use tokio_kafka_client::{BrokerRouter, ClientConfig, KafkaRequest, KafkaResponse, Message,
                         MessageSet, ProducePartitionData, ProduceRequest, ProduceTopicData,
                         RequestDispatcher, RequestHeader, RetryPolicy};
use tokio_kafka_client::Compression;

use common::{MockBroker, metadata_response, produce_response};

const PRODUCE: i16 = 0;
const METADATA: i16 = 3;

fn produce_request() -> KafkaRequest<'static> {
    KafkaRequest::Produce(ProduceRequest {
        header: RequestHeader {
            api_key: PRODUCE,
            api_version: 0,
            correlation_id: 0,
            client_id: None,
        },
        required_acks: 1,
        ack_timeout: 1_000,
        message_version: 0,
        compression: Compression::None,
        topics: vec![ProduceTopicData {
                         topic_name: "topic".to_owned(),
                         partitions: vec![ProducePartitionData {
                                              partition_id: 0,
                                              message_set: MessageSet {
                                                  messages: vec![Message {
                                                      offset: 0,
                                                      timestamp: None,
                                                      compression: Compression::None,
                                                      key: None,
                                                      value: Some(::bytes::Bytes::from_static(
                                                          b"payload")),
                                                  }],
                                              },
                                          }],
                     }],
    })
}

#[test]
fn stale_metadata_triggers_refresh_and_retry() {
    let mut core = Core::new().unwrap();
    let handle = core.handle();

    let port = Rc::new(Cell::new(0));
    let advertised = Rc::clone(&port);
    let produce_attempts = Rc::new(Cell::new(0));
    let attempts = Rc::clone(&produce_attempts);

    let broker = MockBroker::start(&handle,
                                   move |api_key, api_version, correlation_id, _| match api_key {
        METADATA => {
            vec![metadata_response(correlation_id,
                                   &[(0, "127.0.0.1", advertised.get())],
                                   &[("topic", &[(0, 0)])])]
        }
        PRODUCE => {
            attempts.set(attempts.get() + 1);

            if attempts.get() == 1 {
                // 6 == NotLeaderForPartition: the client's mapping is stale
                vec![produce_response(api_version, correlation_id, "topic", 0, 6, -1)]
            } else {
                vec![produce_response(api_version, correlation_id, "topic", 0, 0, 42)]
            }
        }
        _ => vec![],
    });

    port.set(broker.port());

    let mut config = ClientConfig::from_hosts(vec![broker.uri()]);
    config.cache_expiration = 0;
    let router = BrokerRouter::from_config(config, core.handle()).unwrap();

    let dispatcher = RequestDispatcher::with_retry_policy(router,
                                                          RetryPolicy::Fixed {
                                                              attempts: 5,
                                                              backoff: 20,
                                                          });

    let response = core.run(dispatcher.send("topic", 0, produce_request())).unwrap();

    match response {
        Some(KafkaResponse::Produce(res)) => {
            assert_eq!(res.topics[0].partitions[0].error_code, 0);
            assert_eq!(res.topics[0].partitions[0].base_offset, 42);
        }
        res => panic!("unexpected response: {:?}", res),
    }

    // two produce attempts, with a metadata refresh between them
    assert_eq!(produce_attempts.get(), 2);
    assert!(broker.request_count(METADATA) >= 2);
}

#[test]
fn fatal_codes_surface_with_the_endpoint() {
    let mut core = Core::new().unwrap();
    let handle = core.handle();

    let port = Rc::new(Cell::new(0));
    let advertised = Rc::clone(&port);

    let broker = MockBroker::start(&handle,
                                   move |api_key, api_version, correlation_id, _| match api_key {
        METADATA => {
            vec![metadata_response(correlation_id,
                                   &[(0, "127.0.0.1", advertised.get())],
                                   &[("topic", &[(0, 0)])])]
        }
        PRODUCE => {
            // 21 == InvalidRequiredAcks, not retryable
            vec![produce_response(api_version, correlation_id, "topic", 0, 21, -1)]
        }
        _ => vec![],
    });

    port.set(broker.port());

    let router = BrokerRouter::from_hosts(vec![broker.uri()], core.handle()).unwrap();
    let dispatcher = RequestDispatcher::with_retry_policy(router,
                                                          RetryPolicy::Fixed {
                                                              attempts: 3,
                                                              backoff: 20,
                                                          });

    let result = core.run(dispatcher.send("topic", 0, produce_request()));

    match result {
        Err(tokio_kafka_client::Error(tokio_kafka_client::ErrorKind::RequestError(ref endpoint,
                                                                                  code),
                                      _)) => {
            assert_eq!(endpoint, &broker.uri());
            assert_eq!(code, tokio_kafka_client::KafkaCode::InvalidRequiredAcks);
        }
        res => panic!("unexpected result: {:?}", res.map(|_| ())),
    }

    assert_eq!(broker.request_count(PRODUCE), 1);
}
