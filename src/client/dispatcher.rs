use std::time::Duration;

use futures::future::Future;

use client::{BrokerRouter, RetryPolicy, StaticBoxFuture, ToStaticBoxFuture};
use errors::{self, Error, ErrorKind};
use protocol::{KafkaCode, KafkaRequest, KafkaResponse, PartitionId};

pub type SendOperation = StaticBoxFuture<Option<KafkaResponse>>;

/// The retry loop glueing topic-scoped requests to the router: resolve a
/// route, send, classify what came back, refresh metadata when the error
/// says the topology moved, and re-attempt on the injected schedule.
#[derive(Clone)]
pub struct RequestDispatcher {
    router: BrokerRouter,
    retry_policy: RetryPolicy,
}

impl RequestDispatcher {
    pub fn new(router: BrokerRouter) -> Self {
        let retry_policy = router.config().refresh_retry.clone();

        RequestDispatcher {
            router: router,
            retry_policy: retry_policy,
        }
    }

    pub fn with_retry_policy(router: BrokerRouter, retry_policy: RetryPolicy) -> Self {
        RequestDispatcher {
            router: router,
            retry_policy: retry_policy,
        }
    }

    pub fn router(&self) -> &BrokerRouter {
        &self.router
    }

    pub fn send(&self,
                topic_name: &str,
                partition: PartitionId,
                request: KafkaRequest<'static>)
                -> SendOperation {
        send_attempt(self.router.clone(),
                     topic_name.to_owned(),
                     partition,
                     request,
                     false,
                     self.retry_policy.delays())
    }
}

enum Classification {
    Success,
    /// Every error says our leader mapping is out of date.
    Stale(KafkaCode),
    /// Worth re-sending as-is.
    Retry(KafkaCode),
    Fatal(KafkaCode),
}

fn classify(response: &Option<KafkaResponse>) -> Classification {
    let codes = match *response {
        Some(ref response) => response.error_codes(),
        None => return Classification::Success,
    };

    if codes.is_empty() {
        Classification::Success
    } else if codes.iter().all(|code| errors::is_stale_metadata(*code)) {
        Classification::Stale(codes[0])
    } else if codes.iter().any(|code| errors::is_retryable(*code)) {
        Classification::Retry(codes[0])
    } else {
        Classification::Fatal(codes[0])
    }
}

fn send_attempt(router: BrokerRouter,
                topic_name: String,
                partition: PartitionId,
                request: KafkaRequest<'static>,
                metadata_invalid: bool,
                delays: Box<Iterator<Item = Duration>>)
                -> SendOperation {
    let refresh: StaticBoxFuture<()> = if metadata_invalid {
        router.refresh_topic_metadata(vec![topic_name.clone()])
    } else {
        StaticBoxFuture::ok(())
    };

    refresh
        .then(move |refresh_result| {
            if let Err(err) = refresh_result {
                return retry_or_fail(router, topic_name, partition, request, err, delays, true);
            }

            let route = match router.topic_route(&topic_name, partition) {
                Ok(route) => route,
                Err(err) => {
                    return retry_or_fail(router,
                                         topic_name,
                                         partition,
                                         request,
                                         err,
                                         delays,
                                         true);
                }
            };

            let endpoint = route.connection.endpoint().uri().to_owned();

            route
                .connection
                .send(request.clone())
                .then(move |result| match result {
                    Ok(response) => {
                        match classify(&response) {
                            Classification::Success => StaticBoxFuture::ok(response),
                            Classification::Stale(code) => {
                                debug!("stale metadata for {}#{}, {:?}",
                                       topic_name,
                                       partition,
                                       code);

                                retry_or_fail(router,
                                              topic_name,
                                              partition,
                                              request,
                                              ErrorKind::RequestError(endpoint, code).into(),
                                              delays,
                                              true)
                            }
                            Classification::Retry(code) => {
                                debug!("retryable error for {}#{}, {:?}",
                                       topic_name,
                                       partition,
                                       code);

                                retry_or_fail(router,
                                              topic_name,
                                              partition,
                                              request,
                                              ErrorKind::RequestError(endpoint, code).into(),
                                              delays,
                                              false)
                            }
                            Classification::Fatal(KafkaCode::OffsetOutOfRange) => {
                                StaticBoxFuture::err(
                                    ErrorKind::OffsetOutOfRange(topic_name, partition).into())
                            }
                            Classification::Fatal(code) => {
                                StaticBoxFuture::err(
                                    ErrorKind::RequestError(endpoint, code).into())
                            }
                        }
                    }
                    Err(err) => {
                        if err.is_recoverable_by_refresh() {
                            retry_or_fail(router, topic_name, partition, request, err, delays, true)
                        } else {
                            StaticBoxFuture::err(err)
                        }
                    }
                })
                .static_boxed()
        })
        .static_boxed()
}

fn retry_or_fail(router: BrokerRouter,
                 topic_name: String,
                 partition: PartitionId,
                 request: KafkaRequest<'static>,
                 err: Error,
                 mut delays: Box<Iterator<Item = Duration>>,
                 refresh: bool)
                 -> SendOperation {
    match delays.next() {
        Some(delay) => {
            debug!("retrying {:?} for {}#{} in {:?}, {}",
                   request.api_key(),
                   topic_name,
                   partition,
                   delay,
                   err);

            router
                .timer()
                .sleep(delay)
                .map_err(|err| Error::from(ErrorKind::Msg(format!("timer error, {}", err))))
                .and_then(move |_| {
                              send_attempt(router, topic_name, partition, request, refresh, delays)
                          })
                .static_boxed()
        }
        None => StaticBoxFuture::err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::{ProducePartitionStatus, ProduceResponse, ProduceTopicStatus, ResponseHeader};

    fn produce_response(codes: &[i16]) -> Option<KafkaResponse> {
        Some(KafkaResponse::Produce(ProduceResponse {
            header: ResponseHeader { correlation_id: 0 },
            topics: vec![ProduceTopicStatus {
                             topic_name: "t".to_owned(),
                             partitions: codes
                                 .iter()
                                 .enumerate()
                                 .map(|(id, code)| {
                                          ProducePartitionStatus {
                                              partition_id: id as PartitionId,
                                              error_code: *code,
                                              base_offset: 0,
                                              log_append_time: None,
                                          }
                                      })
                                 .collect(),
                         }],
            throttle_time: None,
        }))
    }

    #[test]
    fn test_classify_success() {
        match classify(&produce_response(&[0, 0])) {
            Classification::Success => {}
            _ => panic!("all-clear response must classify as success"),
        }

        match classify(&None) {
            Classification::Success => {}
            _ => panic!("acks=0 has nothing to classify"),
        }
    }

    #[test]
    fn test_classify_stale() {
        match classify(&produce_response(&[6, 0, 5])) {
            Classification::Stale(KafkaCode::NotLeaderForPartition) => {}
            _ => panic!("leader errors must classify as stale metadata"),
        }
    }

    #[test]
    fn test_classify_retryable() {
        // a timeout next to a stale error keeps the batch retryable without refresh
        match classify(&produce_response(&[7, 6])) {
            Classification::Retry(KafkaCode::RequestTimedOut) => {}
            _ => panic!("mixed retryable errors must classify as retry"),
        }
    }

    #[test]
    fn test_classify_fatal() {
        match classify(&produce_response(&[21])) {
            Classification::Fatal(KafkaCode::InvalidRequiredAcks) => {}
            _ => panic!("non-retryable codes must surface"),
        }
    }
}
