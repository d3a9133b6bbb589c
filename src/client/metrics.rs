use prometheus::{CounterVec, Gauge, Opts, Registry};

use errors::{ErrorKind, Result};

/// Request/response counters and the producer's in-flight gauge, registered
/// on a private registry so embedding applications can scrape or ignore it.
pub struct Metrics {
    registry: Registry,
    requests: CounterVec,
    responses: CounterVec,
    in_flight: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Metrics> {
        let registry = Registry::new();

        let requests = CounterVec::new(Opts::new("kafka_requests_total",
                                                 "Requests sent to brokers."),
                                       &["endpoint"])
                .map_err(|err| ErrorKind::Msg(format!("fail to create metric, {}", err)))?;
        let responses = CounterVec::new(Opts::new("kafka_responses_total",
                                                  "Responses received from brokers."),
                                        &["endpoint"])
                .map_err(|err| ErrorKind::Msg(format!("fail to create metric, {}", err)))?;
        let in_flight = Gauge::new("kafka_produce_requests_in_flight",
                                   "Produce requests currently on the wire.")
                .map_err(|err| ErrorKind::Msg(format!("fail to create metric, {}", err)))?;

        registry
            .register(Box::new(requests.clone()))
            .map_err(|err| ErrorKind::Msg(format!("fail to register metric, {}", err)))?;
        registry
            .register(Box::new(responses.clone()))
            .map_err(|err| ErrorKind::Msg(format!("fail to register metric, {}", err)))?;
        registry
            .register(Box::new(in_flight.clone()))
            .map_err(|err| ErrorKind::Msg(format!("fail to register metric, {}", err)))?;

        Ok(Metrics {
               registry: registry,
               requests: requests,
               responses: responses,
               in_flight: in_flight,
           })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn request_sent(&self, endpoint: &str) {
        self.requests.with_label_values(&[endpoint]).inc();
    }

    pub fn response_received(&self, endpoint: &str) {
        self.responses.with_label_values(&[endpoint]).inc();
    }

    pub fn produce_started(&self) {
        self.in_flight.inc();
    }

    pub fn produce_finished(&self) {
        self.in_flight.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new().unwrap();

        metrics.request_sent("127.0.0.1:9092");
        metrics.request_sent("127.0.0.1:9092");
        metrics.response_received("127.0.0.1:9092");
        metrics.produce_started();
        metrics.produce_finished();

        let families = metrics.registry().gather();

        assert_eq!(families.len(), 3);
    }
}
