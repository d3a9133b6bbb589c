use std::borrow::Cow;

use bytes::{BigEndian, BytesMut};

use nom::IResult;

use errors::{ErrorKind, Result};
use protocol::{ApiKeys, ApiVersion, CorrelationId, Encodable, FetchRequest,
               GroupCoordinatorRequest, KafkaCode, ListOffsetsRequest, MetadataRequest,
               ProduceRequest, RequestHeader, parse_fetch_response,
               parse_group_coordinator_response, parse_list_offsets_response,
               parse_metadata_response, parse_produce_response};
use protocol::fetch::FetchResponse;
use protocol::group::GroupCoordinatorResponse;
use protocol::list_offsets::ListOffsetsResponse;
use protocol::metadata::MetadataResponse;
use protocol::produce::ProduceResponse;

/// A request the connection can frame and correlate; one variant per ApiKey
/// the client speaks.
#[derive(Clone, Debug, PartialEq)]
pub enum KafkaRequest<'a> {
    Produce(ProduceRequest<'a>),
    Fetch(FetchRequest<'a>),
    ListOffsets(ListOffsetsRequest<'a>),
    Metadata(MetadataRequest<'a>),
    GroupCoordinator(GroupCoordinatorRequest<'a>),
}

impl<'a> KafkaRequest<'a> {
    pub fn header(&self) -> &RequestHeader<'a> {
        match *self {
            KafkaRequest::Produce(ref req) => &req.header,
            KafkaRequest::Fetch(ref req) => &req.header,
            KafkaRequest::ListOffsets(ref req) => &req.header,
            KafkaRequest::Metadata(ref req) => &req.header,
            KafkaRequest::GroupCoordinator(ref req) => &req.header,
        }
    }

    fn header_mut(&mut self) -> &mut RequestHeader<'a> {
        match *self {
            KafkaRequest::Produce(ref mut req) => &mut req.header,
            KafkaRequest::Fetch(ref mut req) => &mut req.header,
            KafkaRequest::ListOffsets(ref mut req) => &mut req.header,
            KafkaRequest::Metadata(ref mut req) => &mut req.header,
            KafkaRequest::GroupCoordinator(ref mut req) => &mut req.header,
        }
    }

    pub fn api_key(&self) -> ApiKeys {
        match *self {
            KafkaRequest::Produce(_) => ApiKeys::Produce,
            KafkaRequest::Fetch(_) => ApiKeys::Fetch,
            KafkaRequest::ListOffsets(_) => ApiKeys::ListOffsets,
            KafkaRequest::Metadata(_) => ApiKeys::Metadata,
            KafkaRequest::GroupCoordinator(_) => ApiKeys::GroupCoordinator,
        }
    }

    pub fn api_version(&self) -> ApiVersion {
        self.header().api_version
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.header().correlation_id
    }

    /// The connection owns correlation-id allocation and stamps the header on send.
    pub fn set_correlation_id(&mut self, correlation_id: CorrelationId) {
        self.header_mut().correlation_id = correlation_id;
    }

    /// An acks=0 produce is fire-and-forget; the broker sends nothing back.
    pub fn expects_response(&self) -> bool {
        match *self {
            KafkaRequest::Produce(ref req) => req.required_acks != 0,
            _ => true,
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) -> Result<()> {
        match *self {
            KafkaRequest::Produce(ref req) => req.encode::<BigEndian>(dst),
            KafkaRequest::Fetch(ref req) => req.encode::<BigEndian>(dst),
            KafkaRequest::ListOffsets(ref req) => req.encode::<BigEndian>(dst),
            KafkaRequest::Metadata(ref req) => req.encode::<BigEndian>(dst),
            KafkaRequest::GroupCoordinator(ref req) => req.encode::<BigEndian>(dst),
        }
    }

    pub fn fetch_metadata<S>(api_version: ApiVersion,
                             correlation_id: CorrelationId,
                             client_id: Option<Cow<'a, str>>,
                             topic_names: &[S])
                             -> Self
        where S: AsRef<str>
    {
        KafkaRequest::Metadata(MetadataRequest {
                                   header: RequestHeader {
                                       api_key: ApiKeys::Metadata.key(),
                                       api_version: api_version,
                                       correlation_id: correlation_id,
                                       client_id: client_id,
                                   },
                                   topic_names: topic_names
                                       .iter()
                                       .map(|s| Cow::from(s.as_ref().to_owned()))
                                       .collect(),
                               })
    }

    pub fn group_coordinator(api_version: ApiVersion,
                             correlation_id: CorrelationId,
                             client_id: Option<Cow<'a, str>>,
                             group_id: Cow<'a, str>)
                             -> Self {
        KafkaRequest::GroupCoordinator(GroupCoordinatorRequest {
                                           header: RequestHeader {
                                               api_key: ApiKeys::GroupCoordinator.key(),
                                               api_version: api_version,
                                               correlation_id: correlation_id,
                                               client_id: client_id,
                                           },
                                           group_id: group_id,
                                       })
    }
}

/// A decoded response body; the pending slot records which variant to expect.
#[derive(Clone, Debug, PartialEq)]
pub enum KafkaResponse {
    Produce(ProduceResponse),
    Fetch(FetchResponse),
    ListOffsets(ListOffsetsResponse),
    Metadata(MetadataResponse),
    GroupCoordinator(GroupCoordinatorResponse),
}

impl KafkaResponse {
    pub fn api_key(&self) -> ApiKeys {
        match *self {
            KafkaResponse::Produce(_) => ApiKeys::Produce,
            KafkaResponse::Fetch(_) => ApiKeys::Fetch,
            KafkaResponse::ListOffsets(_) => ApiKeys::ListOffsets,
            KafkaResponse::Metadata(_) => ApiKeys::Metadata,
            KafkaResponse::GroupCoordinator(_) => ApiKeys::GroupCoordinator,
        }
    }

    /// Decode a framed payload into the variant the request registered.
    pub fn parse(src: &[u8], api_key: ApiKeys, api_version: ApiVersion) -> Result<Self> {
        debug!("parsing {:?} response, api_version={}, {} bytes",
               api_key,
               api_version,
               src.len());

        match api_key {
            ApiKeys::Produce => {
                from_nom(parse_produce_response(src, api_version)).map(KafkaResponse::Produce)
            }
            ApiKeys::Fetch => {
                from_nom(parse_fetch_response(src, api_version)).map(KafkaResponse::Fetch)
            }
            ApiKeys::ListOffsets => {
                from_nom(parse_list_offsets_response(src)).map(KafkaResponse::ListOffsets)
            }
            ApiKeys::Metadata => {
                from_nom(parse_metadata_response(src)).map(KafkaResponse::Metadata)
            }
            ApiKeys::GroupCoordinator => {
                from_nom(parse_group_coordinator_response(src))
                    .map(KafkaResponse::GroupCoordinator)
            }
            _ => bail!(ErrorKind::UnexpectedResponse(api_key.key())),
        }
    }

    /// Every non-`None` broker error code carried in the response, for
    /// retry classification.
    pub fn error_codes(&self) -> Vec<KafkaCode> {
        let mut codes = Vec::new();

        match *self {
            KafkaResponse::Produce(ref res) => {
                for topic in &res.topics {
                    for partition in &topic.partitions {
                        codes.push(KafkaCode::from(partition.error_code));
                    }
                }
            }
            KafkaResponse::Fetch(ref res) => {
                for topic in &res.topics {
                    for partition in &topic.partitions {
                        codes.push(KafkaCode::from(partition.error_code));
                    }
                }
            }
            KafkaResponse::ListOffsets(ref res) => {
                for topic in &res.topics {
                    for partition in &topic.partitions {
                        codes.push(KafkaCode::from(partition.error_code));
                    }
                }
            }
            KafkaResponse::Metadata(ref res) => {
                for topic in &res.topics {
                    codes.push(KafkaCode::from(topic.error_code));

                    for partition in &topic.partitions {
                        codes.push(KafkaCode::from(partition.error_code));
                    }
                }
            }
            KafkaResponse::GroupCoordinator(ref res) => {
                codes.push(KafkaCode::from(res.error_code));
            }
        }

        codes.retain(|code| *code != KafkaCode::None);
        codes
    }
}

fn from_nom<T>(res: IResult<&[u8], T>) -> Result<T> {
    match res {
        IResult::Done(remaining, parsed) => {
            if !remaining.is_empty() {
                trace!("{} bytes left after response body", remaining.len());
            }

            Ok(parsed)
        }
        IResult::Incomplete(needed) => {
            warn!("truncated response, {:?} more required", needed);

            bail!(ErrorKind::CodecError("truncated response"))
        }
        IResult::Error(err) => {
            warn!("fail to parse response, {:?}", err);

            bail!(ErrorKind::CodecError("malformed response"))
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::BytesMut;

    use super::*;
    use protocol::{ProducePartitionData, ProduceTopicData};
    use protocol::message::MessageSet;
    use compression::Compression;

    fn produce_request(required_acks: i16) -> KafkaRequest<'static> {
        KafkaRequest::Produce(ProduceRequest {
                                  header: RequestHeader {
                                      api_key: ApiKeys::Produce.key(),
                                      api_version: 0,
                                      correlation_id: 0,
                                      client_id: None,
                                  },
                                  required_acks: required_acks,
                                  ack_timeout: 100,
                                  message_version: 0,
                                  compression: Compression::None,
                                  topics: vec![ProduceTopicData {
                                                   topic_name: "t".to_owned(),
                                                   partitions: vec![ProducePartitionData {
                                                        partition_id: 0,
                                                        message_set: MessageSet::default(),
                                                    }],
                                               }],
                              })
    }

    #[test]
    fn test_expects_response() {
        assert!(!produce_request(0).expects_response());
        assert!(produce_request(1).expects_response());
        assert!(produce_request(-1).expects_response());

        let req = KafkaRequest::fetch_metadata::<&str>(0, 1, None, &[]);
        assert!(req.expects_response());
    }

    #[test]
    fn test_correlation_id_stamping() {
        let mut req = KafkaRequest::fetch_metadata::<&str>(0, 0, None, &["t"]);

        req.set_correlation_id(42);

        assert_eq!(req.correlation_id(), 42);
        assert_eq!(req.api_key(), ApiKeys::Metadata);

        let mut buf = BytesMut::with_capacity(64);

        req.encode(&mut buf).unwrap();

        assert_eq!(&buf[4..8], &[0, 0, 0, 42][..]);
    }

    #[test]
    fn test_parse_dispatches_on_registered_key() {
        // a group coordinator response body
        let data = vec![0, 0, 0, 3, 0, 0, 0, 0, 0, 1, 0, 1, b'h', 0, 0, 0, 80];

        match KafkaResponse::parse(&data, ApiKeys::GroupCoordinator, 0).unwrap() {
            KafkaResponse::GroupCoordinator(res) => {
                assert_eq!(res.coordinator_id, 1);
                assert_eq!(res.coordinator_host, "h");
                assert_eq!(res.coordinator_port, 80);
            }
            res => panic!("unexpected response: {:?}", res),
        }

        assert!(KafkaResponse::parse(&data, ApiKeys::Metadata, 0).is_err());
    }
}
