use std::borrow::Cow;

use bytes::{BufMut, ByteOrder, BytesMut};

use nom::{be_i16, be_i32};

use errors::Result;
use protocol::{Encodable, ErrorCode, KafkaCode, ParseTag, PartitionId, RequestHeader,
               ResponseHeader, WriteExt, parse_response_header, parse_string};

/// Asks the cluster for broker endpoints and the layout of the named topics;
/// an empty topic list means "all topics".
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataRequest<'a> {
    pub header: RequestHeader<'a>,
    pub topic_names: Vec<Cow<'a, str>>,
}

impl<'a> Encodable for MetadataRequest<'a> {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()> {
        self.header.encode::<T>(dst)?;

        dst.put_array::<T, _, _>(&self.topic_names, |buf, topic_name| {
            buf.put_str::<T, _>(Some(topic_name))
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MetadataResponse {
    pub header: ResponseHeader,
    pub brokers: Vec<BrokerMetadata>,
    pub topics: Vec<TopicMetadata>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BrokerMetadata {
    /// The broker id.
    pub node_id: i32,
    /// The hostname of the broker.
    pub host: String,
    /// The port on which the broker accepts requests.
    pub port: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TopicMetadata {
    pub error_code: ErrorCode,
    pub topic_name: String,
    pub partitions: Vec<PartitionMetadata>,
}

impl TopicMetadata {
    pub fn error(&self) -> KafkaCode {
        KafkaCode::from(self.error_code)
    }

    /// Partitions ordered by id; the wire order is not guaranteed.
    pub fn sorted_partitions(&self) -> Vec<&PartitionMetadata> {
        let mut partitions: Vec<&PartitionMetadata> = self.partitions.iter().collect();
        partitions.sort_by_key(|partition| partition.partition_id);
        partitions
    }

    pub fn partition(&self, partition_id: PartitionId) -> Option<&PartitionMetadata> {
        self.partitions
            .iter()
            .find(|partition| partition.partition_id == partition_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionMetadata {
    pub error_code: ErrorCode,
    pub partition_id: PartitionId,
    /// The broker id of the leader, or -1 while a leader election is in progress.
    pub leader: i32,
    pub replicas: Vec<i32>,
    pub isr: Vec<i32>,
}

impl PartitionMetadata {
    pub fn error(&self) -> KafkaCode {
        KafkaCode::from(self.error_code)
    }
}

named!(pub parse_metadata_response<MetadataResponse>,
    parse_tag!(ParseTag::MetadataResponse,
        do_parse!(
            header: parse_response_header
         >> brokers: length_count!(be_i32, parse_broker_metadata)
         >> topics: length_count!(be_i32, parse_topic_metadata)
         >> (MetadataResponse {
                header: header,
                brokers: brokers,
                topics: topics,
            })
        )
    )
);

named!(parse_broker_metadata<BrokerMetadata>,
    parse_tag!(ParseTag::BrokerMetadata,
        do_parse!(
            node_id: be_i32
         >> host: parse_string
         >> port: be_i32
         >> (BrokerMetadata {
                node_id: node_id,
                host: host,
                port: port,
            })
        )
    )
);

named!(parse_topic_metadata<TopicMetadata>,
    parse_tag!(ParseTag::TopicMetadata,
        do_parse!(
            error_code: be_i16
         >> topic_name: parse_string
         >> partitions: length_count!(be_i32, parse_partition_metadata)
         >> (TopicMetadata {
                error_code: error_code,
                topic_name: topic_name,
                partitions: partitions,
            })
        )
    )
);

named!(parse_partition_metadata<PartitionMetadata>,
    parse_tag!(ParseTag::PartitionMetadata,
        do_parse!(
            error_code: be_i16
         >> partition_id: be_i32
         >> leader: be_i32
         >> replicas: length_count!(be_i32, be_i32)
         >> isr: length_count!(be_i32, be_i32)
         >> (PartitionMetadata {
                error_code: error_code,
                partition_id: partition_id,
                leader: leader,
                replicas: replicas,
                isr: isr,
            })
        )
    )
);

#[cfg(test)]
mod tests {
    use bytes::BigEndian;

    use nom::IResult;

    use super::*;
    use protocol::ApiKeys;

    lazy_static!{
        static ref TEST_REQUEST_DATA: Vec<u8> = vec![
            // RequestHeader
            0, 3,                               // api_key
            0, 0,                               // api_version
            0, 0, 0, 123,                       // correlation_id
            0, 6, b'c', b'l', b'i', b'e', b'n', b't',
            // topic_names: [string]
            0, 0, 0, 1,
                0, 5, b't', b'o', b'p', b'i', b'c',
        ];

        static ref TEST_RESPONSE_DATA: Vec<u8> = vec![
            // ResponseHeader
            0, 0, 0, 123,   // correlation_id
            // brokers: [BrokerMetadata]
            0, 0, 0, 1,
                0, 0, 0, 0,                                 // node_id
                0, 9, b'l', b'o', b'c', b'a', b'l', b'h', b'o', b's', b't',
                0, 0, 0x23, 0x84,                           // port 9092
            // topics: [TopicMetadata]
            0, 0, 0, 1,
                0, 0,                                       // error_code
                0, 5, b't', b'o', b'p', b'i', b'c',
                // partitions: [PartitionMetadata]
                0, 0, 0, 1,
                    0, 0,                                   // error_code
                    0, 0, 0, 0,                             // partition_id
                    0, 0, 0, 0,                             // leader
                    0, 0, 0, 1, 0, 0, 0, 0,                 // replicas
                    0, 0, 0, 1, 0, 0, 0, 0,                 // isr
        ];

        static ref TEST_RESPONSE: MetadataResponse = MetadataResponse {
            header: ResponseHeader { correlation_id: 123 },
            brokers: vec![BrokerMetadata {
                node_id: 0,
                host: "localhost".to_owned(),
                port: 9092,
            }],
            topics: vec![TopicMetadata {
                error_code: 0,
                topic_name: "topic".to_owned(),
                partitions: vec![PartitionMetadata {
                    error_code: 0,
                    partition_id: 0,
                    leader: 0,
                    replicas: vec![0],
                    isr: vec![0],
                }],
            }],
        };
    }

    #[test]
    fn test_encode_metadata_request() {
        let req = MetadataRequest {
            header: RequestHeader {
                api_key: ApiKeys::Metadata.key(),
                api_version: 0,
                correlation_id: 123,
                client_id: Some("client".into()),
            },
            topic_names: vec!["topic".into()],
        };

        let mut buf = BytesMut::with_capacity(128);

        req.encode::<BigEndian>(&mut buf).unwrap();

        assert_eq!(&buf[..], &TEST_REQUEST_DATA[..]);
    }

    #[test]
    fn test_parse_metadata_response() {
        assert_eq!(parse_metadata_response(TEST_RESPONSE_DATA.as_slice()),
                   IResult::Done(&[][..], TEST_RESPONSE.clone()));
    }

    #[test]
    fn test_sorted_partitions() {
        let topic = TopicMetadata {
            error_code: 0,
            topic_name: "topic".to_owned(),
            partitions: vec![PartitionMetadata {
                                 error_code: 0,
                                 partition_id: 2,
                                 leader: 1,
                                 replicas: vec![],
                                 isr: vec![],
                             },
                             PartitionMetadata {
                                 error_code: 0,
                                 partition_id: 0,
                                 leader: 0,
                                 replicas: vec![],
                                 isr: vec![],
                             }],
        };

        let sorted = topic.sorted_partitions();

        assert_eq!(sorted.iter().map(|p| p.partition_id).collect::<Vec<_>>(),
                   vec![0, 2]);
        assert_eq!(topic.partition(2).map(|p| p.leader), Some(1));
        assert!(topic.partition(1).is_none());
    }
}
