use bytes::{BufMut, ByteOrder, BytesMut};

use nom::{be_i16, be_i32, be_i64};

use errors::Result;
use protocol::{ApiVersion, Encodable, ErrorCode, KafkaCode, MessageSet, Offset, ParseTag,
               PartitionId, RequestHeader, ResponseHeader, WriteExt, parse_message_set,
               parse_response_header, parse_string};

/// Replica id of an ordinary consumer.
pub const CONSUMER_REPLICA_ID: i32 = -1;

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest<'a> {
    pub header: RequestHeader<'a>,
    /// The replica id indicates the node id of the replica initiating this request.
    pub replica_id: i32,
    /// The maximum amount of time in milliseconds to block waiting if insufficient data is available at the time the request is issued.
    pub max_wait_time: i32,
    /// This is the minimum number of bytes of messages that must be available to give a response.
    pub min_bytes: i32,
    pub topics: Vec<FetchTopic>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchTopic {
    pub topic_name: String,
    pub partitions: Vec<FetchPartition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchPartition {
    pub partition_id: PartitionId,
    /// The offset to begin this fetch from.
    pub fetch_offset: Offset,
    /// The maximum bytes to include in the message set for this partition.
    pub max_bytes: i32,
}

impl<'a> Encodable for FetchRequest<'a> {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()> {
        self.header.encode::<T>(dst)?;

        dst.put_i32::<T>(self.replica_id);
        dst.put_i32::<T>(self.max_wait_time);
        dst.put_i32::<T>(self.min_bytes);
        dst.put_array::<T, _, _>(&self.topics, |buf, topic| {
            buf.put_str::<T, _>(Some(&topic.topic_name))?;
            buf.put_array::<T, _, _>(&topic.partitions, |buf, partition| {
                buf.put_i32::<T>(partition.partition_id);
                buf.put_i64::<T>(partition.fetch_offset);
                buf.put_i32::<T>(partition.max_bytes);
                Ok(())
            })
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchResponse {
    pub header: ResponseHeader,
    /// Duration in milliseconds for which the request was throttled due to quota violation.
    pub throttle_time: Option<i32>,
    pub topics: Vec<FetchTopicData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchTopicData {
    pub topic_name: String,
    pub partitions: Vec<FetchPartitionData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchPartitionData {
    pub partition_id: PartitionId,
    pub error_code: ErrorCode,
    /// The offset at the end of the log for this partition.
    pub highwater_mark_offset: Offset,
    pub message_set: MessageSet,
    /// Buffer size a retry needs when the first message did not fit.
    pub required_buffer: Option<usize>,
}

impl FetchPartitionData {
    pub fn error(&self) -> KafkaCode {
        KafkaCode::from(self.error_code)
    }
}

named_args!(pub parse_fetch_response(api_version: ApiVersion)<FetchResponse>,
    parse_tag!(ParseTag::FetchResponse,
        do_parse!(
            header: parse_response_header
         >> throttle_time: cond!(api_version > 0, be_i32)
         >> topics: parse_tag!(ParseTag::FetchTopics,
                length_count!(be_i32, parse_fetch_topic_data))
         >> (FetchResponse {
                header: header,
                throttle_time: throttle_time,
                topics: topics,
            })
        )
    )
);

named!(parse_fetch_topic_data<FetchTopicData>,
    do_parse!(
        topic_name: parse_string
     >> partitions: parse_tag!(ParseTag::FetchPartitions,
            length_count!(be_i32, parse_fetch_partition_data))
     >> (FetchTopicData {
            topic_name: topic_name,
            partitions: partitions,
        })
    )
);

named!(parse_fetch_partition_data<FetchPartitionData>,
    do_parse!(
        partition_id: be_i32
     >> error_code: be_i16
     >> highwater_mark_offset: be_i64
     >> parsed: map_res!(length_bytes!(be_i32), parse_message_set)
     >> (FetchPartitionData {
            partition_id: partition_id,
            error_code: error_code,
            highwater_mark_offset: highwater_mark_offset,
            message_set: parsed.0,
            required_buffer: parsed.1,
        })
    )
);

#[cfg(test)]
mod tests {
    use bytes::{BigEndian, Bytes};

    use super::*;
    use compression::Compression;
    use protocol::{ApiKeys, Message, MessageSetEncoder};

    #[test]
    fn test_encode_fetch_request() {
        let req = FetchRequest {
            header: RequestHeader {
                api_key: ApiKeys::Fetch.key(),
                api_version: 0,
                correlation_id: 7,
                client_id: None,
            },
            replica_id: CONSUMER_REPLICA_ID,
            max_wait_time: 100,
            min_bytes: 1,
            topics: vec![FetchTopic {
                             topic_name: "t".to_owned(),
                             partitions: vec![FetchPartition {
                                                  partition_id: 0,
                                                  fetch_offset: 42,
                                                  max_bytes: 4096,
                                              }],
                         }],
        };

        let mut buf = BytesMut::with_capacity(128);

        req.encode::<BigEndian>(&mut buf).unwrap();

        assert_eq!(&buf[..],
                   &[0, 1,                       // api_key
                     0, 0,                       // api_version
                     0, 0, 0, 7,                 // correlation_id
                     255, 255,                   // client_id
                     255, 255, 255, 255,         // replica_id
                     0, 0, 0, 100,               // max_wait_time
                     0, 0, 0, 1,                 // min_bytes
                     0, 0, 0, 1,                 // topic count
                     0, 1, b't',
                     0, 0, 0, 1,                 // partition count
                     0, 0, 0, 0,                 // partition
                     0, 0, 0, 0, 0, 0, 0, 42,    // fetch_offset
                     0, 0, 16, 0                 /* max_bytes */][..]);
    }

    #[test]
    fn test_parse_fetch_response() {
        let mut message_set = BytesMut::with_capacity(128);

        MessageSetEncoder::new(0)
            .encode(&MessageSet {
                         messages: vec![Message {
                                            offset: 3,
                                            timestamp: None,
                                            compression: Compression::None,
                                            key: None,
                                            value: Some(Bytes::from_static(b"payload")),
                                        }],
                     },
                    &mut message_set)
            .unwrap();

        let mut data = vec![
            0, 0, 0, 9,                         // correlation_id
            0, 0, 0, 1,                         // topic count
                0, 1, b't',
                0, 0, 0, 1,                     // partition count
                    0, 0, 0, 0,                 // partition
                    0, 0,                       // error_code
                    0, 0, 0, 0, 0, 0, 0, 4,     // highwater mark
        ];
        data.extend_from_slice(&[0, 0, 0, message_set.len() as u8]);
        data.extend_from_slice(&message_set);

        match parse_fetch_response(&data[..], 0) {
            ::nom::IResult::Done(remaining, response) => {
                assert_eq!(remaining, &b""[..]);
                assert_eq!(response.header.correlation_id, 9);
                assert_eq!(response.throttle_time, None);

                let partition = &response.topics[0].partitions[0];

                assert_eq!(partition.partition_id, 0);
                assert_eq!(partition.error(), KafkaCode::None);
                assert_eq!(partition.highwater_mark_offset, 4);
                assert_eq!(partition.required_buffer, None);
                assert_eq!(partition.message_set.messages[0].offset, 3);
                assert_eq!(partition.message_set.messages[0].value,
                           Some(Bytes::from_static(b"payload")));
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn test_parse_fetch_response_underrun() {
        // a 100-byte message truncated to its first 20 bytes
        let mut data = vec![
            0, 0, 0, 9,
            0, 0, 0, 1,
                0, 1, b't',
                0, 0, 0, 1,
                    0, 0, 0, 0,
                    0, 0,
                    0, 0, 0, 0, 0, 0, 1, 0,
                    0, 0, 0, 20,                // message set size
                    0, 0, 0, 0, 0, 0, 0, 0,     // offset
                    0, 0, 0, 100,               // declared message size
        ];
        data.extend_from_slice(&[0u8; 8]);      // truncated body

        match parse_fetch_response(&data[..], 0) {
            ::nom::IResult::Done(_, response) => {
                let partition = &response.topics[0].partitions[0];

                assert!(partition.message_set.messages.is_empty());
                assert_eq!(partition.required_buffer, Some(112));
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }
}
