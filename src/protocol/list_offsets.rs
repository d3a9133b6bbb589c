use bytes::{BufMut, ByteOrder, BytesMut};

use nom::{be_i16, be_i32, be_i64};

use errors::Result;
use protocol::{Encodable, ErrorCode, FetchOffset, KafkaCode, Offset, ParseTag, PartitionId,
               RequestHeader, ResponseHeader, WriteExt, parse_response_header, parse_string};

use protocol::fetch::CONSUMER_REPLICA_ID;

/// OffsetRequest => ReplicaId [TopicName [Partition Time MaxNumberOfOffsets]]
#[derive(Clone, Debug, PartialEq)]
pub struct ListOffsetsRequest<'a> {
    pub header: RequestHeader<'a>,
    pub replica_id: i32,
    pub topics: Vec<ListOffsetsTopic>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListOffsetsTopic {
    pub topic_name: String,
    pub partitions: Vec<ListOffsetsPartition>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListOffsetsPartition {
    pub partition_id: PartitionId,
    /// Used to ask for all messages before a certain time (ms); -1 latest, -2 earliest.
    pub timestamp: i64,
    pub max_number_of_offsets: i32,
}

impl ListOffsetsPartition {
    pub fn new(partition_id: PartitionId, offset: FetchOffset) -> Self {
        ListOffsetsPartition {
            partition_id: partition_id,
            timestamp: offset.into(),
            max_number_of_offsets: 1,
        }
    }
}

impl<'a> ListOffsetsRequest<'a> {
    pub fn replica_id() -> i32 {
        CONSUMER_REPLICA_ID
    }
}

impl<'a> Encodable for ListOffsetsRequest<'a> {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()> {
        self.header.encode::<T>(dst)?;

        dst.put_i32::<T>(self.replica_id);
        dst.put_array::<T, _, _>(&self.topics, |buf, topic| {
            buf.put_str::<T, _>(Some(&topic.topic_name))?;
            buf.put_array::<T, _, _>(&topic.partitions, |buf, partition| {
                buf.put_i32::<T>(partition.partition_id);
                buf.put_i64::<T>(partition.timestamp);
                buf.put_i32::<T>(partition.max_number_of_offsets);
                Ok(())
            })
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListOffsetsResponse {
    pub header: ResponseHeader,
    pub topics: Vec<ListOffsetsTopicData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ListOffsetsTopicData {
    pub topic_name: String,
    pub partitions: Vec<PartitionOffsetData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PartitionOffsetData {
    pub partition_id: PartitionId,
    pub error_code: ErrorCode,
    /// Offsets found, newest first.
    pub offsets: Vec<Offset>,
}

impl PartitionOffsetData {
    pub fn error(&self) -> KafkaCode {
        KafkaCode::from(self.error_code)
    }
}

named!(pub parse_list_offsets_response<ListOffsetsResponse>,
    parse_tag!(ParseTag::ListOffsetsResponse,
        do_parse!(
            header: parse_response_header
         >> topics: length_count!(be_i32, parse_list_offsets_topic_data)
         >> (ListOffsetsResponse {
                header: header,
                topics: topics,
            })
        )
    )
);

named!(parse_list_offsets_topic_data<ListOffsetsTopicData>,
    do_parse!(
        topic_name: parse_string
     >> partitions: length_count!(be_i32, parse_partition_offset_data)
     >> (ListOffsetsTopicData {
            topic_name: topic_name,
            partitions: partitions,
        })
    )
);

named!(parse_partition_offset_data<PartitionOffsetData>,
    do_parse!(
        partition_id: be_i32
     >> error_code: be_i16
     >> offsets: length_count!(be_i32, be_i64)
     >> (PartitionOffsetData {
            partition_id: partition_id,
            error_code: error_code,
            offsets: offsets,
        })
    )
);

#[cfg(test)]
mod tests {
    use bytes::BigEndian;

    use nom::IResult;

    use super::*;
    use protocol::ApiKeys;

    #[test]
    fn test_encode_list_offsets_request() {
        let req = ListOffsetsRequest {
            header: RequestHeader {
                api_key: ApiKeys::ListOffsets.key(),
                api_version: 0,
                correlation_id: 5,
                client_id: None,
            },
            replica_id: ListOffsetsRequest::replica_id(),
            topics: vec![ListOffsetsTopic {
                             topic_name: "t".to_owned(),
                             partitions: vec![ListOffsetsPartition::new(1, FetchOffset::Earliest)],
                         }],
        };

        let mut buf = BytesMut::with_capacity(128);

        req.encode::<BigEndian>(&mut buf).unwrap();

        assert_eq!(&buf[..],
                   &[0, 2, 0, 0, 0, 0, 0, 5, 255, 255,  // header
                     255, 255, 255, 255,                 // replica_id
                     0, 0, 0, 1,
                     0, 1, b't',
                     0, 0, 0, 1,
                     0, 0, 0, 1,                         // partition
                     255, 255, 255, 255, 255, 255, 255, 254, // earliest
                     0, 0, 0, 1                          /* max offsets */][..]);
    }

    #[test]
    fn test_parse_list_offsets_response() {
        let data = vec![
            0, 0, 0, 5,
            0, 0, 0, 1,
                0, 1, b't',
                0, 0, 0, 1,
                    0, 0, 0, 1,                 // partition
                    0, 0,                       // error_code
                    0, 0, 0, 1,
                        0, 0, 0, 0, 0, 0, 0, 12,
        ];

        let response = ListOffsetsResponse {
            header: ResponseHeader { correlation_id: 5 },
            topics: vec![ListOffsetsTopicData {
                             topic_name: "t".to_owned(),
                             partitions: vec![PartitionOffsetData {
                                                  partition_id: 1,
                                                  error_code: 0,
                                                  offsets: vec![12],
                                              }],
                         }],
        };

        assert_eq!(parse_list_offsets_response(&data[..]),
                   IResult::Done(&[][..], response));
    }
}
