use bytes::{BufMut, ByteOrder, BytesMut};

use nom::{be_i16, be_i32, be_i64};

use compression::{self, Compression};
use errors::Result;
use protocol::{ApiVersion, Encodable, ErrorCode, Message, MessageSet, MessageSetEncoder, Offset,
               ParseTag, PartitionId, RequestHeader, ResponseHeader, Timestamp, WriteExt,
               parse_response_header, parse_string};

/// ProduceRequest => RequiredAcks Timeout [TopicName [Partition MessageSetSize MessageSet]]
#[derive(Clone, Debug, PartialEq)]
pub struct ProduceRequest<'a> {
    pub header: RequestHeader<'a>,
    /// How many acknowledgements the brokers should receive before responding.
    pub required_acks: i16,
    /// Maximum time in milliseconds the broker can await the receipt of the
    /// number of acknowledgements.
    pub ack_timeout: i32,
    /// The message format written into the sets.
    pub message_version: ApiVersion,
    /// Codec applied to every message set of this request.
    pub compression: Compression,
    pub topics: Vec<ProduceTopicData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProduceTopicData {
    pub topic_name: String,
    pub partitions: Vec<ProducePartitionData>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProducePartitionData {
    pub partition_id: PartitionId,
    pub message_set: MessageSet,
}

impl<'a> Encodable for ProduceRequest<'a> {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()> {
        self.header.encode::<T>(dst)?;

        dst.put_i16::<T>(self.required_acks);
        dst.put_i32::<T>(self.ack_timeout);

        let encoder = MessageSetEncoder::new(self.message_version);
        let message_version = self.message_version;
        let codec = self.compression;

        dst.put_array::<T, _, _>(&self.topics, |buf, topic| {
            buf.put_str::<T, _>(Some(&topic.topic_name))?;
            buf.put_array::<T, _, _>(&topic.partitions, |buf, partition| {
                buf.put_i32::<T>(partition.partition_id);

                let mut message_set = BytesMut::with_capacity(64);
                encoder.encode(&partition.message_set, &mut message_set)?;

                let message_set = if codec == Compression::None ||
                                     partition.message_set.messages.is_empty() {
                    message_set
                } else {
                    wrap_compressed(&encoder,
                                    message_version,
                                    codec,
                                    &message_set,
                                    partition.message_set.messages.len())?
                };

                buf.put_i32::<T>(message_set.len() as i32);
                buf.put_slice(&message_set);

                Ok(())
            })
        })
    }
}

/// Compress an encoded message set and rewrap it as a single-message set whose
/// value carries the compressed bytes.
fn wrap_compressed(encoder: &MessageSetEncoder,
                   message_version: ApiVersion,
                   codec: Compression,
                   encoded: &BytesMut,
                   count: usize)
                   -> Result<BytesMut> {
    let compressed = compression::compress(codec, encoded)?;

    let wrapper = MessageSet {
        messages: vec![Message {
                           // names the last inner message under the v1 format
                           offset: if message_version > 0 {
                               count as Offset - 1
                           } else {
                               0
                           },
                           timestamp: None,
                           compression: codec,
                           key: None,
                           value: Some(compressed.into()),
                       }],
    };

    let mut buf = BytesMut::with_capacity(64);
    encoder.encode(&wrapper, &mut buf)?;

    Ok(buf)
}

/// v0: [TopicName [Partition ErrorCode Offset]]
/// v1 adds a trailing throttle time, v2 a per-partition log append time.
#[derive(Clone, Debug, PartialEq)]
pub struct ProduceResponse {
    pub header: ResponseHeader,
    pub topics: Vec<ProduceTopicStatus>,
    /// Duration in milliseconds for which the request was throttled due to quota violation.
    pub throttle_time: Option<i32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProduceTopicStatus {
    pub topic_name: String,
    pub partitions: Vec<ProducePartitionStatus>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProducePartitionStatus {
    pub partition_id: PartitionId,
    pub error_code: ErrorCode,
    /// Offset assigned to the first message in the produced set.
    pub base_offset: Offset,
    pub log_append_time: Option<Timestamp>,
}

named_args!(pub parse_produce_response(api_version: ApiVersion)<ProduceResponse>,
    parse_tag!(ParseTag::ProduceResponse,
        do_parse!(
            header: parse_response_header
         >> topics: length_count!(be_i32, apply!(parse_produce_topic_status, api_version))
         >> throttle_time: cond!(api_version > 0, be_i32)
         >> (ProduceResponse {
                header: header,
                topics: topics,
                throttle_time: throttle_time,
            })
        )
    )
);

named_args!(parse_produce_topic_status(api_version: ApiVersion)<ProduceTopicStatus>,
    do_parse!(
        topic_name: parse_string
     >> partitions: length_count!(be_i32, apply!(parse_produce_partition_status, api_version))
     >> (ProduceTopicStatus {
            topic_name: topic_name,
            partitions: partitions,
        })
    )
);

named_args!(parse_produce_partition_status(api_version: ApiVersion)<ProducePartitionStatus>,
    do_parse!(
        partition_id: be_i32
     >> error_code: be_i16
     >> base_offset: be_i64
     >> log_append_time: cond!(api_version > 1, be_i64)
     >> (ProducePartitionStatus {
            partition_id: partition_id,
            error_code: error_code,
            base_offset: base_offset,
            log_append_time: log_append_time,
        })
    )
);
