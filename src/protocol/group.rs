use std::borrow::Cow;

use bytes::{ByteOrder, BytesMut};

use nom::{be_i16, be_i32};

use errors::Result;
use protocol::{Encodable, ErrorCode, KafkaCode, ParseTag, RequestHeader, ResponseHeader,
               WriteExt, parse_response_header, parse_string};

/// Asks any broker which one coordinates the given consumer group.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupCoordinatorRequest<'a> {
    pub header: RequestHeader<'a>,
    pub group_id: Cow<'a, str>,
}

impl<'a> Encodable for GroupCoordinatorRequest<'a> {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()> {
        self.header.encode::<T>(dst)?;

        dst.put_str::<T, _>(Some(&self.group_id))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupCoordinatorResponse {
    pub header: ResponseHeader,
    pub error_code: ErrorCode,
    pub coordinator_id: i32,
    pub coordinator_host: String,
    pub coordinator_port: i32,
}

impl GroupCoordinatorResponse {
    pub fn error(&self) -> KafkaCode {
        KafkaCode::from(self.error_code)
    }
}

named!(pub parse_group_coordinator_response<GroupCoordinatorResponse>,
    parse_tag!(ParseTag::GroupCoordinatorResponse,
        do_parse!(
            header: parse_response_header
         >> error_code: be_i16
         >> coordinator_id: be_i32
         >> coordinator_host: parse_string
         >> coordinator_port: be_i32
         >> (GroupCoordinatorResponse {
                header: header,
                error_code: error_code,
                coordinator_id: coordinator_id,
                coordinator_host: coordinator_host,
                coordinator_port: coordinator_port,
            })
        )
    )
);
