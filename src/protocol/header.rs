use std::borrow::Cow;

use bytes::{BufMut, ByteOrder, BytesMut};

use nom::be_i32;

use errors::Result;
use protocol::{ApiKey, ApiVersion, CorrelationId, Encodable, ParseTag, WriteExt};

/// Every framed request starts with this header; the broker echoes the
/// correlation id at the start of the matching response.
#[derive(Clone, Debug, PartialEq)]
pub struct RequestHeader<'a> {
    pub api_key: ApiKey,
    pub api_version: ApiVersion,
    pub correlation_id: CorrelationId,
    pub client_id: Option<Cow<'a, str>>,
}

impl<'a> Encodable for RequestHeader<'a> {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()> {
        dst.put_i16::<T>(self.api_key);
        dst.put_i16::<T>(self.api_version);
        dst.put_i32::<T>(self.correlation_id);
        dst.put_str::<T, _>(self.client_id.as_ref())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResponseHeader {
    pub correlation_id: CorrelationId,
}

named!(pub parse_response_header<ResponseHeader>,
    parse_tag!(ParseTag::ResponseHeader,
        do_parse!(
            correlation_id: be_i32
         >> (ResponseHeader {
                correlation_id: correlation_id,
            })
        )
    )
);

named!(pub parse_correlation_id<CorrelationId>, peek!(be_i32));

#[cfg(test)]
mod tests {
    use bytes::BigEndian;

    use nom::IResult;

    use super::*;

    #[test]
    fn test_encode_request_header() {
        let header = RequestHeader {
            api_key: 3,
            api_version: 0,
            correlation_id: 123,
            client_id: Some("client".into()),
        };

        let mut buf = BytesMut::with_capacity(64);

        header.encode::<BigEndian>(&mut buf).unwrap();

        assert_eq!(&buf[..],
                   &[0, 3,                               // api_key
                     0, 0,                               // api_version
                     0, 0, 0, 123,                       // correlation_id
                     0, 6, 99, 108, 105, 101, 110, 116   /* client_id */][..]);
    }

    #[test]
    fn test_encode_request_header_without_client_id() {
        let header = RequestHeader {
            api_key: 0,
            api_version: 1,
            correlation_id: -1,
            client_id: None,
        };

        let mut buf = BytesMut::with_capacity(64);

        header.encode::<BigEndian>(&mut buf).unwrap();

        assert_eq!(&buf[..], &[0, 0, 0, 1, 255, 255, 255, 255, 255, 255][..]);
    }

    #[test]
    fn test_parse_response_header() {
        assert_eq!(parse_response_header(&[0, 0, 0, 123, 42][..]),
                   IResult::Done(&[42][..],
                                 ResponseHeader { correlation_id: 123 }));
    }

    #[test]
    fn test_parse_correlation_id_does_not_consume() {
        assert_eq!(parse_correlation_id(&[0, 0, 0, 7, 1, 2][..]),
                   IResult::Done(&[0, 0, 0, 7, 1, 2][..], 7));
    }
}
