use std::str;

use bytes::{Buf, BufMut};

use errors::{Error, ErrorKind};
use serialization::{Deserializer, Serializer};

/// Writes UTF-8 text as its bytes.
#[derive(Clone, Debug, Default)]
pub struct StringSerializer {}

impl Serializer for StringSerializer {
    type Item = String;
    type Error = Error;

    fn serialize_to<B: BufMut>(&self,
                               _topic_name: &str,
                               data: Self::Item,
                               buf: &mut B)
                               -> Result<(), Self::Error> {
        buf.put_slice(data.as_bytes());
        Ok(())
    }
}

/// Reads the remaining payload as UTF-8 text.
#[derive(Clone, Debug, Default)]
pub struct StringDeserializer {}

impl Deserializer for StringDeserializer {
    type Item = String;
    type Error = Error;

    fn deserialize_to<B: Buf>(&self,
                              _topic_name: &str,
                              buf: &mut B,
                              data: &mut Self::Item)
                              -> Result<(), Self::Error> {
        let bytes: Vec<u8> = buf.by_ref().collect();

        *data = String::from_utf8(bytes)
            .map_err(|_| Error::from(ErrorKind::CodecError("malformed utf-8 payload")))?;

        Ok(())
    }
}
