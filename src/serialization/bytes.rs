use bytes::{Buf, BufMut, Bytes};

use errors::Error;
use serialization::{Deserializer, Serializer};

/// Passes `Bytes` through untouched.
#[derive(Clone, Debug, Default)]
pub struct BytesSerializer {}

impl Serializer for BytesSerializer {
    type Item = Bytes;
    type Error = Error;

    fn serialize_to<B: BufMut>(&self,
                               _topic_name: &str,
                               data: Self::Item,
                               buf: &mut B)
                               -> Result<(), Self::Error> {
        buf.put_slice(&data);
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct BytesDeserializer {}

impl Deserializer for BytesDeserializer {
    type Item = Bytes;
    type Error = Error;

    fn deserialize_to<B: Buf>(&self,
                              _topic_name: &str,
                              buf: &mut B,
                              data: &mut Self::Item)
                              -> Result<(), Self::Error> {
        let bytes: Vec<u8> = buf.by_ref().collect();

        *data = bytes.into();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_round_trip() {
        let serialized = BytesSerializer::default()
            .serialize("topic", Bytes::from_static(b"payload"))
            .unwrap();

        assert_eq!(serialized, Bytes::from_static(b"payload"));

        let deserialized = BytesDeserializer::default()
            .deserialize("topic", &mut Cursor::new(serialized))
            .unwrap();

        assert_eq!(deserialized, Bytes::from_static(b"payload"));
    }
}
