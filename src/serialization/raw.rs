use std::marker::PhantomData;

use bytes::{Buf, BufMut};

use errors::Error;
use serialization::{Deserializer, Serializer};

/// Writes anything byte-like verbatim.
#[derive(Clone, Debug, Default)]
pub struct RawSerializer<T> {
    phantom: PhantomData<T>,
}

impl<T: AsRef<[u8]>> Serializer for RawSerializer<T> {
    type Item = T;
    type Error = Error;

    fn serialize_to<B: BufMut>(&self,
                               _topic_name: &str,
                               data: Self::Item,
                               buf: &mut B)
                               -> Result<(), Self::Error> {
        buf.put_slice(data.as_ref());
        Ok(())
    }
}

/// Reads the remaining payload as raw bytes.
#[derive(Clone, Debug, Default)]
pub struct RawDeserializer {}

impl Deserializer for RawDeserializer {
    type Item = Vec<u8>;
    type Error = Error;

    fn deserialize_to<B: Buf>(&self,
                              _topic_name: &str,
                              buf: &mut B,
                              data: &mut Self::Item)
                              -> Result<(), Self::Error> {
        *data = buf.by_ref().collect();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_round_trip() {
        let serialized = RawSerializer::<&[u8]>::default()
            .serialize("topic", b"raw")
            .unwrap();

        let deserialized = RawDeserializer::default()
            .deserialize("topic", &mut Cursor::new(serialized))
            .unwrap();

        assert_eq!(deserialized, b"raw".to_vec());
    }
}
