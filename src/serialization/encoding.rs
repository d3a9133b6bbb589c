use bytes::{Buf, BufMut};

use encoding::{DecoderTrap, EncoderTrap, EncodingRef};

use errors::{Error, ErrorKind};
use serialization::{Deserializer, Serializer};

/// Writes text through an arbitrary character encoding.
pub struct StrEncodingSerializer {
    encoding: EncodingRef,
}

impl StrEncodingSerializer {
    pub fn new(encoding: EncodingRef) -> Self {
        StrEncodingSerializer { encoding: encoding }
    }
}

impl Serializer for StrEncodingSerializer {
    type Item = String;
    type Error = Error;

    fn serialize_to<B: BufMut>(&self,
                               _topic_name: &str,
                               data: Self::Item,
                               buf: &mut B)
                               -> Result<(), Self::Error> {
        let encoded = self.encoding
            .encode(&data, EncoderTrap::Strict)
            .map_err(|err| ErrorKind::Msg(format!("fail to encode, {}", err)))?;

        buf.put_slice(&encoded);

        Ok(())
    }
}

/// Reads the remaining payload through an arbitrary character encoding.
pub struct StrEncodingDeserializer {
    encoding: EncodingRef,
}

impl StrEncodingDeserializer {
    pub fn new(encoding: EncodingRef) -> Self {
        StrEncodingDeserializer { encoding: encoding }
    }
}

impl Deserializer for StrEncodingDeserializer {
    type Item = String;
    type Error = Error;

    fn deserialize_to<B: Buf>(&self,
                              _topic_name: &str,
                              buf: &mut B,
                              data: &mut Self::Item)
                              -> Result<(), Self::Error> {
        let bytes: Vec<u8> = buf.by_ref().collect();

        *data = self.encoding
            .decode(&bytes, DecoderTrap::Strict)
            .map_err(|err| ErrorKind::Msg(format!("fail to decode, {}", err)))?;

        Ok(())
    }
}
