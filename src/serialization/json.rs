use std::marker::PhantomData;

use bytes::{Buf, BufMut};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json;

use errors::{Error, ErrorKind};
use serialization::{Deserializer, Serializer};

/// Writes any `Serialize` value as JSON.
#[derive(Clone, Debug, Default)]
pub struct JsonSerializer<T> {
    phantom: PhantomData<T>,
}

impl<T: Serialize> Serializer for JsonSerializer<T> {
    type Item = T;
    type Error = Error;

    fn serialize_to<B: BufMut>(&self,
                               _topic_name: &str,
                               data: Self::Item,
                               buf: &mut B)
                               -> Result<(), Self::Error> {
        let encoded = serde_json::to_vec(&data)
            .map_err(|err| ErrorKind::Msg(format!("fail to encode json, {}", err)))?;

        buf.put_slice(&encoded);

        Ok(())
    }
}

/// Reads the remaining payload as a JSON value.
#[derive(Clone, Debug, Default)]
pub struct JsonDeserializer<T> {
    phantom: PhantomData<T>,
}

impl<T: DeserializeOwned> Deserializer for JsonDeserializer<T> {
    type Item = T;
    type Error = Error;

    fn deserialize_to<B: Buf>(&self,
                              _topic_name: &str,
                              buf: &mut B,
                              data: &mut Self::Item)
                              -> Result<(), Self::Error> {
        let bytes: Vec<u8> = buf.by_ref().collect();

        *data = serde_json::from_slice(&bytes)
            .map_err(|err| ErrorKind::Msg(format!("fail to decode json, {}", err)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_round_trip() {
        let mut value = HashMap::new();
        value.insert("answer".to_owned(), 42);

        let serialized = JsonSerializer::default().serialize("topic", value.clone()).unwrap();

        let deserialized: HashMap<String, i32> = JsonDeserializer::default()
            .deserialize("topic", &mut Cursor::new(serialized))
            .unwrap();

        assert_eq!(deserialized, value);
    }
}
