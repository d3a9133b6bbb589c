use std::marker::PhantomData;

use bytes::{Buf, BufMut};

use errors::Error;
use serialization::{Deserializer, Serializer};

/// Writes nothing and reads nothing; for records without a key.
#[derive(Clone, Debug, Default)]
pub struct NoopSerializer<T> {
    phantom: PhantomData<T>,
}

impl<T> Serializer for NoopSerializer<T> {
    type Item = T;
    type Error = Error;

    fn serialize_to<B: BufMut>(&self,
                               _topic_name: &str,
                               _data: Self::Item,
                               _buf: &mut B)
                               -> Result<(), Self::Error> {
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct NoopDeserializer<T> {
    phantom: PhantomData<T>,
}

impl<T: Default> Deserializer for NoopDeserializer<T> {
    type Item = T;
    type Error = Error;

    fn deserialize_to<B: Buf>(&self,
                              _topic_name: &str,
                              _buf: &mut B,
                              _data: &mut Self::Item)
                              -> Result<(), Self::Error> {
        Ok(())
    }
}
