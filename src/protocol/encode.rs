use std::i16;
use std::i32;

use bytes::{BufMut, ByteOrder, BytesMut};

use errors::{ErrorKind, Result};

pub const STR_LEN_SIZE: usize = 2;
pub const BYTES_LEN_SIZE: usize = 4;
pub const ARRAY_LEN_SIZE: usize = 4;

/// A request body that can write itself into a framed payload.
pub trait Encodable {
    fn encode<T: ByteOrder>(&self, dst: &mut BytesMut) -> Result<()>;
}

/// Kafka primitive writers: length-prefixed strings, bytes and arrays.
pub trait WriteExt {
    fn put_str<T: ByteOrder, S: AsRef<str>>(&mut self, s: Option<S>) -> Result<()>;

    fn put_bytes<T: ByteOrder, D: AsRef<[u8]>>(&mut self, d: Option<D>) -> Result<()>;

    fn put_array<T, E, F>(&mut self, items: &[E], f: F) -> Result<()>
        where T: ByteOrder,
              F: FnMut(&mut Self, &E) -> Result<()>;
}

impl WriteExt for BytesMut {
    fn put_str<T: ByteOrder, S: AsRef<str>>(&mut self, s: Option<S>) -> Result<()> {
        match s {
            Some(ref s) if s.as_ref().len() > i16::MAX as usize => {
                bail!(ErrorKind::CodecError("string too long"))
            }
            Some(ref s) => {
                let s = s.as_ref();
                self.put_i16::<T>(s.len() as i16);
                self.put_slice(s.as_bytes());
                Ok(())
            }
            None => {
                self.put_i16::<T>(-1);
                Ok(())
            }
        }
    }

    fn put_bytes<T: ByteOrder, D: AsRef<[u8]>>(&mut self, d: Option<D>) -> Result<()> {
        match d {
            Some(ref d) if d.as_ref().len() > i32::MAX as usize => {
                bail!(ErrorKind::CodecError("bytes too long"))
            }
            Some(ref d) => {
                let d = d.as_ref();
                self.put_i32::<T>(d.len() as i32);
                self.put_slice(d);
                Ok(())
            }
            None => {
                self.put_i32::<T>(-1);
                Ok(())
            }
        }
    }

    fn put_array<T, E, F>(&mut self, items: &[E], mut f: F) -> Result<()>
        where T: ByteOrder,
              F: FnMut(&mut Self, &E) -> Result<()>
    {
        if items.len() > i32::MAX as usize {
            bail!(ErrorKind::CodecError("array too long"));
        }

        self.put_i32::<T>(items.len() as i32);

        for item in items {
            f(self, item)?;
        }

        Ok(())
    }
}
