use errors::Result;

/// The compression codec carried in a message's attributes byte.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i8)]
pub enum Compression {
    None = 0,
    Gzip = 1,
    Snappy = 2,
    Lz4 = 3,
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

impl From<i8> for Compression {
    fn from(v: i8) -> Self {
        match v {
            1 => Compression::Gzip,
            2 => Compression::Snappy,
            3 => Compression::Lz4,
            _ => Compression::None,
        }
    }
}

/// Compress an encoded message set with the given codec.
pub fn compress(compression: Compression, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => gzip::compress(data),
        Compression::Snappy => snappy::compress(data),
        Compression::Lz4 => lz4::compress(data),
    }
}

/// Inflate the value of a compressed wrapper message back into message-set bytes.
pub fn uncompress(compression: Compression, data: &[u8]) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(data.to_vec()),
        Compression::Gzip => gzip::uncompress(data),
        Compression::Snappy => snappy::uncompress(data),
        Compression::Lz4 => lz4::uncompress(data),
    }
}

#[cfg(feature = "gzip")]
mod gzip {
    use std::io::prelude::*;

    use flate2::Compression as Level;
    use flate2::read::GzDecoder;
    use flate2::write::GzEncoder;

    use errors::Result;

    pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(Vec::new(), Level::default());
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }

    pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        GzDecoder::new(data).read_to_end(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(not(feature = "gzip"))]
mod gzip {
    use errors::{ErrorKind, Result};

    pub fn compress(_data: &[u8]) -> Result<Vec<u8>> {
        bail!(ErrorKind::UnsupportedCompression)
    }

    pub fn uncompress(_data: &[u8]) -> Result<Vec<u8>> {
        bail!(ErrorKind::UnsupportedCompression)
    }
}

#[cfg(feature = "snappy")]
mod snappy {
    use byteorder::{BigEndian, ByteOrder};
    use snap;

    use errors::{ErrorKind, Result};

    // The framing the JVM snappy bindings put around each message set.
    const JAVA_MAGIC: &'static [u8] = &[0x82, b'S', b'N', b'A', b'P', b'P', b'Y', 0];

    pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
        match snap::Encoder::new().compress_vec(data) {
            Ok(buf) => Ok(buf),
            Err(err) => {
                trace!("snappy compression failed, {}", err);
                bail!(ErrorKind::CodecError("snappy compression failed"))
            }
        }
    }

    pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
        if data.len() > 16 && &data[..8] == JAVA_MAGIC {
            // magic + version + compatible version, then [len, block] pairs
            let mut buf = Vec::new();
            let mut off = 16;

            while off + 4 <= data.len() {
                let block_len = BigEndian::read_i32(&data[off..off + 4]) as usize;
                off += 4;

                if block_len == 0 || off + block_len > data.len() {
                    bail!(ErrorKind::CodecError("truncated snappy block"));
                }

                buf.extend(decompress_raw(&data[off..off + block_len])?);
                off += block_len;
            }

            Ok(buf)
        } else {
            decompress_raw(data)
        }
    }

    fn decompress_raw(data: &[u8]) -> Result<Vec<u8>> {
        match snap::Decoder::new().decompress_vec(data) {
            Ok(buf) => Ok(buf),
            Err(err) => {
                trace!("snappy decompression failed, {}", err);
                bail!(ErrorKind::CodecError("malformed snappy data"))
            }
        }
    }
}

#[cfg(not(feature = "snappy"))]
mod snappy {
    use errors::{ErrorKind, Result};

    pub fn compress(_data: &[u8]) -> Result<Vec<u8>> {
        bail!(ErrorKind::UnsupportedCompression)
    }

    pub fn uncompress(_data: &[u8]) -> Result<Vec<u8>> {
        bail!(ErrorKind::UnsupportedCompression)
    }
}

#[cfg(feature = "lz4")]
mod lz4 {
    use lz4_compress;

    use errors::{ErrorKind, Result};

    pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_compress::compress(data))
    }

    pub fn uncompress(data: &[u8]) -> Result<Vec<u8>> {
        lz4_compress::decompress(data).map_err(|_| ErrorKind::CodecError("malformed lz4 data").into())
    }
}

#[cfg(not(feature = "lz4"))]
mod lz4 {
    use errors::{ErrorKind, Result};

    pub fn compress(_data: &[u8]) -> Result<Vec<u8>> {
        bail!(ErrorKind::UnsupportedCompression)
    }

    pub fn uncompress(_data: &[u8]) -> Result<Vec<u8>> {
        bail!(ErrorKind::UnsupportedCompression)
    }
}
