use bytes::{BigEndian, BufMut, Bytes, BytesMut};
use byteorder::ByteOrder;

use hexplay::HexViewBuilder;

use tokio_io::codec::{Decoder, Encoder};

use errors::{Error, ErrorKind};

/// Every frame is a 4-byte big-endian payload length followed by the payload.
pub const FRAME_PREFIX_SIZE: usize = 4;

/// Length-prefix framing over a broker socket.
///
/// The decoder never yields a partial payload; it waits for the whole frame.
/// A negative length or one beyond `max_frame_size` is unrecoverable for the
/// stream, since the remaining bytes can no longer be framed.
pub struct KafkaCodec {
    max_frame_size: usize,
}

impl KafkaCodec {
    pub fn new(max_frame_size: usize) -> Self {
        KafkaCodec { max_frame_size: max_frame_size }
    }
}

impl Decoder for KafkaCodec {
    type Item = BytesMut;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, Error> {
        if src.len() < FRAME_PREFIX_SIZE {
            return Ok(None);
        }

        let frame_size = BigEndian::read_i32(&src[..FRAME_PREFIX_SIZE]);

        if frame_size < 0 {
            bail!(ErrorKind::CodecError("negative frame size"));
        }

        let frame_size = frame_size as usize;

        if self.max_frame_size > 0 && frame_size > self.max_frame_size {
            bail!(ErrorKind::BufferUnderrun(FRAME_PREFIX_SIZE + frame_size));
        }

        if src.len() < FRAME_PREFIX_SIZE + frame_size {
            return Ok(None);
        }

        src.split_to(FRAME_PREFIX_SIZE);

        let payload = src.split_to(frame_size);

        if log_enabled!(::log::Level::Trace) {
            trace!("frame received, {} bytes:\n{}",
                   payload.len(),
                   HexViewBuilder::new(&payload).row_width(16).finish());
        }

        Ok(Some(payload))
    }
}

impl Encoder for KafkaCodec {
    type Item = Bytes;
    type Error = Error;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Error> {
        if self.max_frame_size > 0 && payload.len() > self.max_frame_size {
            bail!(ErrorKind::CodecError("frame size overflow"));
        }

        if log_enabled!(::log::Level::Trace) {
            trace!("sending frame, {} bytes:\n{}",
                   payload.len(),
                   HexViewBuilder::new(&payload).row_width(16).finish());
        }

        dst.reserve(FRAME_PREFIX_SIZE + payload.len());
        dst.put_i32::<BigEndian>(payload.len() as i32);
        dst.put_slice(&payload);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use errors::ErrorKind;

    #[test]
    fn test_encode_frame() {
        let mut codec = KafkaCodec::new(1024);
        let mut buf = BytesMut::with_capacity(64);

        codec.encode(Bytes::from_static(b"test"), &mut buf).unwrap();

        assert_eq!(&buf[..], b"\0\0\0\x04test");
    }

    #[test]
    fn test_decode_waits_for_whole_frame() {
        let mut codec = KafkaCodec::new(1024);

        let mut buf = BytesMut::from(&b"\0\0\0"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"\0\0\0\x04te"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        let mut buf = BytesMut::from(&b"\0\0\0\x04test\0\0\0\x01!"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), &b"test"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap().unwrap(), &b"!"[..]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_rejects_negative_frame() {
        let mut codec = KafkaCodec::new(1024);
        let mut buf = BytesMut::from(&b"\xff\xff\xff\xff"[..]);

        match codec.decode(&mut buf) {
            Err(Error(ErrorKind::CodecError(_), _)) => {}
            res => panic!("unexpected result: {:?}", res),
        }
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut codec = KafkaCodec::new(8);
        let mut buf = BytesMut::from(&b"\0\0\x01\0"[..]);

        match codec.decode(&mut buf) {
            Err(Error(ErrorKind::BufferUnderrun(required), _)) => {
                assert_eq!(required, 256 + FRAME_PREFIX_SIZE)
            }
            res => panic!("unexpected result: {:?}", res),
        }
    }
}
