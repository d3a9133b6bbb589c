use bytes::{BufMut, Bytes, BytesMut};
use byteorder::{BigEndian, ByteOrder};

use time;

use crc::crc32;

use compression::{self, Compression};
use errors::{ErrorKind, Result};
use protocol::{ApiVersion, Offset, Timestamp};

pub const TIMESTAMP_TYPE_MASK: i8 = 0x08;
pub const COMPRESSION_CODEC_MASK: i8 = 0x07;

/// Offset and size precede every message in a set.
const MESSAGE_OVERHEAD: usize = 12;

/// Message sets
///
/// One structure common to both the produce and fetch requests is the message set format.
/// A message in kafka is a key-value pair with a small amount of associated metadata.
/// A message set is just a sequence of messages with offset and size information.
/// This format happens to be used both for the on-disk storage on the broker and the on-the-wire format.
///
/// MessageSet => [Offset MessageSize Message]
///   Offset => int64
///   MessageSize => int32
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageSet {
    pub messages: Vec<Message>,
}

/// Message format
///
/// v0
/// Message => Crc MagicByte Attributes Key Value
///   Crc => int32
///   MagicByte => int8
///   Attributes => int8
///   Key => bytes
///   Value => bytes
///
/// v1 (supported since 0.10.0)
/// Message => Crc MagicByte Attributes Timestamp Key Value
///   Crc => int32
///   MagicByte => int8
///   Attributes => int8
///   Timestamp => int64
///   Key => bytes
///   Value => bytes
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
    pub offset: Offset,
    pub timestamp: Option<MessageTimestamp>,
    pub compression: Compression,
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MessageTimestamp {
    CreateTime(Timestamp),
    LogAppendTime(Timestamp),
}

impl MessageTimestamp {
    pub fn value(&self) -> Timestamp {
        match *self {
            MessageTimestamp::CreateTime(v) |
            MessageTimestamp::LogAppendTime(v) => v,
        }
    }
}

impl Default for MessageTimestamp {
    fn default() -> Self {
        let ts = time::now_utc().to_timespec();

        MessageTimestamp::CreateTime(ts.sec * 1000 + ts.nsec as Timestamp / 1000_000)
    }
}

pub struct MessageSetEncoder {
    api_version: ApiVersion,
}

impl MessageSetEncoder {
    pub fn new(api_version: ApiVersion) -> Self {
        MessageSetEncoder { api_version: api_version }
    }

    pub fn encode(&self, message_set: &MessageSet, buf: &mut BytesMut) -> Result<()> {
        for message in &message_set.messages {
            self.encode_message(message, buf)?;
        }

        Ok(())
    }

    fn encode_message(&self, message: &Message, buf: &mut BytesMut) -> Result<()> {
        buf.put_i64::<BigEndian>(message.offset);
        let size_off = buf.len();
        buf.put_i32::<BigEndian>(0);
        let crc_off = buf.len();
        buf.put_i32::<BigEndian>(0);
        let data_off = buf.len();
        buf.put_i8(self.api_version as i8);
        buf.put_i8((message.compression as i8 & COMPRESSION_CODEC_MASK) |
                   if let Some(MessageTimestamp::LogAppendTime(_)) = message.timestamp {
                       TIMESTAMP_TYPE_MASK
                   } else {
                       0
                   });

        if self.api_version > 0 {
            buf.put_i64::<BigEndian>(message.timestamp.unwrap_or_default().value());
        }

        put_nullable_bytes(buf, message.key.as_ref())?;
        put_nullable_bytes(buf, message.value.as_ref())?;

        let size = buf.len() - crc_off;
        let crc = crc32::checksum_ieee(&buf[data_off..]);

        BigEndian::write_i32(&mut buf[size_off..size_off + 4], size as i32);
        BigEndian::write_i32(&mut buf[crc_off..crc_off + 4], crc as i32);

        Ok(())
    }
}

fn put_nullable_bytes(buf: &mut BytesMut, data: Option<&Bytes>) -> Result<()> {
    match data {
        Some(data) => {
            buf.put_i32::<BigEndian>(data.len() as i32);
            buf.put_slice(data);
        }
        None => buf.put_i32::<BigEndian>(-1),
    }

    Ok(())
}

/// Parse a size-delimited message set, inflating compressed wrapper messages.
///
/// Returns the parsed messages together with the buffer size a retry would
/// need when the set holds nothing but the head of a message too large for
/// the requested fetch size. A partial message after at least one complete
/// one is normal broker behavior and is silently discarded.
pub fn parse_message_set(data: &[u8]) -> Result<(MessageSet, Option<usize>)> {
    let mut messages = Vec::new();
    let mut required = None;
    let mut remaining = data;

    while remaining.len() >= MESSAGE_OVERHEAD {
        let offset = BigEndian::read_i64(&remaining[..8]);
        let size = BigEndian::read_i32(&remaining[8..12]);

        if size < 0 {
            bail!(ErrorKind::CodecError("negative message size"));
        }

        let size = size as usize;

        if remaining.len() < MESSAGE_OVERHEAD + size {
            if messages.is_empty() {
                required = Some(MESSAGE_OVERHEAD + size);
            }
            break;
        }

        let body = &remaining[MESSAGE_OVERHEAD..MESSAGE_OVERHEAD + size];
        let message = parse_message(offset, body)?;

        match message.compression {
            Compression::None => messages.push(message),
            codec => {
                let value = message.value.as_ref().map(|v| v.as_ref()).unwrap_or(&[]);
                let inner = compression::uncompress(codec, value)?;
                let (inner_set, _) = parse_message_set(&inner)?;

                messages.extend(rebase_offsets(message.offset, inner_set.messages));
            }
        }

        remaining = &remaining[MESSAGE_OVERHEAD + size..];
    }

    Ok((MessageSet { messages: messages }, required))
}

fn parse_message(offset: Offset, body: &[u8]) -> Result<Message> {
    if body.len() < 6 {
        bail!(ErrorKind::CodecError("truncated message"));
    }

    let checksum = BigEndian::read_i32(&body[..4]);
    let crc = crc32::checksum_ieee(&body[4..]);

    if crc != checksum as u32 {
        trace!("message checksum mismatched, expected={}, current={}",
               crc,
               checksum as u32);

        bail!(ErrorKind::CodecError("message checksum mismatch"));
    }

    let magic = body[4] as i8;
    let attrs = body[5] as i8;
    let mut pos = 6;

    let timestamp = if magic > 0 {
        if body.len() < pos + 8 {
            bail!(ErrorKind::CodecError("truncated message timestamp"));
        }

        let ts = BigEndian::read_i64(&body[pos..pos + 8]);
        pos += 8;

        Some(if (attrs & TIMESTAMP_TYPE_MASK) == 0 {
                 MessageTimestamp::CreateTime(ts)
             } else {
                 MessageTimestamp::LogAppendTime(ts)
             })
    } else {
        None
    };

    let (key, next) = read_nullable_bytes(body, pos)?;
    let (value, _) = read_nullable_bytes(body, next)?;

    Ok(Message {
           offset: offset,
           timestamp: timestamp,
           compression: Compression::from(attrs & COMPRESSION_CODEC_MASK),
           key: key,
           value: value,
       })
}

fn read_nullable_bytes(body: &[u8], pos: usize) -> Result<(Option<Bytes>, usize)> {
    if body.len() < pos + 4 {
        bail!(ErrorKind::CodecError("truncated message field"));
    }

    let len = BigEndian::read_i32(&body[pos..pos + 4]);
    let pos = pos + 4;

    if len < 0 {
        return Ok((None, pos));
    }

    let len = len as usize;

    if body.len() < pos + len {
        bail!(ErrorKind::CodecError("truncated message field"));
    }

    Ok((Some(Bytes::from(&body[pos..pos + len])), pos + len))
}

/// Inner messages of a v1 wrapper carry offsets relative to the wrapper's,
/// which names the last inner message; v0 inner offsets are already absolute.
fn rebase_offsets(wrapper_offset: Offset, mut messages: Vec<Message>) -> Vec<Message> {
    let needs_rebase = messages
        .last()
        .map(|last| last.offset != wrapper_offset)
        .unwrap_or(false);

    if needs_rebase {
        let last = messages.last().map(|m| m.offset).unwrap_or(0);
        let base = wrapper_offset - last;

        for message in &mut messages {
            message.offset += base;
        }
    }

    messages
}
