use bytes::{Buf, BytesMut};
use std::io::Cursor;
use tokio_util::codec::{Decoder, Encoder};

use crate::command::Command;
use crate::frame::{self, Frame};

pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

// Caps the up-front allocation for arrays whose elements have not arrived yet.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

/// Splits a connection's read buffer into frames and encodes replies into its write buffer.
///
/// Top-level arrays are decoded one element at a time: finished elements leave the buffer right
/// away, so a large request arriving in small reads is parsed once rather than from the start on
/// every read.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    partial: Option<PartialArray>,
}

// A top-level array whose elements are still arriving.
#[derive(Debug, Clone)]
struct PartialArray {
    remaining: usize,
    elements: Vec<Frame>,
    // Bytes of the frame already taken off the buffer.
    consumed: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            partial: None,
        }
    }

    fn check_size(&self, consumed: usize, buffered: usize) -> Result<(), frame::Error> {
        if consumed + buffered > self.max_frame_size {
            Err(frame::Error::FrameTooLarge(self.max_frame_size))
        } else {
            Ok(())
        }
    }

    fn decode_whole(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, frame::Error> {
        let mut cursor = Cursor::new(&src[..]);
        let frame = match Frame::parse(&mut cursor) {
            Ok(frame) => frame,
            // A partial frame that is already too big will never become acceptable.
            Err(frame::Error::Incomplete) => return self.check_size(0, src.len()).map(|()| None),
            Err(err) => return Err(err),
        };

        let position = cursor.position() as usize;
        self.check_size(0, position)?;

        // Remove the parsed frame from the buffer.
        src.advance(position);

        Ok(Some(frame))
    }

    fn decode_array(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, frame::Error> {
        let mut partial = match self.partial.take() {
            Some(partial) => partial,
            None => {
                let mut cursor = Cursor::new(&src[..]);
                let length = match Frame::parse_array_header(&mut cursor) {
                    Ok(length) => length,
                    Err(frame::Error::Incomplete) => {
                        return self.check_size(0, src.len()).map(|()| None)
                    }
                    Err(err) => return Err(err),
                };
                let position = cursor.position() as usize;
                src.advance(position);

                let Some(length) = length else {
                    return Ok(Some(Frame::Null));
                };

                PartialArray {
                    remaining: length,
                    elements: Vec::with_capacity(length.min(MAX_PREALLOCATED_ELEMENTS)),
                    consumed: position,
                }
            }
        };

        while partial.remaining > 0 {
            let mut cursor = Cursor::new(&src[..]);
            match Frame::parse_value(&mut cursor, 1) {
                Ok(frame) => {
                    let position = cursor.position() as usize;
                    partial.consumed += position;
                    self.check_size(partial.consumed, 0)?;

                    src.advance(position);
                    partial.elements.push(frame);
                    partial.remaining -= 1;
                }
                Err(frame::Error::Incomplete) => {
                    self.check_size(partial.consumed, src.len())?;
                    self.partial = Some(partial);
                    return Ok(None);
                }
                Err(err) => return Err(err),
            }
        }

        Ok(Some(Frame::Array(partial.elements)))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = frame::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.partial.is_none() && src.first() != Some(&b'*') {
            return self.decode_whole(src);
        }

        // Any error leaves `partial` empty, so the next frame starts from scratch.
        self.decode_array(src)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = frame::Error;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode(dst);
        Ok(())
    }
}

/// Decodes one complete command from `buf`. Trailing bytes after the first frame are ignored.
pub fn decode(buf: &[u8]) -> Result<Command, frame::Error> {
    let mut cursor = Cursor::new(buf);
    let frame = Frame::parse(&mut cursor)?;
    Command::try_from(frame)
}

/// Encodes a reply into wire bytes.
pub fn encode(frame: &Frame) -> Vec<u8> {
    frame.serialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn decode_command() {
        let cmd = decode(b"*3\r\n$6\r\nZSCORE\r\n$11\r\nleaderboard\r\n$5\r\nalice\r\n").unwrap();

        assert_eq!(cmd.name, "ZSCORE");
        assert_eq!(cmd.args, vec!["leaderboard", "alice"]);
    }

    #[test]
    fn decode_inline_command() {
        let cmd = decode(b"zcard leaderboard\r\n").unwrap();

        assert_eq!(cmd.name, "ZCARD");
        assert_eq!(cmd.args, vec!["leaderboard"]);
    }

    #[test]
    fn decode_rejects_incomplete_and_malformed_buffers() {
        assert!(matches!(
            decode(b"*2\r\n$5\r\nZCARD\r\n"),
            Err(frame::Error::Incomplete)
        ));
        assert!(matches!(
            decode(b"*1\r\n$5\r\nZCARDX\r\n"),
            Err(frame::Error::MissingTerminator)
        ));
        assert!(matches!(
            decode(b":12\r\n"),
            Err(frame::Error::ExpectedArray("integer"))
        ));
        assert!(matches!(decode(b"*0\r\n"), Err(frame::Error::EmptyCommand)));
    }

    #[test]
    fn decoder_waits_for_complete_frames() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPI"[..]);

        assert!(matches!(codec.decode(&mut buf), Ok(None)));
        // The array header is consumed; the unfinished element stays buffered.
        assert_eq!(&buf[..], b"$4\r\nPI");

        buf.extend_from_slice(b"NG\r\n*1\r\n$4\r\nPING\r\n");
        let frame = codec.decode(&mut buf).unwrap();
        assert_eq!(frame, Some(Frame::Array(vec![Frame::Bulk(Bytes::from("PING"))])));

        // The second pipelined frame is still buffered.
        let frame = codec.decode(&mut buf).unwrap();
        assert_eq!(frame, Some(Frame::Array(vec![Frame::Bulk(Bytes::from("PING"))])));
        assert!(buf.is_empty());
    }

    #[test]
    fn decoder_enforces_frame_size_limit() {
        let mut codec = FrameCodec::new(8);
        let mut buf = BytesMut::from(&b"$20\r\n0123456789"[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(frame::Error::FrameTooLarge(8))
        ));
    }

    #[test]
    fn decoder_enforces_frame_size_limit_across_reads() {
        let mut codec = FrameCodec::new(32);
        let mut buf = BytesMut::from(&b"*4\r\n$4\r\nPING\r\n"[..]);

        assert!(matches!(codec.decode(&mut buf), Ok(None)));
        assert!(buf.is_empty());

        buf.extend_from_slice(b"$4\r\nabcd\r\n$4\r\nefgh\r\n");
        assert!(matches!(
            codec.decode(&mut buf),
            Err(frame::Error::FrameTooLarge(32))
        ));
    }

    #[test]
    fn decoder_builds_arrays_element_by_element() {
        let mut codec = FrameCodec::default();
        let request = b"*3\r\n$4\r\nZADD\r\n$1\r\nk\r\n$1\r\n1\r\n";
        let mut buf = BytesMut::new();
        let mut frames = vec![];

        // One byte at a time, the worst case for a parser that restarts on every read.
        for byte in request {
            buf.extend_from_slice(&[*byte]);
            if let Some(frame) = codec.decode(&mut buf).unwrap() {
                frames.push(frame);
            }
        }

        assert_eq!(
            frames,
            vec![Frame::Array(vec![
                Frame::bulk("ZADD"),
                Frame::bulk("k"),
                Frame::bulk("1"),
            ])]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn decoder_rejects_deep_nesting() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*1\r\n".repeat(100_000)[..]);

        assert!(matches!(
            codec.decode(&mut buf),
            Err(frame::Error::NestingTooDeep(_))
        ));

        // The codec starts over on the next frame.
        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Frame::Array(vec![Frame::bulk("PING")]))
        );
    }

    #[test]
    fn decoder_null_array() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::from(&b"*-1\r\n"[..]);

        assert_eq!(codec.decode(&mut buf).unwrap(), Some(Frame::Null));
        assert!(buf.is_empty());
    }

    #[test]
    fn encoder_writes_wire_bytes() {
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        codec.encode(Frame::Integer(3), &mut buf).unwrap();
        codec.encode(Frame::Null, &mut buf).unwrap();

        assert_eq!(&buf[..], b":3\r\n$-1\r\n");
        assert_eq!(encode(&Frame::simple("OK")), b"+OK\r\n");
    }
}
