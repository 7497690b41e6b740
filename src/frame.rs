// https://redis.io/docs/reference/protocol-spec

use std::io::Cursor;
use std::str;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

// Caps the up-front allocation for arrays whose announced length we have not seen yet.
const MAX_PREALLOCATED_ELEMENTS: usize = 1024;

/// Deepest array nesting a request may use. Commands are flat arrays, so this only has to leave
/// room for clients that wrap them.
pub const MAX_NESTING_DEPTH: usize = 8;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("protocol error; invalid frame data type: {0:#04x}")]
    InvalidDataType(u8),
    #[error("protocol error; invalid integer encoding")]
    InvalidInteger,
    #[error("protocol error; invalid frame length: {0}")]
    InvalidLength(i64),
    #[error("protocol error; bulk string is not terminated by CRLF")]
    MissingTerminator,
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUtf8,
    #[error("protocol error; frame size exceeds limit of {0} bytes")]
    FrameTooLarge(usize),
    #[error("protocol error; arrays nested deeper than {0} levels")]
    NestingTooDeep(usize),
    #[error("protocol error; expected array, got {0}")]
    ExpectedArray(&'static str),
    #[error("protocol error; expected bulk string, got {0}")]
    ExpectedBulk(&'static str),
    #[error("protocol error; empty command")]
    EmptyCommand,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A value on the wire. Whether a string goes out as a status (`Simple`) or as a binary-safe
/// `Bulk` is decided by whoever builds the frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
}

impl Frame {
    pub fn simple(s: impl Into<String>) -> Frame {
        Frame::Simple(s.into())
    }

    pub fn error(s: impl Into<String>) -> Frame {
        Frame::Error(s.into())
    }

    pub fn bulk(bytes: impl Into<Bytes>) -> Frame {
        Frame::Bulk(bytes.into())
    }

    /// Parses one request from the start of `src`. Besides RESP values, requests may use the
    /// inline form (`PING\r\n`), which is turned into an array of bulk strings.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        match peek_byte(src)? {
            byte if byte.is_ascii_alphabetic() => parse_inline(src),
            _ => Self::parse_value(src, 0),
        }
    }

    /// Name of the frame's type, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Null => "null",
            Frame::Array(_) => "array",
        }
    }

    /// Parses the `*<count>\r\n` header of an array. `None` is the null array.
    pub(crate) fn parse_array_header(src: &mut Cursor<&[u8]>) -> Result<Option<usize>, Error> {
        let first_byte = get_byte(src)?;
        if first_byte != u8::from(DataType::Array) {
            return Err(Error::InvalidDataType(first_byte));
        }

        match get_integer(src)? {
            -1 => Ok(None),
            length if length < 0 => Err(Error::InvalidLength(length)),
            length => Ok(Some(length as usize)),
        }
    }

    /// Parses one RESP value that sits `depth` arrays deep.
    pub(crate) fn parse_value(src: &mut Cursor<&[u8]>, depth: usize) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => {
                let line = get_line(src)?;
                Ok(Frame::Simple(to_string(line)?))
            }
            DataType::SimpleError => {
                let line = get_line(src)?;
                Ok(Frame::Error(to_string(line)?))
            }
            DataType::Integer => Ok(Frame::Integer(get_integer(src)?)),
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = get_integer(src)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }
                if length < 0 {
                    return Err(Error::InvalidLength(length));
                }

                let data = get_exact(src, length as usize)?;
                Ok(Frame::Bulk(Bytes::copy_from_slice(data)))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                if depth >= MAX_NESTING_DEPTH {
                    return Err(Error::NestingTooDeep(MAX_NESTING_DEPTH));
                }

                let length = get_integer(src)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }
                if length < 0 {
                    return Err(Error::InvalidLength(length));
                }

                let length = length as usize;
                let mut frames = Vec::with_capacity(length.min(MAX_PREALLOCATED_ELEMENTS));
                for _ in 0..length {
                    frames.push(Self::parse_value(src, depth + 1)?);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(u8::from(DataType::SimpleString));
                put_line(dst, s);
            }
            Frame::Error(s) => {
                dst.put_u8(u8::from(DataType::SimpleError));
                put_line(dst, s);
            }
            Frame::Integer(i) => {
                dst.put_u8(u8::from(DataType::Integer));
                dst.put_slice(i.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            // RESP2 null bulk string.
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(arr) => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(arr.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in arr {
                    frame.encode(dst);
                }
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.encode(&mut bytes);
        bytes.to_vec()
    }
}

// <word> <word> ...\r\n
fn parse_inline(src: &mut Cursor<&[u8]>) -> Result<Frame, Error> {
    let line = get_line(src)?;
    let words = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .map(|word| Frame::Bulk(Bytes::copy_from_slice(word)))
        .collect();

    Ok(Frame::Array(words))
}

// Simple strings and errors end at the first CRLF, so line breaks in the text become spaces.
fn put_line(dst: &mut BytesMut, s: &str) {
    dst.extend(
        s.bytes()
            .map(|b| if b == b'\r' || b == b'\n' { b' ' } else { b }),
    );
    dst.put_slice(CRLF);
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_exact<'a>(src: &mut Cursor<&'a [u8]>, length: usize) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    if buf.len() < start + length + CRLF.len() {
        return Err(Error::Incomplete);
    }
    if &buf[start + length..start + length + CRLF.len()] != CRLF {
        return Err(Error::MissingTerminator);
    }

    src.set_position((start + length + CRLF.len()) as u64);

    Ok(&buf[start..start + length])
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    let line = get_line(src)?;
    str::from_utf8(line)
        .map_err(|_| Error::InvalidInteger)?
        .parse::<i64>()
        .map_err(|_| Error::InvalidInteger)
}

fn to_string(bytes: &[u8]) -> Result<String, Error> {
    String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidUtf8)
}

fn peek_byte(src: &Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.chunk()[0])
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
