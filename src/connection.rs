use bytes::{Buf, BytesMut};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::{self, Frame};

/// A client socket plus the bytes in flight in each direction.
pub struct Connection {
    pub id: Uuid,
    pub addr: SocketAddr,
    stream: TcpStream,
    // Data is read from the socket into the read buffer. When a frame is parsed, the corresponding
    // data is removed from the buffer.
    buffer: BytesMut,
    // Encoded replies the socket has not accepted yet.
    outgoing: BytesMut,
    codec: FrameCodec,
    read_size: usize,
    // Set once a request failed to parse. There is no telling where the next request starts, so
    // all further input is dropped until the client hangs up.
    discarding: bool,
    /// Whether the server is waiting for write readiness on this connection.
    pub writing: bool,
}

impl Connection {
    pub fn new(
        stream: TcpStream,
        addr: SocketAddr,
        codec: FrameCodec,
        read_size: usize,
    ) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            addr,
            stream,
            buffer: BytesMut::with_capacity(read_size),
            outgoing: BytesMut::new(),
            codec,
            read_size: read_size.max(1),
            discarding: false,
            writing: false,
        }
    }

    pub fn fd(&self) -> RawFd {
        self.stream.as_raw_fd()
    }

    /// Performs one bounded read into the buffer. `Ok(0)` means the peer closed the connection.
    pub fn read(&mut self) -> io::Result<usize> {
        let start = self.buffer.len();
        self.buffer.resize(start + self.read_size, 0);

        let res = self.stream.read(&mut self.buffer[start..]);
        let n = *res.as_ref().unwrap_or(&0);
        self.buffer.truncate(start + n);
        if self.discarding {
            self.buffer.clear();
        }

        res
    }

    /// Takes the next complete frame off the buffer.
    ///
    /// The first parse error is returned once. After that the connection only discards input.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, frame::Error> {
        if self.discarding || self.buffer.is_empty() {
            return Ok(None);
        }

        self.codec.decode(&mut self.buffer).map_err(|err| {
            self.buffer.clear();
            self.discarding = true;
            err
        })
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Encodes a reply behind the ones already waiting to be sent.
    pub fn queue(&mut self, frame: Frame) -> Result<(), frame::Error> {
        self.codec.encode(frame, &mut self.outgoing)
    }

    pub fn pending(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Writes as much of the pending output as the socket takes. Returns whether everything was
    /// written.
    pub fn flush(&mut self) -> io::Result<bool> {
        while !self.outgoing.is_empty() {
            match self.stream.write(&self.outgoing) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.outgoing.advance(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(true)
    }
}
