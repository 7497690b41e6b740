use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::codec::FrameCodec;
use crate::command::Command;
use crate::commands::{self, CommandError};
use crate::config::Config;
use crate::connection::Connection;
use crate::frame::Frame;
use crate::multiplexer::{self, Event, Multiplexer, Operation, Poller};
use crate::status::{EngineStatus, Status};
use crate::store::Store;
use crate::Result;

/// Single-threaded server: one multiplexer, one key space, every command executed on the thread
/// that calls [`Server::run`].
pub struct Server {
    listener: TcpListener,
    poller: Poller,
    store: Store,
    connections: HashMap<RawFd, Connection>,
    status: Arc<Status>,
    // Read end of the self-wake pair; the write end lives in every `ShutdownHandle`.
    waker: UnixStream,
    wake_tx: Arc<UnixStream>,
    codec: FrameCodec,
    read_buffer_size: usize,
}

/// Stops a running [`Server`] from another thread.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    status: Arc<Status>,
    waker: Arc<UnixStream>,
}

impl ShutdownHandle {
    /// Waits for the event in flight, if any, to finish, marks the server as shutting down and
    /// wakes its event loop. [`Server::run`] returns shortly after.
    pub fn shutdown(&self) -> io::Result<()> {
        self.status.shut_down();
        (&*self.waker).write_all(&[1])
    }
}

enum Flow {
    Open,
    Closed,
}

impl Server {
    pub fn bind(config: &Config) -> Result<Server> {
        let listener = TcpListener::bind(config.address())?;
        listener.set_nonblocking(true)?;

        let (waker, wake_tx) = UnixStream::pair()?;
        waker.set_nonblocking(true)?;
        wake_tx.set_nonblocking(true)?;

        let mut poller = multiplexer::create()?;
        poller.monitor(Event::read(listener.as_raw_fd()))?;
        poller.monitor(Event::read(waker.as_raw_fd()))?;

        Ok(Server {
            listener,
            poller,
            store: Store::new(),
            connections: HashMap::new(),
            status: Arc::new(Status::new()),
            waker,
            wake_tx: Arc::new(wake_tx),
            codec: FrameCodec::new(config.max_frame_size),
            read_buffer_size: config.read_buffer_size,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            status: self.status.clone(),
            waker: self.wake_tx.clone(),
        }
    }

    /// Runs the event loop until a [`ShutdownHandle`] stops it.
    pub fn run(mut self) -> Result<()> {
        info!("Server listening on {}", self.local_addr()?);

        loop {
            let events = match self.poller.check() {
                Ok(events) => events,
                Err(e) => {
                    debug!("Failed to check for ready descriptors: {}", e);
                    continue;
                }
            };

            for event in events {
                if let Err(EngineStatus::ShuttingDown) = self.status.begin() {
                    return self.stop();
                }

                self.handle(event);

                self.status.finish();
            }
        }
    }

    fn handle(&mut self, event: Event) {
        let fd = event.fd;

        if fd == self.listener.as_raw_fd() {
            self.accept();
        } else if fd == self.waker.as_raw_fd() {
            // Only a shutdown writes here; the next `begin` sees it.
            let mut buf = [0u8; 64];
            while let Ok(n) = (&self.waker).read(&mut buf) {
                if n == 0 {
                    break;
                }
            }
        } else {
            match event.op {
                Operation::Read => self.on_readable(fd),
                Operation::Write => self.on_writable(fd),
            }
        }
    }

    fn accept(&mut self) {
        loop {
            let (stream, client_address) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    return;
                }
            };

            if let Err(e) = stream.set_nonblocking(true) {
                warn!("Failed to set {} non-blocking: {}", client_address, e);
                continue;
            }

            let conn = Connection::new(
                stream,
                client_address,
                self.codec.clone(),
                self.read_buffer_size,
            );
            if let Err(e) = self.poller.monitor(Event::read(conn.fd())) {
                warn!("Failed to monitor {}: {}", client_address, e);
                continue;
            }

            info!(
                connection_id = %conn.id,
                "Accepted connection from {:?}", client_address
            );
            self.connections.insert(conn.fd(), conn);
        }
    }

    fn on_readable(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(&fd) else {
            return;
        };

        match serve(conn, &mut self.store) {
            Ok(Flow::Open) => self.watch_writes(fd),
            Ok(Flow::Closed) => self.close(fd),
            Err(e) => {
                warn!(connection_id = %conn.id, "Connection error: {}", e);
                self.close(fd);
            }
        }
    }

    fn on_writable(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(&fd) else {
            return;
        };

        match conn.flush() {
            Ok(_) => self.watch_writes(fd),
            Err(e) => {
                warn!(connection_id = %conn.id, "Failed to write reply: {}", e);
                self.close(fd);
            }
        }
    }

    /// Keeps write interest registered exactly while replies are pending.
    fn watch_writes(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.get_mut(&fd) else {
            return;
        };

        let pending = conn.pending();
        let res = match (pending, conn.writing) {
            (true, false) => self.poller.monitor(Event::write(fd)),
            (false, true) => self.poller.unmonitor(Event::write(fd)),
            _ => return,
        };

        match res {
            Ok(()) => conn.writing = pending,
            Err(e) => {
                warn!(connection_id = %conn.id, "Failed to update write interest: {}", e);
                self.close(fd);
            }
        }
    }

    fn close(&mut self, fd: RawFd) {
        let Some(conn) = self.connections.remove(&fd) else {
            return;
        };

        if let Err(e) = self.poller.unmonitor(Event::read(fd)) {
            debug!("Failed to unmonitor {}: {}", conn.addr, e);
        }
        if conn.writing {
            if let Err(e) = self.poller.unmonitor(Event::write(fd)) {
                debug!("Failed to unmonitor {}: {}", conn.addr, e);
            }
        }

        info!(connection_id = %conn.id, "Connection closed");
    }

    fn stop(mut self) -> Result<()> {
        info!("Shutting down with {} open connections", self.connections.len());

        let fds: Vec<RawFd> = self.connections.keys().copied().collect();
        for fd in fds {
            self.close(fd);
        }

        if let Err(e) = self.poller.close() {
            error!("Failed to close multiplexer: {}", e);
        }

        Ok(())
    }
}

/// Reads what the client sent, executes every complete request in it and queues the replies in
/// the same order.
#[instrument(
    name = "connection",
    skip_all,
    fields(connection_id = %conn.id, client_address = %conn.addr)
)]
fn serve(conn: &mut Connection, store: &mut Store) -> io::Result<Flow> {
    match conn.read() {
        Ok(0) => return Ok(Flow::Closed),
        Ok(n) => debug!("Read {} bytes", n),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Flow::Open),
        Err(e) => return Err(e),
    }

    loop {
        let frame = match conn.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("Discarding unparseable input: {}", e);
                reply(conn, Frame::Error(format!("ERR {}", e)))?;
                break;
            }
        };

        debug!("Received frame from client: {:?}", frame);

        let res = match Command::try_from(frame) {
            Ok(cmd) => execute(cmd, store),
            Err(e) => Frame::Error(format!("ERR {}", e)),
        };

        debug!("Sending response to client: {:?}", res);
        reply(conn, res)?;
    }

    conn.flush()?;

    Ok(Flow::Open)
}

fn execute(cmd: Command, store: &mut Store) -> Frame {
    let name = cmd.name.clone();

    commands::dispatch(cmd, store).unwrap_or_else(|| {
        Frame::Error(CommandError::UnknownCommand { command: name }.to_string())
    })
}

fn reply(conn: &mut Connection, frame: Frame) -> io::Result<()> {
    conn.queue(frame).map_err(io::Error::other)
}
