//! Readiness notification over the platform's kernel queue.
//!
//! The event loop only sees [`Event`]s and the [`Multiplexer`] trait. Which backend implements it
//! is decided at build time: epoll on Linux, kqueue on the BSDs and macOS.

use std::io;
use std::os::fd::RawFd;

#[cfg(target_os = "linux")]
mod epoll;
#[cfg(target_os = "linux")]
pub use epoll::Epoll as Poller;

#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
mod kqueue;
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
pub use kqueue::Kqueue as Poller;

/// Upper bound on the events returned by a single [`Multiplexer::check`].
pub const MAX_EVENTS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    pub fd: RawFd,
    pub op: Operation,
}

impl Event {
    pub fn read(fd: RawFd) -> Event {
        Event {
            fd,
            op: Operation::Read,
        }
    }

    pub fn write(fd: RawFd) -> Event {
        Event {
            fd,
            op: Operation::Write,
        }
    }
}

pub trait Multiplexer {
    /// Registers interest in `event.op` readiness for `event.fd`. Interest is tracked per
    /// operation, so read and write can be registered independently.
    fn monitor(&mut self, event: Event) -> io::Result<()>;

    /// Drops interest previously registered with [`Multiplexer::monitor`].
    fn unmonitor(&mut self, event: Event) -> io::Result<()>;

    /// Blocks until at least one registered descriptor is ready and returns what fired.
    fn check(&mut self) -> io::Result<Vec<Event>>;

    /// Releases the kernel queue. Every later call fails with `EBADF`.
    fn close(&mut self) -> io::Result<()>;
}

/// Creates the multiplexer for this platform.
pub fn create() -> io::Result<Poller> {
    Poller::new()
}

fn closed() -> io::Error {
    io::Error::from_raw_os_error(libc::EBADF)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::fd::AsRawFd;
    use std::os::unix::net::UnixStream;

    #[test]
    fn reports_readable_descriptor() {
        let mut poller = create().unwrap();
        let (a, mut b) = UnixStream::pair().unwrap();

        poller.monitor(Event::read(a.as_raw_fd())).unwrap();
        b.write_all(b"ping").unwrap();

        let events = poller.check().unwrap();
        assert_eq!(events, vec![Event::read(a.as_raw_fd())]);
    }

    #[test]
    fn reports_only_ready_descriptors() {
        let mut poller = create().unwrap();
        let (a, _a_peer) = UnixStream::pair().unwrap();
        let (b, mut b_peer) = UnixStream::pair().unwrap();

        poller.monitor(Event::read(a.as_raw_fd())).unwrap();
        poller.monitor(Event::read(b.as_raw_fd())).unwrap();
        b_peer.write_all(b"x").unwrap();

        let events = poller.check().unwrap();
        assert_eq!(events, vec![Event::read(b.as_raw_fd())]);
    }

    #[test]
    fn read_and_write_interest_are_independent() {
        let mut poller = create().unwrap();
        let (a, _b) = UnixStream::pair().unwrap();

        poller.monitor(Event::read(a.as_raw_fd())).unwrap();
        poller.monitor(Event::write(a.as_raw_fd())).unwrap();

        // Nothing to read yet, but the socket buffer has room.
        let events = poller.check().unwrap();
        assert_eq!(events, vec![Event::write(a.as_raw_fd())]);

        poller.unmonitor(Event::write(a.as_raw_fd())).unwrap();
        poller.unmonitor(Event::read(a.as_raw_fd())).unwrap();
    }

    #[test]
    fn hang_up_is_reported_as_readable() {
        let mut poller = create().unwrap();
        let (a, b) = UnixStream::pair().unwrap();

        poller.monitor(Event::read(a.as_raw_fd())).unwrap();
        drop(b);

        let events = poller.check().unwrap();
        assert_eq!(events, vec![Event::read(a.as_raw_fd())]);
    }

    #[test]
    fn closed_multiplexer_fails_cleanly() {
        let mut poller = create().unwrap();
        let (a, _b) = UnixStream::pair().unwrap();

        poller.close().unwrap();

        let err = poller.monitor(Event::read(a.as_raw_fd())).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        let err = poller.check().unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
        assert!(poller.close().is_err());
    }
}
