use std::collections::HashMap;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};

use super::{closed, Event, Multiplexer, Operation, MAX_EVENTS};

// Flags that all mean "a read will not block", including reads that report an error or EOF.
const READABLE: u32 = (libc::EPOLLIN | libc::EPOLLRDHUP | libc::EPOLLHUP | libc::EPOLLERR) as u32;

/// Linux epoll. The kernel keeps registered descriptors in a tree and ready ones in a list, so
/// neither registration nor waiting scans every descriptor.
pub struct Epoll {
    fd: Option<OwnedFd>,
    events: Vec<libc::epoll_event>,
    // epoll keeps one registration per descriptor, so per-operation interest is merged here.
    interest: HashMap<RawFd, u32>,
}

impl Epoll {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };

        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            fd: Some(unsafe { OwnedFd::from_raw_fd(fd) }),
            events: vec![libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS],
            interest: HashMap::new(),
        })
    }

    fn raw_fd(&self) -> io::Result<RawFd> {
        self.fd.as_ref().map(AsRawFd::as_raw_fd).ok_or_else(closed)
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, mask: u32) -> io::Result<()> {
        let mut event = libc::epoll_event {
            events: mask,
            u64: fd as u64,
        };

        let result = unsafe { libc::epoll_ctl(self.raw_fd()?, op, fd, &mut event) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Multiplexer for Epoll {
    fn monitor(&mut self, event: Event) -> io::Result<()> {
        let current = self.interest.get(&event.fd).copied();
        let mask = current.unwrap_or(0) | interest(event.op);

        let op = match current {
            Some(_) => libc::EPOLL_CTL_MOD,
            None => libc::EPOLL_CTL_ADD,
        };
        self.ctl(op, event.fd, mask)?;
        self.interest.insert(event.fd, mask);

        Ok(())
    }

    fn unmonitor(&mut self, event: Event) -> io::Result<()> {
        let Some(current) = self.interest.get(&event.fd).copied() else {
            return Err(io::Error::from_raw_os_error(libc::ENOENT));
        };
        let mask = current & !interest(event.op);

        if mask == 0 {
            self.interest.remove(&event.fd);
            self.ctl(libc::EPOLL_CTL_DEL, event.fd, 0)
        } else {
            self.interest.insert(event.fd, mask);
            self.ctl(libc::EPOLL_CTL_MOD, event.fd, mask)
        }
    }

    fn check(&mut self) -> io::Result<Vec<Event>> {
        let fd = self.raw_fd()?;
        let n = unsafe {
            libc::epoll_wait(
                fd,
                self.events.as_mut_ptr(),
                self.events.len() as libc::c_int,
                -1,
            )
        };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        let mut ready = Vec::with_capacity(n as usize);
        for event in &self.events[..n as usize] {
            // `epoll_event` is packed on some targets, so copy the fields out.
            let flags = event.events;
            let fd = event.u64 as RawFd;

            if flags & READABLE != 0 {
                ready.push(Event::read(fd));
            }
            if flags & libc::EPOLLOUT as u32 != 0 {
                ready.push(Event::write(fd));
            }
        }

        Ok(ready)
    }

    fn close(&mut self) -> io::Result<()> {
        let fd = self.fd.take().ok_or_else(closed)?;
        self.interest.clear();

        let result = unsafe { libc::close(fd.into_raw_fd()) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn interest(op: Operation) -> u32 {
    match op {
        Operation::Read => (libc::EPOLLIN | libc::EPOLLRDHUP) as u32,
        Operation::Write => libc::EPOLLOUT as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixStream;

    #[test]
    fn interest_is_merged_per_descriptor() {
        let mut epoll = Epoll::new().unwrap();
        let (a, _b) = UnixStream::pair().unwrap();
        let fd = a.as_raw_fd();

        epoll.monitor(Event::read(fd)).unwrap();
        epoll.monitor(Event::write(fd)).unwrap();
        assert_eq!(
            epoll.interest[&fd],
            interest(Operation::Read) | interest(Operation::Write)
        );

        epoll.unmonitor(Event::read(fd)).unwrap();
        assert_eq!(epoll.interest[&fd], interest(Operation::Write));

        epoll.unmonitor(Event::write(fd)).unwrap();
        assert!(epoll.interest.is_empty());
    }

    #[test]
    fn unmonitor_unknown_descriptor() {
        let mut epoll = Epoll::new().unwrap();

        let err = epoll.unmonitor(Event::read(1234)).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
    }
}
