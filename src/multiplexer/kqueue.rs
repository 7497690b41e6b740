use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::ptr;

use super::{closed, Event, Multiplexer, Operation, MAX_EVENTS};

/// BSD/macOS kqueue. Each operation is its own filter, so read and write interest are separate
/// registrations in the kernel.
pub struct Kqueue {
    fd: Option<OwnedFd>,
    events: Vec<libc::kevent>,
}

impl Kqueue {
    pub fn new() -> io::Result<Self> {
        let fd = unsafe { libc::kqueue() };

        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            fd: Some(unsafe { OwnedFd::from_raw_fd(fd) }),
            events: vec![empty_kevent(); MAX_EVENTS],
        })
    }

    fn raw_fd(&self) -> io::Result<RawFd> {
        self.fd.as_ref().map(AsRawFd::as_raw_fd).ok_or_else(closed)
    }

    fn change(&self, event: Event, flags: u16) -> io::Result<()> {
        let mut change = empty_kevent();
        change.ident = event.fd as libc::uintptr_t;
        change.filter = filter(event.op);
        change.flags = flags as _;

        let result = unsafe {
            libc::kevent(
                self.raw_fd()?,
                &change,
                1,
                ptr::null_mut(),
                0,
                ptr::null(),
            )
        };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Multiplexer for Kqueue {
    fn monitor(&mut self, event: Event) -> io::Result<()> {
        self.change(event, (libc::EV_ADD | libc::EV_ENABLE) as u16)
    }

    fn unmonitor(&mut self, event: Event) -> io::Result<()> {
        self.change(event, libc::EV_DELETE as u16)
    }

    fn check(&mut self) -> io::Result<Vec<Event>> {
        let fd = self.raw_fd()?;
        // A null timeout blocks until something fires.
        let n = unsafe {
            libc::kevent(
                fd,
                ptr::null(),
                0,
                self.events.as_mut_ptr(),
                self.events.len() as _,
                ptr::null(),
            )
        };

        if n < 0 {
            return Err(io::Error::last_os_error());
        }

        let ready = self.events[..n as usize]
            .iter()
            .map(|event| {
                let fd = event.ident as RawFd;
                if event.filter == libc::EVFILT_WRITE {
                    Event::write(fd)
                } else {
                    Event::read(fd)
                }
            })
            .collect();

        Ok(ready)
    }

    fn close(&mut self) -> io::Result<()> {
        let fd = self.fd.take().ok_or_else(closed)?;

        let result = unsafe { libc::close(fd.into_raw_fd()) };

        if result < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

fn filter(op: Operation) -> i16 {
    match op {
        Operation::Read => libc::EVFILT_READ,
        Operation::Write => libc::EVFILT_WRITE,
    }
}

fn empty_kevent() -> libc::kevent {
    // Field layout differs between the BSDs; all-zero is a valid value on each of them.
    unsafe { mem::zeroed() }
}
