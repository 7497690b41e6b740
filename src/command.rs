use std::str;

use crate::frame::{self, Frame};

/// One decoded request: an upper-cased command name followed by its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub args: Vec<String>,
}

impl TryFrom<Frame> for Command {
    type Error = frame::Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays.
        let array = match frame {
            Frame::Array(array) => array,
            frame => return Err(frame::Error::ExpectedArray(frame.kind())),
        };

        let mut parts = array.into_iter().map(|frame| match frame {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(|_| frame::Error::InvalidUtf8),
            frame => Err(frame::Error::ExpectedBulk(frame.kind())),
        });

        let name = parts
            .next()
            .ok_or(frame::Error::EmptyCommand)??
            .to_uppercase();
        let args = parts.collect::<Result<Vec<_>, _>>()?;

        Ok(Command { name, args })
    }
}
