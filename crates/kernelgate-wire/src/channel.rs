//! Logical kernel channels.
//!
//! A kernel connection multiplexes four sub-streams. Each inbound frame set is
//! labelled with the channel it arrived on; the label decides which dispatch
//! table receives the message.

use std::fmt;
use std::str::FromStr;

use crate::error::FormatError;

/// One of the four logical channels of a kernel connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Requests and replies (execute, inspect, kernel_info).
    Shell,
    /// Broadcast side effects (status, stream, display data).
    IoPub,
    /// Input requests from the kernel to the frontend.
    Stdin,
    /// Out-of-band requests (shutdown, interrupt, debug).
    Control,
}

impl Channel {
    /// All channels, in wire-name order.
    pub const ALL: [Channel; 4] = [
        Channel::Shell,
        Channel::IoPub,
        Channel::Stdin,
        Channel::Control,
    ];

    /// Wire name of the channel.
    pub fn name(self) -> &'static str {
        match self {
            Channel::Shell => "shell",
            Channel::IoPub => "iopub",
            Channel::Stdin => "stdin",
            Channel::Control => "control",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = FormatError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "shell" => Ok(Channel::Shell),
            "iopub" => Ok(Channel::IoPub),
            "stdin" => Ok(Channel::Stdin),
            "control" => Ok(Channel::Control),
            other => Err(FormatError::UnknownChannel(other.to_string())),
        }
    }
}
