//! Response definitions
//!
//! Represents responses to clients.

/// Response tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ack = 0x00,
    NotFound = 0x01,
    Error = 0x02,
    Value = 0x03,
    Values = 0x04,
    Auth = 0x05,
}

impl Status {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Status::Ack),
            0x01 => Some(Status::NotFound),
            0x02 => Some(Status::Error),
            0x03 => Some(Status::Value),
            0x04 => Some(Status::Values),
            0x05 => Some(Status::Auth),
            _ => None,
        }
    }
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Write acknowledged
    Ack(String),

    /// No value for the requested key(s)
    NotFound,

    /// Request could not be served
    Error(String),

    /// Single value (get, getWhen)
    Value(Vec<u8>),

    /// The found subset of a multiGet, never empty
    Values(Vec<(String, Vec<u8>)>),

    /// Outcome of a register or login attempt
    Auth { success: bool, message: String },
}

impl Response {
    /// Create an ERROR response
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    /// Create an ACK response
    pub fn ack(message: impl Into<String>) -> Self {
        Response::Ack(message.into())
    }

    /// Get the response status tag
    pub fn status(&self) -> Status {
        match self {
            Response::Ack(_) => Status::Ack,
            Response::NotFound => Status::NotFound,
            Response::Error(_) => Status::Error,
            Response::Value(_) => Status::Value,
            Response::Values(_) => Status::Values,
            Response::Auth { .. } => Status::Auth,
        }
    }
}
