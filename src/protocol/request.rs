//! Request definitions
//!
//! Represents requests from clients.

use std::fmt;

/// Request tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    Get = 0x01,
    Put = 0x02,
    MultiPut = 0x03,
    MultiGet = 0x04,
    GetWhen = 0x05,
    Exit = 0x06,
    Register = 0x10,
    Login = 0x11,
}

impl RequestType {
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(RequestType::Get),
            0x02 => Some(RequestType::Put),
            0x03 => Some(RequestType::MultiPut),
            0x04 => Some(RequestType::MultiGet),
            0x05 => Some(RequestType::GetWhen),
            0x06 => Some(RequestType::Exit),
            0x10 => Some(RequestType::Register),
            0x11 => Some(RequestType::Login),
            _ => None,
        }
    }
}

/// A parsed request
#[derive(Clone, PartialEq, Eq)]
pub enum Request {
    /// Create a new account and authenticate as it
    Register { username: String, password: String },

    /// Authenticate as an existing account
    Login { username: String, password: String },

    /// Get a value by key
    Get { key: String },

    /// Put a key-value pair (overwrites)
    Put { key: String, value: Vec<u8> },

    /// Put several pairs, acknowledged once
    MultiPut { pairs: Vec<(String, Vec<u8>)> },

    /// Get several keys; missing keys are omitted from the reply
    MultiGet { keys: Vec<String> },

    /// Block until `cond_key` holds `cond_value`, then get `key`
    GetWhen {
        key: String,
        cond_key: String,
        cond_value: Vec<u8>,
    },

    /// Close the session without a reply
    Exit,
}

impl Request {
    /// Get the request type
    pub fn request_type(&self) -> RequestType {
        match self {
            Request::Register { .. } => RequestType::Register,
            Request::Login { .. } => RequestType::Login,
            Request::Get { .. } => RequestType::Get,
            Request::Put { .. } => RequestType::Put,
            Request::MultiPut { .. } => RequestType::MultiPut,
            Request::MultiGet { .. } => RequestType::MultiGet,
            Request::GetWhen { .. } => RequestType::GetWhen,
            Request::Exit => RequestType::Exit,
        }
    }

    /// Whether this is a register/login message
    pub fn is_credential(&self) -> bool {
        matches!(self, Request::Register { .. } | Request::Login { .. })
    }
}

// Manual impl so passwords and values never end up in trace logs.
impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Register { username, .. } => f
                .debug_struct("Register")
                .field("username", username)
                .finish_non_exhaustive(),
            Request::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .finish_non_exhaustive(),
            Request::Get { key } => f.debug_struct("Get").field("key", key).finish(),
            Request::Put { key, value } => f
                .debug_struct("Put")
                .field("key", key)
                .field("value_len", &value.len())
                .finish(),
            Request::MultiPut { pairs } => f
                .debug_struct("MultiPut")
                .field("count", &pairs.len())
                .finish(),
            Request::MultiGet { keys } => f.debug_struct("MultiGet").field("keys", keys).finish(),
            Request::GetWhen { key, cond_key, cond_value } => f
                .debug_struct("GetWhen")
                .field("key", key)
                .field("cond_key", cond_key)
                .field("cond_value_len", &cond_value.len())
                .finish(),
            Request::Exit => f.write_str("Exit"),
        }
    }
}
