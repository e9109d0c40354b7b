//! Blocking client
//!
//! Speaks the wire protocol over one long-lived TCP connection.

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};

use crate::error::{GateError, Result};
use crate::protocol::{read_response, write_request, Request, Response};

/// Reply to a register or login
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthReply {
    pub success: bool,
    pub message: String,
}

impl AuthReply {
    /// Turn a refusal into `GateError::AuthFailed`
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.message)
        } else {
            Err(GateError::AuthFailed(self.message))
        }
    }
}

/// Client connection to a GateKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;

        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one request and wait for its response
    pub fn request(&mut self, request: &Request) -> Result<Response> {
        write_request(&mut self.writer, request)?;
        read_response(&mut self.reader)
    }

    pub fn register(&mut self, username: &str, password: &str) -> Result<AuthReply> {
        self.authenticate(Request::Register {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<AuthReply> {
        self.authenticate(Request::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    fn authenticate(&mut self, request: Request) -> Result<AuthReply> {
        match self.request(&request)? {
            Response::Auth { success, message } => Ok(AuthReply { success, message }),
            other => Err(unexpected(other)),
        }
    }

    /// Store a value; returns the server's acknowledgement
    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<String> {
        let request = Request::Put {
            key: key.to_string(),
            value: value.to_vec(),
        };
        match self.request(&request)? {
            Response::Ack(message) => Ok(message),
            other => Err(unexpected(other)),
        }
    }

    pub fn multi_put(&mut self, pairs: Vec<(String, Vec<u8>)>) -> Result<String> {
        match self.request(&Request::MultiPut { pairs })? {
            Response::Ack(message) => Ok(message),
            other => Err(unexpected(other)),
        }
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let request = Request::Get {
            key: key.to_string(),
        };
        value_or_not_found(self.request(&request)?)
    }

    /// Returns `None` when none of the keys had a value
    pub fn multi_get(&mut self, keys: &[&str]) -> Result<Option<Vec<(String, Vec<u8>)>>> {
        let request = Request::MultiGet {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        };
        match self.request(&request)? {
            Response::Values(pairs) => Ok(Some(pairs)),
            Response::NotFound => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    /// Blocks until `cond_key` holds `cond_value` on the server
    pub fn get_when(
        &mut self,
        key: &str,
        cond_key: &str,
        cond_value: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let request = Request::GetWhen {
            key: key.to_string(),
            cond_key: cond_key.to_string(),
            cond_value: cond_value.to_vec(),
        };
        value_or_not_found(self.request(&request)?)
    }

    /// End the session; the server closes without replying
    pub fn exit(mut self) -> Result<()> {
        write_request(&mut self.writer, &Request::Exit)
    }
}

fn value_or_not_found(response: Response) -> Result<Option<Vec<u8>>> {
    match response {
        Response::Value(value) => Ok(Some(value)),
        Response::NotFound => Ok(None),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> GateError {
    match response {
        Response::Error(message) => GateError::Remote(message),
        other => GateError::UnexpectedResponse(format!("{:?}", other.status())),
    }
}
