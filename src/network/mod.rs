//! Network Module
//!
//! TCP server, client and the machinery that bounds and drains sessions.
//!
//! ## Architecture
//! - Single non-blocking acceptor loop, never blocked by admission
//! - One named thread per accepted connection
//! - A FIFO permit pool bounds how many sessions are served at once
//! - A registry of open sockets drives graceful shutdown
//! - Requests routed through the Engine

mod admission;
mod client;
mod connection;
mod registry;
mod server;

pub use admission::{Permit, PermitPool};
pub use client::{AuthReply, Client};
pub use connection::Connection;
pub use registry::{ConnectionRegistry, Registration};
pub use server::{Server, ShutdownHandle};
