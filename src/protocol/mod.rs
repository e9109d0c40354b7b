//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Tag (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! Every string or byte field inside a payload carries its own
//! big-endian u32 length prefix. Counts are big-endian u32.
//!
//! ### Requests
//! - 0x01: GET       - key
//! - 0x02: PUT       - key + value
//! - 0x03: MULTIPUT  - count + (key + value) * count
//! - 0x04: MULTIGET  - count + key * count
//! - 0x05: GETWHEN   - key + cond_key + cond_value
//! - 0x06: EXIT      - empty
//! - 0x10: REGISTER  - username + password
//! - 0x11: LOGIN     - username + password
//!
//! ### Responses
//! - 0x00: ACK       - message
//! - 0x01: NOT_FOUND - empty
//! - 0x02: ERROR     - message
//! - 0x03: VALUE     - value
//! - 0x04: VALUES    - count + (key + value) * count
//! - 0x05: AUTH      - success (1) + message

mod request;
mod response;
mod codec;

pub use request::{Request, RequestType};
pub use response::{Response, Status};
pub use codec::{
    decode_request, decode_response, encode_request, encode_response, read_request,
    read_response, response_payload_len, write_request, write_response, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
