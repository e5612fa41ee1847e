//! `FerroProxy` wire handling
//!
//! Request-head framing, request parsing, `Host`/target handling and the
//! canned responses the proxy writes itself. Everything operates on raw
//! bytes; header blocks are decoded as Latin-1, never UTF-8.

pub mod codec;
pub mod constants;
pub mod request;
pub mod response;
pub mod target;

pub use codec::HeadCodec;
pub use request::{content_length, Headers, HttpRequest, ParseError, RequestHead};
pub use response::{is_websocket_upgrade, status_code, status_response, CONNECTION_ESTABLISHED};
pub use target::{origin_form, parse_connect_target, parse_host_header, Authority};
