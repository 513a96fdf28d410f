#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(rust_2018_idioms))]

//! # h1parse
//!
//! An incremental, zero-allocation HTTP/1 push parser.
//!
//! The [`Parser`] is a pure state machine over bytes: feed it fragments of a
//! TCP stream with [`Parser::execute`] and it reports message structure to a
//! [`Handler`] (message boundaries, URL/header/body pieces, chunked-encoding
//! boundaries) as slices borrowed straight from the input. Nothing is
//! copied and nothing is retained, so a field split across fragments is
//! reported in multiple pieces and any byte-level split of the input yields
//! the same events.
//!
//! What the parser enforces is *framing*: request/status line shape, header
//! tokens and line endings, `Content-Length` accounting, chunked
//! transfer-encoding, the HEAD/CONNECT/1xx/204/304 body-presence rules, and
//! the point where an `Upgrade`/CONNECT handoff stops being HTTP. Header
//! *semantics* beyond framing are left to the caller, as are sockets,
//! timeouts, and message building.
//!
//! ```
//! use h1parse::{Handler, Kind, Parser};
//!
//! #[derive(Default)]
//! struct UrlGrabber(Vec<u8>);
//!
//! impl Handler for UrlGrabber {
//!     fn on_url(&mut self, _: &mut Parser, piece: &[u8]) -> bool {
//!         self.0.extend_from_slice(piece);
//!         true
//!     }
//! }
//!
//! let mut parser = Parser::new(Kind::Request);
//! let mut grabber = UrlGrabber::default();
//!
//! // arbitrary fragmentation is fine
//! parser.execute(&mut grabber, b"GET /over");
//! parser.execute(&mut grabber, b"/here HTTP/1.1\r\n\r\n");
//!
//! assert_eq!(grabber.0, b"/over/here");
//! assert_eq!(parser.errno(), h1parse::Errno::Ok);
//! ```
//!
//! The companion [`parse_url`] splits a request target into component spans
//! (`schema`, `userinfo`, `host`, `port`, `path`, `query`, `fragment`)
//! without allocating, using the same character rules as the request line.

pub use crate::error::Errno;
pub use crate::method::Method;
pub use crate::parser::{Flags, Handler, HeadersAction, Kind, Parser};
pub use crate::url::{parse_url, Url, UrlField};

mod error;
mod method;
mod parser;
mod url;

/// Cap on the bytes of any metadata region (start line plus headers, a
/// chunk-size line, the trailer section). Exceeding it is `HEADER_OVERFLOW`.
pub const HTTP_MAX_HEADER_SIZE: u32 = 80 * 1024;

/// Parser interface version, `(major, minor)`.
pub const VERSION: (u16, u16) = (1, 0);
