//! The incremental HTTP/1 message parser.
//!
//! [`Parser::execute`] consumes one fragment of a byte stream and reports
//! message structure through a [`Handler`]. The parser owns no buffers: data
//! callbacks borrow directly from the fragment being parsed, and a field that
//! straddles fragments is simply reported in more than one piece. Any split
//! of the input, down to one byte per call, produces the same callback
//! sequence up to concatenation of adjacent data payloads.

use std::cmp;

use tracing::{debug, trace};

use crate::error::Errno;
use crate::method::Method;
use crate::url::{parse_url_char, UrlState};
use crate::HTTP_MAX_HEADER_SIZE;

const CR: u8 = b'\r';
const LF: u8 = b'\n';
const HTTP_LITERAL: &[u8] = b"HTTP/";
const CHUNKED: &[u8] = b"chunked";
const KEEP_ALIVE: &[u8] = b"keep-alive";
const CLOSE: &[u8] = b"close";
const CONNECTION: &[u8] = b"connection";
const PROXY_CONNECTION: &[u8] = b"proxy-connection";
const CONTENT_LENGTH: &[u8] = b"content-length";
const TRANSFER_ENCODING: &[u8] = b"transfer-encoding";

/// Sentinel meaning "no Content-Length seen"; never exposed (the public
/// accessor returns an `Option`).
const NO_CONTENT_LENGTH: u64 = u64::MAX;

/// Largest representable body or chunk size: a signed 64-bit range.
const MAX_LENGTH: u64 = i64::MAX as u64;

/// What kind of messages a [`Parser`] accepts.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Kind {
    /// Parse requests only.
    Request,
    /// Parse responses only.
    Response,
    /// Autodetect on the first byte of each message. A message starting with
    /// the full `HTTP/` literal is a response; anything else is a request
    /// (so `HEAD`, sharing the `H`, is decided on the second byte).
    Both,
}

/// Framing facts about the current message, exposed by [`Parser::flags`].
///
/// The values are stable bit positions.
#[derive(Debug)]
pub struct Flags;

impl Flags {
    /// `Transfer-Encoding: chunked` governs the body.
    pub const CHUNKED: u8 = 1 << 0;
    /// Inside the trailer section after the last chunk.
    pub const TRAILING: u8 = 1 << 3;
    /// An `Upgrade:` header was seen.
    pub const UPGRADE: u8 = 1 << 4;
    /// The body, if any, is to be discarded without `on_body` callbacks.
    pub const SKIPBODY: u8 = 1 << 5;
}

/// What [`Handler::on_headers_complete`] tells the parser about the body.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HeadersAction {
    /// Frame the body from the headers as usual.
    Normal,
    /// No body follows even if the headers advertise one; used for responses
    /// to `HEAD` requests, which carry the entity headers but no entity.
    SkipBody,
    /// No body follows and the connection leaves HTTP; `execute` returns at
    /// the end of the headers with [`Parser::has_upgrade`] set.
    Upgrade,
    /// Stop parsing with `CB_headers_complete`.
    Abort,
}

impl Default for HeadersAction {
    fn default() -> HeadersAction {
        HeadersAction::Normal
    }
}

/// Receives parse events from [`Parser::execute`].
///
/// All methods are optional; the defaults accept everything and discard the
/// data. Data callbacks borrow from the buffer passed to `execute` and may
/// fire several times for one logical field when it spans fragments, so a
/// handler that needs the whole field must concatenate. Returning `false`
/// from any `bool` callback stops the parser with the matching `CB_*` error.
///
/// A callback may also call [`Parser::pause`]; `execute` then returns at that
/// callback's byte boundary and resumes there after `pause(false)`.
pub trait Handler {
    /// A new message has started.
    fn on_message_begin(&mut self, _parser: &mut Parser) -> bool {
        true
    }

    /// A piece of the request URL.
    fn on_url(&mut self, _parser: &mut Parser, _data: &[u8]) -> bool {
        true
    }

    /// A piece of the response status-line reason phrase.
    fn on_reason(&mut self, _parser: &mut Parser, _data: &[u8]) -> bool {
        true
    }

    /// A piece of a header field name.
    fn on_header_field(&mut self, _parser: &mut Parser, _data: &[u8]) -> bool {
        true
    }

    /// A piece of a header value. An empty value is reported as one empty
    /// piece.
    fn on_header_value(&mut self, _parser: &mut Parser, _data: &[u8]) -> bool {
        true
    }

    /// The header section is complete. The version, method or status code,
    /// and framing headers are all readable on `parser` at this point.
    fn on_headers_complete(&mut self, _parser: &mut Parser) -> HeadersAction {
        HeadersAction::Normal
    }

    /// A piece of the message body.
    fn on_body(&mut self, _parser: &mut Parser, _data: &[u8]) -> bool {
        true
    }

    /// A chunk-size line was parsed; [`Parser::content_length`] holds the
    /// chunk's size. Also fires for the final zero-length chunk.
    fn on_chunk_header(&mut self, _parser: &mut Parser) -> bool {
        true
    }

    /// A chunk's data and trailing CRLF were consumed, or (after the last
    /// chunk) the trailer section ended.
    fn on_chunk_complete(&mut self, _parser: &mut Parser) -> bool {
        true
    }

    /// The message is complete. The parser is ready for the next message on
    /// the connection, if there can be one.
    fn on_message_complete(&mut self, _parser: &mut Parser) -> bool {
        true
    }
}

/// A handler that ignores every event, for callers that only want framing
/// offsets and the getters.
impl Handler for () {}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    Dead,

    StartReqOrRes,
    ResOrRespH,

    StartRes,
    ResHttpProto,
    ResFirstHttpMajor,
    ResHttpMajor,
    ResFirstHttpMinor,
    ResHttpMinor,
    ResFirstStatusCode,
    ResStatusCode,
    ResStatusStart,
    ResStatus,
    ResLineAlmostDone,

    StartReq,
    ReqMethod,
    ReqSpacesBeforeUrl,
    ReqUrl(UrlState),
    ReqHttpStart,
    ReqHttpProto,
    ReqFirstHttpMajor,
    ReqHttpMajor,
    ReqFirstHttpMinor,
    ReqHttpMinor,
    ReqLineAlmostDone,

    HeaderFieldStart,
    HeaderField,
    HeaderValueDiscardWs,
    HeaderValueDiscardWsAlmostDone,
    HeaderValueDiscardLws,
    HeaderValueStart,
    HeaderValue,
    HeaderValueLws,
    HeaderAlmostDone,
    HeadersAlmostDone,
    HeadersDone,

    ChunkSizeStart,
    ChunkSize,
    ChunkParameters,
    ChunkSizeAlmostDone,
    ChunkData,
    ChunkDataAlmostDone,
    ChunkDataDone,

    BodyIdentity,
    BodyIdentityEof,
    /// A sized body was fully delivered; the message completes without
    /// consuming another byte.
    BodyDone,
    MessageDone,
}

/// Per-byte matcher over the framing-relevant header names and values.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum HeaderState {
    General,
    C,
    CO,
    CON,
    MatchingConnection,
    MatchingProxyConnection,
    MatchingContentLength,
    MatchingTransferEncoding,
    MatchingUpgrade,
    Connection,
    ContentLength,
    TransferEncoding,
    Upgrade,
    MatchingTransferEncodingChunked,
    MatchingConnectionKeepAlive,
    MatchingConnectionClose,
    TransferEncodingChunked,
    ConnectionKeepAlive,
    ConnectionClose,
}

macro_rules! fail {
    ($parser:expr, $err:expr, $consumed:expr) => {{
        debug!("parse error at byte {}: {}", $consumed, $err.name());
        $parser.errno = $err;
        return $consumed
    }};
}

// Point callback: on abort or pause, `$consumed` bytes are reported eaten and
// the saved state must be correct to resume from there.
macro_rules! notify {
    ($parser:expr, $handler:expr, $cb:ident, $err:expr, $consumed:expr) => {{
        if !$handler.$cb($parser) {
            $parser.errno = $err;
            return $consumed;
        }
        if $parser.errno == Errno::Paused {
            return $consumed;
        }
    }};
}

// Data callback; same contract as `notify!`.
macro_rules! emit {
    ($parser:expr, $handler:expr, $cb:ident, $slice:expr, $err:expr, $consumed:expr) => {{
        if !$handler.$cb($parser, $slice) {
            $parser.errno = $err;
            return $consumed;
        }
        if $parser.errno == Errno::Paused {
            return $consumed;
        }
    }};
}

/// An incremental HTTP/1.x message parser.
///
/// A parser is a few dozen bytes of state and never allocates. Create one per
/// connection direction, feed it stream fragments with [`execute`], and read
/// the getters once `on_headers_complete` has fired. After a framing or
/// callback error the parser refuses further input until it is replaced;
/// after a pause it resumes exactly where it stopped.
///
/// [`execute`]: Parser::execute
#[derive(Debug)]
pub struct Parser {
    kind: Kind,
    /// Resolved type of the current message; differs from `kind` only in
    /// `Both` mode.
    mtype: Kind,
    state: State,
    header_state: HeaderState,
    /// Position within whatever literal is being matched.
    index: usize,
    flags: u8,
    /// Bytes seen in the current metadata region, capped by
    /// `HTTP_MAX_HEADER_SIZE`.
    nread: u32,
    /// Remaining bytes of the current body or chunk; `NO_CONTENT_LENGTH`
    /// when no length is known.
    content_length: u64,
    /// Accumulator for the Content-Length value currently being read, kept
    /// apart so repeated headers can be compared instead of concatenated.
    header_cl: u64,
    http_major: u16,
    http_minor: u16,
    status_code: u16,
    method: Option<Method>,
    errno: Errno,
    upgrade: bool,
    strict: bool,
    connection_keep_alive: bool,
    connection_close: bool,
}

impl Parser {
    /// A lenient parser: bare LF line endings, high-bit header-value bytes,
    /// and other widely deployed deviations are tolerated.
    pub fn new(kind: Kind) -> Parser {
        Parser::with_strictness(kind, false)
    }

    /// A strict parser: byte sequences the RFCs do not allow are rejected
    /// with the `STRICT` error even where `new` would tolerate them.
    pub fn strict(kind: Kind) -> Parser {
        Parser::with_strictness(kind, true)
    }

    fn with_strictness(kind: Kind, strict: bool) -> Parser {
        Parser {
            kind,
            mtype: kind,
            state: match kind {
                Kind::Request => State::StartReq,
                Kind::Response => State::StartRes,
                Kind::Both => State::StartReqOrRes,
            },
            header_state: HeaderState::General,
            index: 0,
            flags: 0,
            nread: 0,
            content_length: NO_CONTENT_LENGTH,
            header_cl: 0,
            http_major: 0,
            http_minor: 0,
            status_code: 0,
            method: None,
            errno: Errno::Ok,
            upgrade: false,
            strict,
            connection_keep_alive: false,
            connection_close: false,
        }
    }

    // getters

    /// The kind this parser was created with.
    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// The last error, `Errno::Ok` if none. Sticky for everything except
    /// `Errno::Paused`, which [`pause`](Parser::pause) clears.
    pub fn errno(&self) -> Errno {
        self.errno
    }

    /// Major HTTP version of the current message.
    pub fn http_major(&self) -> u16 {
        self.http_major
    }

    /// Minor HTTP version of the current message.
    pub fn http_minor(&self) -> u16 {
        self.http_minor
    }

    /// Status code of the current response.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Method of the current request, once the request line has been read.
    pub fn method(&self) -> Option<Method> {
        self.method
    }

    /// Remaining length of the current body region: the undelivered part of
    /// a `Content-Length` body, or the current chunk. `None` when no length
    /// is known (no such header, or an EOF-delimited body).
    pub fn content_length(&self) -> Option<u64> {
        if self.content_length == NO_CONTENT_LENGTH {
            None
        } else {
            Some(self.content_length)
        }
    }

    /// Whether the message arms an upgrade handoff. When true after
    /// [`execute`](Parser::execute) returns, bytes past the returned count
    /// belong to the upgraded protocol and were not parsed.
    pub fn has_upgrade(&self) -> bool {
        self.upgrade
    }

    /// The [`Flags`] bits for the current message.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Whether the connection can carry another message after the current
    /// one, from the version and `Connection`/`Proxy-Connection` headers and
    /// whether the message length is EOF-delimited.
    pub fn should_keep_alive(&self) -> bool {
        if self.http_major > 0 && self.http_minor > 0 {
            // HTTP/1.1: keep alive unless told to close
            if self.connection_close {
                return false;
            }
        } else if !self.connection_keep_alive {
            // HTTP/1.0: close unless told to keep alive
            return false;
        }
        !self.message_needs_eof()
    }

    // setters

    /// Pause (`true`) or resume (`false`) the parser. Pausing from inside a
    /// callback makes the surrounding `execute` return at that callback's
    /// byte boundary; a paused parser consumes nothing and reports
    /// `Errno::Paused` until resumed.
    pub fn pause(&mut self, paused: bool) {
        if paused {
            if self.errno == Errno::Ok {
                self.errno = Errno::Paused;
            }
        } else if self.errno == Errno::Paused {
            self.errno = Errno::Ok;
        }
    }

    /// Force the current message's body to be skipped, as if
    /// `on_headers_complete` had returned [`HeadersAction::SkipBody`].
    pub fn set_skip_body(&mut self, skip: bool) {
        if skip {
            self.flags |= Flags::SKIPBODY;
        } else {
            self.flags &= !Flags::SKIPBODY;
        }
    }

    // internals

    fn start_state(&self) -> State {
        match self.kind {
            Kind::Request => State::StartReq,
            Kind::Response => State::StartRes,
            Kind::Both => State::StartReqOrRes,
        }
    }

    fn begin_message(&mut self) {
        trace!("message begin");
        self.flags = 0;
        self.content_length = NO_CONTENT_LENGTH;
        self.header_cl = 0;
        self.http_major = 0;
        self.http_minor = 0;
        self.status_code = 0;
        self.method = None;
        self.upgrade = false;
        self.connection_keep_alive = false;
        self.connection_close = false;
        self.header_state = HeaderState::General;
        self.index = 0;
    }

    fn message_needs_eof(&self) -> bool {
        if self.mtype == Kind::Request {
            return false;
        }
        if self.status_code / 100 == 1
            || self.status_code == 204
            || self.status_code == 304
            || self.flags & Flags::SKIPBODY != 0
        {
            return false;
        }
        if self.flags & Flags::CHUNKED != 0 || self.content_length != NO_CONTENT_LENGTH {
            return false;
        }
        true
    }

    /// Fire `on_message_complete` and park the parser for the next message
    /// (or in the dead state when the connection cannot be reused). Returns
    /// false when the callback aborted.
    fn finish_message<H: Handler>(&mut self, handler: &mut H) -> bool {
        trace!("message complete");
        self.nread = 0;
        self.state = if self.should_keep_alive() {
            self.start_state()
        } else {
            State::Dead
        };
        if !handler.on_message_complete(self) {
            self.errno = Errno::CbMessageComplete;
            return false;
        }
        true
    }

    /// Whether bytes dispatched in the current state count against the
    /// metadata cap. Body data never does.
    fn counts_header_bytes(&self) -> bool {
        !matches!(
            self.state,
            State::Dead
                | State::ChunkData
                | State::ChunkDataAlmostDone
                | State::ChunkDataDone
                | State::BodyIdentity
                | State::BodyIdentityEof
                | State::BodyDone
                | State::MessageDone
        )
    }

    /// One lowercased token byte of a header field name.
    fn header_field_byte(&mut self, c: u8) {
        use self::HeaderState::*;

        self.header_state = match self.header_state {
            General => General,
            C => {
                self.index += 1;
                if c == b'o' {
                    CO
                } else {
                    General
                }
            }
            CO => {
                self.index += 1;
                if c == b'n' {
                    CON
                } else {
                    General
                }
            }
            CON => {
                self.index += 1;
                match c {
                    b'n' => MatchingConnection,
                    b't' => MatchingContentLength,
                    _ => General,
                }
            }
            MatchingConnection => self.match_literal(c, CONNECTION, MatchingConnection, Connection),
            MatchingProxyConnection => {
                // a matched Proxy-Connection is handled exactly like Connection
                self.match_literal(c, PROXY_CONNECTION, MatchingProxyConnection, Connection)
            }
            MatchingContentLength => {
                self.match_literal(c, CONTENT_LENGTH, MatchingContentLength, ContentLength)
            }
            MatchingTransferEncoding => self.match_literal(
                c,
                TRANSFER_ENCODING,
                MatchingTransferEncoding,
                TransferEncoding,
            ),
            MatchingUpgrade => self.match_literal(c, b"upgrade", MatchingUpgrade, Upgrade),
            // the name continued past a full match, so it is something else
            other => {
                if c != b' ' {
                    General
                } else {
                    other
                }
            }
        };
    }

    fn match_literal(
        &mut self,
        c: u8,
        literal: &[u8],
        cont: HeaderState,
        done: HeaderState,
    ) -> HeaderState {
        self.index += 1;
        if self.index >= literal.len() || c != literal[self.index] {
            HeaderState::General
        } else if self.index == literal.len() - 1 {
            done
        } else {
            cont
        }
    }

    /// One byte of a header value.
    fn header_value_byte(&mut self, b: u8) -> Result<(), Errno> {
        use self::HeaderState::*;

        let c = b.to_ascii_lowercase();
        match self.header_state {
            General => {}
            ContentLength => {
                if !b.is_ascii_digit() {
                    return Err(Errno::InvalidContentLength);
                }
                let digit = u64::from(b - b'0');
                match self.header_cl.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                    Some(v) if v <= MAX_LENGTH => self.header_cl = v,
                    _ => return Err(Errno::HugeContentLength),
                }
            }
            MatchingTransferEncodingChunked => {
                self.header_state = self.match_literal(
                    c,
                    CHUNKED,
                    MatchingTransferEncodingChunked,
                    TransferEncodingChunked,
                );
            }
            MatchingConnectionKeepAlive => {
                self.header_state = self.match_literal(
                    c,
                    KEEP_ALIVE,
                    MatchingConnectionKeepAlive,
                    ConnectionKeepAlive,
                );
            }
            MatchingConnectionClose => {
                self.header_state =
                    self.match_literal(c, CLOSE, MatchingConnectionClose, ConnectionClose);
            }
            TransferEncodingChunked | ConnectionKeepAlive | ConnectionClose => {
                // trailing bytes other than spaces mean the value is not the
                // bare literal after all
                if b != b' ' {
                    self.header_state = General;
                }
            }
            _ => self.header_state = General,
        }
        Ok(())
    }

    /// A header line ended without folding: apply its framing effect.
    fn commit_header(&mut self) -> Result<(), Errno> {
        use self::HeaderState::*;

        match self.header_state {
            ConnectionKeepAlive => self.connection_keep_alive = true,
            ConnectionClose => self.connection_close = true,
            TransferEncodingChunked => self.flags |= Flags::CHUNKED,
            ContentLength => {
                // chunked framing makes any Content-Length irrelevant
                if self.flags & Flags::CHUNKED == 0 {
                    if self.content_length != NO_CONTENT_LENGTH
                        && self.content_length != self.header_cl
                    {
                        return Err(Errno::InvalidContentLength);
                    }
                    self.content_length = self.header_cl;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Feed a fragment of the stream to the parser, returning how many bytes
    /// were consumed.
    ///
    /// A return value equal to `data.len()` means clean progress. A shorter
    /// count means the parser stopped: [`errno`](Parser::errno) reports a
    /// protocol or callback error (or `Paused`), or
    /// [`has_upgrade`](Parser::has_upgrade) reports that the remaining bytes
    /// belong to an upgraded protocol.
    ///
    /// An empty `data` signals EOF: it completes an EOF-delimited body, is a
    /// no-op between messages, and is `INVALID_EOF_STATE` mid-message.
    pub fn execute<H: Handler>(&mut self, handler: &mut H, data: &[u8]) -> usize {
        if self.errno != Errno::Ok {
            return 0;
        }

        if data.is_empty() {
            match self.state {
                State::BodyIdentityEof | State::BodyDone | State::MessageDone => {
                    self.finish_message(handler);
                }
                State::Dead | State::StartReqOrRes | State::StartRes | State::StartReq => {}
                _ => self.errno = Errno::InvalidEofState,
            }
            return 0;
        }

        let len = data.len();

        // Data regions resuming from a previous call re-mark at offset zero.
        let mut url_mark = match self.state {
            State::ReqUrl(_) => Some(0),
            _ => None,
        };
        let mut reason_mark = if self.state == State::ResStatus {
            Some(0)
        } else {
            None
        };
        let mut field_mark = if self.state == State::HeaderField {
            Some(0)
        } else {
            None
        };
        let mut value_mark = if self.state == State::HeaderValue {
            Some(0)
        } else {
            None
        };

        let mut p = 0;

        'bytes: while p < len {
            let b = data[p];

            if self.counts_header_bytes() {
                self.nread += 1;
                if self.nread > HTTP_MAX_HEADER_SIZE {
                    fail!(self, Errno::HeaderOverflow, p);
                }
            }

            // Dispatch the byte at `p`. `break` consumes it; `continue`
            // re-dispatches it after a transition that consumed nothing.
            loop {
                match self.state {
                    State::Dead => fail!(self, Errno::ClosedConnection, p),

                    State::StartReqOrRes => {
                        if b == CR || b == LF {
                            break;
                        }
                        self.begin_message();
                        if b == b'H' {
                            // response, unless the next byte makes it HEAD
                            self.mtype = Kind::Response;
                            self.state = State::ResOrRespH;
                            notify!(self, handler, on_message_begin, Errno::CbMessageBegin, p + 1);
                            break;
                        }
                        self.mtype = Kind::Request;
                        self.state = State::StartReq;
                        continue;
                    }

                    State::ResOrRespH => {
                        match b {
                            b'T' => {
                                self.mtype = Kind::Response;
                                self.index = 2;
                                self.state = State::ResHttpProto;
                            }
                            b'E' => {
                                self.mtype = Kind::Request;
                                self.method = Some(Method::Head);
                                self.index = 2;
                                self.state = State::ReqMethod;
                            }
                            _ => fail!(self, Errno::InvalidConstant, p),
                        }
                        break;
                    }

                    State::StartRes => {
                        if b == CR || b == LF {
                            break;
                        }
                        if b != b'H' {
                            fail!(self, Errno::InvalidConstant, p);
                        }
                        self.begin_message();
                        self.mtype = Kind::Response;
                        self.index = 1;
                        self.state = State::ResHttpProto;
                        notify!(self, handler, on_message_begin, Errno::CbMessageBegin, p + 1);
                        break;
                    }

                    State::ResHttpProto | State::ReqHttpProto => {
                        if self.index < HTTP_LITERAL.len() && b == HTTP_LITERAL[self.index] {
                            self.index += 1;
                            if self.index == HTTP_LITERAL.len() {
                                self.state = if self.state == State::ResHttpProto {
                                    State::ResFirstHttpMajor
                                } else {
                                    State::ReqFirstHttpMajor
                                };
                            }
                            break;
                        }
                        fail!(self, Errno::InvalidConstant, p);
                    }

                    State::ResFirstHttpMajor | State::ReqFirstHttpMajor => {
                        if !(b'1'..=b'9').contains(&b) {
                            fail!(self, Errno::InvalidVersion, p);
                        }
                        self.http_major = u16::from(b - b'0');
                        self.state = if self.state == State::ResFirstHttpMajor {
                            State::ResHttpMajor
                        } else {
                            State::ReqHttpMajor
                        };
                        break;
                    }

                    State::ResHttpMajor | State::ReqHttpMajor => {
                        match b {
                            b'.' => {
                                self.state = if self.state == State::ResHttpMajor {
                                    State::ResFirstHttpMinor
                                } else {
                                    State::ReqFirstHttpMinor
                                };
                            }
                            b'0'..=b'9' => {
                                self.http_major = self.http_major * 10 + u16::from(b - b'0');
                                if self.http_major > 999 {
                                    fail!(self, Errno::InvalidVersion, p);
                                }
                            }
                            _ => fail!(self, Errno::InvalidVersion, p),
                        }
                        break;
                    }

                    State::ResFirstHttpMinor | State::ReqFirstHttpMinor => {
                        if !b.is_ascii_digit() {
                            fail!(self, Errno::InvalidVersion, p);
                        }
                        self.http_minor = u16::from(b - b'0');
                        self.state = if self.state == State::ResFirstHttpMinor {
                            State::ResHttpMinor
                        } else {
                            State::ReqHttpMinor
                        };
                        break;
                    }

                    State::ResHttpMinor => {
                        match b {
                            b' ' => self.state = State::ResFirstStatusCode,
                            b'0'..=b'9' => {
                                self.http_minor = self.http_minor * 10 + u16::from(b - b'0');
                                if self.http_minor > 999 {
                                    fail!(self, Errno::InvalidVersion, p);
                                }
                            }
                            _ => fail!(self, Errno::InvalidVersion, p),
                        }
                        break;
                    }

                    State::ReqHttpMinor => {
                        match b {
                            CR => self.state = State::ReqLineAlmostDone,
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeaderFieldStart;
                            }
                            b'0'..=b'9' => {
                                self.http_minor = self.http_minor * 10 + u16::from(b - b'0');
                                if self.http_minor > 999 {
                                    fail!(self, Errno::InvalidVersion, p);
                                }
                            }
                            _ => fail!(self, Errno::InvalidVersion, p),
                        }
                        break;
                    }

                    State::ResFirstStatusCode => {
                        if b.is_ascii_digit() {
                            self.status_code = u16::from(b - b'0');
                            self.state = State::ResStatusCode;
                        } else if b != b' ' {
                            fail!(self, Errno::InvalidStatus, p);
                        }
                        break;
                    }

                    State::ResStatusCode => {
                        if b.is_ascii_digit() {
                            self.status_code = self.status_code * 10 + u16::from(b - b'0');
                            if self.status_code > 999 {
                                fail!(self, Errno::InvalidStatus, p);
                            }
                            break;
                        }
                        match b {
                            b' ' => self.state = State::ResStatusStart,
                            CR => self.state = State::ResLineAlmostDone,
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeaderFieldStart;
                            }
                            _ => fail!(self, Errno::InvalidStatus, p),
                        }
                        break;
                    }

                    State::ResStatusStart => {
                        match b {
                            CR => self.state = State::ResLineAlmostDone,
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeaderFieldStart;
                            }
                            _ => {
                                reason_mark = Some(p);
                                self.state = State::ResStatus;
                            }
                        }
                        break;
                    }

                    State::ResStatus => {
                        match b {
                            CR => {
                                self.state = State::ResLineAlmostDone;
                                if let Some(m) = reason_mark.take() {
                                    emit!(
                                        self,
                                        handler,
                                        on_reason,
                                        &data[m..p],
                                        Errno::CbReason,
                                        p + 1
                                    );
                                }
                            }
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeaderFieldStart;
                                if let Some(m) = reason_mark.take() {
                                    emit!(
                                        self,
                                        handler,
                                        on_reason,
                                        &data[m..p],
                                        Errno::CbReason,
                                        p + 1
                                    );
                                }
                            }
                            _ => {}
                        }
                        break;
                    }

                    State::ResLineAlmostDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.state = State::HeaderFieldStart;
                        break;
                    }

                    State::StartReq => {
                        if b == CR || b == LF {
                            break;
                        }
                        self.begin_message();
                        self.mtype = Kind::Request;
                        self.method = Some(match b {
                            b'C' => Method::Connect,
                            b'D' => Method::Delete,
                            b'G' => Method::Get,
                            b'H' => Method::Head,
                            b'L' => Method::Lock,
                            b'M' => Method::Mkcol,
                            b'N' => Method::Notify,
                            b'O' => Method::Options,
                            b'P' => Method::Post,
                            b'R' => Method::Report,
                            b'S' => Method::Subscribe,
                            b'T' => Method::Trace,
                            b'U' => Method::Unlock,
                            _ => fail!(self, Errno::InvalidMethod, p),
                        });
                        self.index = 1;
                        self.state = State::ReqMethod;
                        notify!(self, handler, on_message_begin, Errno::CbMessageBegin, p + 1);
                        break;
                    }

                    State::ReqMethod => {
                        let method = match self.method {
                            Some(m) => m,
                            None => fail!(self, Errno::InvalidInternalState, p),
                        };
                        let matcher = method.as_str().as_bytes();
                        if b == b' ' && self.index == matcher.len() {
                            self.state = State::ReqSpacesBeforeUrl;
                        } else if self.index < matcher.len() && b == matcher[self.index] {
                            self.index += 1;
                        } else {
                            // branch points where method literals share a prefix
                            let switched = match (method, self.index, b) {
                                (Method::Connect, 1, b'H') => Method::Checkout,
                                (Method::Connect, 2, b'P') => Method::Copy,
                                (Method::Mkcol, 1, b'O') => Method::Move,
                                (Method::Mkcol, 1, b'E') => Method::Merge,
                                (Method::Mkcol, 1, b'-') => Method::Msearch,
                                (Method::Mkcol, 2, b'A') => Method::Mkactivity,
                                (Method::Post, 1, b'R') => Method::Propfind,
                                (Method::Post, 1, b'U') => Method::Put,
                                (Method::Post, 1, b'A') => Method::Patch,
                                (Method::Propfind, 4, b'P') => Method::Proppatch,
                                (Method::Unlock, 2, b'S') => Method::Unsubscribe,
                                _ => fail!(self, Errno::InvalidMethod, p),
                            };
                            self.method = Some(switched);
                            self.index += 1;
                        }
                        break;
                    }

                    State::ReqSpacesBeforeUrl => {
                        if b == b' ' {
                            break;
                        }
                        url_mark = Some(p);
                        // CONNECT carries a bare authority instead of a URL
                        let start = if self.method == Some(Method::Connect) {
                            UrlState::ServerStart
                        } else {
                            UrlState::Start
                        };
                        let next = parse_url_char(start, b, self.strict);
                        if next == UrlState::Dead {
                            fail!(self, Errno::InvalidUrl, p);
                        }
                        self.state = State::ReqUrl(next);
                        break;
                    }

                    State::ReqUrl(url_state) => {
                        match b {
                            b' ' => {
                                self.state = State::ReqHttpStart;
                                if let Some(m) = url_mark.take() {
                                    emit!(self, handler, on_url, &data[m..p], Errno::CbUrl, p + 1);
                                }
                            }
                            CR | LF => {
                                if b == LF && self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                // no version: an HTTP/0.9 simple message
                                self.http_major = 0;
                                self.http_minor = 9;
                                self.state = if b == CR {
                                    State::ReqLineAlmostDone
                                } else {
                                    State::HeaderFieldStart
                                };
                                if let Some(m) = url_mark.take() {
                                    emit!(self, handler, on_url, &data[m..p], Errno::CbUrl, p + 1);
                                }
                            }
                            _ => {
                                let next = parse_url_char(url_state, b, self.strict);
                                if next == UrlState::Dead {
                                    fail!(self, Errno::InvalidUrl, p);
                                }
                                self.state = State::ReqUrl(next);
                            }
                        }
                        break;
                    }

                    State::ReqHttpStart => {
                        match b {
                            b'H' => {
                                self.index = 1;
                                self.state = State::ReqHttpProto;
                            }
                            b' ' => {}
                            _ => fail!(self, Errno::InvalidConstant, p),
                        }
                        break;
                    }

                    State::ReqLineAlmostDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.state = State::HeaderFieldStart;
                        break;
                    }

                    State::HeaderFieldStart => {
                        match b {
                            CR => {
                                self.state = State::HeadersAlmostDone;
                                break;
                            }
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeadersAlmostDone;
                                continue;
                            }
                            _ => {
                                let c = match token(b, self.strict) {
                                    Some(c) => c,
                                    None => fail!(self, Errno::InvalidHeaderToken, p),
                                };
                                field_mark = Some(p);
                                self.index = 0;
                                self.header_state = match c {
                                    b'c' => HeaderState::C,
                                    b'p' => HeaderState::MatchingProxyConnection,
                                    b't' => HeaderState::MatchingTransferEncoding,
                                    b'u' => HeaderState::MatchingUpgrade,
                                    _ => HeaderState::General,
                                };
                                self.state = State::HeaderField;
                                break;
                            }
                        }
                    }

                    State::HeaderField => {
                        if let Some(c) = token(b, self.strict) {
                            self.header_field_byte(c);
                            break;
                        }
                        if b == b':' {
                            self.state = State::HeaderValueDiscardWs;
                            if let Some(m) = field_mark.take() {
                                emit!(
                                    self,
                                    handler,
                                    on_header_field,
                                    &data[m..p],
                                    Errno::CbHeaderField,
                                    p + 1
                                );
                            }
                            break;
                        }
                        fail!(self, Errno::InvalidHeaderToken, p);
                    }

                    State::HeaderValueDiscardWs => {
                        match b {
                            b' ' | b'\t' => break,
                            CR => {
                                self.state = State::HeaderValueDiscardWsAlmostDone;
                                break;
                            }
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeaderValueDiscardWsAlmostDone;
                                continue;
                            }
                            _ => {
                                self.state = State::HeaderValueStart;
                                continue;
                            }
                        }
                    }

                    State::HeaderValueDiscardWsAlmostDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.state = State::HeaderValueDiscardLws;
                        break;
                    }

                    State::HeaderValueDiscardLws => {
                        if b == b' ' || b == b'\t' {
                            // folded before any value bytes: keep discarding
                            self.state = State::HeaderValueDiscardWs;
                            break;
                        }
                        // the value was empty
                        self.state = State::HeaderFieldStart;
                        emit!(
                            self,
                            handler,
                            on_header_value,
                            &data[p..p],
                            Errno::CbHeaderValue,
                            p
                        );
                        continue;
                    }

                    State::HeaderValueStart => {
                        if self.strict && !strict_value_byte(b) {
                            fail!(self, Errno::InvalidHeaderToken, p);
                        }
                        value_mark = Some(p);
                        self.state = State::HeaderValue;
                        self.index = 0;
                        let c = b.to_ascii_lowercase();
                        match self.header_state {
                            HeaderState::Upgrade => {
                                self.flags |= Flags::UPGRADE;
                                self.header_state = HeaderState::General;
                            }
                            HeaderState::TransferEncoding => {
                                self.header_state = if c == b'c' {
                                    HeaderState::MatchingTransferEncodingChunked
                                } else {
                                    HeaderState::General
                                };
                            }
                            HeaderState::ContentLength => {
                                if !b.is_ascii_digit() {
                                    fail!(self, Errno::InvalidContentLength, p);
                                }
                                self.header_cl = u64::from(b - b'0');
                            }
                            HeaderState::Connection => {
                                self.header_state = match c {
                                    b'k' => HeaderState::MatchingConnectionKeepAlive,
                                    b'c' => HeaderState::MatchingConnectionClose,
                                    _ => HeaderState::General,
                                };
                            }
                            HeaderState::General => {}
                            _ => self.header_state = HeaderState::General,
                        }
                        break;
                    }

                    State::HeaderValue => {
                        match b {
                            CR => {
                                self.state = State::HeaderAlmostDone;
                                if let Some(m) = value_mark.take() {
                                    emit!(
                                        self,
                                        handler,
                                        on_header_value,
                                        &data[m..p],
                                        Errno::CbHeaderValue,
                                        p + 1
                                    );
                                }
                                break;
                            }
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::HeaderAlmostDone;
                                if let Some(m) = value_mark.take() {
                                    emit!(
                                        self,
                                        handler,
                                        on_header_value,
                                        &data[m..p],
                                        Errno::CbHeaderValue,
                                        p
                                    );
                                }
                                continue;
                            }
                            _ => {
                                if self.strict && !strict_value_byte(b) {
                                    fail!(self, Errno::InvalidHeaderToken, p);
                                }
                                if let Err(e) = self.header_value_byte(b) {
                                    fail!(self, e, p);
                                }
                                break;
                            }
                        }
                    }

                    State::HeaderAlmostDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.state = State::HeaderValueLws;
                        break;
                    }

                    State::HeaderValueLws => {
                        if b == b' ' || b == b'\t' {
                            // obsolete line folding; the whitespace byte
                            // reopens the value so concatenated pieces keep a
                            // separator
                            self.state = State::HeaderValueStart;
                            continue;
                        }
                        if let Err(e) = self.commit_header() {
                            fail!(self, e, p);
                        }
                        self.state = State::HeaderFieldStart;
                        continue;
                    }

                    State::HeadersAlmostDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        if self.flags & Flags::TRAILING != 0 {
                            // end of the trailer section ends the message
                            self.state = State::MessageDone;
                            notify!(
                                self,
                                handler,
                                on_chunk_complete,
                                Errno::CbChunkComplete,
                                p
                            );
                            continue;
                        }
                        if self.flags & Flags::UPGRADE != 0 || self.method == Some(Method::Connect)
                        {
                            self.upgrade = true;
                        }
                        self.state = State::HeadersDone;
                        match handler.on_headers_complete(self) {
                            HeadersAction::Normal => {}
                            HeadersAction::SkipBody => self.flags |= Flags::SKIPBODY,
                            HeadersAction::Upgrade => {
                                self.upgrade = true;
                                self.flags |= Flags::SKIPBODY;
                            }
                            HeadersAction::Abort => fail!(self, Errno::CbHeadersComplete, p),
                        }
                        if self.errno == Errno::Paused {
                            return p;
                        }
                        continue;
                    }

                    State::HeadersDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.nread = 0;

                        let chunked = self.flags & Flags::CHUNKED != 0;
                        let skip = self.flags & Flags::SKIPBODY != 0;
                        let sized_body =
                            self.content_length != NO_CONTENT_LENGTH && self.content_length > 0;

                        if self.upgrade
                            && (self.method == Some(Method::Connect) || skip || !(chunked || sized_body))
                        {
                            // the rest of the stream is not HTTP
                            trace!("upgrade handoff after headers");
                            self.finish_message(handler);
                            return p + 1;
                        }

                        if skip {
                            if !self.finish_message(handler) {
                                return p + 1;
                            }
                            if self.errno == Errno::Paused {
                                return p + 1;
                            }
                        } else if chunked {
                            trace!("chunked body");
                            self.state = State::ChunkSizeStart;
                        } else if self.content_length == NO_CONTENT_LENGTH {
                            if self.message_needs_eof() {
                                trace!("read body until EOF");
                                self.state = State::BodyIdentityEof;
                            } else if !self.finish_message(handler) {
                                return p + 1;
                            } else if self.errno == Errno::Paused {
                                return p + 1;
                            }
                        } else if self.content_length == 0 {
                            if !self.finish_message(handler) {
                                return p + 1;
                            }
                            if self.errno == Errno::Paused {
                                return p + 1;
                            }
                        } else {
                            trace!("sized body, {} bytes", self.content_length);
                            self.state = State::BodyIdentity;
                        }
                        break;
                    }

                    State::ChunkSizeStart => {
                        let v = match unhex(b) {
                            Some(v) => v,
                            None => fail!(self, Errno::InvalidChunkSize, p),
                        };
                        self.content_length = u64::from(v);
                        self.state = State::ChunkSize;
                        break;
                    }

                    State::ChunkSize => {
                        match b {
                            CR => {
                                self.state = State::ChunkSizeAlmostDone;
                                break;
                            }
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::ChunkSizeAlmostDone;
                                continue;
                            }
                            b';' | b' ' => {
                                self.state = State::ChunkParameters;
                                break;
                            }
                            _ => {
                                let v = match unhex(b) {
                                    Some(v) => v,
                                    None => fail!(self, Errno::InvalidChunkSize, p),
                                };
                                match self
                                    .content_length
                                    .checked_mul(16)
                                    .and_then(|x| x.checked_add(u64::from(v)))
                                {
                                    Some(x) if x <= MAX_LENGTH => self.content_length = x,
                                    _ => fail!(self, Errno::HugeChunkSize, p),
                                }
                                break;
                            }
                        }
                    }

                    State::ChunkParameters => {
                        // chunk extensions are skipped, not interpreted
                        match b {
                            CR => {
                                self.state = State::ChunkSizeAlmostDone;
                                break;
                            }
                            LF => {
                                if self.strict {
                                    fail!(self, Errno::Strict, p);
                                }
                                self.state = State::ChunkSizeAlmostDone;
                                continue;
                            }
                            _ => break,
                        }
                    }

                    State::ChunkSizeAlmostDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.nread = 0;
                        debug!(
                            "incoming chunk header: {0:#x} ({0} bytes)",
                            self.content_length
                        );
                        if self.content_length == 0 {
                            self.flags |= Flags::TRAILING;
                            self.state = State::HeaderFieldStart;
                        } else {
                            self.state = State::ChunkData;
                        }
                        notify!(self, handler, on_chunk_header, Errno::CbChunkHeader, p + 1);
                        break;
                    }

                    State::ChunkData => {
                        let to_read = cmp::min(self.content_length, (len - p) as u64) as usize;
                        let end = p + to_read;
                        self.content_length -= to_read as u64;
                        if self.content_length == 0 {
                            self.state = State::ChunkDataAlmostDone;
                        }
                        emit!(self, handler, on_body, &data[p..end], Errno::CbBody, end);
                        p = end;
                        continue 'bytes;
                    }

                    State::ChunkDataAlmostDone => {
                        match b {
                            CR => {
                                self.state = State::ChunkDataDone;
                                break;
                            }
                            LF if !self.strict => {
                                self.state = State::ChunkDataDone;
                                continue;
                            }
                            _ => fail!(
                                self,
                                if self.strict {
                                    Errno::Strict
                                } else {
                                    Errno::InvalidConstant
                                },
                                p
                            ),
                        }
                    }

                    State::ChunkDataDone => {
                        if b != LF {
                            fail!(self, Errno::LfExpected, p);
                        }
                        self.nread = 0;
                        self.state = State::ChunkSizeStart;
                        notify!(
                            self,
                            handler,
                            on_chunk_complete,
                            Errno::CbChunkComplete,
                            p + 1
                        );
                        break;
                    }

                    State::BodyIdentity => {
                        let to_read = cmp::min(self.content_length, (len - p) as u64) as usize;
                        let end = p + to_read;
                        self.content_length -= to_read as u64;
                        let done = self.content_length == 0;
                        if done {
                            self.state = State::BodyDone;
                        }
                        emit!(self, handler, on_body, &data[p..end], Errno::CbBody, end);
                        p = end;
                        if done {
                            // the body ran out exactly here; nothing else
                            // terminates it
                            if !self.finish_message(handler) {
                                return p;
                            }
                            if self.errno == Errno::Paused {
                                return p;
                            }
                            if self.upgrade {
                                return p;
                            }
                        }
                        continue 'bytes;
                    }

                    State::BodyIdentityEof => {
                        emit!(self, handler, on_body, &data[p..len], Errno::CbBody, len);
                        p = len;
                        continue 'bytes;
                    }

                    State::BodyDone => {
                        // reached only when a pause interrupted the end of a
                        // sized body; the byte at `p` belongs to whatever
                        // follows the completed message
                        if !self.finish_message(handler) {
                            return p;
                        }
                        if self.errno == Errno::Paused {
                            return p;
                        }
                        if self.upgrade {
                            return p;
                        }
                        continue;
                    }

                    State::MessageDone => {
                        // the byte at `p` completed the message
                        if !self.finish_message(handler) {
                            return p + 1;
                        }
                        if self.errno == Errno::Paused {
                            return p + 1;
                        }
                        if self.upgrade {
                            return p + 1;
                        }
                        break;
                    }
                }
            }

            p += 1;
        }

        // A data region still open at the end of the fragment is delivered
        // now; the rest of it arrives with the next call.
        if let Some(m) = url_mark {
            emit!(self, handler, on_url, &data[m..len], Errno::CbUrl, len);
        }
        if let Some(m) = reason_mark {
            emit!(self, handler, on_reason, &data[m..len], Errno::CbReason, len);
        }
        if let Some(m) = field_mark {
            emit!(
                self,
                handler,
                on_header_field,
                &data[m..len],
                Errno::CbHeaderField,
                len
            );
        }
        if let Some(m) = value_mark {
            emit!(
                self,
                handler,
                on_header_value,
                &data[m..len],
                Errno::CbHeaderValue,
                len
            );
        }

        len
    }
}

/// Lowercase a header-name token byte, or `None` if the byte cannot appear
/// in a field name.
fn token(b: u8, strict: bool) -> Option<u8> {
    match b {
        b'A'..=b'Z' => Some(b + 32),
        b'a'..=b'z' | b'0'..=b'9' => Some(b),
        b'!' | b'#' | b'$' | b'%' | b'&' | b'\'' | b'*' | b'+' | b'-' | b'.' | b'^' | b'_'
        | b'`' | b'|' | b'~' => Some(b),
        b' ' if !strict => Some(b' '),
        _ => None,
    }
}

fn unhex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Header values in strict mode: printable ASCII and horizontal tab.
fn strict_value_byte(b: u8) -> bool {
    b == b'\t' || (0x20..=0x7e).contains(&b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use matches::assert_matches;

    #[derive(Debug, Default)]
    struct Recorder {
        begun: usize,
        url: Vec<u8>,
        reason: Vec<u8>,
        headers: Vec<(Vec<u8>, Vec<u8>)>,
        in_value: bool,
        body: Vec<u8>,
        body_calls: usize,
        chunk_sizes: Vec<u64>,
        chunks_complete: usize,
        headers_complete: usize,
        complete: usize,
        method: Option<Method>,
        status: u16,
        version: (u16, u16),
        content_length: Option<u64>,
        action: HeadersAction,
    }

    impl Handler for Recorder {
        fn on_message_begin(&mut self, _: &mut Parser) -> bool {
            self.begun += 1;
            true
        }

        fn on_url(&mut self, _: &mut Parser, data: &[u8]) -> bool {
            self.url.extend_from_slice(data);
            true
        }

        fn on_reason(&mut self, _: &mut Parser, data: &[u8]) -> bool {
            self.reason.extend_from_slice(data);
            true
        }

        fn on_header_field(&mut self, _: &mut Parser, data: &[u8]) -> bool {
            if self.in_value || self.headers.is_empty() {
                self.headers.push((Vec::new(), Vec::new()));
                self.in_value = false;
            }
            self.headers.last_mut().unwrap().0.extend_from_slice(data);
            true
        }

        fn on_header_value(&mut self, _: &mut Parser, data: &[u8]) -> bool {
            self.in_value = true;
            self.headers.last_mut().unwrap().1.extend_from_slice(data);
            true
        }

        fn on_headers_complete(&mut self, parser: &mut Parser) -> HeadersAction {
            self.headers_complete += 1;
            self.method = parser.method();
            self.status = parser.status_code();
            self.version = (parser.http_major(), parser.http_minor());
            self.content_length = parser.content_length();
            self.action
        }

        fn on_body(&mut self, _: &mut Parser, data: &[u8]) -> bool {
            self.body_calls += 1;
            self.body.extend_from_slice(data);
            true
        }

        fn on_chunk_header(&mut self, parser: &mut Parser) -> bool {
            self.chunk_sizes.push(parser.content_length().unwrap_or(u64::MAX));
            true
        }

        fn on_chunk_complete(&mut self, _: &mut Parser) -> bool {
            self.chunks_complete += 1;
            true
        }

        fn on_message_complete(&mut self, _: &mut Parser) -> bool {
            self.complete += 1;
            true
        }
    }

    fn parse(kind: Kind, input: &[u8]) -> (Parser, Recorder, usize) {
        let mut parser = Parser::new(kind);
        let mut rec = Recorder::default();
        let consumed = parser.execute(&mut rec, input);
        (parser, rec, consumed)
    }

    fn parse_ok(kind: Kind, input: &[u8]) -> (Parser, Recorder) {
        let (parser, rec, consumed) = parse(kind, input);
        assert_eq!(parser.errno(), Errno::Ok, "errno for {:?}", input);
        assert_eq!(consumed, input.len());
        (parser, rec)
    }

    fn header(rec: &Recorder, i: usize) -> (&[u8], &[u8]) {
        let (f, v) = &rec.headers[i];
        (f, v)
    }

    #[test]
    fn simple_get() {
        let (parser, rec) = parse_ok(Kind::Request, b"GET /foo HTTP/1.1\r\nHost: a\r\n\r\n");
        assert_eq!(rec.begun, 1);
        assert_eq!(rec.url, b"/foo");
        assert_matches!(rec.method, Some(Method::Get));
        assert_eq!(rec.version, (1, 1));
        assert_eq!(rec.headers.len(), 1);
        assert_eq!(header(&rec, 0), (&b"Host"[..], &b"a"[..]));
        assert_eq!(rec.content_length, None);
        assert_eq!(rec.complete, 1);
        assert_eq!(rec.body_calls, 0);
        assert!(!parser.has_upgrade());
    }

    #[test]
    fn request_line_versions() {
        let (_, rec) = parse_ok(Kind::Request, b"GET / HTTP/1.0\r\n\r\n");
        assert_eq!(rec.version, (1, 0));

        let (_, rec) = parse_ok(Kind::Request, b"GET / HTTP/12.34\r\n\r\n");
        assert_eq!(rec.version, (12, 34));

        let (parser, _, _) = parse(Kind::Request, b"GET / HTTP/0.1\r\n\r\n");
        assert_eq!(parser.errno(), Errno::InvalidVersion);

        let (parser, _, _) = parse(Kind::Request, b"GET / HTPP/1.1\r\n\r\n");
        assert_eq!(parser.errno(), Errno::InvalidConstant);
    }

    #[test]
    fn simple_request_is_http_0_9() {
        let (_, rec) = parse_ok(Kind::Request, b"GET /\r\n\r\n");
        assert_eq!(rec.version, (0, 9));
        assert_eq!(rec.url, b"/");
        assert_eq!(rec.complete, 1);
    }

    #[test]
    fn every_method_parses() {
        let methods = [
            Method::Delete,
            Method::Get,
            Method::Head,
            Method::Post,
            Method::Put,
            Method::Connect,
            Method::Options,
            Method::Trace,
            Method::Copy,
            Method::Lock,
            Method::Mkcol,
            Method::Move,
            Method::Propfind,
            Method::Proppatch,
            Method::Unlock,
            Method::Report,
            Method::Mkactivity,
            Method::Checkout,
            Method::Merge,
            Method::Msearch,
            Method::Notify,
            Method::Subscribe,
            Method::Unsubscribe,
            Method::Patch,
        ];
        for &m in &methods {
            // CONNECT upgrades, so its request ends at the headers either way
            let input = format!("{} / HTTP/1.1\r\n\r\n", m);
            let mut parser = Parser::new(Kind::Request);
            let mut rec = Recorder::default();
            parser.execute(&mut rec, input.as_bytes());
            assert_eq!(parser.errno(), Errno::Ok, "method {}", m);
            assert_eq!(rec.method, Some(m), "method {}", m);
            assert_eq!(rec.complete, 1, "method {}", m);
        }
    }

    #[test]
    fn unknown_methods_are_rejected() {
        for input in [&b"FOO / HTTP/1.1\r\n\r\n"[..], &b"GETTER / HTTP/1.1\r\n\r\n"[..]] {
            let (parser, _, _) = parse(Kind::Request, input);
            assert_eq!(parser.errno(), Errno::InvalidMethod, "input {:?}", input);
        }
    }

    #[test]
    fn both_kind_autodetects() {
        let (_, rec) = parse_ok(Kind::Both, b"HTTP/1.1 204 No Content\r\n\r\n");
        assert_eq!(rec.status, 204);
        assert_eq!(rec.method, None);

        let (_, rec) = parse_ok(Kind::Both, b"HEAD / HTTP/1.1\r\n\r\n");
        assert_eq!(rec.method, Some(Method::Head));

        let (_, rec) = parse_ok(Kind::Both, b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(rec.method, Some(Method::Get));

        let (parser, _, _) = parse(Kind::Both, b"HX\r\n");
        assert_eq!(parser.errno(), Errno::InvalidConstant);
    }

    #[test]
    fn response_reason_phrase() {
        let mut parser = Parser::new(Kind::Response);
        let mut rec = Recorder::default();
        parser.execute(&mut rec, b"HTTP/1.1 404 Not Found\r\n\r\n");
        assert_eq!(parser.errno(), Errno::Ok);
        assert_eq!(rec.status, 404);
        assert_eq!(rec.reason, b"Not Found");
        // no length and no chunking: the body runs to EOF
        parser.execute(&mut rec, b"oops");
        parser.execute(&mut rec, b"");
        assert_eq!(parser.errno(), Errno::Ok);
        assert_eq!(rec.body, b"oops");
        assert_eq!(rec.complete, 1);
        assert!(!parser.should_keep_alive());
    }

    #[test]
    fn response_with_empty_reason() {
        let (_, rec) = parse_ok(Kind::Response, b"HTTP/1.1 204\r\n\r\n");
        assert_eq!(rec.status, 204);
        assert_eq!(rec.reason, b"");
        assert_eq!(rec.complete, 1);
    }

    #[test]
    fn eof_mid_message_is_an_error() {
        let mut parser = Parser::new(Kind::Request);
        let mut rec = Recorder::default();
        parser.execute(&mut rec, b"GET / HT");
        parser.execute(&mut rec, b"");
        assert_eq!(parser.errno(), Errno::InvalidEofState);
        // the error is sticky
        assert_eq!(parser.execute(&mut rec, b"TP/1.1\r\n\r\n"), 0);
    }

    #[test]
    fn eof_between_messages_is_clean() {
        let (mut parser, mut rec) = parse_ok(Kind::Request, b"GET / HTTP/1.1\r\n\r\n");
        assert_eq!(parser.execute(&mut rec, b""), 0);
        assert_eq!(parser.errno(), Errno::Ok);
    }

    #[test]
    fn content_length_body_split_across_calls() {
        let mut parser = Parser::new(Kind::Request);
        let mut rec = Recorder::default();
        let part1: &[u8] = b"POST / HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello ";
        let n = parser.execute(&mut rec, part1);
        assert_eq!(n, part1.len());
        assert_eq!(rec.complete, 0);
        assert_eq!(parser.content_length(), Some(5));
        let n = parser.execute(&mut rec, b"world");
        assert_eq!(n, 5);
        assert_eq!(parser.errno(), Errno::Ok);
        assert_eq!(rec.body, b"hello world");
        assert!(rec.body_calls >= 2);
        assert_eq!(rec.complete, 1);
        assert_eq!(parser.content_length(), Some(0));
    }

    #[test]
    fn invalid_content_length_stops_at_the_bad_byte() {
        let input = b"POST / HTTP/1.1\r\nContent-Length: 12x\r\n\r\n";
        let (parser, _, consumed) = parse(Kind::Request, input);
        assert_eq!(parser.errno(), Errno::InvalidContentLength);
        assert_eq!(input[consumed], b'x');
    }

    #[test]
    fn duplicate_content_length() {
        // equal repeats are fine (RFC 7230 allows them)
        let (_, rec) = parse_ok(
            Kind::Request,
            b"POST / HTTP/1.1\r\nContent-Length: 2\r\nContent-Length: 2\r\n\r\nhi",
        );
        assert_eq!(rec.body, b"hi");
        assert_eq!(rec.complete, 1);

        let (parser, _, _) = parse(
            Kind::Request,
            b"POST / HTTP/1.1\r\nContent-Length: 2\r\nContent-Length: 3\r\n\r\nhi!",
        );
        assert_eq!(parser.errno(), Errno::InvalidContentLength);
    }

    #[test]
    fn huge_content_length() {
        let (parser, _, _) = parse(
            Kind::Request,
            b"POST / HTTP/1.1\r\nContent-Length: 9999999999999999999\r\n\r\n",
        );
        assert_eq!(parser.errno(), Errno::HugeContentLength);
    }

    #[test]
    fn chunked_response() {
        let (parser, rec) = parse_ok(
            Kind::Response,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n",
        );
        assert_eq!(rec.status, 200);
        assert_eq!(rec.reason, b"OK");
        assert_eq!(rec.chunk_sizes, vec![5, 0]);
        assert_eq!(rec.body, b"hello");
        assert_eq!(rec.chunks_complete, 2);
        assert_eq!(rec.complete, 1);
        assert_ne!(parser.flags() & Flags::CHUNKED, 0);
    }

    #[test]
    fn chunked_with_extensions_and_trailers() {
        let (parser, rec) = parse_ok(
            Kind::Response,
            b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n\
              6;comment=\"x\"\r\nfoobar\r\n0\r\nVary: *\r\n\r\n",
        );
        assert_eq!(rec.chunk_sizes, vec![6, 0]);
        assert_eq!(rec.body, b"foobar");
        assert_eq!(rec.chunks_complete, 2);
        assert_eq!(rec.complete, 1);
        assert_eq!(header(&rec, 1), (&b"Vary"[..], &b"*"[..]));
        assert_ne!(parser.flags() & Flags::TRAILING, 0);
    }

    #[test]
    fn transfer_encoding_overrides_content_length() {
        let (_, rec) = parse_ok(
            Kind::Request,
            b"POST / HTTP/1.1\r\nContent-Length: 999\r\nTransfer-Encoding: chunked\r\n\r\n\
              3\r\nabc\r\n0\r\n\r\n",
        );
        assert_eq!(rec.body, b"abc");
        assert_eq!(rec.complete, 1);
    }

    fn chunk_size_of(line: &str) -> Result<u64, Errno> {
        let mut input = Vec::from(&b"POST / HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n"[..]);
        input.extend_from_slice(line.as_bytes());
        let mut parser = Parser::new(Kind::Request);
        let mut rec = Recorder::default();
        parser.execute(&mut rec, &input);
        match parser.errno() {
            Errno::Ok => Ok(rec.chunk_sizes[0]),
            e => Err(e),
        }
    }

    #[test]
    fn chunk_sizes() {
        assert_eq!(chunk_size_of("1\r\n"), Ok(1));
        assert_eq!(chunk_size_of("01\r\n"), Ok(1));
        assert_eq!(chunk_size_of("a\r\n"), Ok(10));
        assert_eq!(chunk_size_of("A\r\n"), Ok(10));
        assert_eq!(chunk_size_of("Ff\r\n"), Ok(255));
        assert_eq!(chunk_size_of("1;extension\r\n"), Ok(1));
        assert_eq!(chunk_size_of("a;ext name=value\r\n"), Ok(10));
        assert_eq!(chunk_size_of("2; extension...\r\n"), Ok(2));
        assert_eq!(chunk_size_of("3   ; extension=123\r\n"), Ok(3));
        assert_eq!(chunk_size_of("X\r\n"), Err(Errno::InvalidChunkSize));
        assert_eq!(chunk_size_of("1X\r\n"), Err(Errno::InvalidChunkSize));
        assert_eq!(chunk_size_of("-1\r\n"), Err(Errno::InvalidChunkSize));
        assert_eq!(chunk_size_of("\r\n"), Err(Errno::InvalidChunkSize));
        assert_eq!(
            chunk_size_of("f0000000000000003\r\n"),
            Err(Errno::HugeChunkSize)
        );
    }

    #[test]
    fn head_response_with_skipped_body() {
        let mut parser = Parser::new(Kind::Response);
        let mut rec = Recorder::default();
        rec.action = HeadersAction::SkipBody;
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n";
        let n = parser.execute(&mut rec, input);
        assert_eq!(n, input.len());
        assert_eq!(rec.complete, 1);
        assert_eq!(rec.body_calls, 0);
        // and the parser is ready for the next response
        rec.action = HeadersAction::Normal;
        let n = parser.execute(&mut rec, b"HTTP/1.1 204 No Content\r\n\r\n");
        assert_eq!(n, 27);
        assert_eq!(rec.complete, 2);
    }

    #[test]
    fn connect_upgrade_stops_at_the_boundary() {
        let input =
            b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com:443\r\n\r\nGARBAGE";
        let (parser, rec, consumed) = parse(Kind::Request, input);
        assert_eq!(parser.errno(), Errno::Ok);
        assert!(parser.has_upgrade());
        assert_eq!(input[consumed], b'G');
        assert_eq!(rec.url, b"example.com:443");
        assert_eq!(rec.complete, 1);
        assert_eq!(rec.body_calls, 0);
    }

    #[test]
    fn upgrade_header_arms_handoff() {
        let input = b"GET /chat HTTP/1.1\r\nUpgrade: websocket\r\nConnection: upgrade\r\n\r\n\x00ws";
        let (parser, rec, consumed) = parse(Kind::Request, input);
        assert_eq!(parser.errno(), Errno::Ok);
        assert!(parser.has_upgrade());
        assert_ne!(parser.flags() & Flags::UPGRADE, 0);
        assert_eq!(input[consumed], 0);
        assert_eq!(rec.complete, 1);
    }

    #[test]
    fn header_folding_joins_with_whitespace() {
        let (_, rec) = parse_ok(
            Kind::Request,
            b"GET / HTTP/1.1\r\nX-Long: first\r\n second\r\n\r\n",
        );
        assert_eq!(header(&rec, 0), (&b"X-Long"[..], &b"first second"[..]));
    }

    #[test]
    fn empty_header_value() {
        let (_, rec) = parse_ok(Kind::Request, b"GET / HTTP/1.1\r\nX-Empty:\r\nHost: a\r\n\r\n");
        assert_eq!(header(&rec, 0), (&b"X-Empty"[..], &b""[..]));
        assert_eq!(header(&rec, 1), (&b"Host"[..], &b"a"[..]));
    }

    #[test]
    fn invalid_header_byte() {
        let (parser, _, _) = parse(Kind::Request, b"GET / HTTP/1.1\r\nF\x01: v\r\n\r\n");
        assert_eq!(parser.errno(), Errno::InvalidHeaderToken);
    }

    #[test]
    fn lenient_accepts_bare_lf_lines() {
        let (_, rec) = parse_ok(Kind::Request, b"GET / HTTP/1.1\nHost: a\n\n");
        assert_eq!(header(&rec, 0), (&b"Host"[..], &b"a"[..]));
        assert_eq!(rec.complete, 1);
    }

    #[test]
    fn strict_rejects_bare_lf_lines() {
        let mut parser = Parser::strict(Kind::Request);
        let mut rec = Recorder::default();
        parser.execute(&mut rec, b"GET / HTTP/1.1\nHost: a\n\n");
        assert_eq!(parser.errno(), Errno::Strict);
    }

    #[test]
    fn strict_rejects_high_bit_header_values() {
        let input = b"GET / HTTP/1.1\r\nX-N: na\xefve\r\n\r\n";
        let (parser, _, _) = parse(Kind::Request, input);
        assert_eq!(parser.errno(), Errno::Ok);

        let mut parser = Parser::strict(Kind::Request);
        let mut rec = Recorder::default();
        parser.execute(&mut rec, input);
        assert_eq!(parser.errno(), Errno::InvalidHeaderToken);
    }

    #[test]
    fn header_region_cap() {
        let line = b"GET / HTTP/1.1\r\nA: ";
        let room = HTTP_MAX_HEADER_SIZE as usize - line.len() - 4;

        let mut input = Vec::from(&line[..]);
        input.extend(std::iter::repeat(b'x').take(room));
        input.extend_from_slice(b"\r\n\r\n");
        let (parser, _, consumed) = parse(Kind::Request, &input);
        assert_eq!(parser.errno(), Errno::Ok);
        assert_eq!(consumed, input.len());

        let mut input = Vec::from(&line[..]);
        input.extend(std::iter::repeat(b'x').take(room + 1));
        input.extend_from_slice(b"\r\n\r\n");
        let (parser, _, _) = parse(Kind::Request, &input);
        assert_eq!(parser.errno(), Errno::HeaderOverflow);
    }

    #[test]
    fn keep_alive_by_version_and_connection_header() {
        let (parser, _) = parse_ok(Kind::Request, b"GET / HTTP/1.1\r\n\r\n");
        assert!(parser.should_keep_alive());

        let (parser, _) = parse_ok(Kind::Request, b"GET / HTTP/1.1\r\nConnection: close\r\n\r\n");
        assert!(!parser.should_keep_alive());

        let (parser, _) = parse_ok(Kind::Request, b"GET / HTTP/1.0\r\n\r\n");
        assert!(!parser.should_keep_alive());

        let (parser, _) = parse_ok(
            Kind::Request,
            b"GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n",
        );
        assert!(parser.should_keep_alive());

        let (parser, _) = parse_ok(
            Kind::Request,
            b"GET / HTTP/1.0\r\nProxy-Connection: keep-alive\r\n\r\n",
        );
        assert!(parser.should_keep_alive());
    }

    #[test]
    fn connection_close_parks_the_parser() {
        let mut parser = Parser::new(Kind::Response);
        let mut rec = Recorder::default();
        let input = b"HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: 0\r\n\r\n";
        let n = parser.execute(&mut rec, input);
        assert_eq!(n, input.len());
        assert_eq!(rec.complete, 1);
        assert!(!parser.should_keep_alive());

        let n = parser.execute(&mut rec, b"HTTP/1.1 200 OK\r\n\r\n");
        assert_eq!(n, 0);
        assert_eq!(parser.errno(), Errno::ClosedConnection);
    }

    #[test]
    fn interim_response_then_final() {
        let (_, rec) = parse_ok(
            Kind::Response,
            b"HTTP/1.1 100 Continue\r\n\r\nHTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok",
        );
        assert_eq!(rec.complete, 2);
        assert_eq!(rec.status, 200);
        assert_eq!(rec.body, b"ok");
    }

    #[derive(Debug, Default)]
    struct PauseAtHeaders {
        rec: Recorder,
        paused_once: bool,
    }

    impl Handler for PauseAtHeaders {
        fn on_headers_complete(&mut self, parser: &mut Parser) -> HeadersAction {
            if !self.paused_once {
                self.paused_once = true;
                parser.pause(true);
            }
            self.rec.on_headers_complete(parser)
        }

        fn on_body(&mut self, parser: &mut Parser, data: &[u8]) -> bool {
            self.rec.on_body(parser, data)
        }

        fn on_message_complete(&mut self, parser: &mut Parser) -> bool {
            self.rec.on_message_complete(parser)
        }
    }

    #[test]
    fn pause_and_resume() {
        let input = b"POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhello";
        let mut parser = Parser::new(Kind::Request);
        let mut h = PauseAtHeaders::default();

        let n = parser.execute(&mut h, input);
        assert!(n < input.len());
        assert_eq!(parser.errno(), Errno::Paused);
        assert_eq!(h.rec.headers_complete, 1);
        assert_eq!(h.rec.complete, 0);

        // while paused, nothing moves
        assert_eq!(parser.execute(&mut h, &input[n..]), 0);

        parser.pause(false);
        let m = parser.execute(&mut h, &input[n..]);
        assert_eq!(n + m, input.len());
        assert_eq!(parser.errno(), Errno::Ok);
        assert_eq!(h.rec.headers_complete, 1);
        assert_eq!(h.rec.body, b"hello");
        assert_eq!(h.rec.complete, 1);
    }

    #[derive(Debug, Default)]
    struct AbortOnUrl;

    impl Handler for AbortOnUrl {
        fn on_url(&mut self, _: &mut Parser, _: &[u8]) -> bool {
            false
        }
    }

    #[test]
    fn callback_abort_sets_the_matching_errno() {
        let mut parser = Parser::new(Kind::Request);
        let mut h = AbortOnUrl::default();
        let n = parser.execute(&mut h, b"GET /foo HTTP/1.1\r\n\r\n");
        assert_eq!(parser.errno(), Errno::CbUrl);
        assert!(n < 21);
        // sticky until the parser is replaced
        assert_eq!(parser.execute(&mut h, b"x"), 0);
    }

    #[derive(Debug, Default)]
    struct SkipViaSetter(Recorder);

    impl Handler for SkipViaSetter {
        fn on_headers_complete(&mut self, parser: &mut Parser) -> HeadersAction {
            parser.set_skip_body(true);
            self.0.on_headers_complete(parser)
        }

        fn on_body(&mut self, parser: &mut Parser, data: &[u8]) -> bool {
            self.0.on_body(parser, data)
        }

        fn on_message_complete(&mut self, parser: &mut Parser) -> bool {
            self.0.on_message_complete(parser)
        }
    }

    #[test]
    fn skip_body_setter_acts_like_headers_action() {
        let mut parser = Parser::new(Kind::Response);
        let mut h = SkipViaSetter::default();
        let input = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n";
        let n = parser.execute(&mut h, input);
        assert_eq!(n, input.len());
        assert_eq!(parser.errno(), Errno::Ok);
        assert_eq!(h.0.complete, 1);
        assert_eq!(h.0.body_calls, 0);
    }
}
