//! Error module.

use std::error::Error as StdError;
use std::fmt;

/// The parser's error table.
///
/// Numeric values are stable: they are assigned in declaration order and
/// survive into the wire-visible `code()` so callers can log or map them the
/// way the classic C parsers did. `Ok` (no error) and `Paused` (cooperative
/// pause, cleared by [`Parser::pause`](crate::Parser::pause)) live in the
/// same table because they travel through the same accessor.
///
/// The `Cb*` values report a handler callback that asked to abort; the
/// `Invalid*`/`Huge*`/`LfExpected`/`HeaderOverflow` values report protocol
/// violations in the input; `InvalidInternalState` and `Unknown` are
/// defensive and indicate a bug if ever observed.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Errno {
    /// No error.
    Ok = 0,
    /// The `on_message_begin` callback failed.
    CbMessageBegin,
    /// The `on_path` callback failed (legacy table slot).
    CbPath,
    /// The `on_query_string` callback failed (legacy table slot).
    CbQueryString,
    /// The `on_url` callback failed.
    CbUrl,
    /// The `on_fragment` callback failed (legacy table slot).
    CbFragment,
    /// The `on_header_field` callback failed.
    CbHeaderField,
    /// The `on_header_value` callback failed.
    CbHeaderValue,
    /// The `on_headers_complete` callback failed.
    CbHeadersComplete,
    /// The `on_body` callback failed.
    CbBody,
    /// The `on_message_complete` callback failed.
    CbMessageComplete,
    /// The `on_reason` callback failed.
    CbReason,
    /// The `on_chunk_header` callback failed.
    CbChunkHeader,
    /// The `on_chunk_complete` callback failed.
    CbChunkComplete,
    /// The stream ended while a message still needed bytes.
    InvalidEofState,
    /// Too many header bytes seen; the header size cap was exceeded.
    HeaderOverflow,
    /// Data received after a message that closed the connection.
    ClosedConnection,
    /// Invalid HTTP version.
    InvalidVersion,
    /// Invalid HTTP status code.
    InvalidStatus,
    /// Invalid HTTP method.
    InvalidMethod,
    /// Invalid URL.
    InvalidUrl,
    /// Invalid host.
    InvalidHost,
    /// Invalid port.
    InvalidPort,
    /// Invalid path.
    InvalidPath,
    /// Invalid query string.
    InvalidQueryString,
    /// Invalid fragment.
    InvalidFragment,
    /// LF character expected.
    LfExpected,
    /// Invalid character in header.
    InvalidHeaderToken,
    /// Invalid character in Content-Length header.
    InvalidContentLength,
    /// Content-Length header too large.
    HugeContentLength,
    /// Invalid character in chunk size.
    InvalidChunkSize,
    /// Chunk size too large.
    HugeChunkSize,
    /// Invalid constant string (e.g. the `HTTP/` literal).
    InvalidConstant,
    /// Encountered an unexpected internal state.
    InvalidInternalState,
    /// Strict mode assertion failed.
    Strict,
    /// Parser is paused.
    Paused,
    /// An unknown error occurred.
    Unknown,
}

impl Errno {
    /// The stable numeric value of this error.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The identifier from the error table, e.g. `"INVALID_METHOD"`.
    pub fn name(self) -> &'static str {
        match self {
            Errno::Ok => "OK",
            Errno::CbMessageBegin => "CB_message_begin",
            Errno::CbPath => "CB_path",
            Errno::CbQueryString => "CB_query_string",
            Errno::CbUrl => "CB_url",
            Errno::CbFragment => "CB_fragment",
            Errno::CbHeaderField => "CB_header_field",
            Errno::CbHeaderValue => "CB_header_value",
            Errno::CbHeadersComplete => "CB_headers_complete",
            Errno::CbBody => "CB_body",
            Errno::CbMessageComplete => "CB_message_complete",
            Errno::CbReason => "CB_reason",
            Errno::CbChunkHeader => "CB_chunk_header",
            Errno::CbChunkComplete => "CB_chunk_complete",
            Errno::InvalidEofState => "INVALID_EOF_STATE",
            Errno::HeaderOverflow => "HEADER_OVERFLOW",
            Errno::ClosedConnection => "CLOSED_CONNECTION",
            Errno::InvalidVersion => "INVALID_VERSION",
            Errno::InvalidStatus => "INVALID_STATUS",
            Errno::InvalidMethod => "INVALID_METHOD",
            Errno::InvalidUrl => "INVALID_URL",
            Errno::InvalidHost => "INVALID_HOST",
            Errno::InvalidPort => "INVALID_PORT",
            Errno::InvalidPath => "INVALID_PATH",
            Errno::InvalidQueryString => "INVALID_QUERY_STRING",
            Errno::InvalidFragment => "INVALID_FRAGMENT",
            Errno::LfExpected => "LF_EXPECTED",
            Errno::InvalidHeaderToken => "INVALID_HEADER_TOKEN",
            Errno::InvalidContentLength => "INVALID_CONTENT_LENGTH",
            Errno::HugeContentLength => "HUGE_CONTENT_LENGTH",
            Errno::InvalidChunkSize => "INVALID_CHUNK_SIZE",
            Errno::HugeChunkSize => "HUGE_CHUNK_SIZE",
            Errno::InvalidConstant => "INVALID_CONSTANT",
            Errno::InvalidInternalState => "INVALID_INTERNAL_STATE",
            Errno::Strict => "STRICT",
            Errno::Paused => "PAUSED",
            Errno::Unknown => "UNKNOWN",
        }
    }

    /// A short human description of this error.
    pub fn description(self) -> &'static str {
        match self {
            Errno::Ok => "success",
            Errno::CbMessageBegin => "the on_message_begin callback failed",
            Errno::CbPath => "the on_path callback failed",
            Errno::CbQueryString => "the on_query_string callback failed",
            Errno::CbUrl => "the on_url callback failed",
            Errno::CbFragment => "the on_fragment callback failed",
            Errno::CbHeaderField => "the on_header_field callback failed",
            Errno::CbHeaderValue => "the on_header_value callback failed",
            Errno::CbHeadersComplete => "the on_headers_complete callback failed",
            Errno::CbBody => "the on_body callback failed",
            Errno::CbMessageComplete => "the on_message_complete callback failed",
            Errno::CbReason => "the on_reason callback failed",
            Errno::CbChunkHeader => "the on_chunk_header callback failed",
            Errno::CbChunkComplete => "the on_chunk_complete callback failed",
            Errno::InvalidEofState => "stream ended at an unexpected time",
            Errno::HeaderOverflow => "too many header bytes seen; overflow detected",
            Errno::ClosedConnection => "data received after completed connection: close message",
            Errno::InvalidVersion => "invalid HTTP version",
            Errno::InvalidStatus => "invalid HTTP status code",
            Errno::InvalidMethod => "invalid HTTP method",
            Errno::InvalidUrl => "invalid URL",
            Errno::InvalidHost => "invalid host",
            Errno::InvalidPort => "invalid port",
            Errno::InvalidPath => "invalid path",
            Errno::InvalidQueryString => "invalid query string",
            Errno::InvalidFragment => "invalid fragment",
            Errno::LfExpected => "LF character expected",
            Errno::InvalidHeaderToken => "invalid character in header",
            Errno::InvalidContentLength => "invalid character in content-length header",
            Errno::HugeContentLength => "content-length header too large",
            Errno::InvalidChunkSize => "invalid character in chunk size header",
            Errno::HugeChunkSize => "chunk header size too large",
            Errno::InvalidConstant => "invalid constant string",
            Errno::InvalidInternalState => "encountered unexpected internal state",
            Errno::Strict => "strict mode assertion failed",
            Errno::Paused => "parser is paused",
            Errno::Unknown => "an unknown error occurred",
        }
    }

    /// Whether this value reports no error.
    pub fn is_ok(self) -> bool {
        self == Errno::Ok
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(Self::description(*self))
    }
}

impl StdError for Errno {}

#[cfg(test)]
mod tests {
    use super::Errno;

    #[test]
    fn codes_follow_declaration_order() {
        assert_eq!(Errno::Ok.code(), 0);
        assert_eq!(Errno::CbMessageBegin.code(), 1);
        assert_eq!(Errno::CbChunkComplete.code(), 13);
        assert_eq!(Errno::InvalidEofState.code(), 14);
        assert_eq!(Errno::InvalidHeaderToken.code(), 27);
        assert_eq!(Errno::Paused.code(), 35);
        assert_eq!(Errno::Unknown.code(), 36);
    }

    #[test]
    fn names_match_table_spelling() {
        assert_eq!(Errno::Ok.name(), "OK");
        assert_eq!(Errno::CbMessageBegin.name(), "CB_message_begin");
        assert_eq!(Errno::HeaderOverflow.name(), "HEADER_OVERFLOW");
        assert_eq!(Errno::Paused.name(), "PAUSED");
    }

    #[test]
    fn display_uses_description() {
        assert_eq!(
            Errno::ClosedConnection.to_string(),
            "data received after completed connection: close message"
        );
    }
}
