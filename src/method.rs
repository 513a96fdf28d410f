//! The HTTP request method.

use std::fmt;

/// The request method (VERB).
///
/// The set and the ordering are those of the classic HTTP/1 parser tables:
/// the discriminants are stable, in declaration order, so the value returned
/// by [`Parser::method`](crate::Parser::method) can be stored or compared
/// numerically across versions.
#[repr(u8)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Method {
    /// DELETE
    Delete = 0,
    /// GET
    Get,
    /// HEAD
    Head,
    /// POST
    Post,
    /// PUT
    Put,
    /// CONNECT
    Connect,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
    /// COPY (WebDAV)
    Copy,
    /// LOCK (WebDAV)
    Lock,
    /// MKCOL (WebDAV)
    Mkcol,
    /// MOVE (WebDAV)
    Move,
    /// PROPFIND (WebDAV)
    Propfind,
    /// PROPPATCH (WebDAV)
    Proppatch,
    /// UNLOCK (WebDAV)
    Unlock,
    /// REPORT (Subversion)
    Report,
    /// MKACTIVITY (Subversion)
    Mkactivity,
    /// CHECKOUT (Subversion)
    Checkout,
    /// MERGE (Subversion)
    Merge,
    /// M-SEARCH (UPnP)
    Msearch,
    /// NOTIFY (UPnP)
    Notify,
    /// SUBSCRIBE (UPnP)
    Subscribe,
    /// UNSUBSCRIBE (UPnP)
    Unsubscribe,
    /// PATCH (RFC 5789)
    Patch,
}

impl Method {
    /// The method literal as it appears on the wire, e.g. `"M-SEARCH"`.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Method::Delete => "DELETE",
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Copy => "COPY",
            Method::Lock => "LOCK",
            Method::Mkcol => "MKCOL",
            Method::Move => "MOVE",
            Method::Propfind => "PROPFIND",
            Method::Proppatch => "PROPPATCH",
            Method::Unlock => "UNLOCK",
            Method::Report => "REPORT",
            Method::Mkactivity => "MKACTIVITY",
            Method::Checkout => "CHECKOUT",
            Method::Merge => "MERGE",
            Method::Msearch => "M-SEARCH",
            Method::Notify => "NOTIFY",
            Method::Subscribe => "SUBSCRIBE",
            Method::Unsubscribe => "UNSUBSCRIBE",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
