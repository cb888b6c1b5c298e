use std::path::Path;

/// Request method, decided once at parse time. Downstream code branches on
/// the variant, never on the method text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Head,
    Options,
    Unsupported,
}

impl Method {
    fn classify(token: &str) -> Method {
        match token {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "OPTIONS" => Method::Options,
            _ => Method::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Version {
    Http10,
    Http11,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::Http10 => "HTTP/1.0",
            Version::Http11 => "HTTP/1.1",
        }
    }
}

/// Single byte range asked for by the client, before clamping to a file
/// size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=start-end`, end inclusive.
    FromTo(u64, u64),
    /// `bytes=start-`, to end of file.
    From(u64),
    /// `bytes=-k`, the last k bytes.
    Suffix(u64),
}

/// Parse failures, each carrying the status the emitter must send.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Empty buffer, bad request line, or missing Host on HTTP/1.1.
    Malformed,
    UnsupportedVersion,
}

impl ParseError {
    pub fn status(self) -> u16 {
        match self {
            ParseError::Malformed => 400,
            ParseError::UnsupportedVersion => 505,
        }
    }
}

/// Parsed form of one inbound HTTP message. String fields borrow from the
/// read buffer; a request never outlives one pipeline call.
#[derive(Debug)]
pub struct Request<'a> {
    pub method: Method,
    /// URL path component, possibly with a query string attached.
    pub target: &'a str,
    pub version: Version,
    pub host: Option<&'a str>,
    pub user_agent: Option<&'a str>,
    pub referer: Option<&'a str>,
    pub accept: Option<&'a str>,
    pub accept_encoding: Option<&'a str>,
    pub accept_language: Option<&'a str>,
    pub priority: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
    /// Defaulted by version, overridden by `Connection`.
    pub keep_alive: bool,
    /// `If-None-Match` as the unsigned decimal the server hands out; 0 when
    /// absent or unparseable.
    pub etag_in: u32,
    pub range: Option<RangeSpec>,
    pub dnt: bool,
    pub gpc: bool,
    pub upgrade_requested: bool,
}

/// Parse one request message out of `buf`.
///
/// The buffer holds at most one 8 KiB read. Leading blank lines are
/// tolerated; unknown headers are ignored.
pub fn parse(buf: &[u8]) -> Result<Request<'_>, ParseError> {
    let text = std::str::from_utf8(buf).map_err(|_| ParseError::Malformed)?;
    let mut lines = text.split("\r\n");

    let request_line = loop {
        match lines.next() {
            Some("") => continue,
            Some(line) => break line,
            None => return Err(ParseError::Malformed),
        }
    };
    let (method, target, version) =
        split_request_line(request_line).ok_or(ParseError::Malformed)?;
    let version = match version {
        "HTTP/1.0" => Version::Http10,
        "HTTP/1.1" => Version::Http11,
        _ => return Err(ParseError::UnsupportedVersion),
    };

    let mut request = Request {
        method: Method::classify(method),
        target,
        version,
        host: None,
        user_agent: None,
        referer: None,
        accept: None,
        accept_encoding: None,
        accept_language: None,
        priority: None,
        if_modified_since: None,
        keep_alive: version == Version::Http11,
        etag_in: 0,
        range: None,
        dnt: false,
        gpc: false,
        upgrade_requested: false,
    };

    for line in lines {
        if line.is_empty() {
            break;
        }
        apply_header(&mut request, line);
    }

    // Host is mandatory on HTTP/1.1.
    if request.version == Version::Http11 && request.host.is_none() {
        return Err(ParseError::Malformed);
    }

    Ok(request)
}

/// Three whitespace-separated tokens; repeated spaces are tolerated,
/// trailing junk is not.
fn split_request_line(line: &str) -> Option<(&str, &str, &str)> {
    let mut parts = line.split(' ').filter(|part| !part.is_empty());
    let method = parts.next()?;
    let target = parts.next()?;
    let version = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((method, target, version))
}

/// Case-insensitive match on `name:`; returns the value with leading
/// whitespace trimmed.
fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    if !line.is_char_boundary(name.len()) {
        return None;
    }
    let (head, rest) = line.split_at(name.len());
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start_matches([' ', '\t']))
}

fn apply_header<'a>(request: &mut Request<'a>, line: &'a str) {
    if let Some(value) = header_value(line, "Host") {
        request.host = Some(value);
    } else if let Some(value) = header_value(line, "Connection") {
        // keep-alive wins only on a prefix match; anything else (notably
        // `close`) clears the HTTP/1.1 default.
        request.keep_alive = value
            .get(..10)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("keep-alive"));
    } else if let Some(value) = header_value(line, "User-Agent") {
        request.user_agent = Some(value);
    } else if let Some(value) = header_value(line, "If-None-Match") {
        request.etag_in = parse_etag(value);
    } else if let Some(value) = header_value(line, "If-Modified-Since") {
        request.if_modified_since = Some(value);
    } else if let Some(value) = header_value(line, "Range") {
        request.range = parse_range(value);
    } else if let Some(value) = header_value(line, "DNT") {
        request.dnt = value.starts_with('1');
    } else if let Some(value) = header_value(line, "Sec-GPC") {
        request.gpc = value.starts_with('1');
    } else if let Some(value) = header_value(line, "Upgrade-Insecure-Requests") {
        request.upgrade_requested = value.starts_with('1');
    } else if let Some(value) = header_value(line, "Referer") {
        request.referer = Some(value);
    } else if let Some(value) = header_value(line, "Accept") {
        request.accept = Some(value);
    } else if let Some(value) = header_value(line, "Accept-Encoding") {
        request.accept_encoding = Some(value);
    } else if let Some(value) = header_value(line, "Accept-Language") {
        request.accept_language = Some(value);
    } else if let Some(value) = header_value(line, "Priority") {
        request.priority = Some(value);
    }
}

/// Strip surrounding quotes and parse as unsigned decimal. Weak tags,
/// wildcards, and lists all fail the parse and read as absent.
fn parse_etag(value: &str) -> u32 {
    let value = value.strip_prefix('"').unwrap_or(value);
    let value = match value.find('"') {
        Some(end) => &value[..end],
        None => value,
    };
    value.parse::<u32>().unwrap_or(0)
}

/// `Range` grammar: `bytes=start-end` | `bytes=start-` | `bytes=-suffix`.
/// Anything else (other units, garbage bounds, multiple ranges) drops the
/// header so the request takes the full-response path.
pub fn parse_range(value: &str) -> Option<RangeSpec> {
    let spec = value.strip_prefix("bytes=")?;
    if let Some(suffix) = spec.strip_prefix('-') {
        return suffix.parse::<u64>().ok().map(RangeSpec::Suffix);
    }
    let (start, end) = spec.split_once('-')?;
    let start = start.parse::<u64>().ok()?;
    let end = end.trim_start_matches([' ', '\t']);
    if end.is_empty() {
        return Some(RangeSpec::From(start));
    }
    end.parse::<u64>().ok().map(|end| RangeSpec::FromTo(start, end))
}

/// Reject targets that could escape the document root: `..`, `//`, NUL.
pub fn validate_path(target: &str) -> bool {
    !(target.contains("..") || target.contains("//") || target.contains('\0'))
}

/// Map a validated target onto the filesystem: `/` becomes `/landing.html`,
/// everything else is served out of `{webroot}/webpages`.
pub fn resolve_path(target: &str, webroot: &Path) -> String {
    let page = if target == "/" { "/landing.html" } else { target };
    format!("{}/webpages{}", webroot.display(), page)
}
