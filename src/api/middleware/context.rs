//! Read-only views of the inbound request captured before dispatch.

use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{header, HeaderMap, Method, Request, Uri, Version};

/// Request attributes reported in the access entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    method: Method,
    path: String,
    query: String,
    client_ip: String,
    user_agent: String,
}

impl RequestContext {
    /// Capture the context of `request`.
    ///
    /// With `trust_forwarded_headers`, the client IP is taken from
    /// `X-Forwarded-For` then `X-Real-IP` before falling back to the peer
    /// address recorded by `ConnectInfo`.
    pub fn capture<B>(request: &Request<B>, trust_forwarded_headers: bool) -> Self {
        let uri = request.uri();
        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self {
            method: request.method().clone(),
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            client_ip: client_ip(request, trust_forwarded_headers).unwrap_or_default(),
            user_agent,
        }
    }

    /// Request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request path without the query.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, empty if none.
    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Resolved client IP, empty if unknown.
    #[must_use]
    pub fn client_ip(&self) -> &str {
        &self.client_ip
    }

    /// `User-Agent` header, empty if absent.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

fn client_ip<B>(request: &Request<B>, trust_forwarded_headers: bool) -> Option<String> {
    let headers = request.headers();
    if trust_forwarded_headers {
        let forwarded = header_str(headers, "x-forwarded-for")
            .and_then(|v| v.split(',').find_map(parse_ip))
            .or_else(|| header_str(headers, "x-real-ip").and_then(parse_ip));
        if let Some(ip) = forwarded {
            return Some(ip.to_string());
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn parse_ip(value: &str) -> Option<IpAddr> {
    value.trim().parse().ok()
}

/// Request line and headers, kept for diagnostics if the request faults.
///
/// The body is never captured.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
}

impl RequestHead {
    /// Copy the head of `request`.
    pub fn capture<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            version: request.version(),
            headers: request.headers().clone(),
        }
    }

    /// HTTP/1.x wire rendering of the head, empty if it cannot be rendered.
    #[must_use]
    pub fn dump(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self.write_to(&mut out) {
            Ok(()) => out,
            Err(_) => Vec::new(),
        }
    }

    fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let target = self
            .uri
            .path_and_query()
            .map_or_else(|| self.uri.path(), |pq| pq.as_str());
        write!(out, "{} {} {:?}\r\n", self.method, target, self.version)?;

        if !self.headers.contains_key(header::HOST) {
            if let Some(authority) = self.uri.authority() {
                write!(out, "Host: {authority}\r\n")?;
            }
        }
        for (name, value) in &self.headers {
            out.write_all(name.as_str().as_bytes())?;
            out.write_all(b": ")?;
            out.write_all(value.as_bytes())?;
            out.write_all(b"\r\n")?;
        }
        out.write_all(b"\r\n")
    }
}
