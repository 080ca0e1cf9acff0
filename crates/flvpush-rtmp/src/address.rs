//! Publish address parsing.

use crate::{Error, Result};

/// Default RTMP port.
pub const DEFAULT_PORT: u16 = 1935;

/// A parsed `rtmp://host[:port]/app[/instance]/stream` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmpUrl {
    pub host: String,
    pub port: u16,
    /// Application path, everything between the host and the stream name.
    pub app: String,
    /// Stream name, including any query string (stream keys often live there).
    pub stream: String,
}

impl RtmpUrl {
    pub fn parse(input: &str) -> Result<Self> {
        let parsed =
            url::Url::parse(input).map_err(|e| Error::invalid_url(input, e.to_string()))?;

        if parsed.scheme() != "rtmp" {
            return Err(Error::invalid_url(
                input,
                format!("unsupported scheme '{}', expected rtmp", parsed.scheme()),
            ));
        }

        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::invalid_url(input, "missing host"))?
            .to_string();
        let port = parsed.port().unwrap_or(DEFAULT_PORT);

        let segments: Vec<&str> = parsed
            .path()
            .split('/')
            .filter(|s| !s.is_empty())
            .collect();
        let Some((stream, app)) = segments.split_last() else {
            return Err(Error::invalid_url(input, "missing application and stream name"));
        };
        if app.is_empty() {
            return Err(Error::invalid_url(input, "missing stream name"));
        }

        let stream = match parsed.query() {
            Some(q) => format!("{}?{}", stream, q),
            None => stream.to_string(),
        };

        Ok(Self {
            host,
            port,
            app: app.join("/"),
            stream,
        })
    }

    /// The `tcUrl` sent in the connect command.
    pub fn tc_url(&self) -> String {
        format!("rtmp://{}:{}/{}", self.host, self.port, self.app)
    }

    /// `host:port` for socket resolution.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for RtmpUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tc_url(), self.stream)
    }
}
