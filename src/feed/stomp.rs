//! STOMP 1.2 frame codec
//!
//! The push channel speaks STOMP over WebSocket text messages. Only the
//! subset needed for a single topic subscription is supported:
//!
//! - client: `CONNECT`, `SUBSCRIBE`, `UNSUBSCRIBE`, `DISCONNECT`
//! - server: `CONNECTED`, `MESSAGE`, `RECEIPT`, `ERROR`
//!
//! Frame layout:
//!
//! ```text
//! COMMAND\n
//! header1:value1\n
//! header2:value2\n
//! \n
//! body^@
//! ```
//!
//! A message consisting only of end-of-line characters is a heart-beat.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// STOMP protocol version spoken by the client
pub const STOMP_VERSION: &str = "1.2";

/// Frame commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Connect,
    Stomp,
    Connected,
    Subscribe,
    Unsubscribe,
    Send,
    Message,
    Receipt,
    Error,
    Disconnect,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Connect => "CONNECT",
            Command::Stomp => "STOMP",
            Command::Connected => "CONNECTED",
            Command::Subscribe => "SUBSCRIBE",
            Command::Unsubscribe => "UNSUBSCRIBE",
            Command::Send => "SEND",
            Command::Message => "MESSAGE",
            Command::Receipt => "RECEIPT",
            Command::Error => "ERROR",
            Command::Disconnect => "DISCONNECT",
        }
    }

    /// CONNECT and CONNECTED headers are never escaped
    fn escapes_headers(&self) -> bool {
        !matches!(self, Command::Connect | Command::Stomp | Command::Connected)
    }
}

impl FromStr for Command {
    type Err = StompError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "CONNECT" => Command::Connect,
            "STOMP" => Command::Stomp,
            "CONNECTED" => Command::Connected,
            "SUBSCRIBE" => Command::Subscribe,
            "UNSUBSCRIBE" => Command::Unsubscribe,
            "SEND" => Command::Send,
            "MESSAGE" => Command::Message,
            "RECEIPT" => Command::Receipt,
            "ERROR" => Command::Error,
            "DISCONNECT" => Command::Disconnect,
            other => return Err(StompError::UnknownCommand(other.to_string())),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single STOMP frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub command: Command,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    /// Builder-style header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Builder-style body
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header. Repeated headers keep the first occurrence.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    // ----- client frames -----

    pub fn connect(host: &str) -> Self {
        Frame::new(Command::Connect)
            .header("accept-version", STOMP_VERSION)
            .header("host", host)
            .header("heart-beat", "0,0")
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Frame::new(Command::Subscribe)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Frame::new(Command::Unsubscribe).header("id", id)
    }

    pub fn disconnect(receipt: &str) -> Self {
        Frame::new(Command::Disconnect).header("receipt", receipt)
    }

    // ----- server frames -----

    pub fn connected() -> Self {
        Frame::new(Command::Connected)
            .header("version", STOMP_VERSION)
            .header("heart-beat", "0,0")
    }

    pub fn message(destination: &str, subscription: &str, message_id: &str, body: &str) -> Self {
        Frame::new(Command::Message)
            .header("destination", destination)
            .header("subscription", subscription)
            .header("message-id", message_id)
            .header("content-type", "application/json")
            .body(body)
    }

    pub fn receipt(receipt_id: &str) -> Self {
        Frame::new(Command::Receipt).header("receipt-id", receipt_id)
    }

    pub fn error(message: &str) -> Self {
        Frame::new(Command::Error)
            .header("message", message)
            .body(message)
    }

    /// Serialize to the wire format, including the trailing NUL
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(64 + self.body.len());
        out.push_str(self.command.as_str());
        out.push('\n');

        let escape = self.command.escapes_headers();
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }

        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.push_str(&format!("content-length:{}\n", self.body.len()));
        }

        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. Returns `Ok(None)` for a heart-beat.
    pub fn decode(raw: &str) -> Result<Option<Frame>, StompError> {
        let raw = raw.trim_start_matches(['\r', '\n']);
        if raw.is_empty() || raw == "\0" {
            return Ok(None);
        }

        let (head, rest) = split_head(raw).ok_or(StompError::MissingHeaderTerminator)?;
        let mut lines = head.lines();

        let command_line = lines.next().unwrap_or_default().trim_end_matches('\r');
        let command: Command = command_line.parse()?;
        let unescape = command.escapes_headers();

        let mut headers = Vec::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| StompError::MalformedHeader(line.to_string()))?;
            if unescape {
                headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                headers.push((name.to_string(), value.to_string()));
            }
        }

        let mut frame = Frame {
            command,
            headers,
            body: String::new(),
        };

        frame.body = match frame.get("content-length") {
            Some(len) => {
                let len: usize = len
                    .trim()
                    .parse()
                    .map_err(|_| StompError::MalformedHeader(format!("content-length:{}", len)))?;
                rest.get(..len).ok_or(StompError::Truncated)?.to_string()
            }
            None => match rest.find('\0') {
                Some(end) => rest[..end].to_string(),
                None => return Err(StompError::Truncated),
            },
        };

        Ok(Some(frame))
    }
}

// Whichever blank-line form comes first ends the headers.
fn split_head(raw: &str) -> Option<(&str, &str)> {
    let lf = raw.find("\n\n").map(|idx| (idx, 2));
    let crlf = raw.find("\r\n\r\n").map(|idx| (idx, 4));

    let (idx, len) = match (lf, crlf) {
        (Some(a), Some(b)) => a.min(b),
        (a, b) => a.or(b)?,
    };
    Some((&raw[..idx], &raw[idx + len..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> Result<String, StompError> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(StompError::InvalidEscape(format!(
                    "\\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

/// Frame parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum StompError {
    #[error("Unknown STOMP command: {0}")]
    UnknownCommand(String),

    #[error("Frame has no blank line after its headers")]
    MissingHeaderTerminator,

    #[error("Malformed header: {0}")]
    MalformedHeader(String),

    #[error("Invalid header escape: {0}")]
    InvalidEscape(String),

    #[error("Frame body is truncated")]
    Truncated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_connect() {
        let wire = Frame::connect("localhost").encode();
        assert_eq!(
            wire,
            "CONNECT\naccept-version:1.2\nhost:localhost\nheart-beat:0,0\n\n\0"
        );
    }

    #[test]
    fn test_decode_spring_style_message() {
        let wire = "MESSAGE\r\ndestination:/topic/notifications\r\ncontent-type:application/json\r\nsubscription:sub-0\r\nmessage-id:abc-1\r\ncontent-length:16\r\n\r\n{\"propertyId\":1}\0";
        let frame = Frame::decode(wire).unwrap().unwrap();

        assert_eq!(frame.command, Command::Message);
        assert_eq!(frame.get("destination"), Some("/topic/notifications"));
        assert_eq!(frame.get("subscription"), Some("sub-0"));
        assert_eq!(frame.body, "{\"propertyId\":1}");
    }

    #[test]
    fn test_decode_without_content_length() {
        let frame = Frame::decode("MESSAGE\ndestination:/topic/x\n\n{}\0\n")
            .unwrap()
            .unwrap();
        assert_eq!(frame.body, "{}");
    }

    #[test]
    fn test_heartbeat_is_none() {
        assert_eq!(Frame::decode("\n").unwrap(), None);
        assert_eq!(Frame::decode("\r\n\r\n").unwrap(), None);
    }

    #[test]
    fn test_encode_decode_message() {
        let sent = Frame::message("/topic/notifications", "sub-0", "m-1", r#"{"kwhUsed":80}"#);
        let received = Frame::decode(&sent.encode()).unwrap().unwrap();
        assert_eq!(received.get("message-id"), Some("m-1"));
        assert_eq!(received.body, r#"{"kwhUsed":80}"#);
    }

    #[test]
    fn test_header_escaping() {
        let frame = Frame::error("bad: thing\nhappened");
        let wire = frame.encode();
        assert!(wire.contains("message:bad\\c thing\\nhappened"));

        let decoded = Frame::decode(&wire).unwrap().unwrap();
        assert_eq!(decoded.get("message"), Some("bad: thing\nhappened"));
    }

    #[test]
    fn test_connected_headers_are_not_unescaped() {
        let frame = Frame::decode("CONNECTED\nversion:1.2\nserver:broker\\c1\n\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.get("server"), Some("broker\\c1"));
    }

    #[test]
    fn test_repeated_header_keeps_first() {
        let frame = Frame::decode("MESSAGE\nfoo:first\nfoo:second\n\n\0")
            .unwrap()
            .unwrap();
        assert_eq!(frame.get("foo"), Some("first"));
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Frame::decode("BOGUS\n\n\0"),
            Err(StompError::UnknownCommand(_))
        ));
        assert_eq!(
            Frame::decode("MESSAGE\nfoo:bar"),
            Err(StompError::MissingHeaderTerminator)
        );
        assert_eq!(
            Frame::decode("MESSAGE\ncontent-length:50\n\nshort\0"),
            Err(StompError::Truncated)
        );
        assert!(matches!(
            Frame::decode("MESSAGE\nfoo:bad\\x\n\n\0"),
            Err(StompError::InvalidEscape(_))
        ));
    }
}
