use serde::{Deserialize, Serialize};
use std::fmt;

/// Session-level protocol variant that carried a request.
///
/// Opaque identifier from the record's point of view — the record only needs
/// the short canonical text form for the composite scheme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SessionProtocol {
    /// HTTP/1.1 over TLS
    H1,
    /// HTTP/1.1 cleartext
    H1C,
    /// HTTP/2 over TLS
    H2,
    /// HTTP/2 cleartext
    H2C,
}

impl SessionProtocol {
    pub fn uri_text(&self) -> &'static str {
        match self {
            SessionProtocol::H1 => "h1",
            SessionProtocol::H1C => "h1c",
            SessionProtocol::H2 => "h2",
            SessionProtocol::H2C => "h2c",
        }
    }
}

impl fmt::Display for SessionProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_text())
    }
}

/// Payload encoding negotiated for a request.
///
/// `None` is the default sentinel for plain requests with no higher-level
/// serialization, not an absent value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SerializationFormat {
    #[default]
    None,
    Json,
    Grpc,
    Text,
}

impl SerializationFormat {
    pub fn uri_text(&self) -> &'static str {
        match self {
            SerializationFormat::None => "none",
            SerializationFormat::Json => "json",
            SerializationFormat::Grpc => "grpc",
            SerializationFormat::Text => "text",
        }
    }
}

impl fmt::Display for SerializationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri_text())
    }
}

/// Composite scheme identifier: payload encoding paired with the session
/// protocol, rendered as `<format>+<protocol>` (e.g. `json+h2`).
///
/// Always derived at read time from the record's current fields — never
/// stored. The protocol side may still be unassigned early in a request's
/// life, in which case it renders as `unknown` rather than failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Scheme {
    format: SerializationFormat,
    protocol: Option<SessionProtocol>,
}

impl Scheme {
    pub fn of(format: SerializationFormat, protocol: Option<SessionProtocol>) -> Self {
        Self { format, protocol }
    }

    pub fn format(&self) -> SerializationFormat {
        self.format
    }

    pub fn protocol(&self) -> Option<SessionProtocol> {
        self.protocol
    }

    pub fn uri_text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.protocol {
            Some(p) => write!(f, "{}+{}", self.format.uri_text(), p.uri_text()),
            None => write!(f, "{}+unknown", self.format.uri_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_renders_format_plus_protocol() {
        let scheme = Scheme::of(SerializationFormat::Json, Some(SessionProtocol::H2));
        assert_eq!(scheme.to_string(), "json+h2");
    }

    #[test]
    fn scheme_tolerates_unset_protocol() {
        let scheme = Scheme::of(SerializationFormat::None, None);
        assert_eq!(scheme.to_string(), "none+unknown");
    }

    #[test]
    fn serialization_format_defaults_to_none() {
        assert_eq!(SerializationFormat::default(), SerializationFormat::None);
    }

    #[test]
    fn protocol_serde_uses_canonical_lowercase() {
        let json = serde_json::to_string(&SessionProtocol::H2C).unwrap();
        assert_eq!(json, r#""h2c""#);
        let back: SessionProtocol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SessionProtocol::H2C);
    }
}
