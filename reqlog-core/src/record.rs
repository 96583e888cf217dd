use crate::connection::ConnectionId;
use crate::error::{RecordError, Result};
use crate::lifecycle::{LogCore, RecordKind};
use crate::scheme::{Scheme, SerializationFormat, SessionProtocol};
use crate::signal::CompletionSignal;
use std::fmt;
use std::fmt::Write as _;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Reserved attribute key carrying the protocol-internal raw request object.
///
/// Excluded from attribute enumeration and diagnostics: the raw request must
/// never leak into generic export paths.
pub const ATTR_RAW_REQUEST: &str = "reqlog.raw_request";

/// Routing metadata, populated in one shot by the winning `start` call.
#[derive(Debug, Default)]
struct RequestFields {
    connection: Option<ConnectionId>,
    session_protocol: Option<SessionProtocol>,
    serialization_format: SerializationFormat,
    host: Option<String>,
    method: Option<String>,
    path: Option<String>,
}

/// One request's accumulated log record.
///
/// Write-mostly-once: the pipeline calls [`start`] once the request line is
/// parsed, individual stages fill in what they learn (today only the
/// serialization format is renegotiable), and [`mark_done`] freezes the
/// record permanently. Every mutation arriving after done is silently
/// dropped. Safe to share across worker threads behind an `Arc`.
///
/// This kind always represents a root request; nested records (retries,
/// decorated calls) would be a separate [`RecordKind`] carrying a parent
/// completion signal.
///
/// [`start`]: RequestLog::start
/// [`mark_done`]: RecordKind::mark_done
pub struct RequestLog {
    core: LogCore,
    fields: RwLock<RequestFields>,
}

impl RequestLog {
    pub fn new() -> Self {
        Self {
            core: LogCore::new(),
            fields: RwLock::new(RequestFields::default()),
        }
    }

    fn read_fields(&self) -> RwLockReadGuard<'_, RequestFields> {
        self.fields.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_fields(&self) -> RwLockWriteGuard<'_, RequestFields> {
        self.fields.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Populate the routing metadata and move the record to started.
    ///
    /// All-or-nothing: of N racing callers exactly one assigns fields (and
    /// returns `Ok(true)`); losers assign nothing, not even partially.
    /// `host`, `method`, and `path` must be non-empty — an empty value is a
    /// pipeline bug and fails with [`RecordError::InvalidArgument`] before
    /// any state change.
    pub fn start(
        &self,
        connection: ConnectionId,
        session_protocol: SessionProtocol,
        host: &str,
        method: &str,
        path: &str,
    ) -> Result<bool> {
        if host.is_empty() {
            return Err(RecordError::InvalidArgument { field: "host" });
        }
        if method.is_empty() {
            return Err(RecordError::InvalidArgument { field: "method" });
        }
        if path.is_empty() {
            return Err(RecordError::InvalidArgument { field: "path" });
        }

        // The write lock spans the state transition and the field writes, so
        // a reader never observes a started record with half its fields.
        let mut fields = self.write_fields();
        if !self.core.try_start() {
            return Ok(false);
        }
        fields.connection = Some(connection);
        fields.session_protocol = Some(session_protocol);
        fields.host = Some(host.to_string());
        fields.method = Some(method.to_string());
        fields.path = Some(path.to_string());
        tracing::debug!(%connection, protocol = %session_protocol, %host, %method, %path, "request log started");
        Ok(true)
    }

    /// Overwrite the negotiated payload encoding. Last write wins; may be
    /// called any number of times while the record is live (content-type
    /// sniffing before a final codec is chosen). Silently ignored once done
    /// — the only field with its own freeze point, kept as-is from the
    /// original contract.
    pub fn set_serialization_format(&self, format: SerializationFormat) {
        let mut fields = self.write_fields();
        if self.core.is_done() {
            tracing::trace!(format = %format, "serialization format after done dropped");
            return;
        }
        fields.serialization_format = format;
    }

    /// Derived on every read from the current format and protocol; never
    /// stored. Valid at any lifecycle stage — before `start` it pairs the
    /// default format with an unknown protocol.
    pub fn scheme(&self) -> Scheme {
        let fields = self.read_fields();
        Scheme::of(fields.serialization_format, fields.session_protocol)
    }

    /// Handle of the connection that carried the request (diagnostics only).
    pub fn connection(&self) -> Option<ConnectionId> {
        self.read_fields().connection
    }

    pub fn session_protocol(&self) -> Option<SessionProtocol> {
        self.read_fields().session_protocol
    }

    pub fn serialization_format(&self) -> SerializationFormat {
        self.read_fields().serialization_format
    }

    pub fn host(&self) -> Option<String> {
        self.read_fields().host.clone()
    }

    pub fn method(&self) -> Option<String> {
        self.read_fields().method.clone()
    }

    pub fn path(&self) -> Option<String> {
        self.read_fields().path.clone()
    }

    /// UTC unix millis of the start transition; `0` while unstarted.
    pub fn start_time_millis(&self) -> i64 {
        self.core.start_time_millis()
    }
}

impl Default for RequestLog {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordKind for RequestLog {
    fn core(&self) -> &LogCore {
        &self.core
    }

    // Fixed order (scheme, host, method, path) — downstream text scrapers
    // depend on it.
    fn append_fields(&self, buf: &mut String) {
        let fields = self.read_fields();
        let _ = write!(
            buf,
            ", scheme={}",
            Scheme::of(fields.serialization_format, fields.session_protocol)
        );
        append_field(buf, "host", fields.host.as_deref());
        append_field(buf, "method", fields.method.as_deref());
        append_field(buf, "path", fields.path.as_deref());
    }

    fn include_attr(&self, key: &str) -> bool {
        key != ATTR_RAW_REQUEST
    }

    fn parent_signal(&self) -> Option<&CompletionSignal> {
        // Root record: there is no ancestor to notify.
        None
    }
}

impl fmt::Display for RequestLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.diagnostics())
    }
}

fn append_field(buf: &mut String, name: &str, value: Option<&str>) {
    let _ = write!(buf, ", {}={}", name, value.unwrap_or("<unset>"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn started() -> RequestLog {
        let log = RequestLog::new();
        log.start(
            ConnectionId::new(),
            SessionProtocol::H2,
            "api.example.com",
            "GET",
            "/users",
        )
        .unwrap();
        log
    }

    #[test]
    fn fresh_record_renders_without_panicking() {
        let log = RequestLog::new();
        assert_eq!(
            log.diagnostics(),
            "{state=unstarted, start=<unset>, scheme=none+unknown, host=<unset>, method=<unset>, path=<unset>}"
        );
    }

    #[test]
    fn started_record_exposes_all_fields() {
        let log = started();
        assert_eq!(log.host().as_deref(), Some("api.example.com"));
        assert_eq!(log.method().as_deref(), Some("GET"));
        assert_eq!(log.path().as_deref(), Some("/users"));
        assert_eq!(log.session_protocol(), Some(SessionProtocol::H2));
        assert!(log.connection().is_some());
        assert!(log.start_time_millis() > 0);
    }

    #[test]
    fn empty_host_is_rejected_without_mutation() {
        let log = RequestLog::new();
        let err = log
            .start(ConnectionId::new(), SessionProtocol::H1, "", "GET", "/")
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidArgument { field: "host" }));
        assert!(log.host().is_none());
        assert!(!log.core().is_started());
    }

    #[test]
    fn losing_start_assigns_nothing() {
        let log = started();
        let applied = log
            .start(ConnectionId::new(), SessionProtocol::H1C, "other.example.com", "POST", "/late")
            .unwrap();
        assert!(!applied);
        assert_eq!(log.host().as_deref(), Some("api.example.com"));
        assert_eq!(log.method().as_deref(), Some("GET"));
        assert_eq!(log.path().as_deref(), Some("/users"));
        assert_eq!(log.session_protocol(), Some(SessionProtocol::H2));
    }

    #[test]
    fn raw_request_attr_is_hidden_from_enumeration() {
        let log = started();
        log.set_attr(ATTR_RAW_REQUEST, json!({"internal": true}));
        log.set_attr("consumer", json!("alice"));

        let attrs = log.attrs(|_| true);
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].0, "consumer");

        // Still reachable directly for protocol-internal consumers.
        assert!(log.core().attr(ATTR_RAW_REQUEST).is_some());
    }

    #[test]
    fn display_matches_diagnostics() {
        let log = started();
        assert_eq!(log.to_string(), log.diagnostics());
    }
}
