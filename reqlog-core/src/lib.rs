pub mod connection;
pub mod error;
pub mod lifecycle;
pub mod record;
pub mod scheme;
pub mod signal;

pub use connection::ConnectionId;
pub use error::{RecordError, Result};
pub use lifecycle::{LifecycleState, LogCore, RecordKind};
pub use record::{ATTR_RAW_REQUEST, RequestLog};
pub use scheme::{Scheme, SerializationFormat, SessionProtocol};
pub use signal::{CompletionSignal, CompletionWatcher, completion_pair};
