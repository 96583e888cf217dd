use thiserror::Error;

/// Unified error type for reqlog.
///
/// Lifecycle races (a losing `start`, a mutation arriving after the record
/// is done) are deliberately NOT errors — they are silent no-ops, so that
/// concurrent pipeline stages never have to handle a flood of "too late"
/// failures for expected raciness. The only surfaced condition is a caller
/// passing absent required data, which is a programming error upstream.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Invalid argument: {field} must be present")]
    InvalidArgument { field: &'static str },
}

pub type Result<T> = std::result::Result<T, RecordError>;
