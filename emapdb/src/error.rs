//! Errors surfaced by the netlist store.

/// Convenience alias for fallible store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures reported to callers of the store.
///
/// Internal invariant breaks discovered mid-phase (a hash that no
/// longer matches its members after an incremental repair) are defects
/// of the engine and panic instead; [`Error::Invariant`] is only
/// produced by the explicit [`validate`](crate::NetlistDB::validate)
/// check.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A port, cell or parameter the builder does not support.
    /// Fatal to the current build; the store is only mutated after the
    /// individual cell validates.
    #[error("unsupported construct: {0}")]
    Unsupported(String),
    /// A schema invariant does not hold.
    #[error("schema invariant violated: {0}")]
    Invariant(String),
    /// Lower-level database error, surfaced unmodified.
    #[error(transparent)]
    Storage(#[from] rusqlite::Error),
    /// Malformed or unresolvable netlist input.
    #[error(transparent)]
    Input(#[from] yosysjson::NetlistJsonError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
