//! Error types shared by the binder, the microtask queue and the bridge.

/// The error type returned across the reactive-core boundary.
///
/// Factories and lifecycle hooks report failures with this so the binder
/// can carry them to the caller without knowing their concrete type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The binder has no record after running its own remount step.
    #[error("binder invariant violated: {0}")]
    Invariant(&'static str),

    /// The factory failed to construct an instance.
    #[error("failed to construct instance")]
    Construct(#[source] BoxError),

    #[error("mount notification failed")]
    Mount(#[source] BoxError),

    #[error("unmount notification failed")]
    Unmount(#[source] BoxError),

    #[error("failed to dispose instance")]
    Dispose(#[source] BoxError),

    /// A configuration document could not be parsed.
    #[error("invalid binder configuration: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error indicates a bug in the binder rather than in the
    /// instance or its factory.
    pub fn is_invariant(&self) -> bool {
        matches!(self, Error::Invariant(_))
    }
}
