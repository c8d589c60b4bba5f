use thiserror::Error;

/// Fatal pipeline errors. Degraded conditions (too few markers for a side or
/// for orientation voting) are reported through absent regions and the
/// zero-degree default angle, never through this enum.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Input image is missing pixels in at least one dimension
    #[error("input image has degenerate dimensions ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// The region worker pool could not be created
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}
