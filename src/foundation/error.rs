/// Convenience alias used across the crate.
pub type RenderResult<T> = Result<T, RenderError>;

/// Renderer error kinds.
///
/// Construction-time failures (context acquisition, shader link) propagate to
/// the caller. Per-draw failures indicate a broken invariant, not a transient
/// condition, and are also surfaced as errors. Degenerate geometry and missing
/// costumes are silent skips and never produce a `RenderError`.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    /// No usable rendering context (e.g. no compatible graphics adapter).
    #[error("context error: {0}")]
    Context(String),

    /// Shader compilation or pipeline link failure, including the log.
    #[error("shader error: {0}")]
    Shader(String),

    /// Texture, buffer, or framebuffer allocation/lookup failure.
    #[error("resource error: {0}")]
    Resource(String),

    /// Any other error bubbling up from below.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Build a [`RenderError::Context`].
    pub fn context(msg: impl Into<String>) -> Self {
        Self::Context(msg.into())
    }

    /// Build a [`RenderError::Shader`].
    pub fn shader(msg: impl Into<String>) -> Self {
        Self::Shader(msg.into())
    }

    /// Build a [`RenderError::Resource`].
    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
