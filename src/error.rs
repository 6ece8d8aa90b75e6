//! Error handling for the renderer.
//!
//! Recoverable failures are split into a small set of categories that mirror
//! how callers react to them:
//!
//! | Category   | Examples                                   | Caller reaction          |
//! |------------|--------------------------------------------|--------------------------|
//! | Capability | compressed format without the extension    | fall back / skip         |
//! | Resource   | shader compile/link, incomplete FBO        | check for sentinel       |
//! | Input      | crop rect outside image, resize to zero    | clamped or skipped       |
//! | Decode     | bad image bytes, invalid font data         | substitute and continue  |
//!
//! Structural violations (matrix-stack overflow, batch memory exhaustion
//! that survives a flush) are programming errors and panic instead of
//! returning an error.

use thiserror::Error;

/// Errors surfaced by fallible renderer operations.
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GPU capability required by the request is not available.
    #[error("missing GPU capability: {0}")]
    CapabilityMissing(String),

    /// Shader compilation failed; contains the driver's info log.
    #[error("shader compilation failed: {0}")]
    ShaderCompile(String),

    /// Shader program linking failed; contains the driver's info log.
    #[error("shader program linking failed: {0}")]
    ShaderLink(String),

    /// A framebuffer object did not pass the completeness check.
    #[error("framebuffer incomplete: {0}")]
    FramebufferIncomplete(String),

    /// A GPU resource could not be created.
    #[error("failed to create {0}")]
    ResourceCreation(&'static str),

    /// Input data could not be decoded (image bytes, font data).
    #[error("decode failed: {0}")]
    Decode(String),

    /// An argument was outside the accepted range and could not be clamped.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Convenience alias used throughout the crate.
pub type RenderResult<T> = Result<T, RenderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::CapabilityMissing("ETC2".to_string());
        assert_eq!(err.to_string(), "missing GPU capability: ETC2");

        let err = RenderError::ShaderCompile("0:1: syntax error".to_string());
        assert!(err.to_string().contains("syntax error"));
    }

    #[test]
    fn test_error_is_std_error() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&RenderError::ResourceCreation("texture"));
    }
}
