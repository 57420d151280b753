//! Error-context helper shared by every crate's own error enum.
//!
//! Each crate defines its own `thiserror`-derived `Error`, but all of them
//! want to be able to say "this happened in component X during operation Y"
//! without growing a new variant for every call site. `ErrorContext` plus
//! the `ErrorExt` trait give them that without forcing a shared error type.

use std::fmt;

/// Context information attached to an error message.
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub component: String,
    pub operation: String,
    pub details: Option<String>,
}

impl ErrorContext {
    pub fn new(component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: operation.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "in {} during {}", self.component, self.operation)?;
        if let Some(details) = &self.details {
            write!(f, " ({details})")?;
        }
        Ok(())
    }
}

/// Adds `.context(...)` to any `Display` error, producing an annotated
/// `String` suitable for logging or wrapping in a crate-local error variant.
pub trait ErrorExt {
    fn annotate(&self, ctx: ErrorContext) -> String;
}

impl<E: fmt::Display> ErrorExt for E {
    fn annotate(&self, ctx: ErrorContext) -> String {
        format!("{self} [{ctx}]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotate_includes_component_operation_and_details() {
        let ctx = ErrorContext::new("media-ingest", "decode_frame").with_details("stream_id=42");
        let annotated = "boom".annotate(ctx);
        assert_eq!(
            annotated,
            "boom [in media-ingest during decode_frame (stream_id=42)]"
        );
    }
}
