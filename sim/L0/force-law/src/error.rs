//! Error types for force law configuration and evaluation.

use thiserror::Error;

/// Errors that can occur while configuring or evaluating force laws.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForceLawError {
    /// A smooth force function was requested from a law that has none.
    #[error("{law} has no smooth force function attached")]
    MissingForceFunction {
        /// Type name of the law.
        law: &'static str,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },

    /// A contour with zero or non-finite extent was used for a coupling.
    #[error("degenerate contour '{name}': characteristic length {length}")]
    DegenerateContour {
        /// Name of the contour.
        name: String,
        /// Offending characteristic length.
        length: f64,
    },

    /// A coupling references a contour that is not registered.
    #[error("unknown contour: {name}")]
    UnknownContour {
        /// Name (or handle) of the missing contour.
        name: String,
    },

    /// The linear complementarity solve did not converge.
    #[error("LCP solve did not converge after {iterations} iterations (residual {residual:e})")]
    LcpNotConverged {
        /// Iterations or pivots spent before giving up.
        iterations: usize,
        /// Complementarity residual at termination.
        residual: f64,
    },

    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// XML writing error.
    #[error("XML write error: {0}")]
    XmlWrite(String),

    /// Missing required element.
    #[error("missing required element: {element} in {context}")]
    MissingElement {
        /// The missing element name.
        element: &'static str,
        /// Where the element was expected.
        context: String,
    },

    /// Element text that could not be interpreted.
    #[error("invalid value for {element}: {message}")]
    InvalidValue {
        /// Element holding the value.
        element: String,
        /// Why the value is invalid.
        message: String,
    },

    /// Element naming a type this crate does not know.
    #[error("unknown element {name} in {context}")]
    UnknownElement {
        /// The element name found.
        name: String,
        /// Where it was found.
        context: &'static str,
    },

    /// The value holds a closure and cannot be written to XML.
    #[error("{what} holds a custom closure and cannot be serialized")]
    Unserializable {
        /// What was being serialized.
        what: &'static str,
    },
}

impl ForceLawError {
    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a missing element error.
    #[must_use]
    pub fn missing_element(element: &'static str, context: impl Into<String>) -> Self {
        Self::MissingElement {
            element,
            context: context.into(),
        }
    }

    /// Create an invalid value error.
    #[must_use]
    pub fn invalid_value(element: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            element: element.into(),
            message: message.into(),
        }
    }

    /// Check if this is a configuration error (raised at model-build time).
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::DegenerateContour { .. } | Self::UnknownContour { .. }
        )
    }

    /// Check if this is an LCP convergence failure.
    #[must_use]
    pub fn is_not_converged(&self) -> bool {
        matches!(self, Self::LcpNotConverged { .. })
    }
}

/// Result type for force law operations.
pub type Result<T> = std::result::Result<T, ForceLawError>;
