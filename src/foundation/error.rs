//! Error taxonomy shared by every module that can fail: media I/O, plugin
//! dispatch, property access and timeline resolution all return
//! [`ToucanResult`].

/// Convenience result type used across the crate.
pub type ToucanResult<T> = Result<T, ToucanError>;

/// Top-level error taxonomy, matching the kinds the core must distinguish
/// per the error handling design (see `InvalidArgument`/`NotFound`/
/// `DecodeError`/`PluginError`/`UnknownSchema`/`PropertyError`).
#[derive(thiserror::Error, Debug)]
pub enum ToucanError {
    /// Bad numeric rate, negative size, or other caller-side invalid input.
    /// Fatal at frame granularity.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A path, URL or plugin id could not be resolved.
    #[error("not found: {0}")]
    NotFound(String),

    /// A still image or sequence frame failed to decode.
    #[error("decode error: {path}: {cause}")]
    DecodeError {
        /// Path that failed to decode.
        path: String,
        /// Underlying cause, as reported by the decoder.
        cause: String,
    },

    /// An I/O error while reading media.
    #[error("read failed: {path}: {cause}")]
    ReadFailed {
        /// Path whose read failed.
        path: String,
        /// Underlying cause.
        cause: String,
    },

    /// A plugin action failed.
    #[error("plugin error: action={action} status={status}")]
    PluginError {
        /// The action being dispatched (`Load`, `Describe`, `CreateInstance`, `Render`, ...).
        action: String,
        /// The status code the plugin's main entry point returned.
        status: i32,
    },

    /// An effect descriptor referenced a schema with no registered factory.
    #[error("unknown effect schema: {0}")]
    UnknownSchema(String),

    /// A property-set access failed.
    #[error("property error: {0}")]
    PropertyError(#[from] PropertyErrorKind),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The three property-set failure modes from the property set contract.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PropertyErrorKind {
    /// No entry exists under this name.
    #[error("unknown property name: {0}")]
    UnknownName(String),
    /// The index is outside the entry's current dimension.
    #[error("index {index} out of bounds for property '{name}' (dimension {dimension})")]
    BadIndex {
        /// Property name.
        name: String,
        /// Requested index.
        index: usize,
        /// Current dimension.
        dimension: usize,
    },
    /// The entry's fixed type does not match the accessor used.
    #[error("property '{0}' has a different type than requested")]
    WrongType(String),
}

impl ToucanError {
    /// Build an [`ToucanError::InvalidArgument`] value.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Build an [`ToucanError::NotFound`] value.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Build an [`ToucanError::DecodeError`] value.
    pub fn decode_error(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::DecodeError {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Build an [`ToucanError::ReadFailed`] value.
    pub fn read_failed(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Self::ReadFailed {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// Build an [`ToucanError::PluginError`] value.
    pub fn plugin_error(action: impl Into<String>, status: i32) -> Self {
        Self::PluginError {
            action: action.into(),
            status,
        }
    }

    /// Build an [`ToucanError::UnknownSchema`] value.
    pub fn unknown_schema(msg: impl Into<String>) -> Self {
        Self::UnknownSchema(msg.into())
    }

    /// `true` when this error should abort the whole frame (§7: only
    /// `InvalidArgument` does).
    pub fn is_fatal_to_frame(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            ToucanError::invalid_argument("x")
                .to_string()
                .contains("invalid argument:")
        );
        assert!(ToucanError::not_found("x").to_string().contains("not found:"));
        assert!(
            ToucanError::decode_error("p", "c")
                .to_string()
                .contains("decode error:")
        );
        assert!(
            ToucanError::plugin_error("Render", 2)
                .to_string()
                .contains("plugin error:")
        );
    }

    #[test]
    fn only_invalid_argument_is_fatal() {
        assert!(ToucanError::invalid_argument("x").is_fatal_to_frame());
        assert!(!ToucanError::not_found("x").is_fatal_to_frame());
        assert!(!ToucanError::unknown_schema("x").is_fatal_to_frame());
        assert!(!ToucanError::plugin_error("Render", 1).is_fatal_to_frame());
    }

    #[test]
    fn property_error_converts() {
        let err: ToucanError = PropertyErrorKind::UnknownName("k".into()).into();
        assert!(matches!(err, ToucanError::PropertyError(_)));
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = ToucanError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
