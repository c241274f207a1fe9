/// Convenience result type used across Tableau.
pub type TableauResult<T> = Result<T, TableauError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum TableauError {
    /// Malformed cycle definition. Raised at `start`, never deferred to a tick.
    #[error("config error: {0}")]
    Config(String),

    /// Invalid host surface size or pixel density.
    #[error("viewport error: {0}")]
    Viewport(String),

    /// A resolved geometry value came out non-finite.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// Errors when serializing or deserializing cycle files or frames.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TableauError {
    /// Build a [`TableauError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`TableauError::Viewport`] value.
    pub fn viewport(msg: impl Into<String>) -> Self {
        Self::Viewport(msg.into())
    }

    /// Build a [`TableauError::Geometry`] value.
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    /// Build a [`TableauError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            TableauError::config("x")
                .to_string()
                .contains("config error:")
        );
        assert!(
            TableauError::viewport("x")
                .to_string()
                .contains("viewport error:")
        );
        assert!(
            TableauError::geometry("x")
                .to_string()
                .contains("geometry error:")
        );
        assert!(
            TableauError::serde("x")
                .to_string()
                .contains("serialization error:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("boom");
        let err = TableauError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("boom"));
    }
}
