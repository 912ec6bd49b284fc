//! Errors raised while reading or checking `leadsite.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read `{0}`")]
    Read(PathBuf, #[source] std::io::Error),

    #[error("invalid leadsite.toml")]
    Parse(#[from] toml::de::Error),

    /// Reset links are built from `base.url`, so it must be absolute.
    #[error("[base.url] `{0}` must start with http:// or https://")]
    SiteUrl(String),

    #[error("[store.{0}] must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("[auth.min_password_len] is {got}, must be at least {min}")]
    ShortPassword { got: usize, min: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_read_error_names_file() {
        let err = ConfigError::Read(
            PathBuf::from("leadsite.toml"),
            Error::new(ErrorKind::NotFound, "file not found"),
        );
        assert_eq!(err.to_string(), "cannot read `leadsite.toml`");
        assert_eq!(
            std::error::Error::source(&err).map(ToString::to_string),
            Some("file not found".into())
        );
    }

    #[test]
    fn test_validation_messages_name_the_key() {
        assert_eq!(
            ConfigError::ZeroTimeout("persist_timeout_ms").to_string(),
            "[store.persist_timeout_ms] must be greater than zero"
        );
        assert_eq!(
            ConfigError::ShortPassword { got: 4, min: 8 }.to_string(),
            "[auth.min_password_len] is 4, must be at least 8"
        );
        assert!(ConfigError::SiteUrl("ftp://x".into())
            .to_string()
            .contains("`ftp://x`"));
    }
}
