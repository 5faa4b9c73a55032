use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum MeetifyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("signaling error: {0}")]
    Signaling(String),

    #[error("call error: {0}")]
    Call(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::FileNotFound(PathBuf::from("/tmp/missing.toml"));
        assert_eq!(err.to_string(), "config file not found: /tmp/missing.toml");

        let err = ConfigError::ParseError("unexpected token".into());
        assert_eq!(err.to_string(), "config parse error: unexpected token");

        let err = ConfigError::ValidationError("ice.connectivity_timeout_secs = 0".into());
        assert_eq!(
            err.to_string(),
            "config validation error: ice.connectivity_timeout_secs = 0"
        );
    }

    #[test]
    fn meetify_error_from_config() {
        let config_err = ConfigError::ParseError("bad toml".into());
        let err: MeetifyError = config_err.into();
        assert!(matches!(err, MeetifyError::Config(_)));
        assert!(err.to_string().contains("bad toml"));
    }

    #[test]
    fn meetify_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err: MeetifyError = io_err.into();
        assert!(matches!(err, MeetifyError::Io(_)));
        assert!(err.to_string().contains("file missing"));
    }

    #[test]
    fn meetify_error_other_variants() {
        let err = MeetifyError::Signaling("connection refused".into());
        assert_eq!(err.to_string(), "signaling error: connection refused");

        let err = MeetifyError::Call("not joined".into());
        assert_eq!(err.to_string(), "call error: not joined");

        let err = MeetifyError::Other("something went wrong".into());
        assert_eq!(err.to_string(), "something went wrong");
    }
}
