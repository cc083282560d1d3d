use thiserror::Error;

/// Raised before a batch starts when the runner is misconfigured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("max_concurrency must be at least 1 (got {0})")]
    InvalidConcurrency(usize),
}

/// Configuration faults. These abort a command before any work item runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential {0}: set it in the environment or in batchwork.toml")]
    MissingCredential(&'static str),

    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_concurrency_display() {
        let err = RunnerError::InvalidConcurrency(0);
        assert_eq!(err.to_string(), "max_concurrency must be at least 1 (got 0)");
    }

    #[test]
    fn missing_credential_names_variable() {
        let err = ConfigError::MissingCredential("RIOT_API_KEY");
        assert!(err.to_string().contains("RIOT_API_KEY"));
    }
}
