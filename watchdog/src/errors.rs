use crate::recovery::ResetStep;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API returned success=false: {0}")]
    Api(String),

    #[error("{step} command failed: {reason}")]
    Command { step: ResetStep, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_names_step() {
        let err = Error::Command {
            step: ResetStep::Off,
            reason: "device offline".to_string(),
        };

        assert_eq!(err.to_string(), "OFF command failed: device offline");
    }

    #[test]
    fn test_api_error_carries_message() {
        let err = Error::Api("permission deny".to_string());
        assert_eq!(err.to_string(), "API returned success=false: permission deny");
    }
}
