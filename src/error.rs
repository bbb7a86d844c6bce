//! Application-level error type.
//!
//! Every fatal condition carries the process exit code it maps to:
//!
//! - `2`: invalid input file or configuration
//! - `3`: no analyzable data after ingest/filtering
//! - `4`: internal or output failure

use thiserror::Error;

pub const EXIT_INPUT: u8 = 2;
pub const EXIT_NO_DATA: u8 = 3;
pub const EXIT_OUTPUT: u8 = 4;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::new(EXIT_INPUT, message)
    }

    pub fn no_data(message: impl Into<String>) -> Self {
        Self::new(EXIT_NO_DATA, message)
    }

    pub fn output(message: impl Into<String>) -> Self {
        Self::new(EXIT_OUTPUT, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_message() {
        let err = AppError::input("Missing required column: `date`");
        assert_eq!(err.to_string(), "Missing required column: `date`");
        assert_eq!(err.exit_code(), EXIT_INPUT);
    }
}
