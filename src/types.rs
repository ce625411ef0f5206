// Error types shared across the service

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Gateway request failed: {0}")]
    Gateway(#[from] reqwest::Error),

    #[error("Invalid gateway response: {0}")]
    InvalidResponse(String),
}

pub type AppResult<T> = std::result::Result<T, AppError>;
