use thiserror::Error;

#[derive(Debug, Error)]
pub enum OtpError {
    #[error("No verification code is pending. Please request a new one.")]
    NotFound,
    #[error("The verification code has expired. Please request a new one.")]
    Expired,
    #[error("Too many incorrect attempts. Please request a new code.")]
    AttemptsExhausted,
    #[error("Invalid verification code.")]
    InvalidCode,
    #[error("Please wait {0} seconds before requesting a new code.")]
    Cooldown(u64),
    #[error("We could not send the verification email. Please try again later.")]
    EmailDelivery,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
