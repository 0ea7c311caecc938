pub mod otp_codes;
pub mod sessions;
pub mod users;
