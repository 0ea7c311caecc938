use anyhow::{Result, anyhow};
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::Rng;

pub const OTP_DIGITS: usize = 6;
const OTP_SPACE: u32 = 1_000_000;

fn argon2() -> Result<Argon2<'static>> {
    let params = Params::new(
        19_456, // 19 MiB
        2,      // iterations
        1,      // parallelism
        None,
    )
    .map_err(|e| anyhow!("Failed to create Argon2 params: {e}"))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Six decimal digits, zero padded, drawn uniformly from the OS CSPRNG.
pub fn generate_otp_code() -> String {
    let code = rand::rngs::OsRng.gen_range(0..OTP_SPACE);
    format!("{:0width$}", code, width = OTP_DIGITS)
}

/// Salted argon2id hash in PHC string form. Used for passwords and codes.
pub fn hash_secret(secret: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2()?
        .hash_password(secret.as_bytes(), &salt)
        .map_err(|e| anyhow!("Failed to hash secret: {e}"))?
        .to_string();
    Ok(hash)
}

/// Checks `secret` against a PHC hash; the digest comparison is constant time.
pub fn verify_secret(secret: &str, hash: &str) -> Result<bool> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| anyhow!("Invalid secret hash format: {e}"))?;

    match argon2()?.verify_password(secret.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("Secret verification failed: {e}")),
    }
}
