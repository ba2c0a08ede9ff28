use anyhow::{Result, anyhow, bail};
use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::sync::LazyLock;

const SALT_BYTES: usize = 16;
pub const MIN_USERNAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Argon2id hash in PHC string form (`$argon2id$v=19$...`).
pub fn hash_password(password: &str) -> Result<String> {
    let salt_bytes: [u8; SALT_BYTES] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes)
        .map_err(|error| anyhow!("Failed to encode password salt: {error}"))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|error| anyhow!("Failed to hash password: {error}"))?;

    Ok(hash.to_string())
}

/// Stored values that are not valid PHC strings never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

/// Opaque bearer token handed to the client. Only its digest is stored.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::rng().random();
    to_hex(&bytes)
}

pub fn token_digest(token: &str) -> String {
    to_hex(&Sha256::digest(token.trim().as_bytes()))
}

/// Six-digit one-time code.
pub fn generate_otp() -> String {
    rand::rng().random_range(100_000..1_000_000_u32).to_string()
}

pub fn otp_digest(email: &str, otp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    hasher.update(b":");
    hasher.update(otp.trim().as_bytes());
    to_hex(&hasher.finalize())
}

pub fn otp_matches(email: &str, otp: &str, stored_digest: &str) -> bool {
    otp_digest(email, otp) == stored_digest
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> Result<()> {
    if username.chars().count() < MIN_USERNAME_LEN {
        bail!("Username must be at least {MIN_USERNAME_LEN} characters long");
    }
    validate_email(email)?;
    validate_password(password)
}

pub fn validate_email(email: &str) -> Result<()> {
    if !EMAIL_PATTERN.is_match(email) {
        bail!("Invalid email: {email}");
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("Password must be at least {MIN_PASSWORD_LEN} characters long");
    }
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        })
}

#[cfg(test)]
mod tests {
    use super::{
        generate_otp, generate_token, hash_password, otp_digest, otp_matches, token_digest,
        validate_registration, verify_password,
    };

    #[test]
    fn password_hash_verifies_and_is_salted() {
        let first = hash_password("correct horse").expect("hash");
        let second = hash_password("correct horse").expect("hash");

        assert_ne!(first, second);
        assert!(first.starts_with("$argon2id$"));
        assert!(verify_password("correct horse", &first));
        assert!(!verify_password("wrong horse", &first));
        assert!(!verify_password("correct horse", "plain-text"));
    }

    #[test]
    fn tokens_are_random_and_digests_stable() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert_ne!(token, generate_token());
        assert_eq!(token_digest(&token), token_digest(&token));
        assert_ne!(token_digest(&token), token);
    }

    #[test]
    fn otp_is_six_digits_and_bound_to_email() {
        let otp = generate_otp();
        assert_eq!(otp.len(), 6);
        assert!(otp.chars().all(|c| c.is_ascii_digit()));

        let stored = otp_digest("kim@example.com", &otp);
        assert!(otp_matches("KIM@example.com", &otp, &stored));
        assert!(!otp_matches("lee@example.com", &otp, &stored));
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration("kim", "kim@example.com", "secret").is_ok());
        assert!(validate_registration("ki", "kim@example.com", "secret").is_err());
        assert!(validate_registration("kim", "kim.example.com", "secret").is_err());
        assert!(validate_registration("kim", "kim@example.com", "12345").is_err());
    }
}
