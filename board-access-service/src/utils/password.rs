use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use std::fmt;
use std::sync::OnceLock;

/// Plain-text password. `Debug` is redacted so it cannot leak into logs.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

/// PHC-format Argon2 hash.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hash a password using Argon2id with a random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = Argon2::default()
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Returns `true` only when `password` matches `password_hash`.
///
/// A malformed stored hash is treated as a mismatch.
pub fn verify_password(password: &Password, password_hash: &PasswordHashString) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(password_hash.as_str()) else {
        tracing::error!("Stored credential hash is not a valid PHC string");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_str().as_bytes(), &parsed_hash)
        .is_ok()
}

/// Burn the same Argon2 work as a real verification. Used when the email is
/// unknown so that sign-in latency does not reveal which accounts exist.
pub fn verify_against_dummy(password: &Password) {
    static DUMMY_HASH: OnceLock<Option<PasswordHashString>> = OnceLock::new();

    let dummy = DUMMY_HASH.get_or_init(|| {
        hash_password(&Password::new("dummy-password-for-timing".to_string())).ok()
    });

    if let Some(hash) = dummy {
        let _ = verify_password(password, hash);
    }
}
