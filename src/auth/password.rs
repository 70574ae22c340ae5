use anyhow::Context;
use tracing::error;

/// bcrypt work factor for stored passwords.
pub const HASH_COST: u32 = 12;

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    bcrypt::hash(plain, HASH_COST)
        .map_err(|e| {
            error!(error = %e, "bcrypt hash error");
            e
        })
        .context("hash password")
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    bcrypt::verify(plain, hash).context("verify password")
}
