//! Password digests.
//!
//! Credential checks are a single keyed lookup on `(username, digest)`, so
//! the digest must be recomputable from the password alone. A per-account
//! random salt would break that, so hardening comes from PBKDF2 iterations
//! plus a deployment-wide pepper instead.

use sha2::Sha256;

/// Output length of the PBKDF2 digest in bytes (64 hex characters).
const DIGEST_LEN: usize = 32;

/// Deterministic PBKDF2-HMAC-SHA256 password digester.
#[derive(Debug, Clone)]
pub struct PasswordDigester {
    iterations: u32,
    pepper: String,
}

impl PasswordDigester {
    pub fn new(iterations: u32, pepper: &str) -> Self {
        Self {
            iterations,
            pepper: pepper.to_string(),
        }
    }

    /// Digest a password. Same password, iterations, and pepper always
    /// produce the same hex string.
    pub fn digest(&self, password: &str) -> String {
        let mut out = [0u8; DIGEST_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            self.pepper.as_bytes(),
            self.iterations,
            &mut out,
        );
        hex::encode(out)
    }
}

/// Unsalted MD5 hex digest, as older deployments stored it. Only used to
/// recognize pre-migration rows during login.
pub fn legacy_md5(password: &str) -> String {
    use md5::{Digest, Md5};

    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let digester = PasswordDigester::new(1000, "pepper");
        assert_eq!(digester.digest("Admin1@"), digester.digest("Admin1@"));
    }

    #[test]
    fn digest_depends_on_password() {
        let digester = PasswordDigester::new(1000, "pepper");
        assert_ne!(digester.digest("Admin1@"), digester.digest("Admin2@"));
    }

    #[test]
    fn digest_depends_on_pepper() {
        let a = PasswordDigester::new(1000, "pepper-a");
        let b = PasswordDigester::new(1000, "pepper-b");
        assert_ne!(a.digest("Admin1@"), b.digest("Admin1@"));
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digester = PasswordDigester::new(1000, "pepper");
        let digest = digester.digest("Admin1@");
        assert_eq!(digest.len(), DIGEST_LEN * 2);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn legacy_md5_known_value() {
        assert_eq!(legacy_md5("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn legacy_and_current_digests_differ() {
        let digester = PasswordDigester::new(1000, "pepper");
        assert_ne!(digester.digest("Admin1@"), legacy_md5("Admin1@"));
    }
}
