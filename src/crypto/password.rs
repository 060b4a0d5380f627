//! Password hashing for doctor accounts.
//!
//! Stored format: `pbkdf2-sha256$<iterations>$<salt>$<hash>`, salt and hash
//! in unpadded standard base64.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::CryptoError;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

const SCHEME: &str = "pbkdf2-sha256";

#[cfg(test)]
thread_local! {
    static DERIVE_CALLS: std::cell::Cell<u32> = const { std::cell::Cell::new(0) };
}

/// Key derivations run on this thread so far.
#[cfg(test)]
pub(crate) fn derive_calls() -> u32 {
    DERIVE_CALLS.with(|c| c.get())
}

/// Hash a password with the production iteration count.
pub fn hash_password(password: &str) -> String {
    hash_password_with_iterations(password, PBKDF2_ITERATIONS)
}

pub fn hash_password_with_iterations(password: &str, iterations: u32) -> String {
    let salt = generate_salt();
    let derived = derive(password, &salt, iterations);
    format!(
        "{SCHEME}${iterations}${}${}",
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(derived.as_slice())
    )
}

/// A well-formed hash no password matches, at the given cost. Verifying
/// against it costs the same as verifying a real account.
pub fn dummy_hash(iterations: u32) -> String {
    format!(
        "{SCHEME}${}${}${}",
        iterations.max(1),
        STANDARD_NO_PAD.encode([0u8; SALT_LENGTH]),
        STANDARD_NO_PAD.encode([0u8; HASH_LENGTH])
    )
}

/// Check `password` against a stored hash in constant time.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, CryptoError> {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return Err(CryptoError::MalformedHash);
    };

    if scheme != SCHEME {
        return Err(CryptoError::UnsupportedScheme(scheme.to_string()));
    }
    let iterations: u32 = iterations.parse().map_err(|_| CryptoError::MalformedHash)?;
    if iterations == 0 {
        return Err(CryptoError::MalformedHash);
    }
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| CryptoError::MalformedHash)?;
    let expected = STANDARD_NO_PAD
        .decode(expected)
        .map_err(|_| CryptoError::MalformedHash)?;
    if expected.len() != HASH_LENGTH {
        return Err(CryptoError::MalformedHash);
    }

    let derived = derive(password, &salt, iterations);
    Ok(bool::from(derived.as_slice().ct_eq(&expected)))
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; HASH_LENGTH]> {
    #[cfg(test)]
    DERIVE_CALLS.with(|c| c.set(c.get() + 1));
    let mut out = Zeroizing::new([0u8; HASH_LENGTH]);
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out[..]);
    out
}

/// Generate a cryptographically random salt
fn generate_salt() -> [u8; SALT_LENGTH] {
    use rand::RngCore;
    let mut salt = [0u8; SALT_LENGTH];
    rand::thread_rng().fill_bytes(&mut salt);
    salt
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAST: u32 = 1_000;

    #[test]
    fn correct_password_verifies() {
        let stored = hash_password_with_iterations("s3cret!", FAST);
        assert!(verify_password("s3cret!", &stored).unwrap());
    }

    #[test]
    fn wrong_password_fails() {
        let stored = hash_password_with_iterations("s3cret!", FAST);
        assert!(!verify_password("s3cret?", &stored).unwrap());
        assert!(!verify_password("", &stored).unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password_with_iterations("pw", FAST);
        let b = hash_password_with_iterations("pw", FAST);
        assert_ne!(a, b);
    }

    #[test]
    fn stored_format_has_scheme_and_iterations() {
        let stored = hash_password_with_iterations("pw", FAST);
        assert!(stored.starts_with("pbkdf2-sha256$1000$"));
        assert_eq!(stored.split('$').count(), 4);
    }

    #[test]
    fn plaintext_or_garbage_is_malformed() {
        assert!(matches!(
            verify_password("pw", "pw"),
            Err(CryptoError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("pw", "pbkdf2-sha256$abc$c2FsdA$aGFzaA"),
            Err(CryptoError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("pw", "pbkdf2-sha256$1000$c2FsdA$dG9vc2hvcnQ"),
            Err(CryptoError::MalformedHash)
        ));
    }

    #[test]
    fn dummy_hash_is_well_formed_and_matches_nothing() {
        let dummy = dummy_hash(FAST);
        assert!(dummy.starts_with("pbkdf2-sha256$1000$"));
        assert!(!verify_password("", &dummy).unwrap());
        assert!(!verify_password("secret1", &dummy).unwrap());
    }

    #[test]
    fn unknown_scheme_rejected() {
        assert!(matches!(
            verify_password("pw", "bcrypt$10$salt$hash"),
            Err(CryptoError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn production_iterations_take_meaningful_time() {
        let start = std::time::Instant::now();
        let _ = hash_password("test_password");
        assert!(
            start.elapsed().as_millis() > 50,
            "PBKDF2 too fast: {}ms",
            start.elapsed().as_millis()
        );
    }
}
