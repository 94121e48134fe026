use anyhow::{bail, Result};
use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

#[inline(always)]
pub fn base64_encode<T>(input: T) -> String
where
    T: AsRef<[u8]>,
{
    BASE64_STANDARD.encode(input)
}

#[inline(always)]
pub fn base64_decode<T>(input: T) -> Result<Vec<u8>>
where
    T: AsRef<[u8]>,
{
    match BASE64_STANDARD.decode(input) {
        Ok(data) => Ok(data),
        Err(_) => bail!("invalid base64 string"),
    }
}

#[inline(always)]
pub fn sha256<T>(input: T) -> String
where
    T: AsRef<[u8]>,
{
    let hash = Sha256::digest(input);
    format!("{hash:x}")
}

/// Generates a random alphanumeric salt of the given length.
pub fn generate_salt(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64() {
        let encoded = base64_encode("hello");
        assert_eq!(base64_decode(&encoded).unwrap(), b"hello");
        assert!(base64_decode("not-base64!!").is_err());
    }

    #[test]
    fn test_sha256() {
        let hash = sha256("test_passwordtest_salt");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, sha256("test_passwordtest_salt"));
        assert_ne!(hash, sha256("test_passwordother_salt"));
    }

    #[test]
    fn test_generate_salt() {
        let salt = generate_salt(24);
        assert_eq!(salt.len(), 24);
        assert!(salt.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(generate_salt(24), generate_salt(24));
    }
}
