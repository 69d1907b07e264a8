// forma-net/src/validation.rs
use forma_common::error::{FormaError, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Lowercase hex SHA256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Compares digests as hex, ignoring case.
pub fn digest_matches(actual: &str, expected: &str) -> bool {
    actual.trim().eq_ignore_ascii_case(expected.trim())
}

/// Validates a URL, ensuring it uses the HTTPS scheme.
pub fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str)
        .map_err(|e| FormaError::ValidationError(format!("Failed to parse URL '{url_str}': {e}")))?;
    if url.scheme() == "https" {
        Ok(())
    } else {
        Err(FormaError::ValidationError(format!(
            "Invalid URL scheme for '{}': Must be https, but got '{}'",
            url_str,
            url.scheme()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_known_input() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn digest_comparison_ignores_case_only() {
        let d = sha256_hex(b"abc");
        assert!(digest_matches(&d, &d.to_ascii_uppercase()));
        let mut flipped = d.clone().into_bytes();
        flipped[0] = if flipped[0] == b'b' { b'c' } else { b'b' };
        assert!(!digest_matches(&d, std::str::from_utf8(&flipped).unwrap()));
    }

    #[test]
    fn only_https_urls_are_accepted() {
        assert!(validate_url("https://github.com/wysaid/CameraCapture").is_ok());
        assert!(validate_url("http://github.com/wysaid/CameraCapture").is_err());
        assert!(validate_url("not a url").is_err());
    }
}
