// forma-net/src/lib.rs
pub mod http;
pub mod validation;

pub use forma_common::error::{FormaError, Result};
pub use http::{build_http_client, download_bytes, download_with_mirrors};
pub use validation::{digest_matches, sha256_hex, validate_url};
