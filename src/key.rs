//! Application server key decoding.
//!
//! Push services expect the application server (VAPID) public key as raw
//! bytes, but it is distributed as an unpadded base64url string.

use base64::Engine;
use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};

use crate::error::Result;

/// Public key of the codelab's demo application server.
pub const DEFAULT_APPLICATION_SERVER_KEY: &str =
    "BGYxBJ-YmUyI8u8DY9Z6aEDa7_FuVvyQlmqFwV5Y9bi6xXwzhG5RDBpG9ep4T-nZCwZzWxjgegM-95ZiA8xoqVE";

/// Standard alphabet, tolerating non-zero bits in the final symbol the way
/// browsers' `atob` does.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Number of `=` characters needed to pad a string of `len` bytes to a
/// multiple of four.
#[must_use]
pub const fn padding_len(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// Converts a base64url string into the standard padded alphabet.
fn to_standard_base64(key: &str) -> String {
    let mut padded = String::with_capacity(key.len() + padding_len(key.len()));
    padded.extend(key.chars().map(|c| match c {
        '-' => '+',
        '_' => '/',
        other => other,
    }));
    padded.extend(std::iter::repeat_n('=', padding_len(key.len())));
    padded
}

/// Decodes a base64url application server key into raw bytes.
///
/// # Errors
///
/// Returns [`crate::Error::Decode`] if the key is not valid base64url.
pub fn decode_application_key(key: &str) -> Result<Vec<u8>> {
    Ok(LENIENT.decode(to_standard_base64(key))?)
}
