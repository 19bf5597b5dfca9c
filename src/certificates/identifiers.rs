use std::sync::OnceLock;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use regex::Regex;

const SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 6;
const VERIFICATION_BYTES: usize = 32;

/// `CERT-{YYYYMMDDHHMMSS}-{6 x [A-Z0-9]}`.
///
/// Two calls within the same second collide with probability 36^-6; the unique
/// constraint on `certificate_number` is what actually guarantees uniqueness.
pub fn generate_certificate_number() -> String {
    certificate_number_at(Utc::now())
}

pub fn certificate_number_at(now: DateTime<Utc>) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect();
    format!("CERT-{}-{}", now.format("%Y%m%d%H%M%S"), suffix)
}

/// 256 bits from the OS RNG, URL-safe base64 without padding (43 chars).
pub fn generate_verification_code() -> String {
    let mut bytes = [0u8; VERIFICATION_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn is_well_formed_certificate_number(candidate: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^CERT-\d{14}-[A-Z0-9]{6}$").expect("static pattern"))
        .is_match(candidate)
}
