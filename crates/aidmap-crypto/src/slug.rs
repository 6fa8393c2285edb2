use rand::Rng;

/// Length of a public request slug.
pub const SLUG_LEN: usize = 10;

/// URL-safe alphabet. 64 symbols, so every symbol is equally likely.
const ALPHABET: &[u8; 64] = b"useandom-26T198340PX75pxJACKVERYMINDBUSHWOLF_GQZbfghjklqvwyzrict";

/// Generate a fresh slug from the thread-local CSPRNG.
///
/// Uniqueness is not checked here; the store's unique index rejects the rare
/// collision and the caller retries.
pub fn new_slug() -> String {
    let mut rng = rand::rng();
    (0..SLUG_LEN)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Shortened form for log lines; a full slug grants control of its request.
pub fn redact(slug: &str) -> String {
    let prefix: String = slug.chars().take(3).collect();
    format!("{}…", prefix)
}
