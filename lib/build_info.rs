/// Build identity reported by `--version` and attached to every log line.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_COMMIT_HASH: &str = env!("FIELDCART_GIT_COMMIT_HASH");
pub const VERSION_WITH_COMMIT: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "+",
    env!("FIELDCART_GIT_COMMIT_HASH")
);

/// Short hash for log fields. Stays `"unknown"` when git metadata was
/// missing at build time.
pub fn short_commit_hash() -> &'static str {
    if GIT_COMMIT_HASH == "unknown" {
        return GIT_COMMIT_HASH;
    }
    &GIT_COMMIT_HASH[..GIT_COMMIT_HASH.len().min(12)]
}
