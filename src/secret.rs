//! The shared HMAC secret is a build-time constant, not a runtime config
//! value: disabling or swapping it requires rebuilding both tunnel
//! endpoints, matching the original's `#define HMAC_SECRET`.

#[cfg(not(feature = "no-hmac"))]
pub const SHARED_SECRET: &[u8] = b"change-me-before-deploying-eccvpn";

/// Returns the compiled-in secret, or an empty key when the `no-hmac`
/// feature is enabled (in which case [`crate::wire`] never reads it).
pub fn compiled_secret() -> Vec<u8> {
    #[cfg(not(feature = "no-hmac"))]
    {
        SHARED_SECRET.to_vec()
    }
    #[cfg(feature = "no-hmac")]
    {
        Vec::new()
    }
}
