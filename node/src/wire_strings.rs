//! Fixed-width, null-padded ASCII string fields used by the tracker and
//! peer handshakes (usernames), distinct from the pure-hex [`imgchain_core::HexId`]
//! fields used for ids.

/// Encodes `s` into a `N`-byte buffer, null-padded on the right. Truncates
/// silently if `s` is longer than `N` bytes — usernames are user-supplied
/// free text, not validated length elsewhere in the prototype either.
pub fn pad_bytes<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let len = bytes.len().min(N);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Decodes a null-padded ASCII field, dropping trailing NUL bytes.
pub fn unpad_bytes(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
