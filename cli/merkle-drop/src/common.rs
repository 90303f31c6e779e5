use std::io::Write;
use std::path::Path;

use anyhow::Context;
use sha3::{Digest, Keccak256};
use tempfile::NamedTempFile;

/// A 32-byte Keccak-256 digest.
pub type Hash = [u8; 32];

/// Strips an optional `0x` prefix and surrounding whitespace.
pub fn strip_hex_prefix(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
}

/// Parses a 20-byte address from a hex string.
///
/// # Arguments
/// * `addr_str` - The address string, with or without "0x" prefix
///
/// # Errors
/// Returns an error if the address is not 40 hex characters, contains invalid hex,
/// or is the zero address
pub fn parse_address(addr_str: &str) -> anyhow::Result<[u8; 20]> {
    let cleaned = strip_hex_prefix(addr_str);
    if cleaned.len() != 40 {
        anyhow::bail!(
            "Invalid address length: expected 40 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut address = [0u8; 20];
    hex::decode_to_slice(cleaned, &mut address)
        .map_err(|e| anyhow::anyhow!("Invalid hex encoding: {}", e))?;
    if address == [0u8; 20] {
        anyhow::bail!("Zero address not allowed");
    }
    Ok(address)
}

/// Parses a 32-byte hash (such as a Merkle root) from a hex string.
pub fn parse_hash(hash_str: &str) -> anyhow::Result<Hash> {
    let cleaned = strip_hex_prefix(hash_str);
    if cleaned.len() != 64 {
        anyhow::bail!(
            "Invalid hash length: expected 64 hex chars, got {}",
            cleaned.len()
        );
    }
    let mut hash = [0u8; 32];
    hex::decode_to_slice(cleaned, &mut hash).context("Invalid hash encoding")?;
    Ok(hash)
}

/// Encodes bytes as a lowercase `0x`-prefixed hex string.
pub fn hex_encode(bytes: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Keccak-256 of an arbitrary byte string.
pub fn keccak256(data: &[u8]) -> Hash {
    Keccak256::digest(data).into()
}

/// Computes a Keccak256 hash of two 32-byte values concatenated in the given order.
pub fn keccak256_hash(left: Hash, right: Hash) -> Hash {
    let hash = Keccak256::new()
        .chain_update(left)
        .chain_update(right)
        .finalize();
    hash.into()
}

/// Hashes a pair of nodes after ordering them byte-lexicographically.
///
/// The result does not depend on which side either node was on, so a verifier
/// only needs sibling values, never positions.
pub fn hash_sorted_pair(a: Hash, b: Hash) -> Hash {
    if a <= b {
        keccak256_hash(a, b)
    } else {
        keccak256_hash(b, a)
    }
}

/// Writes `contents` to `path` via a uniquely named sibling temp file and a
/// rename, so readers never observe a half-written file. The temp file is
/// removed if any step fails.
pub fn write_file_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_with_prefix() {
        let addr = "0x1234567890abcdef1234567890abcdef12345678";
        let result = parse_address(addr).unwrap();
        assert_eq!(result[0], 0x12);
        assert_eq!(result[19], 0x78);
    }

    #[test]
    fn test_parse_address_without_prefix() {
        let addr = "  1234567890ABCDEF1234567890abcdef12345678\n";
        let result = parse_address(addr).unwrap();
        assert_eq!(result[5], 0xef);
    }

    #[test]
    fn test_parse_address_invalid_length() {
        assert!(parse_address("0x1234").is_err());
    }

    #[test]
    fn test_parse_address_invalid_hex() {
        assert!(parse_address("0xghijklmnopqrstuvwxyz1234567890abcdef1234").is_err());
    }

    #[test]
    fn test_parse_address_zero() {
        assert!(parse_address("0x0000000000000000000000000000000000000000").is_err());
    }

    #[test]
    fn test_parse_hash() {
        let hex = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_hash(&hex).unwrap(), [0xab; 32]);
        assert!(parse_hash("0xabcd").is_err());
    }

    #[test]
    fn test_hex_encode() {
        assert_eq!(hex_encode([0xde, 0xad]), "0xdead");
    }

    #[test]
    fn test_keccak256_empty() {
        // Well-known digest of the empty string.
        assert_eq!(
            hex_encode(keccak256(&[])),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_sorted_pair_commutes() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(hash_sorted_pair(a, b), hash_sorted_pair(b, a));
        assert_eq!(hash_sorted_pair(a, b), keccak256_hash(a, b));
        assert_ne!(keccak256_hash(a, b), keccak256_hash(b, a));
    }

    #[test]
    fn test_write_file_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_file_atomic(&path, "{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
        write_file_atomic(&path, "[]").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_file_atomic_failure_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory cannot be replaced by the rename.
        let target = dir.path().join("out.json");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("keep"), "x").unwrap();

        assert!(write_file_atomic(&target, "{}").is_err());
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("out.json")]);
    }
}
