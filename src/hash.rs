//! Digests over rule inputs, recorded to a sidecar file and compared on the
//! next build to decide whether a recipe must re-run.

use anyhow::Context;
use sha2::{Digest, Sha256};
use std::path::Path;

/// A pluggable digest: hashes a byte buffer together with a caller-supplied
/// salt.  Any deterministic, byte-comparable digest works; collision
/// resistance is only needed if untrusted inputs could be crafted to collide.
pub type HashFn = fn(bytes: &[u8], salt: &[u8]) -> Vec<u8>;

/// Default [`HashFn`]: sha-256 over the bytes followed by the salt.
pub fn sha256(bytes: &[u8], salt: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.update(salt);
    hasher.finalize().to_vec()
}

/// Separates fields within the hashed buffer, so e.g. the file name "ab"
/// followed by content "c" hashes differently from "a" followed by "bc".
const UNIT_SEPARATOR: u8 = 0x1F;

/// Digest a list of input files in order.  Each input contributes its path as
/// well as its content: two inputs with identical bytes still hash
/// differently when swapped, so input order is always part of the digest.
pub fn digest_files(hash: HashFn, inputs: &[impl AsRef<Path>], salt: &[u8]) -> anyhow::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for input in inputs {
        let path = input.as_ref();
        buf.extend_from_slice(path.to_string_lossy().as_bytes());
        buf.push(UNIT_SEPARATOR);
        let content = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        buf.extend_from_slice(&content);
        buf.push(UNIT_SEPARATOR);
    }
    Ok(hash(&buf, salt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn sha256_deterministic() {
        assert_eq!(sha256(b"a", b""), sha256(b"a", b""));
        assert_eq!(sha256(b"a", b"").len(), 32);
    }

    #[test]
    fn salt_changes_digest() {
        assert_ne!(sha256(b"a", b""), sha256(b"a", b"v2"));
    }

    #[test]
    fn digest_files_stable() {
        let dir = tempfile::tempdir().unwrap();
        let foo = dir.path().join("foo");
        std::fs::write(&foo, "a").unwrap();
        let inputs = [foo];
        let first = digest_files(sha256, &inputs, b"").unwrap();
        let second = digest_files(sha256, &inputs, b"").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, digest_files(sha256, &inputs, b"salted").unwrap());
    }

    #[test]
    fn input_order_is_significant() {
        // Same content in both files: only the order distinguishes them.
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, "same").unwrap();
        std::fs::write(&b, "same").unwrap();
        let fwd = digest_files(sha256, &[a.clone(), b.clone()], b"").unwrap();
        let rev = digest_files(sha256, &[b, a], b"").unwrap();
        assert_ne!(fwd, rev);
    }

    #[test]
    fn missing_input_is_an_error() {
        let missing = [PathBuf::from("/nonexistent/input")];
        assert!(digest_files(sha256, &missing, b"").is_err());
    }
}
