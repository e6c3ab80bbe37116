//! Golden fingerprint vectors.
//!
//! Stored fingerprints must survive process restarts and reimplementation,
//! so the digest of each raw key is pinned here.

use keyward_core::KeyFingerprint;

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Raw key as presented.
    pub raw: &'static str,
    /// Expected SHA-256 fingerprint (hex).
    pub expected_fingerprint: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "legacy admin key",
            raw: "xyz",
            expected_fingerprint: "3608bca1e44ea6c4d268eb6db02260269892c0b42b86bbf1e77a6fa16c3c9282",
        },
        GoldenVector {
            name: "admin key",
            raw: "adm_0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcd",
            expected_fingerprint: "0395de580549868e6282917d640933c27bee4281211bdbb777e8cb7da7e9f724",
        },
        GoldenVector {
            name: "analyst key",
            raw: "ana_zyxwvutsrqponmlkjihgfedcbaZYXWVUTSRQPONM",
            expected_fingerprint: "50e36ad871e1abf7ea57020f4db4fc589a95bd52bc4e4fcf229b1ac249949d9c",
        },
        GoldenVector {
            name: "client key",
            raw: "cli_AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA",
            expected_fingerprint: "59069736ab2f770bfd5e607c9b80adf34f29c6b93ec4a17c4f114484402afb23",
        },
        GoldenVector {
            name: "empty input",
            raw: "",
            expected_fingerprint: "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        },
    ]
}

/// Verify every vector against this build's hasher.
///
/// Returns `(name, matches, actual_hex)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let hex = KeyFingerprint::of(v.raw).to_hex();
            (v.name.to_string(), hex == v.expected_fingerprint, hex)
        })
        .collect()
}
