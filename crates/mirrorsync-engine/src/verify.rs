//! Release asset verification.
//!
//! A destination release is complete when every source asset is present by
//! name and its size is within [`SIZE_TOLERANCE_BYTES`] of the source size.

use std::collections::HashMap;

use crate::types::{DestinationAsset, SourceAsset};

/// Allowed size difference between a source asset and its copy.
pub const SIZE_TOLERANCE_BYTES: u64 = 1024;

/// Asset whose destination size differs from the source beyond tolerance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeMismatch {
    pub name: String,
    pub expected: u64,
    pub actual: u64,
}

/// Result of comparing a release's assets on both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Verified,
    Incomplete {
        /// Source assets with no destination asset of the same name.
        missing: Vec<String>,
        mismatched: Vec<SizeMismatch>,
    },
}

impl Verification {
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified)
    }

    /// Whether any present asset has the wrong size.
    pub fn has_mismatch(&self) -> bool {
        matches!(self, Self::Incomplete { mismatched, .. } if !mismatched.is_empty())
    }

    /// Names of missing assets.
    pub fn missing(&self) -> &[String] {
        match self {
            Self::Verified => &[],
            Self::Incomplete { missing, .. } => missing,
        }
    }
}

impl std::fmt::Display for Verification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Verified => write!(f, "verified"),
            Self::Incomplete {
                missing,
                mismatched,
            } => {
                write!(f, "incomplete")?;
                if !missing.is_empty() {
                    write!(f, ", missing: {}", missing.join(", "))?;
                }
                for m in mismatched {
                    write!(
                        f,
                        ", {} is {} bytes (expected {})",
                        m.name, m.actual, m.expected
                    )?;
                }
                Ok(())
            }
        }
    }
}

/// Compare source assets against the destination's.
///
/// Extra destination assets are ignored.
pub fn verify_assets(source: &[SourceAsset], destination: &[DestinationAsset]) -> Verification {
    let by_name: HashMap<&str, u64> = destination
        .iter()
        .map(|a| (a.name.as_str(), a.size))
        .collect();

    let mut missing = Vec::new();
    let mut mismatched = Vec::new();

    for asset in source {
        match by_name.get(asset.name.as_str()) {
            None => missing.push(asset.name.clone()),
            Some(&actual) if actual.abs_diff(asset.size) > SIZE_TOLERANCE_BYTES => {
                mismatched.push(SizeMismatch {
                    name: asset.name.clone(),
                    expected: asset.size,
                    actual,
                })
            }
            Some(_) => {}
        }
    }

    if missing.is_empty() && mismatched.is_empty() {
        Verification::Verified
    } else {
        Verification::Incomplete {
            missing,
            mismatched,
        }
    }
}
