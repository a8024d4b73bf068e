//! Usage statistics and composed responses.
//!
//! - [`UsageInfo`] - Normalized vendor usage statistics
//! - [`ComposedResponse`] - The final per-request artifact

use serde::{Deserialize, Serialize};

/// Normalized usage statistics fetched from a hosting vendor.
///
/// Vendors that do not separate upload from download split the used
/// amount evenly between the two fields, so `upload + download` is the
/// total consumed traffic either way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    /// Uploaded bytes.
    pub upload: u64,
    /// Downloaded bytes.
    pub download: u64,
    /// Total plan bytes.
    pub total: u64,
    /// Expiry/reset instant as epoch seconds. 0 means the vendor has no
    /// expiry concept.
    pub expire: i64,
}

impl UsageInfo {
    /// Returns the consumed traffic (`upload + download`).
    pub fn used(&self) -> u64 {
        self.upload + self.download
    }

    /// Returns true if any traffic field carries data.
    pub fn has_traffic(&self) -> bool {
        self.upload > 0 || self.download > 0 || self.total > 0
    }

    /// Returns true if the expiry instant is known.
    pub fn has_expiry(&self) -> bool {
        self.expire > 0
    }
}

/// The final artifact of one assembly: the annotated document bytes
/// paired with the usage that produced them.
///
/// Response headers (`Subscription-Userinfo` and friends) are derived
/// from the embedded [`UsageInfo`] at the HTTP boundary. Cloning copies
/// the document, which is small; the response-tier cache and the
/// coalescer both hand out clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedResponse {
    /// Annotated subscription document.
    pub body: Vec<u8>,
    /// Usage statistics the document was annotated with.
    pub usage: UsageInfo,
}
