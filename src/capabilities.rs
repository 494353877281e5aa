//! Compiled-in features and version of the loaded MagickCore.
//!
//! Both come from plain getters that cannot fail, so nothing here returns a
//! `Result`. A library too broken to answer them will already have failed to
//! load.

use crate::native::MagickApi;
use crate::text;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const OPENMP: &str = "OpenMP";
pub const OPENCL: &str = "OpenCL";
pub const HDRI: &str = "HDRI";

/// Identifiers from a space-separated native list such as
/// `GetMagickFeatures()` or `GetMagickDelegates()`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    /// Split raw native text on whitespace.
    pub fn parse(raw: &[u8]) -> Self {
        Self(text::tokens(raw).into_iter().collect())
    }

    pub fn contains(&self, feature: &str) -> bool {
        self.0.contains(feature)
    }

    pub fn has_openmp(&self) -> bool {
        self.contains(OPENMP)
    }

    pub fn has_opencl(&self) -> bool {
        self.contains(OPENCL)
    }

    pub fn has_hdri(&self) -> bool {
        self.contains(HDRI)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Identifiers in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Library version decoded from the packed `MagickLibVersion` value.
///
/// Version A.B.C is packed as `0xABC`, one nibble per component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl Version {
    pub fn from_packed(raw: usize) -> Self {
        let nibble = |shift: u32| ((raw >> shift) & 0xf) as u8;
        Self {
            major: nibble(8),
            minor: nibble(4),
            patch: nibble(0),
        }
    }

    pub fn as_tuple(self) -> (u8, u8, u8) {
        (self.major, self.minor, self.patch)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Everything the library reports about its own build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub features: FeatureSet,
    pub delegates: FeatureSet,
    pub version: Version,
    /// Version banner, e.g. `ImageMagick 7.1.1-29 Q16-HDRI x86_64 ...`.
    pub version_text: String,
    pub quantum_depth: usize,
}

/// The version-related part of [`Capabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionInfo<'a> {
    pub version: Version,
    pub version_text: &'a str,
    pub quantum_depth: usize,
}

impl Capabilities {
    pub fn version_info(&self) -> VersionInfo<'_> {
        VersionInfo {
            version: self.version,
            version_text: &self.version_text,
            quantum_depth: self.quantum_depth,
        }
    }

    pub fn query<A: MagickApi + ?Sized>(api: &A) -> Self {
        let raw_version = api.version_number();
        let version = Version::from_packed(raw_version);
        log::debug!("MagickCore version {version} (0x{raw_version:x})");
        Self {
            features: FeatureSet::parse(&api.features()),
            delegates: FeatureSet::parse(&api.delegates()),
            version,
            version_text: text::latin1(&api.version_text()),
            quantum_depth: api.quantum_depth(),
        }
    }
}
