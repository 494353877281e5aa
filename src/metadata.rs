//! Process-wide MagickCore metadata.
//!
//! [`MagickMetadata::query`] runs the whole introspection sequence against
//! any [`MagickApi`]: capabilities first, then the format registry. The
//! result is an immutable value that can be passed around freely.
//!
//! For code that wants a single shared copy, [`init`] and [`init_with`] store
//! the first successful result in a `OnceLock`. Concurrent first callers are
//! serialised, so the library is loaded and queried at most once per
//! successful initialisation. Later calls return the stored copy without
//! touching the library again; [`get`] reads it without initialising.

use crate::capabilities::{Capabilities, FeatureSet, Version};
use crate::config::MagickConfig;
use crate::error::MagickError;
use crate::formats::{FormatTables, ImageFormat};
use crate::native::{MagickApi, NativeMagick};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, OnceLock, PoisonError};

static METADATA: MetadataCell = MetadataCell::new();

/// Capabilities and format registry of one MagickCore library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MagickMetadata {
    pub capabilities: Capabilities,
    pub formats: FormatTables,
}

impl MagickMetadata {
    /// Query everything from `api`.
    ///
    /// Fails only if the format registry query fails; in that case nothing is
    /// returned, not even the capabilities.
    pub fn query<A: MagickApi + ?Sized>(api: &A) -> Result<Self, MagickError> {
        let capabilities = Capabilities::query(api);
        let formats = FormatTables::load(api)?;
        Ok(Self {
            capabilities,
            formats,
        })
    }

    pub fn features(&self) -> &FeatureSet {
        &self.capabilities.features
    }

    pub fn has_openmp(&self) -> bool {
        self.capabilities.features.has_openmp()
    }

    pub fn has_opencl(&self) -> bool {
        self.capabilities.features.has_opencl()
    }

    pub fn has_hdri(&self) -> bool {
        self.capabilities.features.has_hdri()
    }

    pub fn version(&self) -> Version {
        self.capabilities.version
    }

    pub fn image_formats(&self) -> &BTreeMap<String, ImageFormat> {
        self.formats.by_name_table()
    }

    pub fn image_formats_by_mime_type(&self) -> &HashMap<String, ImageFormat> {
        self.formats.by_mime_type_table()
    }
}

/// A write-once slot with a fallible initialiser.
///
/// Callers that find the slot empty take the `init` lock in turn, so at most
/// one query is in flight. A failed query leaves the slot empty for the next
/// caller.
struct MetadataCell {
    value: OnceLock<MagickMetadata>,
    init: Mutex<()>,
}

impl MetadataCell {
    const fn new() -> Self {
        Self {
            value: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    fn get(&self) -> Option<&MagickMetadata> {
        self.value.get()
    }

    fn get_or_try_init(
        &self,
        query: impl FnOnce() -> Result<MagickMetadata, MagickError>,
    ) -> Result<&MagickMetadata, MagickError> {
        if let Some(metadata) = self.value.get() {
            return Ok(metadata);
        }
        // The guarded section holds no invariant a panic could break.
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(metadata) = self.value.get() {
            return Ok(metadata);
        }
        let metadata = query()?;
        Ok(self.value.get_or_init(|| metadata))
    }
}

/// Load MagickCore as configured and store its metadata for the process.
///
/// The library is unloaded again once the metadata has been copied out.
pub fn init(config: &MagickConfig) -> Result<&'static MagickMetadata, MagickError> {
    METADATA.get_or_try_init(|| {
        let native = NativeMagick::load(config)?;
        log::debug!("querying {}", native.path().display());
        MagickMetadata::query(&native)
    })
}

/// Store metadata queried from `api` for the process.
pub fn init_with<A: MagickApi + ?Sized>(api: &A) -> Result<&'static MagickMetadata, MagickError> {
    METADATA.get_or_try_init(|| MagickMetadata::query(api))
}

/// The stored metadata, if [`init`] or [`init_with`] has succeeded.
pub fn get() -> Option<&'static MagickMetadata> {
    METADATA.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::tests::{MockEntry, MockMagick};
    use std::sync::Barrier;
    use std::time::Duration;

    fn registry() -> MockMagick {
        MockMagick::with_entries(vec![
            MockEntry::new("PNG", "Portable Network Graphics").mime("image/png"),
            MockEntry::new("GIF", "CompuServe graphics interchange format")
                .mime("image/gif")
                .adjoin(),
        ])
    }

    #[test]
    fn query_collects_everything() {
        let metadata = MagickMetadata::query(&registry()).unwrap();
        assert_eq!(metadata.version().as_tuple(), (7, 1, 1));
        assert!(metadata.has_openmp());
        assert!(metadata.has_hdri());
        assert!(!metadata.has_opencl());
        assert_eq!(metadata.image_formats().len(), 2);
        assert_eq!(
            metadata.image_formats_by_mime_type()["image/gif"].name,
            "GIF"
        );
    }

    #[test]
    fn flags_agree_with_feature_set() {
        let metadata = MagickMetadata::query(&registry()).unwrap();
        assert_eq!(metadata.has_openmp(), metadata.features().contains("OpenMP"));
        assert_eq!(metadata.has_opencl(), metadata.features().contains("OpenCL"));
        assert_eq!(metadata.has_hdri(), metadata.features().contains("HDRI"));
    }

    #[test]
    fn query_is_idempotent() {
        let mock = registry();
        let first = MagickMetadata::query(&mock).unwrap();
        let second = MagickMetadata::query(&mock).unwrap();
        assert_eq!(first, second);
        assert_eq!(mock.lists_released(), 2);
    }

    #[test]
    fn query_failure_returns_no_tables() {
        let mut mock = MockMagick::failing(700, "registry corrupted");
        mock.entries = registry().entries;
        mock.array_despite_exception = true;

        let err = MagickMetadata::query(&mock).unwrap_err();

        assert_eq!(err.native_code(), Some(700));
        assert_eq!(mock.lists_released(), 1);
    }

    #[test]
    fn concurrent_first_callers_query_once() {
        let cell = MetadataCell::new();
        let mut mock = registry();
        mock.delay = Some(Duration::from_millis(200));
        let barrier = Barrier::new(2);

        let (a, b) = std::thread::scope(|s| {
            let run = || {
                barrier.wait();
                cell.get_or_try_init(|| MagickMetadata::query(&mock)).unwrap()
            };
            let a = s.spawn(run);
            let b = s.spawn(run);
            (a.join().unwrap(), b.join().unwrap())
        });

        assert!(std::ptr::eq(a, b));
        assert_eq!(mock.lists_acquired(), 1);
        assert_eq!(mock.lists_released(), 1);
    }

    #[test]
    fn failed_init_leaves_cell_empty() {
        let cell = MetadataCell::new();
        let failing = MockMagick::failing(400, "memory allocation failed");
        assert!(cell.get_or_try_init(|| MagickMetadata::query(&failing)).is_err());
        assert!(cell.get().is_none());

        let mock = registry();
        let metadata = cell.get_or_try_init(|| MagickMetadata::query(&mock)).unwrap();
        assert_eq!(metadata.image_formats().len(), 2);
        assert!(cell.get().is_some());
    }

    // The only test that touches the process-wide cell.
    #[test]
    fn init_with_queries_once() {
        let first_mock = registry();
        let first = init_with(&first_mock).unwrap();

        let second_mock = MockMagick::with_entries(Vec::new());
        let second = init_with(&second_mock).unwrap();

        assert!(std::ptr::eq(first, second));
        assert_eq!(second_mock.lists_acquired(), 0);
        assert!(std::ptr::eq(get().unwrap(), first));
        assert_eq!(first.image_formats().len(), 2);
    }
}
