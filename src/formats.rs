//! The image format registry.
//!
//! `GetMagickInfoList("*")` returns every coder the library knows about.
//! Each entry is copied into an owned [`ImageFormat`] and indexed twice:
//!
//! - by lowercase name (`"png"`, `"jpeg"`, ...);
//! - by MIME type, for entries that declare one.
//!
//! Several coders can declare the same MIME type (`JPEG`, `JPG` and `JPE` all
//! claim `image/jpeg`). The MIME table keeps whichever comes last in native
//! list order. Nothing decides between them beyond that.
//!
//! Text fields use fixed encodings: `name` and `description` are latin-1,
//! `mime_type` must be ASCII. A non-ASCII MIME type fails the whole query.

use crate::error::MagickError;
use crate::native::{FormatInfoList, MagickApi, RawDescriptor};
use crate::text;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::ffi::{CStr, CString};

/// Pattern matching every registered format.
pub const ALL_FORMATS: &CStr = c"*";

/// One image format known to the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageFormat {
    pub name: String,
    pub description: String,
    /// A decoder is registered.
    pub can_read: bool,
    /// An encoder is registered.
    pub can_write: bool,
    /// Multiple frames can be stored in one file.
    pub supports_frames: bool,
    pub mime_type: Option<String>,
}

impl ImageFormat {
    fn from_raw(index: usize, raw: &RawDescriptor<'_>) -> Result<Self, MagickError> {
        let mime_type = match raw.mime_type {
            Some(bytes) => Some(text::ascii(bytes).ok_or(MagickError::Decode {
                index,
                field: "mime_type",
                encoding: "ASCII",
            })?),
            None => None,
        };
        Ok(Self {
            name: text::latin1(raw.name),
            description: text::latin1(raw.description),
            can_read: raw.has_decoder,
            can_write: raw.has_encoder,
            supports_frames: raw.adjoin,
            mime_type,
        })
    }

    /// Key used in the name table.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Capability filter for [`FormatTables::select`]. Unset flags match
/// everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatQuery {
    pub readable: bool,
    pub writable: bool,
    pub frames: bool,
}

impl FormatQuery {
    pub fn matches(&self, format: &ImageFormat) -> bool {
        (!self.readable || format.can_read)
            && (!self.writable || format.can_write)
            && (!self.frames || format.supports_frames)
    }
}

/// Read-only lookup tables over the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatTables {
    by_name: BTreeMap<String, ImageFormat>,
    by_mime_type: HashMap<String, ImageFormat>,
}

impl FormatTables {
    /// Query every registered format.
    pub fn load<A: MagickApi + ?Sized>(api: &A) -> Result<Self, MagickError> {
        Self::load_matching(api, ALL_FORMATS)
    }

    /// Query the formats whose names match a MagickCore glob.
    pub fn load_matching<A: MagickApi + ?Sized>(
        api: &A,
        pattern: &CStr,
    ) -> Result<Self, MagickError> {
        let list = FormatInfoList::acquire(api, pattern)?;
        let formats = list
            .descriptors()
            .map(|(index, raw)| ImageFormat::from_raw(index, &raw))
            .collect::<Result<Vec<_>, _>>()?;
        drop(list);

        let tables = Self::from_formats(formats);
        log::info!(
            "{} formats matching {:?}, {} MIME types",
            tables.by_name.len(),
            pattern,
            tables.by_mime_type.len()
        );
        Ok(tables)
    }

    /// Convenience wrapper for patterns held as Rust strings.
    pub fn load_pattern<A: MagickApi + ?Sized>(
        api: &A,
        pattern: &str,
    ) -> Result<Self, MagickError> {
        let pattern = CString::new(pattern).map_err(|e| {
            crate::config::ConfigError::Validation(format!("format pattern: {e}"))
        })?;
        Self::load_matching(api, &pattern)
    }

    /// Index formats in the order given. Later entries win on key collisions.
    pub fn from_formats(formats: impl IntoIterator<Item = ImageFormat>) -> Self {
        let mut by_name = BTreeMap::new();
        let mut by_mime_type = HashMap::new();
        for format in formats {
            if let Some(mime) = &format.mime_type {
                if let Some(previous) = by_mime_type.insert(mime.clone(), format.clone()) {
                    log::debug!(
                        "{mime} claimed by {} and {}; keeping {}",
                        previous.name,
                        format.name,
                        format.name
                    );
                }
            }
            let name = format.name.clone();
            if let Some(previous) = by_name.insert(format.key(), format) {
                log::debug!(
                    "format names {} and {name} differ only in case; keeping {name}",
                    previous.name
                );
            }
        }
        Self {
            by_name,
            by_mime_type,
        }
    }

    /// Look up a format by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&ImageFormat> {
        self.by_name.get(&name.to_lowercase())
    }

    pub fn by_mime_type(&self, mime_type: &str) -> Option<&ImageFormat> {
        self.by_mime_type.get(mime_type)
    }

    /// Name table, keyed by lowercase name.
    pub fn by_name_table(&self) -> &BTreeMap<String, ImageFormat> {
        &self.by_name
    }

    /// MIME table, last-write-wins per MIME type.
    pub fn by_mime_type_table(&self) -> &HashMap<String, ImageFormat> {
        &self.by_mime_type
    }

    /// Formats in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageFormat> {
        self.by_name.values()
    }

    /// Formats in name order that have every capability `query` asks for.
    pub fn select(&self, query: FormatQuery) -> impl Iterator<Item = &ImageFormat> {
        self.iter().filter(move |f| query.matches(f))
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::tests::{MockEntry, MockMagick};

    fn registry() -> MockMagick {
        MockMagick::with_entries(vec![
            MockEntry::new("PNG", "Portable Network Graphics").mime("image/png"),
            MockEntry::new("GIF", "CompuServe graphics interchange format")
                .mime("image/gif")
                .adjoin(),
            MockEntry::new("JPEG", "Joint Photographic Experts Group JFIF format")
                .mime("image/jpeg"),
            MockEntry::new("JPG", "Joint Photographic Experts Group JFIF format")
                .mime("image/jpeg"),
            MockEntry::new("XC", "Constant image uniform color").handlers(true, false),
        ])
    }

    #[test]
    fn load_queries_wildcard() {
        let mock = registry();
        FormatTables::load(&mock).unwrap();
        assert_eq!(*mock.patterns.lock().unwrap(), vec!["*".to_string()]);
    }

    #[test]
    fn name_keys_are_lowercased_names() {
        let tables = FormatTables::load(&registry()).unwrap();
        let keys: Vec<&str> = tables.by_name_table().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["gif", "jpeg", "jpg", "png", "xc"]);
        for (key, format) in tables.by_name_table() {
            assert_eq!(*key, format.name.to_lowercase());
        }
    }

    #[test]
    fn get_ignores_case() {
        let tables = FormatTables::load(&registry()).unwrap();
        assert_eq!(tables.get("png").unwrap().name, "PNG");
        assert_eq!(tables.get("Png").unwrap().name, "PNG");
        assert!(tables.get("webp").is_none());
    }

    #[test]
    fn mime_collision_keeps_last() {
        let tables = FormatTables::load(&registry()).unwrap();
        assert_eq!(tables.by_mime_type("image/jpeg").unwrap().name, "JPG");
        assert_eq!(tables.by_mime_type("image/png").unwrap().name, "PNG");
    }

    #[test]
    fn formats_without_mime_are_not_keyed() {
        let tables = FormatTables::load(&registry()).unwrap();
        assert_eq!(tables.by_mime_type_table().len(), 3);
        assert!(
            tables
                .by_mime_type_table()
                .values()
                .all(|f| f.mime_type.is_some())
        );
        assert!(tables.get("xc").unwrap().mime_type.is_none());
    }

    #[test]
    fn read_write_follow_handler_presence() {
        let mock = MockMagick::with_entries(vec![
            MockEntry::new("NONE", "").handlers(false, false),
            MockEntry::new("RO", "").handlers(true, false),
            MockEntry::new("WO", "").handlers(false, true),
            MockEntry::new("RW", "").handlers(true, true),
        ]);
        let tables = FormatTables::load(&mock).unwrap();

        let flags = |name: &str| {
            let f = tables.get(name).unwrap();
            (f.can_read, f.can_write)
        };
        assert_eq!(flags("none"), (false, false));
        assert_eq!(flags("ro"), (true, false));
        assert_eq!(flags("wo"), (false, true));
        assert_eq!(flags("rw"), (true, true));
    }

    #[test]
    fn adjoin_maps_to_supports_frames() {
        let tables = FormatTables::load(&registry()).unwrap();
        assert!(tables.get("gif").unwrap().supports_frames);
        assert!(!tables.get("png").unwrap().supports_frames);
    }

    #[test]
    fn description_decoded_as_latin1() {
        let mut entry = MockEntry::new("X", "");
        entry.description = b"Format fran\xe7ais".to_vec();
        let tables = FormatTables::load(&MockMagick::with_entries(vec![entry])).unwrap();
        assert_eq!(tables.get("x").unwrap().description, "Format français");
    }

    #[test]
    fn select_by_capability() {
        let tables = FormatTables::load(&registry()).unwrap();
        let names = |query: FormatQuery| -> Vec<String> {
            tables.select(query).map(|f| f.name.clone()).collect()
        };

        assert_eq!(names(FormatQuery::default()).len(), 5);
        let readable = FormatQuery {
            readable: true,
            ..FormatQuery::default()
        };
        assert_eq!(names(readable).len(), 5);
        let writable = FormatQuery {
            writable: true,
            ..FormatQuery::default()
        };
        assert_eq!(names(writable), vec!["GIF", "JPEG", "JPG", "PNG"]);
        let all = FormatQuery {
            readable: true,
            writable: true,
            frames: true,
        };
        assert_eq!(names(all), vec!["GIF"]);
    }

    #[test]
    fn case_only_name_collision_keeps_last() {
        let mock = MockMagick::with_entries(vec![
            MockEntry::new("PNG", "Portable Network Graphics").mime("image/png"),
            MockEntry::new("png", "lowercase alias").handlers(true, false),
        ]);
        let tables = FormatTables::load(&mock).unwrap();

        assert_eq!(tables.len(), 1);
        let kept = tables.get("PNG").unwrap();
        assert_eq!(kept.name, "png");
        assert_eq!(kept.description, "lowercase alias");
        assert!(!kept.can_write);
        // The MIME table still holds the entry that declared the type.
        assert_eq!(tables.by_mime_type("image/png").unwrap().name, "PNG");
    }

    #[test]
    fn list_released_after_success() {
        let mock = registry();
        FormatTables::load(&mock).unwrap();
        assert_eq!(mock.lists_acquired(), 1);
        assert_eq!(mock.lists_released(), 1);
        assert_eq!(mock.bad_releases(), 0);
    }

    #[test]
    fn native_failure_surfaces_code_and_releases_once() {
        let mut mock = MockMagick::failing(400, "memory allocation failed");
        mock.entries = registry().entries;
        mock.array_despite_exception = true;

        let err = FormatTables::load(&mock).unwrap_err();

        match err {
            MagickError::Native { code, message, .. } => {
                assert_eq!(code, 400);
                assert_eq!(message, "memory allocation failed");
            }
            other => panic!("expected native error, got {other:?}"),
        }
        assert_eq!(mock.lists_released(), 1);
        assert_eq!(mock.lists_leaked(), 0);
        assert_eq!(mock.bad_releases(), 0);
    }

    #[test]
    fn decode_failure_midway_releases_once() {
        let mock = MockMagick::with_entries(vec![
            MockEntry::new("PNG", "Portable Network Graphics").mime("image/png"),
            MockEntry::new("BAD", "broken").raw_mime(b"image/b\xe4d"),
            MockEntry::new("GIF", "CompuServe graphics interchange format").mime("image/gif"),
        ]);

        let err = FormatTables::load(&mock).unwrap_err();

        assert!(matches!(
            err,
            MagickError::Decode {
                index: 1,
                field: "mime_type",
                ..
            }
        ));
        assert_eq!(mock.lists_released(), 1);
        assert_eq!(mock.lists_leaked(), 0);
    }

    #[test]
    fn empty_registry() {
        let tables = FormatTables::load(&MockMagick::new()).unwrap();
        assert!(tables.is_empty());
        assert!(tables.by_mime_type_table().is_empty());
    }

    #[test]
    fn load_pattern_passes_glob_through() {
        let mock = registry();
        FormatTables::load_pattern(&mock, "JP*").unwrap();
        assert_eq!(*mock.patterns.lock().unwrap(), vec!["JP*".to_string()]);
    }

    #[test]
    fn load_pattern_rejects_nul() {
        let mock = registry();
        assert!(matches!(
            FormatTables::load_pattern(&mock, "a\0b"),
            Err(MagickError::Config(_))
        ));
        assert_eq!(mock.lists_acquired(), 0);
    }

    #[test]
    fn repeated_loads_are_equal() {
        let mock = registry();
        assert_eq!(
            FormatTables::load(&mock).unwrap(),
            FormatTables::load(&mock).unwrap()
        );
        assert_eq!(mock.lists_released(), 2);
    }
}
