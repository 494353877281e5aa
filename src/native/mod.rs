//! The MagickCore introspection seam.
//!
//! The [`MagickApi`] trait mirrors the handful of MagickCore calls this crate
//! needs, one method per native function:
//!
//! | Method | MagickCore |
//! |---|---|
//! | `features` | `GetMagickFeatures` |
//! | `delegates` | `GetMagickDelegates` |
//! | `version_number` / `version_text` | `GetMagickVersion` |
//! | `quantum_depth` | `GetMagickQuantumDepth` |
//! | `format_info_list` | `GetMagickInfoList` |
//! | `read_descriptor` | `MagickInfo` fields, `GetImageDecoder`, `GetImageEncoder`, `GetMagickAdjoin`, `GetMagickMimeType` |
//! | `relinquish` | `RelinquishMagickMemory` |
//!
//! The production implementation is [`NativeMagick`], which opens the shared
//! library at runtime. Tests use `tests::MockMagick`.
//!
//! Ownership of the array returned by `format_info_list` is taken by
//! [`FormatInfoList`], which hands it back to `relinquish` exactly once.

mod ffi;
mod list;

pub use ffi::NativeMagick;
pub use list::FormatInfoList;

use crate::error::{ExceptionSeverity, MagickError};
use std::ffi::{CStr, c_void};

/// Opaque native `MagickInfo` record. Only ever handled behind a pointer.
#[repr(C)]
pub struct MagickInfo {
    _private: [u8; 0],
}

/// Host-side copy of a native `ExceptionInfo` after a call returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeException {
    /// Raw `ExceptionType` code; `0` means nothing was reported.
    pub severity: u32,
    pub reason: Option<String>,
    pub description: Option<String>,
}

impl NativeException {
    /// Turn an error-class exception into a [`MagickError::Native`].
    ///
    /// Warnings are logged and let through.
    pub fn check(&self) -> Result<(), MagickError> {
        match ExceptionSeverity::from_code(self.severity) {
            ExceptionSeverity::Undefined => Ok(()),
            ExceptionSeverity::Warning => {
                log::warn!("MagickCore warning ({}): {}", self.severity, self.message());
                Ok(())
            }
            ExceptionSeverity::Error | ExceptionSeverity::Fatal => {
                Err(MagickError::native(self.severity, self.message()))
            }
        }
    }

    /// `reason (description)`, the way MagickCore prints exceptions.
    pub fn message(&self) -> String {
        match (&self.reason, &self.description) {
            (Some(reason), Some(desc)) if !desc.is_empty() => format!("{reason} ({desc})"),
            (Some(reason), _) => reason.clone(),
            (None, Some(desc)) => desc.clone(),
            (None, None) => "unknown MagickCore exception".to_string(),
        }
    }
}

/// One format record as seen through the native accessors.
///
/// Strings are borrowed, undecoded bytes. Handler function pointers are
/// reduced to whether they are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawDescriptor<'a> {
    pub name: &'a [u8],
    pub description: &'a [u8],
    pub mime_type: Option<&'a [u8]>,
    pub has_decoder: bool,
    pub has_encoder: bool,
    pub adjoin: bool,
}

/// The MagickCore introspection calls.
///
/// Every implementation must be safe to query repeatedly; none of these calls
/// mutate the library's registry.
pub trait MagickApi {
    /// Raw bytes of the space-separated feature list.
    fn features(&self) -> Vec<u8>;

    /// Raw bytes of the space-separated delegate library list.
    fn delegates(&self) -> Vec<u8>;

    /// Packed version integer, `0xABC` for version A.B.C.
    fn version_number(&self) -> usize;

    /// Human-readable version banner.
    fn version_text(&self) -> Vec<u8>;

    /// Bits per pixel channel the library was compiled with.
    fn quantum_depth(&self) -> usize;

    /// List every format matching `pattern`.
    ///
    /// Writes the number of entries through `count` and any failure through
    /// `exception`. On failure the return value is usually null.
    ///
    /// # Safety
    ///
    /// A non-null return is an owned allocation that must be passed to
    /// [`relinquish`](Self::relinquish) exactly once. Prefer
    /// [`FormatInfoList::acquire`], which does this on drop.
    unsafe fn format_info_list(
        &self,
        pattern: &CStr,
        count: &mut usize,
        exception: &mut NativeException,
    ) -> *mut *const MagickInfo;

    /// Project one native record.
    ///
    /// # Safety
    ///
    /// `info` must be a non-null entry of a list returned by
    /// [`format_info_list`](Self::format_info_list) that has not been
    /// relinquished, and the returned descriptor must not outlive that list.
    unsafe fn read_descriptor<'a>(&self, info: *const MagickInfo) -> RawDescriptor<'a>;

    /// Free memory returned by [`format_info_list`](Self::format_info_list).
    ///
    /// # Safety
    ///
    /// `ptr` must have come from this implementation and must not be used
    /// afterwards.
    unsafe fn relinquish(&self, ptr: *mut c_void);
}
