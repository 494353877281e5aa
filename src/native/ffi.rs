//! MagickCore loaded at runtime through `libloading`.
//!
//! Only the stable prefix of the native structs is described here: the
//! `name` pointer at the head of `MagickInfo`, and the `severity`,
//! `error_number`, `reason`, `description` fields at the head of
//! `ExceptionInfo`. Everything else goes through exported accessors.
//!
//! MagickCore keeps its state per process, not per handle. `MagickCoreGenesis`
//! runs when the first [`NativeMagick`] is loaded and `MagickCoreTerminus`
//! when the last live one is dropped, so instances can overlap freely. All
//! instances are assumed to open the same library. Each library handle
//! outlives its own instance, since the resolved function pointers point
//! into it.

use super::{MagickApi, MagickInfo, NativeException, RawDescriptor};
use crate::config::MagickConfig;
use crate::error::MagickError;
use crate::text;
use libloading::Library;
use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// `MagickBooleanType` is a C enum.
type MagickBoolean = c_int;
const MAGICK_FALSE: MagickBoolean = 0;

type GenesisFn = unsafe extern "C" fn(*const c_char, MagickBoolean);
type TerminusFn = unsafe extern "C" fn();
type StaticStringFn = unsafe extern "C" fn() -> *const c_char;
type SizeQueryFn = unsafe extern "C" fn(*mut usize) -> *const c_char;
type InfoListFn =
    unsafe extern "C" fn(*const c_char, *mut usize, *mut ExceptionInfo) -> *mut *const MagickInfo;
type InfoStringFn = unsafe extern "C" fn(*const MagickInfo) -> *const c_char;
type InfoBooleanFn = unsafe extern "C" fn(*const MagickInfo) -> MagickBoolean;
type InfoHandlerFn = unsafe extern "C" fn(*const MagickInfo) -> *const c_void;
type RelinquishFn = unsafe extern "C" fn(*mut c_void) -> *mut c_void;
type AcquireExceptionFn = unsafe extern "C" fn() -> *mut ExceptionInfo;
type DestroyExceptionFn = unsafe extern "C" fn(*mut ExceptionInfo) -> *mut ExceptionInfo;

/// Leading fields of the native `ExceptionInfo`.
#[repr(C)]
struct ExceptionInfo {
    severity: c_int,
    error_number: c_int,
    reason: *mut c_char,
    description: *mut c_char,
}

/// Leading field of the native `MagickInfo`.
#[repr(C)]
struct MagickInfoHead {
    name: *const c_char,
}

struct Symbols {
    terminus: TerminusFn,
    features: StaticStringFn,
    delegates: StaticStringFn,
    version: SizeQueryFn,
    quantum_depth: SizeQueryFn,
    info_list: InfoListFn,
    description: InfoStringFn,
    mime_type: InfoStringFn,
    adjoin: InfoBooleanFn,
    decoder: InfoHandlerFn,
    encoder: InfoHandlerFn,
    relinquish: RelinquishFn,
    acquire_exception: AcquireExceptionFn,
    destroy_exception: DestroyExceptionFn,
}

/// Live [`NativeMagick`] instances in this process.
static CORE_USERS: CoreUsers = CoreUsers::new();

/// Counts users of the process-global core. `start` runs on the first
/// `enter`, `stop` on the matching last `leave`, both under the lock.
struct CoreUsers(Mutex<usize>);

impl CoreUsers {
    const fn new() -> Self {
        Self(Mutex::new(0))
    }

    fn enter(&self, start: impl FnOnce()) {
        let mut users = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if *users == 0 {
            start();
        }
        *users += 1;
    }

    fn leave(&self, stop: impl FnOnce()) {
        let mut users = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        match *users {
            0 => log::warn!("MagickCore released more often than it was initialised"),
            1 => {
                *users = 0;
                stop();
            }
            _ => *users -= 1,
        }
    }
}

/// Resolve `name` and copy the function pointer out of the library.
///
/// # Safety
///
/// `T` must match the exported symbol's signature.
unsafe fn symbol<T: Copy>(library: &Library, name: &'static str) -> Result<T, MagickError> {
    // SAFETY: forwarded to the caller.
    let sym = unsafe { library.get::<T>(name.as_bytes()) }
        .map_err(|source| MagickError::Symbol { symbol: name, source })?;
    log::trace!("resolved {name}");
    Ok(*sym)
}

impl Symbols {
    fn resolve(library: &Library) -> Result<(Self, GenesisFn), MagickError> {
        // SAFETY: signatures follow MagickCore/magick.h, version.h, memory_.h and exception.h.
        unsafe {
            let genesis = symbol::<GenesisFn>(library, "MagickCoreGenesis")?;
            let symbols = Self {
                terminus: symbol(library, "MagickCoreTerminus")?,
                features: symbol(library, "GetMagickFeatures")?,
                delegates: symbol(library, "GetMagickDelegates")?,
                version: symbol(library, "GetMagickVersion")?,
                quantum_depth: symbol(library, "GetMagickQuantumDepth")?,
                info_list: symbol(library, "GetMagickInfoList")?,
                description: symbol(library, "GetMagickDescription")?,
                mime_type: symbol(library, "GetMagickMimeType")?,
                adjoin: symbol(library, "GetMagickAdjoin")?,
                decoder: symbol(library, "GetImageDecoder")?,
                encoder: symbol(library, "GetImageEncoder")?,
                relinquish: symbol(library, "RelinquishMagickMemory")?,
                acquire_exception: symbol(library, "AcquireExceptionInfo")?,
                destroy_exception: symbol(library, "DestroyExceptionInfo")?,
            };
            Ok((symbols, genesis))
        }
    }
}

/// A live MagickCore instance.
pub struct NativeMagick {
    symbols: Symbols,
    path: PathBuf,
    // Dropped after `Drop::drop`, which may still call `MagickCoreTerminus`.
    _library: Library,
}

impl NativeMagick {
    /// Open the first loadable library among the configured candidates and
    /// initialise MagickCore.
    pub fn load(config: &MagickConfig) -> Result<Self, MagickError> {
        let client_name = CString::new(config.client_name.as_str())
            .map_err(|e| crate::config::ConfigError::Validation(e.to_string()))?;
        let candidates = config.library_candidates();
        let mut last_reason = String::from("no candidates configured");

        for candidate in &candidates {
            // SAFETY: loading MagickCore runs its ELF constructors, which only set up
            // internal state.
            let library = match unsafe { Library::new(candidate) } {
                Ok(library) => library,
                Err(e) => {
                    log::debug!("{} not loadable: {e}", candidate.display());
                    last_reason = e.to_string();
                    continue;
                }
            };
            log::debug!("loaded {}", candidate.display());

            let (symbols, genesis) = match Symbols::resolve(&library) {
                Ok(resolved) => resolved,
                Err(e) => {
                    log::debug!("{} is not a usable MagickCore: {e}", candidate.display());
                    last_reason = format!("{}: {e}", candidate.display());
                    continue;
                }
            };
            CORE_USERS.enter(|| {
                log::debug!("initialising MagickCore");
                // SAFETY: `client_name` is a valid C string for the duration of the call.
                unsafe { genesis(client_name.as_ptr(), MAGICK_FALSE) };
            });

            return Ok(Self {
                symbols,
                path: candidate.clone(),
                _library: library,
            });
        }

        Err(MagickError::Library {
            tried: candidates.iter().map(|p| p.display().to_string()).collect(),
            reason: last_reason,
        })
    }

    /// Library path or soname that was opened.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for NativeMagick {
    fn drop(&mut self) {
        let terminus = self.symbols.terminus;
        CORE_USERS.leave(|| {
            log::debug!("terminating MagickCore");
            // SAFETY: the last live instance; paired with the first `MagickCoreGenesis`.
            unsafe { terminus() };
        });
    }
}

/// Copy a possibly-null, library-owned C string.
///
/// # Safety
///
/// `ptr` must be null or a valid NUL-terminated string.
unsafe fn owned_bytes(ptr: *const c_char) -> Vec<u8> {
    if ptr.is_null() {
        Vec::new()
    } else {
        // SAFETY: forwarded to the caller.
        unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec()
    }
}

/// Borrow a possibly-null C string for an unbounded lifetime.
///
/// # Safety
///
/// `ptr` must be null or valid for `'a`.
unsafe fn borrowed_bytes<'a>(ptr: *const c_char) -> Option<&'a [u8]> {
    if ptr.is_null() {
        None
    } else {
        // SAFETY: forwarded to the caller.
        Some(unsafe { CStr::from_ptr(ptr) }.to_bytes())
    }
}

/// Destroys a native `ExceptionInfo` when it goes out of scope.
struct ExceptionGuard {
    ptr: *mut ExceptionInfo,
    destroy: DestroyExceptionFn,
}

impl ExceptionGuard {
    fn copy_out(&self) -> NativeException {
        // SAFETY: `ptr` is a live ExceptionInfo from AcquireExceptionInfo.
        let info = unsafe { &*self.ptr };
        let severity = u32::try_from(info.severity).unwrap_or(0);
        // SAFETY: reason/description are null or NUL-terminated strings owned by `info`.
        let (reason, description) = unsafe {
            (
                borrowed_bytes(info.reason).map(text::latin1),
                borrowed_bytes(info.description).map(text::latin1),
            )
        };
        if info.error_number != 0 {
            log::debug!("MagickCore errno {} with severity {severity}", info.error_number);
        }
        NativeException {
            severity,
            reason,
            description,
        }
    }
}

impl Drop for ExceptionGuard {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from AcquireExceptionInfo and is destroyed only here.
        unsafe { (self.destroy)(self.ptr) };
    }
}

impl MagickApi for NativeMagick {
    fn features(&self) -> Vec<u8> {
        // SAFETY: returns a pointer to a static string.
        unsafe { owned_bytes((self.symbols.features)()) }
    }

    fn delegates(&self) -> Vec<u8> {
        // SAFETY: returns a pointer to a static string.
        unsafe { owned_bytes((self.symbols.delegates)()) }
    }

    fn version_number(&self) -> usize {
        let mut number = 0usize;
        // SAFETY: writes one size_t through the pointer.
        unsafe { (self.symbols.version)(&mut number) };
        number
    }

    fn version_text(&self) -> Vec<u8> {
        // SAFETY: a null out-pointer is accepted; returns a static string.
        unsafe { owned_bytes((self.symbols.version)(std::ptr::null_mut())) }
    }

    fn quantum_depth(&self) -> usize {
        let mut depth = 0usize;
        // SAFETY: writes one size_t through the pointer.
        unsafe { (self.symbols.quantum_depth)(&mut depth) };
        depth
    }

    unsafe fn format_info_list(
        &self,
        pattern: &CStr,
        count: &mut usize,
        exception: &mut NativeException,
    ) -> *mut *const MagickInfo {
        // SAFETY: no preconditions.
        let raw_exception = unsafe { (self.symbols.acquire_exception)() };
        if raw_exception.is_null() {
            *exception = NativeException {
                severity: 700,
                reason: Some("unable to acquire ExceptionInfo".to_string()),
                description: None,
            };
            return std::ptr::null_mut();
        }
        let guard = ExceptionGuard {
            ptr: raw_exception,
            destroy: self.symbols.destroy_exception,
        };
        // SAFETY: `pattern` is a valid C string and `count` a valid size_t slot.
        let list = unsafe { (self.symbols.info_list)(pattern.as_ptr(), count, guard.ptr) };
        *exception = guard.copy_out();
        list
    }

    unsafe fn read_descriptor<'a>(&self, info: *const MagickInfo) -> RawDescriptor<'a> {
        let symbols = &self.symbols;
        // SAFETY: `info` is a live MagickInfo per the trait contract; its strings live
        // in the registry for at least as long as the list does.
        unsafe {
            let head = &*(info as *const MagickInfoHead);
            RawDescriptor {
                name: borrowed_bytes(head.name).unwrap_or_default(),
                description: borrowed_bytes((symbols.description)(info)).unwrap_or_default(),
                mime_type: borrowed_bytes((symbols.mime_type)(info)),
                has_decoder: !(symbols.decoder)(info).is_null(),
                has_encoder: !(symbols.encoder)(info).is_null(),
                adjoin: (symbols.adjoin)(info) != MAGICK_FALSE,
            }
        }
    }

    unsafe fn relinquish(&self, ptr: *mut c_void) {
        // SAFETY: forwarded to the caller.
        unsafe { (self.symbols.relinquish)(ptr) };
    }
}
