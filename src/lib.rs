//! # magick-info
//!
//! Reports what the installed ImageMagick MagickCore library can do: the
//! features it was compiled with, its version, and every image format in its
//! registry. No image is ever decoded or encoded.
//!
//! ```no_run
//! let config = magick_info::config::load_config(None)?;
//! let magick = magick_info::metadata::init(&config)?;
//!
//! println!("MagickCore {}", magick.version());
//! if let Some(png) = magick.formats.get("png") {
//!     println!("PNG readable: {}", png.can_read);
//! }
//! # Ok::<(), magick_info::MagickError>(())
//! ```
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`native`] | [`MagickApi`] trait over the MagickCore calls, runtime-loaded [`NativeMagick`], scoped [`FormatInfoList`] |
//! | [`capabilities`] | Feature set, delegate set, packed version decoding |
//! | [`formats`] | [`ImageFormat`] records and the by-name / by-MIME tables |
//! | [`metadata`] | [`MagickMetadata`] context and the process-wide `OnceLock` |
//! | [`config`] | Library search configuration (`magick-info.toml`) |
//! | [`error`] | [`MagickError`] and decoding of native exception codes |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Runtime Loading
//!
//! MagickCore is opened with `libloading` instead of being linked at build
//! time. Sonames differ by quantum depth, HDRI and major version
//! (`libMagickCore-7.Q16HDRI.so.10`, `libMagickCore-6.Q16.so.7`, ...), so the
//! library to use is a configuration choice rather than a build one. A
//! missing library becomes an ordinary [`MagickError::Library`].
//!
//! ## One Query, Immutable Results
//!
//! Everything is queried once and copied into owned Rust values. Nothing
//! keeps pointers into the library afterwards, so the tables are plain data:
//! `Clone`, `Send`, `Sync`, serializable.
//!
//! ## Scoped Native Memory
//!
//! `GetMagickInfoList` hands back an allocation that must go to
//! `RelinquishMagickMemory`. [`FormatInfoList`] takes ownership before the
//! exception is even inspected, and its `Drop` releases it, so every path
//! (success, native error, decode failure mid-copy) frees it exactly once.
//!
//! ## Handlers As Booleans
//!
//! Decoder and encoder function pointers are never called. They are reduced
//! to `can_read` / `can_write` at the FFI boundary and no pointer-typed
//! field crosses into the public types.

pub mod capabilities;
pub mod config;
pub mod error;
pub mod formats;
pub mod metadata;
pub mod native;
pub mod output;
mod text;

pub use capabilities::{Capabilities, FeatureSet, Version, VersionInfo};
pub use error::{ExceptionKind, ExceptionSeverity, MagickError};
pub use formats::{FormatQuery, FormatTables, ImageFormat};
pub use metadata::MagickMetadata;
pub use native::{FormatInfoList, MagickApi, NativeMagick};
