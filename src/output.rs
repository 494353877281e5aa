//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Features
//!
//! ```text
//! Features: Cipher DPC HDRI OpenMP
//!     OpenMP: yes
//!     OpenCL: no
//!     HDRI: yes
//! Delegates: bzlib jng jpeg png zlib
//! ```
//!
//! ## Version
//!
//! ```text
//! Version: 7.1.1
//!     ImageMagick 7.1.1-29 Q16-HDRI x86_64
//!     Quantum depth: Q16
//! ```
//!
//! ## Formats
//!
//! The mode column follows `magick -list format`: `r` readable, `w`
//! writable, `+` multi-frame, `-` for each missing capability.
//!
//! ```text
//! GIF  rw+  image/gif  CompuServe graphics interchange format
//! PNG  rw-  image/png  Portable Network Graphics
//! XC   r--             Constant image uniform color
//!
//! 3 formats (3 readable, 2 writable)
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::capabilities::{Capabilities, FeatureSet};
use crate::formats::ImageFormat;

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

fn join_set(set: &FeatureSet) -> String {
    if set.is_empty() {
        "(none)".to_string()
    } else {
        set.iter().collect::<Vec<_>>().join(" ")
    }
}

/// `magick -list format` style capability column.
fn mode(format: &ImageFormat) -> String {
    [
        if format.can_read { 'r' } else { '-' },
        if format.can_write { 'w' } else { '-' },
        if format.supports_frames { '+' } else { '-' },
    ]
    .iter()
    .collect()
}

pub fn format_features(caps: &Capabilities) -> Vec<String> {
    vec![
        format!("Features: {}", join_set(&caps.features)),
        format!("    OpenMP: {}", yes_no(caps.features.has_openmp())),
        format!("    OpenCL: {}", yes_no(caps.features.has_opencl())),
        format!("    HDRI: {}", yes_no(caps.features.has_hdri())),
        format!("Delegates: {}", join_set(&caps.delegates)),
    ]
}

pub fn print_features(caps: &Capabilities) {
    for line in format_features(caps) {
        println!("{}", line);
    }
}

pub fn format_version(caps: &Capabilities) -> Vec<String> {
    let mut lines = vec![format!("Version: {}", caps.version)];
    if !caps.version_text.is_empty() {
        lines.push(format!("    {}", caps.version_text));
    }
    lines.push(format!("    Quantum depth: Q{}", caps.quantum_depth));
    lines
}

pub fn print_version(caps: &Capabilities) {
    for line in format_version(caps) {
        println!("{}", line);
    }
}

/// One aligned row per format, then a summary line.
pub fn format_format_list<'a>(formats: impl IntoIterator<Item = &'a ImageFormat>) -> Vec<String> {
    let formats: Vec<&ImageFormat> = formats.into_iter().collect();
    if formats.is_empty() {
        return vec!["No matching formats".to_string()];
    }

    let name_width = formats.iter().map(|f| f.name.len()).max().unwrap_or(0);
    let mime_width = formats
        .iter()
        .filter_map(|f| f.mime_type.as_deref().map(str::len))
        .max()
        .unwrap_or(0);

    let mut lines: Vec<String> = formats
        .iter()
        .map(|f| {
            let row = format!(
                "{:<name_width$}  {}  {:<mime_width$}  {}",
                f.name,
                mode(f),
                f.mime_type.as_deref().unwrap_or(""),
                f.description,
            );
            row.trim_end().to_string()
        })
        .collect();

    let readable = formats.iter().filter(|f| f.can_read).count();
    let writable = formats.iter().filter(|f| f.can_write).count();
    lines.push(String::new());
    lines.push(format!(
        "{} format{} ({} readable, {} writable)",
        formats.len(),
        if formats.len() == 1 { "" } else { "s" },
        readable,
        writable
    ));
    lines
}

pub fn print_format_list<'a>(formats: impl IntoIterator<Item = &'a ImageFormat>) {
    for line in format_format_list(formats) {
        println!("{}", line);
    }
}

pub fn format_format_detail(format: &ImageFormat) -> Vec<String> {
    vec![
        format.name.clone(),
        format!("    Description: {}", format.description),
        format!("    Read: {}", yes_no(format.can_read)),
        format!("    Write: {}", yes_no(format.can_write)),
        format!("    Multi-frame: {}", yes_no(format.supports_frames)),
        format!(
            "    MIME type: {}",
            format.mime_type.as_deref().unwrap_or("(none)")
        ),
    ]
}

pub fn print_format_detail(format: &ImageFormat) {
    for line in format_format_detail(format) {
        println!("{}", line);
    }
}
