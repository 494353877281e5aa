//! Error types shared across the crate.
//!
//! MagickCore reports failures through an `ExceptionInfo` record whose
//! `severity` field is an `ExceptionType` code. The hundreds digit gives the
//! severity class (3xx warning, 4xx–6xx error, 7xx+ fatal) and the remainder
//! gives the subsystem, so a single integer carries both the kind and the
//! severity. [`ExceptionKind`] and [`ExceptionSeverity`] decode it.

use crate::config::ConfigError;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MagickError {
    #[error("Could not load MagickCore (tried {}): {reason}", .tried.join(", "))]
    Library { tried: Vec<String>, reason: String },
    #[error("Missing MagickCore symbol `{symbol}`: {source}")]
    Symbol {
        symbol: &'static str,
        #[source]
        source: libloading::Error,
    },
    #[error("{severity} {kind} ({code}): {message}")]
    Native {
        code: u32,
        kind: ExceptionKind,
        severity: ExceptionSeverity,
        message: String,
    },
    #[error("Format entry {index}: {field} is not valid {encoding}")]
    Decode {
        index: usize,
        field: &'static str,
        encoding: &'static str,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MagickError {
    /// Build a [`MagickError::Native`] from a raw `ExceptionType` code.
    pub fn native(code: u32, message: impl Into<String>) -> Self {
        MagickError::Native {
            code,
            kind: ExceptionKind::from_code(code),
            severity: ExceptionSeverity::from_code(code),
            message: message.into(),
        }
    }

    /// The native `ExceptionType` code, if this error came from MagickCore.
    pub fn native_code(&self) -> Option<u32> {
        match self {
            MagickError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Severity class of an `ExceptionType` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExceptionSeverity {
    Undefined,
    Warning,
    Error,
    Fatal,
}

impl ExceptionSeverity {
    pub fn from_code(code: u32) -> Self {
        match code {
            0..300 => ExceptionSeverity::Undefined,
            300..400 => ExceptionSeverity::Warning,
            400..700 => ExceptionSeverity::Error,
            _ => ExceptionSeverity::Fatal,
        }
    }
}

impl fmt::Display for ExceptionSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExceptionSeverity::Undefined => "undefined",
            ExceptionSeverity::Warning => "warning",
            ExceptionSeverity::Error => "error",
            ExceptionSeverity::Fatal => "fatal error",
        };
        f.write_str(label)
    }
}

/// Subsystem that raised an exception, independent of severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    ResourceLimit,
    Type,
    Option,
    Delegate,
    MissingDelegate,
    CorruptImage,
    FileOpen,
    Blob,
    Stream,
    Cache,
    Coder,
    Filter,
    Module,
    Draw,
    Image,
    Wand,
    Random,
    XServer,
    Monitor,
    Registry,
    Configure,
    Policy,
    Unknown,
}

impl ExceptionKind {
    pub fn from_code(code: u32) -> Self {
        if code < 300 {
            return ExceptionKind::Unknown;
        }
        match code % 100 {
            0 => ExceptionKind::ResourceLimit,
            5 => ExceptionKind::Type,
            10 => ExceptionKind::Option,
            15 => ExceptionKind::Delegate,
            20 => ExceptionKind::MissingDelegate,
            25 => ExceptionKind::CorruptImage,
            30 => ExceptionKind::FileOpen,
            35 => ExceptionKind::Blob,
            40 => ExceptionKind::Stream,
            45 => ExceptionKind::Cache,
            50 => ExceptionKind::Coder,
            52 => ExceptionKind::Filter,
            55 => ExceptionKind::Module,
            60 => ExceptionKind::Draw,
            65 => ExceptionKind::Image,
            70 => ExceptionKind::Wand,
            75 => ExceptionKind::Random,
            80 => ExceptionKind::XServer,
            85 => ExceptionKind::Monitor,
            90 => ExceptionKind::Registry,
            95 => ExceptionKind::Configure,
            99 => ExceptionKind::Policy,
            _ => ExceptionKind::Unknown,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExceptionKind::ResourceLimit => "ResourceLimit",
            ExceptionKind::Type => "Type",
            ExceptionKind::Option => "Option",
            ExceptionKind::Delegate => "Delegate",
            ExceptionKind::MissingDelegate => "MissingDelegate",
            ExceptionKind::CorruptImage => "CorruptImage",
            ExceptionKind::FileOpen => "FileOpen",
            ExceptionKind::Blob => "Blob",
            ExceptionKind::Stream => "Stream",
            ExceptionKind::Cache => "Cache",
            ExceptionKind::Coder => "Coder",
            ExceptionKind::Filter => "Filter",
            ExceptionKind::Module => "Module",
            ExceptionKind::Draw => "Draw",
            ExceptionKind::Image => "Image",
            ExceptionKind::Wand => "Wand",
            ExceptionKind::Random => "Random",
            ExceptionKind::XServer => "XServer",
            ExceptionKind::Monitor => "Monitor",
            ExceptionKind::Registry => "Registry",
            ExceptionKind::Configure => "Configure",
            ExceptionKind::Policy => "Policy",
            ExceptionKind::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}
