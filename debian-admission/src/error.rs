// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {std::path::PathBuf, thiserror::Error};

/// Coarse classification of an [AdmissionError].
///
/// Callers use this to decide how to report a failure. Every variant
/// of [AdmissionError] maps to exactly one kind.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    /// Input text does not match the expected token grammar.
    MalformedGrammar,
    /// A required field is absent.
    MissingField,
    /// Declared metadata contradicts itself or the target distribution.
    InconsistentDeclaration,
    /// Content or pool key disagrees with what was declared.
    IntegrityMismatch,
    /// An allocation could not be satisfied.
    ResourceExhaustion,
    /// The pool, index, filesystem or configuration failed.
    DownstreamFailure,
}

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on {0}: {1:?}")]
    IoPath(PathBuf, std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("integer parsing error: {0:?}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("memory allocation failure: {0}")]
    ResourceExhaustion(#[from] std::collections::TryReserveError),

    #[error("control file parse error: {0}")]
    ControlParseError(String),

    #[error("{0} contains no control paragraph")]
    ControlNoParagraph(String),

    #[error("{0} contains more than one control paragraph")]
    ControlMultipleParagraphs(String),

    #[error("malformed files line '{line}': {reason}")]
    FileLine { line: String, reason: String },

    #[error("malformed checksum token '{0}'")]
    ChecksumToken(String),

    #[error("invalid package name '{0}'")]
    InvalidPackageName(String),

    #[error("{0}: invalid file name '{1}'")]
    InvalidFileName(String, String),

    #[error("invalid version '{0}': {1}")]
    InvalidVersion(String, String),

    #[error("{file}: missing required field '{field}'")]
    RequiredFieldMissing { file: String, field: String },

    #[error("{0}: field '{1}' cannot be tolerated when missing")]
    FieldNotOverridable(String, String),

    #[error("{0}: exactly one distribution must be named, got {1}")]
    NotExactlyOneDistribution(String, usize),

    #[error("{0}: section '{1}' is not acceptable")]
    InvalidSection(String, String),

    #[error("{0}: byhand files are not supported")]
    ByHandUnsupported(String),

    #[error("{0}: no section specified")]
    MissingSection(String),

    #[error("{0}: no priority specified")]
    MissingPriority(String),

    #[error("component '{component}' of {file} differs from component '{expected}' of earlier files")]
    ComponentMismatch {
        file: String,
        component: String,
        expected: String,
    },

    #[error("component '{0}' is not part of distribution '{1}'")]
    UnknownComponent(String, String),

    #[error("distribution '{0}' has no components")]
    NoComponents(String),

    #[error("architecture '{1}' of {0} is not declared in the Architecture field")]
    UndeclaredArchitecture(String, String),

    #[error("{0} declares architecture '{1}' but contains no file for it")]
    ArchitectureWithoutFiles(String, String),

    #[error("architecture '{1}' of {0} is not part of distribution '{2}'")]
    ArchitectureNotInDistribution(String, String, String),

    #[error("{0} lists more than one {1} file")]
    DuplicateArtifactKind(String, &'static str),

    #[error("{0} contains both a .tar.gz and an .orig.tar.gz")]
    ConflictingTarballs(String),

    #[error("{0} contains both a .tar.gz and a .diff.gz")]
    TarballWithDiff(String),

    #[error("{0} declares architecture 'source' but contains no .dsc")]
    SourceUploadWithoutDsc(String),

    #[error("{0} contains a .dsc without .diff.gz or tarball")]
    DscWithoutSourceMaterial(String),

    #[error("{0}: .dsc is named '{1}' instead of '{2}'")]
    DscNameMismatch(String, String, String),

    #[error("{0}: source '{1}' does not match '{2}'")]
    SourceMismatch(String, String, String),

    #[error("unknown distribution '{0}'")]
    UnknownDistribution(String),

    #[error("checksum mismatch for {key}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        key: String,
        expected: String,
        actual: String,
    },

    #[error("pool key mismatch: declared '{declared}', calculated '{calculated}'")]
    PoolKeyMismatch {
        declared: String,
        calculated: String,
    },

    #[error("{0}: package lacks a resolved {1}")]
    Unresolved(String, &'static str),

    #[error("{0} is not a binary package: unknown entry '{1}'")]
    DebUnknownEntry(String, String),

    #[error("unknown compression in .deb entry: {0}")]
    DebUnknownCompression(String),

    #[error("{0} has no control file")]
    DebNoControl(String),

    #[error("index error: {0}")]
    Index(String),

    #[error("{0}")]
    Other(String),
}

impl AdmissionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io(_)
            | Self::IoPath(_, _)
            | Self::SerdeYaml(_)
            | Self::UnknownDistribution(_)
            | Self::Index(_)
            | Self::Other(_) => ErrorKind::DownstreamFailure,
            Self::ResourceExhaustion(_) => ErrorKind::ResourceExhaustion,
            Self::ParseInt(_)
            | Self::ControlParseError(_)
            | Self::ControlNoParagraph(_)
            | Self::ControlMultipleParagraphs(_)
            | Self::FileLine { .. }
            | Self::ChecksumToken(_)
            | Self::InvalidPackageName(_)
            | Self::InvalidFileName(_, _)
            | Self::InvalidVersion(_, _)
            | Self::DebUnknownEntry(_, _)
            | Self::DebUnknownCompression(_)
            | Self::DebNoControl(_) => ErrorKind::MalformedGrammar,
            Self::RequiredFieldMissing { .. }
            | Self::FieldNotOverridable(_, _)
            | Self::MissingSection(_)
            | Self::MissingPriority(_)
            | Self::Unresolved(_, _) => ErrorKind::MissingField,
            Self::NotExactlyOneDistribution(_, _)
            | Self::InvalidSection(_, _)
            | Self::ByHandUnsupported(_)
            | Self::ComponentMismatch { .. }
            | Self::UnknownComponent(_, _)
            | Self::NoComponents(_)
            | Self::UndeclaredArchitecture(_, _)
            | Self::ArchitectureWithoutFiles(_, _)
            | Self::ArchitectureNotInDistribution(_, _, _)
            | Self::DuplicateArtifactKind(_, _)
            | Self::ConflictingTarballs(_)
            | Self::TarballWithDiff(_)
            | Self::SourceUploadWithoutDsc(_)
            | Self::DscWithoutSourceMaterial(_)
            | Self::DscNameMismatch(_, _, _)
            | Self::SourceMismatch(_, _, _) => ErrorKind::InconsistentDeclaration,
            Self::ChecksumMismatch { .. } | Self::PoolKeyMismatch { .. } => {
                ErrorKind::IntegrityMismatch
            }
        }
    }

    /// Attach a path to an [std::io::Error].
    pub fn io_path(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::IoPath(path.into(), err)
    }
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, AdmissionError>;
