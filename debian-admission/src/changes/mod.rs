// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Upload descriptors (`.changes` files).

A `.changes` file describes an upload: a source package and/or binary
packages built from it, together with every file making up the upload.

Admitting one takes three steps before anything is written:

1. [ChangesFile::read] parses the file and requires its fields.
2. [ChangesFile::fix_fields] resolves section, priority and component.
3. [ChangesFile::check] cross checks the files against the declarations.

[ChangesFile::include_files] then copies every file into the pool.
*/

pub mod file_line;

use {
    crate::{
        component::ComponentGuesser,
        config::Distribution,
        control::ControlParagraph,
        error::{AdmissionError, Result},
        names::{check_package_name, source_basename, PoolLayout},
        package_version::PackageVersion,
        policy::{FieldRequirement, ForcePolicy, Overrides, CHANGES_FIELDS},
        pool::{Pool, PoolAdmission},
        signed::read_signed_paragraph,
    },
    file_line::{ArtifactType, FileReference},
    slog::{warn, Logger},
    std::path::{Path, PathBuf},
};

/// A parsed `.changes` file.
#[derive(Clone, Debug)]
pub struct ChangesFile {
    path: PathBuf,
    pub source: String,
    pub version: PackageVersion,
    pub distributions: Vec<String>,
    pub architectures: Vec<String>,
    pub binaries: Vec<String>,
    pub files: Vec<FileReference>,
    pub control: ControlParagraph<'static>,
    /// Resolved by [Self::fix_fields].
    pub component: Option<String>,
    /// Pool directory of the source package. Resolved by [Self::fix_fields].
    pub directory: Option<String>,
}

impl ChangesFile {
    /// Read a possibly signed `.changes` file.
    pub fn read(logger: &Logger, path: &Path, force: &ForcePolicy) -> Result<Self> {
        let control = read_signed_paragraph(logger, path)?;

        Self::from_paragraph(logger, path, control, force)
    }

    /// Construct an instance from the control paragraph of the `.changes` file at `path`.
    ///
    /// Referenced files are looked up next to `path`.
    pub fn from_paragraph(
        logger: &Logger,
        path: &Path,
        control: ControlParagraph<'static>,
        force: &ForcePolicy,
    ) -> Result<Self> {
        let name = path.display().to_string();

        for (field, requirement) in CHANGES_FIELDS {
            if control.has_field(field) {
                continue;
            }

            if *requirement == FieldRequirement::Overridable && force.tolerates_missing(field) {
                warn!(logger, "{}: ignoring missing '{}' field", name, field);
            } else {
                return Err(AdmissionError::RequiredFieldMissing {
                    file: name,
                    field: field.to_string(),
                });
            }
        }

        let words = |field: &str| -> Vec<String> {
            control
                .field_words(field)
                .unwrap_or_default()
                .into_iter()
                .map(|s| s.to_string())
                .collect()
        };

        let source = words("Source").into_iter().next().ok_or_else(|| {
            AdmissionError::RequiredFieldMissing {
                file: name.clone(),
                field: "Source".into(),
            }
        })?;
        check_package_name(&source)?;

        let version = PackageVersion::parse(control.field_str("Version").unwrap_or("").trim())?;

        let files = control
            .field_lines("Files")
            .unwrap_or_default()
            .into_iter()
            .map(FileReference::parse)
            .collect::<Result<Vec<_>>>()?;

        if files.is_empty() {
            return Err(AdmissionError::RequiredFieldMissing {
                file: name,
                field: "Files".into(),
            });
        }

        for file in files
            .iter()
            .filter(|f| f.artifact_type == ArtifactType::Unknown)
        {
            warn!(
                logger,
                "{}: unknown file type of '{}', assuming it is part of the source",
                name,
                file.basename
            );
        }

        let distributions = words("Distribution");
        let architectures = words("Architecture");
        let binaries = words("Binary");

        Ok(Self {
            path: path.to_path_buf(),
            source,
            version,
            distributions,
            architectures,
            binaries,
            files,
            control,
            component: None,
            directory: None,
        })
    }

    /// Path of the `.changes` file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn name(&self) -> String {
        self.path.display().to_string()
    }

    /// Resolve section, priority and component of every file.
    ///
    /// All files must resolve to the same component. The pool directory of the
    /// upload is derived from it.
    pub fn fix_fields(
        &mut self,
        distribution: &Distribution,
        guesser: &dyn ComponentGuesser,
        overrides: &Overrides,
    ) -> Result<()> {
        let name = self.name();
        let mut component: Option<String> = None;

        for file in self.files.iter_mut() {
            if let Some(section) = &overrides.section {
                file.section = section.clone();
            }

            match file.section.as_str() {
                "unknown" => {
                    return Err(AdmissionError::InvalidSection(
                        name,
                        file.section.clone(),
                    ))
                }
                "byhand" => return Err(AdmissionError::ByHandUnsupported(file.basename.clone())),
                "-" => return Err(AdmissionError::MissingSection(name)),
                _ => {}
            }

            if let Some(priority) = &overrides.priority {
                file.priority = priority.clone();
            }

            if file.priority == "-" {
                return Err(AdmissionError::MissingPriority(name));
            }

            let guessed = guesser.guess(
                &distribution.codename,
                &distribution.components,
                &self.source,
                &file.section,
                overrides.component.as_deref(),
            )?;

            match &component {
                Some(expected) if expected != &guessed => {
                    return Err(AdmissionError::ComponentMismatch {
                        file: file.basename.clone(),
                        component: guessed,
                        expected: expected.clone(),
                    });
                }
                Some(_) => {}
                None => component = Some(guessed),
            }
        }

        let component = component.ok_or_else(|| AdmissionError::RequiredFieldMissing {
            file: name,
            field: "Files".into(),
        })?;

        self.directory = Some(PoolLayout::default().source_directory(&component, &self.source));
        self.component = Some(component);

        Ok(())
    }

    /// Cross check the declared architectures and the kinds of files.
    pub fn check(&self, logger: &Logger) -> Result<()> {
        let name = self.name();

        let mut architecture_errors = vec![];

        for architecture in &self.architectures {
            if !self.files.iter().any(|f| &f.architecture == architecture) {
                architecture_errors.push(AdmissionError::ArchitectureWithoutFiles(
                    name.clone(),
                    architecture.clone(),
                ));
            }
        }

        for file in &self.files {
            if !self.architectures.contains(&file.architecture) {
                architecture_errors.push(AdmissionError::UndeclaredArchitecture(
                    file.basename.clone(),
                    file.architecture.clone(),
                ));
            }
        }

        for err in &architecture_errors {
            warn!(logger, "{}", err);
        }
        if let Some(first) = architecture_errors.into_iter().next() {
            return Err(first);
        }

        let count = |kind: ArtifactType| self.files.iter().filter(|f| f.artifact_type == kind).count();

        for kind in [
            ArtifactType::SourceControl,
            ArtifactType::SourceDiff,
            ArtifactType::SourceOriginalTarball,
            ArtifactType::SourceTarball,
        ] {
            if count(kind) > 1 {
                return Err(AdmissionError::DuplicateArtifactKind(name, kind.into()));
            }
        }

        let has_dsc = count(ArtifactType::SourceControl) > 0;
        let has_diff = count(ArtifactType::SourceDiff) > 0;
        let has_orig = count(ArtifactType::SourceOriginalTarball) > 0;
        let has_tar = count(ArtifactType::SourceTarball) > 0;

        if let Some(dsc) = self
            .files
            .iter()
            .find(|f| f.artifact_type == ArtifactType::SourceControl)
        {
            let expected = source_basename(&self.source, &self.version);
            if dsc.basename != expected {
                return Err(AdmissionError::DscNameMismatch(
                    name,
                    dsc.basename.clone(),
                    expected,
                ));
            }
        }

        if has_tar && has_orig {
            return Err(AdmissionError::ConflictingTarballs(name));
        }
        if has_tar && has_diff {
            return Err(AdmissionError::TarballWithDiff(name));
        }
        if self.architectures.iter().any(|a| a == "source") && !has_dsc {
            return Err(AdmissionError::SourceUploadWithoutDsc(name));
        }
        if has_dsc && !has_diff && !has_tar {
            return Err(AdmissionError::DscWithoutSourceMaterial(name));
        }

        Ok(())
    }

    /// Copy every referenced file into the pool directory of the upload.
    ///
    /// Files are looked up in the directory of the `.changes` file. Returns the
    /// pool key of every file and whether it was newly added.
    pub fn include_files(&mut self, pool: &dyn Pool) -> Result<Vec<(String, PoolAdmission)>> {
        let directory = self
            .directory
            .clone()
            .ok_or_else(|| AdmissionError::Unresolved(self.name(), "pool directory"))?;

        let source_dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut admissions = Vec::with_capacity(self.files.len());

        for file in self.files.iter_mut() {
            let key = format!("{}/{}", directory, file.basename);

            let admission = pool.admit(&source_dir, &file.basename, &key, &file.checksum)?;

            file.pool_key = Some(key.clone());
            admissions.push((key, admission));
        }

        Ok(admissions)
    }
}
