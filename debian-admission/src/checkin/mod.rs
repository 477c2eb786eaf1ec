// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Admission of uploads and packages into a distribution.

[Admitter] ties together the pool, the package index and the collaborators
deciding placement. [Admitter::admit_upload] admits everything a `.changes`
file references. [Admitter::admit_binary] admits a lone `.deb` or `.udeb`.

Nothing is rolled back on failure. Files already copied stay in the pool
(re-admitting identical content is a no-op) and packages already registered
stay registered.
*/

pub mod binary;
pub mod source;

use {
    crate::{
        changes::{file_line::ArtifactType, ChangesFile},
        checksum::ChecksumToken,
        component::{ComponentGuesser, SectionComponentGuesser},
        config::Distribution,
        deb::{ControlExtractor, DebControlExtractor},
        error::{AdmissionError, Result},
        index::{IndexRecord, PackageIndex, PackageKind},
        policy::{ForcePolicy, Overrides},
        pool::{Pool, PoolAdmission},
    },
    binary::BinaryArtifact,
    slog::{info, warn, Logger},
    source::{DscAdmission, SourceAdmission, SourcePlacement},
    std::path::{Path, PathBuf},
};

/// A package registered into an index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Registration {
    pub package: String,
    pub version: String,
    pub architecture: String,
    pub kind: PackageKind,
    pub component: String,
    /// Primary pool key of the package.
    pub file_key: String,
}

/// Outcome of admitting a `.changes` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AdmissionReport {
    pub source: String,
    pub version: String,
    pub component: String,
    /// Pool key of every referenced file, in `.changes` order.
    pub files: Vec<(String, PoolAdmission)>,
    pub registrations: Vec<Registration>,
}

/// Placement of a binary package decided before its file is read.
///
/// Set fields take precedence over the package's own metadata.
#[derive(Clone, Debug, Default)]
pub struct BinaryPlacement {
    pub component: Option<String>,
    pub section: Option<String>,
    pub priority: Option<String>,
    /// Pool key the file was already admitted under.
    pub pool_key: Option<String>,
    /// Checksum the file was admitted with.
    pub checksum: Option<ChecksumToken>,
}

impl From<&Overrides> for BinaryPlacement {
    fn from(overrides: &Overrides) -> Self {
        Self {
            component: overrides.component.clone(),
            section: overrides.section.clone(),
            priority: overrides.priority.clone(),
            pool_key: None,
            checksum: None,
        }
    }
}

/// Admits uploads and packages into a repository.
pub struct Admitter<'a> {
    logger: Logger,
    pool: &'a dyn Pool,
    index: &'a dyn PackageIndex,
    guesser: &'a dyn ComponentGuesser,
    extractor: &'a dyn ControlExtractor,
    sources: &'a dyn SourceAdmission,
    force: ForcePolicy,
    overrides: Overrides,
}

impl<'a> Admitter<'a> {
    /// Construct an instance using the default collaborators and a strict policy.
    pub fn new(logger: Logger, pool: &'a dyn Pool, index: &'a dyn PackageIndex) -> Self {
        Self {
            logger,
            pool,
            index,
            guesser: &SectionComponentGuesser,
            extractor: &DebControlExtractor,
            sources: &DscAdmission,
            force: ForcePolicy::strict(),
            overrides: Overrides::default(),
        }
    }

    /// Set the [ComponentGuesser] to use.
    pub fn with_guesser(mut self, guesser: &'a dyn ComponentGuesser) -> Self {
        self.guesser = guesser;
        self
    }

    /// Set the [ControlExtractor] to read binary packages with.
    pub fn with_extractor(mut self, extractor: &'a dyn ControlExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set the [SourceAdmission] to admit `.dsc` files with.
    pub fn with_source_admission(mut self, sources: &'a dyn SourceAdmission) -> Self {
        self.sources = sources;
        self
    }

    /// Set the [ForcePolicy].
    pub fn with_force(mut self, force: ForcePolicy) -> Self {
        self.force = force;
        self
    }

    /// Set component, section and priority overrides.
    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Admit a `.changes` file and everything it references.
    pub fn admit_upload(
        &self,
        distribution: &Distribution,
        changes_path: &Path,
    ) -> Result<AdmissionReport> {
        let mut changes = ChangesFile::read(&self.logger, changes_path, &self.force)?;
        let name = changes_path.display().to_string();

        match changes.distributions.as_slice() {
            [target] => {
                if !distribution.is_named(target) {
                    warn!(
                        self.logger,
                        "{}: targets '{}' but is put into '{}'",
                        name,
                        target,
                        distribution.codename
                    );
                }
            }
            targets => {
                return Err(AdmissionError::NotExactlyOneDistribution(
                    name,
                    targets.len(),
                ))
            }
        }

        changes.fix_fields(distribution, self.guesser, &self.overrides)?;
        changes.check(&self.logger)?;

        for file in changes
            .files
            .iter()
            .filter(|f| f.artifact_type.binary_extension().is_some())
        {
            self.check_binary_architecture(distribution, &file.basename, &file.architecture)?;
        }

        let files = changes.include_files(self.pool)?;

        let component = changes
            .component
            .clone()
            .ok_or_else(|| AdmissionError::Unresolved(name.clone(), "component"))?;
        let directory = changes
            .directory
            .clone()
            .ok_or_else(|| AdmissionError::Unresolved(name.clone(), "pool directory"))?;
        let incoming_dir = match changes_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut registrations = vec![];

        for file in changes.files.iter().filter(|f| f.artifact_type.is_package()) {
            let pool_key = file
                .pool_key
                .clone()
                .ok_or_else(|| AdmissionError::Unresolved(file.basename.clone(), "pool key"))?;

            match file.artifact_type {
                ArtifactType::BinaryPackage | ArtifactType::UnsignedBinaryPackage => {
                    let kind = if file.artifact_type == ArtifactType::UnsignedBinaryPackage {
                        PackageKind::Udeb
                    } else {
                        PackageKind::Deb
                    };

                    let placement = BinaryPlacement {
                        component: Some(component.clone()),
                        section: Some(file.section.clone()),
                        priority: Some(file.priority.clone()),
                        pool_key: Some(pool_key.clone()),
                        checksum: Some(file.checksum.clone()),
                    };

                    registrations.extend(self.admit_binary_with(
                        distribution,
                        &self.pool.path(&pool_key),
                        kind,
                        placement,
                    )?);
                }
                ArtifactType::SourceControl => {
                    let placement = SourcePlacement {
                        source: &changes.source,
                        component: &component,
                        directory: &directory,
                        section: &file.section,
                        priority: &file.priority,
                        dsc_basename: &file.basename,
                        dsc_checksum: &file.checksum,
                        incoming_dir: &incoming_dir,
                    };

                    registrations.push(self.sources.admit_source(
                        &self.logger,
                        self.pool,
                        self.index,
                        distribution,
                        &placement,
                    )?);
                }
                _ => {}
            }
        }

        info!(
            self.logger,
            "{}: admitted {} {} into {}/{}",
            name,
            changes.source,
            changes.version,
            distribution.codename,
            component
        );

        Ok(AdmissionReport {
            source: changes.source,
            version: changes.version.to_string(),
            component,
            files,
            registrations,
        })
    }

    /// Admit a lone binary package file using the configured overrides.
    ///
    /// Files named `*.udeb` are admitted as installer packages.
    pub fn admit_binary(
        &self,
        distribution: &Distribution,
        path: &Path,
    ) -> Result<Vec<Registration>> {
        let kind = if path.extension().map(|e| e == "udeb").unwrap_or(false) {
            PackageKind::Udeb
        } else {
            PackageKind::Deb
        };

        self.admit_binary_with(distribution, path, kind, BinaryPlacement::from(&self.overrides))
    }

    /// Admit a binary package file with an explicit placement.
    ///
    /// If `placement` carries both a pool key and a checksum, the file is assumed to be
    /// in the pool already and is only verified. Otherwise it is copied into the pool.
    pub fn admit_binary_with(
        &self,
        distribution: &Distribution,
        path: &Path,
        kind: PackageKind,
        placement: BinaryPlacement,
    ) -> Result<Vec<Registration>> {
        let name = path.display().to_string();
        let mut artifact = BinaryArtifact::read(self.extractor, path, kind)?;

        if placement.section.is_some() {
            artifact.section = placement.section.clone();
        }
        if placement.priority.is_some() {
            artifact.priority = placement.priority.clone();
        }

        let section = artifact
            .section
            .clone()
            .ok_or_else(|| AdmissionError::MissingSection(name.clone()))?;
        if artifact.priority.is_none() {
            return Err(AdmissionError::MissingPriority(name));
        }

        artifact.component = Some(self.guesser.guess(
            &distribution.codename,
            &distribution.components,
            &artifact.source,
            &section,
            placement.component.as_deref(),
        )?);

        self.check_binary_architecture(distribution, &name, &artifact.architecture)?;

        artifact.calculate_locations(placement.pool_key.as_deref())?;
        let key = artifact
            .file_keys
            .as_ref()
            .map(|keys| keys.primary().to_string())
            .ok_or_else(|| AdmissionError::Unresolved(name.clone(), "pool key"))?;

        artifact.checksum = Some(match (&placement.pool_key, placement.checksum) {
            (Some(_), Some(checksum)) => {
                let basename = artifact.basename();
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                self.pool.admit(dir, &basename, &key, &checksum)?;
                checksum
            }
            _ => self.pool.copy_and_hash(&key, path)?.0,
        });

        artifact.complete()?;

        self.register(distribution, &artifact)
    }

    /// Verify a binary's architecture is `all` or one of the distribution's.
    fn check_binary_architecture(
        &self,
        distribution: &Distribution,
        name: &str,
        architecture: &str,
    ) -> Result<()> {
        if architecture == "all" || distribution.has_architecture(architecture) {
            return Ok(());
        }

        let err = AdmissionError::ArchitectureNotInDistribution(
            name.to_string(),
            architecture.to_string(),
            distribution.codename.clone(),
        );

        if self.force.allows_undeclared_architecture() {
            warn!(self.logger, "ignoring due to force: {}", err);
            Ok(())
        } else {
            Err(err)
        }
    }

    /// Register a completed binary under every architecture it applies to.
    ///
    /// Every architecture is attempted. The first failure is returned once all
    /// attempts were made.
    fn register(
        &self,
        distribution: &Distribution,
        artifact: &BinaryArtifact,
    ) -> Result<Vec<Registration>> {
        let component = artifact
            .component
            .clone()
            .ok_or_else(|| AdmissionError::Unresolved(artifact.package.clone(), "component"))?;
        let file_keys = artifact
            .file_keys
            .clone()
            .ok_or_else(|| AdmissionError::Unresolved(artifact.package.clone(), "pool key"))?;
        let control = artifact.paragraph();

        let architectures = distribution.registration_architectures(&artifact.architecture);
        if architectures.is_empty() {
            warn!(
                self.logger,
                "{}: distribution {} has no architecture to register into",
                artifact.package,
                distribution.codename
            );
        }

        let mut registrations = vec![];
        let mut first_error = None;

        for architecture in architectures {
            let record = IndexRecord {
                codename: distribution.codename.clone(),
                component: component.clone(),
                architecture: architecture.to_string(),
                kind: artifact.kind,
                package: artifact.package.clone(),
                version: artifact.version.to_string(),
                control: control.clone(),
                file_keys: file_keys.clone(),
            };

            match self.index.register(&record) {
                Ok(()) => {
                    info!(
                        self.logger,
                        "registered {} {} for {}",
                        record.package,
                        record.version,
                        architecture
                    );
                    registrations.push(Registration {
                        package: record.package,
                        version: record.version,
                        architecture: record.architecture,
                        kind: record.kind,
                        component: record.component,
                        file_key: file_keys.primary().to_string(),
                    });
                }
                Err(err) => {
                    warn!(
                        self.logger,
                        "registering {} for {} failed: {}",
                        artifact.package,
                        architecture,
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(registrations),
        }
    }
}
