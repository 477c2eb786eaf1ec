// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Admission of source packages. */

use {
    super::Registration,
    crate::{
        checksum::ChecksumToken,
        config::Distribution,
        control::ControlField,
        error::{AdmissionError, Result},
        index::{IndexRecord, PackageIndex, PackageKind},
        names::{check_file_basename, FileKeys},
        package_version::PackageVersion,
        pool::Pool,
        signed::read_signed_paragraph,
    },
    slog::{debug, Logger},
    std::{borrow::Cow, path::Path},
};

/// Where a `.dsc` already ingested into the pool belongs.
#[derive(Clone, Debug)]
pub struct SourcePlacement<'a> {
    /// Source name declared by the upload.
    pub source: &'a str,
    pub component: &'a str,
    /// Pool directory of the source package.
    pub directory: &'a str,
    pub section: &'a str,
    pub priority: &'a str,
    pub dsc_basename: &'a str,
    pub dsc_checksum: &'a ChecksumToken,
    /// Directory holding the uploaded files.
    pub incoming_dir: &'a Path,
}

/// Registers source packages into an index.
pub trait SourceAdmission {
    fn admit_source(
        &self,
        logger: &Logger,
        pool: &dyn Pool,
        index: &dyn PackageIndex,
        distribution: &Distribution,
        placement: &SourcePlacement,
    ) -> Result<Registration>;
}

/// A [SourceAdmission] for `.dsc` source packages.
///
/// Every file the `.dsc` lists must be in the pool directory with the listed
/// checksum. Files missing from the pool are taken from the upload directory.
#[derive(Clone, Copy, Debug, Default)]
pub struct DscAdmission;

impl SourceAdmission for DscAdmission {
    fn admit_source(
        &self,
        logger: &Logger,
        pool: &dyn Pool,
        index: &dyn PackageIndex,
        distribution: &Distribution,
        placement: &SourcePlacement,
    ) -> Result<Registration> {
        let dsc_key = format!("{}/{}", placement.directory, placement.dsc_basename);
        let dsc_path = pool.path(&dsc_key);
        let context = dsc_path.display().to_string();

        let mut control = read_signed_paragraph(logger, &dsc_path)?;

        let source = control
            .required_field_str(&context, "Source")?
            .split_ascii_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();
        if source != placement.source {
            return Err(AdmissionError::SourceMismatch(
                context,
                source,
                placement.source.to_string(),
            ));
        }

        let version =
            PackageVersion::parse(control.required_field_str(&context, "Version")?.trim())?;
        control.required_field_str(&context, "Maintainer")?;
        control.required_field_str(&context, "Files")?;

        let mut file_keys = FileKeys::new(dsc_key);
        let mut files_lines = vec![
            String::new(),
            format!("{} {}", placement.dsc_checksum, placement.dsc_basename),
        ];

        for line in control.field_lines("Files").unwrap_or_default() {
            let (token, basename) = line.rsplit_once(char::is_whitespace).ok_or_else(|| {
                AdmissionError::ControlParseError(format!(
                    "{}: malformed Files line '{}'",
                    context, line
                ))
            })?;
            check_file_basename(&context, basename)?;
            let checksum = token.parse::<ChecksumToken>()?;
            let key = format!("{}/{}", placement.directory, basename);

            let admission = pool.admit(placement.incoming_dir, basename, &key, &checksum)?;
            debug!(logger, "{}: {} {:?}", context, key, admission);

            file_keys.push(key);
            files_lines.push(line.to_string());
        }

        control.rename_field("Source", "Package");
        control.set_field(ControlField::from_lines(
            Cow::Borrowed("Files"),
            files_lines.into_iter(),
        ));

        let field = |name: &'static str, value: &str| {
            ControlField::new(Cow::Borrowed(name), Cow::Owned(value.to_string()))
        };
        control.insert_fields_before(
            "Maintainer",
            vec![
                field("Directory", placement.directory),
                field("Section", placement.section),
                field("Priority", placement.priority),
            ],
        );

        let record = IndexRecord {
            codename: distribution.codename.clone(),
            component: placement.component.to_string(),
            architecture: "source".to_string(),
            kind: PackageKind::Dsc,
            package: source.clone(),
            version: version.to_string(),
            control,
            file_keys: file_keys.clone(),
        };

        index.register(&record)?;

        Ok(Registration {
            package: source,
            version: version.to_string(),
            architecture: "source".to_string(),
            kind: PackageKind::Dsc,
            component: placement.component.to_string(),
            file_key: file_keys.primary().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::ErrorKind, index::InMemoryPackageIndex, pool::FilesystemPool,
            testutil::get_logger,
        },
        std::path::PathBuf,
    };

    const DIRECTORY: &str = "pool/main/f/foo";
    const TARBALL: &[u8] = b"tarball content";

    struct Fixture {
        td: tempfile::TempDir,
        pool: FilesystemPool,
        index: InMemoryPackageIndex,
    }

    impl Fixture {
        fn new() -> Result<Self> {
            let td = tempfile::tempdir()?;
            std::fs::create_dir_all(td.path().join("incoming"))?;
            let pool = FilesystemPool::new(get_logger(), td.path().join("repo"));

            Ok(Self {
                td,
                pool,
                index: InMemoryPackageIndex::default(),
            })
        }

        fn incoming(&self) -> PathBuf {
            self.td.path().join("incoming")
        }

        /// Store a `.dsc` in the pool the way file ingestion would.
        fn pool_dsc(&self, text: &str) -> Result<ChecksumToken> {
            let path = self.pool.path(&format!("{}/foo_1.0.dsc", DIRECTORY));
            std::fs::create_dir_all(path.parent().unwrap())?;
            std::fs::write(&path, text)?;

            ChecksumToken::from_reader(text.as_bytes())
        }

        fn admit(&self, dsc_checksum: &ChecksumToken, incoming_dir: &Path) -> Result<Registration> {
            let placement = SourcePlacement {
                source: "foo",
                component: "main",
                directory: DIRECTORY,
                section: "devel",
                priority: "optional",
                dsc_basename: "foo_1.0.dsc",
                dsc_checksum,
                incoming_dir,
            };

            DscAdmission.admit_source(
                &get_logger(),
                &self.pool,
                &self.index,
                &distribution(),
                &placement,
            )
        }
    }

    fn distribution() -> Distribution {
        Distribution {
            codename: "bullseye".into(),
            suite: None,
            components: vec!["main".into()],
            architectures: vec!["amd64".into(), "source".into()],
        }
    }

    fn dsc(source: &str, files: &str) -> String {
        format!(
            "Format: 1.0\nSource: {}\nBinary: foo\nArchitecture: any\nVersion: 1.0\nMaintainer: M <m@example.com>\nStandards-Version: 4.5.0\nFiles:\n{}",
            source, files
        )
    }

    fn tarball_line() -> Result<String> {
        Ok(format!(
            " {} foo_1.0.tar.gz\n",
            ChecksumToken::from_reader(TARBALL)?
        ))
    }

    #[test]
    fn sources_paragraph() -> Result<()> {
        let f = Fixture::new()?;
        std::fs::write(f.incoming().join("foo_1.0.tar.gz"), TARBALL)?;
        let dsc_checksum = f.pool_dsc(&dsc("foo", &tarball_line()?))?;

        let registration = f.admit(&dsc_checksum, &f.incoming())?;
        assert_eq!(registration.package, "foo");
        assert_eq!(registration.architecture, "source");
        assert_eq!(registration.file_key, "pool/main/f/foo/foo_1.0.dsc");
        assert!(f.pool.path("pool/main/f/foo/foo_1.0.tar.gz").exists());

        let record = f
            .index
            .get("bullseye", "main", PackageKind::Dsc, "source", "foo")
            .unwrap();
        let names = record
            .control
            .iter_fields()
            .map(|f| f.name())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Format",
                "Package",
                "Binary",
                "Architecture",
                "Version",
                "Directory",
                "Section",
                "Priority",
                "Maintainer",
                "Standards-Version",
                "Files"
            ]
        );
        assert_eq!(record.control.field_str("Directory"), Some(DIRECTORY));
        assert_eq!(
            record.control.field_lines("Files").unwrap(),
            vec![
                format!("{} foo_1.0.dsc", dsc_checksum),
                tarball_line()?.trim().to_string()
            ]
        );
        assert_eq!(
            record.file_keys.to_vec(),
            vec![
                "pool/main/f/foo/foo_1.0.dsc".to_string(),
                "pool/main/f/foo/foo_1.0.tar.gz".to_string()
            ]
        );

        Ok(())
    }

    #[test]
    fn source_must_match_upload() -> Result<()> {
        let f = Fixture::new()?;
        std::fs::write(f.incoming().join("foo_1.0.tar.gz"), TARBALL)?;
        let dsc_checksum = f.pool_dsc(&dsc("bar", &tarball_line()?))?;

        let err = f.admit(&dsc_checksum, &f.incoming()).unwrap_err();
        assert!(matches!(err, AdmissionError::SourceMismatch(_, ref found, _) if found == "bar"));
        assert_eq!(err.kind(), ErrorKind::InconsistentDeclaration);
        assert!(!f.pool.path("pool/main/f/foo/foo_1.0.tar.gz").exists());
        assert!(f.index.records().is_empty());

        Ok(())
    }

    #[test]
    fn listed_file_missing() -> Result<()> {
        let f = Fixture::new()?;
        let dsc_checksum = f.pool_dsc(&dsc("foo", &tarball_line()?))?;

        let err = f.admit(&dsc_checksum, &f.incoming()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownstreamFailure);
        assert!(f.index.records().is_empty());

        Ok(())
    }

    #[test]
    fn listed_file_checksum_mismatch() -> Result<()> {
        let f = Fixture::new()?;
        std::fs::write(f.incoming().join("foo_1.0.tar.gz"), b"tampered")?;
        let dsc_checksum = f.pool_dsc(&dsc("foo", &tarball_line()?))?;

        let err = f.admit(&dsc_checksum, &f.incoming()).unwrap_err();
        assert!(matches!(err, AdmissionError::ChecksumMismatch { .. }));
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);
        assert!(!f.pool.path("pool/main/f/foo/foo_1.0.tar.gz").exists());
        assert!(f.index.records().is_empty());

        Ok(())
    }

    #[test]
    fn malformed_files_line() -> Result<()> {
        let f = Fixture::new()?;

        for files in [" foo_1.0.tar.gz\n", " nothex 15 foo_1.0.tar.gz\n"] {
            let dsc_checksum = f.pool_dsc(&dsc("foo", files))?;

            let err = f.admit(&dsc_checksum, &f.incoming()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedGrammar, "{}", files);
        }
        assert!(f.index.records().is_empty());

        Ok(())
    }

    #[test]
    fn listed_names_stay_in_source_directory() -> Result<()> {
        let f = Fixture::new()?;

        // Make `<incoming>/../../../../evil` resolvable inside the temp dir.
        let incoming = f.td.path().join("in/a/b/c");
        std::fs::create_dir_all(&incoming)?;
        std::fs::write(f.td.path().join("evil"), b"evil")?;
        let evil = ChecksumToken::from_reader(&b"evil"[..])?;

        for name in ["../../../../evil", "sub/evil", "..", ".", "/evil"] {
            let dsc_checksum = f.pool_dsc(&dsc("foo", &format!(" {} {}\n", evil, name)))?;

            let err = f.admit(&dsc_checksum, &incoming).unwrap_err();
            assert!(
                matches!(err, AdmissionError::InvalidFileName(_, ref n) if n == name),
                "{}",
                name
            );
            assert_eq!(err.kind(), ErrorKind::MalformedGrammar);
        }

        assert!(!f.td.path().join("repo/evil").exists());
        assert!(!f.pool.path("pool/main/f/foo/sub").exists());
        assert!(f.index.records().is_empty());

        Ok(())
    }
}
