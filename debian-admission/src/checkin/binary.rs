// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Binary packages being admitted. */

use {
    crate::{
        binary_package_control::BinaryPackageControlFile,
        checksum::ChecksumToken,
        control::{ControlField, ControlParagraph},
        deb::ControlExtractor,
        error::{AdmissionError, Result},
        index::PackageKind,
        names::{binary_basename, check_package_name, FileKeys, PoolLayout},
        package_version::PackageVersion,
    },
    std::{borrow::Cow, path::Path},
};

/// A `.deb` or `.udeb` on its way into the repository.
///
/// Metadata is read from the file itself. Placement fields start unresolved and
/// are filled in as admission proceeds.
#[derive(Clone, Debug)]
pub struct BinaryArtifact {
    pub package: String,
    pub version: PackageVersion,
    /// Source package name. Defaults to the package name.
    pub source: String,
    pub architecture: String,
    pub kind: PackageKind,
    pub control: BinaryPackageControlFile,
    pub section: Option<String>,
    pub priority: Option<String>,
    pub component: Option<String>,
    pub file_keys: Option<FileKeys>,
    pub checksum: Option<ChecksumToken>,
}

impl BinaryArtifact {
    /// Read the metadata of the package file at `path`.
    ///
    /// `kind` is [PackageKind::Deb] or [PackageKind::Udeb].
    pub fn read(extractor: &dyn ControlExtractor, path: &Path, kind: PackageKind) -> Result<Self> {
        let control =
            BinaryPackageControlFile::new(extractor.extract_control(path)?, path.display());

        let package = control.package()?.to_string();
        check_package_name(&package)?;
        control.maintainer()?;
        control.description()?;
        let version = PackageVersion::parse(control.version_str()?)?;
        let architecture = control.architecture()?.to_string();

        let source = control.source().unwrap_or(&package).to_string();
        check_package_name(&source)?;

        let section = control.section().map(|s| s.to_string());
        let priority = control.priority().map(|s| s.to_string());

        Ok(Self {
            package,
            version,
            source,
            architecture,
            kind,
            control,
            section,
            priority,
            component: None,
            file_keys: None,
            checksum: None,
        })
    }

    /// File extension matching the package kind.
    pub fn extension(&self) -> &'static str {
        match self.kind {
            PackageKind::Udeb => "udeb",
            _ => "deb",
        }
    }

    /// The canonical file name of this package.
    pub fn basename(&self) -> String {
        binary_basename(
            &self.package,
            &self.version,
            &self.architecture,
            self.extension(),
        )
    }

    /// Compute the pool keys of this package from its component.
    ///
    /// If a key was already assigned to the file, e.g. by a `.changes` file, it
    /// must match the computed primary key.
    pub fn calculate_locations(&mut self, given_key: Option<&str>) -> Result<()> {
        let component = self
            .component
            .as_deref()
            .ok_or_else(|| AdmissionError::Unresolved(self.control.origin().to_string(), "component"))?;

        let key = PoolLayout::default().path(component, &self.source, &self.basename());

        if let Some(given) = given_key {
            if given != key {
                return Err(AdmissionError::PoolKeyMismatch {
                    declared: given.to_string(),
                    calculated: key,
                });
            }
        }

        self.file_keys = Some(FileKeys::new(key));

        Ok(())
    }

    /// Write the repository assigned fields into the control paragraph.
    ///
    /// `MD5Sum`, `Size`, `Filename`, `Section` and `Priority` are placed, in this
    /// order, before `Description`. Earlier values are replaced.
    pub fn complete(&mut self) -> Result<()> {
        let origin = self.control.origin().to_string();
        let unresolved = |what| AdmissionError::Unresolved(origin.clone(), what);

        let section = self.section.clone().ok_or_else(|| unresolved("section"))?;
        let priority = self.priority.clone().ok_or_else(|| unresolved("priority"))?;
        let filename = self
            .file_keys
            .as_ref()
            .ok_or_else(|| unresolved("pool key"))?
            .primary()
            .to_string();
        let checksum = self.checksum.as_ref().ok_or_else(|| unresolved("checksum"))?;

        let field = |name: &'static str, value: String| {
            ControlField::new(Cow::Borrowed(name), Cow::Owned(value))
        };

        let fields = vec![
            field("MD5Sum", checksum.md5().to_string()),
            field("Size", checksum.size().to_string()),
            field("Filename", filename),
            field("Section", section),
            field("Priority", priority),
        ];

        self.control.insert_fields_before("Description", fields);

        Ok(())
    }

    /// The completed control paragraph.
    pub fn paragraph(&self) -> ControlParagraph<'static> {
        self.control.clone().into()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{control::read_single_paragraph, error::ErrorKind},
        std::path::PathBuf,
    };

    struct StaticExtractor(&'static str);

    impl ControlExtractor for StaticExtractor {
        fn extract_control(&self, path: &Path) -> Result<ControlParagraph<'static>> {
            read_single_paragraph(self.0.as_bytes(), &path.display().to_string())
        }
    }

    const CONTROL: &str = "Package: foo-bin\nSource: foo (1.0-1)\nVersion: 1:1.0-1\nArchitecture: amd64\nMaintainer: M <m@example.com>\nSection: devel\nDescription: foo\n more foo\nHomepage: https://example.com\n";

    fn artifact() -> Result<BinaryArtifact> {
        BinaryArtifact::read(
            &StaticExtractor(CONTROL),
            &PathBuf::from("foo-bin_1.0-1_amd64.deb"),
            PackageKind::Deb,
        )
    }

    #[test]
    fn read() -> Result<()> {
        let a = artifact()?;

        assert_eq!(a.package, "foo-bin");
        assert_eq!(a.source, "foo");
        assert_eq!(a.version.to_string(), "1:1.0-1");
        assert_eq!(a.section.as_deref(), Some("devel"));
        assert_eq!(a.priority, None);
        assert_eq!(a.basename(), "foo-bin_1.0-1_amd64.deb");

        Ok(())
    }

    #[test]
    fn read_missing_field() {
        let err = BinaryArtifact::read(
            &StaticExtractor("Package: foo\nVersion: 1.0\nArchitecture: all\nDescription: x\n"),
            &PathBuf::from("foo_1.0_all.deb"),
            PackageKind::Deb,
        )
        .unwrap_err();

        assert!(matches!(
            err,
            AdmissionError::RequiredFieldMissing { file, field } if file == "foo_1.0_all.deb" && field == "Maintainer"
        ));
    }

    #[test]
    fn source_defaults_to_package() -> Result<()> {
        let a = BinaryArtifact::read(
            &StaticExtractor("Package: bar\nVersion: 2\nArchitecture: all\nMaintainer: M\nDescription: x\n"),
            &PathBuf::from("bar_2_all.udeb"),
            PackageKind::Udeb,
        )?;

        assert_eq!(a.source, "bar");
        assert_eq!(a.basename(), "bar_2_all.udeb");

        Ok(())
    }

    #[test]
    fn locations() -> Result<()> {
        let mut a = artifact()?;
        assert_eq!(a.calculate_locations(None).unwrap_err().kind(), ErrorKind::MissingField);

        a.component = Some("main".into());
        a.calculate_locations(Some("pool/main/f/foo/foo-bin_1.0-1_amd64.deb"))?;
        assert_eq!(
            a.file_keys.as_ref().unwrap().primary(),
            "pool/main/f/foo/foo-bin_1.0-1_amd64.deb"
        );

        assert_eq!(
            a.calculate_locations(Some("pool/main/f/foo/other.deb"))
                .unwrap_err()
                .kind(),
            ErrorKind::IntegrityMismatch
        );

        Ok(())
    }

    #[test]
    fn complete_is_idempotent() -> Result<()> {
        let mut a = artifact()?;
        assert!(a.complete().is_err());

        a.component = Some("main".into());
        a.priority = Some("optional".into());
        a.calculate_locations(None)?;
        a.checksum = Some(ChecksumToken::new("d41d8cd98f00b204e9800998ecf8427e", 0)?);

        a.complete()?;
        a.priority = Some("extra".into());
        a.complete()?;

        let p = a.paragraph();
        let names = p.iter_fields().map(|f| f.name()).collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "Package",
                "Source",
                "Version",
                "Architecture",
                "Maintainer",
                "MD5Sum",
                "Size",
                "Filename",
                "Section",
                "Priority",
                "Description",
                "Homepage"
            ]
        );
        assert_eq!(p.field_str("Priority"), Some("extra"));
        assert_eq!(p.field_str("Size"), Some("0"));
        assert_eq!(
            p.field_str("Filename"),
            Some("pool/main/f/foo/foo-bin_1.0-1_amd64.deb")
        );
        assert_eq!(p.field_lines("Description").unwrap(), vec!["foo", "more foo"]);

        Ok(())
    }
}
