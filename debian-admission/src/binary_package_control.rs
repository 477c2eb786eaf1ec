// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian binary package control files. */

use {
    crate::{control::ControlParagraph, error::Result},
    std::ops::{Deref, DerefMut},
};

/// A Debian binary package control paragraph, as found in `DEBIAN/control`.
///
/// See <https://www.debian.org/doc/debian-policy/ch-controlfields.html#binary-package-control-files-debian-control>.
///
/// Fields required for admission have getters that return [Result] and will error
/// naming the originating file if the field is not present. Other fields return
/// [Option]. [Deref] and [DerefMut] can be used to operate on the inner
/// [ControlParagraph].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BinaryPackageControlFile {
    paragraph: ControlParagraph<'static>,
    origin: String,
}

impl Deref for BinaryPackageControlFile {
    type Target = ControlParagraph<'static>;

    fn deref(&self) -> &Self::Target {
        &self.paragraph
    }
}

impl DerefMut for BinaryPackageControlFile {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.paragraph
    }
}

impl From<BinaryPackageControlFile> for ControlParagraph<'static> {
    fn from(cf: BinaryPackageControlFile) -> Self {
        cf.paragraph
    }
}

impl BinaryPackageControlFile {
    /// Construct an instance from a paragraph read from `origin`.
    pub fn new(paragraph: ControlParagraph<'static>, origin: impl ToString) -> Self {
        Self {
            paragraph,
            origin: origin.to_string(),
        }
    }

    /// Name of the file this paragraph was read from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn required(&self, name: &str) -> Result<&str> {
        self.paragraph.required_field_str(&self.origin, name)
    }

    /// The `Package` field value.
    pub fn package(&self) -> Result<&str> {
        self.required("Package")
    }

    /// The `Version` field as its original string.
    pub fn version_str(&self) -> Result<&str> {
        self.required("Version")
    }

    /// The `Architecture` field.
    pub fn architecture(&self) -> Result<&str> {
        self.required("Architecture")
    }

    /// The `Maintainer` field.
    pub fn maintainer(&self) -> Result<&str> {
        self.required("Maintainer")
    }

    /// The `Description` field.
    pub fn description(&self) -> Result<&str> {
        self.required("Description")
    }

    /// The source package name from the `Source` field.
    ///
    /// The field may carry a version in parentheses (`foo (1.0-1)`), which is dropped.
    pub fn source(&self) -> Option<&str> {
        self.field_str("Source")
            .and_then(|v| v.split_ascii_whitespace().next())
    }

    /// The `Section` field.
    pub fn section(&self) -> Option<&str> {
        self.field_str("Section")
    }

    /// The `Priority` field.
    pub fn priority(&self) -> Option<&str> {
        self.field_str("Priority")
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{control::read_single_paragraph, error::AdmissionError},
    };

    #[test]
    fn getters() -> Result<()> {
        let p = read_single_paragraph(
            "Package: foo-bin\nSource: foo (1.0-1)\nVersion: 1.0-1+b1\n".as_bytes(),
            "x",
        )?;
        let cf = BinaryPackageControlFile::new(p, "foo-bin_1.0-1+b1_amd64.deb");

        assert_eq!(cf.package()?, "foo-bin");
        assert_eq!(cf.source(), Some("foo"));
        assert_eq!(cf.section(), None);

        match cf.maintainer() {
            Err(AdmissionError::RequiredFieldMissing { file, field }) => {
                assert_eq!(file, "foo-bin_1.0-1+b1_amd64.deb");
                assert_eq!(field, "Maintainer");
            }
            res => panic!("unexpected result: {:?}", res),
        }

        Ok(())
    }
}
