// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Parsing of `Files` lines in `.changes` files.

Each line has the form `<md5> <size> <section> <priority> <filename>`. The
filename is classified into an [ArtifactType] from its shape:

* `<name>_<version>_<arch>.deb` and `<name>_<version>_<arch>.udeb` are binary packages.
* `<name>_<version><suffix>` is a source file, classified by suffix.
*/

use {
    crate::{
        checksum::ChecksumToken,
        error::{AdmissionError, Result},
    },
    strum::{AsRefStr, EnumIter, IntoStaticStr},
};

/// The kind of artifact a `.changes` file references.
#[derive(AsRefStr, Clone, Copy, Debug, EnumIter, Eq, Hash, IntoStaticStr, PartialEq)]
pub enum ArtifactType {
    #[strum(serialize = ".deb")]
    BinaryPackage,
    #[strum(serialize = ".udeb")]
    UnsignedBinaryPackage,
    #[strum(serialize = ".dsc")]
    SourceControl,
    #[strum(serialize = ".diff.gz")]
    SourceDiff,
    #[strum(serialize = ".orig.tar.gz")]
    SourceOriginalTarball,
    #[strum(serialize = ".tar.gz")]
    SourceTarball,
    #[strum(serialize = "unknown")]
    Unknown,
}

/// Source suffixes, longest first so `.orig.tar.gz` is never seen as `.tar.gz`.
const SOURCE_SUFFIXES: [ArtifactType; 4] = [
    ArtifactType::SourceOriginalTarball,
    ArtifactType::SourceTarball,
    ArtifactType::SourceDiff,
    ArtifactType::SourceControl,
];

impl ArtifactType {
    /// Whether files of this type carry architecture `source`.
    pub fn is_source(&self) -> bool {
        !matches!(self, Self::BinaryPackage | Self::UnsignedBinaryPackage)
    }

    /// Whether files of this type are registered into an index.
    pub fn is_package(&self) -> bool {
        matches!(
            self,
            Self::BinaryPackage | Self::UnsignedBinaryPackage | Self::SourceControl
        )
    }

    /// The file extension of binary package types.
    pub fn binary_extension(&self) -> Option<&'static str> {
        match self {
            Self::BinaryPackage => Some("deb"),
            Self::UnsignedBinaryPackage => Some("udeb"),
            _ => None,
        }
    }
}

/// A file referenced by a `.changes` file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileReference {
    pub checksum: ChecksumToken,
    pub section: String,
    pub priority: String,
    pub basename: String,
    pub artifact_type: ArtifactType,
    pub architecture: String,
    /// Package name part of the basename.
    pub name: String,
    /// Where the file lives in the pool. Set during ingestion.
    pub pool_key: Option<String>,
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'+' | b'-' | b'.')
}

fn is_version_char(c: u8) -> bool {
    is_name_char(c) || matches!(c, b':' | b'~')
}

/// Cursor over the bytes of a filename.
struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn take_while(&mut self, predicate: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek().map(&predicate).unwrap_or(false) {
            self.pos += 1;
        }

        &self.text[start..self.pos]
    }

    fn eat(&mut self, c: u8) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }
}

impl FileReference {
    /// Parse a single `Files` line.
    pub fn parse(line: &str) -> Result<Self> {
        let error = |reason: String| AdmissionError::FileLine {
            line: line.to_string(),
            reason,
        };

        let mut tokens = line.split_ascii_whitespace();
        let md5 = tokens.next();
        let size = tokens.next();
        let section = tokens.next();
        let priority = tokens.next();
        let filename = tokens.next();

        if tokens.next().is_some() {
            return Err(error("unexpected sixth argument".into()));
        }

        let (md5, size, section, priority, filename) =
            match (md5, size, section, priority, filename) {
                (Some(a), Some(b), Some(c), Some(d), Some(e)) => (a, b, c, d, e),
                _ => return Err(error("not five arguments".into())),
            };

        let checksum = format!("{} {}", md5, size)
            .parse::<ChecksumToken>()
            .map_err(|e| error(e.to_string()))?;

        let (name, artifact_type, architecture) =
            Self::classify(filename).map_err(error)?;

        Ok(Self {
            checksum,
            section: section.to_string(),
            priority: priority.to_string(),
            basename: filename.to_string(),
            artifact_type,
            architecture,
            name: name.to_string(),
            pool_key: None,
        })
    }

    /// Split a filename into package name, artifact type and architecture.
    fn classify(filename: &str) -> std::result::Result<(&str, ArtifactType, String), String> {
        let mut scanner = Scanner::new(filename);

        let name = scanner.take_while(is_name_char);
        if name.is_empty() {
            return Err(format!("no package name in filename '{}'", filename));
        }

        if !scanner.eat(b'_') {
            return Err(match scanner.peek() {
                None => format!("no underscore in filename '{}'", filename),
                Some(c) => format!(
                    "unexpected character '{}' in filename '{}'",
                    c as char, filename
                ),
            });
        }

        // Source suffixes are valid version characters, so the version token
        // absorbs them. They are split off below.
        let after_name = scanner.rest();
        let version = scanner.take_while(is_version_char);
        if version.is_empty() {
            return Err(format!("empty version in filename '{}'", filename));
        }

        match scanner.peek() {
            None => {
                let artifact_type = SOURCE_SUFFIXES
                    .iter()
                    .find(|t| {
                        let suffix: &str = t.as_ref();
                        after_name.len() > suffix.len() && after_name.ends_with(suffix)
                    })
                    .copied()
                    .unwrap_or(ArtifactType::Unknown);

                Ok((name, artifact_type, "source".to_string()))
            }
            Some(b'_') => {
                scanner.eat(b'_');
                let rest = scanner.rest();

                let (architecture, suffix) = rest.split_once('.').ok_or_else(|| {
                    format!(
                        "expected name_version_arch.[u]deb, got '{}'",
                        filename
                    )
                })?;

                let artifact_type = match suffix {
                    "deb" => ArtifactType::BinaryPackage,
                    "udeb" => ArtifactType::UnsignedBinaryPackage,
                    _ => {
                        return Err(format!(
                            "'{}' looks neither like .deb nor like .udeb",
                            filename
                        ))
                    }
                };

                if architecture.is_empty() {
                    return Err(format!("empty architecture in filename '{}'", filename));
                }
                if architecture == "source" {
                    return Err(format!(
                        "a .deb or .udeb cannot have architecture 'source': '{}'",
                        filename
                    ));
                }

                Ok((name, artifact_type, architecture.to_string()))
            }
            Some(c) => Err(format!(
                "unexpected character '{}' after version in filename '{}'",
                c as char, filename
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::ErrorKind, strum::IntoEnumIterator};

    const MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn parse(filename: &str) -> Result<FileReference> {
        FileReference::parse(&format!("{} 0 devel optional {}", MD5, filename))
    }

    #[test]
    fn fields_recovered_verbatim() -> Result<()> {
        // (line, md5, size, section, priority, basename, name, architecture, type)
        let cases = [
            (
                "  0123456789ABCDEFabcdef0123456789\t 1234  libs  extra   foo+bar_1:2.0~rc1-3_amd64.deb  ",
                "0123456789ABCDEFabcdef0123456789",
                1234,
                "libs",
                "extra",
                "foo+bar_1:2.0~rc1-3_amd64.deb",
                "foo+bar",
                "amd64",
                ArtifactType::BinaryPackage,
            ),
            (
                "D41D8CD98F00B204E9800998ECF8427E\t0\tdebian-installer\trequired\tfoo-udeb_1.0_arm64.udeb",
                "D41D8CD98F00B204E9800998ECF8427E",
                0,
                "debian-installer",
                "required",
                "foo-udeb_1.0_arm64.udeb",
                "foo-udeb",
                "arm64",
                ArtifactType::UnsignedBinaryPackage,
            ),
            (
                " d41d8cd98f00b204e9800998ecf8427e     17 contrib/devel    optional foo_2:1.0-1.dsc",
                "d41d8cd98f00b204e9800998ecf8427e",
                17,
                "contrib/devel",
                "optional",
                "foo_2:1.0-1.dsc",
                "foo",
                "source",
                ArtifactType::SourceControl,
            ),
            (
                "aBcDeF0123456789aBcDeF0123456789 \t \t 987654321 non-free/libs - libz.3_1.2~beta.orig.tar.gz",
                "aBcDeF0123456789aBcDeF0123456789",
                987654321,
                "non-free/libs",
                "-",
                "libz.3_1.2~beta.orig.tar.gz",
                "libz.3",
                "source",
                ArtifactType::SourceOriginalTarball,
            ),
            (
                "\t00000000000000000000000000000000 3 byhand extra g++_10-1.diff.gz\t",
                "00000000000000000000000000000000",
                3,
                "byhand",
                "extra",
                "g++_10-1.diff.gz",
                "g++",
                "source",
                ArtifactType::SourceDiff,
            ),
        ];

        for (line, md5, size, section, priority, basename, name, architecture, artifact_type) in
            cases
        {
            let f = FileReference::parse(line)?;

            assert_eq!(f.checksum.md5(), md5, "{}", line);
            assert_eq!(f.checksum.size(), size, "{}", line);
            assert_eq!(f.section, section, "{}", line);
            assert_eq!(f.priority, priority, "{}", line);
            assert_eq!(f.basename, basename, "{}", line);
            assert_eq!(f.name, name, "{}", line);
            assert_eq!(f.architecture, architecture, "{}", line);
            assert_eq!(f.artifact_type, artifact_type, "{}", line);
            assert!(f.pool_key.is_none());
        }

        Ok(())
    }

    #[test]
    fn source_suffixes() -> Result<()> {
        let cases = [
            ("foo_1.0.orig.tar.gz", ArtifactType::SourceOriginalTarball),
            ("foo_1.0.tar.gz", ArtifactType::SourceTarball),
            ("foo_1.0-1.diff.gz", ArtifactType::SourceDiff),
            ("foo_1.0-1.dsc", ArtifactType::SourceControl),
            ("foo_1.0-1.tar.xz", ArtifactType::Unknown),
            ("foo_.dsc", ArtifactType::Unknown),
        ];

        for (filename, expected) in cases {
            let f = parse(filename)?;
            assert_eq!(f.artifact_type, expected, "{}", filename);
            assert_eq!(f.architecture, "source");
            assert_eq!(f.name, "foo");
        }

        Ok(())
    }

    #[test]
    fn udeb() -> Result<()> {
        let f = parse("foo-udeb_1.0_i386.udeb")?;
        assert_eq!(f.artifact_type, ArtifactType::UnsignedBinaryPackage);
        assert_eq!(f.architecture, "i386");

        Ok(())
    }

    #[test]
    fn malformed() {
        for line in [
            format!("{} 0 devel optional foo_1.0.dsc extra", MD5),
            format!("{} 0 devel foo_1.0.dsc", MD5),
            format!("{} 0x devel optional foo_1.0.dsc", MD5),
            "zz 0 devel optional foo_1.0.dsc".to_string(),
        ] {
            assert_eq!(
                FileReference::parse(&line).unwrap_err().kind(),
                ErrorKind::MalformedGrammar,
                "{}",
                line
            );
        }

        for filename in [
            "foo.dsc",
            "foo",
            "_1.0.dsc",
            "foo__amd64.deb",
            "foo_1.0_amd64",
            "foo_1.0_amd64.rpm",
            "foo_1.0_.deb",
            "foo_1.0_source.deb",
            "foo_1.0/x.dsc",
            "foo@1.0.dsc",
        ] {
            assert!(parse(filename).is_err(), "{}", filename);
        }
    }

    #[test]
    fn error_names_character() {
        let err = parse("foo_1.0/x.dsc").unwrap_err();
        assert!(err.to_string().contains("'/'"));
    }

    #[test]
    fn type_predicates() {
        let packages = ArtifactType::iter().filter(|t| t.is_package()).count();
        assert_eq!(packages, 3);
        assert!(ArtifactType::iter()
            .filter(|t| !t.is_source())
            .all(|t| t.binary_extension().is_some()));
    }
}
