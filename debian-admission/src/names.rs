// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package names, canonical file names and pool keys. */

use {
    crate::{
        error::{AdmissionError, Result},
        package_version::PackageVersion,
    },
    once_cell::sync::Lazy,
    regex::Regex,
    std::ops::Deref,
};

/// Syntax of source and binary package names.
///
/// See <https://www.debian.org/doc/debian-policy/ch-controlfields.html#source>.
pub static RE_PACKAGE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9+.\-]+$").expect("package name regex is valid"));

/// Verify a package name is syntactically valid.
pub fn check_package_name(name: &str) -> Result<()> {
    if RE_PACKAGE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(AdmissionError::InvalidPackageName(name.to_string()))
    }
}

/// Verify a file name listed by an upload stays within its pool directory.
///
/// Names are restricted to the characters allowed in package names and
/// versions plus `_`. `.` and `..` are rejected.
pub fn check_file_basename(context: &str, name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.' | ':' | '~' | '_'));

    if valid {
        Ok(())
    } else {
        Err(AdmissionError::InvalidFileName(
            context.to_string(),
            name.to_string(),
        ))
    }
}

/// The canonical basename of a source package's `.dsc` file.
pub fn source_basename(source: &str, version: &PackageVersion) -> String {
    format!("{}_{}.dsc", source, version.without_epoch())
}

/// The canonical basename of a binary package file.
///
/// `extension` is `deb` or `udeb`.
pub fn binary_basename(
    package: &str,
    version: &PackageVersion,
    architecture: &str,
    extension: &str,
) -> String {
    format!(
        "{}_{}_{}.{}",
        package,
        version.without_epoch(),
        architecture,
        extension
    )
}

/// Describes the layout of the `pool` part of the repository.
///
/// This type controls where files will be placed under the repository root.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolLayout {
    /// File paths are `pool/<component>/<name_prefix>/<source>/<filename>`.
    ///
    /// This is the layout as used by the Debian distribution.
    ///
    /// For sources beginning with `lib`, the prefix is the first four characters
    /// (`libz` for `libzstd`). For everything else, it is the first character.
    ComponentThenNamePrefix,
}

impl Default for PoolLayout {
    fn default() -> Self {
        Self::ComponentThenNamePrefix
    }
}

impl PoolLayout {
    /// The directory holding all files of a source package.
    pub fn source_directory(&self, component: &str, source: &str) -> String {
        match self {
            Self::ComponentThenNamePrefix => {
                let prefix_len = if source.starts_with("lib") && source.len() > 4 {
                    4
                } else {
                    1
                };
                let prefix = source
                    .char_indices()
                    .nth(prefix_len)
                    .map(|(i, _)| &source[..i])
                    .unwrap_or(source);

                format!("pool/{}/{}/{}", component, prefix, source)
            }
        }
    }

    /// Compute the pool key of a file given the source package name and its filename.
    pub fn path(&self, component: &str, source: &str, filename: &str) -> String {
        format!("{}/{}", self.source_directory(component, source), filename)
    }
}

/// The pool keys of a single artifact.
///
/// The first key is the primary key: the one recorded as `Filename`.
/// There is always at least one.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FileKeys(Vec<String>);

impl FileKeys {
    /// Construct an instance holding only a primary key.
    pub fn new(primary: String) -> Self {
        Self(vec![primary])
    }

    /// The primary key.
    pub fn primary(&self) -> &str {
        &self.0[0]
    }

    /// Record an additional, non-primary key.
    pub fn push(&mut self, key: String) {
        if !self.0.contains(&key) {
            self.0.push(key);
        }
    }
}

impl Deref for FileKeys {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::error::ErrorKind};

    #[test]
    fn package_names() {
        for good in ["foo", "libzstd1", "python3.9", "g++", "a-b"] {
            assert!(check_package_name(good).is_ok(), "{}", good);
        }
        for bad in ["", "f", "Foo", "-foo", "foo_bar", "foo bar"] {
            assert!(check_package_name(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn file_basenames() {
        for good in ["foo_1.0.orig.tar.gz", "foo_2:1.0~rc1-1.debian.tar.xz", "a"] {
            assert!(check_file_basename("foo.dsc", good).is_ok(), "{}", good);
        }
        for bad in [
            "",
            ".",
            "..",
            "../../../../evil",
            "sub/foo.tar.gz",
            "/etc/passwd",
            "foo bar",
            "foo\\bar",
        ] {
            let err = check_file_basename("foo.dsc", bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedGrammar, "{}", bad);
        }
    }

    #[test]
    fn basenames() -> Result<()> {
        let v = PackageVersion::parse("2:1.0-3")?;
        assert_eq!(source_basename("foo", &v), "foo_1.0-3.dsc");
        assert_eq!(
            binary_basename("foo-dev", &v, "amd64", "udeb"),
            "foo-dev_1.0-3_amd64.udeb"
        );

        Ok(())
    }

    #[test]
    fn pool_layout() {
        let layout = PoolLayout::default();

        assert_eq!(
            layout.path("main", "libzstd", "zstd_1.4.8+dfsg-2.1_amd64.deb"),
            "pool/main/libz/libzstd/zstd_1.4.8+dfsg-2.1_amd64.deb"
        );
        assert_eq!(
            layout.path("main", "python3.9", "python3.9_3.9.9-1_arm64.deb"),
            "pool/main/p/python3.9/python3.9_3.9.9-1_arm64.deb"
        );
        assert_eq!(layout.source_directory("contrib", "lib"), "pool/contrib/l/lib");
        assert_eq!(layout.source_directory("main", "libx"), "pool/main/l/libx");
    }

    #[test]
    fn file_keys() {
        let mut keys = FileKeys::new("pool/main/f/foo/foo_1_all.deb".into());
        keys.push("pool/main/f/foo/foo_1_all.deb".into());
        keys.push("pool/extra/f/foo/foo_1_all.deb".into());
        assert_eq!(keys.len(), 2);
        assert_eq!(keys.primary(), "pool/main/f/foo/foo_1_all.deb");
    }
}
