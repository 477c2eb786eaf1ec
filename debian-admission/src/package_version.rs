// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version string handling. */

use {
    crate::error::{AdmissionError, Result},
    std::{
        fmt::{Display, Formatter},
        str::FromStr,
    },
};

/// A Debian package version.
///
/// The format is `[epoch:]upstream_version[-debian_revision]` and each component has
/// rules about what characters are allowed. See
/// <https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageVersion {
    epoch: Option<u32>,
    upstream_version: String,
    debian_revision: Option<String>,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |reason: &str| AdmissionError::InvalidVersion(s.to_string(), reason.into());

        // Epoch is the part before a colon, if present.
        // upstream_version and debian_revision are discovered by splitting on last hyphen.
        let (epoch, remainder) = match s.split_once(':') {
            Some((epoch, remainder)) => (Some(epoch), remainder),
            None => (None, s),
        };

        let (upstream, debian) = match remainder.rsplit_once('-') {
            Some((upstream, debian)) => (upstream, Some(debian)),
            None => (remainder, None),
        };

        let epoch = if let Some(epoch) = epoch {
            if epoch.is_empty() || !epoch.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid("the epoch component has non-digit characters"));
            }

            Some(u32::from_str(epoch)?)
        } else {
            None
        };

        if upstream.is_empty() {
            return Err(invalid("upstream_version is empty"));
        }

        // Hyphens are only allowed in upstream_version when a debian_revision follows.
        if !upstream.chars().all(|c| match c {
            c if c.is_ascii_alphanumeric() => true,
            '.' | '+' | '~' => true,
            '-' => debian.is_some(),
            _ => false,
        }) {
            return Err(invalid("upstream_version component has illegal character"));
        }

        let debian_revision = if let Some(debian) = debian {
            if debian.is_empty()
                || !debian.chars().all(|c| match c {
                    c if c.is_ascii_alphanumeric() => true,
                    '+' | '.' | '~' => true,
                    _ => false,
                })
            {
                return Err(invalid("debian_revision component has illegal character"));
            }

            Some(debian.to_string())
        } else {
            None
        };

        Ok(Self {
            epoch,
            upstream_version: upstream.to_string(),
            debian_revision,
        })
    }

    /// The `epoch` component of the version string.
    pub fn epoch(&self) -> Option<u32> {
        self.epoch
    }

    /// `upstream` component of the version string.
    pub fn upstream_version(&self) -> &str {
        &self.upstream_version
    }

    /// `debian_revision` component of the version string.
    pub fn debian_revision(&self) -> Option<&str> {
        self.debian_revision.as_deref()
    }

    /// The version as it appears in file names: without the epoch.
    pub fn without_epoch(&self) -> String {
        match &self.debian_revision {
            Some(revision) => format!("{}-{}", self.upstream_version, revision),
            None => self.upstream_version.clone(),
        }
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(epoch) = self.epoch {
            write!(f, "{}:", epoch)?;
        }

        f.write_str(&self.without_epoch())
    }
}

impl FromStr for PackageVersion {
    type Err = AdmissionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() -> Result<()> {
        let v = PackageVersion::parse("1:4.7.0+dfsg1-2")?;
        assert_eq!(v.epoch(), Some(1));
        assert_eq!(v.upstream_version(), "4.7.0+dfsg1");
        assert_eq!(v.debian_revision(), Some("2"));
        assert_eq!(v.without_epoch(), "4.7.0+dfsg1-2");
        assert_eq!(v.to_string(), "1:4.7.0+dfsg1-2");

        let v = PackageVersion::parse("3.3.2.final~github")?;
        assert_eq!(v.epoch(), None);
        assert_eq!(v.debian_revision(), None);
        assert_eq!(v.to_string(), "3.3.2.final~github");

        let v = PackageVersion::parse("0.18.0+dfsg-2+b1")?;
        assert_eq!(v.upstream_version(), "0.18.0+dfsg");
        assert_eq!(v.debian_revision(), Some("2+b1"));

        Ok(())
    }

    #[test]
    fn parse_invalid() {
        for bad in ["", "a:1.0", ":1.0", "1.0-", "1.0_2", "1.0-2_3", "1 0"] {
            assert!(PackageVersion::parse(bad).is_err(), "{}", bad);
        }
    }
}
