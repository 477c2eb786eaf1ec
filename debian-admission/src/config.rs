// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Repository configuration. */

use {
    crate::error::{AdmissionError, Result},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

/// A distribution packages can be admitted into.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Distribution {
    /// The codename, e.g. `bullseye`. Names the `dists/` directory.
    pub codename: String,

    /// The suite, e.g. `stable`.
    #[serde(default)]
    pub suite: Option<String>,

    /// Components, e.g. `main`. The first is the fallback for guessing.
    pub components: Vec<String>,

    /// Binary architectures, e.g. `amd64`.
    ///
    /// `source` may be listed. It does not take part in `all` fan-out.
    pub architectures: Vec<String>,
}

impl Distribution {
    /// Whether a component is part of this distribution.
    pub fn has_component(&self, component: &str) -> bool {
        self.components.iter().any(|c| c == component)
    }

    /// Whether an architecture is part of this distribution.
    pub fn has_architecture(&self, architecture: &str) -> bool {
        self.architectures.iter().any(|a| a == architecture)
    }

    /// Whether the given name refers to this distribution by codename or suite.
    pub fn is_named(&self, name: &str) -> bool {
        self.codename == name || self.suite.as_deref() == Some(name)
    }

    /// The architectures a package of the given architecture is registered under.
    ///
    /// `all` expands to every declared binary architecture.
    pub fn registration_architectures<'a>(&'a self, architecture: &'a str) -> Vec<&'a str> {
        if architecture == "all" {
            self.architectures
                .iter()
                .map(|a| a.as_str())
                .filter(|a| *a != "source" && *a != "all")
                .collect()
        } else {
            vec![architecture]
        }
    }
}

/// Configuration of a repository.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RepositoryConfig {
    /// Root directory holding `pool/`, `dists/` and `db/`.
    ///
    /// Relative paths are resolved against the directory of the configuration file.
    pub base_dir: PathBuf,

    /// Distributions of this repository.
    pub distributions: Vec<Distribution>,
}

impl RepositoryConfig {
    /// Parse a configuration from YAML.
    pub fn from_yaml(data: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    /// Load a configuration from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let fh = std::fs::File::open(path).map_err(|e| AdmissionError::io_path(path, e))?;
        let mut config: Self = serde_yaml::from_reader(fh)?;

        if config.base_dir.is_relative() {
            if let Some(parent) = path.parent() {
                config.base_dir = parent.join(&config.base_dir);
            }
        }

        Ok(config)
    }

    /// Find a distribution by codename.
    pub fn distribution(&self, codename: &str) -> Result<&Distribution> {
        self.distributions
            .iter()
            .find(|d| d.codename == codename)
            .ok_or_else(|| AdmissionError::UnknownDistribution(codename.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc};

    const CONFIG: &str = indoc! {"
        base_dir: repo
        distributions:
          - codename: bullseye
            suite: stable
            components: [main, contrib]
            architectures: [amd64, i386, source]
    "};

    #[test]
    fn parse() -> Result<()> {
        let config = RepositoryConfig::from_yaml(CONFIG)?;
        let dist = config.distribution("bullseye")?;

        assert!(dist.is_named("stable"));
        assert!(dist.has_component("contrib"));
        assert_eq!(dist.registration_architectures("all"), vec!["amd64", "i386"]);
        assert_eq!(dist.registration_architectures("arm64"), vec!["arm64"]);
        assert!(config.distribution("sid").is_err());

        Ok(())
    }

    #[test]
    fn unknown_fields_rejected() {
        assert!(RepositoryConfig::from_yaml("base_dir: x\ndistributions: []\nbogus: 1\n").is_err());
    }

    #[test]
    fn relative_base_dir() -> Result<()> {
        let td = tempfile::tempdir()?;
        let path = td.path().join("config.yaml");
        std::fs::write(&path, CONFIG)?;

        let config = RepositoryConfig::from_path(&path)?;
        assert_eq!(config.base_dir, td.path().join("repo"));

        Ok(())
    }
}
