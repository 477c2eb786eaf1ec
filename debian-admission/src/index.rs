// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package indices of distributions.

An index holds one control paragraph per package and architecture for every
(distribution, component, package kind). [InMemoryPackageIndex] can be loaded
from and written to the `dists/` tree of a repository:

* `dists/<codename>/<component>/binary-<arch>/Packages`
* `dists/<codename>/<component>/debian-installer/binary-<arch>/Packages`
* `dists/<codename>/<component>/source/Sources`
*/

use {
    crate::{
        config::Distribution,
        control::{ControlParagraph, ControlParagraphReader},
        error::{AdmissionError, Result},
        names::FileKeys,
    },
    std::{
        cell::RefCell,
        collections::BTreeMap,
        io::{BufReader, Write},
        path::{Path, PathBuf},
    },
    strum::{AsRefStr, EnumIter, IntoEnumIterator},
};

/// The kind of a registered package.
#[derive(AsRefStr, Clone, Copy, Debug, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[strum(serialize_all = "lowercase")]
pub enum PackageKind {
    Deb,
    Udeb,
    Dsc,
}

impl PackageKind {
    /// Path of the index file of this kind relative to a component directory.
    pub fn index_path(&self, architecture: &str) -> String {
        match self {
            Self::Deb => format!("binary-{}/Packages", architecture),
            Self::Udeb => format!("debian-installer/binary-{}/Packages", architecture),
            Self::Dsc => "source/Sources".to_string(),
        }
    }
}

/// A package to be registered into an index.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexRecord {
    pub codename: String,
    pub component: String,
    pub architecture: String,
    pub kind: PackageKind,
    pub package: String,
    pub version: String,
    /// The index paragraph.
    pub control: ControlParagraph<'static>,
    pub file_keys: FileKeys,
}

/// Storage of package indices.
pub trait PackageIndex {
    /// Add a package, replacing any entry with the same name and architecture in
    /// the same distribution, component and kind.
    fn register(&self, record: &IndexRecord) -> Result<()>;
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct Slot {
    codename: String,
    component: String,
    kind: PackageKind,
    architecture: String,
}

/// A [PackageIndex] held in memory.
#[derive(Debug, Default)]
pub struct InMemoryPackageIndex {
    slots: RefCell<BTreeMap<Slot, BTreeMap<String, IndexRecord>>>,
}

impl PackageIndex for InMemoryPackageIndex {
    fn register(&self, record: &IndexRecord) -> Result<()> {
        let slot = Slot {
            codename: record.codename.clone(),
            component: record.component.clone(),
            kind: record.kind,
            architecture: record.architecture.clone(),
        };

        self.slots
            .borrow_mut()
            .entry(slot)
            .or_default()
            .insert(record.package.clone(), record.clone());

        Ok(())
    }
}

impl InMemoryPackageIndex {
    /// All registered records, ordered by slot and package name.
    pub fn records(&self) -> Vec<IndexRecord> {
        self.slots
            .borrow()
            .values()
            .flat_map(|packages| packages.values().cloned())
            .collect()
    }

    /// Look up a single record.
    pub fn get(
        &self,
        codename: &str,
        component: &str,
        kind: PackageKind,
        architecture: &str,
        package: &str,
    ) -> Option<IndexRecord> {
        let slot = Slot {
            codename: codename.to_string(),
            component: component.to_string(),
            kind,
            architecture: architecture.to_string(),
        };

        self.slots
            .borrow()
            .get(&slot)
            .and_then(|packages| packages.get(package))
            .cloned()
    }

    /// Load the indices of a distribution from a repository.
    ///
    /// Missing index files are treated as empty.
    pub fn load_dists(&self, base_dir: &Path, distribution: &Distribution) -> Result<()> {
        for component in &distribution.components {
            for kind in PackageKind::iter() {
                let architectures = match kind {
                    PackageKind::Dsc => vec!["source"],
                    _ => distribution.registration_architectures("all"),
                };

                for architecture in architectures {
                    let path = dists_path(base_dir, &distribution.codename, component)
                        .join(kind.index_path(architecture));

                    let fh = match std::fs::File::open(&path) {
                        Ok(fh) => fh,
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(AdmissionError::io_path(path, e)),
                    };

                    for paragraph in ControlParagraphReader::new(BufReader::new(fh)) {
                        let record = record_from_paragraph(
                            &distribution.codename,
                            component,
                            kind,
                            architecture,
                            paragraph?,
                        )
                        .map_err(|e| {
                            AdmissionError::Index(format!("{}: {}", path.display(), e))
                        })?;

                        self.register(&record)?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Write all indices into the `dists/` tree of a repository.
    ///
    /// Returns the paths written.
    pub fn write_dists(&self, base_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut written = vec![];

        for (slot, packages) in self.slots.borrow().iter() {
            let path = dists_path(base_dir, &slot.codename, &slot.component)
                .join(slot.kind.index_path(&slot.architecture));
            let parent = path
                .parent()
                .ok_or_else(|| AdmissionError::Index(format!("bad index path {}", path.display())))?;

            std::fs::create_dir_all(parent).map_err(|e| AdmissionError::io_path(parent, e))?;

            let mut temp = tempfile::NamedTempFile::new_in(parent)
                .map_err(|e| AdmissionError::io_path(parent, e))?;

            for (i, record) in packages.values().enumerate() {
                if i > 0 {
                    temp.write_all(b"\n")?;
                }
                record.control.write(&mut temp)?;
            }

            temp.persist(&path)
                .map_err(|e| AdmissionError::io_path(&path, e.error))?;

            written.push(path);
        }

        Ok(written)
    }
}

fn dists_path(base_dir: &Path, codename: &str, component: &str) -> PathBuf {
    base_dir.join("dists").join(codename).join(component)
}

fn record_from_paragraph(
    codename: &str,
    component: &str,
    kind: PackageKind,
    architecture: &str,
    control: ControlParagraph<'static>,
) -> Result<IndexRecord> {
    let context = format!("{} index", kind.as_ref());
    let package = control.required_field_str(&context, "Package")?.to_string();
    let version = control.required_field_str(&context, "Version")?.to_string();

    let file_keys = match kind {
        PackageKind::Deb | PackageKind::Udeb => {
            FileKeys::new(control.required_field_str(&context, "Filename")?.to_string())
        }
        PackageKind::Dsc => {
            let directory = control.required_field_str(&context, "Directory")?;
            let files = control.field_lines("Files").unwrap_or_default();

            let basenames = files
                .iter()
                .filter_map(|line| line.split_ascii_whitespace().nth(2))
                .collect::<Vec<_>>();

            let dsc = basenames
                .iter()
                .find(|name| name.ends_with(".dsc"))
                .ok_or_else(|| AdmissionError::RequiredFieldMissing {
                    file: context.clone(),
                    field: "Files".to_string(),
                })?;

            let mut keys = FileKeys::new(format!("{}/{}", directory, dsc));
            for name in basenames {
                keys.push(format!("{}/{}", directory, name));
            }

            keys
        }
    };

    Ok(IndexRecord {
        codename: codename.to_string(),
        component: component.to_string(),
        architecture: architecture.to_string(),
        kind,
        package,
        version,
        control,
        file_keys,
    })
}
