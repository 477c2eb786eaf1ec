// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Admission of Debian uploads into a pooled package repository.

This crate implements the path a package takes from an upload directory into a
Debian repository: validating the `.changes` file describing an upload, copying
the referenced files into the content addressed `pool/`, completing the control
metadata of each package and registering it into the indices of a distribution.

The canonical home of this crate is <https://github.com/indygreg/PyOxidizer>. Please file issues
and pull requests there.

# A Tour of Functionality

[checkin::Admitter] is the entry point. [checkin::Admitter::admit_upload] admits a
`.changes` file and everything it references. [checkin::Admitter::admit_binary]
admits a lone `.deb` or `.udeb`.

`.changes` files are modeled by [changes::ChangesFile]. Each line of its `Files`
field is parsed into a [changes::file_line::FileReference], which classifies the
file by name as a binary package, a source control file, a tarball, etc.

Binary packages being admitted are modeled by [checkin::binary::BinaryArtifact].
Their control metadata is read out of the `.deb` by a [deb::ControlExtractor].
Source packages are admitted by a [checkin::source::SourceAdmission].

Files are stored in a [pool::Pool]. [pool::FilesystemPool] stores them in a local
directory, keyed by a path computed by [names::PoolLayout]. Content is identified
by a [checksum::ChecksumToken].

Admitted packages are registered into a [index::PackageIndex].
[index::InMemoryPackageIndex] holds them in memory and can read and write the
`Packages` and `Sources` files under `dists/`.

Control files are parsed by the [control] module. Files with PGP cleartext
signatures are handled by [signed]. Signatures are not verified.

Repositories and their distributions are configured through
[config::RepositoryConfig]. How strict admission is can be tuned through
[policy::ForcePolicy].

Errors are represented by [error::AdmissionError]. [error::AdmissionError::kind]
classifies them.
*/

pub mod binary_package_control;
pub mod changes;
pub mod checkin;
pub mod checksum;
pub mod component;
pub mod config;
pub mod control;
pub mod deb;
pub mod error;
pub mod index;
pub mod names;
pub mod package_version;
pub mod policy;
pub mod pool;
pub mod signed;
#[cfg(test)]
mod testutil;
