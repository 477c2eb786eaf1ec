// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Content addressed storage of package files.

Files are stored under a pool key such as `pool/main/f/foo/foo_1.0.dsc`. A key
is written at most once. Admitting content under an existing key succeeds only
if the content is identical.
*/

use {
    crate::{
        checksum::{copy_digesting, ChecksumToken},
        error::{AdmissionError, Result},
    },
    slog::{debug, info, Logger},
    std::path::{Path, PathBuf},
};

/// Outcome of admitting a file into a [Pool].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PoolAdmission {
    /// The file was copied into the pool.
    Added,
    /// Identical content was already stored under the key.
    AlreadyPresent,
}

/// Storage of package files addressed by pool key.
pub trait Pool {
    /// Admit `<source_dir>/<basename>` under `pool_key`.
    ///
    /// The content must match `checksum`. If the key is already stored, its
    /// content must match `checksum` and nothing is written.
    fn admit(
        &self,
        source_dir: &Path,
        basename: &str,
        pool_key: &str,
        checksum: &ChecksumToken,
    ) -> Result<PoolAdmission>;

    /// Copy a file under `pool_key`, computing its checksum.
    ///
    /// If the key is already stored, its content must match the file.
    fn copy_and_hash(&self, pool_key: &str, source: &Path) -> Result<(ChecksumToken, PoolAdmission)>;

    /// The filesystem path of a pool key.
    fn path(&self, pool_key: &str) -> PathBuf;
}

/// A [Pool] stored in a local directory.
#[derive(Clone, Debug)]
pub struct FilesystemPool {
    root_dir: PathBuf,
    logger: Logger,
}

impl FilesystemPool {
    /// Construct an instance rooted at the repository base directory.
    pub fn new(logger: Logger, root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            logger,
        }
    }

    /// Checksum of the content stored under a key, if any.
    pub fn stored_checksum(&self, pool_key: &str) -> Result<Option<ChecksumToken>> {
        let path = self.path(pool_key);

        match std::fs::File::open(&path) {
            Ok(fh) => Ok(Some(ChecksumToken::from_reader(fh)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AdmissionError::io_path(path, e)),
        }
    }

    /// Copy `source` to the key through a temporary file.
    ///
    /// The destination only appears once the content is verified.
    fn write_new(
        &self,
        pool_key: &str,
        source: &Path,
        expected: Option<&ChecksumToken>,
    ) -> Result<ChecksumToken> {
        let dest = self.path(pool_key);
        let parent = dest
            .parent()
            .ok_or_else(|| AdmissionError::Other(format!("invalid pool key: {}", pool_key)))?;

        std::fs::create_dir_all(parent).map_err(|e| AdmissionError::io_path(parent, e))?;

        let fh = std::fs::File::open(source).map_err(|e| AdmissionError::io_path(source, e))?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| AdmissionError::io_path(parent, e))?;

        let actual = copy_digesting(fh, temp.as_file_mut())?;

        if let Some(expected) = expected {
            if &actual != expected {
                return Err(AdmissionError::ChecksumMismatch {
                    key: pool_key.to_string(),
                    expected: expected.to_string(),
                    actual: actual.to_string(),
                });
            }
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| AdmissionError::io_path(temp.path(), e))?;
        temp.persist(&dest)
            .map_err(|e| AdmissionError::io_path(&dest, e.error))?;

        info!(self.logger, "added {} to pool", pool_key);

        Ok(actual)
    }

    fn verify_existing(
        &self,
        pool_key: &str,
        expected: &ChecksumToken,
    ) -> Result<Option<PoolAdmission>> {
        match self.stored_checksum(pool_key)? {
            Some(stored) if &stored == expected => {
                debug!(self.logger, "{} already in pool", pool_key);
                Ok(Some(PoolAdmission::AlreadyPresent))
            }
            Some(stored) => Err(AdmissionError::ChecksumMismatch {
                key: pool_key.to_string(),
                expected: expected.to_string(),
                actual: stored.to_string(),
            }),
            None => Ok(None),
        }
    }
}

impl Pool for FilesystemPool {
    fn admit(
        &self,
        source_dir: &Path,
        basename: &str,
        pool_key: &str,
        checksum: &ChecksumToken,
    ) -> Result<PoolAdmission> {
        if let Some(admission) = self.verify_existing(pool_key, checksum)? {
            return Ok(admission);
        }

        self.write_new(pool_key, &source_dir.join(basename), Some(checksum))?;

        Ok(PoolAdmission::Added)
    }

    fn copy_and_hash(&self, pool_key: &str, source: &Path) -> Result<(ChecksumToken, PoolAdmission)> {
        if self.path(pool_key).exists() {
            let fh = std::fs::File::open(source).map_err(|e| AdmissionError::io_path(source, e))?;
            let checksum = ChecksumToken::from_reader(fh)?;

            if let Some(admission) = self.verify_existing(pool_key, &checksum)? {
                return Ok((checksum, admission));
            }
        }

        let checksum = self.write_new(pool_key, source, None)?;

        Ok((checksum, PoolAdmission::Added))
    }

    fn path(&self, pool_key: &str) -> PathBuf {
        self.root_dir.join(pool_key)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, testutil::get_logger},
    };

    const KEY: &str = "pool/main/f/foo/foo_1.0.tar.gz";

    fn setup() -> Result<(tempfile::TempDir, FilesystemPool, PathBuf, ChecksumToken)> {
        let td = tempfile::tempdir()?;
        let incoming = td.path().join("incoming");
        std::fs::create_dir_all(&incoming)?;
        std::fs::write(incoming.join("foo_1.0.tar.gz"), b"tarball")?;
        let checksum = ChecksumToken::from_reader(&b"tarball"[..])?;

        let pool = FilesystemPool::new(get_logger(), td.path().join("repo"));

        Ok((td, pool, incoming, checksum))
    }

    #[test]
    fn admit_and_readmit() -> Result<()> {
        let (_td, pool, incoming, checksum) = setup()?;

        assert_eq!(
            pool.admit(&incoming, "foo_1.0.tar.gz", KEY, &checksum)?,
            PoolAdmission::Added
        );
        assert_eq!(std::fs::read(pool.path(KEY))?, b"tarball");

        let modified = std::fs::metadata(pool.path(KEY))?.modified()?;
        assert_eq!(
            pool.admit(&incoming, "foo_1.0.tar.gz", KEY, &checksum)?,
            PoolAdmission::AlreadyPresent
        );
        assert_eq!(std::fs::metadata(pool.path(KEY))?.modified()?, modified);

        Ok(())
    }

    #[test]
    fn readmit_mismatch() -> Result<()> {
        let (_td, pool, incoming, checksum) = setup()?;
        pool.admit(&incoming, "foo_1.0.tar.gz", KEY, &checksum)?;

        let other = ChecksumToken::from_reader(&b"other content"[..])?;
        let err = pool
            .admit(&incoming, "foo_1.0.tar.gz", KEY, &other)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);

        Ok(())
    }

    #[test]
    fn source_mismatch_leaves_nothing() -> Result<()> {
        let (_td, pool, incoming, _) = setup()?;

        let declared = ChecksumToken::from_reader(&b"declared"[..])?;
        let err = pool
            .admit(&incoming, "foo_1.0.tar.gz", KEY, &declared)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IntegrityMismatch);

        let dir = pool.path(KEY).parent().unwrap().to_path_buf();
        assert_eq!(std::fs::read_dir(dir)?.count(), 0);

        Ok(())
    }

    #[test]
    fn missing_source() -> Result<()> {
        let (_td, pool, incoming, checksum) = setup()?;

        let err = pool
            .admit(&incoming, "absent.tar.gz", KEY, &checksum)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DownstreamFailure);
        assert!(!pool.path(KEY).exists());

        Ok(())
    }

    #[test]
    fn copy_and_hash() -> Result<()> {
        let (_td, pool, incoming, checksum) = setup()?;
        let source = incoming.join("foo_1.0.tar.gz");

        assert_eq!(
            pool.copy_and_hash(KEY, &source)?,
            (checksum.clone(), PoolAdmission::Added)
        );
        assert_eq!(
            pool.copy_and_hash(KEY, &source)?,
            (checksum, PoolAdmission::AlreadyPresent)
        );

        std::fs::write(&source, b"changed")?;
        assert_eq!(
            pool.copy_and_hash(KEY, &source).unwrap_err().kind(),
            ErrorKind::IntegrityMismatch
        );

        Ok(())
    }
}
