// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Content checksums of pooled files.

A [ChecksumToken] is the `<md5> <size>` pair that identifies file content
in `.changes` files and in the pool.
*/

use {
    crate::error::{AdmissionError, Result},
    digest::Digest,
    std::{
        fmt::{Display, Formatter},
        io::{Read, Write},
        str::FromStr,
    },
};

/// The MD5 digest and byte size of some content.
#[derive(Clone, Debug, Eq)]
pub struct ChecksumToken {
    md5: String,
    size: u64,
}

impl ChecksumToken {
    /// Construct an instance from a hex digest and a size.
    pub fn new(md5: impl ToString, size: u64) -> Result<Self> {
        let md5 = md5.to_string();

        if md5.is_empty() || !md5.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AdmissionError::ChecksumToken(format!("{} {}", md5, size)));
        }

        Ok(Self { md5, size })
    }

    /// Compute the token of all data in a reader.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut reader = DigestingReader::new(reader);
        std::io::copy(&mut reader, &mut std::io::sink())?;

        Ok(reader.finish().1)
    }

    /// The hex encoded MD5 digest.
    pub fn md5(&self) -> &str {
        &self.md5
    }

    /// The size of the content in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }
}

/// Digests compare case insensitively.
impl PartialEq for ChecksumToken {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.md5.eq_ignore_ascii_case(&other.md5)
    }
}

impl Display for ChecksumToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.md5, self.size)
    }
}

impl FromStr for ChecksumToken {
    type Err = AdmissionError;

    /// Parse `<md5> <size>`, split at the first run of whitespace.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || AdmissionError::ChecksumToken(s.to_string());

        let (md5, size) = s.trim().split_once(char::is_whitespace).ok_or_else(invalid)?;
        let size = size.trim_start();

        if size.is_empty() || !size.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        Self::new(md5, u64::from_str(size)?).map_err(|_| invalid())
    }
}

/// A [Read] adapter that computes a [ChecksumToken] as data is read.
pub struct DigestingReader<R> {
    hasher: md5::Md5,
    size: u64,
    source: R,
}

impl<R> DigestingReader<R> {
    /// Construct a new instance from a source reader.
    pub fn new(source: R) -> Self {
        Self {
            hasher: md5::Md5::new(),
            size: 0,
            source,
        }
    }

    /// Finish the stream.
    ///
    /// Returns the source reader and the [ChecksumToken] of everything read.
    pub fn finish(self) -> (R, ChecksumToken) {
        let token = ChecksumToken {
            md5: hex::encode(self.hasher.finalize()),
            size: self.size,
        };

        (self.source, token)
    }
}

impl<R: Read> Read for DigestingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let size = self.source.read(buf)?;

        if size > 0 {
            self.hasher.update(&buf[0..size]);
            self.size += size as u64;
        }

        Ok(size)
    }
}

/// Copy a reader into a writer, returning the [ChecksumToken] of the copied data.
pub fn copy_digesting(reader: impl Read, writer: &mut impl Write) -> Result<ChecksumToken> {
    let mut reader = DigestingReader::new(reader);
    std::io::copy(&mut reader, writer)?;

    Ok(reader.finish().1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_token() -> Result<()> {
        let token = ChecksumToken::from_str("d41d8cd98f00b204e9800998ecf8427e  0")?;
        assert_eq!(token.md5(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(token.size(), 0);
        assert_eq!(token.to_string(), "d41d8cd98f00b204e9800998ecf8427e 0");

        assert!(ChecksumToken::from_str("d41d8cd98f00b204e9800998ecf8427e").is_err());
        assert!(ChecksumToken::from_str("xyz 10").is_err());
        assert!(ChecksumToken::from_str("abc 1x").is_err());
        assert!(ChecksumToken::from_str("abc -1").is_err());

        Ok(())
    }

    #[test]
    fn compare_case_insensitive() -> Result<()> {
        assert_eq!(
            ChecksumToken::new("ABCDEF", 3)?,
            ChecksumToken::new("abcdef", 3)?
        );
        assert_ne!(
            ChecksumToken::new("abcdef", 3)?,
            ChecksumToken::new("abcdef", 4)?
        );

        Ok(())
    }

    #[test]
    fn digest_reader() -> Result<()> {
        let token = ChecksumToken::from_reader(&b""[..])?;
        assert_eq!(token.to_string(), "d41d8cd98f00b204e9800998ecf8427e 0");

        let mut out = vec![];
        let token = copy_digesting(&b"hello world"[..], &mut out)?;
        assert_eq!(out, b"hello world");
        assert_eq!(token.md5(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(token.size(), 11);

        Ok(())
    }
}
