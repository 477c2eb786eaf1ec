// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading control metadata out of `.deb` files.

A `.deb` binary package file is an ar archive with 3 entries:

1. `debian-binary` holding the version of the binary package format.
2. `control.tar[.<ext>]` holding package metadata.
3. `data.tar[.<ext>]` holding file content.
*/

use {
    crate::{
        control::{read_single_paragraph, ControlParagraph},
        error::{AdmissionError, Result},
    },
    std::{
        io::{Cursor, Read},
        path::Path,
    },
};

/// Extracts the control paragraph of a binary package file.
pub trait ControlExtractor {
    fn extract_control(&self, path: &Path) -> Result<ControlParagraph<'static>>;
}

/// A [ControlExtractor] for `.deb` and `.udeb` files.
#[derive(Clone, Copy, Debug, Default)]
pub struct DebControlExtractor;

impl ControlExtractor for DebControlExtractor {
    fn extract_control(&self, path: &Path) -> Result<ControlParagraph<'static>> {
        let fh = std::fs::File::open(path).map_err(|e| AdmissionError::io_path(path, e))?;

        read_deb_control(std::io::BufReader::new(fh), &path.display().to_string())
    }
}

fn reader_from_filename(
    extension: &str,
    data: Cursor<Vec<u8>>,
    context: &str,
) -> Result<Box<dyn Read>> {
    match extension {
        "" => Ok(Box::new(data)),
        ".gz" => Ok(Box::new(
            libflate::gzip::Decoder::new(data).map_err(|e| malformed(context, e))?,
        )),
        ".xz" => Ok(Box::new(xz2::read::XzDecoder::new(data))),
        ".zst" => Ok(Box::new(
            zstd::Decoder::new(data).map_err(|e| malformed(context, e))?,
        )),
        _ => Err(AdmissionError::DebUnknownCompression(extension.to_string())),
    }
}

/// Read the control paragraph from a `.deb` stream.
///
/// `context` names the package in errors.
pub fn read_deb_control(reader: impl Read, context: &str) -> Result<ControlParagraph<'static>> {
    let mut archive = ar::Archive::new(reader);

    while let Some(entry) = archive.next_entry() {
        let mut entry = entry.map_err(|e| malformed(context, e))?;

        // ar identifiers of .deb members are ASCII.
        let filename = String::from_utf8_lossy(entry.header().identifier()).to_string();

        if filename == "debian-binary" || filename.starts_with("data.tar") {
            continue;
        }

        let tail = filename
            .strip_prefix("control.tar")
            .ok_or_else(|| AdmissionError::DebUnknownEntry(context.to_string(), filename.clone()))?;

        let mut data = vec![];
        data.try_reserve_exact(entry.header().size() as usize)?;
        entry
            .read_to_end(&mut data)
            .map_err(|e| malformed(context, e))?;

        return read_control_tar(reader_from_filename(tail, Cursor::new(data), context)?, context);
    }

    Err(AdmissionError::DebNoControl(context.to_string()))
}

fn read_control_tar(reader: Box<dyn Read>, context: &str) -> Result<ControlParagraph<'static>> {
    let mut archive = tar::Archive::new(reader);

    for entry in archive.entries().map_err(|e| malformed(context, e))? {
        let mut entry = entry.map_err(|e| malformed(context, e))?;

        let path_bytes = entry.path_bytes().to_vec();
        let path = String::from_utf8_lossy(&path_bytes);

        if path.trim_start_matches("./") == "control" {
            let mut data = vec![];
            data.try_reserve_exact(entry.header().size().unwrap_or(0) as usize)?;
            entry
                .read_to_end(&mut data)
                .map_err(|e| malformed(context, e))?;

            return read_single_paragraph(Cursor::new(data), context);
        }
    }

    Err(AdmissionError::DebNoControl(context.to_string()))
}

fn malformed(context: &str, e: std::io::Error) -> AdmissionError {
    AdmissionError::ControlParseError(format!("{}: {}", context, e))
}
