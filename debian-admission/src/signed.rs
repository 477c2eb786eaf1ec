// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Reading of possibly PGP cleartext signed control files.

Signatures are parsed so the armor can be stripped. They are not verified.
*/

use {
    crate::{
        control::{read_single_paragraph, ControlParagraph},
        error::{AdmissionError, Result},
    },
    slog::{debug, Logger},
    std::{
        io::{BufReader, Cursor},
        path::Path,
    },
};

const SIGNED_MESSAGE_HEADER: &[u8] = b"-----BEGIN PGP SIGNED MESSAGE-----";

/// Parse the single control paragraph of a file that may be cleartext signed.
pub fn read_signed_paragraph(logger: &Logger, path: &Path) -> Result<ControlParagraph<'static>> {
    let data = std::fs::read(path).map_err(|e| AdmissionError::io_path(path, e))?;

    parse_signed_paragraph(logger, &data, &path.display().to_string())
}

/// Parse the single control paragraph of possibly signed data.
///
/// `context` names the data in log messages and errors.
pub fn parse_signed_paragraph(
    logger: &Logger,
    data: &[u8],
    context: &str,
) -> Result<ControlParagraph<'static>> {
    let malformed = |e: AdmissionError| match e {
        AdmissionError::Io(e) => {
            AdmissionError::ControlParseError(format!("{}: {}", context, e))
        }
        e => e,
    };

    if data.starts_with(SIGNED_MESSAGE_HEADER) {
        let mut reader = BufReader::new(pgp_cleartext::CleartextSignatureReader::new(
            Cursor::new(data),
        ));

        let paragraph = read_single_paragraph(&mut reader, context).map_err(malformed)?;

        let signatures = reader.into_inner().finalize();
        debug!(
            logger,
            "{}: stripped {} unverified signature(s)",
            context,
            signatures.iter_signatures().count()
        );

        Ok(paragraph)
    } else {
        debug!(logger, "{}: not signed", context);
        read_single_paragraph(Cursor::new(data), context).map_err(malformed)
    }
}
