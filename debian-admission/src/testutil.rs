// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::error::Result,
    slog::Drain,
    std::io::Write,
};

/// A slog Drain that uses println!.
pub struct PrintlnDrain {
    /// Minimum logging level that we're emitting.
    pub min_level: slog::Level,
}

impl slog::Drain for PrintlnDrain {
    type Ok = ();
    type Err = std::io::Error;

    fn log(
        &self,
        record: &slog::Record,
        _values: &slog::OwnedKVList,
    ) -> std::result::Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.min_level) {
            println!("{}", record.msg());
        }

        Ok(())
    }
}

pub fn get_logger() -> slog::Logger {
    slog::Logger::root(
        PrintlnDrain {
            min_level: slog::Level::Warning,
        }
        .fuse(),
        slog::o!(),
    )
}

/// Build a minimal `.deb` holding the given `control` file and an empty data archive.
pub fn build_deb(control: &str) -> Result<Vec<u8>> {
    let mut control_tar = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(control.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    control_tar.append_data(&mut header, "control", control.as_bytes())?;
    let control_tar = control_tar.into_inner()?;

    let mut control_tar_gz = Vec::new();
    let mut encoder = libflate::gzip::Encoder::new(&mut control_tar_gz)?;
    encoder.write_all(&control_tar)?;
    encoder.finish().into_result()?;

    build_deb_with_control_member("control.tar.gz", control_tar_gz)
}

/// Build a `.deb` whose control member has the given name and raw content.
pub fn build_deb_with_control_member(name: &str, control: Vec<u8>) -> Result<Vec<u8>> {
    let data_tar = tar::Builder::new(Vec::new()).into_inner()?;

    let mut deb = Vec::new();
    let mut builder = ar::Builder::new(&mut deb);
    for (name, data) in [
        ("debian-binary", b"2.0\n".to_vec()),
        (name, control),
        ("data.tar", data_tar),
    ] {
        let mut header = ar::Header::new(name.as_bytes().to_vec(), data.len() as _);
        header.set_mode(0o644);
        builder.append(&header, &*data)?;
    }
    drop(builder);

    Ok(deb)
}
