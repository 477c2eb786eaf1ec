// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Choosing the component a package lands in. */

use crate::error::{AdmissionError, Result};

/// Decides the component of a package.
pub trait ComponentGuesser {
    /// Resolve the component of a package.
    ///
    /// `forced` is a caller-supplied component and must be one of `components`.
    fn guess(
        &self,
        codename: &str,
        components: &[String],
        source: &str,
        section: &str,
        forced: Option<&str>,
    ) -> Result<String>;
}

/// Derives the component from the section.
///
/// A section `contrib/net` selects `contrib`. A section equal to a component
/// name selects that component. Anything else lands in `main` if the
/// distribution has it, else in its first component.
#[derive(Clone, Copy, Debug, Default)]
pub struct SectionComponentGuesser;

impl ComponentGuesser for SectionComponentGuesser {
    fn guess(
        &self,
        codename: &str,
        components: &[String],
        _source: &str,
        section: &str,
        forced: Option<&str>,
    ) -> Result<String> {
        if let Some(forced) = forced {
            return if components.iter().any(|c| c == forced) {
                Ok(forced.to_string())
            } else {
                Err(AdmissionError::UnknownComponent(
                    forced.to_string(),
                    codename.to_string(),
                ))
            };
        }

        let known = |name: &str| components.iter().find(|c| *c == name).cloned();

        if let Some((prefix, _)) = section.split_once('/') {
            if let Some(component) = known(prefix) {
                return Ok(component);
            }
        }

        known(section)
            .or_else(|| known("main"))
            .or_else(|| components.first().cloned())
            .ok_or_else(|| AdmissionError::NoComponents(codename.to_string()))
    }
}
