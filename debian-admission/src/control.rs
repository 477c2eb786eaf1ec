// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Control paragraphs as found in `.changes`, `.dsc`, `DEBIAN/control` and index files.

See <https://www.debian.org/doc/debian-policy/ch-controlfields.html>
for the canonical source of truth for how control files work.
*/

use {
    crate::error::{AdmissionError, Result},
    std::{
        borrow::Cow,
        io::{BufRead, Write},
    },
};

/// A field in a control paragraph.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlField<'a> {
    name: Cow<'a, str>,
    value: Cow<'a, str>,
}

impl<'a> ControlField<'a> {
    /// Construct an instance from a field name and value.
    pub fn new(name: Cow<'a, str>, value: Cow<'a, str>) -> Self {
        Self { name, value }
    }

    /// Construct an instance from an iterable of lines.
    ///
    /// The first line becomes the (possibly empty) text after the colon. Each
    /// following line is written as a continuation line.
    pub fn from_lines(name: Cow<'a, str>, lines: impl Iterator<Item = String>) -> Self {
        let value = lines
            .enumerate()
            .map(|(i, line)| if i == 0 { line } else { format!(" {}", line) })
            .collect::<Vec<_>>()
            .join("\n")
            .into();

        Self { name, value }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Whether this field has the given name, compared case insensitively.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Obtain the value as a [&str].
    ///
    /// The value's original file formatting (including newlines and leading whitespace)
    /// is included.
    pub fn value_str(&self) -> &str {
        self.value.as_ref()
    }

    /// Obtain an iterator of words in the value.
    pub fn iter_words(&self) -> impl Iterator<Item = &str> {
        self.value.split_ascii_whitespace()
    }

    /// Obtain an iterator of non-empty lines in the value.
    ///
    /// Leading whitespace from each line is stripped.
    pub fn iter_lines(&self) -> impl Iterator<Item = &str> {
        self.value
            .lines()
            .map(|x| x.trim_start())
            .filter(|x| !x.is_empty())
    }

    /// Write the contents of this field to a writer.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.name.as_bytes())?;
        writer.write_all(b":")?;
        if !self.value.is_empty() && !self.value.starts_with('\n') {
            writer.write_all(b" ")?;
        }
        writer.write_all(self.value.as_bytes())?;
        writer.write_all(b"\n")
    }
}

impl<'a> ToString for ControlField<'a> {
    fn to_string(&self) -> String {
        if self.value.is_empty() || self.value.starts_with('\n') {
            format!("{}:{}\n", self.name, self.value)
        } else {
            format!("{}: {}\n", self.name, self.value)
        }
    }
}

/// A paragraph in a control file.
///
/// A paragraph is an ordered series of control fields.
///
/// Field names are case insensitive on read and case preserving on set.
///
/// Paragraphs can only contain a single occurrence of a field and this is enforced through
/// the mutation APIs.
#[derive(Clone, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct ControlParagraph<'a> {
    fields: Vec<ControlField<'a>>,
}

impl<'a> ControlParagraph<'a> {
    /// Whether the paragraph is empty.
    ///
    /// Empty is defined by the lack of any fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.is_named(name))
    }

    /// Set the value of a field via a [ControlField].
    ///
    /// If a field with the same name (case insensitive compare) already exists, the old value
    /// is replaced in place. Otherwise the field is appended.
    pub fn set_field(&mut self, field: ControlField<'a>) {
        if let Some(pos) = self.position(field.name()) {
            self.fields[pos] = field;
        } else {
            self.fields.push(field);
        }
    }

    /// Set the value of a field defined via strings.
    pub fn set_field_from_string(&mut self, name: Cow<'a, str>, value: Cow<'a, str>) {
        self.set_field(ControlField::new(name, value));
    }

    /// Remove a field, returning it if it was present.
    pub fn remove_field(&mut self, name: &str) -> Option<ControlField<'a>> {
        self.position(name).map(|pos| self.fields.remove(pos))
    }

    /// Rename a field, preserving its position and value.
    pub fn rename_field(&mut self, from: &str, to: &'a str) {
        if let Some(pos) = self.position(from) {
            let value = self.fields[pos].value.clone();
            self.fields[pos] = ControlField::new(Cow::Borrowed(to), value);
        }
    }

    /// Insert fields immediately before the field named `anchor`.
    ///
    /// Any existing field sharing a name with an incoming field is removed first, so
    /// applying the same insertion repeatedly yields a single copy of each field.
    /// Incoming fields keep their relative order. If `anchor` is not present, the
    /// fields are appended.
    pub fn insert_fields_before(
        &mut self,
        anchor: &str,
        fields: impl IntoIterator<Item = ControlField<'a>>,
    ) {
        let fields = fields.into_iter().collect::<Vec<_>>();

        self.fields
            .retain(|existing| !fields.iter().any(|f| existing.is_named(f.name())));

        let pos = self.position(anchor).unwrap_or(self.fields.len());
        self.fields.splice(pos..pos, fields);
    }

    /// Whether a named field is present in this paragraph.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate over fields in this paragraph.
    ///
    /// Iteration order is insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField<'a>> {
        self.fields.iter()
    }

    /// Obtain the field with a given name in this paragraph.
    pub fn field(&self, name: &str) -> Option<&'_ ControlField<'a>> {
        self.fields.iter().find(|f| f.is_named(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the raw string value of a field that must be present.
    ///
    /// `context` names the file the paragraph came from and is used in the error.
    pub fn required_field_str(&self, context: &str, name: &str) -> Result<&str> {
        self.field_str(name)
            .ok_or_else(|| AdmissionError::RequiredFieldMissing {
                file: context.to_string(),
                field: name.to_string(),
            })
    }

    /// Obtain the words of the named field.
    pub fn field_words(&self, name: &str) -> Option<Vec<&str>> {
        self.field(name).map(|f| f.iter_words().collect())
    }

    /// Obtain the non-empty, left-trimmed lines of the named field.
    pub fn field_lines(&self, name: &str) -> Option<Vec<&str>> {
        self.field(name).map(|f| f.iter_lines().collect())
    }

    /// Serialize the paragraph to a writer.
    ///
    /// A trailing newline is written as part of the final field. However, an
    /// extra newline is not present. So if serializing multiple paragraphs, an
    /// additional line break must be written to effectively terminate this paragraph
    /// if the writer is not at EOF.
    pub fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in &self.fields {
            field.write(writer)?;
        }

        Ok(())
    }

    /// Convert to an instance that owns all its data.
    pub fn into_owned(self) -> ControlParagraph<'static> {
        ControlParagraph {
            fields: self
                .fields
                .into_iter()
                .map(|f| ControlField {
                    name: Cow::Owned(f.name.into_owned()),
                    value: Cow::Owned(f.value.into_owned()),
                })
                .collect(),
        }
    }
}

impl<'a> ToString for ControlParagraph<'a> {
    fn to_string(&self) -> String {
        let fields = self
            .fields
            .iter()
            .map(|f| f.to_string())
            .collect::<Vec<_>>();

        fields.join("")
    }
}

/// Holds parsing state for Debian control files.
///
/// Instances of this type are essentially fed lines of text and periodically emit
/// [ControlParagraph] instances as they are completed.
#[derive(Clone, Debug, Default)]
pub struct ControlFileParser {
    paragraph: ControlParagraph<'static>,
    field: Option<String>,
}

impl ControlFileParser {
    /// Write a line to the parser.
    ///
    /// If the line terminates an in-progress paragraph, that paragraph will be returned.
    /// Otherwise `Ok(None)` is returned.
    ///
    /// `Err` is returned if the control file in invalid.
    pub fn write_line(&mut self, line: &str) -> Result<Option<ControlParagraph<'static>>> {
        let is_empty_line = line.trim().is_empty();
        let is_indented = (line.starts_with(' ') || line.starts_with('\t')) && !is_empty_line;

        let current_field = self.field.take();

        // Empty lines signify the end of a paragraph. Flush any state.
        if is_empty_line {
            if let Some(field) = current_field {
                self.flush_field(field)?;
            }

            return Ok(if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            });
        }

        match (current_field, is_indented) {
            // A new field starts. Flush the one on the stack.
            (Some(v), false) => {
                self.flush_field(v)?;
                self.field = Some(line.to_string());

                Ok(None)
            }
            (None, false) => {
                self.field = Some(line.to_string());

                Ok(None)
            }
            // Continuation line.
            (Some(v), true) => {
                self.field = Some(v + line);

                Ok(None)
            }
            (None, true) => Err(AdmissionError::ControlParseError(format!(
                "continuation line without a field: '{}'",
                line.trim_end()
            ))),
        }
    }

    /// Finish parsing, consuming self.
    ///
    /// If a non-empty paragraph is present in the instance, it will be returned. Else if there
    /// is no unflushed state, None is returned.
    pub fn finish(mut self) -> Result<Option<ControlParagraph<'static>>> {
        if let Some(field) = self.field.take() {
            self.flush_field(field)?;
        }

        Ok(if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        })
    }

    fn flush_field(&mut self, v: String) -> Result<()> {
        let (name, value) = v.split_once(':').ok_or_else(|| {
            AdmissionError::ControlParseError(format!(
                "error parsing line '{}'; missing colon",
                v.trim_end()
            ))
        })?;

        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(AdmissionError::ControlParseError(format!(
                "invalid field name '{}'",
                name
            )));
        }

        // Continuation lines keep their leading whitespace. Only the text on the
        // first line is trimmed.
        let value = value.trim_start_matches([' ', '\t']).trim_end();

        self.paragraph
            .set_field_from_string(Cow::Owned(name.to_string()), Cow::Owned(value.to_string()));

        Ok(())
    }
}

/// A reader for [ControlParagraph].
///
/// Instances are bound to a reader, which is capable of feeding lines into a parser.
///
/// Instances can be consumed as an iterator. Each call into the iterator will attempt to
/// read a full paragraph from the underlying reader.
pub struct ControlParagraphReader<R: BufRead> {
    reader: R,
    parser: Option<ControlFileParser>,
}

impl<R: BufRead> ControlParagraphReader<R> {
    /// Create a new instance bound to a reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            parser: Some(ControlFileParser::default()),
        }
    }

    /// Consumes the instance, returning the original reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn get_next(&mut self) -> Result<Option<ControlParagraph<'static>>> {
        let mut parser = match self.parser.take() {
            Some(parser) => parser,
            None => return Ok(None),
        };

        loop {
            let mut line = String::new();

            let bytes_read = self.reader.read_line(&mut line)?;

            if bytes_read != 0 {
                if let Some(paragraph) = parser.write_line(&line)? {
                    self.parser.replace(parser);
                    return Ok(Some(paragraph));
                }
            } else {
                return parser.finish();
            }
        }
    }
}

impl<R: BufRead> Iterator for ControlParagraphReader<R> {
    type Item = Result<ControlParagraph<'static>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.get_next().transpose()
    }
}

/// Parse exactly one paragraph from a reader.
///
/// `context` names the source of the data for error messages.
pub fn read_single_paragraph<R: BufRead>(
    reader: R,
    context: &str,
) -> Result<ControlParagraph<'static>> {
    let mut paragraphs = ControlParagraphReader::new(reader);

    let paragraph = paragraphs
        .next()
        .ok_or_else(|| AdmissionError::ControlNoParagraph(context.to_string()))??;

    if paragraphs.next().transpose()?.is_some() {
        return Err(AdmissionError::ControlMultipleParagraphs(
            context.to_string(),
        ));
    }

    Ok(paragraph)
}
