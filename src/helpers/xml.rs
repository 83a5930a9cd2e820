//! XML utilities for the SpreadsheetML parts of an xlsx package.
//! Wraps quick-xml with a reader tuned for worksheet streaming and a few
//! helper traits for attribute access, text collection and tag rewriting.

use crate::error::ScraperError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::io::BufRead;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),
}

/// XML reader wrapper configured for package parts.
///
/// Empty elements are expanded into start/end pairs so callers only ever
/// match on `Start` and `End`, and text is never trimmed so that a part can
/// be written back without changing its content.
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event, `None` at end of document
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, ScraperError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(ScraperError::XmlError(error)),
        }
    }

    /// Reads the next event detached from the internal buffer, so it can be
    /// held while reading continues
    pub(crate) fn next_owned(&mut self) -> Result<Option<Event<'static>>, ScraperError> {
        Ok(self.next()?.map(Event::into_owned))
    }
}

/// Helper trait for start tags: attribute lookup and rewriting
pub(crate) trait XmlNodeHelper {
    /// Gets the unescaped value of an attribute by name
    fn get_attribute_value(&self, name: &str) -> Result<Option<Cow<'_, str>>, ScraperError>;

    /// Copies this tag, replacing or appending the given attributes and
    /// dropping the ones listed in `remove`; every other attribute keeps its
    /// original order and raw value
    fn rewrite(&self, replace: &[(&str, &str)], remove: &[&str]) -> Result<BytesStart<'static>, ScraperError>;
}

impl XmlNodeHelper for BytesStart<'_> {
    fn get_attribute_value(&self, name: &str) -> Result<Option<Cow<'_, str>>, ScraperError> {
        match self.try_get_attribute(name)? {
            Some(attribute) => Ok(Some(attribute.unescape_value()?)),
            None => Ok(None),
        }
    }

    fn rewrite(&self, replace: &[(&str, &str)], remove: &[&str]) -> Result<BytesStart<'static>, ScraperError> {
        let name = std::str::from_utf8(self.name().as_ref())?.to_owned();
        let mut start = BytesStart::new(name);
        let mut pending: Vec<(&str, &str)> = replace.to_vec();
        for result in self.attributes() {
            let attribute = result?;
            let key = std::str::from_utf8(attribute.key.as_ref())?;
            if remove.contains(&key) {
                continue;
            }
            if let Some(position) = pending.iter().position(|(name, _)| *name == key) {
                let (name, value) = pending.remove(position);
                start.push_attribute((name, value));
            } else {
                start.push_attribute(attribute);
            }
        }
        for attribute in pending {
            start.push_attribute(attribute);
        }
        Ok(start.into_owned())
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends the character an entity or character reference stands for
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ScraperError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), ScraperError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
