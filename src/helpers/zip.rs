//! ZIP package helpers for xlsx workbooks.
//! Lookup of package parts by name, and rebuilding a package with some parts
//! replaced while every other entry is copied through byte for byte.

use crate::error::ScraperError;
use crate::helpers::xml::XmlReader;
use std::collections::HashMap;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;

/// Helper trait for ZIP archive operations on package parts
pub(crate) trait ZipHelper<RS: Read + Seek> {
    /// Gets a part from the archive by name (case-insensitive, path separator agnostic)
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ScraperError>;

    /// Creates an XML reader for a part within the archive
    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ScraperError>;

    /// Reads a whole part into memory
    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ScraperError>;

    /// Writes a copy of the archive in which the parts named in
    /// `replacements` get new content; all other entries keep their original
    /// order, compression and bytes
    fn repackage(&mut self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, ScraperError>;
}

impl<RS: Read + Seek> ZipHelper<RS> for ZipArchive<RS> {
    fn file(&'_ mut self, name: &str) -> Result<Option<ZipFile<'_, RS>>, ScraperError> {
        let pattern = name.replace('\\', "/");
        let path = self.file_names()
            .find(|file_name| pattern.eq_ignore_ascii_case(file_name))
            .map(|file_name| file_name.to_owned());
        match path.map(|file_name| self.by_name(&file_name)).transpose() {
            Ok(Some(file)) => Ok(Some(file)),
            Ok(None) | Err(ZipError::FileNotFound) => Ok(None),
            Err(error) => Err(error)?,
        }
    }

    fn xml_reader(
        &'_ mut self,
        name: &str,
    ) -> Result<Option<XmlReader<BufReader<ZipFile<'_, RS>>>>, ScraperError> {
        let reader = self
            .file(name)?
            .map(|file| XmlReader::new(BufReader::new(file)));
        Ok(reader)
    }

    fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, ScraperError> {
        match self.file(name)? {
            Some(mut file) => {
                let mut bytes = Vec::with_capacity(file.size() as usize);
                file.read_to_end(&mut bytes)?;
                Ok(Some(bytes))
            }
            None => Ok(None),
        }
    }

    fn repackage(&mut self, replacements: &HashMap<String, Vec<u8>>) -> Result<Vec<u8>, ScraperError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for index in 0..self.len() {
            let file = self.by_index_raw(index)?;
            let name = file.name().to_owned();
            match replacements.get(&name) {
                Some(bytes) => {
                    drop(file);
                    writer.start_file(name, deflated())?;
                    writer.write_all(bytes)?;
                }
                None => writer.raw_copy_file(file)?,
            }
        }
        Ok(writer.finish()?.into_inner())
    }
}

/// Builds a new archive from `(name, content)` parts in the given order
pub(crate) fn write_package(parts: &[(&str, &[u8])]) -> Result<Vec<u8>, ScraperError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, bytes) in parts {
        writer.start_file(*name, deflated())?;
        writer.write_all(bytes)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(parts: &[(&str, &[u8])]) -> ZipArchive<Cursor<Vec<u8>>> {
        ZipArchive::new(Cursor::new(write_package(parts).unwrap())).unwrap()
    }

    #[test]
    fn file_lookup_ignores_case_and_separators() {
        let mut zip = archive(&[("xl/workbook.xml", b"<workbook/>")]);
        assert!(zip.file("XL\\Workbook.xml").unwrap().is_some());
        assert!(zip.file("xl/styles.xml").unwrap().is_none());
    }

    #[test]
    fn repackage_replaces_only_named_parts() {
        let mut zip = archive(&[
            ("a.xml", b"<a/>"),
            ("b.xml", b"<b/>"),
            ("c.xml", b"<c/>"),
        ]);
        let replacements = HashMap::from([("b.xml".to_owned(), b"<b>new</b>".to_vec())]);
        let mut rebuilt = ZipArchive::new(Cursor::new(zip.repackage(&replacements).unwrap())).unwrap();

        let names: Vec<_> = rebuilt.file_names().map(str::to_owned).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(rebuilt.by_index(0).unwrap().name(), "a.xml");
        assert_eq!(rebuilt.by_index(1).unwrap().name(), "b.xml");
        assert_eq!(rebuilt.by_index(2).unwrap().name(), "c.xml");
        assert_eq!(rebuilt.read_bytes("a.xml").unwrap().unwrap(), b"<a/>");
        assert_eq!(rebuilt.read_bytes("b.xml").unwrap().unwrap(), b"<b>new</b>");
        assert_eq!(rebuilt.read_bytes("c.xml").unwrap().unwrap(), b"<c/>");
    }
}
