//! Repository archive decoding.
//!
//! GitLab serves archives as tar.gz by default, plain tar or zip on
//! request. Decoding yields the members in archive order; interpreting the
//! paths (top-level directory, sub-path scoping) is left to the caller.

use std::io::{Cursor, Read};

use flate2::read::GzDecoder;
use tar::Archive;
use zip::ZipArchive;

use crate::error::{ReaderError, Result};

/// Archive container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Tar,
    Zip,
}

impl ArchiveFormat {
    /// Pick a format from response metadata, falling back to magic bytes.
    ///
    /// Content type is consulted first, then the suggested filename. GitLab
    /// often labels archives `application/octet-stream`, which says nothing.
    pub fn detect(content_type: Option<&str>, filename: Option<&str>, bytes: &[u8]) -> Option<Self> {
        content_type
            .and_then(Self::from_content_type)
            .or_else(|| filename.and_then(Self::from_filename))
            .or_else(|| Self::from_magic(bytes))
    }

    fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/gzip" | "application/x-gzip" | "application/x-compressed-tar" => {
                Some(Self::TarGz)
            }
            "application/x-tar" => Some(Self::Tar),
            "application/zip" | "application/x-zip-compressed" => Some(Self::Zip),
            _ => None,
        }
    }

    fn from_filename(filename: &str) -> Option<Self> {
        let name = filename.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }

    fn from_magic(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if bytes.starts_with(b"PK\x03\x04") || bytes.starts_with(b"PK\x05\x06") {
            Some(Self::Zip)
        } else if bytes.get(257..262) == Some(b"ustar") {
            Some(Self::Tar)
        } else {
            None
        }
    }
}

/// One archive member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Member path with `/` separators, as stored in the archive.
    pub name: String,
    pub is_directory: bool,
    pub content: Vec<u8>,
}

/// Decode every member of `bytes`. Links and metadata records are skipped.
pub fn decode(format: ArchiveFormat, bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    match format {
        ArchiveFormat::TarGz => decode_tar(GzDecoder::new(bytes)),
        ArchiveFormat::Tar => decode_tar(bytes),
        ArchiveFormat::Zip => decode_zip(bytes),
    }
}

fn decode_tar<R: Read>(reader: R) -> Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(reader);
    let mut entries = Vec::new();
    for entry in archive.entries()? {
        let mut entry = entry?;
        let kind = entry.header().entry_type();
        let is_directory = kind.is_dir();
        if !is_directory && !kind.is_file() {
            continue;
        }
        let name = entry.path()?.to_string_lossy().replace('\\', "/");
        let mut content = Vec::new();
        if !is_directory {
            entry.read_to_end(&mut content)?;
        }
        entries.push(ArchiveEntry {
            name,
            is_directory,
            content,
        });
    }
    Ok(entries)
}

fn decode_zip(bytes: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let is_directory = entry.is_dir();
        let name = entry.name().to_string();
        let mut content = Vec::new();
        if !is_directory {
            entry.read_to_end(&mut content)?;
        }
        entries.push(ArchiveEntry {
            name,
            is_directory,
            content,
        });
    }
    Ok(entries)
}

/// Extract the `filename` parameter of a `Content-Disposition` header.
pub fn disposition_filename(value: &str) -> Option<&str> {
    value.split(';').map(str::trim).find_map(|param| {
        let (key, val) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("filename")
            .then(|| val.trim().trim_matches('"'))
    })
}

/// Describe an undecodable response for error messages.
pub(crate) fn unknown_format(content_type: Option<&str>, filename: Option<&str>) -> ReaderError {
    ReaderError::archive(format!(
        "unrecognized archive format (content type {}, filename {})",
        content_type.unwrap_or("none"),
        filename.unwrap_or("none")
    ))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use zip::write::FileOptions;

    use super::*;

    fn tar_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .add_directory("repo-main/", FileOptions::default())
            .unwrap();
        for (path, data) in files {
            writer.start_file(*path, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_detect_prefers_content_type_then_filename_then_magic() {
        let gz = gzip(b"x");
        assert_eq!(
            ArchiveFormat::detect(Some("application/zip"), Some("a.tar.gz"), &gz),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::detect(Some("application/octet-stream"), Some("repo-main.zip"), &gz),
            Some(ArchiveFormat::Zip)
        );
        assert_eq!(
            ArchiveFormat::detect(Some("application/octet-stream"), None, &gz),
            Some(ArchiveFormat::TarGz)
        );
        assert_eq!(
            ArchiveFormat::detect(None, None, &tar_bytes(&[("a", b"1")])),
            Some(ArchiveFormat::Tar)
        );
        assert_eq!(ArchiveFormat::detect(None, None, b"plain text"), None);
    }

    #[test]
    fn test_decode_tar_gz_keeps_member_order() {
        let bytes = gzip(&tar_bytes(&[
            ("repo-main/mkdocs.yml", b"site_name: x"),
            ("repo-main/docs/index.md", b"# Hello"),
        ]));
        let entries = decode(ArchiveFormat::TarGz, &bytes).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["repo-main/mkdocs.yml", "repo-main/docs/index.md"]);
        assert_eq!(entries[1].content, b"# Hello");
    }

    #[test]
    fn test_decode_zip_reports_directories() {
        let bytes = zip_bytes(&[("repo-main/a.txt", b"a")]);
        let entries = decode(ArchiveFormat::Zip, &bytes).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory);
        assert_eq!(entries[1].name, "repo-main/a.txt");
        assert_eq!(entries[1].content, b"a");
    }

    #[test]
    fn test_corrupt_archive_is_an_archive_error() {
        let err = decode(ArchiveFormat::Zip, b"PK\x03\x04garbage").unwrap_err();
        assert!(matches!(err, ReaderError::Archive(_)));
    }

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename(r#"attachment; filename="repo-main-abc.tar.gz""#),
            Some("repo-main-abc.tar.gz")
        );
        assert_eq!(disposition_filename("attachment; FILENAME=x.zip"), Some("x.zip"));
        assert_eq!(disposition_filename("inline"), None);
    }
}
