//! Zip assembly.

use std::io::{Cursor, Write};

use bytes::Bytes;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use sketchbook_core::error::{Result, SketchbookError};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

/// A fetched image ready to be archived.
#[derive(Debug, Clone)]
pub struct ArchivedImage {
    /// Position of the result in the game's result list.
    pub ordinal: usize,
    pub name: String,
    pub bytes: Bytes,
}

/// `image_<ordinal>.<ext>`, where `ext` comes from the URL path when it names
/// a known image type and is `png` otherwise.
pub fn entry_name(ordinal: usize, url: &str) -> String {
    format!("image_{ordinal}.{}", extension_for(url))
}

fn extension_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    let last = path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.')
        .and_then(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .find(|known| known.eq_ignore_ascii_case(ext))
                .copied()
        })
        .unwrap_or("png")
}

/// Build a zip with one entry per image, ordered by ordinal regardless of the
/// order the images arrived in.
pub fn build_archive(images: &[ArchivedImage]) -> Result<Vec<u8>> {
    let mut ordered: Vec<&ArchivedImage> = images.iter().collect();
    ordered.sort_by_key(|i| i.ordinal);

    // Images are already compressed.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for image in ordered {
        writer
            .start_file(image.name.clone(), options)
            .map_err(|e| SketchbookError::Export(format!("zip entry {}: {e}", image.name)))?;
        writer.write_all(&image.bytes)?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| SketchbookError::Export(format!("zip finish: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_name_extension() {
        assert_eq!(entry_name(0, "u1"), "image_0.png");
        assert_eq!(entry_name(3, "http://x/a/b.JPG?sig=1"), "image_3.jpg");
        assert_eq!(entry_name(1, "http://x/img.webp#frag"), "image_1.webp");
        assert_eq!(entry_name(2, "http://x.example/render"), "image_2.png");
        assert_eq!(entry_name(4, "http://x/file.exe"), "image_4.png");
    }

    #[test]
    fn test_archive_is_ordered_by_ordinal() {
        let images = vec![
            ArchivedImage {
                ordinal: 2,
                name: "image_2.png".into(),
                bytes: Bytes::from_static(b"two"),
            },
            ArchivedImage {
                ordinal: 0,
                name: "image_0.png".into(),
                bytes: Bytes::from_static(b"zero"),
            },
        ];
        let data = build_archive(&images).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "image_0.png");
        assert_eq!(archive.by_index(1).unwrap().name(), "image_2.png");
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let data = build_archive(&[]).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(data)).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
