//! Image canonicalization boundary.
//!
//! The thread core stores every image as a canonical string: an untouched
//! URL or data-URI, or a freshly base64-encoded data-URI. No codec work
//! happens here; files and raw bytes are encoded as-is.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use crate::error::{ThreadError, ThreadResult};

/// An image input accepted when posting a message.
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Remote URL, passed through unchanged.
    Url(String),
    /// `data:` URI, passed through unchanged.
    DataUri(String),
    /// Local file, read and encoded as a data-URI.
    Path(PathBuf),
    /// In-memory bytes with an explicit MIME type.
    Bytes { mime: String, data: Vec<u8> },
}

impl ImageSource {
    /// Apply the original string heuristic: `data:` and `http` prefixes
    /// pass through, anything else is treated as a local file path.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.starts_with("data:") {
            Self::DataUri(s.to_string())
        } else if s.starts_with("http") {
            Self::Url(s.to_string())
        } else {
            Self::Path(PathBuf::from(s))
        }
    }
}

impl From<&str> for ImageSource {
    fn from(s: &str) -> Self {
        Self::from_str_lossy(s)
    }
}

/// Normalize an image input to its canonical string form.
///
/// Synchronous by contract; the only side effect is reading a local file
/// when given a path.
pub fn normalize(image: &ImageSource) -> ThreadResult<String> {
    match image {
        ImageSource::Url(url) => Ok(url.clone()),
        ImageSource::DataUri(uri) => Ok(uri.clone()),
        ImageSource::Path(path) => encode_file(path),
        ImageSource::Bytes { mime, data } => Ok(data_uri(mime, data)),
    }
}

fn encode_file(path: &Path) -> ThreadResult<String> {
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if mime.type_() != mime_guess::mime::IMAGE {
        return Err(ThreadError::UnknownImage(path.display().to_string()));
    }
    let data = std::fs::read(path)?;
    Ok(data_uri(mime.essence_str(), &data))
}

fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, BASE64.encode(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn urls_and_data_uris_pass_through() {
        let url = ImageSource::Url("https://example.com/cat.png".to_string());
        assert_eq!(normalize(&url).unwrap(), "https://example.com/cat.png");

        let uri = ImageSource::DataUri("data:image/png;base64,AAAA".to_string());
        assert_eq!(normalize(&uri).unwrap(), "data:image/png;base64,AAAA");
    }

    #[test]
    fn string_heuristic_matches_prefixes() {
        assert!(matches!(
            ImageSource::from_str_lossy("data:image/png;base64,AA"),
            ImageSource::DataUri(_)
        ));
        assert!(matches!(
            ImageSource::from_str_lossy("http://example.com/a.jpg"),
            ImageSource::Url(_)
        ));
        assert!(matches!(
            ImageSource::from_str_lossy("/tmp/a.jpg"),
            ImageSource::Path(_)
        ));
    }

    #[test]
    fn file_becomes_data_uri() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("pixel.png");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0x89, b'P', b'N', b'G']).unwrap();

        let out = normalize(&ImageSource::Path(path)).unwrap();
        assert!(out.starts_with("data:image/png;base64,"));
    }

    #[test]
    fn non_image_file_is_rejected() {
        let err = normalize(&ImageSource::Path(PathBuf::from("notes.txt"))).unwrap_err();
        assert!(matches!(err, ThreadError::UnknownImage(_)));
    }

    #[test]
    fn bytes_encode_with_given_mime() {
        let out = normalize(&ImageSource::Bytes {
            mime: "image/jpeg".to_string(),
            data: vec![1, 2, 3],
        })
        .unwrap();
        assert!(out.starts_with("data:image/jpeg;base64,"));
    }
}
