use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{DynamicImage, GenericImageView, ImageReader};

use crate::error::{HashError, Result};

pub const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "tif", "webp", "ico"];

/// Where an image comes from: a file, or bytes already in memory.
#[derive(Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Memory { id: String, bytes: Arc<[u8]> },
}

impl ImageSource {
    pub fn memory(id: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        ImageSource::Memory { id: id.into(), bytes: bytes.into() }
    }

    /// Identifier carried into hashes and batch results.
    pub fn identifier(&self) -> String {
        match self {
            ImageSource::Path(p) => p.to_string_lossy().into_owned(),
            ImageSource::Memory { id, .. } => id.clone(),
        }
    }

    /// Decodes into pixels; the format is guessed from content, not extension.
    pub fn decode(&self) -> Result<DynamicImage> {
        let img = match self {
            ImageSource::Path(p) => ImageReader::open(p)
                .map_err(|e| HashError::decode(self.identifier(), e))?
                .with_guessed_format()
                .map_err(|e| HashError::decode(self.identifier(), e))?
                .decode(),
            ImageSource::Memory { bytes, .. } => image::load_from_memory(bytes),
        }
        .map_err(|e| HashError::decode(self.identifier(), e))?;

        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(HashError::decode(self.identifier(), "image has no pixels"));
        }
        Ok(img)
    }
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Path(p) => f.debug_tuple("Path").field(p).finish(),
            ImageSource::Memory { id, bytes } => f
                .debug_struct("Memory")
                .field("id", id)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(p: PathBuf) -> Self {
        ImageSource::Path(p)
    }
}

impl From<&Path> for ImageSource {
    fn from(p: &Path) -> Self {
        ImageSource::Path(p.to_path_buf())
    }
}

impl From<&PathBuf> for ImageSource {
    fn from(p: &PathBuf) -> Self {
        ImageSource::Path(p.clone())
    }
}

impl From<&str> for ImageSource {
    fn from(p: &str) -> Self {
        ImageSource::Path(PathBuf::from(p))
    }
}

impl From<String> for ImageSource {
    fn from(p: String) -> Self {
        ImageSource::Path(PathBuf::from(p))
    }
}

pub fn is_image_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::test_images::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_decode_memory_png() {
        let src = ImageSource::memory("red", png_bytes(&square(20, RED)));
        let img = src.decode().unwrap();
        assert_eq!(img.dimensions(), (20, 20));
        assert_eq!(src.identifier(), "red");
    }

    #[test]
    fn test_decode_garbage_is_decode_error() {
        let src = ImageSource::memory("junk", b"definitely not an image".to_vec());
        let err = src.decode().unwrap_err();
        assert!(err.is_decode());
        assert!(err.to_string().contains("junk"));
    }

    #[test]
    fn test_decode_from_path_ignores_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logo.dat");
        fs::write(&path, png_bytes(&square(16, BLUE))).unwrap();
        let img = ImageSource::from(path.as_path()).decode().unwrap();
        assert_eq!(img.dimensions(), (16, 16));
    }

    #[test]
    fn test_missing_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let src = ImageSource::from(dir.path().join("nope.png"));
        assert!(src.decode().unwrap_err().is_decode());
    }

    #[test]
    fn test_image_ext() {
        assert!(is_image_ext(Path::new("a/b/LOGO.PNG")));
        assert!(is_image_ext(Path::new("x.jpeg")));
        assert!(!is_image_ext(Path::new("notes.txt")));
        assert!(!is_image_ext(Path::new("noext")));
    }
}
