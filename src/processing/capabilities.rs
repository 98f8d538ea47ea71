//! # Pipeline Capabilities
//!
//! The three side-effecting or codec-dependent steps of image ingestion, behind
//! small traits so the pipeline runs the same against the filesystem and the
//! `image` crate in production and against in-memory fakes in tests.
//!
//! | Trait | Default | Job |
//! |---|---|---|
//! | [`FileReader`] | [`FsFileReader`] | read the selected file's bytes |
//! | [`ImageDecoder`] | [`ImageCrateDecoder`] | bytes → pixels |
//! | [`RasterEncoder`] | [`JpegRasterEncoder`] | pixels → JPEG bytes |

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, DynamicImage, GenericImageView, ImageResult};
use std::io;
use std::path::{Path, PathBuf};

/// A file the user picked, before anything has been read from it.
///
/// `mime_type` and `size` are what the selection *declares*; validation runs on
/// them so oversized or mistyped files are rejected without any I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        mime_type: impl Into<String>,
        size: u64,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
            path: path.into(),
        }
    }

    /// Describes a file on disk, guessing its type from the extension.
    pub async fn from_path<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a file", path.display()),
            ));
        }

        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self::new(name, mime_type, metadata.len(), path))
    }
}

/// Reads the raw bytes of a selected file.
#[async_trait]
pub trait FileReader: Send + Sync {
    async fn read(&self, file: &SelectedFile) -> io::Result<Vec<u8>>;
}

/// Reads selected files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFileReader;

#[async_trait]
impl FileReader for FsFileReader {
    async fn read(&self, file: &SelectedFile) -> io::Result<Vec<u8>> {
        tokio::fs::read(&file.path).await
    }
}

/// Decodes encoded image bytes into pixels.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> ImageResult<DynamicImage>;
}

/// Decoder backed by the `image` crate's format sniffing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl ImageDecoder for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> ImageResult<DynamicImage> {
        image::load_from_memory(bytes)
    }
}

/// Renders pixels to JPEG.
pub trait RasterEncoder: Send + Sync {
    /// `quality` is 1-100.
    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>>;
}

/// JPEG encoder backed by the `image` crate.
///
/// JPEG has no alpha channel; transparent pixels are flattened by dropping alpha.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegRasterEncoder;

impl RasterEncoder for JpegRasterEncoder {
    fn encode_jpeg(&self, image: &DynamicImage, quality: u8) -> ImageResult<Vec<u8>> {
        let (width, height) = image.dimensions();
        let rgb = image.to_rgb8();

        let mut output = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut output, quality.clamp(1, 100));
            encoder.encode(rgb.as_raw(), width, height, ColorType::Rgb8)?;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    #[tokio::test]
    async fn test_selected_file_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portrait.PNG");
        std::fs::write(&path, vec![0u8; 1234]).unwrap();

        let file = SelectedFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "portrait.PNG");
        assert_eq!(file.mime_type, "image/png");
        assert_eq!(file.size, 1234);

        let bytes = FsFileReader.read(&file).await.unwrap();
        assert_eq!(bytes.len(), 1234);
    }

    #[tokio::test]
    async fn test_selected_file_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SelectedFile::from_path(dir.path()).await.is_err());
    }

    #[test]
    fn test_jpeg_encoder_output_decodes() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 20, Rgba([10, 200, 30, 128])));
        let jpeg = JpegRasterEncoder.encode_jpeg(&image, 70).unwrap();

        assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
        let decoded = ImageCrateDecoder.decode(&jpeg).unwrap();
        assert_eq!(decoded.dimensions(), (40, 20));
    }

    #[test]
    fn test_decoder_rejects_garbage() {
        assert!(ImageCrateDecoder.decode(b"definitely not pixels").is_err());
    }
}
