//! # Image Ingestion Pipeline
//!
//! Turns a user-selected file into a bounded, transport-ready JPEG data URI.
//!
//! ## Stages
//!
//! ```text
//! SelectedFile --validate--> ValidatedFile --decode--> DecodedImage
//!              --resize--> ResizedImage --encode--> ImageAsset
//! ```
//!
//! Each stage consumes the previous stage's value, so stages cannot run out of
//! order and a failure leaves nothing half-built behind. Only `decode` touches
//! I/O; the other stages are deterministic given their input.
//!
//! ## Policy
//!
//! - Accepted types: JPEG, PNG, GIF (declared type, checked before size)
//! - Size limit: 5 MiB before compression
//! - Resize: longer side down to 800 px, aspect ratio kept, never upscaled
//! - Output: JPEG at quality 70

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use log::{debug, info};
use serde::Serialize;

use super::capabilities::{
    FileReader, FsFileReader, ImageCrateDecoder, ImageDecoder, JpegRasterEncoder, RasterEncoder,
    SelectedFile,
};
use super::data_uri::DataUri;
use crate::common::config::ImageConfig;
use crate::error::IngestError;

/// Limits applied by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub max_file_bytes: u64,
    pub max_dimension: u32,
    pub jpeg_quality: u8,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self::from(&ImageConfig::default())
    }
}

impl From<&ImageConfig> for ImageLimits {
    fn from(config: &ImageConfig) -> Self {
        Self {
            max_file_bytes: config.max_file_bytes,
            max_dimension: config.max_dimension,
            jpeg_quality: config.jpeg_quality,
        }
    }
}

/// Image formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
}

impl ImageKind {
    pub fn from_mime_type(mime_type: &str) -> Option<Self> {
        match mime_type {
            "image/jpeg" => Some(ImageKind::Jpeg),
            "image/png" => Some(ImageKind::Png),
            "image/gif" => Some(ImageKind::Gif),
            _ => None,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Png => "image/png",
            ImageKind::Gif => "image/gif",
        }
    }
}

/// A selection that passed type and size checks.
#[derive(Debug, Clone)]
pub struct ValidatedFile {
    file: SelectedFile,
    kind: ImageKind,
}

impl ValidatedFile {
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    pub fn file(&self) -> &SelectedFile {
        &self.file
    }
}

/// The file's raw bytes, as a self-describing data URI.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    kind: ImageKind,
    byte_size: u64,
    data_uri: String,
}

impl DecodedImage {
    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }
}

/// Pixels bounded by the dimension limit.
#[derive(Debug, Clone)]
pub struct ResizedImage {
    kind: ImageKind,
    byte_size: u64,
    original_dimensions: (u32, u32),
    image: DynamicImage,
}

impl ResizedImage {
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn original_dimensions(&self) -> (u32, u32) {
        self.original_dimensions
    }
}

/// A finished, transport-ready image.
///
/// Not `Clone`: it is meant to be moved into exactly one payload.
#[derive(Debug, PartialEq, Eq)]
pub struct ImageAsset {
    source_kind: ImageKind,
    byte_size: u64,
    width: u32,
    height: u32,
    data_uri: String,
}

impl ImageAsset {
    /// Format of the file the asset was made from. The payload itself is always JPEG.
    pub fn source_kind(&self) -> ImageKind {
        self.source_kind
    }

    /// Size of the original file in bytes.
    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn data_uri(&self) -> &str {
        &self.data_uri
    }

    pub fn into_data_uri(self) -> String {
        self.data_uri
    }
}

/// Fits `width`×`height` inside a `max`×`max` box, keeping the aspect ratio.
///
/// The longer side becomes `max` and the shorter side is scaled and rounded
/// half up (minimum 1 px). Dimensions already inside the box are returned as-is.
pub fn fit_within(width: u32, height: u32, max: u32) -> (u32, u32) {
    let scale = |short: u32, long: u32| -> u32 {
        let (short, long, max) = (short as u64, long as u64, max as u64);
        (((short * max * 2) + long) / (2 * long)).max(1) as u32
    };

    if width > height {
        if width > max {
            return (max, scale(height, width));
        }
    } else if height > max {
        return (scale(width, height), max);
    }

    (width, height)
}

/// The ingestion pipeline, generic over its capabilities.
pub struct ImagePipeline<R = FsFileReader, D = ImageCrateDecoder, E = JpegRasterEncoder> {
    reader: R,
    decoder: D,
    encoder: E,
    limits: ImageLimits,
}

impl ImagePipeline {
    /// Pipeline over the filesystem and the `image` crate.
    pub fn new(limits: ImageLimits) -> Self {
        Self::with_capabilities(FsFileReader, ImageCrateDecoder, JpegRasterEncoder, limits)
    }
}

impl Default for ImagePipeline {
    fn default() -> Self {
        Self::new(ImageLimits::default())
    }
}

impl<R, D, E> ImagePipeline<R, D, E>
where
    R: FileReader,
    D: ImageDecoder,
    E: RasterEncoder,
{
    pub fn with_capabilities(reader: R, decoder: D, encoder: E, limits: ImageLimits) -> Self {
        Self {
            reader,
            decoder,
            encoder,
            limits,
        }
    }

    pub fn limits(&self) -> &ImageLimits {
        &self.limits
    }

    /// Checks the declared type, then the declared size. No I/O.
    ///
    /// # Errors
    /// - `InvalidType` unless the type is JPEG, PNG or GIF
    /// - `TooLarge` if the size exceeds the limit
    pub fn validate(&self, file: SelectedFile) -> Result<ValidatedFile, IngestError> {
        let kind = ImageKind::from_mime_type(&file.mime_type).ok_or_else(|| {
            IngestError::InvalidType {
                mime_type: file.mime_type.clone(),
            }
        })?;

        if file.size > self.limits.max_file_bytes {
            return Err(IngestError::TooLarge {
                size: file.size,
                max: self.limits.max_file_bytes,
            });
        }

        debug!("Validated {} ({}, {} bytes)", file.name, kind.mime_type(), file.size);
        Ok(ValidatedFile { file, kind })
    }

    /// Reads the file into a data URI.
    ///
    /// # Errors
    /// - `DecodeError` when the read fails
    /// - `TooLarge` when more bytes come back than the limit allows
    pub async fn decode(&self, validated: ValidatedFile) -> Result<DecodedImage, IngestError> {
        let bytes = self.reader.read(&validated.file).await.map_err(|e| {
            IngestError::DecodeError(format!("failed to read {}: {}", validated.file.name, e))
        })?;

        let byte_size = bytes.len() as u64;
        if byte_size > self.limits.max_file_bytes {
            return Err(IngestError::TooLarge {
                size: byte_size,
                max: self.limits.max_file_bytes,
            });
        }

        let data_uri = DataUri::new(validated.kind.mime_type(), bytes).to_string();
        debug!("Read {} ({} bytes)", validated.file.name, byte_size);

        Ok(DecodedImage {
            kind: validated.kind,
            byte_size,
            data_uri,
        })
    }

    /// Decodes the pixels and shrinks them to fit the dimension limit.
    ///
    /// # Errors
    /// `DecodeError` if the payload is not a renderable image.
    pub fn resize(&self, decoded: DecodedImage) -> Result<ResizedImage, IngestError> {
        let data_uri: DataUri = decoded.data_uri.parse()?;
        let image = self
            .decoder
            .decode(data_uri.bytes())
            .map_err(|e| IngestError::DecodeError(e.to_string()))?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(IngestError::DecodeError("image has no pixels".to_string()));
        }

        let (new_width, new_height) = fit_within(width, height, self.limits.max_dimension);
        let image = if (new_width, new_height) == (width, height) {
            image
        } else {
            debug!(
                "Resizing {}x{} -> {}x{}",
                width, height, new_width, new_height
            );
            image.resize_exact(new_width, new_height, FilterType::Triangle)
        };

        Ok(ResizedImage {
            kind: decoded.kind,
            byte_size: decoded.byte_size,
            original_dimensions: (width, height),
            image,
        })
    }

    /// Re-renders the pixels as a JPEG data URI. Lossy and one-way.
    ///
    /// # Errors
    /// `EncodeFailed` if the encoder rejects the pixels.
    pub fn encode(&self, resized: ResizedImage) -> Result<ImageAsset, IngestError> {
        let (width, height) = resized.image.dimensions();
        let jpeg = self
            .encoder
            .encode_jpeg(&resized.image, self.limits.jpeg_quality)
            .map_err(|e| IngestError::EncodeFailed(e.to_string()))?;

        Ok(ImageAsset {
            source_kind: resized.kind,
            byte_size: resized.byte_size,
            width,
            height,
            data_uri: DataUri::new(ImageKind::Jpeg.mime_type(), jpeg).to_string(),
        })
    }

    /// Runs validate → decode → resize → encode in order.
    pub async fn ingest(&self, file: SelectedFile) -> Result<ImageAsset, IngestError> {
        let name = file.name.clone();
        let validated = self.validate(file)?;
        let decoded = self.decode(validated).await?;
        let resized = self.resize(decoded)?;
        let original = resized.original_dimensions();
        let asset = self.encode(resized)?;

        info!(
            "✅ Ingested {}: {}x{} -> {}x{}, {} -> {} bytes",
            name,
            original.0,
            original.1,
            asset.width,
            asset.height,
            asset.byte_size,
            asset.data_uri.len()
        );
        Ok(asset)
    }
}
