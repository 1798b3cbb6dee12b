//! Full imaging-library strategy on the `image` crate.
//!
//! Decodes the source, flattens to RGBA, optionally resizes by width
//! (aspect preserved, Catmull-Rom filter), and encodes with the crate's own
//! encoders — everything statically linked, no external processes. This is
//! the only strategy that can also *pre-resize* for the CLI encoder, which
//! cannot rescale.
//!
//! Availability is probed per target format through
//! [`image::ImageFormat::writing_enabled`]: the encoder for a format exists
//! only when its cargo feature was compiled in, and the probe reflects that
//! at runtime.

use super::{EncodeRequest, EncodingStrategy, StrategyError};
use crate::format::TargetFormat;
use image::codecs::avif::AvifEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::BufWriter;
use std::path::Path;

/// rav1e effort level: reasonable throughput without giving up much size.
const AVIF_SPEED: u8 = 6;

pub struct ImagePipeline {
    format: TargetFormat,
}

impl ImagePipeline {
    pub fn new(format: TargetFormat) -> Self {
        Self { format }
    }

    fn image_format(&self) -> ImageFormat {
        match self.format {
            TargetFormat::Avif => ImageFormat::Avif,
            TargetFormat::Webp => ImageFormat::WebP,
        }
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, StrategyError> {
    ImageReader::open(path)?
        .decode()
        .map_err(|e| StrategyError::Failed(format!("failed to decode {}: {e}", path.display())))
}

/// Resize to `width`, preserving aspect ratio. Flattens layered/paletted
/// sources to RGBA first so alpha survives re-encoding intact.
fn flatten_and_resize(img: DynamicImage, width: Option<u32>) -> DynamicImage {
    let img = DynamicImage::ImageRgba8(img.into_rgba8());
    match width {
        Some(w) if w > 0 && w != img.width() => {
            let h = ((u64::from(img.height()) * u64::from(w)) / u64::from(img.width()).max(1))
                .max(1) as u32;
            img.resize_exact(w, h, FilterType::CatmullRom)
        }
        _ => img,
    }
}

fn save(img: &DynamicImage, out: &Path, format: TargetFormat, quality: u8) -> Result<(), StrategyError> {
    let file = std::fs::File::create(out)?;
    let writer = BufWriter::new(file);
    let result = match format {
        TargetFormat::Avif => {
            let encoder = AvifEncoder::new_with_speed_quality(writer, AVIF_SPEED, quality);
            img.write_with_encoder(encoder)
        }
        // image 0.25 only ships a lossless WebP encoder; the quality knob
        // applies to the CLI and direct-codec strategies for this format.
        TargetFormat::Webp => img.write_with_encoder(WebPEncoder::new_lossless(writer)),
    };
    result.map_err(|e| StrategyError::Failed(format!("{format} encode failed: {e}")))
}

impl EncodingStrategy for ImagePipeline {
    fn name(&self) -> &'static str {
        match self.format {
            TargetFormat::Avif => "image-pipeline/avif",
            TargetFormat::Webp => "image-pipeline/webp",
        }
    }

    fn is_available(&self) -> bool {
        self.image_format().writing_enabled()
    }

    fn supports_resize(&self) -> bool {
        true
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), StrategyError> {
        let img = load_image(request.source)?;
        let img = flatten_and_resize(img, request.width);
        // The configured AVIF quality is a cq-level; this encoder wants the
        // 0-100 higher-is-better scale.
        let quality = match self.format {
            TargetFormat::Avif => request.quality.avif_percent(),
            TargetFormat::Webp => request.quality.value(),
        };
        save(&img, request.out, self.format, quality)
    }

    fn pre_resize(&self, source: &Path, width: u32, out: &Path) -> Result<(), StrategyError> {
        let img = load_image(source)?;
        let img = flatten_and_resize(img, Some(width));
        // Lossless intermediate; every CLI encoder accepts PNG input.
        let file = std::fs::File::create(out)?;
        img.write_with_encoder(PngEncoder::new(BufWriter::new(file)))
            .map_err(|e| StrategyError::Failed(format!("pre-resize encode failed: {e}")))?;
        Ok(())
    }
}
