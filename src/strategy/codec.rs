//! Lightweight direct-codec fallback strategy.
//!
//! Last in the chain: hands decoded RGBA pixels straight to a standalone
//! codec crate — `ravif` for AVIF, `webp` (libwebp) for WebP. Fewer moving
//! parts than the full pipeline and no external binary, at the cost of any
//! richer feature set. Each codec sits behind a cargo feature
//! (`codec-avif`, `codec-webp`); with the feature off the strategy reports
//! itself unavailable and the chain passes over it silently.
//!
//! Decoding and resizing still go through the `image` crate's readers,
//! which are always compiled in for the supported source formats.

use super::{EncodeRequest, EncodingStrategy, StrategyError};
use crate::format::TargetFormat;
use image::RgbaImage;
use image::imageops::FilterType;
use std::path::Path;

pub struct DirectCodec {
    format: TargetFormat,
}

impl DirectCodec {
    pub fn new(format: TargetFormat) -> Self {
        Self { format }
    }
}

/// Decode, flatten to RGBA, and resize by width if requested.
fn load_rgba(source: &Path, width: Option<u32>) -> Result<RgbaImage, StrategyError> {
    let img = image::ImageReader::open(source)?
        .decode()
        .map_err(|e| StrategyError::Failed(format!("failed to decode {}: {e}", source.display())))?;
    let rgba = img.into_rgba8();
    Ok(match width {
        Some(w) if w > 0 && w != rgba.width() => {
            let h = ((u64::from(rgba.height()) * u64::from(w))
                / u64::from(rgba.width()).max(1))
            .max(1) as u32;
            image::imageops::resize(&rgba, w, h, FilterType::CatmullRom)
        }
        _ => rgba,
    })
}

#[cfg(feature = "codec-avif")]
fn encode_avif(img: &RgbaImage, out: &Path, quality: u8) -> Result<(), StrategyError> {
    use imgref::Img;
    use rgb::RGBA8;

    let pixels: Vec<RGBA8> = img
        .pixels()
        .map(|p| RGBA8::new(p[0], p[1], p[2], p[3]))
        .collect();
    let encoded = ravif::Encoder::new()
        .with_quality(f32::from(quality))
        .with_alpha_quality(f32::from(quality))
        .with_speed(6)
        .encode_rgba(Img::new(
            pixels.as_slice(),
            img.width() as usize,
            img.height() as usize,
        ))
        .map_err(|e| StrategyError::Failed(format!("ravif encode failed: {e}")))?;
    std::fs::write(out, encoded.avif_file)?;
    Ok(())
}

#[cfg(not(feature = "codec-avif"))]
fn encode_avif(_img: &RgbaImage, _out: &Path, _quality: u8) -> Result<(), StrategyError> {
    Err(StrategyError::Unavailable(
        "built without the codec-avif feature".into(),
    ))
}

#[cfg(feature = "codec-webp")]
fn encode_webp(img: &RgbaImage, out: &Path, quality: u8) -> Result<(), StrategyError> {
    let encoded = webp::Encoder::from_rgba(img.as_raw(), img.width(), img.height())
        .encode_simple(false, f32::from(quality))
        .map_err(|e| StrategyError::Failed(format!("libwebp encode failed: {e:?}")))?;
    std::fs::write(out, &*encoded)?;
    Ok(())
}

#[cfg(not(feature = "codec-webp"))]
fn encode_webp(_img: &RgbaImage, _out: &Path, _quality: u8) -> Result<(), StrategyError> {
    Err(StrategyError::Unavailable(
        "built without the codec-webp feature".into(),
    ))
}

impl EncodingStrategy for DirectCodec {
    fn name(&self) -> &'static str {
        match self.format {
            TargetFormat::Avif => "ravif",
            TargetFormat::Webp => "libwebp",
        }
    }

    fn is_available(&self) -> bool {
        match self.format {
            TargetFormat::Avif => cfg!(feature = "codec-avif"),
            TargetFormat::Webp => cfg!(feature = "codec-webp"),
        }
    }

    fn supports_resize(&self) -> bool {
        true
    }

    fn encode(&self, request: &EncodeRequest<'_>) -> Result<(), StrategyError> {
        let img = load_rgba(request.source, request.width)?;
        match self.format {
            // cq-level translated to ravif's 0-100 higher-is-better scale.
            TargetFormat::Avif => encode_avif(&img, request.out, request.quality.avif_percent()),
            TargetFormat::Webp => encode_webp(&img, request.out, request.quality.value()),
        }
    }
}
