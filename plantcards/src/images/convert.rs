//! Conversion of uploads to the stored representation.
//!
//! JPEG, PNG and GIF are decoded and re-encoded as WebP with the `image` crate (when enabled),
//! optionally downscaled first. HEIC/HEIF cannot be decoded in-process, so those go through an
//! external converter command. WebP uploads are stored untouched.

use std::time::Duration;

use image::{DynamicImage, codecs::webp::WebPEncoder, imageops::FilterType};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

use crate::config::{HeicConverterConfig, ImagesConfig};
use crate::images::format::ImageFormat;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("unsupported image format: {0}")]
    Unsupported(String),

    #[error("could not decode image: {0}")]
    Decode(String),

    #[error("could not encode WebP: {0}")]
    Encode(String),

    #[error("HEIC converter failed: {0}")]
    Converter(String),

    #[error("HEIC converter timed out after {0:?}")]
    Timeout(Duration),

    #[error("I/O error during conversion: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes ready to store, with the format they are in
#[derive(Debug, Clone)]
pub struct ConvertedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

#[derive(Debug, Clone)]
pub struct ImageConverter {
    webp_conversion: bool,
    max_dimension: Option<u32>,
    heic_converter: Option<HeicConverterConfig>,
}

impl ImageConverter {
    pub fn new(config: &ImagesConfig) -> Self {
        Self {
            webp_conversion: config.webp_conversion,
            max_dimension: config.max_dimension,
            heic_converter: config.heic_converter.clone(),
        }
    }

    #[tracing::instrument(skip(self, bytes), fields(format = %format, size = bytes.len()), err)]
    pub async fn convert(&self, bytes: Vec<u8>, format: ImageFormat) -> Result<ConvertedImage, ConversionError> {
        match format {
            ImageFormat::WebP => stored_as_is(bytes, format),
            ImageFormat::Heic => {
                let Some(converter) = &self.heic_converter else {
                    return Err(ConversionError::Unsupported(
                        "HEIC uploads are not enabled on this server".to_string(),
                    ));
                };
                let output = run_external_converter(converter, &bytes).await?;

                // Converters that cannot write WebP directly may hand back JPEG or PNG
                match ImageFormat::from_magic(&output) {
                    Some(ImageFormat::WebP) => Ok(ConvertedImage {
                        bytes: output,
                        format: ImageFormat::WebP,
                    }),
                    Some(ImageFormat::Jpeg | ImageFormat::Png) => self.encode_in_background(output).await,
                    _ => Err(ConversionError::Converter(
                        "converter output is not a WebP, JPEG or PNG image".to_string(),
                    )),
                }
            }
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif => {
                if self.webp_conversion {
                    self.encode_in_background(bytes).await
                } else {
                    stored_as_is(bytes, format)
                }
            }
        }
    }

    async fn encode_in_background(&self, bytes: Vec<u8>) -> Result<ConvertedImage, ConversionError> {
        let max_dimension = self.max_dimension;
        let webp = tokio::task::spawn_blocking(move || encode_webp(&bytes, max_dimension))
            .await
            .map_err(|e| ConversionError::Encode(format!("encoder task failed: {e}")))??;

        Ok(ConvertedImage {
            bytes: webp,
            format: ImageFormat::WebP,
        })
    }
}

/// Bytes kept without re-encoding must really be what they claim to be
fn stored_as_is(bytes: Vec<u8>, format: ImageFormat) -> Result<ConvertedImage, ConversionError> {
    if ImageFormat::from_magic(&bytes) != Some(format) {
        return Err(ConversionError::Unsupported(format!("file content is not a {format} image")));
    }
    Ok(ConvertedImage { bytes, format })
}

/// Decode, shrink so the longest edge fits `max_dimension`, and encode as lossless WebP
pub fn encode_webp(bytes: &[u8], max_dimension: Option<u32>) -> Result<Vec<u8>, ConversionError> {
    let mut decoded = image::load_from_memory(bytes).map_err(|e| ConversionError::Decode(e.to_string()))?;

    if let Some(max) = max_dimension
        && (decoded.width() > max || decoded.height() > max)
    {
        decoded = decoded.resize(max, max, FilterType::Lanczos3);
    }

    // The WebP encoder only takes 8-bit L/LA/RGB/RGBA buffers
    let rgba = DynamicImage::ImageRgba8(decoded.to_rgba8());

    let mut out = Vec::new();
    rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .map_err(|e| ConversionError::Encode(e.to_string()))?;

    Ok(out)
}

/// Replace `{input}` and `{output}` placeholders in the configured arguments
fn converter_args(args: &[String], input: &str, output: &str) -> Vec<String> {
    args.iter()
        .map(|arg| arg.replace("{input}", input).replace("{output}", output))
        .collect()
}

async fn run_external_converter(config: &HeicConverterConfig, bytes: &[u8]) -> Result<Vec<u8>, ConversionError> {
    // Removed with everything in it when dropped
    let scratch = tempfile::Builder::new().prefix("plantcards-heic-").tempdir()?;
    let input = scratch.path().join("input.heic");
    let output = scratch.path().join("output.webp");

    tokio::fs::write(&input, bytes).await?;

    let args = converter_args(&config.args, &input.to_string_lossy(), &output.to_string_lossy());
    tracing::debug!(command = %config.command, ?args, "Running HEIC converter");

    let result = timeout(
        config.timeout,
        Command::new(&config.command).args(&args).kill_on_drop(true).output(),
    )
    .await
    .map_err(|_| ConversionError::Timeout(config.timeout))?
    .map_err(|e| ConversionError::Converter(format!("could not run {}: {e}", config.command)))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(ConversionError::Converter(format!(
            "{} exited with {}: {}",
            config.command,
            result.status,
            stderr.trim()
        )));
    }

    Ok(tokio::fs::read(&output).await?)
}
