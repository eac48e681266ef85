//! WebP transcoding for ingested images.
//!
//! Images are decoded, resized to fit the configured maximum dimension
//! (never enlarged), and encoded as WebP at the configured quality. The
//! whole pipeline runs on the blocking pool.

use anyhow::{anyhow, Result};
use bytes::Bytes;
use image::GenericImageView;

/// Result of a successful transcode: the encoded bytes and the name the
/// output should carry.
#[derive(Debug, Clone)]
pub struct TranscodeOutcome {
    pub bytes: Bytes,
    pub output_name: String,
    pub content_type: &'static str,
}

/// Transcodes images to resized WebP.
#[derive(Clone, Copy, Debug)]
pub struct ImageTranscoder {
    max_dimension: u32,
    quality: f32,
}

impl ImageTranscoder {
    pub fn new(max_dimension: u32, quality: f32) -> Self {
        ImageTranscoder {
            max_dimension,
            quality,
        }
    }

    /// Transcode image bytes to WebP on the blocking pool.
    ///
    /// `base_name` is the filename the output derives from; its extension
    /// is replaced with `.webp`.
    pub async fn transcode(&self, data: Bytes, base_name: &str) -> Result<TranscodeOutcome> {
        let max_dimension = self.max_dimension;
        let quality = self.quality;
        let output_name = webp_name(base_name);

        let encoded = tokio::task::spawn_blocking(move || -> Result<Bytes> {
            let img = image::load_from_memory(&data)
                .map_err(|e| anyhow!("Failed to decode image: {}", e))?;

            let (width, height) = img.dimensions();
            let img = if width > max_dimension || height > max_dimension {
                img.resize(
                    max_dimension,
                    max_dimension,
                    image::imageops::FilterType::Lanczos3,
                )
            } else {
                img
            };

            let (width, height) = img.dimensions();
            let rgba = img.to_rgba8();
            let encoder = webp::Encoder::from_rgba(&rgba, width, height);
            let webp_data = encoder.encode(quality);

            Ok(Bytes::copy_from_slice(&webp_data))
        })
        .await
        .map_err(|e| anyhow!("Transcode task panicked: {}", e))??;

        tracing::debug!(
            output_name = %output_name,
            size_bytes = encoded.len(),
            "Image transcoded to WebP"
        );

        Ok(TranscodeOutcome {
            bytes: encoded,
            output_name,
            content_type: "image/webp",
        })
    }
}

/// Replace a filename's extension with `.webp`, keeping the stem.
fn webp_name(base_name: &str) -> String {
    let stem = match base_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base_name,
    };
    format!("{}.webp", stem)
}
