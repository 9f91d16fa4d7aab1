// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Screenshot capture with optional selector clipping and thumbnailing

use std::io::Cursor;
use std::str::FromStr;

use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport as ClipViewport,
};
use image::imageops::FilterType;
use image::ImageOutputFormat;
use serde::{Deserialize, Serialize};

use super::Artifact;
use crate::browser::Session;
use crate::error::{Error, Result};

/// Default JPEG encoding quality
const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Output image encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageType {
    #[default]
    Png,
    Jpeg,
}

impl ImageType {
    /// Response content type for this encoding
    pub fn mime(self) -> &'static str {
        match self {
            ImageType::Png => "image/png",
            ImageType::Jpeg => "image/jpeg",
        }
    }
}

impl FromStr for ImageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "png" | "" => Ok(ImageType::Png),
            "jpeg" | "jpg" => Ok(ImageType::Jpeg),
            other => Err(Error::config(format!("unknown image type: {}", other))),
        }
    }
}

/// Screenshot options
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotOptions {
    /// Output encoding
    pub image_type: ImageType,
    /// JPEG quality (ignored for PNG)
    pub jpeg_quality: u8,
    /// Re-encode to this width, preserving aspect ratio, when narrower
    /// than the viewport
    pub thumb_width: Option<u32>,
    /// Capture the whole document instead of the viewport
    pub full_page: bool,
    /// Clip the capture to the first element matching this selector
    pub clip_selector: Option<String>,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            image_type: ImageType::Png,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            thumb_width: None,
            full_page: false,
            clip_selector: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct ClipRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

pub(super) async fn capture(session: &Session, opts: &ScreenshotOptions) -> Result<Artifact> {
    let page = session.page();

    let mut clip = None;
    if let Some(selector) = &opts.clip_selector {
        if let Some(rect) = resolve_clip(session, selector).await? {
            // Grow the viewport when the element's bottom edge would be
            // cut off by the current height.
            let bottom = (rect.y + rect.height).ceil();
            if f64::from(session.viewport().height) < bottom {
                session.grow_viewport_height(bottom as u32).await?;
            }
            clip = Some(rect);
        }
    }

    let viewport = session.viewport();
    let thumbnailing = opts
        .thumb_width
        .map_or(false, |width| width < viewport.width);

    let mut params = CaptureScreenshotParams::builder();
    params = match opts.image_type {
        ImageType::Png => params.format(CaptureScreenshotFormat::Png),
        ImageType::Jpeg => {
            // Thumbnails are re-encoded afterwards; capture losslessly
            // then apply the requested quality once.
            let quality = if thumbnailing { 100 } else { opts.jpeg_quality };
            params
                .format(CaptureScreenshotFormat::Jpeg)
                .quality(i64::from(quality))
        }
    };

    if let Some(rect) = clip {
        params = params
            .clip(ClipViewport {
                x: rect.x,
                y: rect.y,
                width: rect.width,
                height: rect.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true);
    } else if opts.full_page {
        let metrics = page.layout_metrics().await?;
        let content = metrics.css_content_size;
        params = params
            .clip(ClipViewport {
                x: 0.0,
                y: 0.0,
                width: content.width,
                height: content.height,
                scale: 1.0,
            })
            .capture_beyond_viewport(true);
    }

    let response = page.execute(params.build()).await?;
    let encoded: &str = response.data.as_ref();
    let mut bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| Error::other(format!("screenshot payload decode failed: {}", e)))?;

    if thumbnailing {
        let width = opts.thumb_width.unwrap_or(viewport.width);
        bytes = thumbnail(&bytes, width, opts.image_type, opts.jpeg_quality)?;
    }

    Ok(Artifact {
        content_type: opts.image_type.mime(),
        bytes,
    })
}

/// Bounding box of the first element matching `selector`, if any
async fn resolve_clip(session: &Session, selector: &str) -> Result<Option<ClipRect>> {
    let script = format!(
        r#"
(() => {{
  const el = document.querySelector({selector});
  if (!el) return null;
  const rect = el.getBoundingClientRect();
  return {{ x: rect.x, y: rect.y, width: rect.width, height: rect.height }};
}})()
"#,
        selector = serde_json::to_string(selector)?,
    );

    let result = session.page().evaluate(script).await?;
    let value = result.value().cloned().unwrap_or(serde_json::Value::Null);
    Ok(serde_json::from_value(value)?)
}

/// Re-encode image bytes to `width`, preserving aspect ratio
fn thumbnail(bytes: &[u8], width: u32, image_type: ImageType, jpeg_quality: u8) -> Result<Vec<u8>> {
    let decoded = image::load_from_memory(bytes)?;
    let resized = decoded.resize(width, u32::MAX, FilterType::Lanczos3);

    let mut out = Vec::new();
    let mut cursor = Cursor::new(&mut out);
    match image_type {
        ImageType::Png => resized.write_to(&mut cursor, ImageOutputFormat::Png)?,
        ImageType::Jpeg => resized.write_to(&mut cursor, ImageOutputFormat::Jpeg(jpeg_quality))?,
    }
    Ok(out)
}
