//! Crop rectangles, aspect presets and zoom.
//!
//! Rectangles are in source pixels. Zoom shrinks the rectangle about its
//! centre, so a zoom of 2.0 keeps the middle half of each side.

use std::str::FromStr;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use mosaic_shared::MediaError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectPreset {
    Original,
    /// 1:1
    Square,
    /// 4:5
    Portrait,
    /// 16:9
    Landscape,
}

impl AspectPreset {
    /// `(width, height)` ratio, `None` for the source ratio.
    pub fn ratio(&self) -> Option<(u32, u32)> {
        match self {
            Self::Original => None,
            Self::Square => Some((1, 1)),
            Self::Portrait => Some((4, 5)),
            Self::Landscape => Some((16, 9)),
        }
    }
}

impl FromStr for AspectPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "original" => Ok(Self::Original),
            "1:1" | "square" => Ok(Self::Square),
            "4:5" | "portrait" => Ok(Self::Portrait),
            "16:9" | "landscape" => Ok(Self::Landscape),
            other => Err(format!("unknown aspect preset: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Largest rectangle of the preset's ratio centred in a `width`x`height` image.
    pub fn centered(preset: AspectPreset, width: u32, height: u32) -> Self {
        let Some((rw, rh)) = preset.ratio() else {
            return Self::full(width, height);
        };

        let (w, h) = (width as u64, height as u64);
        let (rw, rh) = (rw as u64, rh as u64);

        // Image is wider than the target ratio: full height, trimmed width.
        let (cw, ch) = if w * rh >= h * rw {
            ((h * rw / rh).max(1), h)
        } else {
            (w, (w * rh / rw).max(1))
        };

        Self {
            x: ((w - cw) / 2) as u32,
            y: ((h - ch) / 2) as u32,
            width: cw as u32,
            height: ch as u32,
        }
    }

    /// Shrink about the centre by `zoom` (>= 1.0).
    pub fn zoomed(&self, zoom: f32) -> Result<Self, MediaError> {
        if !zoom.is_finite() || zoom < 1.0 {
            return Err(MediaError::InvalidZoom(zoom));
        }

        let width = ((self.width as f64 / zoom as f64).round() as u32).max(1);
        let height = ((self.height as f64 / zoom as f64).round() as u32).max(1);

        Ok(Self {
            x: self.x + self.width.saturating_sub(width) / 2,
            y: self.y + self.height.saturating_sub(height) / 2,
            width,
            height,
        })
    }

    /// Check the rectangle is non-empty and inside the image.
    pub fn validate(&self, image_width: u32, image_height: u32) -> Result<(), MediaError> {
        let fits = |start: u32, len: u32, max: u32| {
            len > 0 && start.checked_add(len).is_some_and(|end| end <= max)
        };

        if fits(self.x, self.width, image_width) && fits(self.y, self.height, image_height) {
            Ok(())
        } else {
            Err(MediaError::InvalidCrop {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
                image_width,
                image_height,
            })
        }
    }
}

/// What the crop step records for one image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSpec {
    pub rect: CropRect,
    pub zoom: f32,
}

impl CropSpec {
    pub fn new(rect: CropRect) -> Self {
        Self { rect, zoom: 1.0 }
    }

    pub fn preset(preset: AspectPreset, width: u32, height: u32) -> Self {
        Self::new(CropRect::centered(preset, width, height))
    }

    pub fn with_zoom(mut self, zoom: f32) -> Self {
        self.zoom = zoom;
        self
    }

    /// The rectangle actually cut out, zoom applied.
    pub fn effective_rect(&self) -> Result<CropRect, MediaError> {
        self.rect.zoomed(self.zoom)
    }
}

/// Cut the recorded rectangle out of `img`, without resampling.
pub fn apply_crop(img: &DynamicImage, spec: &CropSpec) -> Result<DynamicImage, MediaError> {
    spec.rect.validate(img.width(), img.height())?;
    let rect = spec.effective_rect()?;
    rect.validate(img.width(), img.height())?;
    Ok(img.crop_imm(rect.x, rect.y, rect.width, rect.height))
}
