use std::str::FromStr;

use image::{DynamicImage, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use mosaic_shared::MediaError;

/// The fixed set of colour filters a user can pick per image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Filter {
    #[default]
    None,
    Grayscale,
    Sepia,
    Invert,
}

impl Filter {
    pub const ALL: [Filter; 4] = [Filter::None, Filter::Grayscale, Filter::Sepia, Filter::Invert];

    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Grayscale => "grayscale",
            Self::Sepia => "sepia",
            Self::Invert => "invert",
        }
    }

    /// Redraw `img` with this filter at full strength. Dimensions are kept.
    pub fn apply(&self, img: &DynamicImage) -> DynamicImage {
        let map: fn([u8; 4]) -> [u8; 4] = match self {
            Self::None => return img.clone(),
            Self::Grayscale => grayscale,
            Self::Sepia => sepia,
            Self::Invert => invert,
        };

        let src = img.to_rgba8();
        let out = RgbaImage::from_fn(src.width(), src.height(), |x, y| {
            Rgba(map(src.get_pixel(x, y).0))
        });
        DynamicImage::ImageRgba8(out)
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Filter {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| MediaError::UnknownFilter(s.to_string()))
    }
}

fn channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

// Same coefficients as CSS `grayscale(1)`.
fn grayscale([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    let y = channel(0.2126 * r + 0.7152 * g + 0.0722 * b);
    [y, y, y, a]
}

// Same matrix as CSS `sepia(1)`.
fn sepia([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let (r, g, b) = (r as f32, g as f32, b as f32);
    [
        channel(0.393 * r + 0.769 * g + 0.189 * b),
        channel(0.349 * r + 0.686 * g + 0.168 * b),
        channel(0.272 * r + 0.534 * g + 0.131 * b),
        a,
    ]
}

fn invert([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    [255 - r, 255 - g, 255 - b, a]
}
