//! Select -> crop -> filter wizard and the `finalize` step that turns the
//! recorded edits into upload-ready blobs.
//!
//! `finalize` is all-or-nothing: if one image fails, nothing is returned, so
//! a post can never go out with part of its media missing.

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::{DynamicImage, ImageFormat};
use tracing::{debug, info};

use mosaic_shared::constants::MAX_UPLOAD_SIZE;
use mosaic_shared::protocol::{MediaMeta, MediaUpload};
use mosaic_shared::MediaError;

use crate::crop::{apply_crop, CropSpec};
use crate::filter::Filter;

const OUTPUT_MIME: &str = "image/png";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditStep {
    Select,
    Crop,
    Filter,
}

impl EditStep {
    fn name(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Crop => "crop",
            Self::Filter => "filter",
        }
    }
}

/// One selected image and the edits recorded against it.
#[derive(Debug, Clone)]
pub struct EditedImage {
    pub file_name: String,
    pub image: DynamicImage,
    pub crop: Option<CropSpec>,
    pub filter: Filter,
}

impl EditedImage {
    pub fn new(file_name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            file_name: file_name.into(),
            image,
            crop: None,
            filter: Filter::None,
        }
    }

    /// Decode a png/jpeg/webp file.
    pub fn decode(file_name: &str, data: &[u8]) -> Result<Self, MediaError> {
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(MediaError::TooLarge {
                file: file_name.to_string(),
                size: data.len(),
                max: MAX_UPLOAD_SIZE,
            });
        }

        let image = image::load_from_memory(data).map_err(|e| MediaError::Decode {
            file: file_name.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(file_name, image))
    }

    /// Render crop then filter at native resolution.
    fn render(&self) -> Result<DynamicImage, MediaError> {
        let cropped = match self.crop {
            Some(ref spec) => apply_crop(&self.image, spec)?,
            None => self.image.clone(),
        };
        Ok(self.filter.apply(&cropped))
    }
}

/// A finished image, ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaBlob {
    pub file_name: String,
    pub mime: &'static str,
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub filter: Filter,
    /// BLAKE3 of `bytes`, hex.
    pub content_hash: String,
}

impl MediaBlob {
    pub fn into_upload(self) -> MediaUpload {
        MediaUpload {
            file_name: self.file_name,
            mime: self.mime.to_string(),
            bytes: self.bytes,
            meta: MediaMeta {
                filter: Some(self.filter.name().to_string()),
                trim_start: None,
                trim_end: None,
            },
        }
    }
}

/// Apply each image's recorded crop and filter and encode it, keeping input
/// order.
pub fn finalize(images: &[EditedImage]) -> Result<Vec<MediaBlob>, MediaError> {
    if images.is_empty() {
        return Err(MediaError::EmptySelection);
    }

    let blobs = images
        .iter()
        .map(|edited| {
            let rendered = edited.render()?;
            let file_name = output_name(&edited.file_name);

            let mut buf = Cursor::new(Vec::new());
            rendered
                .write_to(&mut buf, ImageFormat::Png)
                .map_err(|e| MediaError::Encode {
                    file: file_name.clone(),
                    reason: e.to_string(),
                })?;
            let bytes = Bytes::from(buf.into_inner());

            debug!(
                file = %file_name,
                filter = %edited.filter,
                width = rendered.width(),
                height = rendered.height(),
                "Image finalized"
            );

            Ok(MediaBlob {
                content_hash: blake3::hash(&bytes).to_hex().to_string(),
                file_name,
                mime: OUTPUT_MIME,
                bytes,
                width: rendered.width(),
                height: rendered.height(),
                filter: edited.filter,
            })
        })
        .collect::<Result<Vec<_>, MediaError>>()?;

    info!(count = blobs.len(), "Media finalized");
    Ok(blobs)
}

/// Same stem, `.png` extension.
fn output_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    format!("{stem}.png")
}

/// The three-step editing wizard.
#[derive(Debug, Clone)]
pub struct EditSession {
    step: EditStep,
    images: Vec<EditedImage>,
}

impl Default for EditSession {
    fn default() -> Self {
        Self::new()
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self {
            step: EditStep::Select,
            images: Vec::new(),
        }
    }

    pub fn step(&self) -> EditStep {
        self.step
    }

    pub fn images(&self) -> &[EditedImage] {
        &self.images
    }

    /// Decode the chosen files and move on to cropping. Nothing is kept if
    /// any file fails to decode.
    pub fn select<I, N>(&mut self, files: I) -> Result<(), MediaError>
    where
        I: IntoIterator<Item = (N, Vec<u8>)>,
        N: AsRef<str>,
    {
        self.expect_step(EditStep::Select)?;

        let images = files
            .into_iter()
            .map(|(name, data)| EditedImage::decode(name.as_ref(), &data))
            .collect::<Result<Vec<_>, _>>()?;

        if images.is_empty() {
            return Err(MediaError::EmptySelection);
        }

        self.images = images;
        self.step = EditStep::Crop;
        Ok(())
    }

    /// Record a crop for image `index`. The rectangle is checked now so the
    /// user gets the error while still on the crop screen.
    pub fn set_crop(&mut self, index: usize, spec: CropSpec) -> Result<(), MediaError> {
        self.expect_step(EditStep::Crop)?;
        let edited = self
            .images
            .get_mut(index)
            .ok_or(MediaError::IndexOutOfRange(index))?;

        let (w, h) = (edited.image.width(), edited.image.height());
        spec.rect.validate(w, h)?;
        spec.effective_rect()?.validate(w, h)?;

        edited.crop = Some(spec);
        Ok(())
    }

    pub fn set_filter(&mut self, index: usize, filter: Filter) -> Result<(), MediaError> {
        self.expect_step(EditStep::Filter)?;
        let edited = self
            .images
            .get_mut(index)
            .ok_or(MediaError::IndexOutOfRange(index))?;
        edited.filter = filter;
        Ok(())
    }

    /// Crop -> Filter. Select only advances through [`EditSession::select`].
    pub fn advance(&mut self) -> Result<EditStep, MediaError> {
        self.expect_step(EditStep::Crop)?;
        self.step = EditStep::Filter;
        Ok(self.step)
    }

    /// Step back one screen. Going back to Select drops the selection.
    pub fn back(&mut self) -> EditStep {
        self.step = match self.step {
            EditStep::Filter => EditStep::Crop,
            EditStep::Crop | EditStep::Select => {
                self.images.clear();
                EditStep::Select
            }
        };
        self.step
    }

    /// Produce the upload blobs. Only valid from the filter screen.
    pub fn finalize(&self) -> Result<Vec<MediaBlob>, MediaError> {
        self.expect_step(EditStep::Filter)?;
        finalize(&self.images)
    }

    fn expect_step(&self, expected: EditStep) -> Result<(), MediaError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(MediaError::WrongStep {
                expected: expected.name(),
                actual: self.step.name(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crop::{AspectPreset, CropRect};
    use image::{Rgba, RgbaImage};

    fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(color)));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn decode_blob(blob: &MediaBlob) -> DynamicImage {
        image::load_from_memory(&blob.bytes).unwrap()
    }

    #[test]
    fn test_finalize_applies_each_filter_in_order() {
        let mut session = EditSession::new();
        session
            .select(vec![
                ("a.jpg", png(6, 4, [120, 30, 200, 255])),
                ("b.png", png(5, 7, [100, 150, 200, 255])),
            ])
            .unwrap();
        session.advance().unwrap();
        session.set_filter(0, Filter::Grayscale).unwrap();
        session.set_filter(1, Filter::Sepia).unwrap();

        let blobs = session.finalize().unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].file_name, "a.png");
        assert_eq!(blobs[1].file_name, "b.png");
        assert_eq!(blobs[0].filter, Filter::Grayscale);
        assert_eq!(blobs[1].filter, Filter::Sepia);

        let a = decode_blob(&blobs[0]);
        assert_eq!((a.width(), a.height()), (6, 4));
        let [r, g, b, _] = a.to_rgba8().get_pixel(0, 0).0;
        assert!(r == g && g == b);

        let b_img = decode_blob(&blobs[1]);
        assert_eq!((b_img.width(), b_img.height()), (5, 7));
        let expected = Filter::Sepia
            .apply(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
                1,
                1,
                Rgba([100, 150, 200, 255]),
            )))
            .to_rgba8()
            .get_pixel(0, 0)
            .0;
        assert_eq!(b_img.to_rgba8().get_pixel(0, 0).0, expected);
    }

    #[test]
    fn test_crop_then_filter_keeps_native_size() {
        let mut session = EditSession::new();
        session.select(vec![("wide.png", png(16, 9, [0, 0, 0, 255]))]).unwrap();
        session
            .set_crop(0, CropSpec::preset(AspectPreset::Square, 16, 9))
            .unwrap();
        session.advance().unwrap();
        session.set_filter(0, Filter::Invert).unwrap();

        let blobs = session.finalize().unwrap();
        let out = decode_blob(&blobs[0]);
        assert_eq!((out.width(), out.height()), (9, 9));
        assert_eq!((blobs[0].width, blobs[0].height), (9, 9));
        assert_eq!(out.to_rgba8().get_pixel(4, 4).0, [255, 255, 255, 255]);
    }

    #[test]
    fn test_bad_file_rejects_whole_selection() {
        let mut session = EditSession::new();
        let err = session
            .select(vec![
                ("ok.png", png(2, 2, [0, 0, 0, 255])),
                ("broken.png", b"not an image".to_vec()),
            ])
            .unwrap_err();

        assert!(matches!(err, MediaError::Decode { ref file, .. } if file == "broken.png"));
        assert_eq!(session.step(), EditStep::Select);
        assert!(session.images().is_empty());
    }

    #[test]
    fn test_finalize_is_all_or_nothing() {
        let mut good = EditedImage::decode("good.png", &png(4, 4, [1, 2, 3, 255])).unwrap();
        good.filter = Filter::Sepia;
        let mut bad = EditedImage::decode("bad.png", &png(4, 4, [1, 2, 3, 255])).unwrap();
        bad.crop = Some(CropSpec::new(CropRect { x: 3, y: 3, width: 4, height: 4 }));

        assert!(matches!(
            finalize(&[good, bad]),
            Err(MediaError::InvalidCrop { .. })
        ));
    }

    #[test]
    fn test_wizard_step_guards() {
        let mut session = EditSession::new();
        assert!(matches!(
            session.set_filter(0, Filter::Sepia),
            Err(MediaError::WrongStep { expected: "filter", actual: "select" })
        ));
        assert!(matches!(session.select(Vec::<(&str, Vec<u8>)>::new()), Err(MediaError::EmptySelection)));

        session.select(vec![("x.png", png(2, 2, [0, 0, 0, 255]))]).unwrap();
        assert!(session.finalize().is_err());
        assert!(matches!(
            session.set_crop(3, CropSpec::new(CropRect::full(1, 1))),
            Err(MediaError::IndexOutOfRange(3))
        ));
        assert!(session
            .set_crop(0, CropSpec::new(CropRect::full(3, 3)))
            .is_err());

        session.advance().unwrap();
        assert_eq!(session.back(), EditStep::Crop);
        assert_eq!(session.back(), EditStep::Select);
        assert!(session.images().is_empty());
    }

    #[test]
    fn test_blob_upload_carries_filter_name() {
        let edited = EditedImage::decode("p.webp", &png(2, 2, [9, 9, 9, 255])).unwrap();
        let blob = finalize(&[edited]).unwrap().remove(0);
        assert_eq!(blob.content_hash.len(), 64);

        let upload = blob.into_upload();
        assert_eq!(upload.mime, "image/png");
        assert_eq!(upload.meta.filter.as_deref(), Some("none"));
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name("holiday.final.jpeg"), "holiday.final.png");
        assert_eq!(output_name(""), "image.png");
    }
}
