use std::path::Path;

use bytes::Bytes;
use tracing::debug;

use mosaic_shared::constants::MAX_UPLOAD_SIZE;
use mosaic_shared::protocol::{MediaMeta, MediaUpload};
use mosaic_shared::MediaError;

/// Playable part of a clip, in seconds. The file itself is never cut; the
/// window travels as upload metadata and players clamp to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    start: f64,
    end: f64,
}

impl TrimWindow {
    pub fn new(start: f64, end: f64, duration: f64) -> Result<Self, MediaError> {
        let valid = [start, end, duration].iter().all(|v| v.is_finite())
            && start >= 0.0
            && start < end
            && end <= duration;

        if !valid {
            return Err(MediaError::InvalidTrim {
                start,
                end,
                duration,
            });
        }
        Ok(Self { start, end })
    }

    /// The whole clip.
    pub fn full(duration: f64) -> Result<Self, MediaError> {
        Self::new(0.0, duration, duration)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, position: f64) -> bool {
        position >= self.start && position <= self.end
    }

    /// Pull a playback position into the window.
    pub fn clamp(&self, position: f64) -> f64 {
        if position.is_nan() {
            return self.start;
        }
        position.clamp(self.start, self.end)
    }
}

/// Playback position of a trimmed preview; loops back to the start of the
/// window when it runs past the end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackCursor {
    window: TrimWindow,
    position: f64,
}

impl PlaybackCursor {
    pub fn new(window: TrimWindow) -> Self {
        Self {
            window,
            position: window.start(),
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn seek(&mut self, position: f64) -> f64 {
        self.position = self.window.clamp(position);
        self.position
    }

    /// Advance by `elapsed` seconds of playback. Negative or non-finite
    /// steps leave the position where it is.
    pub fn advance(&mut self, elapsed: f64) -> f64 {
        if !elapsed.is_finite() {
            return self.position;
        }
        let next = self.position + elapsed.max(0.0);
        self.position = if next > self.window.end() {
            let over = (next - self.window.end()) % self.window.length();
            self.window.start() + over
        } else {
            next
        };
        self.position
    }
}

/// A reel's video, before upload.
#[derive(Debug, Clone)]
pub struct VideoDraft {
    pub file_name: String,
    pub bytes: Bytes,
    duration: f64,
    trim: TrimWindow,
}

impl VideoDraft {
    pub fn new(file_name: impl Into<String>, bytes: Bytes, duration: f64) -> Result<Self, MediaError> {
        let file_name = file_name.into();
        if bytes.is_empty() {
            return Err(MediaError::EmptySelection);
        }
        if bytes.len() > MAX_UPLOAD_SIZE {
            return Err(MediaError::TooLarge {
                file: file_name,
                size: bytes.len(),
                max: MAX_UPLOAD_SIZE,
            });
        }

        let trim = TrimWindow::full(duration)?;
        Ok(Self {
            file_name,
            bytes,
            duration,
            trim,
        })
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn trim(&self) -> TrimWindow {
        self.trim
    }

    pub fn set_trim(&mut self, start: f64, end: f64) -> Result<(), MediaError> {
        self.trim = TrimWindow::new(start, end, self.duration)?;
        debug!(file = %self.file_name, start, end, "Trim window set");
        Ok(())
    }

    pub fn mime(&self) -> &'static str {
        let ext = Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("mp4") | Some("m4v") => "video/mp4",
            Some("webm") => "video/webm",
            Some("mov") => "video/quicktime",
            _ => "application/octet-stream",
        }
    }

    pub fn into_upload(self) -> MediaUpload {
        MediaUpload {
            mime: self.mime().to_string(),
            meta: MediaMeta {
                filter: None,
                trim_start: Some(self.trim.start()),
                trim_end: Some(self.trim.end()),
            },
            file_name: self.file_name,
            bytes: self.bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trim_validation() {
        assert!(TrimWindow::new(1.0, 4.0, 10.0).is_ok());
        assert!(TrimWindow::new(4.0, 4.0, 10.0).is_err());
        assert!(TrimWindow::new(-1.0, 4.0, 10.0).is_err());
        assert!(TrimWindow::new(1.0, 11.0, 10.0).is_err());
        assert!(TrimWindow::new(1.0, f64::INFINITY, f64::INFINITY).is_err());
    }

    #[test]
    fn test_clamp_into_window() {
        let w = TrimWindow::new(2.0, 5.0, 10.0).unwrap();
        assert_eq!(w.clamp(0.0), 2.0);
        assert_eq!(w.clamp(3.5), 3.5);
        assert_eq!(w.clamp(9.0), 5.0);
        assert_eq!(w.clamp(f64::NAN), 2.0);
    }

    #[test]
    fn test_cursor_loops_inside_window() {
        let mut cursor = PlaybackCursor::new(TrimWindow::new(2.0, 5.0, 10.0).unwrap());
        assert_eq!(cursor.position(), 2.0);
        assert_eq!(cursor.advance(2.0), 4.0);
        assert_eq!(cursor.advance(2.0), 3.0);
        assert_eq!(cursor.seek(8.0), 5.0);
        assert_eq!(cursor.seek(0.0), 2.0);
    }

    #[test]
    fn test_cursor_ignores_non_finite_steps() {
        let mut cursor = PlaybackCursor::new(TrimWindow::new(2.0, 5.0, 10.0).unwrap());
        cursor.advance(1.5);
        assert_eq!(cursor.advance(f64::INFINITY), 3.5);
        assert_eq!(cursor.advance(f64::NAN), 3.5);
        assert_eq!(cursor.advance(f64::NEG_INFINITY), 3.5);
        assert_eq!(cursor.advance(-1.0), 3.5);
    }

    #[test]
    fn test_upload_carries_trim_meta() {
        let mut draft = VideoDraft::new("clip.MP4", Bytes::from_static(b"\0\0\0\x18ftyp"), 12.0).unwrap();
        draft.set_trim(1.5, 6.0).unwrap();
        assert!(draft.set_trim(6.0, 13.0).is_err());
        assert_eq!(draft.trim().length(), 4.5);

        let upload = draft.into_upload();
        assert_eq!(upload.mime, "video/mp4");
        assert_eq!(upload.meta.trim_start, Some(1.5));
        assert_eq!(upload.meta.trim_end, Some(6.0));
        assert_eq!(upload.meta.filter, None);
    }

    #[test]
    fn test_empty_video_rejected() {
        assert!(matches!(
            VideoDraft::new("x.mp4", Bytes::new(), 3.0),
            Err(MediaError::EmptySelection)
        ));
    }
}
