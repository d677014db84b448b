use crate::error::{Result, SessionError};

/// A raw RGB frame from the local camera's render surface.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    /// Packed RGB8, row-major, `width * height * 3` bytes.
    pub rgb: Vec<u8>,
}

impl CapturedFrame {
    pub fn new(width: u32, height: u32, rgb: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(SessionError::CaptureFailed(format!(
                "frame buffer is {} bytes, expected {}",
                rgb.len(),
                expected
            )));
        }
        Ok(Self { width, height, rgb })
    }

    /// Downscale to fit within the bounding box, preserving aspect ratio.
    /// Frames already inside the box are returned unchanged.
    pub fn downscale_to_fit(self, max_width: u32, max_height: u32) -> CapturedFrame {
        let (width, height) = fit_within(self.width, self.height, max_width, max_height);
        if width == self.width && height == self.height {
            return self;
        }

        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for y in 0..height {
            let src_y = (y as u64 * self.height as u64 / height as u64) as u32;
            for x in 0..width {
                let src_x = (x as u64 * self.width as u64 / width as u64) as u32;
                let offset = (src_y as usize * self.width as usize + src_x as usize) * 3;
                rgb.extend_from_slice(&self.rgb[offset..offset + 3]);
            }
        }

        CapturedFrame { width, height, rgb }
    }
}

/// Scale dimensions down to fit a bounding box, preserving aspect ratio.
/// Dimensions already inside the box are returned as-is (never upscaled).
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let width_ratio = max_width as f64 / width as f64;
    let height_ratio = max_height as f64 / height as f64;
    let scale = width_ratio.min(height_ratio);

    let scaled_width = ((width as f64 * scale) as u32).max(1);
    let scaled_height = ((height as f64 * scale) as u32).max(1);
    (scaled_width, scaled_height)
}

/// Seam to whatever renders the local camera. Implementations run inside
/// the sampler task; a blocking capture never touches the session actor.
pub trait FrameSource: Send + Sync {
    fn capture(&self) -> Result<CapturedFrame>;
}

/// Fixed-frame source for validation runs and tests.
pub struct StaticFrameSource {
    frame: CapturedFrame,
}

impl StaticFrameSource {
    pub fn new(frame: CapturedFrame) -> Self {
        Self { frame }
    }

    /// A solid-gray frame of the given dimensions.
    pub fn gray(width: u32, height: u32) -> Self {
        let rgb = vec![0x80; width as usize * height as usize * 3];
        Self {
            frame: CapturedFrame { width, height, rgb },
        }
    }
}

impl FrameSource for StaticFrameSource {
    fn capture(&self) -> Result<CapturedFrame> {
        Ok(self.frame.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_within_no_upscale() {
        assert_eq!(fit_within(640, 360, 854, 480), (640, 360));
        assert_eq!(fit_within(854, 480, 854, 480), (854, 480));
    }

    #[test]
    fn test_fit_within_preserves_aspect() {
        // 1920x1080 -> bounded by width ratio 854/1920
        let (w, h) = fit_within(1920, 1080, 854, 480);
        assert_eq!(w, 854);
        assert_eq!(h, 480);

        // Tall portrait frame is bounded by height
        let (w, h) = fit_within(480, 1920, 854, 480);
        assert_eq!(h, 480);
        assert_eq!(w, 120);
    }

    #[test]
    fn test_downscale_buffer_size() {
        let frame = CapturedFrame::new(1920, 1080, vec![0; 1920 * 1080 * 3]).unwrap();
        let scaled = frame.downscale_to_fit(854, 480);
        assert_eq!(scaled.width, 854);
        assert_eq!(scaled.height, 480);
        assert_eq!(scaled.rgb.len(), 854 * 480 * 3);
    }

    #[test]
    fn test_small_frame_unchanged() {
        let frame = CapturedFrame::new(320, 240, vec![7; 320 * 240 * 3]).unwrap();
        let scaled = frame.clone().downscale_to_fit(854, 480);
        assert_eq!(scaled.width, 320);
        assert_eq!(scaled.rgb, frame.rgb);
    }

    #[test]
    fn test_mismatched_buffer_rejected() {
        assert!(CapturedFrame::new(10, 10, vec![0; 5]).is_err());
    }
}
