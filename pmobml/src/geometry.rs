//! Video plane rectangle and content layout.

/// Rectangle in CSS pixels, as measured on the page.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct VideoRect {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

impl VideoRect {
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Converts to device pixels.
    pub fn scaled(&self, device_pixel_ratio: f64) -> Self {
        Self {
            left: self.left * device_pixel_ratio,
            top: self.top * device_pixel_ratio,
            right: self.right * device_pixel_ratio,
            bottom: self.bottom * device_pixel_ratio,
        }
    }
}

/// Size of the data broadcast plane and its vertical stretch.
///
/// Broadcast documents are authored for non-square pixels: a 960x540
/// document shown at 16:9 has `scale_y = 1`, a 720x480 one at 16:9 is
/// stretched vertically by 0.84375.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContentLayout {
    pub width: f64,
    pub height: f64,
    pub scale_y: f64,
}

impl ContentLayout {
    /// Layout for a loaded document.
    ///
    /// Returns `None` for degenerate resolutions or aspect ratios.
    pub fn for_document(
        width: u32,
        height: u32,
        aspect_numerator: u32,
        aspect_denominator: u32,
    ) -> Option<Self> {
        if width == 0 || height == 0 || aspect_numerator == 0 || aspect_denominator == 0 {
            return None;
        }
        let pixel_aspect = width as f64 / height as f64;
        let display_aspect = aspect_numerator as f64 / aspect_denominator as f64;
        let scale_y = pixel_aspect / display_aspect;
        Some(Self {
            width: width as f64,
            height: height as f64 * scale_y,
            scale_y,
        })
    }

    /// Unstretched placeholder used while a one-seg document is pending.
    pub fn placeholder(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
            scale_y: 1.0,
        }
    }
}
