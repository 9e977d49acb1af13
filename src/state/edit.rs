/// Non-destructive edit parameters for gallery images
///
/// This struct stores the adjustments made in the viewer.
/// It is serialized into the image's sidecar file, so the source
/// image is never touched by brightness/contrast/saturation changes.

use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};

pub const BRIGHTNESS_RANGE: (i32, i32) = (-100, 100);
pub const FACTOR_RANGE: (f32, f32) = (0.0, 3.0);

/// All edit parameters for an image
///
/// These values are applied to the decoded image before display.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct EditParams {
    /// Brightness offset added to every channel (-100 to +100)
    /// - 0 = no adjustment
    pub brightness: i32,

    /// Contrast multiplier applied to every channel (0.0 to 3.0)
    /// - 1.0 = no adjustment
    pub contrast: f32,

    /// Saturation multiplier in HSV space (0.0 to 3.0)
    /// - 0.0 = grayscale, 1.0 = original
    pub saturation: f32,
}

impl Default for EditParams {
    /// Create default edit parameters (no adjustments)
    fn default() -> Self {
        Self {
            brightness: 0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

impl EditParams {
    /// Create new default edit parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Check if this represents an unedited image (all values at default)
    pub fn is_unedited(&self) -> bool {
        *self == Self::default()
    }

    /// Reset all adjustments to default (no edits)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Copy with every value forced into its valid range
    pub fn clamped(&self) -> Self {
        Self {
            brightness: self.brightness.clamp(BRIGHTNESS_RANGE.0, BRIGHTNESS_RANGE.1),
            contrast: clamp_factor(self.contrast),
            saturation: clamp_factor(self.saturation),
        }
    }

    /// Render the adjustments onto a copy of `image`.
    ///
    /// Brightness and contrast are applied per channel as `v * contrast + brightness`,
    /// then saturation scales the S component in HSV space.
    pub fn apply(&self, image: &DynamicImage) -> DynamicImage {
        if self.is_unedited() {
            return image.clone();
        }

        let params = self.clamped();
        let mut rgb: RgbImage = image.to_rgb8();

        for pixel in rgb.pixels_mut() {
            let mut channels = pixel.0.map(|c| {
                (c as f32 * params.contrast + params.brightness as f32).clamp(0.0, 255.0)
            });

            if params.saturation != 1.0 {
                channels = scale_saturation(channels, params.saturation);
            }

            *pixel = Rgb(channels.map(|c| c.round() as u8));
        }

        DynamicImage::ImageRgb8(rgb)
    }
}

fn clamp_factor(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(FACTOR_RANGE.0, FACTOR_RANGE.1)
    } else {
        1.0
    }
}

/// Scale saturation of one RGB triple (0..255 floats) through HSV
fn scale_saturation([r, g, b]: [f32; 3], factor: f32) -> [f32; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    if max <= 0.0 || delta <= 0.0 {
        // Gray pixel, nothing to saturate
        return [r, g, b];
    }

    let hue = if max == r {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let sat = ((delta / max) * factor).clamp(0.0, 1.0);
    let value = max;

    let c = value * sat;
    let x = c * (1.0 - ((hue / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = value - c;

    let (r1, g1, b1) = match (hue / 60.0) as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    [r1 + m, g1 + m, b1 + m].map(|v| v.clamp(0.0, 255.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(r: u8, g: u8, b: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(2, 2, Rgb([r, g, b])))
    }

    #[test]
    fn test_default_is_unedited() {
        let params = EditParams::default();
        assert!(params.is_unedited());
    }

    #[test]
    fn test_serialization() {
        let params = EditParams {
            brightness: 25,
            contrast: 1.5,
            saturation: 0.5,
        };

        let json = params.to_json().unwrap();
        let restored = EditParams::from_json(&json).unwrap();

        assert_eq!(params, restored);
        assert!(!restored.is_unedited());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let restored = EditParams::from_json(r#"{"brightness": 10}"#).unwrap();
        assert_eq!(restored.brightness, 10);
        assert_eq!(restored.contrast, 1.0);
        assert_eq!(restored.saturation, 1.0);
    }

    #[test]
    fn test_reset() {
        let mut params = EditParams {
            brightness: 40,
            contrast: 2.0,
            saturation: 1.0,
        };
        assert!(!params.is_unedited());

        params.reset();

        assert!(params.is_unedited());
    }

    #[test]
    fn test_clamped() {
        let params = EditParams {
            brightness: 500,
            contrast: -1.0,
            saturation: f32::NAN,
        }
        .clamped();
        assert_eq!(params.brightness, 100);
        assert_eq!(params.contrast, 0.0);
        assert_eq!(params.saturation, 1.0);
    }

    #[test]
    fn test_unedited_apply_is_identity() {
        let img = solid(10, 20, 30);
        let out = EditParams::default().apply(&img);
        assert_eq!(out.to_rgb8(), img.to_rgb8());
    }

    #[test]
    fn test_brightness_and_contrast() {
        let img = solid(100, 100, 100);

        let brighter = EditParams { brightness: 50, ..EditParams::default() }.apply(&img);
        assert_eq!(brighter.to_rgb8().get_pixel(0, 0).0, [150, 150, 150]);

        let contrasted = EditParams { contrast: 3.0, ..EditParams::default() }.apply(&img);
        assert_eq!(contrasted.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn test_zero_saturation_is_gray() {
        let img = solid(200, 50, 50);
        let out = EditParams { saturation: 0.0, ..EditParams::default() }.apply(&img);
        let [r, g, b] = out.to_rgb8().get_pixel(1, 1).0;
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(r, 200);
    }

    #[test]
    fn test_saturation_keeps_hue_order() {
        let img = solid(200, 120, 80);
        let out = EditParams { saturation: 1.5, ..EditParams::default() }.apply(&img);
        let [r, g, b] = out.to_rgb8().get_pixel(0, 0).0;
        assert!(r > g && g > b);
        assert!(b < 80);
    }
}
