use crate::foundation::error::{TableauError, TableauResult};

/// Immutable size of the host rendering surface at a point in time.
///
/// Replaced wholesale on resize, never patched field by field.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Logical width in CSS pixels.
    pub width: f64,
    /// Logical height in CSS pixels.
    pub height: f64,
    /// Device pixels per logical pixel.
    pub pixel_density: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64, pixel_density: f64) -> TableauResult<Self> {
        for (name, v) in [
            ("width", width),
            ("height", height),
            ("pixel_density", pixel_density),
        ] {
            if !v.is_finite() || v <= 0.0 {
                return Err(TableauError::viewport(format!(
                    "{name} must be finite and > 0, got {v}"
                )));
            }
        }
        Ok(Self {
            width,
            height,
            pixel_density,
        })
    }

    /// Backing-store size in device pixels.
    pub fn backing_size(self) -> (u32, u32) {
        fn px(v: f64) -> u32 {
            v.round().clamp(1.0, f64::from(u32::MAX)) as u32
        }
        (
            px(self.width * self.pixel_density),
            px(self.height * self.pixel_density),
        )
    }
}

/// Raw size reported by the host surface (container box + device pixel ratio).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
    pub pixel_density: f64,
}

impl SurfaceSize {
    pub fn new(width: f64, height: f64, pixel_density: f64) -> Self {
        Self {
            width,
            height,
            pixel_density,
        }
    }
}

/// How a surface size turns into the logical viewport the geometry is laid out in.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SizingPolicy {
    /// Fixed logical coordinate space scaled by the host (an SVG `viewBox`).
    Fixed { width: f64, height: f64 },
    /// Width follows the surface, height is `width * ratio` (a canvas kept at 16:9).
    AspectRatio { ratio: f64 },
    /// Both dimensions follow the surface.
    Fill,
}

impl SizingPolicy {
    pub fn snapshot(self, size: SurfaceSize) -> TableauResult<Viewport> {
        match self {
            Self::Fixed { width, height } => Viewport::new(width, height, size.pixel_density),
            Self::AspectRatio { ratio } => {
                if !ratio.is_finite() || ratio <= 0.0 {
                    return Err(TableauError::viewport("aspect ratio must be finite and > 0"));
                }
                Viewport::new(size.width, size.width * ratio, size.pixel_density)
            }
            Self::Fill => Viewport::new(size.width, size.height, size.pixel_density),
        }
    }
}
