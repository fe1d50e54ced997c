//! Thumbnail requests and their validated form.
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thumb3d_core::color::MAX_RGB;
use thumb3d_core::framing::check_direction;
use thumb3d_core::Color;

use crate::error::{Result, ThumbnailError};

/// Camera position vector used when a request gives none; the camera looks
/// from here toward the origin.
pub const DEFAULT_CAMERA_ANGLE: [f32; 3] = [10.0, 50.0, 100.0];
/// RGB of the (transparent) background
pub const DEFAULT_BACKGROUND_COLOR: u32 = 0xffffff;
pub const DEFAULT_BASE_COLOR: u32 = 0xffffff;
/// Translucency of the part material
pub const DEFAULT_BASE_OPACITY: f32 = 0.7;

/// A thumbnail as requested by a caller. Only `width` and `height` are
/// required; every other field falls back to its documented default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_angle: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_opacity: Option<f32>,
}

impl ThumbnailRequest {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Self::default()
        }
    }

    pub fn camera_angle(mut self, x: f32, y: f32, z: f32) -> Self {
        self.camera_angle = Some([x, y, z]);
        self
    }

    pub fn background_color(mut self, rgb: u32) -> Self {
        self.background_color = Some(rgb);
        self
    }

    pub fn base_color(mut self, rgb: u32) -> Self {
        self.base_color = Some(rgb);
        self
    }

    pub fn base_opacity(mut self, opacity: f32) -> Self {
        self.base_opacity = Some(opacity);
        self
    }

    /// Decode a JSON array of requests. Wrongly typed fields (a string
    /// width, say) are reported as validation errors.
    pub fn parse_list(json: &str) -> Result<Vec<Self>> {
        serde_json::from_str(json).map_err(|e| ThumbnailError::Validation(e.to_string()))
    }

    /// Check the request and fill in defaults
    pub fn validate(&self) -> std::result::Result<ThumbnailSpec, String> {
        let width = positive(self.width, "width")?;
        let height = positive(self.height, "height")?;

        let camera_angle = Vector3::from(self.camera_angle.unwrap_or(DEFAULT_CAMERA_ANGLE));
        check_direction(&camera_angle).map_err(|e| e.to_string())?;

        let base_opacity = self.base_opacity.unwrap_or(DEFAULT_BASE_OPACITY);
        if !(0.0..=1.0).contains(&base_opacity) {
            return Err(format!(
                "baseOpacity must be within [0, 1], got {base_opacity}"
            ));
        }

        Ok(ThumbnailSpec {
            width,
            height,
            camera_angle,
            background_color: rgb(self.background_color, DEFAULT_BACKGROUND_COLOR, "backgroundColor")?,
            base_color: rgb(self.base_color, DEFAULT_BASE_COLOR, "baseColor")?,
            base_opacity,
        })
    }
}

fn positive(value: Option<u32>, name: &str) -> std::result::Result<u32, String> {
    match value {
        None => Err(format!("please specify a thumbnail {name}")),
        Some(0) => Err(format!("thumbnail {name} must be positive")),
        Some(v) => Ok(v),
    }
}

fn rgb(value: Option<u32>, default: u32, name: &str) -> std::result::Result<u32, String> {
    match value.unwrap_or(default) {
        v if v > MAX_RGB => Err(format!("{name} {v:#x} exceeds 0xffffff")),
        v => Ok(v),
    }
}

/// A validated, immutable thumbnail job
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThumbnailSpec {
    width: u32,
    height: u32,
    camera_angle: Vector3<f32>,
    background_color: u32,
    base_color: u32,
    base_opacity: f32,
}

impl ThumbnailSpec {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Direction the camera looks from; always finite and non-zero
    pub fn camera_angle(&self) -> Vector3<f32> {
        self.camera_angle
    }

    pub fn background_color(&self) -> Color {
        Color::from_hex(self.background_color)
    }

    pub fn base_color(&self) -> Color {
        Color::from_hex(self.base_color)
    }

    pub fn base_opacity(&self) -> f32 {
        self.base_opacity
    }
}
