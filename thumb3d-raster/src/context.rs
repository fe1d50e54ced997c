//! Offscreen drawing surface and the render target it resolves into
use thumb3d_core::Color;

use crate::error::RenderError;

/// Largest width or height an offscreen context accepts
pub const MAX_VIEWPORT_DIMENSION: u32 = 8192;

/// Largest drawing buffer, in samples. With anti-aliasing on this caps the
/// viewport at 4096x4096.
pub const MAX_BUFFER_SAMPLES: usize = 8192 * 8192;

/// Supersampling factor per axis when anti-aliasing is on
const SUPERSAMPLE: u32 = 2;

/// Options fixed at context creation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Render at 2x2 samples per pixel and box-filter down on resolve
    pub antialias: bool,
    /// Keep the drawing buffer contents after they were resolved
    pub preserve_drawing_buffer: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            antialias: true,
            preserve_drawing_buffer: false,
        }
    }
}

/// In-memory drawing buffer: straight-alpha RGBA color plus depth, stored at
/// the supersampled resolution.
#[derive(Debug)]
pub struct RenderContext {
    width: u32,
    height: u32,
    samples: u32,
    options: ContextOptions,
    pub(crate) color: Vec<[f32; 4]>,
    pub(crate) depth: Vec<f32>,
}

impl RenderContext {
    pub fn new(width: u32, height: u32, options: ContextOptions) -> Result<Self, RenderError> {
        let samples = if options.antialias { SUPERSAMPLE } else { 1 };
        let fail = |reason: String| RenderError::ContextCreation {
            width,
            height,
            reason,
        };

        if width == 0 || height == 0 {
            return Err(fail("viewport dimensions must be positive".to_string()));
        }
        if width > MAX_VIEWPORT_DIMENSION || height > MAX_VIEWPORT_DIMENSION {
            return Err(fail(format!(
                "exceeds the maximum viewport dimension of {MAX_VIEWPORT_DIMENSION}"
            )));
        }

        let len = (width * samples) as usize * (height * samples) as usize;
        if len > MAX_BUFFER_SAMPLES {
            return Err(fail(format!(
                "needs {len} samples, more than the limit of {MAX_BUFFER_SAMPLES}"
            )));
        }

        Ok(Self {
            width,
            height,
            samples,
            options,
            color: allocate(len, [0.0; 4]).map_err(fail)?,
            depth: allocate(len, f32::INFINITY).map_err(fail)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn options(&self) -> ContextOptions {
        self.options
    }

    /// Drawing buffer width in samples
    pub fn buffer_width(&self) -> usize {
        (self.width * self.samples) as usize
    }

    /// Drawing buffer height in samples
    pub fn buffer_height(&self) -> usize {
        (self.height * self.samples) as usize
    }

    pub fn clear(&mut self, color: Color, alpha: f32) {
        self.color.fill([color.r, color.g, color.b, alpha]);
        self.depth.fill(f32::INFINITY);
    }

    /// Box-filter the drawing buffer into `target` as RGBA8. Without
    /// `preserve_drawing_buffer` the buffer is invalidated afterwards.
    pub(crate) fn resolve(&mut self, target: &mut RenderTarget) {
        let s = self.samples as usize;
        let bw = self.buffer_width();
        let weight = 1.0 / (s * s) as f32;

        for y in 0..self.height as usize {
            for x in 0..self.width as usize {
                let mut sum = [0.0_f32; 4];
                for sy in 0..s {
                    let row = (y * s + sy) * bw;
                    for sx in 0..s {
                        let sample = self.color[row + x * s + sx];
                        for (acc, c) in sum.iter_mut().zip(sample) {
                            *acc += c;
                        }
                    }
                }

                let idx = (y * self.width as usize + x) * 4;
                for (out, c) in target.pixels[idx..idx + 4].iter_mut().zip(sum) {
                    *out = ((c * weight).clamp(0.0, 1.0) * 255.0).round() as u8;
                }
            }
        }

        if !self.options.preserve_drawing_buffer {
            self.color.fill([0.0; 4]);
            self.depth.fill(f32::INFINITY);
        }
    }
}

fn allocate<T: Clone>(len: usize, value: T) -> Result<Vec<T>, String> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| format!("unable to allocate {len} samples: {e}"))?;
    buffer.resize(len, value);
    Ok(buffer)
}

/// Final RGBA8 image of one render pass
#[derive(Debug, Clone)]
pub struct RenderTarget {
    width: u32,
    height: u32,
    pub(crate) pixels: Vec<u8>,
}

impl RenderTarget {
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let pixels = allocate(width as usize * height as usize * 4, 0u8).map_err(|reason| {
            RenderError::ContextCreation {
                width,
                height,
                reason,
            }
        })?;
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Row-major RGBA8 pixels
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.pixels[idx],
            self.pixels[idx + 1],
            self.pixels[idx + 2],
            self.pixels[idx + 3],
        ]
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}
