use nalgebra::Vector3;

/// Gamma factor used for `gammaInput`/`gammaOutput` conversions
pub const GAMMA_FACTOR: f32 = 2.0;

/// Largest value accepted for a packed `0xRRGGBB` color
pub const MAX_RGB: u32 = 0xff_ffff;

/// Linear RGB color with components in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color::new(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Unpack `0xRRGGBB`; bits above the low 24 are ignored.
    pub fn from_hex(hex: u32) -> Self {
        let channel = |shift: u32| ((hex >> shift) & 0xff) as f32 / 255.0;
        Self::new(channel(16), channel(8), channel(0))
    }

    pub fn to_hex(self) -> u32 {
        let channel = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    pub fn gamma_to_linear(self, factor: f32) -> Self {
        Self::new(self.r.powf(factor), self.g.powf(factor), self.b.powf(factor))
    }

    pub fn linear_to_gamma(self, factor: f32) -> Self {
        let inv = 1.0 / factor;
        Self::new(
            self.r.max(0.0).powf(inv),
            self.g.max(0.0).powf(inv),
            self.b.max(0.0).powf(inv),
        )
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.r * s, self.g * s, self.b * s)
    }

    pub fn as_vector(self) -> Vector3<f32> {
        Vector3::new(self.r, self.g, self.b)
    }

    pub fn from_vector(v: Vector3<f32>) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}
