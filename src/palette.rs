use crate::error::{RetropicError, RetropicResult};

/// A single RGBA8 color, straight alpha.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[inline]
    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn from_array(v: [u8; 4]) -> Self {
        Self {
            r: v[0],
            g: v[1],
            b: v[2],
            a: v[3],
        }
    }

    /// Rec.601 luma.
    pub fn luma(self) -> u8 {
        let y = 0.299 * f32::from(self.r) + 0.587 * f32::from(self.g) + 0.114 * f32::from(self.b);
        y.round().clamp(0.0, 255.0) as u8
    }

    /// Linear interpolation toward `other` in sRGB space, `t` in [0,1].
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: u8, b: u8| -> u8 {
            (f32::from(a) + (f32::from(b) - f32::from(a)) * t)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Interpolation toward `other` in linear light (gamma 2.2).
    pub fn lerp_linear(self, other: Self, t: f32) -> Self {
        fn to_lin(v: u8) -> f32 {
            (f32::from(v) / 255.0).powf(2.2)
        }
        fn to_srgb(v: f32) -> u8 {
            (v.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0).round() as u8
        }
        let mix = |a: u8, b: u8| to_srgb(to_lin(a) + (to_lin(b) - to_lin(a)) * t);
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: self.a,
        }
    }

    /// Midpoint of two colors in sRGB space.
    pub fn average(self, other: Self) -> Self {
        self.lerp(other, 0.5)
    }
}

/// Identifier for one of the built-in 16-color palettes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaletteKind {
    /// Full-intensity RGBI values, the "raw" CGA table.
    Cga,
    /// Measured phosphor response of a real CGA monitor.
    TrueCga,
    /// The x54/xA8/xFC DOS-era variant table.
    Dga,
    /// A hand-picked 16-color artist set.
    Colly,
}

impl PaletteKind {
    pub fn table(self) -> Palette {
        let colors = match self {
            PaletteKind::Cga => &RAW_CGA,
            PaletteKind::TrueCga => &TRUE_CGA,
            PaletteKind::Dga => &DGA,
            PaletteKind::Colly => &COLLY,
        };
        Palette {
            colors: colors.to_vec(),
        }
    }
}

/// An ordered set of RGBA colors, 4 to 256 entries, immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgba8>,
}

impl Palette {
    pub fn new(colors: Vec<Rgba8>) -> RetropicResult<Self> {
        if colors.len() < 4 || colors.len() > 256 {
            return Err(RetropicError::validation(format!(
                "palette must have 4..=256 entries, got {}",
                colors.len()
            )));
        }
        Ok(Self { colors })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Rgba8 {
        self.colors[index.min(self.colors.len() - 1)]
    }

    pub fn colors(&self) -> &[Rgba8] {
        &self.colors
    }

    /// Index of the entry nearest to `target` (squared-distance in RGB).
    ///
    /// Ties resolve to the lowest index, so the result is deterministic.
    pub fn nearest(&self, target: Rgba8) -> usize {
        let mut best = 0usize;
        let mut best_d = u32::MAX;
        for (i, &c) in self.colors.iter().enumerate() {
            let d = color_distance(c, target);
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    }

    /// Contrast/dimmer adjustment in the manner of the IBM 5153's knob.
    ///
    /// `k = 1.0` is a bit-exact identity. For `k < 1.0` each channel is pulled
    /// toward a fixed low-contrast reference in which only the intensity
    /// contribution (the portion above 0xAA) survives.
    pub fn with_contrast(&self, k: f32) -> Self {
        if k >= 1.0 {
            return self.clone();
        }
        let dim = |v: u8| -> u8 {
            let reference = f32::from(v.saturating_sub(0xAA));
            (reference + (f32::from(v) - reference) * k)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        Self {
            colors: self
                .colors
                .iter()
                .map(|c| Rgba8 {
                    r: dim(c.r),
                    g: dim(c.g),
                    b: dim(c.b),
                    a: c.a,
                })
                .collect(),
        }
    }

    /// Collapse every entry to its Rec.601 luma.
    pub fn to_grayscale(&self) -> Self {
        Self {
            colors: self
                .colors
                .iter()
                .map(|c| {
                    let y = c.luma();
                    Rgba8 {
                        r: y,
                        g: y,
                        b: y,
                        a: c.a,
                    }
                })
                .collect(),
        }
    }
}

#[inline]
pub(crate) fn color_distance(a: Rgba8, b: Rgba8) -> u32 {
    let dr = i32::from(a.r) - i32::from(b.r);
    let dg = i32::from(a.g) - i32::from(b.g);
    let db = i32::from(a.b) - i32::from(b.b);
    (dr * dr + dg * dg + db * db) as u32
}

const RAW_CGA: [Rgba8; 16] = [
    Rgba8::rgb(0x00, 0x00, 0x00),
    Rgba8::rgb(0x00, 0x00, 0xAA),
    Rgba8::rgb(0x00, 0xAA, 0x00),
    Rgba8::rgb(0x00, 0xAA, 0xAA),
    Rgba8::rgb(0xAA, 0x00, 0x00),
    Rgba8::rgb(0xAA, 0x00, 0xAA),
    Rgba8::rgb(0xAA, 0x55, 0x00),
    Rgba8::rgb(0xAA, 0xAA, 0xAA),
    Rgba8::rgb(0x55, 0x55, 0x55),
    Rgba8::rgb(0x55, 0x55, 0xFF),
    Rgba8::rgb(0x55, 0xFF, 0x55),
    Rgba8::rgb(0x55, 0xFF, 0xFF),
    Rgba8::rgb(0xFF, 0x55, 0x55),
    Rgba8::rgb(0xFF, 0x55, 0xFF),
    Rgba8::rgb(0xFF, 0xFF, 0x55),
    Rgba8::rgb(0xFF, 0xFF, 0xFF),
];

const TRUE_CGA: [Rgba8; 16] = [
    Rgba8::rgb(0x00, 0x00, 0x00),
    Rgba8::rgb(0x00, 0x00, 0xC4),
    Rgba8::rgb(0x00, 0xC4, 0x00),
    Rgba8::rgb(0x00, 0xC4, 0xC4),
    Rgba8::rgb(0xC4, 0x00, 0x00),
    Rgba8::rgb(0xC4, 0x00, 0xC4),
    Rgba8::rgb(0xC4, 0x7E, 0x00),
    Rgba8::rgb(0xC4, 0xC4, 0xC4),
    Rgba8::rgb(0x4E, 0x4E, 0x4E),
    Rgba8::rgb(0x4E, 0x4E, 0xDC),
    Rgba8::rgb(0x4E, 0xDC, 0x4E),
    Rgba8::rgb(0x4E, 0xF3, 0xF3),
    Rgba8::rgb(0xDC, 0x4E, 0x4E),
    Rgba8::rgb(0xF3, 0x4E, 0xF3),
    Rgba8::rgb(0xF3, 0xF3, 0x4E),
    Rgba8::rgb(0xFF, 0xFF, 0xFF),
];

const DGA: [Rgba8; 16] = [
    Rgba8::rgb(0x00, 0x00, 0x00),
    Rgba8::rgb(0x00, 0x00, 0xA8),
    Rgba8::rgb(0x00, 0xA8, 0x00),
    Rgba8::rgb(0x00, 0xA8, 0xA8),
    Rgba8::rgb(0xA8, 0x00, 0x00),
    Rgba8::rgb(0xA8, 0x00, 0xA8),
    Rgba8::rgb(0xA8, 0x54, 0x00),
    Rgba8::rgb(0xA8, 0xA8, 0xA8),
    Rgba8::rgb(0x54, 0x54, 0x54),
    Rgba8::rgb(0x54, 0x54, 0xFC),
    Rgba8::rgb(0x54, 0xFC, 0x54),
    Rgba8::rgb(0x54, 0xFC, 0xFC),
    Rgba8::rgb(0xFC, 0x54, 0x54),
    Rgba8::rgb(0xFC, 0x54, 0xFC),
    Rgba8::rgb(0xFC, 0xFC, 0x54),
    Rgba8::rgb(0xFC, 0xFC, 0xFC),
];

const COLLY: [Rgba8; 16] = [
    Rgba8::rgb(0x00, 0x00, 0x00),
    Rgba8::rgb(0x22, 0x00, 0x77),
    Rgba8::rgb(0x00, 0x77, 0x22),
    Rgba8::rgb(0x22, 0x77, 0x88),
    Rgba8::rgb(0x66, 0x00, 0x33),
    Rgba8::rgb(0x77, 0x00, 0x88),
    Rgba8::rgb(0x99, 0x66, 0x00),
    Rgba8::rgb(0x77, 0x77, 0x99),
    Rgba8::rgb(0x44, 0x44, 0x55),
    Rgba8::rgb(0x33, 0x22, 0xFF),
    Rgba8::rgb(0x00, 0xFF, 0x33),
    Rgba8::rgb(0x22, 0xEE, 0xFF),
    Rgba8::rgb(0xFF, 0x00, 0x33),
    Rgba8::rgb(0xFF, 0x33, 0xDD),
    Rgba8::rgb(0xFF, 0xEE, 0x33),
    Rgba8::rgb(0xFF, 0xFF, 0xFF),
];
