// Palette handling - color tables indexed by gray level
//
// A palette holds one color per pixel value. Its length is always a power of
// two matching the consuming bit depth (4 colors for 2-bit frames, 16 for
// 4-bit). Loaded palettes with a different length are resampled as a linear
// gradient before use.

/// One 24-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Classic DMD amber, the built-in default hue
    pub const ORANGE: Rgb = Rgb { r: 255, g: 69, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    /// Linear interpolation between two colors, `t` in 0.0..=1.0
    pub fn lerp(self, other: Rgb, t: f32) -> Rgb {
        let mix = |a: u8, b: u8| (f32::from(a) + (f32::from(b) - f32::from(a)) * t).round() as u8;
        Rgb {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
        }
    }
}

impl std::fmt::Display for Rgb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// An ordered color table indexed by pixel value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb>,
}

impl Palette {
    /// Create a palette from a list of colors
    ///
    /// # Panics
    /// Panics if the list is empty
    pub fn new(colors: Vec<Rgb>) -> Self {
        assert!(!colors.is_empty(), "A palette needs at least one color");
        Palette { colors }
    }

    /// The built-in passthrough palette: a black-to-amber ramp
    ///
    /// Used when no color table is loaded, so uncolorized games still look
    /// like a classic plasma display.
    pub fn default_ramp(bit_length: u8) -> Self {
        Palette::ramp(Rgb::BLACK, Rgb::ORANGE, 1 << bit_length)
    }

    /// A linear ramp between two colors with `len` steps
    pub fn ramp(from: Rgb, to: Rgb, len: usize) -> Self {
        assert!(len > 0, "A palette needs at least one color");
        if len == 1 {
            return Palette::new(vec![to]);
        }
        let colors = (0..len)
            .map(|i| from.lerp(to, i as f32 / (len - 1) as f32))
            .collect();
        Palette { colors }
    }

    /// Number of colors
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// All colors in order
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    /// Color at `index`, clamped to the last entry for out-of-range values
    #[inline]
    pub fn color(&self, index: usize) -> Rgb {
        self.colors[index.min(self.colors.len() - 1)]
    }

    /// Resample the palette to `len` colors
    ///
    /// Treats the existing colors as evenly spaced gradient stops and samples
    /// the gradient at `len` evenly spaced positions. The first and last
    /// colors are always preserved. Returns a clone when the length already
    /// matches.
    pub fn resample(&self, len: usize) -> Palette {
        assert!(len > 0, "A palette needs at least one color");
        if len == self.colors.len() {
            return self.clone();
        }
        if self.colors.len() == 1 {
            return Palette::new(vec![self.colors[0]; len]);
        }
        if len == 1 {
            return Palette::new(vec![self.colors[0]]);
        }
        let colors = (0..len)
            .map(|i| {
                let pos = i as f32 / (len - 1) as f32 * (self.colors.len() - 1) as f32;
                let lo = pos.floor() as usize;
                let hi = pos.ceil() as usize;
                self.colors[lo].lerp(self.colors[hi], pos - lo as f32)
            })
            .collect();
        Palette { colors }
    }
}
