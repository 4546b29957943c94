//! Display parameters for human inspection of class rasters.
//! Never consulted by the classification or the area reduction.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::grid::CategoricalRaster;

/// Value range, palette and opacity for rendering a categorical raster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    /// Hex (`"373e8d"`, `"#373e8d"`) or CSS colour names.
    pub palette: Vec<String>,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
}

fn default_opacity() -> f32 {
    1.0
}

impl VisParams {
    /// Yearly land-cover layers: blue non-vegetated, tan senesced, green evergreen.
    pub fn yearly_classes() -> Self {
        Self {
            min: 0.0,
            max: 2.0,
            palette: ["373e8d", "ffc772", "20b82c"].map(String::from).to_vec(),
            opacity: 0.6,
        }
    }

    /// Stability classes 0..=6.
    pub fn stability_classes() -> Self {
        Self {
            min: 0.0,
            max: 6.0,
            palette: ["white", "black", "yellow", "green", "magenta", "gray", "blue"]
                .map(String::from)
                .to_vec(),
            opacity: 1.0,
        }
    }

    fn check(&self) -> Result<()> {
        if self.palette.is_empty() {
            return Err(Error::InvalidParameter {
                name: "palette",
                value: "[]".into(),
                reason: "palette needs at least one colour".into(),
            });
        }
        if !(self.max > self.min) {
            return Err(Error::InvalidParameter {
                name: "max",
                value: self.max.to_string(),
                reason: format!("must exceed min = {}", self.min),
            });
        }
        if !(0.0..=1.0).contains(&self.opacity) {
            return Err(Error::InvalidParameter {
                name: "opacity",
                value: self.opacity.to_string(),
                reason: "must lie in [0, 1]".into(),
            });
        }
        Ok(())
    }

    /// Parsed palette colours.
    pub fn colors(&self) -> Result<Vec<[u8; 3]>> {
        self.palette.iter().map(|c| parse_color(c)).collect()
    }

    /// Colour of `value`: stretched over `[min, max]`, linearly interpolated
    /// between palette entries.
    pub fn color_of(&self, colors: &[[u8; 3]], value: f64) -> [u8; 3] {
        if colors.len() == 1 {
            return colors[0];
        }
        let t = ((value - self.min) / (self.max - self.min)).clamp(0.0, 1.0);
        let pos = t * (colors.len() - 1) as f64;
        let i = (pos.floor() as usize).min(colors.len() - 2);
        let f = pos - i as f64;
        let [a, b] = [colors[i], colors[i + 1]];
        std::array::from_fn(|k| (a[k] as f64 * (1.0 - f) + b[k] as f64 * f).round() as u8)
    }
}

/// Parse `rrggbb`, `#rrggbb` or a CSS colour name.
pub fn parse_color(s: &str) -> Result<[u8; 3]> {
    let named = match s.to_ascii_lowercase().as_str() {
        "white" => Some([255, 255, 255]),
        "black" => Some([0, 0, 0]),
        "yellow" => Some([255, 255, 0]),
        "green" => Some([0, 128, 0]),
        "magenta" | "fuchsia" => Some([255, 0, 255]),
        "gray" | "grey" => Some([128, 128, 128]),
        "blue" => Some([0, 0, 255]),
        "red" => Some([255, 0, 0]),
        "cyan" | "aqua" => Some([0, 255, 255]),
        "orange" => Some([255, 165, 0]),
        _ => None,
    };
    if let Some(rgb) = named {
        return Ok(rgb);
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    let invalid = || Error::InvalidParameter {
        name: "palette",
        value: s.to_string(),
        reason: "expected rrggbb hex or a colour name".into(),
    };
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
    Ok([channel(0)?, channel(2)?, channel(4)?])
}

/// Render `raster` to north-up RGBA bytes (`width × height × 4`).
///
/// Grid row 0 is the south edge, so image rows are emitted in reverse.
/// Nodata pixels are fully transparent.
pub fn render_rgba(raster: &CategoricalRaster, params: &VisParams) -> Result<Vec<u8>> {
    params.check()?;
    let colors = params.colors()?;
    let alpha = (params.opacity * 255.0).round() as u8;
    let grid = raster.grid;

    let mut out = Vec::with_capacity(grid.len() * 4);
    for row in (0..grid.height).rev() {
        for col in 0..grid.width {
            let v = raster.get(row, col);
            if raster.is_nodata(v) {
                out.extend_from_slice(&[0, 0, 0, 0]);
            } else {
                let [r, g, b] = params.color_of(&colors, v as f64);
                out.extend_from_slice(&[r, g, b, alpha]);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridSpec;

    #[test]
    fn parses_hex_and_names() {
        assert_eq!(parse_color("373e8d").unwrap(), [0x37, 0x3e, 0x8d]);
        assert_eq!(parse_color("#20B82C").unwrap(), [0x20, 0xb8, 0x2c]);
        assert_eq!(parse_color("Magenta").unwrap(), [255, 0, 255]);
        assert!(parse_color("not-a-colour").is_err());
        assert!(parse_color("12345").is_err());
    }

    #[test]
    fn integer_classes_hit_palette_entries_exactly() {
        let p = VisParams::stability_classes();
        let colors = p.colors().unwrap();
        for (code, expected) in colors.iter().enumerate() {
            assert_eq!(p.color_of(&colors, code as f64), *expected);
        }
    }

    #[test]
    fn render_flips_rows_and_hides_nodata() {
        let grid = GridSpec::new(2, 2, 0.0, 2.0, 0.0, 2.0);
        // Row 0 (south): [0, 1]; row 1 (north): [2, nodata].
        let raster = CategoricalRaster::from_vec(grid, vec![0, 1, 2, 255])
            .unwrap()
            .with_nodata(Some(255));
        let rgba = render_rgba(&raster, &VisParams::yearly_classes()).unwrap();
        assert_eq!(rgba.len(), 16);
        // First emitted pixel is the north-west one (class 2, green, 60% opacity).
        assert_eq!(&rgba[0..4], &[0x20, 0xb8, 0x2c, 153]);
        assert_eq!(&rgba[4..8], &[0, 0, 0, 0]);
        assert_eq!(&rgba[8..12], &[0x37, 0x3e, 0x8d, 153]);
    }

    #[test]
    fn rejects_empty_palette() {
        let grid = GridSpec::new(1, 1, 0.0, 1.0, 0.0, 1.0);
        let raster = CategoricalRaster::filled(grid, 0);
        let params = VisParams { palette: vec![], ..VisParams::yearly_classes() };
        assert!(render_rgba(&raster, &params).is_err());
    }
}
