//! Colors, categorical color maps and continuous color ramps.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ParcelError;

/// Sentinel label used for missing or unmapped categories
pub const UNKNOWN_LABEL: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ColorSpec")]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Accepted spellings of a color in configuration
#[derive(Deserialize)]
#[serde(untagged)]
enum ColorSpec {
    Hex(String),
    Triple([u8; 3]),
}

impl TryFrom<ColorSpec> for Rgb {
    type Error = ParcelError;

    fn try_from(spec: ColorSpec) -> Result<Self, Self::Error> {
        match spec {
            ColorSpec::Hex(s) => Rgb::from_hex(&s),
            ColorSpec::Triple([r, g, b]) => Ok(Rgb(r, g, b)),
        }
    }
}

impl Rgb {
    pub const GRAY: Rgb = Rgb(128, 128, 128);

    /// Parse `#rrggbb` (leading `#` optional)
    pub fn from_hex(s: &str) -> Result<Self, ParcelError> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParcelError::InvalidColor(s.to_string()));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| ParcelError::InvalidColor(s.to_string()))
        };
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }

    pub fn opaque(self) -> Rgba {
        Rgba(self.0, self.1, self.2, 255)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Color with alpha, as handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba(pub u8, pub u8, pub u8, pub u8);

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba(0, 0, 0, 0);

    pub fn is_transparent(&self) -> bool {
        self.3 == 0
    }

    pub fn rgb(&self) -> Rgb {
        Rgb(self.0, self.1, self.2)
    }
}

/// Label → color lookup with an Unknown fallback
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ColorMap {
    #[serde(default = "default_unknown")]
    pub unknown: Rgb,
    #[serde(default)]
    pub colors: BTreeMap<String, Rgb>,
}

fn default_unknown() -> Rgb {
    Rgb::GRAY
}

impl ColorMap {
    pub fn new(colors: BTreeMap<String, Rgb>, unknown: Rgb) -> Self {
        Self { unknown, colors }
    }

    /// Color for a label. Absent labels (and `None`) get the Unknown color.
    pub fn lookup(&self, label: Option<&str>) -> Rgb {
        label
            .and_then(|l| self.colors.get(l))
            .copied()
            .unwrap_or(self.unknown)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.colors.contains_key(label)
    }
}

/// Ordered color stops interpolated over [0, 1]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Vec<Rgb>")]
pub struct ColorRamp {
    stops: Vec<Rgb>,
}

impl TryFrom<Vec<Rgb>> for ColorRamp {
    type Error = ParcelError;

    fn try_from(stops: Vec<Rgb>) -> Result<Self, Self::Error> {
        ColorRamp::new(stops)
    }
}

impl ColorRamp {
    pub fn new(stops: Vec<Rgb>) -> Result<Self, ParcelError> {
        if stops.is_empty() {
            return Err(ParcelError::EmptyRamp);
        }
        Ok(Self { stops })
    }

    pub fn stops(&self) -> &[Rgb] {
        &self.stops
    }

    /// Color at position `t`; `t` is clipped to [0, 1]
    pub fn interpolate(&self, t: f64) -> Rgb {
        if self.stops.len() == 1 {
            return self.stops[0];
        }
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let segments = (self.stops.len() - 1) as f64;
        let pos = t * segments;
        let lower = (pos.floor() as usize).min(self.stops.len() - 2);
        let frac = pos - lower as f64;

        let a = self.stops[lower];
        let b = self.stops[lower + 1];
        let mix = |x: u8, y: u8| (x as f64 + (y as f64 - x as f64) * frac).round() as u8;
        Rgb(mix(a.0, b.0), mix(a.1, b.1), mix(a.2, b.2))
    }
}

/// Fallback palette for categories with no configured color map
pub struct CategoryPalette {
    colors: Vec<Rgb>,
}

impl CategoryPalette {
    pub fn category10() -> Self {
        Self {
            colors: vec![
                Rgb(0x1f, 0x77, 0xb4),
                Rgb(0xff, 0x7f, 0x0e),
                Rgb(0x2c, 0xa0, 0x2c),
                Rgb(0xd6, 0x27, 0x28),
                Rgb(0x94, 0x67, 0xbd),
                Rgb(0x8c, 0x56, 0x4b),
                Rgb(0xe3, 0x77, 0xc2),
                Rgb(0x7f, 0x7f, 0x7f),
                Rgb(0xbc, 0xbd, 0x22),
                Rgb(0x17, 0xbe, 0xcf),
            ],
        }
    }

    /// Assign palette colors to sorted labels, cycling when there are more labels than colors.
    /// `Unknown` always maps to the gray fallback.
    pub fn assign(&self, labels: &[String]) -> ColorMap {
        let mut sorted: Vec<&String> = labels.iter().filter(|l| l.as_str() != UNKNOWN_LABEL).collect();
        sorted.sort();
        sorted.dedup();

        let colors = sorted
            .into_iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), self.colors[i % self.colors.len()]))
            .collect();
        ColorMap::new(colors, Rgb::GRAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_parse() {
        assert_eq!(Rgb::from_hex("#ff8000").unwrap(), Rgb(255, 128, 0));
        assert_eq!(Rgb::from_hex("00ff00").unwrap(), Rgb(0, 255, 0));
        assert!(Rgb::from_hex("#ff80").is_err());
        assert!(Rgb::from_hex("#gg0000").is_err());
    }

    #[test]
    fn test_color_map_fallback() {
        let mut colors = BTreeMap::new();
        colors.insert("Residential".to_string(), Rgb(255, 255, 0));
        let map = ColorMap::new(colors, Rgb(1, 2, 3));

        assert_eq!(map.lookup(Some("Residential")), Rgb(255, 255, 0));
        assert_eq!(map.lookup(Some("Spaceport")), Rgb(1, 2, 3));
        assert_eq!(map.lookup(None), Rgb(1, 2, 3));
    }

    #[test]
    fn test_ramp_endpoints_and_midpoint() {
        let ramp = ColorRamp::new(vec![Rgb(0, 0, 0), Rgb(200, 100, 50)]).unwrap();
        assert_eq!(ramp.interpolate(0.0), Rgb(0, 0, 0));
        assert_eq!(ramp.interpolate(1.0), Rgb(200, 100, 50));
        assert_eq!(ramp.interpolate(0.5), Rgb(100, 50, 25));
    }

    #[test]
    fn test_ramp_clips_out_of_range() {
        let ramp = ColorRamp::new(vec![Rgb(0, 0, 0), Rgb(10, 10, 10), Rgb(20, 20, 20)]).unwrap();
        assert_eq!(ramp.interpolate(-3.0), Rgb(0, 0, 0));
        assert_eq!(ramp.interpolate(7.0), Rgb(20, 20, 20));
        assert_eq!(ramp.interpolate(0.5), Rgb(10, 10, 10));
        assert_eq!(ramp.interpolate(0.75), Rgb(15, 15, 15));
    }

    #[test]
    fn test_single_stop_ramp() {
        let ramp = ColorRamp::new(vec![Rgb(9, 9, 9)]).unwrap();
        assert_eq!(ramp.interpolate(0.3), Rgb(9, 9, 9));
        assert!(ColorRamp::new(vec![]).is_err());
    }

    #[test]
    fn test_category_palette_assignment() {
        let labels = vec![
            "b".to_string(),
            "a".to_string(),
            "b".to_string(),
            UNKNOWN_LABEL.to_string(),
        ];
        let map = CategoryPalette::category10().assign(&labels);
        assert_eq!(map.colors.len(), 2);
        assert_eq!(map.lookup(Some("a")), Rgb(0x1f, 0x77, 0xb4));
        assert_eq!(map.lookup(Some("b")), Rgb(0xff, 0x7f, 0x0e));
        assert_eq!(map.lookup(Some(UNKNOWN_LABEL)), Rgb::GRAY);
    }

    #[test]
    fn test_color_map_deserialize() {
        let map: ColorMap = toml::from_str(
            r##"
            unknown = [10, 20, 30]
            [colors]
            Commercial = "#ff0000"
            "##,
        )
        .unwrap();
        assert_eq!(map.unknown, Rgb(10, 20, 30));
        assert_eq!(map.lookup(Some("Commercial")), Rgb(255, 0, 0));
    }
}
