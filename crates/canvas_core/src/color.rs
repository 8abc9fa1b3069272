//! Color parsing and manipulation utilities.
//!
//! Colors are straight (non-premultiplied) RGBA with components in `0.0..=1.0`.
//! In configuration files they are written as CSS-like strings and serialized
//! back as `#rrggbbaa`.

use palette::{IntoColor, Lab, Srgb};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::rgba(
            r as f32 / 255.0,
            g as f32 / 255.0,
            b as f32 / 255.0,
            a as f32 / 255.0,
        )
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [c(self.r), c(self.g), c(self.b), c(self.a)]
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }

    /// Perceived lightness in `0.0..=1.0` (CIE L*, scaled)
    pub fn luminance(self) -> f32 {
        let lab: Lab = Srgb::new(self.r, self.g, self.b).into_linear().into_color();
        (lab.l / 100.0).clamp(0.0, 1.0)
    }

    /// Darkens light colors and lightens dark ones by `amount`
    ///
    /// Used for grid lines, which must stay visible on any page color.
    pub fn contrasting_shade(self, amount: f32) -> Self {
        if self.luminance() < 0.5 {
            Self::rgba(
                (self.r + amount).min(1.0),
                (self.g + amount).min(1.0),
                (self.b + amount).min(1.0),
                self.a,
            )
        } else {
            Self::rgba(
                (self.r - amount).max(0.0),
                (self.g - amount).max(0.0),
                (self.b - amount).max(0.0),
                self.a,
            )
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        parse_color(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid color: {value:?}")))
    }
}

/// Parse a color string.
///
/// Supports the following formats:
/// - Hex colors: #RGB, #RRGGBB, #RRGGBBAA (with or without # prefix)
/// - RGB/RGBA: rgb(r, g, b), rgba(r, g, b, a)
/// - Named colors: black, white, red, etc.
///
/// ```
/// use canvas_core::color::parse_color;
///
/// let red = parse_color("#ff0000").unwrap();
/// assert_eq!(red.r, 1.0);
/// assert!(parse_color("rgb(0, 255, 0)").is_some());
/// ```
pub fn parse_color(value: &str) -> Option<Color> {
    let value = value.trim();

    if value.eq_ignore_ascii_case("transparent") {
        return Some(Color::TRANSPARENT);
    }

    if value.starts_with("rgb") {
        return parse_rgb_color(value);
    }

    if let Some(color) = parse_hex_color(value) {
        return Some(color);
    }

    match value.to_lowercase().as_str() {
        "black" => Some(Color::BLACK),
        "white" => Some(Color::WHITE),
        "red" => Some(Color::rgb(1.0, 0.0, 0.0)),
        "green" => Some(Color::rgb(0.0, 1.0, 0.0)),
        "blue" => Some(Color::rgb(0.0, 0.0, 1.0)),
        "yellow" => Some(Color::rgb(1.0, 1.0, 0.0)),
        "gray" | "grey" => Some(Color::rgb(0.5, 0.5, 0.5)),
        _ => None,
    }
}

fn parse_hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

    match hex.len() {
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1].repeat(2), 16).ok();
            Some(Color::from_rgba8(digit(0)?, digit(1)?, digit(2)?, 255))
        }
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

fn parse_rgb_color(value: &str) -> Option<Color> {
    let components = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))?
        .strip_suffix(')')?;

    let parts: Vec<&str> = components.split(',').collect();
    if parts.len() < 3 {
        return None;
    }

    let r = parse_rgb_component(parts[0])?;
    let g = parse_rgb_component(parts[1])?;
    let b = parse_rgb_component(parts[2])?;
    let a = match parts.get(3) {
        Some(a) => a.trim().parse::<f32>().ok()?.clamp(0.0, 1.0),
        None => 1.0,
    };

    Some(Color::rgba(r, g, b, a))
}

/// A single RGB component, either 0-255 or a percentage
fn parse_rgb_component(value: &str) -> Option<f32> {
    let value = value.trim();

    if let Some(percent) = value.strip_suffix('%') {
        percent.parse::<f32>().ok().map(|v| (v / 100.0).clamp(0.0, 1.0))
    } else {
        value.parse::<u8>().ok().map(|v| v as f32 / 255.0)
    }
}
