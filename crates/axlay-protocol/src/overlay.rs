//! Overlay rendering payload: text, geometry, colors, alignment and padding.
//!
//! Parsing is lenient. A color or alignment value that cannot be understood falls
//! back to that field's default instead of rejecting the whole payload.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::locate::LocateResult;

/// 32-bit ARGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color(pub u32);

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self(0xFF00_0000);
    /// Opaque white.
    pub const WHITE: Self = Self(0xFFFF_FFFF);

    /// Build from components.
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self(((a as u32) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32)
    }

    /// Alpha component.
    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Red, green and blue components.
    pub const fn rgb(self) -> (u8, u8, u8) {
        ((self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8)
    }

    /// Parse `#AARRGGBB`, `#RRGGBB` or a color name.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#')
            && hex.len() == 8
        {
            return u32::from_str_radix(hex, 16).ok().map(Self);
        }
        let (r, g, b) = colornames::Color::try_from(s).ok()?.rgb();
        Some(Self::argb(0xFF, r, g, b))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:08X}", self.0)
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Either representation a color may arrive in.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawColor {
    /// ARGB integer.
    Int(i64),
    /// Hex string or name.
    Str(String),
}

impl RawColor {
    /// Resolve to a color, if valid.
    fn resolve(self) -> Option<Color> {
        match self {
            // Negative values are how signed 32-bit ARGB ints arrive from other runtimes.
            Self::Int(v) if v < 0 => i32::try_from(v).ok().map(|v| Color(v as u32)),
            Self::Int(v) => u32::try_from(v).ok().map(Color),
            Self::Str(s) => Color::parse(&s),
        }
    }
}

impl<'de> Deserialize<'de> for Color {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawColor::deserialize(deserializer)?
            .resolve()
            .ok_or_else(|| serde::de::Error::custom("invalid color"))
    }
}

/// Deserialize a text color, falling back to black.
fn text_color<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
    Ok(RawColor::deserialize(d)?.resolve().unwrap_or(Color::BLACK))
}

/// Deserialize a background color, falling back to white.
fn background_color<'de, D: Deserializer<'de>>(d: D) -> Result<Color, D::Error> {
    Ok(RawColor::deserialize(d)?.resolve().unwrap_or(Color::WHITE))
}

/// Text alignment along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    /// Left, or top for the vertical axis.
    #[default]
    Start,
    /// Centered.
    Center,
    /// Right, or bottom for the vertical axis.
    End,
}

impl Align {
    /// Parse a horizontal alignment; unknown values map to `Start`.
    pub fn horizontal(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "center" => Self::Center,
            "right" | "end" => Self::End,
            _ => Self::Start,
        }
    }

    /// Parse a vertical alignment; unknown values map to `Center`.
    pub fn vertical(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "left" | "start" => Self::Start,
            "bottom" | "right" | "end" => Self::End,
            _ => Self::Center,
        }
    }
}

fn horizontal_align<'de, D: Deserializer<'de>>(d: D) -> Result<Align, D::Error> {
    Ok(Align::horizontal(&String::deserialize(d)?))
}

fn vertical_align<'de, D: Deserializer<'de>>(d: D) -> Result<Align, D::Error> {
    Ok(Align::vertical(&String::deserialize(d)?))
}

/// Inner spacing around overlay text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    /// Left inset.
    pub left: f64,
    /// Top inset.
    pub top: f64,
    /// Right inset.
    pub right: f64,
    /// Bottom inset.
    pub bottom: f64,
}

/// Everything needed to paint one overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySpec {
    /// Replacement text shown in the overlay.
    pub text: String,
    /// Left edge in screen pixels.
    pub x: f64,
    /// Top edge in screen pixels.
    pub y: f64,
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
    /// Font size in scaled pixels.
    #[serde(alias = "fontSize")]
    pub font_size: f64,
    /// Text colour; defaults to opaque black.
    #[serde(alias = "textColor", deserialize_with = "text_color")]
    pub text_color: Color,
    /// Fill colour; defaults to opaque white.
    #[serde(alias = "backgroundColor", deserialize_with = "background_color")]
    pub background_color: Color,
    /// Horizontal text placement.
    #[serde(alias = "horizontalAlign", deserialize_with = "horizontal_align")]
    pub horizontal_align: Align,
    /// Vertical text placement.
    #[serde(alias = "verticalAlign", deserialize_with = "vertical_align")]
    pub vertical_align: Align,
    /// Inner spacing around the text.
    pub padding: Padding,
}

impl Default for OverlaySpec {
    fn default() -> Self {
        Self {
            text: String::new(),
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            font_size: 14.0,
            text_color: Color::BLACK,
            background_color: Color::WHITE,
            horizontal_align: Align::Start,
            vertical_align: Align::Center,
            padding: Padding::default(),
        }
    }
}

impl OverlaySpec {
    /// Overlay with `text` and default styling.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Copy of this spec moved to the geometry of a successful result.
    ///
    /// Failed results leave the geometry untouched.
    #[must_use]
    pub fn placed_at(&self, result: &LocateResult) -> Self {
        let mut out = self.clone();
        if let Some(c) = result.coordinates {
            out.x = f64::from(c.x);
            out.y = f64::from(c.y);
        }
        if let Some(s) = result.size {
            out.width = f64::from(s.width);
            out.height = f64::from(s.height);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BoundingBox;

    #[test]
    fn colors_parse_hex_and_names() {
        assert_eq!(Color::parse("#80FF0000"), Some(Color(0x80FF_0000)));
        assert_eq!(Color::parse("#00FF00"), Some(Color(0xFF00_FF00)));
        assert_eq!(Color::parse("white"), Some(Color::WHITE));
        assert_eq!(Color::parse("#zz"), None);
    }

    #[test]
    fn defaults_match_plain_label_styling() {
        let s = OverlaySpec::default();
        assert_eq!(s.font_size, 14.0);
        assert_eq!(s.text_color, Color::BLACK);
        assert_eq!(s.background_color, Color::WHITE);
        assert_eq!(s.horizontal_align, Align::Start);
        assert_eq!(s.vertical_align, Align::Center);
    }

    #[test]
    fn invalid_fields_fall_back_per_field() {
        let s: OverlaySpec = serde_json::from_str(
            r##"{"text":"Hi","textColor":"not-a-color","backgroundColor":"#FF112233",
                "horizontalAlign":"RIGHT","verticalAlign":"sideways","fontSize":18}"##,
        )
        .unwrap();
        assert_eq!(s.text, "Hi");
        assert_eq!(s.text_color, Color::BLACK);
        assert_eq!(s.background_color, Color(0xFF11_2233));
        assert_eq!(s.horizontal_align, Align::End);
        assert_eq!(s.vertical_align, Align::Center);
        assert_eq!(s.font_size, 18.0);
    }

    #[test]
    fn integer_colors_are_argb() {
        let s: OverlaySpec = serde_json::from_str(r#"{"text_color": -16776961}"#).unwrap();
        assert_eq!(s.text_color, Color(0xFF00_00FF));
    }

    #[test]
    fn vertical_alignment_accepts_top_and_bottom() {
        assert_eq!(Align::vertical("Top"), Align::Start);
        assert_eq!(Align::vertical("bottom"), Align::End);
        assert_eq!(Align::horizontal("left"), Align::Start);
    }

    #[test]
    fn placed_at_copies_located_geometry() {
        let spec = OverlaySpec::with_text("Pay now");
        let placed = spec.placed_at(&LocateResult::found(&BoundingBox::new(5, 6, 45, 26), true));
        assert_eq!((placed.x, placed.y), (5.0, 6.0));
        assert_eq!((placed.width, placed.height), (40.0, 20.0));
        assert_eq!(placed.text, "Pay now");

        let unchanged = spec.placed_at(&LocateResult::failed("x"));
        assert_eq!(unchanged, spec);
    }
}
