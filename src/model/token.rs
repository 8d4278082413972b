//! Positioned text tokens.

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in page units, top-left origin (Y grows downward).
///
/// Serialized as `[x0, y0, x1, y1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    /// Left edge
    pub x0: f64,
    /// Top edge
    pub y0: f64,
    /// Right edge
    pub x1: f64,
    /// Bottom edge
    pub y1: f64,
}

impl BBox {
    /// Create a bounding box from its four edges.
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Reorder the edges so that `x0 <= x1` and `y0 <= y1`.
    pub fn normalized(self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    /// Width of the box.
    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    /// Height of the box.
    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Area of the box.
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Whether all four edges are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x0.is_finite() && self.y0.is_finite() && self.x1.is_finite() && self.y1.is_finite()
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Union of an iterator of boxes, or `None` if it is empty.
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a BBox>) -> Option<BBox> {
        boxes.into_iter().fold(None, |acc, b| match acc {
            None => Some(*b),
            Some(u) => Some(u.union(b)),
        })
    }
}

impl From<[f64; 4]> for BBox {
    fn from(v: [f64; 4]) -> Self {
        BBox::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x0, b.y0, b.x1, b.y1]
    }
}

/// A single positioned text fragment with font metadata.
///
/// Tokens are created once by the normalizer and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The text content
    pub text: String,
    /// Bounding box in page units
    pub bbox: BBox,
    /// Font size in points
    pub font_size: f64,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
    /// Whether the font appears to be bold
    pub is_bold: bool,
    /// Page number (1-indexed)
    pub page_number: u32,
}

impl Token {
    /// Create a token whose font size is taken from the box height.
    pub fn new(text: impl Into<String>, bbox: BBox, page_number: u32) -> Self {
        Self {
            text: text.into(),
            bbox,
            font_size: bbox.height(),
            font_name: String::new(),
            is_bold: false,
            page_number,
        }
    }

    /// Set font name and size.
    pub fn with_font(mut self, name: impl Into<String>, size: f64) -> Self {
        self.font_name = name.into();
        self.font_size = size;
        self
    }

    /// Mark the token as bold.
    pub fn bold(mut self) -> Self {
        self.is_bold = true;
        self
    }

    /// Left edge.
    pub fn x0(&self) -> f64 {
        self.bbox.x0
    }

    /// Top edge.
    pub fn y0(&self) -> f64 {
        self.bbox.y0
    }

    /// Right edge.
    pub fn x1(&self) -> f64 {
        self.bbox.x1
    }

    /// Number of characters in the text.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}
