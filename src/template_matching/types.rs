/// Template matching data types
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names a template image. Numbers and names both map to `<id>.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateId {
    Number(u32),
    Name(String),
}

impl TemplateId {
    pub fn file_name(&self) -> String {
        format!("{self}.png")
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateId::Number(n) => write!(f, "{n}"),
            TemplateId::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for TemplateId {
    fn from(n: u32) -> Self {
        TemplateId::Number(n)
    }
}

impl From<&str> for TemplateId {
    fn from(name: &str) -> Self {
        match name.parse::<u32>() {
            Ok(n) => TemplateId::Number(n),
            Err(_) => TemplateId::Name(name.to_string()),
        }
    }
}

/// A single match result
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Match {
    /// Center of the matched window, in screen pixels
    pub x: u32,
    pub y: u32,
    /// Normalized cross-correlation score
    pub correlation: f32,
}

/// Axis-aligned rectangle, `x`/`y` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    /// Build from two opposite corners in any order. `None` when degenerate.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Option<Self> {
        let (left, right) = (x1.min(x2), x1.max(x2));
        let (top, bottom) = (y1.min(y2), y1.max(y2));
        if left == right || top == bottom {
            return None;
        }
        Some(Region {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.saturating_add(self.width) <= width && self.y.saturating_add(self.height) <= height
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{} {}x{}]", self.x, self.y, self.width, self.height)
    }
}
