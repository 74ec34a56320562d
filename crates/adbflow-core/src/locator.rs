//! Touch targets

use serde::{Deserialize, Serialize};
use std::fmt;

/// A screen coordinate in device pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// How a touch action finds its target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// Absolute screen coordinate
    Coordinate(Point),
    /// Element path in the UI hierarchy (xpath subset)
    ElementPath(String),
    /// Element whose visible text matches
    Text(String),
    /// Image template to find on screen
    Image(String),
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Coordinate(p) => write!(f, "coordinate {}", p),
            Locator::ElementPath(path) => write!(f, "xpath {}", path),
            Locator::Text(text) => write!(f, "text '{}'", text),
            Locator::Image(image) => write!(f, "image {}", image),
        }
    }
}
