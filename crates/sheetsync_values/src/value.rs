//! The typed value a coerced cell produces.

use std::collections::BTreeMap;
use std::fmt;

/// A typed cell value.
///
/// One variant per type a sheet cell can declare, plus the three
/// auto-detected scalars (`Bool`, `Number`, `String`). Values are
/// immutable snapshots; a changed cell produces a new value rather
/// than mutating the old one.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// A boolean, auto-detected from `true`/`false`.
    Bool(bool),
    /// A finite number, auto-detected via the exact round-trip rule.
    Number(f64),
    /// A plain string (the fallback, and the `string(...)` escape hatch).
    String(String),
    /// A 3-component vector.
    Vector3 {
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
        /// Z component.
        z: f64,
    },
    /// A 2-component vector.
    Vector2 {
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
    },
    /// A 2D scale/offset pair per axis.
    UDim2 {
        /// X-axis scale.
        x_scale: f64,
        /// X-axis offset.
        x_offset: f64,
        /// Y-axis scale.
        y_scale: f64,
        /// Y-axis offset.
        y_offset: f64,
    },
    /// A single scale/offset pair.
    UDim {
        /// Scale component.
        scale: f64,
        /// Offset component.
        offset: f64,
    },
    /// A linear color with components in `0.0..=1.0`.
    Color3 {
        /// Red component.
        r: f64,
        /// Green component.
        g: f64,
        /// Blue component.
        b: f64,
    },
    /// A color with byte components in `0..=255`.
    Rgb {
        /// Red component.
        r: u8,
        /// Green component.
        g: u8,
        /// Blue component.
        b: u8,
    },
    /// A named palette color, stored by its palette name.
    BrickColor(String),
    /// A rigid transform: position followed by the rotation matrix rows.
    CFrame([f64; 12]),
    /// An enumerated name path, e.g. `["Material", "Plastic"]`.
    Enum(Vec<String>),
    /// An axis-aligned rectangle.
    Rect {
        /// Minimum X.
        min_x: f64,
        /// Minimum Y.
        min_y: f64,
        /// Maximum X.
        max_x: f64,
        /// Maximum Y.
        max_y: f64,
    },
    /// An ordered sequence of strings.
    Array(Vec<String>),
    /// A string-to-string mapping.
    Dictionary(BTreeMap<String, String>),
}

impl TypedValue {
    /// Returns true for the composite (array/dictionary-shaped) variants.
    pub fn is_composite(&self) -> bool {
        matches!(self, TypedValue::Array(_) | TypedValue::Dictionary(_))
    }

    /// Returns the string content if this is a `String` value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TypedValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the numeric content if this is a `Number` value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            TypedValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean content if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TypedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for TypedValue {
    /// Renders the value in the same constructor syntax coercion accepts,
    /// so that re-coercing the rendering reproduces the value.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Bool(b) => write!(f, "{}", b),
            TypedValue::Number(n) => write!(f, "{}", n),
            TypedValue::String(s) => write!(f, "{}", s),
            TypedValue::Vector3 { x, y, z } => write!(f, "vector3({}, {}, {})", x, y, z),
            TypedValue::Vector2 { x, y } => write!(f, "vector2({}, {})", x, y),
            TypedValue::UDim2 {
                x_scale,
                x_offset,
                y_scale,
                y_offset,
            } => write!(f, "udim2({}, {}, {}, {})", x_scale, x_offset, y_scale, y_offset),
            TypedValue::UDim { scale, offset } => write!(f, "udim({}, {})", scale, offset),
            TypedValue::Color3 { r, g, b } => write!(f, "color3({}, {}, {})", r, g, b),
            TypedValue::Rgb { r, g, b } => write!(f, "rgb({}, {}, {})", r, g, b),
            TypedValue::BrickColor(name) => write!(f, "brickcolor({})", name),
            TypedValue::CFrame(components) => {
                write!(f, "cframe(")?;
                for (i, c) in components.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            TypedValue::Enum(path) => write!(f, "enum({})", path.join(", ")),
            TypedValue::Rect {
                min_x,
                min_y,
                max_x,
                max_y,
            } => write!(f, "rect({}, {}, {}, {})", min_x, min_y, max_x, max_y),
            TypedValue::Array(items) => write!(f, "array({})", items.join(", ")),
            TypedValue::Dictionary(map) => {
                write!(f, "dictionary(")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, ")")
            }
        }
    }
}
