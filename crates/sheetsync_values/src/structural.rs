//! Structural deep-equality, the change oracle.

use crate::value::TypedValue;
use std::collections::BTreeMap;

/// Compares two typed values structurally.
///
/// Scalars compare by value. Composites (arrays and dictionaries) are
/// equal iff they have the same key set and every element recursively
/// compares equal. A composite compared against a scalar is unequal.
pub fn structural_eq(a: &TypedValue, b: &TypedValue) -> bool {
    match (a, b) {
        (TypedValue::Bool(x), TypedValue::Bool(y)) => x == y,
        (TypedValue::Number(x), TypedValue::Number(y)) => x == y,
        (TypedValue::String(x), TypedValue::String(y)) => x == y,
        (
            TypedValue::Vector3 { x, y, z },
            TypedValue::Vector3 {
                x: x2,
                y: y2,
                z: z2,
            },
        ) => x == x2 && y == y2 && z == z2,
        (TypedValue::Vector2 { x, y }, TypedValue::Vector2 { x: x2, y: y2 }) => {
            x == x2 && y == y2
        }
        (
            TypedValue::UDim2 {
                x_scale,
                x_offset,
                y_scale,
                y_offset,
            },
            TypedValue::UDim2 {
                x_scale: xs2,
                x_offset: xo2,
                y_scale: ys2,
                y_offset: yo2,
            },
        ) => x_scale == xs2 && x_offset == xo2 && y_scale == ys2 && y_offset == yo2,
        (
            TypedValue::UDim { scale, offset },
            TypedValue::UDim {
                scale: s2,
                offset: o2,
            },
        ) => scale == s2 && offset == o2,
        (
            TypedValue::Color3 { r, g, b },
            TypedValue::Color3 {
                r: r2,
                g: g2,
                b: b2,
            },
        ) => r == r2 && g == g2 && b == b2,
        (
            TypedValue::Rgb { r, g, b },
            TypedValue::Rgb {
                r: r2,
                g: g2,
                b: b2,
            },
        ) => r == r2 && g == g2 && b == b2,
        (TypedValue::BrickColor(x), TypedValue::BrickColor(y)) => x == y,
        (TypedValue::CFrame(x), TypedValue::CFrame(y)) => x == y,
        (TypedValue::Enum(x), TypedValue::Enum(y)) => x == y,
        (
            TypedValue::Rect {
                min_x,
                min_y,
                max_x,
                max_y,
            },
            TypedValue::Rect {
                min_x: mx2,
                min_y: my2,
                max_x: xx2,
                max_y: xy2,
            },
        ) => min_x == mx2 && min_y == my2 && max_x == xx2 && max_y == xy2,
        (TypedValue::Array(x), TypedValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| a == b)
        }
        (TypedValue::Dictionary(x), TypedValue::Dictionary(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, value)| match y.get(key) {
                    Some(other) => value == other,
                    None => false,
                })
        }
        // Mismatched variants, including composite vs scalar.
        _ => false,
    }
}

/// Compares two label-to-value maps structurally.
///
/// A key present on only one side makes the maps unequal; two absent
/// keys compare equal by never being visited.
pub fn maps_equal(a: &BTreeMap<String, TypedValue>, b: &BTreeMap<String, TypedValue>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().all(|(key, value)| match b.get(key) {
        Some(other) => structural_eq(value, other),
        None => false,
    })
}
