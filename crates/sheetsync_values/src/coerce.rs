//! Cell coercion: raw strings into typed values.

use crate::value::TypedValue;
use std::collections::BTreeMap;
use thiserror::Error;

/// Result type for coercion.
pub type CoerceResult = Result<TypedValue, CoerceError>;

/// Errors produced by an explicit typed constructor.
///
/// These are per-cell failures: the refresh that encountered them skips
/// the cell and carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// The constructor received the wrong number of arguments.
    #[error("{type_name} expects {expected} arguments, got {got}")]
    Arity {
        /// Constructor name.
        type_name: &'static str,
        /// Expected argument count description.
        expected: &'static str,
        /// Actual argument count.
        got: usize,
    },

    /// A numeric argument failed to parse.
    #[error("{type_name}: invalid numeric component {value:?}")]
    NumericComponent {
        /// Constructor name.
        type_name: &'static str,
        /// The offending argument.
        value: String,
    },

    /// A dictionary entry had no `=` separator.
    #[error("dictionary entry {entry:?} is missing '='")]
    DictionaryEntry {
        /// The offending entry.
        entry: String,
    },
}

/// Coerces a raw cell string into a typed value.
///
/// Detection runs in priority order:
/// 1. `string(<inner>)` returns `<inner>` verbatim (escape hatch)
/// 2. case-insensitive `true`/`false`
/// 3. numbers that re-render exactly as the input (`"007"` and `"1e2"`
///    stay strings)
/// 4. explicit typed constructors, e.g. `vector3(1, 2, 3)`
/// 5. the raw string unchanged
///
/// Unknown constructor names fall through to rule 5; malformed arguments
/// to a known constructor return a [`CoerceError`].
pub fn coerce(raw: &str) -> CoerceResult {
    if let Some((name, inner)) = split_constructor(raw) {
        if name.eq_ignore_ascii_case("string") {
            return Ok(TypedValue::String(inner.to_string()));
        }
    }

    if raw.eq_ignore_ascii_case("true") {
        return Ok(TypedValue::Bool(true));
    }
    if raw.eq_ignore_ascii_case("false") {
        return Ok(TypedValue::Bool(false));
    }

    // Exact round-trip guard: only accept numbers whose canonical
    // rendering reproduces the input, so "007" and "1e2" stay strings.
    if let Ok(n) = raw.parse::<f64>() {
        if n.is_finite() && format!("{}", n) == raw {
            return Ok(TypedValue::Number(n));
        }
    }

    if let Some((name, inner)) = split_constructor(raw) {
        if let Some(value) = construct(&name.to_ascii_lowercase(), inner)? {
            return Ok(value);
        }
    }

    Ok(TypedValue::String(raw.to_string()))
}

/// Splits `Name(args)` into `(Name, args)`. The name must be non-empty
/// and the closing paren must be the final character.
fn split_constructor(raw: &str) -> Option<(&str, &str)> {
    let open = raw.find('(')?;
    if open == 0 || !raw.ends_with(')') {
        return None;
    }
    Some((&raw[..open], &raw[open + 1..raw.len() - 1]))
}

/// Dispatches a lowercased constructor name. Returns `Ok(None)` for an
/// unknown name so the caller can fall through to the string rule.
fn construct(name: &str, inner: &str) -> Result<Option<TypedValue>, CoerceError> {
    let value = match name {
        "vector3" => {
            let [x, y, z] = numeric_args::<3>("vector3", inner)?;
            TypedValue::Vector3 { x, y, z }
        }
        "vector2" => {
            let [x, y] = numeric_args::<2>("vector2", inner)?;
            TypedValue::Vector2 { x, y }
        }
        "udim2" => {
            let [x_scale, x_offset, y_scale, y_offset] = numeric_args::<4>("udim2", inner)?;
            TypedValue::UDim2 {
                x_scale,
                x_offset,
                y_scale,
                y_offset,
            }
        }
        "udim" => {
            let [scale, offset] = numeric_args::<2>("udim", inner)?;
            TypedValue::UDim { scale, offset }
        }
        "color3" => {
            let [r, g, b] = numeric_args::<3>("color3", inner)?;
            TypedValue::Color3 { r, g, b }
        }
        "rgb" => {
            let args = split_args(inner);
            if args.len() != 3 {
                return Err(CoerceError::Arity {
                    type_name: "rgb",
                    expected: "3",
                    got: args.len(),
                });
            }
            let mut bytes = [0u8; 3];
            for (slot, arg) in bytes.iter_mut().zip(&args) {
                *slot = arg.parse::<u8>().map_err(|_| CoerceError::NumericComponent {
                    type_name: "rgb",
                    value: arg.to_string(),
                })?;
            }
            TypedValue::Rgb {
                r: bytes[0],
                g: bytes[1],
                b: bytes[2],
            }
        }
        "brickcolor" => TypedValue::BrickColor(inner.trim().to_string()),
        "cframe" => {
            let args = split_args(inner);
            match args.len() {
                3 => {
                    let [x, y, z] = numeric_args::<3>("cframe", inner)?;
                    TypedValue::CFrame([x, y, z, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
                }
                12 => {
                    let parsed = numeric_args::<12>("cframe", inner)?;
                    TypedValue::CFrame(parsed)
                }
                got => {
                    return Err(CoerceError::Arity {
                        type_name: "cframe",
                        expected: "3 or 12",
                        got,
                    })
                }
            }
        }
        "enum" => {
            let path = split_args(inner);
            if path.is_empty() {
                return Err(CoerceError::Arity {
                    type_name: "enum",
                    expected: "at least 1",
                    got: 0,
                });
            }
            TypedValue::Enum(path)
        }
        "rect" => {
            let [min_x, min_y, max_x, max_y] = numeric_args::<4>("rect", inner)?;
            TypedValue::Rect {
                min_x,
                min_y,
                max_x,
                max_y,
            }
        }
        "array" => TypedValue::Array(split_args(inner)),
        "dictionary" => {
            let mut map = BTreeMap::new();
            for entry in split_args(inner) {
                let (key, value) =
                    entry
                        .split_once('=')
                        .ok_or_else(|| CoerceError::DictionaryEntry {
                            entry: entry.clone(),
                        })?;
                map.insert(key.trim().to_string(), value.trim().to_string());
            }
            TypedValue::Dictionary(map)
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

/// Splits a comma-separated argument list, trimming each argument.
/// An empty inner string yields no arguments.
fn split_args(inner: &str) -> Vec<String> {
    if inner.trim().is_empty() {
        return Vec::new();
    }
    inner.split(',').map(|arg| arg.trim().to_string()).collect()
}

/// Parses exactly `N` numeric arguments.
fn numeric_args<const N: usize>(type_name: &'static str, inner: &str) -> Result<[f64; N], CoerceError> {
    let args = split_args(inner);
    if args.len() != N {
        return Err(CoerceError::Arity {
            type_name,
            expected: match N {
                2 => "2",
                3 => "3",
                4 => "4",
                12 => "12",
                _ => "a fixed number of",
            },
            got: args.len(),
        });
    }
    let mut out = [0.0; N];
    for (slot, arg) in out.iter_mut().zip(&args) {
        *slot = arg.parse::<f64>().map_err(|_| CoerceError::NumericComponent {
            type_name,
            value: arg.to_string(),
        })?;
    }
    Ok(out)
}
