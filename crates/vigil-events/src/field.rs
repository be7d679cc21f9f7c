//! Field descriptors and their wire encodings.
//!
//! A registered event type is described by an ordered list of [`Field`]s.
//! Each field knows its name, its wire kind, and how to get and set the
//! value on the concrete event struct. The registry walks the list in order
//! to produce or consume an event body:
//!
//! | Kind        | Encoding                                             |
//! |-------------|------------------------------------------------------|
//! | `Bool`      | 1 byte, 0 or 1                                       |
//! | `Short`     | `u16`, big-endian                                    |
//! | `Int`       | `i32`, big-endian                                    |
//! | `UInt`      | `u32`, big-endian                                    |
//! | `Timestamp` | `i64` as two big-endian `u32` words, high then low   |
//! | `String`    | UTF-8 bytes then a NUL                               |
//! | `Double`    | shortest round-trip decimal text then a NUL          |

use std::fmt;

use bytes::BufMut;

use crate::{Event, EventError};

/// The wire kind of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Short,
    Int,
    UInt,
    Timestamp,
    String,
    Double,
}

/// A single field value, detached from any event.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Short(u16),
    Int(i32),
    UInt(u32),
    Timestamp(i64),
    String(String),
    Double(f64),
}

impl FieldValue {
    /// Returns the wire kind of this value.
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Bool(_) => FieldKind::Bool,
            Self::Short(_) => FieldKind::Short,
            Self::Int(_) => FieldKind::Int,
            Self::UInt(_) => FieldKind::UInt,
            Self::Timestamp(_) => FieldKind::Timestamp,
            Self::String(_) => FieldKind::String,
            Self::Double(_) => FieldKind::Double,
        }
    }

    /// Appends the wire form of this value to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::Bool(v) => out.put_u8(u8::from(*v)),
            Self::Short(v) => out.put_u16(*v),
            Self::Int(v) => out.put_i32(*v),
            Self::UInt(v) => out.put_u32(*v),
            Self::Timestamp(v) => {
                out.put_u32((*v >> 32) as u32);
                out.put_u32(*v as u32);
            }
            Self::String(v) => {
                out.put_slice(v.as_bytes());
                out.put_u8(0);
            }
            Self::Double(v) => {
                out.put_slice(v.to_string().as_bytes());
                out.put_u8(0);
            }
        }
    }

    /// Reads one value of `kind` from the front of `input`, advancing it.
    ///
    /// `field` only names the field in the error.
    pub fn decode(
        kind: FieldKind,
        field: &'static str,
        input: &mut &[u8],
    ) -> Result<Self, EventError> {
        let value = match kind {
            FieldKind::Bool => Self::Bool(take::<1>(field, input)?[0] != 0),
            FieldKind::Short => Self::Short(u16::from_be_bytes(take(field, input)?)),
            FieldKind::Int => Self::Int(i32::from_be_bytes(take(field, input)?)),
            FieldKind::UInt => Self::UInt(u32::from_be_bytes(take(field, input)?)),
            FieldKind::Timestamp => {
                let high = u32::from_be_bytes(take(field, input)?);
                let low = u32::from_be_bytes(take(field, input)?);
                Self::Timestamp((((high as u64) << 32) | low as u64) as i64)
            }
            FieldKind::String => {
                let text = take_terminated(field, input)?;
                let text = std::str::from_utf8(text)
                    .map_err(|_| EventError::InvalidUtf8 { field })?;
                Self::String(text.to_owned())
            }
            FieldKind::Double => {
                let text = take_terminated(field, input)?;
                let text = String::from_utf8_lossy(text);
                let value = text.parse::<f64>().map_err(|_| {
                    EventError::InvalidDouble {
                        field,
                        text: text.to_string(),
                    }
                })?;
                Self::Double(value)
            }
        };
        Ok(value)
    }
}

fn take<const N: usize>(
    field: &'static str,
    input: &mut &[u8],
) -> Result<[u8; N], EventError> {
    if input.len() < N {
        return Err(EventError::Truncated {
            field,
            needed: N,
            remaining: input.len(),
        });
    }
    let (head, rest) = input.split_at(N);
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(head);
    *input = rest;
    Ok(bytes)
}

fn take_terminated<'a>(
    field: &'static str,
    input: &mut &'a [u8],
) -> Result<&'a [u8], EventError> {
    let Some(nul) = input.iter().position(|b| *b == 0) else {
        return Err(EventError::MissingTerminator { field });
    };
    let text = &input[..nul];
    *input = &input[nul + 1..];
    Ok(text)
}

// ---------------------------------------------------------------------------
// Field descriptors
// ---------------------------------------------------------------------------

type Getter = Box<dyn Fn(&dyn Event) -> Option<FieldValue> + Send + Sync>;
type Setter = Box<dyn Fn(&mut dyn Event, FieldValue) -> bool + Send + Sync>;

/// Describes one field of a registered event type.
///
/// Build descriptors with the typed constructors, which take plain
/// function pointers over the concrete event struct:
///
/// ```rust
/// use vigil_events::{Event, EventType, Field};
///
/// #[derive(Debug, Default)]
/// struct HostCheck {
///     host_id: u32,
///     output: String,
/// }
///
/// impl Event for HostCheck {
///     fn event_type(&self) -> EventType {
///         EventType::new(1, 8)
///     }
/// }
///
/// let fields = vec![
///     Field::uint::<HostCheck>("host_id", |e| e.host_id, |e, v| e.host_id = v),
///     Field::string::<HostCheck>(
///         "output",
///         |e| e.output.clone(),
///         |e, v| e.output = v,
///     ),
/// ];
/// assert_eq!(fields[1].name(), "output");
/// ```
pub struct Field {
    name: &'static str,
    kind: FieldKind,
    get: Getter,
    set: Setter,
}

impl Field {
    fn typed<T: Event>(
        name: &'static str,
        kind: FieldKind,
        get: impl Fn(&T) -> FieldValue + Send + Sync + 'static,
        set: impl Fn(&mut T, FieldValue) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            kind,
            get: Box::new(move |event: &dyn Event| {
                event.downcast_ref::<T>().map(&get)
            }),
            set: Box::new(move |event: &mut dyn Event, value: FieldValue| {
                match event.downcast_mut::<T>() {
                    Some(event) => set(event, value),
                    None => false,
                }
            }),
        }
    }

    pub fn boolean<T: Event>(
        name: &'static str,
        get: fn(&T) -> bool,
        set: fn(&mut T, bool),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::Bool,
            move |e| FieldValue::Bool(get(e)),
            move |e, v| match v {
                FieldValue::Bool(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    pub fn short<T: Event>(
        name: &'static str,
        get: fn(&T) -> u16,
        set: fn(&mut T, u16),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::Short,
            move |e| FieldValue::Short(get(e)),
            move |e, v| match v {
                FieldValue::Short(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    pub fn int<T: Event>(
        name: &'static str,
        get: fn(&T) -> i32,
        set: fn(&mut T, i32),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::Int,
            move |e| FieldValue::Int(get(e)),
            move |e, v| match v {
                FieldValue::Int(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    pub fn uint<T: Event>(
        name: &'static str,
        get: fn(&T) -> u32,
        set: fn(&mut T, u32),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::UInt,
            move |e| FieldValue::UInt(get(e)),
            move |e, v| match v {
                FieldValue::UInt(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    /// A time value in seconds since the epoch.
    pub fn timestamp<T: Event>(
        name: &'static str,
        get: fn(&T) -> i64,
        set: fn(&mut T, i64),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::Timestamp,
            move |e| FieldValue::Timestamp(get(e)),
            move |e, v| match v {
                FieldValue::Timestamp(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    pub fn string<T: Event>(
        name: &'static str,
        get: fn(&T) -> String,
        set: fn(&mut T, String),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::String,
            move |e| FieldValue::String(get(e)),
            move |e, v| match v {
                FieldValue::String(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    pub fn double<T: Event>(
        name: &'static str,
        get: fn(&T) -> f64,
        set: fn(&mut T, f64),
    ) -> Self {
        Self::typed(
            name,
            FieldKind::Double,
            move |e| FieldValue::Double(get(e)),
            move |e, v| match v {
                FieldValue::Double(v) => {
                    set(e, v);
                    true
                }
                _ => false,
            },
        )
    }

    /// The field's name, used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The field's wire kind.
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Reads the field from `event`.
    ///
    /// Returns `None` if `event` is not the struct this field was built for.
    pub fn get(&self, event: &dyn Event) -> Option<FieldValue> {
        (self.get)(event)
    }

    /// Writes `value` into `event`.
    ///
    /// Returns `false` if `event` is not the struct this field was built
    /// for or `value` is of the wrong kind.
    pub fn set(&self, event: &mut dyn Event, value: FieldValue) -> bool {
        (self.set)(event, value)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
