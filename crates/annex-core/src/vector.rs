//! Vector values: parsing, serialization, formatting, and cosine distance.
//!
//! A [`Vector`] is a tagged buffer of numeric elements. Only 32-bit
//! floats are defined today; the type tag exists so quantized element
//! types can share these code paths later without changing callers.
//!
//! Two external representations are supported, and both round-trip:
//!
//! - **Text**: `[e0,e1,...]` with optional whitespace, elements parsed
//!   as decimal floating point.
//! - **Blob**: a 4-byte little-endian element count followed by the
//!   elements as little-endian f32. The same encoding is used for SQL
//!   blob arguments and for vectors embedded in index blocks.

use crate::codec;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of elements in a vector.
pub const MAX_VECTOR_DIMS: usize = 16000;

/// Maximum length, in characters, of a single float token in text form.
pub const MAX_FLOAT_TOKEN_LEN: usize = 1024;

/// Element type stored in a vector.
///
/// Only `F32` is defined; other tag values are reserved for quantized
/// element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VectorType {
    /// IEEE-754 32-bit floats.
    F32,
}

impl VectorType {
    /// Returns the on-disk tag for this element type.
    #[must_use]
    pub const fn tag(self) -> u16 {
        0
    }

    /// Decodes an on-disk element-type tag.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unsupported`] for any tag other than `F32`.
    pub fn from_tag(tag: u16) -> Result<Self> {
        match tag {
            0 => Ok(Self::F32),
            other => Err(Error::Unsupported(format!("unknown vector type: {other}"))),
        }
    }
}

/// Borrowed SQL argument handed over by the host engine.
///
/// The host maps its own value representation into this enum before
/// calling [`Vector::parse`].
#[derive(Debug, Clone, Copy)]
pub enum ValueRef<'a> {
    /// A UTF-8 text value.
    Text(&'a str),
    /// A blob value.
    Blob(&'a [u8]),
    /// SQL NULL or any other value kind.
    Null,
}

/// An in-memory vector value.
///
/// The element buffer is uniquely owned and always holds exactly
/// [`Vector::dims`] elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Vector {
    vtype: VectorType,
    elems: Vec<f32>,
}

impl Vector {
    /// Creates an `F32` vector from raw elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LimitExceeded`] when there are more than
    /// [`MAX_VECTOR_DIMS`] elements.
    pub fn from_f32(elems: Vec<f32>) -> Result<Self> {
        if elems.len() > MAX_VECTOR_DIMS {
            return Err(Error::LimitExceeded(format!(
                "vector is larger than the maximum: ({MAX_VECTOR_DIMS})"
            )));
        }
        Ok(Self {
            vtype: VectorType::F32,
            elems,
        })
    }

    /// Returns the element type of this vector.
    #[must_use]
    pub const fn vector_type(&self) -> VectorType {
        self.vtype
    }

    /// Returns the number of elements.
    #[must_use]
    pub fn dims(&self) -> usize {
        self.elems.len()
    }

    /// Returns true if the vector has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Returns the elements as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.elems
    }

    /// Parses a vector from a SQL argument, dispatching on its kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for value kinds other than
    /// text and blob, plus whatever [`Vector::parse_text`] and
    /// [`Vector::parse_blob`] return.
    pub fn parse(value: ValueRef<'_>) -> Result<Self> {
        match value {
            ValueRef::Text(text) => Self::parse_text(text),
            ValueRef::Blob(blob) => Self::parse_blob(blob),
            ValueRef::Null => Err(Error::InvalidArgument(
                "invalid vector: not a text or blob type".to_string(),
            )),
        }
    }

    /// Parses the text form `[e0,e1,...]`.
    ///
    /// Leading whitespace is skipped and whitespace between tokens is
    /// ignored. An all-whitespace input yields an empty vector. Content
    /// after the closing `]` is tolerated and ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] when the `[`/`]` framing is missing
    ///   or an element fails float parsing.
    /// - [`Error::LimitExceeded`] when an element token exceeds
    ///   [`MAX_FLOAT_TOKEN_LEN`] characters or the dimension exceeds
    ///   [`MAX_VECTOR_DIMS`].
    pub fn parse_text(text: &str) -> Result<Self> {
        let text = text.trim_start();
        if text.is_empty() {
            return Ok(Self {
                vtype: VectorType::F32,
                elems: Vec::new(),
            });
        }
        let Some(body) = text.strip_prefix('[') else {
            return Err(Error::InvalidArgument(
                "invalid vector: doesn't start with '['".to_string(),
            ));
        };

        let mut elems = Vec::new();
        let mut token = String::new();
        let mut closed = false;
        for ch in body.chars() {
            if ch == ']' {
                closed = true;
                break;
            }
            if ch.is_whitespace() {
                continue;
            }
            if ch == ',' {
                push_element(&mut elems, &token)?;
                token.clear();
            } else {
                token.push(ch);
                if token.len() > MAX_FLOAT_TOKEN_LEN {
                    return Err(Error::LimitExceeded(format!(
                        "float too big while parsing vector: {token}..."
                    )));
                }
            }
        }
        if !token.is_empty() {
            push_element(&mut elems, &token)?;
        }
        if !closed {
            return Err(Error::InvalidArgument(
                "malformed vector, doesn't end with ']'".to_string(),
            ));
        }
        Ok(Self {
            vtype: VectorType::F32,
            elems,
        })
    }

    /// Parses the blob form: a little-endian element count followed by
    /// the elements.
    ///
    /// The buffer may be longer than `4 + 4 * count`; trailing bytes are
    /// ignored. The declared count is validated before any allocation.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] when the buffer is shorter than its
    ///   declared payload.
    /// - [`Error::LimitExceeded`] when the declared count exceeds
    ///   [`MAX_VECTOR_DIMS`].
    pub fn parse_blob(blob: &[u8]) -> Result<Self> {
        if blob.len() < 4 {
            return Err(Error::InvalidArgument(
                "invalid vector: malformed blob".to_string(),
            ));
        }
        let dims = codec::read_u32(blob) as usize;
        if dims > MAX_VECTOR_DIMS {
            return Err(Error::LimitExceeded(format!(
                "invalid vector: too large: {dims}"
            )));
        }
        let payload = &blob[4..];
        if payload.len() < dims * 4 {
            return Err(Error::InvalidArgument(
                "invalid vector: malformed blob".to_string(),
            ));
        }
        let mut elems = Vec::with_capacity(dims);
        for chunk in payload[..dims * 4].chunks_exact(4) {
            elems.push(codec::read_f32(chunk));
        }
        Ok(Self {
            vtype: VectorType::F32,
            elems,
        })
    }

    /// Serializes to the blob form.
    #[must_use]
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = vec![0u8; 4 + 4 * self.elems.len()];
        let dims = u32::try_from(self.elems.len()).expect("dims bounded by MAX_VECTOR_DIMS");
        let mut off = codec::write_u32(&mut blob, dims);
        for &elem in &self.elems {
            off += codec::write_f32(&mut blob[off..], elem);
        }
        debug_assert_eq!(off, blob.len());
        blob
    }

    /// Formats to the text form `[e0,e1,...]`.
    ///
    /// Elements whose value equals their truncation to `u64` render in
    /// decimal integer form, everything else in `{:.6e}` scientific
    /// form. This is a rendering convention, not a precision guarantee.
    #[must_use]
    pub fn to_text(&self) -> String {
        use fmt::Write;

        let mut out = String::with_capacity(2 + self.elems.len() * 14);
        out.push('[');
        for (i, &elem) in self.elems.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            if is_integral(elem) {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let _ = write!(out, "{}", elem as u64);
            } else {
                let _ = write!(out, "{elem:.6e}");
            }
        }
        out.push(']');
        out
    }

    /// Cosine distance to `other`.
    ///
    /// The dot product and both norms are accumulated in a single pass.
    /// A zero-norm operand yields a distance of `1.0`. The result is
    /// clamped into `[0, 2]` so rounding can never push it outside the
    /// metric's range.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions differ. Callers that cannot guarantee
    /// equal dimensions use [`distance_cos`] instead.
    #[must_use]
    pub fn distance_cos(&self, other: &Self) -> f32 {
        assert_eq!(
            self.dims(),
            other.dims(),
            "vector dimensions must match"
        );
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;
        for (x, y) in self.elems.iter().zip(other.elems.iter()) {
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            return 1.0;
        }
        (1.0 - dot / (norm_a * norm_b).sqrt()).clamp(0.0, 2.0)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

/// Cosine distance between two parsed vectors.
///
/// This backs the host engine's `vector_distance_cos()` SQL function.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] when the operands have different
/// dimensions.
pub fn distance_cos(a: &Vector, b: &Vector) -> Result<f32> {
    if a.dims() != b.dims() {
        return Err(Error::InvalidArgument(
            "vectors must have the same length".to_string(),
        ));
    }
    Ok(a.distance_cos(b))
}

fn push_element(elems: &mut Vec<f32>, token: &str) -> Result<()> {
    let value: f64 = token
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("invalid number: {token}")))?;
    #[allow(clippy::cast_possible_truncation)]
    elems.push(value as f32);
    if elems.len() > MAX_VECTOR_DIMS {
        return Err(Error::LimitExceeded(format!(
            "vector is larger than the maximum: ({MAX_VECTOR_DIMS})"
        )));
    }
    Ok(())
}

/// True when `value` equals its truncation to `u64`.
///
/// Negative values and values beyond the `u64` range never qualify, so
/// they fall through to scientific rendering.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[allow(clippy::cast_precision_loss)]
fn is_integral(value: f32) -> bool {
    (value as u64) as f32 == value
}
