//! Stream filters used by the writer.
//!
//! Only the filters the writer itself produces are implemented:
//! FlateDecode, optionally combined with a PNG predictor. Decoding exists so
//! that a filtered stream can be rewritten without its filter.

mod flate;
mod predictor;

pub use flate::{flate_decode, flate_encode};
pub use predictor::{png_decode, png_up_encode, PngPredictor};

use crate::error::{Error, Result};
use crate::object::{Object, Stream};

/// Predictor parameters taken from a `/DecodeParms` dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeParams {
    /// Predictor (1 = none, 10-15 = PNG)
    pub predictor: i64,
    /// Bytes per row
    pub columns: usize,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
        }
    }
}

impl DecodeParams {
    /// Read parameters from a `/DecodeParms` value (dictionary or first of an array).
    pub fn from_object(obj: Option<&Object>) -> Self {
        let dict = match obj {
            Some(Object::Dictionary(d)) => Some(d),
            Some(Object::Array(arr)) => arr.iter().find_map(|o| match o {
                Object::Dictionary(d) => Some(d),
                _ => None,
            }),
            _ => None,
        };
        let Some(dict) = dict else {
            return Self::default();
        };
        Self {
            predictor: dict.get("Predictor").and_then(|o| o.as_integer()).unwrap_or(1),
            columns: dict
                .get("Columns")
                .and_then(|o| o.as_integer())
                .unwrap_or(1)
                .max(1) as usize,
        }
    }
}

/// Fully decode a stream's payload according to its `/Filter` chain.
pub fn decode_stream(stream: &Stream) -> Result<Vec<u8>> {
    let filters = stream.filter_names();
    if filters.is_empty() {
        return Ok(stream.data.to_vec());
    }
    let params = DecodeParams::from_object(stream.dict.get("DecodeParms"));
    let mut data = stream.data.to_vec();
    for name in filters {
        data = match name {
            "FlateDecode" | "Fl" => {
                let inflated = flate_decode(&data)?;
                if params.predictor >= 10 {
                    png_decode(&inflated, params.columns)?
                } else {
                    inflated
                }
            },
            other => {
                return Err(Error::Decode(format!("Unsupported filter for re-encoding: {}", other)))
            },
        };
    }
    Ok(data)
}
