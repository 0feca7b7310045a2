//! PNG predictors for fixed-width binary rows.
//!
//! Cross-reference stream rows are 7 bytes wide and mostly repeat the row
//! above, so they are written with the PNG "Up" predictor (12) before being
//! deflated. Decoding accepts every PNG row tag so that rows produced by
//! other writers can be read back as well.

use crate::error::{Error, Result};

/// PNG predictor row tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PngPredictor {
    /// No prediction (tag 0)
    None = 0,
    /// Difference from the byte to the left (tag 1)
    Sub = 1,
    /// Difference from the byte above (tag 2)
    Up = 2,
    /// Difference from the average of left and above (tag 3)
    Average = 3,
    /// Paeth predictor (tag 4)
    Paeth = 4,
}

impl PngPredictor {
    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::None),
            1 => Ok(Self::Sub),
            2 => Ok(Self::Up),
            3 => Ok(Self::Average),
            4 => Ok(Self::Paeth),
            other => Err(Error::Decode(format!("Invalid PNG row tag: {}", other))),
        }
    }
}

/// Encode rows of `columns` bytes with the PNG Up predictor.
///
/// Each output row is the tag byte `2` followed by the byte-wise difference
/// from the previous input row. A trailing partial row is encoded as if
/// it were padded with zeros on the right, without emitting the padding.
pub fn png_up_encode(data: &[u8], columns: usize) -> Vec<u8> {
    if columns == 0 {
        return data.to_vec();
    }
    let rows = data.len().div_ceil(columns);
    let mut out = Vec::with_capacity(data.len() + rows);
    let mut prev: &[u8] = &[];
    for row in data.chunks(columns) {
        out.push(PngPredictor::Up as u8);
        for (i, &byte) in row.iter().enumerate() {
            let above = prev.get(i).copied().unwrap_or(0);
            out.push(byte.wrapping_sub(above));
        }
        prev = row;
    }
    out
}

/// Reverse PNG prediction on rows of `columns` bytes (1 byte per pixel).
pub fn png_decode(data: &[u8], columns: usize) -> Result<Vec<u8>> {
    if columns == 0 {
        return Err(Error::Decode("PNG predictor with zero columns".to_string()));
    }
    let row_len = columns + 1;
    if !data.len().is_multiple_of(row_len) {
        log::warn!(
            "PNG predictor data length {} is not a multiple of row size {}, truncating",
            data.len(),
            row_len
        );
    }

    let mut out = Vec::with_capacity(data.len() / row_len * columns);
    let mut prev = vec![0u8; columns];
    for encoded in data.chunks_exact(row_len) {
        let predictor = PngPredictor::from_tag(encoded[0])?;
        let mut row = vec![0u8; columns];
        for i in 0..columns {
            let raw = encoded[i + 1];
            let left = if i > 0 { row[i - 1] } else { 0 };
            let up = prev[i];
            let upper_left = if i > 0 { prev[i - 1] } else { 0 };
            row[i] = match predictor {
                PngPredictor::None => raw,
                PngPredictor::Sub => raw.wrapping_add(left),
                PngPredictor::Up => raw.wrapping_add(up),
                PngPredictor::Average => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                PngPredictor::Paeth => raw.wrapping_add(paeth(left, up, upper_left)),
            };
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
