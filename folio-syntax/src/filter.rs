//! Decoding of stream filters.
//!
//! Page content is copied without being decoded, so only the filters needed to read
//! the structure of a file are supported: `FlateDecode` (together with its predictors),
//! which is used by cross-reference streams and object streams.

use crate::error::{Error, Result};
use crate::object::Dict;
use crate::object::Name;
use crate::object::dict::keys::{
    BITS_PER_COMPONENT, COLORS, COLUMNS, FLATE_DECODE, FLATE_DECODE_ABBREVIATION, PREDICTOR,
};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use log::warn;
use std::io::Read;

/// Apply the filter with the given name to the data.
pub fn decode(data: &[u8], filter: &Name, params: Option<&Dict>) -> Result<Vec<u8>> {
    match &**filter {
        FLATE_DECODE | FLATE_DECODE_ABBREVIATION => {
            let params = params.map(PredictorParams::from_params).unwrap_or_default();

            flate::decode(data, &params)
        }
        _ => Err(Error::UnsupportedFeature(format!(
            "decoding of {} streams",
            filter.as_str()
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
struct PredictorParams {
    predictor: u8,
    colors: u8,
    bits_per_component: u8,
    columns: usize,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
        }
    }
}

impl PredictorParams {
    fn from_params(dict: &Dict) -> Self {
        let get = |key, default: i64| dict.get_i64(key).unwrap_or(default);

        Self {
            predictor: get(PREDICTOR, 1).clamp(0, 255) as u8,
            colors: get(COLORS, 1).clamp(1, 32) as u8,
            bits_per_component: get(BITS_PER_COMPONENT, 8).clamp(1, 16) as u8,
            columns: get(COLUMNS, 1).max(1) as usize,
        }
    }

    fn bits_per_pixel(&self) -> usize {
        self.bits_per_component as usize * self.colors as usize
    }

    fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel().div_ceil(8)
    }

    fn row_length_in_bytes(&self) -> usize {
        (self.columns * self.bits_per_pixel()).div_ceil(8)
    }
}

mod flate {
    use super::*;

    pub(super) fn decode(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
        let decoded = inflate(data)?;

        apply_predictor(decoded, params)
    }

    fn inflate(data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();

        match ZlibDecoder::new(data).read_to_end(&mut out) {
            Ok(_) => return Ok(out),
            // Truncated streams are common, keep what could be decoded.
            Err(_) if !out.is_empty() => {
                warn!("flate stream is truncated, using {} decoded bytes", out.len());

                return Ok(out);
            }
            Err(_) => {}
        }

        // Some producers write raw deflate data without the zlib header.
        out.clear();
        DeflateDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| Error::malformed(0, format!("invalid flate data: {e}")))?;

        Ok(out)
    }
}

fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Result<Vec<u8>> {
    match params.predictor {
        0 | 1 => Ok(data),
        2 => Err(Error::UnsupportedFeature("TIFF predictor".to_string())),
        10..=15 => png_predictor(&data, params),
        other => Err(Error::UnsupportedFeature(format!("predictor {other}"))),
    }
}

fn png_predictor(data: &[u8], params: &PredictorParams) -> Result<Vec<u8>> {
    let row_len = params.row_length_in_bytes();
    let bpp = params.bytes_per_pixel();
    // +1 because each row starts with the byte denoting the predictor used.
    let num_rows = data.len() / (row_len + 1);

    if num_rows * (row_len + 1) != data.len() {
        warn!("predictor data doesn't fill the last row, ignoring trailing bytes");
    }

    let mut out = vec![0; num_rows * row_len];

    for (i, row) in data.chunks_exact(row_len + 1).enumerate() {
        let (tag, cur) = (row[0], &row[1..]);
        let (prev, rest) = out.split_at_mut(i * row_len);
        let prev = (i > 0).then(|| &prev[(i - 1) * row_len..]);
        let out_row = &mut rest[..row_len];

        for j in 0..row_len {
            let left = if j >= bpp { out_row[j - bpp] } else { 0 };
            let up = prev.map(|p| p[j]).unwrap_or(0);
            let up_left = match prev {
                Some(p) if j >= bpp => p[j - bpp],
                _ => 0,
            };

            out_row[j] = match tag {
                0 => cur[j],
                1 => cur[j].wrapping_add(left),
                2 => cur[j].wrapping_add(up),
                3 => cur[j].wrapping_add(((left as u16 + up as u16) / 2) as u8),
                4 => cur[j].wrapping_add(paeth(left, up, up_left)),
                other => {
                    return Err(Error::malformed(0, format!("invalid png predictor {other}")));
                }
            };
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;
    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut e = ZlibEncoder::new(Vec::new(), Compression::default());
        e.write_all(data).unwrap();
        e.finish().unwrap()
    }

    fn predictor_params(predictor: i64, columns: i64) -> Dict {
        let mut dict = Dict::new();
        dict.insert(Name::new(PREDICTOR), Object::from(predictor));
        dict.insert(Name::new(COLUMNS), Object::from(columns));
        dict
    }

    #[test]
    fn flate_plain() {
        let decoded = decode(&zlib(b"hello world"), &Name::new(b"FlateDecode"), None).unwrap();

        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn flate_abbreviation() {
        let decoded = decode(&zlib(b"abc"), &Name::new(b"Fl"), None).unwrap();

        assert_eq!(decoded, b"abc");
    }

    #[test]
    fn png_up() {
        // Two rows with 3 columns, the second row is encoded relative to the first.
        let raw = [2, 1, 2, 3, 2, 1, 1, 1];
        let decoded = decode(
            &zlib(&raw),
            &Name::new(b"FlateDecode"),
            Some(&predictor_params(12, 3)),
        )
        .unwrap();

        assert_eq!(decoded, vec![1, 2, 3, 2, 3, 4]);
    }

    #[test]
    fn png_sub_and_paeth() {
        let raw = [1, 5, 1, 1, 4, 0, 0, 0];
        let decoded = decode(
            &zlib(&raw),
            &Name::new(b"FlateDecode"),
            Some(&predictor_params(15, 3)),
        )
        .unwrap();

        // Row 1 (sub): 5, 6, 7. Row 2 (paeth, zero deltas) copies the row above.
        assert_eq!(decoded, vec![5, 6, 7, 5, 6, 7]);
    }

    #[test]
    fn unsupported_filter() {
        assert!(matches!(
            decode(b"", &Name::new(b"DCTDecode"), None),
            Err(Error::UnsupportedFeature(_))
        ));
    }
}
