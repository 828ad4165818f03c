//! Hand-rolled base32 geohash encode/decode and neighbor calculation
//! (design spec §4.10).
//!
//! Geohash channels subscribe to a center cell plus its 8 neighbors for
//! location notes, and to the center cell alone for real-time messages. No
//! external geohash crate is used — the encoding is a short, well-known
//! bit-interleaving algorithm and pulling in a dependency for it would not
//! buy anything a mesh protocol crate needs elsewhere.

use crate::{NostrError, Result};

const BASE32_ALPHABET: &[u8] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Maximum supported geohash precision (characters).
pub const MAX_PRECISION: usize = 12;

fn base32_value(c: u8) -> Option<u8> {
    BASE32_ALPHABET.iter().position(|&b| b == c).map(|i| i as u8)
}

/// Encode a latitude/longitude pair as a geohash string of `precision`
/// characters (1..=12).
pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(NostrError::InvalidGeohash(format!(
            "precision must be in 1..={MAX_PRECISION}, got {precision}"
        )));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(NostrError::InvalidGeohash(format!("coordinates out of range: {lat}, {lon}")));
    }

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);
    let mut is_even = true;
    let mut bit = 0u8;
    let mut bit_count = 0u8;
    let mut out = String::with_capacity(precision);

    while out.len() < precision {
        if is_even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                bit = (bit << 1) | 1;
                lon_range.0 = mid;
            } else {
                bit <<= 1;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                bit = (bit << 1) | 1;
                lat_range.0 = mid;
            } else {
                bit <<= 1;
                lat_range.1 = mid;
            }
        }
        is_even = !is_even;

        bit_count += 1;
        if bit_count == 5 {
            out.push(BASE32_ALPHABET[bit as usize] as char);
            bit = 0;
            bit_count = 0;
        }
    }

    Ok(out)
}

/// A decoded geohash cell: its center and the half-width of its bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeohashCell {
    pub lat: f64,
    pub lon: f64,
    pub lat_error: f64,
    pub lon_error: f64,
}

/// Decode a geohash string into its cell center and error bounds.
pub fn decode(hash: &str) -> Result<GeohashCell> {
    if hash.is_empty() || hash.len() > MAX_PRECISION {
        return Err(NostrError::InvalidGeohash(format!("length must be in 1..={MAX_PRECISION}")));
    }

    let mut lat_range = (-90.0f64, 90.0f64);
    let mut lon_range = (-180.0f64, 180.0f64);
    let mut is_even = true;

    for c in hash.bytes() {
        let value = base32_value(c.to_ascii_lowercase())
            .ok_or_else(|| NostrError::InvalidGeohash(format!("invalid character '{}'", c as char)))?;
        for shift in (0..5).rev() {
            let bit = (value >> shift) & 1;
            if is_even {
                let mid = (lon_range.0 + lon_range.1) / 2.0;
                if bit == 1 {
                    lon_range.0 = mid;
                } else {
                    lon_range.1 = mid;
                }
            } else {
                let mid = (lat_range.0 + lat_range.1) / 2.0;
                if bit == 1 {
                    lat_range.0 = mid;
                } else {
                    lat_range.1 = mid;
                }
            }
            is_even = !is_even;
        }
    }

    Ok(GeohashCell {
        lat: (lat_range.0 + lat_range.1) / 2.0,
        lon: (lon_range.0 + lon_range.1) / 2.0,
        lat_error: (lat_range.1 - lat_range.0) / 2.0,
        lon_error: (lon_range.1 - lon_range.0) / 2.0,
    })
}

/// The 8 compass neighbors of a geohash cell, same precision as `hash`.
/// Longitude wraps at the antimeridian; latitude clamps at the poles
/// (no wraparound there, matching standard geohash behavior).
pub fn neighbors(hash: &str) -> Result<Vec<String>> {
    let cell = decode(hash)?;
    let precision = hash.len();

    let lat_step = cell.lat_error * 2.0;
    let lon_step = cell.lon_error * 2.0;

    let mut out = Vec::with_capacity(8);
    for (dlat, dlon) in [
        (1.0, 0.0),
        (1.0, 1.0),
        (0.0, 1.0),
        (-1.0, 1.0),
        (-1.0, 0.0),
        (-1.0, -1.0),
        (0.0, -1.0),
        (1.0, -1.0),
    ] {
        let lat = (cell.lat + dlat * lat_step).clamp(-90.0, 90.0);
        let mut lon = cell.lon + dlon * lon_step;
        if lon > 180.0 {
            lon -= 360.0;
        } else if lon < -180.0 {
            lon += 360.0;
        }
        out.push(encode(lat, lon, precision)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_known_location() {
        // San Francisco ferry building, commonly cited geohash prefix.
        let hash = encode(37.7955, -122.3937, 8).expect("encode");
        assert!(hash.starts_with("9q8yy"));
    }

    #[test]
    fn decode_roundtrips_near_original() {
        let hash = encode(37.7955, -122.3937, 9).expect("encode");
        let cell = decode(&hash).expect("decode");
        assert!((cell.lat - 37.7955).abs() < 0.001);
        assert!((cell.lon - (-122.3937)).abs() < 0.001);
    }

    #[test]
    fn neighbors_returns_eight_distinct_cells() {
        let hash = encode(37.7955, -122.3937, 7).expect("encode");
        let neigh = neighbors(&hash).expect("neighbors");
        assert_eq!(neigh.len(), 8);
        assert!(!neigh.contains(&hash));
    }

    #[test]
    fn precision_out_of_range_is_rejected() {
        assert!(encode(0.0, 0.0, 0).is_err());
        assert!(encode(0.0, 0.0, 13).is_err());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(encode(200.0, 0.0, 5).is_err());
    }

    #[test]
    fn invalid_characters_are_rejected() {
        assert!(decode("9q8a").is_err()); // 'a' is not in the geohash alphabet
    }

    #[test]
    fn longitude_wraps_at_antimeridian() {
        let hash = encode(0.0, 179.999, 5).expect("encode");
        let neigh = neighbors(&hash).expect("neighbors");
        assert_eq!(neigh.len(), 8);
    }
}
