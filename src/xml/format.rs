use std::fmt::Write;

use crate::data::osm::COORDINATE_PRECISION;

/// Appends a fixed-point coordinate with exactly seven decimals.
///
/// Works on the integer representation, so no rounding takes place here.
pub fn append_coordinate(out: &mut String, units: i32) {
    let abs = units.unsigned_abs();
    let precision = COORDINATE_PRECISION.unsigned_abs();
    if units < 0 {
        out.push('-');
    }
    let _ = write!(out, "{}.{:07}", abs / precision, abs % precision);
}
