//! Decimal rounding for stored artifact values.
//!
//! Artifact values are rounded on their exact binary value, with exact ties
//! going to the even neighbour.  `0.15` is stored as
//! `0.1499999999999999944…`, so it rounds down to `0.1`; `0.25` is an exact
//! tie and rounds to `0.2`.

/// Digits inspected past the rounding position.  A double in the range the
/// pipeline handles never sits closer than ~1e-17 to a decimal tie without
/// being one, so this many digits decide every case.
const GUARD_DIGITS: usize = 40;

/// Round `value` to `digits` decimal places.
pub fn round_to(value: f64, digits: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let expanded = format!("{:.*}", digits + GUARD_DIGITS, value);
    let (head, tail) = expanded.split_at(expanded.len() - GUARD_DIGITS);
    let head = head.trim_end_matches('.');

    let deciding = tail.as_bytes()[0];
    let round_away = match deciding {
        b'0'..=b'4' => false,
        b'5' if tail[1..].bytes().all(|b| b == b'0') => head
            .bytes()
            .last()
            .map_or(false, |d| (d - b'0') % 2 == 1),
        _ => true,
    };

    let truncated: f64 = head.parse().unwrap_or(value);
    if !round_away {
        return reformat(truncated, digits);
    }
    let step = 10f64.powi(-(digits as i32));
    let bumped = if value.is_sign_negative() {
        truncated - step
    } else {
        truncated + step
    };
    reformat(bumped, digits)
}

/// Three-decimal rounding used for every stored runtime value.
///
/// The 1e-12 bias lifts results that float arithmetic left a hair below a
/// three-decimal tie.
pub fn r3(value: f64) -> f64 {
    round_to(value + 1e-12, 3)
}

fn reformat(value: f64, digits: usize) -> f64 {
    let text = format!("{:.*}", digits, value);
    let parsed: f64 = text.parse().unwrap_or(value);
    // normalise -0.0 so serialized artifacts never show a signed zero
    if parsed == 0.0 {
        0.0
    } else {
        parsed
    }
}
