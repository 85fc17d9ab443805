/*
 * Copyright (c) Peter Bjorklund. All rights reserved. https://github.com/swamp/swamp
 * Licensed under the MIT License. See LICENSE in the project root for license information.
 */
//! Text renderings for the write procedures.
//!
//! Field widths follow the C `printf` convention: the value is right
//! justified in the field, a negative width left justifies it, and a field
//! that is too narrow is widened.

use p6_vm_types::exception::ExceptionCode;

fn justify(body: Vec<u8>, width: i64) -> Vec<u8> {
    let field = usize::try_from(width.unsigned_abs()).unwrap_or(usize::MAX);
    if body.len() >= field {
        return body;
    }
    let padding = vec![b' '; field - body.len()];
    if width < 0 {
        [body, padding].concat()
    } else {
        [padding, body].concat()
    }
}

/// An integer in radix 10, 16, 8 or 2, lower case digits, optionally
/// padded with leading zeros after the sign.
pub fn integer(
    value: i64,
    width: i64,
    radix: u32,
    zero_fill: bool,
) -> Result<Vec<u8>, ExceptionCode> {
    if value < 0 && radix != 10 {
        return Err(ExceptionCode::NondecimalRadixOfNegative);
    }
    let mut magnitude = value.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        let digit = (magnitude % u64::from(radix)) as u8;
        digits.push(if digit < 10 {
            b'0' + digit
        } else {
            b'a' + digit - 10
        });
        magnitude /= u64::from(radix);
        if magnitude == 0 {
            break;
        }
    }
    digits.reverse();

    let used = digits.len() as i64 + i64::from(value < 0);
    let mut out = Vec::new();
    if value < 0 {
        out.push(b'-');
    }
    if zero_fill && width > used {
        out.resize(out.len() + (width - used) as usize, b'0');
    }
    out.extend(digits);
    if zero_fill {
        Ok(justify(out, width.min(0)))
    } else {
        Ok(justify(out, width))
    }
}

#[must_use]
pub fn boolean(value: bool, width: i64) -> Vec<u8> {
    let word: &[u8] = if value { b"true" } else { b"false" };
    text(word, width)
}

/// A string clipped to a non-negative width.
#[must_use]
pub fn text(bytes: &[u8], width: i64) -> Vec<u8> {
    let len = if width >= 0 {
        bytes.len().min(usize::try_from(width).unwrap_or(usize::MAX))
    } else {
        bytes.len()
    };
    justify(bytes[..len].to_vec(), width)
}

/// The string without its trailing blanks.
#[must_use]
pub fn trim_trailing_blanks(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&byte| byte != b' ')
        .map_or(0, |index| index + 1);
    &bytes[..end]
}

#[must_use]
pub fn character(value: u8, width: i64) -> Vec<u8> {
    justify(vec![value], width)
}

fn non_finite(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some(if value.is_sign_negative() { "-nan" } else { "nan" })
    } else if value.is_infinite() {
        Some(if value < 0.0 { "-inf" } else { "inf" })
    } else {
        None
    }
}

/// `d.ddde+xx` with `precision` fraction digits and at least two exponent
/// digits.
#[must_use]
pub fn real_exponent(value: f64, width: i64, precision: usize) -> Vec<u8> {
    if let Some(word) = non_finite(value) {
        return justify(word.as_bytes().to_vec(), width);
    }
    let rendered = format!("{value:.precision$e}");
    let (mantissa, exponent) = rendered.split_once('e').unwrap_or((&rendered, "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    let body = format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs());
    justify(body.into_bytes(), width)
}

#[must_use]
pub fn real_fixed(value: f64, width: i64, fraction: usize) -> Vec<u8> {
    if let Some(word) = non_finite(value) {
        return justify(word.as_bytes().to_vec(), width);
    }
    justify(format!("{value:.fraction$}").into_bytes(), width)
}
