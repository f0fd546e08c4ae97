//! Punycode compression for non-ASCII identifiers.
//!
//! This is the RFC 3492 algorithm with parameters adjusted so encoded
//! bodies stay inside the symbol alphabet:
//!
//! ```text
//! | Parameter      | RFC 3492 | Here                    |
//! |----------------|----------|-------------------------|
//! | delimiter      | '-'      | '_'                     |
//! | digit alphabet | a-z 0-9  | a-z A-J                 |
//! | case folding   | yes      | none (case-sensitive)   |
//! ```
//!
//! Additionally, ASCII bytes that are not valid symbol characters can be
//! remapped into the private band `0xD800..0xD880` before encoding
//! (`map_non_symbol_chars`), and mapped back on decode. Code points in
//! the rest of the surrogate range are invalid and make both directions
//! fail. All arithmetic is overflow-checked; a malformed body is a
//! `None`, never a wrap or a panic.

use crate::text::is_valid_symbol_char;

const BASE: u32 = 36;
const TMIN: u32 = 1;
const TMAX: u32 = 26;
const SKEW: u32 = 38;
const DAMP: u32 = 700;
const INITIAL_BIAS: u32 = 72;
const INITIAL_N: u32 = 0x80;
const DELIMITER: u8 = b'_';

/// First code point of the band non-symbol ASCII is remapped into.
const PRIVATE_BAND_START: u32 = 0xD800;
/// One past the last private-band code point.
const PRIVATE_BAND_END: u32 = 0xD880;

/// Code points we accept: Unicode scalar values plus the private band.
#[inline]
fn is_encodable(cp: u32) -> bool {
    cp < PRIVATE_BAND_END || (0xE000..=0x0010_FFFF).contains(&cp)
}

#[inline]
fn digit_char(digit: u32) -> Option<char> {
    match digit {
        0..=25 => char::from_u32('a' as u32 + digit),
        26..=35 => char::from_u32('A' as u32 + digit - 26),
        _ => None,
    }
}

#[inline]
fn digit_value(byte: u8) -> Option<u32> {
    match byte {
        b'a'..=b'z' => Some(u32::from(byte - b'a')),
        b'A'..=b'J' => Some(u32::from(byte - b'A') + 26),
        _ => None,
    }
}

#[inline]
fn threshold(k: u32, bias: u32) -> u32 {
    if k <= bias {
        TMIN
    } else if k >= bias + TMAX {
        TMAX
    } else {
        k - bias
    }
}

fn adapt(mut delta: u32, num_points: u32, first_time: bool) -> u32 {
    delta /= if first_time { DAMP } else { 2 };
    delta += delta / num_points;
    let mut k = 0;
    while delta > ((BASE - TMIN) * TMAX) / 2 {
        delta /= BASE - TMIN;
        k += BASE;
    }
    k + ((BASE - TMIN + 1) * delta) / (delta + SKEW)
}

/// Encodes a code-point sequence into a punycode body.
///
/// Returns `None` if any code point is outside the encodable range or
/// the deltas overflow.
#[must_use]
pub fn encode_punycode(code_points: &[u32]) -> Option<String> {
    let mut out = String::with_capacity(code_points.len() + 1);
    let mut handled = 0u32;
    for &cp in code_points {
        if !is_encodable(cp) {
            return None;
        }
        if cp < INITIAL_N {
            out.push(char::from_u32(cp)?);
            handled = handled.checked_add(1)?;
        }
    }
    let basic = handled;
    if basic > 0 {
        out.push(char::from(DELIMITER));
    }

    let total = u32::try_from(code_points.len()).ok()?;
    let mut n = INITIAL_N;
    let mut delta = 0u32;
    let mut bias = INITIAL_BIAS;
    while handled < total {
        let m = code_points.iter().copied().filter(|&c| c >= n).min()?;
        delta = delta.checked_add((m - n).checked_mul(handled.checked_add(1)?)?)?;
        n = m;
        for &c in code_points {
            if c < n {
                delta = delta.checked_add(1)?;
            }
            if c == n {
                let mut q = delta;
                let mut k = BASE;
                loop {
                    let t = threshold(k, bias);
                    if q < t {
                        out.push(digit_char(q)?);
                        break;
                    }
                    out.push(digit_char(t + (q - t) % (BASE - t))?);
                    q = (q - t) / (BASE - t);
                    k = k.checked_add(BASE)?;
                }
                bias = adapt(delta, handled + 1, handled == basic);
                delta = 0;
                handled += 1;
            }
        }
        delta = delta.checked_add(1)?;
        n = n.checked_add(1)?;
    }
    Some(out)
}

/// Decodes a punycode body into code points.
#[must_use]
pub fn decode_punycode(body: &str) -> Option<Vec<u32>> {
    let bytes = body.as_bytes();
    // The delimiter is the last '_'; basic characters may contain '_'.
    let (basic, ext) = match bytes.iter().rposition(|&b| b == DELIMITER) {
        Some(pos) => (&bytes[..pos], &bytes[pos + 1..]),
        None => (&bytes[..0], bytes),
    };

    let mut output: Vec<u32> = Vec::with_capacity(bytes.len());
    for &b in basic {
        if b >= 0x80 {
            return None;
        }
        output.push(u32::from(b));
    }

    let mut n = INITIAL_N;
    let mut i = 0u32;
    let mut bias = INITIAL_BIAS;
    let mut pos = 0usize;
    while pos < ext.len() {
        let old_i = i;
        let mut w = 1u32;
        let mut k = BASE;
        loop {
            let byte = *ext.get(pos)?;
            pos += 1;
            let digit = digit_value(byte)?;
            i = i.checked_add(digit.checked_mul(w)?)?;
            let t = threshold(k, bias);
            if digit < t {
                break;
            }
            w = w.checked_mul(BASE - t)?;
            k = k.checked_add(BASE)?;
        }
        let out_len = u32::try_from(output.len()).ok()?.checked_add(1)?;
        bias = adapt(i - old_i, out_len, old_i == 0);
        n = n.checked_add(i / out_len)?;
        i %= out_len;
        if !is_encodable(n) {
            return None;
        }
        output.insert(usize::try_from(i).ok()?, n);
        i += 1;
    }
    Some(output)
}

/// Encodes identifier text, optionally remapping non-symbol ASCII into
/// the private band first.
#[must_use]
pub fn encode_utf8(text: &str, map_non_symbol_chars: bool) -> Option<String> {
    let mut code_points = Vec::with_capacity(text.len());
    for c in text.chars() {
        let cp = c as u32;
        match u8::try_from(cp) {
            Ok(byte) if map_non_symbol_chars && !is_valid_symbol_char(byte) && cp < INITIAL_N => {
                code_points.push(PRIVATE_BAND_START + cp);
            }
            _ => code_points.push(cp),
        }
    }
    encode_punycode(&code_points)
}

/// Decodes a punycode body back to identifier text, reversing the
/// private-band remap.
#[must_use]
pub fn decode_utf8(body: &str) -> Option<String> {
    let code_points = decode_punycode(body)?;
    let mut out = String::with_capacity(code_points.len());
    for cp in code_points {
        if (PRIVATE_BAND_START..PRIVATE_BAND_END).contains(&cp) {
            out.push(char::from(u8::try_from(cp - PRIVATE_BAND_START).ok()?));
        } else {
            out.push(char::from_u32(cp)?);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_basic_round_trips_through_delimiter() {
        assert_eq!(encode_punycode(&[b'2'.into(), b'x'.into()]).as_deref(), Some("2x_"));
        assert_eq!(decode_punycode("2x_"), Some(vec![b'2'.into(), b'x'.into()]));
    }

    #[test]
    fn single_greek_letter() {
        assert_eq!(encode_utf8("Ω", false).as_deref(), Some("exa"));
        assert_eq!(decode_utf8("exa").as_deref(), Some("Ω"));
    }

    #[test]
    fn mapped_plus_sign() {
        assert_eq!(encode_utf8("+", true).as_deref(), Some("qcJb"));
        assert_eq!(decode_utf8("qcJb").as_deref(), Some("+"));
    }

    #[test]
    fn mixed_text_round_trips() {
        for text in ["héllo", "さくら", "überGröße", "x_y´z"] {
            let encoded = match encode_utf8(text, true) {
                Some(e) => e,
                None => panic!("failed to encode {text:?}"),
            };
            assert_eq!(decode_utf8(&encoded).as_deref(), Some(text), "{text:?} via {encoded:?}");
        }
    }

    #[test]
    fn basic_segment_may_contain_underscores() {
        let encoded = match encode_utf8("a_Ω", false) {
            Some(e) => e,
            None => panic!("encode failed"),
        };
        assert_eq!(decode_utf8(&encoded).as_deref(), Some("a_Ω"));
    }

    #[test]
    fn surrogates_rejected_but_private_band_allowed() {
        assert_eq!(encode_punycode(&[0xDC00]), None);
        assert_eq!(encode_punycode(&[0xD900]), None);
        assert!(encode_punycode(&[0xD87F]).is_some());
    }

    #[test]
    fn malformed_bodies_fail_cleanly() {
        // Digits outside the alphabet.
        assert_eq!(decode_punycode("ab!c"), None);
        // Truncated extension (ends while a digit run is still open).
        assert_eq!(decode_punycode("J"), None);
        // Overflowing delta chain.
        assert_eq!(decode_punycode("JJJJJJJJJJJJJJJJ"), None);
        // Non-ASCII where only basic bytes may appear.
        assert_eq!(decode_punycode("é_a"), None);
    }

    #[test]
    fn empty_body_decodes_to_nothing() {
        assert_eq!(decode_punycode(""), Some(Vec::new()));
    }
}
