use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnicodeError {
    #[error("incomplete escape sequence (missing hex digits)")]
    Incomplete,
    #[error("missing low surrogate after high surrogate")]
    MissingLowSurrogate,
    #[error("invalid low surrogate (must be 0xDC00~0xDFFF)")]
    InvalidLowSurrogate,
    #[error("low surrogate without high surrogate")]
    LoneLowSurrogate,
    #[error("not a valid code point: {0:#X}")]
    InvalidCodePoint(u32),
    #[error("not a hex or unicode escape")]
    NotAnEscape,
}

#[inline(always)]
pub const fn hex_value(b: u8) -> Option<u32> {
    match b {
        b'0'..=b'9' => Some((b - b'0') as u32),
        b'a'..=b'f' => Some((b - b'a' + 10) as u32),
        b'A'..=b'F' => Some((b - b'A' + 10) as u32),
        _ => None,
    }
}

/// Parses a string made exclusively of hex digits. Returns `None` for an
/// empty string, a non-hex character or a value that doesn't fit in `u32`.
pub fn parse_hex(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 8 {
        return None;
    }
    s.bytes()
        .try_fold(0u32, |acc, b| hex_value(b).map(|v| (acc << 4) | v))
}

#[inline(always)]
pub const fn is_high_surrogate(unit: u32) -> bool {
    unit >= 0xD800 && unit <= 0xDBFF
}

#[inline(always)]
pub const fn is_low_surrogate(unit: u32) -> bool {
    unit >= 0xDC00 && unit <= 0xDFFF
}

#[inline(always)]
pub const fn combine_surrogates(high: u32, low: u32) -> u32 {
    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
}

/// Reads one `\uHHHH` code unit at the start of `s`, returning the unit and
/// the remaining text.
fn read_u_unit(s: &str) -> Result<(u32, &str), UnicodeError> {
    let digits = s.strip_prefix("\\u").ok_or(UnicodeError::NotAnEscape)?;
    let hex = digits.get(..4).ok_or(UnicodeError::Incomplete)?;
    let unit = parse_hex(hex).ok_or(UnicodeError::Incomplete)?;
    Ok((unit, &digits[4..]))
}

/// Reads a `\uHHHH` escape, or a `\uHHHH\uHHHH` surrogate pair, from the
/// start of `s`. Returns the decoded character and the remaining text.
pub fn read_unicode_escape(s: &str) -> Result<(char, &str), UnicodeError> {
    let (unit, rest) = read_u_unit(s)?;

    let (code_point, rest) = if is_high_surrogate(unit) {
        let (low, rest) = match read_u_unit(rest) {
            Ok(pair) => pair,
            Err(UnicodeError::NotAnEscape) => {
                return Err(UnicodeError::MissingLowSurrogate)
            }
            Err(err) => return Err(err),
        };
        if !is_low_surrogate(low) {
            return Err(UnicodeError::InvalidLowSurrogate);
        }
        (combine_surrogates(unit, low), rest)
    } else if is_low_surrogate(unit) {
        return Err(UnicodeError::LoneLowSurrogate);
    } else {
        (unit, rest)
    };

    char::from_u32(code_point)
        .map(|c| (c, rest))
        .ok_or(UnicodeError::InvalidCodePoint(code_point))
}

/// Decodes an escape that denotes exactly one character: `\xHH`, `\uHHHH`
/// or a `\uHHHH\uHHHH` surrogate pair.
pub fn decode_escape(s: &str) -> Result<char, UnicodeError> {
    if let Some(hex) = s.strip_prefix("\\x") {
        if hex.len() != 2 {
            return Err(UnicodeError::Incomplete);
        }
        let v = parse_hex(hex).ok_or(UnicodeError::Incomplete)?;
        return char::from_u32(v).ok_or(UnicodeError::InvalidCodePoint(v));
    }
    match read_unicode_escape(s)? {
        (c, "") => Ok(c),
        _ => Err(UnicodeError::NotAnEscape),
    }
}

/// Replaces every `\uHHHH` escape (including surrogate pairs) in `s` by the
/// UTF-8 encoded character. Any other text is copied as is.
pub fn uhhhh_to_utf8(s: &str) -> Result<String, UnicodeError> {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find("\\u") {
        result.push_str(&rest[..pos]);
        let (c, r) = read_unicode_escape(&rest[pos..])?;
        result.push(c);
        rest = r;
    }
    result.push_str(rest);
    Ok(result)
}

/// Replaces every non-ASCII character in `s` by its `\uHHHH` escape. Code
/// points outside the basic multilingual plane become a surrogate pair.
pub fn utf8_to_uhhhh(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut units = [0u16; 2];
    for c in s.chars() {
        if c.is_ascii() {
            result.push(c);
            continue;
        }
        for unit in c.encode_utf16(&mut units) {
            result.push_str(&format!("\\u{:04x}", unit));
        }
    }
    result
}

pub fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex() {
        assert_eq!(parse_hex("41"), Some(0x41));
        assert_eq!(parse_hex("aBf0"), Some(0xABF0));
        assert_eq!(parse_hex(""), None);
        assert_eq!(parse_hex("4g"), None);
    }

    #[test]
    fn escapes() {
        assert_eq!(decode_escape("\\x41"), Ok('A'));
        assert_eq!(decode_escape("\\u20ac"), Ok('€'));
        assert_eq!(decode_escape("\\uD834\\uDD1E"), Ok('𝄞'));
        assert_eq!(decode_escape("\\x4"), Err(UnicodeError::Incomplete));
        assert_eq!(
            decode_escape("\\uD834"),
            Err(UnicodeError::MissingLowSurrogate)
        );
        assert_eq!(
            decode_escape("\\uDD1E"),
            Err(UnicodeError::LoneLowSurrogate)
        );
        assert_eq!(
            decode_escape("\\uD834\\u0041"),
            Err(UnicodeError::InvalidLowSurrogate)
        );
    }

    #[test]
    fn uhhhh() {
        let s = "€1𝄞123";
        let escaped = utf8_to_uhhhh(s);
        assert_eq!(escaped, "\\u20ac1\\ud834\\udd1e123");
        assert_eq!(uhhhh_to_utf8(&escaped).unwrap(), s);
        assert_eq!(uhhhh_to_utf8("plain").unwrap(), "plain");
    }

    #[test]
    fn xml() {
        assert_eq!(escape_xml("a<b>&\"c'"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }
}
