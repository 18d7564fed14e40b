//! Case canonicalization for insensitive matching.

/// Map `code_point` to its canonical caseless form.
///
/// ASCII letters lower-case on a fast path. Outside ASCII the mapping is the
/// single-scalar lowercase when Unicode matching is on; other code points,
/// and all non-ASCII in byte mode, canonicalize to themselves.
pub fn canonicalize(code_point: u32, unicode: bool) -> u32 {
    if code_point < 0x80 {
        return (code_point as u8).to_ascii_lowercase() as u32;
    }
    if !unicode {
        return code_point;
    }
    let Some(c) = char::from_u32(code_point) else {
        return code_point;
    };
    let mut lower = c.to_lowercase();
    match (lower.next(), lower.next()) {
        (Some(mapped), None) => mapped as u32,
        _ => code_point,
    }
}

/// Whether `code_point` falls in `from..=to`, consulting canonical forms of
/// both the input and the range bounds when the raw check misses.
pub fn code_point_matches_range_ignoring_case(
    code_point: u32,
    from: u32,
    to: u32,
    unicode: bool,
) -> bool {
    if (from..=to).contains(&code_point) {
        return true;
    }
    let canonical = canonicalize(code_point, unicode);
    if (from..=to).contains(&canonical) {
        return true;
    }
    let canonical_from = canonicalize(from, unicode);
    let canonical_to = canonicalize(to, unicode);
    canonical_from <= canonical_to && (canonical_from..=canonical_to).contains(&canonical)
}

/// Word characters for `\b`/`\w`: ASCII alphanumerics and underscore, with
/// canonical equivalents accepted under case-insensitive Unicode matching.
pub fn is_word_character(code_point: u32, insensitive: bool, unicode: bool) -> bool {
    if is_ascii_word(code_point) {
        return true;
    }
    if insensitive && unicode {
        return is_ascii_word(canonicalize(code_point, unicode));
    }
    false
}

#[inline]
fn is_ascii_word(code_point: u32) -> bool {
    code_point == '_' as u32
        || (code_point < 0x80 && (code_point as u8 as char).is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_lowercases() {
        assert_eq!(canonicalize('A' as u32, false), 'a' as u32);
        assert_eq!(canonicalize('a' as u32, false), 'a' as u32);
        assert_eq!(canonicalize('0' as u32, true), '0' as u32);
    }

    #[test]
    fn non_ascii_only_folds_in_unicode_mode() {
        let upper_a_umlaut = 'Ä' as u32;
        assert_eq!(canonicalize(upper_a_umlaut, false), upper_a_umlaut);
        assert_eq!(canonicalize(upper_a_umlaut, true), 'ä' as u32);
    }

    #[test]
    fn kelvin_sign_folds_to_k() {
        assert_eq!(canonicalize(0x212A, true), 'k' as u32);
    }

    #[test]
    fn range_matching_ignores_case_both_ways() {
        // Range A-Z, lowercase input.
        assert!(code_point_matches_range_ignoring_case(
            'q' as u32, 'A' as u32, 'Z' as u32, false
        ));
        // Range a-z, uppercase input.
        assert!(code_point_matches_range_ignoring_case(
            'Q' as u32, 'a' as u32, 'z' as u32, false
        ));
        assert!(!code_point_matches_range_ignoring_case(
            '0' as u32, 'a' as u32, 'z' as u32, false
        ));
    }

    #[test]
    fn word_characters() {
        assert!(is_word_character('a' as u32, false, false));
        assert!(is_word_character('Z' as u32, false, false));
        assert!(is_word_character('0' as u32, false, false));
        assert!(is_word_character('_' as u32, false, false));
        assert!(!is_word_character(' ' as u32, false, false));
        assert!(!is_word_character('-' as u32, false, false));
    }
}
