use crate::cursor::Cursor;
use crate::view::{StrView, encode_utf16, is_line_terminator};

#[test]
fn byte_view_coordinates_coincide() {
    let view = StrView::from_bytes(b"hello");
    assert_eq!(view.len(), 5);
    assert_eq!(view.len_in_code_units(), 5);
    assert_eq!(view.len_in_code_points(), 5);
    assert_eq!(view.code_point_at(1), u32::from(b'e'));
    assert_eq!(view.code_unit_offset_of(3), 3);
}

#[test]
fn surrogate_pair_is_one_logical_position_under_unicode() {
    let units = encode_utf16("𝄞");
    let view = StrView::from_utf16(&units).with_unicode(true);
    assert_eq!(view.len_in_code_units(), 2);
    assert_eq!(view.len_in_code_points(), 1);
    assert_eq!(view.len(), 1);
    assert_eq!(view.code_point_at(0), 0x1D11E);
    assert_eq!(view.length_of_code_point(0x1D11E), 2);
}

#[test]
fn non_unicode_view_reads_surrogates_as_units() {
    let units = encode_utf16("𝄞");
    let view = StrView::from_utf16(&units);
    assert_eq!(view.len(), 2);
    assert_eq!(view.matching_code_point_at(0), 0xD834);
    // code_point_at always decodes pairs regardless of the flag
    assert_eq!(view.code_point_at(0), 0x1D11E);
}

#[test]
fn unpaired_surrogate_reads_back_as_itself() {
    let units = [0xD834u16, u16::from(b'A')];
    let view = StrView::from_utf16(&units).with_unicode(true);
    assert_eq!(view.code_point_at(0), 0xD834);
    assert_eq!(view.len_in_code_points(), 2);
    assert_eq!(view.to_string_lossy(), "\u{FFFD}A");
}

#[test]
fn trailing_high_surrogate_is_its_own_code_point() {
    let units = [u16::from(b'A'), 0xD834u16];
    let view = StrView::from_utf16(&units).with_unicode(true);
    assert_eq!(view.code_point_at(1), 0xD834);
}

#[test]
fn code_unit_offset_walks_pairs_and_saturates() {
    let units = encode_utf16("a𝄞b");
    let view = StrView::from_utf16(&units).with_unicode(true);
    assert_eq!(view.code_unit_offset_of(0), 0);
    assert_eq!(view.code_unit_offset_of(1), 1);
    assert_eq!(view.code_unit_offset_of(2), 3);
    assert_eq!(view.code_unit_offset_of(3), 4);
    assert_eq!(view.code_unit_offset_of(10), 4);
}

#[test]
fn substring_view_uses_logical_coordinates() {
    let units = encode_utf16("a𝄞b");
    let unicode = StrView::from_utf16(&units).with_unicode(true);
    let middle = unicode.substring_view(1, 1);
    assert_eq!(middle.len_in_code_units(), 2);
    assert_eq!(middle.to_string_lossy(), "𝄞");

    let raw = StrView::from_utf16(&units);
    let lone = raw.substring_view(1, 1);
    assert_eq!(lone.len_in_code_units(), 1);
    assert_eq!(lone.code_unit_at(0), 0xD834);
}

#[test]
fn logical_iteration_respects_unicode_flag() {
    let units = encode_utf16("𝄞");
    let raw = StrView::from_utf16(&units);
    assert_eq!(raw.iter_logical().collect::<Vec<_>>(), vec![0xD834, 0xDD1E]);
    let unicode = raw.with_unicode(true);
    assert_eq!(unicode.iter_logical().collect::<Vec<_>>(), vec![0x1D11E]);
    // code point iteration decodes pairs in both modes
    assert_eq!(raw.iter_code_points().collect::<Vec<_>>(), vec![0x1D11E]);
}

#[test]
fn equality_is_tolerant_of_encodings() {
    let units = encode_utf16("abc");
    let bytes = StrView::from_bytes(b"abc");
    let utf16 = StrView::from_utf16(&units);
    assert!(bytes.equals(&utf16));
    assert!(!bytes.equals(&StrView::from_bytes(b"abd")));
    assert!(!bytes.equals(&StrView::from_bytes(b"ab")));
}

#[test]
fn case_insensitive_equality_canonicalizes_both_sides() {
    let upper = encode_utf16("ABC");
    let view = StrView::from_utf16(&upper);
    assert!(view.equals_ignoring_case(&StrView::from_bytes(b"abc"), false));
    assert!(!view.equals(&StrView::from_bytes(b"abc")));
}

#[test]
fn line_terminator_set_includes_separators() {
    assert!(is_line_terminator(u32::from(b'\n')));
    assert!(is_line_terminator(u32::from(b'\r')));
    assert!(is_line_terminator(0x2028));
    assert!(is_line_terminator(0x2029));
    assert!(!is_line_terminator(u32::from(b' ')));
}

#[test]
fn find_end_of_line_stops_at_first_terminator() {
    let view = StrView::from_bytes(b"ab\ncd");
    assert_eq!(view.find_end_of_line(Cursor::start()).position(), 2);
    let past_newline = Cursor::at(&view, 3);
    assert_eq!(view.find_end_of_line(past_newline).position(), 5);
}

#[test]
fn find_index_of_previous_is_strictly_before() {
    let view = StrView::from_bytes(b"abcabc");
    let a = u32::from(b'a');
    assert_eq!(
        view.find_index_of_previous(a, usize::MAX).map(|c| c.position()),
        Some(3)
    );
    assert_eq!(
        view.find_index_of_previous(a, 3).map(|c| c.position()),
        Some(0)
    );
    assert_eq!(view.find_index_of_previous(u32::from(b'z'), usize::MAX), None);
}
