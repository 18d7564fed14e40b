use crate::strings::{ByteStringTable, StringTableIndex, Utf16StringTable};
use crate::view::encode_utf16;

#[test]
fn interning_deduplicates() {
    let mut table = ByteStringTable::new(1);
    let first = table.insert("alpha".to_string());
    let second = table.insert("alpha".to_string());
    assert_eq!(first, second);
    assert_eq!(table.len(), 1);
    let third = table.insert("beta".to_string());
    assert_ne!(first, third);
    assert_eq!(table.len(), 2);
}

#[test]
fn indices_carry_the_issuing_serial() {
    let mut table = Utf16StringTable::new(7);
    let first = table.insert(encode_utf16("one"));
    let second = table.insert(encode_utf16("two"));
    assert_eq!(first.serial(), 7);
    assert_eq!(second.serial(), 7);
    assert_eq!(second.local(), first.local() + 1);
}

#[test]
fn get_resolves_interned_strings() {
    let mut table = ByteStringTable::new(2);
    let index = table.insert("year".to_string());
    assert_eq!(table.get(index), "year");
    assert_eq!(table.try_get(index), Some(&"year".to_string()));
    assert_eq!(table.try_get(StringTableIndex::from_raw(0)), None);
}

#[test]
#[should_panic(expected = "not present")]
fn get_panics_on_a_foreign_index() {
    let table = ByteStringTable::new(2);
    table.get(StringTableIndex::from_raw(0));
}

#[test]
fn merge_carries_entries_across_serials() {
    let mut left = ByteStringTable::new(1);
    let mut right = ByteStringTable::new(2);
    let ours = left.insert("left".to_string());
    let theirs = right.insert("right".to_string());
    left.merge_from(&right);
    assert_eq!(left.len(), 2);
    assert_eq!(left.get(ours), "left");
    assert_eq!(left.get(theirs), "right");
}

#[test]
#[should_panic(expected = "conflicting")]
fn merge_panics_when_an_index_resolves_differently() {
    // Two tables sharing a serial issue the same raw index for their first
    // entry, so merging them must trip the consistency check.
    let mut left = ByteStringTable::new(5);
    let mut right = ByteStringTable::new(5);
    left.insert("one".to_string());
    right.insert("two".to_string());
    left.merge_from(&right);
}

#[test]
fn iteration_follows_insertion_order() {
    let mut table = ByteStringTable::new(3);
    table.insert("a".to_string());
    table.insert("b".to_string());
    let values: Vec<&String> = table.iter().map(|(_, value)| value).collect();
    assert_eq!(values, ["a", "b"]);
}
