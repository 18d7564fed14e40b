use kleene_core::encode_utf16;

use crate::builder::ComparePiece;
use crate::opcode::DecodeError;
use crate::program::{ByteCode, CompileContext, Program};
use crate::serialize::ProgramFileError;
use crate::verify::VerifyError;

fn sample_program() -> Program {
    let mut context = CompileContext::new();
    let mut bytecode = ByteCode::new(&mut context);
    bytecode.capture_group_left(1);
    bytecode.compare_terms(&[
        ComparePiece::general_category("Lu", false).unwrap(),
        ComparePiece::StringSet {
            alternatives: vec![encode_utf16("at"), encode_utf16("attering")],
        },
    ]);
    bytecode.capture_group_right_named(1, "word");
    bytecode.into_program(3)
}

#[test]
fn round_trips_through_a_file() {
    let program = sample_program();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.klnp");

    program.save(&path).unwrap();
    let loaded = Program::load(&path).unwrap();

    assert_eq!(loaded.words(), program.words());
    assert_eq!(loaded.capture_group_count(), 1);
    assert_eq!(loaded.match_length_minimum(), 3);
    assert_eq!(loaded.group_name_of_slot(0), Some("word"));
    assert_eq!(
        loaded.string_sets().len(),
        program.string_sets().len()
    );
    assert_eq!(loaded.properties().len(), program.properties().len());
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = sample_program().to_bytes().unwrap();
    bytes[0] = b'X';

    assert!(matches!(
        Program::from_bytes(&bytes),
        Err(ProgramFileError::InvalidMagic)
    ));
}

#[test]
fn rejects_unsupported_version() {
    let mut bytes = sample_program().to_bytes().unwrap();
    bytes[4..8].copy_from_slice(&9u32.to_le_bytes());

    assert!(matches!(
        Program::from_bytes(&bytes),
        Err(ProgramFileError::UnsupportedVersion(9))
    ));
}

#[test]
fn rejects_truncated_header() {
    let bytes = sample_program().to_bytes().unwrap();

    assert!(matches!(
        Program::from_bytes(&bytes[..10]),
        Err(ProgramFileError::FileTooSmall(10))
    ));
}

#[test]
fn rejects_truncated_payload() {
    let mut bytes = sample_program().to_bytes().unwrap();
    bytes.pop();

    assert!(matches!(
        Program::from_bytes(&bytes),
        Err(ProgramFileError::SizeMismatch { .. })
    ));
}

#[test]
fn rejects_flipped_payload_byte() {
    let mut bytes = sample_program().to_bytes().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;

    assert!(matches!(
        Program::from_bytes(&bytes),
        Err(ProgramFileError::ChecksumMismatch { .. })
    ));
}

#[test]
fn load_verifies_the_program() {
    let mut program = sample_program();
    program.words_mut()[0] = 999;
    let bytes = program.to_bytes().unwrap();

    assert!(matches!(
        Program::from_bytes(&bytes),
        Err(ProgramFileError::Verify(VerifyError::Decode(
            DecodeError::UnknownOpCode { ip: 0, word: 999 }
        )))
    ));
}
