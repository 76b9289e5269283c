//! Inputs that must be rejected: malformed images and precondition violations.

use scanglue::scanner::{
    AlignedBytes, Fsm, FormatError, ScanError, Scanner, SimpleScanner,
};

fn image() -> Vec<u8> {
    let sc = Scanner::glue(
        &Scanner::from_fsm(&Fsm::literal(b"ab")).unwrap(),
        &Scanner::from_fsm(&Fsm::literal(b"ac")).unwrap(),
        0,
    )
    .unwrap();
    let mut bytes = Vec::new();
    sc.save(&mut bytes).unwrap();
    bytes
}

fn format_error<T: std::fmt::Debug>(r: Result<T, ScanError>) -> FormatError {
    match r {
        Err(ScanError::Format(e)) => e,
        other => panic!("expected a format error, got {other:?}"),
    }
}

#[test]
fn truncated_image() {
    let bytes = image();
    for cut in [0, 10, 30, 100, bytes.len() - 8] {
        let short = &bytes[..cut];
        assert!(
            matches!(format_error(Scanner::load(short)), FormatError::Eof { .. }),
            "load, cut at {cut}"
        );
        let aligned = AlignedBytes::from_slice(short);
        assert!(
            matches!(
                format_error(Scanner::mmap(aligned.as_bytes())),
                FormatError::Eof { .. }
            ),
            "mmap, cut at {cut}"
        );
    }
}

#[test]
fn bad_magic() {
    let mut bytes = image();
    bytes[3] ^= 0xFF;
    assert_eq!(format_error(Scanner::load(&bytes[..])), FormatError::BadMagic);
}

#[test]
fn wrong_scanner_kind() {
    let simple = SimpleScanner::from_fsm(&Fsm::literal(b"x")).unwrap();
    let mut bytes = Vec::new();
    simple.save(&mut bytes).unwrap();
    assert!(matches!(
        format_error(Scanner::load(&bytes[..])),
        FormatError::WrongKind { found: 1, expected: 2 }
    ));
    assert!(matches!(
        format_error(SimpleScanner::load(&image()[..])),
        FormatError::WrongKind { found: 2, expected: 1 }
    ));
}

#[test]
fn misaligned_mapping() {
    let bytes = image();
    let mut shifted = vec![0u8];
    shifted.extend_from_slice(&bytes);
    let aligned = AlignedBytes::from_slice(&shifted);
    assert!(matches!(
        format_error(Scanner::mmap(&aligned.as_bytes()[1..])),
        FormatError::Misaligned { align: 8 }
    ));
}

#[test]
fn corrupted_initial_offset() {
    let mut bytes = image();
    // header (24) + states/letters/regexps/reserved (16) -> initial
    bytes[40..48].copy_from_slice(&3u64.to_le_bytes());
    assert!(matches!(
        format_error(Scanner::load(&bytes[..])),
        FormatError::BadGeometry(_)
    ));
}

#[test]
fn nondeterministic_automaton() {
    let mut fsm = Fsm::new();
    let a = fsm.add_state();
    let b = fsm.add_state();
    fsm.connect(0, b'q', a);
    fsm.connect(0, b'q', b);
    assert!(matches!(
        Scanner::from_fsm(&fsm),
        Err(ScanError::Precondition(_))
    ));
    assert!(matches!(
        SimpleScanner::from_fsm(&fsm),
        Err(ScanError::Precondition(_))
    ));
}

#[test]
fn image_without_states() {
    let mut bytes = image();
    // header (24) -> states_count
    bytes[24..28].copy_from_slice(&0u32.to_le_bytes());
    assert!(matches!(
        format_error(Scanner::load(&bytes[..])),
        FormatError::BadGeometry(_)
    ));
    let aligned = AlignedBytes::from_slice(&bytes);
    assert!(matches!(
        format_error(Scanner::mmap(aligned.as_bytes())),
        FormatError::BadGeometry(_)
    ));
}
