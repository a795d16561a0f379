//! Name field codec.
//!
//! Entry names are stored in a fixed 64-byte slot as Shift_JIS text
//! followed by a single NUL.  Bytes after the NUL are undefined on read
//! (archives in the wild carry leftover garbage there) and zero-filled on
//! write.
//!
//! Shift_JIS is ASCII-compatible and a NUL byte never occurs as the trail
//! byte of a double-byte character, so the field is cut at the first NUL
//! byte before decoding.
//!
//! `encoding_rs` implements Shift_JIS as the WHATWG variant (Windows-31J), so
//! NEC and IBM extension characters such as ① are accepted too.

use encoding_rs::SHIFT_JIS;

use crate::error::{PakError, PakResult};

/// Size of the name slot at the start of every header.
pub const NAME_FIELD_SIZE: usize = 0x40;

/// Decode a name slot.  Returns an empty string for the terminator.
pub fn decode_name(field: &[u8]) -> PakResult<String> {
    let nul = field.iter().position(|&b| b == 0).ok_or_else(|| {
        PakError::CorruptArchive(format!(
            "name field is not NUL-terminated within {} bytes",
            field.len()
        ))
    })?;

    let raw = &field[..nul];
    SHIFT_JIS
        .decode_without_bom_handling_and_without_replacement(raw)
        .map(|name| name.into_owned())
        .ok_or_else(|| {
            PakError::Encoding(format!("name bytes {raw:02x?} are not valid Shift_JIS"))
        })
}

/// Encode `name` into a zero-filled name slot.
pub fn encode_name(name: &str) -> PakResult<[u8; NAME_FIELD_SIZE]> {
    if name.is_empty() {
        return Err(PakError::EmptyName);
    }
    if name.contains('\0') {
        return Err(PakError::Encoding(format!("name {name:?} contains a NUL character")));
    }

    let (encoded, _, unmappable) = SHIFT_JIS.encode(name);
    if unmappable {
        return Err(PakError::Encoding(format!(
            "name \"{name}\" has characters with no Shift_JIS representation"
        )));
    }

    // One byte is reserved for the terminating NUL.
    if encoded.len() + 1 > NAME_FIELD_SIZE {
        return Err(PakError::NameTooLong {
            name: name.to_owned(),
            len:  encoded.len() + 1,
        });
    }

    let mut field = [0u8; NAME_FIELD_SIZE];
    field[..encoded.len()].copy_from_slice(&encoded);
    Ok(field)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_name_is_zero_filled() {
        let field = encode_name("a.txt").unwrap();
        assert_eq!(&field[..5], b"a.txt");
        assert!(field[5..].iter().all(|&b| b == 0));
    }

    #[test]
    fn japanese_name_uses_double_byte_encoding() {
        // 「テスト」 is three double-byte characters in Shift_JIS.
        let field = encode_name("テスト.bin").unwrap();
        assert_eq!(&field[..6], &[0x83, 0x65, 0x83, 0x58, 0x83, 0x67]);
        assert_eq!(decode_name(&field).unwrap(), "テスト.bin");
    }

    #[test]
    fn garbage_after_nul_is_ignored() {
        let mut field = [0xFFu8; NAME_FIELD_SIZE];
        field[..6].copy_from_slice(b"sys.db");
        field[6] = 0;
        assert_eq!(decode_name(&field).unwrap(), "sys.db");
    }

    #[test]
    fn nul_at_start_means_terminator() {
        let field = [0u8; NAME_FIELD_SIZE];
        assert_eq!(decode_name(&field).unwrap(), "");
    }

    #[test]
    fn malformed_bytes_are_rejected() {
        let mut field = [0u8; NAME_FIELD_SIZE];
        // 0x81 is a lead byte; 0x20 is not a valid trail byte.
        field[0] = 0x81;
        field[1] = 0x20;
        assert!(matches!(decode_name(&field), Err(PakError::Encoding(_))));
    }

    #[test]
    fn unterminated_field_is_corrupt() {
        let field = [b'a'; NAME_FIELD_SIZE];
        assert!(matches!(decode_name(&field), Err(PakError::CorruptArchive(_))));
    }

    #[test]
    fn sixty_three_bytes_fit_sixty_four_do_not() {
        let fits = "x".repeat(63);
        assert!(encode_name(&fits).is_ok());

        let overflow = "x".repeat(64);
        match encode_name(&overflow) {
            Err(PakError::NameTooLong { len, .. }) => assert_eq!(len, 65),
            other => panic!("expected NameTooLong, got {other:?}"),
        }
    }

    #[test]
    fn double_byte_characters_count_twice() {
        // 32 double-byte characters = 64 bytes, no room for the NUL.
        let name = "あ".repeat(32);
        assert!(matches!(encode_name(&name), Err(PakError::NameTooLong { len: 65, .. })));
        assert!(encode_name(&"あ".repeat(31)).is_ok());
    }

    #[test]
    fn unmappable_characters_are_rejected() {
        assert!(matches!(encode_name("emoji-😀.png"), Err(PakError::Encoding(_))));
    }

    #[test]
    fn nec_extension_characters_are_accepted() {
        let field = encode_name("①.txt").unwrap();
        assert_eq!(&field[..2], &[0x87, 0x40]);
        assert_eq!(decode_name(&field).unwrap(), "①.txt");
    }

    #[test]
    fn empty_and_nul_names_are_rejected() {
        assert!(matches!(encode_name(""), Err(PakError::EmptyName)));
        assert!(matches!(encode_name("a\0b"), Err(PakError::Encoding(_))));
    }
}
