pub mod bytes_ext;
pub mod encoding;

#[cfg(test)]
mod tests {
    use crate::bytes_ext::{OutOfBytes, SafeBuf, SafeBytes};
    use crate::encoding::{mutf8::ModifiedUtf8, EncodingError, EncodingFormat};
    use anyhow::Result;
    use bytes::Bytes;

    #[test]
    fn it_reads_big_endian_values() -> Result<()> {
        let mut bytes = Bytes::from_static(&[
            0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34, 0x7F, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x01,
        ]);

        assert_eq!(bytes.try_get_u32()?, 0xCAFEBABE);
        assert_eq!(bytes.try_get_u16()?, 52);
        assert_eq!(bytes.try_get_u8()?, 0x7F);
        assert_eq!(bytes.try_get_u64()?, 1);
        assert!(bytes.is_empty());

        Ok(())
    }

    #[test]
    fn it_fails_without_consuming_on_short_input() {
        let mut bytes = Bytes::from_static(&[0x01, 0x02, 0x03]);

        let err = bytes.try_get_u32().unwrap_err();
        assert_eq!(
            err,
            OutOfBytes {
                wanted: 4,
                remaining: 3
            }
        );

        assert_eq!(bytes.len(), 3);
        assert_eq!(bytes.try_get_u16().unwrap(), 0x0102);
    }

    #[test]
    fn it_skips_and_copies() -> Result<()> {
        let mut bytes = Bytes::from_static(&[1, 2, 3, 4, 5, 6]);

        bytes.try_skip(2)?;
        assert_eq!(bytes.try_copy_bytes(2)?, vec![3, 4]);

        let rest = bytes.try_split_to(2)?;
        assert_eq!(&rest[..], &[5, 6]);
        assert!(bytes.is_empty());

        assert!(bytes.try_skip(1).is_err());
        assert!(bytes.try_split_to(1).is_err());

        Ok(())
    }

    #[test]
    fn it_decodes_modified_utf8() -> Result<()> {
        assert_eq!(ModifiedUtf8::from_java(b"java/lang/Object")?, "java/lang/Object");

        // NUL is the two byte form
        assert_eq!(ModifiedUtf8::from_java(&[0x61, 0xC0, 0x80, 0x62])?, "a\0b");

        // U+1F600 as a surrogate pair of three byte sequences
        let encoded = [0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80];
        assert_eq!(ModifiedUtf8::from_java(&encoded)?, "\u{1F600}");

        Ok(())
    }

    #[test]
    fn it_encodes_modified_utf8() {
        assert_eq!(ModifiedUtf8::into_java("a\0b"), vec![0x61, 0xC0, 0x80, 0x62]);
        assert_eq!(
            ModifiedUtf8::into_java("\u{1F600}"),
            vec![0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
        assert_eq!(ModifiedUtf8::into_java("é"), vec![0xC3, 0xA9]);
    }

    #[test]
    fn it_rejects_malformed_modified_utf8() {
        assert_eq!(
            ModifiedUtf8::from_java(&[0x00]),
            Err(EncodingError::InvalidByte { byte: 0, offset: 0 })
        );
        assert_eq!(
            ModifiedUtf8::from_java(&[0xE0, 0x80]),
            Err(EncodingError::Truncated { offset: 2 })
        );
        assert_eq!(
            ModifiedUtf8::from_java(&[0xED, 0xA0, 0xBD]),
            Err(EncodingError::UnpairedSurrogate)
        );
    }
}
