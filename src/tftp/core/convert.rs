use super::error::DecodeError;

/// Byte-level helpers shared by the packet codec
pub struct Convert;

impl Convert {
    /// Read a big-endian `u16` at `offset`
    pub fn to_u16(buf: &[u8], offset: usize) -> Result<u16, DecodeError> {
        match buf.get(offset..offset + 2) {
            Some(bytes) => Ok(u16::from_be_bytes([bytes[0], bytes[1]])),
            None => Err(DecodeError::Truncated {
                expected: offset + 2,
                actual: buf.len(),
            }),
        }
    }

    /// Position of the first zero byte in `buf`, if any
    pub fn find_null(buf: &[u8]) -> Option<usize> {
        buf.iter().position(|&b| b == 0)
    }

    /// Split a zero-terminated byte string off the front of `buf`.
    ///
    /// Returns the bytes before the terminator and the remainder after it, or
    /// `None` when no terminator exists.
    pub fn take_cstr(buf: &[u8]) -> Option<(&[u8], &[u8])> {
        let end = Self::find_null(buf)?;
        Some((&buf[..end], &buf[end + 1..]))
    }

    /// Append `bytes` followed by a zero terminator
    pub fn put_cstr(buf: &mut Vec<u8>, bytes: &[u8]) {
        buf.extend_from_slice(bytes);
        buf.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_big_endian() {
        assert_eq!(Convert::to_u16(&[0x01, 0x02, 0x03], 1).unwrap(), 0x0203);
    }

    #[test]
    fn short_buffer_is_truncated() {
        assert!(matches!(
            Convert::to_u16(&[0x01], 0),
            Err(DecodeError::Truncated {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn splits_cstr() {
        let (text, rest) = Convert::take_cstr(b"abc\0def").unwrap();
        assert_eq!(text, b"abc");
        assert_eq!(rest, b"def");
        assert!(Convert::take_cstr(b"abc").is_none());
    }

    #[test]
    fn keeps_non_utf8_bytes() {
        let (text, rest) = Convert::take_cstr(b"caf\xe9\0").unwrap();
        assert_eq!(text, b"caf\xe9");
        assert!(rest.is_empty());

        let mut buf = Vec::new();
        Convert::put_cstr(&mut buf, text);
        assert_eq!(buf, b"caf\xe9\0");
    }
}
