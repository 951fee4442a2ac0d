use crate::error::{HeaderError, Result};
use std::io::{self, Cursor, Read};

/// A fixed-size on-disk record.
///
/// `decode` is handed a cursor over exactly `SIZE` bytes. Records laid out in
/// natural field order read through it with `byteorder::ReadBytesExt`; records
/// with explicit field offsets index `cur.get_ref()` with `byteorder::ByteOrder`.
pub trait Record: Sized {
    /// Human-readable name used in error messages.
    const NAME: &'static str;

    /// Exact size of the record on disk, in bytes.
    const SIZE: usize;

    fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self>;
}

/// Consumes exactly `T::SIZE` bytes from `reader` and decodes them.
///
/// `offset` is the absolute position of the reader, used only for reporting.
/// Nothing is decoded unless the whole record was available. A decoder that
/// reads past its own `SIZE` surfaces as [`HeaderError::Io`].
pub fn read_record<T: Record, R: Read>(reader: &mut R, offset: u64) -> Result<T> {
    let buf = read_exact_or_eod(reader, T::NAME, T::SIZE, offset)?;
    let mut cur = Cursor::new(buf.as_slice());

    Ok(T::decode(&mut cur)?)
}

pub(crate) fn read_exact_or_eod<R: Read>(
    reader: &mut R,
    record: &'static str,
    size: usize,
    offset: u64,
) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(size);
    reader.by_ref().take(size as u64).read_to_end(&mut buf)?;

    if buf.len() < size {
        return Err(HeaderError::UnexpectedEndOfData {
            record,
            offset,
            needed: size,
            available: buf.len(),
        });
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::{ReadBytesExt, LE};

    #[derive(Debug, PartialEq)]
    struct Pair {
        a: u16,
        b: u32,
    }

    impl Record for Pair {
        const NAME: &'static str = "pair";
        const SIZE: usize = 6;

        fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
            Ok(Pair {
                a: cur.read_u16::<LE>()?,
                b: cur.read_u32::<LE>()?,
            })
        }
    }

    #[test]
    fn reads_exactly_size_bytes() {
        let mut cur = Cursor::new(vec![0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xff]);
        let pair: Pair = read_record(&mut cur, 0).unwrap();
        assert_eq!(pair, Pair { a: 0x0201, b: 0x0605_0403 });
        assert_eq!(cur.position(), 6);
    }

    /// Claims four bytes but decodes six.
    #[derive(Debug)]
    struct Oversized;

    impl Record for Oversized {
        const NAME: &'static str = "oversized";
        const SIZE: usize = 4;

        fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
            cur.read_u32::<LE>()?;
            cur.read_u16::<LE>()?;
            Ok(Oversized)
        }
    }

    #[test]
    fn decoder_overrun_is_not_end_of_data() {
        let mut cur = Cursor::new(vec![0u8; 16]);
        let err = read_record::<Oversized, _>(&mut cur, 0).unwrap_err();
        match err {
            HeaderError::Io(io) => assert_eq!(io.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(cur.position(), 4);
    }

    #[test]
    fn short_source_is_unexpected_end() {
        let mut cur = Cursor::new(vec![0x01, 0x02, 0x03]);
        let err = read_record::<Pair, _>(&mut cur, 0x40).unwrap_err();
        match err {
            HeaderError::UnexpectedEndOfData {
                record,
                offset,
                needed,
                available,
            } => {
                assert_eq!(record, "pair");
                assert_eq!(offset, 0x40);
                assert_eq!(needed, 6);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
