use crate::record::Record;
use byteorder::{ReadBytesExt, LE};
use std::io::{self, Cursor};

/// `"MZ"` read as a little-endian word.
pub const DOS_MAGIC: u16 = 0x5a4d;

/// Represents the legacy MS-DOS header found at offset 0 of every PE image.
///
/// This corresponds to `IMAGE_DOS_HEADER`. Apart from the magic, the only field
/// a PE loader cares about is [`DosHeader::e_lfanew`], the file offset of the
/// NT headers. Everything else is carried verbatim for inspection.
///
/// Reference: [PE Format](https://learn.microsoft.com/en-us/windows/win32/debug/pe-format)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DosHeader {
    /// Magic number, `0x5A4D` (`"MZ"`) for a valid image.
    pub e_magic: u16,

    /// Bytes on the last page of the file.
    pub e_cblp: u16,

    /// Pages in the file.
    pub e_cp: u16,

    /// Relocation count.
    pub e_crlc: u16,

    /// Size of the header in 16-byte paragraphs.
    pub e_cparhdr: u16,

    /// Minimum extra paragraphs needed.
    pub e_minalloc: u16,

    /// Maximum extra paragraphs needed.
    pub e_maxalloc: u16,

    /// Initial (relative) SS value.
    pub e_ss: u16,

    /// Initial SP value.
    pub e_sp: u16,

    /// Checksum.
    pub e_csum: u16,

    /// Initial IP value.
    pub e_ip: u16,

    /// Initial (relative) CS value.
    pub e_cs: u16,

    /// File address of the relocation table.
    pub e_lfarlc: u16,

    /// Overlay number.
    pub e_ovno: u16,

    /// Reserved words.
    pub e_res: [u16; 4],

    /// OEM identifier (for `e_oeminfo`).
    pub e_oemid: u16,

    /// OEM information, `e_oemid` specific.
    pub e_oeminfo: u16,

    /// Reserved words.
    pub e_res2: [u16; 10],

    /// File offset of the NT headers (`"PE\0\0"` signature).
    ///
    /// Always the last four bytes of the header, at offset `0x3C`.
    pub e_lfanew: u32,
}

impl DosHeader {
    pub fn has_valid_magic(&self) -> bool {
        self.e_magic == DOS_MAGIC
    }
}

impl Record for DosHeader {
    const NAME: &'static str = "DOS header";
    const SIZE: usize = 64;

    fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        let e_magic = cur.read_u16::<LE>()?;
        let e_cblp = cur.read_u16::<LE>()?;
        let e_cp = cur.read_u16::<LE>()?;
        let e_crlc = cur.read_u16::<LE>()?;
        let e_cparhdr = cur.read_u16::<LE>()?;
        let e_minalloc = cur.read_u16::<LE>()?;
        let e_maxalloc = cur.read_u16::<LE>()?;
        let e_ss = cur.read_u16::<LE>()?;
        let e_sp = cur.read_u16::<LE>()?;
        let e_csum = cur.read_u16::<LE>()?;
        let e_ip = cur.read_u16::<LE>()?;
        let e_cs = cur.read_u16::<LE>()?;
        let e_lfarlc = cur.read_u16::<LE>()?;
        let e_ovno = cur.read_u16::<LE>()?;

        let mut e_res = [0u16; 4];
        cur.read_u16_into::<LE>(&mut e_res)?;

        let e_oemid = cur.read_u16::<LE>()?;
        let e_oeminfo = cur.read_u16::<LE>()?;

        let mut e_res2 = [0u16; 10];
        cur.read_u16_into::<LE>(&mut e_res2)?;

        Ok(DosHeader {
            e_magic,
            e_cblp,
            e_cp,
            e_crlc,
            e_cparhdr,
            e_minalloc,
            e_maxalloc,
            e_ss,
            e_sp,
            e_csum,
            e_ip,
            e_cs,
            e_lfarlc,
            e_ovno,
            e_res,
            e_oemid,
            e_oeminfo,
            e_res2,
            e_lfanew: cur.read_u32::<LE>()?,
        })
    }
}
