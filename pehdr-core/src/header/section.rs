use crate::record::Record;
use bitflags::bitflags;
use byteorder::{ByteOrder, LE};
use std::io::{self, Cursor};

bitflags! {
    /// `IMAGE_SCN_*` section characteristics.
    ///
    /// The `ALIGN_*` values share the 4-bit field under [`Self::ALIGN_MASK`] and
    /// are not independent bits; use [`SectionHeader::alignment`] to read them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SectionCharacteristics: u32 {
        const TYPE_DSECT = 0x0000_0001;
        const TYPE_NOLOAD = 0x0000_0002;
        const TYPE_GROUP = 0x0000_0004;
        const TYPE_NO_PAD = 0x0000_0008;
        const TYPE_COPY = 0x0000_0010;
        const CNT_CODE = 0x0000_0020;
        const CNT_INITIALIZED_DATA = 0x0000_0040;
        const CNT_UNINITIALIZED_DATA = 0x0000_0080;
        const LNK_OTHER = 0x0000_0100;
        const LNK_INFO = 0x0000_0200;
        const TYPE_OVER = 0x0000_0400;
        const LNK_REMOVE = 0x0000_0800;
        const LNK_COMDAT = 0x0000_1000;
        const NO_DEFER_SPEC_EXC = 0x0000_4000;
        const GPREL = 0x0000_8000;
        const MEM_PURGEABLE = 0x0002_0000;
        const MEM_16BIT = 0x0002_0000;
        const MEM_LOCKED = 0x0004_0000;
        const MEM_PRELOAD = 0x0008_0000;
        const ALIGN_1BYTES = 0x0010_0000;
        const ALIGN_2BYTES = 0x0020_0000;
        const ALIGN_4BYTES = 0x0030_0000;
        const ALIGN_8BYTES = 0x0040_0000;
        const ALIGN_16BYTES = 0x0050_0000;
        const ALIGN_32BYTES = 0x0060_0000;
        const ALIGN_64BYTES = 0x0070_0000;
        const ALIGN_128BYTES = 0x0080_0000;
        const ALIGN_256BYTES = 0x0090_0000;
        const ALIGN_512BYTES = 0x00A0_0000;
        const ALIGN_1024BYTES = 0x00B0_0000;
        const ALIGN_2048BYTES = 0x00C0_0000;
        const ALIGN_4096BYTES = 0x00D0_0000;
        const ALIGN_8192BYTES = 0x00E0_0000;
        const ALIGN_MASK = 0x00F0_0000;
        const LNK_NRELOC_OVFL = 0x0100_0000;
        const MEM_DISCARDABLE = 0x0200_0000;
        const MEM_NOT_CACHED = 0x0400_0000;
        const MEM_NOT_PAGED = 0x0800_0000;
        const MEM_SHARED = 0x1000_0000;
        const MEM_EXECUTE = 0x2000_0000;
        const MEM_READ = 0x4000_0000;
        const MEM_WRITE = 0x8000_0000;
    }
}

/// One entry of the section table (`IMAGE_SECTION_HEADER`), 40 bytes.
///
/// Fields are pulled from fixed byte ranges of the record rather than read in
/// sequence:
///
/// | offset | field |
/// |---|---|
/// | 0  | `Name` (8 bytes) |
/// | 8  | `VirtualSize` |
/// | 12 | `VirtualAddress` |
/// | 16 | `SizeOfRawData` |
/// | 20 | `PointerToRawData` |
/// | 24 | `PointerToRelocations` |
/// | 28 | `PointerToLinenumbers` |
/// | 32 | `NumberOfRelocations` |
/// | 34 | `NumberOfLinenumbers` |
/// | 36 | `Characteristics` |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionHeader {
    /// Name bytes as stored, NUL padded.
    pub raw_name: [u8; 8],
    pub virtual_size: u32,
    pub virtual_address: u32,
    pub size_of_raw_data: u32,
    pub pointer_to_raw_data: u32,
    pub pointer_to_relocations: u32,
    pub pointer_to_linenumbers: u32,
    pub number_of_relocations: u16,
    pub number_of_linenumbers: u16,
    pub characteristics: u32,
}

impl SectionHeader {
    /// Display name: each byte taken as one character, whitespace trimmed,
    /// then every NUL removed. `b".text\0\0\0"` yields `".text"`.
    pub fn name(&self) -> String {
        let raw: String = self.raw_name.iter().map(|&b| b as char).collect();
        raw.trim().replace('\0', "")
    }

    pub fn flags(&self) -> SectionCharacteristics {
        SectionCharacteristics::from_bits_retain(self.characteristics)
    }

    pub fn contains_code(&self) -> bool {
        self.flags().contains(SectionCharacteristics::CNT_CODE)
    }

    pub fn contains_initialized_data(&self) -> bool {
        self.flags()
            .contains(SectionCharacteristics::CNT_INITIALIZED_DATA)
    }

    pub fn contains_uninitialized_data(&self) -> bool {
        self.flags()
            .contains(SectionCharacteristics::CNT_UNINITIALIZED_DATA)
    }

    pub fn is_executable(&self) -> bool {
        self.flags().contains(SectionCharacteristics::MEM_EXECUTE)
    }

    pub fn is_readable(&self) -> bool {
        self.flags().contains(SectionCharacteristics::MEM_READ)
    }

    pub fn is_writable(&self) -> bool {
        self.flags().contains(SectionCharacteristics::MEM_WRITE)
    }

    pub fn is_discardable(&self) -> bool {
        self.flags().contains(SectionCharacteristics::MEM_DISCARDABLE)
    }

    /// Alignment in bytes encoded by the `ALIGN_*` field, if any.
    pub fn alignment(&self) -> Option<u32> {
        let field = (self.characteristics & SectionCharacteristics::ALIGN_MASK.bits()) >> 20;
        match field {
            0 | 0xF => None,
            n => Some(1 << (n - 1)),
        }
    }

    /// Short `rwx` summary of the memory permissions.
    pub fn permissions(&self) -> String {
        let mut perms = String::with_capacity(3);
        perms.push(if self.is_readable() { 'r' } else { '-' });
        perms.push(if self.is_writable() { 'w' } else { '-' });
        perms.push(if self.is_executable() { 'x' } else { '-' });
        perms
    }
}

impl Record for SectionHeader {
    const NAME: &'static str = "section header";
    const SIZE: usize = 40;

    fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        let buf = *cur.get_ref();
        if buf.len() < Self::SIZE {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }

        let mut raw_name = [0u8; 8];
        raw_name.copy_from_slice(&buf[0..8]);

        let header = SectionHeader {
            raw_name,
            virtual_size: LE::read_u32(&buf[8..12]),
            virtual_address: LE::read_u32(&buf[12..16]),
            size_of_raw_data: LE::read_u32(&buf[16..20]),
            pointer_to_raw_data: LE::read_u32(&buf[20..24]),
            pointer_to_relocations: LE::read_u32(&buf[24..28]),
            pointer_to_linenumbers: LE::read_u32(&buf[28..32]),
            number_of_relocations: LE::read_u16(&buf[32..34]),
            number_of_linenumbers: LE::read_u16(&buf[34..36]),
            characteristics: LE::read_u32(&buf[36..40]),
        };
        cur.set_position(Self::SIZE as u64);
        Ok(header)
    }
}
