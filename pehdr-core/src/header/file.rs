use crate::record::Record;
use bitflags::bitflags;
use byteorder::{ReadBytesExt, LE};
use chrono::{DateTime, Utc};
use std::io::{self, Cursor};

pub const IMAGE_FILE_MACHINE_UNKNOWN: u16 = 0x0;
pub const IMAGE_FILE_MACHINE_I386: u16 = 0x14c;
pub const IMAGE_FILE_MACHINE_ARMNT: u16 = 0x1c4;
pub const IMAGE_FILE_MACHINE_IA64: u16 = 0x200;
pub const IMAGE_FILE_MACHINE_EBC: u16 = 0xebc;
pub const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;
pub const IMAGE_FILE_MACHINE_ARM64: u16 = 0xaa64;
pub const IMAGE_FILE_MACHINE_RISCV64: u16 = 0x5064;

bitflags! {
    /// `IMAGE_FILE_*` characteristics of the COFF file header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FileCharacteristics: u16 {
        const RELOCS_STRIPPED = 0x0001;
        const EXECUTABLE_IMAGE = 0x0002;
        const LINE_NUMS_STRIPPED = 0x0004;
        const LOCAL_SYMS_STRIPPED = 0x0008;
        const AGGRESSIVE_WS_TRIM = 0x0010;
        const LARGE_ADDRESS_AWARE = 0x0020;
        const BYTES_REVERSED_LO = 0x0080;
        /// The image targets a 32-bit word machine.
        const BIT32_MACHINE = 0x0100;
        const DEBUG_STRIPPED = 0x0200;
        const REMOVABLE_RUN_FROM_SWAP = 0x0400;
        const NET_RUN_FROM_SWAP = 0x0800;
        const SYSTEM = 0x1000;
        const DLL = 0x2000;
        const UP_SYSTEM_ONLY = 0x4000;
        const BYTES_REVERSED_HI = 0x8000;
    }
}

/// The COFF file header (`IMAGE_FILE_HEADER`), 20 packed bytes directly after
/// the NT signature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileHeader {
    /// Target architecture:
    /// - 0x014c: i386
    /// - 0x8664: amd64
    /// - 0x01c4: ARMv7 Thumb-2
    /// - 0xaa64: arm64
    pub machine: u16,
    /// Bounds the section table that follows the optional header.
    pub number_of_sections: u16,
    /// Link time, seconds since the Unix epoch.
    pub time_date_stamp: u32,
    /// File offset of the COFF symbol table, 0 in most images.
    pub pointer_to_symbol_table: u32,
    /// Entries in the COFF symbol table.
    pub number_of_symbols: u32,
    /// Declared size of the optional header: 224 for PE32, 240 for PE32+.
    /// Only logged when it disagrees with the decoded variant.
    pub size_of_optional_header: u16,
    /// [`FileCharacteristics`] bits, e.g. 0x0002 executable, 0x0100 32-bit
    /// machine, 0x2000 DLL.
    pub characteristics: u16,
}

impl FileHeader {
    pub fn flags(&self) -> FileCharacteristics {
        FileCharacteristics::from_bits_retain(self.characteristics)
    }

    /// True when the `IMAGE_FILE_32BIT_MACHINE` bit is set.
    ///
    /// This is the only bitness test in the crate: the decoder picks the
    /// optional header variant with it, and [`crate::PeHeaders::is_32bit_header`]
    /// reports it back.
    pub fn is_32bit(&self) -> bool {
        self.flags().contains(FileCharacteristics::BIT32_MACHINE)
    }

    pub fn is_dll(&self) -> bool {
        self.flags().contains(FileCharacteristics::DLL)
    }

    pub fn is_executable_image(&self) -> bool {
        self.flags().contains(FileCharacteristics::EXECUTABLE_IMAGE)
    }

    /// Link time as a UTC timestamp.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(i64::from(self.time_date_stamp), 0)
    }

    pub fn machine_name(&self) -> &'static str {
        machine_name(self.machine)
    }
}

pub fn machine_name(machine: u16) -> &'static str {
    match machine {
        IMAGE_FILE_MACHINE_UNKNOWN => "unknown",
        IMAGE_FILE_MACHINE_I386 => "i386",
        IMAGE_FILE_MACHINE_ARMNT => "armnt",
        IMAGE_FILE_MACHINE_IA64 => "ia64",
        IMAGE_FILE_MACHINE_EBC => "ebc",
        IMAGE_FILE_MACHINE_AMD64 => "amd64",
        IMAGE_FILE_MACHINE_ARM64 => "arm64",
        IMAGE_FILE_MACHINE_RISCV64 => "riscv64",
        _ => "other",
    }
}

impl Record for FileHeader {
    const NAME: &'static str = "file header";
    const SIZE: usize = 20;

    fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(FileHeader {
            machine: cur.read_u16::<LE>()?,
            number_of_sections: cur.read_u16::<LE>()?,
            time_date_stamp: cur.read_u32::<LE>()?,
            pointer_to_symbol_table: cur.read_u32::<LE>()?,
            number_of_symbols: cur.read_u32::<LE>()?,
            size_of_optional_header: cur.read_u16::<LE>()?,
            characteristics: cur.read_u16::<LE>()?,
        })
    }
}
