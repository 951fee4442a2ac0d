use crate::error::{HeaderError, Result};
use crate::header::dos::DosHeader;
use crate::header::file::FileHeader;
use crate::header::optional::{OptionalHeader, OptionalHeader32, OptionalHeader64};
use crate::header::section::SectionHeader;
use crate::header::Header;
use crate::record::{read_exact_or_eod, read_record, Record};
use byteorder::{ByteOrder, LE};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// `"PE\0\0"` read as a little-endian dword.
pub const PE_SIGNATURE: u32 = 0x0000_4550;

const SIGNATURE_SIZE: usize = 4;

/// Knobs controlling how forgiving the decoder is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseOptions {
    /// Reject images whose DOS magic is not `MZ` or whose NT signature is not
    /// `PE\0\0`. When off, a bad signature is only logged.
    pub strict_signature: bool,

    /// Check `e_lfanew` and the end of the section table against the source
    /// length before reading, failing with [`HeaderError::InvalidOffset`].
    /// When off, such images fail with [`HeaderError::UnexpectedEndOfData`].
    pub validate_offsets: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            strict_signature: false,
            validate_offsets: true,
        }
    }
}

impl ParseOptions {
    pub fn strict() -> Self {
        ParseOptions {
            strict_signature: true,
            validate_offsets: true,
        }
    }
}

/// Absolute file offsets at which each decoding stage started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderLayout {
    pub nt_headers: u64,
    pub file_header: u64,
    pub optional_header: u64,
    pub section_table: u64,
    /// One past the last byte of the section table.
    pub end: u64,
}

/// The decoded header region of a PE image.
///
/// Built in a single forward pass by [`PeHeaders::parse`] and never modified
/// afterwards. The optional header variant always agrees with
/// [`PeHeaders::is_32bit_header`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeHeaders {
    dos_header: DosHeader,
    signature: u32,
    file_header: FileHeader,
    optional_header: OptionalHeader,
    sections: Vec<SectionHeader>,
    layout: HeaderLayout,
}

impl PeHeaders {
    pub fn parse<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Self::parse_with(reader, &ParseOptions::default())
    }

    pub fn parse_with<R: Read + Seek>(reader: &mut R, opts: &ParseOptions) -> Result<Self> {
        let source_len = if opts.validate_offsets {
            Some(reader.seek(SeekFrom::End(0))?)
        } else {
            None
        };
        reader.seek(SeekFrom::Start(0))?;

        let dos_header: DosHeader = read_record(reader, 0)?;
        if !dos_header.has_valid_magic() {
            if opts.strict_signature {
                return Err(HeaderError::InvalidDosMagic {
                    found: dos_header.e_magic,
                });
            }
            log::warn!("DOS magic is {:#06x}, not MZ", dos_header.e_magic);
        }

        let nt_headers = u64::from(dos_header.e_lfanew);
        log::debug!("DOS header decoded, NT headers at {:#x}", nt_headers);
        if nt_headers < DosHeader::SIZE as u64 {
            log::warn!(
                "e_lfanew {:#x} points back into the DOS header, NT headers overlap it",
                nt_headers
            );
        }
        if let Some(len) = source_len {
            if nt_headers >= len {
                return Err(HeaderError::InvalidOffset {
                    what: "NT headers",
                    offset: nt_headers,
                    len,
                });
            }
        }

        reader.seek(SeekFrom::Start(nt_headers))?;
        let raw_signature = read_exact_or_eod(reader, "NT signature", SIGNATURE_SIZE, nt_headers)?;
        let signature = LE::read_u32(&raw_signature);
        if signature != PE_SIGNATURE {
            if opts.strict_signature {
                return Err(HeaderError::InvalidSignature { found: signature });
            }
            log::warn!("NT signature is {:#010x}, not PE\\0\\0", signature);
        }

        let file_header_offset = nt_headers + SIGNATURE_SIZE as u64;
        let file_header: FileHeader = read_record(reader, file_header_offset)?;
        log::debug!(
            "File header: machine {:#x}, {} sections, characteristics {:#06x}",
            file_header.machine,
            file_header.number_of_sections,
            file_header.characteristics
        );

        let optional_offset = file_header_offset + FileHeader::SIZE as u64;
        let optional_header = if file_header.is_32bit() {
            OptionalHeader::Pe32(read_record::<OptionalHeader32, _>(reader, optional_offset)?)
        } else {
            OptionalHeader::Pe32Plus(read_record::<OptionalHeader64, _>(reader, optional_offset)?)
        };
        log::debug!(
            "{} optional header decoded at {:#x}",
            if optional_header.is_64() { "PE32+" } else { "PE32" },
            optional_offset
        );
        if usize::from(file_header.size_of_optional_header) != optional_header.decoded_size() {
            log::warn!(
                "SizeOfOptionalHeader is {} but the {} variant is {} bytes",
                file_header.size_of_optional_header,
                if optional_header.is_64() { "64-bit" } else { "32-bit" },
                optional_header.decoded_size()
            );
        }

        let section_table = optional_offset + optional_header.decoded_size() as u64;
        let count = usize::from(file_header.number_of_sections);
        let end = section_table + (count * SectionHeader::SIZE) as u64;
        if let Some(len) = source_len {
            if end > len {
                return Err(HeaderError::InvalidOffset {
                    what: "section table end",
                    offset: end,
                    len,
                });
            }
        }

        let mut sections = Vec::with_capacity(count);
        for index in 0..count {
            let offset = section_table + (index * SectionHeader::SIZE) as u64;
            let section: SectionHeader = read_record(reader, offset)?;
            log::trace!(
                "Section {} {:<8} va {:#x} size {:#x}",
                index,
                section.name(),
                section.virtual_address,
                section.virtual_size
            );
            sections.push(section);
        }

        Ok(PeHeaders {
            dos_header,
            signature,
            file_header,
            optional_header,
            sections,
            layout: HeaderLayout {
                nt_headers,
                file_header: file_header_offset,
                optional_header: optional_offset,
                section_table,
                end,
            },
        })
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::parse(&mut std::io::Cursor::new(data))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &ParseOptions::default())
    }

    /// Decodes the image at `path`. The file is opened read-only and closed
    /// before returning, whether or not the decode succeeded.
    pub fn open_with<P: AsRef<Path>>(path: P, opts: &ParseOptions) -> Result<Self> {
        let path = path.as_ref();
        log::info!("Reading PE headers from {}", path.display());

        let mut reader = BufReader::new(File::open(path)?);
        Self::parse_with(&mut reader, opts)
    }

    /// Decodes the headers of the running executable.
    pub fn current_exe() -> Result<Self> {
        Self::current_exe_with(&ParseOptions::default())
    }

    pub fn current_exe_with(opts: &ParseOptions) -> Result<Self> {
        Self::open_with(std::env::current_exe()?, opts)
    }

    pub fn dos_header(&self) -> &DosHeader {
        &self.dos_header
    }

    /// The raw NT signature dword, as read.
    pub fn signature(&self) -> u32 {
        self.signature
    }

    pub fn signature_is_valid(&self) -> bool {
        self.signature == PE_SIGNATURE
    }

    pub fn file_header(&self) -> &FileHeader {
        &self.file_header
    }

    pub fn is_32bit_header(&self) -> bool {
        self.file_header.is_32bit()
    }

    pub fn optional_header(&self) -> &OptionalHeader {
        &self.optional_header
    }

    pub fn optional_header32(&self) -> Option<&OptionalHeader32> {
        match &self.optional_header {
            OptionalHeader::Pe32(h) => Some(h),
            OptionalHeader::Pe32Plus(_) => None,
        }
    }

    pub fn optional_header64(&self) -> Option<&OptionalHeader64> {
        match &self.optional_header {
            OptionalHeader::Pe32Plus(h) => Some(h),
            OptionalHeader::Pe32(_) => None,
        }
    }

    pub fn sections(&self) -> &[SectionHeader] {
        &self.sections
    }

    pub fn section_by_name(&self, name: &str) -> Option<&SectionHeader> {
        self.sections.iter().find(|s| s.name() == name)
    }

    pub fn layout(&self) -> &HeaderLayout {
        &self.layout
    }

    /// Link time recorded in the file header.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.file_header.timestamp()
    }
}

impl Header for PeHeaders {
    /// Image base plus the entry point RVA, wrapping on overflow as the
    /// loader's address arithmetic does.
    fn entry_point(&self) -> u64 {
        self.optional_header
            .image_base()
            .wrapping_add(u64::from(self.optional_header.address_of_entry_point()))
    }

    fn machine(&self) -> u16 {
        self.file_header.machine
    }

    fn is_64(&self) -> bool {
        !self.is_32bit_header()
    }

    fn format_name(&self) -> &'static str {
        if self.is_32bit_header() {
            "PE32"
        } else {
            "PE32+"
        }
    }

    fn is_executable(&self) -> bool {
        self.file_header.is_executable_image() && !self.file_header.is_dll()
    }
}
