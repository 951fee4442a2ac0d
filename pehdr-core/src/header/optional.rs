use crate::record::Record;
use bitflags::bitflags;
use byteorder::{ReadBytesExt, LE};
use std::fmt;
use std::io::{self, Cursor};

pub const PE32_MAGIC: u16 = 0x10b;
pub const PE32_PLUS_MAGIC: u16 = 0x20b;

/// Number of data directory slots carried by both optional header variants.
pub const NUMBER_OF_DIRECTORIES: usize = 16;

bitflags! {
    /// `IMAGE_DLLCHARACTERISTICS_*` flags of the optional header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DllCharacteristics: u16 {
        const HIGH_ENTROPY_VA = 0x0020;
        const DYNAMIC_BASE = 0x0040;
        const FORCE_INTEGRITY = 0x0080;
        const NX_COMPAT = 0x0100;
        const NO_ISOLATION = 0x0200;
        const NO_SEH = 0x0400;
        const NO_BIND = 0x0800;
        const APPCONTAINER = 0x1000;
        const WDM_DRIVER = 0x2000;
        const GUARD_CF = 0x4000;
        const TERMINAL_SERVER_AWARE = 0x8000;
    }
}

pub fn subsystem_name(subsystem: u16) -> &'static str {
    match subsystem {
        1 => "native",
        2 => "windows-gui",
        3 => "windows-cui",
        5 => "os2-cui",
        7 => "posix-cui",
        9 => "windows-ce-gui",
        10 => "efi-application",
        11 => "efi-boot-service-driver",
        12 => "efi-runtime-driver",
        13 => "efi-rom",
        14 => "xbox",
        16 => "windows-boot-application",
        _ => "unknown",
    }
}

/// Location and size of one auxiliary table inside the image.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectory {
    pub virtual_address: u32,
    pub size: u32,
}

impl DataDirectory {
    pub fn is_present(&self) -> bool {
        self.virtual_address != 0 && self.size != 0
    }

    fn read(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(DataDirectory {
            virtual_address: cur.read_u32::<LE>()?,
            size: cur.read_u32::<LE>()?,
        })
    }
}

/// Names of the sixteen data directory slots, in on-disk order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataDirectoryKind {
    ExportTable,
    ImportTable,
    ResourceTable,
    ExceptionTable,
    CertificateTable,
    BaseRelocationTable,
    Debug,
    Architecture,
    GlobalPtr,
    TlsTable,
    LoadConfigTable,
    BoundImport,
    Iat,
    DelayImportDescriptor,
    ClrRuntimeHeader,
    Reserved,
}

impl DataDirectoryKind {
    pub const ALL: [DataDirectoryKind; NUMBER_OF_DIRECTORIES] = [
        DataDirectoryKind::ExportTable,
        DataDirectoryKind::ImportTable,
        DataDirectoryKind::ResourceTable,
        DataDirectoryKind::ExceptionTable,
        DataDirectoryKind::CertificateTable,
        DataDirectoryKind::BaseRelocationTable,
        DataDirectoryKind::Debug,
        DataDirectoryKind::Architecture,
        DataDirectoryKind::GlobalPtr,
        DataDirectoryKind::TlsTable,
        DataDirectoryKind::LoadConfigTable,
        DataDirectoryKind::BoundImport,
        DataDirectoryKind::Iat,
        DataDirectoryKind::DelayImportDescriptor,
        DataDirectoryKind::ClrRuntimeHeader,
        DataDirectoryKind::Reserved,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DataDirectoryKind::ExportTable => "export table",
            DataDirectoryKind::ImportTable => "import table",
            DataDirectoryKind::ResourceTable => "resource table",
            DataDirectoryKind::ExceptionTable => "exception table",
            DataDirectoryKind::CertificateTable => "certificate table",
            DataDirectoryKind::BaseRelocationTable => "base relocation table",
            DataDirectoryKind::Debug => "debug",
            DataDirectoryKind::Architecture => "architecture",
            DataDirectoryKind::GlobalPtr => "global ptr",
            DataDirectoryKind::TlsTable => "TLS table",
            DataDirectoryKind::LoadConfigTable => "load config table",
            DataDirectoryKind::BoundImport => "bound import",
            DataDirectoryKind::Iat => "IAT",
            DataDirectoryKind::DelayImportDescriptor => "delay import descriptor",
            DataDirectoryKind::ClrRuntimeHeader => "CLR runtime header",
            DataDirectoryKind::Reserved => "reserved",
        }
    }
}

impl fmt::Display for DataDirectoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The sixteen data directories that close both optional header variants.
///
/// Consumers look entries up by [`DataDirectoryKind`]; position only matters
/// for decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataDirectories {
    pub export_table: DataDirectory,
    pub import_table: DataDirectory,
    pub resource_table: DataDirectory,
    pub exception_table: DataDirectory,
    pub certificate_table: DataDirectory,
    pub base_relocation_table: DataDirectory,
    pub debug: DataDirectory,
    pub architecture: DataDirectory,
    pub global_ptr: DataDirectory,
    pub tls_table: DataDirectory,
    pub load_config_table: DataDirectory,
    pub bound_import: DataDirectory,
    pub iat: DataDirectory,
    pub delay_import_descriptor: DataDirectory,
    pub clr_runtime_header: DataDirectory,
    pub reserved: DataDirectory,
}

impl DataDirectories {
    pub const SIZE: usize = NUMBER_OF_DIRECTORIES * 8;

    pub fn get(&self, kind: DataDirectoryKind) -> &DataDirectory {
        match kind {
            DataDirectoryKind::ExportTable => &self.export_table,
            DataDirectoryKind::ImportTable => &self.import_table,
            DataDirectoryKind::ResourceTable => &self.resource_table,
            DataDirectoryKind::ExceptionTable => &self.exception_table,
            DataDirectoryKind::CertificateTable => &self.certificate_table,
            DataDirectoryKind::BaseRelocationTable => &self.base_relocation_table,
            DataDirectoryKind::Debug => &self.debug,
            DataDirectoryKind::Architecture => &self.architecture,
            DataDirectoryKind::GlobalPtr => &self.global_ptr,
            DataDirectoryKind::TlsTable => &self.tls_table,
            DataDirectoryKind::LoadConfigTable => &self.load_config_table,
            DataDirectoryKind::BoundImport => &self.bound_import,
            DataDirectoryKind::Iat => &self.iat,
            DataDirectoryKind::DelayImportDescriptor => &self.delay_import_descriptor,
            DataDirectoryKind::ClrRuntimeHeader => &self.clr_runtime_header,
            DataDirectoryKind::Reserved => &self.reserved,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DataDirectoryKind, &DataDirectory)> + '_ {
        DataDirectoryKind::ALL
            .into_iter()
            .map(move |kind| (kind, self.get(kind)))
    }

    fn read(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(DataDirectories {
            export_table: DataDirectory::read(cur)?,
            import_table: DataDirectory::read(cur)?,
            resource_table: DataDirectory::read(cur)?,
            exception_table: DataDirectory::read(cur)?,
            certificate_table: DataDirectory::read(cur)?,
            base_relocation_table: DataDirectory::read(cur)?,
            debug: DataDirectory::read(cur)?,
            architecture: DataDirectory::read(cur)?,
            global_ptr: DataDirectory::read(cur)?,
            tls_table: DataDirectory::read(cur)?,
            load_config_table: DataDirectory::read(cur)?,
            bound_import: DataDirectory::read(cur)?,
            iat: DataDirectory::read(cur)?,
            delay_import_descriptor: DataDirectory::read(cur)?,
            clr_runtime_header: DataDirectory::read(cur)?,
            reserved: DataDirectory::read(cur)?,
        })
    }
}

/// `IMAGE_OPTIONAL_HEADER32`, the PE32 variant. 96 packed bytes of fields
/// followed by the data directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionalHeader32 {
    /// 0x10b for this variant; 0x20b marks PE32+ and 0x107 a ROM image.
    pub magic: u16,
    /// Linker major version.
    pub major_linker_version: u8,
    /// Linker minor version.
    pub minor_linker_version: u8,
    /// Combined size of all code sections.
    pub size_of_code: u32,
    /// Combined size of all initialized data sections.
    pub size_of_initialized_data: u32,
    /// Combined size of all BSS sections.
    pub size_of_uninitialized_data: u32,
    /// Entry point RVA, 0 for DLLs without one.
    pub address_of_entry_point: u32,
    /// RVA of the start of the code section.
    pub base_of_code: u32,
    /// RVA of the start of the data section. PE32 only.
    pub base_of_data: u32,
    /// Preferred load address, 0x400000 by default for executables and
    /// 0x10000000 for DLLs.
    pub image_base: u32,
    /// In-memory section alignment, usually the page size (0x1000).
    pub section_alignment: u32,
    /// On-disk alignment of section data, usually 0x200.
    pub file_alignment: u32,
    /// Minimum OS version, major part.
    pub major_operating_system_version: u16,
    /// Minimum OS version, minor part.
    pub minor_operating_system_version: u16,
    /// Image version, major part.
    pub major_image_version: u16,
    /// Image version, minor part.
    pub minor_image_version: u16,
    /// Minimum subsystem version, major part.
    pub major_subsystem_version: u16,
    /// Minimum subsystem version, minor part.
    pub minor_subsystem_version: u16,
    /// Reserved, must be 0.
    pub win32_version_value: u32,
    /// Size of the mapped image, a multiple of `section_alignment`.
    pub size_of_image: u32,
    /// Headers plus section table, rounded up to `file_alignment`.
    pub size_of_headers: u32,
    /// Image checksum, only checked for drivers and boot-time DLLs.
    pub check_sum: u32,
    /// Required subsystem:
    /// - 1: native
    /// - 2: Windows GUI
    /// - 3: Windows console
    /// - 10: EFI application
    pub subsystem: u16,
    /// [`DllCharacteristics`] bits.
    pub dll_characteristics: u16,
    /// Stack reserved for the initial thread.
    pub size_of_stack_reserve: u32,
    /// Stack committed up front for the initial thread.
    pub size_of_stack_commit: u32,
    /// Local heap reserve.
    pub size_of_heap_reserve: u32,
    /// Local heap committed up front.
    pub size_of_heap_commit: u32,
    /// Reserved, must be 0.
    pub loader_flags: u32,
    /// Data directory count the linker declared. All 16 are decoded regardless.
    pub number_of_rva_and_sizes: u32,
    /// The 16 fixed data directory slots.
    pub data_directories: DataDirectories,
}

impl Record for OptionalHeader32 {
    const NAME: &'static str = "32-bit optional header";
    const SIZE: usize = 96 + DataDirectories::SIZE;

    fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(OptionalHeader32 {
            magic: cur.read_u16::<LE>()?,
            major_linker_version: cur.read_u8()?,
            minor_linker_version: cur.read_u8()?,
            size_of_code: cur.read_u32::<LE>()?,
            size_of_initialized_data: cur.read_u32::<LE>()?,
            size_of_uninitialized_data: cur.read_u32::<LE>()?,
            address_of_entry_point: cur.read_u32::<LE>()?,
            base_of_code: cur.read_u32::<LE>()?,
            base_of_data: cur.read_u32::<LE>()?,
            image_base: cur.read_u32::<LE>()?,
            section_alignment: cur.read_u32::<LE>()?,
            file_alignment: cur.read_u32::<LE>()?,
            major_operating_system_version: cur.read_u16::<LE>()?,
            minor_operating_system_version: cur.read_u16::<LE>()?,
            major_image_version: cur.read_u16::<LE>()?,
            minor_image_version: cur.read_u16::<LE>()?,
            major_subsystem_version: cur.read_u16::<LE>()?,
            minor_subsystem_version: cur.read_u16::<LE>()?,
            win32_version_value: cur.read_u32::<LE>()?,
            size_of_image: cur.read_u32::<LE>()?,
            size_of_headers: cur.read_u32::<LE>()?,
            check_sum: cur.read_u32::<LE>()?,
            subsystem: cur.read_u16::<LE>()?,
            dll_characteristics: cur.read_u16::<LE>()?,
            size_of_stack_reserve: cur.read_u32::<LE>()?,
            size_of_stack_commit: cur.read_u32::<LE>()?,
            size_of_heap_reserve: cur.read_u32::<LE>()?,
            size_of_heap_commit: cur.read_u32::<LE>()?,
            loader_flags: cur.read_u32::<LE>()?,
            number_of_rva_and_sizes: cur.read_u32::<LE>()?,
            data_directories: DataDirectories::read(cur)?,
        })
    }
}

/// `IMAGE_OPTIONAL_HEADER64`, the PE32+ variant.
///
/// Same shape as [`OptionalHeader32`] except that `BaseOfData` is gone and the
/// image base and stack/heap sizes are 64 bits wide: 112 packed bytes of fields
/// followed by the data directories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptionalHeader64 {
    /// Always 0x20b for this variant.
    pub magic: u16,
    /// Linker version, major and minor.
    pub major_linker_version: u8,
    pub minor_linker_version: u8,
    /// Combined size of all code sections.
    pub size_of_code: u32,
    /// Combined size of all initialized data sections.
    pub size_of_initialized_data: u32,
    /// Combined size of all BSS sections.
    pub size_of_uninitialized_data: u32,
    /// Entry point RVA.
    pub address_of_entry_point: u32,
    /// RVA of the start of the code section.
    pub base_of_code: u32,
    /// Preferred load address, 0x140000000 by default for executables and
    /// 0x180000000 for DLLs.
    pub image_base: u64,
    /// In-memory section alignment, usually the page size (0x1000).
    pub section_alignment: u32,
    /// On-disk alignment of section data, usually 0x200.
    pub file_alignment: u32,
    /// Minimum OS version, major part.
    pub major_operating_system_version: u16,
    /// Minimum OS version, minor part.
    pub minor_operating_system_version: u16,
    /// Image version, major and minor.
    pub major_image_version: u16,
    pub minor_image_version: u16,
    /// Minimum subsystem version, major part.
    pub major_subsystem_version: u16,
    /// Minimum subsystem version, minor part.
    pub minor_subsystem_version: u16,
    /// Reserved, must be 0.
    pub win32_version_value: u32,
    /// Size of the mapped image, a multiple of `section_alignment`.
    pub size_of_image: u32,
    /// Headers plus section table, rounded up to `file_alignment`.
    pub size_of_headers: u32,
    /// Image checksum, only checked for drivers and boot-time DLLs.
    pub check_sum: u32,
    /// Required subsystem, see [`subsystem_name`].
    pub subsystem: u16,
    /// [`DllCharacteristics`] bits.
    pub dll_characteristics: u16,
    /// Stack reserved for the initial thread, 64 bits wide here.
    pub size_of_stack_reserve: u64,
    /// Stack committed up front for the initial thread.
    pub size_of_stack_commit: u64,
    /// Local heap reserve, 64 bits wide here.
    pub size_of_heap_reserve: u64,
    /// Local heap committed up front.
    pub size_of_heap_commit: u64,
    /// Reserved, must be 0.
    pub loader_flags: u32,
    /// Data directory count the linker declared. All 16 are decoded regardless.
    pub number_of_rva_and_sizes: u32,
    /// The 16 fixed data directory slots.
    pub data_directories: DataDirectories,
}

impl Record for OptionalHeader64 {
    const NAME: &'static str = "64-bit optional header";
    const SIZE: usize = 112 + DataDirectories::SIZE;

    fn decode(cur: &mut Cursor<&[u8]>) -> io::Result<Self> {
        Ok(OptionalHeader64 {
            magic: cur.read_u16::<LE>()?,
            major_linker_version: cur.read_u8()?,
            minor_linker_version: cur.read_u8()?,
            size_of_code: cur.read_u32::<LE>()?,
            size_of_initialized_data: cur.read_u32::<LE>()?,
            size_of_uninitialized_data: cur.read_u32::<LE>()?,
            address_of_entry_point: cur.read_u32::<LE>()?,
            base_of_code: cur.read_u32::<LE>()?,
            image_base: cur.read_u64::<LE>()?,
            section_alignment: cur.read_u32::<LE>()?,
            file_alignment: cur.read_u32::<LE>()?,
            major_operating_system_version: cur.read_u16::<LE>()?,
            minor_operating_system_version: cur.read_u16::<LE>()?,
            major_image_version: cur.read_u16::<LE>()?,
            minor_image_version: cur.read_u16::<LE>()?,
            major_subsystem_version: cur.read_u16::<LE>()?,
            minor_subsystem_version: cur.read_u16::<LE>()?,
            win32_version_value: cur.read_u32::<LE>()?,
            size_of_image: cur.read_u32::<LE>()?,
            size_of_headers: cur.read_u32::<LE>()?,
            check_sum: cur.read_u32::<LE>()?,
            subsystem: cur.read_u16::<LE>()?,
            dll_characteristics: cur.read_u16::<LE>()?,
            size_of_stack_reserve: cur.read_u64::<LE>()?,
            size_of_stack_commit: cur.read_u64::<LE>()?,
            size_of_heap_reserve: cur.read_u64::<LE>()?,
            size_of_heap_commit: cur.read_u64::<LE>()?,
            loader_flags: cur.read_u32::<LE>()?,
            number_of_rva_and_sizes: cur.read_u32::<LE>()?,
            data_directories: DataDirectories::read(cur)?,
        })
    }
}

/// Whichever optional header variant the file header's bitness flag selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionalHeader {
    Pe32(OptionalHeader32),
    Pe32Plus(OptionalHeader64),
}

impl OptionalHeader {
    pub fn is_64(&self) -> bool {
        matches!(self, OptionalHeader::Pe32Plus(_))
    }

    /// On-disk size of the decoded variant.
    pub fn decoded_size(&self) -> usize {
        match self {
            OptionalHeader::Pe32(_) => OptionalHeader32::SIZE,
            OptionalHeader::Pe32Plus(_) => OptionalHeader64::SIZE,
        }
    }

    pub fn magic(&self) -> u16 {
        match self {
            OptionalHeader::Pe32(h) => h.magic,
            OptionalHeader::Pe32Plus(h) => h.magic,
        }
    }

    pub fn address_of_entry_point(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.address_of_entry_point,
            OptionalHeader::Pe32Plus(h) => h.address_of_entry_point,
        }
    }

    pub fn image_base(&self) -> u64 {
        match self {
            OptionalHeader::Pe32(h) => u64::from(h.image_base),
            OptionalHeader::Pe32Plus(h) => h.image_base,
        }
    }

    pub fn size_of_image(&self) -> u32 {
        match self {
            OptionalHeader::Pe32(h) => h.size_of_image,
            OptionalHeader::Pe32Plus(h) => h.size_of_image,
        }
    }

    pub fn subsystem(&self) -> u16 {
        match self {
            OptionalHeader::Pe32(h) => h.subsystem,
            OptionalHeader::Pe32Plus(h) => h.subsystem,
        }
    }

    pub fn dll_characteristics(&self) -> DllCharacteristics {
        let raw = match self {
            OptionalHeader::Pe32(h) => h.dll_characteristics,
            OptionalHeader::Pe32Plus(h) => h.dll_characteristics,
        };
        DllCharacteristics::from_bits_retain(raw)
    }

    pub fn data_directories(&self) -> &DataDirectories {
        match self {
            OptionalHeader::Pe32(h) => &h.data_directories,
            OptionalHeader::Pe32Plus(h) => &h.data_directories,
        }
    }
}
