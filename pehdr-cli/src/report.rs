use pehdr_core::header::file::machine_name;
use pehdr_core::header::optional::subsystem_name;
use pehdr_core::{Header, OptionalHeader, PeHeaders, SectionHeader};
use serde::Serialize;
use tabled::Tabled;

#[derive(Debug, Serialize)]
pub struct Summary {
    pub format: &'static str,
    pub machine: String,
    pub is_32bit_header: bool,
    pub signature_valid: bool,
    pub build_time: Option<String>,
    pub entry_point: String,
    pub image_base: String,
    pub subsystem: &'static str,
    pub number_of_sections: u16,
}

impl Summary {
    pub fn new(pe: &PeHeaders) -> Self {
        let fh = pe.file_header();
        let opt = pe.optional_header();
        Summary {
            format: pe.format_name(),
            machine: format!("{} ({:#06x})", machine_name(fh.machine), fh.machine),
            is_32bit_header: pe.is_32bit_header(),
            signature_valid: pe.signature_is_valid(),
            build_time: pe.timestamp().map(|ts| ts.to_rfc3339()),
            entry_point: format!("{:#x}", pe.entry_point()),
            image_base: format!("{:#x}", opt.image_base()),
            subsystem: subsystem_name(opt.subsystem()),
            number_of_sections: fh.number_of_sections,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DosReport {
    pub e_magic: u16,
    pub e_cblp: u16,
    pub e_cp: u16,
    pub e_crlc: u16,
    pub e_cparhdr: u16,
    pub e_minalloc: u16,
    pub e_maxalloc: u16,
    pub e_ss: u16,
    pub e_sp: u16,
    pub e_csum: u16,
    pub e_ip: u16,
    pub e_cs: u16,
    pub e_lfarlc: u16,
    pub e_ovno: u16,
    pub e_oemid: u16,
    pub e_oeminfo: u16,
    pub e_lfanew: u32,
}

impl DosReport {
    pub fn new(pe: &PeHeaders) -> Self {
        let d = pe.dos_header();
        DosReport {
            e_magic: d.e_magic,
            e_cblp: d.e_cblp,
            e_cp: d.e_cp,
            e_crlc: d.e_crlc,
            e_cparhdr: d.e_cparhdr,
            e_minalloc: d.e_minalloc,
            e_maxalloc: d.e_maxalloc,
            e_ss: d.e_ss,
            e_sp: d.e_sp,
            e_csum: d.e_csum,
            e_ip: d.e_ip,
            e_cs: d.e_cs,
            e_lfarlc: d.e_lfarlc,
            e_ovno: d.e_ovno,
            e_oemid: d.e_oemid,
            e_oeminfo: d.e_oeminfo,
            e_lfanew: d.e_lfanew,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileReport {
    pub machine: u16,
    pub number_of_sections: u16,
    pub time_date_stamp: u32,
    pub pointer_to_symbol_table: u32,
    pub number_of_symbols: u32,
    pub size_of_optional_header: u16,
    pub characteristics: u16,
    pub flags: Vec<String>,
}

impl FileReport {
    pub fn new(pe: &PeHeaders) -> Self {
        let f = pe.file_header();
        FileReport {
            machine: f.machine,
            number_of_sections: f.number_of_sections,
            time_date_stamp: f.time_date_stamp,
            pointer_to_symbol_table: f.pointer_to_symbol_table,
            number_of_symbols: f.number_of_symbols,
            size_of_optional_header: f.size_of_optional_header,
            characteristics: f.characteristics,
            flags: f.flags().iter_names().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

/// Optional header fields, widened so both variants share one shape.
#[derive(Debug, Serialize)]
pub struct OptionalReport {
    pub magic: u16,
    pub linker_version: String,
    pub size_of_code: u32,
    pub address_of_entry_point: u32,
    pub base_of_code: u32,
    pub base_of_data: Option<u32>,
    pub image_base: u64,
    pub section_alignment: u32,
    pub file_alignment: u32,
    pub os_version: String,
    pub subsystem_version: String,
    pub size_of_image: u32,
    pub size_of_headers: u32,
    pub check_sum: u32,
    pub subsystem: &'static str,
    pub dll_characteristics: Vec<String>,
    pub size_of_stack_reserve: u64,
    pub size_of_stack_commit: u64,
    pub size_of_heap_reserve: u64,
    pub size_of_heap_commit: u64,
    pub number_of_rva_and_sizes: u32,
}

impl OptionalReport {
    pub fn new(pe: &PeHeaders) -> Self {
        let dll_characteristics = pe
            .optional_header()
            .dll_characteristics()
            .iter_names()
            .map(|(name, _)| name.to_string())
            .collect();

        match pe.optional_header() {
            OptionalHeader::Pe32(h) => OptionalReport {
                magic: h.magic,
                linker_version: format!("{}.{}", h.major_linker_version, h.minor_linker_version),
                size_of_code: h.size_of_code,
                address_of_entry_point: h.address_of_entry_point,
                base_of_code: h.base_of_code,
                base_of_data: Some(h.base_of_data),
                image_base: u64::from(h.image_base),
                section_alignment: h.section_alignment,
                file_alignment: h.file_alignment,
                os_version: format!(
                    "{}.{}",
                    h.major_operating_system_version, h.minor_operating_system_version
                ),
                subsystem_version: format!(
                    "{}.{}",
                    h.major_subsystem_version, h.minor_subsystem_version
                ),
                size_of_image: h.size_of_image,
                size_of_headers: h.size_of_headers,
                check_sum: h.check_sum,
                subsystem: subsystem_name(h.subsystem),
                dll_characteristics,
                size_of_stack_reserve: u64::from(h.size_of_stack_reserve),
                size_of_stack_commit: u64::from(h.size_of_stack_commit),
                size_of_heap_reserve: u64::from(h.size_of_heap_reserve),
                size_of_heap_commit: u64::from(h.size_of_heap_commit),
                number_of_rva_and_sizes: h.number_of_rva_and_sizes,
            },
            OptionalHeader::Pe32Plus(h) => OptionalReport {
                magic: h.magic,
                linker_version: format!("{}.{}", h.major_linker_version, h.minor_linker_version),
                size_of_code: h.size_of_code,
                address_of_entry_point: h.address_of_entry_point,
                base_of_code: h.base_of_code,
                base_of_data: None,
                image_base: h.image_base,
                section_alignment: h.section_alignment,
                file_alignment: h.file_alignment,
                os_version: format!(
                    "{}.{}",
                    h.major_operating_system_version, h.minor_operating_system_version
                ),
                subsystem_version: format!(
                    "{}.{}",
                    h.major_subsystem_version, h.minor_subsystem_version
                ),
                size_of_image: h.size_of_image,
                size_of_headers: h.size_of_headers,
                check_sum: h.check_sum,
                subsystem: subsystem_name(h.subsystem),
                dll_characteristics,
                size_of_stack_reserve: h.size_of_stack_reserve,
                size_of_stack_commit: h.size_of_stack_commit,
                size_of_heap_reserve: h.size_of_heap_reserve,
                size_of_heap_commit: h.size_of_heap_commit,
                number_of_rva_and_sizes: h.number_of_rva_and_sizes,
            },
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct DirectoryRow {
    #[tabled(rename = "Directory")]
    pub name: &'static str,
    #[tabled(rename = "RVA", display = "hex32")]
    pub virtual_address: u32,
    #[tabled(rename = "Size", display = "hex32")]
    pub size: u32,
}

pub fn directory_rows(pe: &PeHeaders) -> Vec<DirectoryRow> {
    pe.optional_header()
        .data_directories()
        .iter()
        .map(|(kind, dir)| DirectoryRow {
            name: kind.name(),
            virtual_address: dir.virtual_address,
            size: dir.size,
        })
        .collect()
}

#[derive(Debug, Serialize, Tabled)]
pub struct SectionRow {
    #[tabled(rename = "Section")]
    pub name: String,
    #[tabled(rename = "VA", display = "hex32")]
    pub virtual_address: u32,
    #[tabled(rename = "VSize", display = "hex32")]
    pub virtual_size: u32,
    #[tabled(rename = "Raw", display = "hex32")]
    pub pointer_to_raw_data: u32,
    #[tabled(rename = "RawSize", display = "hex32")]
    pub size_of_raw_data: u32,
    #[tabled(rename = "Perms")]
    pub permissions: String,
    #[tabled(rename = "Flags", display = "hex32")]
    pub characteristics: u32,
}

impl From<&SectionHeader> for SectionRow {
    fn from(s: &SectionHeader) -> Self {
        SectionRow {
            name: s.name(),
            virtual_address: s.virtual_address,
            virtual_size: s.virtual_size,
            pointer_to_raw_data: s.pointer_to_raw_data,
            size_of_raw_data: s.size_of_raw_data,
            permissions: s.permissions(),
            characteristics: s.characteristics,
        }
    }
}

fn hex32(value: &u32) -> String {
    format!("{value:#x}")
}
