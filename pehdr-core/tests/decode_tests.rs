//! End-to-end decoding of synthesised images

mod common;

use common::ImageBuilder;
use pehdr_core::{DataDirectoryKind, Header, OptionalHeader, ParseOptions, PeHeaders};
use std::io::{Cursor, Seek, SeekFrom};

#[test]
fn test_minimal_pe32_image() {
    let img = ImageBuilder::pe32()
        .characteristics(0x0100)
        .section(b".text", 0x1000, 0x6000_0020)
        .build();
    assert_eq!(img.len(), 64 + 4 + 20 + 224 + 40);

    let pe = PeHeaders::from_bytes(&img).expect("minimal image should decode");
    assert!(pe.is_32bit_header());
    assert!(pe.optional_header32().is_some());
    assert!(pe.optional_header64().is_none());
    assert_eq!(pe.dos_header().e_lfanew, 64);
    assert!(pe.signature_is_valid());
    assert_eq!(pe.sections().len(), 1);
    assert_eq!(pe.sections()[0].name(), ".text");
}

#[test]
fn test_pe32_plus_image() {
    let img = ImageBuilder::pe32_plus()
        .section(b".text", 0x1000, 0x6000_0020)
        .section(b".rdata", 0x2000, 0x4000_0040)
        .section(b".data", 0x3000, 0xc000_0040)
        .build();

    let pe = PeHeaders::from_bytes(&img).unwrap();
    assert!(!pe.is_32bit_header());
    assert!(pe.optional_header32().is_none());

    let opt = pe.optional_header64().expect("PE32+ header");
    assert_eq!(opt.magic, 0x20b);
    assert_eq!(opt.image_base, 0x1_4000_0000);
    assert_eq!(opt.size_of_stack_reserve, 0x10_0000);
    assert_eq!(opt.number_of_rva_and_sizes, 16);

    assert_eq!(pe.format_name(), "PE32+");
    assert_eq!(pe.file_header().machine_name(), "amd64");
    assert_eq!(pe.entry_point(), 0x1_4000_1000);
}

#[test]
fn test_bitness_matches_populated_variant() {
    for characteristics in [0x0000u16, 0x0002, 0x0100, 0x0102, 0x2122, 0xfeff, 0xffff] {
        let img = ImageBuilder::pe32().characteristics(characteristics).build();
        let pe = PeHeaders::from_bytes(&img).unwrap();

        let is_32 = characteristics & 0x0100 == 0x0100;
        assert_eq!(pe.is_32bit_header(), is_32, "flags {characteristics:#06x}");
        assert_eq!(pe.optional_header32().is_some(), is_32);
        assert_eq!(pe.optional_header64().is_some(), !is_32);
        assert_eq!(
            matches!(pe.optional_header(), OptionalHeader::Pe32(_)),
            is_32
        );
    }
}

#[test]
fn test_section_count_and_order() {
    let img = ImageBuilder::pe32()
        .section(b".text", 0x1000, 0x6000_0020)
        .section(b".rdata", 0x2000, 0x4000_0040)
        .section(b".data", 0x3000, 0xc000_0040)
        .section(b".reloc", 0x4000, 0x4200_0040)
        .build();

    let pe = PeHeaders::from_bytes(&img).unwrap();
    assert_eq!(pe.sections().len(), pe.file_header().number_of_sections as usize);

    let names: Vec<String> = pe.sections().iter().map(|s| s.name()).collect();
    assert_eq!(names, [".text", ".rdata", ".data", ".reloc"]);

    let reloc = pe.section_by_name(".reloc").expect(".reloc present");
    assert_eq!(reloc.virtual_address, 0x4000);
    assert!(reloc.is_discardable());
    assert!(pe.section_by_name(".bss").is_none());

    let data = pe.section_by_name(".data").unwrap();
    assert!(data.is_writable());
    assert_eq!(data.permissions(), "rw-");
}

#[test]
fn test_no_sections() {
    let img = ImageBuilder::pe32().build();
    let pe = PeHeaders::from_bytes(&img).unwrap();
    assert!(pe.sections().is_empty());
    assert_eq!(pe.layout().section_table, pe.layout().end);
}

#[test]
fn test_decoding_is_deterministic() {
    let img = ImageBuilder::pe32_plus()
        .section(b".text", 0x1000, 0x6000_0020)
        .build();

    let first = PeHeaders::from_bytes(&img).unwrap();
    let second = PeHeaders::from_bytes(&img).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_stage_offsets_increase() {
    let img = ImageBuilder::pe32_plus()
        .stub(0x40)
        .section(b".text", 0x1000, 0x6000_0020)
        .section(b".pdata", 0x2000, 0x4000_0040)
        .build();

    let pe = PeHeaders::from_bytes(&img).unwrap();
    let layout = pe.layout();
    assert_eq!(layout.nt_headers, 0x80);
    assert!(layout.nt_headers >= 64);
    assert_eq!(layout.file_header, layout.nt_headers + 4);
    assert_eq!(layout.optional_header, layout.file_header + 20);
    assert_eq!(layout.section_table, layout.optional_header + 240);
    assert_eq!(layout.end, layout.section_table + 2 * 40);
    assert_eq!(layout.end, img.len() as u64);
}

#[test]
fn test_entry_point_near_top_of_address_space() {
    let img = ImageBuilder::pe32_plus()
        .image_base(0xFFFF_FFFF_FFFF_F000)
        .build();

    let pe = PeHeaders::from_bytes(&img).unwrap();
    assert_eq!(pe.optional_header().image_base(), 0xFFFF_FFFF_FFFF_F000);
    assert_eq!(pe.optional_header().address_of_entry_point(), 0x1000);
    assert_eq!(pe.entry_point(), 0);
}

#[test]
fn test_nt_headers_overlapping_dos_header() {
    // NT headers at 0x10; the optional header's BaseOfCode shares bytes with e_lfanew.
    let mut img = vec![0u8; 0x28 + 240];
    img[0..2].copy_from_slice(b"MZ");
    img[0x3C..0x40].copy_from_slice(&0x10u32.to_le_bytes());
    img[0x10..0x14].copy_from_slice(b"PE\0\0");
    img[0x14..0x16].copy_from_slice(&0x8664u16.to_le_bytes());
    img[0x24..0x26].copy_from_slice(&240u16.to_le_bytes());
    img[0x26..0x28].copy_from_slice(&0x0022u16.to_le_bytes());
    img[0x28..0x2A].copy_from_slice(&0x020Bu16.to_le_bytes());

    let pe = PeHeaders::from_bytes(&img).unwrap();
    assert_eq!(pe.dos_header().e_lfanew, 0x10);
    assert!(pe.signature_is_valid());
    assert!(!pe.is_32bit_header());
    assert_eq!(pe.layout().nt_headers, 0x10);
    assert_eq!(pe.layout().end, img.len() as u64);
    assert_eq!(pe.optional_header64().unwrap().base_of_code, 0x10);
    assert!(pe.sections().is_empty());
}

#[test]
fn test_parse_rewinds_the_reader() {
    let img = ImageBuilder::pe32().section(b".text", 0x1000, 0x20).build();
    let mut cursor = Cursor::new(img);
    cursor.seek(SeekFrom::Start(100)).unwrap();

    let pe = PeHeaders::parse(&mut cursor).unwrap();
    assert_eq!(pe.sections()[0].name(), ".text");
    assert_eq!(cursor.position(), pe.layout().end);
}

#[test]
fn test_optional_header_size_mismatch_is_tolerated() {
    let img = ImageBuilder::pe32()
        .size_of_optional_header(0xe8)
        .section(b".text", 0x1000, 0x20)
        .build();

    let pe = PeHeaders::from_bytes(&img).unwrap();
    assert_eq!(pe.file_header().size_of_optional_header, 0xe8);
    assert_eq!(pe.sections()[0].name(), ".text");
}

#[test]
fn test_timestamp() {
    let img = ImageBuilder::pe32().time_date_stamp(1_600_000_000).build();
    let pe = PeHeaders::from_bytes(&img).unwrap();

    assert_eq!(pe.file_header().time_date_stamp, 1_600_000_000);
    let ts = pe.timestamp().unwrap();
    assert_eq!(ts.timestamp(), 1_600_000_000);
    assert_eq!(ts.format("%Y-%m-%d").to_string(), "2020-09-13");
}

#[test]
fn test_data_directories_by_name() {
    let img = ImageBuilder::pe32().build();
    let pe = PeHeaders::from_bytes(&img).unwrap();

    let dirs = pe.optional_header().data_directories();
    assert_eq!(dirs.iter().count(), 16);
    assert!(!dirs.get(DataDirectoryKind::ClrRuntimeHeader).is_present());
}

#[test]
fn test_open_reads_from_disk() {
    let img = ImageBuilder::pe32()
        .section(b".text", 0x1000, 0x6000_0020)
        .build();
    let path = std::env::temp_dir().join(format!("pehdr-open-{}.exe", std::process::id()));
    std::fs::write(&path, &img).unwrap();

    let pe = PeHeaders::open(&path);
    let strict = PeHeaders::open_with(&path, &ParseOptions::strict());
    std::fs::remove_file(&path).unwrap();

    assert_eq!(pe.unwrap().sections()[0].name(), ".text");
    assert!(strict.is_ok());
}

#[cfg(windows)]
#[test]
fn test_current_exe_is_a_pe_image() {
    let pe = PeHeaders::current_exe().expect("test binary is a PE image");
    assert!(pe.signature_is_valid());
    assert!(pe.section_by_name(".text").is_some());
}
