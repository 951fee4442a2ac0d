#![allow(dead_code)]

pub const DOS_HEADER_SIZE: usize = 64;
pub const FILE_HEADER_SIZE: usize = 20;
pub const OPTIONAL32_SIZE: usize = 224;
pub const OPTIONAL64_SIZE: usize = 240;
pub const SECTION_SIZE: usize = 40;

pub struct SectionSpec {
    pub name: Vec<u8>,
    pub virtual_address: u32,
    pub virtual_size: u32,
    pub characteristics: u32,
}

/// Synthesises the header region of a PE image byte by byte.
pub struct ImageBuilder {
    e_lfanew: u32,
    stub_len: usize,
    machine: u16,
    time_date_stamp: u32,
    characteristics: u16,
    size_of_optional_header: Option<u16>,
    number_of_sections: Option<u16>,
    entry_point: u32,
    image_base: u64,
    sections: Vec<SectionSpec>,
}

impl ImageBuilder {
    pub fn pe32() -> Self {
        Self {
            e_lfanew: DOS_HEADER_SIZE as u32,
            stub_len: 0,
            machine: 0x14c,
            time_date_stamp: 0x5f5e_1000,
            characteristics: 0x0102,
            size_of_optional_header: None,
            number_of_sections: None,
            entry_point: 0x1000,
            image_base: 0x0040_0000,
            sections: Vec::new(),
        }
    }

    pub fn pe32_plus() -> Self {
        Self {
            machine: 0x8664,
            characteristics: 0x0022,
            image_base: 0x1_4000_0000,
            ..Self::pe32()
        }
    }

    /// Places `len` filler bytes between the DOS header and the NT headers.
    pub fn stub(mut self, len: usize) -> Self {
        self.stub_len = len;
        self.e_lfanew = (DOS_HEADER_SIZE + len) as u32;
        self
    }

    pub fn e_lfanew(mut self, e_lfanew: u32) -> Self {
        self.e_lfanew = e_lfanew;
        self
    }

    pub fn image_base(mut self, image_base: u64) -> Self {
        self.image_base = image_base;
        self
    }

    pub fn characteristics(mut self, characteristics: u16) -> Self {
        self.characteristics = characteristics;
        self
    }

    pub fn time_date_stamp(mut self, stamp: u32) -> Self {
        self.time_date_stamp = stamp;
        self
    }

    pub fn size_of_optional_header(mut self, size: u16) -> Self {
        self.size_of_optional_header = Some(size);
        self
    }

    /// Overrides the section count written to the file header without adding
    /// section records.
    pub fn declared_sections(mut self, count: u16) -> Self {
        self.number_of_sections = Some(count);
        self
    }

    pub fn section(mut self, name: &[u8], virtual_address: u32, characteristics: u32) -> Self {
        self.sections.push(SectionSpec {
            name: name.to_vec(),
            virtual_address,
            virtual_size: 0x200,
            characteristics,
        });
        self
    }

    fn is_32bit(&self) -> bool {
        self.characteristics & 0x0100 != 0
    }

    pub fn build(&self) -> Vec<u8> {
        let mut img = vec![0u8; DOS_HEADER_SIZE];
        img[0..2].copy_from_slice(b"MZ");
        img[60..64].copy_from_slice(&self.e_lfanew.to_le_bytes());
        img.resize(DOS_HEADER_SIZE + self.stub_len, 0xcc);

        if self.e_lfanew as usize != img.len() {
            // NT headers are only emitted right after the stub
            return img;
        }

        img.extend_from_slice(b"PE\0\0");

        let optional_size = if self.is_32bit() {
            OPTIONAL32_SIZE
        } else {
            OPTIONAL64_SIZE
        };
        let count = self
            .number_of_sections
            .unwrap_or(self.sections.len() as u16);

        img.extend_from_slice(&self.machine.to_le_bytes());
        img.extend_from_slice(&count.to_le_bytes());
        img.extend_from_slice(&self.time_date_stamp.to_le_bytes());
        img.extend_from_slice(&0u32.to_le_bytes());
        img.extend_from_slice(&0u32.to_le_bytes());
        img.extend_from_slice(
            &self
                .size_of_optional_header
                .unwrap_or(optional_size as u16)
                .to_le_bytes(),
        );
        img.extend_from_slice(&self.characteristics.to_le_bytes());

        let mut opt = vec![0u8; optional_size];
        if self.is_32bit() {
            opt[0..2].copy_from_slice(&0x10bu16.to_le_bytes());
            opt[16..20].copy_from_slice(&self.entry_point.to_le_bytes());
            opt[28..32].copy_from_slice(&(self.image_base as u32).to_le_bytes());
            opt[68..70].copy_from_slice(&3u16.to_le_bytes());
            opt[72..76].copy_from_slice(&0x10_0000u32.to_le_bytes());
            opt[92..96].copy_from_slice(&16u32.to_le_bytes());
        } else {
            opt[0..2].copy_from_slice(&0x20bu16.to_le_bytes());
            opt[16..20].copy_from_slice(&self.entry_point.to_le_bytes());
            opt[24..32].copy_from_slice(&self.image_base.to_le_bytes());
            opt[68..70].copy_from_slice(&2u16.to_le_bytes());
            opt[72..80].copy_from_slice(&0x10_0000u64.to_le_bytes());
            opt[108..112].copy_from_slice(&16u32.to_le_bytes());
        }
        img.extend_from_slice(&opt);

        for spec in &self.sections {
            let mut sec = [0u8; SECTION_SIZE];
            sec[..spec.name.len()].copy_from_slice(&spec.name);
            sec[8..12].copy_from_slice(&spec.virtual_size.to_le_bytes());
            sec[12..16].copy_from_slice(&spec.virtual_address.to_le_bytes());
            sec[36..40].copy_from_slice(&spec.characteristics.to_le_bytes());
            img.extend_from_slice(&sec);
        }
        img
    }
}
