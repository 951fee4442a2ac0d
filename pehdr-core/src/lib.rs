//! Decoding of the header region of PE/COFF images: the DOS stub header, the
//! COFF file header, the PE32 or PE32+ optional header and the section table.
//!
//! ```no_run
//! use pehdr_core::PeHeaders;
//!
//! let pe = PeHeaders::open("app.exe")?;
//! println!("32-bit: {}", pe.is_32bit_header());
//! for section in pe.sections() {
//!     println!("{} at {:#x}", section.name(), section.virtual_address);
//! }
//! # Ok::<(), pehdr_core::HeaderError>(())
//! ```

pub mod error;
pub mod header;
pub mod pe;
pub mod record;

pub use error::{HeaderError, Result};
pub use header::dos::DosHeader;
pub use header::file::{FileCharacteristics, FileHeader};
pub use header::optional::{
    DataDirectories, DataDirectory, DataDirectoryKind, DllCharacteristics, OptionalHeader,
    OptionalHeader32, OptionalHeader64,
};
pub use header::section::{SectionCharacteristics, SectionHeader};
pub use header::Header;
pub use pe::{HeaderLayout, ParseOptions, PeHeaders, PE_SIGNATURE};
