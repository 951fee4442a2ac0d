mod report;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use log::LevelFilter;
use pehdr_core::{ParseOptions, PeHeaders};
use report::{DirectoryRow, DosReport, FileReport, OptionalReport, SectionRow, Summary};
use serde::Serialize;
use tabled::settings::Style;
use tabled::Table;

/// Simple PE header introspection CLI
#[derive(Parser)]
#[command(
    name = "pehdr",
    about = "Inspect PE/COFF headers (file header, optional header, sections)",
    version,
    author
)]
struct Cli {
    /// Path to the image; the running executable when omitted
    #[arg(short, long, value_name = "PATH")]
    file: Option<std::path::PathBuf>,

    /// Reject images without MZ / PE\0\0 signatures
    #[arg(long)]
    strict: bool,

    /// Skip bounds checks on e_lfanew and the section table
    #[arg(long)]
    no_offset_checks: bool,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Machine, bitness, build time and entry point
    Summary,
    /// Show the DOS header
    Dos,
    /// Show the COFF file header
    File,
    /// Show the optional header
    Optional,
    /// List the data directories
    Directories,
    /// List all sections
    Sections,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn field(label: &str, value: impl std::fmt::Display) {
    println!("{:<26} {}", label.bold(), value);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let opts = ParseOptions {
        strict_signature: cli.strict,
        validate_offsets: !cli.no_offset_checks,
    };

    let pe = match &cli.file {
        Some(path) => PeHeaders::open_with(path, &opts)
            .with_context(|| format!("failed to decode {}", path.display()))?,
        None => PeHeaders::current_exe_with(&opts)
            .context("failed to decode the running executable")?,
    };

    match cli.command {
        Command::Summary => {
            let summary = Summary::new(&pe);
            if cli.json {
                return print_json(&summary);
            }
            let bitness = if summary.is_32bit_header {
                "32-bit".yellow()
            } else {
                "64-bit".cyan()
            };
            field("Format", format!("{} ({})", summary.format, bitness));
            field("Machine", &summary.machine);
            if !summary.signature_valid {
                field("Signature", "not PE\\0\\0".red());
            }
            field(
                "Build time",
                summary.build_time.as_deref().unwrap_or("out of range"),
            );
            field("Entry point", &summary.entry_point);
            field("Image base", &summary.image_base);
            field("Subsystem", summary.subsystem);
            field("Sections", summary.number_of_sections);
        }

        Command::Dos => {
            let dos = DosReport::new(&pe);
            if cli.json {
                return print_json(&dos);
            }
            field("e_magic", format!("{:#06x}", dos.e_magic));
            field("e_cblp", dos.e_cblp);
            field("e_cp", dos.e_cp);
            field("e_crlc", dos.e_crlc);
            field("e_cparhdr", dos.e_cparhdr);
            field("e_minalloc", dos.e_minalloc);
            field("e_maxalloc", dos.e_maxalloc);
            field("e_ss", format!("{:#x}", dos.e_ss));
            field("e_sp", format!("{:#x}", dos.e_sp));
            field("e_csum", format!("{:#x}", dos.e_csum));
            field("e_ip", format!("{:#x}", dos.e_ip));
            field("e_cs", format!("{:#x}", dos.e_cs));
            field("e_lfarlc", format!("{:#x}", dos.e_lfarlc));
            field("e_ovno", dos.e_ovno);
            field("e_oemid", dos.e_oemid);
            field("e_oeminfo", dos.e_oeminfo);
            field("e_lfanew", format!("{:#x}", dos.e_lfanew));
        }

        Command::File => {
            let file = FileReport::new(&pe);
            if cli.json {
                return print_json(&file);
            }
            field("Machine", format!("{:#06x}", file.machine));
            field("NumberOfSections", file.number_of_sections);
            field("TimeDateStamp", format!("{:#010x}", file.time_date_stamp));
            field("PointerToSymbolTable", format!("{:#x}", file.pointer_to_symbol_table));
            field("NumberOfSymbols", file.number_of_symbols);
            field("SizeOfOptionalHeader", file.size_of_optional_header);
            field(
                "Characteristics",
                format!("{:#06x} {}", file.characteristics, file.flags.join(" | ")),
            );
        }

        Command::Optional => {
            let opt = OptionalReport::new(&pe);
            if cli.json {
                return print_json(&opt);
            }
            field("Magic", format!("{:#x}", opt.magic));
            field("LinkerVersion", &opt.linker_version);
            field("SizeOfCode", format!("{:#x}", opt.size_of_code));
            field("AddressOfEntryPoint", format!("{:#x}", opt.address_of_entry_point));
            field("BaseOfCode", format!("{:#x}", opt.base_of_code));
            if let Some(base_of_data) = opt.base_of_data {
                field("BaseOfData", format!("{:#x}", base_of_data));
            }
            field("ImageBase", format!("{:#x}", opt.image_base));
            field("SectionAlignment", format!("{:#x}", opt.section_alignment));
            field("FileAlignment", format!("{:#x}", opt.file_alignment));
            field("OperatingSystemVersion", &opt.os_version);
            field("SubsystemVersion", &opt.subsystem_version);
            field("SizeOfImage", format!("{:#x}", opt.size_of_image));
            field("SizeOfHeaders", format!("{:#x}", opt.size_of_headers));
            field("CheckSum", format!("{:#x}", opt.check_sum));
            field("Subsystem", opt.subsystem);
            field("DllCharacteristics", opt.dll_characteristics.join(" | "));
            field("SizeOfStackReserve", format!("{:#x}", opt.size_of_stack_reserve));
            field("SizeOfStackCommit", format!("{:#x}", opt.size_of_stack_commit));
            field("SizeOfHeapReserve", format!("{:#x}", opt.size_of_heap_reserve));
            field("SizeOfHeapCommit", format!("{:#x}", opt.size_of_heap_commit));
            field("NumberOfRvaAndSizes", opt.number_of_rva_and_sizes);
        }

        Command::Directories => {
            let rows: Vec<DirectoryRow> = report::directory_rows(&pe);
            if cli.json {
                return print_json(&rows);
            }
            println!("{}", Table::new(&rows).with(Style::sharp()));
        }

        Command::Sections => {
            let rows: Vec<SectionRow> = pe.sections().iter().map(SectionRow::from).collect();
            if cli.json {
                return print_json(&rows);
            }
            if rows.is_empty() {
                println!("No sections found.");
            } else {
                println!("{}", Table::new(&rows).with(Style::sharp()));
            }
        }
    }

    Ok(())
}
