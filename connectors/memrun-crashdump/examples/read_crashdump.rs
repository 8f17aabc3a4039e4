/// Prints the physical memory layout of a crash dump
use clap::{crate_authors, crate_version, Arg, ArgAction, ArgMatches, Command};
use log::Level;

use memrun_core::*;
use memrun_crashdump::{create_detector, CrashDump};

fn main() -> Result<()> {
    let matches = parse_args();
    let args = extract_args(&matches)?;

    let (mut dump, scanner) = create_detector(&args)?;
    if !dump.is_supported_format(&DetectContext::new(scanner.as_ref()))? {
        println!("{} is not a crash dump", dump.path().display());
        return Ok(());
    }

    print_layout(&dump)?;

    if let Some(addr) = matches.get_one::<String>("read") {
        let addr = parse_addr(addr)?;
        let mut buf = [0u8; 0x40];
        dump.open_physical()?.phys_read(addr, &mut buf)?;
        println!("{:x}: {:02x?}", addr, buf);
    }

    Ok(())
}

fn print_layout(dump: &CrashDump) -> Result<()> {
    println!(
        "file size: 0x{:x} ({} pages)",
        dump.file_size(),
        dump.max_page_count()
    );

    if let Some(logical) = dump.logical_phys_mem_desc() {
        println!("logical runs: {}", logical.runs().len());
    }

    let desc = dump
        .phys_mem_desc()
        .ok_or(Error(ErrorOrigin::CrashDump, ErrorKind::NotFound))?;
    println!(
        "start of memory: 0x{:x} runs: {} pages: 0x{:x}",
        desc.start_of_memory(),
        desc.number_of_runs(),
        desc.number_of_pages()
    );

    println!("{:>11} {:>11}", "BASE", "PAGES");
    for run in desc.runs() {
        println!("0x{:0>8x} 0x{:0>8x}", run.base_page(), run.page_count());
    }

    println!("{:?}", MemoryMap::from_descriptor(desc)?);
    Ok(())
}

fn parse_args() -> ArgMatches {
    Command::new("read_crashdump example")
        .version(crate_version!())
        .author(crate_authors!())
        .arg(Arg::new("verbose").short('v').action(ArgAction::Count))
        .arg(Arg::new("file").action(ArgAction::Set).required(true))
        .arg(
            Arg::new("memmap")
                .long("memmap")
                .short('m')
                .action(ArgAction::Set)
                .required(false),
        )
        .arg(
            Arg::new("scanner")
                .long("scanner")
                .short('s')
                .action(ArgAction::Set)
                .value_parser(["linear", "none"])
                .required(false),
        )
        .arg(
            Arg::new("read")
                .long("read")
                .short('r')
                .action(ArgAction::Set)
                .required(false),
        )
        .get_matches()
}

fn extract_args(matches: &ArgMatches) -> Result<DetectorArgs> {
    let log_level = match matches.get_count("verbose") {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        3 => Level::Debug,
        _ => Level::Trace,
    };
    simplelog::TermLogger::init(
        log_level.to_level_filter(),
        simplelog::Config::default(),
        simplelog::TerminalMode::Stdout,
        simplelog::ColorChoice::Auto,
    )
    .unwrap();

    let mut args = DetectorArgs::with_default(matches.get_one::<String>("file").unwrap());
    if let Some(memmap) = matches.get_one::<String>("memmap") {
        args = args.insert("memmap", memmap);
    }
    if let Some(scanner) = matches.get_one::<String>("scanner") {
        args = args.insert("scanner", scanner);
    }
    Ok(args)
}

fn parse_addr(addr: &str) -> Result<u64> {
    let addr = addr.trim_start_matches("0x");
    u64::from_str_radix(addr, 16)
        .map_err(|err| Error(ErrorOrigin::Args, ErrorKind::ArgValidation).log_error(err))
}
