// Command-line front end: apply, parse, analyze.
//
// `apply` reconstructs a target from a base document and a delta.
// `parse` prints a delta's structure; `analyze` additionally hexdumps
// the data each instruction touches, using the base document for COPY
// ranges.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::decoder::{Instruction, InstructionIterator};
use crate::header::{self, VCD_ADLER32, VCD_SOURCE, Window};
use crate::io::{apply_files, hex_digest};

// ---------------------------------------------------------------------------
// Clap definition
// ---------------------------------------------------------------------------

/// VCDIFF (RFC 3284) delta decoder and inspector.
#[derive(Parser, Debug)]
#[command(
    name = "vcdec",
    version,
    about = "VCDIFF delta decoder and inspector",
    arg_required_else_help = true
)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,

    /// Force overwrite existing output files.
    #[arg(short = 'f', long, global = true)]
    force: bool,

    /// Quiet mode (suppress non-error output).
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode (use multiple times for more detail).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Output stats as JSON to stderr.
    #[arg(long = "json", global = true)]
    json_output: bool,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Apply a delta to a base document.
    Apply(ApplyArgs),
    /// Print a human-readable view of a delta.
    Parse(ParseArgs),
    /// Print a delta with hexdumps of the data it references.
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Base document the delta applies to (omit for an empty source).
    #[arg(short = 'b', long, value_hint = ValueHint::FilePath)]
    base: Option<PathBuf>,

    /// VCDIFF delta file.
    #[arg(short = 'd', long, value_hint = ValueHint::FilePath)]
    delta: PathBuf,

    /// Output file (default: stdout).
    #[arg(short = 'o', long, value_hint = ValueHint::FilePath)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ParseArgs {
    /// VCDIFF delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Base document referenced by the delta's COPY instructions.
    #[arg(short = 'b', long, value_hint = ValueHint::FilePath)]
    base: PathBuf,

    /// VCDIFF delta file.
    #[arg(value_hint = ValueHint::FilePath)]
    delta: PathBuf,
}

// ---------------------------------------------------------------------------
// apply
// ---------------------------------------------------------------------------

fn cmd_apply(cli: &Cli, args: &ApplyArgs) -> i32 {
    let (output, stats) = match apply_files(args.base.as_deref(), &args.delta) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("vcdec: apply: {e}");
            return 1;
        }
    };

    match &args.output {
        Some(path) => {
            if path.exists() && !cli.force {
                eprintln!(
                    "vcdec: output file exists, use -f to overwrite: {}",
                    path.display()
                );
                return 1;
            }
            if let Err(e) = fs::write(path, &output) {
                eprintln!("vcdec: output file: {}: {e}", path.display());
                return 1;
            }
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            if let Err(e) = stdout.write_all(&output).and_then(|()| stdout.flush()) {
                eprintln!("vcdec: write error: {e}");
                return 1;
            }
        }
    }

    if cli.verbose > 0 && !cli.quiet {
        eprintln!(
            "vcdec: applied {} windows, output size: {}",
            stats.windows, stats.output_size
        );
    }
    if cli.json_output {
        let json = serde_json::json!({
            "command": "apply",
            "output_size": stats.output_size,
            "windows": stats.windows,
            "output_sha256": hex_digest(&stats.output_sha256),
        });
        eprintln!("{}", serde_json::to_string_pretty(&json).unwrap());
    }

    0
}

// ---------------------------------------------------------------------------
// parse / analyze
// ---------------------------------------------------------------------------

fn win_flags(win_indicator: u8) -> String {
    let mut flags = Vec::new();
    if win_indicator & VCD_SOURCE != 0 {
        flags.push("VCD_SOURCE");
    }
    if win_indicator & VCD_ADLER32 != 0 {
        flags.push("VCD_ADLER32");
    }
    if flags.is_empty() {
        "none".to_string()
    } else {
        flags.join(" ")
    }
}

fn print_window_header(num: usize, target_offset: u64, w: &Window<'_>) {
    if num > 0 {
        println!();
    }
    println!("VCDIFF window number:         {num}");
    println!(
        "VCDIFF window indicator:      {:#04X} ({})",
        w.win_indicator,
        win_flags(w.win_indicator)
    );
    if w.has_source() {
        println!("VCDIFF source segment size:   {}", w.source_segment_size);
        println!(
            "VCDIFF source segment offset: {}",
            w.source_segment_position
        );
    }
    if target_offset > 0 {
        println!("VCDIFF window at offset:      {target_offset}");
    }
    println!("VCDIFF delta encoding length: {}", w.delta_encoding_len);
    println!("VCDIFF target window length:  {}", w.target_window_len);
    println!("VCDIFF data section length:   {}", w.data.len());
    println!("VCDIFF inst section length:   {}", w.inst.len());
    println!("VCDIFF addr section length:   {}", w.addr.len());
    if let Some(cksum) = w.checksum {
        println!("VCDIFF adler32 checksum:      {cksum:08X}");
    }
}

/// One `offset TYPE size addr` listing line per instruction.
fn print_instruction_line(offset: u64, w: &Window<'_>, inst: &Instruction) {
    match inst {
        Instruction::Add { data } => println!("  {offset:06}     ADD  {:6}", data.len()),
        Instruction::Run { len, byte } => println!("  {offset:06}     RUN  {len:6} {byte:#04X}"),
        Instruction::Copy { len, addr, .. } => {
            // Source segments always parse with size 0 when absent, so
            // addresses below src_len are source reads.
            let src_len = u64::from(w.source_segment_size);
            let addr_str = if *addr < src_len {
                format!("S@{}", u64::from(w.source_segment_position) + addr)
            } else {
                format!("T@{}", addr - src_len)
            };
            println!("  {offset:06}     CPY  {len:6} {addr_str}");
        }
    }
}

fn cmd_parse(args: &ParseArgs) -> i32 {
    let delta = match fs::read(&args.delta) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("vcdec: {}: {e}", args.delta.display());
            return 1;
        }
    };

    let (_, windows) = match header::parse_windows(&delta) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("vcdec: invalid delta: {e}");
            return 1;
        }
    };

    println!("VCDIFF version:               0");
    println!("VCDIFF header indicator:      none");
    println!("VCDIFF window count:          {}", windows.len());

    let mut target_offset: u64 = 0;
    for (num, w) in windows.iter().enumerate() {
        print_window_header(num, target_offset, w);

        println!("  Offset     Type   Size Addr");
        let mut offset = target_offset;
        for result in InstructionIterator::new(w) {
            match result {
                Ok(inst) => {
                    print_instruction_line(offset, w, &inst);
                    offset += u64::from(inst.size());
                }
                Err(e) => {
                    eprintln!("vcdec: window {num}: instruction decode: {e}");
                    return 1;
                }
            }
        }

        target_offset += u64::from(w.target_window_len);
    }

    0
}

fn cmd_analyze(args: &AnalyzeArgs) -> i32 {
    let base = match fs::read(&args.base) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("vcdec: base file: {}: {e}", args.base.display());
            return 1;
        }
    };
    let delta = match fs::read(&args.delta) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("vcdec: {}: {e}", args.delta.display());
            return 1;
        }
    };

    let (_, windows) = match header::parse_windows(&delta) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("vcdec: invalid delta: {e}");
            return 1;
        }
    };

    let mut target_offset: u64 = 0;
    let mut inst_num = 0usize;
    for (num, w) in windows.iter().enumerate() {
        print_window_header(num, target_offset, w);
        println!();

        for result in InstructionIterator::new(w) {
            let inst = match result {
                Ok(inst) => inst,
                Err(e) => {
                    eprintln!("vcdec: window {num}: instruction decode: {e}");
                    return 1;
                }
            };

            inst_num += 1;
            println!("Instruction {inst_num}:");
            match &inst {
                Instruction::Add { data } => {
                    println!("  Type: ADD");
                    println!("  Size: {}", data.len());
                    println!("  Data:");
                    hexdump(data, 0);
                }
                Instruction::Run { len, byte } => {
                    println!("  Type: RUN");
                    println!("  Size: {len}");
                    println!("  Byte: {byte:#04X}");
                }
                Instruction::Copy { len, addr, mode } => {
                    println!("  Type: COPY");
                    println!("  Mode: {mode}");
                    println!("  Size: {len}");
                    println!("  Addr: {addr}");
                    let src_len = u64::from(w.source_segment_size);
                    if *addr < src_len {
                        let start = (u64::from(w.source_segment_position) + addr) as usize;
                        let end = (start + *len as usize).min(base.len());
                        if start <= base.len() {
                            println!("  Data from base [{start:#X}..{end:#X}]:");
                            hexdump(&base[start..end], start);
                        } else {
                            println!("  Data: <address outside base file>");
                        }
                    } else {
                        println!("  Data: <target window, offset {}>", addr - src_len);
                    }
                }
            }
            println!();
        }

        target_offset += u64::from(w.target_window_len);
    }

    0
}

/// Classic 16-bytes-per-line hexdump with an ASCII gutter.
fn hexdump(data: &[u8], base_offset: usize) {
    const BYTES_PER_LINE: usize = 16;

    for (i, line) in data.chunks(BYTES_PER_LINE).enumerate() {
        print!("    {:08x}  ", base_offset + i * BYTES_PER_LINE);
        for j in 0..BYTES_PER_LINE {
            match line.get(j) {
                Some(b) => print!("{b:02x} "),
                None => print!("   "),
            }
            if j == 7 {
                print!(" ");
            }
        }
        print!(" |");
        for &b in line {
            if (32..=126).contains(&b) {
                print!("{}", b as char);
            } else {
                print!(".");
            }
        }
        println!("|");
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Try to parse an argument vector; used by the CLI fuzz target.
pub fn fuzz_try_parse_args(args: &[String]) {
    let argv = std::iter::once("vcdec".to_string()).chain(args.iter().cloned());
    let _ = Cli::try_parse_from(argv);
}

/// Main CLI entry point. Parses arguments, dispatches, exits.
pub fn run() -> ! {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    let cli = Cli::parse();
    let exit_code = match &cli.command {
        Cmd::Apply(args) => cmd_apply(&cli, args),
        Cmd::Parse(args) => cmd_parse(args),
        Cmd::Analyze(args) => cmd_analyze(args),
    };

    process::exit(exit_code);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
