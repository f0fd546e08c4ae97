//! Command-line entry point for the Kea symbol demangler.
//!
//! With positional names, demangles each and prints one line per name.
//! Without, scans stdin as free text and rewrites manglings in place,
//! which makes it pipeable: `nm app | kea-demangle`.

use std::io::BufRead;

use kea_demangle::{
    init_tracing, is_blank_argument, parse_args, process_name, scan_line, NameOutput, ToolOptions,
};

fn main() {
    init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "help" || arg == "--help" || arg == "-h") {
        print_usage();
        return;
    }
    let (options, names) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };
    if names.is_empty() {
        scan_stdin(&options);
        return;
    }
    for name in &names {
        if is_blank_argument(name) {
            eprintln!("warning: blank argument (likely shell variable expansion)");
            continue;
        }
        emit(process_name(name, &options));
    }
}

fn scan_stdin(options: &ToolOptions) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        match line {
            Ok(line) => emit(scan_line(&line, options)),
            Err(err) => {
                eprintln!("error: failed to read stdin: {err}");
                std::process::exit(1);
            }
        }
    }
}

fn emit(output: NameOutput) {
    match output {
        NameOutput::Text(text) => println!("{text}"),
        NameOutput::Mismatch {
            remangled,
            original,
        } => {
            eprintln!(
                "Error: re-mangled name '{remangled}' does not match original name '{original}'"
            );
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Kea symbol demangler");
    println!();
    println!("Usage: kea-demangle [flags] [mangled names...]");
    println!();
    println!("With no names, stdin is scanned and manglings are rewritten in place.");
    println!();
    println!("Flags:");
    println!("  -expand                Print the node tree before each demangling");
    println!("  -compact               Print the demangled text alone");
    println!("  -tree-only             Print the node tree alone");
    println!("  -type                  Treat names as bare type manglings");
    println!("  -no-sugar              Spell out Optional, Array and Dictionary");
    println!("  -simplified            Abbreviated output (no argument types)");
    println!("  -strip-specialization  Remangle the origin of a specialized function");
    println!("  -test-remangle         Remangle each name and fail on any difference");
    println!("  -remangle-legacy       Emit the _Tt runtime form where possible");
    println!("  -remangle-new          Remangle each name into its canonical spelling");
    println!("  -classify              Annotate demanglings with a {{...}} column");
    println!("  help                   Show this help message");
    println!();
    println!("KEA_LOG=kea_mangle=debug enables decoder diagnostics.");
}
