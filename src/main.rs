//! wdl2cwl CLI
//!
//! Converts WDL workflows to CWL. Input is a parsed syntax tree per source
//! file (the external parser's JSON AST dump), or a directory of them; output
//! is one `.cwl` file per top-level WDL construct. A failure in one file is
//! logged and does not abort processing of its siblings.

use std::path::{Path, PathBuf};
use std::process;

use tracing::error;
use tracing_subscriber::EnvFilter;
use wdl2cwl::{convert_document, render, ConvertError, SyntaxNode, WdlVersion};

/// CLI arguments structure
struct Args {
    /// Parsed WDL syntax tree (JSON), or a directory of them
    input: PathBuf,
    /// WDL grammar version the trees were parsed with
    version: WdlVersion,
    /// Directory to store generated CWL files
    directory: Option<PathBuf>,
    /// Do not print generated files to stdout
    quiet: bool,
    /// Do not create a separate folder per source file
    no_folder: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let args = parse_args();
    if let Err(e) = run(args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn parse_args() -> Args {
    let raw: Vec<String> = std::env::args().collect();
    if raw.len() < 2 {
        print_help(&raw[0]);
        process::exit(1);
    }

    let mut input = None;
    let mut version = WdlVersion::Draft2;
    let mut directory = None;
    let mut quiet = false;
    let mut no_folder = false;

    let mut i = 1;
    while i < raw.len() {
        match raw[i].as_str() {
            "-h" | "--help" => {
                print_help(&raw[0]);
                process::exit(0);
            }
            "--wdl-version" => {
                i += 1;
                match raw.get(i).map(|v| v.parse::<WdlVersion>()) {
                    Some(Ok(parsed)) => version = parsed,
                    Some(Err(e)) => {
                        eprintln!("Error: {}", e);
                        process::exit(1);
                    }
                    None => {
                        eprintln!("Error: --wdl-version requires a value");
                        process::exit(1);
                    }
                }
            }
            "-d" | "--directory" => {
                i += 1;
                if let Some(value) = raw.get(i) {
                    directory = Some(PathBuf::from(value));
                } else {
                    eprintln!("Error: --directory requires a path");
                    process::exit(1);
                }
            }
            "-q" | "--quiet" => quiet = true,
            "--no-folder" => no_folder = true,
            other if input.is_none() && !other.starts_with('-') => {
                input = Some(PathBuf::from(other));
            }
            other => {
                eprintln!("Error: unexpected argument '{}'", other);
                process::exit(1);
            }
        }
        i += 1;
    }

    match input {
        Some(input) => Args {
            input,
            version,
            directory,
            quiet,
            no_folder,
        },
        None => {
            print_help(&raw[0]);
            process::exit(1);
        }
    }
}

fn print_help(program: &str) {
    println!("Convert a WDL workflow to CWL");
    println!();
    println!("Usage: {} <tree.json | directory> [options]", program);
    println!();
    println!("The input is the external WDL parser's JSON AST dump, one per");
    println!("source file, or a directory containing such files.");
    println!();
    println!("Options:");
    println!("  --wdl-version <v>    WDL grammar version: draft-2 (default) or 1.0");
    println!("  -d, --directory <d>  Directory to store generated CWL files");
    println!("  -q, --quiet          Do not print generated files to stdout");
    println!("  --no-folder          Do not create a separate folder per source file");
    println!("  -h, --help           Show this help");
}

fn run(args: Args) -> Result<(), ConvertError> {
    let out_dir = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };

    if args.input.is_dir() {
        // per-file failures are isolated: log and continue with siblings
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&args.input)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();
        for path in entries {
            if let Err(e) = process_file(&path, &args, &out_dir) {
                error!("error while processing file {}: {}", path.display(), e);
            }
        }
        Ok(())
    } else {
        process_file(&args.input, &args, &out_dir)
    }
}

fn process_file(path: &Path, args: &Args, out_dir: &Path) -> Result<(), ConvertError> {
    let text = std::fs::read_to_string(path)?;
    let tree = SyntaxNode::from_json(&text)?;
    let converted = convert_document(&tree, args.version)?;

    let target = if args.no_folder {
        out_dir.to_path_buf()
    } else {
        out_dir.join(source_stem(path))
    };
    render::export(&converted, &target, args.quiet)
}

/// The source file's name without `.json` / `.wdl.json` suffixes, used as
/// the per-file output folder name.
fn source_stem(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.trim_end_matches(".json")
        .trim_end_matches(".wdl")
        .to_string()
}
