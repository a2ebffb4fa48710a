use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use cinder_cli::{compile_source, output_path, write_assembly, WriteMode, MAX_SOURCE_SIZE};
use cinder_codegen::{GenOptions, ParamBinding};
use cinder_parse::{parse_str, tokenize};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "cinder")]
#[command(about = "Cinder: compile a small C subset to x86-64 assembly")]
struct Cli {
    /// Log compiler stages to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a source file to assembly
    Compile {
        /// Path to the source file; prompted for when omitted
        file: Option<PathBuf>,

        /// Output path (defaults to the input with an .asm extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the assembly instead of writing a file
        #[arg(long, conflicts_with_all = ["output", "overwrite"])]
        stdout: bool,

        /// Truncate the output file instead of appending to it
        #[arg(long)]
        overwrite: bool,

        /// Read parameters straight from the argument registers
        #[arg(long)]
        register_params: bool,
    },

    /// Lex a source file and dump the tokens
    Tokens {
        /// Path to the source file
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },

    /// Parse a source file and dump the AST
    Parse {
        /// Path to the source file
        file: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Pretty)]
        format: Format,
    },
}

#[derive(ValueEnum, Clone, Debug)]
enum Format {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Compile {
            file,
            output,
            stdout,
            overwrite,
            register_params,
        } => {
            let file = match file {
                Some(file) => file,
                None => prompt_for_file()?,
            };
            let options = GenOptions {
                param_binding: if register_params {
                    ParamBinding::Register
                } else {
                    ParamBinding::Spill
                },
            };
            let mode = if overwrite {
                WriteMode::Overwrite
            } else {
                WriteMode::Append
            };
            cmd_compile(&file, output, stdout, mode, options)
        }
        Commands::Tokens { file, format } => cmd_tokens(&file, format),
        Commands::Parse { file, format } => cmd_parse(&file, format),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn prompt_for_file() -> Result<PathBuf> {
    print!("Enter the file name you want to compile : ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let name = line.trim();
    if name.is_empty() {
        bail!("no input file given");
    }
    Ok(PathBuf::from(name))
}

fn read_source(path: &Path) -> Result<String> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read '{}'", path.display()))?;

    if src.len() > MAX_SOURCE_SIZE {
        bail!(
            "source file exceeds {}MB limit ({} bytes)",
            MAX_SOURCE_SIZE / 1_000_000,
            src.len()
        );
    }
    Ok(src)
}

fn cmd_compile(
    file: &Path,
    output: Option<PathBuf>,
    to_stdout: bool,
    mode: WriteMode,
    options: GenOptions,
) -> Result<()> {
    let src = read_source(file)?;
    let name = file.display().to_string();
    let asm =
        compile_source(&name, &src, options).map_err(|e| anyhow!("{}: {}", e.kind(), e))?;

    if to_stdout {
        print!("{asm}");
        return Ok(());
    }

    let out = output.unwrap_or_else(|| output_path(file));
    tracing::info!(output = %out.display(), ?mode, "writing assembly");
    write_assembly(&out, &asm, mode)
        .with_context(|| format!("failed to write '{}'", out.display()))?;
    println!("Assembly Completed");
    Ok(())
}

fn cmd_tokens(file: &Path, format: Format) -> Result<()> {
    let src = read_source(file)?;
    let tokens = tokenize(&src).map_err(|e| anyhow!("lexical error: {e}"))?;

    match format {
        Format::Pretty => {
            for token in &tokens {
                println!("{:<12} {}", format!("{:?}", token.kind), token.text);
            }
        }
        Format::Json => println!("{}", serde_json::to_string_pretty(&tokens)?),
    }
    Ok(())
}

fn cmd_parse(file: &Path, format: Format) -> Result<()> {
    let src = read_source(file)?;
    let name = file.display().to_string();
    let program = parse_str(&name, &src).map_err(|e| {
        let kind = if e.is_lexical() { "lexical" } else { "syntax" };
        anyhow!("{kind} error: {e}")
    })?;

    match format {
        Format::Pretty => println!("{:#?}", program),
        Format::Json => println!("{}", serde_json::to_string_pretty(&program)?),
    }
    Ok(())
}
