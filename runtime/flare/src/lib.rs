//! The `flare` command-line runner.
//!
//! Loads a raw action buffer (binary, or hex text with `--hex`) and either
//! prints its disassembly or runs it against a one-clip stage, with
//! `trace` output on stdout.

use std::path::PathBuf;
use std::sync::Once;

use flare_ir::{disasm, CodeBuffer, Version};
use flare_stage::{Stage, Timeline};
use flare_vm::{
    Environment, GlobalRegisters, HeadlessHost, StdoutTraceSink, TraceSink, Vm, VmConfig, VmError,
};

static TRACING_INIT: Once = Once::new();

/// Install the tracing subscriber.
///
/// Safe to call more than once. Only active when `RUST_LOG` is set, e.g.
/// `RUST_LOG=flare::actions=trace` for a per-action listing.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{prelude::*, EnvFilter};
        use tracing_tree::HierarchicalLayer;

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(HierarchicalLayer::new(2).with_targets(true))
                .with(filter)
                .init();
        }
    });
}

/// Failures reported by the runner.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid hex input: {0}")]
    Hex(String),
    #[error(transparent)]
    Vm(#[from] VmError),
}

/// Parsed command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunOptions {
    pub path: Option<PathBuf>,
    /// Input is hex text rather than raw bytes.
    pub hex: bool,
    /// Print the disassembly instead of running.
    pub disasm: bool,
    pub version: Version,
    pub strict: bool,
    /// Frames on the root timeline.
    pub frames: u32,
    pub seed: u64,
    pub help: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            path: None,
            hex: false,
            disasm: false,
            version: Version::new(7),
            strict: false,
            frames: 1,
            seed: 0,
            help: false,
        }
    }
}

/// Parse the arguments after the program name.
pub fn parse_options(args: &[String]) -> Result<RunOptions, CliError> {
    let mut options = RunOptions::default();

    for arg in args {
        if arg == "--hex" {
            options.hex = true;
        } else if arg == "--disasm" {
            options.disasm = true;
        } else if arg == "--strict" {
            options.strict = true;
        } else if arg == "-h" || arg == "--help" {
            options.help = true;
        } else if let Some(raw) = arg.strip_prefix("--swf-version=") {
            options.version = match raw.parse::<u8>() {
                Ok(v) if (1..=Version::LATEST.get()).contains(&v) => Version::new(v),
                _ => {
                    return Err(CliError::Usage(format!(
                        "unsupported version '{raw}' (1 to {})",
                        Version::LATEST.get()
                    )))
                }
            };
        } else if let Some(raw) = arg.strip_prefix("--frames=") {
            options.frames = raw
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| CliError::Usage(format!("invalid frame count '{raw}'")))?;
        } else if let Some(raw) = arg.strip_prefix("--seed=") {
            options.seed = raw
                .parse()
                .map_err(|_| CliError::Usage(format!("invalid seed '{raw}'")))?;
        } else if arg.starts_with('-') {
            return Err(CliError::Usage(format!("unknown option '{arg}'")));
        } else if options.path.is_none() {
            options.path = Some(PathBuf::from(arg));
        } else {
            return Err(CliError::Usage(format!("unexpected argument '{arg}'")));
        }
    }

    if options.path.is_none() && !options.help {
        return Err(CliError::Usage("missing input file".to_owned()));
    }
    Ok(options)
}

/// Decode hex text. Whitespace is ignored, and `#` starts a comment that
/// runs to the end of the line.
pub fn decode_hex(text: &str) -> Result<Vec<u8>, CliError> {
    let digits: Vec<u8> = text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default())
        .flat_map(str::bytes)
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    if digits.len() % 2 != 0 {
        return Err(CliError::Hex("odd number of digits".to_owned()));
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let high = hex_digit(pair[0])?;
            let low = hex_digit(pair[1])?;
            Ok((high << 4) | low)
        })
        .collect()
}

fn hex_digit(byte: u8) -> Result<u8, CliError> {
    char::from(byte)
        .to_digit(16)
        .and_then(|d| u8::try_from(d).ok())
        .ok_or_else(|| CliError::Hex(format!("unexpected character '{}'", char::from(byte))))
}

/// Read the input file named by `options`.
pub fn load(options: &RunOptions) -> Result<CodeBuffer, CliError> {
    let Some(path) = &options.path else {
        return Err(CliError::Usage("missing input file".to_owned()));
    };
    let read_error = |source| CliError::Read {
        path: path.clone(),
        source,
    };
    let bytes = if options.hex {
        decode_hex(&std::fs::read_to_string(path).map_err(read_error)?)?
    } else {
        std::fs::read(path).map_err(read_error)?
    };
    tracing::debug!(path = %path.display(), len = bytes.len(), "loaded action buffer");
    Ok(CodeBuffer::new(bytes, options.version))
}

/// Run `code` on a fresh stage whose root has `frames` frames.
pub fn execute(
    code: &CodeBuffer,
    config: VmConfig,
    frames: u32,
    host: &mut HeadlessHost,
) -> Result<(), VmError> {
    let stage = Stage::new(Timeline::new(frames));
    let mut vm = Vm::new(config);
    for (level, root) in stage.levels() {
        vm.set_level(level, root.clone());
    }
    let mut env = Environment::new(code.version(), Some(stage.root().object.clone()));
    let mut registers = GlobalRegisters::new();
    vm.run(code, &mut env, &mut registers, host)
}

/// Load, then disassemble or run, as the options ask.
pub fn run(options: &RunOptions) -> Result<(), CliError> {
    let code = load(options)?;
    if options.disasm {
        print!("{}", disasm::disassemble(&code));
        return Ok(());
    }

    let config = VmConfig::from_env().with_strict_decoding(options.strict);
    let mut host = HeadlessHost::with_sink(options.seed, TraceSink::Stdout(StdoutTraceSink));
    execute(&code, config, options.frames, &mut host)?;
    Ok(())
}
