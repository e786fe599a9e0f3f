//! `bicom` command-line tool.
//!
//! ```text
//! bicom [-d] [-p passwd] <infile> <outfile>
//! bicom -T [-p passwd]
//! ```
//!
//! Exit codes: 0 success, 1 self-test failure or internal error, 10 file or
//! passphrase error, 100 usage error.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use bicom::{BicomError, Codec, CodecOptions, Passphrase, SelfTest, DEFAULT_WINDOW};
use clap::error::ErrorKind;
use clap::Parser;

const EXIT_FAILED: u8 = 1;
const EXIT_SETUP: u8 = 10;
const EXIT_USAGE: u8 = 100;

/// Longest input the self test enumerates.
const SELF_TEST_MAX_LEN: usize = 4;

#[derive(Parser)]
#[command(name = "bicom", version, about = "Bijective compressor")]
struct Cli {
    /// Decompress (default is compress)
    #[arg(short = 'd')]
    decompress: bool,

    /// Encrypt/decrypt with a passphrase (hex if it starts with 0x)
    #[arg(short = 'p', value_name = "PASSWD")]
    passphrase: Option<String>,

    /// Run the exhaustive self test instead
    #[arg(short = 'T', conflicts_with_all = ["input", "output", "decompress"])]
    test: bool,

    /// Model window size in bytes; compressor and decompressor must agree
    #[arg(short = 'w', long, default_value_t = DEFAULT_WINDOW)]
    window: usize,

    /// File to read
    #[arg(required_unless_present = "test")]
    input: Option<PathBuf>,

    /// File to write
    #[arg(required_unless_present = "test")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let passphrase = match cli.passphrase.as_deref().map(Passphrase::parse).transpose() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_SETUP);
        }
    };

    let result = if cli.test {
        run_self_test(passphrase)
    } else {
        match (cli.input, cli.output) {
            (Some(input), Some(output)) => run(cli.decompress, cli.window, passphrase, input, output),
            _ => return ExitCode::from(EXIT_USAGE),
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e);
            match e {
                BicomError::Io(_) | BicomError::InvalidPassphrase(_) | BicomError::Crypto(_) => {
                    ExitCode::from(EXIT_SETUP)
                }
                _ => ExitCode::from(EXIT_FAILED),
            }
        }
    }
}

fn run(
    decompress: bool,
    window_size: usize,
    passphrase: Option<Passphrase>,
    input: PathBuf,
    output: PathBuf,
) -> Result<ExitCode, BicomError> {
    let codec = Codec::new(CodecOptions {
        window_size,
        passphrase,
    })?;

    let reader = match File::open(&input) {
        Ok(file) => BufReader::new(file),
        Err(e) => {
            eprintln!("Could not read file \"{}\": {}", input.display(), e);
            return Ok(ExitCode::from(EXIT_SETUP));
        }
    };
    let mut writer = match File::create(&output) {
        Ok(file) => BufWriter::new(file),
        Err(e) => {
            eprintln!("Could not write file \"{}\": {}", output.display(), e);
            return Ok(ExitCode::from(EXIT_SETUP));
        }
    };

    if decompress {
        codec.decompress_stream(reader, &mut writer)?;
    } else {
        codec.compress_stream(reader, &mut writer)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_self_test(passphrase: Option<Passphrase>) -> Result<ExitCode, BicomError> {
    let mut test = SelfTest::new(passphrase)?;
    let mut stdout = io::stdout();
    for len in 0..=SELF_TEST_MAX_LEN {
        write!(stdout, "Testing {} byte files...", len)?;
        stdout.flush()?;
        if let Some(failure) = test.run_length(len)? {
            writeln!(stdout, "FAIL!")?;
            eprintln!(
                "round trip {:?} failed for input {:02x?}",
                failure.direction, failure.input
            );
            return Ok(ExitCode::from(EXIT_FAILED));
        }
        writeln!(stdout, "OK")?;
    }
    Ok(ExitCode::SUCCESS)
}
