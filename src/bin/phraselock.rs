//! Phraselock CLI - password-based line-by-line file encryption
//!
//! Command-line interface for encrypting and decrypting text files one
//! line at a time using AES-256-GCM with Argon2id key derivation.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use phraselock::file_ops::{self, Mode};
use phraselock::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};

/// Directory holding the default input/output files.
const DATA_DIR: &str = "data";

#[derive(Parser)]
#[command(name = "phraselock")]
#[command(version)]
#[command(about = "Password-based line-by-line file encryption.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file line by line
    #[command(alias = "e")]
    Encrypt {
        /// Path to the plaintext file [default: data/seed_phrases.txt]
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        /// Path to write the encrypted records to [default: data/encrypted_seed_phrases.txt]
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },

    /// Decrypt a file line by line
    #[command(alias = "d")]
    Decrypt {
        /// Path to the encrypted file [default: data/encrypted_seed_phrases.txt]
        #[arg(value_name = "INPUT")]
        input: Option<PathBuf>,

        /// Path to write the recovered plaintext to [default: data/decrypted_seed_phrases.txt]
        #[arg(value_name = "OUTPUT")]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let (mode, input, output) = match cli.command {
        Commands::Encrypt { input, output } => (
            Mode::Encrypt,
            input.unwrap_or_else(|| Path::new(DATA_DIR).join("seed_phrases.txt")),
            output.unwrap_or_else(|| Path::new(DATA_DIR).join("encrypted_seed_phrases.txt")),
        ),
        Commands::Decrypt { input, output } => (
            Mode::Decrypt,
            input.unwrap_or_else(|| Path::new(DATA_DIR).join("encrypted_seed_phrases.txt")),
            output.unwrap_or_else(|| Path::new(DATA_DIR).join("decrypted_seed_phrases.txt")),
        ),
    };

    let mut reader = get_passphrase_reader(cli.passphrase_stdin);
    match file_ops::process_file(mode, &input, &output, &mut *reader) {
        Ok(summary) => {
            // Lines that failed are reported and skipped; the run as a
            // whole still succeeds.
            for failure in &summary.failures {
                eprintln!(
                    "error processing line {}: {}",
                    failure.line_number, failure.error
                );
            }
            let label = match mode {
                Mode::Encrypt => "Encryption",
                Mode::Decrypt => "Decryption",
            };
            println!("{} complete.", label);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}
