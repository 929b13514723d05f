//! Line-oriented file encryption/decryption
//!
//! Reads an input file line by line and writes one output line per
//! non-blank input line: a serialized record when encrypting, the
//! recovered plaintext when decrypting. A failing line is recorded and
//! skipped; the run carries on with the next line.
//!
//! The output file is materialized through a temporary file in the
//! destination directory, flushed and fsynced exactly once after the full
//! input has been consumed, then atomically renamed into place. An error
//! anywhere on the way leaves the destination untouched.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::error::{ErrorCategory, ErrorKind, PhraselockError, Result};
use crate::passphrase::PassphraseReader;
use crate::record::Record;
use crate::secretcrypt;

/// Direction of a processing run.
///
/// Always passed explicitly by the caller; never inferred from ambient
/// state such as environment variables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

/// A per-line failure recorded during a run.
#[derive(Debug)]
pub struct LineFailure {
    /// 1-based line number in the input file.
    pub line_number: usize,
    pub error: PhraselockError,
}

/// Counts and failures from one processing run.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Number of lines successfully transformed and written.
    pub lines_written: usize,
    /// Lines that failed, in input order. Failures never abort the run;
    /// how to report them is the caller's decision.
    pub failures: Vec<LineFailure>,
}

/// Transform one non-blank line
///
/// Encrypting turns the line into a serialized record; decrypting parses
/// the line as a record and recovers the plaintext. Each call reports one
/// specific error and never substitutes default output.
pub fn process_line(mode: Mode, line: &str, password: &[u8]) -> Result<String> {
    match mode {
        Mode::Encrypt => secretcrypt::encrypt(password, line)?.to_json(),
        Mode::Decrypt => {
            let record = Record::from_json(line)?;
            secretcrypt::decrypt(password, &record)
        }
    }
}

/// Lazily transform every non-blank line read from `input`
///
/// Yields one `Result` per non-blank line, leaving it to the caller to
/// collect successes, report failures, or abort. Blank lines are skipped
/// and produce no item. An `Err` caused by the underlying reader should be
/// treated as terminal for the stream.
pub fn process_lines<'a, R>(
    mode: Mode,
    input: R,
    password: &'a [u8],
) -> impl Iterator<Item = Result<String>> + 'a
where
    R: BufRead + 'a,
{
    input.lines().filter_map(move |line| match line {
        Ok(line) if line.trim().is_empty() => None,
        Ok(line) => Some(process_line(mode, &line, password)),
        Err(e) => Some(Err(PhraselockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to read input line",
            e,
        ))),
    })
}

/// Process a file line by line with a password
///
/// The password is read once from `passphrase_reader` and used for every
/// line; an empty password is rejected before any file is touched. The
/// output file is created with mode 0o600 (read/write for owner only) on
/// Unix systems.
pub fn process_file(
    mode: Mode,
    input_path: &Path,
    output_path: &Path,
    passphrase_reader: &mut dyn PassphraseReader,
) -> Result<RunSummary> {
    let passphrase = passphrase_reader.read_passphrase()?;
    if passphrase.is_empty() {
        return Err(PhraselockError::with_kind(
            ErrorCategory::User,
            ErrorKind::PassphraseUnavailable,
            "password must not be empty",
        ));
    }

    let input = File::open(input_path).map_err(|e| read_error(input_path, e))?;

    let out_dir = match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(out_dir).map_err(|e| {
        PhraselockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    let mut summary = RunSummary::default();
    {
        let mut writer = BufWriter::new(temp_file.as_file_mut());
        for (index, line) in BufReader::new(input).lines().enumerate() {
            let line = line.map_err(|e| read_error(input_path, e))?;
            if line.trim().is_empty() {
                continue;
            }
            match process_line(mode, &line, &passphrase) {
                Ok(processed) => {
                    writeln!(writer, "{}", processed).map_err(|e| {
                        PhraselockError::with_kind_and_source(
                            ErrorCategory::Internal,
                            ErrorKind::Io,
                            "failed to write to tempfile",
                            e,
                        )
                    })?;
                    summary.lines_written += 1;
                }
                Err(error) => summary.failures.push(LineFailure {
                    line_number: index + 1,
                    error,
                }),
            }
        }
        // Flush and fsync() such that the rename later, if it succeeds, will
        // always point to a valid file.
        writer.flush().map_err(|e| {
            PhraselockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to flush tempfile",
                e,
            )
        })?;
    }
    temp_file.as_file().sync_all().map_err(|e| {
        PhraselockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    // Atomically rename temp file to target (persist with restrictive permissions)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                PhraselockError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to get tempfile metadata",
                    e,
                )
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            PhraselockError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to set tempfile permissions",
                e,
            )
        })?;
    }
    temp_file.persist(output_path).map_err(|e| {
        PhraselockError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", output_path.display()),
            e,
        )
    })?;

    Ok(summary)
}

fn read_error(path: &Path, err: io::Error) -> PhraselockError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    PhraselockError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
