//! Client library and command runner for the sec-lsm-manager daemon.
//!
//! [`Client`] wraps one connection and exposes each protocol command as a
//! method. [`run`] backs the `sec-lsm-manager-cmd` binary: it forwards a
//! single command given on the command line, or every command read from
//! standard input, and prints the daemon's replies line by line.

use std::ffi::OsString;
use std::io::{BufRead, Write};
use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind as ClapErrorKind;

mod cli;
mod client;
mod errors;
mod transport;

pub use client::{Client, Reply, Status};
pub use errors::{ClientError, errno};

use errors::AppError;

use cli::Cli;

const COMMENT_PREFIX: char = '#';
const HELP_COMMAND: &str = "help";

const VOCABULARY: &str = "\
commands:
  clear                               reset the staged application
  id APP_ID                           set the application identifier
  path PATH TYPE                      add a path; TYPE is one of default, conf,
                                      data, exec, http, icon, id, lib, plug, public
  permission PERMISSION               add a permission
  plug EXPORT_DIR APP_ID IMPORT_DIR   share EXPORT_DIR with application APP_ID
  install                             install the staged application
  uninstall                           remove the staged application
  display                             list the staged application
  log [on|off]                        query or switch protocol logging
  help                                print this list
";

/// Outcome of forwarding one command.
enum Outcome {
    Done,
    Refused,
}

/// Runs the command runner with the provided arguments and IO handles.
#[must_use]
pub fn run<I, R, W, E>(args: I, stdin: &mut R, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    R: BufRead,
    W: Write,
    E: Write,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => return report_usage(&error, stdout, stderr),
    };
    if is_help(&cli.command) {
        return emit_vocabulary(stdout, stderr);
    }

    let mut client = match Client::connect(&cli.socket) {
        Ok(client) => client,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            return ExitCode::FAILURE;
        }
    };

    let result = if cli.command.is_empty() {
        run_batch(&mut client, &cli, stdin, stdout)
    } else {
        let fields: Vec<&str> = cli.command.iter().map(String::as_str).collect();
        forward(&mut client, &fields, cli.echo, stdout).map(|outcome| match outcome {
            Outcome::Done => ExitCode::SUCCESS,
            Outcome::Refused => ExitCode::FAILURE,
        })
    };
    match result {
        Ok(code) => code,
        Err(error) => {
            let _ = writeln!(stderr, "{error} ({})", error.code());
            ExitCode::FAILURE
        }
    }
}

fn run_batch<R, W>(
    client: &mut Client,
    cli: &Cli,
    stdin: &mut R,
    stdout: &mut W,
) -> Result<ExitCode, AppError>
where
    R: BufRead,
    W: Write,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = stdin
            .read_line(&mut line)
            .map_err(AppError::ReadInput)?;
        if read == 0 {
            return Ok(ExitCode::SUCCESS);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(COMMENT_PREFIX) {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        if is_help(&fields) {
            write_out(stdout, VOCABULARY)?;
            continue;
        }
        forward(client, &fields, cli.echo, stdout)?;
    }
}

/// Sends one command and prints every reply line.
///
/// Refusals are printed and reported as [`Outcome::Refused`], except a
/// `protocol` refusal, after which the daemon drops the connection.
fn forward<W: Write>(
    client: &mut Client,
    fields: &[&str],
    echo: bool,
    stdout: &mut W,
) -> Result<Outcome, AppError> {
    if echo {
        write_out(stdout, &format!("> {}\n", fields.join(" ")))?;
    }
    let reply = client.raw(fields)?;
    for line in reply.lines() {
        write_out(stdout, &format!("{line}\n"))?;
    }
    match reply.status {
        Status::Done(_) => Ok(Outcome::Done),
        Status::Error(token) => {
            let refusal = ClientError::Refused {
                command: fields.first().copied().unwrap_or_default().to_owned(),
                token,
            };
            if refusal.is_fatal() {
                Err(refusal.into())
            } else {
                Ok(Outcome::Refused)
            }
        }
    }
}

fn is_help<S: AsRef<str>>(fields: &[S]) -> bool {
    matches!(fields, [word] if word.as_ref() == HELP_COMMAND)
}

fn write_out<W: Write>(stdout: &mut W, text: &str) -> Result<(), AppError> {
    stdout
        .write_all(text.as_bytes())
        .map_err(AppError::WriteOutput)
}

fn emit_vocabulary<W: Write, E: Write>(stdout: &mut W, stderr: &mut E) -> ExitCode {
    match stdout.write_all(VOCABULARY.as_bytes()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}

fn report_usage<W: Write, E: Write>(
    error: &clap::Error,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    let rendered = error.render().to_string();
    match error.kind() {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
            let _ = write!(stdout, "{rendered}");
            ExitCode::SUCCESS
        }
        _ => {
            let _ = write!(stderr, "{rendered}");
            ExitCode::from(2)
        }
    }
}
