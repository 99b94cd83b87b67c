use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{expand_command_abbrev, known_command_names};
use crate::config::Config;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "vacal",
    version,
    about = "Vacal: team vacation calendar",
    disable_help_subcommand = true,
    arg_required_else_help = false
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "vacalrc")]
    pub vacalrc: Option<PathBuf>,

    /// Year to open the calendar on.
    #[arg(long = "year")]
    pub year: Option<i32>,

    /// Command line to run before any script; repeatable.
    #[arg(short = 'c', long = "command", action = ArgAction::Append)]
    pub commands: Vec<String>,

    /// Files with one command per line.
    pub scripts: Vec<PathBuf>,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` and `rc.key:value` overrides out of the
/// raw arguments before clap sees them.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

/// Splits one input line into words. Single quotes keep everything literal,
/// double quotes allow `\"` and `\\`, and a bare backslash escapes the next
/// character. Returns an empty list for blank lines and `#` comments.
pub fn tokenize_line(line: &str) -> anyhow::Result<Vec<String>> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(vec![]);
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut chars = trimmed.chars();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('\'') => break,
                        Some(c) => current.push(c),
                        None => return Err(anyhow!("unterminated single quote in: {line}")),
                    }
                }
            }
            '"' => {
                in_token = true;
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some(c @ ('"' | '\\')) => current.push(c),
                            Some(c) => {
                                current.push('\\');
                                current.push(c);
                            }
                            None => return Err(anyhow!("unterminated double quote in: {line}")),
                        },
                        Some(c) => current.push(c),
                        None => return Err(anyhow!("unterminated double quote in: {line}")),
                    }
                }
            }
            '\\' => {
                in_token = true;
                match chars.next() {
                    Some(c) => current.push(c),
                    None => return Err(anyhow!("trailing backslash in: {line}")),
                }
            }
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    Ok(tokens)
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub filter_terms: Vec<String>,
    pub command: String,
    pub command_args: Vec<String>,
}

impl Invocation {
    #[tracing::instrument(skip(cfg, tokens))]
    pub fn parse(cfg: &Config, tokens: Vec<String>) -> anyhow::Result<Self> {
        let default_command = cfg
            .get("default.command")
            .unwrap_or_else(|| "year".to_string());

        if tokens.is_empty() {
            debug!(command = %default_command, "no explicit command, using default");
            return Ok(Self {
                filter_terms: vec![],
                command: default_command,
                command_args: vec![],
            });
        }

        match split_filter_command(&tokens) {
            Some((filter_terms, command, command_args)) => Ok(Self {
                filter_terms,
                command,
                command_args,
            }),
            None => {
                warn!(
                    command = %default_command,
                    "no command detected, treated all terms as filter for default command"
                );
                Ok(Self {
                    filter_terms: tokens,
                    command: default_command,
                    command_args: vec![],
                })
            }
        }
    }
}

/// Finds the command word. An exact command name anywhere in the line wins
/// over an abbreviation, so a filter word like `bo` does not turn into
/// `book` when `list` follows it.
fn split_filter_command(tokens: &[String]) -> Option<(Vec<String>, String, Vec<String>)> {
    let known = known_command_names();

    let split_at = |i: usize, full: &str| {
        debug!(
            token = %tokens[i],
            expanded = %full,
            split_index = i,
            "resolved command token"
        );
        (
            tokens[..i].to_vec(),
            full.to_string(),
            tokens[i + 1..].to_vec(),
        )
    };

    if let Some(i) = tokens.iter().position(|token| known.contains(&token.as_str())) {
        let full = tokens[i].clone();
        return Some(split_at(i, &full));
    }

    for (i, token) in tokens.iter().enumerate() {
        if let Some(full) = expand_command_abbrev(token, &known) {
            return Some(split_at(i, full));
        }
    }

    None
}
