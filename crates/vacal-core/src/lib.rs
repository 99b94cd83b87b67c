pub mod calendar;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod model;
pub mod planner;
pub mod render;
pub mod session;

use std::ffi::OsString;
use std::fs;
use std::io::{
  self,
  BufRead,
  IsTerminal,
  Read,
  Write
};

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info,
  warn
};

use crate::commands::Flow;
use crate::config::Config;
use crate::render::Renderer;
use crate::session::Session;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting vacal"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = Config::load(
    cli.vacalrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre
      .rc_overrides
      .into_iter()
      .chain(
        cli
          .rc_overrides
          .into_iter()
          .map(|kv| (kv.key, kv.value))
      )
      .chain(cli.year.map(|year| {
        (
          "calendar.year".to_string(),
          year.to_string()
        )
      }))
  );

  let renderer = Renderer::new(&cfg)?;
  let today = datetime::today_local();
  let mut session = Session::new(
    cfg
      .focus(today)
      .context("failed to pick the initial focus")?,
    cfg.view()?
  );

  let stdout = io::stdout();
  let mut out = stdout.lock();

  if !cli.commands.is_empty()
    || !cli.scripts.is_empty()
  {
    for (idx, line) in
      cli.commands.iter().enumerate()
    {
      let flow = run_line(
        &mut session,
        &cfg,
        &renderer,
        line,
        &mut out
      )
      .with_context(|| {
        format!("-c #{}", idx + 1)
      })?;
      if flow == Flow::Quit {
        return Ok(());
      }
    }

    for script in &cli.scripts {
      let text =
        fs::read_to_string(script)
          .with_context(|| {
            format!(
              "failed to read {}",
              script.display()
            )
          })?;
      let flow = run_script(
        &mut session,
        &cfg,
        &renderer,
        &script.display().to_string(),
        &text,
        &mut out
      )?;
      if flow == Flow::Quit {
        return Ok(());
      }
    }

    info!("done");
    return Ok(());
  }

  let stdin = io::stdin();
  if stdin.is_terminal() {
    interactive(
      &mut session,
      &cfg,
      &renderer,
      &mut stdin.lock(),
      &mut out
    )?;
  } else {
    let mut text = String::new();
    stdin
      .lock()
      .read_to_string(&mut text)
      .context("failed to read stdin")?;
    run_script(
      &mut session,
      &cfg,
      &renderer,
      "<stdin>",
      &text,
      &mut out
    )?;
  }

  info!("done");
  Ok(())
}

/// Runs one command line. Blank lines and comments do nothing.
pub fn run_line<W: Write>(
  session: &mut Session,
  cfg: &Config,
  renderer: &Renderer,
  line: &str,
  out: &mut W
) -> anyhow::Result<Flow> {
  let tokens = cli::tokenize_line(line)?;
  if tokens.is_empty() {
    return Ok(Flow::Continue);
  }

  let inv =
    cli::Invocation::parse(cfg, tokens)?;
  commands::dispatch(
    session, cfg, renderer, inv, out
  )
}

/// Runs `text` line by line and stops at the first failure, reported as
/// `source:line`.
#[tracing::instrument(skip(
  session, cfg, renderer, text, out
))]
pub fn run_script<W: Write>(
  session: &mut Session,
  cfg: &Config,
  renderer: &Renderer,
  source: &str,
  text: &str,
  out: &mut W
) -> anyhow::Result<Flow> {
  for (idx, line) in
    text.lines().enumerate()
  {
    let flow = run_line(
      session, cfg, renderer, line, out
    )
    .with_context(|| {
      format!("{source}:{}", idx + 1)
    })?;
    if flow == Flow::Quit {
      debug!(
        line = idx + 1,
        "quit requested by script"
      );
      return Ok(Flow::Quit);
    }
  }
  Ok(Flow::Continue)
}

/// Prompt loop. Errors are printed and the loop keeps going.
fn interactive<R, W>(
  session: &mut Session,
  cfg: &Config,
  renderer: &Renderer,
  input: &mut R,
  out: &mut W
) -> anyhow::Result<()>
where
  R: BufRead,
  W: Write
{
  let opening = cli::Invocation::parse(
    cfg,
    vec![]
  )?;
  if let Err(err) = commands::dispatch(
    session, cfg, renderer, opening, out
  ) {
    eprintln!("error: {err:#}");
  }

  loop {
    write!(out, "vacal> ")?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
      writeln!(out)?;
      break;
    }

    match run_line(
      session, cfg, renderer, &line, out
    ) {
      | Ok(Flow::Quit) => break,
      | Ok(Flow::Continue) => {}
      | Err(err) => {
        warn!(error = %err, "command failed");
        eprintln!("error: {err:#}");
      }
    }
  }

  Ok(())
}
