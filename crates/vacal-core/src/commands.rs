use std::collections::BTreeMap;
use std::io::Write;

use anyhow::{Context, anyhow};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{self, DateRange, ViewMode};
use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::{format_span, parse_date_expr, today_local};
use crate::error::{ValidationError, validate_span};
use crate::filter::Filter;
use crate::model::{Color, PERSON_PALETTE, RECOLOR_PALETTE, VacationStatus};
use crate::planner::VacationPatch;
use crate::render::Renderer;
use crate::session::Session;

/// What the input loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const HELP: &str = "\
People
  add <name> [color:#RRGGBB|N]       add a person (first one is selected)
  rename <person> <new name>         rename a person
  recolor <person> <#RRGGBB|N>       change a person's color
  select <person>                    choose who new vacations are booked for
  remove [<person>]                  ask to remove a person and their vacations
  confirm | cancel                   finish or abandon a pending removal
  people                             list everyone

Vacations
  book <start> <end> [tentative] [replacement:<name>]
                                     book a vacation for the selected person
  edit <n> [start:<date>] [end:<date>] [status:<s>] [replacement:<name>]
  delete <n>                         delete vacation number n
  [filter] list                      list vacations

Calendar
  year [<year>] | quarter [q1-q4|<date>] | month [<date>]
  timeline                           Gantt bars for the current view
  overlaps                           days with more than one person away
  next [n] | prev [n] | goto <date|year>

Other
  colors  export  show  help  version  quit

<person> is a list number, a name, or a unique name prefix.
Dates: YYYY-MM-DD, YYYYMMDD, today, tomorrow, monday, march, +3d, -1w.
Filters: person:<p> status:<s> from:<date> to:<date> replacement:<text>
         +covered -covered <word>, combined with and, or and parentheses.
";

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add",
        "rename",
        "recolor",
        "select",
        "remove",
        "confirm",
        "cancel",
        "people",
        "book",
        "edit",
        "delete",
        "list",
        "year",
        "quarter",
        "month",
        "timeline",
        "overlaps",
        "next",
        "prev",
        "goto",
        "colors",
        "export",
        "show",
        "help",
        "version",
        "quit",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(session, cfg, renderer, inv, out))]
pub fn dispatch<W: Write>(
    session: &mut Session,
    cfg: &Config,
    renderer: &Renderer,
    inv: Invocation,
    out: &mut W,
) -> anyhow::Result<Flow> {
    let today = today_local();
    let command = inv.command.as_str();

    debug!(
        command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    if !inv.filter_terms.is_empty() && !accepts_filter(command) {
        warn!(command, filter = ?inv.filter_terms, "filter terms ignored by this command");
    }

    let args = &inv.command_args;
    match command {
        "add" => cmd_add(session, args, out)?,
        "rename" => cmd_rename(session, args, out)?,
        "recolor" => cmd_recolor(session, args, out)?,
        "select" => cmd_select(session, args, out)?,
        "remove" => cmd_remove(session, args, out)?,
        "confirm" => cmd_confirm(session, out)?,
        "cancel" => cmd_cancel(session, out)?,
        "people" => renderer.write_people(out, session)?,
        "book" => cmd_book(session, args, today, out)?,
        "edit" => cmd_edit(session, args, today, out)?,
        "delete" => cmd_delete(session, args, out)?,
        "list" => cmd_list(session, renderer, &inv.filter_terms, today, out)?,
        "year" => cmd_view(session, renderer, ViewMode::Year, args, today, out)?,
        "quarter" => cmd_view(session, renderer, ViewMode::Quarter, args, today, out)?,
        "month" => cmd_view(session, renderer, ViewMode::Month, args, today, out)?,
        "timeline" => renderer.write_timeline(out, &session.planner, session.window())?,
        "overlaps" => renderer.write_overlaps(out, &session.planner, session.window())?,
        "next" => cmd_shift(session, renderer, 1, args, out)?,
        "prev" => cmd_shift(session, renderer, -1, args, out)?,
        "goto" => cmd_goto(session, renderer, args, today, out)?,
        "colors" => renderer.write_palette(out)?,
        "export" => cmd_export(session, out)?,
        "show" => renderer.write_config(out, cfg)?,
        "help" => write!(out, "{HELP}")?,
        "version" => writeln!(out, "{}", env!("CARGO_PKG_VERSION"))?,
        "quit" => return Ok(Flow::Quit),
        other => return Err(anyhow!("unknown command: {other}")),
    }

    Ok(Flow::Continue)
}

fn accepts_filter(command: &str) -> bool {
    command == "list"
}

/// Separates `key:value` arguments for the given keys from plain words.
/// Anything else with a colon stays a word, so names may contain one.
fn split_keyed(args: &[String], keys: &[&str]) -> (Vec<String>, BTreeMap<String, String>) {
    let mut words = Vec::new();
    let mut keyed = BTreeMap::new();

    for arg in args {
        match arg.split_once(':') {
            Some((key, value)) if keys.contains(&key) => {
                keyed.insert(key.to_string(), value.to_string());
            }
            _ => words.push(arg.clone()),
        }
    }

    (words, keyed)
}

/// A one-based number into `palette` (as listed by `colors`) or a `#RRGGBB` value.
fn parse_color_choice(raw: &str, palette: &[Color]) -> anyhow::Result<Color> {
    if let Ok(number) = raw.trim().parse::<usize>() {
        return number
            .checked_sub(1)
            .and_then(|idx| palette.get(idx))
            .copied()
            .ok_or_else(|| anyhow!("palette has colors 1-{}", palette.len()));
    }
    Ok(raw.parse::<Color>()?)
}

fn parse_vacation_number(raw: Option<&String>, command: &str) -> anyhow::Result<usize> {
    let raw = raw.ok_or_else(|| anyhow!("{command} requires a vacation number"))?;
    raw.parse::<usize>()
        .with_context(|| format!("invalid vacation number: {raw}"))
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

#[instrument(skip(session, args, out))]
fn cmd_add<W: Write>(session: &mut Session, args: &[String], out: &mut W) -> anyhow::Result<()> {
    info!("command add");

    let (words, keyed) = split_keyed(args, &["color"]);
    let color = match keyed.get("color") {
        Some(raw) => parse_color_choice(raw, &PERSON_PALETTE)?,
        None => Color::default(),
    };

    let id = session.add_person(&words.join(" "), color)?;
    let number = session.planner.person_number(id).unwrap_or_default();
    let name = session
        .planner
        .person(id)
        .map(|person| person.name.clone())
        .unwrap_or_default();

    writeln!(out, "Added person {number} ({name}).")?;
    if session.selected_id() == Some(id) {
        writeln!(out, "Selected {name}.")?;
    }
    Ok(())
}

#[instrument(skip(session, args, out))]
fn cmd_rename<W: Write>(session: &mut Session, args: &[String], out: &mut W) -> anyhow::Result<()> {
    info!("command rename");

    let (selector, rest) = args
        .split_first()
        .ok_or_else(|| anyhow!("rename requires a person and a new name"))?;
    let id = session.planner.resolve_person(selector)?.id;
    session.planner.rename_person(id, &rest.join(" "))?;

    let number = session.planner.person_number(id).unwrap_or_default();
    let name = session
        .planner
        .person(id)
        .map(|person| person.name.clone())
        .unwrap_or_default();
    writeln!(out, "Renamed person {number} to {name}.")?;
    Ok(())
}

#[instrument(skip(session, args, out))]
fn cmd_recolor<W: Write>(session: &mut Session, args: &[String], out: &mut W) -> anyhow::Result<()> {
    info!("command recolor");

    let [selector, raw_color] = args else {
        return Err(anyhow!("recolor requires a person and a color"));
    };
    let color = parse_color_choice(raw_color, &RECOLOR_PALETTE)?;
    let person = session.planner.resolve_person(selector)?;
    let (id, name) = (person.id, person.name.clone());
    session.planner.recolor_person(id, color)?;

    writeln!(out, "Recolored {name} to {color}.")?;
    Ok(())
}

#[instrument(skip(session, args, out))]
fn cmd_select<W: Write>(session: &mut Session, args: &[String], out: &mut W) -> anyhow::Result<()> {
    let selector = args
        .first()
        .ok_or_else(|| anyhow!("select requires a person"))?;
    let person = session.select(selector)?;
    writeln!(out, "Selected {}.", person.name)?;
    Ok(())
}

#[instrument(skip(session, args, out))]
fn cmd_remove<W: Write>(session: &mut Session, args: &[String], out: &mut W) -> anyhow::Result<()> {
    info!("command remove");

    let person = session.request_removal(args.first().map(String::as_str))?;
    let (id, name) = (person.id, person.name.clone());
    let count = session.planner.vacations_for(id).count();

    writeln!(
        out,
        "Remove {name} and {}? Run confirm to delete or cancel to keep.",
        plural(count, "vacation")
    )?;
    Ok(())
}

#[instrument(skip(session, out))]
fn cmd_confirm<W: Write>(session: &mut Session, out: &mut W) -> anyhow::Result<()> {
    let removed = session.confirm_removal()?;
    writeln!(
        out,
        "Removed {} and {}.",
        removed.person.name,
        plural(removed.vacations.len(), "vacation")
    )?;
    Ok(())
}

fn cmd_cancel<W: Write>(session: &mut Session, out: &mut W) -> anyhow::Result<()> {
    if session.cancel_removal() {
        writeln!(out, "Removal cancelled.")?;
    } else {
        writeln!(out, "Nothing to cancel.")?;
    }
    Ok(())
}

#[instrument(skip(session, args, today, out))]
fn cmd_book<W: Write>(
    session: &mut Session,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command book");

    let (words, keyed) = split_keyed(args, &["replacement"]);
    if words.len() > 3 {
        return Err(anyhow!(
            "book takes a start date, an end date and an optional status"
        ));
    }

    let span = validate_span(
        words.first().map(String::as_str),
        words.get(1).map(String::as_str),
        today,
    )?;
    let status = words
        .get(2)
        .map(|raw| raw.parse::<VacationStatus>())
        .transpose()?
        .unwrap_or_default();

    let id = session.add_vacation(span, status)?;
    if let Some(replacement) = keyed.get("replacement") {
        session.planner.update_vacation(
            id,
            VacationPatch {
                replacement: Some(replacement.clone()),
                ..VacationPatch::default()
            },
        )?;
    }

    let number = session.planner.vacation_number(id).unwrap_or_default();
    let name = session
        .selected()
        .map(|person| person.name.clone())
        .unwrap_or_default();
    writeln!(
        out,
        "Booked vacation {number} for {name}: {} ({}).",
        format_span(&span),
        plural(span.len_days() as usize, "day")
    )?;
    Ok(())
}

#[instrument(skip(session, args, today, out))]
fn cmd_edit<W: Write>(
    session: &mut Session,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("command edit");

    let (words, keyed) = split_keyed(args, &["start", "end", "status", "replacement"]);
    let number = parse_vacation_number(words.first(), "edit")?;
    if words.len() > 1 {
        return Err(anyhow!("unexpected arguments: {}", words[1..].join(" ")));
    }

    let vacation = session.planner.resolve_vacation(number)?;
    let (id, current) = (vacation.id, vacation.span);

    let mut patch = VacationPatch::default();
    if keyed.contains_key("start") || keyed.contains_key("end") {
        let start = match keyed.get("start") {
            Some(raw) => parse_form_date(raw, "start", today)?,
            None => current.start(),
        };
        let end = match keyed.get("end") {
            Some(raw) => parse_form_date(raw, "end", today)?,
            None => current.end(),
        };
        patch.span = Some(DateRange::new(start, end)?);
    }
    if let Some(raw) = keyed.get("status") {
        patch.status = Some(raw.parse()?);
    }
    if let Some(raw) = keyed.get("replacement") {
        patch.replacement = Some(raw.clone());
    }

    if patch.is_empty() {
        return Err(anyhow!(
            "edit needs at least one of start:, end:, status: or replacement:"
        ));
    }

    session.planner.update_vacation(id, patch)?;
    writeln!(out, "Modified vacation {number}.")?;
    Ok(())
}

fn parse_form_date(raw: &str, field: &'static str, today: NaiveDate) -> Result<NaiveDate, ValidationError> {
    parse_date_expr(raw, today).map_err(|_| ValidationError::InvalidDate {
        field,
        input: raw.to_string(),
    })
}

#[instrument(skip(session, args, out))]
fn cmd_delete<W: Write>(session: &mut Session, args: &[String], out: &mut W) -> anyhow::Result<()> {
    info!("command delete");

    let number = parse_vacation_number(args.first(), "delete")?;
    let id = session.planner.resolve_vacation(number)?.id;
    let removed = session.planner.remove_vacation(id)?;
    let name = session
        .planner
        .person(removed.person_id)
        .map(|person| person.name.clone())
        .unwrap_or_default();

    writeln!(
        out,
        "Deleted vacation {number} ({name}, {}).",
        format_span(&removed)
    )?;
    Ok(())
}

#[instrument(skip(session, renderer, filter_terms, today, out))]
fn cmd_list<W: Write>(
    session: &Session,
    renderer: &Renderer,
    filter_terms: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let filter = Filter::parse(filter_terms, today)?;
    let planner = &session.planner;

    let rows = planner
        .vacations()
        .iter()
        .enumerate()
        .filter(|(_, vacation)| {
            let owner = planner.person(vacation.person_id).and_then(|person| {
                planner
                    .person_number(person.id)
                    .map(|number| (number, person))
            });
            filter.matches(vacation, owner)
        })
        .map(|(idx, vacation)| (idx + 1, vacation))
        .collect::<Vec<_>>();

    debug!(matched = rows.len(), total = planner.vacations().len(), "listing vacations");
    renderer.write_vacations(out, planner, &rows)
}

fn render_view<W: Write>(session: &Session, renderer: &Renderer, out: &mut W) -> anyhow::Result<()> {
    let planner = &session.planner;
    match session.view() {
        ViewMode::Year => renderer.write_year(out, planner, session.focus().year()),
        ViewMode::Quarter => renderer.write_quarter(out, planner, session.focus()),
        ViewMode::Month => renderer.write_month(out, planner, session.focus()),
    }
}

/// Moves the focus to a year (`2027`), a quarter of the focused year
/// (`q3`) or any date expression.
fn apply_focus_arg(session: &mut Session, raw: &str, today: NaiveDate) -> anyhow::Result<()> {
    let lower = raw.trim().to_ascii_lowercase();

    if lower.len() == 4
        && let Ok(year) = lower.parse::<i32>()
    {
        return session.goto_year(year);
    }

    if let Some(quarter) = lower
        .strip_prefix('q')
        .and_then(|rest| rest.parse::<u32>().ok())
    {
        let range = calendar::quarter_range(session.focus().year(), quarter)
            .ok_or_else(|| anyhow!("quarter must be q1-q4, got {raw}"))?;
        session.set_focus(range.start());
        return Ok(());
    }

    let date = parse_date_expr(raw, today)?;
    session.set_focus(date);
    Ok(())
}

#[instrument(skip(session, renderer, args, today, out))]
fn cmd_view<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    view: ViewMode,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    session.set_view(view);
    if let Some(raw) = args.first() {
        apply_focus_arg(session, raw, today)?;
    }
    render_view(session, renderer, out)
}

#[instrument(skip(session, renderer, args, out))]
fn cmd_shift<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    direction: i32,
    args: &[String],
    out: &mut W,
) -> anyhow::Result<()> {
    let count = match args.first() {
        Some(raw) => raw
            .parse::<i32>()
            .with_context(|| format!("invalid step count: {raw}"))?,
        None => 1,
    };
    session.shift(direction.saturating_mul(count))?;
    render_view(session, renderer, out)
}

#[instrument(skip(session, renderer, args, today, out))]
fn cmd_goto<W: Write>(
    session: &mut Session,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    out: &mut W,
) -> anyhow::Result<()> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("goto requires a date or a year"))?;
    apply_focus_arg(session, raw, today)?;
    render_view(session, renderer, out)
}

#[instrument(skip(session, out))]
fn cmd_export<W: Write>(session: &Session, out: &mut W) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(&session.planner).context("failed to serialize planner")?;
    writeln!(out, "{json}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn abbreviations_must_be_unique() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("peo", &known), Some("people"));
        assert_eq!(expand_command_abbrev("ov", &known), Some("overlaps"));
        assert_eq!(expand_command_abbrev("re", &known), None);
        assert_eq!(expand_command_abbrev("year", &known), Some("year"));
    }

    #[test]
    fn keyed_arguments_only_split_known_keys() {
        let (plain, keyed) = split_keyed(
            &words(&["Ana", "color:#FF8C00", "team:ops"]),
            &["color"],
        );
        assert_eq!(plain, words(&["Ana", "team:ops"]));
        assert_eq!(keyed.get("color").map(String::as_str), Some("#FF8C00"));
    }

    #[test]
    fn color_choice_accepts_palette_numbers() {
        assert_eq!(
            parse_color_choice("2", &PERSON_PALETTE).expect("second"),
            "#4ECDC4".parse::<Color>().expect("hex")
        );
        assert_eq!(
            parse_color_choice("2", &RECOLOR_PALETTE).expect("second"),
            "#0066FF".parse::<Color>().expect("hex")
        );
        assert!(parse_color_choice("9", &PERSON_PALETTE).is_err());
        assert!(parse_color_choice("17", &RECOLOR_PALETTE).is_err());
        assert!(parse_color_choice("0", &RECOLOR_PALETTE).is_err());
        assert_eq!(
            parse_color_choice("#00ff00", &PERSON_PALETTE).expect("hex"),
            Color::from_rgb(0, 255, 0)
        );
    }

    #[test]
    fn plural_handles_one() {
        assert_eq!(plural(1, "day"), "1 day");
        assert_eq!(plural(6, "day"), "6 days");
    }
}
