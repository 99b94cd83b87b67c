use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::parse_date_expr;
use crate::model::{
  Person,
  Vacation,
  VacationStatus
};

#[derive(Debug, Clone)]
pub enum Pred {
  PersonIs(String),
  StatusEq(VacationStatus),
  EndsOnOrAfter(NaiveDate),
  StartsOnOrBefore(NaiveDate),
  ReplacementContains(String),
  Covered(bool),
  NameContains(String)
}

#[derive(Debug, Clone)]
enum Expr {
  True,
  Pred(Pred),
  And(Vec<Expr>),
  Or(Vec<Expr>)
}

/// A parsed vacation filter such as
/// `person:ana status:tentative or -covered`.
#[derive(Debug, Clone)]
pub struct Filter {
  expr: Expr
}

impl Default for Filter {
  fn default() -> Self {
    Self {
      expr: Expr::True
    }
  }
}

impl Filter {
  #[tracing::instrument(skip(
    terms, today
  ))]
  pub fn parse(
    terms: &[String],
    today: NaiveDate
  ) -> anyhow::Result<Self> {
    if terms.is_empty() {
      return Ok(Self::default());
    }

    let tokens = lex_terms(terms);
    let mut parser =
      Parser::new(tokens, today);
    let expr = parser.parse_expr()?;
    parser.ensure_end()?;

    Ok(Self {
      expr
    })
  }

  pub fn is_empty(&self) -> bool {
    matches!(self.expr, Expr::True)
  }

  /// `owner` is the person the vacation belongs to, and `number` that
  /// person's one-based list number.
  pub fn matches(
    &self,
    vacation: &Vacation,
    owner: Option<(usize, &Person)>
  ) -> bool {
    eval_expr(
      &self.expr, vacation, owner
    )
  }
}

struct Parser {
  tokens: Vec<String>,
  pos:    usize,
  today:  NaiveDate
}

impl Parser {
  fn new(
    tokens: Vec<String>,
    today: NaiveDate
  ) -> Self {
    Self {
      tokens,
      pos: 0,
      today
    }
  }

  fn parse_expr(
    &mut self
  ) -> anyhow::Result<Expr> {
    self.parse_or()
  }

  fn parse_or(
    &mut self
  ) -> anyhow::Result<Expr> {
    let mut nodes =
      vec![self.parse_and()?];

    while self.match_any(&["or", "||"])
    {
      nodes.push(self.parse_and()?);
    }

    if nodes.len() == 1 {
      Ok(nodes.remove(0))
    } else {
      Ok(Expr::Or(nodes))
    }
  }

  fn parse_and(
    &mut self
  ) -> anyhow::Result<Expr> {
    let mut nodes =
      vec![self.parse_primary()?];

    loop {
      if self.match_any(&["and", "&&"])
      {
        nodes
          .push(self.parse_primary()?);
        continue;
      }

      if self
        .peek_is_implicit_and_boundary()
      {
        nodes
          .push(self.parse_primary()?);
        continue;
      }

      break;
    }

    if nodes.len() == 1 {
      Ok(nodes.remove(0))
    } else {
      Ok(Expr::And(nodes))
    }
  }

  fn parse_primary(
    &mut self
  ) -> anyhow::Result<Expr> {
    if self.match_token("(") {
      let inner = self.parse_expr()?;
      self.expect_token(")")?;
      return Ok(inner);
    }

    let token = self
      .next_token()
      .ok_or_else(|| {
        anyhow::anyhow!(
          "unexpected end of filter \
           expression"
        )
      })?;

    if token == ")" {
      return Err(anyhow::anyhow!(
        "unexpected ')' in filter \
         expression"
      ));
    }

    let pred =
      parse_atom(&token, self.today)?;
    Ok(Expr::Pred(pred))
  }

  fn ensure_end(
    &self
  ) -> anyhow::Result<()> {
    if self.pos < self.tokens.len() {
      Err(anyhow::anyhow!(
        "unexpected token in filter \
         expression: {}",
        self.tokens[self.pos]
      ))
    } else {
      Ok(())
    }
  }

  fn match_token(
    &mut self,
    expected: &str
  ) -> bool {
    let Some(tok) =
      self.tokens.get(self.pos)
    else {
      return false;
    };
    if tok
      .eq_ignore_ascii_case(expected)
    {
      self.pos += 1;
      true
    } else {
      false
    }
  }

  fn match_any(
    &mut self,
    options: &[&str]
  ) -> bool {
    options
      .iter()
      .any(|opt| self.match_token(opt))
  }

  fn expect_token(
    &mut self,
    expected: &str
  ) -> anyhow::Result<()> {
    if self.match_token(expected) {
      Ok(())
    } else {
      Err(anyhow::anyhow!(
        "expected '{expected}' in \
         filter expression"
      ))
    }
  }

  fn next_token(
    &mut self
  ) -> Option<String> {
    let out = self
      .tokens
      .get(self.pos)
      .cloned();
    if out.is_some() {
      self.pos += 1;
    }
    out
  }

  fn peek_is_implicit_and_boundary(
    &self
  ) -> bool {
    let Some(tok) =
      self.tokens.get(self.pos)
    else {
      return false;
    };

    !tok.eq_ignore_ascii_case("or")
      && !tok.eq_ignore_ascii_case("||")
      && !tok.eq_ignore_ascii_case("and")
      && !tok.eq_ignore_ascii_case("&&")
      && !tok.eq_ignore_ascii_case(")")
  }
}

fn lex_terms(
  terms: &[String]
) -> Vec<String> {
  let mut out = Vec::new();

  for term in terms {
    let mut current = String::new();
    for ch in term.chars() {
      if ch == '(' || ch == ')' {
        if !current.is_empty() {
          out.push(current.clone());
          current.clear();
        }
        out.push(ch.to_string());
      } else {
        current.push(ch);
      }
    }

    if !current.is_empty() {
      out.push(current);
    }
  }

  out
}

fn parse_atom(
  term: &str,
  today: NaiveDate
) -> anyhow::Result<Pred> {
  match term {
    | "+covered" => {
      return Ok(Pred::Covered(true));
    }
    | "-covered" => {
      return Ok(Pred::Covered(false));
    }
    | _ => {}
  }

  if let Some(person) =
    term.strip_prefix("person:")
  {
    return Ok(Pred::PersonIs(
      person.to_string()
    ));
  }

  if let Some(status_text) =
    term.strip_prefix("status:")
  {
    return Ok(Pred::StatusEq(
      status_text.parse()?
    ));
  }

  if let Some(value) =
    term.strip_prefix("from:")
  {
    return Ok(Pred::EndsOnOrAfter(
      parse_date_expr(value, today)?
    ));
  }

  if let Some(value) =
    term.strip_prefix("to:")
  {
    return Ok(Pred::StartsOnOrBefore(
      parse_date_expr(value, today)?
    ));
  }

  if let Some(value) =
    term.strip_prefix("replacement:")
  {
    return Ok(
      Pred::ReplacementContains(
        value.to_string()
      )
    );
  }

  Ok(Pred::NameContains(
    term.to_string()
  ))
}

fn eval_expr(
  expr: &Expr,
  vacation: &Vacation,
  owner: Option<(usize, &Person)>
) -> bool {
  match expr {
    | Expr::True => true,
    | Expr::Pred(pred) => {
      eval_pred(pred, vacation, owner)
    }
    | Expr::And(nodes) => {
      nodes.iter().all(|node| {
        eval_expr(node, vacation, owner)
      })
    }
    | Expr::Or(nodes) => {
      nodes.iter().any(|node| {
        eval_expr(node, vacation, owner)
      })
    }
  }
}

fn eval_pred(
  pred: &Pred,
  vacation: &Vacation,
  owner: Option<(usize, &Person)>
) -> bool {
  let ok = match pred {
    | Pred::PersonIs(selector) => {
      owner
        .map(|(number, person)| {
          person_matches(
            selector, number, person
          )
        })
        .unwrap_or(false)
    }
    | Pred::StatusEq(status) => {
      vacation.status == *status
    }
    | Pred::EndsOnOrAfter(day) => {
      vacation.span.end() >= *day
    }
    | Pred::StartsOnOrBefore(day) => {
      vacation.span.start() <= *day
    }
    | Pred::ReplacementContains(
      text
    ) => {
      vacation
        .replacement
        .to_lowercase()
        .contains(&text.to_lowercase())
    }
    | Pred::Covered(wanted) => {
      vacation.is_covered() == *wanted
    }
    | Pred::NameContains(text) => {
      owner
        .map(|(_, person)| {
          person
            .name
            .to_lowercase()
            .contains(
              &text.to_lowercase()
            )
        })
        .unwrap_or(false)
    }
  };

  trace!(pred = ?pred, vacation = %vacation.id, ok, "filter predicate evaluation");
  ok
}

fn person_matches(
  selector: &str,
  number: usize,
  person: &Person
) -> bool {
  if let Ok(wanted) =
    selector.parse::<usize>()
  {
    return wanted == number;
  }
  person
    .name
    .to_lowercase()
    .starts_with(
      &selector.to_lowercase()
    )
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::Filter;
  use crate::calendar::DateRange;
  use crate::model::{
    PERSON_PALETTE,
    Person,
    Vacation,
    VacationStatus
  };

  fn ymd(
    y: i32,
    m: u32,
    d: u32
  ) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d)
      .expect("valid date")
  }

  fn vacation(
    person: &Person,
    start: NaiveDate,
    end: NaiveDate,
    status: VacationStatus
  ) -> Vacation {
    Vacation::new(
      person.id,
      DateRange::new(start, end)
        .expect("span"),
      status
    )
  }

  fn parse(terms: &[&str]) -> Filter {
    let terms: Vec<String> = terms
      .iter()
      .map(|t| t.to_string())
      .collect();
    Filter::parse(&terms, ymd(2026, 1, 1))
      .expect("parse filter")
  }

  #[test]
  fn empty_filter_matches_everything() {
    let ana = Person::new(
      "Ana".to_string(),
      PERSON_PALETTE[0]
    );
    let v = vacation(
      &ana,
      ymd(2026, 3, 10),
      ymd(2026, 3, 15),
      VacationStatus::Confirmed
    );
    let filter = parse(&[]);
    assert!(filter.is_empty());
    assert!(filter.matches(&v, None));
  }

  #[test]
  fn person_and_status_terms_combine() {
    let ana = Person::new(
      "Ana".to_string(),
      PERSON_PALETTE[0]
    );
    let bo = Person::new(
      "Bo".to_string(),
      PERSON_PALETTE[1]
    );
    let ana_tentative = vacation(
      &ana,
      ymd(2026, 3, 10),
      ymd(2026, 3, 15),
      VacationStatus::Tentative
    );
    let bo_confirmed = vacation(
      &bo,
      ymd(2026, 3, 12),
      ymd(2026, 3, 13),
      VacationStatus::Confirmed
    );

    let filter =
      parse(&["person:an", "status:tentative"]);
    assert!(filter.matches(
      &ana_tentative,
      Some((1, &ana))
    ));
    assert!(!filter.matches(
      &bo_confirmed,
      Some((2, &bo))
    ));

    let either = parse(&[
      "(person:2",
      "or",
      "status:tentative)"
    ]);
    assert!(either.matches(
      &bo_confirmed,
      Some((2, &bo))
    ));
    assert!(either.matches(
      &ana_tentative,
      Some((1, &ana))
    ));
  }

  #[test]
  fn date_bounds_select_overlapping_vacations() {
    let ana = Person::new(
      "Ana".to_string(),
      PERSON_PALETTE[0]
    );
    let march = vacation(
      &ana,
      ymd(2026, 3, 10),
      ymd(2026, 3, 15),
      VacationStatus::Confirmed
    );

    assert!(parse(&["from:2026-03-15", "to:2026-03-31"])
      .matches(&march, Some((1, &ana))));
    assert!(!parse(&["from:2026-03-16"])
      .matches(&march, Some((1, &ana))));
    assert!(!parse(&["to:2026-03-09"])
      .matches(&march, Some((1, &ana))));
  }

  #[test]
  fn coverage_terms() {
    let ana = Person::new(
      "Ana".to_string(),
      PERSON_PALETTE[0]
    );
    let mut covered = vacation(
      &ana,
      ymd(2026, 3, 10),
      ymd(2026, 3, 15),
      VacationStatus::Confirmed
    );
    covered.replacement =
      "Bo Reyes".to_string();

    assert!(parse(&["+covered"])
      .matches(&covered, Some((1, &ana))));
    assert!(!parse(&["-covered"])
      .matches(&covered, Some((1, &ana))));
    assert!(parse(&["replacement:reyes"])
      .matches(&covered, Some((1, &ana))));
  }

  #[test]
  fn rejects_bad_status_and_unbalanced_parens() {
    let terms =
      vec!["status:maybe".to_string()];
    assert!(
      Filter::parse(&terms, ymd(2026, 1, 1))
        .is_err()
    );

    let terms = vec!["(ana".to_string()];
    assert!(
      Filter::parse(&terms, ymd(2026, 1, 1))
        .is_err()
    );
  }
}
