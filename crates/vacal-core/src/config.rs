use std::collections::BTreeMap;
use std::fs;
use std::path::{
  Path,
  PathBuf
};

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  Datelike,
  NaiveDate,
  Weekday
};
use tracing::{
  debug,
  info,
  trace,
  warn
};

use crate::calendar::ViewMode;
use crate::datetime::parse_week_start;

const VACALRC_ENV_VAR: &str = "VACALRC";
const DEFAULT_TIMELINE_WIDTH: usize = 60;

#[derive(Debug, Clone)]
pub struct Config {
  map: BTreeMap<String, String>,
  pub loaded_files: Vec<PathBuf>
}

impl Default for Config {
  fn default() -> Self {
    let mut map = BTreeMap::new();
    map.insert(
      "color".to_string(),
      "on".to_string()
    );
    map.insert(
      "calendar.view".to_string(),
      "year".to_string()
    );
    map.insert(
      "calendar.week_start".to_string(),
      "sunday".to_string()
    );
    map.insert(
      "timeline.width".to_string(),
      DEFAULT_TIMELINE_WIDTH.to_string()
    );
    map.insert(
      "default.command".to_string(),
      "year".to_string()
    );

    Self {
      map,
      loaded_files: vec![]
    }
  }
}

impl Config {
  #[tracing::instrument(skip(
    vacalrc_override
  ))]
  pub fn load(
    vacalrc_override: Option<&Path>
  ) -> anyhow::Result<Self> {
    let mut cfg = Config::default();

    let vacalrc = resolve_vacalrc_path(
      vacalrc_override
    )?;
    if let Some(path) = vacalrc {
      info!(vacalrc = %path.display(), "loading vacalrc");
      cfg.load_file(&path)?;
    } else {
      warn!(
        "no vacalrc found; using \
         defaults"
      );
    }

    Ok(cfg)
  }

  #[tracing::instrument(skip(
    self, overrides
  ))]
  pub fn apply_overrides<I>(
    &mut self,
    overrides: I
  ) where
    I: IntoIterator<
      Item = (String, String)
    >
  {
    for (k, v) in overrides {
      let key = k
        .strip_prefix("rc.")
        .unwrap_or(&k)
        .to_string();
      debug!(key = %key, value = %v, "applying override");
      self.map.insert(key, v);
    }
  }

  pub fn get(
    &self,
    key: &str
  ) -> Option<String> {
    self.map.get(key).cloned()
  }

  pub fn get_bool(
    &self,
    key: &str
  ) -> Option<bool> {
    self
      .map
      .get(key)
      .map(|v| parse_bool(v))
  }

  pub fn iter(
    &self
  ) -> impl Iterator<Item = (&String, &String)>
  {
    self.map.iter()
  }

  pub fn view(
    &self
  ) -> anyhow::Result<ViewMode> {
    let raw = self
      .get("calendar.view")
      .unwrap_or_else(|| {
        "year".to_string()
      });
    ViewMode::from_key(&raw).ok_or_else(
      || {
        anyhow!(
          "invalid calendar.view: \
           {raw} (expected year, \
           quarter or month)"
        )
      }
    )
  }

  /// Week start for month grids; only Sunday and Monday are offered.
  pub fn week_start(
    &self
  ) -> anyhow::Result<Weekday> {
    let raw = self
      .get("calendar.week_start")
      .unwrap_or_else(|| {
        "sunday".to_string()
      });
    parse_week_start(&raw).ok_or_else(
      || {
        anyhow!(
          "invalid \
           calendar.week_start: \
           {raw} (expected sunday or \
           monday)"
        )
      }
    )
  }

  pub fn timeline_width(
    &self
  ) -> anyhow::Result<usize> {
    let Some(raw) =
      self.get("timeline.width")
    else {
      return Ok(DEFAULT_TIMELINE_WIDTH);
    };
    let width: usize =
      raw.trim().parse().with_context(
        || {
          format!(
            "invalid timeline.width: \
             {raw}"
          )
        }
      )?;
    if width == 0 {
      return Err(anyhow!(
        "timeline.width must be \
         positive"
      ));
    }
    Ok(width)
  }

  /// Initial focus: January 1st of `calendar.year`, or today when unset.
  pub fn focus(
    &self,
    today: NaiveDate
  ) -> anyhow::Result<NaiveDate> {
    let Some(raw) =
      self.get("calendar.year")
    else {
      return Ok(today);
    };
    let year: i32 =
      raw.trim().parse().with_context(
        || {
          format!(
            "invalid calendar.year: \
             {raw}"
          )
        }
      )?;
    if year == today.year() {
      return Ok(today);
    }
    NaiveDate::from_ymd_opt(year, 1, 1)
      .ok_or_else(|| {
        anyhow!(
          "calendar.year out of \
           range: {year}"
        )
      })
  }

  #[tracing::instrument(skip(self))]
  fn load_file(
    &mut self,
    path: &Path
  ) -> anyhow::Result<()> {
    let path = expand_tilde(path);
    let text =
      fs::read_to_string(&path)
        .with_context(|| {
          format!(
            "failed to read {}",
            path.display()
          )
        })?;

    self
      .loaded_files
      .push(path.clone());

    let base_dir = path
      .parent()
      .map(|p| p.to_path_buf())
      .unwrap_or_else(|| {
        PathBuf::from(".")
      });

    for (line_num, raw_line) in
      text.lines().enumerate()
    {
      let mut line = raw_line.trim();
      if line.is_empty()
        || line.starts_with('#')
      {
        continue;
      }

      if let Some((before, _)) =
        line.split_once('#')
      {
        line = before.trim();
      }

      if line.is_empty() {
        continue;
      }

      if let Some(include_rest) =
        line.strip_prefix("include ")
      {
        let include_path =
          resolve_include_path(
            &base_dir,
            include_rest.trim()
          )?;
        debug!(
            file = %path.display(),
            include = %include_path.display(),
            line = line_num + 1,
            "processing include"
        );

        if include_path.exists() {
          self
            .load_file(&include_path)?;
        } else {
          warn!(include = %include_path.display(), "include file does not exist; skipping");
        }
        continue;
      }

      let (k, v) = line
        .split_once('=')
        .ok_or_else(|| {
          anyhow!(
            "invalid config line \
             {}:{}: {}",
            path.display(),
            line_num + 1,
            raw_line
          )
        })?;

      let key = k.trim().to_string();
      let value = v.trim().to_string();
      trace!(key = %key, value = %value, "loaded config key");
      self.map.insert(key, value);
    }

    Ok(())
  }
}

#[tracing::instrument(skip(
  override_path
))]
fn resolve_vacalrc_path(
  override_path: Option<&Path>
) -> anyhow::Result<Option<PathBuf>> {
  if let Some(path) = override_path {
    return Ok(Some(path.to_path_buf()));
  }

  if let Ok(vacalrc_env) =
    std::env::var(VACALRC_ENV_VAR)
  {
    if vacalrc_env == "/dev/null" {
      return Ok(None);
    }
    return Ok(Some(PathBuf::from(
      vacalrc_env
    )));
  }

  let Some(home) = dirs::home_dir()
  else {
    warn!(
      "cannot determine home \
       directory; skipping ~/.vacalrc"
    );
    return Ok(None);
  };
  let candidate = home.join(".vacalrc");
  if candidate.exists() {
    return Ok(Some(candidate));
  }

  Ok(None)
}

fn resolve_include_path(
  base_dir: &Path,
  include: &str
) -> anyhow::Result<PathBuf> {
  if include.trim().is_empty() {
    return Err(anyhow!(
      "include path cannot be empty"
    ));
  }

  let raw = PathBuf::from(include);
  let expanded = expand_tilde(&raw);
  if expanded.is_absolute() {
    Ok(expanded)
  } else {
    Ok(base_dir.join(expanded))
  }
}

fn expand_tilde(
  path: &Path
) -> PathBuf {
  let text = path.to_string_lossy();
  if let Some(rest) =
    text.strip_prefix("~/")
    && let Some(home) = dirs::home_dir()
  {
    return home.join(rest);
  }
  path.to_path_buf()
}

fn parse_bool(s: &str) -> bool {
  matches!(
    s.trim()
      .to_ascii_lowercase()
      .as_str(),
    "1" | "y" | "yes" | "on" | "true"
  )
}

#[cfg(test)]
mod tests {
  use std::fs;

  use chrono::{
    NaiveDate,
    Weekday
  };
  use tempfile::tempdir;

  use super::Config;
  use crate::calendar::ViewMode;

  #[test]
  fn defaults_without_file() {
    let cfg = Config::default();
    assert_eq!(cfg.get_bool("color"), Some(true));
    assert_eq!(
      cfg.view().expect("view"),
      ViewMode::Year
    );
    assert_eq!(
      cfg.week_start().expect("week start"),
      Weekday::Sun
    );
    assert_eq!(
      cfg.timeline_width().expect("width"),
      60
    );
  }

  #[test]
  fn loads_file_with_comments_and_includes() {
    let dir = tempdir().expect("tempdir");
    let extra = dir.path().join("extra.rc");
    fs::write(
      &extra,
      "timeline.width = 40\n"
    )
    .expect("write include");

    let main = dir.path().join("vacalrc");
    fs::write(
      &main,
      "# team calendar\n\
       calendar.view = month  # start on a month\n\
       calendar.week_start = monday\n\
       include extra.rc\n"
    )
    .expect("write rc");

    let cfg =
      Config::load(Some(&main)).expect("load");
    assert_eq!(cfg.loaded_files.len(), 2);
    assert_eq!(
      cfg.view().expect("view"),
      ViewMode::Month
    );
    assert_eq!(
      cfg.week_start().expect("week start"),
      Weekday::Mon
    );
    assert_eq!(
      cfg.timeline_width().expect("width"),
      40
    );
  }

  #[test]
  fn malformed_line_is_an_error() {
    let dir = tempdir().expect("tempdir");
    let main = dir.path().join("vacalrc");
    fs::write(&main, "color on\n")
      .expect("write rc");
    assert!(Config::load(Some(&main)).is_err());
  }

  #[test]
  fn overrides_strip_rc_prefix() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "rc.calendar.year".to_string(),
        "2030".to_string()
      ),
      (
        "color".to_string(),
        "off".to_string()
      ),
    ]);
    let today =
      NaiveDate::from_ymd_opt(2026, 6, 1)
        .expect("today");
    assert_eq!(
      cfg.focus(today).expect("focus"),
      NaiveDate::from_ymd_opt(2030, 1, 1)
        .expect("jan 1")
    );
    assert_eq!(cfg.get_bool("color"), Some(false));
  }

  #[test]
  fn invalid_values_are_reported() {
    let mut cfg = Config::default();
    cfg.apply_overrides(vec![
      (
        "calendar.view".to_string(),
        "week".to_string()
      ),
      (
        "calendar.week_start".to_string(),
        "friday".to_string()
      ),
      (
        "timeline.width".to_string(),
        "0".to_string()
      ),
    ]);
    assert!(cfg.view().is_err());
    assert!(cfg.week_start().is_err());
    assert!(cfg.timeline_width().is_err());
  }
}
