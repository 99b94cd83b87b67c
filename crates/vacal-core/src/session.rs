use chrono::{Datelike, NaiveDate};
use tracing::{debug, info, instrument, warn};

use crate::calendar::{self, DateRange, ViewMode};
use crate::error::ValidationError;
use crate::model::{Color, Person, PersonId, VacationId, VacationStatus};
use crate::planner::{Planner, RemovedPerson};

/// Everything the front end keeps between two commands: the team data plus
/// which person is selected, which period is on screen, and a removal that
/// is waiting for confirmation.
#[derive(Debug, Clone)]
pub struct Session {
    pub planner: Planner,
    selected: Option<PersonId>,
    pending_removal: Option<PersonId>,
    focus: NaiveDate,
    view: ViewMode,
}

impl Session {
    pub fn new(focus: NaiveDate, view: ViewMode) -> Self {
        Self {
            planner: Planner::new(),
            selected: None,
            pending_removal: None,
            focus,
            view,
        }
    }

    pub fn focus(&self) -> NaiveDate {
        self.focus
    }

    pub fn view(&self) -> ViewMode {
        self.view
    }

    pub fn window(&self) -> DateRange {
        calendar::calendar_date_window(self.view, self.focus)
    }

    pub fn set_view(&mut self, view: ViewMode) {
        debug!(view = view.as_key(), "switching view");
        self.view = view;
    }

    pub fn set_focus(&mut self, focus: NaiveDate) {
        self.focus = focus;
    }

    /// Moves the focus by whole periods of the current view. The focus is
    /// left alone when the move would leave the representable dates.
    pub fn shift(&mut self, step: i32) -> anyhow::Result<NaiveDate> {
        self.focus = calendar::shift_focus(self.view, self.focus, step)
            .ok_or_else(|| anyhow::anyhow!("cannot move the calendar that far from {}", self.focus))?;
        debug!(focus = %self.focus, view = self.view.as_key(), "focus shifted");
        Ok(self.focus)
    }

    /// Same month and day in `year`; Feb 29 becomes Feb 28 off leap years.
    pub fn goto_year(&mut self, year: i32) -> anyhow::Result<()> {
        self.focus = calendar::clamped_date(year, self.focus.month(), self.focus.day())
            .ok_or_else(|| anyhow::anyhow!("year out of range: {year}"))?;
        Ok(())
    }

    pub fn selected(&self) -> Option<&Person> {
        self.selected.and_then(|id| self.planner.person(id))
    }

    pub fn selected_id(&self) -> Option<PersonId> {
        self.selected
    }

    pub fn pending_removal(&self) -> Option<&Person> {
        self.pending_removal.and_then(|id| self.planner.person(id))
    }

    #[instrument(skip(self))]
    pub fn select(&mut self, selector: &str) -> anyhow::Result<&Person> {
        let id = self.planner.resolve_person(selector)?.id;
        self.selected = Some(id);
        self.planner
            .person(id)
            .ok_or_else(|| anyhow::anyhow!("selected person vanished"))
    }

    /// Adds a person; the first one added becomes the selection.
    #[instrument(skip(self))]
    pub fn add_person(&mut self, name: &str, color: Color) -> anyhow::Result<PersonId> {
        let id = self.planner.add_person(name, color)?;
        if self.selected.is_none() {
            self.selected = Some(id);
        }
        Ok(id)
    }

    /// Books a vacation for the selected person.
    #[instrument(skip(self))]
    pub fn add_vacation(
        &mut self,
        span: DateRange,
        status: VacationStatus,
    ) -> anyhow::Result<VacationId> {
        let person = self.selected.ok_or(ValidationError::NoPersonSelected)?;
        self.planner.add_vacation(person, span, status)
    }

    /// First step of removing someone. Falls back to the selection when no
    /// selector is given.
    #[instrument(skip(self))]
    pub fn request_removal(&mut self, selector: Option<&str>) -> anyhow::Result<&Person> {
        let id = match selector {
            Some(selector) => self.planner.resolve_person(selector)?.id,
            None => self.selected.ok_or(ValidationError::NoPersonSelected)?,
        };
        self.pending_removal = Some(id);
        self.planner
            .person(id)
            .ok_or_else(|| anyhow::anyhow!("person to remove vanished"))
    }

    #[instrument(skip(self))]
    pub fn confirm_removal(&mut self) -> anyhow::Result<RemovedPerson> {
        let id = self
            .pending_removal
            .take()
            .ok_or(ValidationError::NoPendingRemoval)?;
        let removed = self.planner.remove_person(id)?;
        if self.selected == Some(id) {
            info!(person = %id, "clearing selection of removed person");
            self.selected = None;
        }
        Ok(removed)
    }

    pub fn cancel_removal(&mut self) -> bool {
        let had_pending = self.pending_removal.take().is_some();
        if !had_pending {
            warn!("cancel requested with nothing pending");
        }
        had_pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PERSON_PALETTE;

    fn session() -> Session {
        let focus = NaiveDate::from_ymd_opt(2026, 3, 15).expect("focus");
        Session::new(focus, ViewMode::Year)
    }

    fn march_span() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2026, 3, 10).expect("start"),
            NaiveDate::from_ymd_opt(2026, 3, 15).expect("end"),
        )
        .expect("span")
    }

    #[test]
    fn booking_requires_a_selection() {
        let mut session = session();
        let err = session
            .add_vacation(march_span(), VacationStatus::Confirmed)
            .expect_err("no selection");
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::NoPersonSelected)
        );
    }

    #[test]
    fn first_person_added_becomes_selected() {
        let mut session = session();
        let ana = session.add_person("Ana", PERSON_PALETTE[0]).expect("ana");
        session.add_person("Bo", PERSON_PALETTE[1]).expect("bo");
        assert_eq!(session.selected_id(), Some(ana));

        session.select("bo").expect("select bo");
        assert_eq!(session.selected().map(|p| p.name.as_str()), Some("Bo"));
    }

    #[test]
    fn confirmed_removal_clears_selection_and_vacations() {
        let mut session = session();
        let ana = session.add_person("Ana", PERSON_PALETTE[0]).expect("ana");
        session
            .add_vacation(march_span(), VacationStatus::Confirmed)
            .expect("vacation");

        let pending = session.request_removal(None).expect("request");
        assert_eq!(pending.id, ana);
        assert!(session.pending_removal().is_some());

        let removed = session.confirm_removal().expect("confirm");
        assert_eq!(removed.vacations.len(), 1);
        assert!(session.selected().is_none());
        assert!(session.planner.vacations().is_empty());
        assert!(session.pending_removal().is_none());
    }

    #[test]
    fn cancelled_removal_keeps_everyone() {
        let mut session = session();
        session.add_person("Ana", PERSON_PALETTE[0]).expect("ana");
        session.request_removal(Some("ana")).expect("request");
        assert!(session.cancel_removal());
        assert!(!session.cancel_removal());
        assert_eq!(session.planner.people().len(), 1);

        let err = session.confirm_removal().expect_err("nothing pending");
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::NoPendingRemoval)
        );
    }

    #[test]
    fn navigation_moves_by_view_period() {
        let mut session = session();
        assert_eq!(session.shift(1).expect("next year").year(), 2027);

        session.set_view(ViewMode::Quarter);
        session.shift(-1).expect("previous quarter");
        assert_eq!(session.focus(), NaiveDate::from_ymd_opt(2026, 12, 15).expect("date"));
        assert_eq!(
            session.window().start(),
            NaiveDate::from_ymd_opt(2026, 10, 1).expect("date")
        );

        session.goto_year(2024).expect("goto");
        assert_eq!(session.focus().year(), 2024);
    }

    #[test]
    fn huge_shift_is_an_error_and_keeps_focus() {
        let mut session = session();
        session.set_view(ViewMode::Month);
        let before = session.focus();
        assert!(session.shift(i32::MAX).is_err());
        assert!(session.shift(i32::MIN).is_err());
        assert_eq!(session.focus(), before);
    }

    #[test]
    fn goto_year_keeps_late_days_of_month() {
        let mut session = Session::new(NaiveDate::from_ymd_opt(2026, 3, 30).expect("date"), ViewMode::Year);
        session.goto_year(2027).expect("goto");
        assert_eq!(session.focus(), NaiveDate::from_ymd_opt(2027, 3, 30).expect("date"));

        session.set_focus(NaiveDate::from_ymd_opt(2024, 2, 29).expect("leap day"));
        session.goto_year(2025).expect("goto");
        assert_eq!(session.focus(), NaiveDate::from_ymd_opt(2025, 2, 28).expect("date"));

        assert!(session.goto_year(i32::MAX).is_err());
    }
}
