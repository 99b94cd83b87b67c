use anyhow::anyhow;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::calendar::DateRange;
use crate::error::{ValidationError, validate_name};
use crate::model::{Color, Person, PersonId, Vacation, VacationId, VacationStatus};

/// The in-memory state tree: everyone on the team and their vacations.
///
/// Insertion order is display order. Nothing here outlives the session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Planner {
    people: Vec<Person>,
    vacations: Vec<Vacation>,
}

/// What a cascade delete took with it.
#[derive(Debug, Clone)]
pub struct RemovedPerson {
    pub person: Person,
    pub vacations: Vec<Vacation>,
}

/// Fields to change on an existing vacation; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct VacationPatch {
    pub span: Option<DateRange>,
    pub status: Option<VacationStatus>,
    pub replacement: Option<String>,
}

impl VacationPatch {
    pub fn is_empty(&self) -> bool {
        self.span.is_none() && self.status.is_none() && self.replacement.is_none()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn people(&self) -> &[Person] {
        &self.people
    }

    pub fn vacations(&self) -> &[Vacation] {
        &self.vacations
    }

    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.people.iter().find(|person| person.id == id)
    }

    pub fn vacation(&self, id: VacationId) -> Option<&Vacation> {
        self.vacations.iter().find(|vacation| vacation.id == id)
    }

    pub fn vacations_for(&self, id: PersonId) -> impl Iterator<Item = &Vacation> {
        self.vacations
            .iter()
            .filter(move |vacation| vacation.person_id == id)
    }

    #[instrument(skip(self))]
    pub fn add_person(&mut self, name: &str, color: Color) -> anyhow::Result<PersonId> {
        let name = validate_name(name)?;
        let person = Person::new(name, color);
        let id = person.id;
        info!(person = %id, name = %person.name, color = %color, "person added");
        self.people.push(person);
        Ok(id)
    }

    #[instrument(skip(self))]
    pub fn rename_person(&mut self, id: PersonId, name: &str) -> anyhow::Result<()> {
        let name = validate_name(name)?;
        let person = self.person_mut(id)?;
        debug!(old = %person.name, new = %name, "renaming person");
        person.name = name;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn recolor_person(&mut self, id: PersonId, color: Color) -> anyhow::Result<()> {
        let person = self.person_mut(id)?;
        debug!(old = %person.color, new = %color, "recoloring person");
        person.color = color;
        Ok(())
    }

    /// Removes a person together with every vacation that references them.
    #[instrument(skip(self))]
    pub fn remove_person(&mut self, id: PersonId) -> anyhow::Result<RemovedPerson> {
        let idx = self
            .people
            .iter()
            .position(|person| person.id == id)
            .ok_or_else(|| anyhow!("unknown person id {id}"))?;
        let person = self.people.remove(idx);

        let (removed, kept): (Vec<Vacation>, Vec<Vacation>) = std::mem::take(&mut self.vacations)
            .into_iter()
            .partition(|vacation| vacation.person_id == id);
        self.vacations = kept;

        info!(
            person = %id,
            name = %person.name,
            vacations = removed.len(),
            "person removed"
        );
        Ok(RemovedPerson {
            person,
            vacations: removed,
        })
    }

    #[instrument(skip(self))]
    pub fn add_vacation(
        &mut self,
        person_id: PersonId,
        span: DateRange,
        status: VacationStatus,
    ) -> anyhow::Result<VacationId> {
        if self.person(person_id).is_none() {
            return Err(anyhow!("unknown person id {person_id}"));
        }
        let vacation = Vacation::new(person_id, span, status);
        let id = vacation.id;
        info!(
            vacation = %id,
            person = %person_id,
            start = %span.start(),
            end = %span.end(),
            "vacation added"
        );
        self.vacations.push(vacation);
        Ok(id)
    }

    #[instrument(skip(self, patch))]
    pub fn update_vacation(&mut self, id: VacationId, patch: VacationPatch) -> anyhow::Result<()> {
        let vacation = self
            .vacations
            .iter_mut()
            .find(|vacation| vacation.id == id)
            .ok_or_else(|| anyhow!("unknown vacation id {id}"))?;

        if let Some(span) = patch.span {
            vacation.span = span;
        }
        if let Some(status) = patch.status {
            vacation.status = status;
        }
        if let Some(replacement) = patch.replacement {
            vacation.replacement = replacement.trim().to_string();
        }

        debug!(vacation = %id, "vacation updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn remove_vacation(&mut self, id: VacationId) -> anyhow::Result<Vacation> {
        let idx = self
            .vacations
            .iter()
            .position(|vacation| vacation.id == id)
            .ok_or_else(|| anyhow!("unknown vacation id {id}"))?;
        let removed = self.vacations.remove(idx);
        info!(vacation = %id, "vacation removed");
        Ok(removed)
    }

    /// Finds a person by one-based list number, exact name, or a
    /// case-insensitive name prefix that only one person has.
    pub fn resolve_person(&self, selector: &str) -> Result<&Person, ValidationError> {
        let needle = selector.trim();
        if needle.is_empty() {
            return Err(ValidationError::UnknownPerson(selector.to_string()));
        }

        if let Ok(number) = needle.parse::<usize>() {
            return number
                .checked_sub(1)
                .and_then(|idx| self.people.get(idx))
                .ok_or_else(|| ValidationError::UnknownPerson(needle.to_string()));
        }

        if let Some(exact) = self
            .people
            .iter()
            .find(|person| person.name.eq_ignore_ascii_case(needle))
        {
            return Ok(exact);
        }

        let lowered = needle.to_lowercase();
        let mut matches = self
            .people
            .iter()
            .filter(|person| person.name.to_lowercase().starts_with(&lowered));
        let first = matches
            .next()
            .ok_or_else(|| ValidationError::UnknownPerson(needle.to_string()))?;
        if matches.next().is_some() {
            return Err(ValidationError::AmbiguousPerson(needle.to_string()));
        }
        Ok(first)
    }

    /// Looks up a vacation by its one-based position in [`Planner::vacations`].
    pub fn resolve_vacation(&self, number: usize) -> Result<&Vacation, ValidationError> {
        number
            .checked_sub(1)
            .and_then(|idx| self.vacations.get(idx))
            .ok_or(ValidationError::UnknownVacation(number))
    }

    /// One-based list number of a vacation, as shown in listings.
    pub fn vacation_number(&self, id: VacationId) -> Option<usize> {
        self.vacations
            .iter()
            .position(|vacation| vacation.id == id)
            .map(|idx| idx + 1)
    }

    pub fn person_number(&self, id: PersonId) -> Option<usize> {
        self.people
            .iter()
            .position(|person| person.id == id)
            .map(|idx| idx + 1)
    }

    fn person_mut(&mut self, id: PersonId) -> anyhow::Result<&mut Person> {
        self.people
            .iter_mut()
            .find(|person| person.id == id)
            .ok_or_else(|| anyhow!("unknown person id {id}"))
    }
}
