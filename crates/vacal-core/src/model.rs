use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::calendar::{DateRange, OwnedSpan, Span};
use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PersonId(Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VacationId(Uuid);

impl PersonId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl VacationId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        short_uuid(f, &self.0)
    }
}

impl fmt::Display for VacationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        short_uuid(f, &self.0)
    }
}

fn short_uuid(f: &mut fmt::Formatter<'_>, uuid: &Uuid) -> fmt::Result {
    let simple = uuid.simple().to_string();
    f.write_str(simple.get(..8).unwrap_or(&simple))
}

/// A display color, always `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
}

impl Color {
    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn rgb(self) -> (u8, u8, u8) {
        (self.r, self.g, self.b)
    }

    /// Rough perceived brightness, used to pick a readable foreground.
    pub fn is_light(self) -> bool {
        let luma = 299 * u32::from(self.r) + 587 * u32::from(self.g) + 114 * u32::from(self.b);
        luma > 150_000
    }
}

impl Default for Color {
    fn default() -> Self {
        PERSON_PALETTE[0]
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let hex = raw.strip_prefix('#').unwrap_or(raw);
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::InvalidColor(raw.to_string()));
        }

        let channel = |idx: usize| {
            u8::from_str_radix(&hex[idx..idx + 2], 16)
                .map_err(|_| ValidationError::InvalidColor(raw.to_string()))
        };

        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Offered when a person is added; the first entry is the default.
pub const PERSON_PALETTE: [Color; 8] = [
    Color::from_rgb(0xFF, 0x6B, 0x6B),
    Color::from_rgb(0x4E, 0xCD, 0xC4),
    Color::from_rgb(0x45, 0xB7, 0xD1),
    Color::from_rgb(0xFF, 0xA0, 0x7A),
    Color::from_rgb(0x98, 0xD8, 0xC8),
    Color::from_rgb(0xF7, 0xDC, 0x6F),
    Color::from_rgb(0xBB, 0x8F, 0xCE),
    Color::from_rgb(0x85, 0xC1, 0xE2),
];

/// Offered when recoloring an existing person.
pub const RECOLOR_PALETTE: [Color; 16] = [
    Color::from_rgb(0xFF, 0x2E, 0x63),
    Color::from_rgb(0x00, 0x66, 0xFF),
    Color::from_rgb(0x00, 0xC9, 0x00),
    Color::from_rgb(0xFF, 0xCC, 0x00),
    Color::from_rgb(0x99, 0x33, 0xFF),
    Color::from_rgb(0xFF, 0x88, 0x00),
    Color::from_rgb(0xFF, 0x14, 0x93),
    Color::from_rgb(0x00, 0xCC, 0xCC),
    Color::from_rgb(0x8B, 0x45, 0x13),
    Color::from_rgb(0x00, 0x33, 0x80),
    Color::from_rgb(0xCC, 0xFF, 0x00),
    Color::from_rgb(0xFF, 0x00, 0xFF),
    Color::from_rgb(0x4B, 0x00, 0x82),
    Color::from_rgb(0xFF, 0xD7, 0x00),
    Color::from_rgb(0xDC, 0x14, 0x3C),
    Color::from_rgb(0x20, 0xB2, 0xAA),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Person {
    pub id: PersonId,
    pub name: String,
    pub color: Color,
}

impl Person {
    pub fn new(name: String, color: Color) -> Self {
        Self {
            id: PersonId::new_v4(),
            name,
            color,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum VacationStatus {
    #[default]
    Confirmed,
    Tentative,
}

impl VacationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "Confirmed",
            Self::Tentative => "Tentative",
        }
    }
}

impl fmt::Display for VacationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VacationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "confirmed" | "c" => Ok(Self::Confirmed),
            "tentative" | "t" => Ok(Self::Tentative),
            other => Err(anyhow::anyhow!(
                "invalid status: {other} (expected confirmed or tentative)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Vacation {
    pub id: VacationId,
    pub person_id: PersonId,
    pub span: DateRange,
    pub status: VacationStatus,
    pub replacement: String,
}

impl Vacation {
    pub fn new(person_id: PersonId, span: DateRange, status: VacationStatus) -> Self {
        Self {
            id: VacationId::new_v4(),
            person_id,
            span,
            status,
            replacement: String::new(),
        }
    }

    /// Days away, counting both the first and the last day.
    pub fn day_count(&self) -> i64 {
        self.span.len_days()
    }

    pub fn is_covered(&self) -> bool {
        !self.replacement.trim().is_empty()
    }
}

impl Span for Vacation {
    fn start(&self) -> NaiveDate {
        self.span.start()
    }

    fn end(&self) -> NaiveDate {
        self.span.end()
    }
}

impl OwnedSpan for Vacation {
    type Owner = PersonId;

    fn owner(&self) -> PersonId {
        self.person_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn colors_parse_with_or_without_hash() {
        let color: Color = "#ff6b6b".parse().expect("valid color");
        assert_eq!(color, PERSON_PALETTE[0]);
        assert_eq!(color.to_string(), "#FF6B6B");

        let bare: Color = "0066FF".parse().expect("valid color");
        assert_eq!(bare.rgb(), (0x00, 0x66, 0xFF));
    }

    #[test]
    fn malformed_colors_are_rejected() {
        for raw in ["", "#12345", "#GGGGGG", "red", "#1234567"] {
            assert!(raw.parse::<Color>().is_err(), "{raw} should fail");
        }
    }

    #[test]
    fn status_defaults_to_confirmed() {
        assert_eq!(VacationStatus::default(), VacationStatus::Confirmed);
        assert_eq!(
            "TENTATIVE".parse::<VacationStatus>().expect("status"),
            VacationStatus::Tentative
        );
        assert!("maybe".parse::<VacationStatus>().is_err());
    }

    #[test]
    fn vacation_day_count_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2026, 3, 10).expect("date");
        let end = NaiveDate::from_ymd_opt(2026, 3, 15).expect("date");
        let span = DateRange::new(start, end).expect("span");
        let vacation = Vacation::new(PersonId::new_v4(), span, VacationStatus::Confirmed);
        assert_eq!(vacation.day_count(), 6);
        assert!(!vacation.is_covered());
    }
}
