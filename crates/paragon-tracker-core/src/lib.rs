//! Record model, validation, and aggregation for the paragon match tracker.
//!
//! Everything in this crate is pure: it never touches storage. The store crate
//! persists [`RecordInput`] values and hands back [`MatchRecord`] rows, and the
//! [`stats`] module derives win-rate tables and the rating series from them.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

pub mod stats;

pub use stats::{
    analyze, format_winrate, paragon_breakdowns, rating_series, winrate, Analysis,
    MatchupCounters, ParagonBreakdown, RatingPoint, RatingSeries, WinRateLine,
    OVERALL_LABEL, RATING_SERIES_THRESHOLD, TICK_TARGET,
};

const DATE_LAYOUT: &str = "[day padding:none]/[month padding:none]/[year]";

/// Playable paragon names accepted by `--known-roster`.
pub const KNOWN_PARAGONS: [&str; 15] = [
    "Catherine",
    "Lemieux",
    "ADHQ",
    "Workshop",
    "Arak",
    "Jahn",
    "Brand",
    "Niamh",
    "NewDawn",
    "Nehemiah",
    "Gaffar",
    "Shoshanna",
    "Gnaeus",
    "Aetio",
    "Scipius",
];

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum RecordError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("format error: {0}")]
    Format(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TurnOrder {
    /// On the play.
    #[serde(rename = "OTP")]
    First,
    /// On the draw.
    #[serde(rename = "OTD")]
    Second,
}

impl TurnOrder {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "OTP",
            Self::Second => "OTD",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "OTP" => Some(Self::First),
            "OTD" => Some(Self::Second),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MatchResult {
    Win,
    Lose,
}

impl MatchResult {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Win => "WIN",
            Self::Lose => "LOSE",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "WIN" => Some(Self::Win),
            "LOSE" => Some(Self::Lose),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_win(self) -> bool {
        matches!(self, Self::Win)
    }
}

/// Calendar date written as day/month/year.
///
/// Parsing accepts one or two digit day and month components and a four
/// digit year; rendering is always zero padded (`07/03/2024`).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MatchDate(Date);

impl MatchDate {
    /// Parses a strict `D/M/YYYY` date.
    ///
    /// # Errors
    /// Returns [`RecordError::Validation`] when the text uses any character
    /// other than digits and `/`, does not match the layout, or names a day
    /// that does not exist in the calendar (such as `31/02/2024` or any day
    /// in year zero).
    pub fn parse(value: &str) -> Result<Self, RecordError> {
        if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit() || ch == '/') {
            return Err(RecordError::Validation(format!(
                "date MUST be day/month/year digits: {value:?}"
            )));
        }

        let layout = time::format_description::parse(DATE_LAYOUT)
            .map_err(|err| RecordError::Format(format!("invalid date layout: {err}")))?;

        let date = Date::parse(value, &layout)
            .map_err(|err| RecordError::Validation(format!("invalid date {value:?}: {err}")))?;
        if date.year() < 1 {
            return Err(RecordError::Validation(format!(
                "date year MUST be at least 1: {value:?}"
            )));
        }
        Ok(Self(date))
    }

    #[must_use]
    pub fn date(self) -> Date {
        self.0
    }
}

impl Display for MatchDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:02}/{:02}/{:04}",
            self.0.day(),
            u8::from(self.0.month()),
            self.0.year()
        )
    }
}

impl FromStr for MatchDate {
    type Err = RecordError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for MatchDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MatchDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Known character names a paragon field must belong to.
///
/// An empty roster disables the membership check, leaving only the
/// alphabetic requirement.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
#[serde(transparent)]
pub struct Roster {
    names: BTreeSet<String>,
}

impl Roster {
    #[must_use]
    pub fn unrestricted() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn known() -> Self {
        Self::from_names(KNOWN_PARAGONS)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Decodes a roster from a JSON array of names.
    ///
    /// # Errors
    /// Returns [`RecordError::Format`] when the value is not an array of strings.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, RecordError> {
        serde_json::from_value(value.clone()).map_err(|err| {
            RecordError::Format(format!("roster MUST be a JSON array of names: {err}"))
        })
    }

    #[must_use]
    pub fn is_enforced(&self) -> bool {
        !self.names.is_empty()
    }

    #[must_use]
    pub fn admits(&self, name: &str) -> bool {
        !self.is_enforced() || self.names.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Searchable record columns, in table order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    MyParagon,
    OppParagon,
    TurnOrder,
    Result,
    MyMmr,
    Date,
}

impl RecordField {
    pub const ALL: [Self; 6] = [
        Self::MyParagon,
        Self::OppParagon,
        Self::TurnOrder,
        Self::Result,
        Self::MyMmr,
        Self::Date,
    ];

    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::MyParagon => "my_paragon",
            Self::OppParagon => "opp_paragon",
            Self::TurnOrder => "turn_order",
            Self::Result => "result",
            Self::MyMmr => "my_mmr",
            Self::Date => "date",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.column() == value)
    }
}

/// The six raw values a user typed, in column order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct RecordFields {
    pub my_paragon: String,
    pub opp_paragon: String,
    pub turn_order: String,
    pub result: String,
    pub my_mmr: String,
    pub date: String,
}

impl RecordFields {
    /// Applies every record rule and returns the typed record.
    ///
    /// # Errors
    /// Returns [`RecordError::Validation`] naming the first rule that failed.
    /// Callers facing users should report a generic message instead.
    pub fn parse(&self, roster: &Roster) -> Result<RecordInput, RecordError> {
        check_paragon("my_paragon", &self.my_paragon, roster)?;
        check_paragon("opp_paragon", &self.opp_paragon, roster)?;

        let turn_order = TurnOrder::parse(&self.turn_order).ok_or_else(|| {
            RecordError::Validation("turn_order MUST be OTP or OTD".to_string())
        })?;
        let result = MatchResult::parse(&self.result)
            .ok_or_else(|| RecordError::Validation("result MUST be WIN or LOSE".to_string()))?;
        let my_mmr = parse_rating(&self.my_mmr)?;
        let date = MatchDate::parse(&self.date)?;

        Ok(RecordInput {
            my_paragon: self.my_paragon.clone(),
            opp_paragon: self.opp_paragon.clone(),
            turn_order,
            result,
            my_mmr,
            date,
        })
    }
}

/// A record that passed validation and is ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RecordInput {
    pub my_paragon: String,
    pub opp_paragon: String,
    pub turn_order: TurnOrder,
    pub result: MatchResult,
    pub my_mmr: u32,
    pub date: MatchDate,
}

/// A persisted record.
///
/// `my_mmr` is `None` when the stored cell is not a non-negative integer,
/// which only happens for rows written outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct MatchRecord {
    pub id: i64,
    pub my_paragon: String,
    pub opp_paragon: String,
    pub turn_order: TurnOrder,
    pub result: MatchResult,
    pub my_mmr: Option<u32>,
    pub date: MatchDate,
}

impl MatchRecord {
    #[must_use]
    pub fn from_input(id: i64, input: &RecordInput) -> Self {
        Self {
            id,
            my_paragon: input.my_paragon.clone(),
            opp_paragon: input.opp_paragon.clone(),
            turn_order: input.turn_order,
            result: input.result,
            my_mmr: Some(input.my_mmr),
            date: input.date,
        }
    }
}

/// Boolean form of [`RecordFields::parse`].
#[must_use]
pub fn is_valid_record(fields: &RecordFields, roster: &Roster) -> bool {
    fields.parse(roster).is_ok()
}

#[must_use]
pub fn is_valid_date(value: &str) -> bool {
    MatchDate::parse(value).is_ok()
}

fn check_paragon(field: &str, value: &str, roster: &Roster) -> Result<(), RecordError> {
    if value.is_empty() || !value.chars().all(char::is_alphabetic) {
        return Err(RecordError::Validation(format!(
            "{field} MUST be a non-empty alphabetic name"
        )));
    }

    if !roster.admits(value) {
        return Err(RecordError::Validation(format!(
            "{field} {value:?} is not in the configured roster"
        )));
    }

    Ok(())
}

fn parse_rating(value: &str) -> Result<u32, RecordError> {
    if value.is_empty() || !value.chars().all(|ch| ch.is_ascii_digit()) {
        return Err(RecordError::Validation(
            "my_mmr MUST contain decimal digits only".to_string(),
        ));
    }

    value
        .parse::<u32>()
        .map_err(|err| RecordError::Validation(format!("my_mmr out of range: {err}")))
}
