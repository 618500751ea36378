//! Win-rate breakdowns and the rating time series.
//!
//! Both views are recomputed from the full record log on every call and never
//! mutate their input.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{MatchRecord, MatchResult, TurnOrder};

/// Ratings at or below this value are left out of the rating series.
pub const RATING_SERIES_THRESHOLD: u32 = 1000;

/// Long series show roughly this many axis ticks.
pub const TICK_TARGET: usize = 10;

/// Label of the synthetic per-paragon total row.
pub const OVERALL_LABEL: &str = "Overall";

/// Percentage of `wins` over `matches`, or `0.0` when there were no matches.
#[must_use]
pub fn winrate(wins: u32, matches: u32) -> f64 {
    if matches == 0 {
        return 0.0;
    }
    f64::from(wins) / f64::from(matches) * 100.0
}

#[must_use]
pub fn format_winrate(value: f64) -> String {
    format!("{value:.1}%")
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct MatchupCounters {
    pub otp_matches: u32,
    pub otp_wins: u32,
    pub otd_matches: u32,
    pub otd_wins: u32,
}

impl MatchupCounters {
    pub fn record(&mut self, turn_order: TurnOrder, result: MatchResult) {
        let win = u32::from(result.is_win());
        match turn_order {
            TurnOrder::First => {
                self.otp_matches += 1;
                self.otp_wins += win;
            }
            TurnOrder::Second => {
                self.otd_matches += 1;
                self.otd_wins += win;
            }
        }
    }

    pub fn absorb(&mut self, other: &Self) {
        self.otp_matches += other.otp_matches;
        self.otp_wins += other.otp_wins;
        self.otd_matches += other.otd_matches;
        self.otd_wins += other.otd_wins;
    }

    #[must_use]
    pub fn total_matches(&self) -> u32 {
        self.otp_matches + self.otd_matches
    }

    #[must_use]
    pub fn total_wins(&self) -> u32 {
        self.otp_wins + self.otd_wins
    }

    #[must_use]
    pub fn total_winrate(&self) -> f64 {
        winrate(self.total_wins(), self.total_matches())
    }

    #[must_use]
    pub fn otp_winrate(&self) -> f64 {
        winrate(self.otp_wins, self.otp_matches)
    }

    #[must_use]
    pub fn otd_winrate(&self) -> f64 {
        winrate(self.otd_wins, self.otd_matches)
    }
}

/// One row of a paragon's win-rate table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WinRateLine {
    pub opponent: String,
    pub total_matches: u32,
    pub total_wins: u32,
    pub total_winrate: f64,
    pub otp_matches: u32,
    pub otp_wins: u32,
    pub otp_winrate: f64,
    pub otd_matches: u32,
    pub otd_wins: u32,
    pub otd_winrate: f64,
}

impl WinRateLine {
    #[must_use]
    pub fn from_counters(opponent: impl Into<String>, counters: &MatchupCounters) -> Self {
        Self {
            opponent: opponent.into(),
            total_matches: counters.total_matches(),
            total_wins: counters.total_wins(),
            total_winrate: counters.total_winrate(),
            otp_matches: counters.otp_matches,
            otp_wins: counters.otp_wins,
            otp_winrate: counters.otp_winrate(),
            otd_matches: counters.otd_matches,
            otd_wins: counters.otd_wins,
            otd_winrate: counters.otd_winrate(),
        }
    }
}

/// Win-rate table for one of the tracked player's paragons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParagonBreakdown {
    pub paragon: String,
    pub overall: WinRateLine,
    pub matchups: Vec<WinRateLine>,
}

impl ParagonBreakdown {
    #[must_use]
    pub fn matchup(&self, opponent: &str) -> Option<&WinRateLine> {
        self.matchups.iter().find(|line| line.opponent == opponent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct RatingPoint {
    pub date: String,
    pub rating: u32,
}

/// Ratings above [`RATING_SERIES_THRESHOLD`] in record order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Eq, PartialEq)]
pub struct RatingSeries {
    pub points: Vec<RatingPoint>,
}

impl RatingSeries {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = &str> {
        self.points.iter().map(|point| point.date.as_str())
    }

    pub fn ratings(&self) -> impl Iterator<Item = u32> + '_ {
        self.points.iter().map(|point| point.rating)
    }

    /// Indices of the points that get an axis label.
    ///
    /// Every point is labelled up to [`TICK_TARGET`] points; past that only
    /// every `len / TICK_TARGET`-th point is.
    #[must_use]
    pub fn tick_indices(&self) -> Vec<usize> {
        let len = self.points.len();
        if len <= TICK_TARGET {
            return (0..len).collect();
        }
        (0..len).step_by(len / TICK_TARGET).collect()
    }

    #[must_use]
    pub fn tick_labels(&self) -> Vec<(usize, &str)> {
        self.tick_indices()
            .into_iter()
            .filter_map(|index| {
                self.points
                    .get(index)
                    .map(|point| (index, point.date.as_str()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub breakdowns: Vec<ParagonBreakdown>,
    pub rating_series: RatingSeries,
}

impl Analysis {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakdowns.is_empty() && self.rating_series.is_empty()
    }

    #[must_use]
    pub fn breakdown(&self, paragon: &str) -> Option<&ParagonBreakdown> {
        self.breakdowns.iter().find(|item| item.paragon == paragon)
    }
}

/// Groups records by paragon, then opponent, keeping first-seen order.
#[must_use]
pub fn paragon_breakdowns(records: &[MatchRecord]) -> Vec<ParagonBreakdown> {
    let mut groups: Vec<(&str, Vec<(&str, MatchupCounters)>)> = Vec::new();
    let mut group_index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let slot = *group_index
            .entry(record.my_paragon.as_str())
            .or_insert_with(|| {
                groups.push((record.my_paragon.as_str(), Vec::new()));
                groups.len() - 1
            });
        let opponents = &mut groups[slot].1;

        let position = match opponents
            .iter()
            .position(|(name, _)| *name == record.opp_paragon)
        {
            Some(position) => position,
            None => {
                opponents.push((record.opp_paragon.as_str(), MatchupCounters::default()));
                opponents.len() - 1
            }
        };
        opponents[position].1.record(record.turn_order, record.result);
    }

    groups
        .into_iter()
        .map(|(paragon, opponents)| {
            let mut total = MatchupCounters::default();
            for (_, counters) in &opponents {
                total.absorb(counters);
            }

            ParagonBreakdown {
                paragon: paragon.to_string(),
                overall: WinRateLine::from_counters(OVERALL_LABEL, &total),
                matchups: opponents
                    .iter()
                    .map(|(name, counters)| WinRateLine::from_counters(*name, counters))
                    .collect(),
            }
        })
        .collect()
}

/// Rating points strictly above the threshold, in the order given.
///
/// Records without a numeric rating are skipped.
#[must_use]
pub fn rating_series(records: &[MatchRecord]) -> RatingSeries {
    let points = records
        .iter()
        .filter_map(|record| {
            let rating = record.my_mmr?;
            (rating > RATING_SERIES_THRESHOLD).then(|| RatingPoint {
                date: record.date.to_string(),
                rating,
            })
        })
        .collect();

    RatingSeries { points }
}

#[must_use]
pub fn analyze(records: &[MatchRecord]) -> Analysis {
    Analysis {
        breakdowns: paragon_breakdowns(records),
        rating_series: rating_series(records),
    }
}
