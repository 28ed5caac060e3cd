//! Ranking of candidate (weekday, hour) slots by forecast congestion

use crate::config::SuggestionConfig;
use crate::ml::{Prediction, SlotForecast};

/// Monday through Friday (0=Sunday)
pub const DEFAULT_DAYS: [u32; 5] = [1, 2, 3, 4, 5];
/// Morning and evening commuting hours
pub const DEFAULT_HOURS: [u32; 6] = [7, 8, 9, 16, 17, 18];
pub const DEFAULT_TOP: usize = 10;

/// Candidate grid and result size for a ranking run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuggestionOptions {
    pub days: Vec<u32>,
    pub hours: Vec<u32>,
    pub top: usize,
}

impl Default for SuggestionOptions {
    fn default() -> Self {
        Self {
            days: DEFAULT_DAYS.to_vec(),
            hours: DEFAULT_HOURS.to_vec(),
            top: DEFAULT_TOP,
        }
    }
}

impl From<&SuggestionConfig> for SuggestionOptions {
    fn from(config: &SuggestionConfig) -> Self {
        Self {
            days: config.days.clone(),
            hours: config.hours.clone(),
            top: config.top,
        }
    }
}

impl SuggestionOptions {
    /// Every day of the week at every hour, keeping `top` unlimited
    pub fn full_week() -> Self {
        Self {
            days: (0..7).collect(),
            hours: (0..24).collect(),
            top: usize::MAX,
        }
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }

    /// Candidate slots, days outer and hours inner
    pub fn grid(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.days
            .iter()
            .flat_map(|&day| self.hours.iter().map(move |&hour| (day, hour)))
    }

    pub fn grid_size(&self) -> usize {
        self.days.len() * self.hours.len()
    }
}

/// Predict every grid slot and return the `top` busiest, highest value first.
///
/// The sort is stable, so equal values keep their grid order. The first
/// prediction error aborts the ranking.
pub fn top_suggestions<F, E>(
    mut predict: F,
    options: &SuggestionOptions,
) -> Result<Vec<SlotForecast>, E>
where
    F: FnMut(u32, u32) -> Result<Prediction, E>,
{
    let mut ranked = Vec::with_capacity(options.grid_size());
    for (weekday, hour_slot) in options.grid() {
        let prediction = predict(weekday, hour_slot)?;
        ranked.push(SlotForecast::new(weekday, hour_slot, prediction));
    }

    ranked.sort_by(|a, b| b.value.total_cmp(&a.value));
    ranked.truncate(options.top);
    Ok(ranked)
}
