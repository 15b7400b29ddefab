//! Daily calendar and price forward fill.
//!
//! The simulator walks every calendar day between the first and last ranking
//! date, weekends included. Prices only exist on trading days, so each
//! ticker's observed series is projected onto that calendar with the last
//! known adjusted close carried forward.
//!
//! The simulator prices buys, sells and valuations from the filled series,
//! so a non-trading day inherits the last close. Only the buy-and-hold
//! baseline's first and last valid dates require an observed price
//! ([`crate::TickerSeries::has_price_on`]).

use chrono::NaiveDate;
use dcd_portfolio::Micros;

use crate::PriceSeries;

/// Inclusive `[first, last]` range of consecutive days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyCalendar {
    first: NaiveDate,
    last: NaiveDate,
}

impl DailyCalendar {
    /// `None` when `first > last`.
    pub fn span(first: NaiveDate, last: NaiveDate) -> Option<Self> {
        (first <= last).then_some(Self { first, last })
    }

    /// Calendar covering the min and max of `dates`; `None` if empty.
    pub fn covering<I>(dates: I) -> Option<Self>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut it = dates.into_iter();
        let head = it.next()?;
        let (lo, hi) = it.fold((head, head), |(lo, hi), d| (lo.min(d), hi.max(d)));
        Self::span(lo, hi)
    }

    pub fn first(&self) -> NaiveDate {
        self.first
    }

    pub fn last(&self) -> NaiveDate {
        self.last
    }

    pub fn len(&self) -> usize {
        (self.last - self.first).num_days() as usize + 1
    }

    /// Never true; a calendar holds at least one day.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first <= date && date <= self.last
    }

    /// Zero-based position of `date`.
    pub fn offset(&self, date: NaiveDate) -> Option<usize> {
        self.contains(date)
            .then(|| (date - self.first).num_days() as usize)
    }

    /// Every day in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        self.first.iter_days().take(self.len())
    }
}

/// A price series projected onto a [`DailyCalendar`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledPrices {
    calendar: DailyCalendar,
    values: Vec<Option<Micros>>,
}

impl FilledPrices {
    /// Price on `date`; `None` outside the calendar or before the first
    /// known observation.
    pub fn get(&self, date: NaiveDate) -> Option<Micros> {
        self.calendar
            .offset(date)
            .and_then(|i| self.values.get(i).copied().flatten())
    }

    pub fn calendar(&self) -> &DailyCalendar {
        &self.calendar
    }
}

/// Carry the last observation at or before each calendar day forward.
///
/// Observations dated before the calendar start seed the first day; days
/// before any observation stay empty.
pub fn forward_fill(prices: &PriceSeries, calendar: &DailyCalendar) -> FilledPrices {
    let mut last = prices
        .range(..calendar.first())
        .next_back()
        .map(|(_, px)| *px);
    let values = calendar
        .days()
        .map(|day| {
            if let Some(px) = prices.get(&day) {
                last = Some(*px);
            }
            last
        })
        .collect();
    FilledPrices {
        calendar: *calendar,
        values,
    }
}
