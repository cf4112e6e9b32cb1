// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::ConsignError;

/// Most images a single form may hold.
pub const MAX_IMAGES: usize = 3;

/// Fewest images a submission needs.
pub const MIN_IMAGES: usize = 3;

/// A picked image held by a form session, in selection order.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRef {
    pub id: Uuid,
    pub filename: Option<String>,
    pub content_type: String,
    pub size: usize,
    #[serde(skip)]
    pub data: Bytes,
    pub added_at: DateTime<Utc>,
}

impl ImageRef {
    pub fn new(filename: Option<String>, content_type: String, data: Bytes) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            content_type,
            size: data.len(),
            data,
            added_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Unused,
    LightlyUsed,
    HeavilyUsed,
}

impl Condition {
    pub const ALL: [Condition; 3] = [
        Condition::Unused,
        Condition::LightlyUsed,
        Condition::HeavilyUsed,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Condition::Unused => "unused",
            Condition::LightlyUsed => "lightly_used",
            Condition::HeavilyUsed => "heavily_used",
        }
    }

    /// Label shown in the condition dropdown.
    pub fn label(&self) -> &'static str {
        match self {
            Condition::Unused => "사용감 없음",
            Condition::LightlyUsed => "약간의 사용감",
            Condition::HeavilyUsed => "많은 사용감",
        }
    }

    /// Parses a dropdown selection. An empty selection means "unset".
    pub fn parse_selection(value: &str) -> Result<Option<Condition>, ConsignError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(None);
        }
        value.parse().map(Some)
    }
}

impl FromStr for Condition {
    type Err = ConsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::ALL
            .into_iter()
            .find(|c| c.id() == s || c.label() == s)
            .ok_or_else(|| ConsignError::InvalidValue(format!("unknown condition '{}'", s)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProductInfo {
    pub item_name: String,
    pub model_name: String,
    pub condition: Option<Condition>,
}

impl ProductInfo {
    pub fn set_item_name(&mut self, text: &str) {
        self.item_name = strip_digits(text);
    }

    pub fn set_model_name(&mut self, text: &str) {
        self.model_name = strip_digits(text);
    }

    pub fn set_condition(&mut self, condition: Option<Condition>) {
        self.condition = condition;
    }
}

fn strip_digits(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Outcome of one analysis run. Produced once per submission and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub is_fake: bool,
    pub details: AnalysisDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AnalysisDetails {
    /// Per-image detections, in selection order, up to and including the first fake.
    PerImage(Vec<ImageDetection>),
    /// Raw payload returned by the batch classifier.
    Payload(serde_json::Value),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageDetection {
    pub image_id: Uuid,
    pub filename: Option<String>,
    pub category: String,
    pub bbox: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Normal,
    Risky,
}

impl FromStr for ItemStatus {
    type Err = ConsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(ItemStatus::Normal),
            "risky" => Ok(ItemStatus::Risky),
            other => Err(ConsignError::InvalidValue(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// A consignment listing shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListedItem {
    pub id: String,
    pub seller: String,
    pub product_name: String,
    pub date: NaiveDate,
    pub status: ItemStatus,
    pub thumbnail: String,
}

/// Dashboard time-range filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeRange {
    #[default]
    TwelveMonths,
    SixMonths,
    ThirtyDays,
    SevenDays,
}

impl TimeRange {
    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::TwelveMonths => "12 Months",
            TimeRange::SixMonths => "6 Months",
            TimeRange::ThirtyDays => "30 Days",
            TimeRange::SevenDays => "7 Days",
        }
    }

    /// Number of points on the chart for this range.
    pub fn bucket_count(&self) -> usize {
        match self {
            TimeRange::TwelveMonths => 12,
            TimeRange::SixMonths => 6,
            TimeRange::ThirtyDays => 4,
            TimeRange::SevenDays => 7,
        }
    }

    /// First day (inclusive) covered by the range when viewed on `today`.
    /// Month ranges start on the first of the oldest month.
    pub fn start(&self, today: NaiveDate) -> NaiveDate {
        let start = match self {
            TimeRange::TwelveMonths | TimeRange::SixMonths => today
                .with_day(1)
                .and_then(|first| first.checked_sub_months(Months::new(self.bucket_count() as u32 - 1))),
            TimeRange::ThirtyDays => today.checked_sub_days(Days::new(29)),
            TimeRange::SevenDays => today.checked_sub_days(Days::new(6)),
        };
        start.unwrap_or(NaiveDate::MIN)
    }

    pub fn contains(&self, date: NaiveDate, today: NaiveDate) -> bool {
        date >= self.start(today) && date <= today
    }

    /// Chart bucket `date` falls into, oldest bucket first.
    pub fn bucket_of(&self, date: NaiveDate, today: NaiveDate) -> Option<usize> {
        if !self.contains(date, today) {
            return None;
        }
        let last = self.bucket_count() - 1;
        let days_ago = (today - date).num_days() as usize;

        let index = match self {
            TimeRange::TwelveMonths | TimeRange::SixMonths => {
                let months_ago = (today.year() - date.year()) * 12 + today.month() as i32
                    - date.month() as i32;
                last - months_ago as usize
            }
            // the oldest week absorbs the two leftover days
            TimeRange::ThirtyDays => last - (days_ago / 7).min(last),
            TimeRange::SevenDays => last - days_ago,
        };
        Some(index)
    }

    /// Axis labels, oldest first: month names, `W1`..`W4`, or weekday names.
    pub fn bucket_labels(&self, today: NaiveDate) -> Vec<String> {
        let start = self.start(today);
        (0..self.bucket_count())
            .map(|i| match self {
                TimeRange::TwelveMonths | TimeRange::SixMonths => start
                    .checked_add_months(Months::new(i as u32))
                    .map(|d| d.format("%b").to_string())
                    .unwrap_or_default(),
                TimeRange::ThirtyDays => format!("W{}", i + 1),
                TimeRange::SevenDays => start
                    .checked_add_days(Days::new(i as u64))
                    .map(|d| d.format("%a").to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }
}

impl FromStr for TimeRange {
    type Err = ConsignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            TimeRange::TwelveMonths,
            TimeRange::SixMonths,
            TimeRange::ThirtyDays,
            TimeRange::SevenDays,
        ]
        .into_iter()
        .find(|r| r.label().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| ConsignError::InvalidValue(format!("unknown time range '{}'", s)))
    }
}
