use crate::errors::ConsignError;
use crate::models::*;
use crate::services::submission::lock;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Mutex;

const PLACEHOLDER_THUMBNAIL: &str = "https://via.placeholder.com/50";

/// One point of the dashboard chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesPoint {
    pub label: String,
    pub normal: usize,
    pub risky: usize,
}

/// Chart data for one dashboard time range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemSummary {
    pub range: &'static str,
    pub total: usize,
    pub normal: usize,
    pub risky: usize,
    pub series: Vec<SeriesPoint>,
}

/// In-memory consignment listings behind the dashboard.
#[derive(Default)]
pub struct ItemStore {
    items: Mutex<Vec<ListedItem>>,
    next_id: Mutex<u32>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-filled with the two demo listings.
    pub fn with_demo_items() -> Self {
        let store = Self::new();
        let date = NaiveDate::from_ymd_opt(2025, 3, 6).unwrap_or_default();
        for (id, status) in [("002", ItemStatus::Risky), ("001", ItemStatus::Normal)] {
            store.add(ListedItem {
                id: id.to_string(),
                seller: format!("위탁판매자 {}", id),
                product_name: "루이비통 알마 BB".to_string(),
                date,
                status,
                thumbnail: PLACEHOLDER_THUMBNAIL.to_string(),
            });
        }
        store
    }

    pub fn list(&self) -> Vec<ListedItem> {
        lock(&self.items).clone()
    }

    pub fn add(&self, item: ListedItem) {
        if let Ok(n) = item.id.parse::<u32>() {
            let mut next = lock(&self.next_id);
            *next = (*next).max(n + 1);
        }
        lock(&self.items).push(item);
    }

    /// Lists the outcome of a finished submission under the next free id.
    pub fn record_submission(&self, seller: &str, product: &ProductInfo, is_fake: bool) -> ListedItem {
        let id = {
            let mut next = lock(&self.next_id);
            let id = (*next).max(1);
            *next = id + 1;
            format!("{:03}", id)
        };

        let item = ListedItem {
            id,
            seller: seller.to_string(),
            product_name: product.model_name.trim().to_string(),
            date: Utc::now().date_naive(),
            status: if is_fake {
                ItemStatus::Risky
            } else {
                ItemStatus::Normal
            },
            thumbnail: PLACEHOLDER_THUMBNAIL.to_string(),
        };
        lock(&self.items).push(item.clone());
        item
    }

    pub fn update_status(&self, id: &str, status: ItemStatus) -> Result<ListedItem, ConsignError> {
        let mut items = lock(&self.items);
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| ConsignError::ItemNotFound(id.to_string()))?;
        item.status = status;
        Ok(item.clone())
    }

    fn take(&self, id: &str) -> Result<ListedItem, ConsignError> {
        let mut items = lock(&self.items);
        let pos = items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| ConsignError::ItemNotFound(id.to_string()))?;
        Ok(items.remove(pos))
    }

    pub fn approve(&self, id: &str) -> Result<ListedItem, ConsignError> {
        self.take(id)
    }

    pub fn reject(&self, id: &str) -> Result<ListedItem, ConsignError> {
        self.take(id)
    }

    pub fn filter(
        &self,
        range: TimeRange,
        status: Option<ItemStatus>,
        today: NaiveDate,
    ) -> Vec<ListedItem> {
        lock(&self.items)
            .iter()
            .filter(|item| range.contains(item.date, today))
            .filter(|item| status.is_none_or(|s| item.status == s))
            .cloned()
            .collect()
    }

    pub fn summary(&self, range: TimeRange, today: NaiveDate) -> ItemSummary {
        let mut series: Vec<SeriesPoint> = range
            .bucket_labels(today)
            .into_iter()
            .map(|label| SeriesPoint {
                label,
                normal: 0,
                risky: 0,
            })
            .collect();

        for item in lock(&self.items).iter() {
            let Some(point) = range
                .bucket_of(item.date, today)
                .and_then(|index| series.get_mut(index))
            else {
                continue;
            };
            match item.status {
                ItemStatus::Normal => point.normal += 1,
                ItemStatus::Risky => point.risky += 1,
            }
        }

        let normal = series.iter().map(|p| p.normal).sum::<usize>();
        let risky = series.iter().map(|p| p.risky).sum::<usize>();

        ItemSummary {
            range: range.label(),
            total: normal + risky,
            normal,
            risky,
            series,
        }
    }
}
