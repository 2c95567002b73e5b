//! Search engine - linear scan over the in-memory dataset / 搜索引擎
//!
//! Matching is case-insensitive substring matching:
//! - query: name OR composition OR uses / 名称、成分、用途任一匹配
//! - manufacturer: AND-ed with the query / 厂商过滤
//! - status: active / discontinued / all / 停产状态过滤
//!
//! Results keep dataset order and are capped at `limit`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::tokenizer::normalize_for_search;
use crate::dataset::{Dataset, Discontinued, MedicineRecord};

pub const DEFAULT_LIMIT: usize = 50;

/// Discontinued-status filter / 停产状态过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Discontinued,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Discontinued => "discontinued",
        }
    }

    fn accepts(&self, status: Discontinued) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == Discontinued::No,
            StatusFilter::Discontinued => status == Discontinued::Yes,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "discontinued" => Ok(StatusFilter::Discontinued),
            other => Err(format!("Unknown discontinued filter: {}", other)),
        }
    }
}

/// Search query options / 搜索查询选项
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free text matched against name, composition and uses / 搜索关键词
    pub query: String,
    /// Manufacturer substring (empty means any) / 厂商
    pub manufacturer: String,
    pub status: StatusFilter,
    /// Maximum number of results to return / 最大返回结果数
    pub limit: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self::new("")
    }
}

impl SearchQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            manufacturer: String::new(),
            status: StatusFilter::All,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Does a record satisfy the query/manufacturer/status predicate
fn matches(record: &MedicineRecord, query: &str, manufacturer: &str, status: StatusFilter) -> bool {
    if !query.is_empty() {
        let hit = record.name.to_lowercase().contains(query)
            || record.composition.to_lowercase().contains(query)
            || record.uses.to_lowercase().contains(query);
        if !hit {
            return false;
        }
    }

    if !manufacturer.is_empty() && !record.manufacturer.to_lowercase().contains(manufacturer) {
        return false;
    }

    status.accepts(record.is_discontinued)
}

/// Run a search over the dataset / 执行搜索
///
/// With neither a query nor a manufacturer filter nothing is returned, so an
/// empty form never dumps the whole dataset.
pub fn search<'a>(dataset: &'a Dataset, opts: &SearchQuery) -> Vec<&'a MedicineRecord> {
    let query = normalize_for_search(&opts.query);
    let manufacturer = normalize_for_search(&opts.manufacturer);

    if query.is_empty() && manufacturer.is_empty() {
        return Vec::new();
    }

    let results: Vec<&MedicineRecord> = dataset
        .iter()
        .filter(|r| matches(r, &query, &manufacturer, opts.status))
        .take(opts.limit)
        .collect();

    tracing::debug!(
        "search q={:?} manufacturer={:?} status={} -> {} hits",
        query,
        manufacturer,
        opts.status.as_str(),
        results.len()
    );

    results
}
