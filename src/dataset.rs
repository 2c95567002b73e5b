//! Medicine dataset store / 药品数据集
//!
//! The CSV file is read once at startup into an immutable [`Dataset`].
//! Row positions are the external identifiers used by every API, so rows
//! are never re-sorted or filtered after loading. / 行号即对外ID，加载后不再改变

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Placeholder for missing name / manufacturer / composition / 缺失值占位
pub const UNKNOWN: &str = "Unknown";
/// Placeholder for missing uses / side effects
pub const NOT_SPECIFIED: &str = "Not specified";

/// Keywords counted by [`Dataset::category_counts`] / 分类关键词
pub const CATEGORY_KEYWORDS: [&str; 7] = [
    "pain",
    "fever",
    "infection",
    "diabetes",
    "pressure",
    "cardiac",
    "respiratory",
];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),
}

/// Discontinued flag / 停产状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Discontinued {
    Yes,
    No,
}

impl Discontinued {
    /// Parse a raw CSV cell; anything not clearly "yes" is treated as active
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("yes") | Some("true") | Some("1") => Discontinued::Yes,
            _ => Discontinued::No,
        }
    }

    pub fn is_discontinued(self) -> bool {
        self == Discontinued::Yes
    }
}

/// One medicine row / 一条药品记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicineRecord {
    pub index: usize,
    pub name: String,
    pub manufacturer: String,
    pub composition: String,
    pub uses: String,
    pub side_effects: String,
    pub is_discontinued: Discontinued,
    pub pack_size_label: String,
}

impl MedicineRecord {
    /// Build a record, filling placeholders the same way the CSV loader does
    pub fn new(
        index: usize,
        name: &str,
        manufacturer: &str,
        composition: &str,
        uses: &str,
        is_discontinued: Discontinued,
    ) -> Self {
        Self {
            index,
            name: or_placeholder(Some(name), UNKNOWN),
            manufacturer: or_placeholder(Some(manufacturer), UNKNOWN),
            composition: or_placeholder(Some(composition), UNKNOWN),
            uses: or_placeholder(Some(uses), NOT_SPECIFIED),
            side_effects: NOT_SPECIFIED.to_string(),
            is_discontinued,
            pack_size_label: String::new(),
        }
    }
}

/// Raw CSV row; unknown columns are ignored / 原始CSV行
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    manufacturer: Option<String>,
    #[serde(default)]
    composition: Option<String>,
    #[serde(default)]
    uses: Option<String>,
    #[serde(default)]
    side_effects: Option<String>,
    #[serde(default)]
    is_discontinued: Option<String>,
    #[serde(default)]
    pack_size_label: Option<String>,
}

fn or_placeholder(value: Option<&str>, placeholder: &str) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => placeholder.to_string(),
    }
}

impl CsvRow {
    fn into_record(self, index: usize) -> MedicineRecord {
        MedicineRecord {
            index,
            name: or_placeholder(self.name.as_deref(), UNKNOWN),
            manufacturer: or_placeholder(self.manufacturer.as_deref(), UNKNOWN),
            composition: or_placeholder(self.composition.as_deref(), UNKNOWN),
            uses: or_placeholder(self.uses.as_deref(), NOT_SPECIFIED),
            side_effects: or_placeholder(self.side_effects.as_deref(), NOT_SPECIFIED),
            is_discontinued: Discontinued::parse(self.is_discontinued.as_deref()),
            pack_size_label: self.pack_size_label.unwrap_or_default().trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManufacturerCount {
    pub manufacturer: String,
    pub count: usize,
}

/// Aggregate statistics / 数据集统计
#[derive(Debug, Clone, Serialize)]
pub struct DatasetStats {
    pub total_medicines: usize,
    pub total_manufacturers: usize,
    pub discontinued_count: usize,
    pub active_count: usize,
    pub top_manufacturers: Vec<ManufacturerCount>,
}

/// Read-only in-memory medicine table / 只读内存药品表
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<MedicineRecord>,
}

impl Dataset {
    /// Build from records; indices are reassigned to match positions
    pub fn from_records(records: Vec<MedicineRecord>) -> Self {
        let records = records
            .into_iter()
            .enumerate()
            .map(|(i, mut r)| {
                r.index = i;
                r
            })
            .collect();
        Self { records }
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let records = rdr
            .deserialize::<CsvRow>()
            .enumerate()
            .map(|(i, row)| row.map(|r| r.into_record(i)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let file = std::fs::File::open(path.as_ref())?;
        let dataset = Self::from_reader(file)?;
        tracing::info!("Loaded {} medicines from {:?}", dataset.len(), path.as_ref());
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MedicineRecord> {
        self.records.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MedicineRecord> {
        self.records.iter()
    }

    /// Sorted unique manufacturer names / 厂商列表（去重排序）
    pub fn manufacturers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.records.iter().map(|r| r.manufacturer.clone()).collect();
        names.sort();
        names.dedup();
        names
    }

    /// Medicines per manufacturer, most common first (ties by name)
    pub fn manufacturer_counts(&self) -> Vec<ManufacturerCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for r in &self.records {
            *counts.entry(r.manufacturer.as_str()).or_insert(0) += 1;
        }
        let mut counts: Vec<ManufacturerCount> = counts
            .into_iter()
            .map(|(m, c)| ManufacturerCount { manufacturer: m.to_string(), count: c })
            .collect();
        counts.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.manufacturer.cmp(&b.manufacturer)));
        counts
    }

    pub fn stats(&self) -> DatasetStats {
        let discontinued_count = self
            .records
            .iter()
            .filter(|r| r.is_discontinued.is_discontinued())
            .count();
        let mut top_manufacturers = self.manufacturer_counts();
        let total_manufacturers = top_manufacturers.len();
        top_manufacturers.truncate(10);

        DatasetStats {
            total_medicines: self.records.len(),
            total_manufacturers,
            discontinued_count,
            active_count: self.records.len() - discontinued_count,
            top_manufacturers,
        }
    }

    /// Count medicines whose uses mention each category keyword / 按用途关键词计数
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        CATEGORY_KEYWORDS
            .iter()
            .map(|kw| {
                let n = self
                    .records
                    .iter()
                    .filter(|r| r.uses.to_lowercase().contains(kw))
                    .count();
                (kw.to_string(), n)
            })
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}
