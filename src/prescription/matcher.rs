//! Prescription text matcher / 处方文本匹配
//!
//! Matches OCR output against dataset medicine names:
//! - full lowercased name contained in the text -> high
//! - at least two significant name words contained -> medium
//! - otherwise a "Capitalized Words 500 mg" pattern -> low, not in dataset

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::ocr::OcrError;
use crate::dataset::{Dataset, MedicineRecord};

/// Index used for entries that do not point at a dataset row / 非数据集条目
pub const NOT_IN_DATASET: i64 = -1;

pub const MAX_MATCHES: usize = 10;
/// Characters of raw text echoed back when nothing matched
pub const TEXT_PREVIEW_CHARS: usize = 200;

/// Full-name matches need names longer than this / 全名匹配的最短长度
const MIN_FULL_NAME_CHARS: usize = 5;
const MIN_WORD_CHARS: usize = 3;
const MIN_WORD_HITS: usize = 2;

static DOSAGE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)\s+(\d+\s*(?:mg|ml|mcg|g))\b")
        .expect("dosage pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMedicine {
    pub name: String,
    pub index: i64,
    pub confidence: Confidence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

impl ExtractedMedicine {
    fn from_record(record: &MedicineRecord, confidence: Confidence) -> Self {
        Self {
            name: record.name.clone(),
            index: record.index as i64,
            confidence,
            composition: Some(record.composition.clone()),
            note: None,
            extracted_text: None,
        }
    }

    /// Low-confidence entry that is not a dataset row / 占位条目
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: NOT_IN_DATASET,
            confidence: Confidence::Low,
            composition: None,
            note: None,
            extracted_text: None,
        }
    }
}

fn match_record(record: &MedicineRecord, text_lower: &str) -> Option<Confidence> {
    let name = record.name.to_lowercase();

    if name.chars().count() > MIN_FULL_NAME_CHARS && text_lower.contains(name.as_str()) {
        return Some(Confidence::High);
    }

    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() > 1 {
        let hits = words
            .iter()
            .filter(|w| w.chars().count() > MIN_WORD_CHARS && text_lower.contains(*w))
            .count();
        if hits >= MIN_WORD_HITS {
            return Some(Confidence::Medium);
        }
    }

    None
}

fn dosage_candidates(text: &str) -> Vec<ExtractedMedicine> {
    DOSAGE_PATTERN
        .captures_iter(text)
        .map(|caps| {
            let mut m = ExtractedMedicine::placeholder(format!("{} {}", &caps[1], &caps[2]));
            m.note = Some("Extracted but not found in database".to_string());
            m
        })
        .collect()
}

/// Match medicines mentioned in already-extracted prescription text / 从文本中识别药品
pub fn extract_medicines(dataset: &Dataset, text: &str) -> Vec<ExtractedMedicine> {
    let text = text.trim();
    if text.is_empty() {
        return vec![ExtractedMedicine::placeholder("No text extracted")];
    }

    let text_lower = text.to_lowercase();
    let mut found: Vec<ExtractedMedicine> = dataset
        .iter()
        .filter_map(|r| match_record(r, &text_lower).map(|c| ExtractedMedicine::from_record(r, c)))
        .collect();

    if found.is_empty() {
        found = dosage_candidates(text);
    }

    let mut seen = HashSet::new();
    found.retain(|m| seen.insert(m.name.clone()));
    found.truncate(MAX_MATCHES);

    if found.is_empty() {
        let mut none = ExtractedMedicine::placeholder("No medicines identified");
        none.extracted_text = Some(text.chars().take(TEXT_PREVIEW_CHARS).collect());
        return vec![none];
    }

    tracing::debug!("prescription matcher found {} medicines", found.len());
    found
}

/// Turn an OCR outcome into match results; OCR failures become a single entry
pub fn analyze_ocr_result(dataset: &Dataset, ocr: Result<String, OcrError>) -> Vec<ExtractedMedicine> {
    match ocr {
        Ok(text) => extract_medicines(dataset, &text),
        Err(e) => {
            tracing::warn!("OCR failed: {}", e);
            vec![ExtractedMedicine::placeholder(format!("Error processing image: {}", e))]
        }
    }
}
