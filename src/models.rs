use serde::{Deserialize, Serialize};

use crate::prescription::ExtractedMedicine;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub last_login: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserInfo {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            created_at: u.created_at,
        }
    }
}

/// Filters stored alongside a saved search / 保存的搜索过滤条件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default = "default_discontinued")]
    pub discontinued: String,
}

fn default_discontinued() -> String {
    "all".to_string()
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            manufacturer: String::new(),
            discontinued: default_discontinued(),
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SavedSearchRow {
    pub id: i64,
    pub user_id: String,
    pub query: String,
    pub filters: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SavedSearch {
    pub id: i64,
    pub query: String,
    pub filters: SearchFilters,
    pub created_at: String,
}

impl From<SavedSearchRow> for SavedSearch {
    fn from(row: SavedSearchRow) -> Self {
        // 旧数据或损坏的JSON退回默认过滤条件
        let filters = row
            .filters
            .as_deref()
            .and_then(|f| serde_json::from_str(f).ok())
            .unwrap_or_default();
        Self {
            id: row.id,
            query: row.query,
            filters,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ComparisonRow {
    pub id: i64,
    pub user_id: String,
    pub medicine_indices: String,
    pub title: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub id: i64,
    pub medicine_indices: Vec<i64>,
    pub title: String,
    pub created_at: String,
}

pub const UNTITLED_COMPARISON: &str = "Untitled Comparison";

/// Parse "1, 2,3" into indices / 解析逗号分隔的索引
///
/// Only the syntax is checked here; range checks happen against the dataset.
pub fn parse_indices(raw: &str) -> Result<Vec<i64>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| format!("Invalid medicine index: {}", s)))
        .collect()
}

pub fn join_indices(indices: &[i64]) -> String {
    indices.iter().map(|i| i.to_string()).collect::<Vec<_>>().join(",")
}

impl From<ComparisonRow> for Comparison {
    fn from(row: ComparisonRow) -> Self {
        Self {
            id: row.id,
            medicine_indices: parse_indices(&row.medicine_indices).unwrap_or_default(),
            title: row.title.unwrap_or_else(|| UNTITLED_COMPARISON.to_string()),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PrescriptionRow {
    pub id: i64,
    pub user_id: Option<String>,
    pub filename: String,
    pub filepath: String,
    pub extracted_medicines: Option<String>,
    pub uploaded_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Prescription {
    pub id: i64,
    pub filename: String,
    pub extracted_medicines: Vec<ExtractedMedicine>,
    pub uploaded_at: String,
}

impl From<PrescriptionRow> for Prescription {
    fn from(row: PrescriptionRow) -> Self {
        Self {
            id: row.id,
            filename: row.filename,
            extracted_medicines: row
                .extracted_medicines
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default(),
            uploaded_at: row.uploaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indices() {
        assert_eq!(parse_indices("1, 2,3,").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_indices("").unwrap(), Vec::<i64>::new());
        assert!(parse_indices("1,x").is_err());
        assert_eq!(parse_indices("0,-1").unwrap(), vec![0, -1]);
        assert_eq!(join_indices(&[4, 0, 9]), "4,0,9");
    }

    #[test]
    fn test_saved_search_bad_filters_fall_back() {
        let row = SavedSearchRow {
            id: 1,
            user_id: "u".into(),
            query: "aspirin".into(),
            filters: Some("not json".into()),
            created_at: "now".into(),
        };
        let s = SavedSearch::from(row);
        assert_eq!(s.filters.discontinued, "all");
        assert_eq!(s.filters.manufacturer, "");
    }

    #[test]
    fn test_comparison_default_title() {
        let row = ComparisonRow {
            id: 2,
            user_id: "u".into(),
            medicine_indices: "3,1".into(),
            title: None,
            created_at: "now".into(),
        };
        let c = Comparison::from(row);
        assert_eq!(c.title, UNTITLED_COMPARISON);
        assert_eq!(c.medicine_indices, vec![3, 1]);
    }
}
