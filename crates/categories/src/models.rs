use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 500;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_date: DateTime<Utc>,
}

/// A category together with the aggregates derived from its transactions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_date: DateTime<Utc>,
    pub transaction_count: i64,
    pub total_spending: Decimal,
}

impl CategorySummary {
    pub fn new(category: Category, transaction_count: i64, total_spending: Decimal) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            created_date: category.created_date,
            transaction_count,
            total_spending,
        }
    }
}

// Validated name/description pair, shared by create and rename.
#[derive(Debug, Serialize)]
pub struct CategoryRequest {
    name: String,
    description: Option<String>,
}

#[derive(Deserialize)]
pub struct RawCategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

impl CategoryRequest {
    pub fn new(name: String, description: Option<String>) -> Result<Self, String> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err("Category name cannot be empty".to_string());
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(format!("Category name cannot exceed {} characters", MAX_NAME_LEN));
        }

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            if d.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(format!(
                    "Category description cannot exceed {} characters",
                    MAX_DESCRIPTION_LEN
                ));
            }
        }

        Ok(Self { name, description })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySpending {
    pub year: i32,
    pub month: u32,
    pub month_name: String,
    pub total_spending: Decimal,
    pub transaction_count: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategorySpending {
    pub category_id: i64,
    pub category_name: String,
    pub total_spending: Decimal,
    pub transaction_count: i64,
    pub monthly_breakdown: Vec<MonthlySpending>,
}
