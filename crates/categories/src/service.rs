use crate::ledger::{self, LedgerRepository};
use crate::models::{Category, CategoryRequest, CategorySummary};
use crate::repository::CategoryRepository;
use chrono::Utc;
use database::{RepositoryError, Database};
use rust_decimal::Decimal;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum CategoryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    Infrastructure(String),
    #[error("Category already exists: {0}")]
    Conflict(String),
    #[error("Category not found")]
    NotFound,
    #[error("Category in use: {0}")]
    InUse(String),
}

impl From<RepositoryError> for CategoryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => CategoryError::NotFound,
            RepositoryError::UniqueViolation(msg) => CategoryError::Conflict(msg),
            RepositoryError::CheckViolation(msg) => CategoryError::InvalidInput(msg),
            RepositoryError::ForeignKeyViolation(msg) => CategoryError::InUse(msg),
            RepositoryError::Infrastructure(e) => CategoryError::Infrastructure(e.to_string()),
            _ => CategoryError::Infrastructure(err.to_string()),
        }
    }
}

pub struct CategoryService;

impl CategoryService {
    #[instrument(skip(db))]
    pub async fn create_category(
        db: &Database,
        name: String,
        description: Option<String>,
    ) -> Result<Category, CategoryError> {
        let req = CategoryRequest::new(name, description)
            .map_err(CategoryError::InvalidInput)?;

        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        if repo.find_by_name(req.name()).await?.is_some() {
            return Err(CategoryError::Conflict(format!(
                "Category with name '{}' already exists",
                req.name()
            )));
        }

        let id = repo.create(&req, Utc::now()).await?;
        let category = repo.find_by_id(id).await?
            .ok_or(CategoryError::NotFound)?;

        uow.commit().await?;

        tracing::info!(category_id = id, "Created category");
        Ok(category)
    }

    #[instrument(skip(db))]
    pub async fn update_category(
        db: &Database,
        id: i64,
        name: String,
        description: Option<String>,
    ) -> Result<Category, CategoryError> {
        let req = CategoryRequest::new(name, description)
            .map_err(CategoryError::InvalidInput)?;

        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        if repo.find_by_id(id).await?.is_none() {
            return Err(CategoryError::NotFound);
        }

        if let Some(existing) = repo.find_by_name(req.name()).await? {
            if existing.id != id {
                return Err(CategoryError::Conflict(format!(
                    "Another category with name '{}' already exists",
                    req.name()
                )));
            }
        }

        repo.update(id, &req).await?;
        let category = repo.find_by_id(id).await?
            .ok_or(CategoryError::NotFound)?;

        uow.commit().await?;
        Ok(category)
    }

    /// Refuses while any transaction still points at the category; those must
    /// be reassigned or cleared first.
    #[instrument(skip(db))]
    pub async fn delete_category(
        db: &Database,
        id: i64,
    ) -> Result<(), CategoryError> {
        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        let category = repo.find_by_id(id).await?
            .ok_or(CategoryError::NotFound)?;

        let in_use = repo.count_transactions(id).await?;
        if in_use > 0 {
            return Err(CategoryError::InUse(format!(
                "Cannot delete category '{}' because it has {} associated transactions. Please reassign or remove these transactions first.",
                category.name, in_use
            )));
        }

        repo.delete(id).await?;

        uow.commit().await?;
        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn list_categories(db: &Database) -> Result<Vec<CategorySummary>, CategoryError> {
        let mut uow = db.begin().await?;

        let categories = CategoryRepository::new(uow.connection()).list().await?;
        let entries = LedgerRepository::new(uow.connection()).categorized_entries().await?;
        let totals = ledger::totals_by_category(&entries)?;

        let summaries = categories
            .into_iter()
            .map(|c| {
                let (count, spending) = totals.get(&c.id).copied().unwrap_or((0, Decimal::ZERO));
                CategorySummary::new(c, count, spending)
            })
            .collect();

        Ok(summaries)
    }

    #[instrument(skip(db))]
    pub async fn get_category(db: &Database, id: i64) -> Result<Category, CategoryError> {
        let mut uow = db.begin().await?;
        let mut repo = CategoryRepository::new(uow.connection());

        let category = repo.find_by_id(id).await?
            .ok_or(CategoryError::NotFound)?;

        Ok(category)
    }

    #[instrument(skip(db))]
    pub async fn get_category_summary(db: &Database, id: i64) -> Result<CategorySummary, CategoryError> {
        let mut uow = db.begin().await?;

        let category = CategoryRepository::new(uow.connection())
            .find_by_id(id)
            .await?
            .ok_or(CategoryError::NotFound)?;
        let entries = LedgerRepository::new(uow.connection())
            .entries_for_category(id)
            .await?;

        Ok(CategorySummary::new(
            category,
            entries.len() as i64,
            ledger::total_spending(&entries)?,
        ))
    }
}
