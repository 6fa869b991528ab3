use crate::models::{Category, CategoryRequest};
use chrono::{DateTime, Utc};
use database::{self, RepositoryError};
use sqlx::FromRow;

#[derive(FromRow)]
struct CategoryRecord {
    id: i64,
    name: String,
    description: Option<String>,
    created_date: DateTime<Utc>,
}

impl From<CategoryRecord> for Category {
    fn from(record: CategoryRecord) -> Self {
        Category {
            id: record.id,
            name: record.name,
            description: record.description,
            created_date: record.created_date,
        }
    }
}

pub(crate) struct CategoryRepository<'a> {
    conn: &'a mut database::Connection,
}

impl<'a> CategoryRepository<'a> {
    pub fn new(conn: &'a mut database::Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&mut self, req: &CategoryRequest, created_date: DateTime<Utc>) -> Result<i64, RepositoryError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (name, description, created_date) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(req.name())
        .bind(req.description())
        .bind(created_date)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(id)
    }

    pub async fn list(&mut self) -> Result<Vec<Category>, RepositoryError> {
        let records = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, description, created_date FROM categories ORDER BY name",
        )
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(records.into_iter().map(|r| r.into()).collect())
    }

    pub async fn find_by_id(&mut self, id: i64) -> Result<Option<Category>, RepositoryError> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, description, created_date FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(record.map(|r| r.into()))
    }

    pub async fn find_by_name(&mut self, name: &str) -> Result<Option<Category>, RepositoryError> {
        let record = sqlx::query_as::<_, CategoryRecord>(
            "SELECT id, name, description, created_date FROM categories WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(record.map(|r| r.into()))
    }

    pub async fn update(&mut self, id: i64, req: &CategoryRequest) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE categories SET name = $1, description = $2 WHERE id = $3")
            .bind(req.name())
            .bind(req.description())
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    pub async fn count_transactions(&mut self, id: i64) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE category_id = $1")
            .bind(id)
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(count)
    }

    pub async fn delete(&mut self, id: i64) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}
