pub mod filter;
pub mod fleet;
pub mod image;
pub mod reference;
pub mod repair;
pub mod report;
pub mod train;
pub mod user;
pub mod wagon_type;

use diesel::pg::PgConnection;
use diesel::r2d2::ConnectionManager;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::ServiceError;

pub type ConnectionPool = r2d2::Pool<ConnectionManager<PgConnection>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Rows per page on every paginated listing.
pub const PER_PAGE: i64 = 10;

/// Highest page whose offset still fits a Postgres `BIGINT`.
pub const MAX_PAGE: i64 = i64::MAX / PER_PAGE;

#[derive(Clone)]
pub struct Repo {
    pool: ConnectionPool,
}

impl Repo {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    pub fn connect(database_url: &str) -> Result<Self, ServiceError> {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        let pool = r2d2::Pool::builder().build(manager)?;
        Ok(Self::new(pool))
    }

    /// A pool that opens connections only when first used.
    pub fn lazy(database_url: &str) -> Self {
        let manager = ConnectionManager::<PgConnection>::new(database_url);
        Self::new(r2d2::Pool::builder().build_unchecked(manager))
    }

    /// Runs blocking Diesel work on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, ServiceError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }

    pub fn run_migrations(&self) -> Result<(), ServiceError> {
        let mut conn = self.pool.get()?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        for version in applied {
            log::info!("applied migration {}", version);
        }
        Ok(())
    }
}

/// 1-based page selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(PER_PAGE)
    }
}

/// One page of rows plus the unpaginated row count.
#[derive(Debug)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: Option<PageRequest>,
}

impl<T> Paged<T> {
    pub fn all(items: Vec<T>) -> Self {
        Self {
            total: items.len() as i64,
            items,
            page: None,
        }
    }

    /// Replaces the rows in one batch, keeping the paging data.
    pub fn try_map_items<U, E>(
        self,
        f: impl FnOnce(Vec<T>) -> Result<Vec<U>, E>,
    ) -> Result<Paged<U>, E> {
        Ok(Paged {
            items: f(self.items)?,
            total: self.total,
            page: self.page,
        })
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paged<U> {
        Paged {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_start_at_one() {
        assert_eq!(PageRequest::new(None).offset(), 0);
        assert_eq!(PageRequest::new(Some(0)).page, 1);
        assert_eq!(PageRequest::new(Some(-3)).offset(), 0);
        assert_eq!(PageRequest::new(Some(3)).offset(), 20);
    }

    #[test]
    fn huge_pages_are_clamped() {
        let page = PageRequest::new(Some(i64::MAX));
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.offset() > 0);
        assert_eq!(page.offset(), (MAX_PAGE - 1) * PER_PAGE);
    }
}
