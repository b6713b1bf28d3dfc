// src/db/pg_store.rs
// DOCUMENTATION: PostgreSQL implementation of the store seam
// PURPOSE: One sqlx transaction per session, all SQL for the entity graph

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use super::store::{EntityKey, EntityStore, StoreError, StoreSession};
use crate::models::{Category, Image, Link, LinkKind, NewImage, User};

const USER_COLUMNS: &str = "id, name, description, version";
const CATEGORY_COLUMNS: &str = "id, name, description, version";
const IMAGE_COLUMNS: &str = "id, description, user_id, file_path, uploaded_at, version";

/// Map sqlx failures onto the store taxonomy
/// DOCUMENTATION: SQLSTATE 23505 unique, 23503 foreign key,
/// 40001/40P01 serialization and deadlock
pub fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => return StoreError::Duplicate(db_err.message().to_string()),
            Some("23503") => return StoreError::ForeignKey(db_err.message().to_string()),
            Some("40001") | Some("40P01") => return StoreError::ConcurrencyConflict,
            _ => {}
        }
    }

    log::error!("Database operation failed: {}", err);
    StoreError::Backend(err.to_string())
}

fn link_select(kind: LinkKind) -> String {
    format!(
        "SELECT id, image_id, {} AS peer_id FROM {}",
        kind.peer_column(),
        kind.table()
    )
}

/// PgStore: sessions backed by a PostgreSQL connection pool
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }
}

/// Open transaction; rolled back by sqlx if dropped before commit
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn conn(&mut self) -> Result<&mut PgConnection, StoreError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| StoreError::Backend("session already committed".to_string()))
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn get_user(&mut self, id: i32) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn get_image(&mut self, id: i32) -> Result<Option<Image>, StoreError> {
        let sql = format!("SELECT {} FROM images WHERE id = $1", IMAGE_COLUMNS);
        sqlx::query_as::<_, Image>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn get_category(&mut self, id: i32) -> Result<Option<Category>, StoreError> {
        let sql = format!("SELECT {} FROM categories WHERE id = $1", CATEGORY_COLUMNS);
        sqlx::query_as::<_, Category>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn get_link(&mut self, kind: LinkKind, id: i32) -> Result<Option<Link>, StoreError> {
        let sql = format!("{} WHERE id = $1", link_select(kind));
        sqlx::query_as::<_, Link>(&sql)
            .bind(id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_users(&mut self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_images(&mut self) -> Result<Vec<Image>, StoreError> {
        let sql = format!("SELECT {} FROM images ORDER BY id", IMAGE_COLUMNS);
        sqlx::query_as::<_, Image>(&sql)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
        let sql = format!("SELECT {} FROM categories ORDER BY id", CATEGORY_COLUMNS);
        sqlx::query_as::<_, Category>(&sql)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_links(&mut self, kind: LinkKind) -> Result<Vec<Link>, StoreError> {
        let sql = format!("{} ORDER BY id", link_select(kind));
        sqlx::query_as::<_, Link>(&sql)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn images_by_user(&mut self, user_id: i32) -> Result<Vec<Image>, StoreError> {
        let sql = format!(
            "SELECT {} FROM images WHERE user_id = $1 ORDER BY id",
            IMAGE_COLUMNS
        );
        sqlx::query_as::<_, Image>(&sql)
            .bind(user_id)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn links_by_image(
        &mut self,
        kind: LinkKind,
        image_id: i32,
    ) -> Result<Vec<Link>, StoreError> {
        let sql = format!("{} WHERE image_id = $1 ORDER BY id", link_select(kind));
        sqlx::query_as::<_, Link>(&sql)
            .bind(image_id)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn links_by_peer(
        &mut self,
        kind: LinkKind,
        peer_id: i32,
    ) -> Result<Vec<Link>, StoreError> {
        let sql = format!(
            "{} WHERE {} = $1 ORDER BY id",
            link_select(kind),
            kind.peer_column()
        );
        sqlx::query_as::<_, Link>(&sql)
            .bind(peer_id)
            .fetch_all(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_user(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<User, StoreError> {
        let sql = format!(
            "INSERT INTO users (name, description) VALUES ($1, $2) RETURNING {}",
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(description)
            .fetch_one(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_category(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, StoreError> {
        let sql = format!(
            "INSERT INTO categories (name, description) VALUES ($1, $2) RETURNING {}",
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(name)
            .bind(description)
            .fetch_one(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_image(&mut self, new_image: &NewImage) -> Result<Image, StoreError> {
        let sql = format!(
            r#"
            INSERT INTO images (description, user_id, file_path, uploaded_at)
            VALUES ($1, $2, $3, NOW())
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        );
        sqlx::query_as::<_, Image>(&sql)
            .bind(&new_image.description)
            .bind(new_image.user_id)
            .bind(&new_image.file_path)
            .fetch_one(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn insert_link(
        &mut self,
        kind: LinkKind,
        image_id: i32,
        peer_id: i32,
    ) -> Result<Link, StoreError> {
        let sql = format!(
            "INSERT INTO {} (image_id, {}) VALUES ($1, $2) RETURNING id, image_id, {} AS peer_id",
            kind.table(),
            kind.peer_column(),
            kind.peer_column()
        );
        sqlx::query_as::<_, Link>(&sql)
            .bind(image_id)
            .bind(peer_id)
            .fetch_one(self.conn()?)
            .await
            .map_err(map_sqlx_error)
    }

    async fn update_user(&mut self, user: &User) -> Result<User, StoreError> {
        let sql = format!(
            r#"
            UPDATE users
            SET name = $2, description = $3, version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.description)
            .bind(user.version)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn update_category(&mut self, category: &Category) -> Result<Category, StoreError> {
        let sql = format!(
            r#"
            UPDATE categories
            SET name = $2, description = $3, version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING {}
            "#,
            CATEGORY_COLUMNS
        );
        sqlx::query_as::<_, Category>(&sql)
            .bind(category.id)
            .bind(&category.name)
            .bind(&category.description)
            .bind(category.version)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn update_image(&mut self, image: &Image) -> Result<Image, StoreError> {
        let sql = format!(
            r#"
            UPDATE images
            SET description = $2, user_id = $3, file_path = $4, version = version + 1
            WHERE id = $1 AND version = $5
            RETURNING {}
            "#,
            IMAGE_COLUMNS
        );
        sqlx::query_as::<_, Image>(&sql)
            .bind(image.id)
            .bind(&image.description)
            .bind(image.user_id)
            .bind(&image.file_path)
            .bind(image.version)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn update_link(&mut self, kind: LinkKind, link: &Link) -> Result<Link, StoreError> {
        let sql = format!(
            "UPDATE {} SET image_id = $2, {} = $3 WHERE id = $1 RETURNING id, image_id, {} AS peer_id",
            kind.table(),
            kind.peer_column(),
            kind.peer_column()
        );
        sqlx::query_as::<_, Link>(&sql)
            .bind(link.id)
            .bind(link.image_id)
            .bind(link.peer_id)
            .fetch_optional(self.conn()?)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn remove(&mut self, key: EntityKey) -> Result<(), StoreError> {
        let (table, id) = match key {
            EntityKey::User(id) => ("users", id),
            EntityKey::Image(id) => ("images", id),
            EntityKey::Category(id) => ("categories", id),
            EntityKey::Link(kind, id) => (kind.table(), id),
        };

        let sql = format!("DELETE FROM {} WHERE id = $1", table);
        let result = sqlx::query(&sql)
            .bind(id)
            .execute(self.conn()?)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConcurrencyConflict);
        }

        Ok(())
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| StoreError::Backend("session already committed".to_string()))?;
        tx.commit().await.map_err(map_sqlx_error)
    }
}
