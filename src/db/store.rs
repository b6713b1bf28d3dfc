// src/db/store.rs
// DOCUMENTATION: Persistence seam used by every service
// PURPOSE: One session = one atomic unit of row changes, ended by commit()

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::models::{Category, Image, Link, LinkKind, NewImage, User};

/// Failures reported by a store session
/// DOCUMENTATION: Writes may fail eagerly (Postgres executes statements
/// inside the open transaction) or at commit (in-memory replay); callers
/// treat both points the same way
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Row version mismatch, row vanished before update/remove, or a
    /// serialization failure reported by the backend
    #[error("row was modified or removed concurrently")]
    ConcurrencyConflict,

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("foreign key violation: {0}")]
    ForeignKey(String),

    #[error("backend failure: {0}")]
    Backend(String),
}

/// Primary key of any row in the entity graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    User(i32),
    Image(i32),
    Category(i32),
    Link(LinkKind, i32),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::User(id) => write!(f, "user {}", id),
            EntityKey::Image(id) => write!(f, "image {}", id),
            EntityKey::Category(id) => write!(f, "category {}", id),
            EntityKey::Link(kind, id) => write!(f, "{} {}", kind, id),
        }
    }
}

/// Factory for store sessions
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}

/// A unit of work against the relational store
/// DOCUMENTATION: Dropping a session without calling `commit` discards
/// every change made through it
#[async_trait]
pub trait StoreSession: Send {
    async fn get_user(&mut self, id: i32) -> Result<Option<User>, StoreError>;
    async fn get_image(&mut self, id: i32) -> Result<Option<Image>, StoreError>;
    async fn get_category(&mut self, id: i32) -> Result<Option<Category>, StoreError>;
    async fn get_link(&mut self, kind: LinkKind, id: i32) -> Result<Option<Link>, StoreError>;

    async fn list_users(&mut self) -> Result<Vec<User>, StoreError>;
    async fn list_images(&mut self) -> Result<Vec<Image>, StoreError>;
    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError>;
    async fn list_links(&mut self, kind: LinkKind) -> Result<Vec<Link>, StoreError>;

    /// Images whose owner is `user_id`
    async fn images_by_user(&mut self, user_id: i32) -> Result<Vec<Image>, StoreError>;

    /// Join rows of `kind` pointing at `image_id`
    async fn links_by_image(&mut self, kind: LinkKind, image_id: i32)
        -> Result<Vec<Link>, StoreError>;

    /// Join rows of `kind` pointing at the peer (user or category) `peer_id`
    async fn links_by_peer(&mut self, kind: LinkKind, peer_id: i32)
        -> Result<Vec<Link>, StoreError>;

    async fn insert_user(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<User, StoreError>;
    async fn insert_category(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, StoreError>;
    async fn insert_image(&mut self, new_image: &NewImage) -> Result<Image, StoreError>;
    async fn insert_link(
        &mut self,
        kind: LinkKind,
        image_id: i32,
        peer_id: i32,
    ) -> Result<Link, StoreError>;

    /// Updates guarded by `version`; a stale version is a concurrency conflict
    async fn update_user(&mut self, user: &User) -> Result<User, StoreError>;
    async fn update_category(&mut self, category: &Category) -> Result<Category, StoreError>;
    async fn update_image(&mut self, image: &Image) -> Result<Image, StoreError>;
    async fn update_link(&mut self, kind: LinkKind, link: &Link) -> Result<Link, StoreError>;

    /// Removing a row that no longer exists is a concurrency conflict
    async fn remove(&mut self, key: EntityKey) -> Result<(), StoreError>;

    async fn remove_all(&mut self, keys: &[EntityKey]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(*key).await?;
        }
        Ok(())
    }

    /// Make every change of this session visible atomically
    async fn commit(&mut self) -> Result<(), StoreError>;
}
