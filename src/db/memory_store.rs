// src/db/memory_store.rs
// DOCUMENTATION: In-process implementation of the store seam
// PURPOSE: Development backend (STORAGE_BACKEND=memory) and test double
//
// A session works on a private snapshot and records every write as an Op.
// Commit replays the Ops against the live state under the lock, so rows
// changed by another session in the meantime surface as conflicts and
// nothing is applied unless every Op succeeds.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::{EntityKey, EntityStore, StoreError, StoreSession};
use crate::models::{Category, Image, Link, LinkKind, NewImage, User};

#[cfg(test)]
type CommitHook = Box<dyn FnOnce(&mut MemoryState) + Send>;

/// Tables of the in-memory backend
/// DOCUMENTATION: Constraints mirror the Postgres schema: images restrict
/// their owner, likes/saved images cascade with both endpoints,
/// image_categories restrict both endpoints, join rows are unique per pair
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub(crate) users: BTreeMap<i32, User>,
    pub(crate) images: BTreeMap<i32, Image>,
    pub(crate) categories: BTreeMap<i32, Category>,
    pub(crate) links: BTreeMap<LinkKind, BTreeMap<i32, Link>>,
}

#[derive(Debug, Clone)]
enum Op {
    PutUser { row: User, expected: Option<i32> },
    PutCategory { row: Category, expected: Option<i32> },
    PutImage { row: Image, expected: Option<i32> },
    PutLink { kind: LinkKind, row: Link, insert: bool },
    Remove(EntityKey),
}

/// Insert when `expected` is None, otherwise a version-guarded update
fn check_version(current: Option<i32>, expected: Option<i32>) -> Result<i32, StoreError> {
    match (current, expected) {
        (None, None) => Ok(1),
        (Some(_), None) => Err(StoreError::Duplicate("primary key already exists".to_string())),
        (Some(version), Some(wanted)) if version == wanted => Ok(version + 1),
        _ => Err(StoreError::ConcurrencyConflict),
    }
}

impl MemoryState {
    pub(crate) fn links(&self, kind: LinkKind) -> impl Iterator<Item = &Link> {
        self.links.get(&kind).into_iter().flat_map(|rows| rows.values())
    }

    fn has_peer(&self, kind: LinkKind, peer_id: i32) -> bool {
        if kind.peer_is_user() {
            self.users.contains_key(&peer_id)
        } else {
            self.categories.contains_key(&peer_id)
        }
    }

    fn remove_links_where(&mut self, kind: LinkKind, pred: impl Fn(&Link) -> bool) {
        if let Some(rows) = self.links.get_mut(&kind) {
            rows.retain(|_, link| !pred(link));
        }
    }

    fn apply(&mut self, op: &Op) -> Result<(), StoreError> {
        match op {
            Op::PutUser { row, expected } => {
                let version = check_version(self.users.get(&row.id).map(|u| u.version), *expected)?;
                self.users.insert(row.id, User { version, ..row.clone() });
            }
            Op::PutCategory { row, expected } => {
                let version =
                    check_version(self.categories.get(&row.id).map(|c| c.version), *expected)?;
                self.categories.insert(row.id, Category { version, ..row.clone() });
            }
            Op::PutImage { row, expected } => {
                let version =
                    check_version(self.images.get(&row.id).map(|i| i.version), *expected)?;
                if !self.users.contains_key(&row.user_id) {
                    return Err(StoreError::ForeignKey(format!(
                        "images.user_id {} does not exist",
                        row.user_id
                    )));
                }
                self.images.insert(row.id, Image { version, ..row.clone() });
            }
            Op::PutLink { kind, row, insert } => {
                let exists = self
                    .links
                    .get(kind)
                    .map_or(false, |rows| rows.contains_key(&row.id));
                if *insert && exists {
                    return Err(StoreError::Duplicate("primary key already exists".to_string()));
                }
                if !*insert && !exists {
                    return Err(StoreError::ConcurrencyConflict);
                }
                if !self.images.contains_key(&row.image_id) {
                    return Err(StoreError::ForeignKey(format!(
                        "{}.image_id {} does not exist",
                        kind.table(),
                        row.image_id
                    )));
                }
                if !self.has_peer(*kind, row.peer_id) {
                    return Err(StoreError::ForeignKey(format!(
                        "{}.{} {} does not exist",
                        kind.table(),
                        kind.peer_column(),
                        row.peer_id
                    )));
                }
                let duplicate = self.links(*kind).any(|other| {
                    other.id != row.id
                        && other.image_id == row.image_id
                        && other.peer_id == row.peer_id
                });
                if duplicate {
                    return Err(StoreError::Duplicate(format!(
                        "{} ({}, {}) already exists",
                        kind, row.image_id, row.peer_id
                    )));
                }
                self.links.entry(*kind).or_default().insert(row.id, *row);
            }
            Op::Remove(key) => self.remove(*key)?,
        }
        Ok(())
    }

    fn remove(&mut self, key: EntityKey) -> Result<(), StoreError> {
        match key {
            EntityKey::User(id) => {
                if !self.users.contains_key(&id) {
                    return Err(StoreError::ConcurrencyConflict);
                }
                if self.images.values().any(|image| image.user_id == id) {
                    return Err(StoreError::ForeignKey(format!("images still reference user {}", id)));
                }
                self.remove_links_where(LinkKind::Like, |link| link.peer_id == id);
                self.remove_links_where(LinkKind::SavedImage, |link| link.peer_id == id);
                self.users.remove(&id);
            }
            EntityKey::Image(id) => {
                if !self.images.contains_key(&id) {
                    return Err(StoreError::ConcurrencyConflict);
                }
                if self.links(LinkKind::ImageCategory).any(|link| link.image_id == id) {
                    return Err(StoreError::ForeignKey(format!(
                        "image_categories still reference image {}",
                        id
                    )));
                }
                self.remove_links_where(LinkKind::Like, |link| link.image_id == id);
                self.remove_links_where(LinkKind::SavedImage, |link| link.image_id == id);
                self.images.remove(&id);
            }
            EntityKey::Category(id) => {
                if !self.categories.contains_key(&id) {
                    return Err(StoreError::ConcurrencyConflict);
                }
                if self.links(LinkKind::ImageCategory).any(|link| link.peer_id == id) {
                    return Err(StoreError::ForeignKey(format!(
                        "image_categories still reference category {}",
                        id
                    )));
                }
                self.categories.remove(&id);
            }
            EntityKey::Link(kind, id) => {
                let removed = self.links.get_mut(&kind).and_then(|rows| rows.remove(&id));
                if removed.is_none() {
                    return Err(StoreError::ConcurrencyConflict);
                }
            }
        }
        Ok(())
    }
}

/// Per-table id counters, shared by every session
#[derive(Debug, Default)]
struct Sequences {
    users: AtomicI32,
    images: AtomicI32,
    categories: AtomicI32,
    image_categories: AtomicI32,
    likes: AtomicI32,
    saved_images: AtomicI32,
}

impl Sequences {
    fn next(counter: &AtomicI32) -> i32 {
        counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn link(&self, kind: LinkKind) -> i32 {
        match kind {
            LinkKind::ImageCategory => Self::next(&self.image_categories),
            LinkKind::Like => Self::next(&self.likes),
            LinkKind::SavedImage => Self::next(&self.saved_images),
        }
    }
}

/// MemoryStore: shared state plus id sequences
#[derive(Clone, Default)]
pub struct MemoryStore {
    live: Arc<Mutex<MemoryState>>,
    sequences: Arc<Sequences>,
    #[cfg(test)]
    commit_hook: Arc<std::sync::Mutex<Option<CommitHook>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `hook` against the live state right before the next commit replays
    /// its operations, simulating a writer that got in first
    #[cfg(test)]
    pub fn before_next_commit(&self, hook: impl FnOnce(&mut MemoryState) + Send + 'static) {
        if let Ok(mut slot) = self.commit_hook.lock() {
            *slot = Some(Box::new(hook));
        }
    }

    #[cfg(test)]
    fn run_commit_hook(&self, state: &mut MemoryState) {
        let hook = self.commit_hook.lock().ok().and_then(|mut slot| slot.take());
        if let Some(hook) = hook {
            hook(state);
        }
    }

    #[cfg(not(test))]
    fn run_commit_hook(&self, _state: &mut MemoryState) {}

    #[cfg(test)]
    pub async fn snapshot(&self) -> MemoryState {
        self.live.lock().await.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let working = self.live.lock().await.clone();
        Ok(Box::new(MemorySession {
            store: self.clone(),
            working,
            ops: Vec::new(),
        }))
    }
}

pub struct MemorySession {
    store: MemoryStore,
    working: MemoryState,
    ops: Vec<Op>,
}

impl MemorySession {
    /// Apply to the private snapshot first so errors surface at the call,
    /// then remember the Op for commit
    fn record(&mut self, op: Op) -> Result<(), StoreError> {
        self.working.apply(&op)?;
        self.ops.push(op);
        Ok(())
    }

    fn link_rows(&self, kind: LinkKind, pred: impl Fn(&Link) -> bool) -> Vec<Link> {
        self.working.links(kind).filter(|link| pred(link)).copied().collect()
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn get_user(&mut self, id: i32) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn get_image(&mut self, id: i32) -> Result<Option<Image>, StoreError> {
        Ok(self.working.images.get(&id).cloned())
    }

    async fn get_category(&mut self, id: i32) -> Result<Option<Category>, StoreError> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn get_link(&mut self, kind: LinkKind, id: i32) -> Result<Option<Link>, StoreError> {
        Ok(self.working.links.get(&kind).and_then(|rows| rows.get(&id)).copied())
    }

    async fn list_users(&mut self) -> Result<Vec<User>, StoreError> {
        Ok(self.working.users.values().cloned().collect())
    }

    async fn list_images(&mut self) -> Result<Vec<Image>, StoreError> {
        Ok(self.working.images.values().cloned().collect())
    }

    async fn list_categories(&mut self) -> Result<Vec<Category>, StoreError> {
        Ok(self.working.categories.values().cloned().collect())
    }

    async fn list_links(&mut self, kind: LinkKind) -> Result<Vec<Link>, StoreError> {
        Ok(self.link_rows(kind, |_| true))
    }

    async fn images_by_user(&mut self, user_id: i32) -> Result<Vec<Image>, StoreError> {
        Ok(self
            .working
            .images
            .values()
            .filter(|image| image.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn links_by_image(
        &mut self,
        kind: LinkKind,
        image_id: i32,
    ) -> Result<Vec<Link>, StoreError> {
        Ok(self.link_rows(kind, |link| link.image_id == image_id))
    }

    async fn links_by_peer(
        &mut self,
        kind: LinkKind,
        peer_id: i32,
    ) -> Result<Vec<Link>, StoreError> {
        Ok(self.link_rows(kind, |link| link.peer_id == peer_id))
    }

    async fn insert_user(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<User, StoreError> {
        let row = User {
            id: Sequences::next(&self.store.sequences.users),
            name: name.to_string(),
            description: description.map(str::to_string),
            version: 1,
        };
        self.record(Op::PutUser {
            row: row.clone(),
            expected: None,
        })?;
        Ok(row)
    }

    async fn insert_category(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Category, StoreError> {
        let row = Category {
            id: Sequences::next(&self.store.sequences.categories),
            name: name.to_string(),
            description: description.map(str::to_string),
            version: 1,
        };
        self.record(Op::PutCategory {
            row: row.clone(),
            expected: None,
        })?;
        Ok(row)
    }

    async fn insert_image(&mut self, new_image: &NewImage) -> Result<Image, StoreError> {
        let row = Image {
            id: Sequences::next(&self.store.sequences.images),
            description: new_image.description.clone(),
            user_id: new_image.user_id,
            file_path: new_image.file_path.clone(),
            uploaded_at: Utc::now(),
            version: 1,
        };
        self.record(Op::PutImage {
            row: row.clone(),
            expected: None,
        })?;
        Ok(row)
    }

    async fn insert_link(
        &mut self,
        kind: LinkKind,
        image_id: i32,
        peer_id: i32,
    ) -> Result<Link, StoreError> {
        let row = Link {
            id: self.store.sequences.link(kind),
            image_id,
            peer_id,
        };
        self.record(Op::PutLink {
            kind,
            row,
            insert: true,
        })?;
        Ok(row)
    }

    async fn update_user(&mut self, user: &User) -> Result<User, StoreError> {
        self.record(Op::PutUser {
            row: user.clone(),
            expected: Some(user.version),
        })?;
        self.working
            .users
            .get(&user.id)
            .cloned()
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn update_category(&mut self, category: &Category) -> Result<Category, StoreError> {
        self.record(Op::PutCategory {
            row: category.clone(),
            expected: Some(category.version),
        })?;
        self.working
            .categories
            .get(&category.id)
            .cloned()
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn update_image(&mut self, image: &Image) -> Result<Image, StoreError> {
        self.record(Op::PutImage {
            row: image.clone(),
            expected: Some(image.version),
        })?;
        self.working
            .images
            .get(&image.id)
            .cloned()
            .ok_or(StoreError::ConcurrencyConflict)
    }

    async fn update_link(&mut self, kind: LinkKind, link: &Link) -> Result<Link, StoreError> {
        self.record(Op::PutLink {
            kind,
            row: *link,
            insert: false,
        })?;
        Ok(*link)
    }

    async fn remove(&mut self, key: EntityKey) -> Result<(), StoreError> {
        self.record(Op::Remove(key))
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let mut live = self.store.live.lock().await;
        self.store.run_commit_hook(&mut live);

        let mut next = live.clone();
        for op in &self.ops {
            next.apply(op)?;
        }
        *live = next;
        self.ops.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    async fn seed_user(store: &MemoryStore, name: &str) -> User {
        let mut session = store.begin().await.unwrap();
        let user = session.insert_user(name, None).await.unwrap();
        session.commit().await.unwrap();
        user
    }

    async fn seed_image(store: &MemoryStore, user_id: i32) -> Image {
        let mut session = store.begin().await.unwrap();
        let image = session
            .insert_image(&NewImage {
                description: Some("sunset".to_string()),
                user_id,
                file_path: "abc.jpg".to_string(),
            })
            .await
            .unwrap();
        session.commit().await.unwrap();
        image
    }

    #[tokio::test]
    async fn test_uncommitted_session_is_discarded() {
        let store = MemoryStore::new();
        {
            let mut session = store.begin().await.unwrap();
            session.insert_user("ghost", None).await.unwrap();
        }

        assert!(store.snapshot().await.users.is_empty());
    }

    #[tokio::test]
    async fn test_image_requires_existing_owner() {
        let store = MemoryStore::new();
        let mut session = store.begin().await.unwrap();

        let result = session
            .insert_image(&NewImage {
                description: None,
                user_id: 42,
                file_path: "x.png".to_string(),
            })
            .await;

        assert!(matches!(result, Err(StoreError::ForeignKey(_))));
    }

    #[tokio::test]
    async fn test_duplicate_link_rejected() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a").await;
        let image = seed_image(&store, user.id).await;

        let mut session = store.begin().await.unwrap();
        assert_ok!(session.insert_link(LinkKind::Like, image.id, user.id).await);
        let second = session.insert_link(LinkKind::Like, image.id, user.id).await;

        assert!(matches!(second, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_stale_version_is_concurrency_conflict() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a").await;

        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();

        let renamed = User {
            name: "b".to_string(),
            ..user.clone()
        };
        first.update_user(&renamed).await.unwrap();
        first.commit().await.unwrap();

        let other = User {
            name: "c".to_string(),
            ..user
        };
        second.update_user(&other).await.unwrap();
        assert_eq!(second.commit().await, Err(StoreError::ConcurrencyConflict));

        let state = store.snapshot().await;
        assert_eq!(state.users[&1].name, "b");
        assert_eq!(state.users[&1].version, 2);
    }

    #[tokio::test]
    async fn test_user_removal_restricted_by_images() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a").await;
        seed_image(&store, user.id).await;

        let mut session = store.begin().await.unwrap();
        let result = session.remove(EntityKey::User(user.id)).await;

        assert!(matches!(result, Err(StoreError::ForeignKey(_))));
    }

    #[tokio::test]
    async fn test_image_removal_cascades_likes_and_saves() {
        let store = MemoryStore::new();
        let owner = seed_user(&store, "owner").await;
        let fan = seed_user(&store, "fan").await;
        let image = seed_image(&store, owner.id).await;

        let mut session = store.begin().await.unwrap();
        session.insert_link(LinkKind::Like, image.id, fan.id).await.unwrap();
        session
            .insert_link(LinkKind::SavedImage, image.id, fan.id)
            .await
            .unwrap();
        session.commit().await.unwrap();

        let mut session = store.begin().await.unwrap();
        assert_ok!(session.remove(EntityKey::Image(image.id)).await);
        assert_ok!(session.commit().await);

        let state = store.snapshot().await;
        assert_eq!(state.links(LinkKind::Like).count(), 0);
        assert_eq!(state.links(LinkKind::SavedImage).count(), 0);
    }

    #[tokio::test]
    async fn test_commit_detects_row_removed_by_other_writer() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "a").await;
        let image = seed_image(&store, user.id).await;

        let mut session = store.begin().await.unwrap();
        session.remove(EntityKey::Image(image.id)).await.unwrap();

        store.before_next_commit(move |state| {
            state.images.remove(&image.id);
        });

        assert_err!(session.commit().await);
    }
}
