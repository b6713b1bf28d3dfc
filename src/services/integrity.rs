// src/services/integrity.rs
// DOCUMENTATION: Entity graph integrity manager
// PURPOSE: Foreign-key checks, cascade deletes and commit-failure
// classification for every mutation that touches more than one row
//
// Rules enforced here:
// - references are checked before any write; a miss is NotFound or
//   InvalidReference and nothing is written
// - cascades are computed as a CascadePlan (leaf rows first) and applied
//   in the same session as the root removal
// - removing an image always removes every like/saved image pointing at
//   it, whichever operation removed the image
// - files: new blobs are written before commit and dropped if the commit
//   fails; replaced/removed blobs are deleted only after a successful commit

use std::collections::HashSet;

use crate::db::{EntityKey, EntityStore, StoreError, StoreSession};
use crate::errors::ImageServiceError;
use crate::models::{Image, ImageInput, Link, LinkKind, NewImage, UploadedFile};
use crate::services::blob_store::BlobStore;

/// Rows to remove for one cascade delete, in removal order, plus the blobs
/// to delete once the removal is committed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CascadePlan {
    removals: Vec<EntityKey>,
    files: Vec<String>,
}

impl CascadePlan {
    fn push(&mut self, key: EntityKey) {
        if !self.removals.contains(&key) {
            self.removals.push(key);
        }
    }

    pub fn removals(&self) -> &[EntityKey] {
        &self.removals
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    async fn add_image(
        &mut self,
        session: &mut dyn StoreSession,
        image: &Image,
    ) -> Result<(), StoreError> {
        for kind in [LinkKind::Like, LinkKind::SavedImage, LinkKind::ImageCategory] {
            for link in session.links_by_image(kind, image.id).await? {
                self.push(EntityKey::Link(kind, link.id));
            }
        }
        self.push(EntityKey::Image(image.id));
        self.files.push(image.file_path.clone());
        Ok(())
    }
}

/// Likes, saved images and category rows of the image, then the image
pub async fn plan_image_removal(
    session: &mut dyn StoreSession,
    image: &Image,
) -> Result<CascadePlan, StoreError> {
    let mut plan = CascadePlan::default();
    plan.add_image(session, image).await?;
    Ok(plan)
}

/// The user's saved images and likes, then every owned image with its own
/// cascade (including rows other users hold on it), then the user
pub async fn plan_user_removal(
    session: &mut dyn StoreSession,
    user_id: i32,
) -> Result<CascadePlan, StoreError> {
    let mut plan = CascadePlan::default();

    for kind in [LinkKind::SavedImage, LinkKind::Like] {
        for link in session.links_by_peer(kind, user_id).await? {
            plan.push(EntityKey::Link(kind, link.id));
        }
    }

    for image in session.images_by_user(user_id).await? {
        plan.add_image(session, &image).await?;
    }

    plan.push(EntityKey::User(user_id));
    Ok(plan)
}

/// Category rows pointing at the category, then the category
pub async fn plan_category_removal(
    session: &mut dyn StoreSession,
    category_id: i32,
) -> Result<CascadePlan, StoreError> {
    let mut plan = CascadePlan::default();
    for link in session
        .links_by_peer(LinkKind::ImageCategory, category_id)
        .await?
    {
        plan.push(EntityKey::Link(LinkKind::ImageCategory, link.id));
    }
    plan.push(EntityKey::Category(category_id));
    Ok(plan)
}

/// Replace every category row of an image inside an open session
/// DOCUMENTATION: Ids that do not resolve to a category are skipped, repeated
/// ids are attached once. Returns the rows that were inserted.
pub async fn replace_categories_in(
    session: &mut dyn StoreSession,
    image_id: i32,
    category_ids: &[i32],
) -> Result<Vec<Link>, StoreError> {
    let existing: Vec<EntityKey> = session
        .links_by_image(LinkKind::ImageCategory, image_id)
        .await?
        .into_iter()
        .map(|link| EntityKey::Link(LinkKind::ImageCategory, link.id))
        .collect();
    session.remove_all(&existing).await?;

    let mut seen = HashSet::new();
    let mut attached = Vec::new();
    for &category_id in category_ids {
        if !seen.insert(category_id) {
            continue;
        }
        if session.get_category(category_id).await?.is_none() {
            log::debug!(
                "Skipping unknown category {} for image {}",
                category_id,
                image_id
            );
            continue;
        }
        attached.push(
            session
                .insert_link(LinkKind::ImageCategory, image_id, category_id)
                .await?,
        );
    }

    Ok(attached)
}

async fn apply_and_commit(
    session: &mut dyn StoreSession,
    plan: &CascadePlan,
) -> Result<(), StoreError> {
    session.remove_all(plan.removals()).await?;
    session.commit().await
}

async fn insert_image_and_commit(
    session: &mut dyn StoreSession,
    new_image: &NewImage,
    category_ids: &[i32],
) -> Result<Image, StoreError> {
    let image = session.insert_image(new_image).await?;
    replace_categories_in(session, image.id, category_ids).await?;
    session.commit().await?;
    Ok(image)
}

async fn update_image_and_commit(
    session: &mut dyn StoreSession,
    image: &Image,
    category_ids: &[i32],
) -> Result<Image, StoreError> {
    let updated = session.update_image(image).await?;
    replace_categories_in(session, image.id, category_ids).await?;
    session.commit().await?;
    Ok(updated)
}

async fn replace_and_commit(
    session: &mut dyn StoreSession,
    image_id: i32,
    category_ids: &[i32],
) -> Result<Vec<Link>, StoreError> {
    let links = replace_categories_in(session, image_id, category_ids).await?;
    session.commit().await?;
    Ok(links)
}

async fn insert_link_and_commit(
    session: &mut dyn StoreSession,
    kind: LinkKind,
    image_id: i32,
    peer_id: i32,
) -> Result<Link, StoreError> {
    let link = session.insert_link(kind, image_id, peer_id).await?;
    session.commit().await?;
    Ok(link)
}

async fn update_link_and_commit(
    session: &mut dyn StoreSession,
    kind: LinkKind,
    link: &Link,
) -> Result<Link, StoreError> {
    let updated = session.update_link(kind, link).await?;
    session.commit().await?;
    Ok(updated)
}

async fn remove_and_commit(
    session: &mut dyn StoreSession,
    key: EntityKey,
) -> Result<(), StoreError> {
    session.remove(key).await?;
    session.commit().await
}

fn validate_upload(file: &UploadedFile) -> Result<(), ImageServiceError> {
    if !file.is_image() {
        return Err(ImageServiceError::InvalidInput(
            "The provided file is not an image".to_string(),
        ));
    }
    Ok(())
}

/// Integrity manager entry points
/// DOCUMENTATION: Each operation opens one store session, validates
/// references, applies the change and its cascade, commits once
pub struct GraphIntegrity;

impl GraphIntegrity {
    /// Whether `key` currently exists, read through a fresh session
    pub async fn exists(store: &dyn EntityStore, key: EntityKey) -> Result<bool, ImageServiceError> {
        let mut session = store.begin().await?;
        let found = match key {
            EntityKey::User(id) => session.get_user(id).await?.is_some(),
            EntityKey::Image(id) => session.get_image(id).await?.is_some(),
            EntityKey::Category(id) => session.get_category(id).await?.is_some(),
            EntityKey::Link(kind, id) => session.get_link(kind, id).await?.is_some(),
        };
        Ok(found)
    }

    /// One existence re-check after a failed write: `gone` if `key` has
    /// vanished, `present` otherwise
    async fn recheck(
        store: &dyn EntityStore,
        key: EntityKey,
        gone: ImageServiceError,
        present: ImageServiceError,
    ) -> ImageServiceError {
        match Self::exists(store, key).await {
            Ok(false) => gone,
            Ok(true) => present,
            Err(err) => err,
        }
    }

    /// Classify a failed commit of a change to the row `key`
    /// DOCUMENTATION: A concurrency conflict or a constraint failure at
    /// commit (a dependent row attached by another writer) re-checks `key`
    /// once: vanished rows are NotFound, rows still present are Conflict
    pub async fn classify_commit_failure(
        store: &dyn EntityStore,
        key: EntityKey,
        err: StoreError,
    ) -> ImageServiceError {
        match err {
            StoreError::ConcurrencyConflict | StoreError::ForeignKey(_) => {
                Self::recheck(
                    store,
                    key,
                    ImageServiceError::NotFound(key.to_string()),
                    ImageServiceError::Conflict(format!("{} was modified concurrently", key)),
                )
                .await
            }
            StoreError::Duplicate(msg) => ImageServiceError::Conflict(msg),
            StoreError::Backend(msg) => ImageServiceError::DatabaseError(msg),
        }
    }

    /// Classify a failed insert/update of a join row
    /// DOCUMENTATION: Duplicates are Conflict; a constraint failure re-checks
    /// the image and is Conflict if it disappeared mid-flight, fatal otherwise
    async fn classify_link_failure(
        store: &dyn EntityStore,
        kind: LinkKind,
        image_id: i32,
        err: StoreError,
    ) -> ImageServiceError {
        match err {
            StoreError::Duplicate(msg) => {
                ImageServiceError::Conflict(format!("{} already exists: {}", kind, msg))
            }
            StoreError::ForeignKey(msg) => {
                Self::recheck(
                    store,
                    EntityKey::Image(image_id),
                    ImageServiceError::Conflict(format!(
                        "image {} was removed while the {} was being saved",
                        image_id, kind
                    )),
                    ImageServiceError::DatabaseError(msg),
                )
                .await
            }
            StoreError::ConcurrencyConflict => {
                Self::recheck(
                    store,
                    EntityKey::Image(image_id),
                    ImageServiceError::Conflict(format!(
                        "image {} was removed while the {} was being saved",
                        image_id, kind
                    )),
                    ImageServiceError::DatabaseError(StoreError::ConcurrencyConflict.to_string()),
                )
                .await
            }
            StoreError::Backend(msg) => ImageServiceError::DatabaseError(msg),
        }
    }

    /// An image insert failed: the owner vanished mid-flight is
    /// InvalidReference, anything else keeps its usual class
    async fn classify_owner_failure(
        store: &dyn EntityStore,
        user_id: i32,
        err: StoreError,
    ) -> ImageServiceError {
        match err {
            StoreError::ForeignKey(msg) => {
                Self::recheck(
                    store,
                    EntityKey::User(user_id),
                    ImageServiceError::InvalidReference(format!(
                        "user {} does not exist",
                        user_id
                    )),
                    ImageServiceError::DatabaseError(msg),
                )
                .await
            }
            StoreError::Duplicate(msg) => ImageServiceError::Conflict(msg),
            StoreError::ConcurrencyConflict => {
                ImageServiceError::Conflict("row was modified concurrently".to_string())
            }
            StoreError::Backend(msg) => ImageServiceError::DatabaseError(msg),
        }
    }

    async fn ensure_endpoints(
        session: &mut dyn StoreSession,
        kind: LinkKind,
        image_id: i32,
        peer_id: i32,
    ) -> Result<(), ImageServiceError> {
        let image_found = session.get_image(image_id).await?.is_some();
        let peer_found = if kind.peer_is_user() {
            session.get_user(peer_id).await?.is_some()
        } else {
            session.get_category(peer_id).await?.is_some()
        };

        if !image_found || !peer_found {
            return Err(ImageServiceError::InvalidReference(format!(
                "Invalid ImageId or {}",
                kind.peer_label()
            )));
        }
        Ok(())
    }

    async fn discard_files(blobs: &dyn BlobStore, names: &[String]) {
        for name in names {
            if let Err(e) = blobs.delete(name).await {
                log::warn!("Could not delete file {}: {}", name, e);
            }
        }
    }

    /// CreateAssociation: link an image to a category (ImageCategory) or a
    /// user (Like, SavedImage)
    pub async fn create_association(
        store: &dyn EntityStore,
        kind: LinkKind,
        image_id: i32,
        peer_id: i32,
    ) -> Result<Link, ImageServiceError> {
        let mut session = store.begin().await?;
        Self::ensure_endpoints(session.as_mut(), kind, image_id, peer_id).await?;

        match insert_link_and_commit(session.as_mut(), kind, image_id, peer_id).await {
            Ok(link) => {
                log::info!(
                    "Created {} {} (image {}, {} {})",
                    kind,
                    link.id,
                    image_id,
                    kind.peer_label(),
                    peer_id
                );
                Ok(link)
            }
            Err(err) => {
                drop(session);
                Err(Self::classify_link_failure(store, kind, image_id, err).await)
            }
        }
    }

    /// Re-point an existing join row at new endpoints
    pub async fn update_association(
        store: &dyn EntityStore,
        kind: LinkKind,
        id: i32,
        image_id: i32,
        peer_id: i32,
    ) -> Result<Link, ImageServiceError> {
        let key = EntityKey::Link(kind, id);
        let mut session = store.begin().await?;
        let mut link = session
            .get_link(kind, id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(key.to_string()))?;
        Self::ensure_endpoints(session.as_mut(), kind, image_id, peer_id).await?;

        link.image_id = image_id;
        link.peer_id = peer_id;

        let result = update_link_and_commit(session.as_mut(), kind, &link).await;
        drop(session);

        match result {
            Ok(updated) => Ok(updated),
            Err(StoreError::ConcurrencyConflict) => Err(Self::classify_commit_failure(
                store,
                key,
                StoreError::ConcurrencyConflict,
            )
            .await),
            Err(err) => Err(Self::classify_link_failure(store, kind, image_id, err).await),
        }
    }

    pub async fn delete_association(
        store: &dyn EntityStore,
        kind: LinkKind,
        id: i32,
    ) -> Result<(), ImageServiceError> {
        let key = EntityKey::Link(kind, id);
        let mut session = store.begin().await?;
        if session.get_link(kind, id).await?.is_none() {
            return Err(ImageServiceError::NotFound(key.to_string()));
        }

        if let Err(err) = remove_and_commit(session.as_mut(), key).await {
            drop(session);
            return Err(Self::classify_commit_failure(store, key, err).await);
        }

        log::info!("Deleted {}", key);
        Ok(())
    }

    /// ReplaceImageCategories as a standalone operation
    pub async fn replace_image_categories(
        store: &dyn EntityStore,
        image_id: i32,
        category_ids: &[i32],
    ) -> Result<Vec<Link>, ImageServiceError> {
        let key = EntityKey::Image(image_id);
        let mut session = store.begin().await?;
        if session.get_image(image_id).await?.is_none() {
            return Err(ImageServiceError::NotFound(key.to_string()));
        }

        match replace_and_commit(session.as_mut(), image_id, category_ids).await {
            Ok(links) => Ok(links),
            Err(err) => {
                drop(session);
                Err(Self::classify_commit_failure(store, key, err).await)
            }
        }
    }

    /// Store the upload under a generated name, then insert the image row
    /// and its category rows
    pub async fn create_image(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        input: ImageInput,
    ) -> Result<Image, ImageServiceError> {
        let file = input
            .file
            .as_ref()
            .filter(|file| !file.is_empty())
            .ok_or_else(|| ImageServiceError::InvalidInput("No file provided".to_string()))?;
        validate_upload(file)?;

        let mut session = store.begin().await?;
        if session.get_user(input.user_id).await?.is_none() {
            return Err(ImageServiceError::InvalidReference(format!(
                "user {} does not exist",
                input.user_id
            )));
        }

        let file_name = blobs.generate_unique_name(&file.content_type);
        blobs.write(&file_name, &file.bytes).await?;

        let new_image = NewImage {
            description: input.description.clone(),
            user_id: input.user_id,
            file_path: file_name.clone(),
        };

        match insert_image_and_commit(session.as_mut(), &new_image, &input.category_ids).await {
            Ok(image) => {
                log::info!("Created image {} for user {}", image.id, image.user_id);
                Ok(image)
            }
            Err(err) => {
                drop(session);
                Self::discard_files(blobs, &[file_name]).await;
                Err(Self::classify_owner_failure(store, input.user_id, err).await)
            }
        }
    }

    /// UpdateImage: new description/owner, optional replacement file,
    /// categories replaced wholesale
    pub async fn update_image(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        image_id: i32,
        input: ImageInput,
    ) -> Result<Image, ImageServiceError> {
        let replacement = input.file.as_ref().filter(|file| !file.is_empty());
        if let Some(file) = replacement {
            validate_upload(file)?;
        }

        let key = EntityKey::Image(image_id);
        let mut session = store.begin().await?;
        let mut image = session
            .get_image(image_id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(key.to_string()))?;

        if session.get_user(input.user_id).await?.is_none() {
            return Err(ImageServiceError::InvalidReference(format!(
                "user {} does not exist",
                input.user_id
            )));
        }

        let previous_file = match replacement {
            Some(file) => {
                let file_name = blobs.generate_unique_name(&file.content_type);
                blobs.write(&file_name, &file.bytes).await?;
                Some(std::mem::replace(&mut image.file_path, file_name))
            }
            None => None,
        };

        image.description = input.description.clone();
        image.user_id = input.user_id;

        match update_image_and_commit(session.as_mut(), &image, &input.category_ids).await {
            Ok(updated) => {
                if let Some(old) = previous_file {
                    Self::discard_files(blobs, &[old]).await;
                }
                log::info!("Updated image {}", image_id);
                Ok(updated)
            }
            Err(err) => {
                drop(session);
                if previous_file.is_some() {
                    Self::discard_files(blobs, &[image.file_path.clone()]).await;
                }
                Err(match err {
                    StoreError::ForeignKey(msg) => {
                        if !matches!(Self::exists(store, key).await, Ok(true)) {
                            ImageServiceError::NotFound(key.to_string())
                        } else {
                            Self::recheck(
                                store,
                                EntityKey::User(input.user_id),
                                ImageServiceError::InvalidReference(format!(
                                    "user {} does not exist",
                                    input.user_id
                                )),
                                ImageServiceError::DatabaseError(msg),
                            )
                            .await
                        }
                    }
                    other => Self::classify_commit_failure(store, key, other).await,
                })
            }
        }
    }

    /// DeleteImage: dependents, then the row, commit, then the file
    pub async fn delete_image(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        image_id: i32,
    ) -> Result<(), ImageServiceError> {
        let key = EntityKey::Image(image_id);
        let mut session = store.begin().await?;
        let image = session
            .get_image(image_id)
            .await?
            .ok_or_else(|| ImageServiceError::NotFound(key.to_string()))?;

        let plan = plan_image_removal(session.as_mut(), &image).await?;
        if let Err(err) = apply_and_commit(session.as_mut(), &plan).await {
            drop(session);
            return Err(Self::classify_commit_failure(store, key, err).await);
        }

        Self::discard_files(blobs, plan.files()).await;
        log::info!(
            "Deleted image {} with {} dependent rows",
            image_id,
            plan.removals().len() - 1
        );
        Ok(())
    }

    /// DeleteUser: the user's own rows, every owned image with its full
    /// cascade, then the user
    pub async fn delete_user(
        store: &dyn EntityStore,
        blobs: &dyn BlobStore,
        user_id: i32,
    ) -> Result<(), ImageServiceError> {
        let key = EntityKey::User(user_id);
        let mut session = store.begin().await?;
        if session.get_user(user_id).await?.is_none() {
            return Err(ImageServiceError::NotFound(key.to_string()));
        }

        let plan = plan_user_removal(session.as_mut(), user_id).await?;
        if let Err(err) = apply_and_commit(session.as_mut(), &plan).await {
            drop(session);
            return Err(Self::classify_commit_failure(store, key, err).await);
        }

        Self::discard_files(blobs, plan.files()).await;
        log::info!(
            "Deleted user {} with {} images and {} rows in total",
            user_id,
            plan.files().len(),
            plan.removals().len()
        );
        Ok(())
    }

    /// DeleteCategory: detach it from every image, then remove it
    pub async fn delete_category(
        store: &dyn EntityStore,
        category_id: i32,
    ) -> Result<(), ImageServiceError> {
        let key = EntityKey::Category(category_id);
        let mut session = store.begin().await?;
        if session.get_category(category_id).await?.is_none() {
            return Err(ImageServiceError::NotFound(key.to_string()));
        }

        let plan = plan_category_removal(session.as_mut(), category_id).await?;
        if let Err(err) = apply_and_commit(session.as_mut(), &plan).await {
            drop(session);
            return Err(Self::classify_commit_failure(store, key, err).await);
        }

        log::info!("Deleted category {}", category_id);
        Ok(())
    }
}
