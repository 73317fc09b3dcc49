// Keepsake photo backup engine.
// Copyright 2024-2026 The Keepsake Authors.

// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

//! In-memory collaborator stores and fixtures for use in tests.
//!
//! These are deliberately simple reference implementations of the
//! traits in [store](crate::store); hosts ship their own.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering::Relaxed;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;

use crate::engine::{Engine, Stores};
use crate::store::{
    AppSettings, Category, CategoryStore, DeletionLog, DeletionRecord, EntityKind, MediaStore,
    Photo, PhotoStore, SettingsStore, StoreError, StoreResult,
};

/// In-memory [CategoryStore].
#[derive(Debug, Default)]
pub struct MemoryCategoryStore {
    next_id: AtomicI64,
    rows: Mutex<BTreeMap<i64, Category>>,
}

impl MemoryCategoryStore {
    pub fn new() -> Self {
        MemoryCategoryStore {
            next_id: AtomicI64::new(1),
            rows: Mutex::new(BTreeMap::new()),
        }
    }
}

impl CategoryStore for MemoryCategoryStore {
    fn insert(&self, mut category: Category) -> StoreResult<i64> {
        let id = self.next_id.fetch_add(1, Relaxed);
        category.id = id;
        self.rows.lock().unwrap().insert(id, category);
        Ok(id)
    }

    fn insert_with_id(&self, category: Category) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&category.id) {
            return Err(StoreError::Conflict(format!(
                "category id {} already present",
                category.id
            )));
        }
        // Keep freshly assigned ids clear of explicitly inserted ones.
        self.next_id.fetch_max(category.id + 1, Relaxed);
        rows.insert(category.id, category);
        Ok(())
    }

    fn update(&self, category: &Category) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&category.id) {
            Some(row) => {
                *row = category.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("category {}", category.id))),
        }
    }

    fn delete(&self, id: i64) -> StoreResult<()> {
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("category {id}")))
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }

    fn get_all(&self) -> StoreResult<Vec<Category>> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> StoreResult<Option<Category>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    fn get_by_name(&self, name: &str) -> StoreResult<Option<Category>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.rows.lock().unwrap().len())
    }
}

/// In-memory [PhotoStore].
#[derive(Debug, Default)]
pub struct MemoryPhotoStore {
    next_id: AtomicI64,
    rows: Mutex<BTreeMap<i64, Photo>>,
}

impl MemoryPhotoStore {
    pub fn new() -> Self {
        MemoryPhotoStore {
            next_id: AtomicI64::new(1),
            rows: Mutex::new(BTreeMap::new()),
        }
    }
}

impl PhotoStore for MemoryPhotoStore {
    fn insert(&self, mut photo: Photo) -> StoreResult<i64> {
        let id = self.next_id.fetch_add(1, Relaxed);
        photo.id = id;
        self.rows.lock().unwrap().insert(id, photo);
        Ok(id)
    }

    fn insert_with_id(&self, photo: Photo) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&photo.id) {
            return Err(StoreError::Conflict(format!(
                "photo id {} already present",
                photo.id
            )));
        }
        self.next_id.fetch_max(photo.id + 1, Relaxed);
        rows.insert(photo.id, photo);
        Ok(())
    }

    fn update(&self, photo: &Photo) -> StoreResult<()> {
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&photo.id) {
            Some(row) => {
                *row = photo.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("photo {}", photo.id))),
        }
    }

    fn delete(&self, id: i64) -> StoreResult<()> {
        self.rows
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("photo {id}")))
    }

    fn delete_all(&self) -> StoreResult<()> {
        self.rows.lock().unwrap().clear();
        Ok(())
    }

    fn get_all(&self) -> StoreResult<Vec<Photo>> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> StoreResult<Option<Photo>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    fn get_by_path(&self, path: &str) -> StoreResult<Option<Photo>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|p| p.path == path)
            .cloned())
    }

    fn count(&self) -> StoreResult<usize> {
        Ok(self.rows.lock().unwrap().len())
    }
}

/// [MediaStore] over a real directory: files exist when they exist on
/// disk, imports copy into the directory.
#[derive(Debug)]
pub struct DirMediaStore {
    root: PathBuf,
    thumbnail_bytes: Mutex<Option<Vec<u8>>>,
}

impl DirMediaStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        DirMediaStore {
            root: root.into(),
            thumbnail_bytes: Mutex::new(None),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Thumbnail bytes handed out for every photo from now on.
    pub fn set_thumbnail_bytes(&self, bytes: Option<Vec<u8>>) {
        *self.thumbnail_bytes.lock().unwrap() = bytes;
    }
}

impl MediaStore for DirMediaStore {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).exists()
    }

    fn import_file(&self, source: &Path, file_name: &str) -> StoreResult<PathBuf> {
        let dest = self.root.join(file_name);
        fs::create_dir_all(&self.root)
            .and_then(|()| fs::copy(source, &dest).map(|_| ()))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(dest)
    }

    fn thumbnail(&self, _photo: &Photo) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.thumbnail_bytes.lock().unwrap().clone())
    }
}

/// In-memory [SettingsStore].
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<AppSettings>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        MemorySettingsStore::default()
    }

    pub fn snapshot(&self) -> AppSettings {
        self.settings.lock().unwrap().clone()
    }

    pub fn set(&self, settings: AppSettings) {
        *self.settings.lock().unwrap() = settings;
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> StoreResult<AppSettings> {
        Ok(self.settings.lock().unwrap().clone())
    }

    fn store(&self, settings: &AppSettings) -> StoreResult<()> {
        *self.settings.lock().unwrap() = settings.clone();
        Ok(())
    }
}

/// In-memory append-only [DeletionLog].
#[derive(Debug, Default)]
pub struct MemoryDeletionLog {
    records: Mutex<Vec<DeletionRecord>>,
}

impl MemoryDeletionLog {
    pub fn new() -> Self {
        MemoryDeletionLog::default()
    }

    pub fn record(&self, kind: EntityKind, entity_id: i64, deleted_at: i64) {
        self.records.lock().unwrap().push(DeletionRecord {
            kind,
            entity_id,
            deleted_at,
        });
    }
}

impl DeletionLog for MemoryDeletionLog {
    fn deletions(&self) -> StoreResult<Vec<DeletionRecord>> {
        Ok(self.records.lock().unwrap().clone())
    }
}

/// A scratch vault: in-memory stores, a real media directory, and an
/// engine wired over them, all torn down on drop.
pub struct VaultFixture {
    pub tempdir: TempDir,
    pub categories: Arc<MemoryCategoryStore>,
    pub photos: Arc<MemoryPhotoStore>,
    pub media: Arc<DirMediaStore>,
    pub settings: Arc<MemorySettingsStore>,
    pub deletions: Arc<MemoryDeletionLog>,
    engine: Engine,
}

impl VaultFixture {
    pub fn new() -> VaultFixture {
        let tempdir = TempDir::new().unwrap();
        let categories = Arc::new(MemoryCategoryStore::new());
        let photos = Arc::new(MemoryPhotoStore::new());
        let media = Arc::new(DirMediaStore::new(tempdir.path().join("media")));
        let settings = Arc::new(MemorySettingsStore::new());
        let deletions = Arc::new(MemoryDeletionLog::new());
        let stores = Stores {
            categories: categories.clone(),
            photos: photos.clone(),
            media: media.clone(),
            settings: settings.clone(),
            deletions: deletions.clone(),
        };
        let engine = Engine::new(stores, tempdir.path().join("history.json"));
        VaultFixture {
            tempdir,
            categories,
            photos,
            media,
            settings,
            deletions,
            engine,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Directory for export destinations inside the fixture.
    pub fn dest_dir(&self) -> PathBuf {
        self.tempdir.path().join("backups")
    }

    /// Insert a category with sensible defaults, returning it.
    pub fn add_category(&self, name: &str) -> Category {
        let category = Category {
            id: 0,
            name: name.to_string(),
            display_name: title_case(name),
            position: self.categories.count().unwrap() as u32,
            color_hex: "#3F51B5".to_string(),
            icon_ref: None,
            is_default: false,
            created_at: 1_700_000_000,
        };
        let id = self.categories.insert(category).unwrap();
        self.categories.get_by_id(id).unwrap().unwrap()
    }

    /// Insert a photo whose backing file really exists, returning it.
    pub fn add_photo(&self, category_id: i64, name: &str, content: &[u8]) -> Photo {
        let file_path = self.tempdir.path().join("sources").join(format!("{name}.jpg"));
        fs::create_dir_all(file_path.parent().unwrap()).unwrap();
        fs::write(&file_path, content).unwrap();
        let photo = Photo {
            id: 0,
            path: file_path.to_string_lossy().into_owned(),
            category_id,
            name: name.to_string(),
            is_from_bundled_assets: false,
            created_at: 1_700_000_000,
            file_size_bytes: content.len() as u64,
            width: 640,
            height: 480,
            is_favorite: false,
        };
        let id = self.photos.insert(photo).unwrap();
        self.photos.get_by_id(id).unwrap().unwrap()
    }
}

impl Default for VaultFixture {
    fn default() -> Self {
        VaultFixture::new()
    }
}

fn title_case(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
