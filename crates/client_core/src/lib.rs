use std::{fmt, future::Future, sync::Arc};

use chrono::{DateTime, NaiveDate, Utc};
use remote_integration::{BlobStore, TableBackend};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    domain::{
        ImageKey, ImageMeta, Kpi, KpiId, NewKpi, NewProjectSettings, NewUnit, ProgressImage,
        ProjectSettings, SaleInfo, Unit, UnitId, UnitStatus, DEFAULT_IMAGE_AREA,
    },
    protocol::{IMAGE_META_TABLE, KPIS_TABLE, SETTINGS_TABLE, UNITS_TABLE},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

pub mod collection;
pub mod error;
mod inflight;
pub mod views;

pub use collection::{Collection, Record};
pub use error::StoreError;

use inflight::InflightRequests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreAction {
    FetchKpis,
    AddKpi,
    UpdateKpi,
    DeleteKpi,
    FetchUnits,
    AddUnit,
    UpdateUnit,
    DeleteUnit,
    FetchImages,
    UploadImage,
    UpdateImage,
    DeleteImage,
    SaveImageMetadata,
    FetchSettings,
    SaveSettings,
}

impl StoreAction {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreAction::FetchKpis => "fetch_kpis",
            StoreAction::AddKpi => "add_kpi",
            StoreAction::UpdateKpi => "update_kpi",
            StoreAction::DeleteKpi => "delete_kpi",
            StoreAction::FetchUnits => "fetch_units",
            StoreAction::AddUnit => "add_unit",
            StoreAction::UpdateUnit => "update_unit",
            StoreAction::DeleteUnit => "delete_unit",
            StoreAction::FetchImages => "fetch_images",
            StoreAction::UploadImage => "upload_image",
            StoreAction::UpdateImage => "update_image",
            StoreAction::DeleteImage => "delete_image",
            StoreAction::SaveImageMetadata => "save_image_metadata",
            StoreAction::FetchSettings => "fetch_settings",
            StoreAction::SaveSettings => "save_settings",
        }
    }
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Broadcast after every action so views know what to re-read.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    KpisChanged,
    UnitsChanged,
    ImagesChanged,
    SettingsChanged,
    Failed { action: StoreAction, message: String },
}

/// A photo to upload together with its first metadata row.
#[derive(Debug, Clone)]
pub struct NewProgressImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub alt: String,
    pub date: NaiveDate,
    pub area: String,
    pub description: String,
    pub featured: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub kpis: Vec<Kpi>,
    pub units: Vec<Unit>,
    pub images: Vec<ProgressImage>,
    pub settings: Option<ProjectSettings>,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Default)]
struct StoreState {
    kpis: Collection<Kpi>,
    units: Collection<Unit>,
    images: Collection<ProgressImage>,
    settings: Option<ProjectSettings>,
    last_updated: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Client-side cache of the project's remote tables.
///
/// Every change goes through one of the action methods: the action talks to
/// the backend first and only touches the cache once the backend has
/// answered. KPIs, units and settings are patched from the returned row;
/// progress images are re-read after each change because their listing is a
/// join of the bucket contents and the metadata table.
pub struct DashboardStore {
    tables: Arc<dyn TableBackend>,
    blobs: Arc<dyn BlobStore>,
    inner: Mutex<StoreState>,
    inflight: InflightRequests,
    events: broadcast::Sender<StoreEvent>,
}

impl DashboardStore {
    pub fn new(tables: Arc<dyn TableBackend>, blobs: Arc<dyn BlobStore>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            tables,
            blobs,
            inner: Mutex::new(StoreState::default()),
            inflight: InflightRequests::default(),
            events,
        })
    }

    /// Uses one backend for both tables and blobs.
    pub fn with_backend<B>(backend: B) -> Arc<Self>
    where
        B: TableBackend + BlobStore + 'static,
    {
        let backend = Arc::new(backend);
        Self::new(backend.clone(), backend)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let guard = self.inner.lock().await;
        StoreSnapshot {
            kpis: guard.kpis.to_vec(),
            units: guard.units.to_vec(),
            images: guard.images.to_vec(),
            settings: guard.settings.clone(),
            last_updated: guard.last_updated,
            last_error: guard.last_error.clone(),
        }
    }

    pub async fn kpis(&self) -> Vec<Kpi> {
        self.inner.lock().await.kpis.to_vec()
    }

    pub async fn units(&self) -> Vec<Unit> {
        self.inner.lock().await.units.to_vec()
    }

    pub async fn images(&self) -> Vec<ProgressImage> {
        self.inner.lock().await.images.to_vec()
    }

    pub async fn settings(&self) -> Option<ProjectSettings> {
        self.inner.lock().await.settings.clone()
    }

    pub async fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().await.last_updated
    }

    /// True until the first successful action; an empty but loaded store is not loading.
    pub async fn is_loading(&self) -> bool {
        self.inner.lock().await.last_updated.is_none()
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.lock().await.last_error.clone()
    }

    pub async fn clear_error(&self) {
        self.inner.lock().await.last_error = None;
    }

    pub fn is_pending(&self, action: StoreAction, key: &str) -> bool {
        self.inflight.is_pending(action, key)
    }

    // --- KPIs -------------------------------------------------------------

    pub async fn fetch_kpis(&self) -> Result<Vec<Kpi>, StoreError> {
        self.guarded(StoreAction::FetchKpis, String::new(), async {
            let rows = self
                .tables
                .select_all(KPIS_TABLE)
                .await
                .map_err(StoreError::remote)?;
            let kpis: Vec<Kpi> = decode_rows(rows)?;
            let count = kpis.len();
            let snapshot = self
                .commit(StoreEvent::KpisChanged, |state| {
                    state.kpis.replace_all(kpis);
                    state.kpis.to_vec()
                })
                .await;
            info!(count, "kpis fetched");
            Ok(snapshot)
        })
        .await
    }

    pub async fn add_kpi(&self, kpi: NewKpi) -> Result<Kpi, StoreError> {
        self.guarded(StoreAction::AddKpi, kpi.name.trim().to_string(), async {
            validate_kpi(&kpi)?;
            let row = self
                .tables
                .insert(KPIS_TABLE, encode_row(&kpi)?)
                .await
                .map_err(StoreError::remote)?;
            let created: Kpi = decode_row(row)?;
            self.commit(StoreEvent::KpisChanged, |state| {
                state.kpis.upsert(created.clone());
            })
            .await;
            info!(kpi_id = %created.id, name = %created.fields.name, "kpi added");
            Ok(created)
        })
        .await
    }

    pub async fn update_kpi(&self, kpi: Kpi) -> Result<Kpi, StoreError> {
        self.guarded(StoreAction::UpdateKpi, kpi.id.to_string(), async {
            validate_kpi(&kpi.fields)?;
            let row = self
                .tables
                .update(KPIS_TABLE, &kpi.id.to_string(), encode_row(&kpi.fields)?)
                .await
                .map_err(StoreError::remote)?;
            let updated: Kpi = decode_row(row)?;
            self.commit(StoreEvent::KpisChanged, |state| {
                state.kpis.upsert(updated.clone());
            })
            .await;
            info!(kpi_id = %updated.id, "kpi updated");
            Ok(updated)
        })
        .await
    }

    pub async fn delete_kpi(&self, id: KpiId) -> Result<(), StoreError> {
        self.guarded(StoreAction::DeleteKpi, id.to_string(), async {
            self.tables
                .delete(KPIS_TABLE, &id.to_string())
                .await
                .map_err(StoreError::remote)?;
            self.commit(StoreEvent::KpisChanged, |state| {
                state.kpis.remove(&id);
            })
            .await;
            info!(kpi_id = %id, "kpi deleted");
            Ok(())
        })
        .await
    }

    pub async fn toggle_visibility(&self, id: KpiId) -> Result<Kpi, StoreError> {
        let cached = self.inner.lock().await.kpis.get(&id).cloned();
        let Some(mut kpi) = cached else {
            return self
                .fail(
                    StoreAction::UpdateKpi,
                    StoreError::NotFound {
                        entity: "kpi",
                        id: id.to_string(),
                    },
                )
                .await;
        };
        kpi.fields.visible = !kpi.fields.visible;
        self.update_kpi(kpi).await
    }

    // --- Units ------------------------------------------------------------

    pub async fn fetch_units(&self) -> Result<Vec<Unit>, StoreError> {
        self.guarded(StoreAction::FetchUnits, String::new(), async {
            let rows = self
                .tables
                .select_all(UNITS_TABLE)
                .await
                .map_err(StoreError::remote)?;
            let units: Vec<Unit> = decode_rows(rows)?;
            let count = units.len();
            let snapshot = self
                .commit(StoreEvent::UnitsChanged, |state| {
                    state.units.replace_all(units);
                    state.units.to_vec()
                })
                .await;
            info!(count, "units fetched");
            Ok(snapshot)
        })
        .await
    }

    pub async fn add_unit(&self, unit: NewUnit) -> Result<Unit, StoreError> {
        self.guarded(StoreAction::AddUnit, unit.number.trim().to_string(), async {
            validate_unit(&unit)?;
            let row = self
                .tables
                .insert(UNITS_TABLE, encode_row(&unit)?)
                .await
                .map_err(StoreError::remote)?;
            let created: Unit = decode_row(row)?;
            self.commit(StoreEvent::UnitsChanged, |state| {
                state.units.upsert(created.clone());
            })
            .await;
            info!(unit_id = %created.id, number = %created.fields.number, "unit added");
            Ok(created)
        })
        .await
    }

    pub async fn update_unit(&self, unit: Unit) -> Result<Unit, StoreError> {
        self.guarded(StoreAction::UpdateUnit, unit.id.to_string(), async {
            validate_unit(&unit.fields)?;
            let row = self
                .tables
                .update(UNITS_TABLE, &unit.id.to_string(), encode_row(&unit.fields)?)
                .await
                .map_err(StoreError::remote)?;
            let updated: Unit = decode_row(row)?;
            self.commit(StoreEvent::UnitsChanged, |state| {
                state.units.upsert(updated.clone());
            })
            .await;
            info!(unit_id = %updated.id, status = %updated.fields.status, "unit updated");
            Ok(updated)
        })
        .await
    }

    pub async fn delete_unit(&self, id: UnitId) -> Result<(), StoreError> {
        self.guarded(StoreAction::DeleteUnit, id.to_string(), async {
            self.tables
                .delete(UNITS_TABLE, &id.to_string())
                .await
                .map_err(StoreError::remote)?;
            self.commit(StoreEvent::UnitsChanged, |state| {
                state.units.remove(&id);
            })
            .await;
            info!(unit_id = %id, "unit deleted");
            Ok(())
        })
        .await
    }

    /// Moves a cached unit to `status`. Sale metadata is kept only for sold units.
    pub async fn set_unit_status(
        &self,
        id: UnitId,
        status: UnitStatus,
        sale: SaleInfo,
    ) -> Result<Unit, StoreError> {
        let cached = self.inner.lock().await.units.get(&id).cloned();
        let Some(mut unit) = cached else {
            return self
                .fail(
                    StoreAction::UpdateUnit,
                    StoreError::NotFound {
                        entity: "unit",
                        id: id.to_string(),
                    },
                )
                .await;
        };
        unit.fields.status = status;
        if status == UnitStatus::Vendida {
            if sale.sale_date.is_some() {
                unit.fields.sale_date = sale.sale_date;
            }
            if sale.client.is_some() {
                unit.fields.client = sale.client;
            }
        } else {
            unit.fields.sale_date = None;
            unit.fields.client = None;
        }
        self.update_unit(unit).await
    }

    // --- Progress images ----------------------------------------------------

    pub async fn fetch_images(&self) -> Result<Vec<ProgressImage>, StoreError> {
        self.guarded(StoreAction::FetchImages, String::new(), self.reload_images())
            .await
    }

    pub async fn upload_image(&self, image: NewProgressImage) -> Result<ProgressImage, StoreError> {
        self.guarded(
            StoreAction::UploadImage,
            image.file_name.trim().to_string(),
            async {
                validate_image_upload(&image)?;
                let path = upload_path(Utc::now(), &image.file_name);
                self.blobs
                    .upload(&path, image.bytes, &image.content_type)
                    .await
                    .map_err(StoreError::remote)?;

                let meta = ImageMeta {
                    id: ImageKey::new(path.clone()),
                    alt: if image.alt.trim().is_empty() {
                        image.file_name.clone()
                    } else {
                        image.alt
                    },
                    date: image.date,
                    area: image.area,
                    description: image.description,
                    featured: image.featured,
                };
                if let Err(err) = self.upsert_metadata(vec![meta.clone()]).await {
                    // The blob is useless without its row; do not leave it behind.
                    if let Err(cleanup) = self.blobs.remove(&[path.clone()]).await {
                        warn!(%path, error = %cleanup, "failed to remove orphaned upload");
                    }
                    return Err(err);
                }
                info!(%path, "progress image uploaded");

                let uploaded = self.image_from_parts(&path, Some(&meta), meta.date);
                let images = self
                    .reload_images_or_patch(|images| {
                        images.upsert(uploaded.clone());
                    })
                    .await;
                Ok(find_image(&images, &meta.id).unwrap_or(uploaded))
            },
        )
        .await
    }

    /// Persists the metadata row of a listed image; the blob itself is never rewritten.
    pub async fn update_image(&self, image: ProgressImage) -> Result<ProgressImage, StoreError> {
        self.guarded(StoreAction::UpdateImage, image.id.to_string(), async {
            if !self.inner.lock().await.images.contains(&image.id) {
                return Err(StoreError::NotFound {
                    entity: "image",
                    id: image.id.to_string(),
                });
            }
            self.upsert_metadata(vec![image.meta()]).await?;
            info!(image = %image.id, "progress image metadata saved");
            let patched = image.clone();
            let images = self
                .reload_images_or_patch(|images| {
                    images.upsert(patched);
                })
                .await;
            Ok(find_image(&images, &image.id).unwrap_or(image))
        })
        .await
    }

    pub async fn toggle_featured(&self, id: ImageKey) -> Result<ProgressImage, StoreError> {
        let cached = self.inner.lock().await.images.get(&id).cloned();
        let Some(mut image) = cached else {
            return self
                .fail(
                    StoreAction::UpdateImage,
                    StoreError::NotFound {
                        entity: "image",
                        id: id.to_string(),
                    },
                )
                .await;
        };
        image.featured = !image.featured;
        self.update_image(image).await
    }

    pub async fn delete_image(&self, id: ImageKey) -> Result<(), StoreError> {
        self.delete_images(vec![id]).await
    }

    /// Removes several blobs in one storage request, then their metadata rows.
    pub async fn delete_images(&self, ids: Vec<ImageKey>) -> Result<(), StoreError> {
        let key = ids
            .iter()
            .map(ImageKey::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.guarded(StoreAction::DeleteImage, key, async {
            if ids.is_empty() {
                return Err(StoreError::Validation(
                    "select at least one image to delete".into(),
                ));
            }
            let paths: Vec<String> = ids.iter().map(|id| id.0.clone()).collect();
            self.blobs
                .remove(&paths)
                .await
                .map_err(StoreError::remote)?;
            for path in &paths {
                // Images uploaded outside the dashboard have no metadata row.
                if let Err(err) = self.tables.delete(IMAGE_META_TABLE, path).await {
                    warn!(%path, error = %err, "metadata row not deleted");
                }
            }
            info!(count = paths.len(), "progress images deleted");
            self.reload_images_or_patch(|images| {
                images.retain(|image| !ids.contains(&image.id));
            })
            .await;
            Ok(())
        })
        .await
    }

    /// Writes the metadata of every cached image in one upsert.
    pub async fn save_all_image_metadata(&self) -> Result<Vec<ProgressImage>, StoreError> {
        self.guarded(StoreAction::SaveImageMetadata, String::new(), async {
            let metas: Vec<ImageMeta> = {
                let guard = self.inner.lock().await;
                guard.images.iter().map(ProgressImage::meta).collect()
            };
            if metas.is_empty() {
                return Ok(Vec::new());
            }
            let count = metas.len();
            self.upsert_metadata(metas).await?;
            info!(count, "progress image metadata saved");
            Ok(self.reload_images_or_patch(|_| {}).await)
        })
        .await
    }

    async fn upsert_metadata(&self, metas: Vec<ImageMeta>) -> Result<(), StoreError> {
        let rows = metas
            .iter()
            .map(encode_row)
            .collect::<Result<Vec<_>, _>>()?;
        self.tables
            .upsert(IMAGE_META_TABLE, rows)
            .await
            .map_err(StoreError::remote)?;
        Ok(())
    }

    /// Lists the bucket and joins each blob with its metadata row. Metadata is
    /// optional: if it cannot be read the images still load with defaults.
    async fn reload_images(&self) -> Result<Vec<ProgressImage>, StoreError> {
        let (objects, meta_rows) = futures::join!(
            self.blobs.list(""),
            self.tables.select_all(IMAGE_META_TABLE)
        );
        let objects = objects.map_err(StoreError::remote)?;
        let metas: Vec<ImageMeta> = match meta_rows {
            Ok(rows) => rows
                .into_iter()
                .filter_map(|row| match serde_json::from_value::<ImageMeta>(row) {
                    Ok(meta) => Some(meta),
                    Err(err) => {
                        warn!(error = %err, "skipping unreadable image metadata row");
                        None
                    }
                })
                .collect(),
            Err(err) => {
                warn!(error = %err, "image metadata unavailable, using defaults");
                Vec::new()
            }
        };

        let today = Utc::now().date_naive();
        let images: Vec<ProgressImage> = objects
            .iter()
            .map(|object| {
                let meta = metas.iter().find(|meta| meta.id.as_str() == object.name);
                self.image_from_parts(&object.name, meta, today)
            })
            .collect();
        let count = images.len();
        let snapshot = self
            .commit(StoreEvent::ImagesChanged, |state| {
                state.images.replace_all(images);
                state.images.to_vec()
            })
            .await;
        info!(count, "progress images fetched");
        Ok(snapshot)
    }

    /// Refetches after a successful change. If only the refetch fails, the
    /// change is applied to the cache directly so it still reflects the backend.
    async fn reload_images_or_patch(
        &self,
        patch: impl FnOnce(&mut Collection<ProgressImage>),
    ) -> Vec<ProgressImage> {
        match self.reload_images().await {
            Ok(images) => images,
            Err(err) => {
                warn!(error = %err, "image refetch failed after change, patching cache");
                self.commit(StoreEvent::ImagesChanged, |state| {
                    patch(&mut state.images);
                    state.images.to_vec()
                })
                .await
            }
        }
    }

    fn image_from_parts(
        &self,
        path: &str,
        meta: Option<&ImageMeta>,
        today: NaiveDate,
    ) -> ProgressImage {
        ProgressImage {
            id: ImageKey::new(path),
            src: self.blobs.public_url(path),
            file_key: path.to_string(),
            alt: meta
                .map(|meta| meta.alt.clone())
                .filter(|alt| !alt.is_empty())
                .unwrap_or_else(|| path.to_string()),
            date: meta.map(|meta| meta.date).unwrap_or(today),
            area: meta
                .map(|meta| meta.area.clone())
                .filter(|area| !area.is_empty())
                .unwrap_or_else(|| DEFAULT_IMAGE_AREA.to_string()),
            description: meta.map(|meta| meta.description.clone()).unwrap_or_default(),
            featured: meta.map(|meta| meta.featured).unwrap_or(false),
        }
    }

    // --- Settings -----------------------------------------------------------

    pub async fn fetch_settings(&self) -> Result<Option<ProjectSettings>, StoreError> {
        self.guarded(StoreAction::FetchSettings, String::new(), async {
            let rows = self
                .tables
                .select_all(SETTINGS_TABLE)
                .await
                .map_err(StoreError::remote)?;
            let settings: Option<ProjectSettings> = match rows.into_iter().next() {
                Some(row) => Some(decode_row(row)?),
                None => None,
            };
            let result = settings.clone();
            self.commit(StoreEvent::SettingsChanged, |state| {
                state.settings = settings;
            })
            .await;
            info!(present = result.is_some(), "project settings fetched");
            Ok(result)
        })
        .await
    }

    /// Upserts over the fetched row when there is one, inserts the first row otherwise.
    pub async fn save_settings(
        &self,
        fields: NewProjectSettings,
    ) -> Result<ProjectSettings, StoreError> {
        self.guarded(StoreAction::SaveSettings, String::new(), async {
            if fields.name.trim().is_empty() {
                return Err(StoreError::Validation("project name is required".into()));
            }
            let existing = self.inner.lock().await.settings.as_ref().map(|s| s.id);
            let saved: ProjectSettings = match existing {
                Some(id) => {
                    let row = encode_row(&ProjectSettings { id, fields })?;
                    let rows = self
                        .tables
                        .upsert(SETTINGS_TABLE, vec![row])
                        .await
                        .map_err(StoreError::remote)?;
                    let row = rows.into_iter().next().ok_or_else(|| {
                        StoreError::Remote("settings upsert returned no row".into())
                    })?;
                    decode_row(row)?
                }
                None => {
                    let row = self
                        .tables
                        .insert(SETTINGS_TABLE, encode_row(&fields)?)
                        .await
                        .map_err(StoreError::remote)?;
                    decode_row(row)?
                }
            };
            let result = saved.clone();
            self.commit(StoreEvent::SettingsChanged, |state| {
                state.settings = Some(saved);
            })
            .await;
            info!(settings_id = %result.id, "project settings saved");
            Ok(result)
        })
        .await
    }

    /// Fetches every collection. Each fetch records its own failure; the
    /// first one is returned after all have run.
    pub async fn refresh_all(&self) -> Result<(), StoreError> {
        let (kpis, units, images, settings) = futures::join!(
            self.fetch_kpis(),
            self.fetch_units(),
            self.fetch_images(),
            self.fetch_settings()
        );
        kpis?;
        units?;
        images?;
        settings?;
        Ok(())
    }

    // --- plumbing -----------------------------------------------------------

    async fn guarded<T, F>(
        &self,
        action: StoreAction,
        key: String,
        request: F,
    ) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let _inflight = match self.inflight.begin(action, key) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(%action, error = %err, "duplicate request ignored");
                return Err(err);
            }
        };
        match request.await {
            Ok(value) => Ok(value),
            Err(err) => self.fail(action, err).await,
        }
    }

    async fn fail<T>(&self, action: StoreAction, err: StoreError) -> Result<T, StoreError> {
        let message = err.user_message();
        error!(%action, %message, "store action failed");
        self.inner.lock().await.last_error = Some(message.clone());
        let _ = self.events.send(StoreEvent::Failed { action, message });
        Err(err)
    }

    async fn commit<R>(&self, event: StoreEvent, apply: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = {
            let mut guard = self.inner.lock().await;
            let result = apply(&mut guard);
            guard.last_updated = Some(Utc::now());
            result
        };
        let _ = self.events.send(event);
        result
    }
}

fn find_image(images: &[ProgressImage], id: &ImageKey) -> Option<ProgressImage> {
    images.iter().find(|image| &image.id == id).cloned()
}

/// Blob path for a new upload: upload time in milliseconds, then the file name.
pub fn upload_path(now: DateTime<Utc>, file_name: &str) -> String {
    let name = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    format!("{}-{}", now.timestamp_millis(), name)
}

fn validate_kpi(kpi: &NewKpi) -> Result<(), StoreError> {
    if kpi.name.trim().is_empty() {
        return Err(StoreError::Validation("KPI name is required".into()));
    }
    if !kpi.value.is_finite() || !kpi.target.is_finite() {
        return Err(StoreError::Validation(
            "KPI value and target must be numbers".into(),
        ));
    }
    Ok(())
}

fn validate_unit(unit: &NewUnit) -> Result<(), StoreError> {
    if unit.number.trim().is_empty() {
        return Err(StoreError::Validation("unit number is required".into()));
    }
    if !unit.area.is_finite() || unit.area < 0.0 {
        return Err(StoreError::Validation(
            "unit area must be zero or more".into(),
        ));
    }
    if !unit.price.is_finite() || unit.price < 0.0 {
        return Err(StoreError::Validation(
            "unit price must be zero or more".into(),
        ));
    }
    Ok(())
}

fn validate_image_upload(image: &NewProgressImage) -> Result<(), StoreError> {
    if image.file_name.trim().is_empty() {
        return Err(StoreError::Validation("image file name is required".into()));
    }
    if image.bytes.is_empty() {
        return Err(StoreError::Validation("image file is empty".into()));
    }
    Ok(())
}

fn encode_row<T: Serialize>(record: &T) -> Result<Value, StoreError> {
    serde_json::to_value(record).map_err(StoreError::decode)
}

fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, StoreError> {
    serde_json::from_value(row).map_err(StoreError::decode)
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(decode_row).collect()
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
