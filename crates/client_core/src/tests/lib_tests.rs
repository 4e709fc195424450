use super::*;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicI64, Ordering},
        Mutex as StdMutex,
    },
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use shared::{
    domain::{KpiCategory, KpiFormat, NewKpi, NewUnit, SettingsId, Trend},
    protocol::BlobObject,
};
use tokio::sync::Notify;

/// In-memory stand-in for the hosted tables and bucket.
struct MemoryBackend {
    tables: StdMutex<HashMap<String, Vec<Value>>>,
    blobs: StdMutex<Vec<String>>,
    next_id: AtomicI64,
    failing: StdMutex<HashSet<String>>,
    calls: StdMutex<Vec<String>>,
    update_gate: StdMutex<Option<Arc<Notify>>>,
}

impl MemoryBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            tables: StdMutex::new(HashMap::new()),
            blobs: StdMutex::new(Vec::new()),
            next_id: AtomicI64::new(1),
            failing: StdMutex::new(HashSet::new()),
            calls: StdMutex::new(Vec::new()),
            update_gate: StdMutex::new(None),
        })
    }

    fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    fn seed_blob(&self, path: &str) {
        self.blobs.lock().unwrap().push(path.to_string());
    }

    /// Makes `op` fail, either for every table (`"insert"`) or one (`"select_all:units"`).
    fn fail(&self, op: &str) {
        self.failing.lock().unwrap().insert(op.to_string());
    }

    fn recover(&self, op: &str) {
        self.failing.lock().unwrap().remove(op);
    }

    fn hold_updates(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.update_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn blob_names(&self) -> Vec<String> {
        self.blobs.lock().unwrap().clone()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, target: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{op}:{target}"));
        let failing = self.failing.lock().unwrap();
        if failing.contains(op) || failing.contains(&format!("{op}:{target}")) {
            return Err(anyhow!("{op} on {target} unavailable"));
        }
        Ok(())
    }
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(id) => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    }
}

fn merge(row: &mut Value, patch: Value) {
    if let (Some(target), Value::Object(fields)) = (row.as_object_mut(), patch) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
}

#[async_trait]
impl TableBackend for MemoryBackend {
    async fn select_all(&self, table: &str) -> Result<Vec<Value>> {
        self.record("select_all", table)?;
        Ok(self.rows(table))
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value> {
        self.record("insert", table)?;
        if row.get("id").is_none() {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            merge(&mut row, json!({ "id": id }));
        }
        self.seed(table, vec![row.clone()]);
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value> {
        self.record("update", table)?;
        let gate = self.update_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row).as_deref() == Some(id)))
            .ok_or_else(|| anyhow!("no row {id} in {table}"))?;
        merge(row, patch);
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.record("delete", table)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| row_id(row).as_deref() != Some(id));
        if rows.len() == before {
            return Err(anyhow!("no row {id} in {table}"));
        }
        Ok(())
    }

    async fn upsert(&self, table: &str, rows: Vec<Value>) -> Result<Vec<Value>> {
        self.record("upsert", table)?;
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table.to_string()).or_default();
        let mut returned = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row_id(&row);
            match stored.iter_mut().find(|existing| row_id(existing) == id) {
                Some(existing) => {
                    merge(existing, row);
                    returned.push(existing.clone());
                }
                None => {
                    stored.push(row.clone());
                    returned.push(row);
                }
            }
        }
        Ok(returned)
    }
}

#[async_trait]
impl BlobStore for MemoryBackend {
    async fn list(&self, prefix: &str) -> Result<Vec<BlobObject>> {
        self.record("list", prefix)?;
        Ok(self
            .blob_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .map(|name| BlobObject {
                name,
                id: None,
                created_at: None,
            })
            .collect())
    }

    async fn upload(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.record("upload", path)?;
        let mut blobs = self.blobs.lock().unwrap();
        if !blobs.iter().any(|name| name == path) {
            blobs.push(path.to_string());
        }
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("https://cdn.test/progress-images/{path}")
    }

    async fn remove(&self, paths: &[String]) -> Result<()> {
        self.record("remove", &paths.join(","))?;
        self.blobs
            .lock()
            .unwrap()
            .retain(|name| !paths.contains(name));
        Ok(())
    }
}

fn store_with(backend: &Arc<MemoryBackend>) -> Arc<DashboardStore> {
    DashboardStore::new(backend.clone(), backend.clone())
}

fn progress_kpi() -> NewKpi {
    NewKpi {
        name: "Progreso de Obra".into(),
        description: "Avance general".into(),
        value: 20.0,
        target: 100.0,
        unit: "%".into(),
        format: KpiFormat::Percentage,
        category: KpiCategory::Progress,
        visible: true,
        ..NewKpi::default()
    }
}

fn apartment(number: &str) -> NewUnit {
    NewUnit {
        number: number.into(),
        unit_type: "Apartamento".into(),
        area: 85.5,
        price: 240_000.0,
        floor: 2,
        bedrooms: Some(2),
        bathrooms: Some(1),
        ..NewUnit::default()
    }
}

fn photo(file_name: &str) -> NewProgressImage {
    NewProgressImage {
        file_name: file_name.into(),
        content_type: "image/jpeg".into(),
        bytes: vec![0xff, 0xd8, 0xff],
        alt: "Fachada".into(),
        date: NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        area: "Estructura".into(),
        description: "Forjado planta 2".into(),
        featured: false,
    }
}

#[tokio::test]
async fn kpi_add_hide_delete_round() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    let created = store.add_kpi(progress_kpi()).await.expect("add");
    assert_eq!(created.fields, progress_kpi());
    assert_eq!(store.kpis().await, vec![created.clone()]);

    let hidden = store.toggle_visibility(created.id).await.expect("toggle");
    assert!(!hidden.fields.visible);
    assert_eq!(
        NewKpi {
            visible: true,
            ..hidden.fields.clone()
        },
        progress_kpi()
    );
    let cached = store.kpis().await;
    assert_eq!(cached.len(), 1);
    assert_eq!(cached[0], hidden);

    store.delete_kpi(created.id).await.expect("delete");
    assert!(store.kpis().await.is_empty());
    assert!(backend.rows(KPIS_TABLE).is_empty());
    assert_eq!(store.last_error().await, None);
}

#[tokio::test]
async fn update_replaces_entry_and_appends_when_not_cached() {
    let backend = MemoryBackend::new();
    backend.seed(
        UNITS_TABLE,
        vec![json!({"id": 9, "number": "B-12", "type": "Local", "area": 120.0, "price": 300000.0, "floor": 0})],
    );
    let store = store_with(&backend);

    let mut unit = Unit {
        id: UnitId(9),
        fields: apartment("B-12"),
    };
    unit.fields.price = 310_000.0;
    let updated = store.update_unit(unit.clone()).await.expect("update");
    assert_eq!(updated, unit);
    assert_eq!(store.units().await, vec![unit.clone()]);

    let fetched = store.fetch_units().await.expect("fetch");
    assert_eq!(fetched, vec![unit]);
}

#[tokio::test]
async fn failed_add_keeps_cache_and_records_error() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    let existing = store.add_unit(apartment("A-101")).await.expect("seed unit");
    let mut events = store.subscribe();

    backend.fail("insert");
    let err = store.add_unit(apartment("A-102")).await.unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(store.units().await, vec![existing]);
    let message = store.last_error().await.expect("error recorded");
    assert!(message.contains("insert on units unavailable"), "{message}");
    assert_eq!(
        events.recv().await.unwrap(),
        StoreEvent::Failed {
            action: StoreAction::AddUnit,
            message,
        }
    );

    store.clear_error().await;
    assert_eq!(store.last_error().await, None);
}

#[tokio::test]
async fn clearing_optional_fields_reaches_the_backend() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    let kpi = store
        .add_kpi(NewKpi {
            trend: Some(Trend::Up),
            change: Some("+5%".into()),
            ..progress_kpi()
        })
        .await
        .expect("add kpi");
    let mut cleared = kpi.clone();
    cleared.fields.trend = None;
    cleared.fields.change = None;
    let saved = store.update_kpi(cleared.clone()).await.expect("clear trend");
    assert_eq!(saved, cleared);
    assert_eq!(store.kpis().await, vec![cleared]);
    assert_eq!(backend.rows(KPIS_TABLE)[0]["trend"], Value::Null);

    let unit = store.add_unit(apartment("C-301")).await.expect("add unit");
    assert_eq!(unit.fields.bedrooms, Some(2));
    let mut cleared = unit.clone();
    cleared.fields.bedrooms = None;
    cleared.fields.bathrooms = None;
    let saved = store.update_unit(cleared.clone()).await.expect("clear rooms");
    assert_eq!(saved, cleared);
    assert_eq!(store.units().await, vec![cleared]);
}

#[tokio::test]
async fn failed_update_keeps_cache_and_records_error() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    let kpi = store.add_kpi(progress_kpi()).await.expect("add kpi");
    let unit = store.add_unit(apartment("A-401")).await.expect("add unit");
    let mut events = store.subscribe();

    backend.fail("update");
    let mut changed = kpi.clone();
    changed.fields.value = 45.0;
    let err = store.update_kpi(changed).await.unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(store.kpis().await, vec![kpi]);

    let mut changed = unit.clone();
    changed.fields.price = 1.0;
    let err = store.update_unit(changed).await.unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(store.units().await, vec![unit]);

    let message = store.last_error().await.expect("error recorded");
    assert!(message.contains("update on units unavailable"), "{message}");
    assert!(matches!(
        events.recv().await.unwrap(),
        StoreEvent::Failed { action: StoreAction::UpdateKpi, .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        StoreEvent::Failed { action: StoreAction::UpdateUnit, .. }
    ));
}

#[tokio::test]
async fn failed_blob_removal_keeps_images() {
    let backend = MemoryBackend::new();
    backend.seed_blob("1-a.jpg");
    backend.seed_blob("2-b.jpg");
    let store = store_with(&backend);
    let images = store.fetch_images().await.expect("fetch");
    let mut events = store.subscribe();

    backend.fail("remove");
    let err = store
        .delete_images(vec![ImageKey::new("1-a.jpg"), ImageKey::new("2-b.jpg")])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(store.images().await, images);
    assert_eq!(backend.blob_names().len(), 2);
    assert!(store.last_error().await.is_some());
    assert!(matches!(
        events.recv().await.unwrap(),
        StoreEvent::Failed { action: StoreAction::DeleteImage, .. }
    ));
}

#[tokio::test]
async fn metadata_update_for_unlisted_image_is_not_found() {
    let backend = MemoryBackend::new();
    backend.seed_blob("1-a.jpg");
    let store = store_with(&backend);
    let mut image = store.fetch_images().await.expect("fetch").remove(0);
    image.id = ImageKey::new("9-missing.jpg");
    image.file_key = "9-missing.jpg".into();

    let err = store.update_image(image).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "image", .. }));
    assert!(backend.rows(IMAGE_META_TABLE).is_empty());
    assert!(!backend.calls().iter().any(|call| call.starts_with("upsert")));
    assert_eq!(store.images().await.len(), 1);
}

#[tokio::test]
async fn snapshot_matches_the_accessors() {
    let backend = MemoryBackend::new();
    backend.seed_blob("1-a.jpg");
    let store = store_with(&backend);
    assert_eq!(store.snapshot().await, StoreSnapshot::default());

    store.add_kpi(progress_kpi()).await.expect("add kpi");
    store.add_unit(apartment("A-1")).await.expect("add unit");
    store.fetch_images().await.expect("fetch images");
    backend.fail("select_all:project_settings");
    assert!(store.fetch_settings().await.is_err());

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.kpis, store.kpis().await);
    assert_eq!(snapshot.units, store.units().await);
    assert_eq!(snapshot.images, store.images().await);
    assert_eq!(snapshot.settings, None);
    assert_eq!(snapshot.last_updated, store.last_updated().await);
    assert_eq!(snapshot.last_error, store.last_error().await);
    assert!(snapshot.last_error.is_some());
}

#[tokio::test]
async fn failed_delete_of_unknown_row_keeps_cache() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    let kpi = store.add_kpi(progress_kpi()).await.expect("add");

    let err = store.delete_kpi(KpiId(404)).await.unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
    assert_eq!(store.kpis().await, vec![kpi]);
    assert!(store.last_error().await.is_some());
}

#[tokio::test]
async fn invalid_input_is_rejected_before_any_request() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    let err = store
        .add_kpi(NewKpi {
            name: "   ".into(),
            ..progress_kpi()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let err = store
        .add_unit(NewUnit {
            price: -1.0,
            ..apartment("A-1")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    let err = store
        .upload_image(NewProgressImage {
            bytes: Vec::new(),
            ..photo("vacia.jpg")
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));

    assert!(backend.calls().is_empty());
    assert_eq!(
        store.last_error().await.as_deref(),
        Some("image file is empty")
    );
}

#[tokio::test]
async fn fetch_collapses_duplicate_ids_and_is_stable() {
    let backend = MemoryBackend::new();
    backend.seed(
        KPIS_TABLE,
        vec![
            json!({"id": 1, "name": "Días Pendientes", "value": 120.0, "target": 540.0, "category": "time", "format": "number"}),
            json!({"id": 2, "name": "Duración Total", "value": 540.0, "target": 540.0, "category": "time", "format": "number"}),
            json!({"id": 1, "name": "Días Pendientes", "value": 118.0, "target": 540.0, "category": "time", "format": "number"}),
        ],
    );
    let store = store_with(&backend);
    assert!(store.is_loading().await);

    let first = store.fetch_kpis().await.expect("first fetch");
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].id, KpiId(1));
    assert_eq!(first[0].fields.value, 118.0);
    assert!(!store.is_loading().await);

    let second = store.fetch_kpis().await.expect("second fetch");
    assert_eq!(first, second);
    assert_eq!(
        views::kpis_in_category(&second, KpiCategory::Time).len(),
        2
    );
}

#[tokio::test]
async fn failed_fetch_leaves_previous_snapshot() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    store.fetch_units().await.expect("empty fetch");
    let stamped = store.last_updated().await;
    assert!(stamped.is_some());
    assert!(!store.is_loading().await);

    backend.fail("select_all:units");
    backend.seed(
        UNITS_TABLE,
        vec![json!({"id": 1, "number": "A-1", "area": 50.0, "price": 1.0, "floor": 1})],
    );
    assert!(store.fetch_units().await.is_err());
    assert!(store.units().await.is_empty());
    assert_eq!(store.last_updated().await, stamped);
}

#[tokio::test]
async fn toggles_on_uncached_ids_are_not_found() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    let err = store.toggle_visibility(KpiId(3)).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "kpi", .. }));
    let err = store
        .toggle_featured(ImageKey::new("missing.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: "image", .. }));
    assert_eq!(
        store.last_error().await.as_deref(),
        Some("image missing.jpg is not loaded")
    );
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn overlapping_update_for_same_record_is_rejected() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    let kpi = store.add_kpi(progress_kpi()).await.expect("add");
    let gate = backend.hold_updates();

    let first = tokio::spawn({
        let store = store.clone();
        let kpi = kpi.clone();
        async move { store.update_kpi(kpi).await }
    });
    let key = kpi.id.to_string();
    while !store.is_pending(StoreAction::UpdateKpi, &key) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let err = store.update_kpi(kpi.clone()).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateRequest { action: StoreAction::UpdateKpi, .. }));
    assert_eq!(store.last_error().await, None);

    gate.notify_one();
    first.await.expect("join").expect("first update");
    assert!(!store.is_pending(StoreAction::UpdateKpi, &key));
    let updates = backend
        .calls()
        .into_iter()
        .filter(|call| call == "update:kpis")
        .count();
    assert_eq!(updates, 1);
}

#[tokio::test]
async fn unit_status_changes_carry_sale_metadata_only_while_sold() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    let unit = store.add_unit(apartment("A-201")).await.expect("add");
    let sold_on = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();

    let sold = store
        .set_unit_status(
            unit.id,
            UnitStatus::Vendida,
            SaleInfo {
                sale_date: Some(sold_on),
                client: Some("Marta Ruiz".into()),
            },
        )
        .await
        .expect("sell");
    assert_eq!(sold.fields.status, UnitStatus::Vendida);
    assert_eq!(sold.fields.sale_date, Some(sold_on));
    assert_eq!(sold.fields.client.as_deref(), Some("Marta Ruiz"));

    let available = store
        .set_unit_status(unit.id, UnitStatus::Disponible, SaleInfo::default())
        .await
        .expect("release");
    assert_eq!(available.fields.sale_date, None);
    assert_eq!(available.fields.client, None);
    assert_eq!(available.fields.number, "A-201");
    assert_eq!(store.units().await, vec![available]);
}

#[tokio::test]
async fn settings_insert_first_then_upsert() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);
    assert_eq!(store.fetch_settings().await.expect("fetch"), None);

    let mut fields = NewProjectSettings {
        name: "Residencial Las Acacias".into(),
        address: "Calle Mayor 12".into(),
        ..NewProjectSettings::default()
    };
    let created = store.save_settings(fields.clone()).await.expect("insert");
    assert_eq!(created.fields, fields);

    fields.developer = "Obras del Norte".into();
    let saved = store.save_settings(fields.clone()).await.expect("upsert");
    assert_eq!(saved.id, created.id);
    assert_eq!(saved.fields, fields);
    assert_eq!(store.settings().await, Some(saved));
    assert_eq!(backend.rows(SETTINGS_TABLE).len(), 1);

    let writes: Vec<String> = backend
        .calls()
        .into_iter()
        .filter(|call| call.ends_with(SETTINGS_TABLE) && !call.starts_with("select_all"))
        .collect();
    assert_eq!(writes, vec!["insert:project_settings", "upsert:project_settings"]);

    let err = store
        .save_settings(NewProjectSettings::default())
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn settings_fetch_reads_the_first_row() {
    let backend = MemoryBackend::new();
    backend.seed(
        SETTINGS_TABLE,
        vec![json!({"id": 4, "name": "Torre Sur", "start_date": "2024-09-01"})],
    );
    let store = store_with(&backend);
    let settings = store.fetch_settings().await.expect("fetch").expect("row");
    assert_eq!(settings.id, SettingsId(4));
    assert_eq!(settings.fields.start_date, NaiveDate::from_ymd_opt(2024, 9, 1));
    assert_eq!(settings.fields.developer, "");
}

#[tokio::test]
async fn uploaded_image_is_listed_with_its_metadata() {
    let backend = MemoryBackend::new();
    let store = store_with(&backend);

    let uploaded = store.upload_image(photo("fachada.jpg")).await.expect("upload");
    assert!(uploaded.file_key.ends_with("-fachada.jpg"));
    assert_eq!(
        uploaded.src,
        format!("https://cdn.test/progress-images/{}", uploaded.file_key)
    );
    assert_eq!(uploaded.area, "Estructura");
    assert_eq!(uploaded.alt, "Fachada");
    assert_eq!(store.images().await, vec![uploaded.clone()]);
    assert_eq!(backend.blob_names(), vec![uploaded.file_key.clone()]);

    let featured = store
        .toggle_featured(uploaded.id.clone())
        .await
        .expect("feature");
    assert!(featured.featured);
    let meta = backend.rows(IMAGE_META_TABLE);
    assert_eq!(meta.len(), 1);
    assert_eq!(meta[0]["featured"], json!(true));

    store.delete_image(uploaded.id).await.expect("delete");
    assert!(store.images().await.is_empty());
    assert!(backend.blob_names().is_empty());
    assert!(backend.rows(IMAGE_META_TABLE).is_empty());
}

#[tokio::test]
async fn images_without_metadata_get_defaults() {
    let backend = MemoryBackend::new();
    backend.seed_blob("1700000000000-grua.jpg");
    backend.fail("select_all:progress_images_meta");
    let store = store_with(&backend);

    let images = store.fetch_images().await.expect("listing still works");
    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!(image.alt, "1700000000000-grua.jpg");
    assert_eq!(image.area, DEFAULT_IMAGE_AREA);
    assert_eq!(image.date, Utc::now().date_naive());
    assert!(!image.featured);
    assert_eq!(store.last_error().await, None);

    backend.fail("list");
    assert!(store.fetch_images().await.is_err());
    assert_eq!(store.images().await.len(), 1);
}

#[tokio::test]
async fn failed_metadata_write_removes_uploaded_blob() {
    let backend = MemoryBackend::new();
    backend.fail("upsert:progress_images_meta");
    let store = store_with(&backend);

    let err = store.upload_image(photo("pilar.jpg")).await.unwrap_err();
    assert!(matches!(err, StoreError::Remote(_)));
    assert!(backend.blob_names().is_empty());
    assert!(store.images().await.is_empty());
}

#[tokio::test]
async fn batch_image_operations() {
    let backend = MemoryBackend::new();
    for key in ["1-a.jpg", "2-b.jpg", "3-c.jpg"] {
        backend.seed_blob(key);
    }
    let store = store_with(&backend);
    store.fetch_images().await.expect("fetch");

    let saved = store.save_all_image_metadata().await.expect("save all");
    assert_eq!(saved.len(), 3);
    assert_eq!(backend.rows(IMAGE_META_TABLE).len(), 3);

    store
        .delete_images(vec![ImageKey::new("1-a.jpg"), ImageKey::new("3-c.jpg")])
        .await
        .expect("delete selected");
    assert_eq!(backend.blob_names(), vec!["2-b.jpg".to_string()]);
    let remaining: Vec<ImageKey> = store.images().await.into_iter().map(|i| i.id).collect();
    assert_eq!(remaining, vec![ImageKey::new("2-b.jpg")]);
    let removes = backend
        .calls()
        .into_iter()
        .filter(|call| call.starts_with("remove:"))
        .count();
    assert_eq!(removes, 1);

    let err = store.delete_images(Vec::new()).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[tokio::test]
async fn image_change_survives_a_failed_refetch() {
    let backend = MemoryBackend::new();
    backend.seed_blob("1-a.jpg");
    let store = store_with(&backend);
    let images = store.fetch_images().await.expect("fetch");

    backend.fail("list");
    let mut edited = images[0].clone();
    edited.description = "Encofrado".into();
    let saved = store.update_image(edited.clone()).await.expect("metadata saved");
    assert_eq!(saved, edited);
    assert_eq!(store.images().await, vec![edited]);
    backend.recover("list");
}

#[tokio::test]
async fn refresh_all_loads_what_it_can() {
    let backend = MemoryBackend::new();
    backend.seed(
        KPIS_TABLE,
        vec![json!({"id": 1, "name": "Progreso de Obra", "value": 20.0, "target": 100.0})],
    );
    backend.fail("select_all:units");
    let store = store_with(&backend);
    let mut events = store.subscribe();

    assert!(store.refresh_all().await.is_err());
    assert_eq!(store.kpis().await.len(), 1);
    assert!(store.last_error().await.is_some());

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&StoreEvent::KpisChanged));
    assert!(seen.contains(&StoreEvent::ImagesChanged));
    assert!(seen.contains(&StoreEvent::SettingsChanged));
    assert!(seen
        .iter()
        .any(|event| matches!(event, StoreEvent::Failed { action: StoreAction::FetchUnits, .. })));
}

#[test]
fn upload_path_prefixes_millis_and_strips_directories() {
    let at = DateTime::parse_from_rfc3339("2025-03-14T10:00:00Z")
        .unwrap()
        .with_timezone(&Utc);
    assert_eq!(
        upload_path(at, "C:\\fotos\\obra.jpg"),
        "1741946400000-obra.jpg"
    );
    assert_eq!(upload_path(at, "planta 2.png"), "1741946400000-planta 2.png");
}
