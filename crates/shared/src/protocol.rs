use serde::{Deserialize, Serialize};

pub const KPIS_TABLE: &str = "kpis";
pub const UNITS_TABLE: &str = "units";
pub const IMAGE_META_TABLE: &str = "progress_images_meta";
pub const SETTINGS_TABLE: &str = "project_settings";

pub const PROGRESS_IMAGES_BUCKET: &str = "progress-images";

/// The storage listing endpoint caps each page; the dashboard only reads the first one.
pub const BLOB_LIST_LIMIT: u32 = 100;

/// One entry of a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobObject {
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListObjectsRequest {
    pub prefix: String,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveObjectsRequest {
    pub prefixes: Vec<String>,
}
