use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(KpiId);
id_newtype!(UnitId);
id_newtype!(SettingsId);

/// Progress images are keyed by the file name of their blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageKey(pub String);

impl ImageKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiFormat {
    #[default]
    Percentage,
    Number,
    Currency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiCategory {
    #[default]
    Progress,
    Time,
    Sales,
    Budget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    #[default]
    Neutral,
}

/// Sale state of a unit. The labels are the ones stored in the `units` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitStatus {
    #[default]
    Disponible,
    Vendida,
    Reservada,
}

impl UnitStatus {
    pub const ALL: [UnitStatus; 3] = [
        UnitStatus::Disponible,
        UnitStatus::Vendida,
        UnitStatus::Reservada,
    ];

    pub fn label(self) -> &'static str {
        match self {
            UnitStatus::Disponible => "Disponible",
            UnitStatus::Vendida => "Vendida",
            UnitStatus::Reservada => "Reservada",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.label().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub id: KpiId,
    #[serde(flatten)]
    pub fields: NewKpi,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewKpi {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub value: f64,
    pub target: f64,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub format: KpiFormat,
    #[serde(default)]
    pub category: KpiCategory,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub chart_type: ChartType,
    #[serde(default)]
    pub trend: Option<Trend>,
    #[serde(default)]
    pub change: Option<String>,
}

impl Default for NewKpi {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            value: 0.0,
            target: 100.0,
            unit: "%".into(),
            format: KpiFormat::Percentage,
            category: KpiCategory::Progress,
            visible: true,
            chart_type: ChartType::None,
            trend: None,
            change: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    #[serde(flatten)]
    pub fields: NewUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUnit {
    pub number: String,
    #[serde(rename = "type", default = "default_unit_type")]
    pub unit_type: String,
    pub area: f64,
    pub price: f64,
    #[serde(default)]
    pub status: UnitStatus,
    pub floor: i32,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<u32>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub sale_date: Option<NaiveDate>,
    #[serde(default)]
    pub client: Option<String>,
}

impl Default for NewUnit {
    fn default() -> Self {
        Self {
            number: String::new(),
            unit_type: default_unit_type(),
            area: 0.0,
            price: 0.0,
            status: UnitStatus::Disponible,
            floor: 1,
            bedrooms: None,
            bathrooms: None,
            image: None,
            description: None,
            features: Vec::new(),
            sale_date: None,
            client: None,
        }
    }
}

/// Sale metadata attached when a unit changes status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaleInfo {
    pub sale_date: Option<NaiveDate>,
    pub client: Option<String>,
}

pub const DEFAULT_IMAGE_AREA: &str = "Cimentación";

/// A progress photo as the dashboard shows it: blob listing joined with its metadata row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressImage {
    pub id: ImageKey,
    pub src: String,
    pub file_key: String,
    pub alt: String,
    pub date: NaiveDate,
    pub area: String,
    pub description: String,
    pub featured: bool,
}

impl ProgressImage {
    pub fn meta(&self) -> ImageMeta {
        ImageMeta {
            id: ImageKey::new(self.file_key.clone()),
            alt: self.alt.clone(),
            date: self.date,
            area: self.area.clone(),
            description: self.description.clone(),
            featured: self.featured,
        }
    }
}

/// Row of `progress_images_meta`; `id` is the blob file key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub id: ImageKey,
    #[serde(default)]
    pub alt: String,
    pub date: NaiveDate,
    #[serde(default = "default_image_area")]
    pub area: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub featured: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub id: SettingsId,
    #[serde(flatten)]
    pub fields: NewProjectSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProjectSettings {
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub developer: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_true() -> bool {
    true
}

fn default_unit_type() -> String {
    "Oficina".into()
}

fn default_image_area() -> String {
    DEFAULT_IMAGE_AREA.into()
}
