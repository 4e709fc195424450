//! Figures the dashboard pages derive from the cached collections.
//!
//! Everything here is a pure function of its input slices.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use shared::domain::{Kpi, KpiCategory, KpiFormat, ProgressImage, Unit, UnitStatus};

pub const PROGRESS_KPI: &str = "Progreso de Obra";
pub const PENDING_DAYS_KPI: &str = "Días Pendientes";
pub const UNITS_SOLD_KPI: &str = "Unidades Vendidas";
pub const TOTAL_DURATION_KPI: &str = "Duración Total";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub sold: usize,
    pub available: usize,
    pub reserved: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.sold + self.available + self.reserved
    }

    pub fn get(&self, status: UnitStatus) -> usize {
        match status {
            UnitStatus::Vendida => self.sold,
            UnitStatus::Disponible => self.available,
            UnitStatus::Reservada => self.reserved,
        }
    }

    /// Share of `count` in the total, rounded to a whole percent.
    pub fn percent(&self, count: usize) -> u32 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        ((count as f64 / total as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryCount {
    pub name: String,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloorSummary {
    pub floor: i32,
    pub sold: usize,
    pub total: usize,
}

pub fn status_counts(units: &[Unit]) -> StatusCounts {
    units
        .iter()
        .fold(StatusCounts::default(), |mut counts, unit| {
            match unit.fields.status {
                UnitStatus::Vendida => counts.sold += 1,
                UnitStatus::Disponible => counts.available += 1,
                UnitStatus::Reservada => counts.reserved += 1,
            }
            counts
        })
}

/// Unit types in first-seen order with how many units carry each.
pub fn units_by_type(units: &[Unit]) -> Vec<CategoryCount> {
    let mut counts: Vec<CategoryCount> = Vec::new();
    for unit in units {
        match counts
            .iter_mut()
            .find(|entry| entry.name == unit.fields.unit_type)
        {
            Some(entry) => entry.value += 1,
            None => counts.push(CategoryCount {
                name: unit.fields.unit_type.clone(),
                value: 1,
            }),
        }
    }
    counts
}

/// Sold, available and reserved slices for the distribution chart; empty slices are left out.
pub fn units_by_status(units: &[Unit]) -> Vec<CategoryCount> {
    let counts = status_counts(units);
    [
        ("Vendidas", counts.sold),
        ("Disponibles", counts.available),
        ("Reservadas", counts.reserved),
    ]
    .into_iter()
    .filter(|(_, value)| *value > 0)
    .map(|(name, value)| CategoryCount {
        name: name.to_string(),
        value,
    })
    .collect()
}

/// Per-floor sales, top floor first.
pub fn floor_breakdown(units: &[Unit]) -> Vec<FloorSummary> {
    let mut floors: BTreeMap<i32, FloorSummary> = BTreeMap::new();
    for unit in units {
        let entry = floors.entry(unit.fields.floor).or_insert(FloorSummary {
            floor: unit.fields.floor,
            sold: 0,
            total: 0,
        });
        entry.total += 1;
        if unit.fields.status == UnitStatus::Vendida {
            entry.sold += 1;
        }
    }
    floors.into_values().rev().collect()
}

/// Case-insensitive match on the unit number or type.
pub fn search_units<'a>(units: &'a [Unit], term: &str) -> Vec<&'a Unit> {
    let needle = term.trim().to_lowercase();
    units
        .iter()
        .filter(|unit| {
            needle.is_empty()
                || unit.fields.number.to_lowercase().contains(&needle)
                || unit.fields.unit_type.to_lowercase().contains(&needle)
        })
        .collect()
}

pub fn units_with_status(units: &[Unit], status: UnitStatus) -> Vec<&Unit> {
    units
        .iter()
        .filter(|unit| unit.fields.status == status)
        .collect()
}

pub fn kpis_in_category(kpis: &[Kpi], category: KpiCategory) -> Vec<&Kpi> {
    kpis.iter()
        .filter(|kpi| kpi.fields.category == category)
        .collect()
}

pub fn visible_kpis(kpis: &[Kpi]) -> Vec<&Kpi> {
    kpis.iter().filter(|kpi| kpi.fields.visible).collect()
}

pub fn visible_kpi_named<'a>(kpis: &'a [Kpi], name: &str) -> Option<&'a Kpi> {
    kpis.iter()
        .find(|kpi| kpi.fields.visible && kpi.fields.name == name)
}

pub fn completion_percent(value: f64, target: f64) -> f64 {
    if target == 0.0 {
        return 0.0;
    }
    value / target * 100.0
}

pub fn kpi_display_value(kpi: &Kpi) -> String {
    match kpi.fields.format {
        KpiFormat::Percentage => format!("{}%", kpi.fields.value),
        KpiFormat::Number => kpi.fields.value.to_string(),
        KpiFormat::Currency => format_currency_eur(kpi.fields.value),
    }
}

/// Euro amount without decimals, grouped the way Spanish locales do it:
/// `450.000 €`, but `4500 €` since four-digit amounts stay ungrouped.
pub fn format_currency_eur(value: f64) -> String {
    let value = if value.is_finite() { value.round() } else { 0.0 };
    let digits = format!("{:.0}", value.abs());
    let grouped = if digits.len() > 4 {
        let mut out = String::with_capacity(digits.len() + digits.len() / 3);
        for (index, ch) in digits.chars().enumerate() {
            if index > 0 && (digits.len() - index) % 3 == 0 {
                out.push('.');
            }
            out.push(ch);
        }
        out
    } else {
        digits
    };
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}{grouped}\u{a0}€")
}

/// `2025-01-15` becomes `15/01/2025`; anything else is returned as is.
pub fn format_display_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(date) => date.format("%d/%m/%Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn images_in_area<'a>(images: &'a [ProgressImage], area: &str) -> Vec<&'a ProgressImage> {
    images.iter().filter(|image| image.area == area).collect()
}

pub fn featured_images(images: &[ProgressImage]) -> Vec<&ProgressImage> {
    images.iter().filter(|image| image.featured).collect()
}

pub fn images_newest_first(images: &[ProgressImage]) -> Vec<&ProgressImage> {
    let mut sorted: Vec<&ProgressImage> = images.iter().collect();
    sorted.sort_by(|a, b| b.date.cmp(&a.date));
    sorted
}

/// Headline figures of the project home page.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSummary {
    pub project_progress: f64,
    pub pending_days: f64,
    pub units_sold_percent: f64,
    pub total_duration: f64,
    pub unit_counts: StatusCounts,
    pub units_by_type: Vec<CategoryCount>,
    pub units_by_status: Vec<CategoryCount>,
}

impl DashboardSummary {
    pub fn build(kpis: &[Kpi], units: &[Unit]) -> Self {
        let kpi_value = |name: &str| {
            visible_kpi_named(kpis, name)
                .map(|kpi| kpi.fields.value)
                .unwrap_or(0.0)
        };
        Self {
            project_progress: kpi_value(PROGRESS_KPI),
            pending_days: kpi_value(PENDING_DAYS_KPI),
            units_sold_percent: kpi_value(UNITS_SOLD_KPI),
            total_duration: kpi_value(TOTAL_DURATION_KPI),
            unit_counts: status_counts(units),
            units_by_type: units_by_type(units),
            units_by_status: units_by_status(units),
        }
    }
}

#[cfg(test)]
#[path = "tests/views_tests.rs"]
mod tests;
