use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use client_core::{views, DashboardStore, NewProgressImage};
use remote_integration::RestBackend;
use shared::domain::{
    ImageKey, KpiCategory, KpiFormat, KpiId, NewKpi, NewProjectSettings, NewUnit, SaleInfo,
    UnitId, UnitStatus, DEFAULT_IMAGE_AREA,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(name = "obra", about = "Construction project dashboard client")]
struct Cli {
    /// Config file; defaults to ./obra.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Home page figures: headline KPIs and unit sales.
    Summary,
    #[command(subcommand)]
    Kpi(KpiCommand),
    #[command(subcommand)]
    Unit(UnitCommand),
    #[command(subcommand)]
    Image(ImageCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Subcommand, Debug)]
enum KpiCommand {
    List {
        #[arg(long, value_parser = parse_category)]
        category: Option<KpiCategory>,
    },
    Add {
        name: String,
        value: f64,
        #[arg(long, default_value_t = 100.0)]
        target: f64,
        #[arg(long, default_value = "%")]
        unit: String,
        #[arg(long, value_parser = parse_format, default_value = "percentage")]
        format: KpiFormat,
        #[arg(long, value_parser = parse_category, default_value = "progress")]
        category: KpiCategory,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        hidden: bool,
    },
    SetValue {
        id: i64,
        value: f64,
    },
    ToggleVisibility {
        id: i64,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum UnitCommand {
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<UnitStatus>,
        #[arg(long)]
        search: Option<String>,
    },
    Add {
        number: String,
        #[arg(long = "type", default_value = "Oficina")]
        unit_type: String,
        #[arg(long)]
        area: f64,
        #[arg(long)]
        price: f64,
        #[arg(long, default_value_t = 1)]
        floor: i32,
        #[arg(long)]
        bedrooms: Option<u32>,
        #[arg(long)]
        bathrooms: Option<u32>,
    },
    Status {
        id: i64,
        #[arg(value_parser = parse_status)]
        status: UnitStatus,
        #[arg(long)]
        client: Option<String>,
        #[arg(long)]
        sale_date: Option<NaiveDate>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand, Debug)]
enum ImageCommand {
    List {
        #[arg(long)]
        area: Option<String>,
        #[arg(long)]
        featured: bool,
    },
    Upload(UploadArgs),
    ToggleFeatured {
        key: String,
    },
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Rewrites the metadata row of every listed image.
    SaveAll,
}

#[derive(Args, Debug)]
struct UploadArgs {
    file: PathBuf,
    #[arg(long, default_value = DEFAULT_IMAGE_AREA)]
    area: String,
    #[arg(long)]
    alt: Option<String>,
    #[arg(long)]
    date: Option<NaiveDate>,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    featured: bool,
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        developer: Option<String>,
        #[arg(long)]
        start_date: Option<NaiveDate>,
        #[arg(long)]
        end_date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.log_filter))
        .context("invalid log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let backend = RestBackend::new(settings.backend_options())?;
    info!(backend = %settings.backend_url, bucket = backend.bucket(), "connecting");
    let store = DashboardStore::with_backend(backend);

    match cli.command {
        Command::Summary => summary(&store).await,
        Command::Kpi(command) => kpi(&store, command).await,
        Command::Unit(command) => unit(&store, command).await,
        Command::Image(command) => image(&store, command).await,
        Command::Settings(command) => project_settings(&store, command).await,
    }
}

async fn summary(store: &DashboardStore) -> Result<()> {
    store.fetch_kpis().await?;
    store.fetch_units().await?;
    let snapshot = store.snapshot().await;
    let units = snapshot.units;
    let summary = views::DashboardSummary::build(&snapshot.kpis, &units);

    println!("progreso de obra: {}%", summary.project_progress);
    println!("días pendientes:  {}", summary.pending_days);
    println!("unidades vendidas: {}%", summary.units_sold_percent);
    println!("duración total:   {}", summary.total_duration);

    let counts = summary.unit_counts;
    println!("unidades: {}", counts.total());
    for entry in &summary.units_by_status {
        let count = entry.value;
        println!("  {:<12} {count:>4} ({}%)", entry.name, counts.percent(count));
    }
    for entry in &summary.units_by_type {
        println!("  {:<12} {:>4}", entry.name, entry.value);
    }
    for floor in views::floor_breakdown(&units) {
        println!("  planta {:>3}: {}/{} vendidas", floor.floor, floor.sold, floor.total);
    }
    Ok(())
}

async fn kpi(store: &DashboardStore, command: KpiCommand) -> Result<()> {
    match command {
        KpiCommand::List { category } => {
            let kpis = store.fetch_kpis().await?;
            let listed = match category {
                Some(category) => views::kpis_in_category(&kpis, category),
                None => kpis.iter().collect(),
            };
            for kpi in listed {
                println!(
                    "{:>4}  {:<28} {:>14}  target {}{}",
                    kpi.id,
                    kpi.fields.name,
                    views::kpi_display_value(kpi),
                    kpi.fields.target,
                    if kpi.fields.visible { "" } else { "  (oculto)" }
                );
            }
        }
        KpiCommand::Add {
            name,
            value,
            target,
            unit,
            format,
            category,
            description,
            hidden,
        } => {
            let kpi = store
                .add_kpi(NewKpi {
                    name,
                    description,
                    value,
                    target,
                    unit,
                    format,
                    category,
                    visible: !hidden,
                    ..NewKpi::default()
                })
                .await?;
            println!("created kpi_id={}", kpi.id);
        }
        KpiCommand::SetValue { id, value } => {
            store.fetch_kpis().await?;
            let mut kpi = cached(store.kpis().await, |kpi| kpi.id == KpiId(id), "kpi", id)?;
            kpi.fields.value = value;
            let kpi = store.update_kpi(kpi).await?;
            println!("kpi {} = {}", kpi.id, views::kpi_display_value(&kpi));
        }
        KpiCommand::ToggleVisibility { id } => {
            store.fetch_kpis().await?;
            let kpi = store.toggle_visibility(KpiId(id)).await?;
            println!("kpi {} visible={}", kpi.id, kpi.fields.visible);
        }
        KpiCommand::Delete { id } => {
            store.delete_kpi(KpiId(id)).await?;
            println!("deleted kpi_id={id}");
        }
    }
    Ok(())
}

async fn unit(store: &DashboardStore, command: UnitCommand) -> Result<()> {
    match command {
        UnitCommand::List { status, search } => {
            let units = store.fetch_units().await?;
            let term = search.unwrap_or_default();
            for unit in views::search_units(&units, &term)
                .into_iter()
                .filter(|unit| status.map_or(true, |status| unit.fields.status == status))
            {
                println!(
                    "{:>4}  {:<8} {:<12} planta {:>2}  {:>7} m²  {:>14}  {}",
                    unit.id,
                    unit.fields.number,
                    unit.fields.unit_type,
                    unit.fields.floor,
                    unit.fields.area,
                    views::format_currency_eur(unit.fields.price),
                    unit.fields.status
                );
            }
        }
        UnitCommand::Add {
            number,
            unit_type,
            area,
            price,
            floor,
            bedrooms,
            bathrooms,
        } => {
            let unit = store
                .add_unit(NewUnit {
                    number,
                    unit_type,
                    area,
                    price,
                    floor,
                    bedrooms,
                    bathrooms,
                    ..NewUnit::default()
                })
                .await?;
            println!("created unit_id={}", unit.id);
        }
        UnitCommand::Status {
            id,
            status,
            client,
            sale_date,
        } => {
            store.fetch_units().await?;
            let unit = store
                .set_unit_status(UnitId(id), status, SaleInfo { sale_date, client })
                .await?;
            println!("unit {} is now {}", unit.fields.number, unit.fields.status);
        }
        UnitCommand::Delete { id } => {
            store.delete_unit(UnitId(id)).await?;
            println!("deleted unit_id={id}");
        }
    }
    Ok(())
}

async fn image(store: &DashboardStore, command: ImageCommand) -> Result<()> {
    match command {
        ImageCommand::List { area, featured } => {
            let images = store.fetch_images().await?;
            for image in views::images_newest_first(&images) {
                if area.as_deref().is_some_and(|area| image.area != area) {
                    continue;
                }
                if featured && !image.featured {
                    continue;
                }
                println!(
                    "{}  {:<14} {}{}  {}",
                    views::format_display_date(&image.date.to_string()),
                    image.area,
                    image.file_key,
                    if image.featured { " *" } else { "" },
                    image.src
                );
            }
        }
        ImageCommand::Upload(args) => {
            let bytes = tokio::fs::read(&args.file)
                .await
                .with_context(|| format!("failed to read '{}'", args.file.display()))?;
            let file_name = args
                .file
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| anyhow!("'{}' has no file name", args.file.display()))?
                .to_string();
            let image = store
                .upload_image(NewProgressImage {
                    content_type: content_type_for(&args.file),
                    alt: args.alt.unwrap_or_else(|| file_name.clone()),
                    file_name,
                    bytes,
                    date: args.date.unwrap_or_else(|| Utc::now().date_naive()),
                    area: args.area,
                    description: args.description,
                    featured: args.featured,
                })
                .await?;
            println!("uploaded {}", image.src);
        }
        ImageCommand::ToggleFeatured { key } => {
            store.fetch_images().await?;
            let image = store.toggle_featured(ImageKey::new(key)).await?;
            println!("{} featured={}", image.file_key, image.featured);
        }
        ImageCommand::Delete { keys } => {
            let count = keys.len();
            store
                .delete_images(keys.into_iter().map(ImageKey::new).collect())
                .await?;
            println!("deleted {count} image(s)");
        }
        ImageCommand::SaveAll => {
            store.fetch_images().await?;
            let saved = store.save_all_image_metadata().await?;
            println!("saved metadata for {} image(s)", saved.len());
        }
    }
    Ok(())
}

async fn project_settings(store: &DashboardStore, command: SettingsCommand) -> Result<()> {
    let current = store.fetch_settings().await?;
    match command {
        SettingsCommand::Show => match current {
            Some(settings) => {
                let fields = settings.fields;
                let date = |date: Option<NaiveDate>| {
                    date.map(|date| views::format_display_date(&date.to_string()))
                        .unwrap_or_else(|| "-".into())
                };
                println!("proyecto:  {}", fields.name);
                println!("dirección: {}", fields.address);
                println!("promotor:  {}", fields.developer);
                println!("inicio:    {}", date(fields.start_date));
                println!("fin:       {}", date(fields.end_date));
                if !fields.description.is_empty() {
                    println!("{}", fields.description);
                }
            }
            None => println!("no project settings saved yet"),
        },
        SettingsCommand::Set {
            name,
            address,
            description,
            developer,
            start_date,
            end_date,
        } => {
            let mut fields: NewProjectSettings =
                current.map(|settings| settings.fields).unwrap_or_default();
            if let Some(v) = name {
                fields.name = v;
            }
            if let Some(v) = address {
                fields.address = v;
            }
            if let Some(v) = description {
                fields.description = v;
            }
            if let Some(v) = developer {
                fields.developer = v;
            }
            if start_date.is_some() {
                fields.start_date = start_date;
            }
            if end_date.is_some() {
                fields.end_date = end_date;
            }
            let saved = store.save_settings(fields).await?;
            println!("saved settings_id={}", saved.id);
        }
    }
    Ok(())
}

fn cached<T>(
    records: Vec<T>,
    matches: impl Fn(&T) -> bool,
    entity: &str,
    id: i64,
) -> Result<T> {
    records
        .into_iter()
        .find(|record| matches(record))
        .ok_or_else(|| anyhow!("{entity} {id} not found"))
}

fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn parse_format(raw: &str) -> Result<KpiFormat, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "percentage" => Ok(KpiFormat::Percentage),
        "number" => Ok(KpiFormat::Number),
        "currency" => Ok(KpiFormat::Currency),
        other => Err(format!("unknown format '{other}' (percentage, number, currency)")),
    }
}

fn parse_category(raw: &str) -> Result<KpiCategory, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "progress" => Ok(KpiCategory::Progress),
        "time" => Ok(KpiCategory::Time),
        "sales" => Ok(KpiCategory::Sales),
        "budget" => Ok(KpiCategory::Budget),
        other => Err(format!(
            "unknown category '{other}' (progress, time, sales, budget)"
        )),
    }
}

fn parse_status(raw: &str) -> Result<UnitStatus, String> {
    UnitStatus::parse(raw)
        .ok_or_else(|| format!("unknown status '{raw}' (Disponible, Vendida, Reservada)"))
}
