//! Complete dataset: the worldwide GeoNuclearData fleet plus simulated
//! operations driven by an equipment catalog with criticality levels
//!
//! Falls back to the French fleet when the dataset cannot be fetched.

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, Local, NaiveDateTime, Timelike};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;
use serde_json::{Map, Value};

use super::docs::{download_documents, fetch, http_client, PublicDocument};
use super::seed::{exponential, normal, round_to, weighted, FRENCH_REACTORS};

pub const GEONUCLEAR_URLS: [&str; 2] = [
    "https://raw.githubusercontent.com/cristianst85/GeoNuclearData/master/data/json/reactors.json",
    "https://raw.githubusercontent.com/cristianst85/GeoNuclearData/main/data/json/reactors.json",
];

pub const NRC_DOCUMENTS: [PublicDocument; 2] = [
    PublicDocument {
        url: "https://www.nrc.gov/docs/ML2220/ML22207A388.pdf",
        name: "NRC_Inspection_Report_Framatome_2022.pdf",
        doc_type: "inspection",
        description: "NRC Inspection Report - Framatome 2022",
    },
    PublicDocument {
        url: "https://www.nrc.gov/docs/ML2321/ML23214A221.pdf",
        name: "NRC_Safety_Evaluation_2023.pdf",
        doc_type: "safety",
        description: "NRC Safety Evaluation 2023",
    },
];

const GEONUCLEAR_TIMEOUT: StdDuration = StdDuration::from_secs(30);

pub const DEFAULT_COMPLETE_YEARS: u32 = 10;
pub const DEFAULT_SENSOR_DAYS: u32 = 90;

/// Capacity assumed for reactors the dataset lists without one
const DEFAULT_CAPACITY_MW: f64 = 1000.0;
const MAX_DURATION_HOURS: i64 = 336;
const LABOR_RATE_EUROS: f64 = 85.0;
const SENSOR_REACTORS: usize = 10;

// ============================================================================
// Equipment catalog
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Criticality {
    Low,
    Medium,
    High,
}

impl Criticality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Criticality::Low => "low",
            Criticality::Medium => "medium",
            Criticality::High => "high",
        }
    }

    fn maintenance_weights(&self) -> [(&'static str, f64); 3] {
        let (preventive, corrective, inspection) = match self {
            Criticality::High => (0.70, 0.20, 0.10),
            Criticality::Medium => (0.55, 0.30, 0.15),
            Criticality::Low => (0.45, 0.35, 0.20),
        };
        [
            ("préventive", preventive),
            ("corrective", corrective),
            ("inspection", inspection),
        ]
    }

    fn severity_weights(&self) -> [(&'static str, f64); 3] {
        let (low, medium, high) = match self {
            Criticality::High => (0.60, 0.30, 0.10),
            Criticality::Medium => (0.70, 0.25, 0.05),
            Criticality::Low => (0.80, 0.18, 0.02),
        };
        [("low", low), ("medium", medium), ("high", high)]
    }
}

pub struct CatalogEquipment {
    pub name: &'static str,
    pub category: &'static str,
    pub mtbf_hours: u32,
    pub mttr_hours: u32,
    pub criticality: Criticality,
}

const fn item(
    name: &'static str,
    category: &'static str,
    mtbf_hours: u32,
    mttr_hours: u32,
    criticality: Criticality,
) -> CatalogEquipment {
    CatalogEquipment {
        name,
        category,
        mtbf_hours,
        mttr_hours,
        criticality,
    }
}

use Criticality::{High, Low, Medium};

pub const EQUIPMENT_CATALOG: [CatalogEquipment; 15] = [
    item("Primary Coolant Pump", "mécanique", 8760, 48, High),
    item("Control Valve", "mécanique", 4380, 8, Medium),
    item("Temperature Sensor PT100", "instrumentation", 17520, 4, Low),
    item("Pressure Transmitter", "instrumentation", 17520, 6, Medium),
    item("Emergency Diesel Generator", "électrique", 2190, 72, High),
    item("Main Transformer", "électrique", 43800, 168, High),
    item("Steam Generator", "thermique", 26280, 240, High),
    item("Main Turbine", "mécanique", 8760, 120, High),
    item("Feedwater Pump", "mécanique", 6570, 24, Medium),
    item("Motor-Operated Valve", "électrique", 8760, 12, Medium),
    item("Reactor Protection System", "instrumentation", 87600, 8, High),
    item("Containment Isolation Valve", "mécanique", 43800, 24, High),
    item("Cooling Tower Fan", "mécanique", 4380, 16, Low),
    item("Neutron Flux Detector", "instrumentation", 26280, 12, High),
    item("Boric Acid Pump", "mécanique", 8760, 18, Medium),
];

/// The last entry is the "unknown" cause
const ROOT_CAUSES: [&str; 10] = [
    "Usure normale des composants",
    "Défaut matériau détecté",
    "Erreur procédurale",
    "Conditions environnementales",
    "Défaillance fournisseur",
    "Interférence électromagnétique",
    "Problème de calibration",
    "Fatigue thermique",
    "Corrosion détectée",
    "En investigation",
];

// ============================================================================
// Fleet
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetReactor {
    pub name: String,
    pub reactor_model: Option<String>,
    pub reactor_type: Option<String>,
    pub status: String,
    pub country: Option<String>,
    pub thermal_capacity: Option<f64>,
    pub gross_capacity: Option<f64>,
    pub operational_from: Option<String>,
    pub operational_to: Option<String>,
}

impl FleetReactor {
    fn capacity(&self) -> f64 {
        self.gross_capacity.unwrap_or(DEFAULT_CAPACITY_MW)
    }

    fn has_maintenances(&self) -> bool {
        matches!(self.status.as_str(), "Operational" | "Suspended Operation")
    }

    fn has_incidents(&self) -> bool {
        self.has_maintenances() || self.status == "Shutdown"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FleetOrigin {
    GeoNuclearData,
    LocalFile,
    FrenchFallback,
}

impl std::fmt::Display for FleetOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FleetOrigin::GeoNuclearData => "GeoNuclearData",
            FleetOrigin::LocalFile => "local GeoNuclearData file",
            FleetOrigin::FrenchFallback => "French fleet (offline fallback)",
        })
    }
}

fn text(record: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// `1977-04-06T00:00:00` -> `1977-04-06`
fn date_only(value: String) -> String {
    match value.split_once('T') {
        Some((date, _)) => date.to_string(),
        None => value,
    }
}

fn reactor_from_record(record: &Map<String, Value>) -> Option<FleetReactor> {
    Some(FleetReactor {
        name: text(record, &["name", "Name"])?,
        reactor_model: text(record, &["reactor_model", "ReactorModel"]),
        reactor_type: text(record, &["reactor_type", "ReactorType"]),
        status: text(record, &["status", "Status"]).unwrap_or_else(|| "Unknown".to_string()),
        country: text(record, &["country", "Country", "CountryCode"]),
        thermal_capacity: number(record, &["thermal_capacity", "ThermalCapacity"]),
        gross_capacity: number(record, &["gross_capacity", "GrossCapacity", "Capacity"]),
        operational_from: text(record, &["operational_from", "OperationalFrom"]).map(date_only),
        operational_to: text(record, &["operational_to", "OperationalTo"]).map(date_only),
    })
}

/// Parse GeoNuclearData reactor JSON (snake_case or PascalCase keys)
///
/// Records without a name are skipped.
pub fn parse_geonuclear(json: &str) -> Result<Vec<FleetReactor>> {
    let value: Value = serde_json::from_str(json).context("Invalid GeoNuclearData JSON")?;
    let records = match value {
        Value::Array(records) => records,
        Value::Object(mut map) => match map.remove("reactors") {
            Some(Value::Array(records)) => records,
            _ => anyhow::bail!("GeoNuclearData JSON has no reactor list"),
        },
        _ => anyhow::bail!("GeoNuclearData JSON must be an array of reactors"),
    };

    let reactors: Vec<FleetReactor> = records
        .iter()
        .filter_map(Value::as_object)
        .filter_map(reactor_from_record)
        .collect();

    if reactors.is_empty() {
        anyhow::bail!("No reactors found in GeoNuclearData JSON");
    }
    Ok(reactors)
}

pub fn load_geonuclear_file(path: &Path) -> Result<Vec<FleetReactor>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read GeoNuclearData file {:?}", path))?;
    parse_geonuclear(&json)
}

/// The French fleet table used when GeoNuclearData is unreachable
pub fn french_fleet() -> Vec<FleetReactor> {
    FRENCH_REACTORS
        .iter()
        .map(|r| FleetReactor {
            name: r.name.to_string(),
            reactor_model: Some(r.reactor_model.to_string()),
            reactor_type: Some(r.reactor_type.to_string()),
            status: r.status.to_string(),
            country: Some("France".to_string()),
            thermal_capacity: Some(r.thermal_capacity as f64),
            gross_capacity: Some(r.gross_capacity as f64),
            operational_from: None,
            operational_to: None,
        })
        .collect()
}

/// Try each URL in turn, then fall back to the French fleet
pub async fn download_geonuclear_data(urls: &[&str]) -> (Vec<FleetReactor>, FleetOrigin) {
    let client = match http_client(GEONUCLEAR_TIMEOUT) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("GeoNuclearData unavailable: {:#}", e);
            return (french_fleet(), FleetOrigin::FrenchFallback);
        }
    };

    for url in urls {
        let parsed = fetch(&client, url).await.and_then(|bytes| {
            let json = String::from_utf8(bytes).context("GeoNuclearData is not UTF-8")?;
            parse_geonuclear(&json)
        });
        match parsed {
            Ok(reactors) => {
                tracing::info!("Downloaded {} reactors from GeoNuclearData", reactors.len());
                return (reactors, FleetOrigin::GeoNuclearData);
            }
            Err(e) => tracing::warn!("Failed to load GeoNuclearData from {}: {:#}", url, e),
        }
    }

    tracing::info!("Using the French fleet as fallback");
    (french_fleet(), FleetOrigin::FrenchFallback)
}

pub async fn download_nrc_documents(dir: &Path) -> Result<Vec<PathBuf>> {
    download_documents(dir, &NRC_DOCUMENTS).await
}

// ============================================================================
// Dataset
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct CompleteOptions {
    pub years: u32,
    pub sensor_days: u32,
    pub seed: u64,
}

impl Default for CompleteOptions {
    fn default() -> Self {
        Self {
            years: DEFAULT_COMPLETE_YEARS,
            sensor_days: DEFAULT_SENSOR_DAYS,
            seed: super::DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteSummary {
    pub fleet_source: FleetOrigin,
    pub reactors: usize,
    pub maintenances: usize,
    pub incidents: usize,
    pub sensor_readings: usize,
    pub equipment_types: usize,
    pub documents_downloaded: usize,
    pub db_path: PathBuf,
}

/// Fetch the fleet, write the database and optionally the NRC documents
///
/// `fleet_file` replaces the download with a local GeoNuclearData copy.
pub async fn build_complete_dataset(
    db_path: &Path,
    docs_dir: Option<&Path>,
    fleet_file: Option<&Path>,
    options: CompleteOptions,
) -> Result<CompleteSummary> {
    let (fleet, origin) = match fleet_file {
        Some(path) => (load_geonuclear_file(path)?, FleetOrigin::LocalFile),
        None => download_geonuclear_data(&GEONUCLEAR_URLS).await,
    };

    let mut summary = write_complete_dataset(db_path, &fleet, options)?;
    summary.fleet_source = origin;

    if let Some(dir) = docs_dir {
        summary.documents_downloaded = download_nrc_documents(dir).await?.len();
    }
    Ok(summary)
}

/// Create or replace the operational database from a fleet
pub fn write_complete_dataset(
    db_path: &Path,
    fleet: &[FleetReactor],
    options: CompleteOptions,
) -> Result<CompleteSummary> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {:?}", db_path))?;
    let mut rng = StdRng::seed_from_u64(options.seed);
    let now = Local::now().naive_local();

    tracing::info!(
        "Building complete dataset at {:?}: {} reactors, {} years",
        db_path,
        fleet.len(),
        options.years
    );

    let tx = conn.transaction()?;
    create_tables(&tx)?;

    let summary = CompleteSummary {
        fleet_source: FleetOrigin::LocalFile,
        reactors: insert_fleet(&tx, fleet)?,
        maintenances: insert_maintenances(&tx, &mut rng, fleet, now, options.years)?,
        incidents: insert_incidents(&tx, &mut rng, fleet, now, options.years)?,
        sensor_readings: insert_sensor_readings(&tx, &mut rng, fleet, now, options.sensor_days)?,
        equipment_types: insert_catalog(&tx)?,
        documents_downloaded: 0,
        db_path: db_path.to_path_buf(),
    };
    tx.commit().context("Failed to commit complete dataset")?;

    tracing::info!(
        "Complete dataset: {} maintenances, {} incidents, {} sensor readings",
        summary.maintenances,
        summary.incidents,
        summary.sensor_readings
    );
    Ok(summary)
}

fn create_tables(tx: &Transaction<'_>) -> Result<()> {
    tx.execute_batch(
        r#"
        DROP TABLE IF EXISTS reactors;
        DROP TABLE IF EXISTS maintenances;
        DROP TABLE IF EXISTS incidents;
        DROP TABLE IF EXISTS sensor_readings;
        DROP TABLE IF EXISTS equipment_catalog;

        CREATE TABLE reactors (
            name TEXT NOT NULL,
            reactor_model TEXT,
            reactor_type TEXT,
            status TEXT,
            thermal_capacity REAL,
            gross_capacity REAL,
            country TEXT,
            operational_from TEXT,
            operational_to TEXT
        );
        CREATE TABLE maintenances (
            id INTEGER PRIMARY KEY,
            reactor_name TEXT NOT NULL,
            equipment TEXT,
            equipment_category TEXT,
            equipment_criticality TEXT,
            type TEXT,
            date TEXT,
            year INTEGER,
            month INTEGER,
            duration_hours INTEGER,
            status TEXT,
            cost_euros INTEGER,
            technician_count INTEGER
        );
        CREATE TABLE incidents (
            id INTEGER PRIMARY KEY,
            reactor_name TEXT NOT NULL,
            equipment TEXT,
            category TEXT,
            severity TEXT,
            ines_level INTEGER,
            date TEXT,
            year INTEGER,
            month INTEGER,
            description TEXT,
            root_cause TEXT,
            resolved INTEGER,
            resolution_days INTEGER,
            corrective_actions INTEGER
        );
        CREATE TABLE sensor_readings (
            reactor_name TEXT NOT NULL,
            timestamp TEXT,
            date TEXT,
            hour INTEGER,
            primary_temp_celsius REAL,
            primary_pressure_bar REAL,
            power_output_mw REAL,
            coolant_flow_m3h REAL,
            neutron_flux_percent REAL,
            containment_pressure_mbar REAL
        );
        CREATE TABLE equipment_catalog (
            name TEXT NOT NULL,
            category TEXT,
            mtbf_hours INTEGER,
            mttr_hours INTEGER,
            criticality TEXT
        );
        "#,
    )
    .context("Failed to create complete dataset tables")?;
    Ok(())
}

fn insert_fleet(tx: &Transaction<'_>, fleet: &[FleetReactor]) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO reactors (name, reactor_model, reactor_type, status, thermal_capacity,
         gross_capacity, country, operational_from, operational_to)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    for r in fleet {
        stmt.execute(params![
            r.name,
            r.reactor_model,
            r.reactor_type,
            r.status,
            r.thermal_capacity,
            r.gross_capacity,
            r.country,
            r.operational_from,
            r.operational_to,
        ])?;
    }
    Ok(fleet.len())
}

fn pick_equipment(rng: &mut StdRng) -> &'static CatalogEquipment {
    &EQUIPMENT_CATALOG[rng.gen_range(0..EQUIPMENT_CATALOG.len())]
}

fn random_day(rng: &mut StdRng, now: NaiveDateTime, years: u32) -> NaiveDateTime {
    let days = 365 * years.max(1) as i64;
    now - Duration::days(days) + Duration::days(rng.gen_range(0..days))
}

fn insert_maintenances(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    fleet: &[FleetReactor],
    now: NaiveDateTime,
    years: u32,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO maintenances (reactor_name, equipment, equipment_category,
         equipment_criticality, type, date, year, month, duration_hours, status, cost_euros,
         technician_count) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;
    let recent = now - Duration::days(7);
    let mut count = 0;

    for reactor in fleet.iter().filter(|r| r.has_maintenances()) {
        let n = (50.0 + reactor.capacity() * 0.08 * years as f64) as usize;
        for _ in 0..n {
            let equip = pick_equipment(rng);
            let kind = weighted(rng, &equip.criticality.maintenance_weights());
            let factor = match kind {
                "préventive" => 0.6,
                "corrective" => 1.2,
                _ => 0.3,
            };
            let duration = (exponential(rng, equip.mttr_hours as f64 * factor) as i64)
                .clamp(1, MAX_DURATION_HOURS);
            let date = random_day(rng, now, years);
            let status = if date > recent {
                weighted(rng, &[("pending", 0.4), ("in_progress", 0.3), ("completed", 0.3)])
            } else {
                weighted(rng, &[("completed", 0.95), ("cancelled", 0.05)])
            };
            let parts = if kind == "corrective" { 1.5 } else { 0.8 };
            let cost =
                (duration as f64 * LABOR_RATE_EUROS * parts * rng.gen_range(0.8..1.3)) as i64;

            stmt.execute(params![
                reactor.name,
                equip.name,
                equip.category,
                equip.criticality.as_str(),
                kind,
                date.format("%Y-%m-%d").to_string(),
                date.year(),
                date.month(),
                duration,
                status,
                cost,
                (duration / 8).max(1),
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

fn insert_incidents(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    fleet: &[FleetReactor],
    now: NaiveDateTime,
    years: u32,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO incidents (reactor_name, equipment, category, severity, ines_level, date,
         year, month, description, root_cause, resolved, resolution_days, corrective_actions)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?;
    let mut count = 0;

    for reactor in fleet.iter().filter(|r| r.has_incidents()) {
        let n = (5.0 + reactor.capacity() * 0.015 * years as f64) as usize;
        for _ in 0..n {
            let equip = pick_equipment(rng);
            let severity = weighted(rng, &equip.criticality.severity_weights());
            let ines_level: i64 = match severity {
                "low" => 0,
                "medium" => weighted(rng, &[(0, 0.7), (1, 0.3)]),
                _ => weighted(rng, &[(1, 0.85), (2, 0.15)]),
            };
            let date = random_day(rng, now, years);
            let resolution_days = match severity {
                "low" => (exponential(rng, 3.0) as i64).max(1),
                "medium" => (exponential(rng, 14.0) as i64).max(3),
                _ => (exponential(rng, 45.0) as i64).max(7),
            };
            // Resolved once one and a half resolution periods have passed
            let resolved = date < now - Duration::hours(resolution_days * 36);
            let root_cause = if resolved {
                ROOT_CAUSES[rng.gen_range(0..ROOT_CAUSES.len() - 1)]
            } else {
                let weights: Vec<(&str, f64)> = ROOT_CAUSES
                    .iter()
                    .enumerate()
                    .map(|(i, c)| (*c, if i == ROOT_CAUSES.len() - 1 { 0.55 } else { 0.05 }))
                    .collect();
                weighted(rng, &weights)
            };
            let corrective_actions: i64 = if resolved { rng.gen_range(1..5) } else { 0 };

            stmt.execute(params![
                reactor.name,
                equip.name,
                equip.category,
                severity,
                ines_level,
                date.format("%Y-%m-%d").to_string(),
                date.year(),
                date.month(),
                format!("Incident {} sur {} - {}", severity, equip.name, equip.category),
                root_cause,
                resolved,
                resolved.then_some(resolution_days),
                corrective_actions,
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

fn insert_sensor_readings(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    fleet: &[FleetReactor],
    now: NaiveDateTime,
    days: u32,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO sensor_readings (reactor_name, timestamp, date, hour, primary_temp_celsius,
         primary_pressure_bar, power_output_mw, coolant_flow_m3h, neutron_flux_percent,
         containment_pressure_mbar) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let hours = 24 * days as i64;
    let mut count = 0;

    let operational = fleet
        .iter()
        .filter(|r| r.status == "Operational")
        .take(SENSOR_REACTORS);

    for reactor in operational {
        let base_temp = 290.0 + rng.gen_range(-5.0..5.0);
        let base_pressure = 155.0 + rng.gen_range(-2.0..2.0);
        let base_power = reactor.capacity() * 0.95;

        for hour in 0..hours {
            let timestamp = now - Duration::hours(hours - hour);
            let daily =
                1.0 + 0.02 * ((hour % 24) as f64 / 24.0 * 2.0 * std::f64::consts::PI).sin();
            let temp_drift = normal(rng, 0.0, 0.3);
            let pressure_drift = normal(rng, 0.0, 0.1);
            // Occasional load following
            let power_factor = if rng.gen::<f64>() < 0.05 {
                rng.gen_range(0.7..1.0)
            } else {
                rng.gen_range(0.92..1.0)
            };
            let flow = rng.gen_range(18000.0..22000.0);
            let flux = power_factor * 100.0 + normal(rng, 0.0, 0.5);
            let containment = 1013.0 + normal(rng, 0.0, 2.0);

            stmt.execute(params![
                reactor.name,
                timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                timestamp.format("%Y-%m-%d").to_string(),
                timestamp.hour(),
                round_to(base_temp * daily + temp_drift, 2),
                round_to(base_pressure + pressure_drift, 2),
                round_to(base_power * power_factor * daily, 1),
                round_to(flow, 0),
                round_to(flux, 2),
                round_to(containment, 1),
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

fn insert_catalog(tx: &Transaction<'_>) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO equipment_catalog (name, category, mtbf_hours, mttr_hours, criticality)
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )?;
    for equip in &EQUIPMENT_CATALOG {
        stmt.execute(params![
            equip.name,
            equip.category,
            equip.mtbf_hours,
            equip.mttr_hours,
            equip.criticality.as_str(),
        ])?;
    }
    Ok(EQUIPMENT_CATALOG.len())
}

// ============================================================================
// Tests
// ============================================================================
