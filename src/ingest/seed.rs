//! Operational database seeding
//!
//! Simulated history for the French PWR fleet: maintenances, incidents and
//! hourly sensor readings. Output is deterministic for a given seed.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Duration, Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rusqlite::{params, Connection, Transaction};
use serde::Serialize;

use crate::operational::OperationalDb;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_YEARS: u32 = 5;

// ============================================================================
// Reference data
// ============================================================================

pub struct Reactor {
    pub name: &'static str,
    pub reactor_model: &'static str,
    pub reactor_type: &'static str,
    pub status: &'static str,
    pub thermal_capacity: i64,
    pub gross_capacity: i64,
}

const fn pwr(
    name: &'static str,
    model: &'static str,
    status: &'static str,
    thermal: i64,
    gross: i64,
) -> Reactor {
    Reactor {
        name,
        reactor_model: model,
        reactor_type: "PWR",
        status,
        thermal_capacity: thermal,
        gross_capacity: gross,
    }
}

const OP: &str = "Operational";

pub const FRENCH_REACTORS: [Reactor; 31] = [
    pwr("Belleville-1", "P4 REP 1300", OP, 3817, 1363),
    pwr("Belleville-2", "P4 REP 1300", OP, 3817, 1363),
    pwr("Blayais-1", "CP1", OP, 2785, 951),
    pwr("Blayais-2", "CP1", OP, 2785, 951),
    pwr("Bugey-2", "CP0", OP, 2785, 945),
    pwr("Bugey-3", "CP0", OP, 2785, 945),
    pwr("Cattenom-1", "P4 REP 1300", OP, 3817, 1362),
    pwr("Cattenom-2", "P4 REP 1300", OP, 3817, 1362),
    pwr("Chinon-B1", "CP2", OP, 2785, 954),
    pwr("Chinon-B2", "CP2", OP, 2785, 954),
    pwr("Civaux-1", "N4", OP, 4270, 1561),
    pwr("Civaux-2", "N4", OP, 4270, 1561),
    pwr("Cruas-1", "CP2", OP, 2785, 956),
    pwr("Cruas-2", "CP2", OP, 2785, 956),
    pwr("Dampierre-1", "CP1", OP, 2785, 937),
    pwr("Dampierre-2", "CP1", OP, 2785, 937),
    pwr("Fessenheim-1", "CP0", "Shutdown", 2660, 920),
    pwr("Fessenheim-2", "CP0", "Shutdown", 2660, 920),
    pwr("Flamanville-1", "P4 REP 1300", OP, 3817, 1382),
    pwr("Flamanville-2", "P4 REP 1300", OP, 3817, 1382),
    pwr("Flamanville-3", "EPR", "Under Construction", 4590, 1650),
    pwr("Golfech-1", "P4 REP 1300", OP, 3817, 1363),
    pwr("Golfech-2", "P4 REP 1300", OP, 3817, 1363),
    pwr("Gravelines-1", "CP1", OP, 2785, 951),
    pwr("Gravelines-2", "CP1", OP, 2785, 951),
    pwr("Nogent-1", "P4 REP 1300", OP, 3817, 1363),
    pwr("Nogent-2", "P4 REP 1300", OP, 3817, 1363),
    pwr("Paluel-1", "P4 REP 1300", OP, 3817, 1382),
    pwr("Paluel-2", "P4 REP 1300", OP, 3817, 1382),
    pwr("Penly-1", "P4 REP 1300", OP, 3817, 1382),
    pwr("Penly-2", "P4 REP 1300", OP, 3817, 1382),
];

impl Reactor {
    /// Units that accumulate maintenance and incident history
    fn has_history(&self) -> bool {
        self.status == "Operational" || self.status == "Shutdown"
    }
}

pub struct EquipmentType {
    pub name: &'static str,
    pub category: &'static str,
    pub mtbf_hours: u32,
    pub mttr_hours: u32,
}

const fn equipment(
    name: &'static str,
    category: &'static str,
    mtbf_hours: u32,
    mttr_hours: u32,
) -> EquipmentType {
    EquipmentType {
        name,
        category,
        mtbf_hours,
        mttr_hours,
    }
}

pub const EQUIPMENT_TYPES: [EquipmentType; 10] = [
    equipment("Pompe primaire", "mécanique", 8760, 24),
    equipment("Vanne de régulation", "mécanique", 4380, 8),
    equipment("Capteur température", "instrumentation", 17520, 4),
    equipment("Capteur pression", "instrumentation", 17520, 4),
    equipment("Générateur diesel", "électrique", 2190, 48),
    equipment("Transformateur", "électrique", 43800, 72),
    equipment("Échangeur thermique", "thermique", 26280, 36),
    equipment("Turbine", "mécanique", 8760, 120),
    equipment("Moteur électrique", "électrique", 13140, 16),
    equipment("Système contrôle-commande", "instrumentation", 8760, 12),
];

const MAINTENANCE_TYPES: [(&str, f64); 3] =
    [("préventive", 0.55), ("corrective", 0.30), ("inspection", 0.15)];

const MAINTENANCE_STATUSES: [(&str, f64); 3] =
    [("completed", 0.85), ("pending", 0.10), ("in_progress", 0.05)];

const ROOT_CAUSES: [(&str, f64); 6] = [
    ("Usure normale", 0.30),
    ("Défaut matériau", 0.15),
    ("Erreur humaine", 0.10),
    ("Conditions environnementales", 0.15),
    ("Défaillance fournisseur", 0.10),
    ("En investigation", 0.20),
];

/// Maximum maintenance duration (one week)
const MAX_DURATION_HOURS: i64 = 168;
const SENSOR_HOURS: i64 = 24 * 30;

fn severity_weights(category: &str) -> [(&'static str, f64); 3] {
    match category {
        "instrumentation" => [("low", 0.70), ("medium", 0.25), ("high", 0.05)],
        "électrique" => [("low", 0.60), ("medium", 0.30), ("high", 0.10)],
        _ => [("low", 0.65), ("medium", 0.28), ("high", 0.07)],
    }
}

// ============================================================================
// Sampling
// ============================================================================

pub(crate) fn weighted<T: Copy>(rng: &mut StdRng, choices: &[(T, f64)]) -> T {
    let total: f64 = choices.iter().map(|(_, w)| w).sum();
    let mut target = rng.gen::<f64>() * total;
    for (value, weight) in choices {
        if target < *weight {
            return *value;
        }
        target -= weight;
    }
    choices[choices.len() - 1].0
}

pub(crate) fn exponential(rng: &mut StdRng, mean: f64) -> f64 {
    -(1.0 - rng.gen::<f64>()).ln() * mean
}

/// Box-Muller
pub(crate) fn normal(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + z * std_dev
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

// ============================================================================
// Seeding
// ============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedSummary {
    pub reactors: usize,
    pub maintenances: usize,
    pub incidents: usize,
    pub sensor_readings: usize,
}

/// Create or replace the operational database
pub fn seed_database(db_path: &Path, years: u32, seed: u64) -> Result<SeedSummary> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database: {:?}", db_path))?;
    let mut rng = StdRng::seed_from_u64(seed);
    let now = Local::now().naive_local();
    let days = 365 * years.max(1) as i64;
    let start = now - Duration::days(days);

    tracing::info!("Seeding operational database at {:?} ({} years)", db_path, years);

    let tx = conn.transaction()?;
    create_tables(&tx)?;

    let summary = SeedSummary {
        reactors: insert_reactors(&tx, &mut rng)?,
        maintenances: insert_maintenances(&tx, &mut rng, start, days, years)?,
        incidents: insert_incidents(&tx, &mut rng, start, days, years)?,
        sensor_readings: insert_sensor_readings(&tx, &mut rng, now)?,
    };
    tx.commit().context("Failed to commit seeded data")?;

    tracing::info!(
        "Seeded {} reactors, {} maintenances, {} incidents, {} sensor readings",
        summary.reactors,
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

        CREATE TABLE reactors (
            name TEXT NOT NULL,
            reactor_model TEXT,
            reactor_type TEXT,
            status TEXT,
            thermal_capacity INTEGER,
            gross_capacity INTEGER,
            country TEXT,
            operational_from TEXT
        );
        CREATE TABLE maintenances (
            id INTEGER PRIMARY KEY,
            reactor_name TEXT NOT NULL,
            equipment TEXT,
            equipment_category TEXT,
            type TEXT,
            date TEXT,
            duration_hours INTEGER,
            status TEXT,
            cost_euros INTEGER
        );
        CREATE TABLE incidents (
            id INTEGER PRIMARY KEY,
            reactor_name TEXT NOT NULL,
            equipment TEXT,
            category TEXT,
            severity TEXT,
            ines_level INTEGER,
            date TEXT,
            description TEXT,
            resolved INTEGER,
            resolution_days INTEGER,
            root_cause TEXT
        );
        CREATE TABLE sensor_readings (
            reactor_name TEXT NOT NULL,
            timestamp TEXT,
            primary_temp_celsius REAL,
            primary_pressure_bar REAL,
            power_output_mw REAL,
            coolant_flow_m3h REAL
        );
        "#,
    )
    .context("Failed to create operational tables")?;
    Ok(())
}

fn insert_reactors(tx: &Transaction<'_>, rng: &mut StdRng) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO reactors (name, reactor_model, reactor_type, status, thermal_capacity,
         gross_capacity, country, operational_from) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'France', ?7)",
    )?;

    for reactor in &FRENCH_REACTORS {
        let year: i32 = rng.gen_range(1977..2015);
        let operational_from = if reactor.status == "Under Construction" {
            None
        } else {
            Some(format!("{}-01-01", year))
        };
        stmt.execute(params![
            reactor.name,
            reactor.reactor_model,
            reactor.reactor_type,
            reactor.status,
            reactor.thermal_capacity,
            reactor.gross_capacity,
            operational_from,
        ])?;
    }
    Ok(FRENCH_REACTORS.len())
}

fn random_date(rng: &mut StdRng, start: NaiveDateTime, days: i64) -> String {
    (start + Duration::days(rng.gen_range(0..days)))
        .format("%Y-%m-%d")
        .to_string()
}

fn insert_maintenances(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    start: NaiveDateTime,
    days: i64,
    years: u32,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO maintenances (reactor_name, equipment, equipment_category, type, date,
         duration_hours, status, cost_euros) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;
    let mut count = 0;

    for reactor in FRENCH_REACTORS.iter().filter(|r| r.has_history()) {
        let n = (100.0 + reactor.gross_capacity as f64 * 0.05 * years as f64) as usize;
        for _ in 0..n {
            let equip = &EQUIPMENT_TYPES[rng.gen_range(0..EQUIPMENT_TYPES.len())];
            let kind = weighted(rng, &MAINTENANCE_TYPES);
            let duration = (exponential(rng, equip.mttr_hours as f64 * 0.5) as i64).max(1);
            let date = random_date(rng, start, days);
            let status = weighted(rng, &MAINTENANCE_STATUSES);
            // Cost follows the uncapped duration
            let cost = (duration as f64 * rng.gen_range(500.0..2000.0)) as i64;

            stmt.execute(params![
                reactor.name,
                equip.name,
                equip.category,
                kind,
                date,
                duration.min(MAX_DURATION_HOURS),
                status,
                cost,
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

fn insert_incidents(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    start: NaiveDateTime,
    days: i64,
    years: u32,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO incidents (reactor_name, equipment, category, severity, ines_level, date,
         description, resolved, resolution_days, root_cause)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    let mut count = 0;

    for reactor in FRENCH_REACTORS.iter().filter(|r| r.has_history()) {
        let n = (10.0 + reactor.gross_capacity as f64 * 0.01 * years as f64) as usize;
        for _ in 0..n {
            let equip = &EQUIPMENT_TYPES[rng.gen_range(0..EQUIPMENT_TYPES.len())];
            let severity = weighted(rng, &severity_weights(equip.category));
            let date = random_date(rng, start, days);
            let resolution_days: i64 = match severity {
                "low" => rng.gen_range(1..7),
                "medium" => rng.gen_range(3..30),
                _ => rng.gen_range(7..90),
            };
            let resolved = rng.gen_bool(0.9);
            let ines_level: i64 = match severity {
                "low" => 0,
                "medium" => 1,
                _ => weighted(rng, &[(1, 0.8), (2, 0.2)]),
            };
            let root_cause = weighted(rng, &ROOT_CAUSES);

            stmt.execute(params![
                reactor.name,
                equip.name,
                equip.category,
                severity,
                ines_level,
                date,
                format!("Incident sur {} - {}", equip.name, severity),
                resolved,
                resolved.then_some(resolution_days),
                root_cause,
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

fn insert_sensor_readings(
    tx: &Transaction<'_>,
    rng: &mut StdRng,
    now: NaiveDateTime,
) -> Result<usize> {
    let mut stmt = tx.prepare(
        "INSERT INTO sensor_readings (reactor_name, timestamp, primary_temp_celsius,
         primary_pressure_bar, power_output_mw, coolant_flow_m3h)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )?;
    let mut count = 0;

    for reactor in FRENCH_REACTORS[..5].iter().filter(|r| r.status == OP) {
        let base_temp = 290.0 + rng.gen_range(-5.0..5.0);
        let base_pressure = 155.0 + rng.gen_range(-2.0..2.0);

        for hour in 0..SENSOR_HOURS {
            let timestamp = now - Duration::hours(SENSOR_HOURS - hour);
            let daily = (hour as f64 / 24.0 * 2.0 * std::f64::consts::PI).sin() * 2.0;
            let temp = base_temp + daily + normal(rng, 0.0, 0.5);
            let pressure = base_pressure + normal(rng, 0.0, 0.3);
            let power = reactor.gross_capacity as f64 * rng.gen_range(0.85..1.0);
            let flow = rng.gen_range(18000.0..22000.0);

            stmt.execute(params![
                reactor.name,
                timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                round_to(temp, 2),
                round_to(pressure, 2),
                round_to(power, 1),
                round_to(flow, 0),
            ])?;
            count += 1;
        }
    }
    Ok(count)
}

// ============================================================================
// Summary
// ============================================================================

/// `1234567` -> `1,234,567`
pub fn format_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if n < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// One `- table: n rows` line per table
pub fn get_db_summary(db_path: &Path) -> String {
    if !db_path.exists() {
        return "Database not found".to_string();
    }

    match OperationalDb::open(db_path).and_then(|db| db.table_counts()) {
        Ok(counts) => counts
            .iter()
            .map(|(table, count)| format!("- {}: {} rows", table, format_thousands(*count)))
            .collect::<Vec<_>>()
            .join("\n"),
        Err(e) => {
            tracing::warn!("Failed to summarize {:?}: {}", db_path, e);
            "Database not found".to_string()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operational::MetricStatistics;
    use tempfile::TempDir;

    fn expected_counts(years: u32) -> (usize, usize) {
        FRENCH_REACTORS
            .iter()
            .filter(|r| r.has_history())
            .fold((0, 0), |(m, i), r| {
                let cap = r.gross_capacity as f64;
                (
                    m + (100.0 + cap * 0.05 * years as f64) as usize,
                    i + (10.0 + cap * 0.01 * years as f64) as usize,
                )
            })
    }

    #[test]
    fn test_seed_counts() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("operational.db");
        let summary = seed_database(&path, 1, DEFAULT_SEED).unwrap();

        let (maintenances, incidents) = expected_counts(1);
        assert_eq!(summary.reactors, 31);
        assert_eq!(summary.maintenances, maintenances);
        assert_eq!(summary.incidents, incidents);
        // Belleville-1/2, Blayais-1/2, Bugey-2 are all operational
        assert_eq!(summary.sensor_readings, 5 * 720);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.db");
        let b = dir.path().join("b.db");
        seed_database(&a, 1, 7).unwrap();
        seed_database(&b, 1, 7).unwrap();

        let sql = "SELECT equipment, type, duration_hours, cost_euros FROM maintenances ORDER BY id LIMIT 50";
        let rows_a = OperationalDb::open(&a).unwrap().execute_query(sql).unwrap().table;
        let rows_b = OperationalDb::open(&b).unwrap().execute_query(sql).unwrap().table;
        assert_eq!(rows_a, rows_b);
    }

    #[test]
    fn test_seed_invariants() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("operational.db");
        seed_database(&path, 1, DEFAULT_SEED).unwrap();
        let db = OperationalDb::open(&path).unwrap();

        let none_under_construction = db
            .execute_query("SELECT COUNT(*) FROM maintenances WHERE reactor_name = 'Flamanville-3'")
            .unwrap();
        assert_eq!(none_under_construction.table.rows[0][0], serde_json::json!(0));

        let epr = db
            .execute_query("SELECT operational_from FROM reactors WHERE name = 'Flamanville-3'")
            .unwrap();
        assert!(epr.table.rows[0][0].is_null());

        match db.metric_statistics("duration_hours", "maintenances", None).unwrap() {
            MetricStatistics::Global { statistics, .. } => {
                assert!(statistics.stats.min >= 1.0);
                assert!(statistics.stats.max <= 168.0);
            }
            other => panic!("unexpected {:?}", other),
        }

        let unresolved = db
            .execute_query(
                "SELECT COUNT(*) FROM incidents WHERE resolved = 0 AND resolution_days IS NOT NULL",
            )
            .unwrap();
        assert_eq!(unresolved.table.rows[0][0], serde_json::json!(0));

        let low_ines = db
            .execute_query("SELECT MAX(ines_level) FROM incidents WHERE severity = 'low'")
            .unwrap();
        assert_eq!(low_ines.table.rows[0][0], serde_json::json!(0));
    }

    #[test]
    fn test_db_summary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("operational.db");
        assert_eq!(get_db_summary(&path), "Database not found");

        seed_database(&path, 1, DEFAULT_SEED).unwrap();
        let summary = get_db_summary(&path);
        assert!(summary.starts_with("- reactors: 31 rows"));
        assert!(summary.contains("- sensor_readings: 3,600 rows"));
    }

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1000), "1,000");
        assert_eq!(format_thousands(-1234567), "-1,234,567");
    }
}
