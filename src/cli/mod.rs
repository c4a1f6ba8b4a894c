//! CLI module
//!
//! reactor-chat commands: setup, chat, ask and direct access to the
//! knowledge base, the operational database and the chart builder.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agents::relevance_marker;
use crate::collector::{CollectionStats, FileCollector};
use crate::config::Settings;
use crate::ingest::{
    build_complete_dataset, build_vectorstore, format_thousands, get_db_summary, seed_database,
    setup_document_corpus, CompleteOptions, DEFAULT_SEED,
};
use crate::knowledge::DocumentRetriever;
use crate::llm::provider_info;
use crate::operational::{MetricStatistics, OperationalDb, TableInfo};
use crate::session::{ChatSession, ChatTurn, EXAMPLE_QUESTIONS};
use crate::viz::{
    generate_chart, quick_chart, write_chart_html, Aggregation, ChartConfig, ChartType,
};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "reactor-chat")]
#[command(version, about = "Multi-agent assistant for nuclear operations", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Seed the operational database and build the knowledge base
    Setup {
        /// Years of simulated history
        #[arg(long, default_value = "5")]
        years: u32,

        /// Only seed the database
        #[arg(long, conflicts_with = "docs_only")]
        db_only: bool,

        /// Only prepare documents and the knowledge base
        #[arg(long)]
        docs_only: bool,

        /// Also download public reference PDFs
        #[arg(long)]
        download: bool,

        /// Reseed and reindex even when data exists
        #[arg(long)]
        force: bool,

        /// Build the worldwide GeoNuclearData dataset instead of the French seed
        #[arg(long, conflicts_with = "docs_only")]
        complete: bool,

        /// Local GeoNuclearData JSON used by --complete instead of downloading
        #[arg(long, requires = "complete")]
        geonuclear_file: Option<PathBuf>,
    },

    /// Ask a single question
    Ask {
        question: String,
    },

    /// Interactive chat
    Chat,

    /// Semantic search over the technical documents
    Search {
        query: String,

        /// Number of results
        #[arg(short, long, default_value = "5")]
        k: usize,

        /// Restrict to one document type
        #[arg(long)]
        doc_type: Option<String>,
    },

    /// Metadata of an indexed document
    Doc {
        /// Document name or part of it
        id: String,
    },

    /// Run a read-only SQL query
    Sql {
        statement: String,
    },

    /// Descriptive statistics of a numeric column
    Stats {
        metric: String,

        #[arg(short, long, default_value = "maintenances")]
        table: String,

        #[arg(short, long)]
        group_by: Option<String>,
    },

    /// Row counts per category
    Count {
        dimension: String,

        #[arg(short, long, default_value = "maintenances")]
        table: String,

        /// SQL condition, e.g. "severity >= 2"
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// List tables, or describe one
    Tables {
        name: Option<String>,
    },

    /// Chart a query result as a standalone HTML page
    Chart {
        /// SELECT statement providing the data
        sql: String,

        /// bar, line, scatter, box, pie or histogram
        #[arg(short = 't', long = "type", default_value = "bar")]
        chart_type: String,

        #[arg(short, long)]
        x: Option<String>,

        #[arg(short, long)]
        y: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// sum, mean or count, grouped by x
        #[arg(long)]
        aggregation: Option<String>,

        /// Output file (default: charts directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show configuration and data status
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    match cli.command {
        Commands::Setup {
            years,
            db_only,
            docs_only,
            download,
            force,
            complete,
            geonuclear_file,
        } => {
            let options = SetupOptions {
                years,
                db_only,
                docs_only,
                download,
                force,
                complete,
                geonuclear_file,
            };
            cmd_setup(&settings, options).await
        }
        Commands::Ask { question } => cmd_ask(settings, &question).await,
        Commands::Chat => cmd_chat(settings).await,
        Commands::Search { query, k, doc_type } => {
            cmd_search(&settings, &query, k, doc_type.as_deref()).await
        }
        Commands::Doc { id } => cmd_doc(&settings, &id).await,
        Commands::Sql { statement } => cmd_sql(&settings, &statement),
        Commands::Stats {
            metric,
            table,
            group_by,
        } => cmd_stats(&settings, &metric, &table, group_by.as_deref()),
        Commands::Count {
            dimension,
            table,
            filter,
        } => cmd_count(&settings, &dimension, &table, filter.as_deref()),
        Commands::Tables { name } => cmd_tables(&settings, name.as_deref()),
        Commands::Chart {
            sql,
            chart_type,
            x,
            y,
            color,
            title,
            aggregation,
            output,
        } => {
            let request = ChartRequest {
                chart_type: ChartType::parse(&chart_type),
                x,
                y,
                color,
                title,
                aggregation,
            };
            cmd_chart(&settings, &sql, request, output)
        }
        Commands::Status => cmd_status(&settings).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Setup command
///
/// Seeds the simulated operational database, writes the demo documents
/// (plus optional downloads) and indexes them.
struct SetupOptions {
    years: u32,
    db_only: bool,
    docs_only: bool,
    download: bool,
    force: bool,
    complete: bool,
    geonuclear_file: Option<PathBuf>,
}

async fn cmd_setup(settings: &Settings, options: SetupOptions) -> Result<()> {
    let SetupOptions {
        years,
        db_only,
        docs_only,
        download,
        force,
        complete,
        geonuclear_file,
    } = options;
    settings.ensure_dirs()?;

    if complete {
        println!("[*] Building complete dataset ({} years)...", years);
        let summary = build_complete_dataset(
            &settings.db_path,
            download.then_some(settings.docs_dir.as_path()),
            geonuclear_file.as_deref(),
            CompleteOptions {
                years,
                ..Default::default()
            },
        )
        .await
        .context("Complete dataset build failed")?;
        println!("[OK] Database created: {}", summary.db_path.display());
        println!("     Fleet source:    {}", summary.fleet_source);
        println!(
            "     Reactors:        {}",
            format_thousands(summary.reactors as i64)
        );
        println!(
            "     Maintenances:    {}",
            format_thousands(summary.maintenances as i64)
        );
        println!(
            "     Incidents:       {}",
            format_thousands(summary.incidents as i64)
        );
        println!(
            "     Sensor readings: {}",
            format_thousands(summary.sensor_readings as i64)
        );
        println!("     Equipment types: {}", summary.equipment_types);
        println!("     NRC documents:   {}", summary.documents_downloaded);
        println!();
    } else if !docs_only {
        if settings.db_path.exists() && !force {
            println!(
                "[*] Database already exists: {} (use --force to reseed)",
                settings.db_path.display()
            );
        } else {
            println!("[*] Seeding operational database ({} years)...", years);
            let summary = seed_database(&settings.db_path, years, DEFAULT_SEED)
                .context("Database seeding failed")?;
            println!("[OK] Database created: {}", settings.db_path.display());
            println!("     Reactors:        {}", summary.reactors);
            println!(
                "     Maintenances:    {}",
                format_thousands(summary.maintenances as i64)
            );
            println!(
                "     Incidents:       {}",
                format_thousands(summary.incidents as i64)
            );
            println!(
                "     Sensor readings: {}",
                format_thousands(summary.sensor_readings as i64)
            );
        }
        println!();
    }

    if !db_only {
        println!("[*] Preparing documents in {}", settings.docs_dir.display());
        let corpus = setup_document_corpus(&settings.docs_dir, download).await?;
        println!(
            "[OK] {} documents ({} demo, {} downloaded)",
            corpus.total_documents, corpus.demo_documents, corpus.downloaded_documents
        );

        let files = FileCollector::with_defaults().collect_directory(&settings.docs_dir)?;
        let stats = CollectionStats::from_files(&files);
        println!(
            "    Text: {}, PDF: {}, total size: {}",
            stats.text_files,
            stats.pdf_files,
            format_bytes(stats.total_size as usize)
        );
        println!();

        println!("[*] Building knowledge base...");
        let summary = build_vectorstore(settings, force)
            .await
            .context("Knowledge base build failed")?;
        println!(
            "[OK] Indexed {} documents: {} pages, {} chunks ({} unchanged, {} failed)",
            summary.documents, summary.pages, summary.chunks, summary.skipped, summary.failed
        );
    }

    Ok(())
}

/// Ask command
async fn cmd_ask(settings: Settings, question: &str) -> Result<()> {
    let mut session = ChatSession::open(settings).await?;
    let turn = session.ask(question).await?;
    print_turn(&turn);
    Ok(())
}

/// Chat command
///
/// REPL over a single session. `/examples` lists starter questions, which
/// can then be asked by number.
async fn cmd_chat(settings: Settings) -> Result<()> {
    println!("reactor-chat v{}", env!("CARGO_PKG_VERSION"));
    println!("[*] Loading resources...");
    let mut session = ChatSession::open(settings).await?;
    println!("[OK] Ready. Type /examples for ideas, /quit to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = match parse_repl_input(&line) {
            ReplInput::Empty => continue,
            ReplInput::Quit => break,
            ReplInput::Clear => {
                session.clear();
                println!("[OK] Conversation cleared");
                continue;
            }
            ReplInput::Examples => {
                for (i, q) in EXAMPLE_QUESTIONS.iter().enumerate() {
                    println!("  {}. {}", i + 1, q);
                }
                continue;
            }
            ReplInput::History => {
                for turn in session.transcript() {
                    let who = match turn.agent.as_deref() {
                        Some(agent) => agent.to_string(),
                        None => format!("{:?}", turn.role).to_lowercase(),
                    };
                    println!("  [{}] {}", who, truncate_text(&turn.content, 100));
                }
                continue;
            }
            ReplInput::Unknown(cmd) => {
                println!("[!] Unknown command: {}", cmd);
                continue;
            }
            ReplInput::Question(q) => q,
        };

        println!("[*] {}", question);
        match session.ask(&question).await {
            Ok(turn) => print_turn(&turn),
            Err(e) => println!("[!] {:#}", e),
        }
        println!();
    }

    Ok(())
}

/// Search command
async fn cmd_search(
    settings: &Settings,
    query: &str,
    k: usize,
    doc_type: Option<&str>,
) -> Result<()> {
    println!("[*] Searching: \"{}\"", query);

    let retriever = DocumentRetriever::open(settings)
        .await
        .context("Failed to open knowledge base")?;

    if retriever.vector_count().await? == 0 {
        println!("\n[!] Knowledge base is empty. Run `reactor-chat setup` first.");
        return Ok(());
    }

    let results = match doc_type {
        Some(t) => retriever.filter_by_doc_type(query, t, k).await?,
        None => retriever.search(query, k, None).await?,
    };

    if results.is_empty() {
        println!("\n[!] No results.");
        return Ok(());
    }

    println!("\n[OK] {} results:\n", results.len());

    for (i, chunk) in results.iter().enumerate() {
        println!(
            "{}. {} [{}] {} (p.{}) - score: {:.3}",
            i + 1,
            relevance_marker(chunk.score),
            chunk.doc_type,
            chunk.source,
            chunk.page,
            chunk.score
        );
        println!("   {}", truncate_text(&chunk.content, 200));
        println!();
    }

    Ok(())
}

/// Doc command
async fn cmd_doc(settings: &Settings, id: &str) -> Result<()> {
    let retriever = DocumentRetriever::open(settings)
        .await
        .context("Failed to open knowledge base")?;
    let meta = retriever.get_doc_metadata(id).await?;

    println!("[OK] {}", meta.source);
    println!("     Type:    {}", meta.doc_type);
    println!("     Page:    {}", meta.page);
    println!("     Chunks:  {}", meta.chunk_count);
    println!("     Indexed: {}", meta.timestamp_indexed);
    println!("     Preview: {}", truncate_text(&meta.preview, 200));
    Ok(())
}

/// SQL command
fn cmd_sql(settings: &Settings, statement: &str) -> Result<()> {
    let db = OperationalDb::open(&settings.db_path)?;
    let result = db.execute_query(statement)?;

    if result.table.is_empty() {
        println!("[!] Aucun résultat trouvé.");
        return Ok(());
    }

    println!("{}", result.table.to_markdown());
    println!();
    println!(
        "[OK] {} rows{}",
        result.table.len(),
        if result.truncated { " (truncated)" } else { "" }
    );
    Ok(())
}

/// Stats command
fn cmd_stats(settings: &Settings, metric: &str, table: &str, group_by: Option<&str>) -> Result<()> {
    let db = OperationalDb::open(&settings.db_path)?;

    match db.metric_statistics(metric, table, group_by)? {
        MetricStatistics::Global { metric, statistics } => {
            let s = &statistics.stats;
            println!("[OK] {}.{} ({} values)", table, metric, s.count);
            println!("     mean:   {:.2}", s.mean);
            println!("     std:    {:.2}", s.std);
            println!("     min:    {:.2}", s.min);
            println!("     median: {:.2}", s.median);
            println!("     max:    {:.2}", s.max);
            println!("     sum:    {:.2}", statistics.sum);
        }
        MetricStatistics::Grouped {
            metric,
            group_by,
            statistics,
        } => {
            println!("[OK] {}.{} by {}\n", table, metric, group_by);
            println!(
                "  {:<24} {:>7} {:>10} {:>10} {:>10} {:>10}",
                group_by, "count", "mean", "std", "min", "max"
            );
            for g in &statistics {
                println!(
                    "  {:<24} {:>7} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
                    truncate_text(&g.group, 24),
                    g.stats.count,
                    g.stats.mean,
                    g.stats.std,
                    g.stats.min,
                    g.stats.max
                );
            }
        }
    }
    Ok(())
}

/// Count command
fn cmd_count(settings: &Settings, dimension: &str, table: &str, filter: Option<&str>) -> Result<()> {
    let db = OperationalDb::open(&settings.db_path)?;
    let counts = db.count_by_category(dimension, table, filter)?;

    println!(
        "[OK] {} rows in {} by {}\n",
        format_thousands(counts.total),
        counts.table,
        counts.dimension
    );
    println!("{}", counts.categories.to_markdown());
    Ok(())
}

/// Tables command
fn cmd_tables(settings: &Settings, name: Option<&str>) -> Result<()> {
    let db = OperationalDb::open(&settings.db_path)?;

    match db.table_info(name)? {
        TableInfo::All { tables } => {
            println!("[OK] {} tables:\n", tables.len());
            for t in tables {
                println!("  {:<20} {:>10} rows", t.name, format_thousands(t.row_count));
            }
        }
        TableInfo::Table {
            table,
            columns,
            row_count,
        } => {
            println!("[OK] {} ({} rows)\n", table, format_thousands(row_count));
            for c in &columns {
                println!(
                    "  {:<24} {:<10}{}",
                    c.name,
                    c.column_type,
                    if c.nullable { "" } else { " NOT NULL" }
                );
            }
            if columns.iter().any(|c| c.name == "date") {
                let range = db.date_range(&table, "date");
                println!();
                println!("  Dates: {} .. {}", range.min_date, range.max_date);
            }
        }
    }
    Ok(())
}

struct ChartRequest {
    chart_type: ChartType,
    x: Option<String>,
    y: Option<String>,
    color: Option<String>,
    title: Option<String>,
    aggregation: Option<String>,
}

/// Chart command
fn cmd_chart(
    settings: &Settings,
    sql: &str,
    request: ChartRequest,
    output: Option<PathBuf>,
) -> Result<()> {
    let db = OperationalDb::open(&settings.db_path)?;
    let result = db.execute_query(sql)?;

    let chart = match (&request.x, &request.y) {
        (None, None) => quick_chart(&result.table, request.chart_type)?,
        (x, y) => {
            let first = result.table.columns.first().cloned().unwrap_or_default();
            let x = x.clone().unwrap_or_else(|| first.clone());
            let y = y.clone().unwrap_or(first);
            let mut config = ChartConfig::new(
                request.chart_type,
                &x,
                &y,
                request.title.as_deref().unwrap_or(""),
            );
            config.color = request.color.clone();
            config.aggregation = match request.aggregation.as_deref() {
                Some(name) => match Aggregation::parse(name) {
                    Some(agg) => Some(agg),
                    None => bail!("Unknown aggregation: {} (sum, mean, count)", name),
                },
                None => None,
            };
            generate_chart(&result.table, &config)?
        }
    };

    let path = output.unwrap_or_else(|| {
        settings
            .charts_dir
            .join(format!("{}.html", uuid::Uuid::new_v4()))
    });
    write_chart_html(&chart, &path)?;

    println!(
        "[OK] {} chart of {} points: {} vs {}",
        chart.chart_type.label(),
        chart.data_points,
        chart.x,
        chart.y
    );
    println!("     {}", path.display());
    Ok(())
}

/// Status command
async fn cmd_status(settings: &Settings) -> Result<()> {
    println!("reactor-chat v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] Data directory: {}", settings.data_dir.display());

    let providers = provider_info();
    match providers.active_chat {
        Some(chat) => println!("[OK] Chat model: {}", chat),
        None => {
            println!("[!] Chat model: no API key");
            println!("    Set GROQ_API_KEY or OPENAI_API_KEY");
        }
    }
    println!(
        "     Keys: groq={} openai={} gemini={}",
        providers.groq, providers.openai, providers.gemini
    );
    println!("[*] Embeddings: {}", providers.embedding);

    println!();
    println!("[*] Operational database: {}", settings.db_path.display());
    for line in get_db_summary(&settings.db_path).lines() {
        println!("    {}", line);
    }

    match DocumentRetriever::open(settings).await {
        Ok(retriever) => match retriever.stats().await {
            Ok(stats) => {
                println!("[OK] Knowledge base: {} chunks", stats.vector_count);
                println!(
                    "     {} sources, {} pages, {}",
                    stats.registry.source_count,
                    stats.registry.page_count,
                    format_bytes(stats.registry.total_content_bytes)
                );
            }
            Err(e) => println!("[!] Knowledge base stats failed: {}", e),
        },
        Err(e) => {
            tracing::debug!("Knowledge base unavailable: {:#}", e);
            println!("[!] Knowledge base not available");
        }
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

#[derive(Debug, PartialEq)]
enum ReplInput {
    Empty,
    Quit,
    Clear,
    Examples,
    History,
    Unknown(String),
    Question(String),
}

fn parse_repl_input(line: &str) -> ReplInput {
    let input = line.trim();
    if input.is_empty() {
        return ReplInput::Empty;
    }

    match input {
        "/quit" | "/exit" => return ReplInput::Quit,
        "/clear" => return ReplInput::Clear,
        "/examples" => return ReplInput::Examples,
        "/history" => return ReplInput::History,
        _ => {}
    }
    if input.starts_with('/') {
        return ReplInput::Unknown(input.to_string());
    }

    // Numeric shortcut for an example question
    if let Ok(n) = input.parse::<usize>() {
        if let Some(q) = n.checked_sub(1).and_then(|i| EXAMPLE_QUESTIONS.get(i)) {
            return ReplInput::Question(q.to_string());
        }
    }

    ReplInput::Question(input.to_string())
}

fn print_turn(turn: &ChatTurn) {
    if let Some(agent) = &turn.agent {
        println!("[{}]", agent);
    }
    println!("{}", turn.content);

    if let Some(path) = &turn.chart_path {
        println!();
        println!("[OK] Chart: {}", path.display());
    }
}

/// Truncate text (UTF-8 safe)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// Human-readable byte size
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
