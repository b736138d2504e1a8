//! sqlweave: compile and run query pipelines
//!
//! # Usage
//!
//! ```bash
//! # Show the SQL for a pipeline
//! sqlweave compile iris.json
//!
//! # Run it
//! sqlweave run iris.toml --database-url sqlite://iris.db
//!
//! # Check how a formula parses
//! sqlweave parse "SepalLengthCm > 5 and Species = 'setosa'"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use colored::*;
use sqlweave::config::{OutputFormat, WeaveConfig};
use sqlweave::database::SUPPORTED_TYPES;
use sqlweave::pipeline::Pipeline;
use sqlweave::prelude::*;

#[derive(Parser)]
#[command(name = "sqlweave")]
#[command(version)]
#[command(about = "Compile step-by-step query pipelines to a single SQL statement", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlweave compile iris.json
    sqlweave run iris.toml --database-url sqlite://iris.db --format json
    sqlweave parse \"PetalWidthCm * 2 > 1\"")]
struct Cli {
    /// Database connection URL
    #[arg(long, env = "SQLWEAVE_DATABASE_URL", global = true)]
    database_url: Option<String>,

    /// Config file (default: ./sqlweave.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL a pipeline compiles to
    Compile {
        /// Pipeline file (.json or .toml)
        pipeline: PathBuf,
    },
    /// Print the columns a pipeline produces
    Schema {
        /// Pipeline file (.json or .toml)
        pipeline: PathBuf,
    },
    /// Execute a pipeline and print the rows
    Run {
        /// Pipeline file (.json or .toml)
        pipeline: PathBuf,

        /// Convert DATE/TIMESTAMP values to seconds since the epoch
        #[arg(long)]
        convert_datetimes: bool,
    },
    /// Parse a formula and show its expression tree
    Parse {
        /// The formula to parse
        formula: String,
    },
    /// List the supported column types
    Types,
}

/// Stand-in backend when no database URL is configured.
struct Offline;

impl Database for Offline {
    fn check_schema(&self, _sql: &str) -> WeaveResult<Vec<ColumnInfo>> {
        Err(WeaveError::Config(
            "resolving columns needs a database. Use --database-url or set SQLWEAVE_DATABASE_URL"
                .to_string(),
        ))
    }

    fn run_query(&self, _sql: &str, _convert_datetimes: bool) -> WeaveResult<ResultSet> {
        Err(WeaveError::Config(
            "running a query needs a database. Use --database-url or set SQLWEAVE_DATABASE_URL"
                .to_string(),
        ))
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlweave=debug" } else { "sqlweave=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = WeaveConfig::load(cli.config.as_deref())?;
    let format = cli.format.unwrap_or(config.format);

    match &cli.command {
        Commands::Compile { pipeline } => {
            let query = load_pipeline(pipeline, &config)?;
            let sql = match connect(cli, &config)? {
                Some(db) => query.to_sql(&db)?,
                None => query.to_sql(&Offline)?,
            };
            println!("{}", sql.white());
        }
        Commands::Schema { pipeline } => {
            let query = load_pipeline(pipeline, &config)?;
            let Some(db) = connect(cli, &config)? else {
                bail!("No database URL. Use --database-url or set SQLWEAVE_DATABASE_URL");
            };
            let schema = query.get_schema(&db)?;
            print_schema(&schema, format)?;
        }
        Commands::Run {
            pipeline,
            convert_datetimes,
        } => {
            let query = load_pipeline(pipeline, &config)?;
            let Some(db) = connect(cli, &config)? else {
                bail!("No database URL. Use --database-url or set SQLWEAVE_DATABASE_URL");
            };
            let sql = query.to_sql(&db)?;
            if cli.verbose {
                println!("{}", "Generated SQL:".green().bold());
                println!("{}", sql.white());
                println!();
            }
            let rs = db.run_query(&sql, *convert_datetimes || config.convert_datetimes)?;
            print_results(&rs, format)?;
        }
        Commands::Parse { formula } => explain_formula(formula, &config),
        Commands::Types => {
            for t in SUPPORTED_TYPES {
                println!("{}", t.cyan());
            }
        }
    }

    Ok(())
}

fn load_pipeline(path: &Path, config: &WeaveConfig) -> anyhow::Result<Query> {
    let pipeline = Pipeline::from_file(path)
        .with_context(|| format!("Failed to load pipeline '{}'", path.display()))?;
    Ok(pipeline.build(&config.expression_parser())?)
}

fn connect(cli: &Cli, config: &WeaveConfig) -> anyhow::Result<Option<SqlxDatabase>> {
    let Some(url) = cli.database_url.as_ref().or(config.database_url.as_ref()) else {
        return Ok(None);
    };
    if cli.verbose {
        eprintln!("{} {}", "Connecting to:".dimmed(), url);
    }
    Ok(Some(SqlxDatabase::connect(url)?))
}

fn explain_formula(formula: &str, config: &WeaveConfig) {
    println!("{} {}", "Formula:".dimmed(), formula.yellow());
    println!();

    let parser = config.expression_parser();
    match parser.parse(formula) {
        Ok(tree) => {
            println!("{}", "Expression Tree:".green().bold());
            println!(
                "{}",
                serde_json::to_string_pretty(&tree).unwrap_or_default()
            );
            println!();
            match tree.to_expr() {
                Ok(expr) => {
                    println!("{}", "SQL:".green().bold());
                    println!("  {}", expr.to_sql().white());
                }
                Err(e) => eprintln!("{} {}", "Error:".red().bold(), e),
            }
        }
        Err(WeaveError::Parse { position, message }) => {
            eprintln!("{} {}", "Parse Error:".red().bold(), message);
            eprintln!("  {}", formula);
            eprintln!("  {}{}", " ".repeat(position), "^".red().bold());
        }
        Err(e) => eprintln!("{} {}", "Parse Error:".red().bold(), e),
    }
}

fn print_schema(schema: &[ColumnInfo], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(schema)?),
        OutputFormat::Table => {
            let width = schema.iter().map(|c| c.name.len()).max().unwrap_or(0);
            for c in schema {
                let name = format!("{:width$}", c.name, width = width);
                println!("{}  {}", name.white(), c.data_type.cyan());
            }
        }
    }
    Ok(())
}

fn print_results(rs: &ResultSet, format: OutputFormat) -> anyhow::Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(rs)?);
        return Ok(());
    }

    if rs.is_empty() {
        println!("{}", "(no results)".dimmed());
        return Ok(());
    }

    // Calculate column widths
    let mut widths: Vec<usize> = rs.columns.iter().map(|c| c.len()).collect();
    for row in &rs.data {
        for (i, val) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(val_to_string(val).len());
            }
        }
    }

    let header: Vec<String> = rs
        .columns
        .iter()
        .zip(&widths)
        .map(|(c, w)| format!("{:width$}", c, width = w))
        .collect();
    println!("{}", header.join(" │ ").white().bold());

    let sep: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
    println!("{}", sep.join("─┼─").dimmed());

    for row in &rs.data {
        let cells: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:width$}", val_to_string(v), width = w))
            .collect();
        println!("{}", cells.join(" │ "));
    }

    println!();
    println!("{} row(s) returned", rs.row_count().to_string().cyan());
    Ok(())
}

fn val_to_string(val: &serde_json::Value) -> String {
    match val {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => val.to_string(),
    }
}
