// celltab CLI - headless sheet operations and a line REPL.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};

use celltab_engine::{Engine, EngineError, Updates};
use celltab_store::SqliteStore;

mod repl;
mod settings;

// Exit codes, one per error class
const EXIT_SUCCESS: u8 = 0;
const EXIT_EVAL_ERROR: u8 = 1;
const EXIT_ARGS_ERROR: u8 = 2;
const EXIT_DB_ERROR: u8 = 3;

#[derive(Parser)]
#[command(name = "celltab")]
#[command(about = "Small spreadsheet engine (headless)")]
#[command(version)]
struct Cli {
    /// SQLite database holding the sheet (defaults to in-memory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Sheet name within the database
    #[arg(long)]
    sheet: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a formula on a cell and print the recomputed values
    Set { cell: String, formula: String },

    /// Print a cell's value and formula
    Get { cell: String },

    /// Delete a cell's formula and print the recomputed values
    Del { cell: String },

    /// Copy a formula between cells, rebasing relative references
    Copy { dest: String, src: String },

    /// Print every non-empty cell in dependency order
    Dump {
        #[arg(long, value_enum, default_value_t = DumpFormat::Table)]
        format: DumpFormat,
    },

    /// Remove every cell from the sheet
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum DumpFormat {
    Table,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::Db(_)) => EXIT_DB_ERROR,
        Some(_) => EXIT_EVAL_ERROR,
        None => EXIT_ARGS_ERROR,
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = settings::Settings::load();
    let sheet = cli
        .sheet
        .or(settings.sheet)
        .unwrap_or_else(|| "sheet1".to_string());
    let db = cli.db.or(settings.db);

    let mut engine = open_engine(&sheet, db.as_deref())?;
    match cli.command {
        Some(command) => run_command(&mut engine, command)?,
        None => repl::run(&mut engine)?,
    }
    engine.close()?;
    Ok(())
}

fn open_engine(sheet: &str, db: Option<&Path>) -> anyhow::Result<Engine> {
    let engine = match db {
        Some(path) => Engine::make(sheet, Box::new(SqliteStore::open(path)?))?,
        None => Engine::in_memory(sheet)?,
    };
    Ok(engine)
}

fn run_command(engine: &mut Engine, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Set { cell, formula } => print_updates(&engine.eval(&cell, &formula)?),
        Commands::Get { cell } => {
            let content = engine.query(&cell)?;
            println!("{} = {}  [{}]", cell, content.value, content.formula);
        }
        Commands::Del { cell } => print_updates(&engine.delete(&cell)?),
        Commands::Copy { dest, src } => print_updates(&engine.copy(&dest, &src)?),
        Commands::Dump { format } => print_dump(engine, format)?,
        Commands::Clear => engine.clear()?,
    }
    Ok(())
}

fn print_updates(updates: &Updates) {
    for (id, value) in updates {
        println!("{id} = {value}");
    }
}

fn print_dump(engine: &Engine, format: DumpFormat) -> anyhow::Result<()> {
    let rows = engine.dump()?;
    match format {
        DumpFormat::Table => {
            for (id, formula) in &rows {
                println!("{id}\t{formula}");
            }
        }
        DumpFormat::Json => {
            #[derive(serde::Serialize)]
            struct Row<'a> {
                cell: String,
                formula: &'a str,
            }
            let rows: Vec<Row> = rows
                .iter()
                .map(|(id, formula)| Row {
                    cell: id.to_string(),
                    formula,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }
    Ok(())
}
