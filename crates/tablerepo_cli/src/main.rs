//! CLI smoke entry point.
//!
//! # Responsibility
//! - Exercise registration, table bootstrap and one unit of work end to end
//!   against a file database.
//! - Print stored widgets as JSON lines for quick local sanity checks.
//!
//! Usage: `tablerepo [db_path]`. `TABLEREPO_DB` supplies the path when no
//! argument is given; `TABLEREPO_LOG_DIR` switches logging from stderr to a
//! rotating log directory.

use log::info;
use serde::Serialize;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tablerepo_core::{
    core_version, default_log_level, init_logging, open_target, ConnectionTarget, DecodeError,
    EncodeError, FieldSpec, FieldType, FieldValue, LogConfig, OpContext, Persistable, Repository,
    RepositoryRegistry, RowValues, SelectOptions, SortDirection,
};

const DEFAULT_DB_PATH: &str = "tablerepo.sqlite3";
const WIDGETS_TABLE: &str = "widgets";
const CREATE_WIDGETS_SQL: &str = "CREATE TABLE IF NOT EXISTS widgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    tags TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);";

#[derive(Debug, Serialize)]
struct Widget {
    id: i64,
    name: String,
    tags: Vec<String>,
    created_at: String,
}

static WIDGET_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", FieldType::INTEGER)
        .column("id")
        .scalar()
        .primary_key(),
    FieldSpec::new("name", FieldType::TEXT).column("name").scalar(),
    FieldSpec::new("tags", FieldType::DOCUMENT)
        .column("tags")
        .json()
        .default_value("'[]'"),
    FieldSpec::new("created_at", FieldType::TEXT)
        .column("created_at")
        .scalar()
        .default_value("CURRENT_TIMESTAMP")
        .read_only(),
];

impl Persistable for Widget {
    fn fields() -> &'static [FieldSpec] {
        WIDGET_FIELDS
    }

    fn field_value(&self, field: &str) -> Result<FieldValue, EncodeError> {
        match field {
            "id" => Ok(self.id.into()),
            "name" => Ok(self.name.as_str().into()),
            "tags" => FieldValue::json(field, &self.tags),
            "created_at" => Ok(self.created_at.as_str().into()),
            other => Err(EncodeError::UnknownField(other.to_string())),
        }
    }

    fn from_row(row: &RowValues) -> Result<Self, DecodeError> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            tags: row.json("tags")?,
            created_at: row.get("created_at")?,
        })
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tablerepo: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let log_config = match std::env::var_os("TABLEREPO_LOG_DIR") {
        Some(dir) => LogConfig::directory(default_log_level(), dir),
        None => LogConfig::stderr(default_log_level()),
    };
    init_logging(&log_config)?;

    let db_path = std::env::args_os()
        .nth(1)
        .or_else(|| std::env::var_os("TABLEREPO_DB"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
    let target = ConnectionTarget::file(&db_path);

    open_target(&target)?.execute_batch(CREATE_WIDGETS_SQL)?;

    let mut registry = RepositoryRegistry::new();
    registry.register::<Widget>(target, WIDGETS_TABLE)?;

    let ctx = OpContext::background();
    let widgets = registry.with_repository::<Widget, _, _>(&ctx, |ctx, repo| {
        let draft = Widget {
            id: 0,
            name: format!("widget-{}", std::process::id()),
            tags: vec!["cli".to_string(), "smoke".to_string()],
            created_at: String::new(),
        };
        let stored = repo.insert(ctx, &draft)?;
        info!(
            "event=cli_insert module=cli status=ok table={WIDGETS_TABLE} id={}",
            stored.id
        );
        repo.select_all(
            ctx,
            &SelectOptions::new().order_by("id", SortDirection::Ascending),
        )
    })?;

    for widget in &widgets {
        println!("{}", serde_json::to_string(widget)?);
    }
    println!("tablerepo_core version={}", core_version());
    Ok(())
}
