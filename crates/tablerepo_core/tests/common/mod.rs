#![allow(dead_code)]

use tablerepo_core::{
    open_target, ConnectionTarget, DecodeError, EncodeError, FieldSpec, FieldType, FieldValue,
    Persistable, RepositoryRegistry, RowValues,
};
use tempfile::TempDir;

pub const WIDGETS_DDL: &str = "CREATE TABLE widgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    tags TEXT NOT NULL,
    nick TEXT,
    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
);";

#[derive(Debug, Clone, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
    pub tags: Vec<String>,
    pub nick: Option<String>,
    pub created_at: String,
    /// In-memory only.
    pub scratch: u32,
}

static WIDGET_FIELDS: &[FieldSpec] = &[
    FieldSpec::new("id", FieldType::INTEGER)
        .column("id")
        .scalar()
        .primary_key(),
    FieldSpec::new("name", FieldType::TEXT).column("name").scalar(),
    FieldSpec::new("tags", FieldType::DOCUMENT).column("tags").json(),
    FieldSpec::new("nick", FieldType::TEXT.nullable())
        .column("nick")
        .scalar(),
    FieldSpec::new("created_at", FieldType::TEXT)
        .column("created_at")
        .scalar()
        .default_value("CURRENT_TIMESTAMP")
        .read_only(),
    FieldSpec::new("scratch", FieldType::INTEGER),
];

impl Widget {
    pub fn new(name: &str, tags: &[&str]) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            nick: None,
            created_at: String::new(),
            scratch: 0,
        }
    }
}

impl Persistable for Widget {
    fn fields() -> &'static [FieldSpec] {
        WIDGET_FIELDS
    }

    fn field_value(&self, field: &str) -> Result<FieldValue, EncodeError> {
        match field {
            "id" => Ok(self.id.into()),
            "name" => Ok(self.name.as_str().into()),
            "tags" => FieldValue::json(field, &self.tags),
            "nick" => Ok(self.nick.clone().into()),
            "created_at" => Ok(self.created_at.as_str().into()),
            other => Err(EncodeError::UnknownField(other.to_string())),
        }
    }

    fn from_row(row: &RowValues) -> Result<Self, DecodeError> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            tags: row.json("tags")?,
            nick: row.get("nick")?,
            created_at: row.get("created_at")?,
            scratch: 0,
        })
    }
}

/// File-backed database in a temp dir with the `widgets` table created.
pub struct Fixture {
    pub dir: TempDir,
    pub target: ConnectionTarget,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let target = ConnectionTarget::file(dir.path().join("widgets.sqlite3"));
        let conn = open_target(&target).unwrap();
        conn.execute_batch(WIDGETS_DDL).unwrap();
        Self { dir, target }
    }

    pub fn registry(&self) -> RepositoryRegistry {
        let mut registry = RepositoryRegistry::new();
        registry
            .register::<Widget>(self.target.clone(), "widgets")
            .unwrap();
        registry
    }

    pub fn count_rows(&self) -> i64 {
        let conn = open_target(&self.target).unwrap();
        conn.query_row("SELECT COUNT(*) FROM widgets", [], |row| row.get(0))
            .unwrap()
    }

    pub fn execute(&self, sql: &str) {
        let conn = open_target(&self.target).unwrap();
        conn.execute_batch(sql).unwrap();
    }
}
