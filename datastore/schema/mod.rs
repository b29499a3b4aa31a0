//! Dialect-specific builders that render schema operations into DDL scripts.
//!
//! A [`SchemaEngine`] records the operations it is asked to perform and renders them all at once
//! with [`SchemaEngine::to_sql`]. Only requested operations produce output, so an engine that was
//! never invoked renders an empty script.

use indexmap::IndexMap;
use mortar_snapshot::schema::FieldType;
use mortar_snapshot::state::{FieldState, Fields};
use sqlx::any::AnyKind;
use crate::error::{Error, Result};
use crate::sql_writer::SqlWriter;

mod columns;
mod mysql;
mod sqlite;

pub use self::columns::{Columns, ColumnPlan, plan_columns};

/// SQL dialect of the target database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Generic backend with native `ALTER TABLE` clauses (MySQL syntax).
    MySql,
    /// SQLite, which emulates column drops, alters and foreign keys by rebuilding the table.
    Sqlite,
}

impl Dialect {
    pub fn from_any_kind(kind: AnyKind) -> Self {
        match kind {
            AnyKind::MySql => Self::MySql,
            AnyKind::Sqlite => Self::Sqlite,
        }
    }

    /// Dialect of a database URI such as `sqlite://app.db` or `mysql://host/app`, without
    /// connecting to it.
    pub fn from_uri(uri: &str) -> Result<Self> {
        match uri.parse::<AnyKind>() {
            Ok(kind) => Ok(Self::from_any_kind(kind)),
            Err(e) => Err(Error::unsupported(anyhow::Error::new(e)
                .context(format!("unsupported database URI {:?}", uri)))),
        }
    }
}

/// Modifiers for `CREATE TABLE`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateTableOptions {
    pub temporary: bool,
    pub if_not_exists: bool,
}

#[derive(Debug)]
struct CreateTable {
    table: String,
    columns: Columns,
    opts: CreateTableOptions,
}

#[derive(Debug)]
pub struct SchemaEngine {
    dialect: Dialect,
    create_tables: Vec<CreateTable>,
    delete_tables: Vec<String>,
    alter_tables: Vec<TableSchemaEngine>,
}

impl SchemaEngine {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            create_tables: Vec::new(),
            delete_tables: Vec::new(),
            alter_tables: Vec::new(),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn create_table(&mut self, table: &str, fields: &Fields) {
        self.create_table_with(table, fields, CreateTableOptions::default())
    }

    /// Creates a table from its fields. Many-to-many fields do not become columns; each of them
    /// creates a junction table instead.
    pub fn create_table_with(&mut self, table: &str, fields: &Fields, opts: CreateTableOptions) {
        let mut columns = Columns::new();
        let mut relations = Vec::new();
        for (name, field) in fields.iter() {
            match &field.field_type {
                FieldType::ManyToMany { references } => relations.push(references.clone()),
                _ => { columns.insert(name.clone(), field.clone()); },
            }
        }

        if !relations.is_empty() {
            let table_schema = self.alter_table(table, &columns);
            for references in relations.iter() {
                table_schema.add_m2m(references);
            }
        }
        self.create_tables.push(CreateTable { table: table.into(), columns, opts });
    }

    pub fn delete_table(&mut self, table: &str) {
        self.delete_tables.push(table.into());
    }

    /// Returns an engine scoped to one table whose current fields are `fields`.
    pub fn alter_table(&mut self, table: &str, fields: &Fields) -> &mut TableSchemaEngine {
        let idx = self.alter_tables.len();
        self.alter_tables.push(TableSchemaEngine::new(self.dialect, table, fields.clone()));
        &mut self.alter_tables[idx]
    }

    pub fn is_empty(&self) -> bool {
        self.create_tables.is_empty()
            && self.delete_tables.is_empty()
            && self.alter_tables.iter().all(|table| table.is_empty())
    }

    /// Renders the script: table creations, then deletions, then alterations, each in the order
    /// they were requested.
    pub fn to_sql(&self) -> Result<String> {
        let mut sql = SqlWriter::new();
        for create in self.create_tables.iter() {
            write_create_table(&mut sql, &create.table, &create.columns, create.opts);
        }
        for table in self.delete_tables.iter() {
            sql.statement(|sql| {
                sql.write_str("DROP TABLE ");
                sql.write_str(table);
            });
        }
        for table_schema in self.alter_tables.iter() {
            table_schema.write_sql(&mut sql)
                .map_err(|e| e.context(format!("could not alter table {:?}", table_schema.table)))?;
        }
        Ok(sql.build())
    }
}

/// A change requested on a single table.
#[derive(Debug, Clone, PartialEq)]
pub enum TableRequest {
    Drop(String),
    Add(String, FieldState),
    Alter(String, FieldState),
    AddForeignKey { column: String, references: String },
    AddM2m { references: String },
    DropM2m { references: String },
    RenameTo(String),
}

impl TableRequest {
    /// Position of the request in the rendered output: drops come before adds so that a
    /// re-created column never clashes with itself, and foreign keys come after the columns they
    /// constrain.
    fn rank(&self) -> u8 {
        match self {
            Self::Drop(_) => 0,
            Self::Add(..) => 1,
            Self::Alter(..) => 2,
            Self::AddForeignKey { .. } => 3,
            Self::RenameTo(_) => 4,
            Self::DropM2m { .. } => 5,
            Self::AddM2m { .. } => 6,
        }
    }
}

/// Builder for the changes of one table.
#[derive(Debug)]
pub struct TableSchemaEngine {
    dialect: Dialect,
    table: String,
    fields: Fields,
    requests: Vec<TableRequest>,
}

impl TableSchemaEngine {
    fn new(dialect: Dialect, table: &str, fields: Fields) -> Self {
        Self { dialect, table: table.into(), fields, requests: Vec::new() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Current fields of the table, before any request is applied.
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn add(&mut self, field: &str, state: &FieldState) -> &mut Self {
        match &state.field_type {
            FieldType::ManyToMany { references } => return self.add_m2m(references),
            FieldType::ForeignKey { references } => {
                self.requests.push(TableRequest::Add(field.into(), state.clone()));
                self.add_foreign_key(field, references);
            },
            FieldType::Plain(_) | FieldType::PrimaryKey =>
                self.requests.push(TableRequest::Add(field.into(), state.clone())),
        }
        self
    }

    pub fn drop(&mut self, field: &str) -> &mut Self {
        match self.fields.get(field).map(|f| &f.field_type) {
            Some(FieldType::ManyToMany { references }) => {
                let references = references.clone();
                self.drop_m2m(&references)
            },
            _ => {
                self.requests.push(TableRequest::Drop(field.into()));
                self
            },
        }
    }

    /// Replaces the definition of a field. Changes that cross the many-to-many boundary become a
    /// removal of the old representation followed by the creation of the new one.
    pub fn alter(&mut self, field: &str, state: &FieldState) -> &mut Self {
        let old_type = self.fields.get(field).map(|f| f.field_type.clone());
        match (old_type, &state.field_type) {
            (Some(FieldType::ManyToMany { references: old }), FieldType::ManyToMany { references: new }) => {
                if &old != new {
                    self.drop_m2m(&old);
                    self.add_m2m(new);
                }
            },
            (Some(FieldType::ManyToMany { references }), _) => {
                self.drop_m2m(&references);
                self.add(field, state);
            },
            (_, FieldType::ManyToMany { references }) => {
                self.drop(field);
                self.add_m2m(references);
            },
            (old_type, FieldType::ForeignKey { references }) => {
                self.requests.push(TableRequest::Alter(field.into(), state.clone()));
                if old_type.as_ref().and_then(|t| t.references()) != Some(references.as_str()) {
                    self.add_foreign_key(field, references);
                }
            },
            _ => self.requests.push(TableRequest::Alter(field.into(), state.clone())),
        }
        self
    }

    pub fn rename_to(&mut self, name: &str) -> &mut Self {
        self.requests.retain(|request| !matches!(request, TableRequest::RenameTo(_)));
        self.requests.push(TableRequest::RenameTo(name.into()));
        self
    }

    pub fn add_foreign_key(&mut self, field: &str, references: &str) -> &mut Self {
        self.requests.push(TableRequest::AddForeignKey {
            column: field.into(),
            references: references.into(),
        });
        self
    }

    pub fn add_m2m(&mut self, references: &str) -> &mut Self {
        self.requests.push(TableRequest::AddM2m { references: references.into() });
        self
    }

    pub fn drop_m2m(&mut self, references: &str) -> &mut Self {
        self.requests.push(TableRequest::DropM2m { references: references.into() });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Requests in rendering order; requests of the same kind keep the order they were made in.
    pub fn ordered_requests(&self) -> Vec<&TableRequest> {
        let mut requests = self.requests.iter().collect::<Vec<_>>();
        requests.sort_by_key(|request| request.rank());
        requests
    }

    /// Name of the table once all requests are applied.
    fn final_name(&self) -> &str {
        self.requests.iter()
            .find_map(|request| match request {
                TableRequest::RenameTo(name) => Some(name.as_str()),
                _ => None,
            })
            .unwrap_or(self.table.as_str())
    }

    fn write_sql(&self, sql: &mut SqlWriter) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        match self.dialect {
            Dialect::MySql => mysql::write_alter_table(self, sql),
            Dialect::Sqlite => sqlite::write_alter_table(self, sql),
        }
    }

    /// Writes the `CREATE TABLE`/`DROP TABLE` statements of the junction tables.
    fn write_junction_tables(&self, sql: &mut SqlWriter) -> Result<()> {
        for request in self.ordered_requests() {
            match request {
                TableRequest::DropM2m { references } => {
                    let junction = junction_table_name(&self.table, references);
                    sql.statement(|sql| {
                        sql.write_str("DROP TABLE ");
                        sql.write_str(&junction);
                    });
                },
                TableRequest::AddM2m { references } => {
                    let table = self.final_name();
                    let (junction, columns) = junction_table(table, references)?;
                    write_create_table(sql, &junction, &columns, CreateTableOptions::default());
                },
                _ => (),
            }
        }
        Ok(())
    }
}

pub fn junction_table_name(table: &str, references: &str) -> String {
    format!("{table}_{references}")
}

/// Junction table of a many-to-many relation: `<table>_<references>` with one foreign key to each
/// side.
fn junction_table(table: &str, references: &str) -> Result<(String, Columns)> {
    if table == references {
        unsupported!("many-to-many relation of table {:?} with itself", table)
    }
    let mut columns = IndexMap::new();
    for side in [table, references] {
        columns.insert(
            format!("{side}_id"),
            FieldState::new(FieldType::foreign_key(side), None, false),
        );
    }
    Ok((junction_table_name(table, references), columns))
}

/// Writes `CREATE TABLE` with inline column definitions, followed by the foreign key constraints
/// and the primary key constraint.
fn write_create_table(sql: &mut SqlWriter, table: &str, columns: &Columns, opts: CreateTableOptions) {
    sql.statement(|sql| {
        sql.write_str("CREATE ");
        if opts.temporary {
            sql.write_str("TEMPORARY ");
        }
        sql.write_str("TABLE ");
        if opts.if_not_exists {
            sql.write_str("IF NOT EXISTS ");
        }
        sql.write_str(table);
        sql.write_str(" (");

        let mut definitions = 0;
        let mut separate = |sql: &mut SqlWriter| {
            if definitions > 0 {
                sql.write_str(",");
            }
            definitions += 1;
        };

        for (name, field) in columns.iter() {
            separate(sql);
            sql.write_column(name, field);
        }
        for (name, field) in columns.iter() {
            if let FieldType::ForeignKey { references } = &field.field_type {
                separate(sql);
                sql.write_foreign_key(name, references);
            }
        }
        let primary_keys = columns.iter()
            .filter(|(_, field)| field.field_type.is_primary_key())
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>();
        if !primary_keys.is_empty() {
            separate(sql);
            sql.write_str("PRIMARY KEY (");
            sql.write_names(primary_keys);
            sql.write_str(")");
        }

        sql.write_str(")");
    });
}
