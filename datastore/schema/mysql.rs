use super::{TableRequest, TableSchemaEngine, plan_columns};
use crate::error::Result;
use crate::sql_writer::SqlWriter;

/// Renders the changes of one table as a single native `ALTER TABLE` statement with
/// comma-separated clauses, followed by the junction table statements.
pub(super) fn write_alter_table(table: &TableSchemaEngine, sql: &mut SqlWriter) -> Result<()> {
    let requests = table.ordered_requests();
    plan_columns(table.table(), table.fields(), requests.iter().copied())?;

    let clauses = requests.iter()
        .filter(|request| !matches!(request, TableRequest::AddM2m { .. } | TableRequest::DropM2m { .. }))
        .collect::<Vec<_>>();
    if !clauses.is_empty() {
        sql.statement(|sql| {
            sql.write_str("ALTER TABLE ");
            sql.write_str(table.table());
            for (i, request) in clauses.into_iter().enumerate() {
                sql.write_str(if i == 0 { " " } else { ", " });
                write_clause(sql, request);
            }
        });
    }
    table.write_junction_tables(sql)
}

fn write_clause(sql: &mut SqlWriter, request: &TableRequest) {
    match request {
        TableRequest::Drop(name) => {
            sql.write_str("DROP ");
            sql.write_str(name);
        },
        TableRequest::Add(name, field) => {
            sql.write_str("ADD ");
            sql.write_column(name, field);
        },
        TableRequest::Alter(name, field) => {
            sql.write_str("CHANGE ");
            sql.write_str(name);
            sql.write_str(" ");
            sql.write_column(name, field);
        },
        TableRequest::AddForeignKey { column, references } => {
            sql.write_str("ADD ");
            sql.write_foreign_key(column, references);
        },
        TableRequest::RenameTo(name) => {
            sql.write_str("RENAME TO ");
            sql.write_str(name);
        },
        TableRequest::AddM2m { .. } | TableRequest::DropM2m { .. } => (),
    }
}
