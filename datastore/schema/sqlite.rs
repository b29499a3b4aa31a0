use super::{CreateTableOptions, TableRequest, TableSchemaEngine, plan_columns, write_create_table};
use crate::error::Result;
use crate::sql_writer::SqlWriter;

/// Renders the changes of one table for SQLite.
///
/// SQLite can only add plain columns and rename tables in place. Any drop, alter or foreign key
/// request rebuilds the table: the planned columns are created in `<table>_backup`, the surviving
/// columns are copied over, and the backup replaces the original table.
pub(super) fn write_alter_table(table: &TableSchemaEngine, sql: &mut SqlWriter) -> Result<()> {
    let requests = table.ordered_requests();
    let plan = plan_columns(table.table(), table.fields(), requests.iter().copied())?;

    let needs_rebuild = requests.iter().any(|request| matches!(
        request,
        TableRequest::Drop(_) | TableRequest::Alter(..) | TableRequest::AddForeignKey { .. }
    ));
    let name = table.table();

    if needs_rebuild {
        if plan.new.is_empty() {
            unsupported!("table {:?} cannot be rebuilt without columns", name)
        }
        let backup = format!("{name}_backup");
        write_create_table(sql, &backup, &plan.new, CreateTableOptions::default());
        let kept = plan.kept().collect::<Vec<_>>();
        if !kept.is_empty() {
            sql.statement(|sql| {
                write!(sql, "INSERT INTO {backup} (");
                sql.write_names(kept.iter().copied());
                sql.write_str(") SELECT ");
                sql.write_names(kept.iter().copied());
                write!(sql, " FROM {name}");
            });
        }
        sql.statement(|sql| write!(sql, "DROP TABLE {name}"));
        sql.statement(|sql| write!(sql, "ALTER TABLE {backup} RENAME TO {name}"));
    } else {
        for request in requests.iter() {
            if let TableRequest::Add(column, field) = request {
                sql.statement(|sql| {
                    write!(sql, "ALTER TABLE {name} ADD ");
                    sql.write_column(column, field);
                });
            }
        }
    }

    table.write_junction_tables(sql)?;

    for request in requests.iter() {
        if let TableRequest::RenameTo(new_name) = request {
            sql.statement(|sql| write!(sql, "ALTER TABLE {name} RENAME TO {new_name}"));
        }
    }
    Ok(())
}
