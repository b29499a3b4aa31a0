use mortar_snapshot::state::State;
use crate::error::{Result, ResultExt};
use crate::exec::Executor;
use crate::schema::{Dialect, SchemaEngine};
use super::entry::{
    ChangeTableEntry, CreateTableEntry, DeleteFieldEntry, DeleteTableEntry, FieldEntry,
    FieldRecord, MigrationEntry,
};
use super::operation::{AlterTable, CreateTable, DeleteTable, Operation, SubOperation};

/// One step of the migration history.
///
/// Operations are kept ordered by kind (table creations, then deletions, then alterations) and
/// in insertion order within a kind. Operations that change nothing are never stored, so an empty
/// migration is one that does nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Migration {
    operations: Vec<Operation>,
}

impl Migration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, operation: Operation) {
        if operation.is_empty() {
            return;
        }
        let kind = operation.kind();
        let idx = self.operations.partition_point(|op| op.kind() <= kind);
        self.operations.insert(idx, operation);
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn deconstruct(&self) -> MigrationEntry {
        let mut entry = MigrationEntry::default();
        for operation in self.operations.iter() {
            match operation {
                Operation::CreateTable(op) => entry.create_table.push(CreateTableEntry {
                    table: op.table.clone(),
                    fields: FieldRecord::from_fields(&op.fields),
                }),
                Operation::DeleteTable(op) => entry.delete_table.push(DeleteTableEntry {
                    table: op.table.clone(),
                }),
                Operation::AlterTable(op) => {
                    let mut change = ChangeTableEntry {
                        table: op.table.clone(),
                        fields: FieldRecord::from_fields(&op.fields),
                        create_field: Vec::new(),
                        delete_field: Vec::new(),
                        change_field: Vec::new(),
                    };
                    for sub_operation in op.sub_operations.iter() {
                        match sub_operation {
                            SubOperation::CreateField { field, state } => change.create_field.push(FieldEntry {
                                field: FieldRecord::new(field.as_str(), state.clone()),
                            }),
                            SubOperation::DeleteField { field } => change.delete_field.push(DeleteFieldEntry {
                                field: (field.clone(),),
                            }),
                            SubOperation::ChangeField { field, state } => change.change_field.push(FieldEntry {
                                field: FieldRecord::new(field.as_str(), state.clone()),
                            }),
                        }
                    }
                    entry.change_table.push(change);
                },
            }
        }
        entry
    }

    pub fn from_entry(entry: MigrationEntry) -> Self {
        let mut migration = Self::new();
        for create in entry.create_table {
            migration.push(Operation::CreateTable(CreateTable {
                table: create.table,
                fields: FieldRecord::into_fields(create.fields),
            }));
        }
        for delete in entry.delete_table {
            migration.push(Operation::DeleteTable(DeleteTable { table: delete.table }));
        }
        for change in entry.change_table {
            let mut sub_operations = Vec::new();
            for create in change.create_field {
                let FieldRecord { name, state } = create.field;
                sub_operations.push(SubOperation::CreateField { field: name, state });
            }
            for delete in change.delete_field {
                sub_operations.push(SubOperation::DeleteField { field: delete.field.0 });
            }
            for alter in change.change_field {
                let FieldRecord { name, state } = alter.field;
                sub_operations.push(SubOperation::ChangeField { field: name, state });
            }
            migration.push(Operation::AlterTable(AlterTable {
                table: change.table,
                fields: FieldRecord::into_fields(change.fields),
                sub_operations,
            }));
        }
        migration
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.deconstruct()).err_internal()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let entry = serde_json::from_str(text).err_history()?;
        Ok(Self::from_entry(entry))
    }

    /// Renders the DDL script of this migration.
    pub fn to_sql(&self, dialect: Dialect) -> Result<String> {
        let mut schema = SchemaEngine::new(dialect);
        for operation in self.operations.iter() {
            operation.apply(&mut schema);
        }
        schema.to_sql()
    }

    /// Executes the migration as one script and commits it. If the database rejects the script,
    /// the transaction is rolled back and the error is returned.
    pub async fn apply(&self, executor: &mut dyn Executor) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        let sql = self.to_sql(executor.dialect())?;
        if sql.is_empty() {
            return Ok(());
        }
        debug!("Applying migration script:\n{}", sql);
        if let Err(err) = executor.execute_script(&sql).await {
            warn!("Migration failed, rolling back: {}", err);
            if let Err(rollback_err) = executor.rollback().await {
                warn!("Rollback failed: {}", rollback_err);
            }
            return Err(err);
        }
        executor.commit().await
    }

    /// Replays the migration onto a schema snapshot.
    pub fn apply_to_state(&self, state: &mut State) -> Result<()> {
        for operation in self.operations.iter() {
            operation.apply_to_state(state)?;
        }
        Ok(())
    }
}
