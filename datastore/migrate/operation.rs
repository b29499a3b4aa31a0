use mortar_snapshot::state::{FieldState, Fields, State};
use crate::error::Result;
use crate::schema::SchemaEngine;

/// Table-level schema change.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateTable(CreateTable),
    DeleteTable(DeleteTable),
    AlterTable(AlterTable),
}

/// Kind of an [`Operation`]; operations of a migration are ordered by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OperationKind {
    CreateTable,
    DeleteTable,
    AlterTable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateTable {
    pub table: String,
    pub fields: Fields,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteTable {
    pub table: String,
}

/// Changes of the fields of one table.
#[derive(Debug, Clone, PartialEq)]
pub struct AlterTable {
    pub table: String,
    /// Fields of the table before the change.
    pub fields: Fields,
    pub sub_operations: Vec<SubOperation>,
}

/// Field-level change inside an [`AlterTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum SubOperation {
    CreateField { field: String, state: FieldState },
    DeleteField { field: String },
    /// Replaces the whole record of the field.
    ChangeField { field: String, state: FieldState },
}

impl Operation {
    pub fn table(&self) -> &str {
        match self {
            Self::CreateTable(op) => &op.table,
            Self::DeleteTable(op) => &op.table,
            Self::AlterTable(op) => &op.table,
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::CreateTable(_) => OperationKind::CreateTable,
            Self::DeleteTable(_) => OperationKind::DeleteTable,
            Self::AlterTable(_) => OperationKind::AlterTable,
        }
    }

    /// An alter without sub-operations changes nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::AlterTable(op) => op.sub_operations.is_empty(),
            Self::CreateTable(_) | Self::DeleteTable(_) => false,
        }
    }

    /// Records the DDL of this operation in the schema engine.
    pub fn apply(&self, schema: &mut SchemaEngine) {
        match self {
            Self::CreateTable(op) => schema.create_table(&op.table, &op.fields),
            Self::DeleteTable(op) => schema.delete_table(&op.table),
            Self::AlterTable(op) => {
                let table = schema.alter_table(&op.table, &op.fields);
                for sub_operation in op.sub_operations.iter() {
                    match sub_operation {
                        SubOperation::CreateField { field, state } => table.add(field, state),
                        SubOperation::DeleteField { field } => table.drop(field),
                        SubOperation::ChangeField { field, state } => table.alter(field, state),
                    };
                }
            },
        }
    }

    /// Replays this operation onto a schema snapshot.
    pub fn apply_to_state(&self, state: &mut State) -> Result<()> {
        match self {
            Self::CreateTable(op) => {
                if state.contains(&op.table) {
                    corrupt_history!("table {:?} is created twice", op.table)
                }
                state.set_model(op.table.as_str(), op.fields.clone());
            },
            Self::DeleteTable(op) => {
                if state.del_model(&op.table).is_none() {
                    corrupt_history!("cannot delete unknown table {:?}", op.table)
                }
            },
            Self::AlterTable(op) => {
                let model = match state.model_mut(&op.table) {
                    Some(model) => model,
                    None => corrupt_history!("cannot alter unknown table {:?}", op.table),
                };
                for sub_operation in op.sub_operations.iter() {
                    match sub_operation {
                        SubOperation::CreateField { field, state } => {
                            if model.field(field).is_some() {
                                corrupt_history!("field {:?} of table {:?} is created twice", field, op.table)
                            }
                            model.set_field(field.as_str(), state.clone());
                        },
                        SubOperation::DeleteField { field } => {
                            if model.del_field(field).is_none() {
                                corrupt_history!("cannot delete unknown field {:?} of table {:?}", field, op.table)
                            }
                        },
                        SubOperation::ChangeField { field, state } => {
                            if model.field(field).is_none() {
                                corrupt_history!("cannot change unknown field {:?} of table {:?}", field, op.table)
                            }
                            model.set_field(field.as_str(), state.clone());
                        },
                    }
                }
            },
        }
        Ok(())
    }
}

impl SubOperation {
    pub fn field(&self) -> &str {
        match self {
            Self::CreateField { field, .. }
                | Self::DeleteField { field }
                | Self::ChangeField { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::Dialect;
    use mortar_snapshot::schema::FieldType;

    fn text() -> FieldState {
        FieldState::new(FieldType::plain("TEXT"), None, true)
    }

    fn user_fields() -> Fields {
        [
            ("id".to_string(), FieldState::new(FieldType::PrimaryKey, None, false)),
            ("name".to_string(), text()),
        ].into_iter().collect()
    }

    fn alter(sub_operations: Vec<SubOperation>) -> Operation {
        Operation::AlterTable(AlterTable { table: "user".into(), fields: user_fields(), sub_operations })
    }

    #[test]
    fn test_apply_to_state() {
        let mut state = State::new();
        Operation::CreateTable(CreateTable { table: "user".into(), fields: user_fields() })
            .apply_to_state(&mut state).unwrap();
        alter(vec![
            SubOperation::CreateField { field: "email".into(), state: text() },
            SubOperation::DeleteField { field: "name".into() },
            SubOperation::ChangeField { field: "id".into(), state: text() },
        ]).apply_to_state(&mut state).unwrap();

        let user = state.model("user").unwrap();
        assert_eq!(user.fields.keys().collect::<Vec<_>>(), ["id", "email"]);
        assert_eq!(user.field("id"), Some(&text()));

        Operation::DeleteTable(DeleteTable { table: "user".into() })
            .apply_to_state(&mut state).unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_corrupted_replay() {
        let create = Operation::CreateTable(CreateTable { table: "user".into(), fields: user_fields() });
        let mut state = State::new();
        let cases = [
            alter(vec![]),
            Operation::DeleteTable(DeleteTable { table: "user".into() }),
        ];
        for op in cases {
            assert_eq!(op.apply_to_state(&mut state).unwrap_err().kind(), ErrorKind::HistoryCorruption);
        }

        create.apply_to_state(&mut state).unwrap();
        let cases = [
            create.clone(),
            alter(vec![SubOperation::DeleteField { field: "age".into() }]),
            alter(vec![SubOperation::ChangeField { field: "age".into(), state: text() }]),
            alter(vec![SubOperation::CreateField { field: "name".into(), state: text() }]),
        ];
        for op in cases {
            assert_eq!(op.apply_to_state(&mut state).unwrap_err().kind(), ErrorKind::HistoryCorruption);
        }
    }

    #[test]
    fn test_apply_to_schema() {
        let mut schema = SchemaEngine::new(Dialect::MySql);
        alter(vec![
            SubOperation::DeleteField { field: "name".into() },
            SubOperation::CreateField { field: "email".into(), state: text() },
        ]).apply(&mut schema);
        assert_eq!(schema.to_sql().unwrap(), "ALTER TABLE user DROP name, ADD email TEXT;");
    }

    #[test]
    fn test_empty_alter() {
        assert!(alter(vec![]).is_empty());
        assert!(!Operation::DeleteTable(DeleteTable { table: "user".into() }).is_empty());
        assert_eq!(alter(vec![]).kind(), OperationKind::AlterTable);
    }
}
