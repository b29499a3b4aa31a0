use indexmap::IndexMap;
use mortar_snapshot::schema::FieldType;
use mortar_snapshot::state::{FieldState, Fields};
use super::TableRequest;
use crate::error::Result;

/// Columns of a table in table order. Many-to-many fields never appear here.
pub type Columns = IndexMap<String, FieldState>;

/// Column sets of a table before and after a batch of requests.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnPlan {
    pub old: Columns,
    pub new: Columns,
}

impl ColumnPlan {
    /// Columns that survive the change, in the order of the new table.
    pub fn kept(&self) -> impl Iterator<Item = &str> + '_ {
        self.new.keys()
            .filter(|name| self.old.contains_key(name.as_str()))
            .map(|name| name.as_str())
    }
}

/// Computes the columns of `table` after applying `requests` to its current `fields`.
///
/// Requests that do not touch columns (renames and many-to-many relations) are ignored. The
/// requests are applied in the given order, so a column can be dropped and added back in the
/// same batch.
pub fn plan_columns<'a, I>(table: &str, fields: &Fields, requests: I) -> Result<ColumnPlan>
where
    I: IntoIterator<Item = &'a TableRequest>,
{
    let old = fields.iter()
        .filter(|(_, field)| !field.field_type.is_many_to_many())
        .map(|(name, field)| (name.clone(), field.clone()))
        .collect::<Columns>();

    let mut new = old.clone();
    for request in requests {
        match request {
            TableRequest::Drop(name) => {
                if new.shift_remove(name).is_none() {
                    schema_conflict!("cannot drop column {:?} of table {:?}: no such column", name, table)
                }
            },
            TableRequest::Add(name, field) => {
                if new.contains_key(name) {
                    schema_conflict!("cannot add column {:?} to table {:?}: column already exists", name, table)
                }
                new.insert(name.clone(), field.clone());
            },
            TableRequest::Alter(name, field) => match new.get_mut(name) {
                Some(column) => *column = field.clone(),
                None => schema_conflict!("cannot alter column {:?} of table {:?}: no such column", name, table),
            },
            TableRequest::AddForeignKey { column, references } => match new.get_mut(column) {
                Some(field) => field.field_type = FieldType::foreign_key(references.as_str()),
                None => schema_conflict!(
                    "cannot add foreign key on column {:?} of table {:?}: no such column", column, table
                ),
            },
            TableRequest::RenameTo(_) | TableRequest::AddM2m { .. } | TableRequest::DropM2m { .. } => (),
        }
    }
    Ok(ColumnPlan { old, new })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::schema::tests::{age, field, person};

    fn plan(requests: &[TableRequest]) -> Result<ColumnPlan> {
        let mut fields = person();
        fields.insert("tags".into(), field(FieldType::many_to_many("tag")));
        plan_columns("t", &fields, requests)
    }

    fn names(columns: &Columns) -> Vec<&str> {
        columns.keys().map(|name| name.as_str()).collect()
    }

    #[test]
    fn test_many_to_many_is_not_a_column() {
        let plan = plan(&[]).unwrap();
        assert_eq!(names(&plan.old), ["id", "name"]);
        assert_eq!(plan.old, plan.new);
    }

    #[test]
    fn test_drop_then_add() {
        let plan = plan(&[
            TableRequest::Drop("name".into()),
            TableRequest::Add("name".into(), age()),
            TableRequest::Add("age".into(), age()),
        ]).unwrap();
        assert_eq!(names(&plan.new), ["id", "name", "age"]);
        assert_eq!(plan.new["name"], age());
        assert_eq!(plan.kept().collect::<Vec<_>>(), ["id", "name"]);
    }

    #[test]
    fn test_alter_keeps_position() {
        let plan = plan(&[
            TableRequest::Alter("id".into(), field(FieldType::plain("TEXT"))),
            TableRequest::AddForeignKey { column: "name".into(), references: "user".into() },
        ]).unwrap();
        assert_eq!(names(&plan.new), ["id", "name"]);
        assert_eq!(plan.new["id"].field_type, FieldType::plain("TEXT"));
        assert_eq!(plan.new["name"].field_type, FieldType::foreign_key("user"));
    }

    #[test]
    fn test_conflicts() {
        let conflicts = [
            TableRequest::Drop("age".into()),
            TableRequest::Add("name".into(), age()),
            TableRequest::Alter("age".into(), age()),
            TableRequest::AddForeignKey { column: "age".into(), references: "user".into() },
            TableRequest::Drop("tags".into()),
        ];
        for request in conflicts {
            let err = plan(&[request]).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SchemaConflict);
        }
    }
}
