use indexmap::IndexMap;
use mortar_snapshot::state::{FieldState, Fields, State};
use super::migration::Migration;
use super::operation::{AlterTable, CreateTable, DeleteTable, Operation, SubOperation};

/// Computes the migration that turns `from_state` into `to_state`.
///
/// Tables and fields are visited in the order of `to_state`, followed by the leftovers of
/// `from_state` in their own order, so equal inputs always produce equal migrations. A changed
/// field is replaced as a whole.
pub fn compare(from_state: &State, to_state: &State) -> Migration {
    let mut migration = Migration::new();
    let mut old_models = from_state.models.iter()
        .map(|(name, model)| (name.as_str(), model))
        .collect::<IndexMap<_, _>>();

    for (name, new_model) in to_state.models.iter() {
        match old_models.shift_remove(name.as_str()) {
            None => migration.push(Operation::CreateTable(CreateTable {
                table: name.clone(),
                fields: new_model.fields.clone(),
            })),
            Some(old_model) => migration.push(Operation::AlterTable(AlterTable {
                table: name.clone(),
                fields: old_model.fields.clone(),
                sub_operations: compare_fields(&old_model.fields, &new_model.fields),
            })),
        }
    }

    for name in old_models.keys() {
        migration.push(Operation::DeleteTable(DeleteTable { table: name.to_string() }));
    }

    debug!("Planned migration with {} operation(s)", migration.operations().len());
    migration
}

fn compare_fields(from_fields: &Fields, to_fields: &Fields) -> Vec<SubOperation> {
    let mut sub_operations = Vec::new();
    let mut old_fields = from_fields.iter()
        .map(|(name, field)| (name.as_str(), field))
        .collect::<IndexMap<&str, &FieldState>>();

    for (name, new_field) in to_fields.iter() {
        match old_fields.shift_remove(name.as_str()) {
            None => sub_operations.push(SubOperation::CreateField {
                field: name.clone(),
                state: new_field.clone(),
            }),
            Some(old_field) if old_field != new_field => sub_operations.push(SubOperation::ChangeField {
                field: name.clone(),
                state: new_field.clone(),
            }),
            Some(_) => (),
        }
    }

    for name in old_fields.keys() {
        sub_operations.push(SubOperation::DeleteField { field: name.to_string() });
    }
    sub_operations
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortar_snapshot::schema::{FieldDef, FieldType, ModelDef};
    use proptest::prelude::*;
    use crate::migrate::replay;

    fn blog(with_age: bool) -> State {
        let mut user = ModelDef::new("user")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("name", FieldType::plain("TEXT")).nullable());
        if with_age {
            user = user.field(FieldDef::new("age", FieldType::plain("INTEGER")).with_default(0));
        }
        let post = ModelDef::new("post")
            .field(FieldDef::new("id", FieldType::PrimaryKey))
            .field(FieldDef::new("author", FieldType::foreign_key("user")));
        State::from_provider(&vec![user, post])
    }

    #[test]
    fn test_create_from_empty() {
        let migration = compare(&State::new(), &blog(false));
        let tables = migration.operations().iter().map(|op| op.table()).collect::<Vec<_>>();
        assert_eq!(tables, ["user", "post"]);
        assert!(migration.operations().iter().all(|op| matches!(op, Operation::CreateTable(_))));
    }

    #[test]
    fn test_field_changes() {
        let mut to_state = blog(true);
        let user = to_state.model_mut("user").unwrap();
        user.del_field("name");
        user.set_field("id", FieldState::new(FieldType::plain("TEXT"), None, false));

        let migration = compare(&blog(false), &to_state);
        assert_eq!(migration.operations().len(), 1);
        let Operation::AlterTable(alter) = &migration.operations()[0] else {
            panic!("expected an alter table operation")
        };
        assert_eq!(alter.table, "user");
        assert_eq!(alter.fields, blog(false).model("user").unwrap().fields);
        assert_eq!(alter.sub_operations, vec![
            SubOperation::ChangeField {
                field: "id".into(),
                state: FieldState::new(FieldType::plain("TEXT"), None, false),
            },
            SubOperation::CreateField {
                field: "age".into(),
                state: to_state.model("user").unwrap().fields["age"].clone(),
            },
            SubOperation::DeleteField { field: "name".into() },
        ]);
    }

    #[test]
    fn test_delete_table() {
        let mut to_state = blog(false);
        to_state.del_model("post");
        let migration = compare(&blog(false), &to_state);
        assert_eq!(migration.operations(), [Operation::DeleteTable(DeleteTable { table: "post".into() })]);
    }

    fn arb_field_state() -> impl Strategy<Value = FieldState> {
        let field_type = prop_oneof![
            Just(FieldType::PrimaryKey),
            "[a-c]".prop_map(|table| FieldType::foreign_key(table)),
            "[a-c]".prop_map(|table| FieldType::many_to_many(table)),
            prop_oneof![Just("TEXT"), Just("INTEGER"), Just("REAL")].prop_map(|sql_type| FieldType::plain(sql_type)),
        ];
        (field_type, proptest::option::of(any::<i64>()), any::<bool>())
            .prop_map(|(field_type, default, null)| FieldState::new(field_type, default.map(Into::into), null))
    }

    fn arb_state() -> impl Strategy<Value = State> {
        let fields = proptest::collection::vec(("[a-e]", arb_field_state()), 0..5)
            .prop_map(|fields| fields.into_iter().collect::<Fields>());
        proptest::collection::vec(("[p-t]", fields), 0..4).prop_map(|models| {
            let mut state = State::new();
            for (name, fields) in models {
                state.set_model(name, fields);
            }
            state
        })
    }

    proptest! {
        #[test]
        fn test_compare_same_state_is_empty(state in arb_state()) {
            prop_assert!(compare(&state, &state).is_empty());
        }

        #[test]
        fn test_replay_reaches_target(first in arb_state(), second in arb_state()) {
            let history = vec![compare(&State::new(), &first), compare(&first, &second)];
            prop_assert_eq!(replay(&history).unwrap(), second);
        }

        #[test]
        fn test_persisted_history_replays_identically(first in arb_state(), second in arb_state()) {
            let history = vec![compare(&State::new(), &first), compare(&first, &second)];
            let reloaded = history.iter()
                .map(|migration| Migration::from_json(&migration.to_json().unwrap()).unwrap())
                .collect::<Vec<_>>();
            prop_assert_eq!(replay(&reloaded).unwrap(), replay(&history).unwrap());
        }
    }
}
