//! Persisted form of migrations.
//!
//! A migration file is a JSON object grouping operations by kind:
//!
//! ```json
//! {
//!   "CREATE_TABLE": [{"table": "user", "fields": [["id", "PK", null, false]]}],
//!   "DELETE_TABLE": [{"table": "draft"}],
//!   "CHANGE_TABLE": [{
//!     "table": "post",
//!     "fields": [["id", "PK", null, false], ["body", "TEXT", null, true]],
//!     "CREATE_FIELD": [{"field": ["author", "FK(user)", null, false, "user"]}],
//!     "DELETE_FIELD": [{"field": ["body"]}]
//!   }]
//! }
//! ```
//!
//! Field records are arrays `[name, data_type, default, null]`, with the referenced table
//! appended for relational fields. Empty groups are omitted.

use anyhow::ensure;
use mortar_snapshot::schema::{FieldType, Value};
use mortar_snapshot::state::{FieldState, Fields};
use serde::{Serialize, Deserialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationEntry {
    #[serde(rename = "CREATE_TABLE", default, skip_serializing_if = "Vec::is_empty")]
    pub create_table: Vec<CreateTableEntry>,
    #[serde(rename = "DELETE_TABLE", default, skip_serializing_if = "Vec::is_empty")]
    pub delete_table: Vec<DeleteTableEntry>,
    #[serde(rename = "CHANGE_TABLE", default, skip_serializing_if = "Vec::is_empty")]
    pub change_table: Vec<ChangeTableEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateTableEntry {
    pub table: String,
    pub fields: Vec<FieldRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteTableEntry {
    pub table: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangeTableEntry {
    pub table: String,
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
    #[serde(rename = "CREATE_FIELD", default, skip_serializing_if = "Vec::is_empty")]
    pub create_field: Vec<FieldEntry>,
    #[serde(rename = "DELETE_FIELD", default, skip_serializing_if = "Vec::is_empty")]
    pub delete_field: Vec<DeleteFieldEntry>,
    #[serde(rename = "CHANGE_FIELD", default, skip_serializing_if = "Vec::is_empty")]
    pub change_field: Vec<FieldEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldEntry {
    pub field: FieldRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeleteFieldEntry {
    pub field: (String,),
}

/// A named field record, persisted as a flat array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldRecordRepr", into = "FieldRecordRepr")]
pub struct FieldRecord {
    pub name: String,
    pub state: FieldState,
}

#[derive(Serialize, Deserialize)]
#[doc(hidden)]
#[serde(untagged)]
pub enum FieldRecordRepr {
    Related(String, FieldType, Option<Value>, bool, String),
    Plain(String, FieldType, Option<Value>, bool),
}

impl FieldRecord {
    pub fn new(name: impl Into<String>, state: FieldState) -> Self {
        Self { name: name.into(), state }
    }

    pub fn from_fields(fields: &Fields) -> Vec<Self> {
        fields.iter().map(|(name, state)| Self::new(name.as_str(), state.clone())).collect()
    }

    pub fn into_fields(records: Vec<Self>) -> Fields {
        records.into_iter().map(|record| (record.name, record.state)).collect()
    }
}

impl TryFrom<FieldRecordRepr> for FieldRecord {
    type Error = anyhow::Error;

    fn try_from(repr: FieldRecordRepr) -> anyhow::Result<Self> {
        let (name, field_type, default, null) = match repr {
            FieldRecordRepr::Related(name, field_type, default, null, references) => {
                ensure!(
                    field_type.references() == Some(references.as_str()),
                    "field {:?} of type {} cannot reference table {:?}",
                    name, field_type, references
                );
                (name, field_type, default, null)
            },
            FieldRecordRepr::Plain(name, field_type, default, null) => (name, field_type, default, null),
        };
        Ok(Self::new(name, FieldState::new(field_type, default, null)))
    }
}

impl From<FieldRecord> for FieldRecordRepr {
    fn from(record: FieldRecord) -> Self {
        let FieldState { field_type, default, null } = record.state;
        match field_type.references().map(String::from) {
            Some(references) => Self::Related(record.name, field_type, default, null, references),
            None => Self::Plain(record.name, field_type, default, null),
        }
    }
}
