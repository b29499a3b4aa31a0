use indexmap::IndexMap;
use serde::{Serialize, Deserialize};
use crate::schema::{FieldType, ModelProvider, Value};

/// Flat record of a field at some point in history. Two equal records mean "no change".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub field_type: FieldType,
    pub default: Option<Value>,
    pub null: bool,
}

impl FieldState {
    pub fn new(field_type: FieldType, default: Option<Value>, null: bool) -> Self {
        Self { field_type, default, null }
    }

    pub fn references(&self) -> Option<&str> {
        self.field_type.references()
    }
}

/// Fields of a table, keyed by field name, in declaration order.
pub type Fields = IndexMap<String, FieldState>;

/// Schema of one table at some point in history.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelState {
    pub name: String,
    pub fields: Fields,
}

impl ModelState {
    pub fn new(name: impl Into<String>, fields: Fields) -> Self {
        Self { name: name.into(), fields }
    }

    pub fn field(&self, name: &str) -> Option<&FieldState> {
        self.fields.get(name)
    }

    /// Inserts or replaces a field; a replaced field keeps its position.
    pub fn set_field(&mut self, name: impl Into<String>, field: FieldState) {
        self.fields.insert(name.into(), field);
    }

    pub fn del_field(&mut self, name: &str) -> Option<FieldState> {
        self.fields.shift_remove(name)
    }
}

/// Full table -> field schema snapshot.
///
/// A target state is built from the declared models with [`State::from_provider`]; a baseline
/// state is built by replaying the migration history onto [`State::new`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct State {
    pub models: IndexMap<String, ModelState>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_provider(provider: &dyn ModelProvider) -> Self {
        let mut state = Self::new();
        for model in provider.models() {
            let fields = model.fields.iter().map(|field| field.deconstruct()).collect();
            state.set_model(model.name, fields);
        }
        state
    }

    pub fn model(&self, name: &str) -> Option<&ModelState> {
        self.models.get(name)
    }

    pub fn model_mut(&mut self, name: &str) -> Option<&mut ModelState> {
        self.models.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn set_model(&mut self, name: impl Into<String>, fields: Fields) -> &mut ModelState {
        let name = name.into();
        let model = ModelState::new(name.clone(), fields);
        let entry = self.models.entry(name);
        let slot = entry.or_default();
        *slot = model;
        slot
    }

    pub fn del_model(&mut self, name: &str) -> Option<ModelState> {
        self.models.shift_remove(name)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
