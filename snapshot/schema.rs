use anyhow::{Result, bail, ensure};
use serde::{Deserialize, Deserializer, Serialize};
use serde::de::Error as _;
use std::fmt;
use std::str::FromStr;
use crate::state::FieldState;

/// Logical type of a model field.
///
/// In migration files and model manifests the type is written as a single token: `PK` for the
/// primary key, `FK(<table>)` for a foreign key, `M2M(<table>)` for a many-to-many relation, and
/// any other token is taken verbatim as the SQL type of a plain column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    /// A scalar column of the given SQL type, such as `TEXT` or `VARCHAR(80)`.
    Plain(String),
    /// Integer primary key of the table.
    PrimaryKey,
    /// Integer column referencing the `id` of another table.
    ForeignKey { references: String },
    /// Relation materialized as a separate junction table; it has no column of its own.
    ManyToMany { references: String },
}

const PRIMARY_KEY_TOKEN: &str = "PK";
const FOREIGN_KEY_TOKEN: &str = "FK";
const MANY_TO_MANY_TOKEN: &str = "M2M";
const KEY_SQL_TYPE: &str = "INTEGER";

impl FieldType {
    pub fn plain(sql_type: impl Into<String>) -> Self {
        Self::Plain(sql_type.into())
    }

    pub fn foreign_key(references: impl Into<String>) -> Self {
        Self::ForeignKey { references: references.into() }
    }

    pub fn many_to_many(references: impl Into<String>) -> Self {
        Self::ManyToMany { references: references.into() }
    }

    /// Table referenced by a relational field.
    pub fn references(&self) -> Option<&str> {
        match self {
            Self::ForeignKey { references } | Self::ManyToMany { references } => Some(references),
            Self::Plain(_) | Self::PrimaryKey => None,
        }
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self, Self::PrimaryKey)
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self, Self::ManyToMany { .. })
    }

    /// SQL type of the column that stores this field, `None` for many-to-many relations.
    pub fn column_type(&self) -> Option<&str> {
        match self {
            Self::Plain(sql_type) => Some(sql_type),
            Self::PrimaryKey | Self::ForeignKey { .. } => Some(KEY_SQL_TYPE),
            Self::ManyToMany { .. } => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(sql_type) => f.write_str(sql_type),
            Self::PrimaryKey => f.write_str(PRIMARY_KEY_TOKEN),
            Self::ForeignKey { references } => write!(f, "{FOREIGN_KEY_TOKEN}({references})"),
            Self::ManyToMany { references } => write!(f, "{MANY_TO_MANY_TOKEN}({references})"),
        }
    }
}

impl FromStr for FieldType {
    type Err = anyhow::Error;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        ensure!(!token.is_empty(), "data type must not be empty");
        if token == PRIMARY_KEY_TOKEN {
            return Ok(Self::PrimaryKey);
        }
        if let Some(references) = relation_target(token, FOREIGN_KEY_TOKEN)? {
            return Ok(Self::ForeignKey { references });
        }
        if let Some(references) = relation_target(token, MANY_TO_MANY_TOKEN)? {
            return Ok(Self::ManyToMany { references });
        }
        Ok(Self::Plain(token.into()))
    }
}

fn relation_target(token: &str, prefix: &str) -> Result<Option<String>> {
    let Some(rest) = token.strip_prefix(prefix).and_then(|rest| rest.strip_prefix('(')) else {
        return Ok(None);
    };
    let Some(target) = rest.strip_suffix(')') else {
        bail!("unterminated table reference in data type {:?}", token)
    };
    let target = target.trim();
    ensure!(
        !target.is_empty() && !target.contains(['(', ')']),
        "invalid table reference in data type {:?}",
        token
    );
    Ok(Some(target.into()))
}

impl TryFrom<String> for FieldType {
    type Error = anyhow::Error;

    fn try_from(token: String) -> Result<Self> {
        token.parse()
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.to_string()
    }
}

/// Literal default value of a field. Floats are always finite.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_finite(&self) -> bool {
        match self {
            Self::Float(value) => value.is_finite(),
            _ => true,
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Literal {
            Bool(bool),
            Int(i64),
            Float(f64),
            Text(String),
        }

        let value = match Literal::deserialize(deserializer)? {
            Literal::Bool(value) => Self::Bool(value),
            Literal::Int(value) => Self::Int(value),
            Literal::Float(value) => Self::Float(value),
            Literal::Text(value) => Self::Text(value),
        };
        if !value.is_finite() {
            return Err(D::Error::custom(format!("default value {:?} is not a finite number", value)));
        }
        Ok(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

/// Field declared on a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub null: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self { name: name.into(), field_type, default: None, null: false }
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn nullable(mut self) -> Self {
        self.null = true;
        self
    }

    /// Flattens the field into its name and the record that is compared and persisted.
    ///
    /// A field with a default value is never nullable.
    pub fn deconstruct(&self) -> (String, FieldState) {
        let null = self.null && self.default.is_none();
        (self.name.clone(), FieldState::new(self.field_type.clone(), self.default.clone(), null))
    }
}

/// Builds a field from its textual data type token.
pub fn get_field(name: &str, data_type: &str, default: Option<Value>, null: bool) -> Result<FieldDef> {
    let field_type = data_type.parse()?;
    if let Some(default) = default.as_ref() {
        ensure!(default.is_finite(), "default value {:?} of field {:?} is not a finite number", default, name);
    }
    Ok(FieldDef { name: name.into(), field_type, default, null })
}

/// Model (table) declaration: a name and its fields in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelDef {
    pub name: String,
    #[serde(rename = "field", default)]
    pub fields: Vec<FieldDef>,
}

impl ModelDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fields: Vec::new() }
    }

    pub fn field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// Source of the declared (target) data model.
///
/// Models are registered explicitly; the provider returns them in a stable order, which is the
/// order tables appear in generated migrations.
pub trait ModelProvider {
    fn models(&self) -> Vec<ModelDef>;
}

impl ModelProvider for [ModelDef] {
    fn models(&self) -> Vec<ModelDef> {
        self.to_vec()
    }
}

impl ModelProvider for Vec<ModelDef> {
    fn models(&self) -> Vec<ModelDef> {
        self.as_slice().models()
    }
}
