use mortar_snapshot::schema::Value;
use mortar_snapshot::state::FieldState;
use std::fmt::{self, Write};

/// Helper struct for generating DDL scripts.
#[derive(Debug, Default)]
pub struct SqlWriter {
    text: String,
}

impl SqlWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overloaded helper method that calls a `write_*` method depending on the type `T`.
    pub fn write<T: WriteSql + ?Sized>(&mut self, x: &T) {
        x.write_sql(self);
    }

    /// Appends the string verbatim into the script.
    pub fn write_str(&mut self, x: &str) {
        self.text.push_str(x);
    }

    /// Writes one statement terminated by `;`. Statements are separated by newlines.
    pub fn statement(&mut self, f: impl FnOnce(&mut Self)) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        f(self);
        self.text.push(';');
    }

    /// Appends the names separated by commas, without spaces.
    pub fn write_names<'a, I>(&mut self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for (i, name) in names.into_iter().enumerate() {
            if i > 0 {
                self.text.push(',');
            }
            self.text.push_str(name);
        }
    }

    /// Appends a column definition: `name type`, then `DEFAULT value` if the field has a default
    /// and `NOT NULL` otherwise, unless the field is nullable.
    pub fn write_column(&mut self, name: &str, field: &FieldState) {
        self.write_str(name);
        if let Some(column_type) = field.field_type.column_type() {
            self.write_str(" ");
            self.write_str(column_type);
        }
        if let Some(default) = &field.default {
            self.write_str(" DEFAULT ");
            self.write(default);
        } else if !field.null {
            self.write_str(" NOT NULL");
        }
    }

    /// Appends `FOREIGN KEY (column) REFERENCES table(id)`.
    pub fn write_foreign_key(&mut self, column: &str, references: &str) {
        write!(self, "FOREIGN KEY ({column}) REFERENCES {references}(id)");
    }

    /// This method makes the `write!` macro work with this struct.
    pub fn write_fmt(&mut self, fmt: fmt::Arguments<'_>) {
        self.text.write_fmt(fmt).expect("formatting failed")
    }

    /// Returns the produced script.
    pub fn build(self) -> String {
        self.text
    }
}

pub trait WriteSql {
    fn write_sql(&self, writer: &mut SqlWriter);
}

impl WriteSql for str {
    fn write_sql(&self, writer: &mut SqlWriter) {
        writer.write_str(self);
    }
}

impl WriteSql for Value {
    fn write_sql(&self, writer: &mut SqlWriter) {
        match self {
            Value::Bool(value) => writer.write_str(if *value { "1" } else { "0" }),
            Value::Int(value) => write!(writer, "{value}"),
            Value::Float(value) => write!(writer, "{value}"),
            Value::Text(value) => {
                writer.text.reserve(2 + value.len());
                writer.text.push('\'');
                for c in value.chars() {
                    if c == '\'' {
                        writer.text.push_str("''");
                    } else {
                        writer.text.push(c);
                    }
                }
                writer.text.push('\'');
            },
        }
    }
}
