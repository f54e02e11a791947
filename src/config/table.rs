//! Table descriptions: columns, primary key and soft-delete marker, validated once at build time.

use crate::case::{to_camel_case, to_snake_case};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Storage column name that marks a table as soft-deletable when no marker is set explicitly.
pub const SOFT_DELETE_COLUMN: &str = "deleted_at";

/// Semantic column type. Drives the cast applied to bound parameters and row decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    SmallInt,
    Integer,
    BigInt,
    Serial,
    BigSerial,
    Real,
    Double,
    Numeric,
    Text,
    Varchar,
    Boolean,
    Uuid,
    Date,
    Timestamp,
    TimestampTz,
    Json,
    Jsonb,
}

impl ColumnType {
    /// PostgreSQL type name used in `$n::type` placeholders.
    pub fn pg_cast(&self) -> &'static str {
        match self {
            ColumnType::SmallInt => "int2",
            ColumnType::Integer | ColumnType::Serial => "int4",
            ColumnType::BigInt | ColumnType::BigSerial => "int8",
            ColumnType::Real => "float4",
            ColumnType::Double => "float8",
            ColumnType::Numeric => "numeric",
            ColumnType::Text => "text",
            ColumnType::Varchar => "varchar",
            ColumnType::Boolean => "bool",
            ColumnType::Uuid => "uuid",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
            ColumnType::TimestampTz => "timestamptz",
            ColumnType::Json => "json",
            ColumnType::Jsonb => "jsonb",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ColumnType::SmallInt
                | ColumnType::Integer
                | ColumnType::BigInt
                | ColumnType::Serial
                | ColumnType::BigSerial
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, ColumnType::Real | ColumnType::Double)
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::TimestampTz)
    }

    /// Serial columns always have a storage-side default.
    pub fn has_implicit_default(&self) -> bool {
        matches!(self, ColumnType::Serial | ColumnType::BigSerial)
    }

    /// Numeric is read back as text so precision survives the trip through JSON.
    pub fn select_as_text(&self) -> bool {
        matches!(self, ColumnType::Numeric)
    }
}

#[derive(Clone, Debug)]
pub struct Column {
    /// Name used in records, filters and primary-key values.
    pub field: String,
    /// Storage column name.
    pub column: String,
    pub ty: ColumnType,
    pub has_default: bool,
    primary: bool,
    explicit_column: bool,
}

impl Column {
    pub fn new(field: impl Into<String>, ty: ColumnType) -> Self {
        let field = field.into();
        Column {
            column: field.clone(),
            field,
            ty,
            has_default: ty.has_implicit_default(),
            primary: false,
            explicit_column: false,
        }
    }

    /// Column declared by its storage name; the field name is its camelCase form.
    pub fn storage(column: impl Into<String>, ty: ColumnType) -> Self {
        let column = column.into();
        Column {
            field: to_camel_case(&column),
            column,
            ty,
            has_default: ty.has_implicit_default(),
            primary: false,
            explicit_column: true,
        }
    }

    pub fn column_name(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self.explicit_column = true;
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary = true;
        self
    }
}

/// Read-only descriptor of one storage entity.
#[derive(Clone, Debug)]
pub struct TableDescription {
    name: String,
    schema: Option<String>,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    soft_delete: Option<String>,
}

impl TableDescription {
    pub fn builder(name: impl Into<String>) -> TableDescriptionBuilder {
        TableDescriptionBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    /// Primary-key field names in declared order. Never empty.
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn soft_delete_column(&self) -> Option<&Column> {
        self.soft_delete.as_deref().and_then(|f| self.column(f))
    }

    pub fn has_soft_delete(&self) -> bool {
        self.soft_delete.is_some()
    }
}

#[derive(Debug)]
pub struct TableDescriptionBuilder {
    name: String,
    schema: Option<String>,
    columns: Vec<Column>,
    primary_key: Vec<String>,
    soft_delete: Option<String>,
    snake_case: bool,
}

impl TableDescriptionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        TableDescriptionBuilder {
            name: name.into(),
            schema: None,
            columns: Vec::new(),
            primary_key: Vec::new(),
            soft_delete: None,
            snake_case: false,
        }
    }

    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Table-level primary key (single or composite). Takes precedence over column flags.
    pub fn primary_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Designate the soft-delete marker explicitly.
    pub fn soft_delete(mut self, field: impl Into<String>) -> Self {
        self.soft_delete = Some(field.into());
        self
    }

    /// Derive storage names from field names (`minCapacity` -> `min_capacity`) unless set explicitly.
    pub fn snake_case_columns(mut self) -> Self {
        self.snake_case = true;
        self
    }

    pub fn build(self) -> Result<TableDescription, ConfigError> {
        let TableDescriptionBuilder {
            name,
            schema,
            mut columns,
            primary_key,
            soft_delete,
            snake_case,
        } = self;

        if snake_case {
            for c in columns.iter_mut().filter(|c| !c.explicit_column) {
                c.column = to_snake_case(&c.field);
            }
        }

        let mut seen = HashSet::new();
        for c in &columns {
            if !seen.insert(c.field.as_str()) {
                return Err(ConfigError::DuplicateColumn {
                    table: name.clone(),
                    field: c.field.clone(),
                });
            }
        }

        let primary_key = if primary_key.is_empty() {
            columns
                .iter()
                .filter(|c| c.primary)
                .map(|c| c.field.clone())
                .collect::<Vec<_>>()
        } else {
            primary_key
        };
        if primary_key.is_empty() {
            return Err(ConfigError::MissingPrimaryKey { table: name });
        }
        for pk in &primary_key {
            if !seen.contains(pk.as_str()) {
                return Err(ConfigError::InvalidPrimaryKey {
                    table: name.clone(),
                    field: pk.clone(),
                });
            }
        }

        let soft_delete = match soft_delete {
            Some(field) => {
                let valid = columns
                    .iter()
                    .any(|c| c.field == field && c.ty.is_timestamp());
                if !valid {
                    return Err(ConfigError::InvalidSoftDelete { table: name, field });
                }
                Some(field)
            }
            None => columns
                .iter()
                .find(|c| c.column == SOFT_DELETE_COLUMN && c.ty.is_timestamp())
                .map(|c| c.field.clone()),
        };

        tracing::debug!(
            table = %name,
            primary_key = ?primary_key,
            soft_delete = ?soft_delete,
            "table described"
        );

        Ok(TableDescription {
            name,
            schema,
            columns,
            primary_key,
            soft_delete,
        })
    }
}
