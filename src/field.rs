//! Field descriptors - metadata for one logical column
//!
//! A field maps a display name and a type tag onto a physical column of a
//! data table. `Link` fields always come in pairs: the forward field and the
//! reverse field on the linked table, each naming the other in its property.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type tag of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Built-in label column used by link title caches
    Title,
    /// Free text
    Text,
    /// Numeric value, stored as text and ordered through a REAL cast
    Number,
    /// Boolean flag
    Checkbox,
    /// ISO-8601 date string
    Date,
    /// Many-to-many reference to rows of another (or the same) table
    Link,
}

impl FieldType {
    /// Get the string representation of the field type
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Title => "title",
            FieldType::Text => "text",
            FieldType::Number => "number",
            FieldType::Checkbox => "checkbox",
            FieldType::Date => "date",
            FieldType::Link => "link",
        }
    }

    /// Get all field types
    pub fn all() -> &'static [FieldType] {
        &[
            FieldType::Title,
            FieldType::Text,
            FieldType::Number,
            FieldType::Checkbox,
            FieldType::Date,
            FieldType::Link,
        ]
    }

    /// Whether ORDER BY on this type needs a numeric cast
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Number)
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "title" => Ok(FieldType::Title),
            "text" | "string" => Ok(FieldType::Text),
            "number" | "num" | "real" | "int" => Ok(FieldType::Number),
            "checkbox" | "bool" | "boolean" => Ok(FieldType::Checkbox),
            "date" => Ok(FieldType::Date),
            "link" | "relation" => Ok(FieldType::Link),
            _ => Err(Error::UnknownFieldType(s.to_string())),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Property payload of a `Link` field: the paired field on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProperty {
    pub link_table_name: String,
    pub link_column_name: String,
}

impl LinkProperty {
    pub fn new(link_table_name: impl Into<String>, link_column_name: impl Into<String>) -> Self {
        Self {
            link_table_name: link_table_name.into(),
            link_column_name: link_column_name.into(),
        }
    }
}

/// A field descriptor as stored in the `_fields` metadata table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Metadata row id (0 until persisted)
    pub id: i64,
    /// Display name
    pub name: String,
    /// Type tag
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Owning data table
    pub table_name: String,
    /// Physical column on the owning table
    pub table_column_name: String,
    /// Type-specific payload
    pub property: Option<serde_json::Value>,
}

impl Field {
    /// Create a new, not yet persisted, field descriptor
    pub fn new(
        name: impl Into<String>,
        field_type: FieldType,
        table_name: impl Into<String>,
        table_column_name: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            field_type,
            table_name: table_name.into(),
            table_column_name: table_column_name.into(),
            property: None,
        }
    }

    /// Create a link field descriptor pointing at its paired field
    pub fn link(
        name: impl Into<String>,
        table_name: impl Into<String>,
        table_column_name: impl Into<String>,
        property: LinkProperty,
    ) -> Result<Self> {
        let mut field = Self::new(name, FieldType::Link, table_name, table_column_name);
        field.property = Some(serde_json::to_value(property)?);
        Ok(field)
    }

    pub fn is_link(&self) -> bool {
        self.field_type == FieldType::Link
    }

    /// Decode the link property, failing for non-link fields
    pub fn link_property(&self) -> Result<LinkProperty> {
        if !self.is_link() {
            return Err(Error::NotALinkField(self.qualified_name()));
        }
        let property = self
            .property
            .clone()
            .ok_or_else(|| Error::NotALinkField(self.qualified_name()))?;
        Ok(serde_json::from_value(property)?)
    }

    /// `table.column`, for logs and error messages
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.table_name, self.table_column_name)
    }

    /// Property serialized for the metadata table
    pub fn property_json(&self) -> Result<Option<String>> {
        Ok(self
            .property
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_roundtrip() {
        for field_type in FieldType::all() {
            let s = field_type.as_str();
            let parsed: FieldType = s.parse().unwrap();
            assert_eq!(*field_type, parsed);
        }
    }

    #[test]
    fn test_field_type_aliases() {
        assert_eq!(FieldType::from_str("relation").unwrap(), FieldType::Link);
        assert_eq!(FieldType::from_str("NUM").unwrap(), FieldType::Number);
        assert!(FieldType::from_str("blob").is_err());
    }

    #[test]
    fn test_link_property_camel_case() {
        let field = Field::link(
            "Authors",
            "books",
            "cl_auth",
            LinkProperty::new("authors", "cl_book"),
        )
        .unwrap();

        let stored: serde_json::Value =
            serde_json::from_str(&field.property_json().unwrap().unwrap()).unwrap();
        assert_eq!(
            stored,
            serde_json::json!({"linkTableName": "authors", "linkColumnName": "cl_book"})
        );
        assert_eq!(field.link_property().unwrap(), LinkProperty::new("authors", "cl_book"));
    }

    #[test]
    fn test_link_property_on_plain_field() {
        let field = Field::new("Age", FieldType::Number, "people", "cl_age");
        assert!(matches!(field.link_property(), Err(Error::NotALinkField(_))));
        assert!(field.field_type.is_numeric());
    }
}
