//! Read-only schema lookup: attribute names, their bindings, and the default
//! geometry and time attributes used by the Z3 index.
//!
//! Schemas can be built programmatically or parsed from a compact type string:
//!
//! ```rust
//! use spatio_keyspace::schema::{AttributeType, Schema};
//!
//! let schema = Schema::parse("tracks", "name:String,dtg:Date,*geom:Point:srid=4326")?;
//! assert_eq!(schema.geom_field(), Some("geom"));
//! assert_eq!(schema.dtg_field(), Some("dtg"));
//! assert_eq!(schema.binding("name"), Some(AttributeType::String));
//! # Ok::<(), spatio_keyspace::KeyspaceError>(())
//! ```

use crate::error::{KeyspaceError, Result};
use std::fmt;
use std::str::FromStr;

/// Type binding of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    String,
    Integer,
    Long,
    Double,
    Boolean,
    Date,
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    Geometry,
}

impl AttributeType {
    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            Self::Point
                | Self::LineString
                | Self::Polygon
                | Self::MultiPoint
                | Self::MultiLineString
                | Self::MultiPolygon
                | Self::Geometry
        )
    }

    pub fn is_date(&self) -> bool {
        matches!(self, Self::Date)
    }
}

impl FromStr for AttributeType {
    type Err = KeyspaceError;

    fn from_str(s: &str) -> Result<Self> {
        let binding = match s.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "int" | "integer" => Self::Integer,
            "long" => Self::Long,
            "float" | "double" => Self::Double,
            "bool" | "boolean" => Self::Boolean,
            "date" | "timestamp" => Self::Date,
            "point" => Self::Point,
            "linestring" => Self::LineString,
            "polygon" => Self::Polygon,
            "multipoint" => Self::MultiPoint,
            "multilinestring" => Self::MultiLineString,
            "multipolygon" => Self::MultiPolygon,
            "geometry" => Self::Geometry,
            other => {
                return Err(KeyspaceError::Schema(format!(
                    "Unknown attribute type '{}'",
                    other
                )));
            }
        };
        Ok(binding)
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub binding: AttributeType,
}

/// A record type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    type_name: String,
    version: u32,
    attributes: Vec<AttributeDescriptor>,
    geom_field: Option<String>,
    dtg_field: Option<String>,
}

impl Schema {
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            type_name: type_name.into(),
            version: 1,
            attributes: Vec::new(),
            default_geometry: None,
            dtg: None,
        }
    }

    /// Parse a type string of comma-separated `name:Type` pairs.
    ///
    /// A leading `*` marks the default geometry. Options after a `;` are
    /// `key=value` pairs; `index.dtg=<attribute>` selects the time attribute.
    /// Per-attribute options after a second `:` (such as `srid=4326`) are
    /// accepted and ignored.
    pub fn parse(type_name: &str, text: &str) -> Result<Self> {
        let (attributes, options) = match text.split_once(';') {
            Some((attributes, options)) => (attributes, Some(options)),
            None => (text, None),
        };

        let mut builder = Self::builder(type_name);
        for entry in attributes.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split(':');
            let name = parts.next().unwrap_or_default().trim();
            let binding = parts.next().ok_or_else(|| {
                KeyspaceError::Schema(format!("Attribute '{}' is missing a type", name))
            })?;
            let binding: AttributeType = binding.parse()?;

            builder = match name.strip_prefix('*') {
                Some(name) => builder.default_geometry(name, binding),
                None => builder.attribute(name, binding),
            };
        }

        for option in options.into_iter().flat_map(|o| o.split(',')) {
            let Some((key, value)) = option.split_once('=') else {
                continue;
            };
            match key.trim() {
                "index.dtg" => builder = builder.dtg(value.trim()),
                other => log::debug!("Ignoring unknown schema option '{}'", other),
            }
        }

        builder.build()
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Schema version; bumping it invalidates cached key-space parameters.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn binding(&self, name: &str) -> Option<AttributeType> {
        self.attribute(name).map(|a| a.binding)
    }

    /// The default geometry attribute.
    pub fn geom_field(&self) -> Option<&str> {
        self.geom_field.as_deref()
    }

    /// The default time attribute.
    pub fn dtg_field(&self) -> Option<&str> {
        self.dtg_field.as_deref()
    }
}

pub struct SchemaBuilder {
    type_name: String,
    version: u32,
    attributes: Vec<AttributeDescriptor>,
    default_geometry: Option<String>,
    dtg: Option<String>,
}

impl SchemaBuilder {
    pub fn attribute(mut self, name: impl Into<String>, binding: AttributeType) -> Self {
        self.attributes.push(AttributeDescriptor {
            name: name.into(),
            binding,
        });
        self
    }

    /// Add an attribute and mark it as the default geometry.
    pub fn default_geometry(mut self, name: impl Into<String>, binding: AttributeType) -> Self {
        let name = name.into();
        self.default_geometry = Some(name.clone());
        self.attribute(name, binding)
    }

    /// Select the time attribute explicitly instead of the first date.
    pub fn dtg(mut self, name: impl Into<String>) -> Self {
        self.dtg = Some(name.into());
        self
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn build(self) -> Result<Schema> {
        for (i, attribute) in self.attributes.iter().enumerate() {
            if attribute.name.is_empty() {
                return Err(KeyspaceError::Schema(format!(
                    "Attribute at index {} has an empty name",
                    i
                )));
            }
            if self.attributes[..i].iter().any(|a| a.name == attribute.name) {
                return Err(KeyspaceError::Schema(format!(
                    "Duplicate attribute '{}' in '{}'",
                    attribute.name, self.type_name
                )));
            }
        }

        let binding_of = |name: &str| {
            self.attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.binding)
        };

        let geom_field = match self.default_geometry {
            Some(name) => {
                if !binding_of(&name).is_some_and(|b| b.is_geometry()) {
                    return Err(KeyspaceError::Schema(format!(
                        "Default geometry '{}' is not a geometry attribute",
                        name
                    )));
                }
                Some(name)
            }
            None => self
                .attributes
                .iter()
                .find(|a| a.binding.is_geometry())
                .map(|a| a.name.clone()),
        };

        let dtg_field = match self.dtg {
            Some(name) => {
                if binding_of(&name) != Some(AttributeType::Date) {
                    return Err(KeyspaceError::Schema(format!(
                        "Time attribute '{}' is not a Date attribute of '{}'",
                        name, self.type_name
                    )));
                }
                Some(name)
            }
            None => self
                .attributes
                .iter()
                .find(|a| a.binding.is_date())
                .map(|a| a.name.clone()),
        };

        Ok(Schema {
            type_name: self.type_name,
            version: self.version,
            attributes: self.attributes,
            geom_field,
            dtg_field,
        })
    }
}
