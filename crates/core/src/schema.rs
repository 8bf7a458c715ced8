//! Schema model
//!
//! A [`Schema`] is an ordered set of [`ObjectSchema`]s, one per object type.
//! Each object schema lists its [`Property`]s in column order. The binding layer
//! does not generate schemas; it receives them from the caller or introspects
//! them from the native engine after a dynamic open.

use crate::types::ObjectTypeId;
use serde::{Deserialize, Serialize};

/// Declared type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyType {
    /// 64-bit integer column (also read as `i32`)
    Int,
    /// Boolean column
    Bool,
    /// 32-bit float column
    Float,
    /// 64-bit float column
    Double,
    /// UTF-8 string column
    String,
    /// Timestamp column, whole seconds
    Date,
    /// Binary blob column
    Data,
    /// Dynamically typed column
    Mixed,
    /// Single link to another object
    Object,
    /// Ordered list of links to other objects
    List,
}

impl PropertyType {
    /// Check if the typed accessor can read and write this type
    pub fn is_field(self) -> bool {
        matches!(
            self,
            PropertyType::Int
                | PropertyType::Bool
                | PropertyType::Float
                | PropertyType::Double
                | PropertyType::String
                | PropertyType::Date
        )
    }

    /// Check if this property links to another object type
    pub fn is_link(self) -> bool {
        matches!(self, PropertyType::Object | PropertyType::List)
    }
}

/// One property of an object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    /// Property (column) name
    pub name: String,
    /// Declared type
    pub property_type: PropertyType,
    /// Target type for `Object` and `List` properties
    pub object_type: Option<String>,
}

impl Property {
    /// Create a field property
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            name: name.into(),
            property_type,
            object_type: None,
        }
    }

    /// Create a single-link property
    pub fn link(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::Object,
            object_type: Some(target.into()),
        }
    }

    /// Create a link-list property
    pub fn list(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property_type: PropertyType::List,
            object_type: Some(target.into()),
        }
    }
}

/// Schema of one object type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSchema {
    /// Type name, also the table name
    pub name: String,
    /// Properties in column order
    pub properties: Vec<Property>,
}

impl ObjectSchema {
    /// Create an object schema
    pub fn new(name: impl Into<String>, properties: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            properties,
        }
    }

    /// Type id of this schema
    pub fn type_id(&self) -> ObjectTypeId {
        ObjectTypeId::new(&self.name)
    }

    /// Find a property by name
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Ordered collection of object schemas
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    objects: Vec<ObjectSchema>,
}

impl Schema {
    /// Create an empty schema
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a schema from object schemas
    pub fn new(objects: Vec<ObjectSchema>) -> Self {
        Self { objects }
    }

    /// Check if the schema has no object types
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Number of object types
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Find an object schema by type name
    pub fn find(&self, name: &str) -> Option<&ObjectSchema> {
        self.objects.iter().find(|o| o.name == name)
    }

    /// Iterate over object schemas
    pub fn iter(&self) -> impl Iterator<Item = &ObjectSchema> {
        self.objects.iter()
    }

    /// Add an object schema, replacing one with the same name
    pub fn insert(&mut self, object: ObjectSchema) {
        match self.objects.iter_mut().find(|o| o.name == object.name) {
            Some(existing) => *existing = object,
            None => self.objects.push(object),
        }
    }
}

impl FromIterator<ObjectSchema> for Schema {
    fn from_iter<I: IntoIterator<Item = ObjectSchema>>(iter: I) -> Self {
        let mut schema = Schema::empty();
        for object in iter {
            schema.insert(object);
        }
        schema
    }
}
