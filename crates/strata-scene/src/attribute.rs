//! Typed attribute values and the fixed per-resource attribute schema.

use glam::{DMat4, DVec3, Vec2, Vec3, Vec4};

/// Type tag for a declared attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeType {
    Bool,
    Int64,
    UInt64,
    Float,
    Double,
    Float3,
    Double3,
    Float4,
    Matrix4d,
    Range3d,
    Token,
    IntArray,
    UIntArray,
    FloatArray,
    Float2Array,
    Float3Array,
    Float4Array,
    ByteArray,
    UInt64Array,
    TokenArray,
}

impl AttributeType {
    /// Whether values of this type are written with bulk array writes.
    pub fn is_array(self) -> bool {
        matches!(
            self,
            AttributeType::IntArray
                | AttributeType::UIntArray
                | AttributeType::FloatArray
                | AttributeType::Float2Array
                | AttributeType::Float3Array
                | AttributeType::Float4Array
                | AttributeType::ByteArray
                | AttributeType::UInt64Array
                | AttributeType::TokenArray
        )
    }
}

/// A scalar (non-array) attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float(f32),
    Double(f64),
    Float3(Vec3),
    Double3(DVec3),
    Float4(Vec4),
    Matrix4d(DMat4),
    /// Axis-aligned box as `(min, max)`.
    Range3d(DVec3, DVec3),
    Token(String),
}

impl AttributeValue {
    /// The type tag this value must be declared with.
    pub fn ty(&self) -> AttributeType {
        match self {
            AttributeValue::Bool(_) => AttributeType::Bool,
            AttributeValue::Int64(_) => AttributeType::Int64,
            AttributeValue::UInt64(_) => AttributeType::UInt64,
            AttributeValue::Float(_) => AttributeType::Float,
            AttributeValue::Double(_) => AttributeType::Double,
            AttributeValue::Float3(_) => AttributeType::Float3,
            AttributeValue::Double3(_) => AttributeType::Double3,
            AttributeValue::Float4(_) => AttributeType::Float4,
            AttributeValue::Matrix4d(_) => AttributeType::Matrix4d,
            AttributeValue::Range3d(..) => AttributeType::Range3d,
            AttributeValue::Token(_) => AttributeType::Token,
        }
    }
}

/// A whole-array attribute value. Arrays are always replaced wholesale.
#[derive(Clone, Debug, PartialEq)]
pub enum ArrayValue {
    Int(Vec<i32>),
    UInt(Vec<u32>),
    Float(Vec<f32>),
    Float2(Vec<Vec2>),
    Float3(Vec<Vec3>),
    Float4(Vec<Vec4>),
    Byte(Vec<u8>),
    UInt64(Vec<u64>),
    Token(Vec<String>),
}

impl ArrayValue {
    /// The type tag this array must be declared with.
    pub fn ty(&self) -> AttributeType {
        match self {
            ArrayValue::Int(_) => AttributeType::IntArray,
            ArrayValue::UInt(_) => AttributeType::UIntArray,
            ArrayValue::Float(_) => AttributeType::FloatArray,
            ArrayValue::Float2(_) => AttributeType::Float2Array,
            ArrayValue::Float3(_) => AttributeType::Float3Array,
            ArrayValue::Float4(_) => AttributeType::Float4Array,
            ArrayValue::Byte(_) => AttributeType::ByteArray,
            ArrayValue::UInt64(_) => AttributeType::UInt64Array,
            ArrayValue::Token(_) => AttributeType::TokenArray,
        }
    }

    /// Number of elements in the array.
    pub fn len(&self) -> usize {
        match self {
            ArrayValue::Int(v) => v.len(),
            ArrayValue::UInt(v) => v.len(),
            ArrayValue::Float(v) => v.len(),
            ArrayValue::Float2(v) => v.len(),
            ArrayValue::Float3(v) => v.len(),
            ArrayValue::Float4(v) => v.len(),
            ArrayValue::Byte(v) => v.len(),
            ArrayValue::UInt64(v) => v.len(),
            ArrayValue::Token(v) => v.len(),
        }
    }

    /// Returns `true` if the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One declared attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeDecl {
    pub name: String,
    pub ty: AttributeType,
}

/// The fixed set of attributes a backend resource carries.
///
/// Declared exactly once, when a pooled resource is created. Later writes
/// must name a declared attribute with a matching type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeSchema {
    attributes: Vec<AttributeDecl>,
}

impl AttributeSchema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute. Re-adding an existing name replaces its type.
    pub fn add(&mut self, name: impl Into<String>, ty: AttributeType) -> &mut Self {
        let name = name.into();
        match self.attributes.iter_mut().find(|decl| decl.name == name) {
            Some(decl) => decl.ty = ty,
            None => self.attributes.push(AttributeDecl { name, ty }),
        }
        self
    }

    /// Builder-style variant of [`add`](Self::add).
    pub fn with(mut self, name: impl Into<String>, ty: AttributeType) -> Self {
        self.add(name, ty);
        self
    }

    /// Looks up the declared type of an attribute.
    pub fn get(&self, name: &str) -> Option<AttributeType> {
        self.attributes
            .iter()
            .find(|decl| decl.name == name)
            .map(|decl| decl.ty)
    }

    /// Returns `true` if the attribute is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterates over declared attributes in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDecl> {
        self.attributes.iter()
    }

    /// Number of declared attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Returns `true` if nothing is declared.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
