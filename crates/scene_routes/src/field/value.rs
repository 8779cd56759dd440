//! Dynamically typed field values.
//!
//! [`FieldValue`] is the closed tagged union every field slot holds. Array variants wrap an
//! [`ArrayValue`], which tracks how many of its allocated elements are valid so that callers
//! can hand over a reused buffer together with a count.
use std::fmt;

use glam::{Vec2, Vec3, Vec4};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::field::types::{FieldKind, FieldType};
use crate::node::NodeId;

/// A homogeneous array with a count of valid leading elements.
///
/// Invariant: `count <= data.len()`. Equality, iteration and serialization only look at the
/// valid prefix.
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(
        from = "Vec<T>",
        into = "Vec<T>",
        bound(serialize = "T: Clone + Serialize", deserialize = "T: Deserialize<'de>")
    )
)]
#[derive(Clone, Debug)]
pub struct ArrayValue<T> {
    data: Vec<T>,
    count: usize,
}

impl<T> ArrayValue<T> {
    /// Wraps a vector, treating every element as valid.
    pub fn new(data: Vec<T>) -> Self {
        let count = data.len();
        Self { data, count }
    }

    /// Wraps a vector of which only the first `count` elements are valid.
    ///
    /// Returns `None` when `count` exceeds the allocated length.
    pub fn with_count(data: Vec<T>, count: usize) -> Option<Self> {
        if count > data.len() {
            return None;
        }
        Some(Self { data, count })
    }

    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            count: 0,
        }
    }

    /// Number of valid elements.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of allocated elements, valid or not.
    #[inline]
    pub fn allocated(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data[..self.count]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Consumes the array, dropping the invalid tail.
    pub fn into_vec(mut self) -> Vec<T> {
        self.data.truncate(self.count);
        self.data
    }
}

impl<T> Default for ArrayValue<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: PartialEq> PartialEq for ArrayValue<T> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T> From<Vec<T>> for ArrayValue<T> {
    fn from(value: Vec<T>) -> Self {
        ArrayValue::new(value)
    }
}

impl<T> From<ArrayValue<T>> for Vec<T> {
    fn from(value: ArrayValue<T>) -> Self {
        value.into_vec()
    }
}

impl<'a, T> IntoIterator for &'a ArrayValue<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The value held by one field slot.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int32(i32),
    Float(f32),
    Double(f64),
    String(String),
    /// Non-owning reference; `None` is the null node.
    Node(Option<NodeId>),
    BoolArray(ArrayValue<bool>),
    Int32Array(ArrayValue<i32>),
    FloatArray(ArrayValue<f32>),
    DoubleArray(ArrayValue<f64>),
    StringArray(ArrayValue<String>),
    NodeArray(ArrayValue<NodeId>),
}

impl FieldValue {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Bool(_) => FieldKind::Bool,
            FieldValue::Int32(_) => FieldKind::Int32,
            FieldValue::Float(_) => FieldKind::Float,
            FieldValue::Double(_) => FieldKind::Double,
            FieldValue::String(_) => FieldKind::String,
            FieldValue::Node(_) => FieldKind::Node,
            FieldValue::BoolArray(_) => FieldKind::BoolArray,
            FieldValue::Int32Array(_) => FieldKind::Int32Array,
            FieldValue::FloatArray(_) => FieldKind::FloatArray,
            FieldValue::DoubleArray(_) => FieldKind::DoubleArray,
            FieldValue::StringArray(_) => FieldKind::StringArray,
            FieldValue::NodeArray(_) => FieldKind::NodeArray,
        }
    }

    /// Zero value of the right shape for a field type.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::SFRotation => FieldValue::floats(vec![0.0, 0.0, 1.0, 0.0]),
            t if t.is_fixed_tuple() => FieldValue::floats(vec![0.0; t.components()]),
            t => match t.kind() {
                FieldKind::Bool => FieldValue::Bool(false),
                FieldKind::Int32 => FieldValue::Int32(0),
                FieldKind::Float => FieldValue::Float(0.0),
                FieldKind::Double => FieldValue::Double(0.0),
                FieldKind::String => FieldValue::String(String::new()),
                FieldKind::Node => FieldValue::Node(None),
                FieldKind::BoolArray => FieldValue::BoolArray(ArrayValue::empty()),
                FieldKind::Int32Array => FieldValue::Int32Array(ArrayValue::empty()),
                FieldKind::FloatArray => FieldValue::FloatArray(ArrayValue::empty()),
                FieldKind::DoubleArray => FieldValue::DoubleArray(ArrayValue::empty()),
                FieldKind::StringArray => FieldValue::StringArray(ArrayValue::empty()),
                FieldKind::NodeArray => FieldValue::NodeArray(ArrayValue::empty()),
            },
        }
    }

    /// Number of valid scalar elements. Single values count as one.
    pub fn valid_count(&self) -> usize {
        match self {
            FieldValue::BoolArray(a) => a.count(),
            FieldValue::Int32Array(a) => a.count(),
            FieldValue::FloatArray(a) => a.count(),
            FieldValue::DoubleArray(a) => a.count(),
            FieldValue::StringArray(a) => a.count(),
            FieldValue::NodeArray(a) => a.count(),
            _ => 1,
        }
    }

    pub fn floats(values: Vec<f32>) -> Self {
        FieldValue::FloatArray(ArrayValue::new(values))
    }

    pub fn ints(values: Vec<i32>) -> Self {
        FieldValue::Int32Array(ArrayValue::new(values))
    }

    pub fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        FieldValue::StringArray(ArrayValue::new(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    pub fn nodes(values: Vec<NodeId>) -> Self {
        FieldValue::NodeArray(ArrayValue::new(values))
    }

    pub fn rotation(axis: Vec3, angle: f32) -> Self {
        FieldValue::floats(vec![axis.x, axis.y, axis.z, angle])
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) => Some(v),
            _ => None,
        }
    }

    /// The referenced node of an `SFNode` value; `None` for null or other kinds.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            FieldValue::Node(v) => *v,
            _ => None,
        }
    }

    pub fn as_bool_slice(&self) -> Option<&[bool]> {
        match self {
            FieldValue::BoolArray(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_i32_slice(&self) -> Option<&[i32]> {
        match self {
            FieldValue::Int32Array(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_f32_slice(&self) -> Option<&[f32]> {
        match self {
            FieldValue::FloatArray(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_f64_slice(&self) -> Option<&[f64]> {
        match self {
            FieldValue::DoubleArray(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_string_slice(&self) -> Option<&[String]> {
        match self {
            FieldValue::StringArray(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_node_slice(&self) -> Option<&[NodeId]> {
        match self {
            FieldValue::NodeArray(a) => Some(a.as_slice()),
            _ => None,
        }
    }

    pub fn as_vec2(&self) -> Option<Vec2> {
        match self.as_f32_slice()? {
            [x, y] => Some(Vec2::new(*x, *y)),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self.as_f32_slice()? {
            [x, y, z] => Some(Vec3::new(*x, *y, *z)),
            _ => None,
        }
    }

    pub fn as_vec4(&self) -> Option<Vec4> {
        match self.as_f32_slice()? {
            [x, y, z, w] => Some(Vec4::new(*x, *y, *z, *w)),
            _ => None,
        }
    }

    /// Every node referenced by this value, in order.
    pub fn node_refs(&self) -> Vec<NodeId> {
        match self {
            FieldValue::Node(Some(id)) => vec![*id],
            FieldValue::NodeArray(a) => a.as_slice().to_vec(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int32(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Float(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Double(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<NodeId> for FieldValue {
    fn from(value: NodeId) -> Self {
        FieldValue::Node(Some(value))
    }
}

impl From<Option<NodeId>> for FieldValue {
    fn from(value: Option<NodeId>) -> Self {
        FieldValue::Node(value)
    }
}

impl From<Vec<bool>> for FieldValue {
    fn from(value: Vec<bool>) -> Self {
        FieldValue::BoolArray(ArrayValue::new(value))
    }
}

impl From<Vec<i32>> for FieldValue {
    fn from(value: Vec<i32>) -> Self {
        FieldValue::ints(value)
    }
}

impl From<Vec<f32>> for FieldValue {
    fn from(value: Vec<f32>) -> Self {
        FieldValue::floats(value)
    }
}

impl From<Vec<f64>> for FieldValue {
    fn from(value: Vec<f64>) -> Self {
        FieldValue::DoubleArray(ArrayValue::new(value))
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::StringArray(ArrayValue::new(value))
    }
}

impl From<Vec<NodeId>> for FieldValue {
    fn from(value: Vec<NodeId>) -> Self {
        FieldValue::nodes(value)
    }
}

impl From<Vec2> for FieldValue {
    fn from(value: Vec2) -> Self {
        FieldValue::floats(value.to_array().to_vec())
    }
}

impl From<Vec3> for FieldValue {
    fn from(value: Vec3) -> Self {
        FieldValue::floats(value.to_array().to_vec())
    }
}

impl From<Vec4> for FieldValue {
    fn from(value: Vec4) -> Self {
        FieldValue::floats(value.to_array().to_vec())
    }
}

impl From<Vec<Vec3>> for FieldValue {
    fn from(value: Vec<Vec3>) -> Self {
        FieldValue::floats(value.iter().flat_map(|v| v.to_array()).collect())
    }
}

impl From<mint::Vector2<f32>> for FieldValue {
    fn from(value: mint::Vector2<f32>) -> Self {
        Vec2::from(value).into()
    }
}

impl From<mint::Vector3<f32>> for FieldValue {
    fn from(value: mint::Vector3<f32>) -> Self {
        Vec3::from(value).into()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn list<T>(
            f: &mut fmt::Formatter<'_>,
            items: &[T],
            each: impl Fn(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
        ) -> fmt::Result {
            f.write_str("[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                each(f, item)?;
            }
            f.write_str("]")
        }

        match self {
            FieldValue::Bool(v) => f.write_str(if *v { "TRUE" } else { "FALSE" }),
            FieldValue::Int32(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Double(v) => write!(f, "{v}"),
            FieldValue::String(v) => write!(f, "{v:?}"),
            FieldValue::Node(Some(id)) => write!(f, "{id:?}"),
            FieldValue::Node(None) => f.write_str("NULL"),
            FieldValue::BoolArray(a) => list(f, a.as_slice(), |f, v| {
                f.write_str(if *v { "TRUE" } else { "FALSE" })
            }),
            FieldValue::Int32Array(a) => list(f, a.as_slice(), |f, v| write!(f, "{v}")),
            FieldValue::FloatArray(a) => list(f, a.as_slice(), |f, v| write!(f, "{v}")),
            FieldValue::DoubleArray(a) => list(f, a.as_slice(), |f, v| write!(f, "{v}")),
            FieldValue::StringArray(a) => list(f, a.as_slice(), |f, v| write!(f, "{v:?}")),
            FieldValue::NodeArray(a) => list(f, a.as_slice(), |f, v| write!(f, "{v:?}")),
        }
    }
}
