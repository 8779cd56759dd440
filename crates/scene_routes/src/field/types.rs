//! Field type tags and access modes.
//!
//! A [`FieldType`] is the content-format tag of a field (`SFVec3f`, `MFNode`, ...). Every tag
//! is stored in one of the closed [`FieldKind`] payload shapes, with a fixed number of
//! components per element for the vector-like tags.
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Direction a field may be read or written through routes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessMode {
    /// Initialised at construction only; never routed.
    Field,
    /// Read/write, emits a change event whenever it is set.
    ExposedField,
    /// Write-only input.
    EventIn,
    /// Read-only output.
    EventOut,
}

impl AccessMode {
    /// Whether a route may originate from a field with this mode.
    #[inline]
    pub fn is_readable(self) -> bool {
        matches!(self, AccessMode::ExposedField | AccessMode::EventOut)
    }

    /// Whether a route may terminate at a field with this mode.
    #[inline]
    pub fn is_writable(self) -> bool {
        matches!(self, AccessMode::ExposedField | AccessMode::EventIn)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            AccessMode::Field => "field",
            AccessMode::ExposedField => "exposedField",
            AccessMode::EventIn => "eventIn",
            AccessMode::EventOut => "eventOut",
        }
    }
}

/// Payload shape of a [`crate::field::FieldValue`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    Int32,
    Float,
    Double,
    String,
    Node,
    BoolArray,
    Int32Array,
    FloatArray,
    DoubleArray,
    StringArray,
    NodeArray,
}

impl FieldKind {
    /// Multi-value cardinality class.
    #[inline]
    pub fn is_array(self) -> bool {
        matches!(
            self,
            FieldKind::BoolArray
                | FieldKind::Int32Array
                | FieldKind::FloatArray
                | FieldKind::DoubleArray
                | FieldKind::StringArray
                | FieldKind::NodeArray
        )
    }

    /// Whether the payload holds node references.
    #[inline]
    pub fn is_node(self) -> bool {
        matches!(self, FieldKind::Node | FieldKind::NodeArray)
    }
}

/// Content-format type tag of a field.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum FieldType {
    SFBool,
    MFBool,
    SFInt32,
    MFInt32,
    SFFloat,
    MFFloat,
    SFDouble,
    MFDouble,
    SFTime,
    MFTime,
    SFString,
    MFString,
    SFNode,
    MFNode,
    SFVec2f,
    MFVec2f,
    SFVec3f,
    MFVec3f,
    SFColor,
    MFColor,
    SFColorRGBA,
    MFColorRGBA,
    SFRotation,
    MFRotation,
}

const ALL_TYPES: [FieldType; 24] = [
    FieldType::SFBool,
    FieldType::MFBool,
    FieldType::SFInt32,
    FieldType::MFInt32,
    FieldType::SFFloat,
    FieldType::MFFloat,
    FieldType::SFDouble,
    FieldType::MFDouble,
    FieldType::SFTime,
    FieldType::MFTime,
    FieldType::SFString,
    FieldType::MFString,
    FieldType::SFNode,
    FieldType::MFNode,
    FieldType::SFVec2f,
    FieldType::MFVec2f,
    FieldType::SFVec3f,
    FieldType::MFVec3f,
    FieldType::SFColor,
    FieldType::MFColor,
    FieldType::SFColorRGBA,
    FieldType::MFColorRGBA,
    FieldType::SFRotation,
    FieldType::MFRotation,
];

impl FieldType {
    /// Storage shape used for values of this type.
    pub fn kind(self) -> FieldKind {
        use FieldType::*;
        match self {
            SFBool => FieldKind::Bool,
            MFBool => FieldKind::BoolArray,
            SFInt32 => FieldKind::Int32,
            MFInt32 => FieldKind::Int32Array,
            SFFloat => FieldKind::Float,
            SFDouble | SFTime => FieldKind::Double,
            MFDouble | MFTime => FieldKind::DoubleArray,
            SFString => FieldKind::String,
            MFString => FieldKind::StringArray,
            SFNode => FieldKind::Node,
            MFNode => FieldKind::NodeArray,
            MFFloat | SFVec2f | MFVec2f | SFVec3f | MFVec3f | SFColor | MFColor | SFColorRGBA
            | MFColorRGBA | SFRotation | MFRotation => FieldKind::FloatArray,
        }
    }

    /// Number of scalar components making up one element.
    pub fn components(self) -> usize {
        use FieldType::*;
        match self {
            SFVec2f | MFVec2f => 2,
            SFVec3f | MFVec3f | SFColor | MFColor => 3,
            SFColorRGBA | MFColorRGBA | SFRotation | MFRotation => 4,
            _ => 1,
        }
    }

    /// Single-valued types whose payload is still an array of fixed length.
    pub fn is_fixed_tuple(self) -> bool {
        use FieldType::*;
        matches!(self, SFVec2f | SFVec3f | SFColor | SFColorRGBA | SFRotation)
    }

    /// Whether the content format treats this as a multi-value (`MF*`) field.
    pub fn is_multi(self) -> bool {
        self.name().starts_with("MF")
    }

    pub fn name(self) -> &'static str {
        use FieldType::*;
        match self {
            SFBool => "SFBool",
            MFBool => "MFBool",
            SFInt32 => "SFInt32",
            MFInt32 => "MFInt32",
            SFFloat => "SFFloat",
            MFFloat => "MFFloat",
            SFDouble => "SFDouble",
            MFDouble => "MFDouble",
            SFTime => "SFTime",
            MFTime => "MFTime",
            SFString => "SFString",
            MFString => "MFString",
            SFNode => "SFNode",
            MFNode => "MFNode",
            SFVec2f => "SFVec2f",
            MFVec2f => "MFVec2f",
            SFVec3f => "SFVec3f",
            MFVec3f => "MFVec3f",
            SFColor => "SFColor",
            MFColor => "MFColor",
            SFColorRGBA => "SFColorRGBA",
            MFColorRGBA => "MFColorRGBA",
            SFRotation => "SFRotation",
            MFRotation => "MFRotation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_TYPES.iter().copied().find(|t| t.name() == name)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
