//! Field definitions: the in-memory description of a binary layout.

use std::sync::Arc;

use serde::Serialize;

use crate::value::Value;

/// Byte order of a field. Inheritable; the effective order of a field is
/// its own override, else the nearest ancestor's, else little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Endian {
    Little,
    Big,
}

/// How a field participates in automatic widget synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Visibility {
    /// Rendered normally.
    Shown,
    /// Hidden unless the application's `show_invisible` flag is on.
    Hidden,
    /// Structural metadata (counts, lengths); shown only under
    /// `show_structure_meta`.
    Metadata,
    /// Shown only while the application runs in debug mode.
    DebugOnly,
}

/// Layout hint for composite frames. Not semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orient {
    Horizontal,
    Vertical,
}

/// Width of an integer-backed field in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    pub fn bytes(self) -> usize {
        match self {
            IntWidth::W8 => 1,
            IntWidth::W16 => 2,
            IntWidth::W32 => 4,
            IntWidth::W64 => 8,
        }
    }

    pub fn bits(self) -> u32 {
        self.bytes() as u32 * 8
    }
}

/// One named bit in a `Bool` mask.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagDef {
    pub name: String,
    pub bit: u32,
    pub tooltip: Option<String>,
}

impl FlagDef {
    pub fn new(name: &str, bit: u32) -> Self {
        Self {
            name: name.to_string(),
            bit,
            tooltip: None,
        }
    }

    #[must_use]
    pub fn tooltip(mut self, text: &str) -> Self {
        self.tooltip = Some(text.to_string());
        self
    }
}

/// One named value of an `Enum` or enum-valued bit field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantDef {
    pub name: String,
    pub value: u64,
    pub tooltip: Option<String>,
}

impl VariantDef {
    pub fn new(name: &str, value: u64) -> Self {
        Self {
            name: name.to_string(),
            value,
            tooltip: None,
        }
    }

    #[must_use]
    pub fn tooltip(mut self, text: &str) -> Self {
        self.tooltip = Some(text.to_string());
        self
    }
}

/// Size of a dynamically sized field: a literal, or a path expression
/// resolved against the parent at parse/serialize time. For arrays the
/// resolved quantity is an element count; for strings a byte length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SizeSpec {
    Fixed(usize),
    Path(String),
}

/// The closed set of field kinds.
///
/// Composite kinds own their children; the codec is a visitor over this
/// variant (no class hierarchies, per the format's design notes).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldKind {
    /// Sequential grouping with no declared size of its own.
    Container { fields: Vec<Arc<FieldDef>> },
    /// Fixed-size ordered record. Children plus padding must cover
    /// exactly `size` bytes.
    Struct {
        size: usize,
        fields: Vec<Arc<FieldDef>>,
    },
    /// Record whose children are bit-ranges inside one backing integer,
    /// assigned LSB-first in declaration order.
    BitStruct {
        width: IntWidth,
        fields: Vec<Arc<FieldDef>>,
    },
    /// Repetition of one element definition.
    Array {
        elem: Arc<FieldDef>,
        count: SizeSpec,
    },
    Int { width: IntWidth, signed: bool },
    Float { double: bool },
    /// Integer interpreted as a mask of named flags.
    Bool {
        width: IntWidth,
        flags: Vec<FlagDef>,
    },
    /// Integer interpreted as one of a named set. Unknown values are
    /// retained, never clipped.
    Enum {
        width: IntWidth,
        variants: Vec<VariantDef>,
    },
    /// Bit-range child of a BitStruct; enum-valued when `variants` is
    /// non-empty.
    BitField {
        bits: u32,
        variants: Vec<VariantDef>,
    },
    /// UTF-8 text, fixed-size (NUL-padded) or externally sized.
    Str { size: SizeSpec },
    /// Seconds since the Unix epoch, unsigned 32-bit.
    Timestamp32,
    /// Dead bytes. Contents are preserved across round-trips.
    Pad { size: usize },
}

impl FieldKind {
    /// Short name used in errors and debug output.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldKind::Container { .. } => "container",
            FieldKind::Struct { .. } => "struct",
            FieldKind::BitStruct { .. } => "bitstruct",
            FieldKind::Array { .. } => "array",
            FieldKind::Int { .. } => "int",
            FieldKind::Float { .. } => "float",
            FieldKind::Bool { .. } => "bool",
            FieldKind::Enum { .. } => "enum",
            FieldKind::BitField { .. } => "bitfield",
            FieldKind::Str { .. } => "string",
            FieldKind::Timestamp32 => "timestamp",
            FieldKind::Pad { .. } => "pad",
        }
    }

    /// Fixed byte size, if this kind has one. `None` for containers,
    /// dynamically sized fields, and bit-range children.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            FieldKind::Struct { size, .. } => Some(*size),
            FieldKind::Int { width, .. } => Some(width.bytes()),
            FieldKind::Float { double } => Some(if *double { 8 } else { 4 }),
            FieldKind::Bool { width, .. } => Some(width.bytes()),
            FieldKind::Enum { width, .. } => Some(width.bytes()),
            FieldKind::BitStruct { width, .. } => Some(width.bytes()),
            FieldKind::Str {
                size: SizeSpec::Fixed(n),
            } => Some(*n),
            FieldKind::Timestamp32 => Some(4),
            FieldKind::Pad { size } => Some(*size),
            FieldKind::Array {
                elem,
                count: SizeSpec::Fixed(n),
            } => elem.kind.fixed_size().map(|e| e * n),
            _ => None,
        }
    }

    /// Children of a composite kind; empty for leaves.
    pub fn children(&self) -> &[Arc<FieldDef>] {
        match self {
            FieldKind::Container { fields }
            | FieldKind::Struct { fields, .. }
            | FieldKind::BitStruct { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self,
            FieldKind::Container { .. }
                | FieldKind::Struct { .. }
                | FieldKind::BitStruct { .. }
                | FieldKind::Array { .. }
        )
    }
}

/// Recognized metadata options attached to a field.
///
/// Every option from the schema language is enumerated here; there is no
/// free-form bag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMeta {
    /// Initial value when the field has no bytes yet.
    pub default: Option<Value>,
    /// Inclusive lower bound. For arrays, a minimum element count.
    pub min: Option<f64>,
    /// Inclusive upper bound.
    pub max: Option<f64>,
    pub visible: Visibility,
    /// When false, the UI must refuse edits regardless of permissions.
    pub editable: bool,
    /// Text displayed above the field.
    pub comment: Option<String>,
    /// Hover help text.
    pub tooltip: Option<String>,
    /// Overrides the internal name in display.
    pub gui_name: Option<String>,
    /// Stable display names for array slots, by position.
    pub name_map: Vec<String>,
    /// Path evaluated inside each array element to yield its label.
    pub dyn_name_path: Option<String>,
    pub orient: Orient,
    /// Byte-order override; inherited from the parent when absent.
    pub endian: Option<Endian>,
}

impl Default for FieldMeta {
    fn default() -> Self {
        Self {
            default: None,
            min: None,
            max: None,
            visible: Visibility::Shown,
            editable: true,
            comment: None,
            tooltip: None,
            gui_name: None,
            name_map: Vec::new(),
            dyn_name_path: None,
            orient: Orient::Vertical,
            endian: None,
        }
    }
}

/// A named field definition: kind plus metadata. Schemas are rooted trees
/// of these; nodes hold shared references back to them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
    pub meta: FieldMeta,
}

fn arcs(fields: Vec<FieldDef>) -> Vec<Arc<FieldDef>> {
    fields.into_iter().map(Arc::new).collect()
}

impl FieldDef {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            meta: FieldMeta::default(),
        }
    }

    pub fn container(name: &str, fields: Vec<FieldDef>) -> Self {
        Self::new(name, FieldKind::Container { fields: arcs(fields) })
    }

    pub fn struct_(name: &str, size: usize, fields: Vec<FieldDef>) -> Self {
        Self::new(
            name,
            FieldKind::Struct {
                size,
                fields: arcs(fields),
            },
        )
    }

    pub fn bit_struct(name: &str, width: IntWidth, fields: Vec<FieldDef>) -> Self {
        Self::new(
            name,
            FieldKind::BitStruct {
                width,
                fields: arcs(fields),
            },
        )
    }

    /// Array with a literal element count.
    pub fn array_fixed(name: &str, elem: FieldDef, count: usize) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                elem: Arc::new(elem),
                count: SizeSpec::Fixed(count),
            },
        )
    }

    /// Array whose element count lives in an earlier integer field.
    pub fn array(name: &str, elem: FieldDef, count_path: &str) -> Self {
        Self::new(
            name,
            FieldKind::Array {
                elem: Arc::new(elem),
                count: SizeSpec::Path(count_path.to_string()),
            },
        )
    }

    pub fn int(name: &str, width: IntWidth) -> Self {
        Self::new(name, FieldKind::Int { width, signed: true })
    }

    pub fn uint(name: &str, width: IntWidth) -> Self {
        Self::new(
            name,
            FieldKind::Int {
                width,
                signed: false,
            },
        )
    }

    pub fn uint8(name: &str) -> Self {
        Self::uint(name, IntWidth::W8)
    }

    pub fn uint16(name: &str) -> Self {
        Self::uint(name, IntWidth::W16)
    }

    pub fn uint32(name: &str) -> Self {
        Self::uint(name, IntWidth::W32)
    }

    pub fn int16(name: &str) -> Self {
        Self::int(name, IntWidth::W16)
    }

    pub fn int32(name: &str) -> Self {
        Self::int(name, IntWidth::W32)
    }

    pub fn float32(name: &str) -> Self {
        Self::new(name, FieldKind::Float { double: false })
    }

    pub fn float64(name: &str) -> Self {
        Self::new(name, FieldKind::Float { double: true })
    }

    pub fn bool_(name: &str, width: IntWidth, flags: Vec<FlagDef>) -> Self {
        Self::new(name, FieldKind::Bool { width, flags })
    }

    pub fn bool32(name: &str, flags: Vec<FlagDef>) -> Self {
        Self::bool_(name, IntWidth::W32, flags)
    }

    pub fn enum_(name: &str, width: IntWidth, variants: Vec<VariantDef>) -> Self {
        Self::new(name, FieldKind::Enum { width, variants })
    }

    pub fn enum32(name: &str, variants: Vec<VariantDef>) -> Self {
        Self::enum_(name, IntWidth::W32, variants)
    }

    pub fn bit_field(name: &str, bits: u32) -> Self {
        Self::new(
            name,
            FieldKind::BitField {
                bits,
                variants: Vec::new(),
            },
        )
    }

    pub fn bit_enum(name: &str, bits: u32, variants: Vec<VariantDef>) -> Self {
        Self::new(name, FieldKind::BitField { bits, variants })
    }

    /// Fixed-size UTF-8 string, NUL-padded on write.
    pub fn str_fixed(name: &str, size: usize) -> Self {
        Self::new(
            name,
            FieldKind::Str {
                size: SizeSpec::Fixed(size),
            },
        )
    }

    /// String whose byte length lives in an earlier integer field.
    pub fn str_sized(name: &str, size_path: &str) -> Self {
        Self::new(
            name,
            FieldKind::Str {
                size: SizeSpec::Path(size_path.to_string()),
            },
        )
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, FieldKind::Timestamp32)
    }

    pub fn pad(size: usize) -> Self {
        Self::new("pad", FieldKind::Pad { size })
    }

    // Chainable metadata setters. These consume and return self so format
    // definitions read declaratively.

    #[must_use]
    pub fn default_value(mut self, v: impl Into<Value>) -> Self {
        self.meta.default = Some(v.into());
        self
    }

    #[must_use]
    pub fn min(mut self, v: f64) -> Self {
        self.meta.min = Some(v);
        self
    }

    #[must_use]
    pub fn max(mut self, v: f64) -> Self {
        self.meta.max = Some(v);
        self
    }

    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.meta.visible = Visibility::Hidden;
        self
    }

    #[must_use]
    pub fn metadata_only(mut self) -> Self {
        self.meta.visible = Visibility::Metadata;
        self
    }

    #[must_use]
    pub fn debug_only(mut self) -> Self {
        self.meta.visible = Visibility::DebugOnly;
        self
    }

    #[must_use]
    pub fn uneditable(mut self) -> Self {
        self.meta.editable = false;
        self
    }

    #[must_use]
    pub fn comment(mut self, text: &str) -> Self {
        self.meta.comment = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn tooltip(mut self, text: &str) -> Self {
        self.meta.tooltip = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn gui_name(mut self, text: &str) -> Self {
        self.meta.gui_name = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn name_map(mut self, names: &[&str]) -> Self {
        self.meta.name_map = names.iter().map(|s| s.to_string()).collect();
        self
    }

    #[must_use]
    pub fn dyn_name(mut self, path: &str) -> Self {
        self.meta.dyn_name_path = Some(path.to_string());
        self
    }

    #[must_use]
    pub fn horizontal(mut self) -> Self {
        self.meta.orient = Orient::Horizontal;
        self
    }

    #[must_use]
    pub fn endian(mut self, endian: Endian) -> Self {
        self.meta.endian = Some(endian);
        self
    }

    /// Looks up a named flag's bit index on a `Bool` field.
    pub fn flag_bit(&self, flag: &str) -> Option<u32> {
        match &self.kind {
            FieldKind::Bool { flags, .. } => {
                flags.iter().find(|f| f.name == flag).map(|f| f.bit)
            }
            _ => None,
        }
    }

    /// Looks up the variant name for an enum value, if mapped.
    pub fn variant_name(&self, value: u64) -> Option<&str> {
        let variants = match &self.kind {
            FieldKind::Enum { variants, .. } => variants,
            FieldKind::BitField { variants, .. } => variants,
            _ => return None,
        };
        variants
            .iter()
            .find(|v| v.value == value)
            .map(|v| v.name.as_str())
    }

    /// Looks up a variant's value by name.
    pub fn variant_value(&self, name: &str) -> Option<u64> {
        let variants = match &self.kind {
            FieldKind::Enum { variants, .. } => variants,
            FieldKind::BitField { variants, .. } => variants,
            _ => return None,
        };
        variants.iter().find(|v| v.name == name).map(|v| v.value)
    }
}
