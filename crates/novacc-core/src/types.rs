//! The global type registry (spec §3.3).
//!
//! `TypeIndex` is a stable 32-bit identifier; `TypeRegistry` is the
//! process-wide, append-only table it indexes into. Struct layout
//! invariants (`sum(member.size + padding) == total_size`, disjoint base
//! and member offsets) are enforced by [`TypeRegistry::define_struct`]
//! rather than trusted from callers.

use crate::interner::StringHandle;
use std::fmt;

/// Stable identifier into the global [`TypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(pub u32);

/// The base kind of a type, independent of qualifiers/pointer depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Float,
    Double,
    LongDouble,
    Struct,
    Enum,
    Auto,
    FunctionPointer,
    UserDefined,
}

impl Type {
    /// Natural (x86-64 System V / Windows, common subset) size in bytes for
    /// scalar builtins; struct/enum/function-pointer/user-defined sizes come
    /// from the registry entry instead.
    pub fn builtin_size(self) -> Option<u32> {
        use Type::*;
        Some(match self {
            Void => 0,
            Bool | Char | SignedChar | UnsignedChar => 1,
            Short | UnsignedShort => 2,
            Int | UnsignedInt | Float => 4,
            Long | UnsignedLong => 8,
            LongLong | UnsignedLongLong | Double => 8,
            LongDouble => 16,
            FunctionPointer => 8,
            Struct | Enum | Auto | UserDefined => return None,
        })
    }

    pub fn builtin_alignment(self) -> Option<u32> {
        self.builtin_size().map(|s| s.max(1))
    }

    pub fn is_signed_integral(self) -> bool {
        matches!(
            self,
            Type::Char | Type::SignedChar | Type::Short | Type::Int | Type::Long | Type::LongLong
        )
    }

    pub fn is_unsigned_integral(self) -> bool {
        matches!(
            self,
            Type::UnsignedChar
                | Type::UnsignedShort
                | Type::UnsignedInt
                | Type::UnsignedLong
                | Type::UnsignedLongLong
                | Type::Bool
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, Type::Float | Type::Double | Type::LongDouble)
    }

    pub fn is_arithmetic(self) -> bool {
        self.is_signed_integral() || self.is_unsigned_integral() || self.is_floating()
    }
}

/// `None`/`Signed`/`Unsigned` qualifier written on a builtin integral type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeQualifier {
    None,
    Signed,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    None,
    LValue,
    RValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CvQualifier {
    pub is_const: bool,
    pub is_volatile: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerLevel {
    pub cv: CvQualifier,
}

/// Full declarator-level type specifier, as produced by the parser for a
/// declaration (spec §3.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeSpecifierNode {
    pub base: Type,
    pub qualifier: TypeQualifier,
    pub size_in_bits: u32,
    pub pointer_levels: Vec<PointerLevel>,
    pub ref_kind: RefKind,
    pub referent_cv: CvQualifier,
    pub array_dims: Vec<Option<u64>>,
    pub type_index: Option<TypeIndex>,
    /// Set when this specifier's base name is an unresolved identifier that
    /// matches a template type parameter in scope (spec §4.3 dependent
    /// types); the template engine substitutes it at instantiation time.
    pub template_param_name: Option<StringHandle>,
}

impl TypeSpecifierNode {
    pub fn scalar(base: Type) -> Self {
        let size_in_bits = base.builtin_size().unwrap_or(0) * 8;
        TypeSpecifierNode {
            base,
            qualifier: TypeQualifier::None,
            size_in_bits,
            pointer_levels: Vec::new(),
            ref_kind: RefKind::None,
            referent_cv: CvQualifier::default(),
            array_dims: Vec::new(),
            type_index: None,
            template_param_name: None,
        }
    }

    pub fn is_pointer(&self) -> bool {
        !self.pointer_levels.is_empty()
    }

    pub fn is_reference(&self) -> bool {
        self.ref_kind != RefKind::None
    }

    pub fn is_array(&self) -> bool {
        !self.array_dims.is_empty()
    }

    pub fn pointer_depth(&self) -> usize {
        self.pointer_levels.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Protected,
    Private,
}

#[derive(Debug, Clone)]
pub struct MemberInfo {
    pub name: StringHandle,
    pub ty: TypeSpecifierNode,
    pub offset: u32,
    pub size: u32,
    pub access: Access,
    /// Brace-or-equal default member initializer, stored as opaque AST
    /// reference (crate-generic u32 so novacc-core has no AST dependency).
    pub default_initializer: Option<u32>,
    pub is_reference: bool,
}

#[derive(Debug, Clone)]
pub struct StaticMemberInfo {
    pub name: StringHandle,
    pub ty: TypeSpecifierNode,
    pub access: Access,
    pub constexpr_initializer: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberFunctionKind {
    Constructor,
    Destructor,
    Conversion,
    Regular,
    Virtual,
    Operator,
}

#[derive(Debug, Clone)]
pub struct MemberFunctionInfo {
    pub name: StringHandle,
    pub kind: MemberFunctionKind,
    pub ast_node: u32,
    pub vtable_slot: Option<u32>,
    pub access: Access,
}

#[derive(Debug, Clone)]
pub struct BaseClassInfo {
    pub type_index: TypeIndex,
    pub offset: u32,
    pub access: Access,
    pub is_virtual: bool,
}

/// Registry entry payload for a `struct`/`class`.
#[derive(Debug, Clone, Default)]
pub struct StructTypeInfo {
    pub members: Vec<MemberInfo>,
    pub static_members: Vec<StaticMemberInfo>,
    pub member_functions: Vec<MemberFunctionInfo>,
    pub bases: Vec<BaseClassInfo>,
    pub has_vtable: bool,
    pub is_abstract: bool,
    pub needs_default_ctor: bool,
    pub default_ctor_deleted: bool,
    pub has_default_member_inits: bool,
    pub total_size: u32,
    pub alignment: u32,
    pub pack_alignment: Option<u32>,
}

impl StructTypeInfo {
    /// Validates the layout invariants from spec §3.3. Called once layout
    /// has been fully computed (all members/bases placed).
    pub fn validate_layout(&self) -> Result<(), LayoutError> {
        if self.alignment == 0 {
            return Err(LayoutError::ZeroAlignment);
        }
        if self.total_size % self.alignment != 0 {
            return Err(LayoutError::SizeNotAlignmentMultiple {
                size: self.total_size,
                alignment: self.alignment,
            });
        }
        let mut spans: Vec<(u32, u32)> = self
            .members
            .iter()
            .map(|m| (m.offset, m.offset + m.size))
            .chain(self.bases.iter().map(|b| {
                // Base subobject size is not tracked separately here; callers
                // that need exact base extents consult the base's own
                // registry entry. We only check start-offset disjointness.
                (b.offset, b.offset + 1)
            }))
            .collect();
        spans.sort_by_key(|s| s.0);
        for w in spans.windows(2) {
            if w[0].1 > w[1].0 {
                return Err(LayoutError::OverlappingMembers {
                    first_end: w[0].1,
                    second_start: w[1].0,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("struct alignment must be nonzero")]
    ZeroAlignment,
    #[error("struct size {size} is not a multiple of alignment {alignment}")]
    SizeNotAlignmentMultiple { size: u32, alignment: u32 },
    #[error("member layout overlaps: member ending at {first_end} overlaps one starting at {second_start}")]
    OverlappingMembers { first_end: u32, second_start: u32 },
}

#[derive(Debug, Clone)]
pub struct Enumerator {
    pub name: StringHandle,
    pub value: i64,
}

#[derive(Debug, Clone)]
pub struct EnumTypeInfo {
    pub underlying: Type,
    pub scoped: bool,
    pub enumerators: Vec<Enumerator>,
}

#[derive(Debug, Clone)]
pub enum TypeInfoPayload {
    None,
    Struct(StructTypeInfo),
    Enum(EnumTypeInfo),
}

#[derive(Debug, Clone)]
pub struct TypeInfo {
    pub name: StringHandle,
    pub kind: Type,
    pub size: u32,
    pub alignment: u32,
    pub payload: TypeInfoPayload,
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Process-wide, append-only registry of [`TypeInfo`] indexed by
/// [`TypeIndex`]. Mirrors [`crate::interner::Interner`]'s append-only
/// contract: entries are never mutated in place once other code may have
/// captured their index, except for late layout completion of a struct
/// under construction (the parser calls `finish_struct_layout`).
#[derive(Default)]
pub struct TypeRegistry {
    entries: Vec<TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define(&mut self, info: TypeInfo) -> TypeIndex {
        let idx = TypeIndex(self.entries.len() as u32);
        self.entries.push(info);
        idx
    }

    /// Reserves a slot for a struct/class whose members are not yet known
    /// (needed so self-referential members like `Node* next` can resolve a
    /// `TypeIndex` before layout is finished).
    pub fn declare_struct(&mut self, name: StringHandle) -> TypeIndex {
        self.define(TypeInfo {
            name,
            kind: Type::Struct,
            size: 0,
            alignment: 1,
            payload: TypeInfoPayload::Struct(StructTypeInfo::default()),
        })
    }

    pub fn finish_struct_layout(
        &mut self,
        index: TypeIndex,
        info: StructTypeInfo,
    ) -> Result<(), LayoutError> {
        info.validate_layout()?;
        let size = info.total_size;
        let alignment = info.alignment;
        let entry = &mut self.entries[index.0 as usize];
        entry.size = size;
        entry.alignment = alignment;
        entry.payload = TypeInfoPayload::Struct(info);
        Ok(())
    }

    pub fn get(&self, index: TypeIndex) -> &TypeInfo {
        &self.entries[index.0 as usize]
    }

    pub fn get_mut(&mut self, index: TypeIndex) -> &mut TypeInfo {
        &mut self.entries[index.0 as usize]
    }

    pub fn struct_info(&self, index: TypeIndex) -> Option<&StructTypeInfo> {
        match &self.get(index).payload {
            TypeInfoPayload::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn enum_info(&self, index: TypeIndex) -> Option<&EnumTypeInfo> {
        match &self.get(index).payload {
            TypeInfoPayload::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `sizeof`/`alignof` for a full type specifier (spec §8 invariant 5):
/// pointers and references report pointer width; arrays multiply element
/// size by the product of dimensions.
pub fn sizeof_type_spec(spec: &TypeSpecifierNode, registry: &TypeRegistry) -> Option<u64> {
    if spec.is_pointer() {
        return Some(8);
    }
    if spec.is_reference() {
        return Some(8);
    }
    let elem = base_sizeof(spec, registry)?;
    if spec.array_dims.is_empty() {
        return Some(elem);
    }
    let mut total = elem;
    for dim in &spec.array_dims {
        total = total.checked_mul((*dim)?)?;
    }
    Some(total)
}

fn base_sizeof(spec: &TypeSpecifierNode, registry: &TypeRegistry) -> Option<u64> {
    if let Some(idx) = spec.type_index {
        return Some(registry.get(idx).size as u64);
    }
    spec.base.builtin_size().map(|s| s as u64)
}

pub fn alignof_type_spec(spec: &TypeSpecifierNode, registry: &TypeRegistry) -> Option<u64> {
    if spec.is_pointer() || spec.is_reference() {
        return Some(8);
    }
    if let Some(idx) = spec.type_index {
        return Some(registry.get(idx).alignment as u64);
    }
    spec.base.builtin_alignment().map(|a| a as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;

    #[test]
    fn sizeof_array_multiplies_dimensions() {
        let registry = TypeRegistry::new();
        let mut spec = TypeSpecifierNode::scalar(Type::Int);
        spec.array_dims = vec![Some(10)];
        assert_eq!(sizeof_type_spec(&spec, &registry), Some(40));
    }

    #[test]
    fn sizeof_pointer_is_pointer_width_regardless_of_pointee() {
        let registry = TypeRegistry::new();
        let mut spec = TypeSpecifierNode::scalar(Type::Char);
        spec.pointer_levels.push(PointerLevel {
            cv: CvQualifier::default(),
        });
        assert_eq!(sizeof_type_spec(&spec, &registry), Some(8));
    }

    #[test]
    fn struct_layout_rejects_overlap() {
        let interner = Interner::new();
        let name = interner.intern("Bad");
        let bad = StructTypeInfo {
            members: vec![
                MemberInfo {
                    name: interner.intern("a"),
                    ty: TypeSpecifierNode::scalar(Type::Int),
                    offset: 0,
                    size: 4,
                    access: Access::Public,
                    default_initializer: None,
                    is_reference: false,
                },
                MemberInfo {
                    name: interner.intern("b"),
                    ty: TypeSpecifierNode::scalar(Type::Int),
                    offset: 2, // overlaps `a`
                    size: 4,
                    access: Access::Public,
                    default_initializer: None,
                    is_reference: false,
                },
            ],
            total_size: 8,
            alignment: 4,
            ..Default::default()
        };
        assert!(bad.validate_layout().is_err());
        let _ = name;
    }

    #[test]
    fn struct_layout_accepts_padded_struct() {
        let interner = Interner::new();
        let good = StructTypeInfo {
            members: vec![MemberInfo {
                name: interner.intern("a"),
                ty: TypeSpecifierNode::scalar(Type::Char),
                offset: 0,
                size: 1,
                access: Access::Public,
                default_initializer: None,
                is_reference: false,
            }],
            total_size: 4,
            alignment: 4,
            ..Default::default()
        };
        assert!(good.validate_layout().is_ok());
    }
}
