//! Template registry (spec §3.6): keyed by `(template-name, [TemplateTypeArg])`,
//! canonicalised to a string key for the mangled-name form and for use as a
//! hash map key.

use crate::interner::StringHandle;
use crate::types::{RefKind, Type};
use indexmap::IndexMap;

/// One template argument: either a type (with qualification/pointer depth/
/// reference kind) or a constant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateTypeArg {
    Type {
        base: Type,
        pointer_depth: u32,
        ref_kind: RefKind,
        is_const: bool,
        /// Set when `base` is `Type::UserDefined`/`Struct`.
        user_defined_name: Option<StringHandle>,
    },
    ValueInt(i64),
    ValueBool(bool),
}

impl TemplateTypeArg {
    /// Canonical string used both as part of the registry key and as the
    /// mangled-name fragment (spec §3.6: `int`, `intP`, `CintR`, `int[10]`).
    pub fn canonical_form(&self, interner: &crate::interner::Interner) -> String {
        match self {
            TemplateTypeArg::Type {
                base,
                pointer_depth,
                ref_kind,
                is_const,
                user_defined_name,
            } => {
                let mut s = String::new();
                if *is_const {
                    s.push('C');
                }
                match base {
                    Type::UserDefined | Type::Struct => {
                        if let Some(name) = user_defined_name {
                            s.push_str(&interner.view(*name));
                        } else {
                            s.push_str("?");
                        }
                    }
                    other => s.push_str(builtin_canonical_name(*other)),
                }
                for _ in 0..*pointer_depth {
                    s.push('P');
                }
                match ref_kind {
                    RefKind::LValue => s.push('R'),
                    RefKind::RValue => s.push_str("RR"),
                    RefKind::None => {}
                }
                s
            }
            TemplateTypeArg::ValueInt(v) => v.to_string(),
            TemplateTypeArg::ValueBool(b) => b.to_string(),
        }
    }
}

fn builtin_canonical_name(ty: Type) -> &'static str {
    match ty {
        Type::Void => "void",
        Type::Bool => "bool",
        Type::Char => "char",
        Type::SignedChar => "signed char",
        Type::UnsignedChar => "unsigned char",
        Type::Short => "short",
        Type::UnsignedShort => "unsigned short",
        Type::Int => "int",
        Type::UnsignedInt => "unsigned int",
        Type::Long => "long",
        Type::UnsignedLong => "unsigned long",
        Type::LongLong => "long long",
        Type::UnsignedLongLong => "unsigned long long",
        Type::Float => "float",
        Type::Double => "double",
        Type::LongDouble => "long double",
        Type::Auto => "auto",
        Type::FunctionPointer => "fnptr",
        Type::Struct | Type::Enum | Type::UserDefined => "?",
    }
}

/// An already-materialised template specialisation: the instantiated AST
/// node handle plus bookkeeping used by the lazy-instantiation queue.
#[derive(Debug, Clone)]
pub struct Instantiation {
    pub ast_node: u32,
    pub fully_instantiated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Key {
    name: StringHandle,
    args: Vec<String>,
}

/// Process-wide registry mapping canonicalised `(name, args)` tuples to
/// their instantiated AST. Materialisation ("miss") is the caller's
/// (`novacc-parser`'s) job; this type only owns the cache and the recursion
/// guard.
#[derive(Default)]
pub struct TemplateRegistry {
    entries: IndexMap<Key, Instantiation>,
    active_stack: Vec<Key>,
    max_active: usize,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template instantiation depth exceeded ({0} active instantiations)")]
    DepthExceeded(usize),
}

impl TemplateRegistry {
    pub fn new() -> Self {
        TemplateRegistry {
            entries: IndexMap::new(),
            active_stack: Vec::new(),
            max_active: 1024,
        }
    }

    pub fn with_max_active(max_active: usize) -> Self {
        TemplateRegistry {
            max_active,
            ..Self::new()
        }
    }

    fn key(
        name: StringHandle,
        args: &[TemplateTypeArg],
        interner: &crate::interner::Interner,
    ) -> Key {
        Key {
            name,
            args: args.iter().map(|a| a.canonical_form(interner)).collect(),
        }
    }

    pub fn lookup(
        &self,
        name: StringHandle,
        args: &[TemplateTypeArg],
        interner: &crate::interner::Interner,
    ) -> Option<&Instantiation> {
        self.entries.get(&Self::key(name, args, interner))
    }

    /// Registers a new instantiation under `(name, args)`, guarding against
    /// runaway recursive instantiation (spec §4.3: capped at 1024 active).
    /// The returned guard must be held for the duration of materialising the
    /// specialisation's members; dropping it pops the recursion stack.
    pub fn begin_instantiation(
        &mut self,
        name: StringHandle,
        args: &[TemplateTypeArg],
        interner: &crate::interner::Interner,
    ) -> Result<InstantiationGuard<'_>, TemplateError> {
        if self.active_stack.len() >= self.max_active {
            return Err(TemplateError::DepthExceeded(self.active_stack.len()));
        }
        let key = Self::key(name, args, interner);
        self.active_stack.push(key);
        Ok(InstantiationGuard { registry: self })
    }

    pub fn finish(
        &mut self,
        name: StringHandle,
        args: &[TemplateTypeArg],
        interner: &crate::interner::Interner,
        instantiation: Instantiation,
    ) {
        let key = Self::key(name, args, interner);
        self.entries.insert(key, instantiation);
    }

    pub fn active_depth(&self) -> usize {
        self.active_stack.len()
    }
}

pub struct InstantiationGuard<'a> {
    registry: &'a mut TemplateRegistry,
}

impl Drop for InstantiationGuard<'_> {
    fn drop(&mut self) {
        self.registry.active_stack.pop();
    }
}

/// Pending member materialisations for lazy template instantiation mode
/// (spec §4.3: only referenced members are instantiated; drains between
/// compilation phases).
#[derive(Default)]
pub struct InstantiationQueue {
    pending: Vec<PendingMember>,
}

#[derive(Debug, Clone)]
pub struct PendingMember {
    pub owning_specialisation: u32,
    pub member_template_node: u32,
}

impl InstantiationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, member: PendingMember) {
        self.pending.push(member);
    }

    pub fn drain(&mut self) -> Vec<PendingMember> {
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interner::Interner;

    #[test]
    fn canonical_form_matches_spec_examples() {
        let interner = Interner::new();
        let int_arg = TemplateTypeArg::Type {
            base: Type::Int,
            pointer_depth: 0,
            ref_kind: RefKind::None,
            is_const: false,
            user_defined_name: None,
        };
        assert_eq!(int_arg.canonical_form(&interner), "int");

        let int_ptr = TemplateTypeArg::Type {
            base: Type::Int,
            pointer_depth: 1,
            ref_kind: RefKind::None,
            is_const: false,
            user_defined_name: None,
        };
        assert_eq!(int_ptr.canonical_form(&interner), "intP");

        let const_int_ref = TemplateTypeArg::Type {
            base: Type::Int,
            pointer_depth: 0,
            ref_kind: RefKind::LValue,
            is_const: true,
            user_defined_name: None,
        };
        assert_eq!(const_int_ref.canonical_form(&interner), "CintR");
    }

    #[test]
    fn same_args_in_different_order_of_encounter_hit_same_entry() {
        let interner = Interner::new();
        let mut registry = TemplateRegistry::new();
        let name = interner.intern("S");
        let args = vec![TemplateTypeArg::ValueInt(4)];
        {
            let _g = registry.begin_instantiation(name, &args, &interner).unwrap();
            registry.finish(
                name,
                &args,
                &interner,
                Instantiation {
                    ast_node: 42,
                    fully_instantiated: true,
                },
            );
        }
        assert_eq!(registry.lookup(name, &args, &interner).unwrap().ast_node, 42);
    }

    #[test]
    fn depth_cap_is_enforced() {
        let interner = Interner::new();
        let mut registry = TemplateRegistry::with_max_active(2);
        let name = interner.intern("S");
        let a1 = vec![TemplateTypeArg::ValueInt(1)];
        let a2 = vec![TemplateTypeArg::ValueInt(2)];
        let a3 = vec![TemplateTypeArg::ValueInt(3)];
        let _g1 = registry.begin_instantiation(name, &a1, &interner).unwrap();
        let _g2 = registry.begin_instantiation(name, &a2, &interner).unwrap();
        assert!(registry.begin_instantiation(name, &a3, &interner).is_err());
    }
}
