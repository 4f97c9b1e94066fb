//! MSVC and Itanium name mangling (spec §4.6), grounded on
//! `original_source/src/NameMangling.h`'s `appendTypeCode`/CV-qualifier
//! table.

use novacc_ast::{FunctionDecl, FunctionKind};
use novacc_core::{CompilerSession, CvQualifier, ManglingStyle, RefKind, Type, TypeSpecifierNode};

fn cv_code_msvc(cv: CvQualifier) -> char {
    match (cv.is_const, cv.is_volatile) {
        (false, false) => 'A',
        (true, false) => 'B',
        (false, true) => 'C',
        (true, true) => 'D',
    }
}

/// MSVC base-type code table, spec §4.6 / `NameMangling.h::appendTypeCode`.
fn base_type_code_msvc(ty: Type, session: &CompilerSession, type_index: Option<novacc_core::TypeIndex>) -> String {
    match ty {
        Type::Void => "X".into(),
        Type::Bool => "_N".into(),
        Type::Char => "D".into(),
        Type::SignedChar => "C".into(),
        Type::UnsignedChar => "E".into(),
        Type::Short => "F".into(),
        Type::UnsignedShort => "G".into(),
        Type::Int => "H".into(),
        Type::UnsignedInt => "I".into(),
        Type::Long => "J".into(),
        Type::UnsignedLong => "K".into(),
        Type::LongLong => "_J".into(),
        Type::UnsignedLongLong => "_K".into(),
        Type::Float => "M".into(),
        Type::Double => "N".into(),
        Type::LongDouble => "O".into(),
        Type::Struct | Type::UserDefined => {
            if let Some(idx) = type_index {
                let name = session.interner.view(session.types.borrow().get(idx).name);
                format!("V{name}@@")
            } else {
                "H".into()
            }
        }
        Type::Enum => {
            if let Some(idx) = type_index {
                let name = session.interner.view(session.types.borrow().get(idx).name);
                format!("W4{name}@@")
            } else {
                "H".into()
            }
        }
        Type::Auto | Type::FunctionPointer => "H".into(),
    }
}

/// Appends the MSVC type code for `spec`, following `appendTypeCode`'s
/// reference/pointer-prefix-then-base-type order exactly.
pub fn append_type_code_msvc(out: &mut String, spec: &TypeSpecifierNode, session: &CompilerSession) {
    match spec.ref_kind {
        RefKind::LValue => {
            out.push_str("AE");
            out.push(cv_code_msvc(spec.referent_cv));
        }
        RefKind::RValue => {
            out.push_str("$$QE");
            out.push(cv_code_msvc(spec.referent_cv));
        }
        RefKind::None => {}
    }

    let n = spec.pointer_levels.len();
    for (i, level) in spec.pointer_levels.iter().enumerate() {
        let prefix = match (level.cv.is_const, level.cv.is_volatile) {
            (false, false) => "PE",
            (true, false) => "QE",
            (false, true) => "RE",
            (true, true) => "SE",
        };
        out.push_str(prefix);
        let pointee_cv = if i + 1 == n {
            spec.referent_cv
        } else {
            spec.pointer_levels[i + 1].cv
        };
        out.push(cv_code_msvc(pointee_cv));
    }

    out.push_str(&base_type_code_msvc(spec.base, session, spec.type_index));
}

/// `?name@class@@Q[CV]A[return][params]@Z`, spec §4.6.
pub fn mangle_msvc(func: &FunctionDecl, owner_name: Option<&str>, session: &CompilerSession) -> String {
    let name = session.interner.view(func.name).to_string();
    let mut out = String::from("?");
    out.push_str(&name);
    out.push('@');
    if let Some(owner) = owner_name {
        out.push_str(owner);
        out.push('@');
    }
    out.push_str("@@");

    let access_code = match func.kind {
        FunctionKind::Constructor | FunctionKind::Destructor => "Q",
        _ if func.is_static => "S",
        _ => "Q",
    };
    out.push_str(access_code);
    out.push_str(if func.is_virtual { "E" } else { "A" });
    out.push('A');

    match &func.return_type {
        Some(ret) => append_type_code_msvc(&mut out, ret, session),
        None => out.push('X'),
    }

    if func.params.is_empty() {
        out.push_str("XZ");
    } else {
        for p in &func.params {
            append_type_code_msvc(&mut out, &p.ty, session);
        }
        out.push('@');
        out.push('Z');
    }
    out
}

fn base_type_code_itanium(ty: Type) -> Option<&'static str> {
    Some(match ty {
        Type::Void => "v",
        Type::Bool => "b",
        Type::Char => "c",
        Type::SignedChar => "a",
        Type::UnsignedChar => "h",
        Type::Short => "s",
        Type::UnsignedShort => "t",
        Type::Int => "i",
        Type::UnsignedInt => "j",
        Type::Long => "l",
        Type::UnsignedLong => "m",
        Type::LongLong => "x",
        Type::UnsignedLongLong => "y",
        Type::Float => "f",
        Type::Double => "d",
        Type::LongDouble => "e",
        _ => return None,
    })
}

/// Itanium type mangling for one parameter/return type. Substitution
/// compression (the `S_`/`Sn_` back-reference table) is not implemented —
/// every occurrence is written out in full. This only affects symbol
/// length, not uniqueness (spec §8 invariant 4 only requires distinct
/// signatures to mangle distinctly, which full spelling still guarantees).
pub fn append_type_code_itanium(out: &mut String, spec: &TypeSpecifierNode, session: &CompilerSession) {
    for level in spec.pointer_levels.iter().rev() {
        out.push('P');
        if level.cv.is_const {
            out.push('K');
        }
        if level.cv.is_volatile {
            out.push('V');
        }
    }
    match spec.ref_kind {
        RefKind::LValue => out.push('R'),
        RefKind::RValue => out.push('O'),
        RefKind::None => {}
    }
    if spec.referent_cv.is_const && spec.pointer_levels.is_empty() && spec.ref_kind == RefKind::None {
        out.push('K');
    }
    if spec.referent_cv.is_volatile && spec.pointer_levels.is_empty() && spec.ref_kind == RefKind::None {
        out.push('V');
    }

    match base_type_code_itanium(spec.base) {
        Some(code) => out.push_str(code),
        None => {
            if let Some(idx) = spec.type_index {
                let name = session.interner.view(session.types.borrow().get(idx).name);
                out.push_str(&format!("{}{}", name.len(), name));
            } else {
                out.push('i');
            }
        }
    }
}

/// `_Z[len name][params]E`, spec §4.6. Anonymous-namespace members mangle
/// their enclosing namespace as `_GLOBAL__N_1` (not separately modeled
/// here since novacc does not track anonymous-namespace membership on
/// `FunctionDecl` — every encoded name is as if declared at namespace
/// scope with the given owner chain).
pub fn mangle_itanium(
    func: &FunctionDecl,
    owner_names: &[&str],
    session: &CompilerSession,
) -> String {
    let name = session.interner.view(func.name).to_string();
    let mut out = String::from("_Z");

    if owner_names.is_empty() {
        out.push_str(&format!("{}{}", name.len(), name));
    } else {
        out.push('N');
        for owner in owner_names {
            out.push_str(&format!("{}{}", owner.len(), owner));
        }
        out.push_str(&format!("{}{}", name.len(), name));
        out.push('E');
    }

    if func.params.is_empty() {
        out.push('v');
    } else {
        for p in &func.params {
            append_type_code_itanium(&mut out, &p.ty, session);
        }
    }
    out
}

/// Dispatches on the active mangling style (spec §4.6 "selectable
/// independent of platform").
pub fn mangle_function(
    func: &FunctionDecl,
    owner_name: Option<&str>,
    style: ManglingStyle,
    session: &CompilerSession,
) -> String {
    // `main` is never mangled, matching both ABIs' special-case for the
    // entry point.
    if &*session.interner.view(func.name) == "main" && owner_name.is_none() {
        return "main".to_string();
    }
    match style {
        ManglingStyle::Msvc => mangle_msvc(func, owner_name, session),
        ManglingStyle::Itanium => {
            let owners: Vec<&str> = owner_name.into_iter().collect();
            mangle_itanium(func, &owners, session)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use novacc_ast::{FunctionKind, Param};
    use novacc_core::{CompileContext, ObjectFormat};

    fn make_func(session: &CompilerSession, name: &str, params: Vec<TypeSpecifierNode>) -> FunctionDecl {
        FunctionDecl {
            name: session.interner.intern(name),
            kind: FunctionKind::Regular,
            params: params
                .into_iter()
                .enumerate()
                .map(|(i, ty)| Param {
                    name: session.interner.intern(&format!("p{i}")),
                    ty,
                    default_value: None,
                })
                .collect(),
            return_type: Some(TypeSpecifierNode::scalar(Type::Int)),
            is_virtual: false,
            is_static: false,
            is_constexpr: false,
            is_consteval: false,
            body: None,
            owning_struct: None,
        }
    }

    #[test]
    fn main_is_never_mangled() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let f = make_func(&session, "main", vec![]);
        assert_eq!(mangle_function(&f, None, ManglingStyle::Itanium, &session), "main");
        assert_eq!(mangle_function(&f, None, ManglingStyle::Msvc, &session), "main");
    }

    #[test]
    fn itanium_distinguishes_by_parameter_types() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let f_int = make_func(&session, "f", vec![TypeSpecifierNode::scalar(Type::Int)]);
        let f_double = make_func(&session, "f", vec![TypeSpecifierNode::scalar(Type::Double)]);
        let m_int = mangle_itanium(&f_int, &[], &session);
        let m_double = mangle_itanium(&f_double, &[], &session);
        assert_ne!(m_int, m_double);
        assert_eq!(m_int, "_Z1fi");
        assert_eq!(m_double, "_Z1fd");
    }

    #[test]
    fn mangling_is_stable_across_calls() {
        let session = CompilerSession::new(CompileContext::new(ObjectFormat::Elf));
        let f = make_func(&session, "g", vec![TypeSpecifierNode::scalar(Type::Bool)]);
        let a = mangle_itanium(&f, &[], &session);
        let b = mangle_itanium(&f, &[], &session);
        assert_eq!(a, b);
    }
}
