//! Shared session state for the `novacc` C++ compiler: the process-wide
//! string interner, type registry, symbol table, template registry, line
//! map, and diagnostic/error taxonomy that the preprocessor, lexer, parser,
//! evaluator, IR lowering, and code generator all share (spec §9).

pub mod config;
pub mod diagnostics;
pub mod interner;
pub mod linemap;
pub mod session;
pub mod symtab;
pub mod templates;
pub mod timing;
pub mod types;

pub use config::{CompileContext, CompilerIdentity, Limits, ManglingStyle, ObjectFormat};
pub use diagnostics::{Diagnostic, ErrorKind, Severity, SourcePos};
pub use interner::{Interner, StringHandle};
pub use linemap::LineMap;
pub use session::CompilerSession;
pub use symtab::{ScopeKind, SymbolTable};
pub use templates::{TemplateRegistry, TemplateTypeArg};
pub use types::{
    Access, BaseClassInfo, CvQualifier, EnumTypeInfo, Enumerator, LayoutError, MemberFunctionInfo,
    MemberFunctionKind, MemberInfo, PointerLevel, RefKind, StaticMemberInfo, StructTypeInfo, Type,
    TypeIndex, TypeInfo, TypeInfoPayload, TypeQualifier, TypeRegistry, TypeSpecifierNode,
};
