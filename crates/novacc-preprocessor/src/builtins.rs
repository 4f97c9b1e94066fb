//! Builtin macros seeded at startup (spec §4.1): `__cplusplus`, size and
//! alignment constants, and the compiler-identity macro set, selectable
//! between MSVC-compatible and GCC/Clang-compatible (`-fgcc-compat`/
//! `-fclang-compat`, spec §6.1).

use crate::macros::{MacroDef, MacroTable};
use novacc_core::CompilerIdentity;

fn object_like(table: &mut MacroTable, name: &str, body: &str) {
    table.define(MacroDef {
        name: name.to_string(),
        is_function_like: false,
        params: Vec::new(),
        is_variadic: false,
        body: body.to_string(),
    });
}

/// Seeds `table` with the builtin macro set for `identity`. `__FILE__`,
/// `__LINE__`, `__DATE__`, `__TIMESTAMP__`, `__COUNTER__` are handled
/// specially inside [`crate::macros::expand_line`] rather than seeded here
/// since their value changes per expansion site.
pub fn seed(table: &mut MacroTable, identity: CompilerIdentity) {
    object_like(table, "__cplusplus", "202002L");
    object_like(table, "__STDC_HOSTED__", "1");
    object_like(table, "__SIZEOF_INT__", "4");
    object_like(table, "__SIZEOF_LONG__", "8");
    object_like(table, "__SIZEOF_LONG_LONG__", "8");
    object_like(table, "__SIZEOF_SHORT__", "2");
    object_like(table, "__SIZEOF_POINTER__", "8");
    object_like(table, "__SIZEOF_FLOAT__", "4");
    object_like(table, "__SIZEOF_DOUBLE__", "8");
    object_like(table, "__SIZEOF_LONG_DOUBLE__", "16");
    object_like(table, "__CHAR_BIT__", "8");
    object_like(table, "__x86_64__", "1");
    object_like(table, "__amd64__", "1");

    match identity {
        CompilerIdentity::Msvc => {
            object_like(table, "_MSC_VER", "1939");
            object_like(table, "_MSC_FULL_VER", "193907000");
            object_like(table, "_WIN32", "1");
            object_like(table, "_WIN64", "1");
            object_like(table, "_M_X64", "100");
            object_like(table, "_MSVC_LANG", "202002L");
        }
        CompilerIdentity::GccClang => {
            object_like(table, "__GNUC__", "13");
            object_like(table, "__GNUC_MINOR__", "2");
            object_like(table, "__GNUC_PATCHLEVEL__", "0");
            object_like(table, "__linux__", "1");
            object_like(table, "__ELF__", "1");
            object_like(table, "__unix__", "1");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_cplusplus_and_identity_macros() {
        let mut table = MacroTable::new();
        seed(&mut table, CompilerIdentity::GccClang);
        assert!(table.is_defined("__cplusplus"));
        assert!(table.is_defined("__GNUC__"));
        assert!(!table.is_defined("_MSC_VER"));
    }
}
