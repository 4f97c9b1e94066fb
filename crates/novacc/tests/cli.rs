//! End-to-end CLI scenarios (spec §8 "Concrete end-to-end scenarios"),
//! driving the built `novacc` binary exactly as a caller would: write a
//! translation unit to a temp directory, run the binary, and inspect the
//! exit code / stderr / resulting object file. No linker is invoked, so
//! assertions stop at "a well-formed object with the expected symbol"
//! rather than executing the compiled code.

use assert_cmd::Command;
use object::{Object, ObjectSymbol};
use std::fs;

fn novacc() -> Command {
    Command::cargo_bin("novacc").expect("novacc binary is built")
}

fn write_source(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write source fixture");
    path
}

#[test]
fn compiles_trivial_main_to_an_object_with_a_main_symbol() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "main.cpp", "int main() { return 0; }");
    let out = dir.path().join("main.o");

    novacc().arg(&src).arg("-o").arg(&out).assert().success();

    let bytes = fs::read(&out).expect("object file written");
    let file = object::File::parse(&*bytes).expect("valid object file");
    let has_main = file.symbols().any(|sym| sym.name() == Ok("main") && sym.size() > 0);
    assert!(has_main, "expected a non-empty `main` symbol in the emitted object");
}

#[test]
fn macro_expansion_runs_through_the_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        &dir,
        "macro.cpp",
        "#define DOUBLE(x) ((x) * 2)\nint main() { return DOUBLE(21); }",
    );
    let out = dir.path().join("macro.o");

    novacc().arg(&src).arg("-o").arg(&out).assert().success();
    assert!(out.exists());
}

#[test]
fn constexpr_recursive_static_assert_compiles() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        &dir,
        "fact.cpp",
        "constexpr int fact(int n) { return n <= 1 ? 1 : n * fact(n - 1); }\n\
         static_assert(fact(5) == 120);\n\
         int main() { return 0; }",
    );
    let out = dir.path().join("fact.o");

    novacc().arg(&src).arg("-o").arg(&out).assert().success();
}

#[test]
fn class_template_specialisation_static_assert_compiles() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(
        &dir,
        "tmpl.cpp",
        "template<class T> struct S { static constexpr int v = sizeof(T); };\n\
         static_assert(S<int>::v == 4);\n\
         int main() { return 0; }",
    );
    let out = dir.path().join("tmpl.o");

    novacc().arg(&src).arg("-o").arg(&out).assert().success();
}

#[test]
fn undefined_identifier_reports_file_and_line_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_source(&dir, "bad.cpp", "int main() { return undefined_name; }");
    let out = dir.path().join("bad.o");

    let assert = novacc().arg(&src).arg("-o").arg(&out).assert().failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("error:"), "stderr was: {stderr}");
    assert!(stderr.contains("bad.cpp:1"), "stderr was: {stderr}");
    assert!(!out.exists(), "no object should be written on a failed compile");
}

#[test]
fn include_cycle_without_pragma_once_hits_the_depth_cap() {
    let dir = tempfile::tempdir().unwrap();
    write_source(&dir, "a.h", "#include \"b.h\"\n");
    write_source(&dir, "b.h", "#include \"a.h\"\n");
    let src = write_source(&dir, "cycle.cpp", "#include \"a.h\"\nint main() { return 0; }");
    let out = dir.path().join("cycle.o");

    let assert = novacc().arg(&src).arg("-o").arg(&out).assert().failure();
    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert!(stderr.contains("include depth exceeded"), "stderr was: {stderr}");
}
