//! End-to-end scenarios, gated behind the `project-util` feature.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use drydock::drivers::c::CDriver;
use drydock::project_util::TempTree;
use drydock::rule::TargetSpec;
use drydock::{build_tree, Config, Driver, DriverApi, DriverRegistry, MatchProgram, Project};

/// Writes a tiny shell script standing in for `cc` on the `PATH`, copying
/// its first non-flag input to the `-o` target. Good enough to exercise the
/// rule graph's staleness/action wiring without a real toolchain installed.
fn install_cc_stub(dir: &Path) {
    let script = dir.join("cc");
    fs::write(
        &script,
        "#!/bin/sh\nout=\"\"\nfirst_in=\"\"\nwhile [ $# -gt 0 ]; do\n  case \"$1\" in\n    -o) out=\"$2\"; shift 2;;\n    -c) shift;;\n    -l*) shift;;\n    *) if [ -z \"$first_in\" ]; then first_in=\"$1\"; fi; shift;;\n  esac\ndone\ncp \"$first_in\" \"$out\"\n",
    )
    .unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).unwrap();
    }
    let path = std::env::var_os("PATH").unwrap_or_default();
    let mut paths: Vec<PathBuf> = std::env::split_paths(&path).collect();
    paths.insert(0, dir.to_path_buf());
    std::env::set_var("PATH", std::env::join_paths(paths).unwrap());
}

fn c_registry() -> DriverRegistry {
    let mut registry = DriverRegistry::new();
    registry.register(Box::new(CDriver));
    registry
}

/// Scenario 1: a single-source application builds one object and one
/// artefact.
#[test]
fn hello_project_builds_one_object_and_one_artefact() {
    let tree = TempTree::new().unwrap();
    install_cc_stub(tree.root());
    tree.write("src/main.c", "int main(void) { return 0; }\n").unwrap();
    tree.manifest(".", r#"{"id": "hi", "type": "application", "language": "c"}"#).unwrap();

    let registry = c_registry();
    let config = Config::debug(tree.root().join("home"));
    let (crawler, report) = build_tree(tree.root(), &registry, &config, &HashSet::new()).unwrap();

    assert!(report.is_success(), "{report:?}");
    assert!(crawler.project("hi").unwrap().built);
    assert!(tree.root().join(drydock::drivers::c::CACHE_DIR).join("src/main.o").exists());
    assert!(tree.root().join("hi").exists());
}

/// Scenario 2: `libfoo` (package, no dependencies) builds before `app`
/// (application, `use: ["libfoo"]`), and both artefacts are produced.
/// The worked-example C driver does not thread `-l`/include-path flags
/// across projects (out of scope, see SPEC_FULL.md §4.4) — this exercises
/// dependency-ordered building, not cross-project link-line construction.
#[test]
fn two_project_chain_builds_in_dependency_order() {
    let tree = TempTree::new().unwrap();
    install_cc_stub(tree.root());
    tree.write("libfoo/src/foo.c", "int foo(void) { return 0; }\n").unwrap();
    tree.manifest("libfoo", r#"{"id": "libfoo", "type": "package", "language": "c"}"#).unwrap();
    tree.write("app/src/main.c", "int main(void) { return 0; }\n").unwrap();
    tree.manifest(
        "app",
        r#"{"id": "app", "type": "application", "language": "c", "use": ["libfoo"]}"#,
    )
    .unwrap();

    let registry = c_registry();
    let config = Config::debug(tree.root().join("home"));
    let (crawler, report) = build_tree(tree.root(), &registry, &config, &HashSet::new()).unwrap();

    assert!(report.is_success(), "{report:?}");
    let pos = |id: &str| report.built.iter().position(|b| b == id).unwrap();
    assert!(pos("libfoo") < pos("app"));
    assert!(crawler.project("libfoo").unwrap().built);
    assert!(crawler.project("app").unwrap().built);
}

/// Scenario 3: the glob match suite from spec.md §8.
#[test]
fn glob_match_suite() {
    let m = |expr: &str, path: &str| MatchProgram::compile(expr).unwrap().is_match(path);
    assert!(m("src/**/*.c", "src/a/b.c"));
    assert!(!m("src/*.c", "src/a/b.c"));
    assert!(m("src/*.c,src/**/*.cpp", "src/a/b.cpp"));
    assert!(!m("src/*.c&^src/test_*", "src/test_x.c"));
}

/// Scenario 4: amalgamating a project whose header pulls in a second
/// header, and whose two sources both `#include` the combined header.
#[test]
fn amalgamate_combines_header_and_sources() {
    let tree = TempTree::new().unwrap();
    tree.write("include/internal.h", "int internal(void);\n").unwrap();
    tree.write("include/proj.h", "#include \"internal.h\"\nvoid proj(void);\n").unwrap();
    tree.write("src/a.c", "#include \"proj.h\"\nvoid a(void) {}\n").unwrap();
    tree.write("src/b.c", "#include \"proj.h\"\nvoid b(void) {}\n").unwrap();

    let sources = vec![tree.root().join("src/a.c"), tree.root().join("src/b.c")];
    let (header, source) = drydock::amalgamate::generate(tree.root(), "proj", &sources).unwrap();

    let header_content = fs::read_to_string(header).unwrap();
    assert!(header_content.starts_with("#define PROJ_STATIC\n"));
    assert!(header_content.contains("int internal(void);"));
    assert!(header_content.contains("void proj(void);"));

    let source_content = fs::read_to_string(source).unwrap();
    assert!(source_content.starts_with("#ifndef PROJ_IMPL\n#include \"proj.h\"\n#endif\n"));
    assert!(source_content.contains("void a(void) {}"));
    assert!(source_content.contains("void b(void) {}"));
}

/// Scenario 5: a two-project cycle is reported as blocked, neither side
/// builds.
#[test]
fn cycle_is_rejected() {
    let tree = TempTree::new().unwrap();
    tree.manifest("a", r#"{"id": "a", "type": "package", "language": "rec", "use": ["b"]}"#)
        .unwrap();
    tree.manifest("b", r#"{"id": "b", "type": "package", "language": "rec", "use": ["a"]}"#)
        .unwrap();

    let mut registry = DriverRegistry::new();
    registry.register(Box::new(RecDriver));
    let config = Config::debug(tree.root().join("home"));
    let (crawler, report) = build_tree(tree.root(), &registry, &config, &HashSet::new()).unwrap();

    assert!(!report.is_success());
    assert_eq!(report.cycles, vec!["a".to_string(), "b".to_string()]);
    assert!(!crawler.project("a").unwrap().built);
    assert!(!crawler.project("b").unwrap().built);
}

/// Scenario 6: `a` fails at link, `b` depends on `a` and is blocked (not
/// errored itself), and independent `c` still builds.
#[test]
fn partial_failure_does_not_block_independent_subtree() {
    let tree = TempTree::new().unwrap();
    tree.manifest("a", r#"{"id": "a", "type": "application", "language": "fail"}"#).unwrap();
    tree.write("a/does-not-matter", "").unwrap();
    tree.manifest("b", r#"{"id": "b", "type": "application", "language": "rec", "use": ["a"]}"#)
        .unwrap();
    tree.manifest("c", r#"{"id": "c", "type": "application", "language": "rec"}"#).unwrap();

    let mut registry = DriverRegistry::new();
    registry.register(Box::new(RecDriver));
    registry.register(Box::new(FailingDriver));
    let config = Config::debug(tree.root().join("home"));
    let (crawler, report) = build_tree(tree.root(), &registry, &config, &HashSet::new()).unwrap();

    assert!(report.built.contains(&"c".to_string()));
    assert!(report.failed.contains(&"a".to_string()));
    assert!(report.blocked.contains(&"b".to_string()));
    let b = crawler.project("b").unwrap();
    assert!(!b.built);
    assert!(!b.error);
}

/// A no-op driver that just succeeds, for scenarios that only exercise
/// crawler/orchestrator wiring and don't need a real toolchain.
struct RecDriver;
impl Driver for RecDriver {
    fn id(&self) -> &str {
        "lang.rec"
    }
}

/// Always fails its `ARTEFACT` rule, simulating a link failure.
struct FailingDriver;
impl Driver for FailingDriver {
    fn id(&self) -> &str {
        "lang.fail"
    }
    fn init(&self, api: &mut DriverApi<'_>, _project: &mut Project) -> drydock::Result<()> {
        api.rules.file("SRC", "does-not-matter");
        api.rules.rule(
            "ARTEFACT",
            "SRC",
            TargetSpec::None,
            Box::new(|_sources, _target, _project| {
                Err(drydock::Error::internal("simulated link failure"))
            }),
        );
        Ok(())
    }
}

