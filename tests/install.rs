// tests/install.rs

//! Integration tests for installing binary packages into a target root
//! and converging roots onto their world set.

mod common;

use common::{
    index, installed, setup_workspace, write_binpkg, write_spec, RecordingInstaller,
    RecordingRunner,
};
use std::fs;
use x10::db::{paths, PackageDatabase};
use x10::install::{BinpkgInstaller, Installer};
use x10::planner::{self, PackageOperation};
use x10::resolver::Resolver;
use x10::{world as world_set, Error};

const HELLO_SPEC: &str = r#"
package:
  meta:
    name: hello
    version: "2.12"
  depends:
    run: ["glibc"]
  triggerdata:
    command:
      script: ldconfig
"#;

const GLIBC_SPEC: &str = r#"
package:
  meta:
    name: glibc
    version: "2.39"
"#;

fn setup_hello() -> (tempfile::TempDir, x10::Context) {
    let (temp_dir, ctx) = setup_workspace();
    write_spec(&ctx, "hello", HELLO_SPEC);
    write_spec(&ctx, "glibc", GLIBC_SPEC);
    write_binpkg(
        &ctx,
        "hello-2.12_0",
        &[
            ("usr/bin/hello", "#!/bin/sh\necho hello\n"),
            ("usr/share/doc/hello/README", "hello"),
        ],
        Some(&["glibc"]),
    );
    write_binpkg(&ctx, "glibc-2.39_0", &[("usr/lib/libc.so.6", "elf")], Some(&[]));
    index(&ctx);
    (temp_dir, ctx)
}

#[test]
fn test_install_copies_tree_and_runs_triggers() {
    let (_temp_dir, ctx) = setup_hello();
    let root = ctx.target_root();
    let contents = PackageDatabase::for_root(root).read().unwrap();
    let record = contents.get("hello-2.12_0").unwrap();

    let runner = RecordingRunner::default();
    let installer = BinpkgInstaller::new(&ctx, &runner);
    installer.install(record, root).unwrap();

    assert_eq!(
        fs::read_to_string(root.join("usr/bin/hello")).unwrap(),
        "#!/bin/sh\necho hello\n"
    );
    assert!(root.join("usr/share/doc/hello/README").is_file());
    assert!(!root.join("generated-depends").exists());
    assert!(!paths::install_tmp_dir(root, "hello-2.12_0").exists());

    assert_eq!(runner.commands(), vec!["ldconfig"]);
    assert_eq!(installed(root), vec!["hello-2.12_0"]);

    // Installing again is a no-op
    installer.install(record, root).unwrap();
    assert_eq!(runner.scripts.borrow().len(), 1);
}

#[test]
fn test_install_replaces_existing_files() {
    let (_temp_dir, ctx) = setup_hello();
    let root = ctx.target_root();
    fs::create_dir_all(root.join("usr/bin")).unwrap();
    fs::write(root.join("usr/bin/hello"), "old").unwrap();
    fs::write(root.join("usr/bin/other"), "keep").unwrap();

    let contents = PackageDatabase::for_root(root).read().unwrap();
    let runner = RecordingRunner::default();
    BinpkgInstaller::new(&ctx, &runner)
        .install(contents.get("hello-2.12_0").unwrap(), root)
        .unwrap();

    assert!(fs::read_to_string(root.join("usr/bin/hello")).unwrap().contains("echo hello"));
    assert_eq!(fs::read_to_string(root.join("usr/bin/other")).unwrap(), "keep");
}

#[test]
fn test_failed_trigger_leaves_package_unmarked() {
    let (_temp_dir, ctx) = setup_hello();
    let root = ctx.target_root();
    let contents = PackageDatabase::for_root(root).read().unwrap();

    let runner = RecordingRunner {
        fail_on: Some("ldconfig".to_string()),
        ..RecordingRunner::default()
    };
    let err = BinpkgInstaller::new(&ctx, &runner)
        .install(contents.get("hello-2.12_0").unwrap(), root)
        .unwrap_err();

    match err {
        Error::TriggerError { name, .. } => assert_eq!(name, "command"),
        other => panic!("unexpected error: {}", other),
    }
    assert!(root.join("usr/bin/hello").is_file());
    assert!(installed(root).is_empty());
}

#[test]
fn test_remove_deletes_files_and_empty_dirs() {
    let (_temp_dir, ctx) = setup_hello();
    let root = ctx.target_root();
    let contents = PackageDatabase::for_root(root).read().unwrap();
    let runner = RecordingRunner::default();
    let installer = BinpkgInstaller::new(&ctx, &runner);

    installer.install(contents.get("glibc-2.39_0").unwrap(), root).unwrap();
    installer.install(contents.get("hello-2.12_0").unwrap(), root).unwrap();
    fs::write(root.join("usr/share/doc/hello/NOTES"), "local").unwrap();
    fs::remove_file(root.join("usr/share/doc/hello/README")).unwrap();

    installer.remove(contents.get("hello-2.12_0").unwrap(), root).unwrap();

    assert!(!root.join("usr/bin/hello").exists());
    assert!(!root.join("usr/bin").exists());
    // Holds a file the package did not ship
    assert!(root.join("usr/share/doc/hello/NOTES").is_file());
    // Shared with glibc
    assert!(root.join("usr/lib/libc.so.6").is_file());
    assert_eq!(installed(root), vec!["glibc-2.39_0"]);
}

#[test]
fn test_converge_installs_closure_in_order() {
    let (_temp_dir, ctx) = setup_hello();
    let root = ctx.target_root();
    let contents = PackageDatabase::for_root(root).read().unwrap();

    let runner = RecordingRunner::default();
    let installer = BinpkgInstaller::new(&ctx, &runner);
    let wanted = world_set::add_to_world(&contents, root, "hello").unwrap();
    assert!(common::world(root).is_empty());

    let operations = world_set::converge(&ctx, &installer, root, &wanted).unwrap();
    assert_eq!(
        operations,
        vec![
            PackageOperation::install("glibc-2.39_0"),
            PackageOperation::install("hello-2.12_0"),
        ]
    );
    assert_eq!(installed(root), vec!["glibc-2.39_0", "hello-2.12_0"]);
    assert_eq!(common::world(root), vec!["hello-2.12_0"]);
    assert!(root.join("usr/lib/libc.so.6").is_file());
}

#[test]
fn test_install_plan_does_not_touch_root() {
    let (_temp_dir, ctx) = setup_hello();
    let root = ctx.target_root();
    let contents = PackageDatabase::for_root(root).read().unwrap();

    let wanted = world_set::add_to_world(&contents, root, "hello").unwrap();
    let resolver = Resolver::new(&contents, true);
    let operations = planner::plan(&resolver, root, &wanted).unwrap();

    assert_eq!(operations.len(), 2);
    assert!(installed(root).is_empty());
    assert!(common::world(root).is_empty());
    assert!(!root.join("usr/bin/hello").exists());
}

#[test]
fn test_reset_removes_everything_but_base() {
    let (_temp_dir, mut ctx) = setup_hello();
    ctx.config.build.base_package = "glibc".to_string();
    let root = ctx.target_root().to_path_buf();

    let installer = RecordingInstaller::default();
    let contents = PackageDatabase::for_root(&root).read().unwrap();
    let wanted = world_set::add_to_world(&contents, &root, "hello").unwrap();
    world_set::converge(&ctx, &installer, &root, &wanted).unwrap();

    let operations = world_set::reset(&ctx, &installer, &root).unwrap();
    assert_eq!(operations, vec![PackageOperation::remove("hello-2.12_0")]);
    assert_eq!(installed(&root), vec!["glibc-2.39_0"]);
    assert_eq!(common::world(&root), vec!["glibc-2.39_0"]);
}

#[test]
fn test_install_unknown_atom() {
    let (_temp_dir, ctx) = setup_hello();
    let contents = PackageDatabase::for_root(ctx.target_root()).read().unwrap();
    let err = world_set::add_to_world(&contents, ctx.target_root(), "nope").unwrap_err();
    assert!(matches!(err, Error::NotFoundError(_)));
}

#[test]
fn test_install_runs_triggers_of_matching_spec() {
    let (_temp_dir, ctx) = setup_workspace();
    for version in ["3.11", "3.12"] {
        write_spec(
            &ctx,
            &format!("lang/python{}", version),
            &format!(
                "package:\n  meta:\n    name: python\n    version: \"{}\"\n  triggerdata:\n    command:\n      script: echo python {}\n",
                version, version
            ),
        );
    }
    write_binpkg(&ctx, "python-3.11_0", &[("usr/bin/python3.11", "elf")], Some(&[]));
    index(&ctx);

    let root = ctx.target_root();
    let contents = PackageDatabase::for_root(root).read().unwrap();
    let runner = RecordingRunner::default();
    BinpkgInstaller::new(&ctx, &runner)
        .install(contents.get("python-3.11_0").unwrap(), root)
        .unwrap();

    assert_eq!(runner.commands(), vec!["echo python 3.11"]);
    assert!(root.join("usr/bin/python3.11").is_file());
    assert_eq!(installed(root), vec!["python-3.11_0"]);
}
