// tests/include_assembly.rs

mod common;
use crate::common::init_tracing;

use shrun::config::assemble_includes;
use shrun::errors::ShrunError;
use shrun::fs::MockFileSystem;

#[test]
fn splices_list_and_mapping_includes_preserving_indent() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("options.yml", "max-parallel-commands: 2\n");
    fs.add_file("tasks.yml", "- cmd: echo a\n- cmd: echo b\n");

    let primary = b"config:\n  $include: options.yml\ntasks:\n  - $include tasks.yml\n  - cmd: echo done\n";

    let assembled = assemble_includes(primary, &fs).expect("assembly succeeds");

    let expected = "config:\n\
                    \n\
                    \x20\x20max-parallel-commands: 2\n\
                    \n\
                    tasks:\n\
                    \x20\x20- cmd: echo a\n\
                    \x20\x20- cmd: echo b\n\
                    \n\
                    \x20\x20- cmd: echo done\n";
    assert_eq!(String::from_utf8_lossy(&assembled), expected);
}

#[test]
fn included_files_may_include_further_files() {
    init_tracing();

    let fs = MockFileSystem::new();
    fs.add_file("outer.yml", "- cmd: echo outer\n- $include inner.yml\n");
    fs.add_file("inner.yml", "- cmd: echo inner\n");

    let primary = b"tasks:\n  - $include outer.yml\n";
    let assembled = assemble_includes(primary, &fs).expect("assembly succeeds");
    let text = String::from_utf8_lossy(&assembled);

    assert!(text.contains("- cmd: echo outer"));
    assert!(text.contains("- cmd: echo inner"));
    assert!(!text.contains("$include"));
}

#[test]
fn missing_include_file_is_fatal() {
    init_tracing();

    let fs = MockFileSystem::new();
    let primary = b"tasks:\n  - $include nowhere.yml\n";

    let err = assemble_includes(primary, &fs).unwrap_err();
    match err {
        ShrunError::ConfigError(message) => {
            assert!(message.contains("nowhere.yml"), "message: {}", message);
        }
        other => panic!("expected ConfigError, got {:?}", other),
    }
}

#[test]
fn document_without_directives_is_unchanged() {
    init_tracing();

    let fs = MockFileSystem::new();
    let primary = b"tasks:\n  - cmd: echo untouched\n";

    let assembled = assemble_includes(primary, &fs).expect("assembly succeeds");
    assert_eq!(assembled, primary.to_vec());
}
