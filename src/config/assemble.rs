// src/config/assemble.rs

//! `$include` directive splicing.
//!
//! Two fixed line-wise patterns are recognised:
//!
//! ```yaml
//! - $include some/tasks.yml      # list-item form
//! $include: some/options.yml     # mapping-key form
//! ```
//!
//! Each directive is replaced by the referenced file's contents, with every
//! line prefixed by the directive's indentation so the spliced block stays at
//! the same YAML depth. Directives are resolved repeatedly until none remain,
//! which means included files may themselves contain directives. There is no
//! cycle detection; that is the author's responsibility.

use std::path::Path;

use regex::bytes::Regex;

use crate::errors::{Result, ShrunError};
use crate::fs::FileSystem;

/// Resolve every `$include` directive in `source` against `fs`.
///
/// Failure to read a referenced file is fatal.
pub fn assemble_includes(source: &[u8], fs: &dyn FileSystem) -> Result<Vec<u8>> {
    // The list pattern deliberately swallows the preceding whitespace run
    // (including the newline) so the whole directive line can be replaced.
    let list_inc = Regex::new(r"(?m)\s*-\s\$include\s+(.+)$").expect("static pattern");
    let map_inc = Regex::new(r"(?m)^\s*\$include:\s+(.+)$").expect("static pattern");

    let mut assembled = source.to_vec();

    for pattern in [&list_inc, &map_inc] {
        loop {
            let Some(captures) = pattern.captures(&assembled) else {
                break;
            };

            let whole = captures.get(0).expect("match has a whole group");
            let filename_bytes = captures.get(1).expect("pattern has a filename group");
            let filename = String::from_utf8_lossy(filename_bytes.as_bytes()).to_string();

            let indent = indent_size(&assembled, whole.start());

            let contents = fs.read(Path::new(&filename)).map_err(|_| {
                ShrunError::ConfigError(format!("Unable to read file: {}", filename))
            })?;
            let indented = indent_bytes(&contents, indent);

            let mut result = Vec::with_capacity(assembled.len() + indented.len());
            result.extend_from_slice(&assembled[..whole.start()]);
            result.push(b'\n');
            result.extend_from_slice(&indented);
            result.extend_from_slice(&assembled[whole.end()..]);
            assembled = result;
        }
    }

    Ok(assembled)
}

/// Count the leading spaces of the line on which the match begins.
///
/// `start` may sit on whitespace preceding the directive line (the list
/// pattern captures it), so scan forward: reset on newline, count spaces,
/// stop at the first other byte.
fn indent_size(source: &[u8], start: usize) -> usize {
    let mut spaces = 0;
    for &byte in &source[start..] {
        match byte {
            b'\n' => spaces = 0,
            b' ' => spaces += 1,
            _ => break,
        }
    }
    spaces
}

/// Prefix every line of `contents` with `size` spaces.
fn indent_bytes(contents: &[u8], size: usize) -> Vec<u8> {
    let prefix = vec![b' '; size];
    let mut result = Vec::with_capacity(contents.len());
    let mut at_line_start = true;
    for &byte in contents {
        if at_line_start && byte != b'\n' {
            result.extend_from_slice(&prefix);
        }
        result.push(byte);
        at_line_start = byte == b'\n';
    }
    result
}
