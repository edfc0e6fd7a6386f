//! Shared test constants and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

/// A small bibliography covering every field the normalizer touches.
///
/// Entries are listed in neither key, date nor author order, so each sort
/// mode produces a different sequence:
/// - key:  adams2019, brown2021, clark2021
/// - date: brown2021 (mar), clark2021 (jan), adams2019
/// - name: adams2019, brown2021, clark2021 by last name
pub const SAMPLE_BIB: &str = r#"
@article{clark2021,
    author = {Clark, Carol and Zeller, Zoe},
    title = {Tables and Chairs},
    journal = {Furniture Review},
    year = {2021},
    month = {jan},
    pages = {1--12}
}

@inproceedings{brown2021,
    author = {Bob Brown},
    title = {Later {RUST} Work},
    year = {2021},
    month = {March},
    pages = {40-45}
}

@book{adams2019,
    author = {Adams, Alice},
    title = {Early Days},
    year = {2019}
}
"#;

/// Template that renders only the ids, space separated.
pub const ID_TEMPLATE: &str = "{% for p in publications %}{{ p.id }} {% endfor %}";

/// Writes `content` to `dir/name` and returns nothing; panics on failure.
pub fn write_file(dir: &Path, name: &str, content: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}
