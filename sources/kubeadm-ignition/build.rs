// Generates README.md from the crate-level rustdoc in src/lib.rs.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=README.tpl");

    // Set SKIP_README to leave README.md untouched.
    if env::var_os("SKIP_README").is_some() {
        return;
    }

    let mut source = fs::File::open("src/lib.rs").unwrap();
    let mut template = fs::File::open("README.tpl").unwrap();

    let content = cargo_readme::generate_readme(
        &PathBuf::from("."),
        &mut source,
        Some(&mut template),
        // Title, badges and license come from the template.
        true,
        false,
        false,
        // Nest the rustdoc headings under the crate title.
        true,
    )
    .unwrap();

    fs::write("README.md", content).unwrap();
}
