//! Generate UniFFI Swift bindings for EmojiKit
//!
//! Run: cargo run --bin generate-bindings
//!
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │ DEPENDENCY MAP - Output paths must match Project.swift expectations         │
//! │                                                                             │
//! │ Inputs:                                                                     │
//! │   target/release/libemoji_index.dylib  ← Built library for bindgen          │
//! │                                                                             │
//! │ Outputs (paths match Project.swift):                                        │
//! │   Sources/EmojiKitRust/emoji_indexFFI.h       ← C header                    │
//! │   Sources/EmojiKitRust/module.modulemap       ← Clang module map            │
//! │   Sources/EmojiKitRust/libemoji_index.a       ← Universal static lib        │
//! │   Sources/EmojiKitRustWrapper/emoji_index.swift ← Swift bindings            │
//! └─────────────────────────────────────────────────────────────────────────────┘

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

const LIBRARY: &str = "emoji_index";
const FFI_MODULE: &str = "EmojiKitRustFFI";

fn main() {
    let rust_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let project_root = rust_dir.parent().expect("No parent directory");

    // Match the Swift package's deployment target
    env::set_var("MACOSX_DEPLOYMENT_TARGET", "15.0");

    println!("Building Rust library...");
    run_cmd("cargo", &["build", "--release"], &rust_dir);

    println!("Generating Swift bindings...");
    let dylib = format!("target/release/lib{LIBRARY}.dylib");
    run_cmd(
        "cargo",
        &[
            "run",
            "--bin",
            "uniffi-bindgen",
            "generate",
            "--library",
            &dylib,
            "--language",
            "swift",
            "--out-dir",
            "generated",
        ],
        &rust_dir,
    );

    let swift_dest = project_root.join("Sources/EmojiKitRust");
    let wrapper_dest = project_root.join("Sources/EmojiKitRustWrapper");
    let generated = rust_dir.join("generated");
    fs::create_dir_all(&swift_dest).expect("Create Sources/EmojiKitRust");
    fs::create_dir_all(&wrapper_dest).expect("Create Sources/EmojiKitRustWrapper");

    // Swift 6 strict concurrency + renamed FFI module
    println!("Copying generated Swift file...");
    let swift_file = format!("{LIBRARY}.swift");
    let header = format!("{LIBRARY}FFI.h");
    let swift_content = fs::read_to_string(generated.join(&swift_file))
        .expect("Read swift file")
        .replace(
            "private var initializationResult",
            "nonisolated(unsafe) private var initializationResult",
        )
        .replace(
            &format!("#if canImport({LIBRARY}FFI)"),
            &format!("#if canImport({FFI_MODULE})"),
        )
        .replace(
            &format!("import {LIBRARY}FFI"),
            &format!("import {FFI_MODULE}"),
        );
    fs::write(wrapper_dest.join(&swift_file), swift_content).expect("Write swift");

    fs::copy(generated.join(&header), swift_dest.join(&header)).expect("Copy header");

    println!("Writing modulemap...");
    fs::write(
        swift_dest.join("module.modulemap"),
        format!("module {FFI_MODULE} {{\n    header \"{header}\"\n    export *\n}}\n"),
    )
    .expect("Write modulemap");

    println!("Building universal static library...");
    let targets = ["aarch64-apple-darwin", "x86_64-apple-darwin"];
    for target in targets {
        run_cmd("cargo", &["build", "--release", "--target", target], &rust_dir);
    }

    let static_lib = format!("lib{LIBRARY}.a");
    let slices: Vec<String> = targets
        .iter()
        .map(|target| format!("target/{target}/release/{static_lib}"))
        .collect();
    let output = swift_dest.join(&static_lib).to_string_lossy().into_owned();
    let mut lipo_args: Vec<&str> = vec!["-create"];
    lipo_args.extend(slices.iter().map(String::as_str));
    lipo_args.extend(["-output", output.as_str()]);
    run_cmd("lipo", &lipo_args, &rust_dir);

    println!("Done! Bindings regenerated successfully.");
    println!("  - {}/{swift_file}", wrapper_dest.display());
    println!("  - {}/{header}", swift_dest.display());
    println!("  - {}/module.modulemap", swift_dest.display());
    println!("  - {}/{static_lib}", swift_dest.display());
}

fn run_cmd(program: &str, args: &[&str], dir: &Path) {
    let status = Command::new(program)
        .args(args)
        .current_dir(dir)
        .status()
        .unwrap_or_else(|e| panic!("Failed to run {}: {}", program, e));

    if !status.success() {
        panic!("{} failed with status: {}", program, status);
    }
}
