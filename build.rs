//! Build script for the `nowplaying` binary.
//!
//! Places the `.env.example` configuration template next to the location where
//! `config::load_env` looks for the real `.env` file, so a fresh install has a
//! template to copy from:
//!
//! - Linux: `~/.local/share/nowplaying/.env.example`
//! - macOS: `~/Library/Application Support/nowplaying/.env.example`
//! - Windows: `%LOCALAPPDATA%/nowplaying/.env.example`
//!
//! A missing template only produces a cargo warning. Failing to create the
//! data directory or to write the copy fails the build.

use std::{env, fs, path::PathBuf};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed=.env.example");

    let template = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?).join(".env.example");

    let mut data_dir = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    data_dir.push("nowplaying");
    fs::create_dir_all(&data_dir)?;

    if !template.is_file() {
        println!(
            "cargo:warning=.env.example not found at {}",
            template.display()
        );
        return Ok(());
    }

    // skip the write when the copy is already current
    let target = data_dir.join(".env.example");
    let contents = fs::read_to_string(&template)?;
    if fs::read_to_string(&target).ok().as_deref() != Some(contents.as_str()) {
        fs::write(target, contents)?;
    }

    Ok(())
}
