//! Native compilation and artifact caching
//!
//! The generated unit is written next to its artifact and handed to the
//! external compiler named by the configured command template. Artifacts
//! are named after the class identity plus an FNV-1a hash of the source, so
//! an identical model reuses the library built for it earlier.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::names::mangle;

/// Paths produced by one build
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub library: PathBuf,
    /// Present when the source was kept on disk
    pub source: Option<PathBuf>,
    /// True when an existing library was reused
    pub cached: bool,
}

pub fn dylib_ext() -> &'static str {
    if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    }
}

/// 64-bit FNV-1a of the source text
pub fn hash_source(source: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in source.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Artifact stem for a class: `<mangled identity>_<hash>`
pub fn artifact_stem(class_identity: &str, source: &str) -> String {
    format!("{}_{:016x}", mangle(class_identity), hash_source(source))
}

/// Substitute `{libname}` and `{csource}` into the command template
pub fn render_command(template: &str, library: &Path, source: &Path) -> Vec<String> {
    let library = library.to_string_lossy();
    let source = source.to_string_lossy();
    template
        .split_whitespace()
        .map(|arg| arg.replace("{libname}", &library).replace("{csource}", &source))
        .collect()
}

/// True if the program named by the template can be spawned
pub fn compiler_available(config: &BuildConfig) -> bool {
    let Some(program) = config.compiler.split_whitespace().next() else {
        return false;
    };
    Command::new(program)
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Compile `source` into a shared library under the configured build directory.
///
/// On failure the library is removed and the source is kept for inspection;
/// the error carries the command line, the compiler output and the source.
pub fn compile_source(source: &str, class_identity: &str, config: &BuildConfig) -> Result<Artifact> {
    fs::create_dir_all(&config.build_dir)?;

    let stem = artifact_stem(class_identity, source);
    let lib_path = config.build_dir.join(format!("{}.{}", stem, dylib_ext()));
    let src_path = config.build_dir.join(format!("{}.cpp", stem));

    if config.reuse_cached && lib_path.exists() {
        tracing::debug!("Using cached library: {}", lib_path.display());
        let source = src_path.exists().then_some(src_path);
        return Ok(Artifact { library: lib_path, source, cached: true });
    }

    fs::write(&src_path, source)?;

    let args = render_command(&config.compiler, &lib_path, &src_path);
    let command = args.join(" ");
    let Some((program, rest)) = args.split_first() else {
        return Err(Error::Compile {
            command,
            diagnostics: "empty compiler command".to_string(),
            generated: source.to_string(),
        });
    };
    tracing::debug!("Compiling {} with: {}", class_identity, command);

    let output = Command::new(program).args(rest).output().map_err(|e| Error::Compile {
        command: command.clone(),
        diagnostics: e.to_string(),
        generated: source.to_string(),
    })?;

    if !output.status.success() {
        let _ = fs::remove_file(&lib_path);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!("Compilation of {} failed; source kept at {}", class_identity, src_path.display());
        return Err(Error::Compile {
            command,
            diagnostics: format!("{}{}", stdout, stderr),
            generated: source.to_string(),
        });
    }

    let source = if config.keep_source {
        Some(src_path)
    } else {
        let _ = fs::remove_file(&src_path);
        None
    };

    tracing::info!("Compiled {}: {}", class_identity, lib_path.display());
    Ok(Artifact { library: lib_path, source, cached: false })
}
