//! Compile command handler

use crate::commands::CompileArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use flakestat::SourceManifest;
use std::ffi::OsString;
use std::path::Path;

/// Arguments of `git clone <link> <dir>`
#[must_use]
pub fn git_clone_args(link: &str, dir: &Path) -> Vec<OsString> {
    vec![
        OsString::from("clone"),
        OsString::from(link),
        dir.as_os_str().to_os_string(),
    ]
}

fn clone_project(link: &str, dir: &Path) -> CliResult<()> {
    if dir.exists() {
        return Err(CliError::invalid_argument(format!(
            "clone directory already exists: {}",
            dir.display()
        )));
    }

    tracing::info!(%link, dir = %dir.display(), "cloning project");
    let output = std::process::Command::new("git")
        .args(git_clone_args(link, dir))
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .output()
        .map_err(|e| CliError::command(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CliError::command(format!(
            "git clone exited with {:?}: {}",
            output.status.code(),
            stderr.trim()
        )));
    }
    Ok(())
}

/// Execute the compile command
pub fn execute_compile(config: &CliConfig, args: &CompileArgs) -> CliResult<SourceManifest> {
    let reporter = config.reporter();

    if let Some(ref link) = args.project_link {
        clone_project(link, &args.clone_dir)?;
        reporter.success(&format!("Cloned {link}"));
    } else if !args.clone_dir.is_dir() {
        return Err(CliError::invalid_argument(format!(
            "project directory not found: {}",
            args.clone_dir.display()
        )));
    }

    let test_dirs: Vec<String> = args
        .test_dirs
        .iter()
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect();

    let (manifest, _) = SourceManifest::build(&args.clone_dir, &test_dirs)?;
    manifest.write(&args.manifest_out)?;

    reporter.success(&format!(
        "Indexed {} Python files -> {}",
        manifest.files.len(),
        args.manifest_out.display()
    ));
    Ok(manifest)
}
