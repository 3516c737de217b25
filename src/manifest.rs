//! Project scaffolding for `package.json` manifests
//!
//! Adds the script entries that run a project's commands with secrets pulled
//! from chamber (through aws-vault) for the dev, prod and cicd stages.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ErrorCategory, ErrorKind, Result, TokensealError};

/// Prefix shared by every generated script.
const VAULT_EXEC: &str = "aws-vault exec main --";

/// (script key infix, chamber service suffix, includes an `exec` entry)
const STAGES: [(&str, &str, bool); 3] = [
    ("d", "dev", true),
    ("p", "prod", false),
    ("c", "cicd", false),
];

/// (script key suffix, chamber subcommand)
const CHAMBER_ACTIONS: [(&str, &str); 6] = [
    ("write", "write"),
    ("read", "read"),
    ("delete", "delete"),
    ("list", "env"),
    ("import", "import"),
    ("export", "export"),
];

/// The script entries for `project`, in the order they are added to the manifest.
pub fn scaffold_scripts(project: &str) -> Vec<(String, String)> {
    let mut scripts = vec![(
        "d".to_string(),
        format!("{VAULT_EXEC} chamber exec {project}/dev -- npm run dev"),
    )];
    for (key, stage, with_exec) in STAGES {
        if with_exec {
            scripts.push((
                format!("env:{key}:exec"),
                format!("{VAULT_EXEC} chamber exec {project}/{stage} -- "),
            ));
        }
        for (action, subcommand) in CHAMBER_ACTIONS {
            scripts.push((
                format!("env:{key}:{action}"),
                format!("{VAULT_EXEC} chamber {subcommand} {project}/{stage}"),
            ));
        }
    }
    scripts
}

/// Add the scaffolding scripts for `project` to the manifest at `manifest_path`.
///
/// Existing scripts with the same names are overwritten in place; every
/// other key keeps its value and position. The manifest is replaced
/// atomically (tempfile + fsync + rename) and written with 4-space indentation.
pub fn init_project(manifest_path: &Path, project: &str) -> Result<()> {
    if project.trim().is_empty() {
        return Err(TokensealError::user(
            ErrorKind::MissingArgument,
            "project name must not be empty",
        ));
    }

    let data = fs::read(manifest_path).map_err(|e| read_error(manifest_path, e))?;
    let mut manifest: Value = serde_json::from_slice(&data).map_err(|e| {
        TokensealError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::ManifestInvalid,
            format!("{} is not valid JSON", manifest_path.display()),
            e,
        )
    })?;

    let root = manifest.as_object_mut().ok_or_else(|| {
        TokensealError::user(
            ErrorKind::ManifestInvalid,
            format!("{} does not contain a JSON object", manifest_path.display()),
        )
    })?;
    let scripts = root
        .entry("scripts")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| {
            TokensealError::user(
                ErrorKind::ManifestInvalid,
                "\"scripts\" is not a JSON object",
            )
        })?;

    for (name, command) in scaffold_scripts(project) {
        scripts.insert(name, Value::String(command));
    }

    let mut rendered = Vec::with_capacity(data.len() + 2048);
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut rendered, formatter);
    manifest.serialize(&mut serializer).map_err(|e| {
        TokensealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to render manifest",
            e,
        )
    })?;

    replace_file_atomically(manifest_path, &rendered)
        .map_err(|e| e.with_context(format!("failed to write to {}", manifest_path.display())))?;

    tracing::info!(project, manifest = %manifest_path.display(), "project initiated");
    Ok(())
}

/// Either the old file or the new file exists at `path` afterwards, never a
/// partially written one. The original file's permissions are kept.
fn replace_file_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| io_error("failed to create tempfile", e))?;

    temp_file
        .write_all(contents)
        .map_err(|e| io_error("failed to write to tempfile", e))?;
    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file
        .flush()
        .map_err(|e| io_error("failed to flush tempfile", e))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| io_error("failed to sync file prior to rename", e))?;

    let permissions = fs::metadata(path)
        .map_err(|e| io_error("failed to get manifest metadata", e))?
        .permissions();
    temp_file
        .as_file()
        .set_permissions(permissions)
        .map_err(|e| io_error("failed to set tempfile permissions", e))?;

    temp_file.persist(path).map_err(|e| {
        TokensealError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", path.display()),
            e,
        )
    })?;
    Ok(())
}

fn io_error(msg: &str, err: io::Error) -> TokensealError {
    TokensealError::with_kind_and_source(ErrorCategory::Internal, ErrorKind::Io, msg, err)
}

fn read_error(path: &Path, err: io::Error) -> TokensealError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    TokensealError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
