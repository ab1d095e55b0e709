//! Containment checks that keep every tool inside the working directory

use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// True iff `candidate` lies inside `base` (or is `base` itself).
///
/// Both paths are made absolute against the process working directory and
/// normalized lexically (`.` dropped, `..` popped) before comparing
/// components, so `base/../outside` is rejected without touching the
/// filesystem. Paths on different roots are simply not contained.
pub fn contained(base: &Path, candidate: &Path) -> bool {
    match (absolute(base), absolute(candidate)) {
        (Some(base), Some(candidate)) => is_path_within(&candidate, &base),
        _ => false,
    }
}

/// Lexically normalized absolute form of `path`
pub fn absolute(path: &Path) -> Option<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(path)
    };
    Some(normalize(&joined))
}

/// Drop `.` segments and resolve `..` against preceding segments.
/// `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(segment) => out.push(segment),
        }
    }
    out
}

fn is_path_within(path: &Path, base: &Path) -> bool {
    path.starts_with(base)
}

/// Resolve a model-supplied path against the working directory.
///
/// Returns the normalized absolute path, or `None` when it escapes the
/// working directory either lexically or through a symlink: the deepest
/// existing ancestor inside the workspace is canonicalized and must stay
/// under the canonical workspace root.
pub async fn resolve_in_workspace(workspace: &Path, relative: &str) -> Option<PathBuf> {
    let joined = workspace.join(relative);
    if !contained(workspace, &joined) {
        debug!("Rejected {:?}: outside {:?}", relative, workspace);
        return None;
    }

    let base = absolute(workspace)?;
    let resolved = absolute(&joined)?;

    let mut existing = resolved.as_path();
    while tokio::fs::symlink_metadata(existing).await.is_err() {
        existing = existing.parent()?;
    }
    if !existing.starts_with(&base) {
        // Nothing under the workspace exists yet; the lexical check decides.
        return Some(resolved);
    }

    let canonical_base = tokio::fs::canonicalize(&base).await.ok()?;
    match tokio::fs::canonicalize(existing).await {
        Ok(real) if is_path_within(&real, &canonical_base) => Some(resolved),
        Ok(real) => {
            debug!("Rejected {:?}: resolves to {:?} via symlink", relative, real);
            None
        }
        Err(e) => {
            debug!("Rejected {:?}: cannot resolve {:?}: {}", relative, existing, e);
            None
        }
    }
}
