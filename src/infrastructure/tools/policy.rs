//! # Path Policy
//!
//! Decides whether a filesystem path may be touched at all.
//! The deny-list is checked first and unconditionally; the allow-list, when
//! non-empty, is a strict whitelist on top of it.

use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyViolation {
    InvalidPath(String),
    Restricted(PathBuf),
    NotAllowed(PathBuf),
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPath(reason) => write!(f, "Invalid path: {}", reason),
            Self::Restricted(root) => {
                write!(f, "Path is in restricted directory: {}", root.display())
            }
            Self::NotAllowed(_) => f.write_str("Path is not in allowed directories"),
        }
    }
}

impl std::error::Error for PolicyViolation {}

#[derive(Debug, Clone)]
pub struct PathPolicy {
    allowed: Vec<PathBuf>,
    restricted: Vec<PathBuf>,
}

impl PathPolicy {
    /// `restricted = None` uses the OS system directories.
    pub fn new<S: AsRef<str>>(allowed: &[S], restricted: Option<&[S]>) -> Self {
        let restricted = match restricted {
            Some(list) => list.iter().map(|p| resolve_root(p.as_ref())).collect(),
            None => Self::default_restricted_paths()
                .iter()
                .map(|p| resolve_root(p))
                .collect(),
        };
        let allowed = allowed.iter().map(|p| resolve_root(p.as_ref())).collect();
        Self {
            allowed,
            restricted,
        }
    }

    /// No whitelist, system directories denied.
    pub fn unrestricted() -> Self {
        Self::new::<&str>(&[], None)
    }

    pub fn default_restricted_paths() -> &'static [&'static str] {
        if cfg!(windows) {
            &[
                r"C:\Windows\System32",
                r"C:\Windows\SysWOW64",
                r"C:\Program Files",
                r"C:\Program Files (x86)",
            ]
        } else {
            &["/bin", "/sbin", "/usr/bin", "/usr/sbin", "/etc", "/sys", "/proc"]
        }
    }

    pub fn allowed(&self) -> &[PathBuf] {
        &self.allowed
    }

    pub fn restricted(&self) -> &[PathBuf] {
        &self.restricted
    }

    /// Resolves `path` and checks it against both lists.
    /// Returns the resolved absolute path when access is permitted.
    pub fn validate(&self, path: impl AsRef<Path>) -> Result<PathBuf, PolicyViolation> {
        let resolved = resolve(path.as_ref()).map_err(PolicyViolation::InvalidPath)?;

        if let Some(root) = self.restricted.iter().find(|r| resolved.starts_with(r)) {
            return Err(PolicyViolation::Restricted(root.clone()));
        }

        if !self.allowed.is_empty() && !self.allowed.iter().any(|a| resolved.starts_with(a)) {
            return Err(PolicyViolation::NotAllowed(resolved));
        }

        Ok(resolved)
    }
}

/// Upper bound on dangling symlinks followed while resolving one path.
const MAX_SYMLINK_HOPS: u32 = 40;

/// Canonicalizes the longest existing ancestor of `path` and re-appends the
/// rest, so targets that do not exist yet can still be checked.
/// Symlinks whose target is missing are followed as well.
pub fn resolve(path: &Path) -> Result<PathBuf, String> {
    if path.as_os_str().is_empty() {
        return Err("empty path".to_string());
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| format!("cannot determine current directory: {}", e))?
            .join(path)
    };

    resolve_absolute(&absolute, MAX_SYMLINK_HOPS)
}

fn resolve_absolute(absolute: &Path, hops: u32) -> Result<PathBuf, String> {
    let mut current = absolute;
    let mut tail = Vec::new();
    let base = loop {
        if let Ok(meta) = std::fs::symlink_metadata(current) {
            if meta.file_type().is_symlink() && !current.exists() {
                return follow_dangling(current, &tail, hops);
            }
            break current
                .canonicalize()
                .map_err(|e| format!("{}: {}", absolute.display(), e))?;
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_owned());
                current = parent;
            }
            (Some(parent), None) => {
                // Trailing `..` or `.`: keep it so it is applied lexically below.
                tail.push(current.components().next_back().map_or_else(
                    || std::ffi::OsString::from("."),
                    |c| c.as_os_str().to_owned(),
                ));
                current = parent;
            }
            (None, _) => {
                return Err(format!("no existing ancestor for {}", absolute.display()));
            }
        }
    };

    // The tail never touched the filesystem, so `..` is resolved lexically and
    // can never climb above the canonical base's own ancestors unchecked.
    let mut resolved = base;
    for part in tail.iter().rev() {
        match Path::new(part).components().next() {
            Some(Component::ParentDir) => {
                resolved.pop();
            }
            Some(Component::CurDir) | None => {}
            Some(_) => resolved.push(part),
        }
    }
    Ok(resolved)
}

/// Replaces the dangling `link` with its target, keeps the unresolved tail,
/// and resolves the result again.
fn follow_dangling(
    link: &Path,
    tail: &[std::ffi::OsString],
    hops: u32,
) -> Result<PathBuf, String> {
    if hops == 0 {
        return Err(format!("too many levels of symbolic links: {}", link.display()));
    }
    let target = std::fs::read_link(link).map_err(|e| format!("{}: {}", link.display(), e))?;
    // A relative target is relative to the directory holding the link.
    let mut next = match link.parent() {
        Some(parent) => parent.join(target),
        None => target,
    };
    for part in tail.iter().rev() {
        next.push(part);
    }
    resolve_absolute(&next, hops - 1)
}

/// Policy roots may not exist on this machine; keep them as clean absolute paths.
fn resolve_root(root: &str) -> PathBuf {
    resolve(Path::new(root)).unwrap_or_else(|_| PathBuf::from(root))
}
