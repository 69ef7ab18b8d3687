//! Markdown documents on disk.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::util::write_atomic;

/// Destination for rewritten document text.
pub trait DocumentSink {
    /// Replace the document at `path` (a vault key) with `contents`.
    fn write_document(&mut self, path: &str, contents: &str) -> Result<()>;
}

/// A directory of Markdown notes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    root: PathBuf,
}

impl Vault {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::InvalidInput(format!(
                "vault is not a directory: {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.canonicalize()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Name of the vault directory, used in file links.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Markdown files named by `paths`, walking directories.
    ///
    /// Hidden entries are skipped. An empty `paths` means the whole vault.
    pub fn collect_documents(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut documents = Vec::new();
        if paths.is_empty() {
            collect_dir(&self.root, &mut documents)?;
        }
        for path in paths {
            let path = if path.is_absolute() {
                path.clone()
            } else {
                std::env::current_dir()?.join(path)
            };
            if path.is_dir() {
                collect_dir(&path, &mut documents)?;
            } else if is_markdown(&path) {
                documents.push(path);
            } else {
                return Err(Error::InvalidInput(format!(
                    "not a Markdown file or directory: {}",
                    path.display()
                )));
            }
        }
        documents.sort();
        documents.dedup();
        Ok(documents)
    }

    /// Vault-relative key of `path` with `/` separators.
    pub fn document_key(&self, path: &Path) -> Result<String> {
        let absolute = path.canonicalize()?;
        let relative = absolute.strip_prefix(&self.root).map_err(|_| {
            Error::InvalidInput(format!(
                "{} is outside the vault {}",
                path.display(),
                self.root.display()
            ))
        })?;
        let parts: Vec<String> = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect();
        Ok(parts.join("/"))
    }

    /// Absolute path of the document stored under `key`.
    pub fn document_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        if relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(Error::InvalidInput(format!("invalid document key: {key}")));
        }
        Ok(self.root.join(relative))
    }

    pub fn read_document(&self, key: &str) -> Result<String> {
        Ok(std::fs::read_to_string(self.document_path(key)?)?)
    }
}

impl DocumentSink for Vault {
    fn write_document(&mut self, path: &str, contents: &str) -> Result<()> {
        write_atomic(&self.document_path(path)?, contents)
    }
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("md"))
}

fn collect_dir(dir: &Path, documents: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_dir(&path, documents)?;
        } else if is_markdown(&path) {
            documents.push(path);
        }
    }
    Ok(())
}
