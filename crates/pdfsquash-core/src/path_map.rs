//! Mirrors input paths under the output root

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConversionError, PipelineError};

/// Name of the output folder created next to the input root
pub const OUTPUT_DIR_NAME: &str = "Compressed";

/// Maps `root/a/b/c.pdf` to `output_root/a/b/c.pdf`.
#[derive(Debug, Clone)]
pub struct PathMapper {
    root: PathBuf,
    output_root: PathBuf,
}

impl PathMapper {
    pub fn new(root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output_root: output_root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    /// Path of `input` relative to the root
    pub fn relative<'a>(&self, input: &'a Path) -> Result<&'a Path, ConversionError> {
        input
            .strip_prefix(&self.root)
            .map_err(|_| ConversionError::OutsideRoot(input.to_path_buf()))
    }

    /// Mirrored output path for `input`
    pub fn output_path(&self, input: &Path) -> Result<PathBuf, ConversionError> {
        Ok(self.output_root.join(self.relative(input)?))
    }

    /// Compute the output path and create its missing parent directories.
    ///
    /// `create_dir_all` treats an existing directory as success, so sibling
    /// workers may race on the same ancestors.
    pub fn prepare(&self, input: &Path) -> Result<PathBuf, ConversionError> {
        let output = self.output_path(input)?;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(output)
    }

    /// Human-readable relative form (`.` for the root itself)
    pub fn display_relative(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => path.display().to_string(),
        }
    }
}

/// Default output root: a `Compressed` sibling of the input root.
pub fn default_output_root(root: &Path) -> Result<PathBuf, PipelineError> {
    sibling_output_root(root, OUTPUT_DIR_NAME)
}

/// Output root named `dir_name` next to `root`.
pub fn sibling_output_root(root: &Path, dir_name: &str) -> Result<PathBuf, PipelineError> {
    let parent = root.parent().ok_or_else(|| {
        PipelineError::Configuration(format!(
            "input folder {} has no parent to place {dir_name} in",
            root.display()
        ))
    })?;
    Ok(parent.join(dir_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn output_path_mirrors_nesting() {
        let m = PathMapper::new("/data/docs", "/data/Compressed");
        assert_eq!(
            m.output_path(Path::new("/data/docs/a/b/c.pdf")).unwrap(),
            PathBuf::from("/data/Compressed/a/b/c.pdf")
        );
        assert_eq!(
            m.output_path(Path::new("/data/docs/top.pdf")).unwrap(),
            PathBuf::from("/data/Compressed/top.pdf")
        );
    }

    #[test]
    fn output_path_rejects_foreign_input() {
        let m = PathMapper::new("/data/docs", "/data/Compressed");
        let err = m.output_path(Path::new("/elsewhere/x.pdf")).unwrap_err();
        assert!(matches!(err, ConversionError::OutsideRoot(_)));
    }

    #[test]
    fn distinct_inputs_never_collide() {
        let m = PathMapper::new("/r", "/Compressed");
        let inputs = [
            "/r/a.pdf",
            "/r/a/a.pdf",
            "/r/a/b.pdf",
            "/r/b/a.pdf",
            "/r/a b/a.pdf",
            "/r/a/b/a.pdf",
        ];
        let outputs: HashSet<PathBuf> = inputs
            .iter()
            .map(|p| m.output_path(Path::new(p)).unwrap())
            .collect();
        assert_eq!(outputs.len(), inputs.len());
    }

    #[test]
    fn display_relative_root_is_dot() {
        let m = PathMapper::new("/r", "/Compressed");
        assert_eq!(m.display_relative(Path::new("/r")), ".");
        assert_eq!(
            m.display_relative(Path::new("/r/x/y.pdf")),
            Path::new("x").join("y.pdf").display().to_string()
        );
    }

    #[test]
    fn default_output_root_is_sibling() {
        assert_eq!(
            default_output_root(Path::new("/data/docs")).unwrap(),
            PathBuf::from("/data/Compressed")
        );
    }

    #[test]
    fn default_output_root_needs_parent() {
        let err = default_output_root(Path::new("/")).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[test]
    fn prepare_creates_parents() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("in");
        let m = PathMapper::new(&root, tmp.path().join("out"));

        let out = m.prepare(&root.join("x/y/z.pdf")).unwrap();
        assert_eq!(out, tmp.path().join("out/x/y/z.pdf"));
        assert!(tmp.path().join("out/x/y").is_dir());
        assert!(!out.exists());
    }

    #[test]
    fn prepare_concurrently_on_shared_ancestor() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("in");
        let m = PathMapper::new(&root, tmp.path().join("out"));

        std::thread::scope(|s| {
            for i in 0..16 {
                let m = &m;
                let input = root.join(format!("deep/er/still/{i}.pdf"));
                s.spawn(move || m.prepare(&input).unwrap());
            }
        });

        let dir = tmp.path().join("out/deep/er/still");
        assert!(dir.is_dir());
        let entries = std::fs::read_dir(tmp.path().join("out/deep/er")).unwrap().count();
        assert_eq!(entries, 1);
    }
}
