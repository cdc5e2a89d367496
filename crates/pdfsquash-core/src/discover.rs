//! Input discovery: recursive PDF walk grouped by parent folder

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::error::PipelineError;
use crate::path_map::PathMapper;

/// Files sharing one immediate parent directory, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryGroup {
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

/// Result of walking the input root.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub root: PathBuf,
    pub groups: Vec<DirectoryGroup>,
    /// Files dropped because their output already exists
    pub skipped: usize,
}

impl Discovery {
    /// Number of files still to be processed
    pub fn total(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.groups.iter().flat_map(|g| g.files.iter())
    }

    /// Drop files whose mirrored output already exists and is non-empty.
    ///
    /// Groups left empty are removed.
    pub fn skip_existing(&mut self, mapper: &PathMapper) {
        let mut skipped = 0;
        for group in &mut self.groups {
            group.files.retain(|file| {
                let done = mapper
                    .output_path(file)
                    .ok()
                    .and_then(|out| fs::metadata(out).ok())
                    .is_some_and(|m| m.is_file() && m.len() > 0);
                if done {
                    skipped += 1;
                }
                !done
            });
        }
        self.groups.retain(|g| !g.files.is_empty());
        self.skipped += skipped;
        if skipped > 0 {
            log::info!("{skipped} files already compressed, skipping");
        }
    }
}

/// Walk `root` for `*.pdf` (any case), excluding everything under `exclude`.
///
/// Order is glob order (sorted by name at every level), so repeated walks of
/// an unchanged tree produce the same groups in the same order.
pub fn discover(root: &Path, exclude: &Path) -> Result<Discovery, PipelineError> {
    let discovery_err = |source| PipelineError::Discovery {
        path: root.to_path_buf(),
        source,
    };

    let meta = fs::metadata(root).map_err(discovery_err)?;
    if !meta.is_dir() {
        return Err(discovery_err(std::io::Error::new(
            std::io::ErrorKind::NotADirectory,
            "not a directory",
        )));
    }
    // Surface permission errors on the root itself; glob would just yield nothing
    fs::read_dir(root).map_err(discovery_err)?;

    let root_str = root.to_str().ok_or_else(|| {
        discovery_err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "path is not valid UTF-8",
        ))
    })?;
    let pattern = format!("{}/**/*.[pP][dD][fF]", Pattern::escape(root_str));
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let paths = glob::glob_with(&pattern, options).map_err(|e| {
        PipelineError::Configuration(format!("invalid discovery pattern {pattern}: {e}"))
    })?;

    let mut groups: Vec<DirectoryGroup> = Vec::new();
    let mut excluded = 0usize;
    for entry in paths {
        let path = match entry {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Skipping unreadable entry {}: {}", e.path().display(), e.error());
                continue;
            }
        };
        if path.starts_with(exclude) {
            excluded += 1;
            continue;
        }
        if !path.is_file() {
            continue;
        }
        let Some(dir) = path.parent().map(Path::to_path_buf) else {
            continue;
        };
        match groups.iter_mut().find(|g| g.dir == dir) {
            Some(group) => group.files.push(path),
            None => groups.push(DirectoryGroup {
                dir,
                files: vec![path],
            }),
        }
    }

    if excluded > 0 {
        log::debug!("Excluded {excluded} files under {}", exclude.display());
    }

    let discovery = Discovery {
        root: root.to_path_buf(),
        groups,
        skipped: 0,
    };
    log::debug!(
        "Discovered {} files in {} folders under {}",
        discovery.total(),
        discovery.groups.len(),
        root.display()
    );
    Ok(discovery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"%PDF-1.4").unwrap();
    }

    #[test]
    fn finds_nested_pdfs_grouped_by_folder() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        touch(&root.join("b.pdf"));
        touch(&root.join("a.pdf"));
        touch(&root.join("sub/c.pdf"));
        touch(&root.join("sub/deeper/d.PDF"));
        touch(&root.join("sub/notes.txt"));

        let d = discover(&root, &tmp.path().join("Compressed")).unwrap();
        assert_eq!(d.total(), 4);
        assert_eq!(d.groups.len(), 3);
        assert_eq!(d.groups[0].dir, root);
        assert_eq!(d.groups[0].files, vec![root.join("a.pdf"), root.join("b.pdf")]);
        assert!(d.groups.iter().any(|g| g.dir == root.join("sub/deeper")));
    }

    #[test]
    fn excludes_output_tree() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        touch(&root.join("a.pdf"));
        touch(&tmp.path().join("Compressed/a.pdf"));

        let d = discover(&root, &tmp.path().join("Compressed")).unwrap();
        assert_eq!(d.total(), 1);
    }

    #[test]
    fn excludes_output_tree_nested_inside_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        touch(&root.join("a.pdf"));
        touch(&root.join("out/a.pdf"));
        touch(&root.join("outside/b.pdf"));

        let d = discover(&root, &root.join("out")).unwrap();
        let files: Vec<_> = d.files().cloned().collect();
        assert_eq!(files, vec![root.join("a.pdf"), root.join("outside/b.pdf")]);
    }

    #[test]
    fn ignores_directories_named_like_pdfs() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        fs::create_dir_all(root.join("folder.pdf")).unwrap();
        touch(&root.join("folder.pdf/real.pdf"));

        let d = discover(&root, &tmp.path().join("Compressed")).unwrap();
        assert_eq!(d.total(), 1);
    }

    #[test]
    fn order_is_stable() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        for dir in ["zeta", "alpha", "mid/inner", "mid"] {
            touch(&root.join(dir).join("x.pdf"));
        }
        let exclude = tmp.path().join("Compressed");

        let first: Vec<_> = discover(&root, &exclude)
            .unwrap()
            .groups
            .into_iter()
            .map(|g| g.dir)
            .collect();
        for _ in 0..3 {
            let again: Vec<_> = discover(&root, &exclude)
                .unwrap()
                .groups
                .into_iter()
                .map(|g| g.dir)
                .collect();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn missing_root_is_discovery_error() {
        let tmp = TempDir::new().unwrap();
        let err = discover(&tmp.path().join("nope"), tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::Discovery { .. }));
    }

    #[test]
    fn file_root_is_discovery_error() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a.pdf");
        touch(&file);
        let err = discover(&file, &tmp.path().join("Compressed")).unwrap_err();
        assert!(matches!(err, PipelineError::Discovery { .. }));
    }

    #[test]
    fn root_with_glob_metacharacters() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("scans [2024]");
        touch(&root.join("a.pdf"));

        let d = discover(&root, &tmp.path().join("Compressed")).unwrap();
        assert_eq!(d.total(), 1);
    }

    #[test]
    fn empty_root_has_no_groups() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        fs::create_dir_all(&root).unwrap();

        let d = discover(&root, &tmp.path().join("Compressed")).unwrap();
        assert_eq!(d.total(), 0);
        assert!(d.groups.is_empty());
    }

    #[test]
    fn skip_existing_drops_done_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("docs");
        let out = tmp.path().join("Compressed");
        touch(&root.join("a.pdf"));
        touch(&root.join("b.pdf"));
        touch(&root.join("sub/c.pdf"));
        touch(&out.join("a.pdf"));
        touch(&out.join("sub/c.pdf"));
        // Empty output counts as not done
        fs::write(out.join("b.pdf"), b"").unwrap();

        let mut d = discover(&root, &out).unwrap();
        d.skip_existing(&PathMapper::new(&root, &out));
        assert_eq!(d.skipped, 2);
        assert_eq!(d.total(), 1);
        assert_eq!(d.groups.len(), 1);
        assert_eq!(d.groups[0].files, vec![root.join("b.pdf")]);
    }
}
