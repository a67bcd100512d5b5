//! Main source discovery.

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::CompileError;

/// Directories never searched for sources.
const SKIPPED_DIRS: &[&str] = &["node_modules"];

/// Resolve the main `.tex` file of a project.
///
/// Order: explicit `main`, then `main.tex` at the root, then the first
/// `.tex` file of a sorted walk that skips hidden directories.
pub fn find_main(dir: &Path, main: Option<&Path>) -> Result<PathBuf, CompileError> {
    if let Some(main) = main {
        let path = dir.join(main);
        return if path.is_file() {
            Ok(path)
        } else {
            Err(CompileError::MainNotFound(main.to_path_buf()))
        };
    }

    let default = dir.join("main.tex");
    if default.is_file() {
        return Ok(default);
    }

    WalkDir::new(dir)
        .sort(true)
        .skip_hidden(true)
        .process_read_dir(|_, _, _, children| {
            children.retain(|entry| {
                entry.as_ref().map_or(true, |e| {
                    !(e.file_type().is_dir()
                        && e.file_name().to_str().is_some_and(|n| SKIPPED_DIRS.contains(&n)))
                })
            });
        })
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .find(|p| is_tex(p))
        .ok_or_else(|| CompileError::NoSources(dir.to_path_buf()))
}

fn is_tex(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_prefers_main_tex() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a.tex");
        touch(dir.path(), "main.tex");

        assert_eq!(find_main(dir.path(), None).unwrap(), dir.path().join("main.tex"));
    }

    #[test]
    fn test_first_sorted_tex() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "zeta.tex");
        touch(dir.path(), "alpha.tex");

        assert_eq!(find_main(dir.path(), None).unwrap(), dir.path().join("alpha.tex"));
    }

    #[test]
    fn test_skips_hidden_and_node_modules() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), ".cache/a.tex");
        touch(dir.path(), "node_modules/pkg/b.tex");
        touch(dir.path(), "src/paper.tex");

        assert_eq!(
            find_main(dir.path(), None).unwrap(),
            dir.path().join("src/paper.tex")
        );
    }

    #[test]
    fn test_no_sources() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "refs.bib");

        assert!(matches!(
            find_main(dir.path(), None),
            Err(CompileError::NoSources(_))
        ));
    }

    #[test]
    fn test_explicit_main() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "main.tex");
        touch(dir.path(), "thesis.tex");

        let found = find_main(dir.path(), Some(Path::new("thesis.tex"))).unwrap();
        assert_eq!(found, dir.path().join("thesis.tex"));

        assert!(matches!(
            find_main(dir.path(), Some(Path::new("missing.tex"))),
            Err(CompileError::MainNotFound(_))
        ));
    }
}
