use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Raster layers found in a directory, keyed by file stem.
#[derive(Debug, Clone)]
pub struct Catalog {
    paths: BTreeMap<String, PathBuf>,
}

impl Catalog {
    /// Maps the stem of every `*.tif` file in `dir` to its path.
    pub fn scan(dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(dir)
            .with_context(|| format!("Failed to read raster directory {}", dir.display()))?;

        let rasters = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("tif"))
            })
            .filter_map(|p| {
                let stem = p.file_stem()?.to_str()?.to_string();
                Some((stem, p))
            });

        let mut paths: BTreeMap<String, PathBuf> = BTreeMap::new();
        for (stem, path) in rasters {
            if let Some(previous) = paths.get(&stem) {
                bail!(
                    "Layer '{}' is ambiguous: both {} and {} exist.",
                    stem,
                    previous.display(),
                    path.display()
                );
            }
            paths.insert(stem, path);
        }

        if paths.is_empty() {
            bail!("No .tif rasters found in {}", dir.display());
        }
        Ok(Catalog { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.paths.get(name).map(PathBuf::as_path)
    }

    /// Layer names in column order: the dependent layer first, the rest in natural order.
    pub fn ordered_names(&self, dependent: &str) -> Result<Vec<String>> {
        if !self.paths.contains_key(dependent) {
            let available = self.paths.keys().cloned().collect::<Vec<_>>().join(", ");
            bail!(
                "Dependent layer '{}' not found. Available layers: {}",
                dependent,
                available
            );
        }

        let mut predictors: Vec<String> = self
            .paths
            .keys()
            .filter(|name| name.as_str() != dependent)
            .cloned()
            .collect();
        predictors.sort_by(|a, b| natord::compare(a, b));

        let mut names = Vec::with_capacity(self.paths.len());
        names.push(dependent.to_string());
        names.extend(predictors);
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn scan_keeps_only_tif_files() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "agb.tif");
        touch(dir.path(), "slope.TIF");
        touch(dir.path(), "notes.txt");
        touch(dir.path(), "slope.tif.aux.xml");

        let catalog = Catalog::scan(dir.path()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert!(catalog.path("agb").is_some());
        assert!(catalog.path("slope").is_some());
        assert!(catalog.path("notes").is_none());
    }

    #[test]
    fn dependent_comes_first_then_natural_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["band10.tif", "band2.tif", "agb.tif", "band1.tif"] {
            touch(dir.path(), name);
        }

        let catalog = Catalog::scan(dir.path()).unwrap();
        let names = catalog.ordered_names("band2").unwrap();
        assert_eq!(names, vec!["band2", "agb", "band1", "band10"]);
    }

    #[test]
    fn missing_dependent_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "slope.tif");
        let catalog = Catalog::scan(dir.path()).unwrap();
        assert!(catalog.ordered_names("agb").is_err());
    }

    #[test]
    fn duplicate_stems_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "agb.tif");
        touch(dir.path(), "agb.TIF");
        touch(dir.path(), "slope.tif");
        // Case-insensitive file systems keep a single agb file.
        if fs::read_dir(dir.path()).unwrap().count() < 3 {
            return;
        }

        let err = Catalog::scan(dir.path()).unwrap_err();
        assert!(err.to_string().contains("'agb' is ambiguous"));
    }

    #[test]
    fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Catalog::scan(dir.path()).is_err());
    }
}
