//! Named projects under `<data_root>/history/`, plus the default project.

use crate::error::RegistryError;
use crate::layout::{ProjectLayout, PROJECT_DIRS};
use crate::settings::ProjectSettings;
use meetgraph_types::path_validation::{directory_base_name, validate_source_directory};
use meetgraph_types::validation::validate_project_name;
use meetgraph_types::ProjectSummary;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use walkdir::WalkDir;

/// Directory name of the default project under the data root.
pub const DEFAULT_PROJECT_DIR: &str = "ragtest";

/// Directory holding named projects under the data root.
pub const HISTORY_DIR: &str = "history";

/// Creates, lists, deletes and imports project directories.
#[derive(Debug, Clone)]
pub struct ProjectRegistry {
    data_root: PathBuf,
    prompts_dir: Option<PathBuf>,
}

impl ProjectRegistry {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            prompts_dir: None,
        }
    }

    /// Prompt templates copied into every new project.
    pub fn with_prompts_dir(mut self, prompts_dir: Option<PathBuf>) -> Self {
        self.prompts_dir = prompts_dir;
        self
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn history_root(&self) -> PathBuf {
        self.data_root.join(HISTORY_DIR)
    }

    pub fn default_project_root(&self) -> PathBuf {
        self.data_root.join(DEFAULT_PROJECT_DIR)
    }

    /// Project root for `name`, or the default project when `None`.
    ///
    /// Pure: does not validate the name or touch the filesystem.
    pub fn resolve(&self, name: Option<&str>) -> PathBuf {
        match name {
            None => self.default_project_root(),
            Some(name) => self.history_root().join(name),
        }
    }

    /// Validated layout for a named project, or the default project.
    pub fn layout(&self, name: Option<&str>) -> Result<ProjectLayout, RegistryError> {
        if let Some(name) = name {
            validate_project_name(name)?;
        }
        Ok(ProjectLayout::new(self.resolve(name)))
    }

    /// Create a named project with its input directories and seeded settings.
    pub fn create(&self, name: &str) -> Result<PathBuf, RegistryError> {
        validate_project_name(name)?;
        let root = self.resolve(Some(name));
        if root.exists() {
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }

        fs::create_dir_all(self.history_root())
            .map_err(|e| RegistryError::io(self.history_root(), e))?;

        match self.populate(&root) {
            Ok(()) => {
                info!("Created project '{}' at {:?}", name, root);
                Ok(root)
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&root) {
                    warn!("Failed to roll back partial project {:?}: {}", root, cleanup);
                }
                Err(e)
            }
        }
    }

    /// Create the default project if it does not exist yet.
    pub fn ensure_default(&self) -> Result<PathBuf, RegistryError> {
        let root = self.default_project_root();
        if root.is_dir() {
            return Ok(root);
        }
        fs::create_dir_all(&self.data_root).map_err(|e| RegistryError::io(&self.data_root, e))?;
        if let Err(e) = self.populate(&root) {
            if let Err(cleanup) = fs::remove_dir_all(&root) {
                warn!("Failed to roll back partial project {:?}: {}", root, cleanup);
            }
            return Err(e);
        }
        info!("Created default project at {:?}", root);
        Ok(root)
    }

    fn populate(&self, root: &Path) -> Result<(), RegistryError> {
        fs::create_dir(root).map_err(|e| RegistryError::io(root, e))?;
        let layout = ProjectLayout::new(root);
        for dir in PROJECT_DIRS {
            let path = root.join(dir);
            fs::create_dir_all(&path).map_err(|e| RegistryError::io(&path, e))?;
        }

        ProjectSettings::seed().save(&layout.settings_path())?;

        self.copy_prompts(&layout)
    }

    fn copy_prompts(&self, layout: &ProjectLayout) -> Result<(), RegistryError> {
        let Some(source) = &self.prompts_dir else {
            return Ok(());
        };
        if !source.is_dir() {
            warn!("Prompt template directory not found at {:?}", source);
            return Ok(());
        }

        let target = layout.prompts();
        let entries = fs::read_dir(source).map_err(|e| RegistryError::io(source, e))?;
        let mut copied = 0usize;
        for entry in entries {
            let path = entry.map_err(|e| RegistryError::io(source, e))?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name() {
                let dest = target.join(name);
                fs::copy(&path, &dest).map_err(|e| RegistryError::io(&dest, e))?;
                copied += 1;
            }
        }
        info!("Copied {} prompt template(s) from {:?}", copied, source);
        Ok(())
    }

    /// Recursively remove a named project.
    pub fn delete(&self, name: &str) -> Result<(), RegistryError> {
        validate_project_name(name)?;
        let layout = ProjectLayout::new(self.resolve(Some(name)));
        if !layout.exists() {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        if layout.lock_present() {
            return Err(RegistryError::Busy(name.to_string()));
        }
        fs::remove_dir_all(layout.root()).map_err(|e| RegistryError::io(layout.root(), e))?;
        info!("Deleted project '{}'", name);
        Ok(())
    }

    /// Names of all projects, sorted. Creates the history root when absent.
    pub fn list(&self) -> Result<Vec<String>, RegistryError> {
        let history = self.history_root();
        if !history.exists() {
            fs::create_dir_all(&history).map_err(|e| RegistryError::io(&history, e))?;
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = fs::read_dir(&history)
            .map_err(|e| RegistryError::io(&history, e))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Listing with path and lock state for each project.
    pub fn summaries(&self) -> Result<Vec<ProjectSummary>, RegistryError> {
        Ok(self
            .list()?
            .into_iter()
            .map(|name| {
                let layout = ProjectLayout::new(self.resolve(Some(&name)));
                ProjectSummary {
                    path: layout.root().display().to_string(),
                    build_in_progress: layout.lock_present(),
                    name,
                }
            })
            .collect())
    }

    /// Copy an external project directory into history under its base name.
    pub fn import(&self, source: &Path, overwrite: bool) -> Result<String, RegistryError> {
        let source = validate_source_directory(source)?;
        let name = directory_base_name(&source)?;
        validate_project_name(&name)?;

        let dest = self.resolve(Some(&name));
        let canonical_dest = canonical_prefix(&dest);
        if canonical_dest.starts_with(&source) || source.starts_with(&canonical_dest) {
            return Err(RegistryError::io(
                &source,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "source and destination overlap",
                ),
            ));
        }

        if dest.exists() {
            if !overwrite {
                return Err(RegistryError::AlreadyExists(name));
            }
            let layout = ProjectLayout::new(&dest);
            if layout.lock_present() {
                return Err(RegistryError::Busy(name));
            }
            fs::remove_dir_all(&dest).map_err(|e| RegistryError::io(&dest, e))?;
        }

        fs::create_dir_all(self.history_root())
            .map_err(|e| RegistryError::io(self.history_root(), e))?;
        copy_tree(&source, &dest)?;

        // An imported lock marker would block the project forever.
        let layout = ProjectLayout::new(&dest);
        if layout.lock_present() {
            fs::remove_file(layout.lock_path()).map_err(|e| RegistryError::io(layout.lock_path(), e))?;
        }

        info!("Imported project '{}' from {:?}", name, source);
        Ok(name)
    }

    /// Remove a lock marker left behind by an interrupted build.
    ///
    /// Returns whether a marker was present.
    pub fn clear_stale_lock(&self, name: Option<&str>) -> Result<bool, RegistryError> {
        let layout = self.layout(name)?;
        if !layout.exists() {
            return Err(RegistryError::NotFound(
                name.unwrap_or(DEFAULT_PROJECT_DIR).to_string(),
            ));
        }
        if !layout.lock_present() {
            return Ok(false);
        }
        fs::remove_file(layout.lock_path()).map_err(|e| RegistryError::io(layout.lock_path(), e))?;
        warn!("Removed lock marker from {:?}", layout.root());
        Ok(true)
    }
}

/// Canonicalize the longest existing prefix of `path` and append the rest.
fn canonical_prefix(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = fs::canonicalize(existing) {
            return rest.iter().rev().fold(canonical, |acc, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(part)) => {
                rest.push(part);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<(), RegistryError> {
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| source.to_path_buf());
            RegistryError::io(path, e.into())
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| {
                RegistryError::io(
                    entry.path(),
                    std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
                )
            })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).map_err(|e| RegistryError::io(&target, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target).map_err(|e| RegistryError::io(&target, e))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use meetgraph_types::validation::ValidationError;

    fn registry() -> (tempfile::TempDir, ProjectRegistry) {
        let dir = tempfile::tempdir().unwrap();
        let registry = ProjectRegistry::new(dir.path().join("data"));
        (dir, registry)
    }

    #[test]
    fn test_resolve() {
        let registry = ProjectRegistry::new("/data");
        assert_eq!(registry.resolve(None), PathBuf::from("/data/ragtest"));
        assert_eq!(
            registry.resolve(Some("demo-1")),
            PathBuf::from("/data/history/demo-1")
        );
    }

    #[test]
    fn test_create_layout() {
        let (_dir, registry) = registry();
        let root = registry.create("demo-1").unwrap();
        assert_eq!(root, registry.history_root().join("demo-1"));
        assert!(root.join("input_new").is_dir());
        assert!(root.join("input_archive").is_dir());
        assert!(root.join("output").is_dir());
        assert!(root.join("prompts").is_dir());
        assert!(root.join("settings.yaml").is_file());
        assert!(!root.join(".lock").exists());
    }

    #[test]
    fn test_invalid_names_touch_nothing() {
        let (_dir, registry) = registry();
        for name in ["bad name", "../escape", "", "ü"] {
            let err = registry.create(name).unwrap_err();
            assert!(matches!(
                err,
                RegistryError::InvalidName(ValidationError::InvalidProjectName(_))
            ));
        }
        assert!(!registry.data_root().exists());
    }

    #[test]
    fn test_create_twice() {
        let (_dir, registry) = registry();
        let root = registry.create("demo-1").unwrap();
        std::fs::write(root.join("input_new").join("keep.txt"), "x").unwrap();

        let err = registry.create("demo-1").unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(_)));
        assert!(root.join("input_new").join("keep.txt").exists());
    }

    #[test]
    fn test_create_copies_prompts() {
        let (dir, registry) = registry();
        let prompts = dir.path().join("templates");
        std::fs::create_dir_all(&prompts).unwrap();
        std::fs::write(prompts.join("entity_extraction.txt"), "extract").unwrap();

        let registry = registry.with_prompts_dir(Some(prompts));
        let root = registry.create("with-prompts").unwrap();
        assert_eq!(
            std::fs::read_to_string(root.join("prompts").join("entity_extraction.txt")).unwrap(),
            "extract"
        );
    }

    #[test]
    fn test_missing_prompts_dir_is_not_an_error() {
        let (dir, registry) = registry();
        let registry = registry.with_prompts_dir(Some(dir.path().join("absent")));
        assert!(registry.create("p").is_ok());
    }

    #[test]
    fn test_delete_twice() {
        let (_dir, registry) = registry();
        registry.create("demo-1").unwrap();
        registry.delete("demo-1").unwrap();
        assert!(matches!(
            registry.delete("demo-1").unwrap_err(),
            RegistryError::NotFound(_)
        ));
    }

    #[test]
    fn test_delete_refuses_while_locked() {
        let (_dir, registry) = registry();
        let root = registry.create("busy").unwrap();
        std::fs::write(root.join(".lock"), b"").unwrap();
        assert!(matches!(registry.delete("busy").unwrap_err(), RegistryError::Busy(_)));
        assert!(root.exists());
    }

    #[test]
    fn test_list_sorted_and_creates_root() {
        let (_dir, registry) = registry();
        assert!(registry.list().unwrap().is_empty());
        assert!(registry.history_root().is_dir());

        registry.create("zeta").unwrap();
        registry.create("alpha").unwrap();
        std::fs::write(registry.history_root().join("stray.txt"), "").unwrap();
        assert_eq!(registry.list().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_summaries_report_lock() {
        let (_dir, registry) = registry();
        let root = registry.create("a").unwrap();
        registry.create("b").unwrap();
        std::fs::write(root.join(".lock"), b"").unwrap();

        let summaries = registry.summaries().unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].build_in_progress);
        assert!(!summaries[1].build_in_progress);
    }

    #[test]
    fn test_ensure_default() {
        let (_dir, registry) = registry();
        let root = registry.ensure_default().unwrap();
        assert_eq!(root, registry.default_project_root());
        assert!(root.join("input_new").is_dir());
        assert_eq!(registry.ensure_default().unwrap(), root);
    }

    #[test]
    fn test_import() {
        let (dir, registry) = registry();
        let external = dir.path().join("outside").join("weekly");
        std::fs::create_dir_all(external.join("output").join("run1")).unwrap();
        std::fs::write(external.join("settings.yaml"), "llm: {}\n").unwrap();
        std::fs::write(external.join("output").join("run1").join("graph.graphml"), "<g/>").unwrap();
        std::fs::write(external.join(".lock"), b"").unwrap();

        let name = registry.import(&external, false).unwrap();
        assert_eq!(name, "weekly");
        let root = registry.resolve(Some("weekly"));
        assert!(root.join("output").join("run1").join("graph.graphml").is_file());
        assert!(!root.join(".lock").exists());

        assert!(matches!(
            registry.import(&external, false).unwrap_err(),
            RegistryError::AlreadyExists(_)
        ));
        assert_eq!(registry.import(&external, true).unwrap(), "weekly");
    }

    #[test]
    fn test_import_rejects_bad_sources() {
        let (dir, registry) = registry();
        assert!(matches!(
            registry.import(&dir.path().join("missing"), false).unwrap_err(),
            RegistryError::InvalidSource(_)
        ));

        let bad_name = dir.path().join("has space");
        std::fs::create_dir_all(&bad_name).unwrap();
        assert!(matches!(
            registry.import(&bad_name, false).unwrap_err(),
            RegistryError::InvalidName(_)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_import_detects_overlap_through_symlinked_data_root() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir_all(&real).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let registry = ProjectRegistry::new(&link);
        registry.create("weekly").unwrap();

        let source = real.join(HISTORY_DIR).join("weekly");
        assert!(matches!(
            registry.import(&source, true).unwrap_err(),
            RegistryError::Io { .. }
        ));
        assert!(source.join("settings.yaml").is_file());
    }

    #[test]
    fn test_canonical_prefix_keeps_missing_tail() {
        let dir = tempfile::tempdir().unwrap();
        let base = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(
            canonical_prefix(&dir.path().join("history").join("new")),
            base.join("history").join("new")
        );
    }

    #[test]
    fn test_clear_stale_lock() {
        let (_dir, registry) = registry();
        let root = registry.create("stuck").unwrap();
        std::fs::write(root.join(".lock"), b"").unwrap();

        assert!(registry.clear_stale_lock(Some("stuck")).unwrap());
        assert!(!root.join(".lock").exists());
        assert!(!registry.clear_stale_lock(Some("stuck")).unwrap());
        assert!(matches!(
            registry.clear_stale_lock(Some("absent")).unwrap_err(),
            RegistryError::NotFound(_)
        ));
    }
}
