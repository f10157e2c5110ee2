//! Named build-file generators
//!
//! A generator turns a loaded project into the files the build driver runs.
//! The registry is filled from a static table at startup and handed to the
//! orchestrator, which picks one by name before walking anything.

use crate::errors::GeneratorError;
use crate::project::ProjectInfo;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub trait Generator {
    fn name(&self) -> &str;

    /// Write (or refresh) the build file for `project` and return its path.
    fn generate(&self, project: &ProjectInfo) -> Result<PathBuf, GeneratorError>;

    /// Where [`Generator::generate`] puts the build file.
    fn build_file(&self, project: &ProjectInfo) -> PathBuf;

    /// Remove whatever [`Generator::generate`] wrote.
    fn delete(&self, project: &ProjectInfo) -> Result<(), GeneratorError>;
}

pub type GeneratorFactory = fn() -> Box<dyn Generator>;

/// Build file shipped by projects that maintain their own makefile.
pub const MAKEFILE_NAME: &str = "Makefile";

/// Uses the `Makefile` a project already carries. Nothing is written, so
/// nothing is deleted.
pub struct MakefileGenerator;

impl Generator for MakefileGenerator {
    fn name(&self) -> &str {
        "makefile"
    }

    fn generate(&self, project: &ProjectInfo) -> Result<PathBuf, GeneratorError> {
        let path = self.build_file(project);
        if path.is_file() {
            Ok(path)
        } else {
            Err(GeneratorError::Failed {
                generator: self.name().to_string(),
                root: project.root().to_path_buf(),
                reason: format!("{} not found", path.display()),
            })
        }
    }

    fn build_file(&self, project: &ProjectInfo) -> PathBuf {
        project.root().join(MAKEFILE_NAME)
    }

    fn delete(&self, _project: &ProjectInfo) -> Result<(), GeneratorError> {
        Ok(())
    }
}

fn makefile_generator() -> Box<dyn Generator> {
    Box::new(MakefileGenerator)
}

/// Generators available to every run.
pub const BUILTIN_GENERATORS: &[(&str, GeneratorFactory)] = &[("makefile", makefile_generator)];

pub fn builtin_registry() -> Result<GeneratorRegistry, GeneratorError> {
    GeneratorRegistry::from_table(BUILTIN_GENERATORS)
}

#[derive(Default)]
pub struct GeneratorRegistry {
    factories: BTreeMap<String, GeneratorFactory>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        GeneratorRegistry::default()
    }

    /// Build a registry from `(name, factory)` pairs. A repeated name is rejected.
    pub fn from_table(table: &[(&str, GeneratorFactory)]) -> Result<Self, GeneratorError> {
        let mut registry = GeneratorRegistry::new();
        for (name, factory) in table {
            registry.register(name, *factory)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, name: &str, factory: GeneratorFactory) -> Result<(), GeneratorError> {
        if self.factories.contains_key(name) {
            return Err(GeneratorError::Duplicate(name.to_string()));
        }
        tracing::trace!("Registered generator '{}'", name);
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<Box<dyn Generator>, GeneratorError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| GeneratorError::Unknown {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::NodeKey;
    use tkmake_naming::{ArtifactKind, BuildConfig, GoalName, LinkType};

    struct Stub;

    impl Generator for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        fn generate(&self, project: &ProjectInfo) -> Result<PathBuf, GeneratorError> {
            Ok(self.build_file(project))
        }

        fn build_file(&self, project: &ProjectInfo) -> PathBuf {
            project.key.root.join("Makefile")
        }

        fn delete(&self, _project: &ProjectInfo) -> Result<(), GeneratorError> {
            Ok(())
        }
    }

    fn stub() -> Box<dyn Generator> {
        Box::new(Stub)
    }

    #[test]
    fn test_create_by_name() {
        let Ok(registry) = GeneratorRegistry::from_table(&[("make", stub), ("xcode", stub)]) else {
            panic!("registry rejected a unique table");
        };
        assert_eq!(registry.names().collect::<Vec<_>>(), ["make", "xcode"]);
        assert!(registry.create("make").is_ok_and(|g| g.name() == "stub"));
        assert!(registry.contains("xcode"));
    }

    #[test]
    fn test_builtin_registry_has_makefile() {
        let Ok(registry) = builtin_registry() else {
            panic!("builtin table has duplicates");
        };
        assert_eq!(registry.names().collect::<Vec<_>>(), ["makefile"]);
        assert!(registry.create("makefile").is_ok_and(|g| g.name() == "makefile"));
    }

    #[test]
    fn test_makefile_generator_requires_makefile() {
        let Ok(dir) = tempfile::TempDir::new() else {
            return;
        };
        let project = ProjectInfo {
            key: NodeKey::new(dir.path(), BuildConfig::Debug, LinkType::Static),
            goal: GoalName::new("acme", "widget", ArtifactKind::Library),
            dependencies: Vec::new(),
            plugin_hosts: Vec::new(),
            shared_libraries: Vec::new(),
        };
        let generator = MakefileGenerator;
        assert!(matches!(generator.generate(&project), Err(GeneratorError::Failed { .. })));

        assert!(std::fs::write(dir.path().join(MAKEFILE_NAME), "all:\n").is_ok());
        assert_eq!(generator.generate(&project).ok(), Some(dir.path().join(MAKEFILE_NAME)));
        assert!(generator.delete(&project).is_ok());
        assert!(dir.path().join(MAKEFILE_NAME).is_file());
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let result = GeneratorRegistry::from_table(&[("make", stub), ("make", stub)]);
        assert!(matches!(result, Err(GeneratorError::Duplicate(name)) if name == "make"));
    }

    #[test]
    fn test_unknown_name_lists_available() {
        let Ok(registry) = GeneratorRegistry::from_table(&[("make", stub)]) else {
            return;
        };
        let Err(GeneratorError::Unknown { name, available }) = registry.create("ninja") else {
            panic!("expected unknown generator");
        };
        assert_eq!(name, "ninja");
        assert_eq!(available, ["make"]);
    }
}
