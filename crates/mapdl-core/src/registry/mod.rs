use crate::domain::{SessionError, SessionResult, codes};
use crate::layout::instance_file_stem;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The engine reads the instance index with a two-character field.
pub const MAX_INSTANCES: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaterialProperties {
    pub elasticity: [f64; 3],
    #[serde(rename = "poissonRatio")]
    pub poisson_ratio: [f64; 3],
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            elasticity: [100.0, 100.0, 100.0],
            poisson_ratio: [0.33, 0.33, 0.33],
        }
    }
}

/// Where an instance's model comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModelSource {
    /// A native database the engine can resume directly.
    Native(String),
    /// A neutral interchange file converted once into a native database at
    /// session start.
    Neutral(String),
}

impl ModelSource {
    pub fn path(&self) -> &str {
        match self {
            Self::Native(path) | Self::Neutral(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    name: String,
    source_model_path: String,
    derived_model_path: Option<String>,
    index: usize,
    material: MaterialProperties,
}

impl Instance {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_model_path(&self) -> &str {
        &self.source_model_path
    }

    /// Native database synthesized from a neutral source, if any.
    pub fn derived_model_path(&self) -> Option<&str> {
        self.derived_model_path.as_deref()
    }

    /// The native database the engine resumes for this instance.
    pub fn native_model_path(&self) -> &str {
        self.derived_model_path
            .as_deref()
            .unwrap_or(&self.source_model_path)
    }

    pub fn needs_derivation(&self) -> bool {
        self.derived_model_path.is_some()
    }

    /// 1-based, in registration order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn material(&self) -> &MaterialProperties {
        &self.material
    }

    pub fn describe(&self) -> String {
        let mut out = format!("Instance {}\nindex {}", self.name, self.index);
        out.push_str(&format!("\nmodel {}", self.source_model_path));
        if let Some(derived) = &self.derived_model_path {
            out.push_str(&format!("\nderived {}", derived));
        }
        out
    }
}

/// Splits `path` into its stem (directory kept) and extension without the dot.
pub fn split_model_path(path: &str) -> (String, String) {
    let as_path = Path::new(path);
    match as_path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => {
            let stem_len = path.len() - ext.len() - 1;
            (path[..stem_len].to_string(), ext.to_string())
        }
        None => (path.to_string(), String::new()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: Vec<Instance>,
    frozen: bool,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: &str,
        model: ModelSource,
        material: MaterialProperties,
    ) -> SessionResult<usize> {
        // Registry, control script and instance files share one spelling.
        let name = instance_file_stem(name);
        let name = name.as_str();
        if self.frozen {
            return Err(SessionError::configuration(
                codes::SESSION_INITIALIZED,
                format!("cannot register instance '{}' after the session is initialized", name),
            ));
        }
        if self.lookup(name).is_some() {
            return Err(SessionError::configuration(
                codes::DUPLICATE_INSTANCE,
                format!("instance '{}' is already registered, ignored", name),
            ));
        }
        if self.instances.len() >= MAX_INSTANCES {
            return Err(SessionError::configuration(
                codes::INSTANCE_LIMIT,
                format!("a session holds at most {} instances", MAX_INSTANCES),
            ));
        }
        if model.path().trim().is_empty() {
            return Err(SessionError::configuration(
                codes::MODEL_SOURCE,
                format!("instance '{}' needs a model path", name),
            ));
        }

        let (source_model_path, derived_model_path) = match model {
            ModelSource::Native(path) => (path, None),
            ModelSource::Neutral(path) => {
                let (stem, _) = split_model_path(&path);
                let derived = format!("{}.db", stem);
                (path, Some(derived))
            }
        };

        let index = self.instances.len() + 1;
        self.instances.push(Instance {
            name: name.to_string(),
            source_model_path,
            derived_model_path,
            index,
            material,
        });
        Ok(index)
    }

    pub fn lookup(&self, name: &str) -> Option<&Instance> {
        let name = instance_file_stem(name);
        self.instances.iter().find(|instance| instance.name == name)
    }

    pub fn get(&self, name: &str) -> SessionResult<&Instance> {
        self.lookup(name).ok_or_else(|| {
            SessionError::configuration(
                codes::INSTANCE_NOT_FOUND,
                format!("instance '{}' is not registered", name),
            )
        })
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Width of the engine's fixed-width string table: the longest instance
    /// name or model path stem/extension, at least 1.
    pub fn column_width(&self) -> usize {
        self.instances
            .iter()
            .flat_map(|instance| {
                let (native_stem, native_ext) = split_model_path(instance.native_model_path());
                [
                    instance.name.chars().count(),
                    instance.source_model_path.chars().count(),
                    native_stem.chars().count(),
                    native_ext.chars().count(),
                ]
            })
            .max()
            .unwrap_or(0)
            .max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::{InstanceRegistry, MaterialProperties, ModelSource, split_model_path};
    use crate::domain::{ErrorCategory, codes};

    fn native(path: &str) -> ModelSource {
        ModelSource::Native(path.to_string())
    }

    #[test]
    fn indices_are_dense_and_follow_registration_order() {
        let mut registry = InstanceRegistry::new();
        let names = ["A", "B", "C", "D"];
        let indices: Vec<usize> = names
            .iter()
            .map(|name| {
                registry
                    .register(name, native("beam.db"), MaterialProperties::default())
                    .expect("registration should succeed")
            })
            .collect();

        assert_eq!(indices, vec![1, 2, 3, 4]);
        for (name, expected) in names.iter().zip(1..) {
            assert_eq!(registry.lookup(name).map(|i| i.index()), Some(expected));
        }
    }

    #[test]
    fn duplicate_registration_is_a_no_op() {
        let mut registry = InstanceRegistry::new();
        registry
            .register("A", native("a.db"), MaterialProperties::default())
            .expect("first registration");
        let error = registry
            .register("A", native("other.db"), MaterialProperties::default())
            .expect_err("duplicate should fail");

        assert_eq!(error.placeholder(), codes::DUPLICATE_INSTANCE);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("A").map(|i| i.source_model_path()), Some("a.db"));

        let index = registry
            .register("B", native("b.db"), MaterialProperties::default())
            .expect("registry stays usable");
        assert_eq!(index, 2);
    }

    #[test]
    fn names_with_spaces_register_under_their_file_stem() {
        let mut registry = InstanceRegistry::new();
        registry
            .register(
                "blade 1",
                ModelSource::Native("blade.db".to_string()),
                MaterialProperties::default(),
            )
            .expect("register");

        assert_eq!(registry.instances()[0].name(), "blade_1");
        assert_eq!(registry.get("blade 1").expect("raw name").index(), 1);
        assert_eq!(registry.get("blade_1").expect("stem").index(), 1);
        let duplicate = registry
            .register(
                "blade_1",
                ModelSource::Native("blade.db".to_string()),
                MaterialProperties::default(),
            )
            .expect_err("same stem");
        assert_eq!(duplicate.placeholder(), codes::DUPLICATE_INSTANCE);
    }

    #[test]
    fn frozen_registry_rejects_without_mutation() {
        let mut registry = InstanceRegistry::new();
        registry
            .register("A", native("a.db"), MaterialProperties::default())
            .expect("registration");
        registry.freeze();

        let error = registry
            .register("B", native("b.db"), MaterialProperties::default())
            .expect_err("frozen registry");
        assert_eq!(error.category(), ErrorCategory::Configuration);
        assert_eq!(error.placeholder(), codes::SESSION_INITIALIZED);
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup("B").is_none());
    }

    #[test]
    fn neutral_sources_get_a_derived_native_model() {
        let mut registry = InstanceRegistry::new();
        registry
            .register(
                "Block",
                ModelSource::Neutral("models/Block01.cdb".to_string()),
                MaterialProperties::default(),
            )
            .expect("registration");
        let instance = registry.get("Block").expect("lookup");
        assert!(instance.needs_derivation());
        assert_eq!(instance.derived_model_path(), Some("models/Block01.db"));
        assert_eq!(instance.native_model_path(), "models/Block01.db");
    }

    #[test]
    fn column_width_covers_names_and_model_paths() {
        let mut registry = InstanceRegistry::new();
        assert_eq!(registry.column_width(), 1);
        registry
            .register("LongInstanceName", native("m.db"), MaterialProperties::default())
            .expect("registration");
        registry
            .register("B", native("models/very_long_model_name.db"), MaterialProperties::default())
            .expect("registration");
        assert_eq!(registry.column_width(), "models/very_long_model_name.db".len());
    }

    #[test]
    fn unknown_lookup_reports_not_found() {
        let registry = InstanceRegistry::new();
        let error = registry.get("missing").expect_err("not registered");
        assert_eq!(error.placeholder(), codes::INSTANCE_NOT_FOUND);
    }

    #[test]
    fn model_paths_split_into_stem_and_extension() {
        assert_eq!(
            split_model_path("C:/work/beam.db"),
            ("C:/work/beam".to_string(), "db".to_string())
        );
        assert_eq!(split_model_path("beam"), ("beam".to_string(), String::new()));
    }
}
