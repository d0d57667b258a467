use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::task::TaskFunction;

pub const DEFAULT_LOAD_FUNCTION: &str = "imars3d.dataio.load_data";
pub const DEFAULT_SAVE_FUNCTION: &str = "imars3d.dataio.save_data";

/// Lookup table from dotted function names to task functions.
///
/// Configurations name functions by string; the library is populated once at
/// startup and resolves those names to typed handles.
#[derive(Clone)]
pub struct FunctionLibrary {
    functions: BTreeMap<String, Arc<dyn TaskFunction>>,
    load_function: String,
    save_function: String,
}

impl std::fmt::Debug for FunctionLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionLibrary")
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("load_function", &self.load_function)
            .field("save_function", &self.save_function)
            .finish()
    }
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionLibrary {
    /// An empty library using the default load/save function names.
    pub fn new() -> Self {
        Self {
            functions: BTreeMap::new(),
            load_function: DEFAULT_LOAD_FUNCTION.to_string(),
            save_function: DEFAULT_SAVE_FUNCTION.to_string(),
        }
    }

    /// A library with every built-in task registered.
    pub fn with_defaults() -> Self {
        let mut library = Self::new();
        crate::tasks::register_defaults(&mut library);
        library
    }

    pub fn register<T: TaskFunction>(&mut self, name: impl Into<String>, function: T) -> &mut Self {
        let name = name.into();
        if self.functions.contains_key(&name) {
            log::warn!("Function {} was already registered, replacing it.", name);
        }
        self.functions.insert(name, Arc::new(function));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn load_function(&self) -> &str {
        &self.load_function
    }

    pub fn save_function(&self) -> &str {
        &self.save_function
    }

    /// Changes which functions the dry-run accepts as workflow bookends.
    pub fn with_bookends(mut self, load: impl Into<String>, save: impl Into<String>) -> Self {
        self.load_function = load.into();
        self.save_function = save.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{FnTask, TaskArgs};
    use crate::core::value::Value;

    #[test]
    fn test_defaults_include_bookends() {
        let library = FunctionLibrary::with_defaults();
        assert!(library.contains(library.load_function()));
        assert!(library.contains(library.save_function()));
        assert!(library.contains("imars3d.diagnostics.find_rotation_center"));
        assert!(library.contains("imars3d.diagnostics.tilt_correction"));
    }

    #[test]
    fn test_register_and_lookup() {
        let mut library = FunctionLibrary::new().with_bookends("io.load", "io.save");
        library.register("math.one", FnTask::new("-> 1".parse().unwrap(), |_: TaskArgs| Ok(Value::Int(1))));
        assert_eq!(library.load_function(), "io.load");
        assert!(library.get("math.one").is_some());
        assert!(library.get("math.two").is_none());
        assert_eq!(library.names().collect::<Vec<_>>(), vec!["math.one"]);
    }

    #[test]
    fn test_debug_lists_function_names() {
        let mut library = FunctionLibrary::new();
        library.register("math.one", FnTask::new("-> 1".parse().unwrap(), |_: TaskArgs| Ok(Value::Int(1))));
        let printed = format!("{library:?}");
        assert!(printed.contains("math.one"));
        assert!(printed.contains(DEFAULT_SAVE_FUNCTION));
    }
}
