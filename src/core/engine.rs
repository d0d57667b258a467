use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::core::config::{Config, TaskSpec};
use crate::core::error::{WorkflowEngineError, WorkflowError, WorkflowValidationError};
use crate::core::library::FunctionLibrary;
use crate::core::registry::Registry;
use crate::core::schema::ParameterSchema;
use crate::core::task::TaskArgs;
use crate::core::telemetry::{Telemetry, TraceEntry};
use crate::core::validation::{InputBinding, ValidationResult, classify_input, dryrun};
use crate::core::value::Value;

/// Runs a configured task list in order, threading outputs through a registry.
#[derive(Clone)]
pub struct WorkflowEngine {
    config: Option<Config>,
    library: FunctionLibrary,
    registry: Registry,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl std::fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("config", &self.config.as_ref().map(|c| &c.name))
            .field("library", &self.library)
            .field("registry", &self.registry.keys())
            .field("telemetry", &self.telemetry.is_some())
            .finish()
    }
}

impl WorkflowEngine {
    /// An engine without configuration; running it is an error until one is set.
    pub fn new(library: FunctionLibrary) -> Self {
        Self {
            config: None,
            library,
            registry: Registry::new(),
            telemetry: None,
        }
    }

    pub fn from_config(config: Config, library: FunctionLibrary) -> Self {
        let mut engine = Self::new(library);
        engine.config = Some(config);
        engine
    }

    pub fn from_json_str(text: &str, library: FunctionLibrary) -> Result<Self, WorkflowError> {
        Ok(Self::from_config(Config::from_json_str(text)?, library))
    }

    pub fn from_path(path: impl AsRef<Path>, library: FunctionLibrary) -> Result<Self, WorkflowError> {
        Ok(Self::from_config(Config::from_path(path)?, library))
    }

    /// Records one trace entry per executed task.
    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = Some(config);
    }

    pub fn config(&self) -> Option<&Config> {
        self.config.as_ref()
    }

    pub fn library(&self) -> &FunctionLibrary {
        &self.library
    }

    /// Values produced by the last run.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn into_registry(self) -> Registry {
        self.registry
    }

    fn require_config(&self) -> Result<&Config, WorkflowEngineError> {
        self.config.as_ref().ok_or(WorkflowEngineError::NoConfiguration)
    }

    /// Validates the configuration without executing any task.
    pub fn dryrun(&self) -> Result<ValidationResult, WorkflowError> {
        let config = self.require_config()?;
        let result = dryrun(config, &self.library)?;
        result.log_summary();
        Ok(result)
    }

    /// Validates, then executes every task in order.
    ///
    /// Task failures propagate unchanged and leave the registry as it was when
    /// the failing task started.
    pub fn run(&mut self) -> Result<(), WorkflowError> {
        self.dryrun()?;
        let config = self.require_config()?.clone();
        let run_id = Uuid::new_v4().simple().to_string();
        log::info!("[{}] Starting workflow '{}' ({} tasks)", run_id, config.name, config.tasks.len());

        self.registry.clear();
        for (key, json) in config.registry_seed() {
            let value = Value::from_json(&json).map_err(|reason| WorkflowValidationError::UnsupportedValue {
                task: config.name.clone(),
                param: key.clone(),
                reason,
            })?;
            self.registry.insert(key, value);
        }

        for task in &config.tasks {
            self.run_task(task, &run_id)?;
        }

        if let Some(telemetry) = &self.telemetry {
            telemetry.flush();
        }
        log::info!("[{}] Workflow '{}' finished", run_id, config.name);
        Ok(())
    }

    fn run_task(&mut self, task: &TaskSpec, run_id: &str) -> Result<(), WorkflowError> {
        let function = self
            .library
            .get(&task.function)
            .ok_or_else(|| WorkflowValidationError::UnknownFunction {
                task: task.name.clone(),
                function: task.function.clone(),
            })?;
        let schema = function.schema();
        let args = self.resolve_arguments(task, &schema)?;

        log::info!("[{}] Running task '{}' ({})", run_id, task.name, task.function);
        let started_at = Utc::now();
        let timer = Instant::now();
        let returned = function.call(args).map_err(|e| {
            log::error!("[{}] Task '{}' failed: {}", run_id, task.name, e);
            e
        })?;
        let duration_ms = timer.elapsed().as_millis();

        let outputs = task.outputs.clone().unwrap_or_default();
        if task.outputs.is_some() {
            let values = returned.into_outputs();
            if values.len() != outputs.len() {
                return Err(WorkflowValidationError::OutputArity {
                    task: task.name.clone(),
                    function: task.function.clone(),
                    expected: outputs.len(),
                    actual: values.len(),
                }
                .into());
            }
            for (name, value) in outputs.iter().zip(values) {
                log::debug!("[{}] {} <- {}", run_id, name, value);
                self.registry.insert(name.clone(), value);
            }
        }

        if let Some(telemetry) = &self.telemetry {
            telemetry.record(TraceEntry {
                run_id: run_id.to_string(),
                task: task.name.clone(),
                function: task.function.clone(),
                started_at,
                duration_ms,
                outputs,
            });
        }
        Ok(())
    }

    /// Resolves every declared parameter: explicit input, then a registry entry of
    /// the same name, then the declared default. Unresolvable parameters are omitted.
    fn resolve_arguments(&self, task: &TaskSpec, schema: &ParameterSchema) -> Result<TaskArgs, WorkflowError> {
        let undeclared: Vec<String> = task.inputs.keys().filter(|k| !schema.contains(k)).cloned().collect();
        if !undeclared.is_empty() {
            return Err(WorkflowValidationError::UnknownParameters {
                task: task.name.clone(),
                function: task.function.clone(),
                params: undeclared,
            }
            .into());
        }

        let mut args = TaskArgs::new();
        for param in &schema.params {
            let value = match task.inputs.get(&param.name) {
                Some(json) => match classify_input(param, json) {
                    InputBinding::Reference(key) => self.registry.get(key)?.clone(),
                    InputBinding::Literal(json) => {
                        Value::from_json(json).map_err(|reason| WorkflowValidationError::UnsupportedValue {
                            task: task.name.clone(),
                            param: param.name.clone(),
                            reason,
                        })?
                    }
                },
                None => match (self.registry.try_get(&param.name), &param.default) {
                    (Some(value), _) => value.clone(),
                    (None, Some(default)) => default.clone(),
                    (None, None) => continue,
                },
            };
            args.insert(param.name.clone(), value);
        }
        Ok(args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TaskError;
    use crate::core::task::FnTask;
    use crate::core::telemetry::MemoryTelemetry;
    use serde_json::json;

    fn library() -> FunctionLibrary {
        let mut library = FunctionLibrary::new().with_bookends("test.load", "test.save");
        library.register(
            "test.load",
            FnTask::new("start=1.0 -> 2".parse().unwrap(), |args: TaskArgs| {
                let start = args.f64_or("start", 0.0)?;
                Ok(Value::Tuple(vec![Value::Float(start), Value::Float(start + 1.0)]))
            }),
        );
        library.register(
            "test.add",
            FnTask::new("a, b, offset=0.5 -> 1".parse().unwrap(), |args: TaskArgs| {
                Ok(Value::Float(args.f64_or("a", 0.0)? + args.f64_or("b", 0.0)? + args.f64_or("offset", 0.0)?))
            }),
        );
        library.register(
            "test.pair",
            FnTask::new("a".parse().unwrap(), |args: TaskArgs| {
                let a = args.require("a")?.clone();
                Ok(Value::Tuple(vec![a.clone(), a]))
            }),
        );
        library.register(
            "test.fail",
            FnTask::new("a".parse().unwrap(), |_: TaskArgs| Err(TaskError::Failed("diverged".into()))),
        );
        library.register(
            "test.save",
            FnTask::new("data, outputbase, label:str=null".parse().unwrap(), |args: TaskArgs| {
                let label = args.optional_str("label")?.unwrap_or("none").to_string();
                Ok(Value::Str(format!("{}:{}", label, args.f64_or("data", 0.0)?)))
            }),
        );
        library
    }

    fn config(tasks: Vec<TaskSpec>) -> Config {
        Config {
            facility: "HFIR".into(),
            instrument: "CG1D".into(),
            ipts: "1".into(),
            name: "scan".into(),
            workingdir: "/tmp".into(),
            outputdir: "/tmp/out".into(),
            tasks,
            extra: Default::default(),
        }
    }

    fn save() -> TaskSpec {
        TaskSpec::new("save", "test.save")
            .input("data", json!("total"))
            .input("outputbase", json!("outputdir"))
            .input("label", json!("total"))
            .outputs(["saved"])
    }

    #[test]
    fn test_run_threads_outputs_through_registry() {
        let cfg = config(vec![
            TaskSpec::new("load", "test.load").input("start", json!(2.0)).outputs(["a", "b"]),
            TaskSpec::new("add", "test.add").outputs(["total"]),
            save(),
        ]);
        let mut engine = WorkflowEngine::from_config(cfg, library());
        engine.run().unwrap();

        let registry = engine.registry();
        assert_eq!(registry.get("a").unwrap().as_f64(), Some(2.0));
        assert_eq!(registry.get("b").unwrap().as_f64(), Some(3.0));
        // implicit a, b plus default offset
        assert_eq!(registry.get("total").unwrap().as_f64(), Some(5.5));
        // literal parameter keeps the string, reference parameter looks it up
        assert_eq!(registry.get("saved").unwrap().as_str(), Some("total:5.5"));
        assert_eq!(registry.get("outputdir").unwrap().as_str(), Some("/tmp/out"));
        assert!(registry.try_get("name").is_none());
    }

    #[test]
    fn test_explicit_input_beats_registry() {
        let cfg = config(vec![
            TaskSpec::new("load", "test.load").outputs(["a", "b"]),
            TaskSpec::new("add", "test.add")
                .input("b", json!("a"))
                .input("offset", json!(0))
                .outputs(["total"]),
            save(),
        ]);
        let mut engine = WorkflowEngine::from_config(cfg, library());
        engine.run().unwrap();
        assert_eq!(engine.registry().get("total").unwrap().as_f64(), Some(2.0));
    }

    #[test]
    fn test_runtime_output_arity_mismatch() {
        let cfg = config(vec![
            TaskSpec::new("load", "test.load").outputs(["a", "b"]),
            TaskSpec::new("pair", "test.pair").outputs(["only_one"]),
            TaskSpec::new("add", "test.add").outputs(["total"]),
            save(),
        ]);
        let mut engine = WorkflowEngine::from_config(cfg, library());
        match engine.run() {
            Err(WorkflowError::Validation(WorkflowValidationError::OutputArity { expected, actual, .. })) => {
                assert_eq!((expected, actual), (1, 2));
            }
            other => panic!("expected arity error, got {other:?}"),
        }
    }

    #[test]
    fn test_task_error_propagates_and_keeps_partial_registry() {
        let cfg = config(vec![
            TaskSpec::new("load", "test.load").outputs(["a", "b"]),
            TaskSpec::new("fail", "test.fail").outputs(["never"]),
            TaskSpec::new("add", "test.add").outputs(["total"]),
            save(),
        ]);
        let mut engine = WorkflowEngine::from_config(cfg, library());
        let err = engine.run().unwrap_err();
        assert!(matches!(err, WorkflowError::Task(TaskError::Failed(_))));
        assert_eq!(err.to_string(), "diverged");
        assert!(engine.registry().contains("a"));
        assert!(!engine.registry().contains("never"));
    }

    #[test]
    fn test_validation_failure_has_no_side_effects() {
        let cfg = config(vec![
            TaskSpec::new("load", "test.load").outputs(["a", "b"]),
            TaskSpec::new("add", "test.add").input("a", json!("missing")).outputs(["total"]),
            save(),
        ]);
        let mut engine = WorkflowEngine::from_config(cfg, library());
        let err = engine.run().unwrap_err();
        assert!(err.is_configuration_error());
        assert!(engine.registry().is_empty());
    }

    #[test]
    fn test_run_without_configuration() {
        let mut engine = WorkflowEngine::new(library());
        assert!(matches!(
            engine.run(),
            Err(WorkflowError::Engine(WorkflowEngineError::NoConfiguration))
        ));
    }

    #[test]
    fn test_telemetry_records_each_task() {
        let telemetry = Arc::new(MemoryTelemetry::new());
        let cfg = config(vec![
            TaskSpec::new("load", "test.load").outputs(["a", "b"]),
            TaskSpec::new("add", "test.add").outputs(["total"]),
            save(),
        ]);
        let mut engine = WorkflowEngine::from_config(cfg, library()).with_telemetry(telemetry.clone());
        engine.run().unwrap();

        let traces = telemetry.get_traces();
        assert_eq!(traces.len(), 3);
        assert_eq!(traces[1].task, "add");
        assert_eq!(traces[1].outputs, vec!["total".to_string()]);
        assert!(traces.iter().all(|t| t.run_id == traces[0].run_id));
    }
}
