use crate::core::engine::WorkflowEngine;
use crate::core::error::{WorkflowEngineError, WorkflowError};
use crate::core::validation::ValidationResult;

/// Runs a [`WorkflowEngine`] from async code.
///
/// Task functions are CPU bound and synchronous, so the whole run is moved onto
/// tokio's blocking pool instead of stalling the executor.
#[derive(Clone, Debug)]
pub struct AsyncWorkflowEngine(WorkflowEngine);

impl std::ops::Deref for AsyncWorkflowEngine {
    type Target = WorkflowEngine;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for AsyncWorkflowEngine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<WorkflowEngine> for AsyncWorkflowEngine {
    fn from(engine: WorkflowEngine) -> Self {
        Self(engine)
    }
}

impl AsyncWorkflowEngine {
    pub fn new(engine: WorkflowEngine) -> Self {
        Self(engine)
    }

    pub fn into_inner(self) -> WorkflowEngine {
        self.0
    }

    pub async fn dryrun(&self) -> Result<ValidationResult, WorkflowError> {
        let engine = self.0.clone();
        tokio::task::spawn_blocking(move || engine.dryrun())
            .await
            .map_err(|e| WorkflowEngineError::Join(e.to_string()))?
    }

    /// Executes the workflow on the blocking pool. The registry of this engine is
    /// updated with whatever the run produced, including on task failure.
    pub async fn run(&mut self) -> Result<(), WorkflowError> {
        let mut engine = self.0.clone();
        let (engine, result) = tokio::task::spawn_blocking(move || {
            let result = engine.run();
            (engine, result)
        })
        .await
        .map_err(|e| WorkflowEngineError::Join(e.to_string()))?;
        self.0 = engine;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, TaskSpec};
    use crate::core::library::FunctionLibrary;
    use crate::core::task::{FnTask, TaskArgs};
    use crate::core::value::Value;
    use serde_json::json;

    fn engine() -> WorkflowEngine {
        let mut library = FunctionLibrary::new().with_bookends("t.load", "t.save");
        library.register(
            "t.load",
            FnTask::new("-> 1".parse().unwrap(), |_: TaskArgs| Ok(Value::Float(7.0))),
        );
        library.register(
            "t.save",
            FnTask::new("data -> 1".parse().unwrap(), |args: TaskArgs| {
                Ok(Value::Float(args.f64_or("data", 0.0)? * 2.0))
            }),
        );
        let config = Config {
            facility: "HFIR".into(),
            instrument: "CG1D".into(),
            ipts: "1".into(),
            name: "async".into(),
            workingdir: "/tmp".into(),
            outputdir: "/tmp".into(),
            tasks: vec![
                TaskSpec::new("load", "t.load").outputs(["data"]),
                TaskSpec::new("save", "t.save").input("data", json!("data")).outputs(["doubled"]),
            ],
            extra: Default::default(),
        };
        WorkflowEngine::from_config(config, library)
    }

    #[tokio::test]
    async fn test_async_run_updates_registry() {
        let mut runner = AsyncWorkflowEngine::new(engine());
        assert!(runner.dryrun().await.unwrap().is_safe());
        runner.run().await.unwrap();
        assert_eq!(runner.registry().get("doubled").unwrap().as_f64(), Some(14.0));
    }

    #[tokio::test]
    async fn test_async_run_without_configuration() {
        let mut runner = AsyncWorkflowEngine::from(WorkflowEngine::new(FunctionLibrary::new()));
        assert!(matches!(
            runner.run().await,
            Err(WorkflowError::Engine(WorkflowEngineError::NoConfiguration))
        ));
    }
}
