use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::runtime::errors::RuntimeError;
use crate::runtime::runtime_trait::Runtime;

/// Process-wide `name -> Runtime` lookup. Register rejects empty names and
/// duplicates; lookup and listing are guarded by a reader/writer lock so
/// reads don't contend with each other (spec §4.4, "Runtime registry").
#[derive(Default)]
pub struct RuntimeRegistry {
    runtimes: RwLock<HashMap<String, Arc<dyn Runtime>>>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, runtime: Arc<dyn Runtime>) -> Result<(), RuntimeError> {
        if name.is_empty() {
            return Err(RuntimeError::InvalidName);
        }
        let mut runtimes = self.runtimes.write().expect("registry lock poisoned");
        if runtimes.contains_key(name) {
            return Err(RuntimeError::AlreadyRegistered {
                name: name.to_string(),
            });
        }
        runtimes.insert(name.to_string(), runtime);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Runtime>, RuntimeError> {
        let runtimes = self.runtimes.read().expect("registry lock poisoned");
        runtimes
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound {
                name: name.to_string(),
            })
    }

    pub fn list(&self) -> Vec<String> {
        let runtimes = self.runtimes.read().expect("registry lock poisoned");
        let mut names: Vec<String> = runtimes.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::process::Process;
    use crate::runtime::spec::ExecutionSpec;
    use std::collections::HashMap as Map;

    struct StubProcess;
    impl Process for StubProcess {
        fn id(&self) -> &str {
            "stub"
        }
        fn state(&self) -> crate::runtime::process::ProcessState {
            crate::runtime::process::ProcessState::Exited
        }
        fn wait(&self) -> Result<i32, RuntimeError> {
            Ok(0)
        }
        fn stop(&self) -> Result<(), RuntimeError> {
            Ok(())
        }
        fn kill(&self) -> Result<(), RuntimeError> {
            Ok(())
        }
        fn exit_code(&self) -> Result<i32, RuntimeError> {
            Ok(0)
        }
        fn start_time(&self) -> chrono::DateTime<chrono::Utc> {
            chrono::Utc::now()
        }
        fn metadata(&self) -> &Map<String, String> {
            static EMPTY: std::sync::OnceLock<Map<String, String>> = std::sync::OnceLock::new();
            EMPTY.get_or_init(Map::new)
        }
    }

    struct StubRuntime;
    impl Runtime for StubRuntime {
        fn kind(&self) -> &'static str {
            "stub"
        }
        fn validate(&self) -> Result<(), RuntimeError> {
            Ok(())
        }
        fn execute(&self, _spec: ExecutionSpec) -> Result<Box<dyn Process>, RuntimeError> {
            Ok(Box::new(StubProcess))
        }
        fn find(&self, _id: &str) -> Result<Box<dyn Process>, RuntimeError> {
            Ok(Box::new(StubProcess))
        }
        fn list(&self) -> Result<Vec<Box<dyn Process>>, RuntimeError> {
            Ok(vec![])
        }
    }

    #[test]
    fn register_rejects_empty_name() {
        let registry = RuntimeRegistry::new();
        let err = registry.register("", Arc::new(StubRuntime)).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidName));
    }

    #[test]
    fn register_rejects_duplicate() {
        let registry = RuntimeRegistry::new();
        registry.register("stub", Arc::new(StubRuntime)).unwrap();
        let err = registry
            .register("stub", Arc::new(StubRuntime))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyRegistered { .. }));
    }

    #[test]
    fn get_returns_not_found_for_unknown_name() {
        let registry = RuntimeRegistry::new();
        let err = registry.get("missing").unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { .. }));
    }

    #[test]
    fn list_returns_sorted_names() {
        let registry = RuntimeRegistry::new();
        registry.register("tmux", Arc::new(StubRuntime)).unwrap();
        registry.register("local", Arc::new(StubRuntime)).unwrap();
        assert_eq!(registry.list(), vec!["local".to_string(), "tmux".to_string()]);
    }
}
