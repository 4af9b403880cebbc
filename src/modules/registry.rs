//! Ordered set of modules built at start-up.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::hub::SnapshotSource;

use super::{CommandError, CommandRequest, Module};

pub struct ModuleRegistry {
    modules: Vec<Arc<dyn Module>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Add `module`; a module with the same name is replaced.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        if let Some(pos) = self.modules.iter().position(|m| m.name() == module.name()) {
            log::warn!("modules: replacing already registered {:?}", module.name());
            self.modules.remove(pos);
        }
        log::info!("modules: registered {:?}", module.name());
        self.modules.push(module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.iter().find(|m| m.name() == name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    /// Route `request` to its module.  Failures come back as
    /// `{"error": ...}`; this never fails.
    pub async fn execute(&self, request: CommandRequest) -> Value {
        let CommandRequest {
            module,
            command,
            data,
        } = request;

        let result = match self.get(&module) {
            Some(target) => target.execute_command(&command, data).await,
            None => Err(CommandError::UnknownModule(module.clone())),
        };

        match result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("modules: {module}.{command} rejected: {e}");
                e.to_json()
            }
        }
    }

    /// Spawn every module's `start` on the current runtime.
    pub fn start_all(&self) {
        let mut tasks = self.tasks.lock();
        for module in &self.modules {
            let module = Arc::clone(module);
            let token = self.shutdown.child_token();
            tasks.push(tokio::spawn(async move {
                log::debug!("modules: starting {}", module.name());
                module.start(token).await;
                log::debug!("modules: {} finished", module.name());
            }));
        }
    }

    /// Cancel the background tasks, call every `stop`, and wait for the
    /// tasks to end.
    pub async fn stop_all(&self) {
        self.shutdown.cancel();
        for module in &self.modules {
            module.stop().await;
        }

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                log::warn!("modules: task ended abnormally: {e}");
            }
        }
        log::info!("modules: all stopped");
    }
}

impl SnapshotSource for ModuleRegistry {
    fn snapshots(&self) -> Vec<(String, Value)> {
        self.modules
            .iter()
            .filter_map(|m| Some((m.name().to_owned(), m.state()?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Echo {
        started: AtomicBool,
        stopped: AtomicBool,
    }

    #[async_trait]
    impl Module for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn start(&self, shutdown: CancellationToken) {
            self.started.store(true, Ordering::SeqCst);
            shutdown.cancelled().await;
        }

        async fn stop(&self) {
            self.stopped.store(true, Ordering::SeqCst);
        }

        fn state(&self) -> Option<Value> {
            Some(json!({ "alive": true }))
        }

        async fn execute_command(
            &self,
            command: &str,
            data: Option<Value>,
        ) -> Result<Value, CommandError> {
            match command {
                "echo" => Ok(data.unwrap_or(Value::Null)),
                other => Err(CommandError::UnknownCommand(other.to_owned())),
            }
        }
    }

    struct Quiet;

    #[async_trait]
    impl Module for Quiet {
        fn name(&self) -> &'static str {
            "quiet"
        }

        async fn start(&self, _shutdown: CancellationToken) {}
    }

    fn request(module: &str, command: &str, data: Option<Value>) -> CommandRequest {
        CommandRequest {
            module: module.into(),
            command: command.into(),
            data,
        }
    }

    #[tokio::test]
    async fn routes_to_named_module() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(Echo::default()));

        let result = registry
            .execute(request("echo", "echo", Some(json!({ "x": 1 }))))
            .await;
        assert_eq!(result, json!({ "x": 1 }));
    }

    #[tokio::test]
    async fn unknown_module_and_command_are_error_payloads() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(Echo::default()));
        registry.register(Arc::new(Quiet));

        assert_eq!(
            registry.execute(request("camera", "snap", None)).await,
            json!({ "error": "Unknown module: camera" })
        );
        assert_eq!(
            registry.execute(request("echo", "shout", None)).await,
            json!({ "error": "Unknown command: shout" })
        );
        // Default handler.
        assert_eq!(
            registry.execute(request("quiet", "anything", None)).await,
            json!({ "error": "Unknown command: anything" })
        );
    }

    #[test]
    fn snapshots_skip_stateless_modules_in_order() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(Quiet));
        registry.register(Arc::new(Echo::default()));

        assert_eq!(registry.names(), vec!["quiet", "echo"]);
        assert_eq!(
            registry.snapshots(),
            vec![("echo".to_owned(), json!({ "alive": true }))]
        );
    }

    #[test]
    fn registering_twice_replaces() {
        let mut registry = ModuleRegistry::new();
        registry.register(Arc::new(Quiet));
        registry.register(Arc::new(Quiet));
        assert_eq!(registry.names(), vec!["quiet"]);
    }

    #[tokio::test]
    async fn start_and_stop_all() {
        let echo = Arc::new(Echo::default());
        let mut registry = ModuleRegistry::new();
        registry.register(echo.clone());
        registry.register(Arc::new(Quiet));

        registry.start_all();
        tokio::task::yield_now().await;
        registry.stop_all().await;

        assert!(echo.started.load(Ordering::SeqCst));
        assert!(echo.stopped.load(Ordering::SeqCst));
    }
}
