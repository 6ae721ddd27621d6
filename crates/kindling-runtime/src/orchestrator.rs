//! Bootstrap orchestrator — drives the stage sequence of one launch.
//!
//! Each stage is a hook call whose default implementation delegates to the
//! [`HostRuntime`]. A registered hook for the stage key may replace that
//! default or chain it. Stages run strictly in order and the first failure
//! aborts the launch.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use kindling_core::config::BootConfig;
use kindling_core::error::BootError;
use kindling_core::result::BootResult;
use kindling_plugin::{
    DefaultImpl, DependencyRegistry, HookHandler, HookRegistry, Injector, PluginInstaller,
};

use crate::context::{BootContext, ConnectionSpec};
use crate::host::{HostActivator, HostRuntime};
use crate::stage::{CONFIGURE_CONNECTIONS, INJECT_DEPENDENCIES, Stage};

/// Where a launch currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BootPhase {
    /// `launch` has not been called.
    Idle,
    /// Running the given stage.
    Booting(Stage),
    /// Every stage succeeded.
    Running,
    /// The given stage failed and the launch was aborted.
    Failed(Stage),
}

/// What a successful launch hands back.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    /// Identifier of the launch, also present in its logs.
    pub boot_id: Uuid,
    /// Runtime info reported by `start`.
    pub info: Value,
    /// Connections opened by `register-connections`.
    pub connections: Vec<ConnectionSpec>,
    /// The dependency registry, for inspection.
    pub dependencies: Arc<DependencyRegistry>,
    /// The full boot context.
    pub context: Arc<BootContext>,
}

/// Runs the boot sequence against a host.
///
/// Registries belong to the orchestrator instance. An orchestrator launches
/// at most once.
#[derive(Debug)]
pub struct Orchestrator {
    host: Arc<dyn HostRuntime>,
    hooks: Arc<HookRegistry>,
    dependencies: Arc<DependencyRegistry>,
    injector: Arc<Injector>,
    installer: Arc<PluginInstaller>,
    dependency_timeout: Option<Duration>,
    launched: AtomicBool,
    phase: RwLock<BootPhase>,
}

impl Orchestrator {
    /// Creates an orchestrator driving `host`.
    pub fn new(host: Arc<dyn HostRuntime>) -> Self {
        let dependencies = Arc::new(DependencyRegistry::new());
        let activator = Arc::new(HostActivator::new(Arc::clone(&host)));
        let installer = Arc::new(PluginInstaller::new(Arc::clone(&dependencies), activator));

        Self {
            host,
            hooks: Arc::new(HookRegistry::new()),
            dependencies,
            injector: Arc::new(Injector::new()),
            installer,
            dependency_timeout: None,
            launched: AtomicBool::new(false),
            phase: RwLock::new(BootPhase::Idle),
        }
    }

    /// Fixes the dependency timeout, overriding `plugins.dependency_timeout_ms`.
    pub fn with_dependency_timeout(mut self, timeout: Duration) -> Self {
        self.installer.set_timeout(timeout);
        self.dependency_timeout = Some(self.installer.timeout());
        self
    }

    /// Registers the handler for a stage or auxiliary hook key.
    pub async fn register_hook(&self, key: impl Into<String>, handler: Arc<dyn HookHandler>) {
        self.hooks.register(key, handler).await;
    }

    /// Registers a closure as the handler for `key`.
    pub async fn register_hook_fn<F, Fut>(&self, key: impl Into<String>, handler: F)
    where
        F: Fn(Value, DefaultImpl) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BootResult<Value>> + Send + 'static,
    {
        self.hooks.register_fn(key, handler).await;
    }

    /// Registers several handlers at once.
    pub async fn register_hooks<I, K>(&self, hooks: I) -> usize
    where
        I: IntoIterator<Item = (K, Arc<dyn HookHandler>)>,
        K: Into<String>,
    {
        self.hooks.register_all(hooks).await
    }

    /// The host this orchestrator drives.
    pub fn host(&self) -> &Arc<dyn HostRuntime> {
        &self.host
    }

    /// Stage and auxiliary hook handlers.
    pub fn hooks(&self) -> &Arc<HookRegistry> {
        &self.hooks
    }

    /// Dependency state of every declared plugin.
    pub fn dependencies(&self) -> &Arc<DependencyRegistry> {
        &self.dependencies
    }

    /// Services filled in by `inject-dependencies`.
    pub fn injector(&self) -> &Arc<Injector> {
        &self.injector
    }

    /// Installer bound to this orchestrator's registry and host. Hooks may
    /// capture it to install their own plugins. Its timeout follows
    /// `plugins.dependency_timeout_ms` once the configuration is resolved,
    /// unless `with_dependency_timeout` fixed it.
    pub fn installer(&self) -> &Arc<PluginInstaller> {
        &self.installer
    }

    /// Current phase of the launch.
    pub fn phase(&self) -> BootPhase {
        *self.phase.read()
    }

    /// Runs every stage in order.
    ///
    /// Fails with `StageFailed` naming the first failing stage, or with
    /// `AlreadyLaunched` when called a second time.
    pub async fn launch(&self, options: Value) -> BootResult<RuntimeHandle> {
        if self.launched.swap(true, Ordering::AcqRel) {
            warn!("Launch requested on an orchestrator that already launched");
            return Err(BootError::AlreadyLaunched);
        }

        let ctx = Arc::new(BootContext::new(
            options,
            Arc::clone(&self.dependencies),
            Arc::clone(&self.hooks),
            Arc::clone(&self.injector),
            Arc::clone(&self.installer),
        ));
        let boot_id = ctx.boot_id();
        info!(%boot_id, "Initiating the launch process");

        for stage in Stage::SEQUENCE {
            *self.phase.write() = BootPhase::Booting(stage);
            debug!(%boot_id, stage = %stage, "Entering stage");

            if let Err(err) = self.run_stage(stage, &ctx).await {
                *self.phase.write() = BootPhase::Failed(stage);
                error!(%boot_id, stage = %stage, error = %err, "Boot stage failed, aborting launch");
                return Err(BootError::stage(stage.key(), err));
            }
        }

        *self.phase.write() = BootPhase::Running;
        let handle = RuntimeHandle {
            boot_id,
            info: ctx.info(),
            connections: ctx.connections(),
            dependencies: Arc::clone(&self.dependencies),
            context: Arc::clone(&ctx),
        };
        info!(%boot_id, connections = handle.connections.len(), "Launch complete");
        Ok(handle)
    }

    async fn run_stage(&self, stage: Stage, ctx: &Arc<BootContext>) -> BootResult<()> {
        let key = stage.key();

        match stage {
            Stage::ConfigureRuntime => {
                let params = json!({ "options": ctx.options() });
                let default = self.host_default(ctx, |host, _ctx, params| async move {
                    host.configure_runtime(params).await
                });
                let runtime = self.hooks.call(key, params, default).await?;
                trace!(runtime = %runtime, "Runtime options resolved");
                ctx.set_runtime_options(runtime);
            }

            Stage::RegisterEarlyExtensions => {
                let params = json!({ "options": ctx.options() });
                let default = self.host_default(ctx, |host, ctx, _params| async move {
                    let config = host.resolve_config(&ctx).await?;
                    let config = ctx.attach_config(config);
                    Ok(serde_json::to_value(config.as_ref())?)
                });
                let result = self.hooks.call(key, params, default).await?;

                if ctx.config().is_none() {
                    if BootConfig::has_known_section(&result) {
                        let config: BootConfig = serde_json::from_value(result)?;
                        config.validate()?;
                        debug!("Configuration taken from the register-early-extensions hook");
                        ctx.attach_config(config);
                    } else if !result.is_null() {
                        warn!("register-early-extensions returned no configuration section, ignoring it");
                    }
                }

                if self.dependency_timeout.is_none() {
                    if let Some(config) = ctx.config() {
                        ctx.installer().set_timeout(config.dependency_timeout());
                    }
                }
            }

            Stage::RegisterConnections => {
                let injected = self
                    .hooks
                    .call(
                        INJECT_DEPENDENCIES,
                        json!({}),
                        self.host_default(ctx, |host, ctx, _params| async move {
                            host.inject_dependencies(ctx.injector()).await?;
                            Ok(json!({ "services": ctx.injector().keys() }))
                        }),
                    )
                    .await?;
                trace!(injected = %injected, "Dependencies injected");

                let params = json!({ "config": ctx.config_value() });
                let default = self.host_default(ctx, |host, ctx, _params| async move {
                    debug!("Configuring server connections");
                    let config = ctx.require_config()?;
                    let planned = ConnectionSpec::plan(&config.server);

                    let result = ctx
                        .hooks()
                        .fire(
                            CONFIGURE_CONNECTIONS,
                            json!({ "config": ctx.config_value(), "connections": planned }),
                        )
                        .await?;
                    let connections: Vec<ConnectionSpec> = match result.get("connections") {
                        Some(value) => serde_json::from_value(value.clone())?,
                        None => planned,
                    };

                    debug!(count = connections.len(), "Connections will be configured for the server");
                    for spec in &connections {
                        host.open_connection(&ctx, spec).await?;
                    }
                    ctx.set_connections(connections.clone());
                    Ok(json!({ "connections": connections }))
                });
                self.hooks.call(key, params, default).await?;
            }

            Stage::ConfigureSecurity => {
                let params = json!({ "config": ctx.config_value(), "options": ctx.options() });
                let default = self.host_default(ctx, |host, ctx, _params| async move {
                    if !ctx.config().is_some_and(|config| config.features.security) {
                        debug!("Security is disabled, skipping");
                        return Ok(Value::Null);
                    }
                    host.configure_security(&ctx).await
                });
                self.hooks.call(key, params, default).await?;
            }

            Stage::ConfigureDocumentation => {
                let documentation = ctx
                    .config()
                    .map(|config| {
                        json!({
                            "schemes": [config.server.protocol],
                            "host": config.server.public_host,
                            "info": config.server.info,
                        })
                    })
                    .unwrap_or(Value::Null);
                let params = json!({ "documentation": documentation });
                let default = self.host_default(ctx, |host, ctx, params| async move {
                    if !ctx.config().is_some_and(|config| config.features.documentation) {
                        debug!("Documentation is disabled, skipping");
                        return Ok(params);
                    }
                    let documentation = params.get("documentation").cloned().unwrap_or(Value::Null);
                    let configured = host.configure_documentation(documentation).await?;
                    debug!(documentation = %configured, "Documentation configured");
                    Ok(json!({ "documentation": configured }))
                });
                self.hooks.call(key, params, default).await?;
            }

            Stage::RegisterPlugins => {
                let params = json!({ "config": ctx.config_value(), "options": ctx.options() });
                let default = self.host_default(ctx, install_framework_plugins);
                self.hooks.call(key, params, default).await?;
            }

            Stage::RegisterLateExtensions => {
                let params = json!({ "config": ctx.config_value(), "options": ctx.options() });
                let default = self.host_default(ctx, |host, ctx, params| async move {
                    host.register_late_extensions(&ctx).await?;
                    Ok(params)
                });
                self.hooks.call(key, params, default).await?;
            }

            Stage::BeforeStart => {
                debug!("All plugins are loaded, performing pre-start logic");
                let default = self.host_default(ctx, |host, ctx, params| async move {
                    host.before_start(&ctx).await?;
                    Ok(params)
                });
                self.hooks.call(key, json!({}), default).await?;
            }

            Stage::Start => {
                let default = self.host_default(ctx, |host, ctx, _params| async move {
                    host.start(&ctx).await
                });
                let info = self.hooks.call(key, json!({}), default).await?;
                ctx.set_info(info);
            }

            Stage::Started => {
                let params = json!({ "info": ctx.info() });
                let default = self.host_default(ctx, |host, _ctx, params| async move {
                    let info = params.get("info").cloned().unwrap_or(Value::Null);
                    host.on_started(&info).await?;
                    Ok(params)
                });
                self.hooks.call(key, params, default).await?;
            }
        }

        Ok(())
    }

    /// Builds a stage default that receives the host and context.
    fn host_default<F, Fut>(&self, ctx: &Arc<BootContext>, f: F) -> DefaultImpl
    where
        F: Fn(Arc<dyn HostRuntime>, Arc<BootContext>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BootResult<Value>> + Send + 'static,
    {
        let host = Arc::clone(&self.host);
        let ctx = Arc::clone(ctx);
        DefaultImpl::new(move |params| f(Arc::clone(&host), Arc::clone(&ctx), params))
    }
}

/// Default of `register-plugins`: installs every framework plugin and fails
/// with the first install error once all installs settled.
async fn install_framework_plugins(
    host: Arc<dyn HostRuntime>,
    ctx: Arc<BootContext>,
    _params: Value,
) -> BootResult<Value> {
    let config = ctx.require_config()?;
    let registrations: Vec<_> = host
        .framework_plugins(&config)
        .await?
        .into_iter()
        .map(|mut registration| {
            if registration.options.runtime.is_null() {
                registration.options.runtime = ctx.options().clone();
            }
            registration
        })
        .collect();

    let installer = ctx.installer();
    info!(count = registrations.len(), "Registering framework plugins");
    let mut installed = Vec::new();
    let mut first_error = None;
    for (name, outcome) in installer.install_all(registrations).await {
        match outcome {
            Ok(()) => installed.push(name),
            Err(err) => {
                error!(plugin = %name, error = %err, "Framework plugin failed to install");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }

    if let Some(err) = first_error {
        return Err(err);
    }
    info!(plugins = ?installed, "All framework plugins were successfully registered");
    Ok(json!({ "installed": installed }))
}
