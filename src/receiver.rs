//! Receiver bootstrap.
//!
//! # Startup Phases
//! ```text
//! tracing → backend-client-config → server-options → event-bus
//!     → event-type-informer → ingress-deployment → contract-watcher
//!     → shutdown-hook
//! ```
//!
//! Each phase registers what it starts with the shutdown coordinator before
//! returning, so an abort at any point closes everything acquired so far.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::bus::EventBus;
use crate::capability::{
    EventTypeInformer, EventTypeSource, HttpEventTypeSource, Lister, OptionalCapability,
    ResilientAcquirer, UnavailableReason,
};
use crate::config::{BackendClientConfig, ReceiverConfig, ServerOptions};
use crate::contract::{ContractPublisher, ContractWatcher, RECONCILER_ADDRESS};
use crate::ingress::{self, IngressFactory};
use crate::lifecycle::shutdown::{ShutdownCause, ShutdownCoordinator, ShutdownReport};
use crate::lifecycle::startup::{BootstrapError, BootstrapSequencer, PhaseContext, PhaseError};
use crate::lifecycle::signals;
use crate::observability::metrics;
use crate::observability::tracing::TracingConfig;

/// Slack added on top of deadlines enforced inside a phase, so the inner
/// timeout is the one that reports.
const PHASE_MARGIN: Duration = Duration::from_secs(1);

/// Immutable context produced by a successful bootstrap.
#[derive(Clone)]
pub struct ReceiverContext {
    pub bus: EventBus,
    pub backend_client: BackendClientConfig,
    pub http_options: ServerOptions,
    pub https_options: ServerOptions,
    /// Event type cache; `None` when the capability was not acquired.
    pub event_types: Option<Lister>,
    pub ingress_addr: SocketAddr,
}

pub struct Receiver {
    config: Arc<ReceiverConfig>,
    bus: EventBus,
    event_type_source: Option<Arc<dyn EventTypeSource>>,
}

impl Receiver {
    pub fn new(config: Arc<ReceiverConfig>) -> Self {
        Self {
            config,
            bus: EventBus::new(),
            event_type_source: None,
        }
    }

    /// Use `source` for event types instead of the configured endpoint.
    pub fn with_event_type_source(mut self, source: Arc<dyn EventTypeSource>) -> Self {
        self.event_type_source = Some(source);
        self
    }

    /// The bus the receiver will publish on.
    ///
    /// Consumers attached before [`start`](Self::start) see the contract
    /// published at boot.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Run every startup phase in order.
    ///
    /// On failure all resources acquired so far are already closed when the
    /// error is returned.
    pub async fn start(self) -> Result<RunningReceiver, BootstrapError> {
        let Receiver {
            config,
            bus,
            event_type_source,
        } = self;
        let config = &*config;

        let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown.close_timeout()));
        let mut sequencer = BootstrapSequencer::new(Arc::clone(&coordinator));
        let phase_timeout = config.startup.phase_timeout();

        sequencer
            .run_phase("tracing", phase_timeout, |ctx| setup_tracing(config, ctx))
            .await?;

        let backend_client = sequencer
            .run_phase("backend-client-config", phase_timeout, |_| async move {
                let backend = BackendClientConfig::from_file(&config.paths.producer_config)?;
                tracing::info!(
                    path = ?config.paths.producer_config,
                    properties = backend.properties().len(),
                    "Backend client configuration loaded"
                );
                Ok::<_, PhaseError>(backend)
            })
            .await?;

        let (http_options, https_options) = sequencer
            .run_phase("server-options", phase_timeout, |_| load_server_options(config))
            .await?;

        let bus = sequencer
            .run_phase("event-bus", phase_timeout, |ctx| async move {
                ctx.register(bus.handle()).await?;
                Ok::<_, PhaseError>(bus)
            })
            .await?;

        let acquirer = ResilientAcquirer::new(config.capability.startup_timeout());
        let event_types = sequencer
            .run_phase(
                "event-type-informer",
                phase_timeout.max(acquirer.timeout().saturating_add(PHASE_MARGIN)),
                |ctx| acquire_event_types(config, acquirer, event_type_source, ctx),
            )
            .await?;

        let ingress_addr = sequencer
            .run_phase(
                "ingress-deployment",
                config.startup.wait().saturating_add(PHASE_MARGIN),
                |ctx| deploy_ingress(config, &http_options, bus.clone(), event_types.clone(), ctx),
            )
            .await?;

        sequencer
            .run_phase("contract-watcher", phase_timeout, |ctx| {
                start_contract_watcher(config, bus.clone(), ctx)
            })
            .await?;

        sequencer
            .run_phase("shutdown-hook", phase_timeout, |ctx| async move {
                let listener = signals::install(Arc::clone(ctx.coordinator()))?;
                ctx.register(listener).await?;
                Ok::<_, PhaseError>(())
            })
            .await?;

        let coordinator = sequencer.finish();
        tracing::info!(ingress = %ingress_addr, "Receiver running");

        Ok(RunningReceiver {
            coordinator,
            context: ReceiverContext {
                bus,
                backend_client,
                http_options,
                https_options,
                event_types,
                ingress_addr,
            },
        })
    }

    /// Start, then wait until teardown has finished.
    pub async fn run(self) -> Result<Arc<ShutdownReport>, BootstrapError> {
        let running = self.start().await?;
        Ok(running.wait().await)
    }
}

/// Process exit status for a completed run.
///
/// 0 once teardown finished, even if some resources failed to close; 1 when
/// startup failed.
pub fn exit_status(outcome: &Result<Arc<ShutdownReport>, BootstrapError>) -> u8 {
    match outcome {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

async fn setup_tracing(config: &ReceiverConfig, ctx: PhaseContext) -> Result<(), PhaseError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        let exporter = metrics::init_metrics(addr)
            .map_err(|e| format!("failed to install metrics exporter: {e}"))?;
        ctx.register(exporter).await?;
    }
    let tracing_config = TracingConfig::from_dir(&config.paths.tracing_dir)?;
    ctx.register(tracing_config.setup()).await?;
    Ok(())
}

async fn load_server_options(
    config: &ReceiverConfig,
) -> Result<(ServerOptions, ServerOptions), PhaseError> {
    let ingress = &config.ingress;
    let path = &config.paths.http_server_config;
    let http = ServerOptions::from_file(path, &ingress.bind_host, ingress.port)?;
    let https = ServerOptions::from_file(path, &ingress.bind_host, ingress.tls_port)?;
    Ok((http, https))
}

async fn acquire_event_types(
    config: &ReceiverConfig,
    acquirer: ResilientAcquirer,
    source: Option<Arc<dyn EventTypeSource>>,
    ctx: PhaseContext,
) -> Result<Option<Lister>, PhaseError> {
    let capability = &config.capability;
    if !capability.enabled {
        tracing::info!("Event type index disabled");
        return Ok(None);
    }
    if source.is_none() && capability.endpoint.is_none() {
        tracing::info!("No control-plane endpoint configured, event type index disabled");
        return Ok(None);
    }

    let resync = capability.resync_interval();
    let outcome = acquirer
        .acquire("eventtypes", async move {
            let source: Arc<dyn EventTypeSource> = match source {
                Some(source) => source,
                None => Arc::new(HttpEventTypeSource::from_config(
                    capability.endpoint.as_deref().unwrap_or_default(),
                    capability.token_path.as_deref(),
                    acquirer.timeout(),
                )?),
            };
            EventTypeInformer::new(source, resync).start().await
        })
        .await;

    match outcome {
        OptionalCapability::Available(started) => {
            ctx.register(started.handle).await?;
            Ok(Some(started.lister))
        }
        OptionalCapability::Unavailable(UnavailableReason::Permission(reason))
            if capability.require_permission =>
        {
            Err(format!("event type index requires list/watch permission: {reason}").into())
        }
        _ => Ok(None),
    }
}

async fn deploy_ingress(
    config: &ReceiverConfig,
    options: &ServerOptions,
    bus: EventBus,
    event_types: Option<Lister>,
    ctx: PhaseContext,
) -> Result<SocketAddr, PhaseError> {
    let factory = IngressFactory::bind(options, bus, event_types)?;
    ingress::deploy(
        &factory,
        config.ingress.effective_instances(),
        &ctx,
        config.startup.wait(),
    )
    .await?;
    Ok(factory.local_addr())
}

async fn start_contract_watcher(
    config: &ReceiverConfig,
    bus: EventBus,
    ctx: PhaseContext,
) -> Result<(), PhaseError> {
    let publisher = ContractPublisher::new(bus, RECONCILER_ADDRESS);
    // Registered first so it closes after the watcher that drives it.
    ctx.register(publisher.handle()).await?;

    let poll_interval = config.watcher.poll_interval();
    let watcher = ContractWatcher::new(&config.paths.contract, publisher, poll_interval).start();
    ctx.register(watcher).await?;
    Ok(())
}

/// A bootstrapped receiver.
pub struct RunningReceiver {
    coordinator: Arc<ShutdownCoordinator>,
    context: ReceiverContext,
}

impl RunningReceiver {
    pub fn context(&self) -> &ReceiverContext {
        &self.context
    }

    pub fn coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.coordinator
    }

    /// Wait until shutdown has run to completion.
    pub async fn wait(&self) -> Arc<ShutdownReport> {
        self.coordinator.wait_stopped().await
    }

    /// Shut down now and return the teardown report.
    pub async fn shutdown(&self) -> Arc<ShutdownReport> {
        self.coordinator.trigger_shutdown(ShutdownCause::Requested).await
    }
}
