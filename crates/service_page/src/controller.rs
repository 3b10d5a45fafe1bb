//! Service details page controller.
//!
//! Detects navigation-context changes, runs the cancel-then-refetch cycle
//! through its [`PromiseRegistry`] and folds fresh settlements into
//! [`PageState`]. The registry decides freshness; this module only ever sees
//! settlements of the current generation.

use std::sync::Arc;

use chrono::Utc;
use client_core::{AlertSink, MeshApi};
use fetch_registry::{PromiseRegistry, Settled};
use shared::{
    domain::{IstioObjectType, TimeInMilliseconds, WizardAction, WizardMode},
    error::{ApiError, ErrorMsg},
    protocol::{collect_gateways, peer_authentications_in, IstioConfigsMap, ServiceDetailsInfo},
};
use tracing::{debug, info};

use crate::{
    context::{ContextChange, NavigationContext, ServiceDetailsProps, Tab},
    state::{PagePhase, PageState, WizardState},
};

pub const SERVICE_DETAIL_KEY: &str = "serviceDetail";
pub const GATEWAYS_KEY: &str = "gateways";
pub const PEER_AUTHENTICATIONS_KEY: &str = "peerAuthentications";
pub const DELETE_TRAFFIC_ROUTING_KEY: &str = "deleteTrafficRouting";

/// Result of one registered page operation.
#[derive(Debug)]
pub enum PageFetch {
    ServiceDetail(Result<ServiceDetailsInfo, ApiError>),
    Gateways(Result<IstioConfigsMap, ApiError>),
    PeerAuthentications {
        namespace: String,
        result: Result<IstioConfigsMap, ApiError>,
    },
    TrafficRoutingDeleted(Result<(), ApiError>),
}

/// Intents emitted by the rendering layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageIntent {
    SelectTab(Tab),
    LaunchWizard {
        action: WizardAction,
        mode: WizardMode,
    },
    CloseWizard {
        changed: bool,
    },
    RequestDeleteTrafficRouting,
    CancelDeleteTrafficRouting,
    ConfirmDeleteTrafficRouting,
    Refresh,
}

pub struct ServiceDetailsController {
    api: Arc<dyn MeshApi>,
    alerts: Arc<dyn AlertSink>,
    registry: PromiseRegistry<PageFetch>,
    props: Option<ServiceDetailsProps>,
    context: Option<NavigationContext>,
    state: PageState,
    disposed: bool,
}

impl ServiceDetailsController {
    pub fn new(api: Arc<dyn MeshApi>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            api,
            alerts,
            registry: PromiseRegistry::new(),
            props: None,
            context: None,
            state: PageState::default(),
            disposed: false,
        }
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn context(&self) -> Option<&NavigationContext> {
        self.context.as_ref()
    }

    pub fn props(&self) -> Option<&ServiceDetailsProps> {
        self.props.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.registry.generation()
    }

    pub fn pending_fetches(&self) -> usize {
        self.registry.pending_count()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn available_tabs(&self) -> Vec<Tab> {
        let mut tabs = vec![Tab::Info, Tab::Traffic, Tab::Metrics];
        if self.props.as_ref().is_some_and(|props| props.tracing_enabled) {
            tabs.push(Tab::Traces);
        }
        tabs
    }

    pub fn on_mount(&mut self, props: ServiceDetailsProps) {
        if self.disposed {
            return;
        }
        let context = NavigationContext::from_props(&props);
        info!(
            namespace = %context.entity.namespace,
            service = %context.entity.service,
            tab = context.tab.as_str(),
            "mounting service details page"
        );
        self.record(props, context);
        self.fetch_service();
    }

    /// Compares the context computed from `next` with the recorded one and
    /// issues whatever fetches the change calls for.
    pub fn on_props_changed(&mut self, mut next: ServiceDetailsProps) -> ContextChange {
        if self.disposed {
            return ContextChange::Unchanged;
        }
        let Some(previous) = self.context.clone() else {
            self.on_mount(next);
            return ContextChange::Full;
        };

        let mut context = NavigationContext::from_props(&next);
        let change = previous.diff(&context);
        // Refreshes issued by the page itself may be ahead of the shell's tick.
        if context.last_refresh_at < previous.last_refresh_at {
            context.last_refresh_at = previous.last_refresh_at;
            next.last_refresh_at = previous.last_refresh_at;
        }
        let tab = context.tab;
        self.record(next, context);

        match change {
            ContextChange::Full => {
                debug!(tab = tab.as_str(), "navigation context changed");
                self.fetch_service();
            }
            ContextChange::TabOnly if tab.is_server_backed() => {
                debug!(tab = tab.as_str(), "switched to server-backed tab");
                self.fetch_service();
            }
            ContextChange::TabOnly | ContextChange::Unchanged => {}
        }
        change
    }

    pub fn handle_intent(&mut self, intent: PageIntent) {
        if self.disposed {
            return;
        }
        match intent {
            PageIntent::SelectTab(tab) => {
                if let Some(props) = self.props.clone() {
                    self.on_props_changed(props.with_tab(tab));
                }
            }
            PageIntent::LaunchWizard { action, mode } => {
                self.state.wizard = WizardState {
                    show: true,
                    action: Some(action),
                    update_mode: mode == WizardMode::Update,
                };
            }
            PageIntent::CloseWizard { changed } => {
                self.state.wizard.show = false;
                if changed {
                    self.refresh();
                }
            }
            PageIntent::RequestDeleteTrafficRouting => {
                self.state.confirm_delete_traffic_routing = true;
            }
            PageIntent::CancelDeleteTrafficRouting => {
                self.state.confirm_delete_traffic_routing = false;
            }
            PageIntent::ConfirmDeleteTrafficRouting => {
                self.state.confirm_delete_traffic_routing = false;
                self.delete_traffic_routing();
            }
            PageIntent::Refresh => self.refresh(),
        }
    }

    /// Folds one settlement into the page state. Settlements that do not
    /// belong to the current generation are refused.
    pub fn apply(&mut self, settled: Settled<PageFetch>) -> bool {
        if self.disposed || settled.generation != self.registry.generation() {
            return false;
        }

        match settled.value {
            PageFetch::ServiceDetail(Ok(details)) => {
                self.state.validations = details.validations.clone();
                self.state.service_details = Some(details);
                self.state.error = None;
            }
            PageFetch::ServiceDetail(Err(error)) => {
                self.alerts
                    .add_error("Could not fetch Service Details.", &error);
                let service = self
                    .context
                    .as_ref()
                    .map(|context| context.entity.service.clone())
                    .unwrap_or_default();
                self.state.error = Some(ErrorMsg {
                    title: "No Service is selected".to_string(),
                    description: format!("{service} is not found in the mesh"),
                });
            }
            PageFetch::Gateways(Ok(configs)) => {
                let (gateways, k8s_gateways) = collect_gateways(&configs);
                self.state.gateways = gateways;
                self.state.k8s_gateways = k8s_gateways;
            }
            PageFetch::Gateways(Err(error)) => {
                self.alerts.add_error("Could not fetch Gateways list.", &error);
                self.state.gateways.clear();
                self.state.k8s_gateways.clear();
            }
            PageFetch::PeerAuthentications {
                namespace,
                result: Ok(configs),
            } => {
                self.state.peer_authentications = peer_authentications_in(&configs, &namespace);
            }
            PageFetch::PeerAuthentications {
                result: Err(error), ..
            } => {
                self.alerts
                    .add_error("Could not fetch PeerAuthentications.", &error);
                self.state.peer_authentications.clear();
            }
            PageFetch::TrafficRoutingDeleted(Ok(())) => self.refresh(),
            PageFetch::TrafficRoutingDeleted(Err(error)) => {
                self.alerts
                    .add_error("Could not delete Istio config objects.", &error);
            }
        }

        if self.registry.is_idle() {
            self.state.phase = PagePhase::Settled;
        }
        true
    }

    /// Waits for the next fresh settlement and applies it. Returns `false`
    /// when nothing of the current context is outstanding.
    pub async fn settle_next(&mut self) -> bool {
        match self.registry.next_settled().await {
            Some(settled) => {
                self.apply(settled);
                true
            }
            None => {
                self.mark_settled_if_idle();
                false
            }
        }
    }

    pub async fn run_until_settled(&mut self) {
        while self.settle_next().await {}
    }

    /// Applies the settlements that are already available without waiting.
    pub fn poll_settled(&mut self) -> usize {
        let mut applied = 0;
        while let Some(settled) = self.registry.try_next_settled() {
            if self.apply(settled) {
                applied += 1;
            }
        }
        self.mark_settled_if_idle();
        applied
    }

    /// Tears the page down; nothing outstanding will ever be applied.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.registry.cancel_all();
        self.disposed = true;
        debug!("disposed service details page");
    }

    fn record(&mut self, props: ServiceDetailsProps, context: NavigationContext) {
        self.state.current_tab = context.tab;
        self.state.cluster = context.entity.cluster.clone();
        self.state.last_refresh_at = context.last_refresh_at;
        self.props = Some(props);
        self.context = Some(context);
    }

    fn mark_settled_if_idle(&mut self) {
        if !self.disposed && self.state.phase == PagePhase::Fetching && self.registry.is_idle() {
            self.state.phase = PagePhase::Settled;
        }
    }

    /// Bumps the refresh tick, which is a full context change.
    fn refresh(&mut self) {
        let Some(props) = self.props.clone() else {
            return;
        };
        let now = Utc::now().timestamp_millis();
        let last = props.last_refresh_at.0;
        let mut next = props;
        next.last_refresh_at = TimeInMilliseconds(now.max(last.saturating_add(1)));
        self.on_props_changed(next);
    }

    fn fetch_service(&mut self) {
        let Some(context) = self.context.clone() else {
            return;
        };
        // The first batch of a fresh page opens the first generation.
        if self.state.phase != PagePhase::Idle {
            self.registry.cancel_all();
        }

        let namespace = context.entity.namespace;
        let service = context.entity.service;
        let cluster = context.entity.cluster;
        let duration = context.duration;

        let api = Arc::clone(&self.api);
        let (namespaces, cl) = ([namespace.clone()], cluster.clone());
        self.registry.register(GATEWAYS_KEY, async move {
            let result = api
                .get_all_istio_configs(
                    &namespaces,
                    &[IstioObjectType::Gateways, IstioObjectType::K8sGateways],
                    false,
                    "",
                    "",
                    cl.as_deref(),
                )
                .await;
            PageFetch::Gateways(result)
        });

        let api = Arc::clone(&self.api);
        let (ns, cl) = (namespace.clone(), cluster.clone());
        self.registry.register(SERVICE_DETAIL_KEY, async move {
            let result = api
                .get_service_detail(&ns, &service, true, cl.as_deref(), Some(duration))
                .await;
            PageFetch::ServiceDetail(result)
        });

        let api = Arc::clone(&self.api);
        self.registry.register(PEER_AUTHENTICATIONS_KEY, async move {
            let namespaces = [namespace];
            let result = api
                .get_all_istio_configs(
                    &namespaces,
                    &[IstioObjectType::PeerAuthentications],
                    false,
                    "",
                    "",
                    cluster.as_deref(),
                )
                .await;
            let [namespace] = namespaces;
            PageFetch::PeerAuthentications { namespace, result }
        });

        self.state.phase = PagePhase::Fetching;
    }

    fn delete_traffic_routing(&mut self) {
        let Some(details) = self.state.service_details.clone() else {
            debug!("no service details loaded; ignoring traffic routing delete");
            return;
        };
        let api = Arc::clone(&self.api);
        self.registry
            .register(DELETE_TRAFFIC_ROUTING_KEY, async move {
                let result = api.delete_service_traffic_routing(&details).await;
                PageFetch::TrafficRoutingDeleted(result)
            });
        self.state.phase = PagePhase::Fetching;
    }
}

impl Drop for ServiceDetailsController {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
