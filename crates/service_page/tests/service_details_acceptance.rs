use std::sync::Arc;

use async_trait::async_trait;
use client_core::{AlertChannel, MeshApi};
use service_page::{PagePhase, ServiceDetailsController, ServiceDetailsProps};
use shared::{
    domain::{DurationInSeconds, IstioObjectType, ServiceId, TimeInMilliseconds},
    error::{ApiError, ErrorCode},
    protocol::{
        Gateway, IstioConfigList, IstioConfigsMap, ObjectMeta, PeerAuthentication,
        ServiceDetailsInfo, ServiceOverview,
    },
};
use tokio::sync::watch;

/// Mesh whose answers depend on the requested cluster and are held back until
/// that cluster's gate opens. The unfiltered cluster answers with errors and
/// leftovers so that any leak into page state is visible.
struct GatedMesh {
    default_gate: watch::Receiver<bool>,
    west_gate: watch::Receiver<bool>,
}

impl GatedMesh {
    async fn pass(&self, cluster: Option<&str>) {
        let mut gate = match cluster {
            Some("west") => self.west_gate.clone(),
            _ => self.default_gate.clone(),
        };
        let _ = gate.wait_for(|open| *open).await;
    }
}

fn named(name: &str) -> ObjectMeta {
    ObjectMeta {
        name: name.to_string(),
        ..Default::default()
    }
}

#[async_trait]
impl MeshApi for GatedMesh {
    async fn get_service_detail(
        &self,
        namespace: &str,
        service: &str,
        _validate: bool,
        cluster: Option<&str>,
        _rate_interval: Option<DurationInSeconds>,
    ) -> Result<ServiceDetailsInfo, ApiError> {
        self.pass(cluster).await;
        match cluster {
            Some(cluster) => Ok(ServiceDetailsInfo {
                service: ServiceOverview {
                    name: service.to_string(),
                    namespace: namespace.to_string(),
                    cluster: Some(cluster.to_string()),
                    ..Default::default()
                },
                ..Default::default()
            }),
            None => Err(ApiError::new(ErrorCode::Internal, "stale failure")),
        }
    }

    async fn get_all_istio_configs(
        &self,
        namespaces: &[String],
        objects: &[IstioObjectType],
        _validate: bool,
        _label_selector: &str,
        _workload_selector: &str,
        cluster: Option<&str>,
    ) -> Result<IstioConfigsMap, ApiError> {
        self.pass(cluster).await;
        let prefix = cluster.unwrap_or("stale");
        let mut list = IstioConfigList::default();
        if objects.contains(&IstioObjectType::PeerAuthentications) {
            list.peer_authentications = vec![PeerAuthentication {
                metadata: named(&format!("{prefix}-mtls")),
                ..Default::default()
            }];
        } else {
            list.gateways = vec![Gateway {
                metadata: named(&format!("{prefix}-gateway")),
                ..Default::default()
            }];
        }
        Ok(namespaces
            .iter()
            .map(|namespace| (namespace.clone(), list.clone()))
            .collect())
    }

    async fn delete_service_traffic_routing(
        &self,
        _details: &ServiceDetailsInfo,
    ) -> Result<(), ApiError> {
        Ok(())
    }
}

async fn let_tasks_run() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn cluster_switch_before_first_answers_keeps_only_fresh_results() {
    let (open_default, default_gate) = watch::channel(false);
    let (open_west, west_gate) = watch::channel(false);
    let api = Arc::new(GatedMesh {
        default_gate,
        west_gate,
    });
    let alerts = AlertChannel::default();
    let mut raised = alerts.subscribe();
    let mut page = ServiceDetailsController::new(api, Arc::new(alerts));

    let props = ServiceDetailsProps::new(
        ServiceId::new("bookinfo", "reviews"),
        DurationInSeconds(600),
        TimeInMilliseconds(1_000),
    );
    page.on_mount(props.clone());
    assert_eq!(page.generation(), 1);
    assert_eq!(page.pending_fetches(), 3);

    page.on_props_changed(props.with_cluster("west"));
    assert_eq!(page.generation(), 2);
    assert_eq!(page.pending_fetches(), 3);

    open_west.send_replace(true);
    page.run_until_settled().await;

    let fresh = page.state().clone();
    assert_eq!(fresh.phase, PagePhase::Settled);
    assert_eq!(fresh.cluster.as_deref(), Some("west"));
    assert_eq!(fresh.gateways[0].metadata.name, "west-gateway");
    assert_eq!(fresh.peer_authentications[0].metadata.name, "west-mtls");
    assert_eq!(
        fresh
            .service_details
            .as_ref()
            .and_then(|details| details.service.cluster.as_deref()),
        Some("west")
    );
    assert!(fresh.error.is_none());

    open_default.send_replace(true);
    let_tasks_run().await;

    assert_eq!(page.poll_settled(), 0);
    assert_eq!(page.state(), &fresh);
    assert!(raised.try_recv().is_err());
}

#[tokio::test]
async fn stale_answers_arriving_first_are_skipped() {
    let (open_default, default_gate) = watch::channel(false);
    let (open_west, west_gate) = watch::channel(false);
    let api = Arc::new(GatedMesh {
        default_gate,
        west_gate,
    });
    let alerts = AlertChannel::default();
    let mut raised = alerts.subscribe();
    let mut page = ServiceDetailsController::new(api, Arc::new(alerts));

    let props = ServiceDetailsProps::new(
        ServiceId::new("bookinfo", "reviews"),
        DurationInSeconds(600),
        TimeInMilliseconds(1_000),
    );
    page.on_mount(props.clone());
    page.on_props_changed(props.with_cluster("west"));

    open_default.send_replace(true);
    let_tasks_run().await;
    assert_eq!(page.poll_settled(), 0);
    assert_eq!(page.state().phase, PagePhase::Fetching);
    assert!(page.state().gateways.is_empty());

    open_west.send_replace(true);
    page.run_until_settled().await;

    assert_eq!(page.state().gateways[0].metadata.name, "west-gateway");
    assert!(page.state().error.is_none());
    assert!(raised.try_recv().is_err());
}
