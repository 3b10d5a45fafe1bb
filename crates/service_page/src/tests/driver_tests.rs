use std::sync::Arc;

use super::*;
use crate::{
    context::Tab,
    scripted_api::{details, gateway_configs, peer_auth_configs, Endpoint, Reply, ScriptedMeshApi},
    state::PagePhase,
};
use client_core::AlertChannel;
use shared::domain::{DurationInSeconds, ServiceId, TimeInMilliseconds};

fn props() -> ServiceDetailsProps {
    ServiceDetailsProps::new(
        ServiceId::new("bookinfo", "reviews"),
        DurationInSeconds(600),
        TimeInMilliseconds(1_000),
    )
}

async fn answering_api() -> Arc<ScriptedMeshApi> {
    let api = ScriptedMeshApi::new();
    api.answer_always(
        Endpoint::ServiceDetail,
        Reply::Details(Ok(details("bookinfo", "reviews"))),
    )
    .await;
    api.answer_always(
        Endpoint::Gateways,
        Reply::Configs(Ok(gateway_configs("bookinfo", &["bookinfo-gateway"]))),
    )
    .await;
    api.answer_always(
        Endpoint::PeerAuthentications,
        Reply::Configs(Ok(peer_auth_configs("bookinfo", &["default"]))),
    )
    .await;
    api
}

fn page(api: &Arc<ScriptedMeshApi>) -> ServiceDetailsController {
    ServiceDetailsController::new(api.clone(), Arc::new(AlertChannel::default()))
}

#[tokio::test]
async fn publishes_settled_state_and_disposes_on_request() {
    let api = answering_api().await;
    let (inputs_tx, inputs_rx) = mpsc::channel(8);
    let (view_tx, mut view_rx) = watch::channel(PageState::default());

    let handle = tokio::spawn(run_page(page(&api), props(), inputs_rx, None, view_tx));

    let settled = view_rx
        .wait_for(|state| state.phase == PagePhase::Settled)
        .await
        .expect("driver alive")
        .clone();
    assert_eq!(settled.gateways.len(), 1);
    assert!(settled.service_details.is_some());

    inputs_tx
        .send(PageInput::Intent(PageIntent::SelectTab(Tab::Metrics)))
        .await
        .expect("send intent");
    view_rx
        .wait_for(|state| state.current_tab == Tab::Metrics)
        .await
        .expect("tab published");

    inputs_tx.send(PageInput::Dispose).await.expect("send dispose");
    let last = handle.await.expect("driver task");
    assert_eq!(last.current_tab, Tab::Metrics);
    assert_eq!(api.count(Endpoint::ServiceDetail).await, 1);
}

#[tokio::test]
async fn prop_changes_refetch_through_the_driver() {
    let api = answering_api().await;
    let (inputs_tx, inputs_rx) = mpsc::channel(8);
    let (view_tx, mut view_rx) = watch::channel(PageState::default());

    let handle = tokio::spawn(run_page(page(&api), props(), inputs_rx, None, view_tx));
    view_rx
        .wait_for(|state| state.phase == PagePhase::Settled)
        .await
        .expect("first settle");

    inputs_tx
        .send(PageInput::Props(props().with_cluster("west")))
        .await
        .expect("send props");
    view_rx
        .wait_for(|state| {
            state.cluster.as_deref() == Some("west") && state.phase == PagePhase::Settled
        })
        .await
        .expect("second settle");

    drop(inputs_tx);
    handle.await.expect("driver task");
    assert_eq!(api.count(Endpoint::ServiceDetail).await, 2);
}

#[tokio::test(start_paused = true)]
async fn refresh_interval_triggers_refetch() {
    let api = answering_api().await;
    let (inputs_tx, inputs_rx) = mpsc::channel(8);
    let (view_tx, mut view_rx) = watch::channel(PageState::default());

    let handle = tokio::spawn(run_page(
        page(&api),
        props(),
        inputs_rx,
        Some(Duration::from_secs(15)),
        view_tx,
    ));
    view_rx
        .wait_for(|state| state.phase == PagePhase::Settled)
        .await
        .expect("first settle");

    tokio::time::advance(Duration::from_secs(16)).await;
    view_rx
        .wait_for(|state| state.last_refresh_at > TimeInMilliseconds(1_000))
        .await
        .expect("refresh published");

    inputs_tx.send(PageInput::Dispose).await.expect("send dispose");
    handle.await.expect("driver task");
    assert!(api.count(Endpoint::ServiceDetail).await >= 2);
}
