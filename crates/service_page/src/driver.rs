//! Event loop that hosts one page controller for its mounted lifetime.

use std::time::Duration;

use tokio::{
    sync::{mpsc, watch},
    time::{self, Interval, MissedTickBehavior},
};
use tracing::debug;

use crate::{
    context::ServiceDetailsProps,
    controller::{PageIntent, ServiceDetailsController},
    state::PageState,
};

pub enum PageInput {
    Props(ServiceDetailsProps),
    Intent(PageIntent),
    Dispose,
}

/// Mounts the controller with `initial`, then multiplexes prop updates,
/// intents, refresh ticks and fetch settlements until `inputs` closes or a
/// [`PageInput::Dispose`] arrives. Every state change is published on `view`.
/// Returns the last published state.
pub async fn run_page(
    mut controller: ServiceDetailsController,
    initial: ServiceDetailsProps,
    mut inputs: mpsc::Receiver<PageInput>,
    refresh_interval: Option<Duration>,
    view: watch::Sender<PageState>,
) -> PageState {
    let mut ticker = refresh_interval.map(|period| {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    controller.on_mount(initial);
    publish(&view, &controller);

    loop {
        let idle = controller.pending_fetches() == 0;
        tokio::select! {
            input = inputs.recv() => match input {
                Some(PageInput::Props(props)) => {
                    controller.on_props_changed(props);
                }
                Some(PageInput::Intent(intent)) => controller.handle_intent(intent),
                Some(PageInput::Dispose) | None => break,
            },
            _ = next_tick(&mut ticker) => {
                debug!("refresh tick");
                controller.handle_intent(PageIntent::Refresh);
            }
            _ = controller.settle_next(), if !idle => {}
        }
        publish(&view, &controller);
    }

    controller.dispose();
    let last = controller.state().clone();
    view.send_replace(last.clone());
    last
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn publish(view: &watch::Sender<PageState>, controller: &ServiceDetailsController) {
    view.send_if_modified(|current| {
        if current == controller.state() {
            false
        } else {
            *current = controller.state().clone();
            true
        }
    });
}

#[cfg(test)]
#[path = "tests/driver_tests.rs"]
mod tests;
