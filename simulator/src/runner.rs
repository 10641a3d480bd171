use log::{debug, info};
use tokio::sync::watch;
use tokio::time;

use crate::server::Simulator;

/// Replays the scenario one step per tick. A stop ends the replay early but
/// the session still reports completion with whatever was gathered. Once a newer
/// session has started, this replay's reports are dropped by the simulator.
pub async fn run_session(sim: Simulator, generation: u64, mut stopped: watch::Receiver<bool>) {
    let script = sim.script().clone();
    let tick = script.tick();
    let total = script.steps.len();
    let mut interrupted = false;

    for (index, step) in script.steps.into_iter().enumerate() {
        tokio::select! {
            _ = time::sleep(tick) => {}
            _ = stopped.changed() => {
                info!("replay interrupted after {} of {} steps", index, total);
                interrupted = true;
                break;
            }
        }
        debug!(
            "step {}/{}: {}",
            index + 1,
            total,
            step.snapshot.current_operation_label
        );
        sim.record_progress(generation, step).await;
    }

    match script.fail_with {
        Some(message) if !interrupted => sim.fail(generation, &message).await,
        _ => sim.complete(generation).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::ScenarioScript;
    use dashcore::protocol::{MonitoringParameters, PushEvent, VisualizationMode};

    fn params() -> MonitoringParameters {
        MonitoringParameters::new("X", "", 60, VisualizationMode::Map)
    }

    #[tokio::test(start_paused = true)]
    async fn replay_emits_every_step_then_completes() {
        let sim = Simulator::new(ScenarioScript::linear(3, 100));
        let mut events = sim.subscribe();
        assert!(sim.start(params()).await.is_success());

        let mut kinds = Vec::new();
        while let Ok(event) = events.recv().await {
            kinds.push(event.kind());
            if let PushEvent::Complete(report) = event {
                let summary = report.summary.unwrap();
                assert_eq!(summary.total_detected, 3);
                assert_eq!(summary.total_monitored, 12);
                break;
            }
        }
        assert_eq!(kinds, vec!["progress", "progress", "progress", "complete"]);
        assert!(!sim.is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cuts_the_replay_short_but_still_completes() {
        let sim = Simulator::new(ScenarioScript::linear(50, 100));
        let mut events = sim.subscribe();
        sim.start(params()).await;
        assert!(matches!(events.recv().await, Ok(PushEvent::Progress(_))));

        assert!(sim.stop().await.is_success());
        loop {
            match events.recv().await {
                Ok(PushEvent::Complete(_)) => break,
                Ok(PushEvent::Progress(_)) => continue,
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_stop_is_not_ended_by_the_previous_replay() {
        let sim = Simulator::new(ScenarioScript::linear(50, 100));
        let mut events = sim.subscribe();
        sim.start(params()).await;
        assert!(matches!(events.recv().await, Ok(PushEvent::Progress(_))));

        assert!(sim.stop().await.is_success());
        assert!(sim.start(params()).await.is_success());
        time::sleep(std::time::Duration::from_millis(150)).await;

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["progress"]);
        assert!(sim.is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_scenario_ends_with_an_error_event() {
        let mut script = ScenarioScript::linear(1, 100);
        script.fail_with = Some("capture device lost".into());
        let sim = Simulator::new(script);
        let mut events = sim.subscribe();
        sim.start(params()).await;

        assert!(matches!(events.recv().await, Ok(PushEvent::Progress(_))));
        assert_eq!(
            events.recv().await.unwrap(),
            PushEvent::Error {
                message: "capture device lost".into()
            }
        );
    }
}
