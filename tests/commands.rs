mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{start_time, test_context, MockDevice};
use projector_control_lib::commands::{dispatch, PowerReply, PowerRequest};
use projector_control_lib::device::{CommandOutcome, ManualClock, PowerState, ProjectorController};

#[test]
fn test_parse_requests() {
    assert_eq!(" ON ".parse::<PowerRequest>(), Ok(PowerRequest::On));
    assert_eq!("off".parse::<PowerRequest>(), Ok(PowerRequest::Off));
    assert_eq!("Toggle".parse::<PowerRequest>(), Ok(PowerRequest::Toggle));
    assert_eq!("status".parse::<PowerRequest>(), Ok(PowerRequest::Status));
    assert!("reboot".parse::<PowerRequest>().is_err());
}

#[tokio::test]
async fn test_dispatch_routes_to_controller() {
    let device = MockDevice::new();
    let clock = Arc::new(ManualClock::new(start_time()));
    let controller = ProjectorController::connect(test_context(&device, clock, Duration::ZERO)).await;

    let reply = dispatch(&controller, PowerRequest::On).await.unwrap();
    assert_eq!(reply, PowerReply::Outcome(CommandOutcome::Accepted));

    match dispatch(&controller, PowerRequest::Status).await.unwrap() {
        PowerReply::Snapshot(snapshot) => assert_eq!(snapshot.power, PowerState::On),
        other => panic!("expected snapshot, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dispatch_reports_errors_as_text() {
    let device = MockDevice::new();
    device.set_open_failure(true);
    let clock = Arc::new(ManualClock::new(start_time()));
    let controller = ProjectorController::connect(test_context(&device, clock, Duration::ZERO)).await;

    let err = dispatch(&controller, PowerRequest::On).await.unwrap_err();
    assert!(err.contains("Not connected"), "got {}", err);
}

#[test]
fn test_outcome_json_shape() {
    let json = serde_json::to_value(CommandOutcome::Accepted).unwrap();
    assert_eq!(json, serde_json::json!({ "status": "accepted" }));
}
