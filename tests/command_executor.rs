mod common;

use std::time::Duration;

use common::{test_profile, MockDevice, PORT};
use projector_control_lib::device::Command;
use projector_control_lib::serial::{ProjectorProtocol, SerialError, SerialInterface};

fn protocol_for(device: &MockDevice) -> ProjectorProtocol {
    let profile = test_profile(Duration::ZERO);
    let interface = SerialInterface::with_link(device.link(), &profile, PORT);
    ProjectorProtocol::new(interface, profile)
}

#[tokio::test]
async fn test_execute_returns_reply_value() {
    let device = MockDevice::new();
    device.set_power("ON");
    let mut protocol = protocol_for(&device);

    let value = protocol.run(Command::Status).await.expect("status");
    assert_eq!(value, "ON");
    assert_eq!(device.writes(), vec!["\r".to_string(), "*pow=?#\r".to_string()]);
}

#[tokio::test]
async fn test_failed_response_is_retried_exactly_once() {
    let device = MockDevice::new();
    device.reply_always("*pow=?#\r", "*Block item#");
    let mut protocol = protocol_for(&device);

    match protocol.run(Command::Status).await {
        Err(SerialError::CommandFailed { command, response }) => {
            assert_eq!(command, "*pow=?#");
            assert_eq!(response, "*Block item#");
        }
        other => panic!("expected command failure, got {:?}", other),
    }
    assert_eq!(device.count_writes("*pow=?#\r"), 2, "one attempt plus one retry");
    assert_eq!(device.count_writes("\r"), 1, "retry does not repeat the handshake");
}

#[tokio::test]
async fn test_retry_recovers_after_single_failed_response() {
    let device = MockDevice::new();
    device.set_lamp_hours("4321");
    device.reply_once("*ltim=?#\r", "*Block item#\r\n");
    let mut protocol = protocol_for(&device);

    let value = protocol.run(Command::LampHours).await.expect("lamp hours after retry");
    assert_eq!(value, "4321");
    assert_eq!(device.count_writes("*ltim=?#\r"), 2);
}

#[tokio::test]
async fn test_retry_waits_for_backoff() {
    let device = MockDevice::new();
    device.reply_once("*pow=?#\r", "*Block item#");
    let mut profile = test_profile(Duration::ZERO);
    profile.retry_backoff = Duration::from_millis(50);
    let interface = SerialInterface::with_link(device.link(), &profile, PORT);
    let mut protocol = ProjectorProtocol::new(interface, profile);

    let started = std::time::Instant::now();
    protocol.run(Command::Status).await.expect("status after retry");
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn test_handshake_mismatch_never_sends_command() {
    let device = MockDevice::new();
    device.set_prompt("?");
    let mut protocol = protocol_for(&device);

    match protocol.run(Command::On).await {
        Err(SerialError::ProtocolError { expected, received }) => {
            assert_eq!(expected, ">");
            assert_eq!(received, "?");
        }
        other => panic!("expected protocol error, got {:?}", other),
    }
    assert_eq!(device.writes(), vec!["\r".to_string()], "only the probe was written");
}

#[tokio::test]
async fn test_malformed_reply_is_reported() {
    let device = MockDevice::new();
    device.reply_always("*modelname=?#\r", "garbage");
    let mut protocol = protocol_for(&device);

    let err = protocol.run(Command::Model).await.unwrap_err();
    assert!(matches!(err, SerialError::MalformedResponse(_)), "got {:?}", err);
    assert!(!err.demotes_link());
}

#[tokio::test]
async fn test_link_failure_is_a_connection_error() {
    let device = MockDevice::new();
    device.set_io_failure(true);
    let mut protocol = protocol_for(&device);

    let err = protocol.run(Command::Status).await.unwrap_err();
    assert!(err.is_connection_error(), "got {:?}", err);
    assert!(err.demotes_link());
}

#[tokio::test]
async fn test_closed_interface_is_not_connected() {
    let device = MockDevice::new();
    let profile = test_profile(Duration::ZERO);
    let mut interface = SerialInterface::with_link(device.link(), &profile, PORT);
    interface.close();

    assert!(!interface.is_connected());
    assert!(matches!(interface.handshake().await, Err(SerialError::NotConnected)));
    assert_eq!(device.closes(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn test_interface_keeps_link_across_blocking_io() {
    let device = MockDevice::new();
    let profile = test_profile(Duration::ZERO);
    let mut interface = SerialInterface::with_link(device.link(), &profile, PORT);

    device.set_io_failure(true);
    assert!(matches!(interface.handshake().await, Err(SerialError::IoError(_))));
    assert!(interface.is_connected(), "link is handed back after a failed write");

    device.set_io_failure(false);
    interface.handshake().await.expect("handshake after recovery");
    assert_eq!(interface.send_raw("*pow=?#").await.expect("reply"), "*POW=OFF#");
    assert_eq!(device.closes(), 0);
}
