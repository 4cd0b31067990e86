//! Command dispatch integration tests: fail-fast contracts, calibration,
//! clamping, and acknowledgment handling.

mod common;

use std::time::Duration;

use common::{test_config, Behavior, MockDevice};
use rehalink::{Command, DeviceClass, DeviceRegistry, LinkError};

#[tokio::test]
async fn calibrate_without_a_session_sends_nothing() {
    let device = MockDevice::spawn(Behavior::plank()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), DeviceClass::Plank, device.addr().port());

    let registry = DeviceRegistry::new(config).unwrap();
    let err = registry
        .send(DeviceClass::Plank, Command::Calibrate)
        .await
        .unwrap_err();

    assert!(matches!(err, LinkError::NotConnected(DeviceClass::Plank)));
    assert!(device.seen().await.is_empty());
}

#[tokio::test]
async fn calibrate_sends_the_opcode_fire_and_forget() {
    let device = MockDevice::spawn(Behavior::plank()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), DeviceClass::Plank, device.addr().port());

    let mut registry = DeviceRegistry::new(config)
        .unwrap()
        .with_scan_targets(DeviceClass::Plank, vec![device.addr()]);
    registry.connect(DeviceClass::Plank).await.unwrap();

    registry
        .send(DeviceClass::Plank, Command::Calibrate)
        .await
        .unwrap();

    // Fire-and-forget: give the datagram a beat to land.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(device.seen().await.contains(&"567".to_string()));
}

#[tokio::test]
async fn stimulation_is_clamped_and_acknowledged() {
    let device = MockDevice::spawn(Behavior::stimulator()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), DeviceClass::Stimulator, device.addr().port());

    let mut registry = DeviceRegistry::new(config)
        .unwrap()
        .with_scan_targets(DeviceClass::Stimulator, vec![device.addr()]);
    registry.connect(DeviceClass::Stimulator).await.unwrap();

    // Wildly out-of-range parameters are clamped, not rejected.
    registry
        .send(
            DeviceClass::Stimulator,
            Command::SetStimulation {
                mode: 99,
                power: -5,
            },
        )
        .await
        .unwrap();

    // In-range parameters pass through unchanged.
    registry
        .send(
            DeviceClass::Stimulator,
            Command::SetStimulation { mode: 4, power: 10 },
        )
        .await
        .unwrap();

    let seen = device.seen().await;
    assert!(seen.contains(&"SET:0,8".to_string()));
    assert!(seen.contains(&"SET:10,4".to_string()));
}

#[tokio::test]
async fn missing_acknowledgment_is_a_command_timeout() {
    let device = MockDevice::spawn(Behavior {
        command_ack: None,
        ..Behavior::stimulator()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), DeviceClass::Stimulator, device.addr().port());

    let mut registry = DeviceRegistry::new(config)
        .unwrap()
        .with_scan_targets(DeviceClass::Stimulator, vec![device.addr()]);
    registry.connect(DeviceClass::Stimulator).await.unwrap();

    let err = registry
        .send(
            DeviceClass::Stimulator,
            Command::SetStimulation { mode: 2, power: 5 },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LinkError::CommandTimeout(DeviceClass::Stimulator)
    ));
}

#[tokio::test]
async fn non_success_reply_is_a_rejection() {
    let device = MockDevice::spawn(Behavior {
        command_ack: Some("ERR"),
        ..Behavior::stimulator()
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), DeviceClass::Stimulator, device.addr().port());

    let mut registry = DeviceRegistry::new(config)
        .unwrap()
        .with_scan_targets(DeviceClass::Stimulator, vec![device.addr()]);
    registry.connect(DeviceClass::Stimulator).await.unwrap();

    let err = registry
        .send(
            DeviceClass::Stimulator,
            Command::SetStimulation { mode: 2, power: 5 },
        )
        .await
        .unwrap_err();
    match err {
        LinkError::CommandRejected { class, reply } => {
            assert_eq!(class, DeviceClass::Stimulator);
            assert_eq!(reply, "ERR");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn commands_are_routed_by_device_class() {
    let device = MockDevice::spawn(Behavior::plank()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path(), DeviceClass::Plank, device.addr().port());

    let mut registry = DeviceRegistry::new(config)
        .unwrap()
        .with_scan_targets(DeviceClass::Plank, vec![device.addr()]);
    registry.connect(DeviceClass::Plank).await.unwrap();

    // A stimulation command has no meaning for the plank.
    let err = registry
        .send(
            DeviceClass::Plank,
            Command::SetStimulation { mode: 1, power: 1 },
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LinkError::UnsupportedCommand {
            class: DeviceClass::Plank,
            ..
        }
    ));
}
