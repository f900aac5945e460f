//! Command dispatcher: gate order, acknowledgments and field handling.

use serde_json::json;
use wfms::app::events::HostFrame;
use wfms::control::policy::ControlMode;
use wfms::drivers::button::ButtonAction;

use crate::mock_mesh::{COMMAND_SPACING_MS, MeshCall, Rig};

#[test]
fn info_emits_snapshot_and_ack() {
    let mut rig = Rig::joined();
    rig.sink.clear();

    assert_eq!(rig.send(r#"{"id":1,"op":"info"}"#), 1);

    assert!(matches!(rig.sink.frames[0], HostFrame::Info(_)));
    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.id, ack.ok, ack.msg.as_str()), (1, true, "info"));
}

#[test]
fn missing_and_unknown_op_are_rejected() {
    let mut rig = Rig::joined();

    rig.send(r#"{"id":1}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "missing op");

    rig.send(r#"{"id":2,"op":"self_destruct"}"#);
    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.id, ack.ok, ack.msg.as_str()), (2, false, "unknown op"));
}

#[test]
fn duplicate_id_is_logged_without_ack() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":4,"op":"info"}"#);
    rig.send(r#"{"id":4,"op":"info"}"#);

    assert_eq!(rig.sink.acks_for(4).len(), 1);
    let dup = rig.sink.logs("duplicate");
    assert_eq!(dup.len(), 1);
    assert_eq!(dup[0].tag, "CMD");
    assert_eq!(dup[0].field("id"), Some(&json!(4)));
    assert_eq!(dup[0].field("ignored"), Some(&json!(true)));
}

#[test]
fn repeated_id_after_window_runs_again() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":4,"op":"info"}"#);
    rig.advance(2_000);
    rig.send(r#"{"id":4,"op":"info"}"#);
    assert_eq!(rig.sink.acks_for(4).len(), 2);
}

#[test]
fn commands_without_id_are_never_deduplicated() {
    let mut rig = Rig::joined();
    rig.send(r#"{"op":"info"}"#);
    rig.send(r#"{"op":"info"}"#);
    assert_eq!(rig.sink.acks_for(-1).len(), 2);
    assert!(rig.sink.logs("duplicate").is_empty());
}

#[test]
fn mode_set_is_debounced_per_class() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"mode_set","value":"auto"}"#);
    rig.advance(100);
    rig.send_now(r#"{"id":2,"op":"mode_set","value":"manual"}"#);

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.id, ack.ok, ack.msg.as_str()), (2, false, "debounced"));
    assert_eq!(rig.app.mode(), ControlMode::Auto);

    rig.advance(500);
    rig.send_now(r#"{"id":3,"op":"mode_set","value":"manual"}"#);
    assert!(rig.sink.last_ack().unwrap().ok);
    assert_eq!(rig.app.mode(), ControlMode::Manual);
}

#[test]
fn debounce_classes_are_independent() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"mode_set","value":"manual"}"#);
    rig.send_now(r#"{"id":2,"op":"valve_set","value":"open"}"#);

    assert_eq!(rig.mesh.unicasts().len(), 1);
    assert!(rig.sink.acks_for(2).is_empty(), "valve ack waits for completion");
}

#[test]
fn debounce_is_checked_before_mode_gate() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"mode_set","value":"auto"}"#);

    rig.send(r#"{"id":2,"op":"valve_set","value":"open"}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "rejected: AUTO mode");

    rig.advance(50);
    rig.send_now(r#"{"id":3,"op":"valve_set","value":"open"}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "debounced");
    // Only the policy's own open (flow 0 is below the open threshold).
    assert_eq!(rig.mesh.valve_commands(), [true]);
}

#[test]
fn valve_value_aliases() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"valve_set","value":"close"}"#);
    rig.complete(wfms::mesh::MeshStatus::SUCCESS);
    rig.send(r#"{"id":2,"op":"valve_set","value":"sideways"}"#);

    assert_eq!(rig.mesh.valve_commands(), [false]);
    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.id, ack.msg.as_str()), (2, "value must be open/closed"));
}

#[test]
fn net_cfg_set_accepts_hex_and_decimal_text() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"net_cfg_set","pan_id":"0xCAFE","ch":"15","tx_power":-4}"#);

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.ok, ack.msg.as_str()), (true, "net cfg updated"));
    let net = rig.app.config().network;
    assert_eq!((net.pan_id, net.channel, net.tx_power_dbm), (0xCAFE, 15, -4));
    assert!(rig.app.is_config_dirty());
    assert_eq!(rig.sink.logs("net_cfg_set")[0].field("pan_id"), Some(&json!("0xCAFE")));
}

#[test]
fn net_cfg_set_rejects_bad_channel_and_keeps_config() {
    let mut rig = Rig::joined();
    let before = rig.app.config().network;

    rig.send(r#"{"id":1,"op":"net_cfg_set","ch":27}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "bad channel");
    rig.send(r#"{"id":2,"op":"net_cfg_set","pan_id":"0x1FFFF"}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "bad pan_id");

    assert_eq!(rig.app.config().network, before);
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn threshold_set_defaults_open_to_current_value() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"threshold_set","close_th":100}"#);

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.ok, ack.msg.as_str()), (true, "threshold updated"));
    assert_eq!((rig.app.thresholds().close(), rig.app.thresholds().open()), (100, 5));
}

#[test]
fn threshold_set_rejections() {
    let mut rig = Rig::joined();

    rig.send(r#"{"id":1,"op":"threshold_set","open_th":3}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "missing close_th");

    rig.send(r#"{"id":2,"op":"threshold_set","close_th":70000,"open_th":10}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "th too big");

    rig.send(r#"{"id":3,"op":"threshold_set","close_th":4}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "open_th must be < close_th");

    assert_eq!((rig.app.thresholds().close(), rig.app.thresholds().open()), (60, 5));
}

#[test]
fn tolerant_body_is_dispatched() {
    let mut rig = Rig::joined();
    rig.send(r#"{ "id" : 12 , "op" : mode_set, "value":auto }"#);
    assert_eq!(rig.app.mode(), ControlMode::Auto);
    assert!(rig.sink.acks_for(12)[0].ok);
}

#[test]
fn bind_set_writes_binding_entry() {
    let mut rig = Rig::joined();
    rig.send(
        r#"{"id":1,"op":"bind_set","index":2,"src_ep":2,"dst_ep":1,"cluster":"0x0006","eui64":"00124B0001020304"}"#,
    );

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.ok, ack.msg.as_str()), (true, "bind_set"));
    assert!(matches!(
        rig.mesh.calls.last(),
        Some(MeshCall::SetBinding { index: 2, entry }) if entry.cluster == 0x0006
    ));

    rig.mesh.binding_result = Err(wfms::mesh::MeshStatus::INVALID_CALL);
    rig.send(
        r#"{"id":2,"op":"bind_set","index":2,"src_ep":2,"dst_ep":1,"cluster":6,"eui64":"00124B0001020304"}"#,
    );
    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.ok, ack.msg.as_str()), (false, "bind_set failed"));
    assert_eq!(ack.zstatus, Some(wfms::mesh::MeshStatus::INVALID_CALL));
}

#[test]
fn bind_set_requires_cluster() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"bind_set","index":2,"src_ep":2,"dst_ep":1,"eui64":"00124B0001020304"}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "missing cluster");
    rig.send(r#"{"id":2,"op":"bind_set","index":2,"src_ep":2,"dst_ep":1,"cluster":"0x10000","eui64":"00124B0001020304"}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "bad cluster");
}

#[test]
fn disabled_gateway_ignores_host_until_button_toggles_it_back() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"uart_gateway_set","enable":0}"#);
    assert!(!rig.app.gateway_enabled());
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "uart_gateway_set");

    assert_eq!(rig.send(r#"{"id":2,"op":"info"}"#), 0);
    assert!(rig.sink.acks_for(2).is_empty());

    // No periodic frames while disabled.
    rig.sink.clear();
    rig.advance(60_000);
    rig.tick();
    assert!(rig.sink.data().is_empty());
    assert!(rig.sink.infos().is_empty());

    rig.buttons.raise(ButtonAction::ToggleGateway);
    rig.advance(COMMAND_SPACING_MS);
    rig.tick();
    assert!(rig.app.gateway_enabled());
    let log = rig.sink.logs("uart_gateway");
    assert_eq!(log[0].field("src"), Some(&json!("pb0_long")));
    assert_eq!(log[0].field("enabled"), Some(&json!(true)));
}

#[test]
fn lines_after_gateway_off_in_same_read_are_ignored() {
    let mut rig = Rig::joined();
    rig.advance(COMMAND_SPACING_MS);
    let n = rig.feed(
        "@CMD {\"id\":1,\"op\":\"uart_gateway_set\",\"enable\":0}\r\n\
         @CMD {\"id\":2,\"op\":\"info\"}\r\n",
    );
    assert_eq!(n, 1);
    assert!(rig.sink.acks_for(2).is_empty());
}

#[test]
fn partial_line_is_dropped_when_gateway_resumes() {
    let mut rig = Rig::joined();
    rig.advance(COMMAND_SPACING_MS);
    assert_eq!(rig.feed("@CMD {\"id\":2,\"op\":\"in"), 0);

    // Long press off and on again between host reads.
    rig.buttons.raise(ButtonAction::ToggleGateway);
    rig.tick();
    rig.buttons.raise(ButtonAction::ToggleGateway);
    rig.tick();
    assert!(rig.app.gateway_enabled());

    rig.advance(COMMAND_SPACING_MS);
    rig.feed("fo\"}\r\n@CMD {\"id\":3,\"op\":\"info\"}\r\n");
    assert!(rig.sink.acks_for(2).is_empty(), "stale prefix was not completed");
    assert!(rig.sink.acks_for(3)[0].ok);
}

#[test]
fn over_long_line_is_dropped_and_counted() {
    let mut rig = Rig::joined();
    let padding = "x".repeat(300);
    rig.send(&format!(r#"{{"id":1,"op":"info","pad":"{padding}"}}"#));
    assert!(rig.sink.acks_for(1).is_empty());
    assert_eq!(rig.engine.overflows(), 1);

    rig.send(r#"{"id":2,"op":"info"}"#);
    assert_eq!(rig.sink.acks_for(2).len(), 1);
}
