//! Network lifecycle: formation, reform, join window, buttons, rejoin.

use serde_json::json;
use wfms::drivers::button::ButtonAction;
use wfms::events::MeshEvent;
use wfms::mesh::{Eui64, MeshStatus, NetworkConfig, NetworkState, NodeId};
use wfms::network::NetPhase;

use crate::mock_mesh::{MeshCall, Rig};

#[test]
fn form_from_no_network_then_network_up_opens_join_window() {
    let mut rig = Rig::unjoined();
    rig.send(r#"{"id":1,"op":"net_form","ch":20}"#);

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.ok, ack.msg.as_str()), (true, "net_form accepted"));
    let expected = NetworkConfig {
        channel: 20,
        ..NetworkConfig::default()
    };
    assert_eq!(rig.mesh.forms(), [expected]);
    assert_eq!(rig.app.network().phase(), NetPhase::Forming);
    let start = &rig.sink.logs("form_start")[0];
    assert_eq!(start.field("src"), Some(&json!("uart")));
    assert_eq!(start.field("ch"), Some(&json!(20)));

    rig.sink.clear();
    rig.come_up();
    assert_eq!(rig.app.network().phase(), NetPhase::Joined);
    assert!(rig.app.network().join_open());
    assert_eq!(rig.mesh.count(&MeshCall::OpenJoin), 1);
    assert_eq!(rig.sink.logs("formed")[0].field("pan_id"), Some(&json!("0xBEEF")));
    let info = rig.sink.infos()[0];
    assert_eq!((info.ch, info.net_state, info.join_open), (20, 2, true));
}

#[test]
fn net_form_does_not_change_stored_network_config() {
    let mut rig = Rig::unjoined();
    rig.send(r#"{"id":1,"op":"net_form","pan_id":"0x1234"}"#);
    assert_eq!(rig.mesh.forms()[0].pan_id, 0x1234);
    assert_eq!(rig.app.config().network, NetworkConfig::default());
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn form_while_joined_without_force_is_refused() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"net_form","pan_id":"0xCAFE"}"#);

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!((ack.ok, ack.msg.as_str()), (false, "net_form rejected"));
    assert!(rig.mesh.forms().is_empty());
    assert_eq!(rig.mesh.count(&MeshCall::Leave), 0);
    assert_eq!(
        rig.sink.logs("form_skip")[0].field("reason"),
        Some(&json!("already_in_network"))
    );
}

#[test]
fn form_while_forming_reports_transition_in_progress() {
    let mut rig = Rig::unjoined();
    rig.send(r#"{"id":1,"op":"net_form"}"#);
    rig.send(r#"{"id":2,"op":"net_form","force":1}"#);

    let ack = rig.sink.last_ack().unwrap();
    assert_eq!(
        (ack.id, ack.ok, ack.msg.as_str()),
        (2, false, "busy: network transition in progress")
    );
    assert_eq!(rig.mesh.forms().len(), 1);
}

#[test]
fn formation_that_never_comes_up_can_be_retried() {
    let mut rig = Rig::unjoined();
    rig.send(r#"{"id":1,"op":"net_form","ch":20}"#);
    assert!(rig.sink.acks_for(1)[0].ok);

    // The stack gives up without a network-up or network-down event.
    rig.mesh.state = NetworkState::NoNetwork;
    rig.advance(600_000);
    rig.send(r#"{"id":2,"op":"net_form","ch":21}"#);

    let ack = rig.sink.acks_for(2)[0];
    assert_eq!((ack.ok, ack.msg.as_str()), (true, "net_form accepted"));
    let channels: Vec<u8> = rig.mesh.forms().iter().map(|c| c.channel).collect();
    assert_eq!(channels, [20, 21]);
    assert_eq!(rig.app.network().phase(), NetPhase::Forming);

    rig.mesh.state = NetworkState::NoNetwork;
    rig.buttons.raise(ButtonAction::FormNetwork);
    rig.tick();
    assert_eq!(rig.mesh.forms().len(), 3, "primary button is not locked out either");
}

#[test]
fn refused_leave_drops_pending_reform() {
    let mut rig = Rig::joined();
    rig.mesh.leave_result = Err(MeshStatus::INVALID_CALL);
    rig.send(r#"{"id":1,"op":"net_form","pan_id":"0xCAFE","force":1}"#);

    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "net_form rejected");
    assert!(rig.app.network().pending().is_none());
    assert_eq!(
        rig.sink.logs("leave_req")[0].field("zstatus"),
        Some(&json!("0x70"))
    );

    // An unrelated drop must not resurrect the refused request.
    rig.go_down();
    assert!(rig.mesh.forms().is_empty());
}

#[test]
fn join_window_closes_after_configured_time() {
    let mut rig = Rig::unjoined();
    rig.send(r#"{"id":1,"op":"net_form"}"#);
    rig.come_up();
    let opened_at = rig.now;

    rig.now = opened_at + 179_999;
    rig.tick();
    assert_eq!(rig.mesh.count(&MeshCall::CloseJoin), 0);

    rig.now = opened_at + 180_000;
    rig.tick();
    assert_eq!(rig.mesh.count(&MeshCall::CloseJoin), 1);
    assert!(!rig.app.network().join_open());
    assert_eq!(
        rig.sink.logs("close_join")[0].field("after_ms"),
        Some(&json!(180_000))
    );

    rig.now += 1_000;
    rig.tick();
    assert_eq!(rig.mesh.count(&MeshCall::CloseJoin), 1);
}

#[test]
fn primary_short_press_forms_current_config() {
    let mut rig = Rig::unjoined();
    rig.buttons.raise(ButtonAction::FormNetwork);
    rig.tick();

    assert_eq!(rig.mesh.forms(), [NetworkConfig::default()]);
    assert_eq!(rig.sink.logs("form_start")[0].field("src"), Some(&json!("pb0")));
}

#[test]
fn primary_short_press_never_forces_a_reform() {
    let mut rig = Rig::joined();
    rig.buttons.raise(ButtonAction::FormNetwork);
    rig.tick();

    assert_eq!(rig.mesh.count(&MeshCall::Leave), 0);
    let skip = &rig.sink.logs("form_skip")[0];
    assert_eq!(skip.field("src"), Some(&json!("pb0")));
}

#[test]
fn secondary_press_opens_join_window_only_when_joined() {
    let mut rig = Rig::unjoined();
    rig.buttons.raise(ButtonAction::OpenJoinWindow);
    rig.tick();
    assert_eq!(
        rig.sink.logs("pb1_open")[0].field("result"),
        Some(&json!("not_in_network"))
    );
    assert_eq!(rig.mesh.count(&MeshCall::OpenJoin), 0);

    let mut rig = Rig::joined();
    rig.buttons.raise(ButtonAction::OpenJoinWindow);
    rig.tick();
    assert_eq!(rig.sink.logs("pb1_open")[0].field("result"), Some(&json!("opened")));
    assert!(rig.app.network().join_open());
}

#[test]
fn network_down_emits_status_snapshot() {
    let mut rig = Rig::joined();
    rig.sink.clear();
    rig.go_down();
    assert_eq!(rig.sink.infos()[0].net_state, 0);
    assert_eq!(rig.app.network().phase(), NetPhase::NoNetwork);
}

#[test]
fn paired_valve_rejoin_updates_address_and_binding() {
    let mut rig = Rig::joined();
    rig.send(r#"{"id":1,"op":"valve_pair","eui64":"00:12:4B:00:AA:BB:CC:DD","node_id":"0x1111","bind_index":3}"#);
    assert_eq!(rig.sink.last_ack().unwrap().msg.as_str(), "valve_pair set");
    let eui = Eui64::parse("00124B00AABBCCDD").unwrap();

    rig.sink.clear();
    rig.deliver(MeshEvent::DeviceJoined {
        node_id: NodeId(0x2222),
        eui64: eui,
    });

    assert_eq!(rig.app.valve().target().node_id, Some(NodeId(0x2222)));
    assert!(rig.mesh.calls.contains(&MeshCall::SetBindingNode {
        index: 3,
        node_id: NodeId(0x2222),
    }));
    let update = &rig.sink.logs("valve_nodeid_update")[0];
    assert_eq!(update.field("node_id"), Some(&json!("0x2222")));
    assert_eq!(update.field("zstatus"), Some(&json!("0x00")));
    assert_eq!(rig.sink.infos().len(), 1);
}

#[test]
fn unrelated_device_join_changes_nothing() {
    let mut rig = Rig::joined();
    rig.sink.clear();
    rig.deliver(MeshEvent::DeviceJoined {
        node_id: NodeId(0x3333),
        eui64: Eui64([1, 2, 3, 4, 5, 6, 7, 8]),
    });
    assert!(rig.sink.frames.is_empty());
    assert_eq!(rig.app.valve().target().node_id, None);
}

#[test]
fn pairing_binding_failure_is_logged_but_acknowledged() {
    let mut rig = Rig::joined();
    rig.mesh.binding_result = Err(MeshStatus::INVALID_CALL);
    rig.send(r#"{"id":1,"op":"valve_pair","eui64":"00124B00AABBCCDD","node_id":4660}"#);

    assert!(rig.sink.last_ack().unwrap().ok);
    let fail = &rig.sink.logs("bind_node_fail")[0];
    assert_eq!(fail.field("index"), Some(&json!(0)));
    assert_eq!(rig.app.valve().target().node_id, Some(NodeId(0x1234)));
}
