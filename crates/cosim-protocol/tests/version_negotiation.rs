use std::thread;
use std::time::Duration;

use cosim_net::{Channel, Listener};
use cosim_protocol::{codec_for_version, negotiate, read_connect_ok, ConnectFrame, ConnectOkFrame, FrameKind};
use cosim_types::{constants, Mode, SimulationState, Writer};

/// Spec §8 scenario 5: client advertises V2, server only implements V1;
/// `ConnectOk` carries V1 first and omits FlexRay fields.
#[test]
fn server_down_negotiates_to_its_own_latest_version() {
    const SERVER_LATEST_VERSION: u32 = constants::PROTOCOL_V1;

    let mut listener = Listener::bind_tcp(0, false).unwrap();
    let port = listener.local_port().unwrap();

    let server = thread::spawn(move || {
        let stream = loop {
            if let Some(stream) = listener.accept(Duration::from_millis(100)).unwrap() {
                break stream;
            }
        };
        let mut channel = Channel::new(stream);

        channel.begin_read_frame().unwrap();
        assert_eq!(FrameKind::read(&mut channel).unwrap(), FrameKind::Connect);
        let connect = ConnectFrame::read(&mut channel).unwrap();
        assert_eq!(connect.server_name, "sim-a");

        let negotiated = negotiate(connect.version).min(SERVER_LATEST_VERSION);
        let codec = codec_for_version(negotiated);

        FrameKind::ConnectOk.write(&mut channel).unwrap();
        let payload = ConnectOkFrame {
            version: codec.version(),
            step_size: 1_000_000,
            state: SimulationState::Stopped,
            can_controllers: vec![],
            eth_controllers: vec![],
            lin_controllers: vec![],
            fr_controllers: vec![],
            incoming_signals: vec![],
            outgoing_signals: vec![],
        };
        codec.write_connect_ok(&mut channel, &payload).unwrap();
        channel.end_write().unwrap();
    });

    let stream = cosim_net::tcp_connect("127.0.0.1", port, 0).unwrap();
    let mut channel = Channel::new(stream);

    FrameKind::Connect.write(&mut channel).unwrap();
    ConnectFrame {
        version: constants::PROTOCOL_V2,
        mode: Mode::Default,
        server_name: "sim-a".into(),
        client_name: "client-a".into(),
    }
    .write(&mut channel)
    .unwrap();
    channel.end_write().unwrap();

    channel.begin_read_frame().unwrap();
    assert_eq!(FrameKind::read(&mut channel).unwrap(), FrameKind::ConnectOk);
    let connect_ok = read_connect_ok(&mut channel).unwrap();

    assert_eq!(connect_ok.version, constants::PROTOCOL_V1);
    assert_eq!(connect_ok.step_size, 1_000_000);
    assert!(connect_ok.fr_controllers.is_empty());

    server.join().unwrap();
}
