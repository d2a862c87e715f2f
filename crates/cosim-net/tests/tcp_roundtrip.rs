use std::thread;
use std::time::Duration;

use cosim_net::{Channel, Listener, Reader, Writer};

#[test]
fn tcp_roundtrip() {
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
        let sim_time = channel.read_i64().unwrap();
        let name = channel.read_string().unwrap();

        channel.write_i64(sim_time + 1).unwrap();
        channel.write_string(&name).unwrap();
        channel.end_write().unwrap();
    });

    let stream = cosim_net::tcp_connect("127.0.0.1", port, 0).unwrap();
    let mut channel = Channel::new(stream);
    channel.write_i64(42).unwrap();
    channel.write_string("client-a").unwrap();
    channel.end_write().unwrap();

    channel.begin_read_frame().unwrap();
    assert_eq!(channel.read_i64().unwrap(), 43);
    assert_eq!(channel.read_string().unwrap(), "client-a");

    server.join().unwrap();
}

#[test]
fn local_transport_roundtrip() {
    let name = format!("test-{}", std::process::id());
    let mut listener = Listener::bind_local(&name).unwrap();

    let server = thread::spawn(move || {
        let stream = loop {
            if let Some(stream) = listener.accept(Duration::from_millis(100)).unwrap() {
                break stream;
            }
        };
        let mut channel = Channel::new(stream);
        channel.begin_read_frame().unwrap();
        assert_eq!(channel.read_u32().unwrap(), 7);
    });

    // Give the listener a moment to bind before the client dials in.
    thread::sleep(Duration::from_millis(20));
    let stream = cosim_net::local_connect(&name).unwrap();
    let mut channel = Channel::new(stream);
    channel.write_u32(7).unwrap();
    channel.end_write().unwrap();

    server.join().unwrap();
}
