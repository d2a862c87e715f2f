use cosim_portmapper::{get_port, set_port, unset_port, PortMapperServer};

/// Spec §8 scenario 4 groundwork: a server registers a name, a client
/// resolves it, then the name is retired.
#[test]
fn set_get_unset_round_trip() {
    let mapper = PortMapperServer::start(0, false).unwrap();
    let mapper_port = mapper.port();

    set_port("127.0.0.1", mapper_port, "sim-a", 4242).unwrap();
    assert_eq!(get_port("127.0.0.1", mapper_port, "sim-a").unwrap(), 4242);

    unset_port("127.0.0.1", mapper_port, "sim-a").unwrap();
    assert!(get_port("127.0.0.1", mapper_port, "sim-a").is_err());
}

#[test]
fn get_port_for_unknown_name_is_an_error() {
    let mapper = PortMapperServer::start(0, false).unwrap();
    assert!(get_port("127.0.0.1", mapper.port(), "never-registered").is_err());
}

#[test]
fn set_port_overwrites_existing_registration() {
    let mapper = PortMapperServer::start(0, false).unwrap();
    let mapper_port = mapper.port();

    set_port("127.0.0.1", mapper_port, "sim-a", 1).unwrap();
    set_port("127.0.0.1", mapper_port, "sim-a", 2).unwrap();
    assert_eq!(get_port("127.0.0.1", mapper_port, "sim-a").unwrap(), 2);
}
