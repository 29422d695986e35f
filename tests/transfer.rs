use std::net::{SocketAddr, UdpSocket};
use std::path::Path;
use std::thread;
use std::time::Duration;

use tempfile::{TempDir, tempdir};
use xtftp::tftp::client::{Client, ClientConfig, Operation, run_transfer};
use xtftp::tftp::core::{
    BLOCK_SIZE, EncodeError, ErrorCode, Options, Packet, StorageError, TransferError,
    TransferMode,
};
use xtftp::tftp::server::{Config, Server};

fn options() -> Options {
    Options::new(Duration::from_millis(200), 3)
}

/// Start a server on a loopback port serving a fresh directory
fn start_server(read_only: bool, single_port: bool) -> (SocketAddr, TempDir) {
    let root = tempdir().unwrap();
    let config = Config::new(
        "127.0.0.1".parse().unwrap(),
        0,
        root.path().to_path_buf(),
        read_only,
    )
    .with_single_port(single_port)
    .with_options(options());

    let mut server = Server::new(&config).unwrap();
    let addr = server.local_addr().unwrap();
    thread::spawn(move || server.listen());
    (addr, root)
}

fn client(addr: SocketAddr) -> Client {
    let mut config = ClientConfig::new(addr.ip(), addr.port());
    config.options = options();
    Client::new(config)
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

fn check_get(single_port: bool, len: usize) {
    let (addr, root) = start_server(false, single_port);
    let content = pattern(len);
    std::fs::write(root.path().join("f.bin"), &content).unwrap();

    let local = tempdir().unwrap();
    let target = local.path().join("f.bin");
    let summary = client(addr).get("f.bin", &target).unwrap();

    assert_eq!(summary.bytes, len as u64);
    assert_eq!(summary.blocks, (len / BLOCK_SIZE + 1) as u64);
    assert_eq!(std::fs::read(&target).unwrap(), content);
}

fn check_put(single_port: bool, len: usize) {
    let (addr, root) = start_server(false, single_port);
    let content = pattern(len);
    let local = tempdir().unwrap();
    let source = local.path().join("g.bin");
    std::fs::write(&source, &content).unwrap();

    let summary = client(addr).put(&source, "g.bin").unwrap();
    assert_eq!(summary.bytes, len as u64);

    // the server finishes writing right after its last ACK
    let target = root.path().join("g.bin");
    for _ in 0..50 {
        if std::fs::read(&target).map(|b| b == content).unwrap_or(false) {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("uploaded file never matched");
}

#[test]
fn get_multi_block_file() {
    check_get(false, 1000);
}

#[test]
fn get_exact_block_multiple() {
    check_get(false, BLOCK_SIZE * 3);
}

#[test]
fn get_empty_file() {
    check_get(false, 0);
}

#[test]
fn get_single_port() {
    check_get(true, 5000);
}

#[test]
fn put_small_file() {
    check_put(false, 10);
}

#[test]
fn put_large_file_single_port() {
    check_put(true, BLOCK_SIZE * 20 + 7);
}

#[test]
fn get_missing_file_reports_not_found() {
    let (addr, _root) = start_server(false, false);
    let local = tempdir().unwrap();
    let target = local.path().join("nothing");

    match client(addr).get("nothing", &target) {
        Err(TransferError::Peer { code, .. }) => assert_eq!(code, ErrorCode::FileNotFound),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!target.exists());
}

#[test]
fn read_only_server_rejects_put() {
    let (addr, root) = start_server(true, false);
    let local = tempdir().unwrap();
    let source = local.path().join("up.bin");
    std::fs::write(&source, b"data").unwrap();

    match client(addr).put(&source, "up.bin") {
        Err(TransferError::Peer { code, .. }) => assert_eq!(code, ErrorCode::AccessViolation),
        other => panic!("unexpected {:?}", other),
    }
    assert!(!root.path().join("up.bin").exists());
}

#[test]
fn put_missing_local_file_fails_locally() {
    let (addr, _root) = start_server(false, false);
    let err = client(addr)
        .put(Path::new("/definitely/not/here"), "x")
        .unwrap_err();
    assert!(matches!(err, TransferError::Io(_)));
}

#[test]
fn filename_with_zero_byte_is_refused_locally() {
    let (addr, _root) = start_server(false, false);
    let local = tempdir().unwrap();
    let err = client(addr)
        .get("a\0b", &local.path().join("a"))
        .unwrap_err();
    assert!(matches!(
        err,
        TransferError::Request(EncodeError::InteriorNul { field: "filename" })
    ));
}

#[test]
fn path_traversal_is_rejected() {
    let (addr, _root) = start_server(false, false);
    let local = tempdir().unwrap();
    match client(addr).get("../etc/passwd", &local.path().join("passwd")) {
        Err(TransferError::Peer { code, message }) => {
            assert_eq!(code, ErrorCode::AccessViolation);
            assert_eq!(message, StorageError::AccessViolation.to_string());
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn unresponsive_server_times_out() {
    // bound but never answering
    let silent = UdpSocket::bind("127.0.0.1:0").unwrap();
    let addr = silent.local_addr().unwrap();
    let local = tempdir().unwrap();

    let err = client(addr)
        .get("f.bin", &local.path().join("f.bin"))
        .unwrap_err();
    assert!(matches!(err, TransferError::Timeout { retries: 3 }));
}

/// A server answering RRQ with ACK is told about the illegal operation
#[test]
fn unexpected_reply_is_reported_to_server() {
    let fake = UdpSocket::bind("127.0.0.1:0").unwrap();
    fake.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    let addr = fake.local_addr().unwrap();

    let responder = thread::spawn(move || {
        let mut buf = [0u8; 1024];
        let (_, client) = fake.recv_from(&mut buf).unwrap();
        fake.send_to(&Packet::Ack(5).serialize(), client).unwrap();
        let (amt, _) = fake.recv_from(&mut buf).unwrap();
        Packet::deserialize(&buf[..amt]).unwrap()
    });

    let local = tempdir().unwrap();
    let err = client(addr)
        .get("f.bin", &local.path().join("f.bin"))
        .unwrap_err();
    assert!(matches!(err, TransferError::UnexpectedPacket { .. }));
    assert!(matches!(
        responder.join().unwrap(),
        Packet::Error {
            code: ErrorCode::IllegalOperation,
            ..
        }
    ));
}

#[test]
fn run_transfer_round_trip() {
    let (addr, root) = start_server(false, false);
    std::fs::write(root.path().join("rt.txt"), b"hello world").unwrap();
    let local = tempdir().unwrap();
    let target = local.path().join("rt.txt");

    run_transfer(
        addr,
        Operation::Get,
        TransferMode::NetAscii,
        "rt.txt",
        &target,
    )
    .unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"hello world");
}

/// Speak the protocol by hand and check every packet of a 1000-byte GET
#[test]
fn get_wire_exchange() {
    let (addr, root) = start_server(false, false);
    std::fs::write(root.path().join("f.bin"), pattern(1000)).unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let rrq = Packet::Rrq {
        filename: "f.bin".into(),
        mode: "OCTET".into(),
    };
    socket.send_to(&rrq.serialize(), addr).unwrap();

    let mut buf = [0u8; 1024];
    let (amt, peer) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(
        Packet::deserialize(&buf[..amt]).unwrap(),
        Packet::Data {
            block_num: 1,
            data: pattern(1000)[..BLOCK_SIZE].to_vec()
        }
    );

    socket.send_to(&Packet::Ack(1).serialize(), peer).unwrap();
    let (amt, _) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(
        Packet::deserialize(&buf[..amt]).unwrap(),
        Packet::Data {
            block_num: 2,
            data: pattern(1000)[BLOCK_SIZE..].to_vec()
        }
    );

    socket.send_to(&Packet::Ack(2).serialize(), peer).unwrap();
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .unwrap();
    assert!(socket.recv_from(&mut buf).is_err(), "no packet after final ACK");
}

/// Filenames travel as raw bytes, so a Latin-1 name finds its own file
#[cfg(unix)]
#[test]
fn non_utf8_filename_reaches_the_right_file() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (addr, root) = start_server(false, false);
    std::fs::write(root.path().join(OsStr::from_bytes(b"caf\xe9.txt")), b"latin-1").unwrap();
    std::fs::write(root.path().join("caf\u{fffd}.txt"), b"replaced").unwrap();

    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let rrq = Packet::rrq(b"caf\xe9.txt".to_vec(), "octet").unwrap();
    socket.send_to(&rrq.serialize(), addr).unwrap();

    let mut buf = [0u8; 1024];
    let (amt, peer) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(
        Packet::deserialize(&buf[..amt]).unwrap(),
        Packet::Data {
            block_num: 1,
            data: b"latin-1".to_vec()
        }
    );
    socket.send_to(&Packet::Ack(1).serialize(), peer).unwrap();
}

/// WRQ, ACK 0, one short DATA block, ACK 1
#[test]
fn put_wire_exchange() {
    let (addr, root) = start_server(false, true);
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();

    let wrq = Packet::Wrq {
        filename: "g.bin".into(),
        mode: "octet".into(),
    };
    socket.send_to(&wrq.serialize(), addr).unwrap();

    let mut buf = [0u8; 1024];
    let (amt, peer) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(peer, addr, "single port mode answers from the listening port");
    assert_eq!(Packet::deserialize(&buf[..amt]).unwrap(), Packet::Ack(0));

    let data = Packet::Data {
        block_num: 1,
        data: vec![b'x'; 10],
    };
    socket.send_to(&data.serialize(), peer).unwrap();
    let (amt, _) = socket.recv_from(&mut buf).unwrap();
    assert_eq!(Packet::deserialize(&buf[..amt]).unwrap(), Packet::Ack(1));

    let target = root.path().join("g.bin");
    for _ in 0..50 {
        if std::fs::read(&target).map(|b| b == vec![b'x'; 10]).unwrap_or(false) {
            return;
        }
        thread::sleep(Duration::from_millis(20));
    }
    panic!("uploaded file never matched");
}

/// Malformed datagrams must not take the listener down
#[test]
fn listener_survives_garbage() {
    let (addr, root) = start_server(false, false);
    std::fs::write(root.path().join("ok.txt"), b"still here").unwrap();

    let noise = UdpSocket::bind("127.0.0.1:0").unwrap();
    for garbage in [&[][..], &[0][..], &[0, 9, 1, 2][..], &[0, 1][..], &[0, 5, 0, 1][..]] {
        noise.send_to(garbage, addr).unwrap();
    }
    noise.send_to(&vec![0u8; 2000], addr).unwrap();

    let local = tempdir().unwrap();
    let target = local.path().join("ok.txt");
    client(addr).get("ok.txt", &target).unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"still here");
}

#[test]
fn concurrent_transfers_do_not_mix() {
    let (addr, root) = start_server(false, true);
    for i in 0..4 {
        std::fs::write(root.path().join(format!("{i}.bin")), pattern(3000 + i * 100)).unwrap();
    }

    let handles: Vec<_> = (0..4)
        .map(|i| {
            thread::spawn(move || {
                let local = tempdir().unwrap();
                let target = local.path().join("out.bin");
                client(addr)
                    .transfer(Operation::Get, &format!("{i}.bin"), &target)
                    .unwrap();
                std::fs::read(&target).unwrap()
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        assert_eq!(handle.join().unwrap(), pattern(3000 + i * 100));
    }
}
