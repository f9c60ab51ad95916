use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

use awg_core::{Engine, PlayerHandle};
use awg_hw::Hw;
use awg_hw::fake::FakeHwBackend;

fn test_engine() -> (Arc<Engine>, awg_hw::fake::RecordedEvents, PlayerHandle) {
    let (backend, events) = FakeHwBackend::new();
    let engine = Arc::new(Engine::new(Hw::from_backend(Box::new(backend)), Duration::from_millis(2)));
    let player = engine.spawn_player(None);
    (engine, events, player)
}

fn spawn_queued_server(engine: Arc<Engine>) -> (std::net::SocketAddr, Arc<AtomicUsize>, std::thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = Arc::new(AtomicUsize::new(0));
    let thread_stop = Arc::clone(&stop);
    let handle = std::thread::spawn(move || {
        awg_net::serve_queued(&listener, &engine, Duration::from_secs(5), &thread_stop);
    });
    (addr, stop, handle)
}

fn preload_begin(stream: &mut TcpStream, list_id: u8, total_frames: u32) {
    let mut bytes = vec![b'B', list_id];
    bytes.extend_from_slice(&total_frames.to_be_bytes());
    stream.write_all(&bytes).unwrap();
}

fn preload_push(stream: &mut TcpStream, list_id: u8, word: u32) {
    let mut bytes = vec![b'P', list_id];
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&word.to_be_bytes());
    stream.write_all(&bytes).unwrap();
}

#[test]
fn single_list_playback_emits_words_in_order() {
    let (engine, events, _player) = test_engine();
    let (addr, stop, _accept_thread) = spawn_queued_server(Arc::clone(&engine));

    let mut client = TcpStream::connect(addr).unwrap();
    preload_begin(&mut client, 0, 3);
    for word in [0xABCD_0001u32, 0xABCD_0002, 0xABCD_0003] {
        preload_push(&mut client, 0, word);
    }

    // Give the realtime player a few ticks to drain the three frames.
    std::thread::sleep(Duration::from_millis(50));
    stop.store(1, std::sync::atomic::Ordering::Relaxed);

    assert_eq!(events.words(), vec![0xABCD_0001, 0xABCD_0002, 0xABCD_0003]);
}

#[test]
fn disconnect_mid_load_rolls_back_to_idle() {
    let (engine, _events, _player) = test_engine();
    let (addr, stop, _accept_thread) = spawn_queued_server(Arc::clone(&engine));

    {
        let mut client = TcpStream::connect(addr).unwrap();
        preload_begin(&mut client, 0, 10);
        preload_push(&mut client, 0, 1);
        preload_push(&mut client, 0, 2);
        preload_push(&mut client, 0, 3);
        // client dropped here without finalizing
    }

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(engine.list_state(0), awg_core::ListState::Idle);
    stop.store(1, std::sync::atomic::Ordering::Relaxed);
}

#[test]
fn overlength_push_drops_connection_and_list_stays_idle() {
    let (engine, _events, _player) = test_engine();
    let (addr, stop, _accept_thread) = spawn_queued_server(Arc::clone(&engine));

    let mut client = TcpStream::connect(addr).unwrap();
    preload_begin(&mut client, 1, 1);
    let mut bytes = vec![b'P', 1u8];
    bytes.extend_from_slice(&65u16.to_be_bytes());
    client.write_all(&bytes).unwrap();

    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(engine.list_state(1), awg_core::ListState::Idle);
    stop.store(1, std::sync::atomic::Ordering::Relaxed);
}

#[test]
fn subscriber_sees_current_state_on_connect() {
    let (engine, _events, _player) = test_engine();
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = Arc::new(AtomicUsize::new(0));
    let thread_stop = Arc::clone(&stop);
    let engine_for_notifier = Arc::clone(&engine);
    std::thread::spawn(move || {
        awg_net::notifier::serve(&listener, &engine_for_notifier, &thread_stop);
    });

    std::thread::sleep(Duration::from_millis(30));
    let client = TcpStream::connect(addr).unwrap();
    let mut lines = BufReader::new(client).lines();
    assert_eq!(lines.next().unwrap().unwrap(), "LIST0:IDLE");
    assert_eq!(lines.next().unwrap().unwrap(), "LIST1:IDLE");

    stop.store(1, std::sync::atomic::Ordering::Relaxed);
}
