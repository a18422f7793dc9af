//! Exchange session integration tests.
//! Producer and consumer run on separate threads and meet only through the
//! session, the way a bus adapter and its userspace responder do.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use exchange::{
    ConsumerHandle, ExchangeConfig, ExchangeError, ExchangeSession, Message, MessageHeader,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

const LONG: Duration = Duration::from_secs(5);

fn poll_message(consumer: &ConsumerHandle) -> MessageHeader {
    let deadline = Instant::now() + LONG;
    loop {
        match consumer.fetch() {
            Ok(header) => return header,
            Err(ExchangeError::NoMessage) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(1))
            }
            Err(err) => panic!("consumer gave up waiting: {err}"),
        }
    }
}

#[test]
fn write_message_read_in_two_chunks() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let worker = thread::spawn(move || {
        let header = poll_message(&consumer);
        assert_eq!(header.address, 0x50);
        assert_eq!(header.len, 4);
        assert!(!header.is_read());

        let mut first = [0u8; 2];
        let mut second = [0u8; 2];
        let total = consumer.read(&mut first).unwrap() + consumer.read(&mut second).unwrap();
        consumer.commit().unwrap();
        (first, second, total)
    });

    let mut msg = Message::write(0x50, vec![1, 2, 3, 4]).unwrap();
    runner.submit(&mut msg).unwrap();

    let (first, second, total) = worker.join().unwrap();
    assert_eq!(first, [1, 2]);
    assert_eq!(second, [3, 4]);
    assert_eq!(total, 4);
}

#[test]
fn no_consumer_returns_without_waiting() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();

    let started = Instant::now();
    let mut msg = Message::write(0x50, vec![1, 2, 3, 4]).unwrap();
    assert_eq!(runner.submit(&mut msg), Err(ExchangeError::NoConsumer));
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn batch_reports_timeout_at_first_message() {
    let config = ExchangeConfig::default().with_timeout(Duration::from_millis(100));
    let session = ExchangeSession::new(config);
    let runner = session.register_source().unwrap();
    let _consumer = session.open_consumer().unwrap();

    let mut batch = vec![
        Message::write(0x50, vec![0x00]).unwrap(),
        Message::read(0x50, 2),
    ];
    let started = Instant::now();
    let err = runner.run_batch(&mut batch).unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.index, 0);
    assert_eq!(
        err.error,
        ExchangeError::TimedOut {
            timeout: Duration::from_millis(100)
        }
    );
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(2), "second message never waited");
    assert_eq!(session.metrics().submitted(), 1);
    assert_eq!(session.fetch_pending(), Err(ExchangeError::NoMessage));
}

#[test]
fn fetch_after_exchange_never_sees_stale_message() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();
    let consumer = Arc::new(consumer);

    let remote = Arc::clone(&consumer);
    let worker = thread::spawn(move || {
        poll_message(&remote);
        remote.commit().unwrap();
    });
    let mut msg = Message::write(0x22, vec![0xAB]).unwrap();
    runner.submit(&mut msg).unwrap();
    worker.join().unwrap();

    assert_eq!(consumer.fetch(), Err(ExchangeError::NoMessage));
    let mut buf = [0u8; 1];
    assert_eq!(consumer.read(&mut buf), Ok(0));
    assert_eq!(consumer.commit(), Err(ExchangeError::NoMessage));
}

#[test]
fn randomized_chunks_round_out_payloads() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();
    let mut rng = StdRng::seed_from_u64(0x12C);

    let payloads: Vec<Vec<u8>> = (0..32)
        .map(|_| {
            let len = rng.gen_range(1..=64);
            (0..len).map(|_| rng.gen()).collect()
        })
        .collect();
    let count = payloads.len();

    let worker = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(0xC21);
        let mut received = Vec::new();
        for _ in 0..count {
            let header = poll_message(&consumer);
            let mut data = Vec::with_capacity(usize::from(header.len));
            while data.len() < usize::from(header.len) {
                let mut chunk = vec![0u8; rng.gen_range(1..=9)];
                let n = consumer.read(&mut chunk).unwrap();
                data.extend_from_slice(&chunk[..n]);
            }
            consumer.commit().unwrap();
            received.push(data);
        }
        received
    });

    for payload in &payloads {
        let mut msg = Message::write(0x50, payload.clone()).unwrap();
        runner.submit(&mut msg).unwrap();
    }
    let received = worker.join().unwrap();
    assert_eq!(received, payloads);
}

#[test]
fn interleaved_direction_is_rejected() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let worker = thread::spawn(move || {
        poll_message(&consumer);
        let mut buf = [0u8; 1];
        consumer.read(&mut buf).unwrap();
        let mismatch = consumer.write(&[0xFF]);
        consumer.commit().unwrap();
        mismatch
    });

    let mut msg = Message::write(0x50, vec![1, 2, 3]).unwrap();
    runner.submit(&mut msg).unwrap();
    let mismatch = worker.join().unwrap();
    assert!(matches!(
        mismatch,
        Err(ExchangeError::DirectionMismatch { .. })
    ));
    assert_eq!(msg.payload(), &[1, 2, 3]);
}

#[test]
fn submit_into_occupied_slot_is_busy() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let parked = thread::spawn(move || {
        let mut msg = Message::write(0x50, vec![1, 2]).unwrap();
        let outcome = runner.submit(&mut msg);
        (outcome, msg)
    });
    poll_message(&consumer);

    let mut second = Message::write(0x60, vec![9, 9]).unwrap();
    let started = Instant::now();
    assert_eq!(session.submit(&mut second, LONG), Err(ExchangeError::Busy));
    assert!(started.elapsed() < Duration::from_secs(1), "busy must not queue");
    assert_eq!(second.payload(), &[9, 9]);
    assert_eq!(session.fetch_pending().unwrap().address, 0x50);

    consumer.commit().unwrap();
    let (outcome, first) = parked.join().unwrap();
    assert_eq!(outcome, Ok(()));
    assert_eq!(first.payload(), &[1, 2]);
    assert_eq!(session.metrics().busy, 1);
    assert_eq!(session.metrics().completed, 1);
}

#[test]
fn zero_status_nack_is_a_commit() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let worker = thread::spawn(move || {
        poll_message(&consumer);
        consumer.nack(0)
    });

    let mut msg = Message::write(0x50, vec![0x42]).unwrap();
    assert_eq!(runner.submit(&mut msg), Ok(()));
    assert_eq!(worker.join().unwrap(), Ok(()));

    let metrics = session.metrics();
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.nacked, 0);
}
