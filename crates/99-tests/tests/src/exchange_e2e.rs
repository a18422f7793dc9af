use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use exchange::{
    ConsumerHandle, ExchangeConfig, ExchangeError, ExchangeSession, Message, MessageFlags,
    MessageHeader,
};
use responder::{ConsumerLoop, RegisterFile};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn poll_message(consumer: &ConsumerHandle) -> MessageHeader {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match consumer.fetch() {
            Ok(header) => return header,
            Err(ExchangeError::NoMessage) if Instant::now() < deadline => {
                thread::sleep(Duration::from_millis(1))
            }
            Err(err) => panic!("no message arrived: {err}"),
        }
    }
}

#[test]
fn partial_write_leaves_tail_untouched() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let worker = thread::spawn(move || {
        let header = poll_message(&consumer);
        assert_eq!(header.len, 4);
        assert_eq!(consumer.write(&[0x01, 0x02]).unwrap(), 2);
        consumer.commit().unwrap();
    });

    let mut msg = Message::new(0x50, MessageFlags::READ, vec![0xAA; 4]).unwrap();
    runner.submit(&mut msg).unwrap();
    worker.join().unwrap();
    assert_eq!(msg.payload(), &[0x01, 0x02, 0xAA, 0xAA]);
}

#[test]
fn silent_consumer_times_out_and_slot_clears() {
    let timeout = Duration::from_millis(150);
    let session = ExchangeSession::new(ExchangeConfig::default().with_timeout(timeout));
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let started = Instant::now();
    let mut msg = Message::write(0x50, vec![1, 2]).unwrap();
    assert_eq!(
        runner.submit(&mut msg),
        Err(ExchangeError::TimedOut { timeout })
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout * 10);

    assert_eq!(consumer.fetch(), Err(ExchangeError::NoMessage));
    assert_eq!(msg.payload(), &[1, 2], "payload returns to the submitter");
    assert_eq!(session.metrics().timed_out, 1);
}

#[test]
fn commit_twice_reports_no_message() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let worker = thread::spawn(move || {
        poll_message(&consumer);
        let first = consumer.commit();
        let second = consumer.commit();
        (first, second)
    });

    let mut msg = Message::write(0x50, vec![0]).unwrap();
    runner.submit(&mut msg).unwrap();
    let (first, second) = worker.join().unwrap();
    assert_eq!(first, Ok(()));
    assert_eq!(second, Err(ExchangeError::NoMessage));
}

#[test]
fn second_open_is_busy() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    session.open().unwrap();
    assert_eq!(session.open(), Err(ExchangeError::Busy));
    session.close();
    session.close();
    session.open().unwrap();
}

#[test]
fn failed_batch_never_publishes_the_rest() {
    let timeout = Duration::from_millis(100);
    let session = ExchangeSession::new(ExchangeConfig::default().with_timeout(timeout));
    let runner = session.register_source().unwrap();
    let consumer = session.open_consumer().unwrap();

    let (stop_tx, stop_rx) = bounded::<()>(1);
    let watcher = thread::spawn(move || {
        let mut seen = Vec::new();
        while stop_rx.try_recv().is_err() {
            if let Ok(header) = consumer.fetch() {
                if seen.last() != Some(&header) {
                    seen.push(header);
                }
            }
            thread::sleep(Duration::from_millis(1));
        }
        seen
    });

    let mut batch = vec![
        Message::write(0x50, vec![0x10]).unwrap(),
        Message::read(0x51, 2),
    ];
    let err = runner.run_batch(&mut batch).unwrap_err();
    assert_eq!(err.index, 0);
    assert_eq!(err.error, ExchangeError::TimedOut { timeout });

    thread::sleep(Duration::from_millis(50));
    stop_tx.send(()).unwrap();
    let seen = watcher.join().unwrap();
    assert!(seen.iter().all(|header| header.address == 0x50));
    assert_eq!(session.metrics().submitted(), 1);
}

#[test]
fn concurrent_batches_stay_whole() {
    init_logging();
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = Arc::new(session.register_source().unwrap());
    let consumer = session.open_consumer().unwrap();

    let (stop_tx, stop_rx) = bounded(1);
    let device = thread::spawn(move || {
        ConsumerLoop::new(consumer, RegisterFile::new(0x50), stop_rx).run()
    });

    let writers: Vec<_> = (0u8..4)
        .map(|lane| {
            let runner = Arc::clone(&runner);
            thread::spawn(move || {
                let base = lane * 0x40;
                for round in 0u8..16 {
                    let value = lane.wrapping_mul(31).wrapping_add(round);
                    let mut batch = vec![
                        Message::write(0x50, vec![base, value, value ^ 0xFF]).unwrap(),
                        Message::write(0x50, vec![base]).unwrap(),
                        Message::read(0x50, 2),
                    ];
                    runner.run_batch(&mut batch).unwrap();
                    assert_eq!(batch[2].payload(), &[value, value ^ 0xFF]);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    stop_tx.send(()).unwrap();
    let (_, stats) = device.join().unwrap().unwrap();
    assert_eq!(stats.acked, 4 * 16 * 3);
    assert_eq!(session.metrics().busy, 0);
}
