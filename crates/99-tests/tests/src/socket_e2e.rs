use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::bounded;
use exchange::{ExchangeConfig, ExchangeError, ExchangeSession, Message};
use exchange_control::{serve_stream, ControlClient};
use responder::{ConsumerLoop, RegisterFile, ResponderError, ADDRESS_NAK_STATUS};

#[test]
fn register_file_behind_control_socket() {
    let _ = env_logger::builder().is_test(true).try_init();
    let session = ExchangeSession::new(ExchangeConfig::default());
    let runner = session.register_source().unwrap();

    let (client_end, server_end) = UnixStream::pair().unwrap();
    let served = {
        let session = Arc::clone(&session);
        thread::spawn(move || serve_stream(session, server_end))
    };

    let mut client = ControlClient::new(client_end);
    client.open().unwrap();
    let (stop_tx, stop_rx) = bounded(1);
    let device = thread::spawn(move || {
        ConsumerLoop::new(client, RegisterFile::new(0x50), stop_rx).run()
    });

    let mut batch = vec![
        Message::write(0x50, b"\x20hello".to_vec()).unwrap(),
        Message::write(0x50, vec![0x20]).unwrap(),
        Message::read(0x50, 5),
    ];
    assert_eq!(runner.run_batch(&mut batch).unwrap(), 3);
    assert_eq!(batch[2].payload(), b"hello");

    let mut stray = Message::write(0x22, vec![0x00]).unwrap();
    assert_eq!(
        runner.submit(&mut stray),
        Err(ExchangeError::Nack {
            status: ADDRESS_NAK_STATUS
        })
    );

    stop_tx.send(()).unwrap();
    let (regs, stats) = device.join().unwrap().unwrap();
    assert_eq!(&regs.registers()[0x20..0x25], b"hello");
    assert_eq!(stats.acked, 3);
    assert_eq!(stats.nacked, 1);

    served.join().unwrap().unwrap();
    assert!(!session.is_consumer_open());
}

#[test]
fn forced_close_ends_remote_loop() {
    let session = ExchangeSession::new(ExchangeConfig::default());
    let (client_end, server_end) = UnixStream::pair().unwrap();

    let mut client = ControlClient::new(client_end);
    let served = {
        let session = Arc::clone(&session);
        thread::spawn(move || serve_stream(session, server_end))
    };
    client.open().unwrap();
    assert!(session.is_consumer_open());

    // Idles on SourceNotRegistered until the gate is pulled.
    let (_stop_tx, stop_rx) = bounded::<()>(1);
    let device = thread::spawn(move || {
        ConsumerLoop::new(client, RegisterFile::new(0x50), stop_rx).run()
    });

    session.close();
    let err = device.join().unwrap().unwrap_err();
    assert!(matches!(
        err,
        ResponderError::Exchange(ExchangeError::NoConsumer)
    ));
    served.join().unwrap().unwrap();
}
