use super::*;
use crossbeam_channel::bounded;

fn frame(n: u8) -> Vec<u8> {
    vec![n]
}

#[test]
fn test_direct_sends_until_full_then_queues_in_order() {
    let (tx, rx) = bounded(2);
    let sender = QueuedSender::new(tx, SendPolicy::Direct);

    for n in 1..=5 {
        sender.send(frame(n)).unwrap();
    }
    assert!(!sender.is_free());
    assert_eq!(sender.queued(), 3);

    let mut received = Vec::new();
    while received.len() < 5 {
        let chunk = rx.recv().unwrap();
        received.push(chunk[0]);
        sender.on_drained();
    }
    assert_eq!(received, vec![1, 2, 3, 4, 5]);
    assert!(sender.is_free());
    assert_eq!(sender.queued(), 0);
}

#[test]
fn test_sends_while_busy_do_not_overtake_queue() {
    let (tx, rx) = bounded(1);
    let sender = QueuedSender::new(tx, SendPolicy::Direct);

    sender.send(frame(1)).unwrap();
    sender.send(frame(2)).unwrap();
    assert_eq!(rx.recv().unwrap(), frame(1));

    // Room in the channel again, but frame 2 is still queued.
    sender.send(frame(3)).unwrap();
    assert!(rx.try_recv().is_err());

    sender.on_drained();
    assert_eq!(rx.recv().unwrap(), frame(2));
    sender.on_drained();
    assert_eq!(rx.recv().unwrap(), frame(3));
}

#[test]
fn test_conservative_keeps_one_frame_outstanding() {
    let (tx, rx) = bounded(16);
    let sender = QueuedSender::new(tx, SendPolicy::Conservative);

    sender.send(frame(1)).unwrap();
    sender.send(frame(2)).unwrap();
    sender.send(frame(3)).unwrap();
    assert_eq!(rx.len(), 1);
    assert_eq!(sender.queued(), 2);

    assert_eq!(rx.recv().unwrap(), frame(1));
    sender.on_drained();
    assert_eq!(rx.len(), 1);
    assert_eq!(rx.recv().unwrap(), frame(2));
    sender.on_drained();
    assert_eq!(rx.recv().unwrap(), frame(3));
    sender.on_drained();
    assert!(sender.is_free());
}

#[test]
fn test_disconnected_channel_reports_worker_exit() {
    let (tx, rx) = bounded(1);
    drop(rx);
    let sender = QueuedSender::new(tx, SendPolicy::Direct);
    assert!(matches!(
        sender.send(frame(1)),
        Err(CheckerError::WorkerExited)
    ));
}
