//! Protocol properties every operator must hold, checked through the public API.

use bagweave::graph::Graph;
use bagweave::operator::{dispatch, finish};
use bagweave::operators::{FromIter, FromNothing, Map, Union};
use bagweave::{
  Bag, BagError, BagEvent, BagState, BufferConfig, BufferWriter, CancellationToken, EventLog,
  FanIn, InputId, Operator, PortRef, Round, RuntimeConfig, Step,
};
use std::sync::Arc;
use std::time::Duration;

fn subscribe<O: Operator>(op: &mut O) -> EventLog<O::Out> {
  let log = EventLog::new();
  op.core_mut().out_mut().subscribe(Box::new(log.clone()));
  log
}

fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
  if items.len() <= 1 {
    return vec![items.to_vec()];
  }
  let mut out = Vec::new();
  for i in 0..items.len() {
    let mut rest = items.to_vec();
    let first = rest.remove(i);
    for mut tail in permutations(&rest) {
      tail.insert(0, first);
      out.push(tail);
    }
  }
  out
}

#[test]
fn test_append_after_close_always_fails() {
  let name: Arc<str> = Arc::from("op");
  for port in [PortRef::Output, PortRef::Input(0), PortRef::Input(3)] {
    let mut bag = Bag::new(&name, port);
    bag.open(Round::FIRST).unwrap();
    bag.append(1u8).unwrap();
    bag.close().unwrap();
    assert!(matches!(bag.append(2), Err(BagError::InvalidState { .. })));
  }
}

#[test]
fn test_double_open_in_bag_fails_for_every_operator() {
  let mut map = Map::new("map", |x: u8| x);
  dispatch(&mut map, 0, BagEvent::Open(Round::FIRST)).unwrap();
  assert!(dispatch(&mut map, 0, BagEvent::Open(Round(1))).is_err());

  let mut union = Union::<u8>::new("union", 2);
  dispatch(&mut union, 1, BagEvent::Open(Round::FIRST)).unwrap();
  assert!(dispatch(&mut union, 1, BagEvent::Open(Round(1))).is_err());

  let mut nothing = FromNothing::<u8>::new("nothing");
  dispatch(&mut nothing, 0, BagEvent::Open(Round::FIRST)).unwrap();
  assert!(dispatch(&mut nothing, 0, BagEvent::Open(Round(1))).is_err());
}

#[test]
fn test_fan_in_closes_once_under_all_interleavings() {
  const N: usize = 4;
  let inputs: Vec<usize> = (0..N).collect();
  for open_order in permutations(&inputs) {
    for close_order in [open_order.clone(), open_order.iter().rev().copied().collect()] {
      let mut op = Union::<u32>::new("union", N);
      let log = subscribe(&mut op);
      for &input in &open_order {
        dispatch(&mut op, input, BagEvent::Open(Round::FIRST)).unwrap();
        dispatch(&mut op, input, BagEvent::Record(input as u32)).unwrap();
      }
      for (i, &input) in close_order.iter().enumerate() {
        dispatch(&mut op, input, BagEvent::Close(Round::FIRST)).unwrap();
        assert_eq!(log.closes(), usize::from(i == N - 1));
      }
      let events = log.events();
      assert_eq!(events.last(), Some(&BagEvent::Close(Round::FIRST)));
      assert_eq!(events.iter().filter(|e| e.is_record()).count(), N);
      finish(&op).unwrap();
    }
  }
}

#[test]
fn test_fan_in_counter_is_thread_safe() {
  let fan_in = Arc::new(FanIn::new(&Arc::from("join"), 16));
  let completions: usize = std::thread::scope(|s| {
    let handles: Vec<_> = (0..16)
      .map(|input: InputId| {
        let fan_in = Arc::clone(&fan_in);
        s.spawn(move || {
          fan_in
            .record_close(input, Round::FIRST)
            .unwrap()
            .completed()
            .is_some() as usize
        })
      })
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).sum()
  });
  assert_eq!(completions, 1);
}

#[test]
fn test_singleton_close_observed_exactly_once() {
  let mut nothing = FromNothing::<u8>::new("nothing");
  let log = subscribe(&mut nothing);
  dispatch(&mut nothing, 0, BagEvent::Open(Round::FIRST)).unwrap();
  dispatch(&mut nothing, 0, BagEvent::Close(Round::FIRST)).unwrap();
  assert!(nothing.core_mut().out_mut().close_bag().is_err());
  assert_eq!(log.closes(), 1);
}

#[test]
fn test_zero_input_source_k_records() {
  for k in [0usize, 1, 7, 300] {
    let mut source = FromIter::new("gen", (0..k).map(|i| i * 3));
    let log = subscribe(&mut source);
    source.start().unwrap();
    assert_eq!(source.core().out().state(), BagState::Open);
    while source.step().unwrap() == Step::Continue {}
    assert_eq!(source.core().out().state(), BagState::Closed);
    assert_eq!(log.records(), (0..k).map(|i| i * 3).collect::<Vec<_>>());
    assert_eq!(log.opens(), 1);
    assert_eq!(log.closes(), 1);
    assert!(source.core().inputs().is_empty());
  }
}

#[tokio::test]
async fn test_cancellation_closes_unbounded_source() {
  let mut graph = Graph::new(RuntimeConfig::default());
  let source = graph.add(FromIter::new("forever", std::iter::repeat("tick")));
  let log = graph.tap(&source).unwrap();

  let cancel = CancellationToken::new();
  let run = tokio::spawn(graph.run_with_cancel(cancel.clone()));
  tokio::time::sleep(Duration::from_millis(20)).await;
  cancel.cancel();
  let report = tokio::time::timeout(Duration::from_secs(5), run)
    .await
    .unwrap()
    .unwrap()
    .unwrap();

  assert!(report.cancelled);
  let count = log.records().len();
  assert_eq!(log.closes(), 1);
  assert_eq!(log.events().last(), Some(&BagEvent::Close(Round::FIRST)));
  tokio::time::sleep(Duration::from_millis(5)).await;
  assert_eq!(log.records().len(), count);
}

#[test]
fn test_serialized_buffer_round_trip() {
  let records: Vec<(u32, String)> = (0..1_000).map(|i| (i, format!("v{i}"))).collect();
  for threshold in [0usize, 100, 1 << 20] {
    let mut writer = BufferWriter::new(BufferConfig::new(threshold));
    for record in &records {
      writer.append(record).unwrap();
    }
    let sealed = writer.seal().unwrap();
    assert_eq!(sealed.len(), records.len());
    for _ in 0..2 {
      let read: Vec<(u32, String)> = sealed.reader().unwrap().map(Result::unwrap).collect();
      assert_eq!(read, records);
    }
  }
}
