use serialtalk_lib::error::LoggerError;
use serialtalk_lib::{BinAccumulator, ChannelSet};
use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

fn at(secs: u64) -> std::time::SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

#[test]
fn test_zero_window_is_rejected() {
    let set = ChannelSet::from_template("pir_n_", 2);
    assert!(matches!(
        BinAccumulator::new(&set, Duration::ZERO, at(0)),
        Err(LoggerError::InvalidWindow)
    ));
}

#[test]
fn test_window_averages_selected_channels() {
    let set = ChannelSet::from_selection(4, [(2, PathBuf::from("b")), (4, PathBuf::from("d"))]).unwrap();
    let mut acc = BinAccumulator::new(&set, Duration::from_secs(60), at(1000)).unwrap();

    acc.add(&[1, 1, 0, 1]);
    acc.add(&[1, 0, 0, 1]);
    acc.add(&[1, 1, 0, 0]);
    acc.add(&[1, 0, 0, 1]);
    assert_eq!(acc.counters(), vec![(1, 2), (3, 3)]);
    assert_eq!(acc.poll(at(1059)).unwrap(), None);

    let bin = acc.poll(at(1060)).unwrap().expect("window should close");
    assert_eq!(bin.timestamp, 1060);
    assert_eq!(bin.reads, 4);
    assert_eq!(bin.averages, vec![(1, 0.5), (3, 0.75)]);

    // Sums reset, next window starts at the close
    assert_eq!(acc.reads(), 0);
    assert_eq!(acc.counters(), vec![(1, 0), (3, 0)]);
    assert_eq!(acc.window_end(), at(1120));
}

#[test]
fn test_empty_window_stays_open() {
    let set = ChannelSet::from_template("pir_n_", 1);
    let mut acc = BinAccumulator::new(&set, Duration::from_secs(10), at(0)).unwrap();
    assert_eq!(acc.poll(at(500)).unwrap(), None);

    // The first line after a long silence closes the overdue window
    acc.add(&[1]);
    let bin = acc.poll(at(501)).unwrap().unwrap();
    assert_eq!(bin.reads, 1);
    assert_eq!(bin.averages, vec![(0, 1.0)]);
    assert_eq!(acc.window_end(), at(511));
}

#[test]
#[should_panic]
fn test_short_line_is_not_counted_as_zero() {
    let set = ChannelSet::from_selection(4, [(4, PathBuf::from("d"))]).unwrap();
    let mut acc = BinAccumulator::new(&set, Duration::from_secs(60), at(0)).unwrap();
    acc.add(&[1, 1]);
}
