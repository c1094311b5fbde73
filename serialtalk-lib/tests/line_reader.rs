use serialtalk_lib::error::LoggerError;
use serialtalk_lib::LineReader;
use std::collections::VecDeque;
use std::io::{self, Read};
use std::time::Duration;

/// Serves scripted chunks and errors, then end of stream
struct ChunkedRead {
    chunks: VecDeque<io::Result<Vec<u8>>>,
    /// Time out instead of ending once the chunks run out
    idle: bool,
}

impl ChunkedRead {
    fn new(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
        Self {
            chunks: chunks.into(),
            idle: false,
        }
    }

    fn idle(chunks: Vec<io::Result<Vec<u8>>>) -> Self {
        Self {
            chunks: chunks.into(),
            idle: true,
        }
    }
}

impl Read for ChunkedRead {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            None if self.idle => {
                std::thread::sleep(Duration::from_millis(1));
                timeout().map(|_| 0)
            }
            None => Ok(0),
            Some(Err(e)) => Err(e),
            Some(Ok(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.chunks.push_front(Ok(bytes.split_off(n)));
                }
                Ok(n)
            }
        }
    }
}

fn timeout() -> io::Result<Vec<u8>> {
    Err(io::Error::new(io::ErrorKind::TimedOut, "timed out"))
}

#[test]
fn test_lines_split_across_reads_are_joined() {
    let mut reader = LineReader::new(ChunkedRead::new(vec![
        Ok(b"1\t0".to_vec()),
        Ok(b"\t1\r\n0\t".to_vec()),
        Ok(b"0\t0\r\n".to_vec()),
    ]));
    assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"1\t0\t1\r\n");
    assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"0\t0\t0\r\n");
    assert!(matches!(reader.read_line(), Err(LoggerError::Disconnected)));
}

#[test]
fn test_timeout_means_no_line_yet() {
    let mut reader = LineReader::new(ChunkedRead::new(vec![Ok(b"1\t".to_vec()), timeout(), Ok(b"1\n".to_vec())]));
    assert_eq!(reader.read_line().unwrap(), None);
    assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"1\t1\n");
}

#[test]
fn test_unterminated_tail_is_returned_once() {
    let mut reader = LineReader::new(ChunkedRead::new(vec![Ok(b"5\t6".to_vec())]));
    assert_eq!(reader.read_line().unwrap().unwrap().as_ref(), b"5\t6");
    assert!(matches!(reader.read_line(), Err(LoggerError::Disconnected)));
}

#[test]
fn test_hard_errors_propagate() {
    let mut reader = LineReader::new(ChunkedRead::new(vec![Err(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "unplugged",
    ))]));
    match reader.read_line() {
        Err(e @ LoggerError::Io(_)) => assert!(e.is_connection_error()),
        other => panic!("Expected Io error, got {:?}", other),
    }
}

#[test]
fn test_settle_discards_startup_noise() {
    let mut reader = LineReader::new(ChunkedRead::idle(vec![
        Ok(b"\xfe\xff garbage\r\n".to_vec()),
        Ok(b"1\t0\r\n".to_vec()),
        Ok(b"0\t".to_vec()),
    ]));
    // Zero settle time reads nothing
    assert_eq!(reader.settle(Duration::ZERO).unwrap(), 0);
    assert_eq!(reader.settle(Duration::from_millis(20)).unwrap(), 2);
    // The half line stays buffered until its terminator arrives
    assert_eq!(reader.read_line().unwrap(), None);
}
