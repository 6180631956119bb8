//! Trait abstraction for serial port operations to enable testing

use std::io;

/// Non-blocking byte-stream operations the link session needs.
///
/// Every call returns immediately: reads hand back whatever is already
/// buffered (possibly nothing), writes accept as much as the port will take
/// right now (possibly nothing).
#[cfg_attr(test, mockall::automock)]
pub trait SerialLink {
    /// Read up to `buf.len()` bytes that are already available.
    ///
    /// Returns `Ok(0)` when nothing is buffered.
    fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write as much of `data` as the port accepts without blocking.
    ///
    /// Returns the number of bytes accepted, `Ok(0)` when the output buffer
    /// is full.
    fn write_some(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Discard everything pending in the input buffer.
    ///
    /// Output is left alone: bytes already handed to the port still go out.
    fn clear_input(&mut self) -> io::Result<()>;
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Inner {
        incoming: VecDeque<u8>,
        written: Vec<Vec<u8>>,
        write_limit: Option<usize>,
        write_budget: Option<usize>,
        write_error: Option<io::ErrorKind>,
        read_error: Option<io::ErrorKind>,
        clears: usize,
    }

    /// Scripted serial port for testing.
    ///
    /// Clones share state, so a test keeps one handle to feed bytes and
    /// inspect writes while the session owns the other.
    #[derive(Clone, Default)]
    pub struct ScriptedLink {
        inner: Arc<Mutex<Inner>>,
    }

    impl ScriptedLink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue bytes as if the device had sent them.
        pub fn feed(&self, data: &[u8]) {
            self.inner.lock().unwrap().incoming.extend(data.iter().copied());
        }

        /// Bytes still waiting to be read.
        pub fn pending_input(&self) -> usize {
            self.inner.lock().unwrap().incoming.len()
        }

        /// Every accepted write, one entry per call.
        pub fn writes(&self) -> Vec<Vec<u8>> {
            self.inner.lock().unwrap().written.clone()
        }

        /// All accepted bytes concatenated.
        pub fn written_bytes(&self) -> Vec<u8> {
            self.writes().concat()
        }

        pub fn clear_writes(&self) {
            self.inner.lock().unwrap().written.clear();
        }

        /// Cap the bytes accepted per write call (`Some(0)` = output full).
        pub fn set_write_limit(&self, limit: Option<usize>) {
            self.inner.lock().unwrap().write_limit = limit;
        }

        /// Total bytes accepted before the port reports full, across calls.
        pub fn set_write_budget(&self, budget: Option<usize>) {
            self.inner.lock().unwrap().write_budget = budget;
        }

        pub fn set_write_error(&self, error: Option<io::ErrorKind>) {
            self.inner.lock().unwrap().write_error = error;
        }

        pub fn set_read_error(&self, error: Option<io::ErrorKind>) {
            self.inner.lock().unwrap().read_error = error;
        }

        pub fn clears(&self) -> usize {
            self.inner.lock().unwrap().clears
        }
    }

    impl SerialLink for ScriptedLink {
        fn read_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(kind) = inner.read_error {
                return Err(io::Error::new(kind, "Mock read error"));
            }
            let n = buf.len().min(inner.incoming.len());
            for (slot, byte) in buf.iter_mut().zip(inner.incoming.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }

        fn write_some(&mut self, data: &[u8]) -> io::Result<usize> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(kind) = inner.write_error {
                return Err(io::Error::new(kind, "Mock write error"));
            }
            let mut n = inner.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
            if let Some(budget) = inner.write_budget.as_mut() {
                n = n.min(*budget);
                *budget -= n;
            }
            if n > 0 {
                inner.written.push(data[..n].to_vec());
            }
            Ok(n)
        }

        fn clear_input(&mut self) -> io::Result<()> {
            let mut inner = self.inner.lock().unwrap();
            inner.incoming.clear();
            inner.clears += 1;
            Ok(())
        }
    }

    #[test]
    fn test_scripted_link_partial_reads() {
        let mut link = ScriptedLink::new();
        link.feed(b"abcdef");

        let mut buf = [0u8; 4];
        assert_eq!(link.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"abcd");
        assert_eq!(link.read_available(&mut buf).unwrap(), 2);
        assert_eq!(link.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_scripted_link_write_budget_spans_calls() {
        let mut link = ScriptedLink::new();
        link.set_write_budget(Some(5));
        assert_eq!(link.write_some(b"reboot\0").unwrap(), 5);
        assert_eq!(link.write_some(b"t\0").unwrap(), 0);

        link.set_write_budget(None);
        assert_eq!(link.write_some(b"t\0").unwrap(), 2);
        assert_eq!(link.written_bytes(), b"reboot\0");
    }
}
