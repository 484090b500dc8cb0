//! Mock transport for testing

use super::Transport;
use crate::error::{NavError, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Mock transport for unit testing
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<MockTransportInner>>,
}

struct MockTransportInner {
    read_buffer: VecDeque<u8>,
    write_buffer: Vec<u8>,
    fail_writes: bool,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        MockTransport {
            inner: Arc::new(Mutex::new(MockTransportInner {
                read_buffer: VecDeque::new(),
                write_buffer: Vec::new(),
                fail_writes: false,
            })),
        }
    }

    /// Inject data to be read
    pub fn inject_read(&self, data: &[u8]) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.read_buffer.extend(data);
    }

    /// Get all written data
    pub fn get_written(&self) -> Vec<u8> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.write_buffer.clone()
    }

    /// Clear written data
    pub fn clear_written(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.write_buffer.clear();
    }

    /// Make every subsequent write fail (simulated link timeout)
    pub fn set_fail_writes(&self, fail: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.fail_writes = fail;
    }
}

impl Transport for MockTransport {
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let available = inner.read_buffer.len().min(buffer.len());

        for item in buffer.iter_mut().take(available) {
            if let Some(b) = inner.read_buffer.pop_front() {
                *item = b;
            }
        }

        Ok(available)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.fail_writes {
            return Err(NavError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "simulated write timeout",
            )));
        }
        inner.write_buffer.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn available(&mut self) -> Result<usize> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.read_buffer.len())
    }

    fn try_clone(&self) -> Result<Box<dyn Transport>> {
        Ok(Box::new(self.clone()))
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}
