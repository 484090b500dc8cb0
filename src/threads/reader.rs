//! Reader thread: serial bytes in, parsed frames out.

use crate::protocol::Frame;
use crate::transport::{LineAssembler, Transport};
use crossbeam_channel::Sender;
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

pub struct ReaderThread {
    transport: Box<dyn Transport>,
    inbound: Sender<Frame>,
    running: Arc<AtomicBool>,
}

impl ReaderThread {
    pub fn new(
        transport: Box<dyn Transport>,
        inbound: Sender<Frame>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            inbound,
            running,
        }
    }

    pub fn run(mut self) {
        let mut buffer = [0u8; 256];
        let mut assembler = LineAssembler::new();

        while self.running.load(Ordering::Relaxed) {
            match self.transport.read(&mut buffer) {
                Ok(0) => {
                    // Read timeout; yield briefly so a mock link does not spin
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(n) => {
                    for frame in assembler.push(&buffer[..n]) {
                        if self.inbound.send(frame).is_err() {
                            return; // control thread gone
                        }
                    }
                }
                Err(e) => {
                    warn!("serial read error: {}", e);
                    thread::sleep(Duration::from_millis(50));
                }
            }
        }
    }
}
