//! Multi-threaded architecture for MargaNav.
//!
//! Three threads cooperate around queues:
//! - Reader thread: blocks on serial input, assembles lines, pushes parsed
//!   frames into the inbound channel
//! - Writer thread: drains the outbound queue under pacing and congestion
//!   rules
//! - Control thread: dispatches inbound frames and ticks the mission
//!   controller at the adaptive telemetry rate
//!
//! All mission and planning state lives in the control thread; the reader
//! and writer only ever touch queues.

mod control;
mod reader;
mod writer;

pub use control::ControlThread;
pub use reader::ReaderThread;
pub use writer::WriterThread;

use crate::config::LinkConfig;
use crate::error::Result;
use crate::protocol::{Frame, NavSession};
use crate::shared::SharedRate;
use crate::transport::{OutboundQueue, Transport};
use crossbeam_channel::unbounded;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Thread handles for the running daemon.
pub struct ThreadHandles {
    pub reader: JoinHandle<()>,
    pub writer: JoinHandle<()>,
    pub control: JoinHandle<()>,
}

impl ThreadHandles {
    pub fn any_finished(&self) -> bool {
        self.reader.is_finished() || self.writer.is_finished() || self.control.is_finished()
    }
}

/// Spawn all threads and return handles.
pub fn spawn_threads(
    transport: Box<dyn Transport>,
    session: NavSession,
    outbound: Arc<OutboundQueue>,
    rate: SharedRate,
    link: LinkConfig,
    running: Arc<AtomicBool>,
) -> Result<ThreadHandles> {
    let (inbound_tx, inbound_rx) = unbounded::<Frame>();

    let reader_transport = transport.try_clone()?;
    let reader = ReaderThread::new(reader_transport, inbound_tx, Arc::clone(&running));
    let reader_handle = thread::Builder::new()
        .name("reader".into())
        .spawn(move || reader.run())?;

    let writer = WriterThread::new(
        transport,
        Arc::clone(&outbound),
        Arc::clone(&rate),
        &link,
        Arc::clone(&running),
    );
    let writer_handle = thread::Builder::new()
        .name("writer".into())
        .spawn(move || writer.run())?;

    let control = ControlThread::new(session, inbound_rx, rate, running);
    let control_handle = thread::Builder::new()
        .name("control".into())
        .spawn(move || control.run())?;

    Ok(ThreadHandles {
        reader: reader_handle,
        writer: writer_handle,
        control: control_handle,
    })
}
