//! Session driver for XML output.
//!
//! ```text
//!  caller thread                 worker pool               drain thread
//!  write_header ──► queue.push(ready)
//!  write_buffer ──► pool.submit(block) ──► run() in any order
//!               └─► queue.push(handle)
//!                                         pop_next_ready_or_wait ──► sink
//!  write_end   ──► queue.push(ready), close, join drain
//! ```

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::data::{header::Header, Buffer};
use crate::errors::{Error, ErrorKind, Result};
use crate::output::{OutputFile, OutputFormat, OutputSink};
use crate::worker::{OrderedQueue, PendingResult, Pool};

use super::block::XmlOutputBlock;
use super::escape::append_xml_encoded;
use super::format::append_coordinate;
use super::options::XmlOutputOptions;

const FORMAT_NAME: &str = "xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    NotStarted,
    HeaderWritten,
    Ended,
}

pub struct XmlOutputFormat {
    options: XmlOutputOptions,
    pool: Arc<Pool>,
    queue: Arc<OrderedQueue<String>>,
    drain: Option<JoinHandle<Result<()>>>,
    state: StreamState,
    blocks_submitted: usize,
}

impl XmlOutputFormat {
    pub fn new(file: &OutputFile, pool: Arc<Pool>, sink: Box<dyn OutputSink>) -> Result<Self> {
        Self::with_options(XmlOutputOptions::from_file(file), pool, sink)
    }

    /// Starts the drain thread right away, so output is written while blocks
    /// are still being submitted.
    pub fn with_options(
        options: XmlOutputOptions,
        pool: Arc<Pool>,
        sink: Box<dyn OutputSink>,
    ) -> Result<Self> {
        let queue = Arc::new(OrderedQueue::new());
        let drain = {
            let queue = Arc::clone(&queue);
            thread::Builder::new()
                .name("osm-xml-drain".to_string())
                .spawn(move || drain_queue(&queue, sink))?
        };
        debug!(
            add_metadata = options.add_metadata,
            add_visible_flag = options.add_visible_flag,
            use_change_ops = options.use_change_ops;
            "Opened XML output"
        );

        Ok(XmlOutputFormat {
            options,
            pool,
            queue,
            drain: Some(drain),
            state: StreamState::NotStarted,
            blocks_submitted: 0,
        })
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    fn misuse(&self, operation: &str) -> Error {
        let err = Error::misuse(format!("{operation} called in state {:?}", self.state));
        error!(operation = operation, err = err.message.as_str(); "XML output used out of order");
        err
    }

    fn header_string(&self, header: &Header) -> String {
        let mut out = String::from("<?xml version='1.0' encoding='UTF-8'?>\n");

        if self.options.use_change_ops {
            out.push_str("<osmChange version=\"0.6\" generator=\"");
        } else {
            out.push_str("<osm version=\"0.6\"");

            let xml_josm_upload = header.get("xml_josm_upload");
            if xml_josm_upload == "true" || xml_josm_upload == "false" {
                out.push_str(" upload=\"");
                out.push_str(xml_josm_upload);
                out.push('"');
            }
            out.push_str(" generator=\"");
        }
        append_xml_encoded(&mut out, header.get("generator").as_bytes());
        out.push_str("\">\n");

        for bounds in header.boxes() {
            for (prefix, units) in [
                ("  <bounds minlon=\"", bounds.bottom_left.x),
                ("\" minlat=\"", bounds.bottom_left.y),
                ("\" maxlon=\"", bounds.top_right.x),
                ("\" maxlat=\"", bounds.top_right.y),
            ] {
                out.push_str(prefix);
                append_coordinate(&mut out, units);
            }
            out.push_str("\"/>\n");
        }

        out
    }

    fn send_to_output_queue(&mut self, out: String) -> Result<()> {
        match self.queue.push(PendingResult::ready(Ok(out))) {
            Ok(()) => Ok(()),
            Err(push_err) => Err(self.abort(push_err)),
        }
    }

    /// Stops the session and returns the error that caused it.
    ///
    /// A closed queue means the drain thread gave up, its error is the more
    /// useful one to report.
    fn abort(&mut self, cause: Error) -> Error {
        self.state = StreamState::Ended;
        self.queue.close();
        let err = match self.join_drain() {
            Err(drain_err) if cause.kind == ErrorKind::Misuse => drain_err,
            _ => cause,
        };
        error!(err = err.message.as_str(), blocks = self.blocks_submitted; "Aborting XML output");
        err
    }

    fn join_drain(&mut self) -> Result<()> {
        match self.drain.take() {
            Some(handle) => handle
                .join()
                .unwrap_or_else(|_| Err(Error::worker_failed("output drain thread panicked"))),
            None => Ok(()),
        }
    }
}

impl OutputFormat for XmlOutputFormat {
    fn format_name(&self) -> &str {
        FORMAT_NAME
    }

    fn write_header(&mut self, header: &Header) -> Result<()> {
        if self.state != StreamState::NotStarted {
            return Err(self.misuse("write_header"));
        }
        let out = self.header_string(header);
        self.send_to_output_queue(out)?;
        self.state = StreamState::HeaderWritten;
        Ok(())
    }

    fn write_buffer(&mut self, buffer: Buffer) -> Result<()> {
        if self.state != StreamState::HeaderWritten {
            return Err(self.misuse("write_buffer"));
        }
        // A failed block ahead of us makes the rest of the session pointless.
        if let Err(err) = self.queue.check_head_failure() {
            return Err(self.abort(err));
        }
        if buffer.is_empty() {
            return Ok(());
        }

        let block = XmlOutputBlock::new(buffer, self.options);
        let handle = self.pool.submit(move || block.run());
        if let Err(push_err) = self.queue.push(handle) {
            return Err(self.abort(push_err));
        }
        self.blocks_submitted += 1;
        Ok(())
    }

    fn write_end(&mut self) -> Result<()> {
        if self.state != StreamState::HeaderWritten {
            return Err(self.misuse("write_end"));
        }
        let footer = if self.options.use_change_ops {
            "</osmChange>\n"
        } else {
            "</osm>\n"
        };
        self.send_to_output_queue(footer.to_string())?;

        self.state = StreamState::Ended;
        self.queue.close();
        self.join_drain()?;
        info!(blocks = self.blocks_submitted; "Finished XML output");
        Ok(())
    }
}

impl Drop for XmlOutputFormat {
    fn drop(&mut self) {
        if self.drain.is_some() {
            self.queue.close();
            if let Err(err) = self.join_drain() {
                error!(err = err.message.as_str(); "XML output dropped with a pending failure");
            }
        }
    }
}

/// Forwards results to the sink in push order until the queue is closed and
/// empty. The first failure closes the queue and ends the drain.
fn drain_queue(queue: &OrderedQueue<String>, mut sink: Box<dyn OutputSink>) -> Result<()> {
    let mut chunks = 0usize;
    while let Some(next) = queue.pop_next_ready_or_wait() {
        let written = next.and_then(|chunk| sink.write_chunk(&chunk));
        if let Err(err) = written {
            error!(err = err.message.as_str(), chunk = chunks; "Writing XML output failed");
            queue.close();
            return Err(err);
        }
        chunks += 1;
    }
    sink.flush()?;
    debug!(chunks = chunks; "Output queue drained");
    Ok(())
}
