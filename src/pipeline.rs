//! Generator → transformer → consumer pipeline.
//!
//! Each stage runs on its own thread. Stages are linked by zero-capacity
//! channels, so every hand-off is a rendezvous: a stage blocks until the next
//! one is ready to take the record. A slow consumer therefore stalls the whole
//! chain, and records reach the consumer in exactly the order the generator
//! produced them.
//!
//! ```text
//! Generator ──▶ Transformer 1 ──▶ … ──▶ Transformer n ──▶ Consumer
//! ```
//!
//! [`Pipeline::run`] starts the threads and hands back a [`Completion`];
//! [`Completion::wait`] blocks until the consumer has drained the last record.

use crate::error::{IngestError, Result};
use crate::record::Record;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use std::fmt;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Produces records from one source format.
///
/// A generator is run once. It sends every record it maps to the sink and
/// returns when its input is exhausted. Malformed individual records are
/// logged and skipped inside the generator; an `Err` return means the input
/// as a whole could not be read.
pub trait Generator: Send {
    /// Map the whole input, sending each record downstream.
    ///
    /// # Errors
    ///
    /// Returns an error when the input stream cannot be decoded any further,
    /// or when the downstream stages have shut down.
    fn generate(&mut self, sink: &RecordSink) -> Result<()>;
}

/// A pass-through stage, applied to each record in order.
pub trait Transformer: Send {
    /// Return the record to hand downstream.
    fn transform(&mut self, record: Record) -> Record;
}

/// Terminal stage draining the record stream.
pub trait Consumer: Send {
    /// Consume records until the stream ends.
    ///
    /// Implementations must not return before the stream is exhausted unless
    /// they fail.
    ///
    /// # Errors
    ///
    /// Returns an error when the output sink fails.
    fn consume(&mut self, records: &mut RecordStream) -> Result<()>;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&mut self, sink: &RecordSink) -> Result<()> {
        (**self).generate(sink)
    }
}

impl<C: Consumer + ?Sized> Consumer for Box<C> {
    fn consume(&mut self, records: &mut RecordStream) -> Result<()> {
        (**self).consume(records)
    }
}

/// Sending end handed to a [`Generator`].
#[derive(Debug, Clone)]
pub struct RecordSink {
    sender: Sender<Record>,
}

impl RecordSink {
    /// Hand a record to the next stage, blocking until it is taken.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Pipeline`] when downstream has shut down.
    pub fn send(&self, record: Record) -> Result<()> {
        self.sender
            .send(record)
            .map_err(|_| IngestError::Pipeline("Downstream stage has shut down".to_string()))
    }
}

/// Receiving end handed to a [`Consumer`].
///
/// Iterating yields records until every upstream stage has finished.
#[derive(Debug)]
pub struct RecordStream {
    receiver: Receiver<Record>,
    delivered: usize,
}

impl RecordStream {
    fn new(receiver: Receiver<Record>) -> Self {
        RecordStream {
            receiver,
            delivered: 0,
        }
    }

    /// Number of records handed out so far.
    #[must_use]
    pub fn delivered(&self) -> usize {
        self.delivered
    }
}

impl Iterator for RecordStream {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        let record = self.receiver.recv().ok()?;
        self.delivered += 1;
        Some(record)
    }
}

impl FromIterator<Record> for RecordStream {
    /// A finished stream over already materialized records.
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        let (sender, receiver) = unbounded();
        for record in iter {
            // The receiver is alive, so this cannot fail.
            let _ = sender.send(record);
        }
        RecordStream::new(receiver)
    }
}

/// A generator, its transformers and a consumer, ready to run.
pub struct Pipeline {
    generator: Box<dyn Generator>,
    transformers: Vec<Box<dyn Transformer>>,
    consumer: Box<dyn Consumer>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("transformers", &self.transformers.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a pipeline with no transformers.
    pub fn new(generator: impl Generator + 'static, consumer: impl Consumer + 'static) -> Self {
        Pipeline {
            generator: Box::new(generator),
            transformers: Vec::new(),
            consumer: Box::new(consumer),
        }
    }

    /// Append a transformer. Transformers run in the order they are added.
    pub fn next(&mut self, transformer: impl Transformer + 'static) -> &mut Self {
        self.transformers.push(Box::new(transformer));
        self
    }

    /// Start every stage and return a handle to wait on.
    #[must_use]
    pub fn run(self) -> Completion {
        let Pipeline {
            mut generator,
            transformers,
            mut consumer,
        } = self;

        let (sender, mut upstream) = bounded::<Record>(0);
        let generator = thread::spawn(move || -> Result<()> {
            let sink = RecordSink { sender };
            generator.generate(&sink)
        });

        let mut stages = Vec::with_capacity(transformers.len());
        for mut transformer in transformers {
            let (sender, receiver) = bounded::<Record>(0);
            let input = std::mem::replace(&mut upstream, receiver);
            stages.push(thread::spawn(move || {
                for record in input {
                    if sender.send(transformer.transform(record)).is_err() {
                        debug!("transformer output closed, stopping");
                        break;
                    }
                }
            }));
        }

        let consumer = thread::spawn(move || -> Result<usize> {
            let mut stream = RecordStream::new(upstream);
            consumer.consume(&mut stream)?;
            Ok(stream.delivered())
        });

        Completion {
            generator,
            transformers: stages,
            consumer,
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunReport {
    /// Records the consumer received.
    pub consumed: usize,
}

/// Handle on a running pipeline.
#[derive(Debug)]
pub struct Completion {
    generator: JoinHandle<Result<()>>,
    transformers: Vec<JoinHandle<()>>,
    consumer: JoinHandle<Result<usize>>,
}

impl Completion {
    /// Block until the consumer has finished and every stage has exited.
    ///
    /// # Errors
    ///
    /// A consumer failure takes precedence, since it also shuts the
    /// generator down. Otherwise a fatal generator error is returned. A
    /// panicking stage is reported as [`IngestError::Pipeline`].
    pub fn wait(self) -> Result<RunReport> {
        let consumed = self
            .consumer
            .join()
            .map_err(|_| IngestError::Pipeline("Consumer stage panicked".to_string()));
        let generated = self
            .generator
            .join()
            .map_err(|_| IngestError::Pipeline("Generator stage panicked".to_string()));
        let mut transformer_panicked = false;
        for stage in self.transformers {
            transformer_panicked |= stage.join().is_err();
        }

        let consumed = consumed??;
        generated??;
        if transformer_panicked {
            return Err(IngestError::Pipeline("Transformer stage panicked".to_string()));
        }
        Ok(RunReport { consumed })
    }
}
