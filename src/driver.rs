//! Running a file through the pipeline.
//!
//! [`LinePipeline`] connects a [`PipeReader`] to a [`LineReader`] and a
//! [`Decoder`] and runs the read / scan / acknowledge loop until the input is
//! exhausted:
//!
//! 1. `read()` the buffered bytes;
//! 2. decode every complete line and hand the records to the consumer;
//! 3. `advance()` to the start of the first incomplete line;
//! 4. stop after the pass that saw end of input, flushing a final line that has
//!    no terminator, and `complete()` the source.
//!
//! Records can be pushed into a [`RecordSink`] with [`LinePipeline::run`] or
//! pulled lazily with [`LinePipeline::records`]:
//!
//! ```no_run
//! use linepipe::config::ParseConfig;
//! use linepipe::schema::SchemaKind;
//! use linepipe::{LinePipeline, sink_fn};
//! use std::ops::ControlFlow;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = ParseConfig::for_schema(SchemaKind::Profiles);
//!
//! // Push: stop after the first VIP.
//! let summary = LinePipeline::open("profiles.csv", config.clone())?.run(sink_fn(|r| {
//!     if r.is_vip == Some(true) { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
//! }))?;
//! assert!(summary.records > 0);
//!
//! // Pull.
//! for record in LinePipeline::open("profiles.csv", config)?.records() {
//!     println!("{}", record?.given_name);
//! }
//! # Ok(())
//! # }
//! ```

use crate::config::ParseConfig;
use crate::decode::{Decoder, LineOutcome};
use crate::lines::{LineEnding, LinePass, LineReader};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsCollector;
use crate::record::FakeName;
use crate::schema::SchemaKind;
use crate::source::{BufferedRange, PipeReader, SourceStats};
use crate::validation::{ErrorCollector, FieldError, FieldPolicy, LineError};
use anyhow::{Result, anyhow};
use serde::Serialize;
use std::collections::VecDeque;
use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;

/// Receives decoded records in input order.
pub trait RecordSink {
    /// Take one record. Returning `Break` ends the run early.
    fn accept(&mut self, record: FakeName) -> ControlFlow<()>;
}

impl RecordSink for Vec<FakeName> {
    fn accept(&mut self, record: FakeName) -> ControlFlow<()> {
        self.push(record);
        ControlFlow::Continue(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn accept(&mut self, record: FakeName) -> ControlFlow<()> {
        (**self).accept(record)
    }
}

/// A [`RecordSink`] backed by a closure; see [`sink_fn`].
pub struct SinkFn<F>(F);

impl<F> RecordSink for SinkFn<F>
where
    F: FnMut(FakeName) -> ControlFlow<()>,
{
    fn accept(&mut self, record: FakeName) -> ControlFlow<()> {
        (self.0)(record)
    }
}

/// Adapt a closure into a [`RecordSink`].
pub fn sink_fn<F>(f: F) -> SinkFn<F>
where
    F: FnMut(FakeName) -> ControlFlow<()>,
{
    SinkFn(f)
}

/// What a run did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParseSummary {
    pub schema: SchemaKind,
    /// Terminator used, configured or detected.
    pub line_ending: Option<LineEnding>,
    pub bytes_read: u64,
    pub segments_filled: u64,
    pub lines: u64,
    pub records: u64,
    pub headers: u64,
    pub blank_lines: u64,
    /// Malformed fields that took their zero value (lenient policy).
    pub fields_defaulted: u64,
    /// Lines dropped by a strict policy.
    pub lines_rejected: u64,
    /// Lines that crossed a segment boundary.
    pub multi_segment_lines: u64,
    pub stack_copies: u64,
    pub pooled_copies: u64,
    pub spills: u64,
    /// The sink asked to stop before end of input.
    pub stopped_early: bool,
    /// The first rejected lines, up to `max_reported_errors`.
    pub errors: Vec<LineError>,
}

impl ParseSummary {
    /// Add this run's counters to `metrics`.
    #[cfg(feature = "metrics")]
    pub fn publish(&self, metrics: &MetricsCollector) {
        let counters = [
            ("bytes_read", self.bytes_read),
            ("segments_filled", self.segments_filled),
            ("lines_read", self.lines),
            ("records_decoded", self.records),
            ("headers_skipped", self.headers),
            ("blank_lines", self.blank_lines),
            ("fields_defaulted", self.fields_defaulted),
            ("lines_rejected", self.lines_rejected),
            ("multi_segment_lines", self.multi_segment_lines),
            ("stack_copies", self.stack_copies),
            ("pooled_copies", self.pooled_copies),
            ("spills", self.spills),
        ];
        for (name, value) in counters {
            metrics.increment_counter(name, value);
        }
    }
}

/// Line-level state shared by the push and pull drivers.
struct Engine {
    source: String,
    decoder: Decoder,
    lines: LineReader,
    detect_ending: bool,
    line_no: u64,
    summary: ParseSummary,
    errors: ErrorCollector,
    #[cfg(feature = "metrics")]
    metrics: Option<MetricsCollector>,
}

impl Engine {
    fn new(source: String, config: &ParseConfig) -> Self {
        let schema = config.schema.schema();
        let decoder = Decoder::new(schema)
            .with_header_match(config.header_match)
            .with_policy(config.field_policy);
        let lines = LineReader::new(config.line_ending.unwrap_or(schema.line_ending))
            .with_stack_threshold(config.stack_threshold);
        Self {
            source,
            decoder,
            lines,
            detect_ending: config.line_ending.is_none(),
            line_no: 0,
            summary: ParseSummary {
                schema: config.schema,
                line_ending: config.line_ending,
                ..ParseSummary::default()
            },
            errors: ErrorCollector::with_limit(config.max_reported_errors),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    fn start(&self) {
        log::debug!("parsing {} as {}", self.source, self.decoder.schema().name());
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            m.record_start();
        }
    }

    /// Decode every complete line of `range`, handing records to `emit`.
    fn pass(
        &mut self,
        range: BufferedRange<'_>,
        is_final: bool,
        emit: &mut dyn FnMut(FakeName) -> ControlFlow<()>,
    ) -> Result<LinePass> {
        if self.detect_ending {
            match LineEnding::detect(&range) {
                Some(ending) => self.lines.set_line_ending(ending),
                None if is_final => {}
                None => {
                    return Ok(LinePass {
                        cursor: range.start(),
                        stopped: false,
                    });
                }
            }
            self.detect_ending = false;
            self.summary.line_ending = Some(self.lines.line_ending());
            log::debug!("{}: line ending {:?}", self.source, self.lines.line_ending());
        }

        let Self {
            source,
            decoder,
            lines,
            line_no,
            summary,
            errors,
            ..
        } = self;
        let mut failure: Option<(u64, FieldError)> = None;

        let pass = lines.for_each_line(range, is_final, |bytes| {
            *line_no += 1;
            let outcome = decoder.decode_line(bytes);
            if *line_no == 1 && !matches!(outcome, LineOutcome::Header) {
                log::warn!(
                    "{source}: first line does not match the {} header",
                    decoder.schema().name()
                );
            }
            match outcome {
                LineOutcome::Record { record, defaulted } => {
                    summary.records += 1;
                    summary.fields_defaulted += u64::from(defaulted);
                    emit(record)
                }
                LineOutcome::Header => {
                    summary.headers += 1;
                    ControlFlow::Continue(())
                }
                LineOutcome::Blank => {
                    summary.blank_lines += 1;
                    ControlFlow::Continue(())
                }
                LineOutcome::Rejected(error) => {
                    summary.lines_rejected += 1;
                    log::warn!("{source}: line {line_no} rejected: {error}");
                    errors.add(*line_no, error.clone());
                    if decoder.policy() == FieldPolicy::FailFast {
                        failure = Some((*line_no, error));
                        return ControlFlow::Break(());
                    }
                    ControlFlow::Continue(())
                }
            }
        });

        if let Some((line, error)) = failure {
            return Err(anyhow!(error).context(format!("{source}: line {line} rejected")));
        }
        Ok(pass)
    }

    fn finish(&mut self, source: SourceStats, stopped_early: bool) -> ParseSummary {
        let stats = self.lines.stats();
        let mut summary = std::mem::take(&mut self.summary);
        summary.lines = stats.lines;
        summary.multi_segment_lines = stats.multi_segment;
        summary.stack_copies = stats.stack_copies;
        summary.pooled_copies = stats.pooled_copies;
        summary.bytes_read = source.bytes_read;
        summary.segments_filled = source.segments_filled;
        summary.spills = source.spills;
        summary.stopped_early = stopped_early;
        summary.errors = std::mem::take(&mut self.errors).into_errors();

        log::info!(
            "{}: {} records from {} lines ({} bytes, {} multi-segment, {} rejected{})",
            self.source,
            summary.records,
            summary.lines,
            summary.bytes_read,
            summary.multi_segment_lines,
            summary.lines_rejected,
            if stopped_early { ", stopped early" } else { "" }
        );
        #[cfg(feature = "metrics")]
        if let Some(m) = &self.metrics {
            summary.publish(m);
            m.record_end();
        }
        summary
    }
}

/// A configured parse of one input.
pub struct LinePipeline {
    pipe: PipeReader,
    engine: Engine,
    config: ParseConfig,
}

impl LinePipeline {
    /// Open `path` and start reading it ahead.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, config: ParseConfig) -> Result<Self> {
        let path = path.as_ref();
        let pipe = PipeReader::open(path, config.pipe)?;
        Ok(Self {
            pipe,
            engine: Engine::new(path.display().to_string(), &config),
            config,
        })
    }

    /// Parse an arbitrary byte stream.
    ///
    /// # Errors
    /// Returns an error if the filler thread cannot be started.
    pub fn from_reader<R>(reader: R, config: ParseConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let pipe = PipeReader::from_reader(reader, config.pipe)?;
        Ok(Self {
            pipe,
            engine: Engine::new("<reader>".to_string(), &config),
            config,
        })
    }

    /// Publish run counters and timing into `metrics` when the run ends.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, metrics: MetricsCollector) -> Self {
        self.engine.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ParseConfig {
        &self.config
    }

    /// Decode the whole input into `sink`.
    ///
    /// If the sink breaks, the source is cancelled and the summary reports
    /// `stopped_early`.
    ///
    /// # Errors
    /// Returns I/O failures, and the first rejected line under
    /// [`FieldPolicy::FailFast`].
    pub fn run<S: RecordSink>(self, mut sink: S) -> Result<ParseSummary> {
        let Self {
            mut pipe,
            mut engine,
            ..
        } = self;
        engine.start();
        loop {
            let result = pipe.read()?;
            let done = result.is_completed;
            let pass = match engine.pass(result.buffer, done, &mut |r| sink.accept(r)) {
                Ok(pass) => pass,
                Err(e) => {
                    pipe.cancel();
                    return Err(e);
                }
            };
            pipe.advance(pass.cursor)?;
            if pass.stopped {
                let stats = pipe.cancel();
                return Ok(engine.finish(stats, true));
            }
            if done {
                let stats = pipe.complete()?;
                return Ok(engine.finish(stats, false));
            }
        }
    }

    /// Decode lazily. Records are produced one buffered range at a time.
    #[must_use]
    pub fn records(self) -> Records {
        self.engine.start();
        Records {
            pipe: Some(self.pipe),
            engine: self.engine,
            pending: VecDeque::new(),
            failure: None,
            summary: None,
        }
    }
}

/// Lazy record iterator returned by [`LinePipeline::records`].
///
/// Records decoded before a failing line are yielded first, then the error,
/// after which the iterator is fused. Dropping it early cancels the source.
pub struct Records {
    pipe: Option<PipeReader>,
    engine: Engine,
    pending: VecDeque<FakeName>,
    failure: Option<anyhow::Error>,
    summary: Option<ParseSummary>,
}

impl Records {
    /// The run summary, once the iterator is exhausted.
    #[must_use]
    pub fn summary(&self) -> Option<&ParseSummary> {
        self.summary.as_ref()
    }

    /// Decode the next buffered range into `pending`. Returns whether end of
    /// input has been processed.
    fn step(&mut self) -> Result<bool> {
        let Some(pipe) = self.pipe.as_mut() else {
            return Ok(true);
        };
        let result = pipe.read()?;
        let done = result.is_completed;
        let pending = &mut self.pending;
        let pass = self.engine.pass(result.buffer, done, &mut |r| {
            pending.push_back(r);
            ControlFlow::Continue(())
        })?;
        pipe.advance(pass.cursor)?;
        Ok(done)
    }
}

impl Iterator for Records {
    type Item = Result<FakeName>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if let Some(e) = self.failure.take() {
                return Some(Err(e));
            }
            self.pipe.as_ref()?;
            match self.step() {
                Ok(false) => {}
                Ok(true) => {
                    let pipe = self.pipe.take()?;
                    match pipe.complete() {
                        Ok(stats) => self.summary = Some(self.engine.finish(stats, false)),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => {
                    if let Some(pipe) = self.pipe.take() {
                        pipe.cancel();
                    }
                    // Records ahead of the failing line are still owed.
                    self.failure = Some(e);
                }
            }
        }
    }
}

impl Drop for Records {
    fn drop(&mut self) {
        if let Some(pipe) = self.pipe.take() {
            pipe.cancel();
        }
    }
}

/// Parse `path` into a vector.
///
/// # Errors
/// Returns an error if the file cannot be read, or a line is rejected under
/// [`FieldPolicy::FailFast`].
pub fn parse_file(path: impl AsRef<Path>, config: ParseConfig) -> Result<Vec<FakeName>> {
    let mut out = Vec::new();
    LinePipeline::open(path, config)?.run(&mut out)?;
    Ok(out)
}
