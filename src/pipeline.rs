//! JSON-lines normalization pipeline behind the `keycase` binary.
//!
//! One reader task streams lines from every input into a bounded channel,
//! a pool of workers normalizes records, and a writer task puts the results
//! back into input order before writing them out.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;

use crate::config::{InputSource, RunConfig};
use crate::error::{CliError, NormalizeError};
use crate::fallback::Normalized;
use crate::normalize::Normalizer;
use crate::payload::Payload;

const CHANNEL_CAPACITY: usize = 10_000;
const PROGRESS_EVERY: usize = 10_000;

#[derive(Debug)]
struct Record {
    seq: usize,
    source_name: Arc<str>,
    line_no: usize,
    line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Converted,
    FellBack,
    Skipped,
}

#[derive(Debug)]
struct Processed {
    seq: usize,
    line: Option<String>,
    outcome: Outcome,
}

/// Record counts of a finished run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub read: usize,
    pub converted: usize,
    pub fell_back: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: Outcome) {
        self.read += 1;
        match outcome {
            Outcome::Converted => self.converted += 1,
            Outcome::FellBack => self.fell_back += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records read, {} converted, {} fell back, {} skipped",
            self.read, self.converted, self.fell_back, self.skipped
        )
    }
}

pub async fn run(config: RunConfig) -> Result<RunSummary, CliError> {
    let writer: Box<dyn AsyncWrite + Unpin + Send> = match &config.output {
        Some(path) => Box::new(BufWriter::new(File::create(path).await?)),
        None => Box::new(BufWriter::new(tokio::io::stdout())),
    };
    run_with_writer(config, writer).await
}

pub async fn run_with_writer<W>(config: RunConfig, writer: W) -> Result<RunSummary, CliError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, rx) = async_channel::bounded::<Record>(CHANNEL_CAPACITY);
    let (out_tx, out_rx) = async_channel::bounded::<Processed>(CHANNEL_CAPACITY);

    let inputs = config.inputs.clone();
    let reader = tokio::spawn(async move { read_inputs(inputs, tx).await });

    let normalizer = Arc::new(Normalizer::new(config.options.clone()));
    let fallback = Arc::new(config.fallback.clone());

    let mut workers = Vec::new();
    for worker_id in 0..config.workers {
        let worker_rx = rx.clone();
        let worker_tx = out_tx.clone();
        let normalizer = normalizer.clone();
        let fallback = fallback.clone();
        let worker = tokio::spawn(async move {
            log::debug!("Starting normalize worker #{}", worker_id);
            while let Ok(record) = worker_rx.recv().await {
                let processed = match process(&normalizer, (*fallback).as_ref(), record) {
                    Ok(processed) => processed,
                    Err(e) => {
                        log::error!("Worker #{}: {}", worker_id, e);
                        // Stop the reader and the other workers
                        worker_rx.close();
                        return Err(e);
                    }
                };
                if worker_tx.send(processed).await.is_err() {
                    break;
                }
            }
            log::debug!("Worker #{} finished", worker_id);
            Ok::<(), CliError>(())
        });
        workers.push(worker);
    }

    // Workers hold their own clones; the channels close once every worker
    // and the reader are done
    drop(rx);
    drop(out_tx);

    let writer = tokio::spawn(write_ordered(out_rx, writer));

    let worker_results = futures::future::try_join_all(workers).await?;
    let lines_read = reader.await??;
    let summary = writer.await??;

    for result in worker_results {
        result?;
    }

    log::info!("Read {} lines, {}", lines_read, summary);
    Ok(summary)
}

async fn read_inputs(
    inputs: Vec<InputSource>,
    tx: async_channel::Sender<Record>,
) -> Result<usize, CliError> {
    let mut seq = 0;
    let mut n_lines_read = 0;
    for (file_n, input) in inputs.iter().enumerate() {
        log::info!("Reading input #{}: {}", file_n, input.name());
        let source_name: Arc<str> = input.name().into();
        let keep_going = match input {
            InputSource::Stdin => {
                read_lines(tokio::io::stdin(), &source_name, &tx, &mut seq, &mut n_lines_read)
                    .await?
            }
            InputSource::File(path) => {
                let file = File::open(path).await?;
                read_lines(file, &source_name, &tx, &mut seq, &mut n_lines_read).await?
            }
        };
        if !keep_going {
            log::warn!("Workers stopped, not reading further input");
            break;
        }
    }
    Ok(n_lines_read)
}

// Returns false once nobody is receiving any more
async fn read_lines<R: AsyncRead + Unpin>(
    reader: R,
    source_name: &Arc<str>,
    tx: &async_channel::Sender<Record>,
    seq: &mut usize,
    n_lines_read: &mut usize,
) -> Result<bool, CliError> {
    let mut lines = LinesStream::new(BufReader::new(reader).lines());
    let mut line_no = 0;
    while let Some(line) = lines.next().await {
        let line = line?;
        line_no += 1;
        *n_lines_read += 1;
        if *n_lines_read % PROGRESS_EVERY == 0 {
            log::info!("Reading line {}", n_lines_read);
        }
        if line.trim().is_empty() {
            continue;
        }

        let record = Record {
            seq: *seq,
            source_name: source_name.clone(),
            line_no,
            line,
        };
        if tx.send(record).await.is_err() {
            return Ok(false);
        }
        *seq += 1;
    }
    Ok(true)
}

// Deepest container nesting of a JSON text, found without parsing it.
// Brackets inside strings are ignored.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut in_string = false;
    let mut escaped = false;
    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'[' | b'{' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b']' | b'}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

// serde_json's own nesting cap is off; depth is bounded by the normalizer's
// `max_depth`, checked before parsing
fn parse_record(line: &str) -> Result<Payload, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(line);
    deserializer.disable_recursion_limit();
    let payload = Payload::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(payload)
}

fn process(
    normalizer: &Normalizer,
    fallback: Option<&Payload>,
    record: Record,
) -> Result<Processed, CliError> {
    let too_deep = normalizer
        .options()
        .max_depth
        .filter(|&limit| nesting_depth(&record.line) > limit);

    let result = match too_deep {
        Some(limit) => Err(NormalizeError::DepthExceeded {
            limit,
            path: "/".to_string(),
        }),
        None => match parse_record(&record.line) {
            Ok(payload) => normalizer.normalize(&payload),
            Err(error) if fallback.is_some() => {
                log::error!(
                    "{}:{}: skipping malformed record: {}",
                    record.source_name,
                    record.line_no,
                    error
                );
                return Ok(Processed {
                    seq: record.seq,
                    line: None,
                    outcome: Outcome::Skipped,
                });
            }
            Err(error) => {
                return Err(CliError::MalformedRecord {
                    source_name: record.source_name.to_string(),
                    line: record.line_no,
                    error,
                })
            }
        },
    };

    let (normalized, outcome) = match fallback {
        Some(fallback) => {
            let result = Normalized::from_result(result, fallback.clone());
            if result.is_fallback() {
                log::debug!(
                    "{}:{}: wrote fallback record",
                    record.source_name,
                    record.line_no
                );
                (result.into_inner(), Outcome::FellBack)
            } else {
                (result.into_inner(), Outcome::Converted)
            }
        }
        None => {
            let normalized = result.map_err(|error| CliError::Normalize {
                source_name: record.source_name.to_string(),
                line: record.line_no,
                error,
            })?;
            (normalized, Outcome::Converted)
        }
    };

    Ok(Processed {
        seq: record.seq,
        line: Some(serde_json::to_string(&normalized).map_err(CliError::Serialize)?),
        outcome,
    })
}

async fn write_ordered<W: AsyncWrite + Unpin>(
    out_rx: async_channel::Receiver<Processed>,
    mut writer: W,
) -> Result<RunSummary, CliError> {
    let mut summary = RunSummary::default();
    let mut pending = BTreeMap::new();
    let mut next_seq = 0;

    while let Ok(processed) = out_rx.recv().await {
        pending.insert(processed.seq, processed);
        while let Some(processed) = pending.remove(&next_seq) {
            summary.count(processed.outcome);
            if let Some(line) = processed.line {
                writer.write_all(line.as_bytes()).await?;
                writer.write_all(b"\n").await?;
            }
            next_seq += 1;
        }
    }

    if !pending.is_empty() {
        log::warn!("{} records were not written after a failure", pending.len());
    }
    writer.flush().await?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::{CollisionPolicy, NormalizeOptions, DEFAULT_MAX_DEPTH};
    use crate::payload::Mapping;
    use serde_json::json;

    fn record(seq: usize, line: &str) -> Record {
        Record {
            seq,
            source_name: "test".into(),
            line_no: seq + 1,
            line: line.to_string(),
        }
    }

    fn empty_fallback() -> Payload {
        Payload::Mapping(Mapping::new())
    }

    #[test]
    fn process_converts_record() {
        let processed = process(
            &Normalizer::default(),
            Some(&empty_fallback()),
            record(0, r#"{"GroupId":"g-1","Students":[{"FirstName":"Ann"}]}"#),
        )
        .unwrap();
        assert_eq!(processed.outcome, Outcome::Converted);
        assert_eq!(
            processed.line.as_deref(),
            Some(r#"{"groupId":"g-1","students":[{"firstName":"Ann"}]}"#)
        );
    }

    #[test]
    fn process_falls_back_on_fault() {
        let normalizer = Normalizer::new(NormalizeOptions {
            collisions: CollisionPolicy::Reject,
            ..NormalizeOptions::default()
        });
        let processed = process(
            &normalizer,
            Some(&empty_fallback()),
            record(3, r#"{"Id":1,"id":2}"#),
        )
        .unwrap();
        assert_eq!(processed.seq, 3);
        assert_eq!(processed.outcome, Outcome::FellBack);
        assert_eq!(processed.line.as_deref(), Some("{}"));
    }

    #[test]
    fn process_skips_malformed_json() {
        let processed = process(
            &Normalizer::default(),
            Some(&empty_fallback()),
            record(0, "{not json"),
        )
        .unwrap();
        assert_eq!(processed.outcome, Outcome::Skipped);
        assert!(processed.line.is_none());
    }

    #[test]
    fn strict_process_propagates() {
        assert!(matches!(
            process(&Normalizer::default(), None, record(0, "[1,")),
            Err(CliError::MalformedRecord { line: 1, .. })
        ));

        let normalizer = Normalizer::new(NormalizeOptions {
            collisions: CollisionPolicy::Reject,
            ..NormalizeOptions::default()
        });
        assert!(matches!(
            process(&normalizer, None, record(1, r#"{"A":1,"a":2}"#)),
            Err(CliError::Normalize { line: 2, .. })
        ));
    }

    fn nested_array(levels: usize) -> String {
        format!("{}1{}", "[".repeat(levels), "]".repeat(levels))
    }

    #[test]
    fn nesting_depth_ignores_brackets_in_strings() {
        assert_eq!(nesting_depth("42"), 0);
        assert_eq!(nesting_depth(r#"{"A":[1,{"B":[]}]}"#), 4);
        assert_eq!(nesting_depth(r#"{"Note":"[[[{{{"}"#), 1);
        assert_eq!(nesting_depth(r#"["quote \" [[", []]"#), 2);
        assert_eq!(nesting_depth(&nested_array(300)), 300);
    }

    #[test]
    fn record_at_depth_limit_is_converted() {
        let line = nested_array(DEFAULT_MAX_DEPTH);
        let processed = process(
            &Normalizer::default(),
            Some(&empty_fallback()),
            record(0, &line),
        )
        .unwrap();
        assert_eq!(processed.outcome, Outcome::Converted);
        assert_eq!(processed.line.as_deref(), Some(line.as_str()));
    }

    #[test]
    fn record_past_depth_limit_falls_back() {
        let line = nested_array(DEFAULT_MAX_DEPTH + 1);
        let processed = process(
            &Normalizer::default(),
            Some(&empty_fallback()),
            record(0, &line),
        )
        .unwrap();
        assert_eq!(processed.outcome, Outcome::FellBack);
        assert_eq!(processed.line.as_deref(), Some("{}"));

        assert!(matches!(
            process(&Normalizer::default(), None, record(0, &line)),
            Err(CliError::Normalize {
                error: NormalizeError::DepthExceeded { limit: DEFAULT_MAX_DEPTH, .. },
                ..
            })
        ));
    }

    #[test]
    fn unlimited_depth_parses_past_serde_default() {
        let normalizer = Normalizer::new(NormalizeOptions {
            max_depth: None,
            ..NormalizeOptions::default()
        });
        let line = nested_array(200);
        let processed = process(&normalizer, None, record(0, &line)).unwrap();
        assert_eq!(processed.line.as_deref(), Some(line.as_str()));
    }

    #[tokio::test]
    async fn writer_restores_input_order() {
        let (tx, rx) = async_channel::unbounded();
        for (seq, outcome) in [(2, Outcome::Converted), (0, Outcome::FellBack), (1, Outcome::Skipped)] {
            let line = (outcome != Outcome::Skipped).then(|| json!({ "seq": seq }).to_string());
            tx.send(Processed { seq, line, outcome }).await.unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let summary = write_ordered(rx, &mut out).await.unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "{\"seq\":0}\n{\"seq\":2}\n");
        assert_eq!(
            summary,
            RunSummary {
                read: 3,
                converted: 1,
                fell_back: 1,
                skipped: 1,
            }
        );
    }
}
