//! Built-in frame readers

use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, info};

use super::{Component, FrameReader};
use crate::config::ComponentConfig;
use crate::context::TransformContext;
use crate::errors::{ConfigError, ReadError, StageError};
use crate::frame::Frame;

/// Resolve a configured path template, anchoring relative paths at `base`
pub(crate) fn resolve_path(context: &TransformContext, template: &str, base: Option<&Path>) -> PathBuf {
    let path = PathBuf::from(context.resolve(template));
    match base {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

/// Reads one JSON object per line from `source`
///
/// Relative paths are taken from the job directory when one is set. Blank
/// lines are skipped; a line that is not a JSON object is a read error for
/// that line only.
#[derive(Default)]
pub struct JsonLinesReader {
    source: String,
    path: Option<PathBuf>,
    lines: Option<Lines<BufReader<File>>>,
    line_number: usize,
}

impl JsonLinesReader {
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Component for JsonLinesReader {
    fn name(&self) -> &str {
        "JsonLinesReader"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.source = config.require_str("source")?;
        Ok(())
    }

    async fn open(&mut self, context: &mut TransformContext) -> Result<(), StageError> {
        let path = resolve_path(&*context, &self.source, context.job_dir());
        let file = File::open(&path).await.map_err(|e| {
            StageError::with_source(format!("Cannot open {}", path.display()), e)
        })?;
        info!("Reading frames from {}", path.display());
        self.lines = Some(BufReader::new(file).lines());
        self.path = Some(path);
        self.line_number = 0;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StageError> {
        if self.lines.take().is_some() {
            debug!("Read {} lines from {:?}", self.line_number, self.path);
        }
        Ok(())
    }
}

#[async_trait]
impl FrameReader for JsonLinesReader {
    async fn read(&mut self, _context: &mut TransformContext) -> Result<Option<Frame>, ReadError> {
        let Some(lines) = self.lines.as_mut() else {
            return Err(ReadError::new("reader is not open"));
        };

        loop {
            let Some(line) = lines.next_line().await? else {
                return Ok(None);
            };
            self.line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            let value: serde_json::Value = serde_json::from_str(&line).map_err(|e| {
                ReadError::with_source(format!("line {} is not valid JSON", self.line_number), e)
            })?;
            return Frame::from_json(&value)
                .map(Some)
                .ok_or_else(|| ReadError::new(format!("line {} is not a JSON object", self.line_number)));
        }
    }
}

/// Serves frames from memory, in order
#[derive(Debug, Default, Clone)]
pub struct MemoryReader {
    frames: VecDeque<Frame>,
}

impl MemoryReader {
    pub fn new<I: IntoIterator<Item = Frame>>(frames: I) -> Self {
        Self {
            frames: frames.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl Component for MemoryReader {
    fn name(&self) -> &str {
        "MemoryReader"
    }
}

#[async_trait]
impl FrameReader for MemoryReader {
    async fn read(&mut self, _context: &mut TransformContext) -> Result<Option<Frame>, ReadError> {
        Ok(self.frames.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FieldValue;

    #[tokio::test]
    async fn test_reads_objects_and_reports_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("input.jsonl"),
            "{\"id\": 1}\n\nnot json\n[1]\n{\"id\": 2}\n",
        )
        .unwrap();

        let mut context = TransformContext::new("job").with_job_dir(dir.path());
        let mut reader = JsonLinesReader::new("input.jsonl");
        reader.open(&mut context).await.unwrap();

        let first = reader.read(&mut context).await.unwrap().unwrap();
        assert_eq!(first.get("id"), Some(&FieldValue::S64(1)));
        let bad = reader.read(&mut context).await.unwrap_err();
        assert!(bad.to_string().contains("line 3"));
        assert!(reader.read(&mut context).await.is_err());
        let last = reader.read(&mut context).await.unwrap().unwrap();
        assert_eq!(last.get("id"), Some(&FieldValue::S64(2)));
        assert!(reader.read(&mut context).await.unwrap().is_none());

        reader.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_source_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = TransformContext::new("job");
        let mut reader = JsonLinesReader::new(dir.path().join("absent.jsonl").display().to_string());

        assert!(reader.open(&mut context).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_reader_drains_in_order() {
        let mut context = TransformContext::new("job");
        let mut reader = MemoryReader::new([Frame::new().with("n", 1), Frame::new().with("n", 2)]);

        assert_eq!(reader.read(&mut context).await.unwrap().unwrap().get("n"), Some(&FieldValue::S32(1)));
        assert_eq!(reader.remaining(), 1);
        reader.read(&mut context).await.unwrap();
        assert!(reader.read(&mut context).await.unwrap().is_none());
    }
}
