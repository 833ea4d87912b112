//! Built-in frame writers

use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use super::reader::resolve_path;
use super::{Component, FrameWriter};
use crate::config::defaults::DEFAULT_WRITER_APPEND;
use crate::config::ComponentConfig;
use crate::context::TransformContext;
use crate::errors::{ConfigError, StageError, WriteError};
use crate::frame::Frame;

/// Writes each frame as one JSON object per line to `target`
///
/// Relative paths are taken from the work directory when one is set. The
/// file is truncated on open unless `append` is enabled.
pub struct JsonLinesWriter {
    target: String,
    append: bool,
    path: Option<PathBuf>,
    out: Option<BufWriter<File>>,
    written: u64,
}

impl Default for JsonLinesWriter {
    fn default() -> Self {
        Self {
            target: String::new(),
            append: DEFAULT_WRITER_APPEND,
            path: None,
            out: None,
            written: 0,
        }
    }
}

impl JsonLinesWriter {
    pub fn new<T: Into<String>>(target: T) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    pub fn appending(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

#[async_trait]
impl Component for JsonLinesWriter {
    fn name(&self) -> &str {
        "JsonLinesWriter"
    }

    fn configure(&mut self, config: &ComponentConfig) -> Result<(), ConfigError> {
        self.target = config.require_str("target")?;
        self.append = config.get_bool("append", DEFAULT_WRITER_APPEND)?;
        Ok(())
    }

    async fn open(&mut self, context: &mut TransformContext) -> Result<(), StageError> {
        let path = resolve_path(&*context, &self.target, context.work_dir());
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if self.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(&path).await.map_err(|e| {
            StageError::with_source(format!("Cannot open {}", path.display()), e)
        })?;

        info!("Writing frames to {}", path.display());
        self.out = Some(BufWriter::new(file));
        self.path = Some(path);
        self.written = 0;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), StageError> {
        if let Some(mut out) = self.out.take() {
            out.flush().await?;
            debug!("Wrote {} frames to {:?}", self.written, self.path);
        }
        Ok(())
    }
}

#[async_trait]
impl FrameWriter for JsonLinesWriter {
    async fn write(&mut self, frame: &Frame, _context: &mut TransformContext) -> Result<(), WriteError> {
        let Some(out) = self.out.as_mut() else {
            return Err(WriteError::new("writer is not open"));
        };
        let mut line = frame.to_json().to_string();
        line.push('\n');
        out.write_all(line.as_bytes()).await?;
        self.written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_frames(writer: &mut JsonLinesWriter, context: &mut TransformContext, ids: &[i32]) {
        writer.open(context).await.unwrap();
        for id in ids {
            writer.write(&Frame::new().with("id", *id), context).await.unwrap();
        }
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_truncates_then_appends() {
        let dir = tempfile::tempdir().unwrap();
        let mut context = TransformContext::new("job").with_work_dir(dir.path().join("out"));

        write_frames(&mut JsonLinesWriter::new("frames.jsonl"), &mut context, &[1, 2]).await;
        write_frames(&mut JsonLinesWriter::new("frames.jsonl"), &mut context, &[3]).await;
        write_frames(
            &mut JsonLinesWriter::new("frames.jsonl").appending(true),
            &mut context,
            &[4],
        )
        .await;

        let written = std::fs::read_to_string(dir.path().join("out").join("frames.jsonl")).unwrap();
        assert_eq!(written, "{\"id\":3}\n{\"id\":4}\n");
    }

    #[tokio::test]
    async fn test_write_before_open_fails() {
        let mut context = TransformContext::new("job");
        let result = JsonLinesWriter::new("x.jsonl")
            .write(&Frame::new(), &mut context)
            .await;
        assert!(result.is_err());
    }
}
