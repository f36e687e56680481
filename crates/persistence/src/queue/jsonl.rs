//! JSONL task queue - append-only writer and reader
//!
//! One file per queue: `<base>/<queue>.jsonl`, one [`TaskEnvelope`] per
//! line.

use super::TaskDispatcher;
use crate::error::{PersistenceError, PersistenceResult};
use async_trait::async_trait;
use britewallet_core::{Task, TaskEnvelope};
use chrono::Utc;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

pub struct JsonlTaskQueue {
    base_path: PathBuf,
    /// Serializes appends and takes
    write_lock: Mutex<()>,
}

impl JsonlTaskQueue {
    /// Create the queue directory if needed
    pub fn new<P: AsRef<Path>>(base_path: P) -> PersistenceResult<Self> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;

        Ok(Self {
            base_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn queue_path(&self, queue: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", queue))
    }

    fn lock(&self) -> PersistenceResult<std::sync::MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| PersistenceError::Other("task queue lock poisoned".to_string()))
    }

    /// Append one envelope to its queue file
    pub fn append(&self, envelope: &TaskEnvelope) -> PersistenceResult<()> {
        let json = serde_json::to_string(envelope)?;
        let _guard = self.lock()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.queue_path(&envelope.queue))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    /// Everything currently on `queue`, oldest first
    pub fn read_queue(&self, queue: &str) -> PersistenceResult<Vec<TaskEnvelope>> {
        let path = self.queue_path(queue);
        if !path.exists() {
            return Ok(Vec::new());
        }
        Self::read_file(&path)
    }

    /// Move everything on `queue` aside and return it, together with any
    /// batch taken earlier and never completed.
    ///
    /// The file is renamed away first, so appends racing with the take
    /// land in a fresh file. Taken batches stay on disk until
    /// [`Self::complete_taken`]; a consumer that stops mid-drain gets them
    /// back on its next take. One consumer per queue.
    pub fn take_pending(&self, queue: &str) -> PersistenceResult<Vec<TaskEnvelope>> {
        let path = self.queue_path(queue);

        {
            let _guard = self.lock()?;
            if path.exists() {
                let mut stamp = Utc::now().timestamp_millis();
                let mut taking = self.taking_path(queue, stamp);
                // Never overwrite a batch that is still pending
                while taking.exists() {
                    stamp += 1;
                    taking = self.taking_path(queue, stamp);
                }
                fs::rename(&path, &taking)?;
            }
        }

        let mut tasks = Vec::new();
        for batch in self.taken_files(queue)? {
            tasks.extend(Self::read_file(&batch)?);
        }
        debug!(queue, count = tasks.len(), "Took pending tasks");
        Ok(tasks)
    }

    /// Drop the batches returned by [`Self::take_pending`]
    pub fn complete_taken(&self, queue: &str) -> PersistenceResult<()> {
        for batch in self.taken_files(queue)? {
            fs::remove_file(&batch)?;
        }
        Ok(())
    }

    fn taking_path(&self, queue: &str, stamp: i64) -> PathBuf {
        self.base_path.join(format!("{}.{}.taking", queue, stamp))
    }

    /// `<queue>.<millis>.taking` files, oldest first
    fn taken_files(&self, queue: &str) -> PersistenceResult<Vec<PathBuf>> {
        let prefix = format!("{}.", queue);
        let mut batches: Vec<(i64, PathBuf)> = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            let stamp = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(&prefix))
                .and_then(|rest| rest.strip_suffix(".taking"))
                .and_then(|millis| millis.parse::<i64>().ok());
            if let Some(stamp) = stamp {
                batches.push((stamp, path));
            }
        }

        batches.sort();
        Ok(batches.into_iter().map(|(_, path)| path).collect())
    }

    /// Names of the queues that have a file
    pub fn list_queues(&self) -> PersistenceResult<Vec<String>> {
        let mut queues = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    queues.push(stem.to_string());
                }
            }
        }

        queues.sort();
        Ok(queues)
    }

    fn read_file(path: &Path) -> PersistenceResult<Vec<TaskEnvelope>> {
        let reader = BufReader::new(File::open(path)?);
        let mut tasks = Vec::new();

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            tasks.push(serde_json::from_str(&line)?);
        }

        Ok(tasks)
    }
}

#[async_trait]
impl TaskDispatcher for JsonlTaskQueue {
    async fn enqueue(&self, task: Task, queue: &str) -> PersistenceResult<TaskEnvelope> {
        let envelope = TaskEnvelope::new(task, queue, Utc::now());
        self.append(&envelope)?;
        Ok(envelope)
    }
}
