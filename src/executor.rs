use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub const PROCESS_POLLING_INTERVAL: Duration = Duration::from_millis(100);

/// 子进程退出后，管道安静超过该时长即停止读取
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(50);

type ReaderTask = JoinHandle<std::io::Result<String>>;

/// 一次子进程调用的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs shell command lines on behalf of the installers.
///
/// A non-zero exit status is not an error: callers inspect
/// [`ProcessResult::status`] and decide what it means.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, command: &str, suppress_stderr: bool) -> Result<ProcessResult>;
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr { silent: bool },
}

pub struct ShellRunner {
    poll_interval: Duration,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self {
            poll_interval: PROCESS_POLLING_INTERVAL,
        }
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self { poll_interval }
    }

    fn shell(command: &str) -> Command {
        if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(command);
            c
        }
    }
}

impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, suppress_stderr: bool) -> Result<ProcessResult> {
        tracing::debug!("Executing: {}...", command);

        let mut child = Self::shell(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Execution(format!("Failed to spawn '{}': {}", command, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Execution("stdout pipe was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::Execution("stderr pipe was not captured".to_string()))?;

        // 后台孙进程可能继承管道且一直不关闭，读取任务以子进程退出为准结束
        let (exited_tx, exited) = watch::channel(false);
        let stdout_task = spawn_reader(stdout, Stream::Stdout, exited.clone());
        let stderr_task = spawn_reader(
            stderr,
            Stream::Stderr {
                silent: suppress_stderr,
            },
            exited,
        );

        // 轮询而非阻塞等待，两个管道同时被读取
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => tokio::time::sleep(self.poll_interval).await,
                Err(e) => {
                    abandon(&mut child, &[&stdout_task, &stderr_task]).await;
                    return Err(e.into());
                }
            }
        };
        exited_tx.send_replace(true);

        let stdout = join_reader(stdout_task).await?;
        let stderr = join_reader(stderr_task).await?;

        Ok(ProcessResult {
            status: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<T>(pipe: T, stream: Stream, mut exited: watch::Receiver<bool>) -> ReaderTask
where
    T: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(pipe);
        let mut aggregate = String::new();
        let mut buf = Vec::new();
        loop {
            tokio::select! {
                biased;
                read = reader.read_until(b'\n', &mut buf) => {
                    // EOF 即管道的所有写端都已关闭
                    if read? == 0 {
                        break;
                    }
                    record_line(&mut aggregate, &mut buf, stream);
                }
                // 发送端被丢弃时同样视为已退出
                _ = async { exited.wait_for(|exited| *exited).await.map(|_| ()) } => {
                    // 读取已缓冲的剩余输出，不等待仍持有管道的孙进程
                    loop {
                        let read = tokio::time::timeout(
                            OUTPUT_DRAIN_TIMEOUT,
                            reader.read_until(b'\n', &mut buf),
                        )
                        .await;
                        match read {
                            Ok(Ok(0)) | Err(_) => break,
                            Ok(Ok(_)) => record_line(&mut aggregate, &mut buf, stream),
                            Ok(Err(e)) => return Err(e),
                        }
                    }
                    break;
                }
            }
        }
        // 没有换行结尾的最后一段
        if !buf.is_empty() {
            record_line(&mut aggregate, &mut buf, stream);
        }
        Ok(aggregate)
    })
}

fn record_line(aggregate: &mut String, buf: &mut Vec<u8>, stream: Stream) {
    let line = String::from_utf8_lossy(buf);
    aggregate.push_str(&line);
    let line = line.trim_end_matches(['\r', '\n']);
    match stream {
        Stream::Stdout => tracing::debug!("{}", line),
        Stream::Stderr { silent: false } => tracing::error!("{}", line),
        Stream::Stderr { silent: true } => {}
    }
    buf.clear();
}

/// 无法再获取子进程状态时：杀死并回收子进程，停止读取任务
async fn abandon(child: &mut Child, readers: &[&ReaderTask]) {
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill child process: {}", e);
    }
    for reader in readers {
        reader.abort();
    }
}

async fn join_reader(task: ReaderTask) -> Result<String> {
    task.await
        .map_err(|e| Error::Execution(format!("output reader failed: {}", e)))?
        .map_err(Error::from)
}
