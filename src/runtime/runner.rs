// src/runtime/runner.rs

//! Execution of a single leaf command.
//!
//! A runner spawns the command in a sub-shell, streams stdout/stderr through
//! a line splitter into the owning task's event channel, and collects the
//! child shell's final environment through an extra pipe on fd 3. The shell
//! wrapper is responsible for emitting `env >&3` before it exits, so the
//! parent can read the environment back after wait.

use std::collections::HashMap;
use std::os::unix::io::FromRawFd;
use std::process::Stdio;
use std::sync::{Arc, Mutex, OnceLock};

use regex::Regex;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::types::TaskStatus;

use super::task::Task;
use super::{RuntimeContext, TaskEvent};

/// Fragments buffered beyond this count are dropped (stdout only).
const STDOUT_DROP_THRESHOLD: usize = 100;

/// Capacity of the per-stream intake channels.
const STREAM_BUFFER: usize = 1000;

/// Everything a runner needs, detached from the task tree so the dispatch
/// loop keeps exclusive ownership of the tasks themselves.
#[derive(Debug, Clone)]
pub struct RunnerSpec {
    pub id: Uuid,
    pub name: String,
    pub cmd: String,
    pub cwd: Option<String>,
    pub sudo: bool,
    pub ignore_failure: bool,
    pub stop_on_failure: bool,
    pub event_driven: bool,
    pub error_buffer: Arc<Mutex<String>>,
    pub current_line: Arc<Mutex<String>>,
}

impl RunnerSpec {
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id,
            name: task.display_name(),
            cmd: task.config.cmd.clone(),
            cwd: task.config.cwd.clone(),
            sudo: task.config.sudo,
            ignore_failure: task.config.ignore_failure,
            stop_on_failure: task.config.stop_on_failure,
            event_driven: task.config.event_driven,
            error_buffer: Arc::clone(&task.error_buffer),
            current_line: Arc::clone(&task.current_line),
        }
    }
}

/// Spawn a runner for one leaf command.
///
/// `environment` is the shared serial-environment mapping; parallel children
/// receive `None` so their mutations stay invisible to siblings.
pub fn spawn_runner(
    spec: RunnerSpec,
    events: mpsc::Sender<TaskEvent>,
    environment: Option<Arc<Mutex<HashMap<String, String>>>>,
    context: Arc<RuntimeContext>,
) -> JoinHandle<()> {
    tokio::spawn(run(spec, events, environment, context))
}

async fn run(
    spec: RunnerSpec,
    events: mpsc::Sender<TaskEvent>,
    environment: Option<Arc<Mutex<HashMap<String, String>>>>,
    context: Arc<RuntimeContext>,
) {
    debug!(task = %spec.name, cmd = %spec.cmd, "starting task command");
    let _ = events.send(TaskEvent::running(spec.id)).await;

    // env-exfiltration pipe; the write end becomes the child's fd 3
    let mut fds = [0i32; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        fail_to_start(&spec, &events, &context, "could not open env pipe").await;
        return;
    }
    let (read_fd, write_fd) = (fds[0], fds[1]);

    let shell = std::env::var("SHELL").unwrap_or_default();
    let shell = if shell.is_empty() { "sh".to_string() } else { shell };
    let sudo_prefix = if spec.sudo { "sudo -S " } else { "" };
    let wrapped = format!(
        "{}{}; SHRUN_RC=$?; env >&3; exit $SHRUN_RC",
        sudo_prefix, spec.cmd,
    );

    let mut command = Command::new(&shell);
    command
        .arg("-c")
        .arg(&wrapped)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);
    if let Some(cwd) = &spec.cwd {
        command.current_dir(cwd);
    }
    if let Some(environment) = &environment {
        let snapshot = environment.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in snapshot.iter() {
            command.env(key, value);
        }
    }

    unsafe {
        command.pre_exec(move || {
            // child side: expose the write end as fd 3, drop the read end
            if libc::dup2(write_fd, 3) < 0 {
                return Err(std::io::Error::last_os_error());
            }
            if write_fd != 3 {
                libc::close(write_fd);
            }
            libc::close(read_fd);
            Ok(())
        });
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(err) => {
            unsafe {
                libc::close(read_fd);
                libc::close(write_fd);
            }
            let message = format!("Failed to run: {}", err);
            fail_to_start(&spec, &events, &context, &message).await;
            return;
        }
    };

    // the child holds its own copy of the write end now
    unsafe {
        libc::close(write_fd);
    }

    if let Some(mut stdin) = child.stdin.take() {
        let password = context.sudo_password.clone().unwrap_or_default();
        let _ = stdin.write_all(format!("{}\n", password).as_bytes()).await;
    }

    let max_fragment = context.terminal_width * 2;
    let (out_tx, mut out_rx) = mpsc::channel::<String>(STREAM_BUFFER);
    let (err_tx, mut err_rx) = mpsc::channel::<String>(STREAM_BUFFER);

    let mut splitters = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        splitters.push(tokio::spawn(split_stream(stdout, max_fragment, out_tx)));
    } else {
        drop(out_tx);
    }
    if let Some(stderr) = child.stderr.take() {
        splitters.push(tokio::spawn(split_stream(stderr, max_fragment, err_tx)));
    } else {
        drop(err_tx);
    }

    let mut out_done = false;
    let mut err_done = false;
    while !(out_done && err_done) {
        tokio::select! {
            fragment = out_rx.recv(), if !out_done => match fragment {
                Some(line) => {
                    // falling behind: burn off fragments without showing them
                    if out_rx.len() > STDOUT_DROP_THRESHOLD {
                        continue;
                    }
                    if spec.event_driven {
                        let _ = events.send(TaskEvent::stdout(spec.id, line)).await;
                    } else {
                        *spec.current_line.lock().unwrap_or_else(|e| e.into_inner()) = line;
                    }
                }
                None => out_done = true,
            },
            fragment = err_rx.recv(), if !err_done => match fragment {
                Some(line) => {
                    {
                        let mut buffer =
                            spec.error_buffer.lock().unwrap_or_else(|e| e.into_inner());
                        buffer.push_str(&line);
                        buffer.push('\n');
                    }
                    if spec.event_driven {
                        let _ = events.send(TaskEvent::stderr(spec.id, line)).await;
                    } else {
                        *spec.current_line.lock().unwrap_or_else(|e| e.into_inner()) = line;
                    }
                }
                None => err_done = true,
            },
        }
    }
    for splitter in splitters {
        let _ = splitter.await;
    }

    let return_code = match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            let message = format!("Failed to run: {}", err);
            {
                let mut buffer = spec.error_buffer.lock().unwrap_or_else(|e| e.into_inner());
                buffer.push_str(&message);
                buffer.push('\n');
            }
            let _ = events.send(TaskEvent::stderr(spec.id, message)).await;
            -1
        }
    };
    debug!(task = %spec.name, return_code, "task command exited");

    // the parent's write end is closed and the child has exited, so the
    // read end drains to EOF
    let exfiltrated = tokio::task::spawn_blocking(move || {
        use std::io::Read;
        let mut file = unsafe { std::fs::File::from_raw_fd(read_fd) };
        let mut data = String::new();
        file.read_to_string(&mut data).map(|_| data)
    })
    .await;

    match exfiltrated {
        Ok(Ok(data)) => {
            if let Some(environment) = &environment {
                let mut env = environment.lock().unwrap_or_else(|e| e.into_inner());
                apply_env_lines(&mut env, &data);
            }
        }
        Ok(Err(err)) => warn!(task = %spec.name, error = %err, "could not read child environment"),
        Err(err) => warn!(task = %spec.name, error = %err, "env drain task failed"),
    }

    if return_code == 0 || spec.ignore_failure {
        let _ = events
            .send(TaskEvent::completed(spec.id, TaskStatus::Success, return_code))
            .await;
    } else {
        let _ = events
            .send(TaskEvent::completed(spec.id, TaskStatus::Error, return_code))
            .await;
        if spec.stop_on_failure {
            context.request_exit();
        }
    }
}

/// Report a command that never reached `exec`.
async fn fail_to_start(
    spec: &RunnerSpec,
    events: &mpsc::Sender<TaskEvent>,
    context: &RuntimeContext,
    message: &str,
) {
    {
        let mut buffer = spec.error_buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.push_str(message);
        buffer.push('\n');
    }
    let _ = events
        .send(TaskEvent::stderr(spec.id, message.to_string()))
        .await;
    let _ = events
        .send(TaskEvent::completed(spec.id, TaskStatus::Error, -1))
        .await;
    if spec.stop_on_failure {
        context.request_exit();
    }
}

/// Split a byte stream into fragments on `\n`, on `\r`, or when a single
/// fragment exceeds `max_len` bytes, cleansing ANSI escapes from each.
async fn split_stream<R>(mut reader: R, max_len: usize, tx: mpsc::Sender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        // drain every complete fragment currently buffered
        loop {
            if let Some(index) = buffer.iter().position(|b| *b == b'\n' || *b == b'\r') {
                let fragment: Vec<u8> = buffer.drain(..=index).take(index).collect();
                if tx.send(cleanse(&fragment)).await.is_err() {
                    return;
                }
            } else if max_len > 0 && buffer.len() > max_len {
                let fragment: Vec<u8> = buffer.drain(..max_len).collect();
                if tx.send(cleanse(&fragment)).await.is_err() {
                    return;
                }
            } else {
                break;
            }
        }

        match reader.read(&mut chunk).await {
            Ok(0) => {
                if !buffer.is_empty() && tx.send(cleanse(&buffer)).await.is_err() {
                    return;
                }
                return;
            }
            Ok(n) => buffer.extend_from_slice(&chunk[..n]),
            Err(_) => return,
        }
    }
}

/// Strip ANSI escape sequences from a raw output fragment.
fn cleanse(fragment: &[u8]) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let pattern = ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-_]").expect("static pattern")
    });
    let text = String::from_utf8_lossy(fragment);
    pattern.replace_all(&text, "").into_owned()
}

/// Fold `KEY=VALUE` / `KEY` lines from the exfiltration pipe back into the
/// shared environment.
fn apply_env_lines(env: &mut HashMap<String, String>, data: &str) {
    for line in data.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once('=') {
            Some((key, value)) => env.insert(key.to_string(), value.to_string()),
            None => env.insert(line.to_string(), String::new()),
        };
    }
}
