use std::{path::Path, process::Stdio, time::Duration};

use anyhow::{Context, Result, anyhow};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStdout, Command},
    time::timeout,
};

const READ_TIMEOUT: Duration = Duration::from_secs(3);
const LISTENING_BANNER: &str = "storage node listening on";
const ECHO_BANNER: &str = "echo responder listening on";

#[tokio::test]
async fn cli_set_then_get_end_to_end() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("storage_node");

    let (mut node_child, mut node_stdout) = spawn_node(&binary, &[]).await?;
    let addr = read_node_addr(&mut node_stdout).await?;

    // Keep draining node logs so the pipe never fills.
    let node_log_task = tokio::spawn(async move {
        drain_stdout(node_stdout).await;
    });

    let set = run_cli(&binary, &["set", "--server", &addr, "a", "b"]).await?;
    assert_eq!(set, "OK");

    let get = run_cli(&binary, &["get", "--server", &addr]).await?;
    assert_eq!(get, r#"["a","b"]"#);

    let cleared = run_cli(&binary, &["set", "--server", &addr]).await?;
    assert_eq!(cleared, "OK");
    let get = run_cli(&binary, &["get", "--server", &addr]).await?;
    assert_eq!(get, "[]");

    let _ = node_child.kill().await;
    let _ = node_child.wait().await;
    let _ = node_log_task.await;

    Ok(())
}

#[tokio::test]
async fn cli_ping_reaches_serve_echo_responder() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("storage_node");

    let (mut node_child, mut node_stdout) =
        spawn_node(&binary, &["--echo", "127.0.0.1:0"]).await?;
    let line = read_until_contains(&mut node_stdout, ECHO_BANNER).await?;
    let echo_addr = banner_addr(&line)?;

    let node_log_task = tokio::spawn(async move {
        drain_stdout(node_stdout).await;
    });

    let ping = run_cli(
        &binary,
        &["ping", "--server", &echo_addr, "--timeout-ms", "2000"],
    )
    .await?;
    assert_eq!(ping, format!("{echo_addr} is reachable"));

    let _ = node_child.kill().await;
    let _ = node_child.wait().await;
    let _ = node_log_task.await;

    Ok(())
}

#[tokio::test]
async fn cli_ask_reports_selected_option() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("storage_node");
    let mut child = spawn_ask(&binary, "5000")?;

    let mut stdin = child.stdin.take().context("ask stdin missing")?;
    stdin.write_all(b"nope\n2\n").await?;
    stdin.flush().await?;

    let mut stdout = BufReader::new(child.stdout.take().context("ask stdout missing")?);
    let result = read_until_prefix(&mut stdout, "selected").await?;
    assert_eq!(result, "selected 2) blue");

    ensure_success(&mut child, "ask").await?;
    Ok(())
}

#[tokio::test]
async fn cli_ask_times_out_without_answer() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("storage_node");
    let mut child = spawn_ask(&binary, "200")?;
    // Hold stdin open so the only way out is the deadline.
    let _stdin = child.stdin.take().context("ask stdin missing")?;

    let mut stdout = BufReader::new(child.stdout.take().context("ask stdout missing")?);
    let result = read_until_prefix(&mut stdout, "no answer").await?;
    assert_eq!(result, "no answer within 200 ms");

    ensure_success(&mut child, "ask").await?;
    Ok(())
}

#[tokio::test]
async fn cli_ask_reports_closed_input() -> Result<()> {
    let binary = assert_cmd::cargo::cargo_bin!("storage_node");
    let mut child = spawn_ask(&binary, "5000")?;
    drop(child.stdin.take());

    let mut stdout = BufReader::new(child.stdout.take().context("ask stdout missing")?);
    let result = read_until_prefix(&mut stdout, "input closed").await?;
    assert_eq!(result, "input closed before an answer was given");

    ensure_success(&mut child, "ask").await?;
    Ok(())
}

async fn spawn_node(binary: &Path, extra: &[&str]) -> Result<(Child, BufReader<ChildStdout>)> {
    let mut cmd = Command::new(binary);
    cmd.arg("serve")
        .arg("--listen")
        .arg("127.0.0.1:0")
        .args(extra)
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "info")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn().context("failed to spawn storage node")?;
    let stdout = child
        .stdout
        .take()
        .context("node stdout missing after spawn")?;

    Ok((child, BufReader::new(stdout)))
}

fn spawn_ask(binary: &Path, timeout_ms: &str) -> Result<Child> {
    let mut cmd = Command::new(binary);
    cmd.args(["ask", "--option", "red", "--option", "blue"])
        .args(["--timeout-ms", timeout_ms])
        .env("NO_COLOR", "1")
        .env("RUST_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    cmd.spawn().context("failed to spawn ask")
}

async fn read_node_addr(reader: &mut BufReader<ChildStdout>) -> Result<String> {
    let line = read_until_contains(reader, LISTENING_BANNER).await?;
    banner_addr(&line)
}

fn banner_addr(line: &str) -> Result<String> {
    let addr = line
        .split_whitespace()
        .last()
        .context("unexpected node banner format")?;
    if !addr.contains(':') {
        return Err(anyhow!("node banner missing socket: {line}"));
    }
    Ok(addr.to_string())
}

async fn run_cli(binary: &Path, args: &[&str]) -> Result<String> {
    let output = timeout(
        READ_TIMEOUT,
        Command::new(binary)
            .args(args)
            .env("RUST_LOG", "error")
            .env("NO_COLOR", "1")
            .output(),
    )
    .await
    .with_context(|| format!("timed out running {args:?}"))??;

    if !output.status.success() {
        return Err(anyhow!("{args:?} exited with status {}", output.status));
    }
    let stdout = String::from_utf8(output.stdout).context("cli stdout is not utf-8")?;
    Ok(stdout.trim().to_string())
}

async fn read_until_prefix<R>(reader: &mut BufReader<R>, prefix: &str) -> Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        let line = read_line(reader)
            .await?
            .with_context(|| format!("stream closed before a line starting with '{prefix}'"))?;
        if line.starts_with(prefix) {
            return Ok(line);
        }
    }
}

async fn read_until_contains<R>(reader: &mut BufReader<R>, needle: &str) -> Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    loop {
        let line = read_line(reader)
            .await?
            .with_context(|| format!("stream closed before a line containing '{needle}'"))?;
        if line.contains(needle) {
            return Ok(line);
        }
    }
}

async fn read_line<R>(reader: &mut BufReader<R>) -> Result<Option<String>>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let bytes_io = match timeout(READ_TIMEOUT, reader.read_line(&mut line)).await {
        Ok(result) => result,
        Err(_) => return Err(anyhow!("timed out waiting for line")),
    };
    if bytes_io? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

async fn drain_stdout(mut reader: BufReader<ChildStdout>) {
    let mut buffer = String::new();
    while reader
        .read_line(&mut buffer)
        .await
        .map(|bytes| {
            let has_data = bytes > 0;
            if has_data {
                buffer.clear();
            }
            has_data
        })
        .unwrap_or(false)
    {}
}

async fn ensure_success(child: &mut Child, name: &str) -> Result<()> {
    let status = timeout(READ_TIMEOUT, child.wait())
        .await
        .with_context(|| format!("{name} did not exit in time"))?
        .with_context(|| format!("failed to await {name} process"))?;
    if !status.success() {
        return Err(anyhow!("{name} exited with status {status}"));
    }
    Ok(())
}
