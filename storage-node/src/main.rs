use std::{io, thread, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::{io::AsyncWriteExt, sync::oneshot};
use tracing::{info, warn};

use storage_node::{
    answer::{self, Outcome},
    cli::{AskArgs, Cli, Command, ServeArgs},
    client::StorageClient,
    node::StorageNode,
    liveness::{self, EchoResponder},
    prompt,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await?,
        Command::Get(args) => {
            let mut client = StorageClient::connect(args.server).await?;
            let data = client.get().await?;
            write_stdout(&serde_json::to_string(&data)?).await?;
        }
        Command::Set(args) => {
            let mut client = StorageClient::connect(args.server).await?;
            client.set(args.values).await?;
            write_stdout("OK").await?;
        }
        Command::Ping(args) => {
            let within = Duration::from_millis(args.timeout_ms);
            liveness::wait_for_server(&args.server, within).await?;
            write_stdout(&format!("{} is reachable", args.server)).await?;
        }
        Command::Ask(args) => ask(args).await?,
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let node = StorageNode::new();
    let addr = node.start_server(&args.listen).await?;
    info!("storage node listening on {}", addr);

    let echo = match args.echo {
        Some(echo_addr) => {
            let responder = EchoResponder::bind(echo_addr)
                .await
                .with_context(|| format!("failed to bind echo responder on {echo_addr}"))?;
            info!("echo responder listening on {}", responder.local_addr()?);
            let (stop, stopped) = oneshot::channel::<()>();
            let task = tokio::spawn(responder.run_until(async move {
                let _ = stopped.await;
            }));
            Some((stop, task))
        }
        None => None,
    };

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }

    if let Some((stop, task)) = echo {
        let _ = stop.send(());
        task.await?;
    }
    node.shutdown().await?;
    Ok(())
}

async fn ask(args: AskArgs) -> Result<()> {
    prompt::render_menu(&mut io::stdout(), &args.options, "answers")?;

    let (sender, source) = answer::answer_channel();
    let option_count = args.options.len();
    // A blocked stdin read cannot be cancelled, so it gets its own thread
    // instead of holding up runtime shutdown.
    thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        if let Err(err) = prompt::feed_answers(&mut stdin, &mut io::stdout(), option_count, &sender)
        {
            warn!(error = ?err, "failed to read answer");
        }
    });

    let deadline = Duration::from_millis(args.timeout_ms);
    let line = match answer::wait_for_answer(deadline, source).await {
        Outcome::Answered(selection) => {
            let chosen = usize::try_from(selection)
                .ok()
                .and_then(|index| args.options.get(index));
            match chosen {
                Some(option) => format!("selected {}) {option}", selection + 1),
                None => format!("invalid selection {selection}"),
            }
        }
        Outcome::TimedOut => format!("no answer within {} ms", args.timeout_ms),
        Outcome::Closed => "input closed before an answer was given".to_string(),
    };
    write_stdout(&line).await?;
    Ok(())
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
