mod grabber;
mod session;
mod translator;

use anyhow::{Context, Result};
use grabber::DeviceEvent;
use multitap_core::config::{self, Config};
use multitap_core::ipc::{self, ClientMsg, DaemonMsg};
use multitap_core::typing::TypingMachine;
use session::Session;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};
use translator::{KeyEdge, Translator};

/// Key input from IPC clients, funneled into the main loop so that the
/// typing machine has a single writer.
#[derive(Debug)]
enum ClientKey {
    Down(String),
    Up(String),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("multitapd=info".parse::<tracing_subscriber::filter::Directive>()?),
        )
        .init();

    info!("multitapd starting");

    let config = Config::load().context("loading config")?;
    let keypad = config.load_keypad().context("loading keypad")?;
    let machine = TypingMachine::new(keypad, config.typing.debounce());
    info!(debounce_ms = config.typing.debounce_ms, "typing machine ready");

    let keypads = grabber::find_keypads().context("finding keypads")?;
    if keypads.is_empty() {
        warn!("no keypad devices found, accepting IPC key input only");
    }

    let translators: Vec<Translator> = keypads.iter().map(|_| Translator::new()).collect();
    let session = Arc::new(Mutex::new(Session::new(&config, machine, keypads.len())));

    // Event channel from input devices
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    for (idx, path) in keypads.iter().enumerate() {
        let tx = event_tx.clone();
        let path = path.clone();
        tokio::spawn(async move {
            if let Err(e) = grabber::read_device(path.clone(), idx, tx).await {
                error!(path = %path.display(), error = %e, "device task failed");
            }
        });
    }
    drop(event_tx);

    // Key channel from IPC clients
    let (key_tx, key_rx) = mpsc::unbounded_channel::<ClientKey>();

    let socket_path = config::socket_path();
    // Remove stale socket
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding socket {}", socket_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o666)).ok();
    }
    info!(path = %socket_path.display(), "IPC socket listening");

    let session_ipc = Arc::clone(&session);
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let session = Arc::clone(&session_ipc);
                    tokio::spawn(handle_ipc_client(stream, session, key_tx.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "IPC accept error");
                }
            }
        }
    });

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };
    run(session, translators, event_rx, key_rx, shutdown).await;

    info!("multitapd shutting down");
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

/// Main event loop. The deadline is recomputed every iteration, so a
/// restarted or cancelled debounce timer never fires late. Returns once
/// `shutdown` resolves.
async fn run(
    session: Arc<Mutex<Session>>,
    mut translators: Vec<Translator>,
    mut event_rx: mpsc::UnboundedReceiver<DeviceEvent>,
    mut key_rx: mpsc::UnboundedReceiver<ClientKey>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        let deadline = session.lock().await.next_deadline();
        let sleep_fut = match deadline {
            Some(dl) => tokio::time::sleep_until(tokio::time::Instant::from_std(dl)),
            None => tokio::time::sleep_until(
                tokio::time::Instant::now() + std::time::Duration::from_secs(86400),
            ),
        };
        let has_deadline = deadline.is_some();

        tokio::select! {
            Some(dev_event) = event_rx.recv() => {
                let idx = dev_event.device_idx;
                let Some(edge) = translators.get_mut(idx).and_then(|t| t.translate(&dev_event.event)) else {
                    continue;
                };
                let mut session = session.lock().await;
                match edge {
                    KeyEdge::Down(label) => session.key_down(label, Instant::now()),
                    KeyEdge::Up(label) => session.key_up(label),
                }
            }
            Some(key) = key_rx.recv() => {
                let mut session = session.lock().await;
                match key {
                    ClientKey::Down(label) => session.key_down(&label, Instant::now()),
                    ClientKey::Up(label) => session.key_up(&label),
                }
            }
            _ = sleep_fut, if has_deadline => {
                session.lock().await.check_timer(Instant::now());
            }
            _ = &mut shutdown => {
                info!("interrupted");
                break;
            }
        }
    }
}

async fn handle_ipc_client(
    stream: UnixStream,
    session: Arc<Mutex<Session>>,
    key_tx: mpsc::UnboundedSender<ClientKey>,
) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // Channel for sending messages back to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let write_handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut is_watcher = false;

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(msg) = ipc::decode_client(&line) else {
            continue;
        };

        match msg {
            ClientMsg::Watch => {
                is_watcher = true;
                let mut session = session.lock().await;
                session.add_watcher(tx.clone());
                // Current state first, so the watcher can draw immediately.
                let _ = tx.send(ipc::encode(&session.state_msg()));
            }
            ClientMsg::KeyDown { label } => {
                let ok = key_tx.send(ClientKey::Down(label.clone())).is_ok();
                let ack = DaemonMsg::Ack {
                    ok,
                    message: format!("key down {}", label),
                };
                let _ = tx.send(ipc::encode(&ack));
            }
            ClientMsg::KeyUp { label } => {
                let ok = key_tx.send(ClientKey::Up(label.clone())).is_ok();
                let ack = DaemonMsg::Ack {
                    ok,
                    message: format!("key up {}", label),
                };
                let _ = tx.send(ipc::encode(&ack));
            }
            ClientMsg::GetState => {
                let msg = session.lock().await.state_msg();
                let _ = tx.send(ipc::encode(&msg));
            }
            ClientMsg::GetStatus => {
                let msg = session.lock().await.status_msg();
                let _ = tx.send(ipc::encode(&msg));
            }
        }
    }

    // Client disconnected. Stop the writer first so its receiver is gone
    // before closed watchers are pruned.
    write_handle.abort();
    let _ = write_handle.await;
    if is_watcher {
        session.lock().await.prune_watchers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::oneshot;

    fn make_session() -> (Arc<Mutex<Session>>, mpsc::UnboundedReceiver<String>) {
        let config = Config::default();
        let mut session = Session::new(&config, TypingMachine::default(), 0);
        let (tx, rx) = mpsc::unbounded_channel();
        session.add_watcher(tx);
        (Arc::new(Mutex::new(session)), rx)
    }

    #[tokio::test]
    async fn run_applies_keys_until_shutdown() {
        let (session, mut watch_rx) = make_session();
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(run(
            Arc::clone(&session),
            Vec::new(),
            event_rx,
            key_rx,
            async {
                let _ = stop_rx.await;
            },
        ));

        // Several loop iterations pass before the shutdown signal arrives.
        for label in ["2", "2", "3"] {
            key_tx.send(ClientKey::Down(label.to_string())).unwrap();
            key_tx.send(ClientKey::Up(label.to_string())).unwrap();
        }
        let mut states = 0;
        while states < 3 {
            let line = watch_rx.recv().await.expect("watcher closed");
            if let Some(DaemonMsg::State { .. }) = ipc::decode_daemon(&line) {
                states += 1;
            }
        }

        stop_tx.send(()).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("loop did not stop")
            .unwrap();

        match session.lock().await.state_msg() {
            DaemonMsg::State { state, .. } => {
                assert_eq!(state.message, "b");
                assert_eq!(state.pending_char, Some('d'));
            }
            other => panic!("expected State, got {:?}", other),
        };
    }

    #[tokio::test]
    async fn run_stops_while_debounce_is_pending() {
        let (session, _watch_rx) = make_session();
        let (_event_tx, event_rx) = mpsc::unbounded_channel();
        let (key_tx, key_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        key_tx.send(ClientKey::Down("7".to_string())).unwrap();
        stop_tx.send(()).unwrap();

        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            run(session, Vec::new(), event_rx, key_rx, async {
                let _ = stop_rx.await;
            }),
        )
        .await
        .expect("loop did not stop");
    }
}
