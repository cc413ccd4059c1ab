use anyhow::Result;
use log::{error, info, warn};
use notify::{RecursiveMode, Watcher};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::{
    io::{BufRead, BufReader, Write},
    os::unix::net::{UnixListener, UnixStream},
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    sync::{Arc, Mutex, mpsc},
    thread,
    time::Duration,
};

use super::pipeline::run_pipeline;
use super::runtime;
use crate::config::{DaemonConfigState, Profile};
use crate::ipc::dispatch::{self, PlayerEvent};
use crate::remote::{Credentials, MediaControl, NullRemote, SpotifyRemote};
use crate::voice::{self, CommandTranscriber, Transcriber};

pub enum DaemonEvent {
    Log(String),
}

enum IpcMsg {
    Reload,
    UseProfile(String),
    Shutdown,
}

pub fn run_daemon() -> Result<()> {
    // socket
    let sock = runtime::socket_path();
    if sock.exists() {
        let _ = std::fs::remove_file(&sock);
    }
    let listener = UnixListener::bind(&sock)?;
    info!("daemon: listening on {}", sock.display());

    // state
    let mut cfg = DaemonConfigState::load_or_install_default()?;
    info!("daemon: active profile '{}'", cfg.active_name);

    let profile = Arc::new(Mutex::new(cfg.profile.clone()));
    let enabled = Arc::new(AtomicBool::new(true));
    let remote: Arc<dyn MediaControl + Send + Sync> =
        match Credentials::resolve(&cfg.profile.spotify) {
            Ok(creds) => Arc::new(SpotifyRemote::new(creds)?),
            Err(e) => {
                warn!("{e}");
                Arc::new(NullRemote::new())
            }
        };

    // channels
    let (tx_req, rx_req) = mpsc::channel::<IpcMsg>();
    let (tx_evt, rx_evt) = mpsc::channel::<DaemonEvent>();

    // gesture thread, sole owner of recognition state
    {
        let profile = profile.clone();
        let enabled = enabled.clone();
        let remote = remote.clone();
        let tx_evt = tx_evt.clone();
        thread::spawn(move || {
            if let Err(e) = run_pipeline(profile, enabled, remote, tx_evt) {
                error!("gesture pipeline failed: {e}");
            }
        });
    }

    // SIGINT/SIGTERM → clean shutdown
    {
        let tx = tx_req.clone();
        let mut signals = Signals::new([SIGINT, SIGTERM])?;
        thread::spawn(move || {
            if signals.forever().next().is_some() {
                let _ = tx.send(IpcMsg::Shutdown);
            }
        });
    }

    // reload when a profile file changes on disk
    let _watcher = spawn_profile_watcher(cfg.profiles_dir.clone(), tx_req.clone())?;

    // accept loop
    listener.set_nonblocking(true)?;
    loop {
        if let Ok((stream, _)) = listener.accept() {
            let ctx = ClientCtx {
                enabled: enabled.clone(),
                profile: profile.clone(),
                remote: remote.clone(),
                cfg: cfg.clone(),
                tx_req: tx_req.clone(),
            };
            thread::spawn(move || {
                if let Err(e) = handle_client(stream, ctx) {
                    error!("ipc client error: {e}");
                }
            });
        }

        while let Ok(DaemonEvent::Log(s)) = rx_evt.try_recv() {
            info!("[gesture] {s}");
        }

        while let Ok(msg) = rx_req.try_recv() {
            match msg {
                IpcMsg::Reload => match cfg.reload() {
                    Ok(()) => {
                        *profile.lock().unwrap() = cfg.profile.clone();
                        info!("profile reloaded");
                    }
                    Err(e) => error!("reload failed: {e}"),
                },
                IpcMsg::UseProfile(name) => match cfg.set_active(&name) {
                    Ok(()) => {
                        *profile.lock().unwrap() = cfg.profile.clone();
                        info!("switched active profile to {}", cfg.active_name);
                    }
                    Err(e) => error!("use profile failed: {e}"),
                },
                IpcMsg::Shutdown => {
                    info!("daemon: shutting down");
                    let _ = std::fs::remove_file(&sock);
                    return Ok(());
                }
            }
        }

        thread::sleep(Duration::from_millis(5));
    }
}

fn spawn_profile_watcher(
    dir: PathBuf,
    tx: mpsc::Sender<IpcMsg>,
) -> Result<notify::RecommendedWatcher> {
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            if event.kind.is_modify() || event.kind.is_create() {
                let _ = tx.send(IpcMsg::Reload);
            }
        }
    })?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

struct ClientCtx {
    enabled: Arc<AtomicBool>,
    profile: Arc<Mutex<Profile>>,
    remote: Arc<dyn MediaControl + Send + Sync>,
    cfg: DaemonConfigState,
    tx_req: mpsc::Sender<IpcMsg>,
}

fn handle_client(mut stream: UnixStream, ctx: ClientCtx) -> Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim().is_empty() {
        return Ok(());
    }
    let req: serde_json::Value = serde_json::from_str(&line)?;
    let op = req.get("op").and_then(|v| v.as_str()).unwrap_or("");

    let resp = match op {
        "status" => serde_json::json!({"ok": true, "data": {
            "enabled": ctx.enabled.load(Ordering::Relaxed),
            "active_profile": ctx.cfg.active_name,
            "socket": runtime::socket_path(),
            "landmark_stream": runtime::landmarks_path(),
        }}),
        "reload" => {
            let _ = ctx.tx_req.send(IpcMsg::Reload);
            serde_json::json!({"ok": true, "data": {"active_profile": ctx.cfg.active_name}})
        }
        "use" => {
            let name = req.get("profile").and_then(|v| v.as_str()).unwrap_or("");
            let _ = ctx.tx_req.send(IpcMsg::UseProfile(name.to_string()));
            serde_json::json!({"ok": true, "data": {"active_profile": name}})
        }
        "list" => {
            let list = ctx.cfg.list_profiles();
            serde_json::json!({"ok": true, "data": {"profiles": list, "active": ctx.cfg.active_name}})
        }
        "doctor" => {
            let report = ctx.cfg.doctor_report();
            serde_json::json!({"ok": true, "data": report})
        }
        "enable" => {
            ctx.enabled.store(true, Ordering::Relaxed);
            serde_json::json!({"ok": true, "data": {"enabled": true}})
        }
        "disable" => {
            ctx.enabled.store(false, Ordering::Relaxed);
            serde_json::json!({"ok": true, "data": {"enabled": false}})
        }
        "say" => {
            let text = req.get("text").and_then(|v| v.as_str()).unwrap_or("");
            route_utterance(&ctx, text)
        }
        "listen" => listen(&ctx),
        "shutdown" => {
            let _ = ctx.tx_req.send(IpcMsg::Shutdown);
            serde_json::json!({"ok": true, "data": "shutting down"})
        }
        _ => serde_json::json!({"ok": false, "error": format!("unknown op: {op}")}),
    };

    writeln!(stream, "{resp}")?;
    Ok(())
}

/// Parses one transcript and dispatches it. Runs on the IPC client thread,
/// so a slow remote call never stalls frame processing.
fn route_utterance(ctx: &ClientCtx, text: &str) -> serde_json::Value {
    match PlayerEvent::from_voice(voice::parse_utterance(text)) {
        None => {
            info!("utterance not recognized: {text:?}");
            serde_json::json!({"ok": false, "error": "utterance not recognized"})
        }
        Some(event) => {
            let snapshot = { ctx.profile.lock().unwrap().clone() };
            match dispatch::dispatch_event(&event, &snapshot, ctx.remote.as_ref()) {
                Ok(_) => serde_json::json!({"ok": true, "data": {"command": format!("{event:?}")}}),
                Err(e) => serde_json::json!({"ok": false, "error": e.to_string()}),
            }
        }
    }
}

/// Captures one utterance via the configured transcriber command. A failed
/// capture is treated the same as an unrecognized utterance.
fn listen(ctx: &ClientCtx) -> serde_json::Value {
    let cmdline = { ctx.profile.lock().unwrap().voice.transcriber_cmd.clone() };
    match cmdline {
        None => serde_json::json!({"ok": false, "error": "no voice.transcriber_cmd configured"}),
        Some(cmdline) => {
            let mut transcriber = CommandTranscriber::new(cmdline);
            match transcriber.transcribe() {
                Ok(text) => route_utterance(ctx, &text),
                Err(e) => {
                    warn!("transcription failed: {e}");
                    serde_json::json!({"ok": false, "error": "utterance not recognized"})
                }
            }
        }
    }
}

// client helper
pub fn client_request(req: serde_json::Value) -> Result<serde_json::Value> {
    let sock = runtime::socket_path();
    if !sock.exists() {
        return Err(anyhow::anyhow!(
            "wavectl daemon is not running (socket missing at {})",
            sock.display()
        ));
    }
    let mut stream = UnixStream::connect(sock)?;
    let line = serde_json::to_string(&req)? + "\n";
    stream.write_all(line.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut resp = String::new();
    reader.read_line(&mut resp)?;
    let v: serde_json::Value = serde_json::from_str(&resp)?;
    Ok(v)
}
