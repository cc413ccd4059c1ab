use anyhow::{Result, anyhow};
use pico_args::Arguments;
use std::{env, process::Command};

use crate::ipc;

pub fn run() -> Result<()> {
    let mut pargs = Arguments::from_env();

    // Hidden daemon mode (spawned by `start`)
    if pargs.contains("--daemon") {
        return ipc::run_daemon();
    }

    // No args -> general help
    if env::args().len() == 1 {
        print_help();
        return Ok(());
    }

    // Flags-based help (-h/--help)
    if pargs.contains("-h") || pargs.contains("--help") {
        print_help();
        return Ok(());
    }

    // First free arg is the subcommand
    let subcmd: Option<String> = pargs.free_from_str().ok();

    match subcmd.as_deref() {
        Some("help") => {
            let topic: Option<String> = pargs.free_from_str().ok();
            if let Some(t) = topic {
                print_subcmd_help(&t);
            } else {
                print_help();
            }
            Ok(())
        }

        Some("start") => {
            let exe = std::env::current_exe()?;
            let child = Command::new(exe).arg("--daemon").spawn()?;
            println!("wavectl: started daemon (pid={})", child.id());
            Ok(())
        }

        Some("stop") => {
            let r = ipc::client_request(serde_json::json!({"op":"shutdown"}))?;
            print_response(&r);
            Ok(())
        }

        Some("status") => {
            let r = ipc::client_request(serde_json::json!({"op":"status"}))?;
            print_response(&r);
            Ok(())
        }

        Some("reload") => {
            let r = ipc::client_request(serde_json::json!({"op":"reload"}))?;
            print_response(&r);
            Ok(())
        }

        Some("use") => {
            let name: String = pargs
                .free_from_str()
                .map_err(|_| anyhow!("usage: wavectl use <profile_name>"))?;
            let r = ipc::client_request(serde_json::json!({"op":"use","profile":name}))?;
            print_response(&r);
            Ok(())
        }

        Some("list") => {
            let r = ipc::client_request(serde_json::json!({"op":"list"}))?;
            print_response(&r);
            Ok(())
        }

        Some("doctor") => {
            let r = ipc::client_request(serde_json::json!({"op":"doctor"}))?;
            print_response(&r);
            Ok(())
        }

        Some("enable") => {
            let r = ipc::client_request(serde_json::json!({"op":"enable"}))?;
            print_response(&r);
            Ok(())
        }

        Some("disable") => {
            let r = ipc::client_request(serde_json::json!({"op":"disable"}))?;
            print_response(&r);
            Ok(())
        }

        Some("say") => {
            // usage: wavectl say play song bohemian rhapsody
            let words: Vec<String> = pargs
                .finish()
                .into_iter()
                .map(|w| w.to_string_lossy().into_owned())
                .collect();
            if words.is_empty() {
                return Err(anyhow!("usage: wavectl say <utterance...>"));
            }
            let text = words.join(" ");
            let r = ipc::client_request(serde_json::json!({"op":"say","text":text}))?;
            print_response(&r);
            Ok(())
        }

        Some("listen") => {
            let r = ipc::client_request(serde_json::json!({"op":"listen"}))?;
            print_response(&r);
            Ok(())
        }

        Some(other) => {
            eprintln!("unknown subcommand: {other}\n");
            print_help();
            Ok(())
        }

        None => {
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!(
        r#"wavectl — hand-gesture & voice media controller

USAGE:
  wavectl help [command]              Show general or command-specific help
  wavectl start                       Start the daemon
  wavectl stop                        Stop the daemon
  wavectl status                      Show daemon state
  wavectl reload                      Reload active profile
  wavectl use <name>                  Switch active profile
  wavectl list                        List profiles
  wavectl doctor                      Diagnose stream/credential setup
  wavectl enable                      Resume gesture recognition
  wavectl disable                     Pause gesture recognition
  wavectl say <utterance...>          Route a transcript ("play song ...")
  wavectl listen                      Capture one utterance via the
                                      configured transcriber command

TIPS:
  - Profiles: ~/.config/wavectl/profiles
  - Active profile pointer: ~/.config/wavectl/active
  - Landmark stream: ~/.local/run/wavectl.landmarks (JSON lines)
"#
    );
}

fn print_subcmd_help(cmd: &str) {
    match cmd {
        "start" => println!("usage: wavectl start\nStarts the background daemon."),
        "stop" => println!("usage: wavectl stop\nStops the running daemon."),
        "status" => println!(
            "usage: wavectl status\nShows enabled flag, active profile, socket, stream path."
        ),
        "reload" => println!(
            "usage: wavectl reload\nReloads the current profile; keeps last good on error."
        ),
        "use" => {
            println!("usage: wavectl use <name>\nSwitches active profile to <name> and reloads.")
        }
        "list" => {
            println!("usage: wavectl list\nLists available profiles; marks active with '*'.")
        }
        "doctor" => println!(
            "usage: wavectl doctor\nChecks the landmark stream, credentials and transcriber setup."
        ),
        "enable" | "disable" => println!(
            "usage: wavectl enable|disable\nTurns gesture recognition on or off; the daemon keeps running."
        ),
        "say" => println!(
            "usage: wavectl say <utterance...>\nParses a transcript like 'play song yellow' and dispatches it."
        ),
        "listen" => println!(
            "usage: wavectl listen\nRuns voice.transcriber_cmd once and routes the transcript."
        ),
        _ => {
            eprintln!("unknown command: {cmd}\n");
            print_help();
        }
    }
}

fn print_response(v: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(v).unwrap_or_default());
}
