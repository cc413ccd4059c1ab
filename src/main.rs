mod classifier;
mod cli;
mod config;
mod gestures;
mod input;
mod ipc;
mod landmarks;
mod logging;
mod remote;
mod voice;

fn main() -> anyhow::Result<()> {
    logging::init();
    cli::run()
}
