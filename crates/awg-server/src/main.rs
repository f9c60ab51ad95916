use std::sync::Arc;

use awg_core::Engine;
use awg_hw::{DATA_BASE, WEN_BASE, WINDOW_LEN, Hw};
use awg_server::config::{Args, Config};
use awg_server::lifecycle;
use clap::Parser;
use tracing::error;

fn main() {
    tracing_subscriber::fmt::init();

    let config = Config::resolve(Args::parse());
    let exit_code = run(config);
    std::process::exit(exit_code);
}

fn run(config: Config) -> i32 {
    let hw = match Hw::open(&config.mem_device, DATA_BASE, WEN_BASE, WINDOW_LEN, true) {
        Ok(hw) => hw,
        Err(err) => {
            error!(?err, mem_device = %config.mem_device.display(), "startup: failed to map AWG registers");
            return lifecycle::EXIT_HW_INIT_FAILED;
        }
    };

    let engine = Arc::new(Engine::new(hw, config.period));
    lifecycle::run(engine, &config)
}
