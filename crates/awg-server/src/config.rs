use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

const DEFAULT_QUEUED_PORT: u16 = 9100;
const DEFAULT_DIRECT_PORT: u16 = 9000;
const DEFAULT_NOTIFIER_PORT: u16 = 9101;
const DEFAULT_PERIOD_US: u64 = awg_core::DEFAULT_PERIOD_US;
const DEFAULT_FLUSH_FRAMES: u32 = 100;
const DEFAULT_MEM_DEVICE: &str = "/dev/mem";
const DEFAULT_QUEUED_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_DIRECT_TIMEOUT_MS: u64 = 100;

/// Real-time control server for the AWG peripheral. Every flag has a
/// default matching the hard-coded values of a bare-hardware deployment, so
/// the binary runs correctly with no arguments at all.
#[derive(Parser, Debug)]
#[command(name = "awg-server", version, about)]
pub struct Args {
    #[arg(long)]
    queued_port: Option<u16>,
    #[arg(long)]
    direct_port: Option<u16>,
    #[arg(long)]
    notifier_port: Option<u16>,
    #[arg(long)]
    period_us: Option<u64>,
    #[arg(long)]
    flush_frames: Option<u32>,
    #[arg(long)]
    mem_device: Option<PathBuf>,
    #[arg(long)]
    queued_timeout_ms: Option<u64>,
    #[arg(long)]
    direct_timeout_ms: Option<u64>,

    /// CPU core to pin the player thread to. Unset: no affinity is set.
    #[arg(long)]
    core_player: Option<usize>,
    #[arg(long)]
    core_queued: Option<usize>,
    #[arg(long)]
    core_direct: Option<usize>,
    #[arg(long)]
    core_notifier: Option<usize>,
}

/// Fully resolved configuration: CLI flag, then environment variable, then
/// the hard default, in that order of precedence.
#[derive(Debug, Clone)]
pub struct Config {
    pub queued_port: u16,
    pub direct_port: u16,
    pub notifier_port: u16,
    pub period: Duration,
    pub flush_frames: u32,
    pub mem_device: PathBuf,
    pub queued_timeout: Duration,
    pub direct_timeout: Duration,
    pub core_player: Option<usize>,
    pub core_queued: Option<usize>,
    pub core_direct: Option<usize>,
    pub core_notifier: Option<usize>,
}

impl Config {
    pub fn resolve(args: Args) -> Self {
        Self {
            queued_port: args.queued_port.or_else(|| env_u16("AWG_QUEUED_PORT")).unwrap_or(DEFAULT_QUEUED_PORT),
            direct_port: args.direct_port.or_else(|| env_u16("AWG_DIRECT_PORT")).unwrap_or(DEFAULT_DIRECT_PORT),
            notifier_port: args
                .notifier_port
                .or_else(|| env_u16("AWG_NOTIFIER_PORT"))
                .unwrap_or(DEFAULT_NOTIFIER_PORT),
            period: Duration::from_micros(
                args.period_us.or_else(|| env_u64("AWG_PERIOD_US")).unwrap_or(DEFAULT_PERIOD_US).max(1),
            ),
            flush_frames: args
                .flush_frames
                .or_else(|| env_u32("AWG_FLUSH_FRAMES"))
                .unwrap_or(DEFAULT_FLUSH_FRAMES),
            mem_device: args
                .mem_device
                .or_else(|| std::env::var_os("AWG_MEM_DEVICE").map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MEM_DEVICE)),
            queued_timeout: Duration::from_millis(
                args.queued_timeout_ms.unwrap_or(DEFAULT_QUEUED_TIMEOUT_MS),
            ),
            direct_timeout: Duration::from_millis(
                args.direct_timeout_ms.unwrap_or(DEFAULT_DIRECT_TIMEOUT_MS),
            ),
            core_player: args.core_player,
            core_queued: args.core_queued,
            core_direct: args.core_direct,
            core_notifier: args.core_notifier,
        }
    }
}

fn env_u16(key: &str) -> Option<u16> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
