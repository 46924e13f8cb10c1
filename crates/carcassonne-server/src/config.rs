//! Server configuration read from the environment.

use anyhow::{bail, Context};
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_BOT_TICK_MS: u64 = 2000;
const DEFAULT_OUTBOUND_BUFFER: usize = 256;
const DEFAULT_IDLE_ROOM_SECS: u64 = 600;

/// Runtime settings for the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to (`SERVER_ADDR`)
    pub addr: SocketAddr,
    /// Period between bot turns (`BOT_TICK_MS`)
    pub bot_tick: Duration,
    /// Outbound messages buffered per connection before it is dropped
    /// (`OUTBOUND_BUFFER`)
    pub outbound_buffer: usize,
    /// How long a started room with nobody attached may sit without activity
    /// before it is reclaimed (`IDLE_ROOM_SECS`)
    pub idle_room_timeout: Duration,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let addr = lookup("SERVER_ADDR").unwrap_or_else(|| DEFAULT_ADDR.into());
        let addr: SocketAddr = addr
            .parse()
            .with_context(|| format!("invalid SERVER_ADDR '{addr}'"))?;

        let bot_tick_ms = match lookup("BOT_TICK_MS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid BOT_TICK_MS '{raw}'"))?,
            None => DEFAULT_BOT_TICK_MS,
        };
        if bot_tick_ms == 0 {
            bail!("BOT_TICK_MS must be positive");
        }

        let outbound_buffer = match lookup("OUTBOUND_BUFFER") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("invalid OUTBOUND_BUFFER '{raw}'"))?,
            None => DEFAULT_OUTBOUND_BUFFER,
        };
        if outbound_buffer == 0 {
            bail!("OUTBOUND_BUFFER must be positive");
        }

        let idle_room_secs = match lookup("IDLE_ROOM_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("invalid IDLE_ROOM_SECS '{raw}'"))?,
            None => DEFAULT_IDLE_ROOM_SECS,
        };
        if idle_room_secs == 0 {
            bail!("IDLE_ROOM_SECS must be positive");
        }

        Ok(Self {
            addr,
            bot_tick: Duration::from_millis(bot_tick_ms),
            outbound_buffer,
            idle_room_timeout: Duration::from_secs(idle_room_secs),
        })
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            bot_tick: Duration::from_millis(DEFAULT_BOT_TICK_MS),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            idle_room_timeout: Duration::from_secs(DEFAULT_IDLE_ROOM_SECS),
        }
    }
}
