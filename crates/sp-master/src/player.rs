//! Scheduler thread.
//!
//! One thread owns the [`PlaybackScheduler`] and the device sink. Timer
//! ticks and commands arrive on channels selected in the same loop, so a
//! tick never overlaps a command and commands apply between ticks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::{bounded, never, select, tick, unbounded, Receiver, Sender};
use sp_engine::{ChannelPlayState, DeviceSink, PlaybackScheduler, TickOutcome};
use sp_ir::{Pattern, PatternStreams};

use crate::ControllerError;

const LOG_TARGET: &str = "sp::player";

/// A request marshaled onto the scheduler thread.
#[derive(Debug)]
pub enum Command {
    Load {
        pattern: Pattern,
        streams: PatternStreams,
    },
    Play,
    Stop,
    Rewind,
    /// 0-based channel
    SetChannelState(u8, ChannelPlayState),
    ClearChannelStates,
    SetTempo(u32),
    SetMasterVolume(u16),
    /// 0-based channel
    SetChannelVolume(u8, u16),
    SetVolumeMax(u16),
    /// 0-based output channel
    SetDrumChannel(u8),
    SetLooping(bool),
    SetLoopEnd(Option<u32>),
    /// Reply once every earlier command has been applied.
    Sync(Sender<()>),
    Shutdown,
}

/// State the scheduler thread publishes for readers on other threads.
#[derive(Debug, Default)]
struct Shared {
    position: AtomicU32,
    playing: AtomicBool,
}

/// Handle to the scheduler thread. Dropping it stops playback and joins.
pub struct Player {
    commands: Sender<Command>,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Player {
    /// Start the scheduler thread driving `sink`.
    pub fn spawn(scheduler: PlaybackScheduler, sink: Box<dyn DeviceSink + Send>) -> Self {
        let (commands, rx) = unbounded();
        let shared = Arc::new(Shared::default());
        let published = shared.clone();
        let thread = std::thread::Builder::new()
            .name("sp-player".into())
            .spawn(move || player_thread(scheduler, sink, rx, published));

        let thread = match thread {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!(target: LOG_TARGET, "failed to start player thread: {}", e);
                None
            }
        };
        Self {
            commands,
            shared,
            thread,
        }
    }

    /// Queue a command for the scheduler thread.
    pub fn send(&self, command: Command) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .map_err(|_| ControllerError::PlayerStopped)
    }

    /// Block until every command sent so far has been applied.
    pub fn sync(&self) -> Result<(), ControllerError> {
        let (tx, rx) = bounded(1);
        self.send(Command::Sync(tx))?;
        rx.recv().map_err(|_| ControllerError::PlayerStopped)
    }

    /// Subdivision the scheduler will emit next.
    pub fn position(&self) -> u32 {
        self.shared.position.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

fn player_thread(
    mut scheduler: PlaybackScheduler,
    mut sink: Box<dyn DeviceSink + Send>,
    commands: Receiver<Command>,
    shared: Arc<Shared>,
) {
    let mut ticker: Receiver<Instant> = never();

    loop {
        select! {
            recv(commands) -> msg => {
                // All handles gone
                let Ok(command) = msg else { break };
                if matches!(command, Command::Shutdown) {
                    break;
                }
                apply(&mut scheduler, &mut *sink, &mut ticker, command);
            }
            recv(ticker) -> _ => {
                if scheduler.tick(&mut *sink) == TickOutcome::Finished {
                    ticker = never();
                    log::info!(target: LOG_TARGET, "finished");
                }
            }
        }
        shared.position.store(scheduler.position(), Ordering::Relaxed);
        shared.playing.store(scheduler.is_playing(), Ordering::Relaxed);
    }

    scheduler.stop(&mut *sink);
    shared.playing.store(false, Ordering::Relaxed);
}

fn apply(
    scheduler: &mut PlaybackScheduler,
    sink: &mut dyn DeviceSink,
    ticker: &mut Receiver<Instant>,
    command: Command,
) {
    match command {
        Command::Load { pattern, streams } => {
            if let Some(period) = scheduler.load_pattern(&pattern, streams, sink) {
                *ticker = tick(period);
            }
        }
        Command::Play => {
            let period = scheduler.play(sink);
            *ticker = tick(period);
            log::info!(
                target: LOG_TARGET,
                "play at {} bpm ({} us per subdivision)",
                scheduler.tempo(),
                period.as_micros()
            );
        }
        Command::Stop => {
            // Timer goes first so no tick lands after the silencing
            *ticker = never();
            scheduler.stop(sink);
            log::info!(target: LOG_TARGET, "stop at {}", scheduler.position());
        }
        Command::Rewind => {
            *ticker = never();
            scheduler.rewind(sink);
            log::info!(target: LOG_TARGET, "rewind");
        }
        Command::SetChannelState(channel, state) => {
            scheduler.set_channel_state(channel, state, sink)
        }
        Command::ClearChannelStates => scheduler.clear_channel_states(),
        Command::SetTempo(bpm) => {
            // A running timer is replaced, never retuned
            if let Some(period) = scheduler.set_tempo(bpm) {
                *ticker = tick(period);
            }
            log::debug!(target: LOG_TARGET, "tempo {} bpm", bpm);
        }
        Command::SetMasterVolume(volume) => scheduler.set_master_volume(volume),
        Command::SetChannelVolume(channel, volume) => scheduler.set_channel_volume(channel, volume),
        Command::SetVolumeMax(max) => scheduler.set_volume_max(max),
        Command::SetDrumChannel(channel) => scheduler.set_drum_channel(channel),
        Command::SetLooping(looping) => scheduler.set_looping(looping),
        Command::SetLoopEnd(end) => scheduler.set_loop_end(end),
        Command::Sync(reply) => {
            let _ = reply.send(());
        }
        Command::Shutdown => {}
    }
}
