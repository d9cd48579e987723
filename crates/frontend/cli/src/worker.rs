//! Emulation thread.
//!
//! The session runs on its own thread. The frame sink installed by the
//! caller forwards finished frames over a channel; stop and pause are
//! shared flags checked once per frame, and live button changes arrive as
//! [`Command`]s.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use dotmatrix_core::types::Frame;
use dotmatrix_core::System;
use dotmatrix_gb::{Button, GbSystem};

use crate::input::InputScript;
use crate::pacer::Pacer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Press(Button),
    Release(Button),
}

#[derive(Debug, Clone, Default)]
pub struct Controls {
    stop: Arc<AtomicBool>,
    pause: Arc<AtomicBool>,
}

impl Controls {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn toggle_pause(&self) -> bool {
        !self.pause.fetch_xor(true, Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.pause.load(Ordering::SeqCst)
    }
}

/// Frame sink that forwards every frame over `tx` and stops the session
/// once the receiving side is gone.
pub fn channel_sink(tx: Sender<Frame>, controls: Controls) -> impl FnMut(&Frame) + Send + 'static {
    move |frame| {
        if tx.send(frame.clone()).is_err() && !controls.is_stopped() {
            log::debug!("frame receiver closed, stopping emulation");
            controls.stop();
        }
    }
}

pub struct WorkerConfig {
    pub speed: f64,
    pub script: InputScript,
}

/// Start running `sys`. The thread hands the session back when stopped,
/// after dropping its frame sink so the frame channel closes.
pub fn spawn(
    mut sys: GbSystem,
    controls: Controls,
    config: WorkerConfig,
    commands: Receiver<Command>,
) -> Result<JoinHandle<Result<GbSystem>>> {
    let handle = thread::Builder::new()
        .name("emulation".to_string())
        .spawn(move || {
            let result = run(&mut sys, &controls, &config, &commands);
            sys.clear_frame_sink();
            result.map(|frames| {
                log::debug!("emulation thread ran {frames} frames");
                sys
            })
        })?;
    Ok(handle)
}

fn run(
    sys: &mut GbSystem,
    controls: &Controls,
    config: &WorkerConfig,
    commands: &Receiver<Command>,
) -> Result<u64> {
    let mut pacer = Pacer::new(config.speed);
    let mut frame: u64 = 0;

    while !controls.is_stopped() {
        while let Ok(cmd) = commands.try_recv() {
            match cmd {
                Command::Press(b) => sys.press(b),
                Command::Release(b) => sys.release(b),
            }
        }

        if controls.is_paused() {
            thread::sleep(Duration::from_millis(10));
            pacer.reset();
            continue;
        }

        for (button, pressed) in config.script.events_at(frame) {
            log::debug!("frame {frame}: {button:?} {}", if pressed { "down" } else { "up" });
            if pressed {
                sys.press(button);
            } else {
                sys.release(button);
            }
        }

        sys.step_frame()?;
        frame += 1;
        pacer.wait();
    }
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn spin_system() -> GbSystem {
        let mut rom = vec![0; 0x8000];
        rom[0x0100..0x0102].copy_from_slice(&[0x18, 0xFE]);
        let mut sys = GbSystem::new();
        sys.mount("Cartridge", &rom).unwrap();
        sys
    }

    #[test]
    fn test_frames_flow_until_stopped() {
        let mut sys = spin_system();
        let controls = Controls::default();
        let (tx, rx) = mpsc::channel();
        sys.set_frame_sink(channel_sink(tx, controls.clone()));
        let (_cmd_tx, cmd_rx) = mpsc::channel();
        let config = WorkerConfig {
            speed: 0.0,
            script: InputScript::default(),
        };
        let handle = spawn(sys, controls.clone(), config, cmd_rx).unwrap();

        for _ in 0..3 {
            let frame = rx.recv().unwrap();
            assert_eq!((frame.width, frame.height), (160, 144));
        }
        controls.stop();

        // The channel closes once the worker lets go of the sink.
        while rx.recv().is_ok() {}
        let sys = handle.join().unwrap().unwrap();
        assert!(sys.is_mounted("Cartridge"));
    }

    #[test]
    fn test_commands_reach_the_joypad() {
        let sys = spin_system();
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let controls = Controls::default();
        controls.toggle_pause();
        cmd_tx.send(Command::Press(Button::Start)).unwrap();

        let config = WorkerConfig {
            speed: 0.0,
            script: InputScript::default(),
        };
        let handle = spawn(sys, controls.clone(), config, cmd_rx).unwrap();
        thread::sleep(Duration::from_millis(50));
        controls.stop();
        let sys = handle.join().unwrap().unwrap();
        assert!(sys.bus().joypad.is_pressed(Button::Start));
    }

    #[test]
    fn test_sink_stops_session_when_receiver_drops() {
        let controls = Controls::default();
        let (tx, rx) = mpsc::channel();
        let mut sink = channel_sink(tx, controls.clone());
        let frame = Frame::new(160, 144);

        sink(&frame);
        assert_eq!(rx.recv().unwrap(), frame);
        assert!(!controls.is_stopped());

        drop(rx);
        sink(&frame);
        assert!(controls.is_stopped());
    }

    #[test]
    fn test_unattended_worker_stops_without_receiver() {
        let mut sys = spin_system();
        let controls = Controls::default();
        let (tx, rx) = mpsc::channel();
        sys.set_frame_sink(channel_sink(tx, controls.clone()));
        drop(rx);

        let (_cmd_tx, cmd_rx) = mpsc::channel();
        let config = WorkerConfig {
            speed: 0.0,
            script: InputScript::default(),
        };
        let handle = spawn(sys, controls, config, cmd_rx).unwrap();
        assert!(handle.join().unwrap().is_ok());
    }

    #[test]
    fn test_toggle_pause() {
        let controls = Controls::default();
        assert!(controls.toggle_pause());
        assert!(controls.is_paused());
        assert!(!controls.toggle_pause());
        assert!(!controls.is_paused());
    }
}
