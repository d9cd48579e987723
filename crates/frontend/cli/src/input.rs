//! Scripted button presses: `BUTTON@FRAME[+HOLD]`, e.g. `start@120+10`.

use anyhow::{anyhow, bail, Context, Result};
use dotmatrix_gb::Button;

/// Frames a scripted press is held when no `+HOLD` is given.
const DEFAULT_HOLD: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedPress {
    pub button: Button,
    pub frame: u64,
    pub hold: u64,
}

impl ScriptedPress {
    pub fn parse(spec: &str) -> Result<Self> {
        let (name, timing) = spec
            .split_once('@')
            .ok_or_else(|| anyhow!("expected BUTTON@FRAME, got \"{spec}\""))?;
        let button =
            Button::from_str(name.trim()).ok_or_else(|| anyhow!("unknown button \"{name}\""))?;
        let (frame, hold) = match timing.split_once('+') {
            Some((frame, hold)) => (frame, Some(hold)),
            None => (timing, None),
        };
        let frame = frame
            .trim()
            .parse()
            .with_context(|| format!("bad frame number in \"{spec}\""))?;
        let hold = match hold {
            Some(h) => h
                .trim()
                .parse()
                .with_context(|| format!("bad hold length in \"{spec}\""))?,
            None => DEFAULT_HOLD,
        };
        if hold == 0 {
            bail!("hold length must be at least one frame in \"{spec}\"");
        }
        Ok(Self {
            button,
            frame,
            hold,
        })
    }
}

#[derive(Debug, Default, Clone)]
pub struct InputScript {
    presses: Vec<ScriptedPress>,
}

impl InputScript {
    pub fn parse(specs: &[String]) -> Result<Self> {
        let presses = specs
            .iter()
            .map(|s| ScriptedPress::parse(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { presses })
    }

    pub fn is_empty(&self) -> bool {
        self.presses.is_empty()
    }

    /// Button transitions to apply before running frame `frame`:
    /// `(button, true)` to press, `(button, false)` to release.
    pub fn events_at(&self, frame: u64) -> Vec<(Button, bool)> {
        let mut events = Vec::new();
        for p in &self.presses {
            if p.frame + p.hold == frame {
                events.push((p.button, false));
            }
        }
        for p in &self.presses {
            if p.frame == frame {
                events.push((p.button, true));
            }
        }
        events
    }
}
