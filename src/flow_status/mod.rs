//! Flow-status state machine.
//!
//! Function-pointer table FSM, one row per status:
//!
//! ```text
//! ┌──────────────────────────────────────────────────┐
//! │  StateTable                                      │
//! │  ┌─────────┬──────────┬───────────────────────┐  │
//! │  │ Status  │ on_enter │ on_update             │  │
//! │  ├─────────┼──────────┼───────────────────────┤  │
//! │  │ Off     │ fn(ctx)  │ fn(ctx)->Option<>     │  │
//! │  │ Started │ fn(ctx)  │ fn(ctx)->Option<>     │  │
//! │  │ On      │ fn(ctx)  │ fn(ctx)->Option<>     │  │
//! │  │ Stopped │ fn(ctx)  │ fn(ctx)->Option<>     │  │
//! │  └─────────┴──────────┴───────────────────────┘  │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! Exactly one [`FlowStatusMachine::update`] per sampling cycle.  The only
//! input is whether the cycle's pulse delta was non-zero.

pub mod states;

use log::info;

/// Externally visible flow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FlowStatus {
    Off = 0,
    Started = 1,
    On = 2,
    Stopped = 3,
}

impl FlowStatus {
    pub const COUNT: usize = 4;

    /// Convert a raw index back to a status.  Anything unrecognised is
    /// `Off`.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            1 => Self::Started,
            2 => Self::On,
            3 => Self::Stopped,
            _ => Self::Off,
        }
    }

    /// Edge statuses are the ones the journal records.
    pub fn is_edge(self) -> bool {
        matches!(self, Self::Started | Self::Stopped)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::Started => "STARTED",
            Self::On => "ON",
            Self::Stopped => "STOPPED",
        }
    }
}

/// Per-cycle input and display output threaded through the handlers.
#[derive(Debug, Clone, Default)]
pub struct FlowContext {
    /// Input: the latest pulse delta was non-zero.
    pub pulses_observed: bool,
    /// Output: the display's flow "point" indicator should blink.
    pub indicator_blink: bool,
    /// Cycles since the current status was entered.
    pub cycles_in_state: u64,
    pub total_cycles: u64,
}

pub type StateActionFn = fn(&mut FlowContext);
pub type StateUpdateFn = fn(&FlowContext) -> Option<FlowStatus>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: FlowStatus,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

pub struct FlowStatusMachine {
    table: [StateDescriptor; FlowStatus::COUNT],
    current: usize,
    ctx: FlowContext,
    entry_cycle: u64,
}

impl Default for FlowStatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowStatusMachine {
    /// Machine in `Off`, entry action already applied.
    pub fn new() -> Self {
        let mut m = Self {
            table: states::build_state_table(),
            current: FlowStatus::Off as usize,
            ctx: FlowContext::default(),
            entry_cycle: 0,
        };
        if let Some(enter) = m.table[m.current].on_enter {
            enter(&mut m.ctx);
        }
        m
    }

    /// Advance one cycle and return the new status.
    pub fn update(&mut self, pulses_observed: bool) -> FlowStatus {
        self.ctx.total_cycles += 1;
        self.ctx.cycles_in_state = self.ctx.total_cycles - self.entry_cycle;
        self.ctx.pulses_observed = pulses_observed;

        if let Some(next) = (self.table[self.current].on_update)(&self.ctx) {
            self.transition(next);
        }
        self.status()
    }

    pub fn status(&self) -> FlowStatus {
        FlowStatus::from_index(self.current)
    }

    pub fn context(&self) -> &FlowContext {
        &self.ctx
    }

    pub fn indicator_blink(&self) -> bool {
        self.ctx.indicator_blink
    }

    fn transition(&mut self, next: FlowStatus) {
        let next_idx = next as usize;
        info!(
            "Flow: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );
        self.current = next_idx;
        self.entry_cycle = self.ctx.total_cycles;
        self.ctx.cycles_in_state = 0;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(&mut self.ctx);
        }
    }
}
