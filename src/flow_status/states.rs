//! Status handlers and table builder.
//!
//! ```text
//!            pulses                pulses
//!   OFF ───────────▶ STARTED ───────────▶ ON
//!    ▲                │   ▲                │
//!    │       no pulses│   │pulses          │no pulses
//!    │                ▼   │                │
//!    └─────────────── STOPPED ◀────────────┘
//!        no pulses
//! ```
//!
//! `STARTED → STOPPED` and `STOPPED → STARTED` are single-cycle blips,
//! not faults.

use super::{FlowContext, FlowStatus, StateDescriptor};

pub fn build_state_table() -> [StateDescriptor; FlowStatus::COUNT] {
    [
        StateDescriptor {
            id: FlowStatus::Off,
            name: "OFF",
            on_enter: Some(quiet_enter),
            on_update: off_update,
        },
        StateDescriptor {
            id: FlowStatus::Started,
            name: "STARTED",
            on_enter: Some(flowing_enter),
            on_update: started_update,
        },
        StateDescriptor {
            id: FlowStatus::On,
            name: "ON",
            on_enter: Some(flowing_enter),
            on_update: on_update,
        },
        StateDescriptor {
            id: FlowStatus::Stopped,
            name: "STOPPED",
            on_enter: Some(quiet_enter),
            on_update: stopped_update,
        },
    ]
}

fn flowing_enter(ctx: &mut FlowContext) {
    ctx.indicator_blink = true;
}

fn quiet_enter(ctx: &mut FlowContext) {
    ctx.indicator_blink = false;
}

fn off_update(ctx: &FlowContext) -> Option<FlowStatus> {
    ctx.pulses_observed.then_some(FlowStatus::Started)
}

fn started_update(ctx: &FlowContext) -> Option<FlowStatus> {
    Some(if ctx.pulses_observed {
        FlowStatus::On
    } else {
        FlowStatus::Stopped
    })
}

fn on_update(ctx: &FlowContext) -> Option<FlowStatus> {
    (!ctx.pulses_observed).then_some(FlowStatus::Stopped)
}

fn stopped_update(ctx: &FlowContext) -> Option<FlowStatus> {
    Some(if ctx.pulses_observed {
        FlowStatus::Started
    } else {
        FlowStatus::Off
    })
}
