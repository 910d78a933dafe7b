//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements      | Connects to                     |
//! |------------|-----------------|---------------------------------|
//! | `backup`   | BackupPort      | RTC slow memory, battery sense  |
//! | `hardware` | CapturePort     | PCNT, esp_timer, GPIO IRQ       |
//! | `journal`  | FlowJournalPort | In-memory start/stop ring       |
//! | `log_sink` | EventSink       | Serial log output               |
//! | `time`     | RtcPort         | System wall clock               |

pub mod backup;
pub mod hardware;
pub mod journal;
pub mod log_sink;
pub mod time;
