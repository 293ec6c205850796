//! 对局层：配置、运行上下文、日志、编排与结果。

pub mod config;
pub mod context;
pub mod log;
pub mod orchestrator;
pub mod result;

pub use config::{AutoEffect, CombatantSpec, EncounterConfig, PartySpec, SetupError};
pub use context::{EncounterStats, RunContext};
pub use log::CombatLog;
pub use orchestrator::{run_encounter, run_encounter_json, Orchestrator};
pub use result::{Carryover, EncounterResult, Outcome, RoundSnapshot, WinCondition, Winner};
