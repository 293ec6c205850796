pub mod ai;
pub mod encounter;
pub mod game;

use gloo_timers::future::TimeoutFuture;
use serde::{Deserialize, Serialize};
use serde_json;
use serde_wasm_bindgen::{from_value, to_value};
use std::collections::BTreeMap;
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiConfig, AiStrategy, CardPicker, HeuristicPicker, ScriptedPicker, TurnContext};
pub use encounter::{
    run_encounter, run_encounter_json, Carryover, CombatantSpec, EncounterConfig, EncounterResult,
    Orchestrator, Outcome, SetupError, WinCondition, Winner,
};
pub use game::{
    Arena, Card, CardCategory, CardId, CardKind, CardType, CombatantState, Decision,
    DecisionAction, Keyword, PerSide, RandomSource, Resource, ScriptedDice, SeededDice, Side,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: SetupError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

/// 批量运行汇总。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchSummary {
    pub runs: u32,
    pub wins: BTreeMap<String, u32>,
    pub conditions: BTreeMap<String, u32>,
    pub average_rounds: f64,
}

impl BatchSummary {
    pub fn record(&mut self, result: &EncounterResult) {
        let total_rounds = self.average_rounds * f64::from(self.runs) + f64::from(result.rounds);
        self.runs += 1;
        self.average_rounds = total_rounds / f64::from(self.runs);
        let winner = serde_json::to_value(result.outcome.winner)
            .ok()
            .and_then(|value| value.as_str().map(str::to_string))
            .unwrap_or_else(|| format!("{:?}", result.outcome.winner));
        *self.wins.entry(winner).or_insert(0) += 1;
        *self
            .conditions
            .entry(result.outcome.condition.to_string())
            .or_insert(0) += 1;
    }
}

pub fn run_batch(config: &EncounterConfig, count: u32) -> Result<BatchSummary, SetupError> {
    let mut summary = BatchSummary::default();
    for index in 0..count {
        let result = run_encounter(batch_config(config, index))?;
        summary.record(&result);
    }
    Ok(summary)
}

fn batch_config(config: &EncounterConfig, index: u32) -> EncounterConfig {
    let mut config = config.clone();
    config.log_to_console = false;
    config.seed = config
        .seed
        .map(|seed| seed.wrapping_add(u64::from(index).wrapping_mul(0x9E37_79B9)));
    config
}

/// 运行一场遭遇战，输入输出均为 JSON。
#[wasm_bindgen(js_name = "runEncounter")]
pub fn run_encounter_wasm(config_json: &str) -> Result<String, JsValue> {
    let result = run_encounter_json(config_json).map_err(to_js_error)?;
    serde_json::to_string(&result).map_err(serde_to_js_error)
}

/// 以 JS 对象形式运行遭遇战。
#[wasm_bindgen(js_name = "runEncounterValue")]
pub fn run_encounter_value(config: JsValue) -> Result<JsValue, JsValue> {
    let config: EncounterConfig = from_value(config).map_err(JsValue::from)?;
    let result = run_encounter(config).map_err(to_js_error)?;
    to_value(&result).map_err(JsValue::from)
}

/// 返回内置模板名称。
#[wasm_bindgen(js_name = "templateNames")]
pub fn template_names() -> Result<JsValue, JsValue> {
    to_value(&encounter::config::template_names()).map_err(JsValue::from)
}

#[wasm_bindgen]
pub struct Simulator {
    config: EncounterConfig,
}

#[wasm_bindgen]
impl Simulator {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Simulator, JsValue> {
        let config = EncounterConfig::from_json(config_json).map_err(to_js_error)?;
        Ok(Simulator { config })
    }

    pub fn config_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.config).map_err(serde_to_js_error)
    }

    pub fn set_strategy(&mut self, side: &str, strategy: &str) -> Result<(), JsValue> {
        let side = match side {
            "dungeon" => Side::Dungeon,
            "visitor" => Side::Visitor,
            other => return Err(JsValue::from_str(&format!("unknown side '{other}'"))),
        };
        let strategy = AiStrategy::from_str(strategy)
            .map_err(|_| JsValue::from_str(&format!("unknown strategy '{strategy}'")))?;
        let ai = self.config.ai.get_mut(side);
        *ai = ai.clone().with_strategy(strategy);
        Ok(())
    }

    pub fn run_once(&self) -> Result<String, JsValue> {
        let result = run_encounter(self.config.clone()).map_err(to_js_error)?;
        serde_json::to_string(&result).map_err(serde_to_js_error)
    }

    pub fn run_batch(&self, count: u32, yield_every: Option<u32>) -> Promise {
        let config = self.config.clone();
        let yield_every = yield_every.unwrap_or(25).max(1);

        future_to_promise(async move {
            let mut summary = BatchSummary::default();
            for index in 0..count {
                let result = run_encounter(batch_config(&config, index)).map_err(to_js_error)?;
                summary.record(&result);
                if (index + 1) % yield_every == 0 {
                    TimeoutFuture::new(0).await;
                }
            }
            let json = serde_json::to_string(&summary).map_err(serde_to_js_error)?;
            Ok(JsValue::from_str(&json))
        })
    }
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}
