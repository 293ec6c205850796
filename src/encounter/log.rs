//! 战斗日志：逐行记录，wasm 下可同步输出到浏览器控制台。

use serde::{Deserialize, Serialize};

#[cfg(target_arch = "wasm32")]
fn mirror_line(line: &str) {
    web_sys::console::log_1(&line.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn mirror_line(_line: &str) {}

/// 战斗日志。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombatLog {
    lines: Vec<String>,
    #[serde(skip)]
    mirror: bool,
}

impl CombatLog {
    pub fn new(mirror: bool) -> Self {
        Self {
            lines: Vec::new(),
            mirror,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if self.mirror {
            mirror_line(&line);
        }
        self.lines.push(line);
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|line| line.contains(needle))
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
