//! 尾沿节流门.
//!
//! 快速拖拽会以远高于渲染预算的频率置位 `invalidated`;
//! 节流门把一个窗口内的突发合并为一次最终重算.
//! 时间以参数注入 (而不是内部取 `Instant::now`), 便于测试.

use std::time::{Duration, Instant};

use crate::consts::THROTTLE_WINDOW_MS;

/// 尾沿节流门.
///
/// `notify` 在窗口空闲时武装一个截止时刻; 窗口内的后续通知被合并.
/// `poll` 在到达截止时刻后恰好放行一次.
#[derive(Clone, Debug)]
pub struct ThrottleGate {
    window: Duration,
    deadline: Option<Instant>,
}

impl Default for ThrottleGate {
    fn default() -> Self {
        Self::new(Duration::from_millis(THROTTLE_WINDOW_MS))
    }
}

impl ThrottleGate {
    /// 以给定窗口创建节流门.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// 报告一次失效. 已武装时合并, 不推迟截止时刻.
    pub fn notify(&mut self, now: Instant) {
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// 是否有待放行的重算.
    #[inline]
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// 到达截止时刻则放行 (并解除武装).
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// 解除武装 (同步重算路径已经覆盖了待办工作时调用).
    #[inline]
    pub fn disarm(&mut self) {
        self.deadline = None;
    }
}
