// ==========================================
// 药品仓储机械臂 - 实时通道契约
// ==========================================
// 职责: 定义与机器人控制端之间的指令/事件载荷，以及指令发送 trait
// 说明: 传输实现（socket 等）不在本 crate 范围内；
//       仿真驱动只依赖 CommandSink 与 RealtimeEvent
// ==========================================

pub mod loopback;

use crate::domain::types::{Phase, Vec3};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use loopback::{LoopbackHandle, LoopbackRobot};

// ==========================================
// 载荷类型
// ==========================================

/// 指令关联的药品
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicineRef {
    pub medicine_id: String,
    pub name: String,
    pub brand: String,
}

/// 指令关联的订单行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineRef {
    pub order_id: String,
    pub order_item_id: String,
    pub scan_code: String,
}

/// 运动指令：本地阶段完成后发给机器人控制端
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementCommand {
    pub command_id: String,
    pub phase: Phase,
    pub target: Vec3,
    pub claw: f64,
    pub medicine: Option<MedicineRef>,
    pub order_line: Option<OrderLineRef>,
    pub timestamp: DateTime<Utc>,
}

impl MovementCommand {
    pub fn new(phase: Phase, target: Vec3, claw: f64) -> Self {
        Self {
            command_id: Uuid::new_v4().to_string(),
            phase,
            target,
            claw,
            medicine: None,
            order_line: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_medicine(mut self, medicine: Option<MedicineRef>) -> Self {
        self.medicine = medicine;
        self
    }

    pub fn with_order_line(mut self, line: Option<OrderLineRef>) -> Self {
        self.order_line = line;
        self
    }
}

/// 控制端推送的事件
///
/// 线上格式: `{"event": "movement_complete", "data": {"phase": "lift"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RealtimeEvent {
    /// 机器人执行完成（回显其执行的阶段）
    MovementComplete { phase: Phase },
    /// 周期性状态（自由格式）
    Status(Value),
    Connected,
    Disconnected,
}

// ==========================================
// 错误类型
// ==========================================
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("实时通道未连接")]
    Disconnected,

    #[error("实时通道发送失败: {0}")]
    SendFailed(String),
}

// ==========================================
// 指令发送 Trait
// ==========================================

/// 运动指令发送者
///
/// # 实现说明
/// - `ChannelCommandSink`: 经 tokio 通道转发（回环机器人 / 外部桥接）
/// - `NoOpCommandSink`: 纯本地仿真
pub trait CommandSink: Send + Sync {
    fn emit(&self, command: &MovementCommand) -> Result<(), ChannelError>;

    /// 当前是否连接
    fn is_connected(&self) -> bool;
}

/// 空操作发送者：始终未连接，仅记录日志
#[derive(Debug, Clone, Default)]
pub struct NoOpCommandSink;

impl CommandSink for NoOpCommandSink {
    fn emit(&self, command: &MovementCommand) -> Result<(), ChannelError> {
        tracing::debug!(
            phase = %command.phase,
            command_id = %command.command_id,
            "NoOpCommandSink: 跳过指令发送"
        );
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// 基于 tokio 无界通道的发送者
#[derive(Debug, Clone)]
pub struct ChannelCommandSink {
    tx: mpsc::UnboundedSender<MovementCommand>,
    connected: Arc<AtomicBool>,
}

impl ChannelCommandSink {
    pub fn new(tx: mpsc::UnboundedSender<MovementCommand>, connected: Arc<AtomicBool>) -> Self {
        Self { tx, connected }
    }
}

impl CommandSink for ChannelCommandSink {
    fn emit(&self, command: &MovementCommand) -> Result<(), ChannelError> {
        if !self.is_connected() {
            return Err(ChannelError::Disconnected);
        }

        self.tx.send(command.clone()).map_err(|e| {
            self.connected.store(false, Ordering::SeqCst);
            ChannelError::SendFailed(e.to_string())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_realtime_event_wire_format() {
        let event: RealtimeEvent =
            serde_json::from_value(json!({"event": "movement_complete", "data": {"phase": "moveToDrop"}}))
                .unwrap();
        assert_eq!(event, RealtimeEvent::MovementComplete { phase: Phase::MoveToDrop });

        let status: RealtimeEvent =
            serde_json::from_value(json!({"event": "status", "data": {"battery": 80}})).unwrap();
        assert!(matches!(status, RealtimeEvent::Status(_)));

        let disconnected: RealtimeEvent =
            serde_json::from_value(json!({"event": "disconnected"})).unwrap();
        assert_eq!(disconnected, RealtimeEvent::Disconnected);
    }

    #[test]
    fn test_movement_command_serializes_camel_case() {
        let command = MovementCommand::new(Phase::Lift, Vec3::new(1.0, 3.0, 2.0), 0.0)
            .with_order_line(Some(OrderLineRef {
                order_id: "O1".to_string(),
                order_item_id: "I1".to_string(),
                scan_code: "S1".to_string(),
            }));

        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["phase"], "lift");
        assert_eq!(value["orderLine"]["scanCode"], "S1");
        assert!(value["commandId"].is_string());
        assert!(value["medicine"].is_null());
    }

    #[test]
    fn test_channel_sink_reports_disconnect() {
        let (tx, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let sink = ChannelCommandSink::new(tx, connected.clone());
        assert!(sink.is_connected());

        let command = MovementCommand::new(Phase::Drop, Vec3::ZERO, 1.0);
        assert!(sink.emit(&command).is_ok());

        drop(rx);
        assert!(!sink.is_connected());
        assert!(sink.emit(&command).is_err());

        assert!(!NoOpCommandSink.is_connected());
    }
}
