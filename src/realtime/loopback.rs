// ==========================================
// 药品仓储机械臂 - 回环机器人控制端
// ==========================================
// 用途: 在没有真实机器人时模拟控制端
// 行为: 收到运动指令 → 等待 latency → 推送 status 与 movement_complete（回显阶段）
// ==========================================

use super::{ChannelCommandSink, MovementCommand, RealtimeEvent};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct LoopbackRobot;

impl LoopbackRobot {
    /// 启动回环控制端任务（需在 tokio 运行时内调用）
    ///
    /// # 返回
    /// - 指令发送者（交给仿真驱动）
    /// - 事件接收端（交给运行循环）
    /// - 控制句柄（断开/重连/关闭）
    pub fn spawn(
        latency: Duration,
    ) -> (
        ChannelCommandSink,
        mpsc::UnboundedReceiver<RealtimeEvent>,
        LoopbackHandle,
    ) {
        let (command_tx, mut command_rx) = mpsc::unbounded_channel::<MovementCommand>();
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RealtimeEvent>();
        let connected = Arc::new(AtomicBool::new(true));

        let task_connected = connected.clone();
        let task_events = event_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                if !task_connected.load(Ordering::SeqCst) {
                    tracing::debug!(phase = %command.phase, "回环控制端已断开，丢弃指令");
                    continue;
                }

                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }

                let status = json!({
                    "state": "executed",
                    "phase": command.phase,
                    "commandId": command.command_id,
                    "target": command.target,
                });
                if task_events.send(RealtimeEvent::Status(status)).is_err() {
                    break;
                }
                if task_events
                    .send(RealtimeEvent::MovementComplete {
                        phase: command.phase,
                    })
                    .is_err()
                {
                    break;
                }
            }
            tracing::debug!("回环控制端任务退出");
        });

        let sink = ChannelCommandSink::new(command_tx, connected.clone());
        let handle = LoopbackHandle {
            connected,
            events: event_tx,
            task,
        };

        (sink, event_rx, handle)
    }
}

/// 回环控制端句柄
pub struct LoopbackHandle {
    connected: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<RealtimeEvent>,
    task: JoinHandle<()>,
}

impl LoopbackHandle {
    /// 模拟断线
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.events.send(RealtimeEvent::Disconnected);
    }

    /// 模拟重连
    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.events.send(RealtimeEvent::Connected);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// 终止任务
    pub fn shutdown(self) {
        self.connected.store(false, Ordering::SeqCst);
        self.task.abort();
    }
}
