// ==========================================
// 药品仓储机械臂 - 仿真驱动
// ==========================================
// 职责: 连接外部协作方（仓储 API / 实时通道）、运动插值器与履约状态机
// 说明: 全部入口为 &mut self 串行调用；状态机产生的副作用在此执行
// 红线: 协作方失败只转为状态文本，不破坏队列与库存
// ==========================================

use crate::api::{ApiError, WarehouseApi};
use crate::config::SimulationConfig;
use crate::domain::ledger::Ledgers;
use crate::domain::medicine::Container;
use crate::domain::order::OrderRecord;
use crate::domain::types::{Phase, Vec3};
use crate::engine::error::{SimulationError, SimulationResult};
use crate::engine::fulfillment::{
    Effect, FulfillmentMachine, MachineEvent, MachineSnapshot, SyncSettings,
};
use crate::engine::inventory::ContainerMap;
use crate::engine::motion::{ArmMotionInterpolator, MotionEvent};
use crate::realtime::{CommandSink, RealtimeEvent};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// 仿真快照（界面 / CLI 输出）
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    #[serde(flatten)]
    pub machine: MachineSnapshot,
    pub arm_position: Vec3,
    pub claw: f64,
    pub moving: bool,
    pub robot_status: Option<Value>,
    pub ledgers: Ledgers,
    pub containers: Vec<Container>,
}

// ==========================================
// ArmSimulation - 仿真驱动
// ==========================================
pub struct ArmSimulation {
    api: Arc<dyn WarehouseApi>,
    sink: Arc<dyn CommandSink>,
    machine: FulfillmentMachine,
    arm: ArmMotionInterpolator,
    config: SimulationConfig,
    settle_deadline: Option<Instant>,
    robot_status: Option<Value>,
}

impl ArmSimulation {
    pub fn new(
        config: SimulationConfig,
        api: Arc<dyn WarehouseApi>,
        sink: Arc<dyn CommandSink>,
    ) -> Self {
        let sync = SyncSettings {
            enabled: config.sync_enabled,
            ack_policy: config.ack_policy,
            settle_delay: config.settle_delay,
        };
        let machine = FulfillmentMachine::new(config.layout.clone(), sync, sink.is_connected());
        let arm = ArmMotionInterpolator::new(config.layout.home, config.tuning);

        Self {
            api,
            sink,
            machine,
            arm,
            config,
            settle_deadline: None,
            robot_status: None,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn machine(&self) -> &FulfillmentMachine {
        &self.machine
    }

    pub fn arm(&self) -> &ArmMotionInterpolator {
        &self.arm
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.machine.phase()
    }

    pub fn is_idle(&self) -> bool {
        self.machine.is_idle()
    }

    pub fn status(&self) -> &str {
        self.machine.status()
    }

    pub fn robot_status(&self) -> Option<&Value> {
        self.robot_status.as_ref()
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            machine: self.machine.snapshot(),
            arm_position: self.arm.position(),
            claw: self.arm.claw(),
            moving: self.arm.is_moving(),
            robot_status: self.robot_status.clone(),
            ledgers: self.machine.ledgers().clone(),
            containers: self.machine.inventory().containers().cloned().collect(),
        }
    }

    // ==========================================
    // 外部协作方调用
    // ==========================================

    /// 拉取库存快照并按货箱分组
    ///
    /// # 返回
    /// - Ok(units): 可用单位总数
    /// - Err: 获取失败，库存保持上一次成功的快照
    pub async fn load_inventory(&mut self) -> SimulationResult<u32> {
        if !self.machine.is_idle() {
            return Err(self.busy());
        }

        let medicines = match self.api.fetch_medicines().await {
            Ok(medicines) => medicines,
            Err(e) => return Err(self.collaborator_failed("库存获取失败", e)),
        };

        let inventory = ContainerMap::from_snapshot(&medicines);
        let units = inventory.total_units();
        info!(
            records = medicines.len(),
            containers = inventory.len(),
            units,
            "库存快照已加载"
        );
        self.machine.set_status(format!(
            "库存已加载: {} 个货箱，{} 个单位",
            inventory.len(),
            units
        ));
        self.machine.replace_inventory(inventory);
        Ok(units)
    }

    /// 提交订单：标记已处理、展开为单位订单行并开始拣选
    ///
    /// # 返回
    /// - Ok(lines): 入队的订单行数
    /// - Err: 订单号无效 / 机械臂忙碌 / 外部调用失败（队列不变）
    pub async fn submit_order(&mut self, order_id: &str, now: Instant) -> SimulationResult<usize> {
        let order_id = order_id.trim();
        if order_id.is_empty() {
            self.machine.set_status("请输入订单号");
            return Err(SimulationError::InvalidOrderId(order_id.to_string()));
        }
        if !self.machine.is_idle() {
            return Err(self.busy());
        }

        let order = match self.api.process_order(order_id).await {
            Ok(order) => order,
            Err(e) => {
                let context = format!("订单 {} 处理失败", order_id);
                return Err(self.collaborator_failed(&context, e));
            }
        };

        let lines = order.fan_out();
        let count = lines.len();
        info!(
            order_id = %order.order_id,
            items = order.items.len(),
            units = count,
            "订单已获取"
        );

        self.dispatch(
            MachineEvent::OrderLoaded {
                order_id: order.order_id,
                lines,
            },
            now,
        );
        Ok(count)
    }

    /// 历史订单列表（仅展示）
    pub async fn list_orders(&mut self) -> SimulationResult<Vec<OrderRecord>> {
        match self.api.list_orders().await {
            Ok(orders) => Ok(orders),
            Err(e) => Err(self.collaborator_failed("订单列表获取失败", e)),
        }
    }

    // ==========================================
    // 帧驱动与事件
    // ==========================================

    /// 推进一帧：通道状态轮询 → 等待计时 → 运动插值
    pub fn tick(&mut self, now: Instant) {
        let connected = self.sink.is_connected();
        if connected != self.machine.channel_connected() {
            self.dispatch(MachineEvent::ChannelStatus { connected }, now);
        }

        if let Some(deadline) = self.settle_deadline {
            if now >= deadline {
                self.settle_deadline = None;
                self.dispatch(MachineEvent::SettleElapsed, now);
            }
        }

        if let Some(MotionEvent::PhaseComplete { phase }) = self.arm.tick() {
            self.dispatch(MachineEvent::MotionComplete { phase }, now);
        }
    }

    /// 处理实时通道推送的事件
    pub fn on_realtime_event(&mut self, event: RealtimeEvent, now: Instant) {
        match event {
            RealtimeEvent::MovementComplete { phase } => {
                self.dispatch(MachineEvent::RemoteComplete { phase }, now)
            }
            RealtimeEvent::Status(status) => {
                debug!(status = %status, "机器人状态更新");
                self.robot_status = Some(status);
            }
            RealtimeEvent::Connected => {
                let connected = self.sink.is_connected();
                self.dispatch(MachineEvent::ChannelStatus { connected }, now);
            }
            RealtimeEvent::Disconnected => {
                self.dispatch(MachineEvent::ChannelStatus { connected: false }, now)
            }
        }
    }

    /// 切换同步模式
    pub fn set_sync_mode(&mut self, enabled: bool, now: Instant) {
        self.dispatch(MachineEvent::SyncModeChanged { enabled }, now);
    }

    /// 人工强制完成当前阶段 / 等待
    pub fn force_complete(&mut self, now: Instant) {
        self.dispatch(MachineEvent::ManualAdvance, now);
    }

    /// 丢弃全部内存状态（队列、台账、在途订单行），机械臂归位
    pub fn reset(&mut self) {
        self.dispatch(MachineEvent::Reset, Instant::now());
        self.robot_status = None;
    }

    /// 以固定帧间隔运行直到状态机回到空闲
    ///
    /// # 参数
    /// - events: 实时通道事件接收端（纯本地仿真时为 None）
    ///
    /// # 返回
    /// - Ok(frames): 运行帧数
    /// - Err(FrameLimit): 超过 sim.max_frames 仍未空闲
    pub async fn run_until_idle(
        &mut self,
        mut events: Option<&mut mpsc::UnboundedReceiver<RealtimeEvent>>,
    ) -> SimulationResult<u64> {
        let mut interval = tokio::time::interval(self.config.frame_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut frames: u64 = 0;
        let mut channel_open = events.is_some();

        while !self.machine.is_idle() {
            if frames >= self.config.max_frames {
                warn!(frames, phase = %self.machine.phase(), "超过帧数上限，停止运行");
                self.machine
                    .set_status(format!("运行超过 {} 帧仍未完成，请人工推进", frames));
                return Err(SimulationError::FrameLimit { frames });
            }

            tokio::select! {
                now = interval.tick() => {
                    self.tick(now);
                    frames += 1;
                }
                event = next_event(&mut events), if channel_open => {
                    match event {
                        Some(event) => self.on_realtime_event(event, Instant::now()),
                        None => {
                            debug!("实时事件通道已关闭");
                            channel_open = false;
                        }
                    }
                }
            }
        }

        debug!(frames, "运行结束，机械臂空闲");
        Ok(frames)
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 事件分发：执行状态机输出的副作用，副作用引发的新事件依次排队处理
    fn dispatch(&mut self, event: MachineEvent, now: Instant) {
        let mut pending = VecDeque::from([event]);

        while let Some(event) = pending.pop_front() {
            for effect in self.machine.handle(event) {
                match effect {
                    Effect::StartMotion {
                        phase,
                        target,
                        claw,
                    } => {
                        self.arm
                            .begin(phase, target, claw, self.config.layout.travel_height);
                    }
                    Effect::FinishMotion => self.arm.finish_now(),
                    Effect::EmitCommand(command) => {
                        if let Err(e) = self.sink.emit(&command) {
                            warn!(phase = %command.phase, error = %e, "运动指令发送失败");
                            pending.push_back(MachineEvent::ChannelStatus { connected: false });
                        }
                    }
                    Effect::ScheduleSettle(delay) => self.settle_deadline = Some(now + delay),
                    Effect::CancelSettle => self.settle_deadline = None,
                    Effect::ResetArm => self.arm.reset(),
                }
            }
        }
    }

    fn busy(&mut self) -> SimulationError {
        let phase = self.machine.phase();
        self.machine
            .set_status(format!("机械臂忙碌（{}），请等待当前订单完成", phase));
        SimulationError::Busy { phase }
    }

    fn collaborator_failed(&mut self, context: &str, err: ApiError) -> SimulationError {
        error!(error = %err, transport = err.is_transport(), "{}", context);
        self.machine.set_status(format!("{}: {}", context, err));
        SimulationError::Api(err)
    }
}

async fn next_event(
    events: &mut Option<&mut mpsc::UnboundedReceiver<RealtimeEvent>>,
) -> Option<RealtimeEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
