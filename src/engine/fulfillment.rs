// ==========================================
// 药品仓储机械臂 - 订单履约状态机
// ==========================================
// 职责: 逐个单位驱动 取货 → 校验 → 投放 → 回程，维护队列/库存/台账
// 说明: 单一上下文对象 + 单一入口 handle(event) -> effects，
//       所有副作用（运动、指令发送、定时）以 Effect 形式交给驱动层执行
// 红线: 下一订单行派发前，当前行的扣减与台账必须已提交
// 红线: 完成信号边沿触发，非当前等待的信号一律忽略
// ==========================================
//
// 阶段表:
//   idle        --OrderLoaded-->  moveToPick (弹出首行)
//   moveToPick  --完成-->          lift        (扫码校验)
//   lift        --完成-->          moveToDrop  (订单托盘 / 废弃托盘)
//   moveToDrop  --完成-->          drop        (扣减库存 + 记台账)
//   drop        --完成-->          return      (队列非空则直接派发下一行)
//   return      --归位完成-->      idle

use crate::config::WarehouseLayout;
use crate::domain::ledger::{LedgerEntry, Ledgers};
use crate::domain::medicine::MedicineStock;
use crate::domain::order::{OrderLine, OrderQueue};
use crate::domain::types::{AckPolicy, Outcome, Phase, Vec3};
use crate::engine::inventory::{ContainerMap, PickIssue};
use crate::engine::motion::{CLAW_CLOSED, CLAW_OPEN};
use crate::realtime::{MedicineRef, MovementCommand, OrderLineRef};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

// ==========================================
// 输入事件
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum MachineEvent {
    /// 订单已获取并展开
    OrderLoaded {
        order_id: String,
        lines: Vec<OrderLine>,
    },
    /// 本地运动完成（插值器发出）
    MotionComplete { phase: Phase },
    /// 实时通道回传完成（回显阶段）
    RemoteComplete { phase: Phase },
    /// 人工强制完成当前等待
    ManualAdvance,
    /// 跳过订单行后的等待结束
    SettleElapsed,
    ChannelStatus { connected: bool },
    SyncModeChanged { enabled: bool },
    Reset,
}

// ==========================================
// 输出副作用
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    StartMotion {
        phase: Phase,
        target: Vec3,
        claw: f64,
    },
    /// 立即吸附到当前运动终点
    FinishMotion,
    EmitCommand(MovementCommand),
    ScheduleSettle(Duration),
    CancelSettle,
    /// 机械臂复位到归位点
    ResetArm,
}

/// 当前等待的信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Waiting {
    Nothing,
    Motion,
    Acknowledgement,
    Settle,
}

/// 同步设置
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub enabled: bool,
    pub ack_policy: AckPolicy,
    pub settle_delay: Duration,
}

/// 被跳过的订单行
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedLine {
    pub line: OrderLine,
    pub reason: String,
}

/// 单个订单的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderTally {
    pub delivered: usize,
    pub dumped: usize,
    pub skipped: usize,
}

/// 在途订单行
#[derive(Debug, Clone)]
struct InFlight {
    line: OrderLine,
    held: MedicineStock,
    pick_point: Vec3,
    outcome: Option<Outcome>,
}

/// 状态快照（界面展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSnapshot {
    pub phase: Phase,
    pub waiting: Waiting,
    pub queue_length: usize,
    pub delivered: usize,
    pub dumped: usize,
    pub skipped: usize,
    pub active_order: Option<String>,
    pub current_scan_code: Option<String>,
    pub sync_enabled: bool,
    pub channel_connected: bool,
    pub status: String,
}

// ==========================================
// FulfillmentMachine - 履约状态机
// ==========================================
#[derive(Debug, Clone)]
pub struct FulfillmentMachine {
    phase: Phase,
    waiting: Waiting,
    queue: OrderQueue,
    inventory: ContainerMap,
    ledgers: Ledgers,
    skipped: Vec<SkippedLine>,
    in_flight: Option<InFlight>,
    layout: WarehouseLayout,
    sync: SyncSettings,
    channel_connected: bool,
    active_order: Option<String>,
    tally: OrderTally,
    target: Vec3,
    claw_target: f64,
    status: String,
}

impl FulfillmentMachine {
    pub fn new(layout: WarehouseLayout, sync: SyncSettings, channel_connected: bool) -> Self {
        let home = layout.home;
        Self {
            phase: Phase::Idle,
            waiting: Waiting::Nothing,
            queue: OrderQueue::new(),
            inventory: ContainerMap::default(),
            ledgers: Ledgers::new(),
            skipped: Vec::new(),
            in_flight: None,
            layout,
            sync,
            channel_connected,
            active_order: None,
            tally: OrderTally::default(),
            target: home,
            claw_target: CLAW_CLOSED,
            status: "等待订单".to_string(),
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn waiting(&self) -> Waiting {
        self.waiting
    }

    /// 空闲且无任何等待
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle && self.waiting == Waiting::Nothing
    }

    pub fn queue(&self) -> &OrderQueue {
        &self.queue
    }

    pub fn inventory(&self) -> &ContainerMap {
        &self.inventory
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    pub fn skipped(&self) -> &[SkippedLine] {
        &self.skipped
    }

    pub fn tally(&self) -> OrderTally {
        self.tally
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn sync_settings(&self) -> SyncSettings {
        self.sync
    }

    pub fn layout(&self) -> &WarehouseLayout {
        &self.layout
    }

    pub fn channel_connected(&self) -> bool {
        self.channel_connected
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            phase: self.phase,
            waiting: self.waiting,
            queue_length: self.queue.len(),
            delivered: self.ledgers.delivered().len(),
            dumped: self.ledgers.dumped().len(),
            skipped: self.skipped.len(),
            active_order: self.active_order.clone(),
            current_scan_code: self.in_flight.as_ref().map(|f| f.line.scan_code.clone()),
            sync_enabled: self.sync.enabled,
            channel_connected: self.channel_connected,
            status: self.status.clone(),
        }
    }

    // ==========================================
    // 驱动层直接调用的修改
    // ==========================================

    /// 设置界面状态文本（用于外部调用失败等场景）
    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// 替换库存快照（仅在空闲时由驱动层调用）
    pub fn replace_inventory(&mut self, inventory: ContainerMap) {
        self.inventory = inventory;
    }

    // ==========================================
    // 事件入口
    // ==========================================

    /// 处理一个事件，返回需要驱动层执行的副作用
    pub fn handle(&mut self, event: MachineEvent) -> Vec<Effect> {
        let mut effects = Vec::new();

        match event {
            MachineEvent::OrderLoaded { order_id, lines } => {
                self.on_order_loaded(order_id, lines, &mut effects)
            }
            MachineEvent::MotionComplete { phase } => self.on_motion_complete(phase, &mut effects),
            MachineEvent::RemoteComplete { phase } => self.on_remote_complete(phase, &mut effects),
            MachineEvent::ManualAdvance => self.on_manual_advance(&mut effects),
            MachineEvent::SettleElapsed => self.on_settle_elapsed(&mut effects),
            MachineEvent::ChannelStatus { connected } => {
                self.on_channel_status(connected, &mut effects)
            }
            MachineEvent::SyncModeChanged { enabled } => {
                self.on_sync_mode_changed(enabled, &mut effects)
            }
            MachineEvent::Reset => self.on_reset(&mut effects),
        }

        effects
    }

    fn on_order_loaded(&mut self, order_id: String, lines: Vec<OrderLine>, effects: &mut Vec<Effect>) {
        if !self.is_idle() {
            warn!(order_id = %order_id, phase = %self.phase, "机械臂忙碌，拒绝新订单");
            self.status = format!("机械臂忙碌（{}），订单 {} 未入队", self.phase, order_id);
            return;
        }

        self.tally = OrderTally::default();
        if lines.is_empty() {
            info!(order_id = %order_id, "订单无待处理单位");
            self.status = format!("订单 {} 无待处理单位", order_id);
            return;
        }

        info!(order_id = %order_id, units = lines.len(), "订单入队，开始处理");
        self.queue.extend(lines);
        self.active_order = Some(order_id);
        self.dispatch_next(effects);
    }

    fn on_motion_complete(&mut self, phase: Phase, effects: &mut Vec<Effect>) {
        if self.waiting != Waiting::Motion || phase != self.phase {
            debug!(
                reported = %phase,
                current = %self.phase,
                waiting = ?self.waiting,
                "忽略非当前等待的运动完成信号"
            );
            return;
        }

        if self.channel_connected {
            effects.push(Effect::EmitCommand(self.build_command()));
        }

        if self.sync.enabled && self.channel_connected {
            self.waiting = Waiting::Acknowledgement;
            self.status = format!("等待机器人确认: {}", self.phase);
            debug!(phase = %self.phase, "本地运动完成，等待机器人确认");
        } else {
            self.advance(effects);
        }
    }

    fn on_remote_complete(&mut self, echoed: Phase, effects: &mut Vec<Effect>) {
        if self.waiting != Waiting::Acknowledgement {
            debug!(echoed = %echoed, waiting = ?self.waiting, "忽略未在等待中的机器人确认");
            return;
        }

        if self.sync.ack_policy == AckPolicy::MatchingPhase && echoed != self.phase {
            warn!(
                echoed = %echoed,
                current = %self.phase,
                "机器人确认的阶段与当前阶段不一致，忽略"
            );
            return;
        }

        debug!(echoed = %echoed, current = %self.phase, "收到机器人确认");
        self.advance(effects);
    }

    fn on_manual_advance(&mut self, effects: &mut Vec<Effect>) {
        match self.waiting {
            Waiting::Motion => {
                info!(phase = %self.phase, "人工推进: 跳过运动");
                effects.push(Effect::FinishMotion);
                self.advance(effects);
            }
            Waiting::Acknowledgement => {
                info!(phase = %self.phase, "人工推进: 跳过机器人确认");
                self.advance(effects);
            }
            Waiting::Settle => {
                info!("人工推进: 跳过等待");
                effects.push(Effect::CancelSettle);
                self.on_settle_elapsed(effects);
            }
            Waiting::Nothing => debug!("空闲状态下的人工推进，忽略"),
        }
    }

    fn on_settle_elapsed(&mut self, effects: &mut Vec<Effect>) {
        if self.waiting != Waiting::Settle {
            debug!(waiting = ?self.waiting, "忽略过期的等待结束信号");
            return;
        }

        self.waiting = Waiting::Nothing;
        if self.queue.is_empty() {
            self.go_home(effects);
        } else {
            self.dispatch_next(effects);
        }
    }

    fn on_channel_status(&mut self, connected: bool, effects: &mut Vec<Effect>) {
        if self.channel_connected == connected {
            return;
        }
        self.channel_connected = connected;

        if connected {
            info!("实时通道已连接");
            return;
        }

        warn!(phase = %self.phase, "实时通道断开，改为本地推进");
        self.status = "实时通道已断开，仅本地仿真".to_string();
        if self.waiting == Waiting::Acknowledgement {
            self.advance(effects);
        }
    }

    fn on_sync_mode_changed(&mut self, enabled: bool, effects: &mut Vec<Effect>) {
        self.sync.enabled = enabled;
        info!(enabled, "同步模式切换");

        if !enabled && self.waiting == Waiting::Acknowledgement {
            self.advance(effects);
        }
    }

    fn on_reset(&mut self, effects: &mut Vec<Effect>) {
        info!(phase = %self.phase, queued = self.queue.len(), "状态重置");

        self.queue.clear();
        self.ledgers.clear();
        self.skipped.clear();
        self.in_flight = None;
        self.active_order = None;
        self.tally = OrderTally::default();
        self.phase = Phase::Idle;
        self.waiting = Waiting::Nothing;
        self.target = self.layout.home;
        self.claw_target = CLAW_CLOSED;
        self.status = "已重置".to_string();

        effects.push(Effect::CancelSettle);
        effects.push(Effect::ResetArm);
    }

    // ==========================================
    // 阶段推进
    // ==========================================

    /// 当前阶段完成，进入下一阶段
    fn advance(&mut self, effects: &mut Vec<Effect>) {
        self.waiting = Waiting::Nothing;

        match self.phase {
            Phase::Idle => debug!("空闲阶段无需推进"),
            Phase::MoveToPick => self.enter_lift(effects),
            Phase::Lift => self.enter_move_to_drop(effects),
            Phase::MoveToDrop => self.enter_drop(effects),
            Phase::Drop => self.enter_return(effects),
            Phase::Return => self.finish_order(),
        }
    }

    /// 弹出队首并派发；无法取货则跳过并进入等待
    fn dispatch_next(&mut self, effects: &mut Vec<Effect>) {
        let Some(line) = self.queue.pop_front() else {
            self.go_home(effects);
            return;
        };

        let Some(pick_point) = self.layout.pick_point(&line.container_label) else {
            let issue = PickIssue::UnknownContainer {
                label: line.container_label.clone(),
            };
            self.skip_line(line, issue, effects);
            return;
        };

        match self
            .inventory
            .find_candidate(&line.container_label, &line.medicine_name, &line.brand)
        {
            Ok(held) => {
                info!(
                    scan_code = %line.scan_code,
                    container = %line.container_label,
                    medicine = %line.medicine_name,
                    remaining_lines = self.queue.len(),
                    "派发订单行"
                );
                self.status = format!(
                    "前往货箱 {} 拣选 {}（{}）",
                    line.container_label, line.medicine_name, line.brand
                );
                self.in_flight = Some(InFlight {
                    line,
                    held,
                    pick_point,
                    outcome: None,
                });
                self.enter_motion(Phase::MoveToPick, pick_point, CLAW_OPEN, effects);
            }
            Err(issue) => self.skip_line(line, issue, effects),
        }
    }

    fn skip_line(&mut self, line: OrderLine, issue: PickIssue, effects: &mut Vec<Effect>) {
        warn!(
            scan_code = %line.scan_code,
            container = %line.container_label,
            reason = %issue,
            remaining_lines = self.queue.len(),
            "订单行无法拣选，跳过"
        );
        self.status = format!("跳过 {}（{}）: {}", line.medicine_name, line.scan_code, issue);
        self.skipped.push(SkippedLine {
            line,
            reason: issue.to_string(),
        });
        self.tally.skipped += 1;
        self.waiting = Waiting::Settle;
        effects.push(Effect::ScheduleSettle(self.sync.settle_delay));
    }

    fn enter_motion(&mut self, phase: Phase, target: Vec3, claw: f64, effects: &mut Vec<Effect>) {
        debug!(from = %self.phase, to = %phase, target = %target, "阶段切换");
        self.phase = phase;
        self.target = target;
        self.claw_target = claw;
        self.waiting = Waiting::Motion;
        effects.push(Effect::StartMotion {
            phase,
            target,
            claw,
        });
    }

    /// 抓取并提升：扫码校验名称+品牌
    fn enter_lift(&mut self, effects: &mut Vec<Effect>) {
        let Some(flight) = self.in_flight.as_mut() else {
            warn!("提升阶段缺少在途订单行，直接归位");
            self.go_home(effects);
            return;
        };

        let outcome = verify_scan(&flight.held, &flight.line);
        flight.outcome = Some(outcome);

        info!(
            scan_code = %flight.line.scan_code,
            held = %format!("{}/{}", flight.held.name, flight.held.brand),
            ordered = %format!("{}/{}", flight.line.medicine_name, flight.line.brand),
            outcome = %outcome,
            "扫码校验完成"
        );
        self.status = if outcome == Outcome::Delivered {
            format!("扫码 {} 校验通过", flight.line.scan_code)
        } else {
            format!(
                "扫码 {} 校验失败: 抓取 {}（{}），订单要求 {}（{}）",
                flight.line.scan_code,
                flight.held.name,
                flight.held.brand,
                flight.line.medicine_name,
                flight.line.brand
            )
        };

        let target = self.layout.above(flight.pick_point);
        self.enter_motion(Phase::Lift, target, CLAW_CLOSED, effects);
    }

    fn enter_move_to_drop(&mut self, effects: &mut Vec<Effect>) {
        let Some(outcome) = self.in_flight.as_ref().and_then(|f| f.outcome) else {
            warn!("移向托盘阶段缺少校验结果，直接归位");
            self.go_home(effects);
            return;
        };

        let target = self.layout.above(self.layout.tray(outcome));
        self.enter_motion(Phase::MoveToDrop, target, CLAW_CLOSED, effects);
    }

    /// 下降释放：扣减来源货箱 1 个单位（无论校验结果），按结果记台账
    fn enter_drop(&mut self, effects: &mut Vec<Effect>) {
        let Some(flight) = self.in_flight.as_ref() else {
            warn!("投放阶段缺少在途订单行，直接归位");
            self.go_home(effects);
            return;
        };
        let outcome = flight.outcome.unwrap_or(Outcome::Dumped);

        let remaining = self
            .inventory
            .decrement(&flight.line.container_label, &flight.held.medicine_id);
        if remaining.is_none() {
            warn!(
                container = %flight.line.container_label,
                medicine_id = %flight.held.medicine_id,
                "扣减时货箱内已无该药品"
            );
        }

        let entry = LedgerEntry::new(
            &flight.line,
            &flight.held.medicine_id,
            &flight.held.name,
            &flight.held.brand,
            outcome,
        );
        info!(
            scan_code = %entry.scan_code,
            container = %entry.container_label,
            outcome = %outcome,
            remaining = ?remaining,
            "单位出库"
        );
        self.ledgers.record(entry);
        match outcome {
            Outcome::Delivered => self.tally.delivered += 1,
            Outcome::Dumped => self.tally.dumped += 1,
        }

        let target = self.layout.drop_point(outcome);
        self.enter_motion(Phase::Drop, target, CLAW_OPEN, effects);
    }

    /// 回程：队列非空直接派发下一行，否则归位
    fn enter_return(&mut self, effects: &mut Vec<Effect>) {
        self.phase = Phase::Return;
        self.in_flight = None;

        if self.queue.is_empty() {
            self.go_home(effects);
        } else {
            self.dispatch_next(effects);
        }
    }

    fn go_home(&mut self, effects: &mut Vec<Effect>) {
        self.in_flight = None;
        if self.phase == Phase::Idle {
            // 从未离开归位点（例如首行即被跳过）
            self.finish_order();
            return;
        }
        let home = self.layout.home;
        self.enter_motion(Phase::Return, home, CLAW_CLOSED, effects);
    }

    fn finish_order(&mut self) {
        let order_id = self.active_order.take().unwrap_or_default();
        info!(
            order_id = %order_id,
            delivered = self.tally.delivered,
            dumped = self.tally.dumped,
            skipped = self.tally.skipped,
            "订单处理完成"
        );

        self.phase = Phase::Idle;
        self.waiting = Waiting::Nothing;
        self.in_flight = None;
        self.status = format!(
            "订单 {} 处理完成：送达 {}，丢弃 {}，跳过 {}",
            order_id, self.tally.delivered, self.tally.dumped, self.tally.skipped
        );
    }

    fn build_command(&self) -> MovementCommand {
        let medicine = self.in_flight.as_ref().map(|f| MedicineRef {
            medicine_id: f.held.medicine_id.clone(),
            name: f.held.name.clone(),
            brand: f.held.brand.clone(),
        });
        let line = self.in_flight.as_ref().map(|f| OrderLineRef {
            order_id: f.line.order_id.clone(),
            order_item_id: f.line.order_item_id.clone(),
            scan_code: f.line.scan_code.clone(),
        });

        MovementCommand::new(self.phase, self.target, self.claw_target)
            .with_medicine(medicine)
            .with_order_line(line)
    }
}

/// 扫码校验：抓取的药品与订单行名称、品牌完全一致才送达
fn verify_scan(held: &MedicineStock, line: &OrderLine) -> Outcome {
    if held.is_same_product(&line.medicine_name, &line.brand) {
        Outcome::Delivered
    } else {
        Outcome::Dumped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::medicine::Medicine;

    fn medicine(id: &str, name: &str, brand: &str, label: &str, qty: u32) -> Medicine {
        Medicine {
            id: id.to_string(),
            name: name.to_string(),
            brand: brand.to_string(),
            container_label: label.to_string(),
            total_units: qty,
            available_quantity: qty,
            used_quantity: 0,
        }
    }

    fn line(label: &str, name: &str, brand: &str, code: &str) -> OrderLine {
        OrderLine {
            order_id: "ORD-1".to_string(),
            container_label: label.to_string(),
            medicine_name: name.to_string(),
            brand: brand.to_string(),
            order_item_id: "1".to_string(),
            scan_code: code.to_string(),
        }
    }

    fn machine(sync_enabled: bool, connected: bool, policy: AckPolicy) -> FulfillmentMachine {
        let mut m = FulfillmentMachine::new(
            WarehouseLayout::default(),
            SyncSettings {
                enabled: sync_enabled,
                ack_policy: policy,
                settle_delay: Duration::from_millis(5),
            },
            connected,
        );
        m.replace_inventory(ContainerMap::from_snapshot(&[
            medicine("m1", "Paracetamol", "X", "A1", 2),
            medicine("m2", "Ibuprofen", "Y", "B2", 1),
        ]));
        m
    }

    /// 不经过插值器，直接以完成信号推进到空闲
    fn drive_to_idle(m: &mut FulfillmentMachine) {
        for _ in 0..200 {
            match m.waiting() {
                Waiting::Motion => {
                    let phase = m.phase();
                    m.handle(MachineEvent::MotionComplete { phase });
                }
                Waiting::Settle => {
                    m.handle(MachineEvent::SettleElapsed);
                }
                Waiting::Acknowledgement => {
                    let phase = m.phase();
                    m.handle(MachineEvent::RemoteComplete { phase });
                }
                Waiting::Nothing => return,
            }
        }
        panic!("状态机未在限定步数内回到空闲");
    }

    #[test]
    fn test_order_load_starts_move_to_pick() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        let effects = m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });

        assert_eq!(m.phase(), Phase::MoveToPick);
        assert_eq!(m.queue().len(), 0);
        assert!(matches!(
            effects.as_slice(),
            [Effect::StartMotion { phase: Phase::MoveToPick, claw, .. }] if *claw == CLAW_OPEN
        ));
    }

    #[test]
    fn test_phase_sequence_without_sync() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });

        let mut visited = vec![m.phase()];
        while m.waiting() == Waiting::Motion {
            let phase = m.phase();
            m.handle(MachineEvent::MotionComplete { phase });
            visited.push(m.phase());
        }

        assert_eq!(
            visited,
            vec![
                Phase::MoveToPick,
                Phase::Lift,
                Phase::MoveToDrop,
                Phase::Drop,
                Phase::Return,
                Phase::Idle
            ]
        );
        assert_eq!(m.ledgers().delivered().len(), 1);
        assert!(m.status().contains("送达 1"));
    }

    #[test]
    fn test_two_units_drain_container() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![
                line("A1", "Paracetamol", "X", "S1"),
                line("A1", "Paracetamol", "X", "S2"),
            ],
        });
        drive_to_idle(&mut m);

        assert_eq!(m.ledgers().delivered().len(), 2);
        assert_eq!(m.ledgers().dumped().len(), 0);
        assert_eq!(m.inventory().quantity_of("Paracetamol", "X"), 0);
        assert!(m.inventory().get("A1").unwrap().stocks.is_empty());
        assert!(m.queue().is_empty());
        assert!(m.is_idle());
    }

    #[test]
    fn test_brand_mismatch_line_is_skipped_without_decrement() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        let effects = m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![
                line("A1", "Paracetamol", "Z", "S1"),
                line("A1", "Paracetamol", "X", "S2"),
            ],
        });

        assert_eq!(effects, vec![Effect::ScheduleSettle(Duration::from_millis(5))]);
        assert_eq!(m.phase(), Phase::Idle);
        assert_eq!(m.queue().len(), 1);
        assert_eq!(m.ledgers().total(), 0);
        assert_eq!(m.inventory().quantity_of("Paracetamol", "X"), 2);

        drive_to_idle(&mut m);
        assert_eq!(m.skipped().len(), 1);
        assert_eq!(m.skipped()[0].line.scan_code, "S1");
        assert_eq!(m.ledgers().dumped().len(), 0);
        assert_eq!(m.ledgers().delivered().len(), 1);
        assert_eq!(m.inventory().quantity_of("Paracetamol", "X"), 1);
    }

    #[test]
    fn test_mixed_brand_container_delivers_ordered_brand() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.replace_inventory(ContainerMap::from_snapshot(&[
            medicine("m1", "Paracetamol", "X", "A1", 1),
            medicine("m3", "Paracetamol", "Y", "A1", 1),
        ]));
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "Y", "S1")],
        });
        drive_to_idle(&mut m);

        assert_eq!(m.ledgers().delivered().len(), 1);
        assert_eq!(m.ledgers().delivered()[0].medicine_id, "m3");
        assert_eq!(m.ledgers().dumped().len(), 0);
        assert_eq!(m.inventory().quantity_of("Paracetamol", "Y"), 0);
        assert_eq!(m.inventory().quantity_of("Paracetamol", "X"), 1);
    }

    #[test]
    fn test_verify_scan_compares_name_and_brand() {
        let held = MedicineStock {
            medicine_id: "m1".to_string(),
            name: "Paracetamol".to_string(),
            brand: "X".to_string(),
            quantity: 1,
        };

        assert_eq!(verify_scan(&held, &line("A1", "Paracetamol", "X", "S1")), Outcome::Delivered);
        assert_eq!(verify_scan(&held, &line("A1", "Paracetamol", "Y", "S1")), Outcome::Dumped);
        assert_eq!(verify_scan(&held, &line("A1", "Ibuprofen", "X", "S1")), Outcome::Dumped);
    }

    #[test]
    fn test_scan_mismatch_at_lift_goes_to_dump_tray_and_decrements() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });

        // 抓到的单位标签与库存记录不符
        if let Some(flight) = m.in_flight.as_mut() {
            flight.held.brand = "Y".to_string();
        }

        // moveToPick 完成 → lift
        m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick });
        assert!(m.status().contains("校验失败"));
        // lift 完成 → moveToDrop，目标为废弃托盘上方
        let effects = m.handle(MachineEvent::MotionComplete { phase: Phase::Lift });
        let dump_above = m.layout().above(m.layout().dump_tray);
        assert!(matches!(
            effects.as_slice(),
            [Effect::StartMotion { phase: Phase::MoveToDrop, target, .. }] if *target == dump_above
        ));

        drive_to_idle(&mut m);
        assert_eq!(m.ledgers().dumped().len(), 1);
        assert_eq!(m.ledgers().dumped()[0].brand, "Y");
        assert_eq!(m.ledgers().delivered().len(), 0);
        assert_eq!(m.inventory().quantity_of("Paracetamol", "X"), 1);
        assert_eq!(m.tally().dumped, 1);
    }

    #[test]
    fn test_missing_medicine_is_skipped_with_settle() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        let effects = m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![
                line("B2", "Aspirin", "Q", "S1"),
                line("A1", "Paracetamol", "X", "S2"),
            ],
        });

        assert_eq!(effects, vec![Effect::ScheduleSettle(Duration::from_millis(5))]);
        assert_eq!(m.phase(), Phase::Idle);
        assert_eq!(m.waiting(), Waiting::Settle);
        assert_eq!(m.queue().len(), 1);
        assert_eq!(m.ledgers().total(), 0);
        assert!(m.status().contains("S1"));

        let effects = m.handle(MachineEvent::SettleElapsed);
        assert!(matches!(effects[0], Effect::StartMotion { phase: Phase::MoveToPick, .. }));

        drive_to_idle(&mut m);
        assert_eq!(m.skipped().len(), 1);
        assert_eq!(m.ledgers().delivered().len(), 1);
    }

    #[test]
    fn test_only_line_skipped_returns_to_idle_without_motion() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("Q9", "Paracetamol", "X", "S1")],
        });
        let effects = m.handle(MachineEvent::SettleElapsed);

        assert!(effects.is_empty());
        assert!(m.is_idle());
        assert_eq!(m.tally().skipped, 1);
    }

    #[test]
    fn test_sync_waits_for_matching_acknowledgement() {
        let mut m = machine(true, true, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });

        let effects = m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick });
        assert!(matches!(
            effects.as_slice(),
            [Effect::EmitCommand(cmd)] if cmd.phase == Phase::MoveToPick
                && cmd.order_line.as_ref().map(|l| l.scan_code.as_str()) == Some("S1")
        ));
        assert_eq!(m.waiting(), Waiting::Acknowledgement);

        // 回显阶段不一致 → 忽略
        assert!(m.handle(MachineEvent::RemoteComplete { phase: Phase::Drop }).is_empty());
        assert_eq!(m.phase(), Phase::MoveToPick);

        m.handle(MachineEvent::RemoteComplete { phase: Phase::MoveToPick });
        assert_eq!(m.phase(), Phase::Lift);
    }

    #[test]
    fn test_any_phase_policy_accepts_stale_echo() {
        let mut m = machine(true, true, AckPolicy::AnyPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });
        m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick });
        m.handle(MachineEvent::RemoteComplete { phase: Phase::Return });
        assert_eq!(m.phase(), Phase::Lift);
    }

    #[test]
    fn test_disconnect_while_waiting_advances() {
        let mut m = machine(true, true, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });
        m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick });
        assert_eq!(m.waiting(), Waiting::Acknowledgement);

        m.handle(MachineEvent::ChannelStatus { connected: false });
        assert_eq!(m.phase(), Phase::Lift);
        assert_eq!(m.waiting(), Waiting::Motion);

        // 断开后本地完成直接推进，不再发送指令
        let effects = m.handle(MachineEvent::MotionComplete { phase: Phase::Lift });
        assert!(effects.iter().all(|e| !matches!(e, Effect::EmitCommand(_))));
        assert_eq!(m.phase(), Phase::MoveToDrop);
    }

    #[test]
    fn test_sync_off_while_waiting_advances() {
        let mut m = machine(true, true, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });
        m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick });
        m.handle(MachineEvent::SyncModeChanged { enabled: false });
        assert_eq!(m.phase(), Phase::Lift);
    }

    #[test]
    fn test_duplicate_motion_complete_is_ignored() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });
        m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick });
        assert_eq!(m.phase(), Phase::Lift);

        // 重复的旧信号不得再次推进
        assert!(m.handle(MachineEvent::MotionComplete { phase: Phase::MoveToPick }).is_empty());
        assert_eq!(m.phase(), Phase::Lift);
    }

    #[test]
    fn test_manual_advance_finishes_motion() {
        let mut m = machine(true, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });

        let effects = m.handle(MachineEvent::ManualAdvance);
        assert_eq!(effects[0], Effect::FinishMotion);
        assert_eq!(m.phase(), Phase::Lift);

        assert!(FulfillmentMachine::new(
            WarehouseLayout::default(),
            m.sync_settings(),
            false
        )
        .handle(MachineEvent::ManualAdvance)
        .is_empty());
    }

    #[test]
    fn test_busy_machine_rejects_new_order() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![line("A1", "Paracetamol", "X", "S1")],
        });
        let effects = m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-2".to_string(),
            lines: vec![line("B2", "Ibuprofen", "Y", "S9")],
        });

        assert!(effects.is_empty());
        assert_eq!(m.queue().len(), 0);
        assert!(m.status().contains("ORD-2"));
    }

    #[test]
    fn test_reset_discards_state() {
        let mut m = machine(false, false, AckPolicy::MatchingPhase);
        m.handle(MachineEvent::OrderLoaded {
            order_id: "ORD-1".to_string(),
            lines: vec![
                line("A1", "Paracetamol", "X", "S1"),
                line("B2", "Ibuprofen", "Y", "S2"),
            ],
        });
        let effects = m.handle(MachineEvent::Reset);

        assert_eq!(effects, vec![Effect::CancelSettle, Effect::ResetArm]);
        assert!(m.is_idle());
        assert!(m.queue().is_empty());
        assert_eq!(m.snapshot().current_scan_code, None);
    }
}
