// ==========================================
// 药品仓储机械臂 - 运动插值器
// ==========================================
// 职责: 按阶段规划途经点（竖直与水平分离），每帧按固定比例向途经点靠拢
// 规则:
//   取货点/释放点: 升至行进高度 → 沿 x → 沿 z → 下降
//   提升/移向托盘: 单段直接移动
//   归位(idle/return): 先水平(x+z) 后竖直
// 红线: 进入容差后直接吸附到目标（不做渐近逼近）
// 红线: 阶段完成事件每个规划只发出一次（边沿触发）
// ==========================================

use crate::config::MotionTuning;
use crate::domain::types::{Axis, Phase, Vec3};
use std::collections::VecDeque;

pub const CLAW_OPEN: f64 = 1.0;
pub const CLAW_CLOSED: f64 = 0.0;

/// 插值器对外事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionEvent {
    PhaseComplete { phase: Phase },
}

/// 子阶段类型（决定参与插值的轴）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Vertical,
    AlongX,
    AlongZ,
    Horizontal,
    Direct,
}

impl SegmentKind {
    pub fn axes(&self) -> &'static [Axis] {
        match self {
            SegmentKind::Vertical => &[Axis::Y],
            SegmentKind::AlongX => &[Axis::X],
            SegmentKind::AlongZ => &[Axis::Z],
            SegmentKind::Horizontal => &[Axis::X, Axis::Z],
            SegmentKind::Direct => &[Axis::X, Axis::Y, Axis::Z],
        }
    }
}

/// 子阶段：一个途经点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub kind: SegmentKind,
    pub waypoint: Vec3,
}

/// 一次阶段运动的完整规划
#[derive(Debug, Clone, PartialEq)]
pub struct MotionPlan {
    pub phase: Phase,
    pub target: Vec3,
    pub claw_target: f64,
    pub segments: VecDeque<Segment>,
}

/// 规划途经点
///
/// 起点已在容差内的子阶段直接省略
pub fn plan_route(
    phase: Phase,
    from: Vec3,
    target: Vec3,
    claw_target: f64,
    travel_height: f64,
    tolerance: f64,
) -> MotionPlan {
    let mut raw: Vec<Segment> = Vec::with_capacity(4);

    match phase {
        Phase::MoveToPick | Phase::Drop => {
            let rise = from.with_y(travel_height);
            let along_x = Vec3::new(target.x, travel_height, from.z);
            let along_z = Vec3::new(target.x, travel_height, target.z);
            raw.push(Segment { kind: SegmentKind::Vertical, waypoint: rise });
            raw.push(Segment { kind: SegmentKind::AlongX, waypoint: along_x });
            raw.push(Segment { kind: SegmentKind::AlongZ, waypoint: along_z });
            raw.push(Segment { kind: SegmentKind::Vertical, waypoint: target });
        }
        Phase::Lift | Phase::MoveToDrop => {
            raw.push(Segment { kind: SegmentKind::Direct, waypoint: target });
        }
        Phase::Idle | Phase::Return => {
            let horizontal = Vec3::new(target.x, from.y, target.z);
            raw.push(Segment { kind: SegmentKind::Horizontal, waypoint: horizontal });
            raw.push(Segment { kind: SegmentKind::Vertical, waypoint: target });
        }
    }

    // 省略无位移的子阶段（以前一途经点为起点判断）
    let mut cursor = from;
    let mut segments = VecDeque::with_capacity(raw.len());
    for segment in raw {
        let moves = segment
            .kind
            .axes()
            .iter()
            .any(|axis| (segment.waypoint.get(*axis) - cursor.get(*axis)).abs() >= tolerance);
        if moves {
            segments.push_back(segment);
        }
        for axis in segment.kind.axes() {
            cursor.set(*axis, segment.waypoint.get(*axis));
        }
    }

    MotionPlan {
        phase,
        target,
        claw_target,
        segments,
    }
}

/// 单轴移动 distance 需要的帧数：floor(ln(tol/d) / ln(1-b)) + 1
pub fn ticks_to_converge(distance: f64, tuning: &MotionTuning) -> u32 {
    let distance = distance.abs();
    if distance < tuning.tolerance {
        return 0;
    }
    let ratio = (tuning.tolerance / distance).ln() / (1.0 - tuning.blend_factor).ln();
    ratio.floor() as u32 + 1
}

// ==========================================
// ArmMotionInterpolator - 末端执行器插值器
// ==========================================
#[derive(Debug, Clone)]
pub struct ArmMotionInterpolator {
    position: Vec3,
    claw: f64,
    plan: Option<MotionPlan>,
    tuning: MotionTuning,
    home: Vec3,
}

impl ArmMotionInterpolator {
    pub fn new(home: Vec3, tuning: MotionTuning) -> Self {
        Self {
            position: home,
            claw: CLAW_CLOSED,
            plan: None,
            tuning,
            home,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn claw(&self) -> f64 {
        self.claw
    }

    pub fn is_moving(&self) -> bool {
        self.plan.is_some()
    }

    pub fn active_phase(&self) -> Option<Phase> {
        self.plan.as_ref().map(|p| p.phase)
    }

    pub fn plan(&self) -> Option<&MotionPlan> {
        self.plan.as_ref()
    }

    /// 开始一个阶段的运动（覆盖未完成的规划）
    pub fn begin(&mut self, phase: Phase, target: Vec3, claw_target: f64, travel_height: f64) {
        let plan = plan_route(
            phase,
            self.position,
            target,
            claw_target,
            travel_height,
            self.tuning.tolerance,
        );
        tracing::debug!(
            phase = %phase,
            from = %self.position,
            target = %target,
            segments = plan.segments.len(),
            "运动规划完成"
        );
        self.plan = Some(plan);
    }

    /// 推进一帧
    ///
    /// # 返回
    /// - Some(PhaseComplete): 本帧完成全部子阶段且夹爪到位（每个规划只返回一次）
    /// - None: 仍在运动或无规划
    pub fn tick(&mut self) -> Option<MotionEvent> {
        let blend = self.tuning.blend_factor;
        let tolerance = self.tuning.tolerance;
        let plan = self.plan.as_mut()?;

        // 夹爪独立插值
        self.claw += (plan.claw_target - self.claw) * blend;
        let claw_done = (plan.claw_target - self.claw).abs() < tolerance;
        if claw_done {
            self.claw = plan.claw_target;
        }

        // 当前子阶段插值
        if let Some(segment) = plan.segments.front().copied() {
            let axes = segment.kind.axes();
            for axis in axes {
                let current = self.position.get(*axis);
                let goal = segment.waypoint.get(*axis);
                self.position.set(*axis, current + (goal - current) * blend);
            }

            let reached = axes.iter().all(|axis| {
                (segment.waypoint.get(*axis) - self.position.get(*axis)).abs() < tolerance
            });
            if reached {
                for axis in axes {
                    self.position.set(*axis, segment.waypoint.get(*axis));
                }
                plan.segments.pop_front();
            }
        }

        if plan.segments.is_empty() && claw_done {
            let phase = plan.phase;
            self.position = plan.target;
            self.plan = None;
            return Some(MotionEvent::PhaseComplete { phase });
        }

        None
    }

    /// 立即吸附到当前规划的最终位姿（人工推进），不产生完成事件
    pub fn finish_now(&mut self) {
        if let Some(plan) = self.plan.take() {
            self.position = plan.target;
            self.claw = plan.claw_target;
        }
    }

    /// 复位到归位点
    pub fn reset(&mut self) {
        self.plan = None;
        self.position = self.home;
        self.claw = CLAW_CLOSED;
    }
}
