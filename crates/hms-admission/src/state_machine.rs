//! 床位状态机
//!
//! 管理床位在入院、转床、出院和维护过程中的状态转换

use hms_core::{BedStatus, HmsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 床位状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum BedEvent {
    Occupy,
    Release,
    StartMaintenance,
    FinishMaintenance,
}

/// 床位状态机
#[derive(Debug)]
pub struct BedStateMachine {
    transitions: HashMap<(BedStatus, BedEvent), BedStatus>,
}

impl BedStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 定义状态转换规则
        transitions.insert((BedStatus::Available, BedEvent::Occupy), BedStatus::Occupied);
        transitions.insert((BedStatus::Occupied, BedEvent::Release), BedStatus::Available);
        transitions.insert((BedStatus::Available, BedEvent::StartMaintenance), BedStatus::Maintenance);
        transitions.insert((BedStatus::Maintenance, BedEvent::FinishMaintenance), BedStatus::Available);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: &BedStatus, event: &BedEvent) -> bool {
        self.transitions.contains_key(&(*from, *event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: &BedStatus, event: &BedEvent) -> Result<BedStatus> {
        match self.transitions.get(&(*from, *event)) {
            Some(to) => Ok(*to),
            None => Err(HmsError::InvalidStateTransition {
                from: format!("{:?}", from),
                event: format!("{:?}", event),
            }),
        }
    }
}

impl Default for BedStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        let sm = BedStateMachine::new();

        // 测试有效转换
        assert!(sm.can_transition(&BedStatus::Available, &BedEvent::Occupy));
        assert!(sm.can_transition(&BedStatus::Occupied, &BedEvent::Release));
        assert!(sm.can_transition(&BedStatus::Maintenance, &BedEvent::FinishMaintenance));
    }

    #[test]
    fn test_invalid_transitions() {
        let sm = BedStateMachine::new();

        // 测试无效转换
        assert!(!sm.can_transition(&BedStatus::Occupied, &BedEvent::Occupy));
        assert!(!sm.can_transition(&BedStatus::Occupied, &BedEvent::StartMaintenance));
        assert!(!sm.can_transition(&BedStatus::Maintenance, &BedEvent::Occupy));
    }

    #[test]
    fn test_state_execution() {
        let sm = BedStateMachine::new();

        let result = sm.transition(&BedStatus::Available, &BedEvent::Occupy);
        assert_eq!(result.unwrap(), BedStatus::Occupied);

        let result = sm.transition(&BedStatus::Available, &BedEvent::Release);
        assert!(matches!(result, Err(HmsError::InvalidStateTransition { .. })));
    }
}
