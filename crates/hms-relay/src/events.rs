//! 实时事件定义
//!
//! 客户端与服务端之间传递的帧统一为 `{ "event": 名称, "data": 负载 }`。

use chrono::{DateTime, Utc};
use hms_core::{HmsError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 事件名称
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventName {
    JoinRoom,
    LeaveRoom,
    EmergencyInitiated,
    EmergencyAlert,
    OtAssigned,
    OtAssignmentComplete,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JoinRoom => "join_room",
            Self::LeaveRoom => "leave_room",
            Self::EmergencyInitiated => "EMERGENCY_INITIATED",
            Self::EmergencyAlert => "EMERGENCY_ALERT",
            Self::OtAssigned => "OT_ASSIGNED",
            Self::OtAssignmentComplete => "OT_ASSIGNMENT_COMPLETE",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "join_room" => Some(Self::JoinRoom),
            "leave_room" => Some(Self::LeaveRoom),
            "EMERGENCY_INITIATED" => Some(Self::EmergencyInitiated),
            "EMERGENCY_ALERT" => Some(Self::EmergencyAlert),
            "OT_ASSIGNED" => Some(Self::OtAssigned),
            "OT_ASSIGNMENT_COMPLETE" => Some(Self::OtAssignmentComplete),
            _ => None,
        }
    }
}

/// 可发布的业务事件
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// 急诊呼叫：通知手术室管理员，并向其他在线客户端发出全局告警
    EmergencyInitiated(serde_json::Value),
    /// 手术室分配完成：所有客户端按接收者自行过滤，管理员另收完成信号
    OtAssigned(serde_json::Value),
}

impl RelayEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::EmergencyInitiated(_) => EventName::EmergencyInitiated,
            Self::OtAssigned(_) => EventName::OtAssigned,
        }
    }

    pub fn payload(&self) -> &serde_json::Value {
        match self {
            Self::EmergencyInitiated(data) | Self::OtAssigned(data) => data,
        }
    }
}

/// 客户端发来的帧
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// 客户端指令
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    JoinRoom(String),
    LeaveRoom(String),
    Publish(RelayEvent),
}

impl ClientCommand {
    pub fn from_frame(frame: ClientFrame) -> Result<Self> {
        let name = EventName::parse(&frame.event)
            .ok_or_else(|| HmsError::Validation(format!("未知事件: {}", frame.event)))?;

        match name {
            EventName::JoinRoom | EventName::LeaveRoom => {
                let room = frame
                    .data
                    .as_str()
                    .map(str::trim)
                    .filter(|room| !room.is_empty())
                    .ok_or_else(|| HmsError::Validation("房间名不能为空".to_string()))?
                    .to_string();
                if name == EventName::JoinRoom {
                    Ok(Self::JoinRoom(room))
                } else {
                    Ok(Self::LeaveRoom(room))
                }
            }
            EventName::EmergencyInitiated => {
                Ok(Self::Publish(RelayEvent::EmergencyInitiated(frame.data)))
            }
            EventName::OtAssigned => Ok(Self::Publish(RelayEvent::OtAssigned(frame.data))),
            EventName::EmergencyAlert | EventName::OtAssignmentComplete => Err(
                HmsError::Validation(format!("事件 {} 只能由服务端发出", frame.event)),
            ),
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let frame: ClientFrame = serde_json::from_str(text)?;
        Self::from_frame(frame)
    }
}

/// 服务端推送给客户端的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayMessage {
    pub id: String,
    pub event: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub source: Option<Uuid>,
}

impl RelayMessage {
    pub fn new(event: EventName, data: serde_json::Value, source: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event: event.as_str().to_string(),
            data,
            timestamp: Utc::now(),
            source,
        }
    }
}

/// 角色房间名
pub fn role_room(role: &str) -> String {
    format!("role:{}", role)
}
