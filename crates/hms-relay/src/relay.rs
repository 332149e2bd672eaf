//! 实时事件中继
//!
//! 维护在线客户端及其房间成员关系，将业务事件按接收规则投递到每个客户端的发送队列。
//! 队列有界，写满时丢弃该客户端的这条消息，不阻塞发布方。

use crate::events::{role_room, EventName, RelayEvent, RelayMessage};
use chrono::{DateTime, Utc};
use hms_core::{HmsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub type ClientId = Uuid;

/// 中继配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// 手术室管理员房间
    pub ot_manager_room: String,
    /// 每个客户端的发送队列容量
    pub client_queue_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            ot_manager_room: role_room("OTManager"),
            client_queue_size: 64,
        }
    }
}

/// 新建立的客户端连接
#[derive(Debug)]
pub struct ClientConnection {
    pub id: ClientId,
    pub receiver: mpsc::Receiver<RelayMessage>,
}

/// 一次发布的投递结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub delivered: usize,
    pub dropped: usize,
}

/// 中继状态快照
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    pub connected_clients: usize,
    pub rooms: BTreeMap<String, usize>,
}

#[derive(Debug)]
struct ClientEntry {
    sender: mpsc::Sender<RelayMessage>,
    rooms: HashSet<String>,
    connected_at: DateTime<Utc>,
}

/// 事件中继
#[derive(Debug)]
pub struct EventRelay {
    config: RelayConfig,
    clients: RwLock<HashMap<ClientId, ClientEntry>>,
}

impl EventRelay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// 注册新客户端
    pub async fn connect(&self) -> ClientConnection {
        let (sender, receiver) = mpsc::channel(self.config.client_queue_size.max(1));
        let id = Uuid::new_v4();
        let mut clients = self.clients.write().await;
        clients.insert(
            id,
            ClientEntry {
                sender,
                rooms: HashSet::new(),
                connected_at: Utc::now(),
            },
        );
        info!("Client connected: {} ({} online)", id, clients.len());
        ClientConnection { id, receiver }
    }

    /// 注销客户端，返回客户端是否存在
    pub async fn disconnect(&self, client: ClientId) -> bool {
        let mut clients = self.clients.write().await;
        match clients.remove(&client) {
            Some(entry) => {
                let duration = Utc::now() - entry.connected_at;
                info!(
                    "Client disconnected: {} after {}s ({} online)",
                    client,
                    duration.num_seconds(),
                    clients.len()
                );
                true
            }
            None => false,
        }
    }

    pub async fn join_room(&self, client: ClientId, room: &str) -> Result<()> {
        let room = validate_room(room)?;
        let mut clients = self.clients.write().await;
        let entry = clients
            .get_mut(&client)
            .ok_or_else(|| HmsError::not_found("Client", client))?;
        if entry.rooms.insert(room.to_string()) {
            debug!("Client {} joined room {}", client, room);
        }
        Ok(())
    }

    pub async fn leave_room(&self, client: ClientId, room: &str) -> Result<()> {
        let room = validate_room(room)?;
        let mut clients = self.clients.write().await;
        let entry = clients
            .get_mut(&client)
            .ok_or_else(|| HmsError::not_found("Client", client))?;
        if entry.rooms.remove(room) {
            debug!("Client {} left room {}", client, room);
        }
        Ok(())
    }

    /// 按事件类型的接收规则投递
    pub async fn publish(&self, source: Option<ClientId>, event: RelayEvent) -> DeliveryReport {
        let clients = self.clients.read().await;
        let room = self.config.ot_manager_room.as_str();
        let mut report = DeliveryReport::default();

        match &event {
            RelayEvent::EmergencyInitiated(payload) => {
                let direct = RelayMessage::new(EventName::EmergencyInitiated, payload.clone(), source);
                let alert = RelayMessage::new(EventName::EmergencyAlert, payload.clone(), source);
                for (id, entry) in clients.iter() {
                    if entry.rooms.contains(room) {
                        deliver(*id, entry, &direct, &mut report);
                    } else if Some(*id) != source {
                        deliver(*id, entry, &alert, &mut report);
                    }
                }
            }
            RelayEvent::OtAssigned(payload) => {
                let assigned = RelayMessage::new(EventName::OtAssigned, payload.clone(), source);
                let complete =
                    RelayMessage::new(EventName::OtAssignmentComplete, payload.clone(), source);
                for (id, entry) in clients.iter() {
                    deliver(*id, entry, &assigned, &mut report);
                    if entry.rooms.contains(room) {
                        deliver(*id, entry, &complete, &mut report);
                    }
                }
            }
        }

        info!(
            "Published {} from {:?}: {} delivered, {} dropped",
            event.name().as_str(),
            source,
            report.delivered,
            report.dropped
        );
        report
    }

    pub async fn stats(&self) -> RelayStats {
        let clients = self.clients.read().await;
        let mut rooms = BTreeMap::new();
        for entry in clients.values() {
            for room in &entry.rooms {
                *rooms.entry(room.clone()).or_insert(0) += 1;
            }
        }
        RelayStats {
            connected_clients: clients.len(),
            rooms,
        }
    }
}

impl Default for EventRelay {
    fn default() -> Self {
        Self::new(RelayConfig::default())
    }
}

fn validate_room(room: &str) -> Result<&str> {
    let room = room.trim();
    if room.is_empty() {
        return Err(HmsError::Validation("房间名不能为空".to_string()));
    }
    Ok(room)
}

fn deliver(id: ClientId, entry: &ClientEntry, message: &RelayMessage, report: &mut DeliveryReport) {
    match entry.sender.try_send(message.clone()) {
        Ok(()) => report.delivered += 1,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Send queue full for client {}, dropping {}", id, message.event);
            report.dropped += 1;
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("Client {} channel closed, dropping {}", id, message.event);
            report.dropped += 1;
        }
    }
}
