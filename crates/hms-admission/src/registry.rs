//! 住院与床位登记
//!
//! 入院、转床、出院都会同时修改床位状态和住院记录，并追加转床历史，全部在一个事务内完成。

use chrono::{DateTime, Utc};
use hms_core::models::*;
use hms_core::{HmsError, Result, Store, StoreTx};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::layout::HospitalLayout;
use crate::state_machine::{BedEvent, BedStateMachine};

/// 入院请求
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmitRequest {
    pub patient_id: Uuid,
    pub bed_id: Uuid,
    pub visit_id: Option<Uuid>,
}

/// 住院记录及按时间排序的转床历史
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionDetail {
    pub admission: Admission,
    pub transfers: Vec<BedTransfer>,
}

/// 住院登记服务
pub struct AdmissionRegistry<S: Store> {
    store: S,
    beds: BedStateMachine,
}

impl<S: Store> AdmissionRegistry<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            beds: BedStateMachine::new(),
        }
    }

    /// 按状态机推进床位状态，条件更新失败说明床位已被其他事务修改
    async fn apply_bed_event(&self, tx: &mut S::Tx, bed_id: Uuid, event: BedEvent) -> Result<Bed> {
        let mut bed = tx
            .get_bed(bed_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Bed", bed_id))?;

        if !self.beds.can_transition(&bed.status, &event) {
            warn!("Bed {} rejects {:?} while {:?}", bed_id, event, bed.status);
        }
        let next = self.beds.transition(&bed.status, &event)?;
        if !tx.transition_bed_status(bed_id, bed.status, next).await? {
            return Err(HmsError::InvalidStateTransition {
                from: format!("{:?}", bed.status),
                event: format!("{:?}", event),
            });
        }

        bed.status = next;
        Ok(bed)
    }

    /// 读取仍在院的住院记录
    async fn load_admitted(tx: &mut S::Tx, admission_id: Uuid) -> Result<(Admission, Uuid)> {
        let admission = tx
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Admission", admission_id))?;

        if admission.status != AdmissionStatus::Admitted {
            return Err(HmsError::InvalidStateTransition {
                from: format!("{:?}", admission.status),
                event: "BedChange".to_string(),
            });
        }

        let bed_id = admission.current_bed_id.ok_or_else(|| {
            HmsError::Internal(format!("在院记录 {} 没有当前床位", admission_id))
        })?;
        Ok((admission, bed_id))
    }

    /// 结束当前未关闭的转床记录，返回结束时间（不早于该记录的开始时间）
    async fn close_open_transfer(tx: &mut S::Tx, admission_id: Uuid) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        let transfers = tx.list_bed_transfers(admission_id).await?;

        match transfers.iter().rev().find(|t| t.end_date.is_none()) {
            Some(open) => {
                let end = now.max(open.start_date);
                tx.close_bed_transfer(open.id, end).await?;
                Ok(end)
            }
            None => Ok(transfers
                .last()
                .map(|t| now.max(t.start_date))
                .unwrap_or(now)),
        }
    }

    /// 办理入院
    pub async fn admit_patient(&self, request: AdmitRequest) -> Result<AdmissionDetail> {
        let mut tx = self.store.begin().await?;

        tx.get_patient(request.patient_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Patient", request.patient_id))?;

        // 同一患者同时只能有一条在院记录
        if let Some(existing) = tx.find_admitted_for_patient(request.patient_id).await? {
            warn!(
                "Patient {} is already admitted (admission {})",
                request.patient_id, existing.id
            );
            return Err(HmsError::InvalidStateTransition {
                from: format!("{:?}", existing.status),
                event: "Admit".to_string(),
            });
        }

        self.apply_bed_event(&mut tx, request.bed_id, BedEvent::Occupy)
            .await?;

        let now = Utc::now();
        let admission = Admission {
            id: Uuid::new_v4(),
            patient_id: request.patient_id,
            visit_id: request.visit_id,
            status: AdmissionStatus::Admitted,
            current_bed_id: Some(request.bed_id),
            admitted_at: now,
            discharged_at: None,
        };
        let placement = BedTransfer {
            id: Uuid::new_v4(),
            admission_id: admission.id,
            from_bed_id: None,
            to_bed_id: request.bed_id,
            start_date: now,
            end_date: None,
        };

        tx.insert_admission(&admission).await?;
        tx.insert_bed_transfer(&placement).await?;
        tx.commit().await?;

        info!(
            "Patient {} admitted to bed {} (admission {})",
            request.patient_id, request.bed_id, admission.id
        );
        Ok(AdmissionDetail {
            admission,
            transfers: vec![placement],
        })
    }

    /// 转床：追加转床记录，释放原床位，占用新床位
    pub async fn transfer_bed(&self, admission_id: Uuid, to_bed_id: Uuid) -> Result<AdmissionDetail> {
        let mut tx = self.store.begin().await?;

        let (mut admission, from_bed_id) = Self::load_admitted(&mut tx, admission_id).await?;
        if from_bed_id == to_bed_id {
            return Err(HmsError::Validation(format!(
                "目标床位 {} 与当前床位相同",
                to_bed_id
            )));
        }

        self.apply_bed_event(&mut tx, to_bed_id, BedEvent::Occupy)
            .await?;
        self.apply_bed_event(&mut tx, from_bed_id, BedEvent::Release)
            .await?;

        let start_date = Self::close_open_transfer(&mut tx, admission_id).await?;
        tx.insert_bed_transfer(&BedTransfer {
            id: Uuid::new_v4(),
            admission_id,
            from_bed_id: Some(from_bed_id),
            to_bed_id,
            start_date,
            end_date: None,
        })
        .await?;

        admission.current_bed_id = Some(to_bed_id);
        tx.update_admission(&admission).await?;

        let transfers = tx.list_bed_transfers(admission_id).await?;
        tx.commit().await?;

        info!(
            "Admission {} transferred from bed {} to bed {}",
            admission_id, from_bed_id, to_bed_id
        );
        Ok(AdmissionDetail {
            admission,
            transfers,
        })
    }

    /// 办理出院
    pub async fn discharge_patient(&self, admission_id: Uuid) -> Result<AdmissionDetail> {
        let mut tx = self.store.begin().await?;

        let (mut admission, bed_id) = Self::load_admitted(&mut tx, admission_id).await?;
        self.apply_bed_event(&mut tx, bed_id, BedEvent::Release)
            .await?;
        let discharged_at = Self::close_open_transfer(&mut tx, admission_id).await?;

        admission.status = AdmissionStatus::Discharged;
        admission.current_bed_id = None;
        admission.discharged_at = Some(discharged_at);
        tx.update_admission(&admission).await?;

        let transfers = tx.list_bed_transfers(admission_id).await?;
        tx.commit().await?;

        info!("Admission {} discharged, bed {} released", admission_id, bed_id);
        Ok(AdmissionDetail {
            admission,
            transfers,
        })
    }

    pub async fn get_admission(&self, admission_id: Uuid) -> Result<AdmissionDetail> {
        let mut tx = self.store.begin().await?;

        let admission = tx
            .get_admission(admission_id)
            .await?
            .ok_or_else(|| HmsError::not_found("Admission", admission_id))?;
        let transfers = tx.list_bed_transfers(admission_id).await?;

        Ok(AdmissionDetail {
            admission,
            transfers,
        })
    }

    /// 床位进入或结束维护；占用中的床位不能进入维护
    pub async fn set_bed_maintenance(&self, bed_id: Uuid, maintenance: bool) -> Result<Bed> {
        let mut tx = self.store.begin().await?;

        let event = if maintenance {
            BedEvent::StartMaintenance
        } else {
            BedEvent::FinishMaintenance
        };
        let bed = self.apply_bed_event(&mut tx, bed_id, event).await?;
        tx.commit().await?;

        info!("Bed {} is now {:?}", bed.label, bed.status);
        Ok(bed)
    }

    /// 科室 -> 病区 -> 床位 布局与占用统计
    pub async fn get_hospital_layout(&self) -> Result<HospitalLayout> {
        let mut tx = self.store.begin().await?;

        let departments = tx.list_departments().await?;
        let wards = tx.list_wards().await?;
        let beds = tx.list_beds().await?;

        Ok(HospitalLayout::assemble(departments, wards, beds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hms_database::MemoryStore;

    struct Fixture {
        store: MemoryStore,
        patient: Uuid,
        beds: Vec<Uuid>,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::default();
        let (patient, beds) = store
            .seed(|state| {
                let patient = state.add_patient("UHID-100", "Anil");
                let department = state.add_department("Medicine");
                let ward = state.add_ward(department, "Ward A");
                let beds = (1..=3)
                    .map(|n| state.add_bed(ward, &format!("A-{:02}", n)))
                    .collect();
                (patient, beds)
            })
            .await;
        Fixture {
            store,
            patient,
            beds,
        }
    }

    fn admit(f: &Fixture, bed: usize) -> AdmitRequest {
        AdmitRequest {
            patient_id: f.patient,
            bed_id: f.beds[bed],
            visit_id: None,
        }
    }

    #[tokio::test]
    async fn test_admit_occupies_bed() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let detail = registry.admit_patient(admit(&f, 0)).await.unwrap();
        assert_eq!(detail.admission.status, AdmissionStatus::Admitted);
        assert_eq!(detail.admission.current_bed_id, Some(f.beds[0]));
        assert_eq!(detail.transfers.len(), 1);
        assert!(detail.transfers[0].from_bed_id.is_none());

        let state = f.store.snapshot().await;
        assert_eq!(state.beds[&f.beds[0]].status, BedStatus::Occupied);
    }

    #[tokio::test]
    async fn test_admit_into_occupied_bed_fails() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());
        let other = f
            .store
            .seed(|state| state.add_patient("UHID-101", "Kavya"))
            .await;

        registry.admit_patient(admit(&f, 0)).await.unwrap();
        let second = registry
            .admit_patient(AdmitRequest {
                patient_id: other,
                bed_id: f.beds[0],
                visit_id: None,
            })
            .await;
        assert!(matches!(second, Err(HmsError::InvalidStateTransition { .. })));
        assert_eq!(f.store.snapshot().await.admissions.len(), 1);
    }

    #[tokio::test]
    async fn test_admit_unknown_patient_fails() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let result = registry
            .admit_patient(AdmitRequest {
                patient_id: Uuid::new_v4(),
                bed_id: f.beds[0],
                visit_id: None,
            })
            .await;
        assert!(matches!(result, Err(HmsError::NotFound(_))));

        let state = f.store.snapshot().await;
        assert!(state.admissions.is_empty());
        assert_eq!(state.beds[&f.beds[0]].status, BedStatus::Available);
    }

    #[tokio::test]
    async fn test_patient_cannot_hold_two_admissions() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        registry.admit_patient(admit(&f, 0)).await.unwrap();
        let second = registry.admit_patient(admit(&f, 1)).await;
        assert!(matches!(second, Err(HmsError::InvalidStateTransition { .. })));

        let state = f.store.snapshot().await;
        assert_eq!(state.admissions.len(), 1);
        assert_eq!(state.beds[&f.beds[1]].status, BedStatus::Available);
    }

    #[tokio::test]
    async fn test_readmission_after_discharge() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let first = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        registry.discharge_patient(first.id).await.unwrap();

        let second = registry.admit_patient(admit(&f, 1)).await.unwrap();
        assert_ne!(second.admission.id, first.id);
        assert_eq!(second.admission.current_bed_id, Some(f.beds[1]));
    }

    #[tokio::test]
    async fn test_admit_into_missing_bed_fails() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let result = registry
            .admit_patient(AdmitRequest {
                patient_id: f.patient,
                bed_id: Uuid::new_v4(),
                visit_id: None,
            })
            .await;
        assert!(matches!(result, Err(HmsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_transfer_history_is_append_only_and_ordered() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let admission = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        let first = registry.transfer_bed(admission.id, f.beds[1]).await.unwrap();
        let second = registry.transfer_bed(admission.id, f.beds[2]).await.unwrap();

        assert_eq!(first.transfers.len(), 2);
        assert_eq!(second.transfers.len(), 3);
        // 之前的记录保持不变，只追加
        assert_eq!(second.transfers[0].id, first.transfers[0].id);
        assert_eq!(second.transfers[1].id, first.transfers[1].id);

        let starts: Vec<_> = second.transfers.iter().map(|t| t.start_date).collect();
        let mut sorted = starts.clone();
        sorted.sort();
        assert_eq!(starts, sorted);

        assert!(second.transfers[0].end_date.is_some());
        assert!(second.transfers[1].end_date.is_some());
        assert!(second.transfers[2].end_date.is_none());
        assert_eq!(second.transfers[2].from_bed_id, Some(f.beds[1]));
        assert_eq!(second.admission.current_bed_id, Some(f.beds[2]));

        let state = f.store.snapshot().await;
        assert_eq!(state.beds[&f.beds[0]].status, BedStatus::Available);
        assert_eq!(state.beds[&f.beds[1]].status, BedStatus::Available);
        assert_eq!(state.beds[&f.beds[2]].status, BedStatus::Occupied);
    }

    #[tokio::test]
    async fn test_transfer_to_unavailable_bed_rolls_back() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let admission = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        registry.set_bed_maintenance(f.beds[1], true).await.unwrap();

        let result = registry.transfer_bed(admission.id, f.beds[1]).await;
        assert!(matches!(result, Err(HmsError::InvalidStateTransition { .. })));

        let detail = registry.get_admission(admission.id).await.unwrap();
        assert_eq!(detail.transfers.len(), 1);
        assert_eq!(detail.admission.current_bed_id, Some(f.beds[0]));
        let state = f.store.snapshot().await;
        assert_eq!(state.beds[&f.beds[0]].status, BedStatus::Occupied);
    }

    #[tokio::test]
    async fn test_transfer_and_discharge_missing_records() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let missing = registry.transfer_bed(Uuid::new_v4(), f.beds[1]).await;
        assert!(matches!(missing, Err(HmsError::NotFound(_))));
        let missing = registry.discharge_patient(Uuid::new_v4()).await;
        assert!(matches!(missing, Err(HmsError::NotFound(_))));

        let admission = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        let result = registry.transfer_bed(admission.id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(HmsError::NotFound(_))));

        let detail = registry.get_admission(admission.id).await.unwrap();
        assert_eq!(detail.transfers.len(), 1);
        assert_eq!(detail.admission.current_bed_id, Some(f.beds[0]));
    }

    #[tokio::test]
    async fn test_failed_release_leaves_target_bed_available() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let admission = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        // 源床位状态被外部改为维护，释放失败
        let source = f.beds[0];
        f.store
            .seed(|state| {
                if let Some(bed) = state.beds.get_mut(&source) {
                    bed.status = BedStatus::Maintenance;
                }
            })
            .await;

        let result = registry.transfer_bed(admission.id, f.beds[1]).await;
        assert!(matches!(result, Err(HmsError::InvalidStateTransition { .. })));

        let state = f.store.snapshot().await;
        assert_eq!(state.beds[&f.beds[1]].status, BedStatus::Available);
        assert_eq!(state.bed_transfers.len(), 1);
        assert_eq!(state.admissions[&admission.id].current_bed_id, Some(source));
    }

    #[tokio::test]
    async fn test_transfer_to_same_bed_is_rejected() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let admission = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        let result = registry.transfer_bed(admission.id, f.beds[0]).await;
        assert!(matches!(result, Err(HmsError::Validation(_))));
    }

    #[tokio::test]
    async fn test_discharge_releases_bed() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        let admission = registry.admit_patient(admit(&f, 0)).await.unwrap().admission;
        let detail = registry.discharge_patient(admission.id).await.unwrap();

        assert_eq!(detail.admission.status, AdmissionStatus::Discharged);
        assert!(detail.admission.current_bed_id.is_none());
        assert!(detail.admission.discharged_at.is_some());
        assert!(detail.transfers.iter().all(|t| t.end_date.is_some()));
        assert_eq!(
            f.store.snapshot().await.beds[&f.beds[0]].status,
            BedStatus::Available
        );

        // 已出院的记录不能再转床或出院
        let again = registry.discharge_patient(admission.id).await;
        assert!(matches!(again, Err(HmsError::InvalidStateTransition { .. })));
        let transfer = registry.transfer_bed(admission.id, f.beds[1]).await;
        assert!(matches!(transfer, Err(HmsError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_maintenance_on_occupied_bed_fails() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        registry.admit_patient(admit(&f, 0)).await.unwrap();
        let result = registry.set_bed_maintenance(f.beds[0], true).await;
        assert!(matches!(result, Err(HmsError::InvalidStateTransition { .. })));

        let bed = registry.set_bed_maintenance(f.beds[1], true).await.unwrap();
        assert_eq!(bed.status, BedStatus::Maintenance);
        let bed = registry.set_bed_maintenance(f.beds[1], false).await.unwrap();
        assert_eq!(bed.status, BedStatus::Available);
    }

    #[tokio::test]
    async fn test_hospital_layout_reflects_occupancy() {
        let f = fixture().await;
        let registry = AdmissionRegistry::new(f.store.clone());

        registry.admit_patient(admit(&f, 0)).await.unwrap();
        registry.set_bed_maintenance(f.beds[2], true).await.unwrap();

        let layout = registry.get_hospital_layout().await.unwrap();
        assert_eq!(layout.departments.len(), 1);
        let ward = &layout.departments[0].wards[0];
        assert_eq!(ward.beds.len(), 3);
        assert_eq!(ward.occupancy.occupied, 1);
        assert_eq!(ward.occupancy.available, 1);
        assert_eq!(ward.occupancy.maintenance, 1);
        assert_eq!(layout.occupancy.total, 3);
    }
}
