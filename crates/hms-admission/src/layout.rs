//! 医院床位布局
//!
//! 科室 -> 病区 -> 床位 的只读投影，供床位看板使用

use hms_core::{Bed, BedStatus, Department, Ward};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// 床位占用统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyStats {
    pub total: usize,
    pub available: usize,
    pub occupied: usize,
    pub maintenance: usize,
}

impl OccupancyStats {
    fn record(&mut self, status: BedStatus) {
        self.total += 1;
        match status {
            BedStatus::Available => self.available += 1,
            BedStatus::Occupied => self.occupied += 1,
            BedStatus::Maintenance => self.maintenance += 1,
        }
    }

    fn merge(&mut self, other: &OccupancyStats) {
        self.total += other.total;
        self.available += other.available;
        self.occupied += other.occupied;
        self.maintenance += other.maintenance;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WardLayout {
    pub id: Uuid,
    pub name: String,
    pub occupancy: OccupancyStats,
    pub beds: Vec<Bed>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentLayout {
    pub id: Uuid,
    pub name: String,
    pub occupancy: OccupancyStats,
    pub wards: Vec<WardLayout>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HospitalLayout {
    pub occupancy: OccupancyStats,
    pub departments: Vec<DepartmentLayout>,
}

impl HospitalLayout {
    /// 由扁平列表组装层级结构，保持输入顺序；找不到上级的病区和床位被忽略
    pub fn assemble(departments: Vec<Department>, wards: Vec<Ward>, beds: Vec<Bed>) -> Self {
        let mut beds_by_ward: HashMap<Uuid, Vec<Bed>> = HashMap::new();
        for bed in beds {
            beds_by_ward.entry(bed.ward_id).or_default().push(bed);
        }

        let mut wards_by_department: HashMap<Uuid, Vec<WardLayout>> = HashMap::new();
        for ward in wards {
            let beds = beds_by_ward.remove(&ward.id).unwrap_or_default();
            let mut occupancy = OccupancyStats::default();
            for bed in &beds {
                occupancy.record(bed.status);
            }
            wards_by_department
                .entry(ward.department_id)
                .or_default()
                .push(WardLayout {
                    id: ward.id,
                    name: ward.name,
                    occupancy,
                    beds,
                });
        }

        let mut hospital = OccupancyStats::default();
        let departments = departments
            .into_iter()
            .map(|department| {
                let wards = wards_by_department
                    .remove(&department.id)
                    .unwrap_or_default();
                let mut occupancy = OccupancyStats::default();
                for ward in &wards {
                    occupancy.merge(&ward.occupancy);
                }
                hospital.merge(&occupancy);
                DepartmentLayout {
                    id: department.id,
                    name: department.name,
                    occupancy,
                    wards,
                }
            })
            .collect();

        Self {
            occupancy: hospital,
            departments,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bed(ward_id: Uuid, label: &str, status: BedStatus) -> Bed {
        Bed {
            id: Uuid::new_v4(),
            ward_id,
            label: label.to_string(),
            status,
        }
    }

    #[test]
    fn test_assemble_counts_occupancy() {
        let department = Department {
            id: Uuid::new_v4(),
            name: "Medicine".to_string(),
        };
        let ward_a = Ward {
            id: Uuid::new_v4(),
            department_id: department.id,
            name: "Ward A".to_string(),
        };
        let ward_b = Ward {
            id: Uuid::new_v4(),
            department_id: department.id,
            name: "Ward B".to_string(),
        };
        let beds = vec![
            bed(ward_a.id, "A-01", BedStatus::Occupied),
            bed(ward_a.id, "A-02", BedStatus::Available),
            bed(ward_b.id, "B-01", BedStatus::Maintenance),
            bed(Uuid::new_v4(), "X-01", BedStatus::Available),
        ];

        let layout = HospitalLayout::assemble(vec![department], vec![ward_a, ward_b], beds);

        assert_eq!(layout.departments.len(), 1);
        let department = &layout.departments[0];
        assert_eq!(department.wards.len(), 2);
        assert_eq!(department.wards[0].beds.len(), 2);
        assert_eq!(
            department.occupancy,
            OccupancyStats {
                total: 3,
                available: 1,
                occupied: 1,
                maintenance: 1,
            }
        );
        assert_eq!(layout.occupancy.total, 3);
    }

    #[test]
    fn test_empty_layout() {
        let layout = HospitalLayout::assemble(vec![], vec![], vec![]);
        assert!(layout.departments.is_empty());
        assert_eq!(layout.occupancy, OccupancyStats::default());
    }
}
