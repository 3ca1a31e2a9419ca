//! Grouping counter rows by logical service

use std::collections::HashMap;

use serde::Serialize;

use crate::models::CounterRow;

/// All rows for one logical service, in source order.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceGroup {
    pub name: String,
    pub rows: Vec<CounterRow>,
}

impl ServiceGroup {
    /// The service's frontend aggregate row. If duplicates exist,
    /// the first occurrence wins.
    pub fn frontend(&self) -> Option<&CounterRow> {
        self.rows.iter().find(|row| row.is_frontend())
    }

    /// The service's backend aggregate row, first occurrence wins.
    pub fn backend(&self) -> Option<&CounterRow> {
        self.rows.iter().find(|row| row.is_backend())
    }

    /// Concrete backend instances, excluding the aggregate rows.
    pub fn members(&self) -> impl Iterator<Item = &CounterRow> {
        self.rows.iter().filter(|row| row.is_member())
    }
}

/// Group parsed rows by service name.
///
/// Groups appear in order of first appearance and keep their rows in
/// input order. A service with only member rows is valid.
pub fn group_by_service(rows: &[CounterRow]) -> Vec<ServiceGroup> {
    let mut groups: Vec<ServiceGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let slot = match index.get(&row.service_name) {
            Some(&slot) => slot,
            None => {
                groups.push(ServiceGroup {
                    name: row.service_name.clone(),
                    rows: Vec::new(),
                });
                let slot = groups.len() - 1;
                index.insert(row.service_name.clone(), slot);
                slot
            }
        };
        groups[slot].rows.push(row.clone());
    }

    groups
}
