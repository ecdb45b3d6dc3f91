use std::collections::HashSet;

use parking_lot::RwLock;

use crate::errors::Result;
use crate::types::EmployeeId;

/// read-only view of the employee registry
pub trait EmployeeDirectory: Send + Sync {
    fn exists(&self, employee_id: EmployeeId) -> Result<bool>;
}

/// directory backed by a set of known employee ids
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    employees: RwLock<HashSet<EmployeeId>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(employees: impl IntoIterator<Item = EmployeeId>) -> Self {
        Self {
            employees: RwLock::new(employees.into_iter().collect()),
        }
    }

    pub fn register(&self, employee_id: EmployeeId) {
        self.employees.write().insert(employee_id);
    }

    pub fn remove(&self, employee_id: EmployeeId) -> bool {
        self.employees.write().remove(&employee_id)
    }
}

impl EmployeeDirectory for InMemoryDirectory {
    fn exists(&self, employee_id: EmployeeId) -> Result<bool> {
        Ok(self.employees.read().contains(&employee_id))
    }
}
