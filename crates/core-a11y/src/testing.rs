//! In-memory element tree for tests and offline tooling.
//!
//! Builds the same shapes the platform hands the runtime, with optional
//! per-field failure injection so degradation paths stay covered.

use std::collections::HashSet;
use std::sync::Arc;

use crate::{A11yError, Element};

#[derive(Default)]
pub struct TestElement {
    runtime_id: Vec<i32>,
    name: String,
    control_type: String,
    aria_role: String,
    aria_properties: String,
    focusable: bool,
    children: Vec<Arc<TestElement>>,
    failing: HashSet<&'static str>,
}

impl TestElement {
    pub fn new(runtime_id: Vec<i32>, control_type: &str) -> Self {
        Self {
            runtime_id,
            control_type: control_type.to_string(),
            ..Self::default()
        }
    }

    pub fn named(runtime_id: Vec<i32>, control_type: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::new(runtime_id, control_type)
        }
    }

    pub fn role(mut self, role: &str) -> Self {
        self.aria_role = role.to_string();
        self
    }

    pub fn properties(mut self, properties: &str) -> Self {
        self.aria_properties = properties.to_string();
        self
    }

    pub fn focusable(mut self) -> Self {
        self.focusable = true;
        self
    }

    pub fn child(mut self, child: TestElement) -> Self {
        self.children.push(Arc::new(child));
        self
    }

    /// Make the named accessor fail ("name", "control_type", "aria_role",
    /// "aria_properties", "runtime_id", "focusable", "children").
    pub fn failing(mut self, field: &'static str) -> Self {
        self.failing.insert(field);
        self
    }

    fn check(&self, field: &'static str) -> Result<(), A11yError> {
        if self.failing.contains(field) {
            Err(A11yError::Read(format!("{field} unavailable")))
        } else {
            Ok(())
        }
    }
}

impl Element for TestElement {
    fn runtime_id(&self) -> Result<Vec<i32>, A11yError> {
        self.check("runtime_id")?;
        Ok(self.runtime_id.clone())
    }

    fn name(&self) -> Result<String, A11yError> {
        self.check("name")?;
        Ok(self.name.clone())
    }

    fn control_type(&self) -> Result<String, A11yError> {
        self.check("control_type")?;
        Ok(self.control_type.clone())
    }

    fn aria_role(&self) -> Result<String, A11yError> {
        self.check("aria_role")?;
        Ok(self.aria_role.clone())
    }

    fn aria_properties(&self) -> Result<String, A11yError> {
        self.check("aria_properties")?;
        Ok(self.aria_properties.clone())
    }

    fn is_focusable(&self) -> Result<bool, A11yError> {
        self.check("focusable")?;
        Ok(self.focusable)
    }

    fn children(&self) -> Result<Vec<Arc<dyn Element>>, A11yError> {
        self.check("children")?;
        Ok(self
            .children
            .iter()
            .map(|c| c.clone() as Arc<dyn Element>)
            .collect())
    }
}
