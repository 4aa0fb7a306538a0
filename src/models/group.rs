use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::generate_id;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewGroup {
    #[validate(length(min = 1, max = 200, message = "Group name cannot be empty"))]
    pub name: String,
}

impl NewGroup {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
        }
    }
}

impl Group {
    pub fn new(new_group: NewGroup) -> Self {
        Self {
            id: generate_id(),
            name: new_group.name,
        }
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.trim().to_string();
    }
}
