//! User profile used to personalise prompts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaritalStatus {
    Single,
    Married,
    Divorced,
    Widowed,
}

impl MaritalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "не замужем/не женат",
            MaritalStatus::Married => "замужем/женат",
            MaritalStatus::Divorced => "в разводе",
            MaritalStatus::Widowed => "вдовец/вдова",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildInfo {
    pub age: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    /// Height in centimeters.
    pub height: Option<f64>,
    pub age: Option<u32>,
    pub marital_status: Option<MaritalStatus>,
    pub hobbies: Option<Vec<String>>,
    pub profession: Option<String>,
    pub children: Option<Vec<ChildInfo>>,
}

impl UserProfile {
    /// Bulleted prompt lines for every populated field. Empty when nothing is set.
    pub fn prompt_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(age) = self.age.filter(|a| *a > 0) {
            lines.push(format!("- Возраст: {age} лет"));
        }
        if let Some(height) = self.height.filter(|h| *h > 0.0) {
            lines.push(format!("- Рост: {height} см"));
        }
        if let Some(status) = self.marital_status {
            lines.push(format!("- Семейное положение: {}", status.label()));
        }
        if let Some(profession) = self.profession.as_deref().filter(|p| !p.is_empty()) {
            lines.push(format!("- Профессия: {profession}"));
        }
        if let Some(hobbies) = self.hobbies.as_ref().filter(|h| !h.is_empty()) {
            lines.push(format!("- Увлечения: {}", hobbies.join(", ")));
        }
        if let Some(children) = self.children.as_ref().filter(|c| !c.is_empty()) {
            let ages: Vec<String> = children.iter().map(|c| format!("{} лет", c.age)).collect();
            lines.push(format!("- Дети: {} ({})", children.len(), ages.join(", ")));
        }
        lines
    }
}
