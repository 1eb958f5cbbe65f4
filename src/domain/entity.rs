// ==========================================
// 表格数据导入引擎 - 实体定义
// ==========================================
// 职责: 描述可导入的目标实体（字段清单、类型、约束）
// 说明: 对齐器只使用字段名清单，类型/约束仅供存储层使用
// ==========================================

use crate::domain::record::FieldValue;
use crate::domain::types::FieldKind;
use serde::{Deserialize, Serialize};

/// 系统维护字段（不出现在目标字段清单中）
pub const SYSTEM_FIELDS: [&str; 3] = ["id", "createdAt", "createdBy"];

// ==========================================
// FieldDef - 字段定义
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,                // 字段名（即目标字段名）
    pub kind: FieldKind,             // 字段类型
    pub required: bool,              // 是否必填
    pub unique: bool,                // 是否唯一
    pub default: Option<FieldValue>, // 缺省值
}

impl FieldDef {
    pub fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            required: false,
            unique: false,
            default: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<FieldValue>) -> Self {
        self.default = Some(value.into());
        self
    }
}

// ==========================================
// EntityDefinition - 实体定义
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityDefinition {
    pub name: String,          // 类型标签（如 participant）
    pub table: String,         // 存储表名
    pub fields: Vec<FieldDef>, // 字段定义（有序）
}

impl EntityDefinition {
    pub fn new(name: &str, table: &str, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.to_string(),
            table: table.to_string(),
            fields,
        }
    }

    /// 目标字段清单（排除系统维护字段，保持定义顺序）
    pub fn schema_fields(&self) -> Vec<String> {
        self.fields
            .iter()
            .map(|f| f.name.clone())
            .filter(|name| !SYSTEM_FIELDS.contains(&name.as_str()))
            .collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// 内置实体定义: participant / module / program
pub fn builtin_definitions() -> Vec<EntityDefinition> {
    vec![
        EntityDefinition::new(
            "participant",
            "participant",
            vec![
                FieldDef::new("firstName", FieldKind::Text).required(),
                FieldDef::new("lastName", FieldKind::Text).required(),
                FieldDef::new("email", FieldKind::Text).required().unique(),
                FieldDef::new("phone", FieldKind::Text),
                FieldDef::new("division", FieldKind::Text),
                FieldDef::new("parish", FieldKind::Text),
                FieldDef::new("deanery", FieldKind::Text),
                FieldDef::new("status", FieldKind::Text).with_default("active"),
            ],
        ),
        EntityDefinition::new(
            "module",
            "module",
            vec![
                FieldDef::new("title", FieldKind::Text).required(),
                FieldDef::new("code", FieldKind::Text),
                FieldDef::new("description", FieldKind::Text),
                FieldDef::new("credits", FieldKind::Number).with_default(3.0),
            ],
        ),
        EntityDefinition::new(
            "program",
            "program",
            vec![
                FieldDef::new("name", FieldKind::Text).required(),
                FieldDef::new("description", FieldKind::Text),
                FieldDef::new("isActive", FieldKind::Bool).with_default(true),
                FieldDef::new("startDate", FieldKind::Date),
                FieldDef::new("endDate", FieldKind::Date),
            ],
        ),
    ]
}
