use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{CanonSpec, CanonTable, LabsError};

/// Cách xử lý dòng có giá trị không đọc được khi ghi xuống tập dữ liệu.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValuePolicy {
    /// Giữ dòng, để trống ô giá trị.
    #[default]
    RetainNull,
    /// Không ghi dòng xuống đĩa.
    DropRow,
}

/// Cấu hình pipeline, đọc từ file TOML (mọi trường đều có mặc định).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LabsConfig {
    pub value_policy: ValuePolicy,
    /// Ngưỡng tỉ lệ max/min để cảnh báo chênh lệch thang đo.
    pub scale_disparity_ratio: f64,
    /// Số điểm tối thiểu để vẽ biểu đồ diễn tiến.
    pub min_history_points: usize,
    /// Thời gian nghỉ (giây) giữa hai tài liệu khi nhập liệu.
    pub cooldown_secs: u64,
    pub canon: CanonSpec,
}

impl Default for LabsConfig {
    fn default() -> Self {
        Self {
            value_policy: ValuePolicy::RetainNull,
            scale_disparity_ratio: 10.0,
            min_history_points: 2,
            cooldown_secs: 0,
            canon: CanonSpec::default(),
        }
    }
}

impl LabsConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, LabsError> {
        let config: LabsConfig =
            toml::from_str(input).map_err(|err| LabsError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, LabsError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Bảng chuẩn hoá gồm mục dựng sẵn và mục trong `[canon]`.
    pub fn canon_table(&self) -> CanonTable {
        CanonTable::from_spec(&self.canon)
    }

    fn validate(&self) -> Result<(), LabsError> {
        if !self.scale_disparity_ratio.is_finite() || self.scale_disparity_ratio <= 1.0 {
            return Err(LabsError::Config(format!(
                "scale_disparity_ratio phải lớn hơn 1, nhận {}",
                self.scale_disparity_ratio
            )));
        }
        if self
            .canon
            .exam
            .iter()
            .chain(&self.canon.category)
            .any(|entry| entry.canonical.trim().is_empty())
        {
            return Err(LabsError::Config("nhãn chuẩn không được để trống".to_string()));
        }
        Ok(())
    }
}
