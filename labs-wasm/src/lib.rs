//! Bridge WASM <-> JavaScript cho dashboard.

use labs_core::{LabsConfig, LabsError};
use labs_query::{SeriesQuery, SeriesView};
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize, Default)]
struct JsLabsConfig {
    #[serde(default)]
    scale_disparity_ratio: Option<f64>,
    #[serde(default)]
    min_history_points: Option<usize>,
}

impl From<JsLabsConfig> for LabsConfig {
    fn from(cfg: JsLabsConfig) -> Self {
        let mut base = LabsConfig::default();
        if let Some(ratio) = cfg.scale_disparity_ratio.filter(|r| r.is_finite() && *r > 1.0) {
            base.scale_disparity_ratio = ratio;
        }
        if let Some(points) = cfg.min_history_points {
            base.min_history_points = points;
        }
        base
    }
}

/// Lọc tập dữ liệu CSV theo lựa chọn trên dashboard.
#[wasm_bindgen]
pub fn query_dataset(
    dataset_csv: &str,
    query: JsValue,
    config: Option<JsValue>,
) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let query: SeriesQuery = from_value(query)
        .map_err(|err| JsValue::from_str(&format!("Không đọc được lựa chọn: {err}")))?;

    let cfg = match config {
        Some(js_cfg) => {
            let cfg: JsLabsConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Không đọc được config: {err}")))?;
            LabsConfig::from(cfg)
        }
        None => LabsConfig::default(),
    };

    let view = run_query(dataset_csv, &query, &cfg)
        .map_err(|err| JsValue::from_str(&format_labs_error(err)))?;

    to_value(&view).map_err(|err| JsValue::from_str(&format!("Không serialize kết quả: {err}")))
}

/// Phần thuần Rust của [`query_dataset`].
pub fn run_query(
    dataset_csv: &str,
    query: &SeriesQuery,
    config: &LabsConfig,
) -> Result<SeriesView, LabsError> {
    let dataset = labs_store::read_dataset_from(dataset_csv.as_bytes())?;
    Ok(query.run(&dataset, config))
}

fn format_labs_error(err: LabsError) -> String {
    format!("Labs error: {err}")
}
