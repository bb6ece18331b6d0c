//! 연동 데이터 포인트.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// 외부 제공자에서 가져온 단일 지표 샘플.
///
/// (차트, 포인트 이름) 조합이 고유 키이며, 같은 키를 다시 가져오면 값을 덮어씁니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationDataPoint {
    /// 논리 차트 식별자 (예: "mrr", "cash_balance")
    pub chart_key: String,
    /// 포인트 이름, 보통 날짜 라벨 (예: "2024-03")
    pub point_name: String,
    /// 최소 화폐/단위 기준 정수값 (센트 등)
    pub value: i64,
    /// 제공자별 부가 정보
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// 제공자 이름
    pub provider: String,
}

impl IntegrationDataPoint {
    pub fn new(
        chart_key: impl Into<String>,
        point_name: impl Into<String>,
        value: i64,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            chart_key: chart_key.into(),
            point_name: point_name.into(),
            value,
            metadata: serde_json::Value::Null,
            provider: provider.into(),
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// 업서트 고유 키.
    pub fn key(&self) -> (&str, &str) {
        (&self.chart_key, &self.point_name)
    }
}

/// 같은 배치 안에서 키가 겹치면 나중 값만 남깁니다 (첫 등장 순서 유지).
pub fn latest_per_key(points: &[IntegrationDataPoint]) -> Vec<&IntegrationDataPoint> {
    let mut slots: HashMap<(&str, &str), usize> = HashMap::with_capacity(points.len());
    let mut result: Vec<&IntegrationDataPoint> = Vec::with_capacity(points.len());
    for point in points {
        match slots.entry(point.key()) {
            Entry::Occupied(slot) => result[*slot.get()] = point,
            Entry::Vacant(slot) => {
                slot.insert(result.len());
                result.push(point);
            }
        }
    }
    result
}
