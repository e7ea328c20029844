use crate::core::dedup::DedupOutcome;
use crate::core::stats::QualityReport;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 合併規則中視為「空」的值：null、空字串、空陣列（缺欄位由呼叫端判斷）
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// 保留輸入順序的額外欄位（address、tags、openingHours ...）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// 欄位存在且不是空值
    pub fn is_filled(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|v| !is_empty_value(v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 以較低優先權的欄位補齊：缺少的欄位直接加入，空值只會被非空值覆蓋。
    /// 回傳補上的欄位數。
    pub fn fill_from(&mut self, other: &Attributes) -> usize {
        let mut filled = 0;
        for (key, value) in other.iter() {
            match self.0.get(key) {
                None => {
                    self.0.insert(key.clone(), value.clone());
                    filled += 1;
                }
                Some(existing) if is_empty_value(existing) && !is_empty_value(value) => {
                    self.0.insert(key.clone(), value.clone());
                    filled += 1;
                }
                Some(_) => {}
            }
        }
        filled
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// 單一來源觀測到的一個地點
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationRecord {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,
    #[serde(flatten)]
    pub attributes: Attributes,
}

impl LocationRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude: None,
            longitude: None,
            category: String::new(),
            source: source.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_coordinates(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key, value);
        self
    }

    /// 兩個座標都存在且落在合法範圍內才可參與空間比對；超出範圍視同缺少座標
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                Some((lat, lon))
            }
            _ => None,
        }
    }

    pub fn from_value(value: Value) -> crate::utils::error::Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(de::Error::custom(format!(
            "id must be a string or a number, got {}",
            other
        ))),
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// 距離帶，用於統計 exact / close / near
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchBand {
    Exact,
    Close,
    Near,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    MissingCoordinates,
    TooFar,
    ExactMatch,
    ExactLocation,
    CloseMatchHigh,
    CloseMatchMedium,
    CloseMatchLow,
    CloseNoNameMatch,
    NearMatch,
    NearNoNameMatch,
}

impl MatchTier {
    pub fn code(&self) -> &'static str {
        match self {
            MatchTier::MissingCoordinates => "missing_coordinates",
            MatchTier::TooFar => "too_far",
            MatchTier::ExactMatch => "exact_match",
            MatchTier::ExactLocation => "exact_location",
            MatchTier::CloseMatchHigh => "close_match_high",
            MatchTier::CloseMatchMedium => "close_match_medium",
            MatchTier::CloseMatchLow => "close_match_low",
            MatchTier::CloseNoNameMatch => "close_no_name_match",
            MatchTier::NearMatch => "near_match",
            MatchTier::NearNoNameMatch => "near_no_name_match",
        }
    }

    pub fn band(&self) -> Option<MatchBand> {
        match self {
            MatchTier::ExactMatch | MatchTier::ExactLocation => Some(MatchBand::Exact),
            MatchTier::CloseMatchHigh
            | MatchTier::CloseMatchMedium
            | MatchTier::CloseMatchLow
            | MatchTier::CloseNoNameMatch => Some(MatchBand::Close),
            MatchTier::NearMatch | MatchTier::NearNoNameMatch => Some(MatchBand::Near),
            MatchTier::MissingCoordinates | MatchTier::TooFar => None,
        }
    }
}

/// 兩筆記錄比對的結果；score == 0.0 代表不是重複
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchResult {
    pub score: f64,
    pub tier: MatchTier,
    pub distance_m: Option<f64>,
    pub name_score: Option<f64>,
}

impl MatchResult {
    pub fn reason(&self) -> String {
        match (self.distance_m, self.name_score) {
            (None, _) => self.tier.code().to_string(),
            (Some(distance), _) if self.tier == MatchTier::TooFar => {
                format!("{} ({:.0}m)", self.tier.code(), distance)
            }
            (Some(distance), _) if self.tier == MatchTier::ExactLocation => {
                format!("{} ({:.0}m)", self.tier.code(), distance)
            }
            (Some(distance), name) => format!(
                "{} ({:.0}m, name:{:.0}%)",
                self.tier.code(),
                distance,
                name.unwrap_or(0.0)
            ),
        }
    }

    /// 分數必須大於 0 且達到門檻，才算重複
    pub fn is_duplicate(&self, min_score: f64) -> bool {
        self.score > 0.0 && self.score >= min_score
    }
}

/// 稽核用：哪些原始記錄被合併成哪一筆
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroupReport {
    pub merged_id: String,
    pub merged_name: String,
    pub sources: Vec<String>,
    pub original_count: usize,
    pub original_ids: Vec<String>,
    pub match_reasons: Vec<String>,
}

/// 合併輸出：與 LocationRecord 同形，另附來源資訊
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub record: LocationRecord,
    pub original_ids: Vec<String>,
    pub sources: Vec<String>,
}

impl MergedRecord {
    pub fn is_multi_source(&self) -> bool {
        self.sources.len() > 1
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub outcome: DedupOutcome,
    pub report: QualityReport,
}
