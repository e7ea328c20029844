use crate::config::toml_config::{SourceConfig, TomlConfig};
use crate::core::dedup::DedupEngine;
use crate::core::stats::QualityReport;
use crate::core::{LocationRecord, MergedRecord, Pipeline, Storage, TransformResult};
use crate::utils::error::{EtlError, Result};
use serde_json::{json, Value};
use std::path::Path;

/// 讀取各來源檔案、去重合併、輸出 JSON / GeoJSON / CSV 與報告
pub struct MergePipeline<S: Storage> {
    pub(crate) storage: S,
    pub(crate) config: TomlConfig,
}

impl<S: Storage> MergePipeline<S> {
    pub fn new(storage: S, config: TomlConfig) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &TomlConfig {
        &self.config
    }

    async fn read_source(&self, source: &SourceConfig) -> Result<Option<Vec<LocationRecord>>> {
        let bytes = match self.storage.read_file(&source.path).await {
            Ok(bytes) => bytes,
            Err(EtlError::IoError(e))
                if e.kind() == std::io::ErrorKind::NotFound && !source.is_required() =>
            {
                tracing::warn!("⚠️  {:10}: file not found ({}), skipping", source.name, source.path);
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        parse_source(&bytes, source).map(Some)
    }

    fn output_file(&self, stem: &str, extension: &str, timestamp: &str) -> String {
        let file_name = if self.config.is_timestamped() {
            format!("{}_{}_{}.{}", self.config.file_prefix(), stem, timestamp, extension)
        } else {
            format!("{}_{}.{}", self.config.file_prefix(), stem, extension)
        };
        Path::new(self.config.output_path())
            .join(file_name)
            .to_string_lossy()
            .into_owned()
    }

    async fn write_json(&self, path: &str, value: &Value) -> Result<()> {
        let data = serde_json::to_vec_pretty(value)?;
        self.storage.write_file(path, &data).await?;
        tracing::info!("💾 Saved: {}", path);
        Ok(())
    }
}

/// 來源檔可以是陣列，或是 `{"meta": ..., "data": [...]}`
pub fn parse_source(bytes: &[u8], source: &SourceConfig) -> Result<Vec<LocationRecord>> {
    let document: Value = serde_json::from_slice(bytes)?;
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(EtlError::ProcessingError {
                    message: format!("source '{}' has no 'data' array", source.name),
                })
            }
        },
        _ => {
            return Err(EtlError::ProcessingError {
                message: format!("source '{}' must be a JSON array or object", source.name),
            })
        }
    };

    let mut records = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let mut record = LocationRecord::from_value(item).map_err(|e| EtlError::ProcessingError {
            message: format!("source '{}', record #{}: {}", source.name, index, e),
        })?;
        // 來源一律以設定為準，原本不同的標籤留在 source_label
        let tag = source.tag();
        if !record.source.is_empty() && record.source != tag {
            let label = std::mem::take(&mut record.source);
            record.attributes.insert("source_label", Value::String(label));
        }
        record.source = tag.to_string();
        records.push(record);
    }
    Ok(records)
}

/// GeoJSON FeatureCollection；沒有座標的記錄略過
pub fn to_geojson(records: &[MergedRecord]) -> Result<Value> {
    let mut features = Vec::new();
    for merged in records {
        let Some((lat, lon)) = merged.record.coordinates() else {
            continue;
        };
        let mut properties = match serde_json::to_value(merged)? {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        properties.remove("latitude");
        properties.remove("longitude");

        features.push(json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [lon, lat]
            },
            "properties": properties
        }));
    }

    Ok(json!({
        "type": "FeatureCollection",
        "features": features
    }))
}

pub fn to_csv(records: &[MergedRecord]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "id",
        "name",
        "latitude",
        "longitude",
        "category",
        "source",
        "sources",
        "original_ids",
    ])?;

    for merged in records {
        let record = &merged.record;
        writer.write_record([
            record.id.clone(),
            record.name.clone(),
            record.latitude.map(|v| v.to_string()).unwrap_or_default(),
            record.longitude.map(|v| v.to_string()).unwrap_or_default(),
            record.category.clone(),
            record.source.clone(),
            merged.sources.join(";"),
            merged.original_ids.join(";"),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for MergePipeline<S> {
    async fn extract(&self) -> Result<Vec<LocationRecord>> {
        tracing::info!("📂 Loading {} sources", self.config.sources.len());

        let mut records = Vec::new();
        for source in &self.config.sources {
            if let Some(loaded) = self.read_source(source).await? {
                tracing::info!("   ✓ {:10}: {:5} locations ({})", source.name, loaded.len(), source.path);
                records.extend(loaded);
            }
        }

        if records.is_empty() {
            tracing::warn!("⚠️  No locations found in any source");
        }

        Ok(records)
    }

    async fn transform(&self, data: Vec<LocationRecord>) -> Result<TransformResult> {
        let mut records = data;

        if let Some(bbox) = self.config.bbox() {
            let before = records.len();
            // 沒有座標的記錄照樣保留
            records.retain(|r| r.coordinates().map_or(true, |(lat, lon)| bbox.contains(lat, lon)));
            tracing::info!(
                "🗺️  Bounding box filter: {} -> {} locations",
                before,
                records.len()
            );
        }

        let engine = DedupEngine::new(self.config.matching.clone())?;
        let outcome = engine.deduplicate(&records)?;
        let report = QualityReport::build(&records, &outcome.unique_records, &outcome.stats);
        report.log_summary();

        Ok(TransformResult { outcome, report })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let now = chrono::Local::now();
        let created_at = now.to_rfc3339();
        let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
        let TransformResult { outcome, report } = result;

        if self.config.wants_format("json") {
            let document = json!({
                "meta": {
                    "created_at": created_at,
                    "pipeline": self.config.pipeline.name,
                    "version": self.config.pipeline.version,
                    "total_locations": outcome.unique_records.len(),
                    "source_stats": report.source_distribution,
                    "duplicates_removed": outcome.stats.duplicates_found,
                    "merge_stats": outcome.stats.matches,
                },
                "data": outcome.unique_records,
            });
            let path = self.output_file("merged", "json", &timestamp);
            self.write_json(&path, &document).await?;
        }

        if self.config.wants_format("geojson") {
            let mut collection = to_geojson(&outcome.unique_records)?;
            collection["metadata"] = json!({
                "created_at": created_at,
                "total_locations": outcome.unique_records.len(),
            });
            let path = self.output_file("merged", "geojson", &timestamp);
            self.write_json(&path, &collection).await?;
        }

        if self.config.wants_format("csv") {
            let data = to_csv(&outcome.unique_records)?;
            let path = self.output_file("merged", "csv", &timestamp);
            self.storage.write_file(&path, &data).await?;
            tracing::info!("💾 Saved: {}", path);
        }

        if self.config.wants_format("duplicates") && !outcome.duplicate_groups.is_empty() {
            let document = json!({
                "meta": {
                    "created_at": created_at,
                    "total_groups": outcome.duplicate_groups.len(),
                    "total_duplicates": outcome.stats.duplicates_found,
                },
                "groups": outcome.duplicate_groups,
            });
            let path = self.output_file("duplicates", "json", &timestamp);
            self.write_json(&path, &document).await?;
        }

        if self.config.wants_format("report") {
            let document = json!({
                "meta": { "created_at": created_at },
                "run": outcome.stats,
                "quality": report,
            });
            let path = self.output_file("report", "json", &timestamp);
            self.write_json(&path, &document).await?;
        }

        Ok(self.config.output_path().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::matching::MatchConfig;
    use std::collections::HashMap;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Clone, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        async fn put(&self, path: &str, value: Value) {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), serde_json::to_vec(&value).unwrap());
        }

        async fn get_json(&self, path: &str) -> Option<Value> {
            let files = self.files.lock().await;
            files.get(path).map(|data| serde_json::from_slice(data).unwrap())
        }
    }

    impl Storage for MockStorage {
        async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned().ok_or_else(|| {
                EtlError::IoError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("File not found: {}", path),
                ))
            })
        }

        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    fn config(extra: &str) -> TomlConfig {
        let toml_content = format!(
            r#"
[pipeline]
name = "unit"

[[sources]]
name = "seed"
path = "seed.json"

[[sources]]
name = "osm"
path = "osm.json"

{}

[load]
output_path = "out"
output_formats = ["json", "geojson", "csv", "duplicates", "report"]
timestamped = false
"#,
            extra
        );
        TomlConfig::from_toml_str(&toml_content).unwrap()
    }

    fn source(name: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            path: format!("{}.json", name),
            tag_as: None,
            required: None,
        }
    }

    #[test]
    fn test_parse_source_tags_records() {
        let bytes = serde_json::to_vec(&json!({
            "meta": {"count": 3},
            "data": [
                {"id": 1, "name": "A", "latitude": 51.0, "longitude": 11.0},
                {"id": 2, "name": "B", "source": "openstreetmap"},
                {"id": 3, "name": "C", "source": "manual"}
            ]
        }))
        .unwrap();

        let records = parse_source(&bytes, &source("osm")).unwrap();
        let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();
        assert_eq!(sources, vec!["osm", "osm", "osm"]);
        assert!(records[0].attributes.get("source_label").is_none());
        assert_eq!(records[1].attributes.get_str("source_label"), Some("openstreetmap"));
        assert_eq!(records[2].attributes.get_str("source_label"), Some("manual"));
    }

    #[test]
    fn test_seed_file_keeps_seed_priority_despite_raw_label() {
        let bytes = br#"[{"id": "s1", "name": "A", "source": "manual"}]"#;

        let records = parse_source(bytes, &source("seed")).unwrap();
        assert_eq!(records[0].source, "seed");
        assert_eq!(MatchConfig::default().priority(&records[0].source), 3);
    }

    #[test]
    fn test_parse_source_rejects_bad_shapes() {
        let not_array = serde_json::to_vec(&json!({"items": []})).unwrap();
        assert!(parse_source(&not_array, &source("osm")).is_err());

        let bad_id = serde_json::to_vec(&json!([{"id": {"nested": true}}])).unwrap();
        let err = parse_source(&bad_id, &source("osm")).unwrap_err();
        assert!(err.to_string().contains("record #0"));
    }

    #[test]
    fn test_geojson_skips_records_without_coordinates() {
        let with = MergedRecord {
            record: LocationRecord::new("1", "A", "osm").with_coordinates(51.5, 11.5),
            original_ids: vec!["1".to_string()],
            sources: vec!["osm".to_string()],
        };
        let without = MergedRecord {
            record: LocationRecord::new("2", "B", "seed"),
            original_ids: vec!["2".to_string()],
            sources: vec!["seed".to_string()],
        };

        let collection = to_geojson(&[with, without]).unwrap();
        let features = collection["features"].as_array().unwrap();
        assert_eq!(features.len(), 1);
        assert_eq!(features[0]["geometry"]["coordinates"], json!([11.5, 51.5]));
        assert!(features[0]["properties"].get("latitude").is_none());
        assert_eq!(features[0]["properties"]["sources"], json!(["osm"]));
    }

    #[tokio::test]
    async fn test_missing_optional_source_is_skipped() {
        let storage = MockStorage::default();
        storage
            .put("seed.json", json!([{"id": "s1", "name": "A", "latitude": 51.0, "longitude": 11.0}]))
            .await;

        let pipeline = MergePipeline::new(storage, config(""));
        let records = pipeline.extract().await.unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source, "seed");
    }

    #[tokio::test]
    async fn test_missing_required_source_fails() {
        let mut config = config("");
        config.sources[1].required = Some(true);
        let storage = MockStorage::default();
        storage.put("seed.json", json!([])).await;

        let pipeline = MergePipeline::new(storage, config);
        assert!(pipeline.extract().await.is_err());
    }

    #[tokio::test]
    async fn test_bbox_filter_keeps_records_without_coordinates() {
        let pipeline = MergePipeline::new(
            MockStorage::default(),
            config("[filter.bbox]\nsouth = 51.25\nwest = 10.80\nnorth = 51.70\neast = 11.80"),
        );
        let records = vec![
            LocationRecord::new("in", "Inside", "osm").with_coordinates(51.5, 11.5),
            LocationRecord::new("out", "Outside", "osm").with_coordinates(52.5, 13.4),
            LocationRecord::new("none", "Unknown", "seed"),
        ];

        let result = pipeline.transform(records).await.unwrap();
        let mut ids: Vec<&str> = result
            .outcome
            .unique_records
            .iter()
            .map(|r| r.record.id.as_str())
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["in", "none"]);
        assert_eq!(result.report.total_input, 2);
    }

    #[tokio::test]
    async fn test_load_writes_all_formats() {
        let storage = MockStorage::default();
        storage
            .put(
                "seed.json",
                json!([{"id": "seed_1", "name": "Schloss Mansfeld", "latitude": 51.5972, "longitude": 11.4528, "city": "Mansfeld"}]),
            )
            .await;
        storage
            .put(
                "osm.json",
                json!({"data": [{"id": 1001, "name": "Mansfeld Castle", "latitude": 51.5973, "longitude": 11.4529, "source": "openstreetmap"}]}),
            )
            .await;

        let pipeline = MergePipeline::new(storage.clone(), config(""));
        let records = pipeline.extract().await.unwrap();
        let result = pipeline.transform(records).await.unwrap();
        let output = pipeline.load(result).await.unwrap();
        assert_eq!(output, "out");

        let merged = storage.get_json("out/poi_merged.json").await.unwrap();
        assert_eq!(merged["meta"]["total_locations"], json!(1));
        assert_eq!(merged["data"][0]["id"], json!("merged_seed_1"));
        assert_eq!(merged["data"][0]["sources"], json!(["seed", "osm"]));

        let duplicates = storage.get_json("out/poi_duplicates.json").await.unwrap();
        assert_eq!(duplicates["groups"][0]["original_ids"], json!(["seed_1", "1001"]));

        let report = storage.get_json("out/poi_report.json").await.unwrap();
        assert_eq!(report["quality"]["quality_metrics"]["multi_source_count"], json!(1));

        assert!(storage.get_json("out/poi_merged.geojson").await.is_some());
        let files = storage.files.lock().await;
        let csv = String::from_utf8(files["out/poi_merged.csv"].clone()).unwrap();
        assert!(csv.starts_with("id,name,latitude,longitude,category,source,sources,original_ids"));
        assert!(csv.contains("merged_seed_1,Schloss Mansfeld"));
    }
}
