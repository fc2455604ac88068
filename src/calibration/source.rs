//! Named numeric-array lookup over calibration documents.
//!
//! A calibration document is a map from key to a (possibly nested) list of
//! numbers. [`CalibrationSource`] hides the document format: callers ask for an
//! array by name and receive it flattened in row-major order.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::debug;
use serde_json::Value;
use yaml_rust::{Yaml, YamlLoader};

use super::LoadError;

/// Access to the named numeric arrays of a calibration document.
pub trait CalibrationSource {
    /// Returns the array stored under `key`, nested lists flattened row-major.
    ///
    /// `Ok(None)` means the key is absent. A present key holding anything other
    /// than numbers or lists of numbers is reported as
    /// [`LoadError::MalformedCalibration`].
    fn numeric_array(&self, key: &str) -> Result<Option<Vec<f64>>, LoadError>;
}

fn non_numeric(key: &str, found: &str) -> LoadError {
    LoadError::MalformedCalibration {
        key: key.to_string(),
        reason: format!("expected a number or a list of numbers, found {}", found),
    }
}

/// In-memory source, mostly useful for building calibrations in code.
impl CalibrationSource for HashMap<String, Vec<f64>> {
    fn numeric_array(&self, key: &str) -> Result<Option<Vec<f64>>, LoadError> {
        Ok(self.get(key).cloned())
    }
}

/// A calibration document parsed from JSON.
#[derive(Debug, Clone)]
pub struct JsonSource {
    root: serde_json::Map<String, Value>,
}

impl JsonSource {
    /// Reads and parses a JSON document.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] when the file cannot be read, [`LoadError::Parse`] when
    /// it is not a JSON object.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let contents = fs::read_to_string(path.as_ref())?;
        debug!("read {} bytes from {}", contents.len(), path.as_ref().display());
        contents.parse()
    }

    fn flatten_into(key: &str, value: &Value, out: &mut Vec<f64>) -> Result<(), LoadError> {
        match value {
            Value::Number(n) => {
                let x = n
                    .as_f64()
                    .ok_or_else(|| non_numeric(key, "an unrepresentable number"))?;
                out.push(x);
            }
            Value::Array(items) => {
                for item in items {
                    Self::flatten_into(key, item, out)?;
                }
            }
            Value::Null => return Err(non_numeric(key, "null")),
            Value::Bool(_) => return Err(non_numeric(key, "a boolean")),
            Value::String(_) => return Err(non_numeric(key, "a string")),
            Value::Object(_) => return Err(non_numeric(key, "an object")),
        }
        Ok(())
    }
}

impl FromStr for JsonSource {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match serde_json::from_str::<Value>(s)? {
            Value::Object(root) => Ok(JsonSource { root }),
            _ => Err(LoadError::Parse(
                "calibration document must be a JSON object".to_string(),
            )),
        }
    }
}

impl CalibrationSource for JsonSource {
    fn numeric_array(&self, key: &str) -> Result<Option<Vec<f64>>, LoadError> {
        let Some(value) = self.root.get(key) else {
            return Ok(None);
        };
        let mut out = Vec::new();
        Self::flatten_into(key, value, &mut out)?;
        Ok(Some(out))
    }
}

/// A calibration document parsed from YAML. Only the first document of a
/// multi-document stream is used.
#[derive(Debug, Clone)]
pub struct YamlSource {
    root: Yaml,
}

impl YamlSource {
    /// Reads and parses a YAML document.
    ///
    /// # Errors
    ///
    /// [`LoadError::Io`] when the file cannot be read, [`LoadError::Parse`] when
    /// it is empty or its top level is not a mapping.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let contents = fs::read_to_string(path.as_ref())?;
        debug!("read {} bytes from {}", contents.len(), path.as_ref().display());
        contents.parse()
    }

    fn flatten_into(key: &str, value: &Yaml, out: &mut Vec<f64>) -> Result<(), LoadError> {
        match value {
            Yaml::Real(_) => {
                let x = value
                    .as_f64()
                    .ok_or_else(|| non_numeric(key, "an unparseable real"))?;
                out.push(x);
            }
            Yaml::Integer(i) => out.push(*i as f64),
            Yaml::Array(items) => {
                for item in items {
                    Self::flatten_into(key, item, out)?;
                }
            }
            Yaml::Null => return Err(non_numeric(key, "null")),
            Yaml::Boolean(_) => return Err(non_numeric(key, "a boolean")),
            Yaml::String(_) => return Err(non_numeric(key, "a string")),
            Yaml::Hash(_) => return Err(non_numeric(key, "a mapping")),
            Yaml::Alias(_) | Yaml::BadValue => return Err(non_numeric(key, "an invalid node")),
        }
        Ok(())
    }
}

impl FromStr for YamlSource {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let docs = YamlLoader::load_from_str(s)?;
        let root = docs
            .into_iter()
            .next()
            .ok_or_else(|| LoadError::Parse("empty YAML document".to_string()))?;
        if root.as_hash().is_none() {
            return Err(LoadError::Parse(
                "calibration document must be a YAML mapping".to_string(),
            ));
        }
        Ok(YamlSource { root })
    }
}

impl CalibrationSource for YamlSource {
    fn numeric_array(&self, key: &str) -> Result<Option<Vec<f64>>, LoadError> {
        let Some(value) = self
            .root
            .as_hash()
            .and_then(|map| map.get(&Yaml::String(key.to_string())))
        else {
            return Ok(None);
        };
        let mut out = Vec::new();
        Self::flatten_into(key, value, &mut out)?;
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_flattens_nested_arrays() {
        let source: JsonSource = r#"{
            "camera1_matrix": [[1, 0, 2], [0, 3, 4], [0, 0, 1]],
            "camera1_distortion": [[0.1, 0.2, 0.0, 0.0, 0.0]],
            "flat": [5.5, -1e-3]
        }"#
        .parse()
        .unwrap();

        assert_eq!(
            source.numeric_array("camera1_matrix").unwrap(),
            Some(vec![1.0, 0.0, 2.0, 0.0, 3.0, 4.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(
            source.numeric_array("camera1_distortion").unwrap(),
            Some(vec![0.1, 0.2, 0.0, 0.0, 0.0])
        );
        assert_eq!(source.numeric_array("flat").unwrap(), Some(vec![5.5, -1e-3]));
        assert_eq!(source.numeric_array("missing").unwrap(), None);
    }

    #[test]
    fn test_json_rejects_non_numeric_entries() {
        let source: JsonSource =
            r#"{"extrinsic_matrix": [1, "two", 3], "nothing": null}"#.parse().unwrap();
        assert!(matches!(
            source.numeric_array("extrinsic_matrix"),
            Err(LoadError::MalformedCalibration { ref key, .. }) if key == "extrinsic_matrix"
        ));
        assert!(matches!(
            source.numeric_array("nothing"),
            Err(LoadError::MalformedCalibration { .. })
        ));
    }

    #[test]
    fn test_json_parse_errors() {
        assert!(matches!(
            "{ not json".parse::<JsonSource>(),
            Err(LoadError::Parse(_))
        ));
        assert!(matches!("[1, 2, 3]".parse::<JsonSource>(), Err(LoadError::Parse(_))));
    }

    #[test]
    fn test_yaml_flattens_nested_arrays() {
        let source: YamlSource = "
camera2_matrix:
  - [800, 0, 640.5]
  - [0, 810, 360]
  - [0, 0, 1]
camera2_distortion: [-0.1, 0.01, 1.0e-4, 0, 0]
"
        .parse()
        .unwrap();

        assert_eq!(
            source.numeric_array("camera2_matrix").unwrap(),
            Some(vec![800.0, 0.0, 640.5, 0.0, 810.0, 360.0, 0.0, 0.0, 1.0])
        );
        assert_eq!(
            source.numeric_array("camera2_distortion").unwrap(),
            Some(vec![-0.1, 0.01, 1.0e-4, 0.0, 0.0])
        );
        assert_eq!(source.numeric_array("extrinsic_matrix").unwrap(), None);
    }

    #[test]
    fn test_yaml_rejects_bad_documents() {
        assert!(matches!("".parse::<YamlSource>(), Err(LoadError::Parse(_))));
        assert!(matches!("- 1\n- 2\n".parse::<YamlSource>(), Err(LoadError::Parse(_))));
        assert!(matches!(
            "key: [1, 2\n".parse::<YamlSource>(),
            Err(LoadError::Parse(_))
        ));

        let source: YamlSource = "camera1_matrix: [1, abc, 3]\n".parse().unwrap();
        assert!(matches!(
            source.numeric_array("camera1_matrix"),
            Err(LoadError::MalformedCalibration { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(
            JsonSource::from_path("samples/does_not_exist.json"),
            Err(LoadError::Io(_))
        ));
        assert!(matches!(
            YamlSource::from_path("samples/does_not_exist.yaml"),
            Err(LoadError::Io(_))
        ));
    }
}
