//! Argument parsing shared by the `vizbind` binary.

use std::fmt;
use std::fs;
use std::path::Path;

use foundation::Scalar;
use foundation::math::LonLat;
use params::{Overrides, ParamData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgError(pub String);

impl fmt::Display for ArgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ArgError {}

/// `name=value` or `name=a,b,c`; a list becomes a multi-valued parameter.
pub fn parse_assignment(arg: &str) -> Result<(String, ParamData), ArgError> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| ArgError(format!("expected name=value, got `{arg}`")))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(ArgError(format!("empty parameter name in `{arg}`")));
    }
    let data = if value.contains(',') {
        ParamData::Many(
            value
                .split(',')
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(Scalar::from)
                .collect(),
        )
    } else {
        ParamData::One(Scalar::from(value))
    };
    Ok((name.to_string(), data))
}

pub fn overrides(assignments: &[String]) -> Result<Overrides, ArgError> {
    assignments.iter().map(|a| parse_assignment(a)).collect()
}

fn coordinates<const N: usize>(arg: &str) -> Result<[f64; N], ArgError> {
    let values: Vec<f64> = arg
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .map_err(|e| ArgError(format!("bad coordinate in `{arg}`: {e}")))?;
    values
        .try_into()
        .map_err(|_| ArgError(format!("expected {N} comma-separated numbers, got `{arg}`")))
}

/// `lon,lat`
pub fn parse_point(arg: &str) -> Result<LonLat, ArgError> {
    let [lon, lat] = coordinates::<2>(arg)?;
    Ok(LonLat::new(lon, lat))
}

/// `minLon,minLat,maxLon,maxLat`
pub fn parse_rect(arg: &str) -> Result<(LonLat, LonLat), ArgError> {
    let [a, b, c, d] = coordinates::<4>(arg)?;
    Ok((LonLat::new(a, b), LonLat::new(c, d)))
}

pub fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path).map_err(|e| format!("read {path:?}: {e}"))?;
    Ok(serde_json::from_str(&text).map_err(|e| format!("parse {path:?}: {e}"))?)
}
