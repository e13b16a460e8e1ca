use foundation::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::expression::Expression;
use crate::format::NumberFormat;

/// Synthetic positions for a three-output `case`: below, above, within.
pub const CASE_POSITIONS: [f64; 3] = [-1.0, 1.0, 0.0];

/// One entry of a legend, in expression order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegendStop {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Scalar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

/// Color legend for `expression`.
///
/// `None` means the style cannot be summarized: a single uniform color, an
/// unsupported head, or a `case` with other than three outputs.
pub fn interpret_color(expression: &Value, format: &NumberFormat) -> Option<Vec<LegendStop>> {
    let stops = match Expression::parse(expression) {
        Expression::Literal(_) => return None,
        Expression::Interpolate { stops } | Expression::Step { stops, .. } => stops
            .iter()
            .map(|(input, output)| LegendStop {
                color: color_of(output),
                ..keyed_stop(input, format)
            })
            .collect(),
        Expression::Match { cases, .. } => cases
            .iter()
            .map(|(input, output)| LegendStop {
                color: color_of(output),
                ..keyed_stop(input, format)
            })
            .collect(),
        Expression::Case { outputs } => {
            if outputs.len() != CASE_POSITIONS.len() {
                debug!(branches = outputs.len(), "case legend needs exactly three outputs");
                return None;
            }
            CASE_POSITIONS
                .iter()
                .zip(&outputs)
                .map(|(position, output)| LegendStop {
                    value: Some(Scalar::from(*position)),
                    color: color_of(output),
                    ..LegendStop::default()
                })
                .collect()
        }
        Expression::Unknown(head) => {
            debug!("no legend for `{head}` color expression");
            return None;
        }
    };
    non_empty(stops)
}

/// Width legend for `expression`, optionally sampled down to `num_stops`.
///
/// A bare number yields a single `{width}` stop; ramps yield one stop per
/// pair. Anything else is `None`.
pub fn interpret_width(expression: &Value, num_stops: Option<usize>) -> Option<Vec<LegendStop>> {
    let stops: Vec<LegendStop> = match Expression::parse(expression) {
        Expression::Literal(Value::Number(n)) => vec![LegendStop {
            width: n.as_f64(),
            ..LegendStop::default()
        }],
        Expression::Interpolate { stops } | Expression::Step { stops, .. } => stops
            .iter()
            .map(|(input, output)| LegendStop {
                width: output.as_f64(),
                ..keyed_stop(input, &NumberFormat::default())
            })
            .collect(),
        other => {
            debug!(?other, "no legend for width expression");
            return None;
        }
    };
    let stops = match num_stops {
        Some(n) => sample_evenly(stops, n),
        None => stops,
    };
    non_empty(stops)
}

/// Keep at most `n` items spread evenly, always including the first and
/// the last.
pub fn sample_evenly<T>(items: Vec<T>, n: usize) -> Vec<T> {
    let len = items.len();
    if n >= len {
        return items;
    }
    if n == 0 {
        return Vec::new();
    }
    let mut picks: Vec<usize> = if n == 1 {
        vec![0]
    } else {
        (0..n)
            .map(|i| ((i * (len - 1)) as f64 / (n - 1) as f64).round() as usize)
            .collect()
    };
    picks.dedup();
    items
        .into_iter()
        .enumerate()
        .filter(|(i, _)| picks.binary_search(i).is_ok())
        .map(|(_, item)| item)
        .collect()
}

fn keyed_stop(input: &Value, format: &NumberFormat) -> LegendStop {
    match input {
        Value::Number(n) => {
            let value = n.as_f64();
            LegendStop {
                value: value.map(Scalar::from),
                label: value.map(|v| format.format(v)),
                ..LegendStop::default()
            }
        }
        Value::Array(items) => LegendStop {
            label: Some(
                items
                    .iter()
                    .filter_map(Scalar::from_json)
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            ),
            ..LegendStop::default()
        },
        other => {
            let value = Scalar::from_json(other);
            LegendStop {
                label: value.as_ref().map(Scalar::to_string),
                value,
                ..LegendStop::default()
            }
        }
    }
}

fn color_of(output: &Value) -> Option<String> {
    output.as_str().map(str::to_string)
}

fn non_empty(stops: Vec<LegendStop>) -> Option<Vec<LegendStop>> {
    (!stops.is_empty()).then_some(stops)
}

#[cfg(test)]
mod tests {
    use super::{LegendStop, interpret_color, interpret_width, sample_evenly};
    use crate::format::NumberFormat;
    use foundation::Scalar;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn stop(value: f64, label: &str, color: &str) -> LegendStop {
        LegendStop {
            value: Some(Scalar::from(value)),
            label: Some(label.to_string()),
            color: Some(color.to_string()),
            width: None,
        }
    }

    #[test]
    fn uniform_color_has_no_legend() {
        assert_eq!(interpret_color(&json!("#ff0000"), &NumberFormat::default()), None);
    }

    #[test]
    fn interpolate_pairs_with_grouped_labels() {
        let expr = json!([
            "interpolate", ["linear"], ["get", "value"],
            0, "#f7fbff", 25000, "#6baed6", 1500000, "#08306b"
        ]);
        assert_eq!(
            interpret_color(&expr, &NumberFormat::grouped()),
            Some(vec![
                stop(0.0, "0", "#f7fbff"),
                stop(25000.0, "25,000", "#6baed6"),
                stop(1500000.0, "1,500,000", "#08306b"),
            ])
        );
    }

    #[test]
    fn step_skips_base_output() {
        let expr = json!(["step", ["get", "value"], "#eee", 10, "#aaa", 20, "#555"]);
        let stops = interpret_color(&expr, &NumberFormat::default()).unwrap();
        assert_eq!(stops, vec![stop(10.0, "10", "#aaa"), stop(20.0, "20", "#555")]);
    }

    #[test]
    fn match_drops_fallback_and_joins_array_labels() {
        let expr = json!(["match", ["get", "kind"], "park", "green", ["lake", "river"], "blue", "gray"]);
        let stops = interpret_color(&expr, &NumberFormat::default()).unwrap();
        assert_eq!(
            stops,
            vec![
                LegendStop {
                    value: Some(Scalar::from("park")),
                    label: Some("park".into()),
                    color: Some("green".into()),
                    width: None,
                },
                LegendStop {
                    value: None,
                    label: Some("lake, river".into()),
                    color: Some("blue".into()),
                    width: None,
                },
            ]
        );
    }

    #[test]
    fn three_way_case_uses_fixed_positions() {
        let expr = json!([
            "case",
            ["<", ["get", "v"], -5], "blue",
            [">", ["get", "v"], 5], "red",
            "white"
        ]);
        let stops = interpret_color(&expr, &NumberFormat::default()).unwrap();
        let summary: Vec<(Option<Scalar>, Option<String>)> =
            stops.into_iter().map(|s| (s.value, s.color)).collect();
        assert_eq!(
            summary,
            vec![
                (Some(Scalar::from(-1.0)), Some("blue".to_string())),
                (Some(Scalar::from(1.0)), Some("red".to_string())),
                (Some(Scalar::from(0.0)), Some("white".to_string())),
            ]
        );

        let two_way = json!(["case", ["has", "v"], "black", "white"]);
        assert_eq!(interpret_color(&two_way, &NumberFormat::default()), None);
    }

    #[test]
    fn unknown_heads_return_none() {
        let expr = json!(["coalesce", ["get", "color"], "#000"]);
        assert_eq!(interpret_color(&expr, &NumberFormat::default()), None);
        assert_eq!(interpret_width(&expr, None), None);
    }

    #[test]
    fn bare_width_is_single_stop() {
        assert_eq!(
            interpret_width(&json!(5), None),
            Some(vec![LegendStop {
                width: Some(5.0),
                ..LegendStop::default()
            }])
        );
    }

    #[test]
    fn width_ramp_samples_evenly() {
        let expr = json!(["interpolate", ["linear"], ["get", "n"], 0, 1, 10, 2, 20, 4, 30, 6, 40, 8]);
        let all = interpret_width(&expr, None).unwrap();
        assert_eq!(all.len(), 5);
        let widths: Vec<Option<f64>> = interpret_width(&expr, Some(3))
            .unwrap()
            .into_iter()
            .map(|s| s.width)
            .collect();
        assert_eq!(widths, vec![Some(1.0), Some(4.0), Some(8.0)]);
    }

    #[test]
    fn sampling_keeps_ends() {
        assert_eq!(sample_evenly((0..10).collect(), 2), vec![0, 9]);
        assert_eq!(sample_evenly((0..10).collect(), 4), vec![0, 3, 6, 9]);
        assert_eq!(sample_evenly(vec![1, 2], 5), vec![1, 2]);
        assert_eq!(sample_evenly(vec![1, 2, 3], 1), vec![1]);
        assert!(sample_evenly(vec![1, 2, 3], 0).is_empty());
    }
}
